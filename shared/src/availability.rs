//! Window-overlap availability used by booking and quotation.
//!
//! Everything here is a pure function of its arguments. Callers that go on to
//! insert a reservation must re-run the calculation inside the transaction that
//! performs the insert.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AvailabilityError;
use crate::status::OrderStatus;
use crate::window::TimeWindow;

/// An existing commitment of stock, as read from persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationRecord {
    pub quantity: i64,
    #[serde(flatten)]
    pub window: TimeWindow,
    pub status: OrderStatus,
    pub order_reference: String,
}

impl ReservationRecord {
    pub fn validate(&self) -> Result<(), AvailabilityError> {
        if self.quantity <= 0 {
            return Err(AvailabilityError::invalid(
                "reservation.quantity",
                format!("order {} reserves {} units", self.order_reference, self.quantity),
            ));
        }
        self.window.validate("reservation.window").map_err(|e| match e {
            AvailabilityError::InvalidInput { field, reason } => AvailabilityError::InvalidInput {
                field,
                reason: format!("order {}: {}", self.order_reference, reason),
            },
        })
    }

    pub fn holds_stock(&self) -> bool {
        self.status.is_active_reservation()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityRequest {
    pub product_id: Uuid,
    pub requested_quantity: i64,
    #[serde(flatten)]
    pub window: TimeWindow,
}

impl AvailabilityRequest {
    pub fn validate(&self) -> Result<(), AvailabilityError> {
        if self.product_id.is_nil() {
            return Err(AvailabilityError::invalid("product_id", "product id is required"));
        }
        if self.requested_quantity <= 0 {
            return Err(AvailabilityError::invalid(
                "requested_quantity",
                format!("must be positive, got {}", self.requested_quantity),
            ));
        }
        self.window.validate("requested_window")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AvailabilityStatus {
    Full,
    Partial,
    None,
}

impl AvailabilityStatus {
    fn classify(available: i64, requested: i64) -> Self {
        if available <= 0 {
            AvailabilityStatus::None
        } else if available >= requested {
            AvailabilityStatus::Full
        } else {
            AvailabilityStatus::Partial
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityResult {
    pub product_id: Uuid,
    pub requested_quantity: i64,
    pub requested_window: TimeWindow,
    pub total_quantity: i64,
    pub booked_quantity: i64,
    pub available_quantity: i64,
    pub status: AvailabilityStatus,
    pub message: String,
    pub overlapping_bookings: Vec<ReservationRecord>,
}

impl AvailabilityResult {
    pub fn is_full(&self) -> bool {
        self.status == AvailabilityStatus::Full
    }
}

/// Computes how much of `request` can be served over its window.
///
/// `total_quantity` of `None` means the product has no stock record and is
/// treated as zero stock. Only reservations with an active status whose window
/// overlaps the requested one are counted. A `Partial` result reports the
/// ceiling and leaves the decision to downgrade with the caller.
pub fn calculate_window_availability(
    total_quantity: Option<i64>,
    reservations: &[ReservationRecord],
    request: &AvailabilityRequest,
) -> Result<AvailabilityResult, AvailabilityError> {
    request.validate()?;
    let total_quantity = total_quantity.unwrap_or(0);
    if total_quantity < 0 {
        return Err(AvailabilityError::invalid(
            "total_quantity",
            format!("must not be negative, got {}", total_quantity),
        ));
    }
    for reservation in reservations {
        reservation.validate()?;
    }

    let overlapping_bookings: Vec<ReservationRecord> = reservations
        .iter()
        .filter(|r| r.holds_stock() && r.window.overlaps(&request.window))
        .cloned()
        .collect();

    let booked_quantity = overlapping_bookings
        .iter()
        .fold(0i64, |acc, r| acc.saturating_add(r.quantity));
    let available_quantity = (total_quantity - booked_quantity).max(0);
    let status = AvailabilityStatus::classify(available_quantity, request.requested_quantity);

    let message = match status {
        AvailabilityStatus::Full => format!(
            "{} of {} units available for the requested period",
            available_quantity, total_quantity
        ),
        AvailabilityStatus::Partial => format!(
            "Only {} of the {} requested units are available for the requested period; reduce to {} units to continue",
            available_quantity, request.requested_quantity, available_quantity
        ),
        AvailabilityStatus::None if total_quantity == 0 => {
            "No stock on record for this product".to_string()
        }
        AvailabilityStatus::None => format!(
            "All {} units are booked for the requested period ({} conflicting orders)",
            total_quantity,
            overlapping_bookings.len()
        ),
    };

    Ok(AvailabilityResult {
        product_id: request.product_id,
        requested_quantity: request.requested_quantity,
        requested_window: request.window,
        total_quantity,
        booked_quantity,
        available_quantity,
        status,
        message,
        overlapping_bookings,
    })
}
