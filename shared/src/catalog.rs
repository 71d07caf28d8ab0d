//! Point-in-time stock figures for catalog listings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::availability::ReservationRecord;
use crate::error::AvailabilityError;
use crate::status::OrderStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSnapshot {
    pub total_stock: i64,
    /// Display only. Already included in `reserved_quantity`.
    pub currently_rented_quantity: i64,
    pub reserved_quantity: i64,
    pub available_quantity: i64,
    pub is_out_of_stock: bool,
    pub is_partially_available: bool,
}

/// Stock as seen at `now`.
///
/// Active reservations that have not ended yet (current or future) count
/// towards `reserved_quantity`. Those whose window contains `now` are also
/// summed into `currently_rented_quantity`, which is never subtracted.
pub fn stock_at(
    total_stock: i64,
    reservations: &[ReservationRecord],
    now: DateTime<Utc>,
) -> Result<StockSnapshot, AvailabilityError> {
    if total_stock < 0 {
        return Err(AvailabilityError::invalid(
            "total_stock",
            format!("must not be negative, got {}", total_stock),
        ));
    }

    let mut reserved_quantity = 0i64;
    let mut currently_rented_quantity = 0i64;
    for reservation in reservations {
        reservation.validate()?;
        if !reservation.holds_stock() || !reservation.window.is_pending_at(now) {
            continue;
        }
        reserved_quantity = reserved_quantity.saturating_add(reservation.quantity);
        if reservation.window.contains(now) {
            currently_rented_quantity = currently_rented_quantity.saturating_add(reservation.quantity);
        }
    }

    let available_quantity = (total_stock - reserved_quantity).max(0);
    Ok(StockSnapshot {
        total_stock,
        currently_rented_quantity,
        reserved_quantity,
        available_quantity,
        is_out_of_stock: available_quantity == 0,
        is_partially_available: reserved_quantity > 0 && available_quantity > 0,
    })
}

/// Who has a unit out right now, safe to show to other customers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenterSummary {
    pub order_number: String,
    pub customer_name: String,
    pub quantity: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: OrderStatus,
}

impl RenterSummary {
    pub fn new(reservation: &ReservationRecord, customer_name: &str) -> Self {
        Self {
            order_number: reservation.order_reference.clone(),
            customer_name: mask_customer_name(customer_name),
            quantity: reservation.quantity,
            start_date: reservation.window.start_date,
            end_date: reservation.window.end_date,
            status: reservation.status,
        }
    }
}

pub fn is_current_rental(reservation: &ReservationRecord, now: DateTime<Utc>) -> bool {
    reservation.holds_stock() && reservation.window.contains(now)
}

/// Keeps the first character of every word: `"Jane Doe"` becomes `"J*** D**"`.
pub fn mask_customer_name(name: &str) -> String {
    let words: Vec<String> = name
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => std::iter::once(first)
                    .chain(chars.map(|_| '*'))
                    .collect(),
                None => String::new(),
            }
        })
        .collect();

    if words.is_empty() {
        "***".to_string()
    } else {
        words.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::TimeWindow;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 15, 12, 0, 0).unwrap()
    }

    fn booking(quantity: i64, start_offset_days: i64, end_offset_days: i64, status: OrderStatus) -> ReservationRecord {
        ReservationRecord {
            quantity,
            window: TimeWindow {
                start_date: now() + Duration::days(start_offset_days),
                end_date: now() + Duration::days(end_offset_days),
            },
            status,
            order_reference: "S00042".to_string(),
        }
    }

    #[test]
    fn current_rental_counts_in_both_aggregates() {
        let snapshot = stock_at(5, &[booking(2, -1, 1, OrderStatus::PickedUp)], now()).unwrap();
        assert_eq!(snapshot.reserved_quantity, 2);
        assert_eq!(snapshot.currently_rented_quantity, 2);
        assert_eq!(snapshot.available_quantity, 3);
        assert!(snapshot.is_partially_available);
        assert!(!snapshot.is_out_of_stock);
    }

    #[test]
    fn future_reservation_counts_only_as_reserved() {
        let snapshot = stock_at(5, &[booking(1, 2, 4, OrderStatus::Confirmed)], now()).unwrap();
        assert_eq!(snapshot.reserved_quantity, 1);
        assert_eq!(snapshot.currently_rented_quantity, 0);
        assert_eq!(snapshot.available_quantity, 4);
    }

    #[test]
    fn rented_quantity_is_not_subtracted_twice() {
        let existing = [
            booking(2, -3, 2, OrderStatus::PickedUp),
            booking(1, 5, 6, OrderStatus::Confirmed),
        ];
        let snapshot = stock_at(5, &existing, now()).unwrap();
        assert_eq!(snapshot.reserved_quantity, 3);
        assert_eq!(snapshot.currently_rented_quantity, 2);
        assert_eq!(snapshot.available_quantity, 2);
    }

    #[test]
    fn ended_and_inactive_reservations_are_ignored() {
        let existing = [
            booking(3, -5, -1, OrderStatus::PickedUp),
            booking(3, -1, 1, OrderStatus::Cancelled),
            booking(3, 1, 2, OrderStatus::Quotation),
        ];
        let snapshot = stock_at(3, &existing, now()).unwrap();
        assert_eq!(snapshot.reserved_quantity, 0);
        assert_eq!(snapshot.available_quantity, 3);
        assert!(!snapshot.is_partially_available);
    }

    #[test]
    fn reservation_ending_now_still_counts() {
        let snapshot = stock_at(1, &[booking(1, -2, 0, OrderStatus::PickedUp)], now()).unwrap();
        assert_eq!(snapshot.reserved_quantity, 1);
        assert_eq!(snapshot.currently_rented_quantity, 1);
        assert!(snapshot.is_out_of_stock);
    }

    #[test]
    fn zero_stock_is_out_of_stock() {
        let snapshot = stock_at(0, &[], now()).unwrap();
        assert!(snapshot.is_out_of_stock);
        assert!(!snapshot.is_partially_available);
        assert!(stock_at(-1, &[], now()).is_err());
    }

    #[test]
    fn masks_each_word() {
        assert_eq!(mask_customer_name("Jane Doe"), "J*** D**");
        assert_eq!(mask_customer_name("  Émile  "), "É****");
        assert_eq!(mask_customer_name(""), "***");
    }

    #[test]
    fn renter_summary_hides_name() {
        let reservation = booking(1, -1, 1, OrderStatus::PickedUp);
        assert!(is_current_rental(&reservation, now()));
        let summary = RenterSummary::new(&reservation, "Ada Lovelace");
        assert_eq!(summary.customer_name, "A** L*******");
        assert_eq!(summary.order_number, "S00042");
    }
}
