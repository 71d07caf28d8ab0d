use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AvailabilityError;

/// Lifecycle state of the order that owns a reservation.
///
/// Transitions belong to the order collaborator. Inventory code only asks
/// [`OrderStatus::is_active_reservation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Quotation,
    Sent,
    Confirmed,
    PickedUp,
    Returned,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Quotation,
        OrderStatus::Sent,
        OrderStatus::Confirmed,
        OrderStatus::PickedUp,
        OrderStatus::Returned,
        OrderStatus::Cancelled,
    ];

    /// Confirmed-or-later and not yet returned. Only these hold stock.
    pub fn is_active_reservation(self) -> bool {
        matches!(self, OrderStatus::Confirmed | OrderStatus::PickedUp)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Quotation => "QUOTATION",
            OrderStatus::Sent => "SENT",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::PickedUp => "PICKED_UP",
            OrderStatus::Returned => "RETURNED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = AvailabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AvailabilityError::invalid("status", format!("unknown order status '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_confirmed_and_picked_up_hold_stock() {
        let active: Vec<_> = OrderStatus::ALL
            .into_iter()
            .filter(|s| s.is_active_reservation())
            .collect();
        assert_eq!(active, vec![OrderStatus::Confirmed, OrderStatus::PickedUp]);
    }

    #[test]
    fn parses_stored_strings() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert_eq!("picked_up".parse::<OrderStatus>().unwrap(), OrderStatus::PickedUp);
    }

    #[test]
    fn unknown_status_is_invalid_input() {
        let err = "ON_HOLD".parse::<OrderStatus>().unwrap_err();
        assert!(matches!(err, AvailabilityError::InvalidInput { field: "status", .. }));
    }

    #[test]
    fn serializes_as_screaming_snake_case() {
        let json = serde_json::to_string(&OrderStatus::PickedUp).unwrap();
        assert_eq!(json, "\"PICKED_UP\"");
    }
}
