pub mod availability;
pub mod catalog;
pub mod error;
pub mod status;
pub mod window;

pub use availability::{
    calculate_window_availability, AvailabilityRequest, AvailabilityResult, AvailabilityStatus,
    ReservationRecord,
};
pub use catalog::{is_current_rental, mask_customer_name, stock_at, RenterSummary, StockSnapshot};
pub use error::AvailabilityError;
pub use status::OrderStatus;
pub use window::TimeWindow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub id: Uuid,
    pub order_id: Uuid,
    pub command_type: CommandType,
    pub payload: serde_json::Value,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandType {
    ReserveStock,
    UpdateReservationStatus,
    ReleaseReservation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandReply {
    pub id: Uuid,
    pub command_id: Uuid,
    pub order_id: Uuid,
    pub status: CommandStatus,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandStatus {
    Success,
    Failed,
}

/// A booking for one product line of an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationData {
    pub product_id: Uuid,
    pub order_id: Uuid,
    pub order_number: String,
    pub customer_name: String,
    pub quantity: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl ReservationData {
    pub fn availability_request(&self) -> AvailabilityRequest {
        AvailabilityRequest {
            product_id: self.product_id,
            requested_quantity: i64::from(self.quantity),
            window: TimeWindow {
                start_date: self.start_date,
                end_date: self.end_date,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChangeData {
    pub order_id: Uuid,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseData {
    pub order_id: Uuid,
}

impl CommandReply {
    pub fn success(command_id: Uuid, order_id: Uuid, result: Option<serde_json::Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            command_id,
            order_id,
            status: CommandStatus::Success,
            result,
            error: None,
            created_at: Utc::now(),
        }
    }

    pub fn failed(command_id: Uuid, order_id: Uuid, error: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            command_id,
            order_id,
            status: CommandStatus::Failed,
            result: None,
            error: Some(error),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn reservation_data_maps_to_request() {
        let data = ReservationData {
            product_id: Uuid::from_u128(1),
            order_id: Uuid::from_u128(2),
            order_number: "S00017".to_string(),
            customer_name: "Jane Doe".to_string(),
            quantity: 3,
            start_date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            end_date: Utc.with_ymd_and_hms(2024, 1, 4, 0, 0, 0).unwrap(),
        };
        let request = data.availability_request();
        assert_eq!(request.requested_quantity, 3);
        assert_eq!(request.window.end_date, data.end_date);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn command_round_trips_through_json() {
        let payload = serde_json::json!({"order_id": Uuid::from_u128(9), "status": "CANCELLED"});
        let command = Command {
            id: Uuid::from_u128(1),
            order_id: Uuid::from_u128(9),
            command_type: CommandType::UpdateReservationStatus,
            payload,
            idempotency_key: "order-9-confirm".to_string(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&command).unwrap();
        let parsed: Command = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.command_type, CommandType::UpdateReservationStatus);

        let change: StatusChangeData = serde_json::from_value(parsed.payload).unwrap();
        assert_eq!(change.status, OrderStatus::Cancelled);
    }

    #[test]
    fn failed_reply_carries_error() {
        let reply = CommandReply::failed(Uuid::nil(), Uuid::nil(), "no stock".to_string());
        assert_eq!(reply.status, CommandStatus::Failed);
        assert_eq!(reply.error.as_deref(), Some("no stock"));
        assert!(reply.result.is_none());
    }
}
