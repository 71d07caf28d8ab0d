use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use shared::{AvailabilityError, OrderStatus, ReservationData, ReservationRecord, TimeWindow};

#[derive(Debug, Clone, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::products)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub total_stock: i32,
    pub is_published: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::reservations)]
pub struct Reservation {
    pub id: Uuid,
    pub product_id: Uuid,
    pub order_id: Uuid,
    pub order_number: String,
    pub customer_name: String,
    pub quantity: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Reservation {
    pub fn order_status(&self) -> Result<OrderStatus, AvailabilityError> {
        self.status.parse()
    }

    pub fn to_record(&self) -> Result<ReservationRecord, AvailabilityError> {
        Ok(ReservationRecord {
            quantity: i64::from(self.quantity),
            window: TimeWindow {
                start_date: self.start_date,
                end_date: self.end_date,
            },
            status: self.order_status()?,
            order_reference: self.order_number.clone(),
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::reservations)]
pub struct NewReservation {
    pub id: Uuid,
    pub product_id: Uuid,
    pub order_id: Uuid,
    pub order_number: String,
    pub customer_name: String,
    pub quantity: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: String,
}

impl NewReservation {
    /// Bookings are only admitted for orders that already hold stock.
    pub fn confirmed(data: &ReservationData) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_id: data.product_id,
            order_id: data.order_id,
            order_number: data.order_number.clone(),
            customer_name: data.customer_name.clone(),
            quantity: data.quantity,
            start_date: data.start_date,
            end_date: data.end_date,
            status: OrderStatus::Confirmed.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::processed_commands)]
pub struct ProcessedCommand {
    pub idempotency_key: String,
    pub command_id: Uuid,
    pub result: Option<serde_json::Value>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn stored(status: &str) -> Reservation {
        Reservation {
            id: Uuid::from_u128(1),
            product_id: Uuid::from_u128(2),
            order_id: Uuid::from_u128(3),
            order_number: "S00003".to_string(),
            customer_name: "Jane Doe".to_string(),
            quantity: 2,
            start_date: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
            end_date: Utc.with_ymd_and_hms(2024, 5, 3, 9, 0, 0).unwrap(),
            status: status.to_string(),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn stored_row_becomes_record() {
        let record = stored("PICKED_UP").to_record().unwrap();
        assert_eq!(record.status, OrderStatus::PickedUp);
        assert_eq!(record.quantity, 2);
        assert_eq!(record.order_reference, "S00003");
        assert!(record.holds_stock());
    }

    #[test]
    fn unknown_stored_status_is_surfaced() {
        assert!(stored("reserved").to_record().is_err());
    }

    #[test]
    fn new_reservation_starts_confirmed() {
        let data = ReservationData {
            product_id: Uuid::from_u128(2),
            order_id: Uuid::from_u128(3),
            order_number: "S00003".to_string(),
            customer_name: "Jane Doe".to_string(),
            quantity: 1,
            start_date: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
            end_date: Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap(),
        };
        let row = NewReservation::confirmed(&data);
        assert_eq!(row.status, "CONFIRMED");
        assert_eq!(row.order_id, data.order_id);
    }
}
