use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Booking {
    pub id: i64,
    pub user_id: i64,
    /// Cleared when the event's ticket types are replaced.
    pub ticket_type_id: Option<i64>,
    pub quantity: i32,
    pub booked_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: i64,
    pub ticket_type_id: i64,
    pub quantity: i32,
}

/// Booking joined with its ticket type, event and booker.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BookingConfirmation {
    pub booking_id: i64,
    pub user_id: i64,
    pub quantity: i32,
    pub booked_at: DateTime<Utc>,
    pub ticket_label: String,
    pub unit_price: Decimal,
    pub event_id: i64,
    pub event_title: String,
    pub event_date: NaiveDate,
    pub user_first_name: String,
    pub user_last_name: String,
    pub user_email: String,
}

impl BookingConfirmation {
    pub fn total_price(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// One row of the booking history listing.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BookingHistoryRow {
    pub booking_id: i64,
    pub quantity: i32,
    pub booked_at: DateTime<Utc>,
    pub ticket_label: String,
    pub unit_price: Decimal,
    pub event_id: i64,
    pub event_title: String,
    pub event_date: NaiveDate,
}
