use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Refunded,
}

impl BookingStatus {
    // CANCELLED и REFUNDED - конечные состояния
    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Refunded)
    }

    // Отменять можно только неконечную бронь
    pub fn can_cancel(self) -> bool {
        !self.is_terminal()
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub user_id: i64,
    pub event_id: i64,
    pub total_price: Decimal,
    pub status: BookingStatus,
    pub payment_intent_id: Option<String>,
    pub booking_date: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BookingSeat {
    pub id: i64,
    pub booking_id: i64,
    pub seat_id: i64,
    pub price_at_booking: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_cannot_be_cancelled_again() {
        assert!(BookingStatus::Pending.can_cancel());
        assert!(BookingStatus::Confirmed.can_cancel());
        assert!(!BookingStatus::Cancelled.can_cancel());
        assert!(!BookingStatus::Refunded.can_cancel());
    }

    #[test]
    fn only_cancelled_and_refunded_are_terminal() {
        assert!(!BookingStatus::Pending.is_terminal());
        assert!(!BookingStatus::Confirmed.is_terminal());
        assert!(BookingStatus::Cancelled.is_terminal());
        assert!(BookingStatus::Refunded.is_terminal());
    }
}
