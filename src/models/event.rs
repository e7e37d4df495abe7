use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "event_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Draft,
    Published,
    SalesOpen,
    SalesClosed,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub venue_id: i64,
    pub title: String,
    pub event_date: DateTime<Utc>,
    pub base_price: Decimal,
    pub max_capacity: i32,
    pub available_seats: i32,
    pub status: EventStatus,
}

impl Event {
    // Билеты продаются только в окне продаж и пока есть инвентарь
    pub fn can_purchase_tickets(&self, now: DateTime<Utc>) -> bool {
        self.status == EventStatus::SalesOpen && self.available_seats > 0 && now < self.event_date
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn event(status: EventStatus, available_seats: i32, starts_in: Duration) -> Event {
        Event {
            id: 1,
            venue_id: 1,
            title: "Концерт".to_string(),
            event_date: Utc::now() + starts_in,
            base_price: dec!(100.00),
            max_capacity: 100,
            available_seats,
            status,
        }
    }

    #[test]
    fn tickets_sell_only_while_sales_are_open() {
        let now = Utc::now();
        assert!(event(EventStatus::SalesOpen, 10, Duration::hours(1)).can_purchase_tickets(now));
        assert!(!event(EventStatus::Published, 10, Duration::hours(1)).can_purchase_tickets(now));
        assert!(!event(EventStatus::SalesClosed, 10, Duration::hours(1)).can_purchase_tickets(now));
        assert!(!event(EventStatus::Cancelled, 10, Duration::hours(1)).can_purchase_tickets(now));
    }

    #[test]
    fn exhausted_inventory_closes_sales() {
        let now = Utc::now();
        assert!(!event(EventStatus::SalesOpen, 0, Duration::hours(1)).can_purchase_tickets(now));
        assert!(event(EventStatus::SalesOpen, 1, Duration::hours(1)).can_purchase_tickets(now));
    }

    #[test]
    fn past_events_do_not_sell() {
        let now = Utc::now();
        assert!(!event(EventStatus::SalesOpen, 10, Duration::hours(-1)).can_purchase_tickets(now));
    }
}
