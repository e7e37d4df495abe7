//! Шлюз к реляционному хранилищу: события, места, бронирования.
//! Координатор не видит SQL - только типизированные операции; все мутации
//! идут под явной транзакцией вызывающего.

use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};

use crate::database::Database;
use crate::models::{Booking, BookingSeat, Event, Seat, SeatStatus};

pub type StoreTx = Transaction<'static, Postgres>;

const BOOKING_COLUMNS: &str = "id, user_id, event_id, total_price, status, payment_intent_id, \
     booking_date, confirmed_at, cancelled_at, cancellation_reason";

const SEAT_COLUMNS: &str = "id, venue_id, section, \"row\", number, seat_type, status, price_modifier";

const EVENT_COLUMNS: &str =
    "id, venue_id, title, event_date, base_price, max_capacity, available_seats, status";

#[derive(Clone)]
pub struct StoreGateway {
    db: Database,
}

impl StoreGateway {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn begin(&self) -> Result<StoreTx, sqlx::Error> {
        self.db.pool.begin().await
    }

    pub async fn find_event(&self, event_id: i64) -> Result<Option<Event>, sqlx::Error> {
        let query = format!("SELECT {} FROM events WHERE id = $1", EVENT_COLUMNS);
        sqlx::query_as::<_, Event>(&query)
            .bind(event_id)
            .fetch_optional(&self.db.pool)
            .await
    }

    pub async fn find_event_for_update(
        &self,
        tx: &mut StoreTx,
        event_id: i64,
    ) -> Result<Option<Event>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM events WHERE id = $1 FOR UPDATE",
            EVENT_COLUMNS
        );
        sqlx::query_as::<_, Event>(&query)
            .bind(event_id)
            .fetch_optional(&mut **tx)
            .await
    }

    // Строки мест блокируются в возрастающем порядке id, иначе два коммита
    // с пересекающимися наборами взаимно блокируются
    pub async fn find_seats_for_update(
        &self,
        tx: &mut StoreTx,
        seat_ids: &[i64],
    ) -> Result<Vec<Seat>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM seats WHERE id = ANY($1) ORDER BY id FOR UPDATE",
            SEAT_COLUMNS
        );
        sqlx::query_as::<_, Seat>(&query)
            .bind(seat_ids)
            .fetch_all(&mut **tx)
            .await
    }

    pub async fn insert_booking(
        &self,
        tx: &mut StoreTx,
        user_id: i64,
        event_id: i64,
        total_price: Decimal,
        payment_intent_id: Option<&str>,
    ) -> Result<Booking, sqlx::Error> {
        let query = format!(
            "INSERT INTO bookings (user_id, event_id, total_price, status, payment_intent_id, booking_date) \
             VALUES ($1, $2, $3, 'PENDING', $4, NOW()) \
             RETURNING {}",
            BOOKING_COLUMNS
        );
        sqlx::query_as::<_, Booking>(&query)
            .bind(user_id)
            .bind(event_id)
            .bind(total_price)
            .bind(payment_intent_id)
            .fetch_one(&mut **tx)
            .await
    }

    pub async fn insert_booking_seats(
        &self,
        tx: &mut StoreTx,
        booking_id: i64,
        priced_seats: &[(i64, Decimal)],
    ) -> Result<(), sqlx::Error> {
        for (seat_id, price_at_booking) in priced_seats {
            sqlx::query(
                "INSERT INTO booking_seats (booking_id, seat_id, price_at_booking) \
                 VALUES ($1, $2, $3)",
            )
            .bind(booking_id)
            .bind(*seat_id)
            .bind(*price_at_booking)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    // Условный декремент: ноль затронутых строк означает, что инвентарь
    // исчерпан конкурентным коммитом
    pub async fn decrement_available_seats(
        &self,
        tx: &mut StoreTx,
        event_id: i64,
        count: i32,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE events SET available_seats = available_seats - $2 \
             WHERE id = $1 AND available_seats >= $2",
        )
        .bind(event_id)
        .bind(count)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn increment_available_seats(
        &self,
        tx: &mut StoreTx,
        event_id: i64,
        count: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE events SET available_seats = available_seats + $2 WHERE id = $1")
            .bind(event_id)
            .bind(count)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    pub async fn update_seat_status(
        &self,
        tx: &mut StoreTx,
        seat_ids: &[i64],
        status: SeatStatus,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE seats SET status = $2 WHERE id = ANY($1)")
            .bind(seat_ids)
            .bind(status)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn find_booking(&self, booking_id: i64) -> Result<Option<Booking>, sqlx::Error> {
        let query = format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS);
        sqlx::query_as::<_, Booking>(&query)
            .bind(booking_id)
            .fetch_optional(&self.db.pool)
            .await
    }

    pub async fn find_booking_for_update(
        &self,
        tx: &mut StoreTx,
        booking_id: i64,
    ) -> Result<Option<Booking>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM bookings WHERE id = $1 FOR UPDATE",
            BOOKING_COLUMNS
        );
        sqlx::query_as::<_, Booking>(&query)
            .bind(booking_id)
            .fetch_optional(&mut **tx)
            .await
    }

    pub async fn find_booking_seats(
        &self,
        tx: &mut StoreTx,
        booking_id: i64,
    ) -> Result<Vec<BookingSeat>, sqlx::Error> {
        sqlx::query_as::<_, BookingSeat>(
            "SELECT id, booking_id, seat_id, price_at_booking \
             FROM booking_seats WHERE booking_id = $1 ORDER BY seat_id",
        )
        .bind(booking_id)
        .fetch_all(&mut **tx)
        .await
    }

    pub async fn confirm_booking(
        &self,
        tx: &mut StoreTx,
        booking_id: i64,
    ) -> Result<Booking, sqlx::Error> {
        let query = format!(
            "UPDATE bookings SET status = 'CONFIRMED', confirmed_at = NOW() \
             WHERE id = $1 \
             RETURNING {}",
            BOOKING_COLUMNS
        );
        sqlx::query_as::<_, Booking>(&query)
            .bind(booking_id)
            .fetch_one(&mut **tx)
            .await
    }

    pub async fn cancel_booking(
        &self,
        tx: &mut StoreTx,
        booking_id: i64,
        reason: Option<&str>,
    ) -> Result<Booking, sqlx::Error> {
        let query = format!(
            "UPDATE bookings SET status = 'CANCELLED', cancelled_at = NOW(), cancellation_reason = $2 \
             WHERE id = $1 \
             RETURNING {}",
            BOOKING_COLUMNS
        );
        sqlx::query_as::<_, Booking>(&query)
            .bind(booking_id)
            .bind(reason)
            .fetch_one(&mut **tx)
            .await
    }

    // Read path витрины доступности: свободные места площадки
    pub async fn available_seats_of_venue(
        &self,
        venue_id: i64,
    ) -> Result<Vec<Seat>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM seats \
             WHERE venue_id = $1 AND status = 'AVAILABLE' \
             ORDER BY section, \"row\", number",
            SEAT_COLUMNS
        );
        sqlx::query_as::<_, Seat>(&query)
            .bind(venue_id)
            .fetch_all(&self.db.pool)
            .await
    }
}
