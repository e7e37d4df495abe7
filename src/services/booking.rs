//! booking.rs
//!
//! Координатор коммита бронирования: превращает набор живых блокировок
//! в долговечную запись о покупке.
//!
//! Последовательность коммита:
//! 1.  Предварительная проверка блокировок вне транзакции - дешевый отсев
//!     заведомо мертвых запросов.
//! 2.  Транзакция: событие и места под `FOR UPDATE`, повторная проверка
//!     блокировок, вставка брони, условный декремент инвентаря, перевод
//!     мест в BOOKED.
//! 3.  После коммита: best-effort снятие блокировок и инвалидация кеша.
//!     Их неудача покупку не откатывает - TTL и инвалидация догонят.

use chrono::Utc;
use futures::future::join_all;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::cache::{InvalidationHook, InvalidationScope};
use crate::error::BookingError;
use crate::locks::LockRegistry;
use crate::models::{Booking, BookingStatus, Seat, SeatStatus};
use crate::store::StoreGateway;

/// Запрос на создание брони: пары (место, блокировка) одного пользователя.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingRequest {
    pub user_id: i64,
    pub event_id: i64,
    pub seat_ids: Vec<i64>,
    pub lock_ids: Vec<String>,
    pub payment_intent_id: Option<String>,
}

/// Результат операции над бронированием.
#[derive(Debug, Serialize)]
pub struct BookingResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking: Option<Booking>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<&'static str>,
}

impl BookingResult {
    fn ok(booking: Booking) -> Self {
        BookingResult {
            success: true,
            booking: Some(booking),
            failure_reason: None,
        }
    }

    fn fail(err: &BookingError) -> Self {
        BookingResult {
            success: false,
            booking: None,
            failure_reason: Some(err.reason_code()),
        }
    }
}

#[derive(Clone)]
pub struct BookingService<R: LockRegistry, H: InvalidationHook> {
    registry: R,
    store: StoreGateway,
    hook: H,
}

impl<R: LockRegistry, H: InvalidationHook> BookingService<R, H> {
    pub fn new(registry: R, store: StoreGateway, hook: H) -> Self {
        Self {
            registry,
            store,
            hook,
        }
    }

    /// Создать бронь по набору живых блокировок. Атомарно для всего набора:
    /// либо проданы все места, либо ни одного.
    pub async fn create_booking(&self, request: CreateBookingRequest) -> BookingResult {
        match self.commit(&request).await {
            Ok(booking) => {
                info!(
                    "booking {} committed: user {}, event {}, {} seats",
                    booking.id,
                    booking.user_id,
                    booking.event_id,
                    request.seat_ids.len()
                );
                BookingResult::ok(booking)
            }
            Err(e) => {
                if e.is_transient() {
                    error!("create_booking failed: {}", e);
                }
                BookingResult::fail(&e)
            }
        }
    }

    async fn commit(&self, request: &CreateBookingRequest) -> Result<Booking, BookingError> {
        validate_request(request)?;

        // Дешевый отсев вне транзакции; авторитетная проверка повторится
        // внутри нее
        self.validate_locks(request).await?;

        let mut tx = self.store.begin().await?;

        let event = match self.store.find_event_for_update(&mut tx, request.event_id).await? {
            Some(event) => event,
            None => {
                let _ = tx.rollback().await;
                return Err(BookingError::EventNotFound);
            }
        };
        if !event.can_purchase_tickets(Utc::now()) {
            let _ = tx.rollback().await;
            return Err(BookingError::SalesClosed);
        }

        let mut ordered_seat_ids = request.seat_ids.clone();
        ordered_seat_ids.sort_unstable();
        let seats = self
            .store
            .find_seats_for_update(&mut tx, &ordered_seat_ids)
            .await?;
        if seats.len() != ordered_seat_ids.len() {
            let _ = tx.rollback().await;
            return Err(BookingError::SeatsNotFound);
        }
        if seats.iter().any(|s| s.status != SeatStatus::Available) {
            // Защита в глубину: место могли продать по чужой, уже истекшей
            // блокировке
            let _ = tx.rollback().await;
            return Err(BookingError::SeatsNotAvailable);
        }

        // Повторная проверка уже под строчными блокировками БД: окно гонки
        // сжимается до (чтение реестра - commit), много короче TTL
        if let Err(e) = self.validate_locks(request).await {
            let _ = tx.rollback().await;
            return Err(e);
        }

        let total = total_price(event.base_price, &seats);
        let booking = self
            .store
            .insert_booking(
                &mut tx,
                request.user_id,
                request.event_id,
                total,
                request.payment_intent_id.as_deref(),
            )
            .await?;

        let priced: Vec<(i64, Decimal)> = seats
            .iter()
            .map(|s| (s.id, seat_price(event.base_price, s)))
            .collect();
        self.store
            .insert_booking_seats(&mut tx, booking.id, &priced)
            .await?;

        let count = seats.len() as i32;
        if !self
            .store
            .decrement_available_seats(&mut tx, event.id, count)
            .await?
        {
            // Все проверки прошли, а инвентаря нет: вместимость события
            // разошлась с набором мест
            warn!(
                "inventory decrement failed for event {} with {} valid locks held",
                event.id, count
            );
            let _ = tx.rollback().await;
            return Err(BookingError::SalesClosed);
        }

        self.store
            .update_seat_status(&mut tx, &ordered_seat_ids, SeatStatus::Booked)
            .await?;

        tx.commit().await?;

        // Блокировки и кеш после коммита, best-effort
        self.release_locks(request).await;
        self.hook
            .invalidate(request.event_id, InvalidationScope::SeatAvailability)
            .await;

        Ok(booking)
    }

    /// Подтвердить оплаченную бронь по идентификатору платежа.
    pub async fn confirm_booking(&self, booking_id: i64, payment_intent_id: &str) -> BookingResult {
        match self.confirm(booking_id, payment_intent_id).await {
            Ok(booking) => {
                info!("booking {} confirmed", booking.id);
                BookingResult::ok(booking)
            }
            Err(e) => {
                if e.is_transient() {
                    error!("confirm_booking {} failed: {}", booking_id, e);
                }
                BookingResult::fail(&e)
            }
        }
    }

    async fn confirm(
        &self,
        booking_id: i64,
        payment_intent_id: &str,
    ) -> Result<Booking, BookingError> {
        let mut tx = self.store.begin().await?;

        let booking = match self.store.find_booking_for_update(&mut tx, booking_id).await? {
            Some(booking) => booking,
            None => {
                let _ = tx.rollback().await;
                return Err(BookingError::BookingNotFound);
            }
        };
        if booking.status != BookingStatus::Pending
            || booking.payment_intent_id.as_deref() != Some(payment_intent_id)
        {
            let _ = tx.rollback().await;
            return Err(BookingError::InvalidStatus);
        }

        let confirmed = self.store.confirm_booking(&mut tx, booking_id).await?;
        tx.commit().await?;
        Ok(confirmed)
    }

    /// Отменить бронь владельца: места возвращаются в продажу, инвентарь
    /// восстанавливается. Все в одной транзакции.
    pub async fn cancel_booking(
        &self,
        booking_id: i64,
        user_id: i64,
        reason: Option<&str>,
    ) -> BookingResult {
        match self.cancel(booking_id, user_id, reason).await {
            Ok(booking) => {
                info!("booking {} cancelled by user {}", booking.id, user_id);
                BookingResult::ok(booking)
            }
            Err(e) => {
                if e.is_transient() {
                    error!("cancel_booking {} failed: {}", booking_id, e);
                }
                BookingResult::fail(&e)
            }
        }
    }

    async fn cancel(
        &self,
        booking_id: i64,
        user_id: i64,
        reason: Option<&str>,
    ) -> Result<Booking, BookingError> {
        let mut tx = self.store.begin().await?;

        // Чужая бронь неотличима от несуществующей
        let booking = match self.store.find_booking_for_update(&mut tx, booking_id).await? {
            Some(booking) if booking.user_id == user_id => booking,
            _ => {
                let _ = tx.rollback().await;
                return Err(BookingError::BookingNotFound);
            }
        };
        if booking.status == BookingStatus::Cancelled {
            let _ = tx.rollback().await;
            return Err(BookingError::AlreadyCancelled);
        }
        if !booking.status.can_cancel() {
            let _ = tx.rollback().await;
            return Err(BookingError::InvalidStatus);
        }

        let booked = self.store.find_booking_seats(&mut tx, booking_id).await?;
        let seat_ids: Vec<i64> = booked.iter().map(|bs| bs.seat_id).collect();
        if !seat_ids.is_empty() {
            self.store
                .update_seat_status(&mut tx, &seat_ids, SeatStatus::Available)
                .await?;
            self.store
                .increment_available_seats(&mut tx, booking.event_id, seat_ids.len() as i32)
                .await?;
        }
        let cancelled = self.store.cancel_booking(&mut tx, booking_id, reason).await?;
        tx.commit().await?;

        self.hook
            .invalidate(booking.event_id, InvalidationScope::SeatAvailability)
            .await;

        Ok(cancelled)
    }

    // Проверка всех пар (место, блокировка) параллельно. Провал проверки -
    // ошибка пользователя; недоступный реестр - транзиентный отказ, с ним
    // блокировки остаются у вызывающего и запрос можно повторить
    async fn validate_locks(&self, request: &CreateBookingRequest) -> Result<(), BookingError> {
        let checks = request
            .seat_ids
            .iter()
            .zip(request.lock_ids.iter())
            .map(|(seat_id, lock_id)| self.registry.validate(*seat_id, request.user_id, lock_id));
        let results = join_all(checks).await;

        if results.iter().any(|r| matches!(r, Ok(false))) {
            return Err(BookingError::InvalidLocks);
        }
        if let Some(Err(e)) = results.into_iter().find(|r| r.is_err()) {
            return Err(BookingError::Registry(e.to_string()));
        }
        Ok(())
    }

    // Снятие блокировок после коммита. Неудача не страшна: TTL добьет
    async fn release_locks(&self, request: &CreateBookingRequest) {
        let releases = request
            .seat_ids
            .iter()
            .zip(request.lock_ids.iter())
            .map(|(seat_id, lock_id)| async move {
                if let Err(e) = self
                    .registry
                    .release(*seat_id, request.user_id, lock_id)
                    .await
                {
                    debug!("post-commit release of seat {} lock: {}", seat_id, e);
                }
            });
        join_all(releases).await;
    }
}

// Пустой набор, разная длина и дубликаты отсекаются до любых обращений
// к хранилищам
fn validate_request(request: &CreateBookingRequest) -> Result<(), BookingError> {
    if request.seat_ids.is_empty() {
        return Err(BookingError::InvalidRequest(
            "seat_ids must not be empty".to_string(),
        ));
    }
    if request.seat_ids.len() != request.lock_ids.len() {
        return Err(BookingError::InvalidRequest(
            "seat_ids and lock_ids must have the same length".to_string(),
        ));
    }
    let mut sorted = request.seat_ids.clone();
    sorted.sort_unstable();
    if sorted.windows(2).any(|pair| pair[0] == pair[1]) {
        return Err(BookingError::InvalidRequest(
            "seat_ids must not contain duplicates".to_string(),
        ));
    }
    Ok(())
}

// Цена места: базовая цена события с коэффициентом места
fn seat_price(base_price: Decimal, seat: &Seat) -> Decimal {
    (base_price * seat.price_modifier)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

// Итог брони: банковское округление суммы, а не сумма округлений
fn total_price(base_price: Decimal, seats: &[Seat]) -> Decimal {
    let sum: Decimal = seats
        .iter()
        .map(|s| base_price * s.price_modifier)
        .sum();
    sum.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request(seat_ids: Vec<i64>, lock_ids: Vec<&str>) -> CreateBookingRequest {
        CreateBookingRequest {
            user_id: 7,
            event_id: 1,
            seat_ids,
            lock_ids: lock_ids.into_iter().map(String::from).collect(),
            payment_intent_id: None,
        }
    }

    fn seat(id: i64, price_modifier: Decimal) -> Seat {
        Seat {
            id,
            venue_id: 1,
            section: "A".to_string(),
            row: 1,
            number: id as i32,
            seat_type: "REGULAR".to_string(),
            status: SeatStatus::Available,
            price_modifier,
        }
    }

    #[test]
    fn empty_seat_set_is_rejected() {
        assert!(matches!(
            validate_request(&request(vec![], vec![])),
            Err(BookingError::InvalidRequest(_))
        ));
    }

    #[test]
    fn seat_and_lock_counts_must_match() {
        assert!(matches!(
            validate_request(&request(vec![1, 2], vec!["a"])),
            Err(BookingError::InvalidRequest(_))
        ));
    }

    #[test]
    fn duplicate_seats_are_rejected() {
        assert!(matches!(
            validate_request(&request(vec![1, 2, 1], vec!["a", "b", "c"])),
            Err(BookingError::InvalidRequest(_))
        ));
    }

    #[test]
    fn well_formed_request_passes() {
        assert!(validate_request(&request(vec![3, 1, 2], vec!["a", "b", "c"])).is_ok());
    }

    #[test]
    fn total_is_sum_of_modified_prices() {
        let seats = vec![seat(1, dec!(1.0)), seat(2, dec!(1.5)), seat(3, dec!(2.0))];
        assert_eq!(total_price(dec!(100.00), &seats), dec!(450.00));
    }

    #[test]
    fn total_uses_bankers_rounding_at_the_sum() {
        // 3 x 11.115 = 33.345 -> к четной: 33.34
        let seats = vec![seat(1, dec!(1.0)), seat(2, dec!(1.0)), seat(3, dec!(1.0))];
        assert_eq!(total_price(dec!(11.115), &seats), dec!(33.34));

        // 33.335 -> к четной: 33.34, а усечение дало бы 33.33
        let one = vec![seat(1, dec!(1.0))];
        assert_eq!(total_price(dec!(33.335), &one), dec!(33.34));
        assert_eq!(total_price(dec!(33.325), &one), dec!(33.32));
    }

    #[test]
    fn per_seat_price_records_the_modifier() {
        assert_eq!(seat_price(dec!(100.00), &seat(1, dec!(1.5))), dec!(150.00));
        assert_eq!(seat_price(dec!(99.99), &seat(1, dec!(1.0))), dec!(99.99));
        // 10.005 -> к четной: 10.00
        assert_eq!(seat_price(dec!(10.005), &seat(1, dec!(1.0))), dec!(10.00));
    }
}
