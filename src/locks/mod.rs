//! Реестр блокировок мест: короткоживущие эксклюзивные резервы во внешнем
//! TTL-хранилище. Клиент не держит локальных таблиц - единственный источник
//! истины о блокировках само хранилище.

mod redis;

pub use self::redis::RedisLockRegistry;

use crate::error::LockError;
use crate::models::SeatLock;

/// Контракт реестра блокировок. Каждая мутирующая операция несет полный
/// предикат владения в хранилище: между чтением и записью нет окна.
#[allow(async_fn_in_trait)]
pub trait LockRegistry: Send + Sync {
    /// Захватить место. Среди конкурентных вызовов ровно один победитель.
    async fn acquire(
        &self,
        seat_id: i64,
        event_id: i64,
        user_id: i64,
    ) -> Result<SeatLock, LockError>;

    /// Продлить свою блокировку. Возвращает новый expires_at (мс).
    /// После неудачного продления блокировку нельзя считать живой.
    async fn extend(&self, seat_id: i64, user_id: i64, lock_id: &str) -> Result<i64, LockError>;

    /// Снять свою блокировку.
    async fn release(&self, seat_id: i64, user_id: i64, lock_id: &str) -> Result<(), LockError>;

    /// Жива ли блокировка и принадлежит ли паре (user_id, lock_id).
    /// Недоступность реестра - ошибка, а не вердикт: вызывающий решает сам,
    /// чем ее обернуть (коммит отвечает SYSTEM_ERROR, не INVALID_LOCKS).
    async fn validate(
        &self,
        seat_id: i64,
        user_id: i64,
        lock_id: &str,
    ) -> Result<bool, LockError>;

    /// Есть ли живая блокировка на месте. При недоступности реестра - true:
    /// лучше спрятать свободное место, чем продать его дважды.
    async fn is_locked(&self, seat_id: i64) -> bool;

    /// Best-effort зачистка просроченных записей. Корректность от нее не
    /// зависит: TTL хранилища авторитетен.
    async fn reap_expired(&self) -> Result<u64, LockError>;
}
