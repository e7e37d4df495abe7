//! Сервисный слой над реестром блокировок. Транспорт снаружи любой:
//! сервис отдает готовые DTO с success-флагом и сообщением оператору.

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::LockError;
use crate::locks::LockRegistry;

/// Ответ операций с блокировками.
#[derive(Debug, Clone, Serialize)]
pub struct LockResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl LockResponse {
    fn ok(lock_id: String, expires_at: i64) -> Self {
        LockResponse {
            success: true,
            lock_id: Some(lock_id),
            expires_at: Some(expires_at),
            message: None,
        }
    }

    fn fail(message: &str) -> Self {
        LockResponse {
            success: false,
            lock_id: None,
            expires_at: None,
            message: Some(message.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct LockService<R: LockRegistry> {
    registry: R,
}

impl<R: LockRegistry> LockService<R> {
    pub fn new(registry: R) -> Self {
        Self { registry }
    }

    /// Захватить место для пользователя.
    pub async fn acquire_lock(&self, seat_id: i64, event_id: i64, user_id: i64) -> LockResponse {
        match self.registry.acquire(seat_id, event_id, user_id).await {
            Ok(lock) => LockResponse::ok(lock.lock_id, lock.expires_at),
            Err(LockError::AlreadyLocked) => {
                LockResponse::fail("Место уже заблокировано другим пользователем")
            }
            Err(e) => {
                warn!("acquire_lock for seat {} failed: {}", seat_id, e);
                LockResponse::fail("Реестр блокировок временно недоступен")
            }
        }
    }

    /// Продлить свою блокировку. После неудачного продления блокировку
    /// нельзя считать живой.
    pub async fn extend_lock(&self, seat_id: i64, user_id: i64, lock_id: &str) -> LockResponse {
        match self.registry.extend(seat_id, user_id, lock_id).await {
            Ok(new_expires_at) => LockResponse::ok(lock_id.to_string(), new_expires_at),
            Err(LockError::InvalidLock) => {
                LockResponse::fail("Блокировка истекла или принадлежит другому пользователю")
            }
            Err(e) => {
                warn!("extend_lock for seat {} failed: {}", seat_id, e);
                LockResponse::fail("Реестр блокировок временно недоступен")
            }
        }
    }

    /// Снять свою блокировку.
    pub async fn release_lock(&self, seat_id: i64, user_id: i64, lock_id: &str) -> bool {
        match self.registry.release(seat_id, user_id, lock_id).await {
            Ok(()) => true,
            Err(LockError::NotOwned) => {
                debug!("release_lock for seat {}: not owned", seat_id);
                false
            }
            Err(e) => {
                warn!("release_lock for seat {} failed: {}", seat_id, e);
                false
            }
        }
    }
}
