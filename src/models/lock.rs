use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Запись реестра блокировок. Живет только в Redis; TTL ключа совпадает
// с expires_at, поэтому найденная запись почти всегда жива.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatLock {
    pub seat_id: i64,
    pub event_id: i64,
    pub user_id: i64,
    pub lock_id: String,
    pub created_at: i64,
    pub expires_at: i64,
}

impl SeatLock {
    /// Новая блокировка со свежим случайным токеном владения.
    pub fn issue(seat_id: i64, event_id: i64, user_id: i64, ttl_ms: u64) -> Self {
        let now = Utc::now().timestamp_millis();
        SeatLock {
            seat_id,
            event_id,
            user_id,
            lock_id: Uuid::new_v4().simple().to_string(),
            created_at: now,
            expires_at: now + ttl_ms as i64,
        }
    }

    pub fn is_live(&self, now_ms: i64) -> bool {
        self.expires_at > now_ms
    }

    pub fn is_owned_by(&self, user_id: i64, lock_id: &str) -> bool {
        self.user_id == user_id && self.lock_id == lock_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_lock_has_fresh_token_and_future_expiry() {
        let lock = SeatLock::issue(1, 2, 3, 300_000);
        assert_eq!(lock.lock_id.len(), 32);
        assert!(lock.expires_at > lock.created_at);
        assert_eq!(lock.expires_at - lock.created_at, 300_000);

        let other = SeatLock::issue(1, 2, 3, 300_000);
        assert_ne!(lock.lock_id, other.lock_id);
    }

    #[test]
    fn liveness_boundary_is_exclusive() {
        let lock = SeatLock::issue(1, 2, 3, 1000);
        assert!(lock.is_live(lock.expires_at - 1));
        assert!(!lock.is_live(lock.expires_at));
        assert!(!lock.is_live(lock.expires_at + 1));
    }

    #[test]
    fn ownership_requires_both_user_and_token() {
        let lock = SeatLock::issue(1, 2, 3, 1000);
        assert!(lock.is_owned_by(3, &lock.lock_id));
        assert!(!lock.is_owned_by(4, &lock.lock_id));
        assert!(!lock.is_owned_by(3, "deadbeef"));
    }
}
