use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use redis::AsyncCommands;
use tokio::time::timeout;
use tracing::warn;

use crate::config::LockConfig;
use crate::error::LockError;
use crate::models::SeatLock;
use crate::redis_client::RedisClient;

use super::LockRegistry;

// Условное обновление: переписать expires_at, только если запись принадлежит
// вызывающему. Предикат выполняется на стороне Redis.
const EXTEND_SCRIPT: &str = r#"
local raw = redis.call('GET', KEYS[1])
if not raw then return 0 end
local item = cjson.decode(raw)
if tostring(item.user_id) ~= ARGV[1] or item.lock_id ~= ARGV[2] then return 0 end
item.expires_at = tonumber(ARGV[3])
redis.call('SET', KEYS[1], cjson.encode(item), 'PX', ARGV[4])
return 1
"#;

// Условное удаление: снять запись, только если токен владения совпадает
const RELEASE_SCRIPT: &str = r#"
local raw = redis.call('GET', KEYS[1])
if not raw then return 0 end
local item = cjson.decode(raw)
if tostring(item.user_id) ~= ARGV[1] or item.lock_id ~= ARGV[2] then return 0 end
redis.call('DEL', KEYS[1])
return 1
"#;

/// Реестр блокировок поверх Redis. TTL ключа (PX) дублирует expires_at
/// записи, поэтому условный put "отсутствует или просрочен" сводится к
/// обычному SET NX: просроченные ключи для Redis не существуют.
#[derive(Clone)]
pub struct RedisLockRegistry {
    redis: RedisClient,
    table: String,
    ttl_ms: u64,
    op_timeout: Duration,
}

impl RedisLockRegistry {
    pub fn new(redis: RedisClient, config: &LockConfig) -> Self {
        Self {
            redis,
            table: config.table.clone(),
            ttl_ms: config.ttl_ms,
            op_timeout: Duration::from_millis(config.op_timeout_ms),
        }
    }

    fn key(&self, seat_id: i64) -> String {
        format!("{}:{}", self.table, seat_id)
    }

    // Каждая операция ограничена дедлайном; превышение - Transient
    async fn with_deadline<T>(
        &self,
        fut: impl Future<Output = Result<T, redis::RedisError>>,
    ) -> Result<T, LockError> {
        match timeout(self.op_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(LockError::Transient(e.to_string())),
            Err(_) => Err(LockError::Transient(
                "lock registry deadline exceeded".to_string(),
            )),
        }
    }
}

impl LockRegistry for RedisLockRegistry {
    async fn acquire(
        &self,
        seat_id: i64,
        event_id: i64,
        user_id: i64,
    ) -> Result<SeatLock, LockError> {
        let lock = SeatLock::issue(seat_id, event_id, user_id, self.ttl_ms);
        let payload =
            serde_json::to_string(&lock).map_err(|e| LockError::Transient(e.to_string()))?;
        let key = self.key(seat_id);
        let mut conn = self.redis.conn();

        // SET NX PX - одна атомарная операция, без ретраев внутри:
        // семантика NX сама выбирает единственного победителя
        let outcome: Option<String> = self
            .with_deadline(async {
                redis::cmd("SET")
                    .arg(&key)
                    .arg(&payload)
                    .arg("NX")
                    .arg("PX")
                    .arg(self.ttl_ms)
                    .query_async(&mut conn)
                    .await
            })
            .await?;

        match outcome {
            Some(_) => Ok(lock),
            None => Err(LockError::AlreadyLocked),
        }
    }

    async fn extend(&self, seat_id: i64, user_id: i64, lock_id: &str) -> Result<i64, LockError> {
        let key = self.key(seat_id);
        let new_expires_at = Utc::now().timestamp_millis() + self.ttl_ms as i64;
        let mut conn = self.redis.conn();
        let script = redis::Script::new(EXTEND_SCRIPT);

        let updated: i64 = self
            .with_deadline(async {
                script
                    .key(&key)
                    .arg(user_id)
                    .arg(lock_id)
                    .arg(new_expires_at)
                    .arg(self.ttl_ms)
                    .invoke_async(&mut conn)
                    .await
            })
            .await?;

        if updated == 1 {
            Ok(new_expires_at)
        } else {
            Err(LockError::InvalidLock)
        }
    }

    async fn release(&self, seat_id: i64, user_id: i64, lock_id: &str) -> Result<(), LockError> {
        let key = self.key(seat_id);
        let mut conn = self.redis.conn();
        let script = redis::Script::new(RELEASE_SCRIPT);

        let deleted: i64 = self
            .with_deadline(async {
                script
                    .key(&key)
                    .arg(user_id)
                    .arg(lock_id)
                    .invoke_async(&mut conn)
                    .await
            })
            .await?;

        if deleted == 1 {
            Ok(())
        } else {
            Err(LockError::NotOwned)
        }
    }

    async fn validate(
        &self,
        seat_id: i64,
        user_id: i64,
        lock_id: &str,
    ) -> Result<bool, LockError> {
        let key = self.key(seat_id);
        let mut conn = self.redis.conn();

        let raw: Option<String> = self.with_deadline(conn.get(&key)).await?;
        Ok(
            match raw.and_then(|data| serde_json::from_str::<SeatLock>(&data).ok()) {
                Some(lock) => {
                    lock.is_owned_by(user_id, lock_id)
                        && lock.is_live(Utc::now().timestamp_millis())
                }
                None => false,
            },
        )
    }

    async fn is_locked(&self, seat_id: i64) -> bool {
        let key = self.key(seat_id);
        let mut conn = self.redis.conn();

        match self.with_deadline(conn.exists(&key)).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!("is_locked for seat {} failed, assuming locked: {}", seat_id, e);
                true
            }
        }
    }

    async fn reap_expired(&self) -> Result<u64, LockError> {
        let pattern = format!("{}:*", self.table);
        let mut conn = self.redis.conn();

        let keys: Vec<String> = self
            .with_deadline(async {
                redis::cmd("KEYS")
                    .arg(&pattern)
                    .query_async(&mut conn)
                    .await
            })
            .await?;
        if keys.is_empty() {
            return Ok(0);
        }

        let mut reads = redis::pipe();
        for key in &keys {
            reads.get(key);
        }
        let values: Vec<Option<String>> = self
            .with_deadline(async { reads.query_async(&mut conn).await })
            .await?;

        // Redis обычно успевает сам; сюда попадает только рассинхрон TTL
        // и мусорные записи
        let now = Utc::now().timestamp_millis();
        let mut expired: Vec<&String> = Vec::new();
        for (key, raw) in keys.iter().zip(values) {
            if let Some(raw) = raw {
                match serde_json::from_str::<SeatLock>(&raw) {
                    Ok(lock) if lock.is_live(now) => {}
                    _ => expired.push(key),
                }
            }
        }
        if expired.is_empty() {
            return Ok(0);
        }

        let mut deletes = redis::pipe();
        for key in &expired {
            deletes.del(*key);
        }
        self.with_deadline(async { deletes.query_async::<_, ()>(&mut conn).await })
            .await?;

        Ok(expired.len() as u64)
    }
}
