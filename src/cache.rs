//! Кеш доступности и хук инвалидации. Авторитетный ответ всегда в
//! реляционном хранилище: кеш отвечает быстро и имеет право отставать
//! на одну инвалидацию.

use redis::AsyncCommands;
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::{Event, Seat};
use crate::redis_client::RedisClient;
use crate::store::StoreGateway;

/// Что именно изменилось у события.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationScope {
    EventMeta,
    SeatAvailability,
}

/// Односторонний сигнал кешу об изменении. Координатор не ждет порядка
/// доставки и не повторяет неудачные инвалидации.
#[allow(async_fn_in_trait)]
pub trait InvalidationHook: Send + Sync {
    async fn invalidate(&self, event_id: i64, scope: InvalidationScope);
}

#[derive(Clone)]
pub struct AvailabilityCache {
    redis: RedisClient,
    store: StoreGateway,
    lock_table: String,
    seats_ttl_secs: u64,
    events_ttl_secs: u64,
}

impl AvailabilityCache {
    pub fn new(redis: RedisClient, store: StoreGateway, config: &Config) -> Self {
        Self {
            redis,
            store,
            lock_table: config.lock.table.clone(),
            seats_ttl_secs: config.cache.seats_ttl_secs,
            events_ttl_secs: config.cache.events_ttl_secs,
        }
    }

    fn seats_key(event_id: i64) -> String {
        format!("seats:{}", event_id)
    }

    fn event_key(event_id: i64) -> String {
        format!("event:{}", event_id)
    }

    fn lock_key(&self, seat_id: i64) -> String {
        format!("{}:{}", self.lock_table, seat_id)
    }

    /// Свободные места события с учетом живых блокировок.
    /// Фильтр по блокировкам - приближение для витрины; дефицит авторитетно
    /// перепроверяется на коммите.
    pub async fn available_seats(&self, event_id: i64) -> Vec<Seat> {
        // Сначала пробуем кеш
        if let Ok(Some(mut seats)) = self.seats_from_cache(event_id).await {
            self.drop_locked(&mut seats).await;
            return seats;
        }

        // Если кеш не помог - идем в БД
        match self.load_seats_from_db(event_id).await {
            Ok(mut seats) => {
                let _ = self.save_seats_to_cache(event_id, &seats).await;
                self.drop_locked(&mut seats).await;
                seats
            }
            Err(e) => {
                warn!("failed to load seats for event {}: {}", event_id, e);
                Vec::new()
            }
        }
    }

    /// Метаданные события, read-through.
    pub async fn event_meta(&self, event_id: i64) -> Option<Event> {
        if let Ok(Some(event)) = self.event_from_cache(event_id).await {
            return Some(event);
        }

        match self.store.find_event(event_id).await {
            Ok(Some(event)) => {
                let _ = self.save_event_to_cache(&event).await;
                Some(event)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("failed to load event {}: {}", event_id, e);
                None
            }
        }
    }

    async fn load_seats_from_db(&self, event_id: i64) -> Result<Vec<Seat>, sqlx::Error> {
        let event = match self.store.find_event(event_id).await? {
            Some(event) => event,
            None => return Ok(Vec::new()),
        };
        self.store.available_seats_of_venue(event.venue_id).await
    }

    // === Работа с кешем ===

    async fn seats_from_cache(
        &self,
        event_id: i64,
    ) -> Result<Option<Vec<Seat>>, redis::RedisError> {
        let mut conn = self.redis.conn();
        let data: Option<String> = conn.get(Self::seats_key(event_id)).await?;
        Ok(data.and_then(|d| serde_json::from_str(&d).ok()))
    }

    async fn save_seats_to_cache(
        &self,
        event_id: i64,
        seats: &[Seat],
    ) -> Result<(), redis::RedisError> {
        let data = serde_json::to_string(seats).map_err(|_| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "Serialize error"))
        })?;
        let mut conn = self.redis.conn();
        conn.set_ex(Self::seats_key(event_id), data, self.seats_ttl_secs)
            .await
    }

    async fn event_from_cache(&self, event_id: i64) -> Result<Option<Event>, redis::RedisError> {
        let mut conn = self.redis.conn();
        let data: Option<String> = conn.get(Self::event_key(event_id)).await?;
        Ok(data.and_then(|d| serde_json::from_str(&d).ok()))
    }

    async fn save_event_to_cache(&self, event: &Event) -> Result<(), redis::RedisError> {
        let data = serde_json::to_string(event).map_err(|_| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "Serialize error"))
        })?;
        let mut conn = self.redis.conn();
        conn.set_ex(Self::event_key(event.id), data, self.events_ttl_secs)
            .await
    }

    // === Утилиты ===

    // Убрать из выдачи места с живыми блокировками (пайплайн EXISTS).
    // Если реестр недоступен, прячем все: лучше пустая витрина, чем
    // место, которое не удастся купить.
    async fn drop_locked(&self, seats: &mut Vec<Seat>) {
        if seats.is_empty() {
            return;
        }
        let mut conn = self.redis.conn();
        let mut pipe = redis::pipe();
        for seat in seats.iter() {
            pipe.exists(self.lock_key(seat.id));
        }

        let locked: Vec<bool> = match pipe.query_async(&mut conn).await {
            Ok(flags) => flags,
            Err(e) => {
                warn!("lock overlay failed for availability read: {}", e);
                seats.clear();
                return;
            }
        };

        let mut flags = locked.into_iter();
        seats.retain(|_| !flags.next().unwrap_or(true));
    }
}

impl InvalidationHook for AvailabilityCache {
    async fn invalidate(&self, event_id: i64, scope: InvalidationScope) {
        let key = match scope {
            InvalidationScope::SeatAvailability => Self::seats_key(event_id),
            InvalidationScope::EventMeta => Self::event_key(event_id),
        };
        let mut conn = self.redis.conn();
        match conn.del::<_, ()>(&key).await {
            Ok(()) => debug!("invalidated {} for event {}", key, event_id),
            Err(e) => warn!("cache invalidation for event {} failed: {}", event_id, e),
        }
    }
}
