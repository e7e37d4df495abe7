pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod locks;
pub mod models;
pub mod redis_client;
pub mod services;
pub mod store;

use crate::cache::AvailabilityCache;
use crate::config::Config;
use crate::database::Database;
use crate::error::InitError;
use crate::locks::RedisLockRegistry;
use crate::redis_client::RedisClient;
use crate::services::{BookingService, LockService};
use crate::store::StoreGateway;

// Собранное ядро бронирования. Внешний слой (HTTP, GraphQL, RPC) владеет
// этим экземпляром и зовет сервисы напрямую, без глобальных синглтонов.
#[derive(Clone)]
pub struct AppCore {
    pub config: Config,
    pub db: Database,
    pub locks: LockService<RedisLockRegistry>,
    pub bookings: BookingService<RedisLockRegistry, AvailabilityCache>,
    pub cache: AvailabilityCache,
}

impl AppCore {
    pub async fn new(config: Config) -> Result<Self, InitError> {
        let db = Database::new(&config.database).await?;

        // Реестр блокировок и кеш доступности могут жить на разных инстансах
        let registry_redis = RedisClient::new(&config.lock.registry_url).await?;
        let cache_redis = RedisClient::new(&config.cache.url).await?;

        let registry = RedisLockRegistry::new(registry_redis, &config.lock);
        let store = StoreGateway::new(db.clone());
        let cache = AvailabilityCache::new(cache_redis, store.clone(), &config);

        let locks = LockService::new(registry.clone());
        let bookings = BookingService::new(registry, store, cache.clone());

        Ok(AppCore {
            config,
            db,
            locks,
            bookings,
            cache,
        })
    }
}
