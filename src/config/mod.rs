use serde::Deserialize;
use std::env;

// Главная структура конфигурации - контейнер для всех настроек ядра.
// Читается один раз на старте; дальше только передается по ссылке.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub lock: LockConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
}

// Настройки реестра блокировок мест
#[derive(Debug, Clone, Deserialize)]
pub struct LockConfig {
    pub registry_url: String,
    pub table: String,
    pub ttl_ms: u64,
    pub op_timeout_ms: u64,
}

// Настройки базы данных
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
    pub op_timeout_ms: u64,
}

// Настройки кеша доступности
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub url: String,
    pub seats_ttl_secs: u64,
    pub events_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Config {
            lock: LockConfig {
                registry_url: env::var("LOCK_REGISTRY_URL")
                    .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
                table: env::var("LOCK_TABLE").unwrap_or_else(|_| "seat-locks".to_string()),
                ttl_ms: env::var("LOCK_TTL_MS")
                    .unwrap_or_else(|_| "300000".to_string())
                    .parse()
                    .expect("LOCK_TTL_MS must be a valid number"),
                op_timeout_ms: env::var("LOCK_REGISTRY_TIMEOUT_MS")
                    .unwrap_or_else(|_| "5000".to_string())
                    .parse()
                    .expect("LOCK_REGISTRY_TIMEOUT_MS must be a valid number"),
            },
            database: DatabaseConfig {
                url: env::var("DB_URL").expect("DB_URL must be set"),
                pool_size: env::var("DB_POOL_SIZE")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()
                    .expect("DB_POOL_SIZE must be a valid number"),
                op_timeout_ms: env::var("DB_TIMEOUT_MS")
                    .unwrap_or_else(|_| "10000".to_string())
                    .parse()
                    .expect("DB_TIMEOUT_MS must be a valid number"),
            },
            cache: CacheConfig {
                url: env::var("CACHE_URL")
                    .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
                seats_ttl_secs: env::var("CACHE_SEATS_TTL_SECS")
                    .unwrap_or_else(|_| "86400".to_string())
                    .parse()
                    .expect("CACHE_SEATS_TTL_SECS must be a valid number"),
                events_ttl_secs: env::var("CACHE_EVENTS_TTL_SECS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()
                    .expect("CACHE_EVENTS_TTL_SECS must be a valid number"),
            },
        }
    }
}
