use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::time::Duration;

use crate::config::DatabaseConfig;

#[derive(Clone)]
pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        // Дедлайн на каждый запрос ставит сам сервер: зависший стейтмент
        // обрывается как query_canceled и наверх уходит типизированной ошибкой
        let connect_options = config
            .url
            .parse::<PgConnectOptions>()?
            .options([("statement_timeout", config.op_timeout_ms.to_string())]);

        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(Duration::from_millis(config.op_timeout_ms))
            .idle_timeout(Duration::from_secs(300))
            .connect_with(connect_options)
            .await?;

        Ok(Database { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/migrations")
            .run(&self.pool)
            .await?;
        Ok(())
    }
}
