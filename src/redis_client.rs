use redis::{aio::MultiplexedConnection, Client};

// Одно мультиплексированное соединение на процесс; каждая операция работает
// с дешевым клоном
#[derive(Clone)]
pub struct RedisClient {
    conn: MultiplexedConnection,
}

impl RedisClient {
    /// Подключиться и сразу проверить соединение: битый эндпоинт должен
    /// валить старт ядра, а не первую операцию под нагрузкой.
    pub async fn new(redis_url: &str) -> redis::RedisResult<Self> {
        let client = Client::open(redis_url)?;
        let mut conn = client.get_multiplexed_tokio_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(RedisClient { conn })
    }

    // Соединение не отдается наружу по ссылке: реестр и кеш берут клон
    // на каждую операцию и не могут удерживать его через await-границы
    pub fn conn(&self) -> MultiplexedConnection {
        self.conn.clone()
    }
}
