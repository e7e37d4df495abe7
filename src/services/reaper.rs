//! Фоновая зачистка просроченных блокировок. Дублирует TTL хранилища,
//! поэтому сервис может не работать сколь угодно долго без потери
//! корректности.

use std::time::Duration;

use tracing::{error, info};

use crate::locks::LockRegistry;

pub struct LockReaper<R: LockRegistry> {
    registry: R,
    interval: Duration,
}

impl<R: LockRegistry> LockReaper<R> {
    pub fn new(registry: R, interval: Duration) -> Self {
        Self { registry, interval }
    }

    /// Один проход зачистки. Возвращает число убранных записей.
    pub async fn sweep_once(&self) -> u64 {
        match self.registry.reap_expired().await {
            Ok(0) => 0,
            Ok(reaped) => {
                info!("🧹 reaped {} expired seat locks", reaped);
                reaped
            }
            Err(e) => {
                error!("lock reaper sweep failed: {}", e);
                0
            }
        }
    }

    /// Бесконечный цикл зачистки; запускать в отдельной задаче.
    pub async fn run(self) {
        info!("Starting lock reaper, interval {:?}", self.interval);
        let mut tick = tokio::time::interval(self.interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            self.sweep_once().await;
        }
    }
}
