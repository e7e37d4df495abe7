use thiserror::Error;

/// Стабильные коды причин отказа для внешнего сервисного слоя.
/// Строки - контракт, менять нельзя.
pub mod reason {
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    pub const INVALID_LOCKS: &str = "INVALID_LOCKS";
    pub const EVENT_NOT_FOUND: &str = "EVENT_NOT_FOUND";
    pub const SALES_CLOSED: &str = "SALES_CLOSED";
    pub const SEATS_NOT_FOUND: &str = "SEATS_NOT_FOUND";
    pub const SEATS_NOT_AVAILABLE: &str = "SEATS_NOT_AVAILABLE";
    pub const BOOKING_NOT_FOUND: &str = "BOOKING_NOT_FOUND";
    pub const INVALID_STATUS: &str = "INVALID_STATUS";
    pub const ALREADY_CANCELLED: &str = "ALREADY_CANCELLED";
    pub const SYSTEM_ERROR: &str = "SYSTEM_ERROR";
}

/// Ошибки реестра блокировок.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("seat is already locked by another user")]
    AlreadyLocked,
    #[error("lock is expired or not owned by the caller")]
    InvalidLock,
    #[error("lock is not owned by the caller")]
    NotOwned,
    #[error("lock registry unavailable: {0}")]
    Transient(String),
}

/// Ошибки конвейера бронирования. Пользовательские варианты детерминированы
/// и не ретраятся; Store/Registry - транзиентные отказы инфраструктуры.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("one or more seat locks are invalid or expired")]
    InvalidLocks,
    #[error("event not found")]
    EventNotFound,
    #[error("ticket sales are closed")]
    SalesClosed,
    #[error("some of the requested seats do not exist")]
    SeatsNotFound,
    #[error("some of the requested seats are not available")]
    SeatsNotAvailable,
    #[error("booking not found")]
    BookingNotFound,
    #[error("booking status does not allow this operation")]
    InvalidStatus,
    #[error("booking is already cancelled")]
    AlreadyCancelled,
    #[error("durable store error: {0}")]
    Store(#[from] sqlx::Error),
    #[error("lock registry error: {0}")]
    Registry(String),
}

impl BookingError {
    /// Код причины для ответа внешнему слою.
    pub fn reason_code(&self) -> &'static str {
        match self {
            BookingError::InvalidRequest(_) => reason::INVALID_REQUEST,
            BookingError::InvalidLocks => reason::INVALID_LOCKS,
            BookingError::EventNotFound => reason::EVENT_NOT_FOUND,
            BookingError::SalesClosed => reason::SALES_CLOSED,
            BookingError::SeatsNotFound => reason::SEATS_NOT_FOUND,
            BookingError::SeatsNotAvailable => reason::SEATS_NOT_AVAILABLE,
            BookingError::BookingNotFound => reason::BOOKING_NOT_FOUND,
            BookingError::InvalidStatus => reason::INVALID_STATUS,
            BookingError::AlreadyCancelled => reason::ALREADY_CANCELLED,
            BookingError::Store(_) | BookingError::Registry(_) => reason::SYSTEM_ERROR,
        }
    }

    /// Транзиентный отказ: вызывающий может повторить запрос целиком.
    pub fn is_transient(&self) -> bool {
        matches!(self, BookingError::Store(_) | BookingError::Registry(_))
    }
}

/// Ошибки сборки ядра на старте.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("database connection failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("redis connection failed: {0}")]
    Redis(#[from] redis::RedisError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_errors_map_to_their_reason_codes() {
        assert_eq!(
            BookingError::InvalidRequest("x".to_string()).reason_code(),
            "INVALID_REQUEST"
        );
        assert_eq!(BookingError::InvalidLocks.reason_code(), "INVALID_LOCKS");
        assert_eq!(BookingError::EventNotFound.reason_code(), "EVENT_NOT_FOUND");
        assert_eq!(BookingError::SalesClosed.reason_code(), "SALES_CLOSED");
        assert_eq!(BookingError::SeatsNotFound.reason_code(), "SEATS_NOT_FOUND");
        assert_eq!(
            BookingError::SeatsNotAvailable.reason_code(),
            "SEATS_NOT_AVAILABLE"
        );
        assert_eq!(
            BookingError::BookingNotFound.reason_code(),
            "BOOKING_NOT_FOUND"
        );
        assert_eq!(BookingError::InvalidStatus.reason_code(), "INVALID_STATUS");
        assert_eq!(
            BookingError::AlreadyCancelled.reason_code(),
            "ALREADY_CANCELLED"
        );
    }

    #[test]
    fn infrastructure_errors_are_transient_system_errors() {
        let err = BookingError::Registry("connection refused".to_string());
        assert_eq!(err.reason_code(), "SYSTEM_ERROR");
        assert!(err.is_transient());

        let err = BookingError::Store(sqlx::Error::PoolClosed);
        assert_eq!(err.reason_code(), "SYSTEM_ERROR");
        assert!(err.is_transient());

        assert!(!BookingError::InvalidLocks.is_transient());
    }
}
