pub mod booking;
pub mod event;
pub mod lock;
pub mod seat;

pub use booking::{Booking, BookingSeat, BookingStatus};
pub use event::{Event, EventStatus};
pub use lock::SeatLock;
pub use seat::{Seat, SeatStatus};
