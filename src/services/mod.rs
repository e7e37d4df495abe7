pub mod booking;
pub mod locks;
pub mod reaper;

pub use booking::{BookingResult, BookingService, CreateBookingRequest};
pub use locks::{LockResponse, LockService};
pub use reaper::LockReaper;
