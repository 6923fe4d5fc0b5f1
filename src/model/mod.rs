// File: ./src/model/mod.rs
pub mod adapter;
pub mod booking;
pub mod interval;
pub mod property;

pub use adapter::IcsAdapter;
pub use booking::{Booking, BookingKey, BookingStatus, BookingUpsert};
pub use interval::{Interval, ParsedEvent, same_slot};
pub use property::{CalendarSource, Property};
