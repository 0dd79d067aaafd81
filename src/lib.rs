//! Availability resolution and booking grid for meeting scheduling.
//!
//! A [`board::Board`] loads staff, availability windows and meetings from its
//! collaborators into an immutable [`board::Snapshot`]; the time axis, the
//! bookable staff per slot, the occupancy groups and the staff columns are all
//! derived from that snapshot on demand. Rescheduling writes through the
//! [`source::BookingStore`] and patches the snapshot in place.

pub mod board;
pub mod config;
pub mod context;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod refresher;
pub mod source;
pub mod store;
