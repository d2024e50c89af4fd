//! Traits and types used by all components of the emulator.

pub mod bus;
pub mod checksum;
pub mod debug_events;
pub mod image;
pub mod logging;
pub mod save_state;
pub mod util;
