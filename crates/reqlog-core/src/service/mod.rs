//! Logging services
//!
//! Formatting, rotating channels, the logger facade and the daily scheduler.

mod channel;
pub mod formatter;
mod logger;
mod rotation_scheduler;

pub use channel::*;
pub use formatter::render;
pub use logger::Logger;
pub use rotation_scheduler::{until_next_midnight, RotationScheduler, RotationSummary};
