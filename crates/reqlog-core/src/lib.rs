//! # Reqlog Core Library
//!
//! The logging pipeline behind the Reqlog gateway.
//!
//! ## Modules
//!
//! - `domain` - Log records, levels, channel kinds and rotation configuration
//! - `service` - Formatter, rotating channels, logger facade and rotation scheduler
//! - `clock` - Injectable wall clock used for every date decision

pub mod clock;
pub mod domain;
pub mod service;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use domain::*;
pub use service::*;
