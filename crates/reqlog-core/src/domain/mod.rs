//! Domain types for the logging pipeline
//!
//! - Records and levels (LogRecord, LogLevel, Metadata)
//! - Channel kinds and routing (ChannelKind)
//! - Configuration (LogConfig, RotationPolicy)

mod channel;
pub mod config;
mod log_record;

pub use channel::*;
pub use config::*;
pub use log_record::*;
