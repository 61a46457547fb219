//! Line rendering per channel
//!
//! All renderers are infallible. Metadata is already plain JSON by the time it
//! reaches a record, so encoding it cannot fail.

use crate::{ChannelKind, LogRecord};

/// Render `record` for the given channel (no trailing newline)
pub fn render(kind: ChannelKind, record: &LogRecord) -> String {
    match kind {
        ChannelKind::Access | ChannelKind::Level => base_line(record),
        ChannelKind::Detail => detail_line(record),
    }
}

/// `<timestamp> <LEVEL>: <message>`
fn base_line(record: &LogRecord) -> String {
    format!(
        "{} {}: {}",
        record.timestamp,
        record.level.label(),
        record.message
    )
}

/// Base line plus ` | <json>` when metadata is present
fn detail_line(record: &LogRecord) -> String {
    let mut line = base_line(record);
    if !record.metadata.is_empty() {
        line.push_str(" | ");
        let json = serde_json::to_string(&record.metadata).unwrap_or_else(|_| "{}".to_string());
        line.push_str(&json);
    }
    line
}
