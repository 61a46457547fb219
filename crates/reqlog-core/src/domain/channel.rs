//! Channel kinds and the level routing table

use std::fmt;

use super::LogLevel;

/// Audience of a log destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// User-facing summary lines
    Access,
    /// Full diagnostic lines with serialized metadata
    Detail,
    /// Raw severity audit stream
    Level,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 3] = [ChannelKind::Access, ChannelKind::Detail, ChannelKind::Level];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Detail => "detail",
            Self::Level => "level",
        }
    }

    /// Whether a record at `level` is routed to this channel
    ///
    /// Level and detail receive everything; access drops debug and warning.
    pub fn accepts(&self, level: LogLevel) -> bool {
        match self {
            Self::Level | Self::Detail => true,
            Self::Access => !matches!(level, LogLevel::Debug | LogLevel::Warning),
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
