//! Lifecycle status of a database handle.

use std::fmt;

/// Status of a [`SecureDatabase`](crate::SecureDatabase) handle.
///
/// ```text
/// Default -> Initiated -> Ready <-> Busy
/// Ready | Busy -> Closed
/// any -> Failed | Unavailable | Corrupted
/// ```
///
/// `Full` is never stored; [`SecureDatabase::effective_status`](crate::SecureDatabase::effective_status)
/// derives it from the used and maximum sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DatabaseStatus {
    /// Handle constructed, nothing opened yet.
    #[default]
    Default,
    /// The table was created on first open.
    Initiated,
    /// Open and idle.
    Ready,
    /// Closed on request.
    Closed,
    /// The backing file is missing, or the table was dropped.
    Unavailable,
    /// An operation is in progress.
    Busy,
    /// An unexpected fault occurred. Terminal.
    Failed,
    /// The used size reached the budget.
    Full,
    /// Corruption was detected and the file deleted. Terminal.
    Corrupted,
}

impl DatabaseStatus {
    /// Returns `true` for states after which the handle must be discarded.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Corrupted)
    }
}

impl fmt::Display for DatabaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Default => "default",
            Self::Initiated => "initiated",
            Self::Ready => "ready",
            Self::Closed => "closed",
            Self::Unavailable => "unavailable",
            Self::Busy => "busy",
            Self::Failed => "failed",
            Self::Full => "full",
            Self::Corrupted => "corrupted",
        };
        f.write_str(name)
    }
}
