//! Remote health states

use std::fmt;

use serde::Serialize;

/// Coarse health state of one remote origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteStatusKind {
    /// No call has been attempted yet
    Ready,
    /// Last call succeeded
    Available,
    /// Last call failed and auto-block is disabled; calls are still attempted
    Unavailable,
    /// Last call failed and calls are refused until the block window elapses
    AutoBlockedUnavailable,
    /// An administrator blocked the remote
    Blocked,
    /// An administrator took the remote offline; nothing is ever attempted
    Offline,
}

impl RemoteStatusKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Available => "AVAILABLE",
            Self::Unavailable => "UNAVAILABLE",
            Self::AutoBlockedUnavailable => "AUTO_BLOCKED_UNAVAILABLE",
            Self::Blocked => "BLOCKED",
            Self::Offline => "OFFLINE",
        }
    }

    /// Whether this state blocks calls, ignoring any time bound
    #[must_use]
    pub const fn is_blocked(&self) -> bool {
        matches!(self, Self::AutoBlockedUnavailable | Self::Blocked | Self::Offline)
    }

    /// Whether an administrator set this state
    #[must_use]
    pub const fn is_manual(&self) -> bool {
        matches!(self, Self::Blocked | Self::Offline)
    }
}

impl fmt::Display for RemoteStatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health state of one remote origin plus the details of how it got there
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteStatus {
    kind: RemoteStatusKind,
    /// End of an auto-block window, millis since epoch
    blocked_until: Option<u64>,
    reason: Option<String>,
    request_url: Option<String>,
    /// Number of transitions the owning controller had made when this was set
    sequence: u64,
}

impl RemoteStatus {
    const fn of(kind: RemoteStatusKind) -> Self {
        Self {
            kind,
            blocked_until: None,
            reason: None,
            request_url: None,
            sequence: 0,
        }
    }

    #[must_use]
    pub const fn ready() -> Self {
        Self::of(RemoteStatusKind::Ready)
    }

    #[must_use]
    pub const fn available() -> Self {
        Self::of(RemoteStatusKind::Available)
    }

    #[must_use]
    pub const fn blocked() -> Self {
        Self::of(RemoteStatusKind::Blocked)
    }

    #[must_use]
    pub const fn offline() -> Self {
        Self::of(RemoteStatusKind::Offline)
    }

    #[must_use]
    pub fn unavailable(reason: impl Into<String>, request_url: Option<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            request_url,
            ..Self::of(RemoteStatusKind::Unavailable)
        }
    }

    #[must_use]
    pub fn auto_blocked(
        until_millis: u64,
        reason: impl Into<String>,
        request_url: Option<String>,
    ) -> Self {
        Self {
            kind: RemoteStatusKind::AutoBlockedUnavailable,
            blocked_until: Some(until_millis),
            reason: Some(reason.into()),
            request_url,
            sequence: 0,
        }
    }

    #[must_use]
    #[inline]
    pub const fn kind(&self) -> RemoteStatusKind {
        self.kind
    }

    #[must_use]
    #[inline]
    pub const fn blocked_until(&self) -> Option<u64> {
        self.blocked_until
    }

    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    #[must_use]
    pub fn request_url(&self) -> Option<&str> {
        self.request_url.as_deref()
    }

    /// Position of this status in its controller's transition history
    ///
    /// Starts at 0 and grows by one per reported transition. Notifications of
    /// racing transitions may arrive out of order; a larger sequence is newer.
    #[must_use]
    #[inline]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    pub(super) const fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Whether a call may be attempted at `now_millis`
    ///
    /// An auto-block ends at exactly `blocked_until`.
    #[must_use]
    pub fn allows_calls(&self, now_millis: u64) -> bool {
        match self.kind {
            RemoteStatusKind::Blocked | RemoteStatusKind::Offline => false,
            RemoteStatusKind::AutoBlockedUnavailable => {
                self.blocked_until.is_some_and(|until| now_millis >= until)
            }
            RemoteStatusKind::Ready
            | RemoteStatusKind::Available
            | RemoteStatusKind::Unavailable => true,
        }
    }

    /// Whether moving from `self` to `next` is a change observers hear about
    ///
    /// Reason and URL are details; only the state and the block window count.
    #[must_use]
    pub fn differs_from(&self, next: &Self) -> bool {
        self.kind != next.kind || self.blocked_until != next.blocked_until
    }
}

impl Default for RemoteStatus {
    fn default() -> Self {
        Self::ready()
    }
}

impl fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(until) = self.blocked_until {
            write!(f, " until {until}")?;
        }
        if let Some(reason) = &self.reason {
            write!(f, " - reason {reason}")?;
        }
        Ok(())
    }
}
