//! Connection and heartbeat state enums.

use std::fmt;

// ============================================================================
// Connection State
// ============================================================================

/// Lifecycle state of one accepted connection.
///
/// Only `Open` connections may be present in the registry. A connection
/// moves `Open -> Closing` when its read loop ends and `Closing -> Closed`
/// once its transport has been released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Open,
    Closing,
    Closed,
}

impl ConnectionState {
    /// Returns the next state in the lifecycle (`Closed` is terminal).
    #[must_use]
    pub fn advance(self) -> Self {
        match self {
            Self::Open => Self::Closing,
            Self::Closing | Self::Closed => Self::Closed,
        }
    }

    /// Whether the connection may still be registered.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

// ============================================================================
// Heartbeat Mode
// ============================================================================

/// Heartbeat scheduler mode, derived from registry emptiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeartbeatMode {
    /// No clients connected; short local tick.
    #[default]
    Idle,
    /// At least one client connected; long broadcast tick.
    Active,
}

impl HeartbeatMode {
    /// Mode for a given number of registered clients.
    pub fn for_count(count: usize) -> Self {
        if count == 0 {
            Self::Idle
        } else {
            Self::Active
        }
    }
}

impl fmt::Display for HeartbeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Active => write!(f, "active"),
        }
    }
}
