//! Heartbeat tick decision.
//!
//! The transport does not report every disconnect, so liveness loss is
//! detected opportunistically: each tick either pings a live channel or
//! reports that the connect prompt must be shown. A tick never retries.

use std::time::Duration;

/// Default heartbeat period.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

/// Outcome of one heartbeat tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatDecision {
    /// Channel is live; send a ping frame.
    Ping,
    /// Channel is down; show the connect prompt and send nothing.
    LivenessLost,
}

impl HeartbeatDecision {
    /// Decide for a tick given current channel liveness.
    pub fn for_tick(is_active: bool) -> Self {
        if is_active {
            Self::Ping
        } else {
            Self::LivenessLost
        }
    }
}
