//! Heartbeat timer task.
//!
//! Marshals a [`Command::HeartbeatTick`] to the foreground task every period.
//! The liveness check and the ping itself happen there.

use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::command::{Command, SessionHandle};

/// Spawn the heartbeat timer.
///
/// The first tick fires one period after spawning. The task stops on its own
/// once the session is gone; the returned handle can also abort it.
pub fn spawn_heartbeat(period: Duration, session: SessionHandle) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tracing::debug!("Heartbeat started (interval: {:?})", period);

        let mut timer = interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            timer.tick().await;
            if session.send(Command::HeartbeatTick).is_err() {
                tracing::debug!("Session closed, heartbeat stopped");
                break;
            }
        }
    })
}
