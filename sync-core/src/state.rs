//! Connection state machine for WriterLink.
//!
//! This module provides a pure, side-effect-free state machine for managing
//! the connection lifecycle. The state machine takes events as input and
//! produces a new state plus a list of actions to execute.
//!
//! The address being connected to lives inside the state itself, so
//! "a repeated request for the address already in flight is a no-op" is a
//! structural property of the transitions rather than a separate check.
//!
//! The actual I/O (connecting, closing the channel, persisting the address)
//! is performed by sync-client, not by this module.

use crate::address::ValidAddress;

/// Total number of connect attempts per requested address (first try + one retry).
pub const MAX_CONNECT_ATTEMPTS: u32 = 2;

/// Connection state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No channel and no attempt in flight.
    #[default]
    Idle,
    /// A connect attempt is in flight.
    Connecting {
        /// Address being connected to.
        address: ValidAddress,
        /// 1-based attempt number.
        attempt: u32,
    },
    /// A channel to the peer is open.
    Connected {
        /// Address of the connected peer.
        address: ValidAddress,
    },
}

impl ConnectionState {
    /// Create a new state machine in the Idle state.
    pub fn new() -> Self {
        Self::Idle
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (sync-client)
    /// is responsible for executing the returned actions.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self, event) {
            // Dedup: same address already in flight or connected
            (
                state @ (Self::Connecting { .. } | Self::Connected { .. }),
                Event::ConnectRequested { address },
            ) if state.address() == Some(&address) => (state, vec![]),

            // New address
            (Self::Idle, Event::ConnectRequested { address }) => connect_fresh(address, vec![]),
            (Self::Connecting { .. }, Event::ConnectRequested { address }) => {
                connect_fresh(address, vec![Action::CancelAttempt])
            }
            (Self::Connected { address: previous }, Event::ConnectRequested { address }) => {
                connect_fresh(
                    address,
                    vec![
                        Action::CloseChannel,
                        Action::EmitEvent(ConnectionEvent::Disconnected { address: previous }),
                    ],
                )
            }

            // Attempt completed
            (Self::Connecting { address, .. }, Event::ConnectSucceeded { address: done })
                if address == done =>
            {
                (
                    Self::Connected {
                        address: address.clone(),
                    },
                    vec![
                        Action::PersistAddress {
                            address: address.clone(),
                        },
                        Action::EmitEvent(ConnectionEvent::Connected { address }),
                    ],
                )
            }
            (
                Self::Connecting { address, attempt },
                Event::ConnectFailed {
                    address: failed,
                    error,
                },
            ) if address == failed => {
                if attempt < MAX_CONNECT_ATTEMPTS {
                    let next = attempt + 1;
                    (
                        Self::Connecting {
                            address: address.clone(),
                            attempt: next,
                        },
                        vec![
                            Action::EmitEvent(ConnectionEvent::RetryScheduled {
                                address: address.clone(),
                                attempt: next,
                                error,
                            }),
                            Action::Connect {
                                address,
                                attempt: next,
                            },
                        ],
                    )
                } else {
                    (
                        Self::Idle,
                        vec![Action::EmitEvent(ConnectionEvent::ConnectFailed {
                            address,
                            error,
                        })],
                    )
                }
            }

            // Liveness
            (Self::Connected { address }, Event::ChannelLost) => (
                Self::Idle,
                vec![
                    Action::CloseChannel,
                    Action::EmitEvent(ConnectionEvent::Disconnected { address }),
                ],
            ),

            // Teardown
            (Self::Connecting { .. }, Event::DisposeRequested) => {
                (Self::Idle, vec![Action::CancelAttempt])
            }
            (Self::Connected { address }, Event::DisposeRequested) => (
                Self::Idle,
                vec![
                    Action::CloseChannel,
                    Action::EmitEvent(ConnectionEvent::Disconnected { address }),
                ],
            ),

            // Stale completions, liveness loss while an attempt is in flight,
            // and everything else: stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// The address in flight or connected, if any.
    pub fn address(&self) -> Option<&ValidAddress> {
        match self {
            Self::Idle => None,
            Self::Connecting { address, .. } | Self::Connected { address } => Some(address),
        }
    }

    /// Check if a channel is open.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    /// Check if an attempt is in flight.
    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting { .. })
    }
}

fn connect_fresh(address: ValidAddress, mut actions: Vec<Action>) -> (ConnectionState, Vec<Action>) {
    actions.push(Action::Connect {
        address: address.clone(),
        attempt: 1,
    });
    (
        ConnectionState::Connecting {
            address,
            attempt: 1,
        },
        actions,
    )
}

/// Events that can occur in the connection lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The user (or the prompt) asked to connect to an address.
    ConnectRequested {
        /// Normalized target address.
        address: ValidAddress,
    },
    /// A transport connect attempt succeeded.
    ConnectSucceeded {
        /// Address that was connected.
        address: ValidAddress,
    },
    /// A transport connect attempt failed.
    ConnectFailed {
        /// Address that failed.
        address: ValidAddress,
        /// Error message describing the failure.
        error: String,
    },
    /// The channel was found inactive.
    ChannelLost,
    /// Cancel everything (new session or shutdown).
    DisposeRequested,
}

/// Actions to be executed by the sync-client.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Dispatch a transport connect attempt.
    Connect {
        /// Target address.
        address: ValidAddress,
        /// 1-based attempt number.
        attempt: u32,
    },
    /// Cancel the in-flight attempt; its completion must be ignored.
    CancelAttempt,
    /// Close the open channel.
    CloseChannel,
    /// Remember the address for future sessions.
    PersistAddress {
        /// Address to persist.
        address: ValidAddress,
    },
    /// Report a lifecycle event.
    EmitEvent(ConnectionEvent),
}

/// Lifecycle events reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Channel opened.
    Connected {
        /// Peer address.
        address: ValidAddress,
    },
    /// An attempt failed and the one automatic retry was dispatched.
    RetryScheduled {
        /// Peer address.
        address: ValidAddress,
        /// Attempt number being dispatched.
        attempt: u32,
        /// Error from the failed attempt.
        error: String,
    },
    /// Both attempts failed.
    ConnectFailed {
        /// Peer address.
        address: ValidAddress,
        /// Error from the last attempt.
        error: String,
    },
    /// An open channel was closed.
    Disconnected {
        /// Peer address.
        address: ValidAddress,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::normalize;

    fn addr(raw: &str) -> ValidAddress {
        normalize(raw).unwrap()
    }

    fn connect_actions(actions: &[Action]) -> usize {
        actions
            .iter()
            .filter(|a| matches!(a, Action::Connect { .. }))
            .count()
    }

    #[test]
    fn starts_idle() {
        let state = ConnectionState::new();
        assert!(matches!(state, ConnectionState::Idle));
        assert!(state.address().is_none());
    }

    #[test]
    fn connect_request_transitions_to_connecting() {
        let (state, actions) = ConnectionState::Idle.on_event(Event::ConnectRequested {
            address: addr("1"),
        });

        assert_eq!(
            state,
            ConnectionState::Connecting {
                address: addr("192.168.1.1"),
                attempt: 1
            }
        );
        assert_eq!(
            actions,
            vec![Action::Connect {
                address: addr("192.168.1.1"),
                attempt: 1
            }]
        );
    }

    #[test]
    fn same_address_while_connecting_is_noop() {
        let (state, first) = ConnectionState::Idle.on_event(Event::ConnectRequested {
            address: addr("5"),
        });
        let (state, second) = state.on_event(Event::ConnectRequested {
            address: addr("192.168.1.5"),
        });

        assert_eq!(connect_actions(&first) + connect_actions(&second), 1);
        assert!(second.is_empty());
        assert!(state.is_connecting());
    }

    #[test]
    fn same_address_while_connected_is_noop() {
        let state = ConnectionState::Connected {
            address: addr("5"),
        };
        let (new_state, actions) = state.clone().on_event(Event::ConnectRequested {
            address: addr("5"),
        });
        assert_eq!(new_state, state);
        assert!(actions.is_empty());
    }

    #[test]
    fn new_address_cancels_inflight_attempt() {
        let state = ConnectionState::Connecting {
            address: addr("5"),
            attempt: 2,
        };
        let (new_state, actions) = state.on_event(Event::ConnectRequested {
            address: addr("6"),
        });

        assert_eq!(
            new_state,
            ConnectionState::Connecting {
                address: addr("6"),
                attempt: 1
            }
        );
        assert_eq!(actions[0], Action::CancelAttempt);
        assert_eq!(
            actions[1],
            Action::Connect {
                address: addr("6"),
                attempt: 1
            }
        );
    }

    #[test]
    fn new_address_while_connected_closes_channel() {
        let state = ConnectionState::Connected {
            address: addr("5"),
        };
        let (new_state, actions) = state.on_event(Event::ConnectRequested {
            address: addr("7"),
        });

        assert!(new_state.is_connecting());
        assert!(actions.contains(&Action::CloseChannel));
        assert_eq!(connect_actions(&actions), 1);
    }

    #[test]
    fn success_connects_and_persists() {
        let state = ConnectionState::Connecting {
            address: addr("5"),
            attempt: 1,
        };
        let (new_state, actions) = state.on_event(Event::ConnectSucceeded {
            address: addr("5"),
        });

        assert!(new_state.is_connected());
        assert!(actions.contains(&Action::PersistAddress {
            address: addr("5")
        }));
    }

    #[test]
    fn first_failure_retries_once() {
        let state = ConnectionState::Connecting {
            address: addr("5"),
            attempt: 1,
        };
        let (new_state, actions) = state.on_event(Event::ConnectFailed {
            address: addr("5"),
            error: "refused".into(),
        });

        assert_eq!(
            new_state,
            ConnectionState::Connecting {
                address: addr("5"),
                attempt: 2
            }
        );
        assert!(actions.contains(&Action::Connect {
            address: addr("5"),
            attempt: 2
        }));
    }

    #[test]
    fn second_failure_gives_up_without_persisting() {
        let state = ConnectionState::Connecting {
            address: addr("5"),
            attempt: MAX_CONNECT_ATTEMPTS,
        };
        let (new_state, actions) = state.on_event(Event::ConnectFailed {
            address: addr("5"),
            error: "refused".into(),
        });

        assert_eq!(new_state, ConnectionState::Idle);
        assert_eq!(connect_actions(&actions), 0);
        assert!(!actions
            .iter()
            .any(|a| matches!(a, Action::PersistAddress { .. })));
        assert!(actions.iter().any(|a| matches!(
            a,
            Action::EmitEvent(ConnectionEvent::ConnectFailed { .. })
        )));
    }

    #[test]
    fn full_retry_flow() {
        let (state, _) = ConnectionState::Idle.on_event(Event::ConnectRequested {
            address: addr("1"),
        });
        let (state, retry) = state.on_event(Event::ConnectFailed {
            address: addr("1"),
            error: "timeout".into(),
        });
        assert_eq!(connect_actions(&retry), 1);
        let (state, _) = state.on_event(Event::ConnectFailed {
            address: addr("1"),
            error: "timeout".into(),
        });
        assert_eq!(state, ConnectionState::Idle);

        // After giving up, the same address may be requested again
        let (state, actions) = state.on_event(Event::ConnectRequested {
            address: addr("1"),
        });
        assert!(state.is_connecting());
        assert_eq!(connect_actions(&actions), 1);
    }

    #[test]
    fn stale_completion_ignored() {
        let state = ConnectionState::Connecting {
            address: addr("6"),
            attempt: 1,
        };
        let (new_state, actions) = state.clone().on_event(Event::ConnectSucceeded {
            address: addr("5"),
        });
        assert_eq!(new_state, state);
        assert!(actions.is_empty());

        let (new_state, actions) = state.clone().on_event(Event::ConnectFailed {
            address: addr("5"),
            error: "late".into(),
        });
        assert_eq!(new_state, state);
        assert!(actions.is_empty());
    }

    #[test]
    fn channel_lost_returns_to_idle_and_forgets_address() {
        let state = ConnectionState::Connected {
            address: addr("5"),
        };
        let (new_state, actions) = state.on_event(Event::ChannelLost);

        assert_eq!(new_state, ConnectionState::Idle);
        assert!(new_state.address().is_none());
        assert!(actions.contains(&Action::CloseChannel));
    }

    #[test]
    fn channel_lost_while_connecting_keeps_attempt() {
        let state = ConnectionState::Connecting {
            address: addr("5"),
            attempt: 1,
        };
        let (new_state, actions) = state.clone().on_event(Event::ChannelLost);
        assert_eq!(new_state, state);
        assert!(actions.is_empty());
    }

    #[test]
    fn dispose_cancels_attempt() {
        let state = ConnectionState::Connecting {
            address: addr("5"),
            attempt: 1,
        };
        let (new_state, actions) = state.on_event(Event::DisposeRequested);
        assert_eq!(new_state, ConnectionState::Idle);
        assert_eq!(actions, vec![Action::CancelAttempt]);
    }

    #[test]
    fn dispose_closes_channel() {
        let state = ConnectionState::Connected {
            address: addr("5"),
        };
        let (new_state, actions) = state.on_event(Event::DisposeRequested);
        assert_eq!(new_state, ConnectionState::Idle);
        assert!(actions.contains(&Action::CloseChannel));
    }

    #[test]
    fn dispose_when_idle_is_noop() {
        let (state, actions) = ConnectionState::Idle.on_event(Event::DisposeRequested);
        assert_eq!(state, ConnectionState::Idle);
        assert!(actions.is_empty());
    }

    #[test]
    fn is_connected_helper() {
        assert!(!ConnectionState::Idle.is_connected());
        assert!(!ConnectionState::Connecting {
            address: addr("5"),
            attempt: 1
        }
        .is_connected());
        assert!(ConnectionState::Connected {
            address: addr("5")
        }
        .is_connected());
    }
}
