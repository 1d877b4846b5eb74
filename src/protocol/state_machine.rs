//! Contributor State Machine.
//!
//! Tracks where a contributor is in its single round and strictly enforces the
//! allowed transitions. Every committed transition is published on a `watch`
//! channel so callers can wait for the round to finish.
//!
//! # States
//! - **Idle**: Private value drawn, no network activity yet.
//! - **Registering**: Registration request in flight.
//! - **AwaitingPeers**: Waiting for the aggregator to push the peer list.
//! - **Distributing**: Shares split, outbound dispatch started.
//! - **Aggregating**: Retained share stored, waiting for the remaining peer shares.
//! - **Submitted**: Aggregate delivered to the aggregator. Terminal.
//! - **Failed**: Aggregate submission failed. Terminal; the round cannot be retried.
//!
//! Inbound shares are accepted in every state, so `Distributing` and `Aggregating`
//! overlap with share reception and completion can be observed from either.

use tokio::sync::watch;

use super::ProtocolError;

/// Possible states of a contributor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Registering,
    AwaitingPeers,
    Distributing,
    Aggregating,
    Submitted,
    Failed,
}

impl State {
    /// True for `Submitted` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Submitted | State::Failed)
    }
}

/// The contributor state machine.
pub struct StateMachine {
    current_state: State,
    publisher: watch::Sender<State>,
}

impl StateMachine {
    /// Creates a new state machine in the Idle state.
    pub fn new() -> Self {
        let (publisher, _) = watch::channel(State::Idle);
        Self {
            current_state: State::Idle,
            publisher,
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> State {
        self.current_state
    }

    /// Returns a receiver observing every committed state.
    pub fn subscribe(&self) -> watch::Receiver<State> {
        self.publisher.subscribe()
    }

    fn transition(&mut self, new_state: State) {
        log::info!("State transition: {:?} -> {:?}", self.current_state, new_state);
        self.current_state = new_state;
        self.publisher.send_replace(new_state);
    }

    /// Idle -> Registering.
    pub fn start_registration(&mut self) -> Result<(), ProtocolError> {
        match self.current_state {
            State::Idle => {
                self.transition(State::Registering);
                Ok(())
            }
            other => Err(ProtocolError::InvalidState(other)),
        }
    }

    /// Registering -> AwaitingPeers, on any registration outcome.
    ///
    /// The peer list can overtake the registration response; if the node has already
    /// moved past `AwaitingPeers` this is a no-op.
    pub fn registration_finished(&mut self) -> Result<(), ProtocolError> {
        match self.current_state {
            State::Registering => {
                self.transition(State::AwaitingPeers);
                Ok(())
            }
            State::Idle => Err(ProtocolError::InvalidState(State::Idle)),
            _ => Ok(()),
        }
    }

    /// Registering | AwaitingPeers -> Distributing, on peer list receipt.
    pub fn start_distribution(&mut self) -> Result<(), ProtocolError> {
        match self.current_state {
            State::Registering | State::AwaitingPeers => {
                self.transition(State::Distributing);
                Ok(())
            }
            other => Err(ProtocolError::InvalidState(other)),
        }
    }

    /// Distributing -> Aggregating.
    ///
    /// A no-op if the round already completed while distribution was being set up.
    pub fn start_aggregation(&mut self) -> Result<(), ProtocolError> {
        match self.current_state {
            State::Distributing => {
                self.transition(State::Aggregating);
                Ok(())
            }
            State::Aggregating | State::Submitted | State::Failed => Ok(()),
            other => Err(ProtocolError::InvalidState(other)),
        }
    }

    /// Distributing | Aggregating -> Submitted.
    pub fn mark_submitted(&mut self) -> Result<(), ProtocolError> {
        self.finish(State::Submitted)
    }

    /// Distributing | Aggregating -> Failed.
    pub fn mark_failed(&mut self) -> Result<(), ProtocolError> {
        self.finish(State::Failed)
    }

    fn finish(&mut self, terminal: State) -> Result<(), ProtocolError> {
        match self.current_state {
            State::Distributing | State::Aggregating => {
                self.transition(terminal);
                Ok(())
            }
            other => Err(ProtocolError::InvalidState(other)),
        }
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
