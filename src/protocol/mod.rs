// src/protocol/mod.rs
//! Runtime monitors for multiparty protocols.
//!
//! A protocol is a static transition table over named events. A [`Monitor`]
//! walks that table one event at a time and refuses anything the table does
//! not list for its current state.

pub mod bidding;
pub mod recommender;
pub mod registry;

use std::fmt;
use std::marker::PhantomData;
use std::sync::{Mutex, PoisonError};

use log::debug;
use thiserror::Error;

pub use self::bidding::{Bidding, BiddingEvent, BiddingMonitor, BiddingState};
pub use self::recommender::{RecommenderEvent, RecommenderMonitor, RecommenderProtocol, RecommenderState};
pub use self::registry::{MonitorPolicy, SessionRegistry};

/// Participants named by the protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Buyer,
    Auction,
    Seller,
    Recommender,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Buyer => write!(f, "Buyer"),
            Role::Auction => write!(f, "Auction"),
            Role::Seller => write!(f, "Seller"),
            Role::Recommender => write!(f, "Recommender"),
        }
    }
}

/// Direction of a message from the monitored role's local viewpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Send,
    Recv,
}

/// A statically known protocol projected onto one role.
pub trait Protocol {
    type State: Copy + Eq + fmt::Debug + fmt::Display + 'static;
    type Event: Copy + Eq + fmt::Debug + fmt::Display + 'static;

    const NAME: &'static str;
    const INITIAL: Self::State;
    const TERMINAL: Self::State;
    /// `(state, event, next)`; anything not listed is illegal.
    const TRANSITIONS: &'static [(Self::State, Self::Event, Self::State)];

    fn next(state: Self::State, event: Self::Event) -> Option<Self::State> {
        Self::TRANSITIONS
            .iter()
            .find(|(from, on, _)| *from == state && *on == event)
            .map(|(_, _, to)| *to)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unexpected {event} in state {state} ({protocol} protocol)")]
pub struct ProtocolViolation {
    pub protocol: &'static str,
    pub state: String,
    pub event: String,
}

pub struct Monitor<P: Protocol> {
    state: P::State,
    _protocol: PhantomData<P>,
}

impl<P: Protocol> Monitor<P> {
    pub fn new() -> Self {
        Monitor {
            state: P::INITIAL,
            _protocol: PhantomData,
        }
    }

    pub fn state(&self) -> P::State {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == P::TERMINAL
    }

    /// Returns the state `event` would lead to, without advancing.
    pub fn check(&self, event: P::Event) -> Result<P::State, ProtocolViolation> {
        P::next(self.state, event).ok_or_else(|| ProtocolViolation {
            protocol: P::NAME,
            state: self.state.to_string(),
            event: event.to_string(),
        })
    }

    pub fn handle(&mut self, event: P::Event) -> Result<(), ProtocolViolation> {
        let next = self.check(event)?;
        debug!("{}: {} --[{}]--> {}", P::NAME, self.state, event, next);
        self.state = next;
        Ok(())
    }

    pub fn legal_events(&self) -> Vec<P::Event> {
        P::TRANSITIONS
            .iter()
            .filter(|(from, _, _)| *from == self.state)
            .map(|(_, event, _)| *event)
            .collect()
    }
}

impl<P: Protocol> Default for Monitor<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Protocol> Clone for Monitor<P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P: Protocol> Copy for Monitor<P> {}

impl<P: Protocol> fmt::Debug for Monitor<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor")
            .field("protocol", &P::NAME)
            .field("state", &self.state)
            .finish()
    }
}

/// Receives every transition a monitor takes.
pub trait ProtocolObserver<P: Protocol>: Send + Sync {
    fn on_transition(&self, from: P::State, event: P::Event, to: P::State);
}

/// Keeps every observed transition in order.
pub struct RecordingObserver<P: Protocol> {
    transitions: Mutex<Vec<(P::State, P::Event, P::State)>>,
}

impl<P: Protocol> RecordingObserver<P> {
    pub fn new() -> Self {
        RecordingObserver {
            transitions: Mutex::new(Vec::new()),
        }
    }

    pub fn transitions(&self) -> Vec<(P::State, P::Event, P::State)> {
        self.transitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn events(&self) -> Vec<P::Event> {
        self.transitions().into_iter().map(|(_, event, _)| event).collect()
    }
}

impl<P: Protocol> Default for RecordingObserver<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> ProtocolObserver<P> for RecordingObserver<P>
where
    P: Protocol,
    P::State: Send,
    P::Event: Send,
{
    fn on_transition(&self, from: P::State, event: P::Event, to: P::State) {
        self.transitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((from, event, to));
    }
}
