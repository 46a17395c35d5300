// src/protocol/recommender.rs
//! Auction / Recommender request-response protocol, projected onto the Auction role.
//! One monitor covers exactly one exchange.
use std::fmt;

use super::{Direction, Monitor, Protocol, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecommenderState {
    Idle,
    WaitingRecs,
    WaitingSim,
    Done,
}

impl fmt::Display for RecommenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecommenderState::Idle => write!(f, "IDLE"),
            RecommenderState::WaitingRecs => write!(f, "WAITING_RECS"),
            RecommenderState::WaitingSim => write!(f, "WAITING_SIM"),
            RecommenderState::Done => write!(f, "DONE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecommenderEvent {
    SendGetRecs,
    SendGetSimilar,
    RecvRecList,
    RecvSimilarList,
    RecvRecError,
}

impl RecommenderEvent {
    pub fn direction(&self) -> Direction {
        match self {
            RecommenderEvent::SendGetRecs | RecommenderEvent::SendGetSimilar => Direction::Send,
            _ => Direction::Recv,
        }
    }

    pub fn peer(&self) -> Role {
        Role::Recommender
    }

    pub fn label(&self) -> &'static str {
        match self {
            RecommenderEvent::SendGetRecs => "GetRecs",
            RecommenderEvent::SendGetSimilar => "GetSimilar",
            RecommenderEvent::RecvRecList => "RecList",
            RecommenderEvent::RecvSimilarList => "SimilarList",
            RecommenderEvent::RecvRecError => "RecError",
        }
    }
}

impl fmt::Display for RecommenderEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction() {
            Direction::Send => write!(f, "send {}() to {}", self.label(), self.peer()),
            Direction::Recv => write!(f, "recv {}() from {}", self.label(), self.peer()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecommenderProtocol;

impl Protocol for RecommenderProtocol {
    type State = RecommenderState;
    type Event = RecommenderEvent;

    const NAME: &'static str = "Recommender";
    const INITIAL: RecommenderState = RecommenderState::Idle;
    const TERMINAL: RecommenderState = RecommenderState::Done;
    const TRANSITIONS: &'static [(RecommenderState, RecommenderEvent, RecommenderState)] = &[
        (RecommenderState::Idle, RecommenderEvent::SendGetRecs, RecommenderState::WaitingRecs),
        (RecommenderState::Idle, RecommenderEvent::SendGetSimilar, RecommenderState::WaitingSim),
        (RecommenderState::WaitingRecs, RecommenderEvent::RecvRecList, RecommenderState::Done),
        (RecommenderState::WaitingRecs, RecommenderEvent::RecvRecError, RecommenderState::Done),
        (RecommenderState::WaitingSim, RecommenderEvent::RecvSimilarList, RecommenderState::Done),
        (RecommenderState::WaitingSim, RecommenderEvent::RecvRecError, RecommenderState::Done),
    ];
}

pub type RecommenderMonitor = Monitor<RecommenderProtocol>;
