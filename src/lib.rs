// src/lib.rs
pub mod config;
pub mod domain;
pub mod oracle;
pub mod persistence;
pub mod protocol;
pub mod recommender;
pub mod web;

pub use domain::{BidDecisionEngine, EngineError};
pub use protocol::{Monitor, ProtocolViolation, SessionRegistry};
pub use recommender::{RecommenderClient, RecommenderError};
