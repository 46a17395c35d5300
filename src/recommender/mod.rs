//! Talking to the recommendation oracle.
pub mod client;
pub mod interactions;
pub mod materialize;
pub mod wire;

pub use self::client::{RecommenderClient, RecommenderConfig, RecommenderError};
pub use self::interactions::{Interaction, InteractionSource, MockInteractions};
pub use self::materialize::{materialize, MaterializeError, Recommendation};
