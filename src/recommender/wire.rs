// src/recommender/wire.rs
//! Newline-delimited JSON frames exchanged with the oracle.
//!
//! ```text
//! -> {"id":"…","method":"recommend_for_user","params":[7,10]}
//! <- {"id":"…","result":[{"item_id":101,"score":0.9}]}
//! <- {"id":"…","error":"unknown method: nope"}
//! ```
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const WARMUP: &str = "warmup";
pub const LOAD_INTERACTIONS: &str = "load_interactions";
pub const RECOMMEND_FOR_USER: &str = "recommend_for_user";
pub const SIMILAR_ITEMS: &str = "similar_items";

/// Longest request line the oracle will buffer, newline excluded.
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RpcResponse {
    pub fn ok(id: String, result: Value) -> Self {
        RpcResponse { id, result: Some(result), error: None }
    }

    pub fn err(id: String, message: impl Into<String>) -> Self {
        RpcResponse { id, result: None, error: Some(message.into()) }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("connection closed by peer")]
    Closed,

    #[error("malformed frame: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("response id {got} does not match request {expected}")]
    Mismatch { expected: String, got: String },

    #[error("remote error: {0}")]
    Remote(String),
}

/// Encodes a frame as one line, terminator included.
pub fn encode<T: Serialize>(frame: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut line = serde_json::to_vec(frame)?;
    line.push(b'\n');
    Ok(line)
}
