// src/recommender/client.rs
use log::{debug, warn};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use uuid::Uuid;

use super::interactions::InteractionSource;
use super::materialize::{materialize, MaterializeError, Recommendation};
use super::wire::{self, RpcRequest, RpcResponse, TransportError};
use crate::domain::{BuyerId, ItemId};
use crate::protocol::{
    ProtocolObserver, ProtocolViolation, RecommenderEvent, RecommenderMonitor, RecommenderProtocol,
};

/// Where the oracle lives and how long any single call may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecommenderConfig {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        RecommenderConfig {
            host: "127.0.0.1".to_string(),
            port: 18861,
            timeout: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Error)]
pub enum RecommenderError {
    /// The oracle could not be reached, or failed, even after the retry.
    #[error("recommender call {method} failed: {message}")]
    Remote { method: String, message: String },

    #[error("invalid recommender response: {0}")]
    Materialize(#[from] MaterializeError),

    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolViolation),
}

struct Connection {
    stream: BufReader<TcpStream>,
}

impl Connection {
    /// An idle connection must have nothing to read. EOF, stray bytes or a
    /// socket error all mean it cannot be trusted for the next request.
    fn is_alive(&self) -> bool {
        if !self.stream.buffer().is_empty() {
            return false;
        }
        let mut probe = [0u8; 1];
        match self.stream.get_ref().try_read(&mut probe) {
            Err(err) => err.kind() == std::io::ErrorKind::WouldBlock,
            Ok(_) => false,
        }
    }

    async fn request(&mut self, request: &RpcRequest) -> Result<Value, TransportError> {
        self.stream.write_all(&wire::encode(request)?).await?;
        self.stream.flush().await?;

        let mut line = String::new();
        if self.stream.read_line(&mut line).await? == 0 {
            return Err(TransportError::Closed);
        }
        let response: RpcResponse = serde_json::from_str(line.trim_end())?;
        if response.id != request.id {
            return Err(TransportError::Mismatch {
                expected: request.id.clone(),
                got: response.id,
            });
        }
        match response.error {
            Some(message) => Err(TransportError::Remote(message)),
            None => Ok(response.result.unwrap_or(Value::Null)),
        }
    }
}

/// Client for the recommendation oracle.
///
/// The connection is opened on first use and replaced whenever it looks dead.
/// A failed call is retried once on a fresh connection.
pub struct RecommenderClient {
    config: RecommenderConfig,
    connection: Mutex<Option<Connection>>,
    observer: Option<Arc<dyn ProtocolObserver<RecommenderProtocol>>>,
}

impl RecommenderClient {
    pub fn new(config: RecommenderConfig) -> Self {
        RecommenderClient {
            config,
            connection: Mutex::new(None),
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProtocolObserver<RecommenderProtocol>>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &RecommenderConfig {
        &self.config
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.as_ref().map_or(false, Connection::is_alive)
    }

    async fn connect(&self) -> Result<Connection, TransportError> {
        let address = (self.config.host.as_str(), self.config.port);
        let stream = timeout(self.config.timeout, TcpStream::connect(address))
            .await
            .map_err(|_| TransportError::Timeout(self.config.timeout))??;
        stream.set_nodelay(true)?;
        debug!("connected to recommender at {}:{}", self.config.host, self.config.port);
        Ok(Connection { stream: BufReader::new(stream) })
    }

    async fn ensure_connection<'a>(&self, slot: &'a mut Option<Connection>) -> Result<&'a mut Connection, TransportError> {
        let alive = slot.as_ref().map_or(false, Connection::is_alive);
        if !alive {
            if slot.is_some() {
                debug!("recommender connection went stale, reconnecting");
            }
            *slot = Some(self.connect().await?);
        }
        slot.as_mut().ok_or(TransportError::Closed)
    }

    async fn call_once(&self, slot: &mut Option<Connection>, request: &RpcRequest) -> Result<Value, TransportError> {
        let connection = self.ensure_connection(slot).await?;
        timeout(self.config.timeout, connection.request(request))
            .await
            .map_err(|_| TransportError::Timeout(self.config.timeout))?
    }

    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RecommenderError> {
        let request = RpcRequest {
            id: Uuid::new_v4().to_string(),
            method: method.to_string(),
            params,
        };
        let mut slot = self.connection.lock().await;

        match self.call_once(&mut slot, &request).await {
            Ok(value) => Ok(value),
            Err(first) => {
                warn!("recommender call {} failed ({}), retrying on a new connection", method, first);
                *slot = None;
                let retried = self.call_once(&mut slot, &request).await;
                retried.map_err(|err| {
                    *slot = None;
                    RecommenderError::Remote {
                        method: method.to_string(),
                        message: err.to_string(),
                    }
                })
            }
        }
    }

    /// Lifecycle hint, not part of any protocol session. Callers treat errors as non-fatal.
    pub async fn warmup(&self) -> Result<bool, RecommenderError> {
        let value = self.call(wire::WARMUP, Vec::new()).await?;
        Ok(truthy(&value))
    }

    pub async fn push_interactions(&self, source: &dyn InteractionSource) -> Result<bool, RecommenderError> {
        let rows = serde_json::to_value(source.interactions())?;
        let value = self.call(wire::LOAD_INTERACTIONS, vec![rows]).await?;
        Ok(truthy(&value))
    }

    pub async fn get_recommendations_for_user(
        &self,
        source: &dyn InteractionSource,
        user_id: BuyerId,
        top_n: usize,
    ) -> Result<Vec<Recommendation>, RecommenderError> {
        if let Err(err) = self.push_interactions(source).await {
            warn!("could not push interactions before recommending for {}: {}", user_id, err);
        }
        self.exchange(
            RecommenderEvent::SendGetRecs,
            RecommenderEvent::RecvRecList,
            wire::RECOMMEND_FOR_USER,
            vec![json!(user_id), json!(top_n)],
        )
        .await
    }

    pub async fn get_similar_items(&self, item_id: ItemId, top_n: usize) -> Result<Vec<Recommendation>, RecommenderError> {
        self.exchange(
            RecommenderEvent::SendGetSimilar,
            RecommenderEvent::RecvSimilarList,
            wire::SIMILAR_ITEMS,
            vec![json!(item_id), json!(top_n)],
        )
        .await
    }

    /// One request/response cycle under its own single-use monitor.
    async fn exchange(
        &self,
        request: RecommenderEvent,
        reply: RecommenderEvent,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Vec<Recommendation>, RecommenderError> {
        let mut monitor = RecommenderMonitor::new();
        self.step(&mut monitor, request)?;

        let result = match self.call(method, params).await {
            Ok(raw) => materialize(&raw).map_err(RecommenderError::from),
            Err(err) => Err(err),
        };

        match result {
            Ok(recommendations) => {
                self.step(&mut monitor, reply)?;
                Ok(recommendations)
            }
            Err(err) => {
                self.step(&mut monitor, RecommenderEvent::RecvRecError)?;
                Err(err)
            }
        }
    }

    fn step(&self, monitor: &mut RecommenderMonitor, event: RecommenderEvent) -> Result<(), ProtocolViolation> {
        let from = monitor.state();
        monitor.handle(event)?;
        if let Some(observer) = &self.observer {
            observer.on_transition(from, event, monitor.state());
        }
        Ok(())
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        _ => true,
    }
}
