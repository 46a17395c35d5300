use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::domain::{
    Bid, BidDecisionEngine, BidId, BidStatus, BuyerId, Decision, Item, ItemId, ItemStatus, PlaceBid, Price,
    SessionId,
};
use crate::persistence::{Store, Tables};
use crate::protocol::{MonitorPolicy, SessionRegistry};
use crate::recommender::{Recommendation, RecommenderClient};
use super::error::ApiError;

pub const DEFAULT_SESSION: &str = "default";
pub const DEFAULT_TOP_N: usize = 10;

#[derive(Clone)]
pub struct AppState {
    pub engine: BidDecisionEngine,
    pub recommender: Arc<RecommenderClient>,
    pub policy: MonitorPolicy,
}

impl AppState {
    pub fn new(store: Arc<Store>, recommender: Arc<RecommenderClient>, policy: MonitorPolicy) -> Self {
        AppState {
            engine: BidDecisionEngine::new(store, Arc::new(SessionRegistry::new())),
            recommender,
            policy,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        self.engine.store()
    }
}

fn session_from(value: Option<Value>) -> Result<SessionId, ApiError> {
    match value {
        None | Some(Value::Null) => Ok(DEFAULT_SESSION.to_string()),
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(ApiError::Validation(format!("Invalid session_id: {}", other))),
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlaceBidRequest {
    #[serde(default)]
    pub session_id: Option<Value>,
    pub buyer_id: Option<BuyerId>,
    pub item_id: Option<ItemId>,
    pub amount: Option<Price>,
}

impl PlaceBidRequest {
    pub fn validate(self) -> Result<(SessionId, PlaceBid), ApiError> {
        let session_id = session_from(self.session_id)?;
        let (buyer_id, item_id, amount) = match (self.buyer_id, self.item_id, self.amount) {
            (Some(buyer_id), Some(item_id), Some(amount)) => (buyer_id, item_id, amount),
            _ => {
                return Err(ApiError::Validation(
                    "Missing required fields: buyer_id, item_id, amount".to_string(),
                ))
            }
        };
        if !amount.is_finite() || amount <= 0.0 {
            return Err(ApiError::Validation(format!("Invalid bid amount: {}", amount)));
        }
        Ok((session_id, PlaceBid { buyer_id, item_id, amount }))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DecideBidRequest {
    #[serde(default)]
    pub session_id: Option<Value>,
    #[serde(default)]
    pub decision: Option<String>,
}

impl DecideBidRequest {
    pub fn validate(self) -> Result<(SessionId, Decision), ApiError> {
        let session_id = session_from(self.session_id)?;
        let decision = self
            .decision
            .unwrap_or_default()
            .parse::<Decision>()
            .map_err(ApiError::Validation)?;
        Ok((session_id, decision))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StrictQuery {
    pub strict: Option<String>,
}

impl StrictQuery {
    pub fn is_strict(&self) -> bool {
        matches!(self.strict.as_deref(), Some("1") | Some("true"))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TopNQuery {
    pub top_n: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    pub status: Option<ItemStatus>,
}

/// Outcome of a bid operation together with the session it ran in.
#[derive(Debug, Serialize)]
pub struct SessionReply<T: Serialize> {
    pub session_id: SessionId,
    #[serde(flatten)]
    pub outcome: T,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecommendationsResponse {
    pub user_id: BuyerId,
    pub top_n: usize,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SimilarItemsResponse {
    pub item_id: ItemId,
    pub top_n: usize,
    pub similar: Vec<Recommendation>,
}

fn username_of(tables: &Tables, buyer: Option<BuyerId>) -> Option<String> {
    buyer.and_then(|id| tables.buyers().get(&id)).map(|b| b.username.clone())
}

#[derive(Debug, Serialize)]
pub struct AuctionItem {
    pub id: ItemId,
    pub name: String,
    pub seller: String,
    pub status: ItemStatus,
    pub current_price: Price,
    pub starting_price: Price,
    pub highest_bidder: Option<String>,
    pub time_remaining_seconds: i64,
}

impl AuctionItem {
    pub fn new(tables: &Tables, item: &Item, now: DateTime<Utc>) -> Self {
        AuctionItem {
            id: item.id,
            name: item.name.clone(),
            seller: tables
                .sellers()
                .get(&item.seller_id)
                .map(|s| s.username.clone())
                .unwrap_or_default(),
            status: item.status,
            current_price: item.current_price,
            starting_price: item.starting_price,
            highest_bidder: username_of(tables, item.highest_bidder),
            time_remaining_seconds: item.time_remaining_seconds(now),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuctionList {
    pub auctions: Vec<AuctionItem>,
}

#[derive(Debug, Serialize)]
pub struct AuctionBid {
    pub id: BidId,
    pub buyer: String,
    pub amount: Price,
    pub status: BidStatus,
    pub timestamp: DateTime<Utc>,
}

impl AuctionBid {
    pub fn new(tables: &Tables, bid: &Bid) -> Self {
        AuctionBid {
            id: bid.id,
            buyer: username_of(tables, Some(bid.buyer_id)).unwrap_or_default(),
            amount: bid.amount,
            status: bid.status,
            timestamp: bid.timestamp,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuctionDetail {
    #[serde(flatten)]
    pub summary: AuctionItem,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct AuctionState {
    pub item: AuctionDetail,
    pub recent_bids: Vec<AuctionBid>,
}

#[derive(Debug, Serialize)]
pub struct SellerAuction {
    #[serde(flatten)]
    pub summary: AuctionItem,
    pub pending_bids: Vec<AuctionBid>,
}

#[derive(Debug, Serialize)]
pub struct SellerAuctions {
    pub seller: String,
    pub auctions: Vec<SellerAuction>,
}
