// src/domain/core.rs
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::bids::BidStatus;

pub type BuyerId = i64;
pub type SellerId = i64;
pub type ItemId = i64;
pub type BidId = i64;
pub type SessionId = String;
pub type Price = f64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buyer {
    pub id: BuyerId,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seller {
    pub id: SellerId,
    pub username: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotFound {
    #[error("Buyer not found: {0}")]
    Buyer(BuyerId),

    #[error("Seller not found: {0}")]
    Seller(SellerId),

    #[error("Item not found: {0}")]
    Item(ItemId),

    #[error("Bid not found: {0}")]
    Bid(BidId),
}

/// Business rule failures. None of these touch a protocol monitor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Auction ended: {0}")]
    AuctionEnded(ItemId),

    #[error("Seller decision allowed only for COMING_SOON items: {0}")]
    NotComingSoon(ItemId),

    #[error("Bid {0} is not pending ({1})")]
    BidNotPending(BidId, BidStatus),
}
