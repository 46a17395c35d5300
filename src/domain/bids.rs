// src/domain/bids.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::core::{BidId, BuyerId, DomainError, ItemId, Price};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BidStatus {
    Pending,
    Accepted,
    Rejected,
}

impl fmt::Display for BidStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BidStatus::Pending => write!(f, "PENDING"),
            BidStatus::Accepted => write!(f, "ACCEPTED"),
            BidStatus::Rejected => write!(f, "REJECTED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub id: BidId,
    pub buyer_id: BuyerId,
    pub item_id: ItemId,
    pub amount: Price,
    pub timestamp: DateTime<Utc>,
    pub status: BidStatus,
}

impl Bid {
    pub fn is_pending(&self) -> bool {
        self.status == BidStatus::Pending
    }

    /// One-shot: only a pending bid can be accepted or rejected.
    pub fn resolve(&mut self, to: BidStatus) -> Result<(), DomainError> {
        if !self.is_pending() || to == BidStatus::Pending {
            return Err(DomainError::BidNotPending(self.id, self.status));
        }
        self.status = to;
        Ok(())
    }
}

/// Seller's answer to a pending bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Confirm,
    Reject,
}

impl FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "confirm" => Ok(Decision::Confirm),
            "reject" => Ok(Decision::Reject),
            _ => Err("decision must be 'confirm' or 'reject'".to_string()),
        }
    }
}
