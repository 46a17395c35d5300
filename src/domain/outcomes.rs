// src/domain/outcomes.rs
use serde::{Deserialize, Serialize};

use super::core::{BidId, BuyerId, ItemId, Price, SellerId};
use super::items::ItemStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceBid {
    pub buyer_id: BuyerId,
    pub item_id: ItemId,
    pub amount: Price,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum BidOutcome {
    #[serde(rename = "PENDING_SELLER_DECISION")]
    PendingSellerDecision {
        bid_id: BidId,
        buyer_id: BuyerId,
        seller_id: SellerId,
        item_id: ItemId,
        amount: Price,
    },

    #[serde(rename = "ACCEPTED")]
    Accepted {
        bid_id: BidId,
        buyer_id: BuyerId,
        seller_id: SellerId,
        item_id: ItemId,
        amount: Price,
        current_price: Price,
        highest_bidder_id: BuyerId,
    },

    #[serde(rename = "REJECTED")]
    Rejected {
        reason: String,
        bid_id: BidId,
        buyer_id: BuyerId,
        seller_id: SellerId,
        item_id: ItemId,
        amount: Price,
        current_price: Price,
        highest_bidder_id: Option<BuyerId>,
    },
}

impl BidOutcome {
    pub fn bid_id(&self) -> BidId {
        match self {
            BidOutcome::PendingSellerDecision { bid_id, .. }
            | BidOutcome::Accepted { bid_id, .. }
            | BidOutcome::Rejected { bid_id, .. } => *bid_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum DecisionOutcome {
    #[serde(rename = "ACCEPTED_AND_ENDED")]
    AcceptedAndEnded {
        bid_id: BidId,
        item_id: ItemId,
        amount: Price,
        current_price: Price,
        highest_bidder_id: Option<BuyerId>,
        item_status: ItemStatus,
        /// Other pending bids closed by this sale.
        rejected_bids: usize,
    },

    #[serde(rename = "REJECTED")]
    Rejected { bid_id: BidId, item_id: ItemId },
}
