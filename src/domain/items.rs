// src/domain/items.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::core::{BuyerId, ItemId, Price, SellerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    ComingSoon,
    Live,
    Ended,
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemStatus::ComingSoon => write!(f, "COMING_SOON"),
            ItemStatus::Live => write!(f, "LIVE"),
            ItemStatus::Ended => write!(f, "ENDED"),
        }
    }
}

impl FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COMING_SOON" => Ok(ItemStatus::ComingSoon),
            "LIVE" => Ok(ItemStatus::Live),
            "ENDED" => Ok(ItemStatus::Ended),
            _ => Err(format!("Unknown item status: {}", s)),
        }
    }
}

/// Status implied by the clock alone.
pub fn derive_status(now: DateTime<Utc>, start_time: DateTime<Utc>, duration: Duration) -> ItemStatus {
    if now < start_time {
        ItemStatus::ComingSoon
    } else if now < start_time + duration {
        ItemStatus::Live
    } else {
        ItemStatus::Ended
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub seller_id: SellerId,
    pub status: ItemStatus,
    pub start_time: DateTime<Utc>,
    pub duration_seconds: i64,
    pub starting_price: Price,
    pub current_price: Price,
    /// Back-reference only; the item does not own the buyer.
    pub highest_bidder: Option<BuyerId>,
}

impl Item {
    pub fn duration(&self) -> Duration {
        Duration::seconds(self.duration_seconds)
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + self.duration()
    }

    /// Status the clock implies. ENDED is sticky: a direct sale or an
    /// expired listing never comes back.
    pub fn status_at(&self, now: DateTime<Utc>) -> ItemStatus {
        match self.status {
            ItemStatus::Ended => ItemStatus::Ended,
            _ => derive_status(now, self.start_time, self.duration()),
        }
    }

    /// Returns true if the status changed.
    pub fn refresh_status(&mut self, now: DateTime<Utc>) -> bool {
        let next = self.status_at(now);
        if next != self.status {
            self.status = next;
            true
        } else {
            false
        }
    }

    /// Never lowers the price.
    pub fn raise_price(&mut self, amount: Price) {
        if amount > self.current_price {
            self.current_price = amount;
        }
    }

    /// Seconds until start for COMING_SOON, until end for LIVE, zero once ENDED.
    pub fn time_remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        let remaining = match self.status {
            ItemStatus::ComingSoon => (self.start_time - now).num_seconds(),
            ItemStatus::Live => (self.end_time() - now).num_seconds(),
            ItemStatus::Ended => 0,
        };
        remaining.max(0)
    }
}

/// Why a LIVE bid was not auto-accepted.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    NotAboveCurrentPrice(Price),
    AlreadyHighestBidder,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NotAboveCurrentPrice(price) => {
                write!(f, "Bid amount must exceed the current price of {}", price)
            }
            RejectReason::AlreadyHighestBidder => write!(f, "Bidder is already the highest bidder"),
        }
    }
}

/// Accept iff the amount strictly exceeds the current price and the bidder
/// is not already leading.
pub fn auto_accept(item: &Item, buyer_id: BuyerId, amount: Price) -> Result<(), RejectReason> {
    if amount <= item.current_price {
        return Err(RejectReason::NotAboveCurrentPrice(item.current_price));
    }
    if item.highest_bidder == Some(buyer_id) {
        return Err(RejectReason::AlreadyHighestBidder);
    }
    Ok(())
}
