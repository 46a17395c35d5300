#![allow(dead_code)]
use auction_service::domain::{BidDecisionEngine, BuyerId, ItemId, PlaceBid, Price, SellerId};
use auction_service::persistence::{NewItem, Store, Tables};
use auction_service::protocol::{Bidding, BiddingState, SessionRegistry};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
// See https://users.rust-lang.org/t/sharing-code-and-macros-in-tests-directory/3098/7

pub const SELLER: SellerId = 1;
pub const BUYER_1: BuyerId = 1;
pub const BUYER_2: BuyerId = 2;
pub const BUYER_3: BuyerId = 3;

pub const COMING_SOON_ITEM: ItemId = 1;
pub const LIVE_ITEM: ItemId = 2;
pub const ENDED_ITEM: ItemId = 3;

pub const COMING_SOON_PRICE: Price = 80.0;
pub const LIVE_PRICE: Price = 50.0;

pub fn sample_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2016, 1, 15, 8, 28, 0).unwrap()
}

pub fn new_item(name: &str, start_time: DateTime<Utc>, duration_seconds: i64, starting_price: Price) -> NewItem {
    NewItem {
        name: name.to_string(),
        description: format!("{} description", name),
        seller_id: SELLER,
        start_time,
        duration_seconds,
        starting_price,
    }
}

/// One seller, three buyers, and one item in each status as seen from `now`.
pub fn sample_tables(now: DateTime<Utc>) -> Tables {
    let mut tables = Tables::default();
    tables.add_seller("seller");
    tables.add_buyer("buyer_1");
    tables.add_buyer("buyer_2");
    tables.add_buyer("buyer_3");

    tables
        .add_item(new_item("coming soon", now + Duration::hours(1), 3600, COMING_SOON_PRICE), now)
        .unwrap();
    tables
        .add_item(new_item("live", now - Duration::seconds(10), 3600, LIVE_PRICE), now)
        .unwrap();
    tables
        .add_item(new_item("ended", now - Duration::hours(3), 3600, 300.0), now)
        .unwrap();
    tables
}

pub fn sample_engine(now: DateTime<Utc>) -> BidDecisionEngine {
    BidDecisionEngine::new(
        Arc::new(Store::new(sample_tables(now))),
        Arc::new(SessionRegistry::<Bidding>::new()),
    )
}

pub fn bid(buyer_id: BuyerId, item_id: ItemId, amount: Price) -> PlaceBid {
    PlaceBid { buyer_id, item_id, amount }
}

/// Current state of a session without resetting it.
pub fn session_state(engine: &BidDecisionEngine, session_id: &str) -> BiddingState {
    engine.sessions().get_or_create(session_id, true).lock().unwrap().state()
}

pub fn bid_count(engine: &BidDecisionEngine) -> usize {
    engine.store().read(|tables| tables.bids().len())
}
