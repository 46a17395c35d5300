// src/persistence/store.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use crate::domain::{
    Bid, BidId, BidStatus, Buyer, BuyerId, Item, ItemId, ItemStatus, NotFound, Price, Seller, SellerId,
};
use crate::recommender::{Interaction, InteractionSource};

/// New listing as supplied by a seller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub seller_id: SellerId,
    pub start_time: DateTime<Utc>,
    pub duration_seconds: i64,
    pub starting_price: Price,
}

/// Every row the service keeps.
///
/// Rows are read through the accessors and changed only through methods, so
/// an open transaction can record each row before its first change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tables {
    buyers: BTreeMap<BuyerId, Buyer>,
    sellers: BTreeMap<SellerId, Seller>,
    items: BTreeMap<ItemId, Item>,
    bids: BTreeMap<BidId, Bid>,
    #[serde(skip)]
    undo: Option<UndoLog>,
}

/// Prior value of every row touched by the open transaction; `None` marks a
/// row the transaction inserted.
#[derive(Debug, Clone, Default, PartialEq)]
struct UndoLog {
    buyers: BTreeMap<BuyerId, Option<Buyer>>,
    sellers: BTreeMap<SellerId, Option<Seller>>,
    items: BTreeMap<ItemId, Option<Item>>,
    bids: BTreeMap<BidId, Option<Bid>>,
}

fn next_id<V>(rows: &BTreeMap<i64, V>) -> i64 {
    rows.keys().next_back().map_or(1, |last| last + 1)
}

// First touch wins: later changes in the same transaction keep the original.
fn remember<V: Clone>(log: &mut BTreeMap<i64, Option<V>>, rows: &BTreeMap<i64, V>, id: i64) {
    log.entry(id).or_insert_with(|| rows.get(&id).cloned());
}

fn restore<V>(rows: &mut BTreeMap<i64, V>, log: BTreeMap<i64, Option<V>>) {
    for (id, prior) in log {
        match prior {
            Some(row) => rows.insert(id, row),
            None => rows.remove(&id),
        };
    }
}

impl Tables {
    pub fn buyers(&self) -> &BTreeMap<BuyerId, Buyer> {
        &self.buyers
    }

    pub fn sellers(&self) -> &BTreeMap<SellerId, Seller> {
        &self.sellers
    }

    pub fn items(&self) -> &BTreeMap<ItemId, Item> {
        &self.items
    }

    pub fn bids(&self) -> &BTreeMap<BidId, Bid> {
        &self.bids
    }

    pub fn add_buyer(&mut self, username: &str) -> BuyerId {
        let id = next_id(&self.buyers);
        if let Some(log) = &mut self.undo {
            remember(&mut log.buyers, &self.buyers, id);
        }
        self.buyers.insert(id, Buyer { id, username: username.to_string() });
        id
    }

    pub fn add_seller(&mut self, username: &str) -> SellerId {
        let id = next_id(&self.sellers);
        if let Some(log) = &mut self.undo {
            remember(&mut log.sellers, &self.sellers, id);
        }
        self.sellers.insert(id, Seller { id, username: username.to_string() });
        id
    }

    pub fn add_item(&mut self, item: NewItem, now: DateTime<Utc>) -> Result<ItemId, NotFound> {
        self.seller(item.seller_id)?;
        let id = next_id(&self.items);
        let mut row = Item {
            id,
            name: item.name,
            description: item.description,
            seller_id: item.seller_id,
            status: ItemStatus::ComingSoon,
            start_time: item.start_time,
            duration_seconds: item.duration_seconds,
            starting_price: item.starting_price,
            current_price: item.starting_price,
            highest_bidder: None,
        };
        row.refresh_status(now);
        if let Some(log) = &mut self.undo {
            remember(&mut log.items, &self.items, id);
        }
        self.items.insert(id, row);
        Ok(id)
    }

    pub fn insert_bid(&mut self, buyer_id: BuyerId, item_id: ItemId, amount: Price, at: DateTime<Utc>) -> BidId {
        let id = next_id(&self.bids);
        if let Some(log) = &mut self.undo {
            remember(&mut log.bids, &self.bids, id);
        }
        self.bids.insert(
            id,
            Bid {
                id,
                buyer_id,
                item_id,
                amount,
                timestamp: at,
                status: BidStatus::Pending,
            },
        );
        id
    }

    pub fn buyer(&self, id: BuyerId) -> Result<&Buyer, NotFound> {
        self.buyers.get(&id).ok_or(NotFound::Buyer(id))
    }

    pub fn seller(&self, id: SellerId) -> Result<&Seller, NotFound> {
        self.sellers.get(&id).ok_or(NotFound::Seller(id))
    }

    pub fn item(&self, id: ItemId) -> Result<&Item, NotFound> {
        self.items.get(&id).ok_or(NotFound::Item(id))
    }

    pub fn item_mut(&mut self, id: ItemId) -> Result<&mut Item, NotFound> {
        if let (Some(log), true) = (&mut self.undo, self.items.contains_key(&id)) {
            remember(&mut log.items, &self.items, id);
        }
        self.items.get_mut(&id).ok_or(NotFound::Item(id))
    }

    pub fn bid(&self, id: BidId) -> Result<&Bid, NotFound> {
        self.bids.get(&id).ok_or(NotFound::Bid(id))
    }

    pub fn bid_mut(&mut self, id: BidId) -> Result<&mut Bid, NotFound> {
        if let (Some(log), true) = (&mut self.undo, self.bids.contains_key(&id)) {
            remember(&mut log.bids, &self.bids, id);
        }
        self.bids.get_mut(&id).ok_or(NotFound::Bid(id))
    }

    /// Newest first.
    pub fn bids_for_item(&self, item_id: ItemId) -> Vec<&Bid> {
        let mut bids: Vec<&Bid> = self.bids.values().filter(|bid| bid.item_id == item_id).collect();
        bids.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        bids
    }

    /// Rejects every pending bid on the item except `keep`. Returns how many changed.
    pub fn reject_other_pending(&mut self, item_id: ItemId, keep: BidId) -> usize {
        let losers: Vec<BidId> = self
            .bids
            .values()
            .filter(|bid| bid.item_id == item_id && bid.id != keep && bid.is_pending())
            .map(|bid| bid.id)
            .collect();
        let mut rejected = 0;
        for id in losers {
            if let Ok(bid) = self.bid_mut(id) {
                if bid.resolve(BidStatus::Rejected).is_ok() {
                    rejected += 1;
                }
            }
        }
        rejected
    }

    pub fn refresh_item_status(&mut self, item_id: ItemId, now: DateTime<Utc>) -> Result<ItemStatus, NotFound> {
        let item = self.item_mut(item_id)?;
        item.refresh_status(now);
        Ok(item.status)
    }

    pub fn refresh_statuses(&mut self, now: DateTime<Utc>) -> usize {
        let stale: Vec<ItemId> = self
            .items
            .values()
            .filter(|item| item.status_at(now) != item.status)
            .map(|item| item.id)
            .collect();
        let mut changed = 0;
        for id in stale {
            if let Ok(item) = self.item_mut(id) {
                if item.refresh_status(now) {
                    changed += 1;
                }
            }
        }
        changed
    }

    fn begin(&mut self) {
        self.undo = Some(UndoLog::default());
    }

    fn commit(&mut self) {
        self.undo = None;
    }

    fn rollback(&mut self) {
        if let Some(log) = self.undo.take() {
            restore(&mut self.buyers, log.buyers);
            restore(&mut self.sellers, log.sellers);
            restore(&mut self.items, log.items);
            restore(&mut self.bids, log.bids);
        }
    }
}

/// Rolls back whatever the transaction did unless it committed, including
/// when the transaction body panics.
struct Transaction<'a> {
    tables: &'a mut Tables,
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        self.tables.rollback();
    }
}

/// Transactional in-memory store.
///
/// One mutex guards all tables; a transaction holds it from its first read to
/// commit, which gives every item and bid row a pessimistic lock for the
/// duration. Rows a transaction changes are logged first and put back unless
/// the transaction returns `Ok`.
#[derive(Debug, Default)]
pub struct Store {
    tables: Mutex<Tables>,
}

impl Store {
    pub fn new(tables: Tables) -> Self {
        Store { tables: Mutex::new(tables) }
    }

    pub fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
        let tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        f(&tables)
    }

    pub fn transaction<T, E>(&self, f: impl FnOnce(&mut Tables) -> Result<T, E>) -> Result<T, E> {
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        tables.begin();
        let mut txn = Transaction { tables: &mut *tables };
        let result = f(&mut *txn.tables);
        if result.is_ok() {
            txn.tables.commit();
        }
        result
    }

    pub fn snapshot(&self) -> Tables {
        self.read(Tables::clone)
    }
}

impl InteractionSource for Store {
    /// Every bid with a positive amount becomes `{buyer, item, rating = amount}`.
    fn interactions(&self) -> Vec<Interaction> {
        self.read(|tables| {
            tables
                .bids
                .values()
                .filter(|bid| bid.amount > 0.0)
                .map(|bid| Interaction {
                    user_id: bid.buyer_id,
                    item_id: bid.item_id,
                    rating: bid.amount,
                })
                .collect()
        })
    }
}
