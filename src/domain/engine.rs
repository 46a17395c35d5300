// src/domain/engine.rs
use chrono::{DateTime, Utc};
use log::{debug, info};
use std::sync::{Arc, PoisonError};
use thiserror::Error;

use super::bids::{BidStatus, Decision};
use super::core::{BidId, DomainError, NotFound};
use super::items::{auto_accept, ItemStatus};
use super::outcomes::{BidOutcome, DecisionOutcome, PlaceBid};
use crate::persistence::{Store, Tables};
use crate::protocol::{Bidding, BiddingEvent, BiddingMonitor, ProtocolViolation, SessionRegistry};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    NotFound(#[from] NotFound),

    #[error(transparent)]
    Protocol(#[from] ProtocolViolation),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Applies the auction rules and drives the Bidding protocol for each session.
///
/// Every event that guards a mutation is handled on a scratch copy of the
/// session's monitor inside the store transaction, before commit. The copy is
/// written back only once the transaction has committed, so a violation or a
/// domain error leaves neither the tables nor the monitor changed.
#[derive(Clone)]
pub struct BidDecisionEngine {
    store: Arc<Store>,
    sessions: Arc<SessionRegistry<Bidding>>,
}

impl BidDecisionEngine {
    pub fn new(store: Arc<Store>, sessions: Arc<SessionRegistry<Bidding>>) -> Self {
        BidDecisionEngine { store, sessions }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry<Bidding>> {
        &self.sessions
    }

    pub fn place_bid(
        &self,
        session_id: &str,
        strict: bool,
        request: PlaceBid,
        now: DateTime<Utc>,
    ) -> Result<BidOutcome, EngineError> {
        let shared = self.sessions.get_or_create(session_id, strict);
        let mut monitor = shared.lock().unwrap_or_else(PoisonError::into_inner);
        let outcome = self.place_bid_with(&mut monitor, request, now)?;
        info!("session {}: bid {} -> {:?}", session_id, outcome.bid_id(), monitor.state());
        Ok(outcome)
    }

    pub fn decide_bid(
        &self,
        session_id: &str,
        strict: bool,
        bid_id: BidId,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, EngineError> {
        let shared = self.sessions.get_or_create(session_id, strict);
        let mut monitor = shared.lock().unwrap_or_else(PoisonError::into_inner);
        let outcome = self.decide_bid_with(&mut monitor, bid_id, decision, now)?;
        info!("session {}: decision {:?} on bid {}", session_id, decision, bid_id);
        Ok(outcome)
    }

    pub fn place_bid_with(
        &self,
        monitor: &mut BiddingMonitor,
        request: PlaceBid,
        now: DateTime<Utc>,
    ) -> Result<BidOutcome, EngineError> {
        let PlaceBid { buyer_id, item_id, amount } = request;

        self.store.read(|tables| -> Result<(), NotFound> {
            tables.buyer(buyer_id)?;
            tables.item(item_id)?;
            Ok(())
        })?;

        // Violations win over business rules and are reported before anything is written.
        monitor.check(BiddingEvent::RecvBid)?;

        let mut run = *monitor;
        let outcome = self.store.transaction(|tables| -> Result<BidOutcome, EngineError> {
            let status = tables.refresh_item_status(item_id, now)?;
            let seller_id = tables.item(item_id)?.seller_id;
            match status {
                ItemStatus::Ended => Err(DomainError::AuctionEnded(item_id).into()),
                ItemStatus::ComingSoon => {
                    run.handle(BiddingEvent::RecvBid)?;
                    let bid_id = tables.insert_bid(buyer_id, item_id, amount, now);
                    run.handle(BiddingEvent::SendBidInfo)?;
                    Ok(BidOutcome::PendingSellerDecision { bid_id, buyer_id, seller_id, item_id, amount })
                }
                ItemStatus::Live => {
                    let verdict = auto_accept(tables.item(item_id)?, buyer_id, amount);
                    run.handle(BiddingEvent::RecvBid)?;
                    let bid_id = tables.insert_bid(buyer_id, item_id, amount, now);
                    run.handle(BiddingEvent::SendBidInfo)?;
                    match verdict {
                        Ok(()) => {
                            run.handle(BiddingEvent::RecvConfirm)?;
                            accept_live_bid(tables, bid_id)
                        }
                        Err(reason) => {
                            run.handle(BiddingEvent::RecvReject)?;
                            tables.bid_mut(bid_id)?.resolve(BidStatus::Rejected)?;
                            let item = tables.item(item_id)?;
                            Ok(BidOutcome::Rejected {
                                reason: reason.to_string(),
                                bid_id,
                                buyer_id,
                                seller_id,
                                item_id,
                                amount,
                                current_price: item.current_price,
                                highest_bidder_id: item.highest_bidder,
                            })
                        }
                    }
                }
            }
        })?;

        match outcome {
            BidOutcome::Accepted { .. } => run.handle(BiddingEvent::SendAcceptBid)?,
            BidOutcome::Rejected { .. } => run.handle(BiddingEvent::SendRejectBid)?,
            BidOutcome::PendingSellerDecision { .. } => {}
        }
        *monitor = run;
        Ok(outcome)
    }

    pub fn decide_bid_with(
        &self,
        monitor: &mut BiddingMonitor,
        bid_id: BidId,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, EngineError> {
        self.store.transaction(|tables| -> Result<(), NotFound> {
            let item_id = tables.bid(bid_id)?.item_id;
            tables.refresh_item_status(item_id, now)?;
            Ok(())
        })?;
        self.store.read(|tables| ensure_decidable(tables, bid_id))?;

        let mut run = *monitor;
        let outcome = match decision {
            Decision::Confirm => {
                run.handle(BiddingEvent::RecvConfirm)?;
                let outcome = self.store.transaction(|tables| confirm_direct_sale(tables, bid_id, now))?;
                run.handle(BiddingEvent::SendAcceptBid)?;
                outcome
            }
            Decision::Reject => {
                run.handle(BiddingEvent::RecvReject)?;
                let outcome = self.store.transaction(|tables| -> Result<DecisionOutcome, EngineError> {
                    lock_decidable(tables, bid_id, now)?;
                    let bid = tables.bid_mut(bid_id)?;
                    bid.resolve(BidStatus::Rejected)?;
                    Ok(DecisionOutcome::Rejected { bid_id, item_id: bid.item_id })
                })?;
                run.handle(BiddingEvent::SendRejectBid)?;
                outcome
            }
        };
        *monitor = run;
        Ok(outcome)
    }
}

/// Seller decisions only apply to a PENDING bid on a COMING_SOON item.
fn ensure_decidable(tables: &Tables, bid_id: BidId) -> Result<(), EngineError> {
    let bid = tables.bid(bid_id)?;
    let item = tables.item(bid.item_id)?;
    if item.status != ItemStatus::ComingSoon {
        return Err(DomainError::NotComingSoon(item.id).into());
    }
    if !bid.is_pending() {
        return Err(DomainError::BidNotPending(bid_id, bid.status).into());
    }
    Ok(())
}

/// Re-validates inside a transaction; a concurrent decision or the clock may
/// have moved the item on since the first check.
fn lock_decidable(tables: &mut Tables, bid_id: BidId, now: DateTime<Utc>) -> Result<(), EngineError> {
    let item_id = tables.bid(bid_id)?.item_id;
    tables.refresh_item_status(item_id, now)?;
    ensure_decidable(tables, bid_id)
}

fn accept_live_bid(tables: &mut Tables, bid_id: BidId) -> Result<BidOutcome, EngineError> {
    let bid = tables.bid_mut(bid_id)?;
    bid.resolve(BidStatus::Accepted)?;
    let (buyer_id, item_id, amount) = (bid.buyer_id, bid.item_id, bid.amount);

    let item = tables.item_mut(item_id)?;
    item.raise_price(amount);
    item.highest_bidder = Some(buyer_id);

    Ok(BidOutcome::Accepted {
        bid_id,
        buyer_id,
        seller_id: item.seller_id,
        item_id,
        amount,
        current_price: item.current_price,
        highest_bidder_id: buyer_id,
    })
}

/// First confirmed bid ends a direct-sale listing and closes every other pending bid.
fn confirm_direct_sale(tables: &mut Tables, bid_id: BidId, now: DateTime<Utc>) -> Result<DecisionOutcome, EngineError> {
    lock_decidable(tables, bid_id, now)?;

    let bid = tables.bid_mut(bid_id)?;
    bid.resolve(BidStatus::Accepted)?;
    let (buyer_id, item_id, amount) = (bid.buyer_id, bid.item_id, bid.amount);

    let item = tables.item_mut(item_id)?;
    item.raise_price(amount);
    item.highest_bidder = Some(buyer_id);
    item.status = ItemStatus::Ended;
    let (current_price, highest_bidder_id, item_status) = (item.current_price, item.highest_bidder, item.status);

    let rejected_bids = tables.reject_other_pending(item_id, bid_id);
    debug!("item {} sold to buyer {}, {} other bids rejected", item_id, buyer_id, rejected_bids);

    Ok(DecisionOutcome::AcceptedAndEnded {
        bid_id,
        item_id,
        amount,
        current_price,
        highest_bidder_id,
        item_status,
        rejected_bids,
    })
}
