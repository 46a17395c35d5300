// src/protocol/bidding.rs
//! Buyer / Auction / Seller bidding protocol, projected onto the Auction role.
use std::fmt;

use super::{Direction, Monitor, Protocol, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BiddingState {
    Start,
    BidReceived,
    WaitDecision,
    Confirmed,
    Rejected,
    Done,
}

impl fmt::Display for BiddingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BiddingState::Start => write!(f, "START"),
            BiddingState::BidReceived => write!(f, "BID_RECEIVED"),
            BiddingState::WaitDecision => write!(f, "WAIT_DECISION"),
            BiddingState::Confirmed => write!(f, "CONFIRMED"),
            BiddingState::Rejected => write!(f, "REJECTED"),
            BiddingState::Done => write!(f, "DONE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BiddingEvent {
    /// Buyer -> Auction: Bid()
    RecvBid,
    /// Auction -> Seller: BidInfo()
    SendBidInfo,
    /// Seller -> Auction: Confirm()
    RecvConfirm,
    /// Seller -> Auction: Reject()
    RecvReject,
    /// Auction -> Buyer: AcceptBid()
    SendAcceptBid,
    /// Auction -> Buyer: RejectBid()
    SendRejectBid,
}

impl BiddingEvent {
    pub fn label(&self) -> &'static str {
        match self {
            BiddingEvent::RecvBid => "Bid",
            BiddingEvent::SendBidInfo => "BidInfo",
            BiddingEvent::RecvConfirm => "Confirm",
            BiddingEvent::RecvReject => "Reject",
            BiddingEvent::SendAcceptBid => "AcceptBid",
            BiddingEvent::SendRejectBid => "RejectBid",
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            BiddingEvent::RecvBid | BiddingEvent::RecvConfirm | BiddingEvent::RecvReject => Direction::Recv,
            BiddingEvent::SendBidInfo | BiddingEvent::SendAcceptBid | BiddingEvent::SendRejectBid => Direction::Send,
        }
    }

    pub fn peer(&self) -> Role {
        match self {
            BiddingEvent::RecvBid | BiddingEvent::SendAcceptBid | BiddingEvent::SendRejectBid => Role::Buyer,
            BiddingEvent::SendBidInfo | BiddingEvent::RecvConfirm | BiddingEvent::RecvReject => Role::Seller,
        }
    }
}

impl fmt::Display for BiddingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction() {
            Direction::Recv => write!(f, "recv {}() from {}", self.label(), self.peer()),
            Direction::Send => write!(f, "send {}() to {}", self.label(), self.peer()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bidding;

impl Protocol for Bidding {
    type State = BiddingState;
    type Event = BiddingEvent;

    const NAME: &'static str = "Bidding";
    const INITIAL: BiddingState = BiddingState::Start;
    const TERMINAL: BiddingState = BiddingState::Done;
    const TRANSITIONS: &'static [(BiddingState, BiddingEvent, BiddingState)] = &[
        (BiddingState::Start, BiddingEvent::RecvBid, BiddingState::BidReceived),
        (BiddingState::BidReceived, BiddingEvent::SendBidInfo, BiddingState::WaitDecision),
        (BiddingState::WaitDecision, BiddingEvent::RecvConfirm, BiddingState::Confirmed),
        (BiddingState::WaitDecision, BiddingEvent::RecvReject, BiddingState::Rejected),
        (BiddingState::Confirmed, BiddingEvent::SendAcceptBid, BiddingState::Done),
        (BiddingState::Rejected, BiddingEvent::SendRejectBid, BiddingState::Done),
    ];
}

pub type BiddingMonitor = Monitor<Bidding>;
