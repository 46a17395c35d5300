// src/oracle/mod.rs
//! Reference recommendation oracle speaking the same wire protocol as the client.
//!
//! Scores are simple co-rating counts; they only need to be stable and in `(0, 1]`.
pub mod server;

use log::{debug, info};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::domain::{BuyerId, ItemId};
use crate::recommender::wire::{self, RpcRequest, RpcResponse};
use crate::recommender::{Interaction, InteractionSource, Recommendation};

pub use self::server::{serve, serve_connection, serve_connection_limited};

pub const DEFAULT_TOP_N: usize = 10;

pub struct OracleService {
    interactions: RwLock<Vec<Interaction>>,
    warmed: AtomicBool,
}

impl OracleService {
    pub fn new(source: &dyn InteractionSource) -> Self {
        OracleService {
            interactions: RwLock::new(source.interactions()),
            warmed: AtomicBool::new(false),
        }
    }

    pub fn warmup(&self) -> bool {
        if !self.warmed.swap(true, Ordering::SeqCst) {
            info!("oracle warmed up with {} interactions", self.snapshot().len());
        }
        true
    }

    pub fn is_warm(&self) -> bool {
        self.warmed.load(Ordering::SeqCst)
    }

    /// Replaces the active data set with a pushed snapshot.
    pub fn load_interactions(&self, rows: Vec<Interaction>) -> bool {
        debug!("oracle loaded {} interactions", rows.len());
        *self.interactions.write().unwrap_or_else(PoisonError::into_inner) = rows;
        true
    }

    pub fn snapshot(&self) -> Vec<Interaction> {
        self.interactions.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn recommend_for_user(&self, user_id: BuyerId, top_n: usize) -> Vec<Recommendation> {
        let rows = self.snapshot();
        let seen: BTreeSet<ItemId> = rows.iter().filter(|r| r.user_id == user_id).map(|r| r.item_id).collect();
        let neighbours: BTreeSet<BuyerId> = rows
            .iter()
            .filter(|r| r.user_id != user_id && seen.contains(&r.item_id))
            .map(|r| r.user_id)
            .collect();

        let mut scores: BTreeMap<ItemId, f64> = BTreeMap::new();
        for row in &rows {
            let counts = if neighbours.is_empty() {
                row.user_id != user_id
            } else {
                neighbours.contains(&row.user_id)
            };
            if counts && !seen.contains(&row.item_id) {
                *scores.entry(row.item_id).or_insert(0.0) += row.rating.max(0.0);
            }
        }
        rank(scores, top_n)
    }

    pub fn similar_items(&self, item_id: ItemId, top_n: usize) -> Vec<Recommendation> {
        let rows = self.snapshot();
        let raters: BTreeSet<BuyerId> = rows.iter().filter(|r| r.item_id == item_id).map(|r| r.user_id).collect();
        if raters.is_empty() {
            return Vec::new();
        }

        let mut co_raters: BTreeMap<ItemId, BTreeSet<BuyerId>> = BTreeMap::new();
        for row in rows.iter().filter(|r| r.item_id != item_id && raters.contains(&r.user_id)) {
            co_raters.entry(row.item_id).or_default().insert(row.user_id);
        }
        let scores = co_raters
            .into_iter()
            .map(|(other, users)| (other, users.len() as f64))
            .collect();
        rank(scores, top_n)
    }

    pub fn dispatch(&self, request: RpcRequest) -> RpcResponse {
        let RpcRequest { id, method, params } = request;
        let result = match method.as_str() {
            wire::WARMUP => Ok(json!(self.warmup())),
            wire::LOAD_INTERACTIONS => params
                .first()
                .cloned()
                .map_or(Ok(Vec::new()), serde_json::from_value::<Vec<Interaction>>)
                .map(|rows| json!(self.load_interactions(rows)))
                .map_err(|err| format!("invalid interactions: {}", err)),
            wire::RECOMMEND_FOR_USER | "get_recommendations_for_user" => int_param(&params, 0)
                .map(|user_id| json!(self.recommend_for_user(user_id, top_n_param(&params)))),
            wire::SIMILAR_ITEMS | "get_similar_items" => int_param(&params, 0)
                .map(|item_id| json!(self.similar_items(item_id, top_n_param(&params)))),
            other => Err(format!("unknown method: {}", other)),
        };
        match result {
            Ok(value) => RpcResponse::ok(id, value),
            Err(message) => RpcResponse::err(id, message),
        }
    }
}

/// Normalises by the best score and orders by score, then item id.
fn rank(scores: BTreeMap<ItemId, f64>, top_n: usize) -> Vec<Recommendation> {
    let best = scores.values().cloned().fold(0.0_f64, f64::max);
    if best <= 0.0 {
        return Vec::new();
    }
    let mut ranked: Vec<Recommendation> = scores
        .into_iter()
        .filter(|(_, score)| *score > 0.0)
        .map(|(item_id, score)| Recommendation { item_id, score: score / best })
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.item_id.cmp(&b.item_id)));
    ranked.truncate(top_n);
    ranked
}

fn int_param(params: &[Value], index: usize) -> Result<i64, String> {
    params
        .get(index)
        .and_then(Value::as_i64)
        .ok_or_else(|| format!("parameter {} must be an integer", index))
}

fn top_n_param(params: &[Value]) -> usize {
    params
        .get(1)
        .and_then(Value::as_u64)
        .map_or(DEFAULT_TOP_N, |n| n as usize)
}
