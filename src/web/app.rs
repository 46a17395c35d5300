use actix_web::{web, HttpResponse, Result};
use chrono::Utc;
use std::sync::Arc;

use crate::domain::{BidId, BuyerId, ItemId, SellerId};
use crate::persistence::{Store, Tables};
use crate::protocol::MonitorPolicy;
use crate::recommender::{RecommenderClient, RecommenderConfig};
use super::error::ApiError;
use super::types::{
    AppState, AuctionBid, AuctionDetail, AuctionItem, AuctionList, AuctionState, DecideBidRequest, PlaceBidRequest,
    RecommendationsResponse, SellerAuction, SellerAuctions, SessionReply, SimilarItemsResponse, StatusQuery,
    StrictQuery, TopNQuery, DEFAULT_TOP_N,
};

// Initialize application state
pub fn init_app_state(tables: Tables, recommender: RecommenderConfig, policy: MonitorPolicy) -> AppState {
    AppState::new(
        Arc::new(Store::new(tables)),
        Arc::new(RecommenderClient::new(recommender)),
        policy,
    )
}

fn strict_for(data: &AppState, query: &StrictQuery) -> bool {
    data.policy.for_request(query.is_strict()).is_strict()
}

// Place a bid on an item within a protocol session
async fn place_bid(
    query: web::Query<StrictQuery>,
    bid_req: web::Json<PlaceBidRequest>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let (session_id, request) = bid_req.into_inner().validate()?;
    let strict = strict_for(&data, &query);

    let outcome = data.engine.place_bid(&session_id, strict, request, Utc::now())?;
    Ok(HttpResponse::Ok().json(SessionReply { session_id, outcome }))
}

// Seller decision on a pending direct-sale bid
async fn decide_bid(
    path: web::Path<BidId>,
    query: web::Query<StrictQuery>,
    decision_req: web::Json<DecideBidRequest>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let bid_id = path.into_inner();
    let (session_id, decision) = decision_req.into_inner().validate()?;
    let strict = strict_for(&data, &query);

    let outcome = data.engine.decide_bid(&session_id, strict, bid_id, decision, Utc::now())?;
    Ok(HttpResponse::Ok().json(SessionReply { session_id, outcome }))
}

async fn recommend_for_user(
    path: web::Path<BuyerId>,
    query: web::Query<TopNQuery>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    let top_n = query.top_n.unwrap_or(DEFAULT_TOP_N);
    let store: &Store = data.store();

    let recommendations = data
        .recommender
        .get_recommendations_for_user(store, user_id, top_n)
        .await?;
    Ok(HttpResponse::Ok().json(RecommendationsResponse { user_id, top_n, recommendations }))
}

async fn similar_items(
    path: web::Path<ItemId>,
    query: web::Query<TopNQuery>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let item_id = path.into_inner();
    let top_n = query.top_n.unwrap_or(DEFAULT_TOP_N);

    let similar = data.recommender.get_similar_items(item_id, top_n).await?;
    Ok(HttpResponse::Ok().json(SimilarItemsResponse { item_id, top_n, similar }))
}

// Get all auctions, newest first, optionally filtered by status
async fn get_auctions(query: web::Query<StatusQuery>, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let now = Utc::now();
    let auctions = data.store().transaction(|tables| -> Result<Vec<AuctionItem>, ApiError> {
        tables.refresh_statuses(now);
        let tables: &Tables = tables;
        Ok(tables
            .items()
            .values()
            .rev()
            .filter(|item| query.status.map_or(true, |status| item.status == status))
            .map(|item| AuctionItem::new(tables, item, now))
            .collect())
    })?;
    Ok(HttpResponse::Ok().json(AuctionList { auctions }))
}

// Get one auction with its ten most recent bids
async fn get_auction_state(path: web::Path<ItemId>, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let item_id = path.into_inner();
    let now = Utc::now();

    let state = data.store().transaction(|tables| -> Result<AuctionState, ApiError> {
        tables.refresh_item_status(item_id, now)?;
        let tables: &Tables = tables;
        let item = tables.item(item_id)?;
        Ok(AuctionState {
            item: AuctionDetail {
                summary: AuctionItem::new(tables, item, now),
                description: item.description.clone(),
            },
            recent_bids: tables
                .bids_for_item(item_id)
                .into_iter()
                .take(10)
                .map(|bid| AuctionBid::new(tables, bid))
                .collect(),
        })
    })?;
    Ok(HttpResponse::Ok().json(state))
}

// Get a seller's auctions with the bids still waiting for a decision
async fn get_seller_auctions(path: web::Path<SellerId>, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let seller_id = path.into_inner();
    let now = Utc::now();

    let listing = data.store().transaction(|tables| -> Result<SellerAuctions, ApiError> {
        let seller = tables.seller(seller_id)?.username.clone();
        tables.refresh_statuses(now);
        let tables: &Tables = tables;
        let auctions = tables
            .items()
            .values()
            .rev()
            .filter(|item| item.seller_id == seller_id)
            .map(|item| SellerAuction {
                summary: AuctionItem::new(tables, item, now),
                pending_bids: tables
                    .bids_for_item(item.id)
                    .into_iter()
                    .filter(|bid| bid.is_pending())
                    .map(|bid| AuctionBid::new(tables, bid))
                    .collect(),
            })
            .collect();
        Ok(SellerAuctions { seller, auctions })
    })?;
    Ok(HttpResponse::Ok().json(listing))
}

async fn use_post() -> Result<HttpResponse, ApiError> {
    Err(ApiError::MethodNotAllowed("POST"))
}

async fn use_get() -> Result<HttpResponse, ApiError> {
    Err(ApiError::MethodNotAllowed("GET"))
}

// Configure routes
pub fn configure_app(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| ApiError::Validation(err.to_string()).into()))
        .app_data(web::QueryConfig::default().error_handler(|err, _req| ApiError::Validation(err.to_string()).into()))
        .app_data(web::PathConfig::default().error_handler(|err, _req| ApiError::Validation(err.to_string()).into()))
        .service(
            web::resource("/bid/place/")
                .route(web::post().to(place_bid))
                .default_service(web::to(use_post)),
        )
        .service(
            web::resource("/bid/{bid_id}/decision/")
                .route(web::post().to(decide_bid))
                .default_service(web::to(use_post)),
        )
        .service(
            web::resource("/recommend/similar/{item_id}/")
                .route(web::get().to(similar_items))
                .default_service(web::to(use_get)),
        )
        .service(
            web::resource("/recommend/{user_id}/")
                .route(web::get().to(recommend_for_user))
                .default_service(web::to(use_get)),
        )
        .service(
            web::resource("/api/auctions/")
                .route(web::get().to(get_auctions))
                .default_service(web::to(use_get)),
        )
        .service(
            web::resource("/api/auction/{item_id}/state/")
                .route(web::get().to(get_auction_state))
                .default_service(web::to(use_get)),
        )
        .service(
            web::resource("/api/seller/{seller_id}/auctions/")
                .route(web::get().to(get_seller_auctions))
                .default_service(web::to(use_get)),
        );
}
