use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use auction_service::config::Config;
use auction_service::persistence::{demo_tables, read_snapshot};
use auction_service::web::app::{configure_app, init_app_state};
use chrono::Utc;
use clap::Parser;
use log::{info, warn};

// Main application
pub async fn run_app(config: Config) -> std::io::Result<()> {
    let tables = match &config.seed_file {
        Some(path) => read_snapshot(path).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?,
        None => demo_tables(Utc::now()),
    };
    info!(
        "Loaded {} items, {} buyers, {} sellers",
        tables.items().len(),
        tables.buyers().len(),
        tables.sellers().len()
    );

    let app_state = init_app_state(tables, config.recommender(), config.monitor_policy);

    // Warmup is an optimisation; the oracle may come up later.
    match app_state.recommender.warmup().await {
        Ok(_) => info!("Recommender at {}:{} is warm", config.recommender_host, config.recommender_port),
        Err(err) => warn!("Recommender warmup failed: {}", err),
    }

    info!("Starting server on {}:{} (monitor policy {:?})", config.host, config.port, config.monitor_policy);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(Logger::default())
            .configure(configure_app)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info,actix_web=info")).init();
    run_app(Config::parse()).await
}
