// src/config.rs
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::protocol::MonitorPolicy;
use crate::recommender::RecommenderConfig;

/// Auction service with protocol-checked bidding and recommendations
#[derive(Parser, Debug, Clone)]
#[command(name = "auction-service")]
#[command(version)]
pub struct Config {
    /// Address the HTTP server binds to
    #[arg(long, env = "AUCTION_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port the HTTP server listens on
    #[arg(long, env = "AUCTION_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Recommendation oracle host
    #[arg(long, env = "RECOMMENDER_HOST", default_value = "127.0.0.1")]
    pub recommender_host: String,

    /// Recommendation oracle port
    #[arg(long, env = "RECOMMENDER_PORT", default_value_t = 18861)]
    pub recommender_port: u16,

    /// Timeout for connecting to and calling the oracle, in seconds
    #[arg(long, env = "RECOMMENDER_TIMEOUT_SECONDS", default_value_t = 3)]
    pub recommender_timeout_seconds: u64,

    /// What happens to a session whose bidding run has finished: reset or strict
    #[arg(long, env = "MONITOR_POLICY", default_value = "reset")]
    pub monitor_policy: MonitorPolicy,

    /// JSON snapshot to seed the store from; demo data is used when absent
    #[arg(long, env = "SEED_FILE")]
    pub seed_file: Option<PathBuf>,
}

impl Config {
    pub fn recommender(&self) -> RecommenderConfig {
        RecommenderConfig {
            host: self.recommender_host.clone(),
            port: self.recommender_port,
            timeout: Duration::from_secs(self.recommender_timeout_seconds),
        }
    }
}
