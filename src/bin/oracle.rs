use auction_service::oracle::{serve, OracleService};
use auction_service::persistence::{read_snapshot, Store};
use auction_service::recommender::{InteractionSource, MockInteractions};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Reference recommendation oracle
#[derive(Parser, Debug)]
#[command(name = "oracle")]
struct Args {
    #[arg(long, env = "RECOMMENDER_HOST", default_value = "127.0.0.1")]
    host: String,

    #[arg(long, env = "RECOMMENDER_PORT", default_value_t = 18861)]
    port: u16,

    /// Start from the bids in an auction snapshot instead of the built-in data set
    #[arg(long, env = "SEED_FILE")]
    seed_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let source: Box<dyn InteractionSource> = match &args.seed_file {
        Some(path) => {
            let tables = read_snapshot(path).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            Box::new(Store::new(tables))
        }
        None => Box::new(MockInteractions),
    };
    let service = Arc::new(OracleService::new(source.as_ref()));

    let listener = TcpListener::bind((args.host.as_str(), args.port)).await?;
    info!("Recommendation oracle listening on {}:{}", args.host, args.port);
    serve(listener, service).await
}
