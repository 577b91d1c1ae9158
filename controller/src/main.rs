use clap::Parser;

mod config;
mod podgroup;
mod state;

use config::Config;
use podgroup::PgController;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::parse();
    PgController::run(config).await;
}
