mod config;
mod error;
mod extract;
mod pipeline;
mod transform;
mod types;
mod warehouse;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::error::Result;
use crate::extract::{ChromeSession, Extractor, ExtractorSettings};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let warehouse = warehouse::connect(&cfg).await?;
    info!(
        warehouse = ?cfg.warehouse,
        table = %cfg.table_id,
        "Starting crypto listings run against {}",
        cfg.source_url
    );

    let mut session = ChromeSession::launch(&cfg).await?;
    let extractor = Extractor::new(ExtractorSettings::from_config(&cfg));

    pipeline::run_once(&extractor, &mut session, warehouse.as_ref(), &cfg.table_id).await?;
    Ok(())
}
