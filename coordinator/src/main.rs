//! Escrow settlement coordinator daemon (spec §1, §9): wires a
//! [`ChainAdapter`], a [`PersistenceFacade`] and the state engine's
//! [`DispatcherContext`] together, then drives the Sync Loop and the ten
//! Action Dispatchers on independent schedules until the process is killed.

mod config;
mod logging;
mod scheduler;

use std::sync::Arc;

use clap::Parser;
use log::info;

use escrow_chain_adapter::{BlockfrostAdapter, ChainAdapter};
use escrow_engine::DispatcherContext;
use escrow_persistence::{InMemoryFacade, PersistenceFacade, PostgresFacade};

use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    logging::init(&config)?;
    info!("starting escrow-coordinator v{}", escrow_common::config::VERSION);

    let chain: Arc<dyn ChainAdapter> = Arc::new(BlockfrostAdapter::new(
        config.indexer_url.clone(),
        config.indexer_project_id.clone(),
    ));

    let store: Arc<dyn PersistenceFacade> = match &config.database_url {
        Some(url) => {
            info!("connecting to Postgres persistence backend");
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await?;
            Arc::new(PostgresFacade::new(pool))
        }
        None => {
            info!("no ESCROW_DATABASE_URL set, running against the in-memory facade (non-durable)");
            Arc::new(InMemoryFacade::new())
        }
    };

    let mut ctx = DispatcherContext::new(chain, store);
    ctx.max_parallel_tx = config.max_parallel_tx;
    ctx.max_history_levels = config.max_history_levels;
    ctx.max_utxos_per_tx = config.max_utxos_per_tx;
    ctx.block_confirmations_threshold = config.block_confirmations_threshold;
    ctx.lock_timeout_secs = config.lock_timeout_secs;
    ctx.sync_lock_timeout_secs = config.sync_lock_timeout_secs;
    ctx.min_admin_threshold = config.min_admin_threshold;
    ctx.min_collateral_lovelace = config.min_collateral_lovelace;
    let ctx = Arc::new(ctx);

    scheduler::run(ctx, &config).await
}
