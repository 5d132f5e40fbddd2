//! Recognized CLI/environment options (spec §6). Every field has a default
//! drawn from `escrow_common::config`; operators override per-deployment
//! values either as flags or as the matching `ESCROW_*` environment
//! variable (clap's `env` feature wires both to the same field).

use clap::Parser;

#[derive(Parser, Clone, Debug)]
#[command(name = "escrow-coordinator")]
#[command(about = "Escrow settlement coordinator: syncs on-chain state and dispatches escrow transactions")]
#[command(version)]
pub struct Config {
    /// Postgres connection string. When absent the coordinator runs against
    /// an in-process, non-persistent store — useful for demos and tests,
    /// never for production (spec §4.5 durability requirement).
    #[arg(long, env = "ESCROW_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Base URL of the Blockfrost-compatible indexer (spec §4.1).
    #[arg(long, env = "ESCROW_INDEXER_URL", default_value = "https://cardano-mainnet.blockfrost.io/api/v0")]
    pub indexer_url: String,

    /// Indexer API project id, sent as the `project_id` header.
    #[arg(long, env = "ESCROW_INDEXER_PROJECT_ID")]
    pub indexer_project_id: String,

    /// How often the Sync Loop runs, per payment source.
    #[arg(long, env = "ESCROW_SYNC_INTERVAL_SECS", default_value_t = 20)]
    pub sync_interval_secs: u64,

    /// How often each Action Dispatcher runs its cycle.
    #[arg(long, env = "ESCROW_DISPATCH_INTERVAL_SECS", default_value_t = 15)]
    pub dispatch_interval_secs: u64,

    #[arg(long, env = "ESCROW_MAX_PARALLEL_TX", default_value_t = escrow_common::config::DEFAULT_MAX_PARALLEL_TX)]
    pub max_parallel_tx: usize,

    #[arg(long, env = "ESCROW_MAX_HISTORY_LEVELS", default_value_t = escrow_common::config::DEFAULT_MAX_HISTORY_LEVELS)]
    pub max_history_levels: usize,

    #[arg(long, env = "ESCROW_MAX_UTXOS_PER_TX", default_value_t = escrow_common::config::DEFAULT_MAX_UTXOS_PER_TX)]
    pub max_utxos_per_tx: usize,

    #[arg(long, env = "ESCROW_BLOCK_CONFIRMATIONS_THRESHOLD", default_value_t = escrow_common::config::DEFAULT_BLOCK_CONFIRMATIONS_THRESHOLD)]
    pub block_confirmations_threshold: u64,

    #[arg(long, env = "ESCROW_LOCK_TIMEOUT_SECS", default_value_t = escrow_common::config::DEFAULT_LOCK_TIMEOUT_SECS)]
    pub lock_timeout_secs: u64,

    #[arg(long, env = "ESCROW_SYNC_LOCK_TIMEOUT_SECS", default_value_t = escrow_common::config::DEFAULT_SYNC_LOCK_TIMEOUT_INTERVAL_SECS)]
    pub sync_lock_timeout_secs: u64,

    #[arg(long, env = "ESCROW_MIN_ADMIN_THRESHOLD", default_value_t = escrow_common::config::MIN_ADMIN_THRESHOLD)]
    pub min_admin_threshold: usize,

    #[arg(long, env = "ESCROW_MIN_COLLATERAL_LOVELACE", default_value_t = escrow_common::config::MIN_COLLATERAL_LOVELACE)]
    pub min_collateral_lovelace: u64,

    /// `off` | `error` | `warn` | `info` | `debug` | `trace`.
    #[arg(long, env = "ESCROW_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}
