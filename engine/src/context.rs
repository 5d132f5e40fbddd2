use std::sync::Arc;

use escrow_chain_adapter::ChainAdapter;
use escrow_persistence::PersistenceFacade;

/// Shared dependencies threaded through the Sync Loop and every Action
/// Dispatcher. All ten dispatchers and the sync loop borrow the same
/// `DispatcherContext` rather than each owning their own adapter/façade
/// handles, so a coordinator process holds exactly one chain connection pool
/// and one storage pool regardless of how many jobs are scheduled.
#[derive(Clone)]
pub struct DispatcherContext {
    pub chain: Arc<dyn ChainAdapter>,
    pub store: Arc<dyn PersistenceFacade>,
    pub max_parallel_tx: usize,
    pub max_history_levels: usize,
    pub max_utxos_per_tx: usize,
    pub block_confirmations_threshold: u64,
    pub lock_timeout_secs: u64,
    pub sync_lock_timeout_secs: u64,
    pub min_collateral_lovelace: u64,
    pub min_admin_threshold: usize,
}

impl DispatcherContext {
    pub fn new(chain: Arc<dyn ChainAdapter>, store: Arc<dyn PersistenceFacade>) -> Self {
        Self {
            chain,
            store,
            max_parallel_tx: escrow_common::config::DEFAULT_MAX_PARALLEL_TX,
            max_history_levels: escrow_common::config::DEFAULT_MAX_HISTORY_LEVELS,
            max_utxos_per_tx: escrow_common::config::DEFAULT_MAX_UTXOS_PER_TX,
            block_confirmations_threshold: escrow_common::config::DEFAULT_BLOCK_CONFIRMATIONS_THRESHOLD,
            lock_timeout_secs: escrow_common::config::DEFAULT_LOCK_TIMEOUT_SECS,
            sync_lock_timeout_secs: escrow_common::config::DEFAULT_SYNC_LOCK_TIMEOUT_INTERVAL_SECS,
            min_collateral_lovelace: escrow_common::config::MIN_COLLATERAL_LOVELACE,
            min_admin_threshold: escrow_common::config::MIN_ADMIN_THRESHOLD,
        }
    }
}
