//! Recognized configuration options (spec §6) and their defaults. Unknown
//! options are ignored by whatever layer parses them (the coordinator
//! binary); this module only defines the ones the engine itself consults.

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Minimum collateral a purchase escrow must return to the buyer, in lovelace.
pub const MIN_COLLATERAL_LOVELACE: u64 = 5_000_000;

/// A tx with fewer confirmations than this gates all later txs in the same
/// sync batch (0 disables the block-confirmation lookup entirely).
pub const DEFAULT_BLOCK_CONFIRMATIONS_THRESHOLD: u64 = 3;

/// `sync_in_progress` flags older than this are considered stale and may be
/// reclaimed by another sync cycle.
pub const DEFAULT_SYNC_LOCK_TIMEOUT_INTERVAL_SECS: u64 = 180;

/// Batch size for parallel `get_tx` fetches and for dispatcher fan-out.
pub const DEFAULT_MAX_PARALLEL_TX: usize = 10;

/// How many ancestor hops the Sync Loop walks looking for a legitimate
/// successor transaction (spec §4.3.2).
pub const DEFAULT_MAX_HISTORY_LEVELS: usize = 20;

/// Hot wallet locks older than this may be reclaimed by any dispatcher.
pub const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 600;

/// Largest-first coin selection is truncated to this many UTXOs per tx.
pub const DEFAULT_MAX_UTXOS_PER_TX: usize = 10;

/// Adapter call timeout (spec §5).
pub const DEFAULT_ADAPTER_OPERATION_TIMEOUT_SECS: u64 = 30;

/// Validity window padding applied to every authored transaction (spec §4.4).
pub const TX_VALIDITY_WINDOW_SECS: u64 = 150;

/// Minimum admin multisig threshold (spec §4.4: Authorize/WithdrawDisputed).
pub const MIN_ADMIN_THRESHOLD: usize = 2;

/// `input_hash` must be hex-only and at least this long (spec invariant I3).
pub const MIN_INPUT_HASH_HEX_LEN: usize = 56;

/// Canonical length of an `agent_identifier` = policy_id (28B) || asset_name (32B), in hex chars.
pub const AGENT_IDENTIFIER_HEX_LEN: usize = 120;
