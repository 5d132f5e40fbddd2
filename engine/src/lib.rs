//! State Engine (spec §4.3-§4.6): the Sync Loop, the ten Action Dispatchers,
//! the Wallet Locker and the Rollback Handler, wired around a shared
//! [`DispatcherContext`]. Every public entry point here is a standalone unit
//! of work meant to be invoked by a periodic timer in the coordinator binary
//! — there is no hidden shared runtime state between calls (spec §9).

pub mod api;
pub mod classify;
pub mod context;
pub mod dispatchers;
pub mod error;
pub mod initial;
pub mod rawtx;
pub mod sync;
pub mod transition;
pub mod validation;

pub use context::DispatcherContext;
pub use error::EngineError;
pub use sync::run_sync_cycle;
