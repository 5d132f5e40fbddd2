//! The seven `*Requested -> *Initiated` Action Dispatchers of spec §4.4,
//! split across ten submodules (§4.4 lists ten named transitions, one pair
//! of `Register`/`Deregister` plus eight redeemer-driven ones). Each module
//! exposes a standalone `run_cycle` meant to be invoked on its own schedule,
//! under the process-wide mutex described in spec §9 ("Global mutex for
//! each dispatcher") — modeled here as a plain non-blocking call the
//! coordinator binary serializes with a `try_lock`.

pub mod authorize_refund;
pub mod cancel_refund;
pub mod deregister;
pub mod driver;
pub mod lock_funds;
pub mod register;
pub mod request_refund;
pub mod submit_result;
pub mod tx_builders;
pub mod withdraw;
pub mod withdraw_disputed;
pub mod withdraw_refund;
