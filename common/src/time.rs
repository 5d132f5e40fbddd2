use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time, epoch milliseconds — the unit every timing field
/// in the escrow data model (`pay_by_time`, `unlock_time`, ...) is stored in.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as u64
}
