//! Wall-clock helpers. Persisted chat timestamps are Unix milliseconds
//! (UTC); second resolution would let `created_at` and
//! `establishment_completed_at` collide for any handshake that completes
//! inside the same wall-clock second it started in, which is the common
//! case on a local transport.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_millis() as i64
}

/// Current Unix timestamp in seconds, for the coarser TTL bookkeeping
/// (`PendingSecretTable` entry ages, `StaleReaper` cutoffs) that has no
/// same-second collision risk.
pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_secs() as i64
}
