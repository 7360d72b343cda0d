//! Vesper: a STIR/SHAKEN signing and verification service.
//!
//! Mints ES256 PASSporT identity tokens on behalf of originating carriers
//! and validates them on behalf of terminating carriers. All state is
//! volatile; upstream credentials and trust anchors are kept coherent by
//! the refresh loops in [`refresh`].

pub mod api;
pub mod app;
pub mod config;
pub mod credentials;
pub mod keyservice;
pub mod observability;
pub mod pubkeys;
pub mod refresh;
pub mod replay;
pub mod rootcerts;
pub mod sticr;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub fn now_epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs() as i64
}
