//! Refresh job for the storefront.
//!
//! Walks a fixed list of product keys, fetching each from the upstream API on
//! a staggered schedule, and stops unconditionally when the watchdog fires.

pub mod config;
pub mod fetch;
pub mod scheduler;

pub use config::{RefreshConfig, RefreshSettings, UpstreamConfig};
pub use fetch::{FetchError, HttpProductFetcher, ProductFetcher};
pub use scheduler::{RefreshOutcome, RefreshScheduler, WATCHDOG_EXIT_CODE};
