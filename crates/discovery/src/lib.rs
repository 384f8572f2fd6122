//! peerdex discovery
//!
//! Probes swarm peers for the index documents they publish, resolves the
//! pointers those indexes declare, and records what was found.
//!
//! ## Modules
//! - `fetcher`: one peer's index, with per-pointer resolution fan-out
//! - `scan`: swarm-wide fan-out with bounded concurrency and streamed events
//! - `catalog`: local and discovered pointers for browsing, and pinning

pub mod catalog;
pub mod error;
pub mod fetcher;
pub mod scan;

pub use catalog::{pin_pointer, Catalog};
pub use error::{DiscoveryError, Result};
pub use fetcher::{index_path, PeerIndexFetcher, MAX_CONCURRENT_RESOLUTIONS};
pub use scan::{
    timeout_for, ScanOptions, Scanner, FAST_FETCH_TIMEOUT, MANY_PEERS_THRESHOLD,
    MAX_CONCURRENT_PEERS,
};
