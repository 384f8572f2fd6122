//! peerdex content service adapter
//!
//! Typed, fail-fast access to the content-addressing and naming service:
//! adding directories, publishing and resolving naming pointers, pinning, and
//! listing swarm peers and local keys.
//!
//! ## Modules
//! - `service`: the [`ContentService`] trait, default timeouts, start-up gate
//! - `ipfs`: implementation shelling out to the `ipfs` binary
//! - `stub`: in-memory implementation with canned replies
//! - `parse`: parsers for ipfs command output
//! - `error`: failure taxonomy

pub mod error;
pub mod ipfs;
pub mod parse;
pub mod service;
pub mod stub;

pub use error::{ContentError, Result};
pub use ipfs::IpfsCli;
pub use service::{
    ensure_available, ContentService, DAEMON_POLL_INTERVAL, DAEMON_STARTUP_TIMEOUT,
    DEFAULT_CALL_TIMEOUT, DEFAULT_FETCH_TIMEOUT, DEFAULT_RESOLVE_TIMEOUT, PIN_CHECK_TIMEOUT,
    PIN_TIMEOUT, PUBLISH_TIMEOUT, SELF_KEY,
};
pub use stub::{AddedDirectory, Canned, PublishedName, StubContentService};
