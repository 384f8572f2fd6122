use crate::error::{ContentError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Timeout for fetching a file through the naming system.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);
/// Timeout for resolving a naming pointer.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout for the resolution behind a pin status check.
pub const PIN_CHECK_TIMEOUT: Duration = Duration::from_secs(5);
/// How long to wait for a freshly started daemon.
pub const DAEMON_STARTUP_TIMEOUT: Duration = Duration::from_secs(15);
pub const DAEMON_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Timeout for quick local calls: identity, peers, keys, pin listing.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout for pinning one content id.
pub const PIN_TIMEOUT: Duration = Duration::from_secs(5);
/// Timeout for adding a directory and for publishing a name.
pub const PUBLISH_TIMEOUT: Duration = Duration::from_secs(120);
/// Name of the key every node owns, named after its identity.
pub const SELF_KEY: &str = "self";

/// Typed operations of the content-addressing and naming service.
///
/// Every call either returns a value or a [`ContentError`]; nothing retries.
/// Calls without a timeout parameter use the implementation's defaults
/// ([`DEFAULT_CALL_TIMEOUT`], [`PIN_TIMEOUT`], [`PUBLISH_TIMEOUT`]).
#[async_trait]
pub trait ContentService: Send + Sync {
    fn is_installed(&self) -> bool;

    async fn is_running(&self) -> bool;

    /// Start the daemon and poll every `poll_interval` until it answers or
    /// `max_wait` has elapsed. Never takes much longer than `max_wait`, even
    /// when a readiness probe hangs.
    async fn start_and_await_ready(&self, max_wait: Duration, poll_interval: Duration)
        -> Result<()>;

    /// Identity (peer id, also the self pointer) of the local node.
    async fn local_identity(&self) -> Result<String>;

    async fn list_swarm_peers(&self) -> Result<BTreeSet<String>>;

    async fn fetch_path(&self, path: &str, timeout: Duration) -> Result<Vec<u8>>;

    /// Local naming keys as `{name: pointer}`.
    async fn list_local_keys(&self) -> Result<BTreeMap<String, String>>;

    /// Create a naming key and return its pointer.
    async fn create_key(&self, name: &str) -> Result<String>;

    /// Add a directory recursively and return its root content id.
    async fn add_directory(&self, path: &Path) -> Result<String>;

    /// Point a naming key (the node's self key when `key` is `None`) at
    /// `content_id`.
    async fn publish_name(
        &self,
        content_id: &str,
        key: Option<&str>,
        ttl: Option<&str>,
    ) -> Result<()>;

    /// Resolve a pointer to the content id it currently names.
    async fn resolve_name(&self, pointer: &str, timeout: Duration) -> Result<String>;

    async fn pin_add(&self, content_id: &str) -> Result<()>;

    async fn list_pinned_content_ids(&self) -> Result<HashSet<String>>;

    /// Whether the content behind `pointer` is among `pinned`. Resolution
    /// failures count as not pinned.
    async fn is_pinned(&self, pointer: &str, pinned: &HashSet<String>) -> bool {
        match self.resolve_name(pointer, PIN_CHECK_TIMEOUT).await {
            Ok(content_id) => pinned.contains(&content_id),
            Err(err) => {
                debug!(pointer, error = %err, "pin check could not resolve pointer");
                false
            }
        }
    }
}

/// Make sure the service can be used, starting the daemon if needed.
///
/// This is the only check whose failure is fatal to a whole command.
pub async fn ensure_available(
    service: &dyn ContentService,
    max_wait: Duration,
    poll_interval: Duration,
) -> Result<()> {
    if !service.is_installed() {
        return Err(ContentError::NotInstalled);
    }
    if service.is_running().await {
        return Ok(());
    }
    info!("ipfs daemon not running, starting it");
    service.start_and_await_ready(max_wait, poll_interval).await?;
    info!("ipfs daemon started");
    Ok(())
}
