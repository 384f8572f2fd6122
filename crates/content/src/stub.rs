//! In-memory [`ContentService`] with canned responses, for tests and local
//! experiments without a daemon.

use crate::error::{ContentError, Result};
use crate::service::{ContentService, SELF_KEY};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Canned reply for a stubbed call.
#[derive(Debug, Clone)]
pub enum Canned<T> {
    Value(T),
    /// Reply after a delay; a delay longer than the caller's timeout times out.
    Delayed(Duration, T),
    Timeout,
    Failure(String),
}

/// A directory captured at `add_directory` time.
#[derive(Debug, Clone)]
pub struct AddedDirectory {
    pub path: PathBuf,
    pub content_id: String,
    /// Regular files directly inside the directory, by file name.
    pub files: BTreeMap<String, Vec<u8>>,
}

/// One `publish_name` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedName {
    pub content_id: String,
    pub key: Option<String>,
    pub ttl: Option<String>,
}

#[derive(Default)]
struct StubState {
    installed: bool,
    running: bool,
    starts_on_demand: bool,
    identity: String,
    peers: BTreeSet<String>,
    paths: HashMap<String, Canned<Vec<u8>>>,
    resolutions: HashMap<String, Canned<String>>,
    keys: BTreeMap<String, String>,
    content_ids: HashMap<PathBuf, String>,
    failing_adds: HashSet<PathBuf>,
    failing_publishes: HashSet<String>,
    failing_pins: HashSet<String>,
    failing_key_list: bool,
    pins: HashSet<String>,
    added: Vec<AddedDirectory>,
    published: Vec<PublishedName>,
    calls: Vec<String>,
}

/// Calls currently in progress, and the most seen at once.
#[derive(Default)]
struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    fn enter(&self) -> InFlight<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlight(self)
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a Gauge);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Stub content service. Cloning shares the underlying state.
#[derive(Clone)]
pub struct StubContentService {
    state: Arc<RwLock<StubState>>,
    fetches: Arc<Gauge>,
    resolutions: Arc<Gauge>,
}

impl Default for StubContentService {
    fn default() -> Self {
        Self::new()
    }
}

impl StubContentService {
    /// An installed, running node with identity `12D3KooWlocal` and a self key.
    pub fn new() -> Self {
        let identity = "12D3KooWlocal".to_string();
        let mut keys = BTreeMap::new();
        keys.insert(SELF_KEY.to_string(), identity.clone());
        Self {
            state: Arc::new(RwLock::new(StubState {
                installed: true,
                running: true,
                identity,
                keys,
                ..StubState::default()
            })),
            fetches: Arc::default(),
            resolutions: Arc::default(),
        }
    }

    pub fn with_installed(self, installed: bool) -> Self {
        self.state.write().installed = installed;
        self
    }

    /// A stopped daemon; `starts` controls whether starting it succeeds.
    pub fn with_stopped_daemon(self, starts: bool) -> Self {
        {
            let mut state = self.state.write();
            state.running = false;
            state.starts_on_demand = starts;
        }
        self
    }

    pub fn with_peers<I, S>(self, peers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state
            .write()
            .peers
            .extend(peers.into_iter().map(Into::into));
        self
    }

    /// Serve `json` as the index document of `peer`.
    pub fn with_index(self, peer: &str, json: &str) -> Self {
        self.with_path(
            &format!("/ipns/{peer}/index.json"),
            Canned::Value(json.as_bytes().to_vec()),
        )
    }

    pub fn with_path(self, path: &str, reply: Canned<Vec<u8>>) -> Self {
        self.state.write().paths.insert(path.to_string(), reply);
        self
    }

    pub fn with_resolution(self, pointer: &str, reply: Canned<String>) -> Self {
        self.state
            .write()
            .resolutions
            .insert(pointer.to_string(), reply);
        self
    }

    pub fn with_key(self, name: &str, pointer: &str) -> Self {
        self.state
            .write()
            .keys
            .insert(name.to_string(), pointer.to_string());
        self
    }

    pub fn with_content_id(self, path: impl Into<PathBuf>, content_id: &str) -> Self {
        self.state
            .write()
            .content_ids
            .insert(path.into(), content_id.to_string());
        self
    }

    pub fn failing_add(self, path: impl Into<PathBuf>) -> Self {
        self.state.write().failing_adds.insert(path.into());
        self
    }

    pub fn failing_publish(self, key: &str) -> Self {
        self.state.write().failing_publishes.insert(key.to_string());
        self
    }

    pub fn failing_pin(self, content_id: &str) -> Self {
        self.state.write().failing_pins.insert(content_id.to_string());
        self
    }

    pub fn failing_key_list(self) -> Self {
        self.state.write().failing_key_list = true;
        self
    }

    pub fn with_pin(self, content_id: &str) -> Self {
        self.state.write().pins.insert(content_id.to_string());
        self
    }

    /// Every call made so far, as `operation argument`.
    pub fn calls(&self) -> Vec<String> {
        self.state.read().calls.clone()
    }

    pub fn added(&self) -> Vec<AddedDirectory> {
        self.state.read().added.clone()
    }

    pub fn published(&self) -> Vec<PublishedName> {
        self.state.read().published.clone()
    }

    pub fn pins(&self) -> HashSet<String> {
        self.state.read().pins.clone()
    }

    pub fn is_daemon_running(&self) -> bool {
        self.state.read().running
    }

    /// Most `fetch_path` calls that were in progress at the same time.
    pub fn peak_concurrent_fetches(&self) -> usize {
        self.fetches.peak()
    }

    /// Most `resolve_name` calls that were in progress at the same time.
    pub fn peak_concurrent_resolutions(&self) -> usize {
        self.resolutions.peak()
    }

    fn record(&self, call: String) {
        self.state.write().calls.push(call);
    }

    async fn reply<T>(command: String, canned: Option<Canned<T>>, timeout: Duration) -> Result<T> {
        match canned {
            Some(Canned::Value(value)) => Ok(value),
            Some(Canned::Delayed(delay, value)) => {
                if delay > timeout {
                    tokio::time::sleep(timeout).await;
                    Err(ContentError::Timeout {
                        command,
                        after: timeout,
                    })
                } else {
                    tokio::time::sleep(delay).await;
                    Ok(value)
                }
            }
            Some(Canned::Timeout) => Err(ContentError::Timeout {
                command,
                after: timeout,
            }),
            Some(Canned::Failure(stderr)) => Err(ContentError::ProcessFailure {
                command,
                code: Some(1),
                stderr,
            }),
            None => Err(ContentError::ProcessFailure {
                command,
                code: Some(1),
                stderr: "not found".to_string(),
            }),
        }
    }

    fn fail(command: String, stderr: &str) -> ContentError {
        ContentError::ProcessFailure {
            command,
            code: Some(1),
            stderr: stderr.to_string(),
        }
    }
}

#[async_trait]
impl ContentService for StubContentService {
    fn is_installed(&self) -> bool {
        self.state.read().installed
    }

    async fn is_running(&self) -> bool {
        self.record("id".to_string());
        self.state.read().running
    }

    async fn start_and_await_ready(
        &self,
        max_wait: Duration,
        _poll_interval: Duration,
    ) -> Result<()> {
        self.record("daemon --init".to_string());
        let mut state = self.state.write();
        if state.starts_on_demand {
            state.running = true;
            Ok(())
        } else {
            Err(ContentError::DaemonStartup(max_wait))
        }
    }

    async fn local_identity(&self) -> Result<String> {
        self.record("id -f=<id>".to_string());
        Ok(self.state.read().identity.clone())
    }

    async fn list_swarm_peers(&self) -> Result<BTreeSet<String>> {
        self.record("swarm peers".to_string());
        Ok(self.state.read().peers.clone())
    }

    async fn fetch_path(&self, path: &str, timeout: Duration) -> Result<Vec<u8>> {
        self.record(format!("cat {path}"));
        let canned = self.state.read().paths.get(path).cloned();
        let _in_flight = self.fetches.enter();
        Self::reply(format!("cat {path}"), canned, timeout).await
    }

    async fn list_local_keys(&self) -> Result<BTreeMap<String, String>> {
        self.record("key list -l".to_string());
        let state = self.state.read();
        if state.failing_key_list {
            return Err(Self::fail("key list -l".to_string(), "repo locked"));
        }
        Ok(state.keys.clone())
    }

    async fn create_key(&self, name: &str) -> Result<String> {
        self.record(format!("key gen {name}"));
        let mut state = self.state.write();
        if state.keys.contains_key(name) {
            return Err(Self::fail(
                format!("key gen {name}"),
                "key with that name already exists",
            ));
        }
        let pointer = format!("k51{name}");
        state.keys.insert(name.to_string(), pointer.clone());
        Ok(pointer)
    }

    async fn add_directory(&self, path: &Path) -> Result<String> {
        self.record(format!("add {}", path.display()));
        let (failing, known, ordinal) = {
            let state = self.state.read();
            (
                state.failing_adds.contains(path),
                state.content_ids.get(path).cloned(),
                state.added.len(),
            )
        };
        if failing {
            return Err(Self::fail(format!("add {}", path.display()), "add failed"));
        }
        if !path.is_dir() {
            return Err(Self::fail(
                format!("add {}", path.display()),
                "no such file or directory",
            ));
        }

        let mut files = BTreeMap::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.insert(
                    entry.file_name().to_string_lossy().into_owned(),
                    std::fs::read(entry.path())?,
                );
            }
        }

        let content_id = known.unwrap_or_else(|| format!("bafystub{ordinal}"));
        self.state.write().added.push(AddedDirectory {
            path: path.to_path_buf(),
            content_id: content_id.clone(),
            files,
        });
        Ok(content_id)
    }

    async fn publish_name(
        &self,
        content_id: &str,
        key: Option<&str>,
        ttl: Option<&str>,
    ) -> Result<()> {
        let name = key.unwrap_or(SELF_KEY);
        self.record(format!("name publish {name} {content_id}"));
        let mut state = self.state.write();
        if state.failing_publishes.contains(name) {
            return Err(Self::fail(
                format!("name publish {name}"),
                "publish failed",
            ));
        }
        if !state.keys.contains_key(name) {
            return Err(Self::fail(format!("name publish {name}"), "no key by the given name"));
        }
        state.published.push(PublishedName {
            content_id: content_id.to_string(),
            key: key.map(str::to_string),
            ttl: ttl.map(str::to_string),
        });
        let pointer = state.keys[name].clone();
        state
            .resolutions
            .insert(pointer, Canned::Value(content_id.to_string()));
        Ok(())
    }

    async fn resolve_name(&self, pointer: &str, timeout: Duration) -> Result<String> {
        self.record(format!("name resolve {pointer}"));
        let canned = self.state.read().resolutions.get(pointer).cloned();
        let _in_flight = self.resolutions.enter();
        Self::reply(format!("name resolve {pointer}"), canned, timeout).await
    }

    async fn pin_add(&self, content_id: &str) -> Result<()> {
        self.record(format!("pin add {content_id}"));
        let mut state = self.state.write();
        if state.failing_pins.contains(content_id) {
            return Err(Self::fail(format!("pin add {content_id}"), "pin failed"));
        }
        state.pins.insert(content_id.to_string());
        Ok(())
    }

    async fn list_pinned_content_ids(&self) -> Result<HashSet<String>> {
        self.record("pin ls".to_string());
        Ok(self.state.read().pins.clone())
    }
}
