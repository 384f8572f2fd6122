//! [`ContentService`] backed by the `ipfs` command-line binary.

use crate::error::{ContentError, Result};
use crate::parse;
use crate::service::{ContentService, DEFAULT_CALL_TIMEOUT, PIN_TIMEOUT, PUBLISH_TIMEOUT};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, trace};

pub const DEFAULT_BINARY: &str = "ipfs";

/// Runs one `ipfs` process per call with a fixed argument vector.
///
/// A non-zero exit is a [`ContentError::ProcessFailure`]; a call exceeding its
/// timeout is killed and reported as [`ContentError::Timeout`]. Every call has
/// a timeout.
#[derive(Debug, Clone)]
pub struct IpfsCli {
    binary: PathBuf,
    call_timeout: Duration,
    pin_timeout: Duration,
    publish_timeout: Duration,
}

impl Default for IpfsCli {
    fn default() -> Self {
        Self::new(DEFAULT_BINARY)
    }
}

impl IpfsCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            pin_timeout: PIN_TIMEOUT,
            publish_timeout: PUBLISH_TIMEOUT,
        }
    }

    /// Timeout for identity, peer, key and pin listing calls, and the cap on
    /// each readiness probe.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_pin_timeout(mut self, timeout: Duration) -> Self {
        self.pin_timeout = timeout;
        self
    }

    /// Timeout for `add` and `name publish`.
    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn describe(&self, args: &[&str]) -> String {
        let mut command = self.binary.display().to_string();
        for arg in args {
            command.push(' ');
            command.push_str(arg);
        }
        command
    }

    async fn run(&self, args: &[&str], timeout: Duration) -> Result<Vec<u8>> {
        let command = self.describe(args);
        trace!(%command, ?timeout, "running");

        let child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::NotFound => ContentError::NotInstalled,
                _ => ContentError::Io(err),
            })?;

        // Dropping the future on timeout drops the child, which kills it.
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| ContentError::Timeout {
                command: command.clone(),
                after: timeout,
            })??;

        if !output.status.success() {
            return Err(ContentError::ProcessFailure {
                command,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    async fn run_text(&self, args: &[&str], timeout: Duration) -> Result<String> {
        let stdout = self.run(args, timeout).await?;
        let text = String::from_utf8(stdout).map_err(|err| {
            ContentError::ParseFailure(format!("{} printed non UTF-8 output: {err}", args[0]))
        })?;
        Ok(text.trim().to_string())
    }
}

#[async_trait]
impl ContentService for IpfsCli {
    fn is_installed(&self) -> bool {
        if self.binary.components().count() > 1 {
            return self.binary.is_file();
        }
        std::env::var_os("PATH")
            .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(&self.binary).is_file()))
            .unwrap_or(false)
    }

    async fn is_running(&self) -> bool {
        self.run(&["id"], self.call_timeout).await.is_ok()
    }

    async fn start_and_await_ready(
        &self,
        max_wait: Duration,
        poll_interval: Duration,
    ) -> Result<()> {
        // The daemon outlives this process, so it is not tied to a tokio child.
        std::process::Command::new(&self.binary)
            .args(["daemon", "--init"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::NotFound => ContentError::NotInstalled,
                _ => ContentError::Io(err),
            })?;

        let started = Instant::now();
        let deadline = started + max_wait;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ContentError::DaemonStartup(max_wait));
            }
            tokio::time::sleep(poll_interval.min(remaining)).await;

            // A probe may not outlive the start-up budget.
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ContentError::DaemonStartup(max_wait));
            }
            if self
                .run(&["id"], remaining.min(self.call_timeout))
                .await
                .is_ok()
            {
                debug!(waited = ?started.elapsed(), "daemon ready");
                return Ok(());
            }
        }
    }

    async fn local_identity(&self) -> Result<String> {
        self.run_text(&["id", "-f=<id>"], self.call_timeout).await
    }

    async fn list_swarm_peers(&self) -> Result<BTreeSet<String>> {
        let output = self.run_text(&["swarm", "peers"], self.call_timeout).await?;
        Ok(parse::swarm_peers(&output))
    }

    async fn fetch_path(&self, path: &str, timeout: Duration) -> Result<Vec<u8>> {
        self.run(&["cat", path], timeout).await
    }

    async fn list_local_keys(&self) -> Result<BTreeMap<String, String>> {
        let output = self.run_text(&["key", "list", "-l"], self.call_timeout).await?;
        Ok(parse::key_list(&output))
    }

    async fn create_key(&self, name: &str) -> Result<String> {
        self.run_text(&["key", "gen", name], self.call_timeout).await
    }

    async fn add_directory(&self, path: &Path) -> Result<String> {
        let path = path.to_str().ok_or_else(|| {
            ContentError::ParseFailure(format!("path is not UTF-8: {}", path.display()))
        })?;
        // CIDv1 with raw leaves keeps ids stable between runs.
        let output = self
            .run_text(
                &["add", "-r", "-Q", "--cid-version=1", "--raw-leaves", path],
                self.publish_timeout,
            )
            .await?;
        parse::added_content_id(&output)
    }

    async fn publish_name(
        &self,
        content_id: &str,
        key: Option<&str>,
        ttl: Option<&str>,
    ) -> Result<()> {
        let key_arg = key.map(|key| format!("--key={key}"));
        let ttl_arg = ttl.map(|ttl| format!("--ttl={ttl}"));
        let target = format!("/ipfs/{content_id}");

        let mut args = vec!["name", "publish"];
        args.extend(key_arg.as_deref());
        args.extend(ttl_arg.as_deref());
        args.push(&target);

        self.run(&args, self.publish_timeout).await.map(|_| ())
    }

    async fn resolve_name(&self, pointer: &str, timeout: Duration) -> Result<String> {
        let target = format!("/ipns/{pointer}");
        let output = self
            .run_text(&["name", "resolve", "--recursive", &target], timeout)
            .await?;
        parse::resolved_path(&output)
    }

    async fn pin_add(&self, content_id: &str) -> Result<()> {
        self.run(&["pin", "add", "--recursive=true", content_id], self.pin_timeout)
            .await
            .map(|_| ())
    }

    async fn list_pinned_content_ids(&self) -> Result<HashSet<String>> {
        let output = self
            .run_text(&["pin", "ls", "--type=recursive", "-q"], self.call_timeout)
            .await?;
        Ok(parse::pin_list(&output))
    }
}
