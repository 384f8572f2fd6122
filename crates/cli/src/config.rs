//! Layered configuration: defaults, then an optional TOML file, then
//! `PEERDEX_*` environment variables. Command line flags are applied last by
//! the caller.

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File as ConfigFile};
use peerdex_content::{
    ipfs::DEFAULT_BINARY, DAEMON_POLL_INTERVAL, DAEMON_STARTUP_TIMEOUT, DEFAULT_CALL_TIMEOUT,
    PIN_TIMEOUT, PUBLISH_TIMEOUT,
};
use peerdex_publish::DEFAULT_TTL;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "peerdex";
const CONFIG_FILE: &str = "config.toml";
const ENV_PREFIX: &str = "PEERDEX";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Directory holding the state store.
    pub data_dir: PathBuf,
    pub ipfs_bin: PathBuf,
    pub log_level: String,
    /// `pretty` or `json`.
    pub log_format: String,
    pub publish_ttl: String,
    pub daemon_startup_secs: u64,
    pub daemon_poll_ms: u64,
    /// Timeout of quick ipfs calls such as `id` or `key list`.
    pub call_timeout_secs: u64,
    pub pin_timeout_secs: u64,
    /// Timeout of `add` and `name publish`.
    pub publish_timeout_secs: u64,
}

impl AppConfig {
    /// Load configuration. An explicitly given file must exist; the default
    /// file under the user config directory is optional.
    pub fn load(config_path_override: Option<&Path>) -> Result<Self> {
        let resolved_path = match config_path_override {
            Some(path) => {
                if !path.exists() {
                    bail!(
                        "Configuration file {} not found (specified via --config)",
                        path.display()
                    );
                }
                Some(path.to_path_buf())
            }
            None => default_config_path().filter(|path| path.exists()),
        };

        let mut builder = Config::builder()
            .set_default("data_dir", default_data_dir().to_string_lossy().into_owned())?
            .set_default("ipfs_bin", DEFAULT_BINARY)?
            .set_default("log_level", "info")?
            .set_default("log_format", "pretty")?
            .set_default("publish_ttl", DEFAULT_TTL)?
            .set_default("daemon_startup_secs", DAEMON_STARTUP_TIMEOUT.as_secs())?
            .set_default("daemon_poll_ms", DAEMON_POLL_INTERVAL.as_millis() as u64)?
            .set_default("call_timeout_secs", DEFAULT_CALL_TIMEOUT.as_secs())?
            .set_default("pin_timeout_secs", PIN_TIMEOUT.as_secs())?
            .set_default("publish_timeout_secs", PUBLISH_TIMEOUT.as_secs())?;

        if let Some(path) = &resolved_path {
            builder = builder.add_source(ConfigFile::from(path.as_path()));
        }
        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let config: AppConfig = builder
            .build()?
            .try_deserialize()
            .context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            bail!("data_dir must not be empty");
        }
        if self.ipfs_bin.as_os_str().is_empty() {
            bail!("ipfs_bin must not be empty");
        }
        if !matches!(self.log_format.as_str(), "pretty" | "json") {
            bail!(
                "log_format must be \"pretty\" or \"json\", got {:?}",
                self.log_format
            );
        }
        if self.publish_ttl.trim().is_empty() {
            bail!("publish_ttl must not be empty");
        }
        if self.daemon_poll_ms == 0 {
            bail!("daemon_poll_ms must be greater than zero");
        }
        for (name, secs) in [
            ("call_timeout_secs", self.call_timeout_secs),
            ("pin_timeout_secs", self.pin_timeout_secs),
            ("publish_timeout_secs", self.publish_timeout_secs),
        ] {
            if secs == 0 {
                bail!("{name} must be greater than zero");
            }
        }
        Ok(())
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("db")
    }

    pub fn daemon_startup_timeout(&self) -> Duration {
        Duration::from_secs(self.daemon_startup_secs)
    }

    pub fn daemon_poll_interval(&self) -> Duration {
        Duration::from_millis(self.daemon_poll_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn pin_timeout(&self) -> Duration {
        Duration::from_secs(self.pin_timeout_secs)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".peerdex"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("peerdex.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
data_dir = "/var/lib/peerdex"
ipfs_bin = "/opt/kubo/ipfs"
log_format = "json"
publish_ttl = "5m"
"#,
        );

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/peerdex"));
        assert_eq!(config.db_path(), PathBuf::from("/var/lib/peerdex/db"));
        assert_eq!(config.ipfs_bin, PathBuf::from("/opt/kubo/ipfs"));
        assert_eq!(config.log_format, "json");
        assert_eq!(config.publish_ttl, "5m");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.daemon_startup_timeout(), DAEMON_STARTUP_TIMEOUT);
        assert_eq!(config.daemon_poll_interval(), DAEMON_POLL_INTERVAL);
        assert_eq!(config.call_timeout(), DEFAULT_CALL_TIMEOUT);
        assert_eq!(config.pin_timeout(), PIN_TIMEOUT);
        assert_eq!(config.publish_timeout(), PUBLISH_TIMEOUT);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = AppConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn rejects_unknown_log_format() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "log_format = \"xml\"\n");
        let err = AppConfig::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("log_format"));
    }

    #[test]
    fn rejects_zero_poll_interval() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "daemon_poll_ms = 0\n");
        assert!(AppConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn rejects_zero_call_timeouts() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "pin_timeout_secs = 0\n");
        let err = AppConfig::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("pin_timeout_secs"));
    }
}
