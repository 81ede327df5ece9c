//! CLI arguments and configuration file

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use radar_core::UserId;
use radar_logging::LogConfig;
use radar_messaging::ReconcilerConfig;
use radar_rest::RestConfig;
use serde::{Deserialize, Serialize};
use url::Url;

/// Radar inbox: unread counts from the hosted messaging backend
#[derive(Parser, Debug)]
#[command(name = "radar-inbox", version, about)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Project URL of the hosted backend
    #[arg(long, env = "RADAR_BASE_URL", global = true)]
    pub base_url: Option<Url>,

    /// Public API key
    #[arg(long, env = "RADAR_API_KEY", global = true, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Session token of the signed-in user
    #[arg(long, env = "RADAR_ACCESS_TOKEN", global = true, hide_env_values = true)]
    pub access_token: Option<String>,

    /// Id of the signed-in user
    #[arg(long, env = "RADAR_USER_ID", global = true)]
    pub user_id: Option<String>,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Refresh once and print unread counts per conversation
    Counts,

    /// Mark a conversation read
    Read {
        /// Id of the other participant
        counterpart: String,
    },

    /// Mark a conversation delivered
    Delivered {
        /// Id of the other participant
        counterpart: String,
    },

    /// Keep counts up to date and print the total whenever it changes
    Watch {
        /// Seconds between authoritative refreshes
        #[arg(long)]
        interval: Option<u64>,
    },
}

/// `[backend]` section; every field may come from flags or env instead
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSection {
    pub base_url: Option<Url>,
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Contents of the configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InboxConfig {
    pub backend: BackendSection,
    pub reconciler: ReconcilerConfig,
    pub logging: LogConfig,
}

impl Default for InboxConfig {
    fn default() -> Self {
        Self {
            backend: BackendSection::default(),
            reconciler: ReconcilerConfig::default(),
            logging: LogConfig {
                default_level: "warn".to_string(),
                ..LogConfig::development()
            },
        }
    }
}

impl InboxConfig {
    /// Load a configuration file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// Parse configuration from TOML text
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load the file named by `cli` (if any) and apply flag/env overrides
    pub fn resolve(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_overrides(cli);
        Ok(config)
    }

    /// Flags and env vars take precedence over the file
    pub fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(url) = &cli.base_url {
            self.backend.base_url = Some(url.clone());
        }
        if let Some(key) = &cli.api_key {
            self.backend.api_key = Some(key.clone());
        }
        if let Some(token) = &cli.access_token {
            self.backend.access_token = Some(token.clone());
        }
        if let Some(level) = &cli.log_level {
            self.logging.default_level = level.clone();
        }
        if let Command::Watch {
            interval: Some(secs),
        } = cli.command
        {
            let interval = (secs > 0).then(|| Duration::from_secs(secs));
            self.reconciler.refresh_interval = interval;
        }
    }

    /// Backend settings, failing if the URL or API key is missing
    pub fn rest_config(&self) -> anyhow::Result<RestConfig> {
        let base_url = self
            .backend
            .base_url
            .clone()
            .context("backend URL missing: set RADAR_BASE_URL or --base-url")?;
        let api_key = self
            .backend
            .api_key
            .clone()
            .context("API key missing: set RADAR_API_KEY or --api-key")?;

        Ok(RestConfig {
            base_url,
            api_key,
            access_token: self.backend.access_token.clone(),
            timeout_secs: self.backend.timeout_secs,
        })
    }
}

impl Cli {
    /// The signed-in user, failing if none was given
    pub fn require_user(&self) -> anyhow::Result<UserId> {
        self.user_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(UserId::new)
            .context("user id missing: set RADAR_USER_ID or --user-id")
    }
}
