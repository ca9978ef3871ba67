//! Configuration types for the feedprobe runner.
//! Parsed from feedprobe.toml.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use feedprobe_client::User;
use feedprobe_verifier::ConvergencePolicy;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProbeConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub convergence: ConvergenceSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_admin_user")]
    pub admin_user: String,
    #[serde(default = "default_admin_password")]
    pub admin_password: String,
    #[serde(default = "default_30")]
    pub request_timeout_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            admin_user: default_admin_user(),
            admin_password: default_admin_password(),
            request_timeout_secs: 30,
        }
    }
}

impl ServerSection {
    pub fn admin(&self) -> User {
        User::new(self.admin_user.clone(), self.admin_password.clone())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// How the runner waits for index convergence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceMode {
    /// Bounded incremental polling (the default).
    #[default]
    Polling,
    /// One fixed sleep followed by a single feed check, for servers with a
    /// known fixed indexing latency.
    FixedDelay,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceSection {
    #[serde(default)]
    pub mode: ConvergenceMode,
    #[serde(default)]
    pub initial_delay_ms: u64,
    #[serde(default = "default_500")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_30")]
    pub max_wait_secs: u64,
    /// Only used when mode = "fixed_delay".
    #[serde(default = "default_5")]
    pub fixed_delay_secs: u64,
}

impl Default for ConvergenceSection {
    fn default() -> Self {
        Self {
            mode: ConvergenceMode::Polling,
            initial_delay_ms: 0,
            poll_interval_ms: 500,
            max_wait_secs: 30,
            fixed_delay_secs: 5,
        }
    }
}

impl ConvergenceSection {
    pub fn policy(&self) -> ConvergencePolicy {
        match self.mode {
            ConvergenceMode::Polling => ConvergencePolicy {
                initial_delay: Duration::from_millis(self.initial_delay_ms),
                poll_interval: Duration::from_millis(self.poll_interval_ms),
                max_wait: Duration::from_secs(self.max_wait_secs),
            },
            ConvergenceMode::FixedDelay => {
                ConvergencePolicy::fixed_delay(Duration::from_secs(self.fixed_delay_secs))
            }
        }
    }
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost:8080".into()
}
fn default_admin_user() -> String {
    "admin".into()
}
fn default_admin_password() -> String {
    "admin".into()
}
fn default_30() -> u64 {
    30
}
fn default_500() -> u64 {
    500
}
fn default_5() -> u64 {
    5
}

impl ProbeConfig {
    /// Load config from file, or fall back to defaults if missing.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: ProbeConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }
}
