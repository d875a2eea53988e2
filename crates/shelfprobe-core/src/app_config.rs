use std::time::Duration;

use crate::run::RunBounds;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    /// Upper bound on scroll/load actions per run.
    pub max_steps: u32,
    pub min_settle_ms: u64,
    pub max_settle_ms: u64,
    /// Whole-run deadline. Expiry terminates the run with `timeout`.
    pub run_timeout_secs: u64,
    /// Per-request timeout for the HTTP browse adapter.
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// Refuse pages the site's robots.txt disallows for our user agent.
    pub respect_robots: bool,
    /// Cap on simultaneously executing runs in batch mode.
    pub max_concurrent_runs: usize,
    /// Click a cookie wall's accept control before giving up on the page.
    pub dismiss_consent: bool,
}

impl AppConfig {
    /// Engine bounds derived from this configuration.
    #[must_use]
    pub fn run_bounds(&self) -> RunBounds {
        RunBounds {
            max_steps: self.max_steps,
            min_settle: Duration::from_millis(self.min_settle_ms),
            max_settle: Duration::from_millis(self.max_settle_ms),
            run_timeout: Duration::from_secs(self.run_timeout_secs),
            dismiss_consent: self.dismiss_consent,
        }
    }
}
