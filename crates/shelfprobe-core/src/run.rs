use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::page::PageState;
use crate::products::NormalizedRecord;
use crate::CoreError;

/// One orchestration instance: a retailer page to survey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTarget {
    pub run_id: String,
    /// Short retailer identifier, e.g. `"ah_nl"`.
    pub retailer_code: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country: String,
    pub start_url: String,
}

impl RunTarget {
    /// Builds a target with a freshly generated run id.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTarget`] if the retailer code is empty or
    /// the start URL is not an absolute http(s) URL.
    pub fn new(retailer_code: &str, country: &str, start_url: &str) -> Result<Self, CoreError> {
        Self::with_run_id(&Uuid::new_v4().to_string(), retailer_code, country, start_url)
    }

    /// Builds a target under a caller-supplied run id.
    ///
    /// # Errors
    ///
    /// Same as [`RunTarget::new`], plus an empty `run_id`.
    pub fn with_run_id(
        run_id: &str,
        retailer_code: &str,
        country: &str,
        start_url: &str,
    ) -> Result<Self, CoreError> {
        let target = Self {
            run_id: run_id.trim().to_string(),
            retailer_code: retailer_code.trim().to_string(),
            country: country.trim().to_uppercase(),
            start_url: start_url.trim().to_string(),
        };
        target.validate()?;
        Ok(target)
    }

    /// Checks the invariants a deserialized target may not have been built with.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTarget`] describing the first violation.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.run_id.is_empty() {
            return Err(CoreError::InvalidTarget("run_id is empty".into()));
        }
        if self.retailer_code.is_empty() {
            return Err(CoreError::InvalidTarget("retailer_code is empty".into()));
        }
        if !(self.start_url.starts_with("https://") || self.start_url.starts_with("http://")) {
            return Err(CoreError::InvalidTarget(format!(
                "start_url \"{}\" is not an absolute http(s) URL",
                self.start_url
            )));
        }
        Ok(())
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalStatus {
    Completed,
    FlippedAuth,
    FlippedChallenge,
    FlippedCookieWall,
    FlippedEmpty,
    /// Run deadline expired or the browse layer failed.
    Timeout,
}

impl TerminalStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TerminalStatus::Completed => "completed",
            TerminalStatus::FlippedAuth => "flipped_auth",
            TerminalStatus::FlippedChallenge => "flipped_challenge",
            TerminalStatus::FlippedCookieWall => "flipped_cookie_wall",
            TerminalStatus::FlippedEmpty => "flipped_empty",
            TerminalStatus::Timeout => "timeout",
        }
    }

    #[must_use]
    pub fn is_flip(self) -> bool {
        matches!(
            self,
            TerminalStatus::FlippedAuth
                | TerminalStatus::FlippedChallenge
                | TerminalStatus::FlippedCookieWall
                | TerminalStatus::FlippedEmpty
        )
    }
}

impl std::fmt::Display for TerminalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The page state and step that caused a flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockingObservation {
    pub state: PageState,
    pub step_index: u32,
}

/// Final output of one run, handed to exporters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: String,
    pub retailer_code: String,
    pub terminal_status: TerminalStatus,
    pub records: Vec<NormalizedRecord>,
    /// Index of the last step observed; `0` when the run ended at the probe.
    pub step_count: u32,
    pub blocking: Option<BlockingObservation>,
    /// Human-readable cause when `terminal_status` is `timeout`.
    pub failure: Option<String>,
    /// Markup blocks the extractor could not read.
    pub skipped_markup: usize,
    /// Candidates discarded during normalization.
    pub dropped_candidates: usize,
}

/// Step and time limits for a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunBounds {
    pub max_steps: u32,
    pub min_settle: Duration,
    pub max_settle: Duration,
    pub run_timeout: Duration,
    /// Try one accept click when the first snapshot is a cookie wall.
    pub dismiss_consent: bool,
}

impl Default for RunBounds {
    fn default() -> Self {
        Self {
            max_steps: 10,
            min_settle: Duration::from_millis(300),
            max_settle: Duration::from_millis(1000),
            run_timeout: Duration::from_secs(120),
            dismiss_consent: false,
        }
    }
}
