//! Page observations and their classification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::run::TerminalStatus;

/// Raw page state as reported by the browse layer, before the engine assigns
/// it a position in the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCapture {
    /// Resolved URL after any redirects.
    pub url: String,
    /// Serialized DOM of the settled page.
    pub html: String,
    /// Document scroll height in CSS pixels, when the browse layer can measure it.
    #[serde(default)]
    pub scroll_height: Option<u64>,
}

/// One observation point within a run.
///
/// Step `0` is the probe snapshot taken right after navigation; each scroll or
/// load-more action produces the next index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub url: String,
    pub html: String,
    pub scroll_height: Option<u64>,
    pub taken_at: DateTime<Utc>,
    pub step_index: u32,
}

impl PageSnapshot {
    /// Stamps a capture with its step index and the current time.
    #[must_use]
    pub fn from_capture(capture: PageCapture, step_index: u32) -> Self {
        Self {
            url: capture.url,
            html: capture.html,
            scroll_height: capture.scroll_height,
            taken_at: Utc::now(),
            step_index,
        }
    }

    /// Re-indexes a snapshot, e.g. one restored from cache.
    #[must_use]
    pub fn at_step(mut self, step_index: u32) -> Self {
        self.step_index = step_index;
        self
    }
}

/// Classification of a settled page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageState {
    Normal,
    AuthRedirect,
    CfChallenge,
    CookieWall,
    EmptyListing,
}

impl PageState {
    /// Every state other than `Normal` stops a run.
    #[must_use]
    pub fn is_blocking(self) -> bool {
        !matches!(self, PageState::Normal)
    }

    /// Terminal status a run flips to when it observes this state.
    /// `None` for `Normal`.
    #[must_use]
    pub fn flip_status(self) -> Option<TerminalStatus> {
        match self {
            PageState::Normal => None,
            PageState::AuthRedirect => Some(TerminalStatus::FlippedAuth),
            PageState::CfChallenge => Some(TerminalStatus::FlippedChallenge),
            PageState::CookieWall => Some(TerminalStatus::FlippedCookieWall),
            PageState::EmptyListing => Some(TerminalStatus::FlippedEmpty),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PageState::Normal => "normal",
            PageState::AuthRedirect => "auth_redirect",
            PageState::CfChallenge => "cf_challenge",
            PageState::CookieWall => "cookie_wall",
            PageState::EmptyListing => "empty_listing",
        }
    }
}

impl std::fmt::Display for PageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_normal_is_non_blocking() {
        assert!(!PageState::Normal.is_blocking());
        for state in [
            PageState::AuthRedirect,
            PageState::CfChallenge,
            PageState::CookieWall,
            PageState::EmptyListing,
        ] {
            assert!(state.is_blocking(), "{state} should block");
            assert!(state.flip_status().is_some());
        }
    }

    #[test]
    fn flip_status_maps_each_blocking_state() {
        assert_eq!(
            PageState::CfChallenge.flip_status(),
            Some(TerminalStatus::FlippedChallenge)
        );
        assert_eq!(
            PageState::CookieWall.flip_status(),
            Some(TerminalStatus::FlippedCookieWall)
        );
        assert_eq!(PageState::Normal.flip_status(), None);
    }

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&PageState::CfChallenge).unwrap();
        assert_eq!(json, "\"cf_challenge\"");
    }

    #[test]
    fn from_capture_carries_step_index() {
        let capture = PageCapture {
            url: "https://shop.example/olie".to_string(),
            html: "<html></html>".to_string(),
            scroll_height: Some(2400),
        };
        let snapshot = PageSnapshot::from_capture(capture, 3);
        assert_eq!(snapshot.step_index, 3);
        assert_eq!(snapshot.scroll_height, Some(2400));
        assert_eq!(snapshot.clone().at_step(0).step_index, 0);
    }
}
