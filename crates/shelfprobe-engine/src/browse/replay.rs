//! Scripted browse adapter.
//!
//! Frame 0 is what navigation shows; every click or scroll advances to the
//! next frame and the last frame repeats once the script runs out. All
//! actions are recorded so callers can assert on what the engine did.

use std::time::Duration;

use async_trait::async_trait;
use shelfprobe_core::PageCapture;

use super::Browser;
use crate::error::BrowseError;

/// One call the engine made against the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowseAction {
    Navigate(String),
    Snapshot,
    Click(String),
    Scroll,
    Settle(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    Fail,
    Stall,
}

#[derive(Debug, Clone, Default)]
pub struct ReplayBrowser {
    frames: Vec<PageCapture>,
    cursor: Option<usize>,
    actions: Vec<BrowseAction>,
    snapshots_taken: usize,
    navigation_fails: bool,
    snapshot_fault: Option<(usize, Fault)>,
}

impl ReplayBrowser {
    #[must_use]
    pub fn new(frames: Vec<PageCapture>) -> Self {
        Self {
            frames,
            ..Self::default()
        }
    }

    /// Frames that all report the same URL and no scroll height.
    #[must_use]
    pub fn from_html<I, S>(url: &str, pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            pages
                .into_iter()
                .map(|html| PageCapture {
                    url: url.to_string(),
                    html: html.into(),
                    scroll_height: None,
                })
                .collect(),
        )
    }

    /// Makes every navigation fail.
    #[must_use]
    pub fn failing_navigation(mut self) -> Self {
        self.navigation_fails = true;
        self
    }

    /// Makes the `n`-th snapshot call (zero-based) return an error.
    #[must_use]
    pub fn failing_snapshot(mut self, n: usize) -> Self {
        self.snapshot_fault = Some((n, Fault::Fail));
        self
    }

    /// Makes the `n`-th snapshot call (zero-based) never complete.
    #[must_use]
    pub fn stalling_snapshot(mut self, n: usize) -> Self {
        self.snapshot_fault = Some((n, Fault::Stall));
        self
    }

    #[must_use]
    pub fn actions(&self) -> &[BrowseAction] {
        &self.actions
    }

    /// Index of the frame currently shown, `None` before navigation.
    #[must_use]
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    fn advance(&mut self) -> Result<(), BrowseError> {
        let cursor = self.cursor.ok_or(BrowseError::NotNavigated)?;
        self.cursor = Some((cursor + 1).min(self.frames.len().saturating_sub(1)));
        Ok(())
    }
}

#[async_trait]
impl Browser for ReplayBrowser {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowseError> {
        self.actions.push(BrowseAction::Navigate(url.to_string()));
        if self.navigation_fails || self.frames.is_empty() {
            return Err(BrowseError::Navigation {
                url: url.to_string(),
                reason: "replay script refuses navigation".to_string(),
            });
        }
        self.cursor = Some(0);
        Ok(())
    }

    async fn snapshot(&mut self) -> Result<PageCapture, BrowseError> {
        self.actions.push(BrowseAction::Snapshot);
        let call = self.snapshots_taken;
        self.snapshots_taken += 1;
        match self.snapshot_fault {
            Some((n, Fault::Fail)) if n == call => {
                return Err(BrowseError::Action {
                    action: "snapshot".to_string(),
                    reason: "injected failure".to_string(),
                });
            }
            Some((n, Fault::Stall)) if n == call => {
                std::future::pending::<()>().await;
            }
            _ => {}
        }
        let cursor = self.cursor.ok_or(BrowseError::NotNavigated)?;
        self.frames
            .get(cursor)
            .cloned()
            .ok_or(BrowseError::NotNavigated)
    }

    async fn click(&mut self, selector: &str) -> Result<(), BrowseError> {
        self.actions.push(BrowseAction::Click(selector.to_string()));
        self.advance()
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), BrowseError> {
        self.actions.push(BrowseAction::Scroll);
        self.advance()
    }

    async fn settle(&mut self, wait: Duration) -> Result<(), BrowseError> {
        self.actions.push(BrowseAction::Settle(wait));
        Ok(())
    }
}
