//! The browse-layer seam: navigation, DOM capture and page interaction.
//!
//! The engine only ever talks to [`Browser`]. Adapters live next to it:
//! [`ReplayBrowser`] replays scripted frames for tests and offline runs,
//! [`HttpBrowser`] fetches static HTML.

mod http;
mod replay;
mod retry;
mod robots;

use std::time::Duration;

use async_trait::async_trait;
use shelfprobe_core::PageCapture;

use crate::error::BrowseError;

pub use http::HttpBrowser;
pub use replay::{BrowseAction, ReplayBrowser};
pub use robots::RobotsRules;

#[async_trait]
pub trait Browser: Send {
    /// Loads `url` and waits for the initial document.
    async fn navigate(&mut self, url: &str) -> Result<(), BrowseError>;

    /// Serializes the current DOM.
    async fn snapshot(&mut self) -> Result<PageCapture, BrowseError>;

    /// Clicks the first element matching `selector`.
    async fn click(&mut self, selector: &str) -> Result<(), BrowseError>;

    async fn scroll_to_bottom(&mut self) -> Result<(), BrowseError>;

    /// Lets the page settle after an action.
    async fn settle(&mut self, wait: Duration) -> Result<(), BrowseError> {
        tokio::time::sleep(wait).await;
        Ok(())
    }
}
