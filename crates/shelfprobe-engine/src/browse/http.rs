//! Static-HTML browse adapter over `reqwest`.
//!
//! There is no script execution: clicks and scrolls change nothing, so every
//! run through this adapter exhausts on its first scroll step. Navigation
//! honours each origin's robots.txt unless turned off.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use shelfprobe_core::PageCapture;

use super::retry::retry_with_backoff;
use super::robots::RobotsRules;
use super::Browser;
use crate::error::{BrowseError, EngineError};

/// Statuses whose body is still a page worth classifying: login walls and
/// bot-protection interstitials are commonly served this way.
const CLASSIFIABLE_STATUSES: &[u16] = &[401, 403, 503];

pub struct HttpBrowser {
    client: Client,
    /// Product token of the user agent, as robots.txt groups name it.
    agent: String,
    max_retries: u32,
    backoff_base_ms: u64,
    respect_robots: bool,
    /// robots.txt rules per origin, fetched on first navigation there.
    robots: HashMap<String, RobotsRules>,
    current: Option<PageCapture>,
}

impl HttpBrowser {
    /// # Errors
    ///
    /// Returns [`EngineError::Http`] if the `reqwest::Client` cannot be
    /// constructed.
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self, EngineError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        let agent = user_agent
            .split(['/', ' '])
            .next()
            .unwrap_or(user_agent)
            .to_ascii_lowercase();
        Ok(Self {
            client,
            agent,
            max_retries: 2,
            backoff_base_ms: 1000,
            respect_robots: true,
            robots: HashMap::new(),
            current: None,
        })
    }

    /// Turns robots.txt checks on or off. On by default.
    #[must_use]
    pub fn with_robots(mut self, respect: bool) -> Self {
        self.respect_robots = respect;
        self
    }

    /// Overrides the retry policy for transient failures.
    #[must_use]
    pub fn with_retry_policy(mut self, max_retries: u32, backoff_base_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    /// Refuses `url` when its origin's robots.txt disallows the path.
    async fn check_robots(&mut self, url: &str) -> Result<(), BrowseError> {
        let parsed = Url::parse(url).map_err(|e| BrowseError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let origin = parsed.origin().ascii_serialization();
        if !self.robots.contains_key(&origin) {
            let rules = self.fetch_robots(&origin).await;
            self.robots.insert(origin.clone(), rules);
        }

        let path = match parsed.query() {
            Some(query) => format!("{}?{query}", parsed.path()),
            None => parsed.path().to_string(),
        };
        if self.robots.get(&origin).is_some_and(|rules| !rules.allows(&path)) {
            tracing::warn!(url, agent = %self.agent, "robots.txt disallows path");
            return Err(BrowseError::Navigation {
                url: url.to_string(),
                reason: "disallowed by robots.txt".to_string(),
            });
        }
        Ok(())
    }

    /// An unreadable or missing robots.txt allows everything.
    async fn fetch_robots(&self, origin: &str) -> RobotsRules {
        let robots_url = format!("{origin}/robots.txt");
        match self.client.get(&robots_url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => RobotsRules::parse(&body, &self.agent),
                Err(e) => {
                    tracing::debug!(url = %robots_url, error = %e, "failed reading robots.txt");
                    RobotsRules::allow_all()
                }
            },
            Ok(resp) => {
                tracing::debug!(
                    url = %robots_url,
                    status = resp.status().as_u16(),
                    "no robots.txt"
                );
                RobotsRules::allow_all()
            }
            Err(e) => {
                tracing::warn!(url = %robots_url, error = %e, "failed fetching robots.txt");
                RobotsRules::allow_all()
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<PageCapture, BrowseError> {
        let response = self
            .client
            .get(url)
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8",
            )
            .header(reqwest::header::ACCEPT_LANGUAGE, "nl-NL,nl;q=0.9,en;q=0.8")
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .await?;

        let status = response.status();
        let final_url = response.url().to_string();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(BrowseError::RateLimited {
                url: url.to_string(),
                retry_after_secs,
            });
        }

        if !status.is_success() && !CLASSIFIABLE_STATUSES.contains(&status.as_u16()) {
            return Err(BrowseError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let html = response.text().await?;
        tracing::debug!(
            url = %final_url,
            status = status.as_u16(),
            bytes = html.len(),
            "fetched page"
        );
        Ok(PageCapture {
            url: final_url,
            html,
            scroll_height: None,
        })
    }
}

#[async_trait]
impl Browser for HttpBrowser {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowseError> {
        if self.respect_robots {
            self.check_robots(url).await?;
        }
        let capture =
            retry_with_backoff(self.max_retries, self.backoff_base_ms, || self.fetch(url)).await?;
        self.current = Some(capture);
        Ok(())
    }

    async fn snapshot(&mut self) -> Result<PageCapture, BrowseError> {
        self.current.clone().ok_or(BrowseError::NotNavigated)
    }

    async fn click(&mut self, selector: &str) -> Result<(), BrowseError> {
        tracing::trace!(selector, "click ignored on static page");
        Ok(())
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), BrowseError> {
        Ok(())
    }

    async fn settle(&mut self, _wait: Duration) -> Result<(), BrowseError> {
        Ok(())
    }
}
