//! Bounded scrolling and "load more" pagination.
//!
//! The scroller is a lazy, finite sequence of steps. Each step clicks the
//! load-more control seen on the previous snapshot if there was one and
//! scrolls to the bottom otherwise. It then waits a jittered settle interval
//! and captures, extracts and classifies the page. The sequence ends after
//! `max_steps`, when a step adds nothing, or when a step is blocking.

use std::future::Future;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shelfprobe_core::{PageSnapshot, PageState, RunBounds};
use tokio::time::Instant;

use crate::browse::Browser;
use crate::detect::{ContentFingerprint, Detector, Observation};
use crate::error::{BrowseError, StepFailure};
use crate::extract::Extraction;

/// Step limit and settle window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollBounds {
    pub max_steps: u32,
    pub min_settle: Duration,
    pub max_settle: Duration,
}

impl From<RunBounds> for ScrollBounds {
    fn from(bounds: RunBounds) -> Self {
        Self {
            max_steps: bounds.max_steps,
            min_settle: bounds.min_settle,
            max_settle: bounds.max_settle,
        }
    }
}

/// What a step did to the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrollAction {
    LoadMore(String),
    Scroll,
}

/// Why the sequence ended at this step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    StepBound,
    ContentExhausted,
    Blocking,
}

/// State carried over from the snapshot before the first step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Baseline {
    pub fingerprint: ContentFingerprint,
    pub load_more: Option<String>,
    /// URL to load before the first action, when the previous snapshot did
    /// not come from the live page.
    pub pending_navigation: Option<String>,
}

impl Baseline {
    #[must_use]
    pub fn from_observation(observation: &Observation) -> Self {
        Self {
            fingerprint: observation.fingerprint,
            load_more: observation.load_more.clone(),
            pending_navigation: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScrollStep {
    pub snapshot: PageSnapshot,
    pub state: PageState,
    pub extraction: Extraction,
    pub action: ScrollAction,
    pub stop: Option<StopReason>,
}

impl ScrollStep {
    #[must_use]
    pub fn index(&self) -> u32 {
        self.snapshot.step_index
    }
}

pub struct Scroller<'a, B: Browser + ?Sized> {
    browser: &'a mut B,
    detector: &'a Detector,
    bounds: ScrollBounds,
    jitter: StdRng,
    deadline: Option<Instant>,
    previous: ContentFingerprint,
    load_more: Option<String>,
    pending_navigation: Option<String>,
    step: u32,
    finished: bool,
}

impl<'a, B: Browser + ?Sized> Scroller<'a, B> {
    #[must_use]
    pub fn new(
        browser: &'a mut B,
        detector: &'a Detector,
        bounds: ScrollBounds,
        seed: u64,
        deadline: Option<Instant>,
        baseline: Baseline,
    ) -> Self {
        Self {
            browser,
            detector,
            bounds,
            jitter: StdRng::seed_from_u64(seed),
            deadline,
            previous: baseline.fingerprint,
            load_more: baseline.load_more,
            pending_navigation: baseline.pending_navigation,
            step: 0,
            finished: false,
        }
    }

    /// Performs the next step. `None` once the sequence has ended; after an
    /// error the sequence is over as well.
    pub async fn next_step(&mut self) -> Option<Result<ScrollStep, StepFailure>> {
        if self.finished || self.step >= self.bounds.max_steps {
            self.finished = true;
            return None;
        }
        let result = self.perform_step().await;
        match &result {
            Ok(step) => self.finished = step.stop.is_some(),
            Err(_) => self.finished = true,
        }
        Some(result)
    }

    /// Drives the sequence to its end.
    ///
    /// # Errors
    ///
    /// Returns the first [`StepFailure`]; steps completed before it are lost,
    /// so callers that need partial progress should use [`Self::next_step`].
    pub async fn run(mut self) -> Result<Vec<ScrollStep>, StepFailure> {
        let mut steps = Vec::new();
        while let Some(step) = self.next_step().await {
            steps.push(step?);
        }
        Ok(steps)
    }

    async fn perform_step(&mut self) -> Result<ScrollStep, StepFailure> {
        let index = self.step + 1;
        let deadline = self.deadline;

        if let Some(url) = self.pending_navigation.take() {
            guarded(deadline, self.browser.navigate(&url)).await?;
        }

        let action = match self.load_more.take() {
            Some(selector) => {
                guarded(deadline, self.browser.click(&selector)).await?;
                ScrollAction::LoadMore(selector)
            }
            None => {
                guarded(deadline, self.browser.scroll_to_bottom()).await?;
                ScrollAction::Scroll
            }
        };

        let wait = self.settle_interval();
        guarded(deadline, self.browser.settle(wait)).await?;
        let capture = guarded(deadline, self.browser.snapshot()).await?;

        let snapshot = PageSnapshot::from_capture(capture, index);
        let observation = self.detector.observe(&snapshot);

        let stop = if observation.state.is_blocking() {
            Some(StopReason::Blocking)
        } else if observation.fingerprint == self.previous {
            Some(StopReason::ContentExhausted)
        } else if index >= self.bounds.max_steps {
            Some(StopReason::StepBound)
        } else {
            None
        };

        tracing::debug!(
            step = index,
            action = ?action,
            state = %observation.state,
            stop = ?stop,
            settle_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
            "scroll step"
        );

        self.step = index;
        self.previous = observation.fingerprint;
        self.load_more = observation.load_more;

        Ok(ScrollStep {
            snapshot,
            state: observation.state,
            extraction: observation.extraction,
            action,
            stop,
        })
    }

    /// Uniform jitter in `[min_settle, max_settle]`, reproducible per seed.
    fn settle_interval(&mut self) -> Duration {
        let min = u64::try_from(self.bounds.min_settle.as_millis()).unwrap_or(u64::MAX);
        let max = u64::try_from(self.bounds.max_settle.as_millis()).unwrap_or(u64::MAX);
        if max <= min {
            return Duration::from_millis(min);
        }
        Duration::from_millis(self.jitter.random_range(min..=max))
    }
}

/// Bounds one browse call by the run deadline.
pub(crate) async fn guarded<T, F>(deadline: Option<Instant>, call: F) -> Result<T, StepFailure>
where
    F: Future<Output = Result<T, BrowseError>>,
{
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, call)
            .await
            .map_err(|_| StepFailure::DeadlineElapsed)?
            .map_err(StepFailure::from),
        None => call.await.map_err(StepFailure::from),
    }
}

#[cfg(test)]
#[path = "scroll_test.rs"]
mod tests;
