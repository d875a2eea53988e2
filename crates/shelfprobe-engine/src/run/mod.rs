//! Per-target run state machine.
//!
//! `start → probing → scrolling → finalizing → completed`, with a flip to one
//! of the `flipped_*` statuses from probing or scrolling as soon as a snapshot
//! classifies as blocking, and `timeout` from any live phase when the run
//! deadline passes or the browse layer fails. Candidates gathered before the
//! run ended are always normalized; candidates from a blocking step are not.

mod finalize;
mod phase;

pub use finalize::{finalize, normalize_candidate, DroppedCandidate, FinalizeContext, Finalized};
pub use phase::RunPhase;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use shelfprobe_core::{
    BlockingObservation, PageSnapshot, PageState, RawProductCandidate, RunBounds, RunResult,
    RunTarget, TerminalStatus,
};
use tokio::time::Instant;

use crate::browse::Browser;
use crate::cache::SnapshotCache;
use crate::detect::{Detector, SiteProfile};
use crate::error::StepFailure;
use crate::events::{DropReason, EventSink, RunEvent};
use crate::extract::{Extraction, MarkupSkip};
use crate::keys::{jitter_seed, run_key};
use crate::normalize::currency_for_country;
use crate::scroll::{guarded, Baseline, Scroller};

/// Drives one [`RunTarget`] at a time through its browser.
pub struct Orchestrator<B: Browser> {
    browser: B,
    cache: Arc<dyn SnapshotCache>,
    sink: Arc<dyn EventSink>,
    profile: SiteProfile,
    bounds: RunBounds,
}

impl<B: Browser> Orchestrator<B> {
    #[must_use]
    pub fn new(
        browser: B,
        cache: Arc<dyn SnapshotCache>,
        sink: Arc<dyn EventSink>,
        profile: SiteProfile,
        bounds: RunBounds,
    ) -> Self {
        Self {
            browser,
            cache,
            sink,
            profile,
            bounds,
        }
    }

    #[must_use]
    pub fn browser(&self) -> &B {
        &self.browser
    }

    #[must_use]
    pub fn into_browser(self) -> B {
        self.browser
    }

    /// Runs `target` to a terminal status. Target-specific failures end up in
    /// the result rather than in an error.
    pub async fn execute(&mut self, target: &RunTarget) -> RunResult {
        let deadline = Instant::now() + self.bounds.run_timeout;
        let key = run_key(&target.run_id, &target.retailer_code);
        let detector = Detector::new(self.profile.clone(), &target.start_url);
        let sink = Arc::clone(&self.sink);
        let mut machine = RunMachine::new(target, sink.as_ref());
        let mut harvest = Harvest::default();

        tracing::info!(
            run_id = %target.run_id,
            retailer = %target.retailer_code,
            url = %target.start_url,
            "starting run"
        );

        machine.advance(RunPhase::Probing, 0);
        let (mut probe, mut from_cache) = match self.probe(target, &key, deadline).await {
            Ok(probe) => probe,
            Err(failure) => {
                return self.conclude(target, machine, harvest, Ending::Failed(failure), 0);
            }
        };

        let mut observation = detector.observe(&probe);
        if observation.state == PageState::CookieWall && self.bounds.dismiss_consent {
            let selector = observation.consent_accept.clone();
            let dismissal = self
                .dismiss_consent(target, selector.as_deref(), from_cache, deadline)
                .await;
            match dismissal {
                Ok(Some(snapshot)) => {
                    observation = detector.observe(&snapshot);
                    probe = snapshot;
                    from_cache = false;
                }
                Ok(None) => {}
                Err(StepFailure::DeadlineElapsed) => {
                    let ending = Ending::Failed(StepFailure::DeadlineElapsed);
                    return self.conclude(target, machine, harvest, ending, 0);
                }
                Err(failure) => tracing::warn!(
                    run_id = %target.run_id,
                    retailer = %target.retailer_code,
                    error = %failure,
                    "consent dismissal failed; keeping the cookie wall"
                ),
            }
        }

        harvest.note_skips(&machine, 0, &observation.extraction.skipped);
        if let Some(status) = observation.state.flip_status() {
            let ending = Ending::Blocked {
                status,
                state: observation.state,
                step_index: 0,
            };
            return self.conclude(target, machine, harvest, ending, 0);
        }
        let mut baseline = Baseline::from_observation(&observation);
        if from_cache {
            baseline.pending_navigation = Some(target.start_url.clone());
        }
        harvest.keep(&probe, observation.extraction);

        machine.advance(RunPhase::Scrolling, 0);
        let mut last_step = 0;
        let mut ending = Ending::Exhausted;
        let mut scroller = Scroller::new(
            &mut self.browser,
            &detector,
            self.bounds.into(),
            jitter_seed(&key),
            Some(deadline),
            baseline,
        );
        while let Some(next) = scroller.next_step().await {
            let step = match next {
                Ok(step) => step,
                Err(failure) => {
                    ending = Ending::Failed(failure);
                    break;
                }
            };
            last_step = step.index();
            harvest.note_skips(&machine, last_step, &step.extraction.skipped);
            if let Some(status) = step.state.flip_status() {
                ending = Ending::Blocked {
                    status,
                    state: step.state,
                    step_index: last_step,
                };
                break;
            }
            harvest.keep(&step.snapshot, step.extraction);
        }

        self.conclude(target, machine, harvest, ending, last_step)
    }

    /// Step 0: the cached snapshot for this run if there is one, otherwise a
    /// fresh capture of the start URL, which is then cached.
    async fn probe(
        &mut self,
        target: &RunTarget,
        key: &str,
        deadline: Instant,
    ) -> Result<(PageSnapshot, bool), StepFailure> {
        let cached = tokio::time::timeout_at(deadline, self.cache.get(key))
            .await
            .map_err(|_| StepFailure::DeadlineElapsed)?;
        if let Some(snapshot) = cached {
            tracing::debug!(run_id = %target.run_id, "probe served from cache");
            return Ok((snapshot.at_step(0), true));
        }

        guarded(Some(deadline), self.browser.navigate(&target.start_url)).await?;
        let capture = guarded(Some(deadline), self.browser.snapshot()).await?;
        let snapshot = PageSnapshot::from_capture(capture, 0);
        self.cache.put(key, &snapshot).await;
        Ok((snapshot, false))
    }

    /// Clicks the accept control of a cookie wall seen at step 0 and takes a
    /// fresh step-0 snapshot. `None` when the wall has no control to click.
    async fn dismiss_consent(
        &mut self,
        target: &RunTarget,
        selector: Option<&str>,
        from_cache: bool,
        deadline: Instant,
    ) -> Result<Option<PageSnapshot>, StepFailure> {
        let Some(selector) = selector else {
            tracing::debug!(run_id = %target.run_id, "cookie wall has no accept control");
            return Ok(None);
        };
        let deadline = Some(deadline);
        if from_cache {
            guarded(deadline, self.browser.navigate(&target.start_url)).await?;
        }
        guarded(deadline, self.browser.click(selector)).await?;
        guarded(deadline, self.browser.settle(self.bounds.max_settle)).await?;
        let capture = guarded(deadline, self.browser.snapshot()).await?;

        self.sink.emit(RunEvent::ConsentDismissed {
            run_id: target.run_id.clone(),
            retailer_code: target.retailer_code.clone(),
            selector: selector.to_string(),
            at: Utc::now(),
        });
        Ok(Some(PageSnapshot::from_capture(capture, 0)))
    }

    fn conclude(
        &self,
        target: &RunTarget,
        mut machine: RunMachine<'_>,
        harvest: Harvest,
        ending: Ending,
        step_count: u32,
    ) -> RunResult {
        let (status, blocking, failure) = match ending {
            Ending::Exhausted => {
                machine.advance(RunPhase::Finalizing, step_count);
                (TerminalStatus::Completed, None, None)
            }
            Ending::Blocked {
                status,
                state,
                step_index,
            } => {
                tracing::warn!(
                    run_id = %target.run_id,
                    retailer = %target.retailer_code,
                    state = %state,
                    step = step_index,
                    "blocking page state; flipping run"
                );
                (status, Some(BlockingObservation { state, step_index }), None)
            }
            Ending::Failed(failure) => {
                tracing::warn!(
                    run_id = %target.run_id,
                    retailer = %target.retailer_code,
                    step = step_count,
                    error = %failure,
                    "run ended early"
                );
                (TerminalStatus::Timeout, None, Some(failure.to_string()))
            }
        };

        let ctx = FinalizeContext {
            run_id: &target.run_id,
            retailer_code: &target.retailer_code,
            fallback_currency: currency_for_country(&target.country),
            observed_at: &harvest.observed_at,
        };
        let Finalized { records, dropped } = finalize(&harvest.candidates, &ctx);
        for drop in &dropped {
            self.sink.emit(RunEvent::CandidateDropped {
                run_id: target.run_id.clone(),
                retailer_code: target.retailer_code.clone(),
                step_index: drop.step_index,
                document_index: drop.document_index,
                reason: DropReason::ParseError,
                detail: drop.error.to_string(),
            });
        }

        machine.advance(RunPhase::Terminal(status), step_count);
        self.sink.emit(RunEvent::RunFinished {
            run_id: target.run_id.clone(),
            retailer_code: target.retailer_code.clone(),
            status,
            records: records.len(),
            step_count,
            at: Utc::now(),
        });

        RunResult {
            run_id: target.run_id.clone(),
            retailer_code: target.retailer_code.clone(),
            terminal_status: status,
            records,
            step_count,
            blocking,
            failure,
            skipped_markup: harvest.skipped_markup,
            dropped_candidates: dropped.len(),
        }
    }
}

enum Ending {
    Exhausted,
    Blocked {
        status: TerminalStatus,
        state: PageState,
        step_index: u32,
    },
    Failed(StepFailure),
}

/// Candidates and capture times from every non-blocking step.
#[derive(Default)]
struct Harvest {
    candidates: Vec<RawProductCandidate>,
    observed_at: BTreeMap<u32, DateTime<Utc>>,
    skipped_markup: usize,
}

impl Harvest {
    fn keep(&mut self, snapshot: &PageSnapshot, extraction: Extraction) {
        self.observed_at
            .insert(snapshot.step_index, snapshot.taken_at);
        self.candidates.extend(extraction.candidates);
    }

    fn note_skips(&mut self, machine: &RunMachine<'_>, step_index: u32, skipped: &[MarkupSkip]) {
        self.skipped_markup += skipped.len();
        for skip in skipped {
            machine.sink.emit(RunEvent::MarkupSkipped {
                run_id: machine.target.run_id.clone(),
                retailer_code: machine.target.retailer_code.clone(),
                step_index,
                source: skip.source,
                reason: DropReason::MalformedMarkup,
                detail: skip.detail.clone(),
            });
        }
    }
}

/// Current phase plus the sink that hears about every move.
struct RunMachine<'a> {
    phase: RunPhase,
    target: &'a RunTarget,
    sink: &'a dyn EventSink,
}

impl<'a> RunMachine<'a> {
    fn new(target: &'a RunTarget, sink: &'a dyn EventSink) -> Self {
        Self {
            phase: RunPhase::Start,
            target,
            sink,
        }
    }

    fn advance(&mut self, next: RunPhase, step_index: u32) {
        let allowed = self.phase.can_advance_to(next);
        debug_assert!(allowed, "illegal run transition {} -> {next}", self.phase);
        if !allowed {
            tracing::error!(
                run_id = %self.target.run_id,
                from = %self.phase,
                to = %next,
                "refusing illegal run transition"
            );
            return;
        }
        self.sink.emit(RunEvent::Transition {
            run_id: self.target.run_id.clone(),
            retailer_code: self.target.retailer_code.clone(),
            from: self.phase.as_str(),
            to: next.as_str(),
            step_index,
            at: Utc::now(),
        });
        self.phase = next;
    }
}
