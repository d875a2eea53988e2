//! Command handlers: build a browse adapter per target, run it through the
//! engine and collect printable reports.
//!
//! Target-specific failures never fail the command; they show up as the
//! report's terminal status. Only unreadable inputs do.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use shelfprobe_core::{AppConfig, RunBounds, RunResult, RunTarget};
use shelfprobe_engine::{
    Browser, EventSink, HttpBrowser, MemoryCache, NoCache, Orchestrator, ProfileSpec,
    RecordingSink, ReplayBrowser, RunEvent, SiteProfile, SnapshotCache, TracingSink,
};

/// One run as printed on stdout.
#[derive(Debug, Serialize)]
pub(crate) struct RunReport {
    #[serde(flatten)]
    pub result: RunResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<RunEvent>>,
}

/// Built-in selectors, or the ones in a JSON profile file.
pub(crate) fn load_profile(path: Option<&Path>) -> anyhow::Result<SiteProfile> {
    let Some(path) = path else {
        return Ok(SiteProfile::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read profile {}", path.display()))?;
    let spec: ProfileSpec = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse profile {}", path.display()))?;
    Ok(SiteProfile::from_spec(&spec)?)
}

/// Every `*.html` file in `dir`, in file-name order.
pub(crate) fn load_frames(dir: &Path) -> anyhow::Result<Vec<String>> {
    let mut paths = std::fs::read_dir(dir)
        .with_context(|| format!("failed to list frames in {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("html")))
        .collect::<Vec<_>>();
    paths.sort();
    if paths.is_empty() {
        anyhow::bail!("no .html frames in {}", dir.display());
    }
    paths
        .iter()
        .map(|p| {
            std::fs::read_to_string(p).with_context(|| format!("failed to read {}", p.display()))
        })
        .collect()
}

/// A JSON array of targets; every entry must validate.
pub(crate) fn load_targets(path: &Path) -> anyhow::Result<Vec<RunTarget>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read targets {}", path.display()))?;
    let targets: Vec<RunTarget> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse targets {}", path.display()))?;
    for (i, target) in targets.iter().enumerate() {
        target
            .validate()
            .with_context(|| format!("target #{i} in {} is invalid", path.display()))?;
    }
    Ok(targets)
}

pub(crate) fn build_http_browser(config: &AppConfig) -> anyhow::Result<HttpBrowser> {
    HttpBrowser::new(config.request_timeout_secs, &config.user_agent)
        .map(|browser| browser.with_robots(config.respect_robots))
        .map_err(|e| anyhow::anyhow!("failed to build HTTP browser: {e}"))
}

pub(crate) async fn replay(
    target: &RunTarget,
    frames_dir: &Path,
    profile: SiteProfile,
    bounds: RunBounds,
    capture_events: bool,
) -> anyhow::Result<RunReport> {
    let frames = load_frames(frames_dir)?;
    let browser = ReplayBrowser::from_html(&target.start_url, frames);
    Ok(run_one(browser, target, profile, bounds, Arc::new(NoCache), capture_events).await)
}

pub(crate) async fn fetch(
    target: &RunTarget,
    profile: SiteProfile,
    config: &AppConfig,
    capture_events: bool,
) -> anyhow::Result<RunReport> {
    let browser = build_http_browser(config)?;
    Ok(run_one(
        browser,
        target,
        profile,
        config.run_bounds(),
        Arc::new(NoCache),
        capture_events,
    )
    .await)
}

/// Runs every target over HTTP, at most `max_concurrent_runs` at a time.
/// Reports come back in input order.
pub(crate) async fn batch(
    targets_path: &Path,
    profile: &SiteProfile,
    config: &AppConfig,
    capture_events: bool,
) -> anyhow::Result<Vec<RunReport>> {
    let targets = load_targets(targets_path)?;
    let browsers = targets
        .iter()
        .map(|_| build_http_browser(config))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let cache: Arc<dyn SnapshotCache> = Arc::new(MemoryCache::new());
    let bounds = config.run_bounds();
    let max_concurrent = config.max_concurrent_runs.max(1);

    tracing::info!(
        targets = targets.len(),
        max_concurrent,
        "starting batch"
    );

    let mut reports: Vec<(usize, RunReport)> = stream::iter(targets.iter().zip(browsers).enumerate())
        .map(|(i, (target, browser))| {
            let profile = profile.clone();
            let cache = Arc::clone(&cache);
            async move {
                let report = run_one(browser, target, profile, bounds, cache, capture_events).await;
                (i, report)
            }
        })
        .buffer_unordered(max_concurrent)
        .collect()
        .await;
    reports.sort_by_key(|(i, _)| *i);
    Ok(reports.into_iter().map(|(_, report)| report).collect())
}

async fn run_one<B: Browser>(
    browser: B,
    target: &RunTarget,
    profile: SiteProfile,
    bounds: RunBounds,
    cache: Arc<dyn SnapshotCache>,
    capture_events: bool,
) -> RunReport {
    let recorder = capture_events.then(|| Arc::new(RecordingSink::new()));
    let sink: Arc<dyn EventSink> = match &recorder {
        Some(recorder) => recorder.clone(),
        None => Arc::new(TracingSink),
    };

    let mut orchestrator = Orchestrator::new(browser, cache, sink, profile, bounds);
    let result = orchestrator.execute(target).await;
    tracing::info!(
        run_id = %result.run_id,
        retailer = %result.retailer_code,
        status = %result.terminal_status,
        records = result.records.len(),
        "run complete"
    );

    RunReport {
        result,
        events: recorder.map(|r| r.events()),
    }
}
