//! Page-state detection.
//!
//! Classification is a pure function of the snapshot, the retailer profile
//! and the run's target URL. Rules apply in a fixed order and the first
//! match wins:
//!
//! 1. `auth_redirect`: the page moved to a login/SSO URL, or shows a
//!    password field with a login form and no products.
//! 2. `cf_challenge`: bot-protection interstitial markers and no products.
//! 3. `cookie_wall`: a consent overlay with accept controls that leaves the
//!    listing empty or covered.
//! 4. `empty_listing`: the listing container renders with zero cards and
//!    the extractor finds zero candidates.
//! 5. `normal`.

mod profile;
mod signals;

use scraper::Html;
use shelfprobe_core::{PageSnapshot, PageState};

use crate::extract::{extract_document, Extraction};

pub use profile::{ProfileSpec, SelectorSet, SiteProfile};
pub(crate) use profile::is_disabled;
use signals::consent_accept_control;
pub use signals::{PageSignals, TargetLocation};

impl PageSignals {
    /// Gathers signals from a snapshot, given how many candidates the
    /// extractor already found in it.
    #[must_use]
    pub fn collect(
        snapshot: &PageSnapshot,
        profile: &SiteProfile,
        target_url: &str,
        candidate_count: usize,
    ) -> Self {
        let document = Html::parse_document(&snapshot.html);
        let target = TargetLocation::parse(target_url);
        Self::from_document(
            &document,
            &snapshot.url,
            profile,
            target.as_ref(),
            candidate_count,
        )
    }
}

/// Applies the ordered classification rules.
#[must_use]
pub fn classify_signals(signals: &PageSignals) -> PageState {
    let content = signals.has_primary_content();

    if (signals.login_url && signals.off_target)
        || (signals.password_input && signals.login_marker && !content)
    {
        return PageState::AuthRedirect;
    }
    if signals.challenge_marker && !content && !signals.listing_container {
        return PageState::CfChallenge;
    }
    if signals.consent_overlay
        && signals.consent_controls
        && (!content || signals.content_covered)
    {
        return PageState::CookieWall;
    }
    if signals.listing_container && signals.card_count == 0 && signals.candidate_count == 0 {
        return PageState::EmptyListing;
    }
    PageState::Normal
}

/// Classifies a snapshot, running the extractor once to count candidates.
#[must_use]
pub fn classify(snapshot: &PageSnapshot, profile: &SiteProfile, target_url: &str) -> PageState {
    let target = TargetLocation::parse(target_url);
    let detector = Detector {
        profile: profile.clone(),
        target,
    };
    detector.observe(snapshot).state
}

/// What changes between scroll steps; equal fingerprints mean no new content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContentFingerprint {
    pub scroll_height: Option<u64>,
    pub card_count: usize,
    pub candidate_count: usize,
}

/// Everything learned from one snapshot, from a single parse.
#[derive(Debug, Clone)]
pub struct Observation {
    pub state: PageState,
    pub signals: PageSignals,
    pub extraction: Extraction,
    pub fingerprint: ContentFingerprint,
    /// First load-more selector that matches an enabled control.
    pub load_more: Option<String>,
    /// Accept control of the consent overlay, on cookie walls only.
    pub consent_accept: Option<String>,
}

/// Classifier bound to one run's profile and target.
#[derive(Debug, Clone)]
pub struct Detector {
    profile: SiteProfile,
    target: Option<TargetLocation>,
}

impl Detector {
    #[must_use]
    pub fn new(profile: SiteProfile, target_url: &str) -> Self {
        Self {
            profile,
            target: TargetLocation::parse(target_url),
        }
    }

    #[must_use]
    pub fn classify(&self, snapshot: &PageSnapshot) -> PageState {
        self.observe(snapshot).state
    }

    /// Parses the snapshot once and derives state, candidates, fingerprint and
    /// the next load-more control.
    #[must_use]
    pub fn observe(&self, snapshot: &PageSnapshot) -> Observation {
        let document = Html::parse_document(&snapshot.html);
        let extraction = extract_document(&document, snapshot.step_index);
        let signals = PageSignals::from_document(
            &document,
            &snapshot.url,
            &self.profile,
            self.target.as_ref(),
            extraction.candidates.len(),
        );
        let state = classify_signals(&signals);
        let load_more = self
            .profile
            .load_more
            .first_matching(&document, |e| !is_disabled(e))
            .map(str::to_string);
        let consent_accept = if state == PageState::CookieWall {
            consent_accept_control(&document)
        } else {
            None
        };

        tracing::debug!(
            step = snapshot.step_index,
            state = %state,
            cards = signals.card_count,
            candidates = signals.candidate_count,
            "classified snapshot"
        );

        Observation {
            state,
            fingerprint: ContentFingerprint {
                scroll_height: snapshot.scroll_height,
                card_count: signals.card_count,
                candidate_count: signals.candidate_count,
            },
            signals,
            extraction,
            load_more,
            consent_accept,
        }
    }
}

#[cfg(test)]
#[path = "detect_test.rs"]
mod tests;
