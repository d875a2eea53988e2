//! Raw page signals the classifier decides on.

use std::sync::LazyLock;

use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use super::profile::{is_disabled, SiteProfile};

fn sel(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

static TITLE_SEL: LazyLock<Selector> = LazyLock::new(|| sel("title"));
static BODY_SEL: LazyLock<Selector> = LazyLock::new(|| sel("body"));
static PASSWORD_SEL: LazyLock<Selector> = LazyLock::new(|| sel("input[type='password']"));
static LOGIN_MARKER_SEL: LazyLock<Selector> = LazyLock::new(|| {
    sel("form[action*='login'], form[action*='signin'], form[action*='sign-in'], \
         form[action*='auth'], form[id*='login'], form[class*='login'], \
         input[autocomplete='username'], input[name='username'], [data-testid*='login-form']")
});
static CHALLENGE_SEL: LazyLock<Selector> = LazyLock::new(|| {
    sel("script[src*='/cdn-cgi/challenge-platform/'], iframe[src*='challenges.cloudflare.com'], \
         #challenge-form, #challenge-running, #challenge-stage, #cf-challenge-running, \
         #cf-please-wait, div.cf-turnstile, [data-sitekey][class*='turnstile']")
});
static CONSENT_OVERLAY_SEL: LazyLock<Selector> = LazyLock::new(|| {
    sel("#onetrust-banner-sdk, #onetrust-consent-sdk, #CybotCookiebotDialog, \
         #usercentrics-root, #didomi-host, .fc-consent-root, #sp-cc, \
         [id*='cookie-consent'], [class*='cookie-consent'], [id*='cookieconsent'], \
         [class*='cookie-wall'], [class*='cookiewall'], [id*='cookiewall'], \
         [data-testid*='cookie-banner'], [class*='consent-modal']")
});
/// Accept controls of the common consent platforms, most specific first.
const CONSENT_ACCEPT_SELECTORS: &[&str] = &[
    "#onetrust-accept-btn-handler",
    "#CybotCookiebotDialogBodyLevelButtonLevelOptinAllowAll",
    "#CybotCookiebotDialogBodyButtonAccept",
    "#didomi-notice-agree-button",
    "[data-testid*='accept']",
    "[data-test*='accept']",
    "button[id*='accept']",
    "button[class*='accept']",
];
static CONSENT_BUTTON_SELS: LazyLock<Vec<(&'static str, Selector)>> = LazyLock::new(|| {
    CONSENT_ACCEPT_SELECTORS
        .iter()
        .map(|source| (*source, sel(source)))
        .collect()
});
static BUTTON_SEL: LazyLock<Selector> =
    LazyLock::new(|| sel("button, a[role='button'], input[type='button'], input[type='submit']"));
static MODAL_SEL: LazyLock<Selector> = LazyLock::new(|| sel("[aria-modal='true']"));

/// Page titles that belong to bot-protection interstitials.
const CHALLENGE_TITLES: &[&str] = &["just a moment", "attention required", "access denied"];

/// Interstitial phrases in the visible text.
const CHALLENGE_PHRASES: &[&str] = &[
    "checking your browser",
    "verify you are human",
    "verifying you are human",
    "needs to review the security of your connection",
    "checking if the site connection is secure",
    "enable javascript and cookies to continue",
];

/// Accept-button captions across the storefront languages we survey.
const CONSENT_TEXTS: &[&str] = &[
    "accept all",
    "accept cookies",
    "allow all",
    "agree",
    "i accept",
    "alles accepteren",
    "accepteren",
    "akkoord",
    "tout accepter",
    "accepter",
    "j'accepte",
    "alle akzeptieren",
    "akzeptieren",
    "aceptar",
    "accetta",
];

const LOGIN_PATH_NEEDLES: &[&str] = &[
    "/login",
    "/log-in",
    "/signin",
    "/sign-in",
    "/inloggen",
    "/connexion",
    "/anmelden",
    "/identity",
    "/oauth",
    "/sso",
    "/auth/",
    "/account/login",
];

const LOGIN_HOST_PREFIXES: &[&str] = &[
    "login.", "auth.", "sso.", "accounts.", "signin.", "id.", "identity.",
];

const LOGIN_TEXTS: &[&str] = &["log in", "login", "sign in", "inloggen", "se connecter", "anmelden"];

const SCROLL_LOCK_CLASSES: &[&str] = &[
    "modal-open",
    "no-scroll",
    "noscroll",
    "overflow-hidden",
    "scroll-lock",
    "disable-scroll",
];

/// Host and path of the page a run was asked to survey.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetLocation {
    host: String,
    path: String,
}

impl TargetLocation {
    /// `None` when `url` is not an absolute URL.
    #[must_use]
    pub fn parse(url: &str) -> Option<Self> {
        let parsed = Url::parse(url).ok()?;
        Some(Self {
            host: parsed.host_str()?.to_ascii_lowercase(),
            path: parsed.path().trim_end_matches('/').to_ascii_lowercase(),
        })
    }

    fn same_page(&self, other: &TargetLocation) -> bool {
        self.host == other.host && self.path == other.path
    }
}

/// Everything the classifier needs, gathered in one pass over the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct PageSignals {
    /// Current URL looks like a login or SSO endpoint.
    pub login_url: bool,
    /// Current URL is a different page than the target.
    pub off_target: bool,
    pub password_input: bool,
    pub login_marker: bool,
    pub challenge_marker: bool,
    pub consent_overlay: bool,
    /// An accept-style control sits inside a consent overlay.
    pub consent_controls: bool,
    /// A modal or a scroll-locked body keeps the listing out of reach.
    pub content_covered: bool,
    pub listing_container: bool,
    pub card_count: usize,
    pub candidate_count: usize,
}

impl PageSignals {
    /// True when the listing shows any product, as a card or as markup.
    #[must_use]
    pub fn has_primary_content(&self) -> bool {
        self.card_count > 0 || self.candidate_count > 0
    }

    pub(crate) fn from_document(
        document: &Html,
        url: &str,
        profile: &SiteProfile,
        target: Option<&TargetLocation>,
        candidate_count: usize,
    ) -> Self {
        let current = TargetLocation::parse(url);
        let login_url = current.as_ref().is_some_and(is_login_location);
        let off_target = match (current.as_ref(), target) {
            (Some(current), Some(target)) => !current.same_page(target),
            _ => false,
        };

        let overlays: Vec<ElementRef<'_>> = document.select(&CONSENT_OVERLAY_SEL).collect();
        let consent_controls = overlays.iter().any(|overlay| {
            CONSENT_BUTTON_SELS
                .iter()
                .any(|(_, button)| overlay.select(button).next().is_some())
                || overlay.select(&BUTTON_SEL).any(|b| is_consent_caption(&caption(b)))
        });
        let content_covered =
            overlays.iter().any(|o| is_modal(*o)) || body_scroll_locked(document);

        Self {
            login_url,
            off_target,
            password_input: document.select(&PASSWORD_SEL).next().is_some(),
            login_marker: document.select(&LOGIN_MARKER_SEL).next().is_some()
                || document
                    .select(&BUTTON_SEL)
                    .any(|b| LOGIN_TEXTS.contains(&caption(b).as_str())),
            challenge_marker: has_challenge_marker(document),
            consent_overlay: !overlays.is_empty(),
            consent_controls,
            content_covered,
            listing_container: profile.containers.any_match(document),
            card_count: profile.cards.first_count(document),
            candidate_count,
        }
    }
}

/// Selector of the first enabled accept control inside a consent overlay.
///
/// Known consent-platform buttons win; after that, any button whose caption
/// reads as "accept" and that carries a plain `id`.
pub(crate) fn consent_accept_control(document: &Html) -> Option<String> {
    let overlays: Vec<ElementRef<'_>> = document.select(&CONSENT_OVERLAY_SEL).collect();
    for overlay in &overlays {
        let known = CONSENT_BUTTON_SELS
            .iter()
            .find(|(_, button)| overlay.select(button).any(|e| !is_disabled(e)));
        if let Some((source, _)) = known {
            return Some((*source).to_string());
        }
    }
    overlays
        .iter()
        .flat_map(|overlay| overlay.select(&BUTTON_SEL))
        .filter(|b| !is_disabled(*b) && is_consent_caption(&caption(*b)))
        .find_map(|b| {
            b.value()
                .id()
                .filter(|id| is_plain_id(id))
                .map(|id| format!("#{id}"))
        })
}

fn is_plain_id(id: &str) -> bool {
    id.starts_with(|c: char| c.is_ascii_alphabetic())
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
}

fn is_login_location(location: &TargetLocation) -> bool {
    LOGIN_HOST_PREFIXES
        .iter()
        .any(|prefix| location.host.starts_with(prefix))
        || LOGIN_PATH_NEEDLES.iter().any(|needle| {
            location.path.contains(needle)
                || location.path.ends_with(needle.trim_end_matches('/'))
        })
}

fn has_challenge_marker(document: &Html) -> bool {
    if document.select(&CHALLENGE_SEL).next().is_some() {
        return true;
    }
    let title = document
        .select(&TITLE_SEL)
        .next()
        .map(|t| t.text().collect::<String>().to_lowercase())
        .unwrap_or_default();
    if CHALLENGE_TITLES.iter().any(|t| title.contains(t)) {
        return true;
    }
    let body = document
        .select(&BODY_SEL)
        .next()
        .map(|b| b.text().collect::<String>().to_lowercase())
        .unwrap_or_default();
    CHALLENGE_PHRASES.iter().any(|p| body.contains(p))
}

fn caption(element: ElementRef<'_>) -> String {
    let text = element
        .value()
        .attr("value")
        .map(str::to_string)
        .unwrap_or_else(|| element.text().collect::<String>());
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn is_consent_caption(caption: &str) -> bool {
    !caption.is_empty() && CONSENT_TEXTS.iter().any(|t| caption.contains(t))
}

fn is_modal(element: ElementRef<'_>) -> bool {
    let el = element.value();
    el.attr("aria-modal")
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        || element.select(&MODAL_SEL).next().is_some()
}

fn body_scroll_locked(document: &Html) -> bool {
    let html_root = document.root_element();
    let mut nodes = vec![html_root];
    nodes.extend(document.select(&BODY_SEL));
    nodes.iter().any(|node| {
        let el = node.value();
        let class_lock = el
            .attr("class")
            .is_some_and(|c| c.split_whitespace().any(|cls| SCROLL_LOCK_CLASSES.contains(&cls)));
        let style_lock = el.attr("style").is_some_and(|s| {
            let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
            compact.to_ascii_lowercase().contains("overflow:hidden")
        });
        class_lock || style_lock
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_location_by_path_and_host() {
        let path = TargetLocation::parse("https://www.shop.example/account/login?next=/olie").unwrap();
        assert!(is_login_location(&path));
        let host = TargetLocation::parse("https://login.shop.example/").unwrap();
        assert!(is_login_location(&host));
        let listing = TargetLocation::parse("https://www.shop.example/olie-azijn").unwrap();
        assert!(!is_login_location(&listing));
    }

    #[test]
    fn same_page_ignores_trailing_slash_and_query() {
        let a = TargetLocation::parse("https://shop.example/olie/").unwrap();
        let b = TargetLocation::parse("https://shop.example/olie?page=2").unwrap();
        assert!(a.same_page(&b));
    }

    #[test]
    fn body_scroll_lock_by_class_or_style() {
        let doc = Html::parse_document("<html><body class='page modal-open'></body></html>");
        assert!(body_scroll_locked(&doc));
        let doc = Html::parse_document("<html style='overflow: hidden'><body></body></html>");
        assert!(body_scroll_locked(&doc));
        let doc = Html::parse_document("<html><body class='page'></body></html>");
        assert!(!body_scroll_locked(&doc));
    }

    #[test]
    fn consent_accept_prefers_known_platform_button() {
        let doc = Html::parse_document(
            r#"<div id="onetrust-banner-sdk"><button id="reject">Reject</button>
            <button id="onetrust-accept-btn-handler">Accept all</button></div>"#,
        );
        assert_eq!(
            consent_accept_control(&doc).as_deref(),
            Some("#onetrust-accept-btn-handler")
        );
    }

    #[test]
    fn consent_accept_falls_back_to_captioned_button_with_id() {
        let doc = Html::parse_document(
            r#"<div class="cookie-consent"><button id="cc-ok">Alles accepteren</button></div>"#,
        );
        assert_eq!(consent_accept_control(&doc).as_deref(), Some("#cc-ok"));

        let doc = Html::parse_document(
            r#"<div class="cookie-consent"><button>Alles accepteren</button></div>"#,
        );
        assert_eq!(consent_accept_control(&doc), None);

        let doc = Html::parse_document(
            r#"<div class="cookie-consent"><button id="cc-ok" disabled>Akkoord</button></div>"#,
        );
        assert_eq!(consent_accept_control(&doc), None);
    }

    #[test]
    fn consent_accept_ignores_buttons_outside_overlays() {
        let doc = Html::parse_document(r#"<button id="accept-terms">Accept all</button>"#);
        assert_eq!(consent_accept_control(&doc), None);
    }

    #[test]
    fn consent_caption_matches_localized_accept() {
        assert!(is_consent_caption("alles accepteren"));
        assert!(is_consent_caption("tout accepter"));
        assert!(!is_consent_caption("add to cart"));
        assert!(!is_consent_caption(""));
    }
}
