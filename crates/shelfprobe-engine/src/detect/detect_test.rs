use chrono::Utc;

use super::*;

const TARGET: &str = "https://www.shop.example/olie-azijn";

fn snapshot_at(url: &str, html: &str) -> PageSnapshot {
    PageSnapshot {
        url: url.to_string(),
        html: html.to_string(),
        scroll_height: Some(3000),
        taken_at: Utc::now(),
        step_index: 0,
    }
}

fn classify_html(html: &str) -> PageState {
    classify(&snapshot_at(TARGET, html), &SiteProfile::default(), TARGET)
}

const LISTING: &str = r#"<html><head><title>Olie & azijn</title>
<script type="application/ld+json">{"@type":"Product","name":"Olijfolie 500 ml","offers":{"price":"4.99","priceCurrency":"EUR"}}</script>
</head><body>
<ul class="product-list">
  <li class="product-tile" data-product="1">Olijfolie</li>
  <li class="product-tile" data-product="2">Zonnebloemolie</li>
</ul>
</body></html>"#;

#[test]
fn listing_with_products_is_normal() {
    assert_eq!(classify_html(LISTING), PageState::Normal);
}

#[test]
fn redirect_to_login_is_auth() {
    let snap = snapshot_at(
        "https://login.shop.example/?return=/olie-azijn",
        "<html><body><form><input type='email'><input type='password'></form></body></html>",
    );
    assert_eq!(
        classify(&snap, &SiteProfile::default(), TARGET),
        PageState::AuthRedirect
    );
}

#[test]
fn login_form_in_place_without_products_is_auth() {
    let html = r#"<html><body>
        <form action="/account/login" method="post">
          <input name="username"><input type="password" name="password">
          <button>Log in</button>
        </form></body></html>"#;
    assert_eq!(classify_html(html), PageState::AuthRedirect);
}

#[test]
fn header_login_dropdown_on_listing_is_normal() {
    let html = LISTING.replace(
        "<body>",
        r#"<body><form action="/login"><input type="password"></form>"#,
    );
    assert_eq!(classify_html(&html), PageState::Normal);
}

#[test]
fn cloudflare_interstitial_is_challenge() {
    let html = r#"<html><head><title>Just a moment...</title></head><body>
        <div id="challenge-stage"></div>
        <p>Checking if the site connection is secure</p>
        <script src="/cdn-cgi/challenge-platform/h/g/orchestrate/jsch/v1"></script>
        </body></html>"#;
    assert_eq!(classify_html(html), PageState::CfChallenge);
}

#[test]
fn cloudflare_word_alone_is_not_a_challenge() {
    let html = LISTING.replace("</body>", "<footer>Protected by Cloudflare</footer></body>");
    assert_eq!(classify_html(&html), PageState::Normal);
}

#[test]
fn challenge_markers_with_products_present_stay_normal() {
    let html = LISTING.replace(
        "</body>",
        "<iframe src='https://challenges.cloudflare.com/turnstile'></iframe></body>",
    );
    assert_eq!(classify_html(&html), PageState::Normal);
}

#[test]
fn consent_overlay_over_empty_page_is_cookie_wall() {
    let html = r#"<html><body>
        <div id="onetrust-banner-sdk"><p>We use cookies</p>
          <button id="onetrust-accept-btn-handler">Alles accepteren</button>
        </div></body></html>"#;
    assert_eq!(classify_html(html), PageState::CookieWall);
}

#[test]
fn modal_consent_over_listing_is_cookie_wall() {
    let html = LISTING.replace(
        "<body>",
        r#"<body class="modal-open"><div class="cookie-consent" role="dialog" aria-modal="true">
             <button>Tout accepter</button></div>"#,
    );
    assert_eq!(classify_html(&html), PageState::CookieWall);
}

#[test]
fn dismissible_banner_with_visible_listing_is_normal() {
    let html = LISTING.replace(
        "</body>",
        r#"<div class="cookie-consent-bar"><button>Accept all</button></div></body>"#,
    );
    assert_eq!(classify_html(&html), PageState::Normal);
}

#[test]
fn listing_container_without_cards_is_empty() {
    let html = r#"<html><body><h1>Olie</h1>
        <ul class="product-list"></ul><p>Geen producten gevonden</p></body></html>"#;
    assert_eq!(classify_html(html), PageState::EmptyListing);
}

#[test]
fn page_without_container_or_markers_is_normal() {
    assert_eq!(
        classify_html("<html><body><p>Welkom</p></body></html>"),
        PageState::Normal
    );
}

#[test]
fn auth_outranks_cookie_wall() {
    let snap = snapshot_at(
        "https://www.shop.example/login",
        r#"<html><body><div id="CybotCookiebotDialog">
             <button id="CybotCookiebotDialogBodyButtonAccept">OK</button></div></body></html>"#,
    );
    assert_eq!(
        classify(&snap, &SiteProfile::default(), TARGET),
        PageState::AuthRedirect
    );
}

#[test]
fn classify_signals_precedence_table() {
    let mut signals = PageSignals {
        challenge_marker: true,
        consent_overlay: true,
        consent_controls: true,
        listing_container: false,
        ..PageSignals::default()
    };
    assert_eq!(classify_signals(&signals), PageState::CfChallenge);

    signals.challenge_marker = false;
    assert_eq!(classify_signals(&signals), PageState::CookieWall);

    signals.consent_overlay = false;
    signals.listing_container = true;
    assert_eq!(classify_signals(&signals), PageState::EmptyListing);

    signals.candidate_count = 3;
    assert_eq!(classify_signals(&signals), PageState::Normal);
}

#[test]
fn classification_is_deterministic() {
    let snap = snapshot_at(TARGET, LISTING);
    let profile = SiteProfile::default();
    let first = classify(&snap, &profile, TARGET);
    for _ in 0..5 {
        assert_eq!(classify(&snap, &profile, TARGET), first);
    }
}

#[test]
fn observe_reports_enabled_load_more_and_fingerprint() {
    let html = LISTING.replace(
        "</ul>",
        r#"</ul><button class="load-more-btn">Meer laden</button>"#,
    );
    let detector = Detector::new(SiteProfile::default(), TARGET);
    let obs = detector.observe(&snapshot_at(TARGET, &html));
    assert_eq!(obs.state, PageState::Normal);
    assert_eq!(obs.load_more.as_deref(), Some("button[class*='load-more']"));
    assert_eq!(obs.fingerprint.card_count, 2);
    assert_eq!(obs.fingerprint.candidate_count, 1);
    assert_eq!(obs.fingerprint.scroll_height, Some(3000));
}

#[test]
fn observe_ignores_disabled_load_more() {
    let html = LISTING.replace(
        "</ul>",
        r#"</ul><button class="load-more" disabled>Meer laden</button>"#,
    );
    let detector = Detector::new(SiteProfile::default(), TARGET);
    assert_eq!(detector.observe(&snapshot_at(TARGET, &html)).load_more, None);
}

#[test]
fn observe_names_accept_control_only_on_cookie_walls() {
    let detector = Detector::new(SiteProfile::default(), TARGET);
    let wall = r#"<html><body>
        <div id="onetrust-banner-sdk"><p>We use cookies</p>
          <button id="onetrust-accept-btn-handler">Alles accepteren</button>
        </div></body></html>"#;
    let obs = detector.observe(&snapshot_at(TARGET, wall));
    assert_eq!(obs.state, PageState::CookieWall);
    assert_eq!(
        obs.consent_accept.as_deref(),
        Some("#onetrust-accept-btn-handler")
    );

    let banner = LISTING.replace(
        "</body>",
        r#"<div class="cookie-consent-bar"><button id="ok">Accept all</button></div></body>"#,
    );
    let obs = detector.observe(&snapshot_at(TARGET, &banner));
    assert_eq!(obs.state, PageState::Normal);
    assert_eq!(obs.consent_accept, None);
}
