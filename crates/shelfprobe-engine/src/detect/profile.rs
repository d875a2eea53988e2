//! Per-retailer selector hints.
//!
//! A profile tells the detector and scroller where product cards, the
//! listing container and the "load more" control live. Every set falls back
//! to generic defaults that cover most storefront themes.

use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;

use crate::error::EngineError;

const DEFAULT_CARDS: &[&str] = &[
    "[data-product]",
    "[data-testid*='product-card']",
    "[data-test*='product-card']",
    "article[class*='product']",
    "li[class*='product']",
    "div[class*='product-card']",
];

const DEFAULT_CONTAINERS: &[&str] = &[
    "[data-testid*='product-list']",
    "[data-testid*='search-results']",
    "[class*='product-list']",
    "[class*='product-grid']",
    "[class*='productList']",
    "[class*='search-results']",
    "ul[class*='products']",
    "[itemtype*='ItemList']",
];

const DEFAULT_LOAD_MORE: &[&str] = &[
    "[data-testid*='load-more']",
    "[data-test*='load-more']",
    "button[class*='load-more']",
    "button[class*='loadMore']",
    "a[class*='load-more']",
    "button[data-action='load-more']",
];

/// Raw selector strings, as read from a retailer config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfileSpec {
    pub card_selectors: Vec<String>,
    pub container_selectors: Vec<String>,
    pub load_more_selectors: Vec<String>,
}

/// An ordered list of compiled CSS selectors with their source text.
#[derive(Debug, Clone)]
pub struct SelectorSet {
    entries: Vec<(String, Selector)>,
}

impl SelectorSet {
    /// Compiles every selector, failing on the first invalid one.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidSelector`] naming the selector.
    pub fn compile<S: AsRef<str>>(sources: &[S]) -> Result<Self, EngineError> {
        let entries = sources
            .iter()
            .map(|s| {
                let source = s.as_ref();
                Selector::parse(source)
                    .map(|sel| (source.to_string(), sel))
                    .map_err(|e| EngineError::InvalidSelector {
                        selector: source.to_string(),
                        reason: format!("{e:?}"),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    fn defaults(sources: &[&str]) -> Self {
        Self {
            entries: sources
                .iter()
                .filter_map(|s| Selector::parse(s).ok().map(|sel| ((*s).to_string(), sel)))
                .collect(),
        }
    }

    /// Match count of the first selector that matches anything.
    #[must_use]
    pub fn first_count(&self, document: &Html) -> usize {
        self.entries
            .iter()
            .map(|(_, sel)| document.select(sel).count())
            .find(|count| *count > 0)
            .unwrap_or(0)
    }

    #[must_use]
    pub fn any_match(&self, document: &Html) -> bool {
        self.entries
            .iter()
            .any(|(_, sel)| document.select(sel).next().is_some())
    }

    /// Source text of the first selector that matches an element accepted by
    /// `accept`.
    pub fn first_matching<F>(&self, document: &Html, accept: F) -> Option<&str>
    where
        F: Fn(ElementRef<'_>) -> bool,
    {
        self.entries
            .iter()
            .find(|(_, sel)| document.select(sel).any(&accept))
            .map(|(source, _)| source.as_str())
    }

    #[must_use]
    pub fn sources(&self) -> Vec<&str> {
        self.entries.iter().map(|(s, _)| s.as_str()).collect()
    }
}

/// Selector hints for one retailer.
#[derive(Debug, Clone)]
pub struct SiteProfile {
    pub cards: SelectorSet,
    pub containers: SelectorSet,
    pub load_more: SelectorSet,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            cards: SelectorSet::defaults(DEFAULT_CARDS),
            containers: SelectorSet::defaults(DEFAULT_CONTAINERS),
            load_more: SelectorSet::defaults(DEFAULT_LOAD_MORE),
        }
    }
}

impl SiteProfile {
    /// Builds a profile; any empty list in `spec` keeps the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidSelector`] if a supplied selector does
    /// not parse.
    pub fn from_spec(spec: &ProfileSpec) -> Result<Self, EngineError> {
        let defaults = Self::default();
        let pick = |custom: &[String], fallback: SelectorSet| {
            if custom.is_empty() {
                Ok(fallback)
            } else {
                SelectorSet::compile(custom)
            }
        };
        Ok(Self {
            cards: pick(&spec.card_selectors, defaults.cards)?,
            containers: pick(&spec.container_selectors, defaults.containers)?,
            load_more: pick(&spec.load_more_selectors, defaults.load_more)?,
        })
    }
}

/// A control that cannot be clicked right now.
pub(crate) fn is_disabled(element: ElementRef<'_>) -> bool {
    let el = element.value();
    el.attr("disabled").is_some()
        || el
            .attr("aria-disabled")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        || el.attr("hidden").is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_all_compile() {
        let profile = SiteProfile::default();
        assert_eq!(profile.cards.sources().len(), DEFAULT_CARDS.len());
        assert_eq!(profile.containers.sources().len(), DEFAULT_CONTAINERS.len());
        assert_eq!(profile.load_more.sources().len(), DEFAULT_LOAD_MORE.len());
    }

    #[test]
    fn invalid_custom_selector_is_rejected() {
        let spec = ProfileSpec {
            card_selectors: vec!["div[".to_string()],
            ..ProfileSpec::default()
        };
        let err = SiteProfile::from_spec(&spec).unwrap_err();
        assert!(matches!(err, EngineError::InvalidSelector { selector, .. } if selector == "div["));
    }

    #[test]
    fn custom_list_replaces_only_its_own_defaults() {
        let spec = ProfileSpec {
            card_selectors: vec![".tile".to_string()],
            ..ProfileSpec::default()
        };
        let profile = SiteProfile::from_spec(&spec).unwrap();
        assert_eq!(profile.cards.sources(), vec![".tile"]);
        assert_eq!(profile.load_more.sources().len(), DEFAULT_LOAD_MORE.len());
    }

    #[test]
    fn first_count_uses_first_selector_with_hits() {
        let set = SelectorSet::compile(&[".missing", ".card", "li"]).unwrap();
        let doc = Html::parse_document(
            "<ul><li class='card'>a</li><li class='card'>b</li><li>c</li></ul>",
        );
        assert_eq!(set.first_count(&doc), 2);
    }

    #[test]
    fn first_matching_skips_disabled_controls() {
        let set = SelectorSet::compile(&["button.more", "a.more"]).unwrap();
        let doc = Html::parse_document(
            "<button class='more' disabled>More</button><a class='more' href='#'>More</a>",
        );
        assert_eq!(set.first_matching(&doc, |e| !is_disabled(e)), Some("a.more"));
    }
}
