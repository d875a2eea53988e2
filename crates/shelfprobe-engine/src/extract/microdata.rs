//! schema.org microdata product extraction.

use std::sync::LazyLock;

use scraper::{ElementRef, Selector};
use shelfprobe_core::SourceKind;

use super::{non_empty, ProductFields};
use crate::normalize::quantity_hint;

static ITEMPROP_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[itemprop]").expect("valid selector"));

fn itemtype_is(element: ElementRef<'_>, wanted: &str) -> bool {
    element.value().attr("itemtype").is_some_and(|types| {
        types.split_whitespace().any(|t| {
            let local = t.trim_end_matches('/').rsplit('/').next().unwrap_or(t);
            local.eq_ignore_ascii_case(wanted)
        })
    })
}

/// Nearest ancestor that opens an item scope.
fn owner_scope(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().attr("itemscope").is_some())
}

/// A product scope nested in another product (a variant) is read as part of
/// its parent, not on its own.
pub(super) fn is_top_level_product(element: ElementRef<'_>) -> bool {
    itemtype_is(element, "Product")
        && !element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|a| a.value().attr("itemscope").is_some() && itemtype_is(a, "Product"))
}

/// Collects the first value of each property owned by the product scope or
/// by an offer scope directly inside it.
pub(super) fn product_fields(scope: ElementRef<'_>) -> ProductFields {
    let mut props: Vec<(String, String)> = Vec::new();

    for element in scope.select(&ITEMPROP_SEL) {
        let Some(owner) = owner_scope(element) else {
            continue;
        };
        let owned = owner.id() == scope.id()
            || ((itemtype_is(owner, "Offer") || itemtype_is(owner, "AggregateOffer"))
                && owner_scope(owner).is_some_and(|o| o.id() == scope.id()));
        if !owned {
            continue;
        }
        // An element opening its own scope is a container, not a value.
        if element.value().attr("itemscope").is_some() {
            continue;
        }
        let Some(value) = prop_value(element) else {
            continue;
        };
        let names = element.value().attr("itemprop").unwrap_or_default();
        for name in names.split_whitespace() {
            if !props.iter().any(|(n, _)| n == name) {
                props.push((name.to_string(), value.clone()));
            }
        }
    }

    let get = |key: &str| {
        props
            .iter()
            .find(|(n, _)| n == key)
            .map(|(_, v)| v.clone())
    };

    let name = get("name");
    let quantity_text = get("size")
        .or_else(|| get("weight"))
        .or_else(|| name.as_deref().and_then(quantity_hint));

    ProductFields {
        price_text: get("price").or_else(|| get("lowPrice")),
        currency_hint: get("priceCurrency"),
        quantity_text,
        availability_text: get("availability"),
        url: get("url"),
        sku: get("sku").or_else(|| get("productID")),
        gtin: ["gtin13", "gtin14", "gtin12", "gtin8", "gtin"]
            .iter()
            .find_map(|key| get(*key)),
        name,
        source: SourceKind::Microdata,
    }
}

/// `content` wins over visible text; links and media carry their value in
/// `href` / `src`.
fn prop_value(element: ElementRef<'_>) -> Option<String> {
    let el = element.value();
    if let Some(content) = el.attr("content") {
        return non_empty(content);
    }
    match el.name() {
        "a" | "link" => el.attr("href").and_then(non_empty),
        "img" => el.attr("src").and_then(non_empty),
        "data" | "meter" => el.attr("value").and_then(non_empty),
        _ => non_empty(&element.text().collect::<String>()),
    }
}
