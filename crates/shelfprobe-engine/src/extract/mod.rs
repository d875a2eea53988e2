//! Structured-data extraction from page snapshots.
//!
//! Two markup flavours are read, in document order: schema.org JSON-LD
//! script blocks and schema.org microdata scopes. Extraction never
//! interprets prices or quantities; it only lifts their raw text.

mod jsonld;
mod microdata;

use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde_json::Value;
use shelfprobe_core::{PageSnapshot, RawProductCandidate, SourceKind};

static STRUCTURED_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"script[type="application/ld+json"], [itemscope][itemtype]"#)
        .expect("valid selector")
});

/// A markup block that could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupSkip {
    pub source: SourceKind,
    pub detail: String,
}

/// Result of extracting one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub candidates: Vec<RawProductCandidate>,
    pub skipped: Vec<MarkupSkip>,
}

/// Raw attributes of one product before it is stamped with its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProductFields {
    pub name: Option<String>,
    pub price_text: Option<String>,
    pub currency_hint: Option<String>,
    pub quantity_text: Option<String>,
    pub availability_text: Option<String>,
    pub url: Option<String>,
    pub sku: Option<String>,
    pub gtin: Option<String>,
    pub source: SourceKind,
}

impl ProductFields {
    fn is_blank(&self) -> bool {
        self.name.is_none()
            && self.price_text.is_none()
            && self.url.is_none()
            && self.sku.is_none()
            && self.gtin.is_none()
    }

    fn into_candidate(self, step: u32, document_index: usize) -> RawProductCandidate {
        RawProductCandidate {
            name: self.name,
            price_text: self.price_text,
            currency_hint: self.currency_hint,
            quantity_text: self.quantity_text,
            availability_text: self.availability_text,
            url: self.url,
            sku: self.sku,
            gtin: self.gtin,
            source: self.source,
            extracted_at_step: step,
            document_index,
        }
    }
}

/// Extracts every product candidate from a snapshot.
///
/// Candidates are ordered by their position in the document and stamped with
/// the snapshot's step index. Malformed blocks are skipped and reported in
/// [`Extraction::skipped`]; they never abort the remaining blocks.
#[must_use]
pub fn extract(snapshot: &PageSnapshot) -> Extraction {
    let document = Html::parse_document(&snapshot.html);
    extract_document(&document, snapshot.step_index)
}

/// Same as [`extract`] over an already parsed document.
pub(crate) fn extract_document(document: &Html, step: u32) -> Extraction {
    let mut extraction = Extraction::default();
    let mut fields = Vec::new();

    for element in document.select(&STRUCTURED_SEL) {
        if element.value().name() == "script" {
            let text: String = element.text().collect();
            match jsonld::products_from_block(&text) {
                Ok(products) => fields.extend(products),
                Err(detail) => {
                    tracing::debug!(step, error = %detail, "skipping malformed JSON-LD block");
                    extraction.skipped.push(MarkupSkip {
                        source: SourceKind::Jsonld,
                        detail,
                    });
                }
            }
            continue;
        }

        if !microdata::is_top_level_product(element) {
            continue;
        }
        let product = microdata::product_fields(element);
        if product.is_blank() {
            tracing::debug!(step, "skipping microdata product scope with no properties");
            extraction.skipped.push(MarkupSkip {
                source: SourceKind::Microdata,
                detail: "product scope carries no readable properties".to_string(),
            });
        } else {
            fields.push(product);
        }
    }

    extraction.candidates = fields
        .into_iter()
        .enumerate()
        .map(|(index, f)| f.into_candidate(step, index))
        .collect();
    extraction
}

/// Trims and rejects empty strings.
pub(crate) fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Reads a JSON string or number as text.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_empty(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
