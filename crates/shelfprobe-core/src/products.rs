use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Which embedded markup flavour produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Jsonld,
    Microdata,
}

impl SourceKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Jsonld => "jsonld",
            SourceKind::Microdata => "microdata",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A product as it appears in page markup, before any interpretation.
///
/// Every field the markup does not carry is `None`; an empty string in the
/// markup is also treated as absent so that "unknown" never masquerades as a
/// value downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawProductCandidate {
    pub name: Option<String>,
    pub price_text: Option<String>,
    /// Currency declared next to the price (`priceCurrency`), if any.
    pub currency_hint: Option<String>,
    pub quantity_text: Option<String>,
    pub availability_text: Option<String>,
    pub url: Option<String>,
    pub sku: Option<String>,
    pub gtin: Option<String>,
    pub source: SourceKind,
    pub extracted_at_step: u32,
    /// Zero-based position among all candidates of the same snapshot.
    pub document_index: usize,
}

/// The three quantity families prices are compared within.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitFamily {
    Volume,
    Mass,
    Count,
}

/// The single base unit of each [`UnitFamily`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CanonicalUnit {
    #[serde(rename = "ml")]
    Millilitre,
    #[serde(rename = "g")]
    Gram,
    #[serde(rename = "pcs")]
    Piece,
}

impl CanonicalUnit {
    #[must_use]
    pub fn token(self) -> &'static str {
        match self {
            CanonicalUnit::Millilitre => "ml",
            CanonicalUnit::Gram => "g",
            CanonicalUnit::Piece => "pcs",
        }
    }

    #[must_use]
    pub fn family(self) -> UnitFamily {
        match self {
            CanonicalUnit::Millilitre => UnitFamily::Volume,
            CanonicalUnit::Gram => UnitFamily::Mass,
            CanonicalUnit::Piece => UnitFamily::Count,
        }
    }

    /// Quantity that unit prices are quoted against: per litre, per
    /// kilogram, per piece.
    #[must_use]
    pub fn reference_quantity(self) -> Decimal {
        match self.family() {
            UnitFamily::Volume | UnitFamily::Mass => Decimal::from(1000),
            UnitFamily::Count => Decimal::ONE,
        }
    }
}

impl std::fmt::Display for CanonicalUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

impl std::str::FromStr for CanonicalUnit {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ml" => Ok(CanonicalUnit::Millilitre),
            "g" => Ok(CanonicalUnit::Gram),
            "pcs" => Ok(CanonicalUnit::Piece),
            other => Err(CoreError::UnknownUnit(other.to_string())),
        }
    }
}

/// Where a record came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub run_id: String,
    pub retailer_code: String,
    pub step_index: u32,
    pub source_kind: SourceKind,
    pub extracted_at: DateTime<Utc>,
}

/// The durable output unit of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub name: String,
    /// Deduplication identity derived from `name`.
    pub name_key: String,
    /// Amount in major units, always at scale 2.
    pub price_amount: Decimal,
    /// ISO 4217 code.
    pub price_currency: String,
    /// Quantity in the canonical base unit of its family.
    pub quantity_value: Option<Decimal>,
    pub quantity_unit: Option<CanonicalUnit>,
    /// Price per litre, kilogram or piece, depending on the unit family.
    pub unit_price_amount: Option<Decimal>,
    pub availability: Option<String>,
    pub url: Option<String>,
    pub sku: Option<String>,
    pub gtin: Option<String>,
    pub provenance: Provenance,
}

impl NormalizedRecord {
    /// Number of optional attributes that carry a value. Used to prefer the
    /// richer of two sightings of the same product.
    #[must_use]
    pub fn completeness(&self) -> usize {
        [
            self.quantity_value.is_some(),
            self.availability.is_some(),
            self.url.is_some(),
            self.sku.is_some(),
            self.gtin.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }
}
