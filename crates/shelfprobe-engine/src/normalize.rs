//! Price, quantity and identity normalization.
//!
//! Every function here is pure: the same text always yields the same value or
//! the same [`ParseError`]. Nothing is coerced to zero or defaulted silently.

use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};
use shelfprobe_core::CanonicalUnit;

use crate::error::ParseError;
use crate::parse_helpers::{clean_text, find_number_token, parse_localized_decimal};

/// A monetary amount at scale 2 with its ISO 4217 currency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Price {
    pub amount: Decimal,
    pub currency: String,
}

/// A pack size expressed in the base unit of its family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quantity {
    pub value: Decimal,
    pub unit: CanonicalUnit,
}

/// Unit synonyms, longest spelling first so alternation never stops at a
/// prefix (`l` must not win over `liter`).
const UNIT_PATTERN: &str = r"fl\.?\s?oz|millilit(?:er|re)s?|centilit(?:er|re)s?|decilit(?:er|re)s?|lit(?:er|re)s?|ltr|ml|cl|dl|lbs?|l|kilograms?|kilos?|kg|milligrams?|mg|grams?|gramm|gr|g|oz|pieces?|pcs|pc|packs?|stuks?|stk|st|count|ct";

static MULTIPACK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(\d{{1,3}})\s*[x×]\s*(\d+(?:[.,]\d+)*)\s*({UNIT_PATTERN})\b"
    ))
    .expect("valid regex")
});

static SINGLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)(\d+(?:[.,]\d+)*)\s*({UNIT_PATTERN})\b")).expect("valid regex")
});

static CURRENCY_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(EUR|USD|GBP|CHF|JPY|SEK|NOK|DKK|PLN|CZK|HUF|RON|BGN|CAD|AUD|NZD|SGD|HKD|MXN|BRL)\b",
    )
    .expect("valid regex")
});

/// Dollar-denominated currencies a bare `$` may stand for when the site
/// locale says so.
const DOLLAR_CURRENCIES: &[&str] = &["USD", "CAD", "AUD", "NZD", "SGD", "HKD", "MXN"];

/// Currencies written as `kr`.
const KRONA_CURRENCIES: &[&str] = &["SEK", "NOK", "DKK"];

/// Parses a displayed price into an amount and currency.
///
/// Currency comes from a symbol or ISO code in `text` when one is present,
/// otherwise from `currency_hint`. The amount is rounded half away from zero
/// to two decimal places.
///
/// # Errors
///
/// - [`ParseError::NoAmount`] when `text` carries no digits (`"free"`).
/// - [`ParseError::MalformedNumber`] when separators cannot be resolved.
/// - [`ParseError::NegativeAmount`] for a leading minus sign.
/// - [`ParseError::MissingCurrency`] when neither text nor hint names one.
pub fn normalize_price(text: &str, currency_hint: Option<&str>) -> Result<Price, ParseError> {
    let cleaned = clean_text(text);
    let (start, end) = find_number_token(&cleaned).ok_or_else(|| ParseError::NoAmount {
        input: text.to_string(),
    })?;

    let before = cleaned[..start]
        .trim_end_matches(|c: char| c.is_whitespace() || matches!(c, '€' | '£' | '$' | '¥'));
    if before.ends_with(['-', '\u{2212}']) {
        return Err(ParseError::NegativeAmount {
            input: text.to_string(),
        });
    }

    let raw = parse_localized_decimal(&cleaned[start..end])?;
    let mut amount = raw.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    amount.rescale(2);

    let hint = currency_hint
        .map(|h| h.trim().to_ascii_uppercase())
        .filter(|h| h.len() == 3 && h.chars().all(|c| c.is_ascii_alphabetic()));

    let currency = currency_in_text(&cleaned, hint.as_deref())
        .or(hint)
        .ok_or_else(|| ParseError::MissingCurrency {
            input: text.to_string(),
        })?;

    Ok(Price { amount, currency })
}

/// Finds the currency named by the earliest symbol or code in `text`.
fn currency_in_text(text: &str, hint: Option<&str>) -> Option<String> {
    let mut found: Option<(usize, String)> = None;
    let mut consider = |pos: usize, code: Option<String>| {
        if let Some(code) = code {
            if found.as_ref().map_or(true, |(best, _)| pos < *best) {
                found = Some((pos, code));
            }
        }
    };

    if let Some(m) = CURRENCY_CODE_RE.find(text) {
        consider(m.start(), Some(m.as_str().to_ascii_uppercase()));
    }

    let lower = text.to_lowercase();
    for (pos, c) in text.char_indices() {
        let code = match c {
            '€' => Some("EUR".to_string()),
            '£' => Some("GBP".to_string()),
            '¥' => Some("JPY".to_string()),
            '$' => Some(dollar_currency(&text[..pos], hint)),
            _ => None,
        };
        if code.is_some() {
            consider(pos, code);
            break;
        }
    }

    for (needle, code) in [("zł", "PLN"), ("kč", "CZK"), ("fr.", "CHF")] {
        if let Some(pos) = find_word(&lower, needle) {
            consider(pos, Some(code.to_string()));
        }
    }
    if let Some(pos) = find_word(&lower, "kr") {
        let code = hint.filter(|h| KRONA_CURRENCIES.contains(h)).map(str::to_string);
        consider(pos, code);
    }

    found.map(|(_, code)| code)
}

/// Resolves `$` by the letters glued to it (`C$`, `A$`, `US$`) or the
/// locale hint.
fn dollar_currency(before: &str, hint: Option<&str>) -> String {
    let prefix: String = before
        .chars()
        .rev()
        .take_while(char::is_ascii_alphabetic)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<String>()
        .to_ascii_uppercase();
    let code = match prefix.as_str() {
        "US" => "USD",
        "C" | "CA" => "CAD",
        "A" | "AU" => "AUD",
        "NZ" => "NZD",
        _ => match hint {
            Some(h) if DOLLAR_CURRENCIES.contains(&h) => h,
            _ => "USD",
        },
    };
    code.to_string()
}

/// Byte position of `needle` in `haystack` where it is not glued to letters.
fn find_word(haystack: &str, needle: &str) -> Option<usize> {
    haystack.match_indices(needle).find_map(|(pos, _)| {
        let before_ok = !haystack[..pos]
            .chars()
            .last()
            .is_some_and(char::is_alphabetic);
        let after_ok = !haystack[pos + needle.len()..]
            .chars()
            .next()
            .is_some_and(char::is_alphabetic);
        (before_ok && after_ok).then_some(pos)
    })
}

/// Parses a pack size (`"750 ml"`, `"0,75 L"`, `"6 x 330 ml"`, `"16 fl oz"`)
/// into the base unit of its family. Multipacks multiply out.
///
/// # Errors
///
/// - [`ParseError::UnknownUnit`] when no recognised unit follows a number.
/// - [`ParseError::MalformedNumber`] when the number cannot be read or the
///   converted size does not fit a `Decimal`.
/// - [`ParseError::ZeroQuantity`] when the result is zero.
pub fn normalize_quantity(text: &str) -> Result<Quantity, ParseError> {
    let cleaned = clean_text(text);

    let (count, number, unit_token) = if let Some(caps) = MULTIPACK_RE.captures(&cleaned) {
        let count = parse_localized_decimal(&caps[1])?;
        (count, caps[2].to_string(), caps[3].to_string())
    } else if let Some(caps) = SINGLE_RE.captures(&cleaned) {
        (Decimal::ONE, caps[1].to_string(), caps[2].to_string())
    } else {
        return Err(ParseError::UnknownUnit {
            input: text.to_string(),
        });
    };

    let (unit, factor) = unit_factor(&unit_token).ok_or_else(|| ParseError::UnknownUnit {
        input: text.to_string(),
    })?;
    let magnitude = parse_localized_decimal(&number)?;
    let value = magnitude
        .checked_mul(factor)
        .and_then(|v| v.checked_mul(count))
        .ok_or_else(|| ParseError::MalformedNumber {
            input: text.to_string(),
            reason: "quantity out of range".to_string(),
        })?
        .normalize();

    if value.is_zero() {
        return Err(ParseError::ZeroQuantity {
            input: text.to_string(),
        });
    }

    Ok(Quantity { value, unit })
}

/// Maps a unit spelling to its canonical unit and conversion factor.
fn unit_factor(token: &str) -> Option<(CanonicalUnit, Decimal)> {
    let lower = token.to_lowercase();
    let compact: String = lower.chars().filter(|c| !matches!(c, ' ' | '.')).collect();
    let unit = match compact.as_str() {
        "ml" | "milliliter" | "millilitre" | "milliliters" | "millilitres" => {
            (CanonicalUnit::Millilitre, Decimal::ONE)
        }
        "cl" | "centiliter" | "centilitre" | "centiliters" | "centilitres" => {
            (CanonicalUnit::Millilitre, Decimal::TEN)
        }
        "dl" | "deciliter" | "decilitre" | "deciliters" | "decilitres" => {
            (CanonicalUnit::Millilitre, Decimal::ONE_HUNDRED)
        }
        "l" | "ltr" | "liter" | "litre" | "liters" | "litres" => {
            (CanonicalUnit::Millilitre, Decimal::ONE_THOUSAND)
        }
        "floz" => (CanonicalUnit::Millilitre, Decimal::new(295_735, 4)),
        "mg" | "milligram" | "milligrams" => (CanonicalUnit::Gram, Decimal::new(1, 3)),
        "g" | "gr" | "gram" | "grams" | "gramm" => (CanonicalUnit::Gram, Decimal::ONE),
        "kg" | "kilo" | "kilos" | "kilogram" | "kilograms" => {
            (CanonicalUnit::Gram, Decimal::ONE_THOUSAND)
        }
        "oz" => (CanonicalUnit::Gram, Decimal::new(283_495, 4)),
        "lb" | "lbs" => (CanonicalUnit::Gram, Decimal::new(453_592, 3)),
        "pc" | "pcs" | "piece" | "pieces" | "pack" | "packs" | "st" | "stk" | "stuk" | "stuks"
        | "count" | "ct" => (CanonicalUnit::Piece, Decimal::ONE),
        _ => return None,
    };
    Some(unit)
}

/// Returns the substring of `text` that reads as a pack size, if any.
///
/// Used to recover a quantity from product names such as
/// `"Olive Oil Extra Virgin 750ml"` when markup has no size field.
#[must_use]
pub fn quantity_hint(text: &str) -> Option<String> {
    MULTIPACK_RE
        .find(text)
        .or_else(|| SINGLE_RE.find(text))
        .map(|m| m.as_str().trim().to_string())
}

/// Price per reference quantity of the unit's family (per litre, per
/// kilogram, per piece), rounded to two decimals.
#[must_use]
pub fn unit_price(price: &Price, quantity: &Quantity) -> Option<Decimal> {
    if quantity.value.is_zero() {
        return None;
    }
    let per = price
        .amount
        .checked_mul(quantity.unit.reference_quantity())?
        .checked_div(quantity.value)?;
    let mut rounded = per.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    Some(rounded)
}

/// Deduplication key for a product name: lowercase alphanumeric tokens joined
/// by single spaces. Punctuation and repeated whitespace are dropped.
#[must_use]
pub fn name_key(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reduces a schema.org availability IRI (`https://schema.org/InStock`) to its
/// final segment. Free text passes through trimmed.
#[must_use]
pub fn normalize_availability(text: &str) -> Option<String> {
    let trimmed = text.trim().trim_end_matches('/');
    let segment = trimmed.rsplit('/').next().unwrap_or(trimmed).trim();
    (!segment.is_empty()).then(|| segment.to_string())
}

/// Default currency of a retailer's country, used as the last-resort hint.
#[must_use]
pub fn currency_for_country(country: &str) -> Option<&'static str> {
    let code = match country.trim().to_ascii_uppercase().as_str() {
        "NL" | "BE" | "FR" | "DE" | "AT" | "IE" | "IT" | "ES" | "PT" | "FI" | "LU" | "GR"
        | "SK" | "SI" | "EE" | "LV" | "LT" | "HR" | "MT" | "CY" => "EUR",
        "GB" | "UK" => "GBP",
        "US" => "USD",
        "CA" => "CAD",
        "AU" => "AUD",
        "NZ" => "NZD",
        "CH" | "LI" => "CHF",
        "SE" => "SEK",
        "NO" => "NOK",
        "DK" => "DKK",
        "PL" => "PLN",
        "CZ" => "CZK",
        "HU" => "HUF",
        "RO" => "RON",
        "BG" => "BGN",
        "JP" => "JPY",
        _ => return None,
    };
    Some(code)
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
