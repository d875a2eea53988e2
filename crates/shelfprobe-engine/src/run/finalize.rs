//! Turning collected candidates into deduplicated records.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use shelfprobe_core::{NormalizedRecord, Provenance, RawProductCandidate};

use crate::error::ParseError;
use crate::normalize::{
    name_key, normalize_availability, normalize_price, normalize_quantity, unit_price,
};

/// Run-level facts every record is stamped with.
#[derive(Debug, Clone, Copy)]
pub struct FinalizeContext<'a> {
    pub run_id: &'a str,
    pub retailer_code: &'a str,
    /// Currency of the retailer's country, used when neither the price text
    /// nor the markup names one.
    pub fallback_currency: Option<&'a str>,
    /// Capture time of each step's snapshot.
    pub observed_at: &'a BTreeMap<u32, DateTime<Utc>>,
}

/// A candidate that did not survive normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedCandidate {
    pub step_index: u32,
    pub document_index: usize,
    pub error: ParseError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Finalized {
    pub records: Vec<NormalizedRecord>,
    pub dropped: Vec<DroppedCandidate>,
}

/// Normalizes one candidate. Quantity problems only clear the quantity
/// fields; a missing name or an unreadable price rejects the candidate.
///
/// # Errors
///
/// Returns the [`ParseError`] that rejected the candidate.
pub fn normalize_candidate(
    candidate: &RawProductCandidate,
    ctx: &FinalizeContext<'_>,
) -> Result<NormalizedRecord, ParseError> {
    let name = candidate
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or(ParseError::MissingField { field: "name" })?;
    let key = name_key(name);
    if key.is_empty() {
        return Err(ParseError::MissingField { field: "name" });
    }

    let price_text = candidate
        .price_text
        .as_deref()
        .ok_or(ParseError::MissingField { field: "price" })?;
    let hint = candidate.currency_hint.as_deref().or(ctx.fallback_currency);
    let price = normalize_price(price_text, hint)?;

    let quantity = candidate
        .quantity_text
        .as_deref()
        .and_then(|text| match normalize_quantity(text) {
            Ok(q) => Some(q),
            Err(e) => {
                tracing::debug!(
                    step = candidate.extracted_at_step,
                    error = %e,
                    "quantity unreadable; keeping record without it"
                );
                None
            }
        });
    let unit_price_amount = quantity.as_ref().and_then(|q| unit_price(&price, q));

    let extracted_at = ctx
        .observed_at
        .get(&candidate.extracted_at_step)
        .copied()
        .unwrap_or_else(Utc::now);

    Ok(NormalizedRecord {
        name: name.to_string(),
        name_key: key,
        price_amount: price.amount,
        price_currency: price.currency,
        quantity_value: quantity.as_ref().map(|q| q.value),
        quantity_unit: quantity.as_ref().map(|q| q.unit),
        unit_price_amount,
        availability: candidate
            .availability_text
            .as_deref()
            .and_then(normalize_availability),
        url: candidate.url.clone(),
        sku: candidate.sku.clone(),
        gtin: candidate.gtin.clone(),
        provenance: Provenance {
            run_id: ctx.run_id.to_string(),
            retailer_code: ctx.retailer_code.to_string(),
            step_index: candidate.extracted_at_step,
            source_kind: candidate.source,
            extracted_at,
        },
    })
}

/// Normalizes every candidate and merges sightings of the same product.
///
/// Two records are the same product when their name keys match. The richer
/// record wins; at equal richness a later step replaces an earlier one, and
/// within one step the first in document order is kept. Output order is the
/// order in which each product was first seen.
#[must_use]
pub fn finalize(candidates: &[RawProductCandidate], ctx: &FinalizeContext<'_>) -> Finalized {
    let mut ordered: Vec<&RawProductCandidate> = candidates.iter().collect();
    ordered.sort_by_key(|c| (c.extracted_at_step, c.document_index));

    let mut slots: Vec<NormalizedRecord> = Vec::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();
    let mut dropped = Vec::new();

    for candidate in ordered {
        let record = match normalize_candidate(candidate, ctx) {
            Ok(record) => record,
            Err(error) => {
                dropped.push(DroppedCandidate {
                    step_index: candidate.extracted_at_step,
                    document_index: candidate.document_index,
                    error,
                });
                continue;
            }
        };

        match by_key.get(&record.name_key) {
            Some(&slot) => {
                let existing = &slots[slot];
                if supersedes(&record, existing) {
                    slots[slot] = record;
                }
            }
            None => {
                by_key.insert(record.name_key.clone(), slots.len());
                slots.push(record);
            }
        }
    }

    Finalized {
        records: slots,
        dropped,
    }
}

fn supersedes(incoming: &NormalizedRecord, existing: &NormalizedRecord) -> bool {
    let (new_score, old_score) = (incoming.completeness(), existing.completeness());
    new_score > old_score
        || (new_score == old_score
            && incoming.provenance.step_index > existing.provenance.step_index)
}
