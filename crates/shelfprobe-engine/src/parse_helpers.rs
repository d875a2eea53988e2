//! Internal scanning primitives for localized numbers.
//!
//! Shared by price and quantity normalization. Nothing here knows about
//! currencies or units; callers hand in a token and get a [`Decimal`] back.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::ParseError;

/// Characters that may appear inside a number token between digits.
fn is_separator(c: char) -> bool {
    matches!(c, '.' | ',' | '\'')
}

/// Replaces typographic spaces with ASCII spaces and closes gaps that markup
/// sometimes leaves after a separator (`"9. 49"` becomes `"9.49"`).
pub(crate) fn clean_text(input: &str) -> String {
    let spaced: String = input
        .chars()
        .map(|c| match c {
            '\u{a0}' | '\u{202f}' | '\u{2009}' => ' ',
            other => other,
        })
        .collect();

    let chars: Vec<char> = spaced.chars().collect();
    let mut out = String::with_capacity(spaced.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        out.push(c);
        if matches!(c, '.' | ',') && i > 0 && chars[i - 1].is_ascii_digit() {
            let mut j = i + 1;
            while j < chars.len() && chars[j] == ' ' {
                j += 1;
            }
            if j > i + 1 && j < chars.len() && chars[j].is_ascii_digit() {
                i = j;
                continue;
            }
        }
        i += 1;
    }
    out.trim().to_string()
}

/// Locates the first number token: a run of digits and in-number separators
/// beginning with a digit. Trailing separators (`"12,-"`) are not part of it.
///
/// Returns the byte range of the token.
pub(crate) fn find_number_token(text: &str) -> Option<(usize, usize)> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let mut end = start;
    for (offset, c) in text[start..].char_indices() {
        if c.is_ascii_digit() || is_separator(c) {
            end = start + offset + c.len_utf8();
        } else {
            break;
        }
    }
    let token = text[start..end].trim_end_matches(is_separator);
    Some((start, start + token.len()))
}

/// Interprets a number token written with any common locale convention.
///
/// Rules, in order:
/// - an apostrophe is always a thousands separator (`1'234.50`);
/// - if both `.` and `,` repeat, the token is ambiguous and rejected;
/// - a separator that repeats is the thousands separator; the other one, if
///   present once, is the decimal separator;
/// - otherwise the rightmost separator is decimal when followed by one or two
///   digits, or when the integer part before it is `0` (`0,125`);
/// - a lone separator followed by exactly three digits groups thousands;
/// - thousands groups after the first must have exactly three digits.
pub(crate) fn parse_localized_decimal(token: &str) -> Result<Decimal, ParseError> {
    let malformed = |reason: &str| ParseError::MalformedNumber {
        input: token.to_string(),
        reason: reason.to_string(),
    };

    if token.is_empty() || !token.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(ParseError::NoAmount {
            input: token.to_string(),
        });
    }
    if token.contains("''") || token.contains(",,") || token.contains("..") {
        return Err(malformed("consecutive separators"));
    }

    let token_no_apostrophe: String = token.chars().filter(|c| *c != '\'').collect();
    let dots = token_no_apostrophe.matches('.').count();
    let commas = token_no_apostrophe.matches(',').count();

    let (thousands, decimal) = match (dots, commas) {
        (d, c) if d > 1 && c > 1 => {
            return Err(malformed("both separators repeat"));
        }
        (d, c) if d > 1 => ('.', (c == 1).then_some(',')),
        (d, c) if c > 1 => (',', (d == 1).then_some('.')),
        (0, 0) => ('\0', None),
        _ => {
            // Neither repeats: decide on the rightmost separator.
            let (pos, sep) = token_no_apostrophe
                .char_indices()
                .rev()
                .find(|(_, c)| matches!(c, '.' | ','))
                .ok_or_else(|| malformed("separator vanished"))?;
            let other = if sep == '.' { ',' } else { '.' };
            let fraction_len = token_no_apostrophe.len() - pos - 1;
            let integer_part = &token_no_apostrophe[..pos];
            let leading_zero = integer_part == "0";
            if (1..=2).contains(&fraction_len) || leading_zero {
                (other, Some(sep))
            } else if fraction_len == 3 {
                if token_no_apostrophe.contains(other) {
                    return Err(malformed("mixed thousands separators"));
                }
                (sep, None)
            } else {
                return Err(malformed("separator followed by too many digits"));
            }
        }
    };

    let (integer_raw, fraction_raw) = match decimal {
        Some(dec) => {
            let pos = token_no_apostrophe
                .rfind(dec)
                .ok_or_else(|| malformed("decimal separator vanished"))?;
            (&token_no_apostrophe[..pos], &token_no_apostrophe[pos + 1..])
        }
        None => (token_no_apostrophe.as_str(), ""),
    };

    if fraction_raw.contains(|c: char| !c.is_ascii_digit()) {
        return Err(malformed("thousands separator after decimal separator"));
    }

    let integer_digits = if thousands == '\0' || !integer_raw.contains(thousands) {
        integer_raw.to_string()
    } else {
        let mut groups = integer_raw.split(thousands);
        let first = groups.next().unwrap_or_default();
        if first.is_empty() || first.len() > 3 || !first.chars().all(|c| c.is_ascii_digit()) {
            return Err(malformed("bad leading digit group"));
        }
        let mut digits = first.to_string();
        for group in groups {
            if group.len() != 3 || !group.chars().all(|c| c.is_ascii_digit()) {
                return Err(malformed("thousands group is not three digits"));
            }
            digits.push_str(group);
        }
        digits
    };

    if !integer_digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(malformed("unexpected character"));
    }

    let canonical = if fraction_raw.is_empty() {
        integer_digits
    } else {
        format!("{integer_digits}.{fraction_raw}")
    };
    Decimal::from_str(&canonical).map_err(|e| malformed(&e.to_string()))
}
