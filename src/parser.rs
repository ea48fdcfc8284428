// Transaction message grammar.
//
// Recognizes messages of the shape `<sign><qty><name>(<price>)<amount>`,
// e.g. `+10个苹果（18）180`. The sign is the first character (`+` income,
// `-` expense) and the quantity must follow it immediately. Brackets may be
// ASCII or full-width parentheses in any combination.

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

use crate::entry::{EntryDraft, EntryKind};

/// Grammar mismatch. Deliberately carries no parsed data: the caller only
/// needs to know the message is not a well-formed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("message does not match the transaction grammar")]
pub struct ParseError;

/// Body grammar, applied after the sign has been stripped:
/// quantity, non-greedy product name, bracketed unit price, total amount.
/// Numbers are non-negative ASCII decimals; the name capture is whatever
/// lies between the quantity and the first opening bracket that makes the
/// rest of the message match.
fn body_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([0-9]+(?:\.[0-9]+)?)(.+?)[(（]([0-9]+(?:\.[0-9]+)?)[)）]([0-9]+(?:\.[0-9]+)?)$")
            .expect("transaction grammar regex is valid")
    })
}

/// Parse one transaction message into an [`EntryDraft`].
///
/// Leading/trailing whitespace around the whole message is ignored, but no
/// whitespace is allowed between the sign and the quantity. The product name
/// is trimmed and may end up empty (a whitespace-only name still matches).
pub fn parse_entry(text: &str) -> Result<EntryDraft, ParseError> {
    let text = text.trim();
    let mut chars = text.chars();
    let kind = chars.next().and_then(EntryKind::from_sign).ok_or(ParseError)?;
    let body = chars.as_str();

    let caps = body_regex().captures(body).ok_or(ParseError)?;

    // The regex only admits ASCII decimal literals, so parsing cannot fail.
    let quantity: f64 = caps[1].parse().map_err(|_| ParseError)?;
    let product_name = caps[2].trim().to_string();
    let unit_price: f64 = caps[3].parse().map_err(|_| ParseError)?;
    let amount: f64 = caps[4].parse().map_err(|_| ParseError)?;

    Ok(EntryDraft {
        kind,
        quantity,
        product_name,
        unit_price,
        amount,
    })
}
