//! Person-name canonicalisation used to match records across sources that
//! disagree on name ordering.
//!
//! Punctuation inside name tokens (hyphens, apostrophes) is kept as-is, so
//! `"O'Neil-Smith, Ann"` and `"Ann ONeil Smith"` are different identities.

use crate::model::IdentityKey;

/// Generational suffixes recognised at the end of a name written without a
/// comma.
const SUFFIXES: &[&str] = &["jr", "jr.", "sr", "sr.", "ii", "iii", "iv"];

/// Produces the matching key for a person name.
///
/// The name is lowercased and trimmed. A name containing a comma is read as
/// `"Last, First"`, with any further comma-separated parts taken as suffixes,
/// and reordered to `"first last suffix"`. Anything else is passed through
/// unchanged, so `"Smith, John, Jr."` and `"John Smith Jr."` share a key.
pub fn normalize_identity(name: &str) -> IdentityKey {
    let lowered = name.trim().to_lowercase();
    if !lowered.contains(',') {
        return lowered;
    }
    let parts = CommaName::parse(&lowered);
    [parts.first, parts.last]
        .into_iter()
        .chain(parts.suffixes)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Formats a person name as `"Last, First"` regardless of input order.
///
/// Names without a comma take their final whitespace-separated token as the
/// last name, after setting aside trailing generational suffixes, which are
/// appended as `", Jr."`. When either side of a comma is blank the other side
/// is returned alone. Single-token names are returned trimmed.
pub fn format_display(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.contains(',') {
        let parts = CommaName::parse(trimmed);
        let head = match (parts.last.is_empty(), parts.first.is_empty()) {
            (false, false) => format!("{}, {}", parts.last, parts.first),
            (false, true) => parts.last.to_string(),
            (true, _) => parts.first.to_string(),
        };
        return with_suffixes(head, &parts.suffixes);
    }

    let mut tokens: Vec<&str> = trimmed.split_whitespace().collect();
    let mut suffixes = Vec::new();
    while tokens.len() > 2
        && tokens
            .last()
            .is_some_and(|token| SUFFIXES.contains(&token.to_lowercase().as_str()))
    {
        suffixes.extend(tokens.pop());
    }
    suffixes.reverse();

    match tokens.split_last() {
        Some((last, rest)) if !rest.is_empty() => {
            with_suffixes(format!("{last}, {}", rest.join(" ")), &suffixes)
        }
        _ => trimmed.to_string(),
    }
}

fn with_suffixes(head: String, suffixes: &[&str]) -> String {
    suffixes.iter().fold(head, |name, suffix| {
        if name.is_empty() {
            (*suffix).to_string()
        } else {
            format!("{name}, {suffix}")
        }
    })
}

/// A name split on its commas: `last, first[, suffix...]`.
struct CommaName<'a> {
    last: &'a str,
    first: &'a str,
    suffixes: Vec<&'a str>,
}

impl<'a> CommaName<'a> {
    fn parse(name: &'a str) -> Self {
        let mut parts = name.split(',').map(str::trim);
        let last = parts.next().unwrap_or_default();
        let first = parts.next().unwrap_or_default();
        let suffixes = parts.filter(|part| !part.is_empty()).collect();
        Self {
            last,
            first,
            suffixes,
        }
    }
}
