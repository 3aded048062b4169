use serde::{Deserialize, Serialize};

const DNC_PREFIX: &str = "dnc";

/// Contact-restriction scope carried by a DNC tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DncScope {
    #[default]
    None,
    PhoneOnly,
    OtherPhoneOnly,
    EmailOnly,
    AllChannels,
}

impl DncScope {
    /// Label written into the roster's DNC column. Empty for [`DncScope::None`].
    pub fn label(&self) -> &'static str {
        match self {
            DncScope::None => "",
            DncScope::PhoneOnly => "DNC - Phone",
            DncScope::OtherPhoneOnly => "DNC - Other Phone",
            DncScope::EmailOnly => "DNC - Email",
            DncScope::AllChannels => "DNC",
        }
    }

    pub fn is_restricted(&self) -> bool {
        !matches!(self, DncScope::None)
    }
}

/// Scope applied from an annotation plus the number of DNC-like tokens it
/// contained. More than one token means the first-match policy was used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DncClassification {
    pub scope: DncScope,
    pub tokens: usize,
}

impl DncClassification {
    pub fn is_ambiguous(&self) -> bool {
        self.tokens > 1
    }
}

/// Classifies one comma-separated tag string.
///
/// ```
/// use roster_tools::tags::{classify_dnc, DncScope};
///
/// assert_eq!(classify_dnc("DNC - Phone, Outreach"), DncScope::PhoneOnly);
/// assert_eq!(classify_dnc("dnc"), DncScope::AllChannels);
/// ```
pub fn classify_dnc(tag_text: &str) -> DncScope {
    inspect_dnc(tag_text).scope
}

/// Like [`classify_dnc`] but also reports how many DNC tokens were present.
pub fn inspect_dnc(tag_text: &str) -> DncClassification {
    let tokens: Vec<String> = tag_text
        .split(',')
        .map(|token| token.trim().to_lowercase())
        .filter(|token| token.starts_with(DNC_PREFIX))
        .collect();

    DncClassification {
        scope: tokens
            .first()
            .map(|token| scope_for_token(token))
            .unwrap_or_default(),
        tokens: tokens.len(),
    }
}

/// Applies the first DNC tag found in a history ordered most recent first.
pub fn classify_dnc_history<'a, I>(entries: I) -> DncClassification
where
    I: IntoIterator<Item = &'a str>,
{
    entries
        .into_iter()
        .map(inspect_dnc)
        .find(|classification| classification.scope.is_restricted())
        .unwrap_or_default()
}

fn scope_for_token(token: &str) -> DncScope {
    let qualifier = token[DNC_PREFIX.len()..]
        .trim_start_matches(|ch: char| ch.is_whitespace() || matches!(ch, '-' | ':' | '(' | '–' | '—'))
        .trim_end_matches(')')
        .trim();

    if qualifier.is_empty() {
        DncScope::AllChannels
    } else if qualifier.contains("other phone") {
        DncScope::OtherPhoneOnly
    } else if qualifier.contains("phone") {
        DncScope::PhoneOnly
    } else if qualifier.contains("email") || qualifier.contains("e-mail") {
        DncScope::EmailOnly
    } else {
        DncScope::AllChannels
    }
}
