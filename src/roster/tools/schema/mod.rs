//! Canonical schema and header resolution.
//!
//! Exports from unrelated systems name the same column differently
//! ("Current Score", "Grade", "Final Score"). A [`RosterSchema`] declares the
//! canonical fields once, each with an ordered alias list, and every column
//! lookup in the crate goes through [`RosterSchema::resolve`].

pub mod defaults;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{HeaderSide, Result, ToolError};
use crate::model::FieldName;
use crate::warning::ImportWarning;

/// How incoming values for a field are coerced before they are stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Stored as received.
    #[default]
    Text,
    /// Numeric strings become numbers.
    Number,
    /// Any accepted date representation becomes a native date/time.
    Date,
}

/// A hyperlink whose URL is assembled from other fields of the same record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSpec {
    /// URL with `{Field}` placeholders naming canonical fields.
    pub url_template: String,
    /// Display label. Defaults to the URL itself.
    #[serde(default)]
    pub label: Option<String>,
}

impl LinkSpec {
    /// Canonical fields referenced by the URL template, in order.
    pub fn join_keys(&self) -> Vec<FieldName> {
        placeholder_regex()
            .captures_iter(&self.url_template)
            .map(|captures| captures[1].to_string())
            .collect()
    }

    /// Renders the URL, or `None` when any join key has no value.
    pub fn render<F>(&self, mut lookup: F) -> Option<String>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut url = String::with_capacity(self.url_template.len());
        let mut last = 0;
        for captures in placeholder_regex().captures_iter(&self.url_template) {
            let whole = captures.get(0)?;
            let value = lookup(&captures[1]).filter(|value| !value.trim().is_empty())?;
            url.push_str(&self.url_template[last..whole.start()]);
            url.push_str(value.trim());
            last = whole.end();
        }
        url.push_str(&self.url_template[last..]);
        Some(url)
    }
}

/// Values computed from other fields rather than read from a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Derivation {
    /// Whole days elapsed since the date held in `from`, never negative.
    ElapsedDays { from: FieldName },
}

/// Declaration of one canonical field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: FieldName,
    /// Header spellings considered equivalent, in priority order.
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub kind: FieldKind,
    /// Marks the field used to correlate rows across a destructive refresh.
    #[serde(default)]
    pub identifier: bool,
    /// Previously stored values survive a refresh that does not supply one.
    #[serde(default, rename = "static")]
    pub static_value: bool,
    #[serde(default)]
    pub link: Option<LinkSpec>,
    #[serde(default)]
    pub derived: Option<Derivation>,
}

impl FieldSpec {
    pub fn new(name: impl Into<FieldName>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            kind: FieldKind::Text,
            identifier: false,
            static_value: false,
            link: None,
            derived: None,
        }
    }

    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn kind(mut self, kind: FieldKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn identifier(mut self) -> Self {
        self.identifier = true;
        self
    }

    pub fn static_value(mut self) -> Self {
        self.static_value = true;
        self
    }

    pub fn link(mut self, url_template: impl Into<String>, label: Option<&str>) -> Self {
        self.link = Some(LinkSpec {
            url_template: url_template.into(),
            label: label.map(str::to_string),
        });
        self
    }

    pub fn elapsed_days_since(mut self, from: impl Into<FieldName>) -> Self {
        self.derived = Some(Derivation::ElapsedDays { from: from.into() });
        self
    }

    /// The canonical name followed by the declared aliases.
    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

/// Field Alias Table plus the per-field flags supplied by configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterSchema {
    /// Field holding the person name the identity key is derived from.
    pub identity_field: FieldName,
    pub fields: Vec<FieldSpec>,
}

impl Default for RosterSchema {
    fn default() -> Self {
        defaults::master_list_schema()
    }
}

impl RosterSchema {
    pub fn new(identity_field: impl Into<FieldName>, fields: Vec<FieldSpec>) -> Self {
        Self {
            identity_field: identity_field.into(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// The field flagged as identifier, if any.
    pub fn identifier_field(&self) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.identifier)
    }

    pub fn static_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|field| field.static_value)
    }

    /// Finds the column for `canonical` in `headers`.
    ///
    /// Candidates are tried in declared order (canonical name first) and the
    /// first one present in the header row wins. Returns `None` when the
    /// field is not declared or nothing matches.
    pub fn resolve(&self, headers: &[String], canonical: &str) -> Option<usize> {
        let field = self.field(canonical)?;
        resolve_candidates(headers, field.candidates())
    }

    /// Resolves `canonical` or fails with a configuration error naming it.
    pub fn require(&self, headers: &[String], canonical: &str, side: HeaderSide) -> Result<usize> {
        if self.field(canonical).is_none() {
            return Err(ToolError::UnknownField(canonical.to_string()));
        }
        self.resolve(headers, canonical)
            .ok_or_else(|| ToolError::MissingField {
                field: canonical.to_string(),
                side,
            })
    }

    /// Resolves every declared field against a header row.
    ///
    /// When two fields land on the same column the one declared first keeps
    /// it and the later one is left unmapped with a
    /// [`ImportWarning::SharedColumn`].
    pub fn map_columns(&self, headers: &[String], side: HeaderSide) -> ColumnMapping {
        let mut columns: BTreeMap<FieldName, usize> = BTreeMap::new();
        let mut owners: BTreeMap<usize, FieldName> = BTreeMap::new();
        let mut warnings = Vec::new();

        for field in &self.fields {
            let Some(index) = resolve_candidates(headers, field.candidates()) else {
                continue;
            };
            if let Some(owner) = owners.get(&index) {
                let header = headers.get(index).cloned().unwrap_or_default();
                warn!(%side, header = %header, kept = %owner, dropped = %field.name, "ambiguous column");
                warnings.push(ImportWarning::SharedColumn {
                    side,
                    column: index,
                    header,
                    kept: owner.clone(),
                    dropped: field.name.clone(),
                    rows_affected: 0,
                });
                continue;
            }
            owners.insert(index, field.name.clone());
            columns.insert(field.name.clone(), index);
        }

        ColumnMapping { columns, warnings }
    }

    /// Checks that every field referenced by flags, links and derivations is
    /// declared.
    pub fn validate(&self) -> Result<()> {
        if self.field(&self.identity_field).is_none() {
            return Err(ToolError::UnknownField(self.identity_field.clone()));
        }

        let identifiers = self.fields.iter().filter(|field| field.identifier).count();
        if identifiers > 1 {
            return Err(ToolError::InvalidConfig(format!(
                "{identifiers} fields are flagged as identifier; expected at most one"
            )));
        }

        let mut seen = BTreeSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(ToolError::InvalidConfig(format!(
                    "field '{}' is declared twice",
                    field.name
                )));
            }
        }

        for field in &self.fields {
            if let Some(link) = &field.link {
                for key in link.join_keys() {
                    if self.field(&key).is_none() {
                        return Err(ToolError::UnknownField(key));
                    }
                }
            }
            if let Some(Derivation::ElapsedDays { from }) = &field.derived {
                if self.field(from).is_none() {
                    return Err(ToolError::UnknownField(from.clone()));
                }
            }
        }

        Ok(())
    }
}

/// Result of resolving a whole schema against one header row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMapping {
    pub columns: BTreeMap<FieldName, usize>,
    pub warnings: Vec<ImportWarning>,
}

impl ColumnMapping {
    pub fn column(&self, field: &str) -> Option<usize> {
        self.columns.get(field).copied()
    }

    /// Records how many rows the surfaced ambiguities affect.
    pub fn with_rows_affected(mut self, rows: usize) -> Self {
        for warning in &mut self.warnings {
            if let ImportWarning::SharedColumn { rows_affected, .. } = warning {
                *rows_affected = rows;
            }
        }
        self
    }
}

/// Case- and whitespace-insensitive header comparison key.
pub fn header_key(header: &str) -> String {
    header
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn resolve_candidates<'a>(
    headers: &[String],
    candidates: impl Iterator<Item = &'a str>,
) -> Option<usize> {
    let keys: Vec<String> = headers.iter().map(|header| header_key(header)).collect();
    for candidate in candidates {
        let wanted = header_key(candidate);
        if wanted.is_empty() {
            continue;
        }
        if let Some(index) = keys.iter().position(|key| *key == wanted) {
            return Some(index);
        }
    }
    None
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER_RE.get_or_init(|| {
        Regex::new(r"\{([^{}]+)\}").expect("placeholder regex should compile")
    })
}
