//! Hyperlink cells hold two views of one value: the label the spreadsheet
//! displays and a `=HYPERLINK(url,label)` formula carrying the URL.

use std::sync::OnceLock;

use regex::Regex;

use crate::model::{Cell, CellValue};

/// URL and optional label recovered from a hyperlink cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hyperlink {
    pub url: String,
    pub label: Option<String>,
}

/// Parses `=HYPERLINK("url","label")`. The leading `=` is optional because
/// some readers strip it from formula text; `;` is accepted as argument
/// separator.
pub fn parse_hyperlink_formula(formula: &str) -> Option<Hyperlink> {
    let captures = hyperlink_regex().captures(formula.trim())?;
    let url = unescape(captures.name("url")?.as_str());
    let label = captures
        .name("label")
        .map(|label| unescape(label.as_str()));
    Some(Hyperlink { url, label })
}

/// Builds the formula text for a hyperlink cell.
pub fn build_hyperlink_formula(url: &str, label: &str) -> String {
    format!("=HYPERLINK(\"{}\",\"{}\")", escape(url), escape(label))
}

/// Builds a roster cell whose value is the label and whose formula carries
/// the URL.
pub fn link_cell(url: &str, label: &str) -> Cell {
    Cell::formula(CellValue::from(label), build_hyperlink_formula(url, label))
}

/// Extracts the URL a cell points to.
///
/// Checks the formula view first, then a value that itself holds formula
/// text (as exported by some sources), then a bare `http(s)` URL.
pub fn link_url(cell: &Cell) -> Option<String> {
    if let Some(link) = cell.formula.as_deref().and_then(parse_hyperlink_formula) {
        return Some(link.url);
    }
    let CellValue::Text(text) = &cell.value else {
        return None;
    };
    if let Some(link) = parse_hyperlink_formula(text) {
        return Some(link.url);
    }
    let trimmed = text.trim();
    let lowered = trimmed.to_ascii_lowercase();
    (lowered.starts_with("http://") || lowered.starts_with("https://")).then(|| trimmed.to_string())
}

fn escape(value: &str) -> String {
    value.replace('"', "\"\"")
}

fn unescape(value: &str) -> String {
    value.replace("\"\"", "\"")
}

fn hyperlink_regex() -> &'static Regex {
    static HYPERLINK_RE: OnceLock<Regex> = OnceLock::new();
    HYPERLINK_RE.get_or_init(|| {
        Regex::new(
            r#"(?i)^=?\s*HYPERLINK\(\s*"(?P<url>(?:[^"]|"")*)"\s*(?:[,;]\s*"(?P<label>(?:[^"]|"")*)"\s*)?\)$"#,
        )
        .expect("hyperlink regex should compile")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_formula_with_and_without_equals_sign() {
        let with = parse_hyperlink_formula(r#"=HYPERLINK("https://lms/c/1/g/2","Gradebook")"#)
            .expect("formula parsed");
        let without = parse_hyperlink_formula(r#"hyperlink("https://lms/c/1/g/2"; "Gradebook")"#)
            .expect("formula parsed");

        assert_eq!(with.url, "https://lms/c/1/g/2");
        assert_eq!(with.label.as_deref(), Some("Gradebook"));
        assert_eq!(with, without);
    }

    #[test]
    fn quotes_survive_build_and_parse() {
        let formula = build_hyperlink_formula("https://x/?q=\"a\"", "Say \"hi\"");
        let link = parse_hyperlink_formula(&formula).expect("formula parsed");

        assert_eq!(link.url, "https://x/?q=\"a\"");
        assert_eq!(link.label.as_deref(), Some("Say \"hi\""));
    }

    #[test]
    fn link_url_prefers_formula_view() {
        let cell = link_cell("https://lms/a", "Open");
        assert_eq!(link_url(&cell).as_deref(), Some("https://lms/a"));

        let bare = Cell::value("https://lms/b");
        assert_eq!(link_url(&bare).as_deref(), Some("https://lms/b"));

        assert_eq!(link_url(&Cell::value("Open")), None);
    }
}
