use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate, Weekday};
use regex::{Captures, Regex};

use crate::dates::{CanonicalInstant, format_short_date};

/// Extracts follow-up dates from free text, resolved against `now`.
///
/// Recognises short numeric dates (`10/7`, `10-7-25`, `10/7/2025`) and the
/// phrases "tomorrow", "next week", weekday names and "weekend(s)". Weekday
/// names and weekends resolve to the next future occurrence, between one and
/// seven days ahead. Numeric dates without a year take the year of `now`.
///
/// Returns de-duplicated `M/D/YY` strings in order of first appearance.
pub fn extract_follow_up_dates(text: &str, now: CanonicalInstant) -> Vec<String> {
    follow_up_dates(text, now)
        .into_iter()
        .map(format_short_date)
        .collect()
}

/// Calendar-date form of [`extract_follow_up_dates`].
pub fn follow_up_dates(text: &str, now: CanonicalInstant) -> Vec<NaiveDate> {
    let mut dates: Vec<NaiveDate> = Vec::new();
    for captures in follow_up_regex().captures_iter(text) {
        let Some(date) = resolve_match(&captures, now) else {
            continue;
        };
        if !dates.contains(&date) {
            dates.push(date);
        }
    }
    dates
}

/// Replaces every relative phrase in `text` with the `M/D/YY` date it
/// resolves to, so the follow-up survives later readings without depending
/// on when they happen. Numeric dates are left as written.
pub fn stamp_relative_dates(text: &str, now: CanonicalInstant) -> String {
    follow_up_regex()
        .replace_all(text, |captures: &Captures<'_>| {
            let original = captures[0].to_string();
            if captures.name("phrase").is_none() {
                return original;
            }
            resolve_match(captures, now)
                .map(format_short_date)
                .unwrap_or(original)
        })
        .into_owned()
}

/// Follow-up dates of a note log kept one entry per line, newest last.
///
/// Relative phrases resolve only on the newest non-empty line; older lines
/// were written on earlier days, so only their numeric dates are read.
pub fn note_follow_up_dates(notes: &str, now: CanonicalInstant) -> Vec<NaiveDate> {
    let lines: Vec<&str> = notes.split('\n').collect();
    let newest = newest_entry(&lines);

    let mut dates: Vec<NaiveDate> = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        for captures in follow_up_regex().captures_iter(line) {
            if captures.name("phrase").is_some() && newest != Some(index) {
                continue;
            }
            let Some(date) = resolve_match(&captures, now) else {
                continue;
            };
            if !dates.contains(&date) {
                dates.push(date);
            }
        }
    }
    dates
}

/// [`stamp_relative_dates`] applied to the newest non-empty line of a note
/// log. Earlier lines are returned untouched.
pub fn stamp_newest_entry(notes: &str, now: CanonicalInstant) -> String {
    let lines: Vec<&str> = notes.split('\n').collect();
    let Some(newest) = newest_entry(&lines) else {
        return notes.to_string();
    };
    lines
        .iter()
        .enumerate()
        .map(|(index, line)| {
            if index == newest {
                stamp_relative_dates(line, now)
            } else {
                (*line).to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn newest_entry(lines: &[&str]) -> Option<usize> {
    lines.iter().rposition(|line| !line.trim().is_empty())
}

/// Debounces follow-up detection for callers that re-run extraction on
/// every keystroke.
///
/// An empty result only clears previously detected dates after more than
/// `tolerance` consecutive empty evaluations, so a date is not removed and
/// re-added while the user is mid-word.
#[derive(Debug, Clone, Default)]
pub struct FollowUpTracker {
    detected: Vec<String>,
    empty_streak: usize,
    tolerance: usize,
}

impl FollowUpTracker {
    pub fn new(tolerance: usize) -> Self {
        Self {
            detected: Vec::new(),
            empty_streak: 0,
            tolerance,
        }
    }

    /// Re-evaluates `text` and returns the dates currently considered
    /// detected.
    pub fn observe(&mut self, text: &str, now: CanonicalInstant) -> &[String] {
        let found = extract_follow_up_dates(text, now);
        if found.is_empty() && !self.detected.is_empty() {
            self.empty_streak += 1;
            if self.empty_streak <= self.tolerance {
                return &self.detected;
            }
        }
        self.empty_streak = 0;
        self.detected = found;
        &self.detected
    }

    pub fn current(&self) -> &[String] {
        &self.detected
    }
}

fn resolve_match(captures: &Captures<'_>, now: CanonicalInstant) -> Option<NaiveDate> {
    if let Some(phrase) = captures.name("phrase") {
        return resolve_phrase(phrase.as_str(), now);
    }

    let month = captures.name("month")?.as_str().parse::<u32>().ok()?;
    let day = captures.name("day")?.as_str().parse::<u32>().ok()?;
    let year = match captures.name("year") {
        Some(year) => {
            let digits = year.as_str();
            let value = digits.parse::<i32>().ok()?;
            if digits.len() == 2 { 2000 + value } else { value }
        }
        None => now.date().year(),
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

fn resolve_phrase(phrase: &str, now: CanonicalInstant) -> Option<NaiveDate> {
    let phrase = phrase.to_lowercase();
    let today = now.date();
    let offset = match phrase.as_str() {
        "tomorrow" => 1,
        "weekend" | "weekends" => days_until(today, Weekday::Sat),
        other if other.starts_with("next") => 7,
        other => days_until(today, other.parse::<Weekday>().ok()?),
    };
    Some(now.plus_days(offset).date())
}

/// Days until the next occurrence of `target`, in `1..=7`.
fn days_until(today: NaiveDate, target: Weekday) -> i64 {
    let current = i64::from(today.weekday().num_days_from_monday());
    let wanted = i64::from(target.num_days_from_monday());
    match (wanted - current).rem_euclid(7) {
        0 => 7,
        ahead => ahead,
    }
}

fn follow_up_regex() -> &'static Regex {
    static FOLLOW_UP_RE: OnceLock<Regex> = OnceLock::new();
    FOLLOW_UP_RE.get_or_init(|| {
        Regex::new(
            r"(?ix)
            \b(?:
                (?P<month>\d{1,2})[/-](?P<day>\d{1,2})(?:[/-](?P<year>\d{4}|\d{2}))?
              | (?P<phrase>tomorrow|next\s+week|weekends?|monday|tuesday|wednesday|thursday|friday|saturday|sunday)
            )\b",
        )
        .expect("follow-up regex should compile")
    })
}
