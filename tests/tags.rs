use chrono::NaiveDate;
use roster_tools::dates::CanonicalInstant;
use roster_tools::model::{Cell, CellValue, RosterGrid, RosterRow};
use roster_tools::schema::defaults::master_list_schema;
use roster_tools::tags::{
    AnnotationConfig, DncScope, FollowUpTracker, annotate_roster, classify_dnc,
    classify_dnc_history, extract_follow_up_dates, inspect_dnc, stamp_relative_dates,
};
use roster_tools::warning::ImportWarning;

/// Wednesday.
fn october_first() -> CanonicalInstant {
    CanonicalInstant::from_date(NaiveDate::from_ymd_opt(2025, 10, 1).expect("valid date"))
}

#[test]
fn tomorrow_resolves_against_now() {
    assert_eq!(
        extract_follow_up_dates("see you tomorrow", october_first()),
        vec!["10/2/25".to_string()]
    );
}

#[test]
fn weekday_names_are_one_to_seven_days_ahead() {
    let now = october_first();
    assert_eq!(extract_follow_up_dates("call Friday", now), vec!["10/3/25"]);
    assert_eq!(extract_follow_up_dates("call thursday", now), vec!["10/2/25"]);
    assert_eq!(extract_follow_up_dates("call Tuesday", now), vec!["10/7/25"]);
    // Same weekday as now means next week, never today.
    assert_eq!(extract_follow_up_dates("call Wednesday", now), vec!["10/8/25"]);
}

#[test]
fn weekend_and_next_week() {
    let now = october_first();
    assert_eq!(extract_follow_up_dates("try over the weekend", now), vec!["10/4/25"]);
    assert_eq!(extract_follow_up_dates("weekends only", now), vec!["10/4/25"]);
    assert_eq!(extract_follow_up_dates("check in next  week", now), vec!["10/8/25"]);
}

#[test]
fn numeric_dates_with_and_without_year() {
    let now = october_first();
    assert_eq!(extract_follow_up_dates("LDA 10-7-2025", now), vec!["10/7/25"]);
    assert_eq!(extract_follow_up_dates("LDA 10/07/25", now), vec!["10/7/25"]);
    assert_eq!(extract_follow_up_dates("call 11/3", now), vec!["11/3/25"]);
    assert!(extract_follow_up_dates("call 13/45", now).is_empty());
}

#[test]
fn results_are_deduplicated_in_order() {
    let now = october_first();
    assert_eq!(
        extract_follow_up_dates("tomorrow (10/2), then Friday, and Thursday again", now),
        vec!["10/2/25", "10/3/25"]
    );
}

#[test]
fn words_containing_phrases_do_not_match() {
    assert!(extract_follow_up_dates("Sundays-school volunteer, tomorrowland", october_first()).is_empty());
}

#[test]
fn relative_phrases_are_stamped_as_dates() {
    let now = october_first();
    assert_eq!(stamp_relative_dates("LDA tomorrow", now), "LDA 10/2/25");
    assert_eq!(
        stamp_relative_dates("call Friday, LDA 9/30", now),
        "call 10/3/25, LDA 9/30"
    );
    assert_eq!(stamp_relative_dates("no plans", now), "no plans");
}

#[test]
fn dnc_scopes() {
    assert_eq!(classify_dnc("DNC - Phone, Outreach"), DncScope::PhoneOnly);
    assert_eq!(classify_dnc("dnc"), DncScope::AllChannels);
    assert_eq!(classify_dnc("Outreach, DNC - Other Phone"), DncScope::OtherPhoneOnly);
    assert_eq!(classify_dnc("DNC (email)"), DncScope::EmailOnly);
    assert_eq!(classify_dnc("DNC: e-mail"), DncScope::EmailOnly);
    assert_eq!(classify_dnc("Left voicemail"), DncScope::None);
    assert_eq!(classify_dnc(""), DncScope::None);
}

#[test]
fn first_dnc_token_wins_and_is_counted() {
    let classification = inspect_dnc("DNC - Email, DNC - Phone");
    assert_eq!(classification.scope, DncScope::EmailOnly);
    assert_eq!(classification.tokens, 2);
    assert!(classification.is_ambiguous());
}

#[test]
fn history_applies_most_recent_match() {
    let history = ["spoke with student", "DNC - Phone", "DNC"];
    assert_eq!(classify_dnc_history(history).scope, DncScope::PhoneOnly);
    assert_eq!(classify_dnc_history(["no tags here"]).scope, DncScope::None);
}

#[test]
fn tracker_debounces_transient_empty_matches() {
    let now = october_first();
    let mut tracker = FollowUpTracker::new(2);

    assert_eq!(tracker.observe("call tomorrow", now), ["10/2/25"]);
    assert_eq!(tracker.observe("call tomorro", now), ["10/2/25"]);
    assert_eq!(tracker.observe("call tomor", now), ["10/2/25"]);
    assert!(tracker.observe("call tom", now).is_empty());
    assert!(tracker.current().is_empty());

    assert_eq!(tracker.observe("call Friday", now), ["10/3/25"]);
}

fn annotated_roster() -> RosterGrid {
    let mut roster = RosterGrid::with_headers(["StudentName", "Outreach", "DNC", "FollowUp"]);
    let rows = [
        ("Doe, Jane", "Left message\nDNC - Phone"),
        ("Smith, John", "call tomorrow"),
        ("Lee, Ann", "DNC\nDNC - Email, DNC - Phone\nmet 9/1"),
    ];
    for (name, notes) in rows {
        let mut row = RosterRow::blank(roster.width());
        row.set(0, Cell::value(name));
        row.set(1, Cell::value(notes));
        roster.rows.push(row);
    }
    roster
}

#[test]
fn annotation_writes_scope_and_upcoming_follow_ups() {
    let schema = master_list_schema();
    let outcome = annotate_roster(
        &annotated_roster(),
        &schema,
        &AnnotationConfig::default(),
        october_first(),
    )
    .expect("roster annotated");

    let rows = &outcome.roster.rows;
    assert_eq!(rows[0].value(2), &CellValue::from("DNC - Phone"));
    assert_eq!(rows[0].value(3), &CellValue::Empty);

    assert_eq!(rows[1].value(1), &CellValue::from("call 10/2/25"));
    assert_eq!(rows[1].value(2), &CellValue::Empty);
    assert_eq!(rows[1].value(3), &CellValue::from("10/2/25"));

    // The newest line carries two tokens; the older "DNC" line is not reached.
    assert_eq!(rows[2].value(2), &CellValue::from("DNC - Email"));
    // 9/1 is already past.
    assert_eq!(rows[2].value(3), &CellValue::Empty);

    assert_eq!(outcome.dnc.get("jane doe"), Some(&DncScope::PhoneOnly));
    assert_eq!(outcome.dnc.get("ann lee"), Some(&DncScope::EmailOnly));
    assert_eq!(outcome.dnc.get("john smith"), None);
    assert_eq!(
        outcome.follow_ups.get("john smith"),
        Some(&vec!["10/2/25".to_string()])
    );
    assert_eq!(
        outcome.warnings,
        vec![ImportWarning::MultipleDncTokens {
            identity: "ann lee".into(),
            tokens: 2,
        }]
    );
}

#[test]
fn annotation_leaves_formula_cells_alone() {
    let mut roster = annotated_roster();
    roster.rows[1].set(1, Cell::formula("call tomorrow", "=Notes!B2"));
    roster.rows[1].set(3, Cell::formula("manual", "=Overrides!C2"));

    let outcome = annotate_roster(
        &roster,
        &master_list_schema(),
        &AnnotationConfig::default(),
        october_first(),
    )
    .expect("roster annotated");

    let row = &outcome.roster.rows[1];
    assert_eq!(row.cell(1), roster.rows[1].cell(1));
    assert_eq!(row.cell(3), roster.rows[1].cell(3));
    assert_eq!(
        outcome.follow_ups.get("john smith"),
        Some(&vec!["10/2/25".to_string()])
    );
}

#[test]
fn only_the_newest_note_line_is_read_relative_to_now() {
    let mut roster = RosterGrid::with_headers(["StudentName", "Outreach", "DNC", "FollowUp"]);
    let rows = [
        ("Doe, Jane", "8/15 spoke Monday, said call tomorrow\n9/30 left voicemail"),
        ("Smith, John", "8/15 said tomorrow\n10/1 call Friday"),
        ("Lee, Ann", "9/2 call tomorrow\nasked for 10/20\n\n"),
    ];
    for (name, notes) in rows {
        let mut row = RosterRow::blank(roster.width());
        row.set(0, Cell::value(name));
        row.set(1, Cell::value(notes));
        roster.rows.push(row);
    }

    let outcome = annotate_roster(
        &roster,
        &master_list_schema(),
        &AnnotationConfig::default(),
        october_first(),
    )
    .expect("roster annotated");
    let rows = &outcome.roster.rows;

    // Older entries were written on other days and keep their wording.
    assert_eq!(rows[0].cell(1), roster.rows[0].cell(1));
    assert_eq!(rows[0].value(3), &CellValue::Empty);
    assert_eq!(outcome.follow_ups.get("jane doe"), None);

    assert_eq!(
        rows[1].value(1),
        &CellValue::from("8/15 said tomorrow\n10/1 call 10/3/25")
    );
    assert_eq!(rows[1].value(3), &CellValue::from("10/3/25"));

    // Numeric dates on any line still count; trailing blank lines are skipped.
    assert_eq!(rows[2].cell(1), roster.rows[2].cell(1));
    assert_eq!(rows[2].value(3), &CellValue::from("10/20/25"));
    assert_eq!(
        outcome.follow_ups.get("ann lee"),
        Some(&vec!["10/20/25".to_string()])
    );
}
