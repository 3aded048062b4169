use roster_tools::ToolError;
use roster_tools::config::ToolConfig;
use roster_tools::merge::hyperlink::{link_cell, link_url};
use roster_tools::model::{Cell, CellValue, RosterGrid, RosterRow};
use roster_tools::report::{GradeScale, ReportConfig, select_by_recency, select_failing};
use roster_tools::schema::defaults::{fields, master_list_schema};
use roster_tools::sync::{FAILING_SHEET, RECENCY_SHEET, build_reports};

fn roster(rows: &[(&str, f64, f64)]) -> RosterGrid {
    let mut grid = RosterGrid::with_headers(["StudentName", "Grade", "DaysOut"]);
    for (name, grade, days) in rows {
        grid.rows.push(RosterRow {
            cells: vec![Cell::value(*name), Cell::value(*grade), Cell::value(*days)],
        });
    }
    grid
}

#[test]
fn failing_scale_is_detected_column_wide() {
    let grid = roster(&[("R1", 80.0, 1.0), ("R2", 40.0, 1.0), ("R3", 0.55, 2.0)]);

    let selected = select_failing(
        &grid,
        &master_list_schema(),
        fields::GRADE,
        fields::DAYS_OUT,
        &ReportConfig::default(),
    )
    .expect("selection succeeded");

    assert_eq!(selected, vec![2, 1]);
}

#[test]
fn failing_uses_fraction_scale_when_no_sample_exceeds_one() {
    let grid = roster(&[("R1", 0.8, 1.0), ("R2", 0.4, 1.0), ("R3", 0.59, 0.0), ("R4", 0.2, 9.0)]);

    let selected = select_failing(
        &grid,
        &master_list_schema(),
        fields::GRADE,
        fields::DAYS_OUT,
        &ReportConfig::default(),
    )
    .expect("selection succeeded");

    assert_eq!(selected, vec![1, 2], "R4 is out too long");
}

#[test]
fn scale_detection_only_samples_the_prefix() {
    assert_eq!(GradeScale::detect([Some(0.5), None, Some(0.9)]), GradeScale::Fraction);
    assert_eq!(GradeScale::detect([Some(0.5), Some(75.0)]), GradeScale::Percent);
    assert_eq!(GradeScale::Fraction.threshold(60.0), 0.6);

    let mut rows = vec![("A", 0.3, 1.0); 3];
    rows.push(("B", 90.0, 1.0));
    let config = ReportConfig {
        scale_sample_rows: 3,
        ..ReportConfig::default()
    };
    let selected = select_failing(
        &roster(&rows),
        &master_list_schema(),
        fields::GRADE,
        fields::DAYS_OUT,
        &config,
    )
    .expect("selection succeeded");

    // Sampled as a fraction column, so the late 90 is read against 0.6.
    assert_eq!(selected, vec![0, 1, 2]);
}

#[test]
fn recency_sorts_descending_and_keeps_ties_in_order() {
    let grid = roster(&[
        ("A", 50.0, 8.0),
        ("B", 50.0, 3.0),
        ("C", 50.0, 12.0),
        ("D", 50.0, 8.0),
        ("E", 50.0, 7.0),
    ]);

    let selected = select_by_recency(&grid, &master_list_schema(), fields::DAYS_OUT, 7.0)
        .expect("selection succeeded");

    assert_eq!(selected, vec![2, 0, 3, 4]);
}

#[test]
fn rows_without_numbers_are_skipped() {
    let mut grid = roster(&[("A", 50.0, 9.0)]);
    grid.rows.push(RosterRow {
        cells: vec![Cell::value("B"), Cell::value("n/a"), Cell::value(CellValue::Empty)],
    });

    let selected = select_by_recency(&grid, &master_list_schema(), fields::DAYS_OUT, 0.0)
        .expect("selection succeeded");
    assert_eq!(selected, vec![0]);
}

#[test]
fn missing_report_columns_are_configuration_errors() {
    let grid = RosterGrid::with_headers(["StudentName", "Grade"]);
    let error = select_by_recency(&grid, &master_list_schema(), fields::DAYS_OUT, 7.0)
        .expect_err("days out column is required");
    assert!(matches!(error, ToolError::MissingField { ref field, .. } if field == "DaysOut"));
}

#[test]
fn reports_project_whole_rows() {
    let grid = roster(&[("R1", 80.0, 9.0), ("R2", 40.0, 1.0)]);

    let tables = build_reports(&grid, &ToolConfig::default()).expect("reports built");

    assert_eq!(tables.len(), 2);
    assert_eq!(tables[0].sheet_name, RECENCY_SHEET);
    assert_eq!(tables[0].columns, grid.headers);
    assert_eq!(tables[0].rows, vec![vec![
        Cell::value("R1"),
        Cell::value(80.0),
        Cell::value(9.0),
    ]]);
    assert_eq!(tables[1].sheet_name, FAILING_SHEET);
    assert_eq!(tables[1].rows.len(), 1);
    assert_eq!(tables[1].rows[0][0].value, CellValue::from("R2"));
}

#[test]
fn report_rows_keep_gradebook_links() {
    let url = "https://lms.example.edu/courses/1/grades/2";
    let mut grid = RosterGrid::with_headers(["StudentName", "Grade", "DaysOut", "Gradebook"]);
    grid.rows.push(RosterRow {
        cells: vec![
            Cell::value("R1"),
            Cell::value(40.0),
            Cell::value(9.0),
            link_cell(url, "Gradebook"),
        ],
    });

    let tables = build_reports(&grid, &ToolConfig::default()).expect("reports built");

    for table in &tables {
        assert_eq!(table.rows.len(), 1, "{} holds R1", table.sheet_name);
        let link = &table.rows[0][3];
        assert_eq!(link_url(link).as_deref(), Some(url));
        assert_eq!(link.value, CellValue::from("Gradebook"));
    }
}
