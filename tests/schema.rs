use roster_tools::ToolError;
use roster_tools::error::HeaderSide;
use roster_tools::schema::defaults::{fields, master_list_schema};
use roster_tools::schema::{FieldKind, FieldSpec, RosterSchema};
use roster_tools::warning::ImportWarning;

fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

#[test]
fn unrelated_headers_resolve_to_nothing() {
    let schema = master_list_schema();
    let row = headers(&["Foo", "Bar", "Baz Qux"]);

    for field in &schema.fields {
        assert_eq!(schema.resolve(&row, &field.name), None, "field {}", field.name);
    }
    assert_eq!(schema.resolve(&row, "NotDeclared"), None);
}

#[test]
fn matching_ignores_case_and_whitespace() {
    let schema = master_list_schema();
    let row = headers(&["student name", " CurrentScore "]);

    assert_eq!(schema.resolve(&row, fields::STUDENT_NAME), Some(0));
    assert_eq!(schema.resolve(&row, fields::GRADE), Some(1));
}

#[test]
fn first_declared_alias_wins() {
    let schema = master_list_schema();
    let row = headers(&["Score", "Final Score", "Current Score"]);

    assert_eq!(schema.resolve(&row, fields::GRADE), Some(2));

    let with_canonical = headers(&["Score", "Grade"]);
    assert_eq!(schema.resolve(&with_canonical, fields::GRADE), Some(1));
}

#[test]
fn shared_column_is_kept_by_first_field_and_reported() {
    let schema = RosterSchema::new(
        "Name",
        vec![
            FieldSpec::new("Name"),
            FieldSpec::new("Phone").aliases(["Contact"]),
            FieldSpec::new("Email").aliases(["Contact"]),
        ],
    );
    let row = headers(&["Name", "Contact"]);

    let mapping = schema
        .map_columns(&row, HeaderSide::Source)
        .with_rows_affected(12);

    assert_eq!(mapping.column("Phone"), Some(1));
    assert_eq!(mapping.column("Email"), None);
    assert_eq!(
        mapping.warnings,
        vec![ImportWarning::SharedColumn {
            side: HeaderSide::Source,
            column: 1,
            header: "Contact".into(),
            kept: "Phone".into(),
            dropped: "Email".into(),
            rows_affected: 12,
        }]
    );
}

#[test]
fn require_names_the_missing_field() {
    let schema = master_list_schema();
    let row = headers(&["Current Score"]);

    let error = schema
        .require(&row, fields::STUDENT_NAME, HeaderSide::Source)
        .expect_err("identity is absent");
    assert!(matches!(
        error,
        ToolError::MissingField { ref field, side: HeaderSide::Source } if field == fields::STUDENT_NAME
    ));
    assert!(error.to_string().contains("StudentName"));

    let error = schema
        .require(&row, "Nickname", HeaderSide::Roster)
        .expect_err("field is undeclared");
    assert!(matches!(error, ToolError::UnknownField(ref field) if field == "Nickname"));
}

#[test]
fn shipped_schema_is_valid() {
    master_list_schema().validate().expect("shipped schema validates");
}

#[test]
fn validation_rejects_inconsistent_schemas() {
    let two_identifiers = RosterSchema::new(
        "Name",
        vec![
            FieldSpec::new("Name"),
            FieldSpec::new("Id").identifier(),
            FieldSpec::new("OtherId").identifier(),
        ],
    );
    assert!(matches!(
        two_identifiers.validate(),
        Err(ToolError::InvalidConfig(_))
    ));

    let dangling_link = RosterSchema::new(
        "Name",
        vec![
            FieldSpec::new("Name"),
            FieldSpec::new("Link").link("https://lms/{CourseId}", None),
        ],
    );
    assert!(matches!(
        dangling_link.validate(),
        Err(ToolError::UnknownField(ref field)) if field == "CourseId"
    ));

    let dangling_derivation = RosterSchema::new(
        "Name",
        vec![
            FieldSpec::new("Name"),
            FieldSpec::new("DaysOut")
                .kind(FieldKind::Number)
                .elapsed_days_since("LDA"),
        ],
    );
    assert!(matches!(
        dangling_derivation.validate(),
        Err(ToolError::UnknownField(ref field)) if field == "LDA"
    ));

    let undeclared_identity = RosterSchema::new("Name", vec![FieldSpec::new("Grade")]);
    assert!(matches!(
        undeclared_identity.validate(),
        Err(ToolError::UnknownField(_))
    ));
}

#[test]
fn link_template_renders_only_with_every_key() {
    let schema = master_list_schema();
    let link = schema
        .field(fields::GRADEBOOK)
        .and_then(|field| field.link.clone())
        .expect("gradebook is a link");

    assert_eq!(link.join_keys(), vec!["CourseId".to_string(), "LmsUserId".to_string()]);

    let url = link.render(|key| match key {
        "CourseId" => Some("555".into()),
        "LmsUserId" => Some(" 9001 ".into()),
        _ => None,
    });
    assert_eq!(url.as_deref(), Some("https://lms.example.edu/courses/555/grades/9001"));

    let missing = link.render(|key| (key == "CourseId").then(|| "555".to_string()));
    assert_eq!(missing, None);
}

#[test]
fn schema_loads_from_json_with_defaults() {
    let schema: RosterSchema = serde_json::from_value(serde_json::json!({
        "identity_field": "Name",
        "fields": [
            { "name": "Name", "aliases": ["Student"] },
            { "name": "Id", "identifier": true },
            { "name": "Advisor", "static": true },
            { "name": "Score", "kind": "number" }
        ]
    }))
    .expect("schema deserialised");

    schema.validate().expect("schema validates");
    assert_eq!(schema.identifier_field().map(|field| field.name.as_str()), Some("Id"));
    assert_eq!(
        schema.static_fields().map(|field| field.name.as_str()).collect::<Vec<_>>(),
        vec!["Advisor"]
    );
    assert_eq!(schema.field("Score").map(|field| field.kind), Some(FieldKind::Number));
}
