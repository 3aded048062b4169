//! The shipped Master List schema.

use super::{FieldKind, FieldSpec, RosterSchema};

/// Canonical field names of the shipped schema.
pub mod fields {
    pub const STUDENT_NAME: &str = "StudentName";
    pub const STUDENT_ID: &str = "StudentId";
    pub const GRADE: &str = "Grade";
    pub const MISSING_ASSIGNMENTS: &str = "MissingAssignments";
    pub const ZERO_ASSIGNMENTS: &str = "ZeroAssignments";
    pub const GRADEBOOK: &str = "Gradebook";
    pub const COURSE_ID: &str = "CourseId";
    pub const LMS_USER_ID: &str = "LmsUserId";
    pub const COURSE_NAME: &str = "CourseName";
    pub const LAST_ATTENDED: &str = "LDA";
    pub const DAYS_OUT: &str = "DaysOut";
    pub const PHONE: &str = "Phone";
    pub const OTHER_PHONE: &str = "OtherPhone";
    pub const EMAIL: &str = "Email";
    pub const PROGRAM: &str = "Program";
    pub const ADVISOR: &str = "Advisor";
    pub const NOTES: &str = "Outreach";
    pub const DNC: &str = "DNC";
    pub const FOLLOW_UP: &str = "FollowUp";
}

/// Default gradebook URL. Course id and LMS user id are the per-record join
/// keys.
pub const GRADEBOOK_URL_TEMPLATE: &str =
    "https://lms.example.edu/courses/{CourseId}/grades/{LmsUserId}";

/// Builds the schema used when no configuration file is supplied.
pub fn master_list_schema() -> RosterSchema {
    use fields::*;

    RosterSchema::new(
        STUDENT_NAME,
        vec![
            FieldSpec::new(STUDENT_NAME).aliases([
                "Student Name",
                "Student",
                "Name",
                "Full Name",
                "Learner",
            ]),
            FieldSpec::new(STUDENT_ID)
                .aliases(["Student ID", "SIS User ID", "Student Number", "SyStudentId", "ID"])
                .identifier(),
            FieldSpec::new(GRADE)
                .aliases(["Current Score", "Final Score", "Course Grade", "Score", "Grade %"])
                .kind(FieldKind::Number),
            FieldSpec::new(MISSING_ASSIGNMENTS)
                .aliases(["Missing Assignments", "Missing", "# Missing"])
                .kind(FieldKind::Number),
            FieldSpec::new(ZERO_ASSIGNMENTS)
                .aliases(["Zero Assignments", "Zeros", "# Zeros"])
                .kind(FieldKind::Number),
            FieldSpec::new(GRADEBOOK)
                .aliases(["Grade Book", "Gradebook Link"])
                .link(GRADEBOOK_URL_TEMPLATE, Some("Gradebook")),
            FieldSpec::new(COURSE_ID).aliases(["Course ID", "Section ID", "Canvas Course ID"]),
            FieldSpec::new(LMS_USER_ID).aliases(["LMS User ID", "Canvas User ID", "User ID"]),
            FieldSpec::new(COURSE_NAME).aliases(["Course Name", "Course", "Section", "Category"]),
            FieldSpec::new(LAST_ATTENDED)
                .aliases([
                    "Last Date of Attendance",
                    "Last Attended",
                    "Last Attendance",
                    "Last Activity",
                    "Last Login",
                ])
                .kind(FieldKind::Date),
            FieldSpec::new(DAYS_OUT)
                .aliases(["Days Out", "Days Since LDA", "Days Absent"])
                .kind(FieldKind::Number)
                .elapsed_days_since(LAST_ATTENDED),
            FieldSpec::new(PHONE)
                .aliases(["Phone Number", "Primary Phone", "Cell Phone", "Mobile"]),
            FieldSpec::new(OTHER_PHONE)
                .aliases(["Other Phone", "Secondary Phone", "Home Phone", "Work Phone"]),
            FieldSpec::new(EMAIL).aliases(["Email Address", "E-mail", "Student Email"]),
            FieldSpec::new(PROGRAM)
                .aliases(["Program Version", "Program Name", "Major"])
                .static_value(),
            FieldSpec::new(ADVISOR)
                .aliases(["Assigned To", "Advisor Name", "Success Coach"])
                .static_value(),
            FieldSpec::new(NOTES)
                .aliases(["Notes", "Comments", "Outreach Notes"])
                .static_value(),
            FieldSpec::new(DNC).aliases(["Do Not Contact", "DNC Status"]),
            FieldSpec::new(FOLLOW_UP).aliases(["Follow Up", "Follow-Up Date", "Next Contact"]),
        ],
    )
}
