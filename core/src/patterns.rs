//! Free-text patterns recognized in dbt output
//!
//! dbt reports several failures only as prose. Every phrase the service
//! depends on lives here so a wording change in a new dbt release touches a
//! single file. These phrases were observed in dbt-core 1.x output and are not
//! a documented contract.

use regex::Regex;
use std::sync::OnceLock;

use crate::raw::FailureKind;

const TARGET_NOT_FOUND_MARKER: &str = "does not have a target named";

const SYNTAX_ERROR_MARKERS: [&str; 2] = ["Syntax error:", "Error:"];

const PARSING_MARKERS: [&str; 1] = ["Parsing Error"];

const PROJECT_MARKERS: [&str; 3] = [
    "error while reading the project",
    "Project Error",
    "dbt_project.yml",
];

const PROFILE_MARKERS: [&str; 4] = [
    "error while reading profiles",
    "Profile Error",
    "Could not find profile named",
    "profiles.yml",
];

const RUNTIME_MARKERS: [&str; 3] = ["Runtime Error", "Database Error", "Compilation Error"];

fn target_list_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?m)(?:^|\s)- (\w+)").expect("valid target list pattern"))
}

/// Whether a failure message reports an unknown target
pub fn is_target_not_found(text: &str) -> bool {
    text.contains(TARGET_NOT_FOUND_MARKER)
}

/// Target names offered by a target-not-found message, in order
///
/// dbt prints the valid names as `- name` entries after the marker.
pub fn valid_targets(text: &str) -> Vec<String> {
    let listing = text
        .find(TARGET_NOT_FOUND_MARKER)
        .map(|at| &text[at..])
        .unwrap_or(text);

    let mut targets: Vec<String> = Vec::new();
    for capture in target_list_pattern().captures_iter(listing) {
        let name = capture[1].to_string();
        if !targets.contains(&name) {
            targets.push(name);
        }
    }
    targets
}

/// First line of a node error message that names the syntax problem
pub fn syntax_error_line(message: &str) -> Option<String> {
    message
        .lines()
        .find(|line| SYNTAX_ERROR_MARKERS.iter().any(|marker| line.contains(marker)))
        .map(|line| line.trim().to_string())
}

/// Categorize a failure from the text dbt printed
pub fn failure_kind(text: &str) -> FailureKind {
    let contains_any = |markers: &[&str]| markers.iter().any(|marker| text.contains(marker));

    if contains_any(&PARSING_MARKERS) {
        FailureKind::Parsing
    } else if is_target_not_found(text) || contains_any(&PROFILE_MARKERS) {
        FailureKind::Profile
    } else if contains_any(&PROJECT_MARKERS) {
        FailureKind::Project
    } else if contains_any(&RUNTIME_MARKERS) {
        FailureKind::Runtime
    } else {
        FailureKind::Unknown
    }
}
