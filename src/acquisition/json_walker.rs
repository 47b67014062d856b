//! Generic JSON job-record walker.
//!
//! Depth-first traversal of an arbitrary JSON value, collecting title-like
//! fields from objects that also carry some job-identifying signal. The
//! field probes are ordered rule lists evaluated in priority order, so the
//! precedence is explicit and testable in isolation.

use serde_json::{Map, Value};
use std::collections::HashSet;

const MAX_TITLES: usize = 200;
const MAX_DEPTH: usize = 8;

/// Title field spellings in priority order, camelCase and PascalCase
/// variants as the common ATS backends emit them.
const TITLE_FIELDS: &[&str] = &[
    "jobTitle",
    "title",
    "positionTitle",
    "position_title",
    "jobOpeningTitle",
    "JobTitle",
    "Position",
    "JobOpeningTitle",
    "jobRequisitionTitle",
    "JobRequisitionTitle",
    "RequisitionTitle",
    "requisitionTitle",
];

/// Numeric id-like field spellings, checked in order.
const NUMERIC_ID_FIELDS: &[&str] = &[
    "jobId",
    "job_id",
    "requisitionId",
    "requisition_id",
    "JobOpeningId",
    "id",
];

/// Collect job titles from an arbitrary JSON value into `out`.
///
/// Bounded to depth 8 and 200 titles, with cycle protection keyed on value
/// address (serde trees cannot be cyclic, but the guard also caps repeated
/// shared-subtree visits and keeps the walk total).
pub fn collect_titles(input: &Value, out: &mut Vec<String>) {
    let mut seen: HashSet<usize> = HashSet::new();
    walk(input, out, 0, &mut seen);
}

fn walk(node: &Value, out: &mut Vec<String>, depth: usize, seen: &mut HashSet<usize>) {
    if out.len() >= MAX_TITLES || depth > MAX_DEPTH {
        return;
    }
    match node {
        Value::Array(items) => {
            if !seen.insert(node as *const Value as usize) {
                return;
            }
            for item in items {
                walk(item, out, depth + 1, seen);
            }
        }
        Value::Object(obj) => {
            if !seen.insert(node as *const Value as usize) {
                return;
            }
            if let Some(title) = probe_title(obj) {
                if has_job_signal(obj) {
                    out.push(title);
                }
            }
            for value in obj.values() {
                walk(value, out, depth + 1, seen);
            }
        }
        _ => {}
    }
}

/// First matching title field, falling back to `name` within a 6–120
/// character window (generic `name` fields are a weaker signal).
fn probe_title(obj: &Map<String, Value>) -> Option<String> {
    for field in TITLE_FIELDS {
        if let Some(Value::String(s)) = obj.get(*field) {
            if !s.is_empty() {
                return Some(s.clone());
            }
        }
    }
    if let Some(Value::String(s)) = obj.get("name") {
        let len = s.chars().count();
        if (6..=120).contains(&len) {
            return Some(s.clone());
        }
    }
    None
}

/// An object is job-shaped when it carries a numeric id field, a 5–7 digit
/// run anywhere in its serialized form (requisition-number proxy), or a
/// plausible location string.
fn has_job_signal(obj: &Map<String, Value>) -> bool {
    if has_numeric_id(obj) {
        return true;
    }
    let serialized = Value::Object(obj.clone()).to_string();
    let window = if serialized.len() > 5000 {
        let mut end = 5000;
        while !serialized.is_char_boundary(end) {
            end -= 1;
        }
        &serialized[..end]
    } else {
        serialized.as_str()
    };
    if contains_requisition_number(window) {
        return true;
    }
    matches!(obj.get("location"), Some(Value::String(s)) if s.chars().count() > 2)
}

fn has_numeric_id(obj: &Map<String, Value>) -> bool {
    for field in NUMERIC_ID_FIELDS {
        if matches!(obj.get(*field), Some(Value::Number(_))) {
            return true;
        }
    }
    // JobOpeningId also appears as a numeric string.
    matches!(
        obj.get("JobOpeningId"),
        Some(Value::String(s)) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
    )
}

/// A standalone run of 5–7 digits, bounded by non-digits.
pub fn contains_requisition_number(text: &str) -> bool {
    let mut run = 0usize;
    for b in text.bytes() {
        if b.is_ascii_digit() {
            run += 1;
        } else {
            if (5..=7).contains(&run) {
                return true;
            }
            run = 0;
        }
    }
    (5..=7).contains(&run)
}
