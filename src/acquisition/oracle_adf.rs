//! Oracle ADF requisition-collection walker.
//!
//! The recruiting Candidate Experience endpoint returns a nested shape where
//! the top-level `items` array's first element is search metadata and actual
//! postings live in a nested `requisitionList` — either an array, or an
//! object wrapping an `items`/`requisitionList` array. Key casing varies
//! between tenants, so title and id probes each try a fixed spelling set and
//! a sibling-array fallback catches unexpected layouts.

use crate::types::JobRecord;
use serde_json::{Map, Value};

const MAX_DEPTH: usize = 5;

const LIST_KEYS: &[&str] = &[
    "requisitionList",
    "RequisitionList",
    "requisitions",
    "results",
];

const TITLE_KEYS: &[&str] = &[
    "RequisitionTitle",
    "requisitionTitle",
    "title",
    "Title",
    "JobTitle",
    "jobTitle",
];

const ID_KEYS: &[&str] = &["RequisitionId", "requisitionId", "Id", "id"];

/// Extract requisition records from an ADF response value, in document order.
pub fn extract_requisitions(data: &Value) -> Vec<JobRecord> {
    let mut out = Vec::new();
    walk(data, &mut out, 0);
    out
}

fn walk(data: &Value, out: &mut Vec<JobRecord>, depth: usize) {
    if depth > MAX_DEPTH {
        return;
    }
    let Some(obj) = data.as_object() else {
        return;
    };

    // Top-level items array: first item is usually the finder/search
    // metadata, postings hang off it.
    if let Some(items) = obj.get("items").and_then(Value::as_array) {
        for item in items {
            let Some(rec) = item.as_object() else {
                continue;
            };
            push_record(rec, out);

            match first_list_value(rec) {
                Some(Value::Array(reqs)) => {
                    for req in reqs {
                        if let Some(m) = req.as_object() {
                            push_record(m, out);
                            walk_children(m, out, depth + 1);
                        }
                    }
                }
                Some(wrapper @ Value::Object(w)) => {
                    // The array is often wrapped:
                    // requisitionList = { items: [ { RequisitionTitle: … } ] }
                    let inner = w
                        .get("items")
                        .and_then(Value::as_array)
                        .or_else(|| w.get("requisitionList").and_then(Value::as_array));
                    if let Some(inner) = inner {
                        for req in inner {
                            if let Some(m) = req.as_object() {
                                push_record(m, out);
                            }
                        }
                    } else {
                        walk(wrapper, out, depth + 1);
                    }
                }
                _ => {}
            }

            // Fallback: any other array property whose first element looks
            // record-shaped may hold requisitions under unexpected casing.
            for (key, value) in rec {
                if LIST_KEYS.contains(&key.as_str()) {
                    continue;
                }
                let Some(arr) = value.as_array() else {
                    continue;
                };
                let Some(first) = arr.first().and_then(Value::as_object) else {
                    continue;
                };
                if TITLE_KEYS.iter().any(|k| first.contains_key(*k)) {
                    for req in arr {
                        if let Some(m) = req.as_object() {
                            push_record(m, out);
                        }
                    }
                }
            }
        }
        return;
    }

    // Requisition list directly at this level.
    if let Some(reqs) = obj
        .get("requisitionList")
        .and_then(Value::as_array)
        .or_else(|| obj.get("RequisitionList").and_then(Value::as_array))
    {
        for req in reqs {
            if let Some(m) = req.as_object() {
                push_record(m, out);
            }
        }
        return;
    }

    if obj.get("RequisitionTitle").is_some_and(Value::is_string)
        || obj.get("requisitionTitle").is_some_and(Value::is_string)
    {
        push_record(obj, out);
    }
    walk_children(obj, out, depth);
}

/// Recurse into nested objects and object arrays not already handled.
fn walk_children(obj: &Map<String, Value>, out: &mut Vec<JobRecord>, depth: usize) {
    for value in obj.values() {
        match value {
            Value::Object(_) => walk(value, out, depth + 1),
            Value::Array(arr) => {
                for elem in arr {
                    if elem.is_object() {
                        walk(elem, out, depth + 1);
                    }
                }
            }
            _ => {}
        }
    }
}

fn first_list_value<'a>(rec: &'a Map<String, Value>) -> Option<&'a Value> {
    LIST_KEYS.iter().find_map(|k| rec.get(*k))
}

fn push_record(rec: &Map<String, Value>, out: &mut Vec<JobRecord>) {
    let Some(title) = probe_title(rec) else {
        return;
    };
    let len = title.chars().count();
    if !(2..=300).contains(&len) {
        return;
    }
    let id = ID_KEYS.iter().find_map(|k| match rec.get(*k) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    });
    out.push(JobRecord {
        title,
        id,
        url: None,
        posted_at: None,
    });
}

fn probe_title(rec: &Map<String, Value>) -> Option<String> {
    for key in TITLE_KEYS {
        if let Some(Value::String(s)) = rec.get(*key) {
            if !s.is_empty() {
                return Some(s.clone());
            }
        }
    }
    // Nested Information.RequisitionTitle path on some tenants.
    if let Some(Value::Object(info)) = rec.get("Information") {
        if let Some(Value::String(s)) = info.get("RequisitionTitle") {
            if !s.is_empty() {
                return Some(s.clone());
            }
        }
    }
    None
}
