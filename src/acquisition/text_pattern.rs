//! Structural text-pattern extractor.
//!
//! Several vendor UIs ship listing data as formatted text rather than JSON,
//! with a repeating line layout:
//!
//! ```text
//! Respiratory Therapist
//! 178687
//! Full-Time
//! Houston, TX
//! ```
//!
//! The title line is followed by a 5–7 digit requisition number and an
//! employment-type line; that shape is specific enough to mine titles from
//! script bodies and text fragments.

use regex::Regex;

const MAX_MATCHES: usize = 50;

/// Extract title lines matching the title / requisition-number /
/// employment-type layout, capped at 50 per input.
pub fn extract_titles(text: &str) -> Vec<String> {
    let re = Regex::new(r"([A-Z][^\n]{4,200})\s*\n\s*(\d{5,7})\s*\n\s*(Full[-\s]?Time|Part[-\s]?Time)")
        .expect("line pattern regex is valid");
    let mut found = Vec::new();
    for caps in re.captures_iter(text) {
        found.push(caps[1].trim().to_string());
        if found.len() >= MAX_MATCHES {
            break;
        }
    }
    found
}
