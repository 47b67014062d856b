//! Core data model: job records, extraction results, and diagnostics.

use serde::{Deserialize, Serialize};

/// One observed job posting.
///
/// Multiple records may legitimately share a title (different postings of the
/// same role); identity is established only via [`fingerprint`], never via
/// the title alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Posting title. Always non-empty, 2–300 characters.
    pub title: String,
    /// Vendor-assigned stable identifier (requisition number etc.), if seen.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Detail-page URL, if seen.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Posting date as the source formatted it, if seen.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posted_at: Option<String>,
}

impl JobRecord {
    /// Title-only record, used when a strategy yields titles without
    /// structured metadata.
    pub fn from_title(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            id: None,
            url: None,
            posted_at: None,
        }
    }
}

/// Build title-only records for a list of titles, preserving order.
pub fn records_from_titles(titles: &[String]) -> Vec<JobRecord> {
    titles.iter().map(JobRecord::from_title).collect()
}

/// Stable deduplication key for a posting.
///
/// Priority: vendor id, then detail URL, then title+posting date, then title
/// alone. Pure and total — two records describe the same posting iff their
/// fingerprints are equal.
pub fn fingerprint(record: &JobRecord) -> String {
    if let Some(id) = record.id.as_deref().filter(|s| !s.is_empty()) {
        return format!("id:{id}");
    }
    if let Some(url) = record.url.as_deref().filter(|s| !s.is_empty()) {
        return format!("url:{url}");
    }
    if let Some(posted) = record.posted_at.as_deref().filter(|s| !s.is_empty()) {
        return format!("title:{}|posted:{posted}", record.title);
    }
    format!("title:{}", record.title)
}

/// Per-frame diagnostics collected during browser-driven extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameStats {
    /// Frame URL.
    pub url: String,
    /// Call-to-action elements found in this frame.
    pub ctas: u64,
    /// Up to eight heading texts sampled from the frame.
    pub sample_headings: Vec<String>,
    /// Evaluation error, when the frame could not be inspected
    /// (cross-origin frames commonly land here).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// URL + content type of a network response seen during page load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseInfo {
    pub url: String,
    pub content_type: String,
}

/// Diagnostic bundle attached to every extraction result.
///
/// The ordered `trace` is part of the engine's contract: the heuristic
/// nature of extraction makes silent failure unacceptable, so every step
/// records which strategy ran, what it found, and why it stopped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionDebug {
    /// Final URL after redirects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,
    /// Rendered page title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_title: Option<String>,
    /// Number of frames on the final page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_count: Option<usize>,
    /// Call-to-action elements counted across all frames.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cta_count: Option<u64>,
    /// Short classification when the page likely served an anti-bot
    /// challenge, or a tag naming the strategy that produced the result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_hint: Option<String>,
    /// Per-frame statistics (capped at 10 frames).
    pub frame_stats: Vec<FrameStats>,
    /// Relevant network responses inspected during load.
    pub responses_scanned: usize,
    /// Sample of the first responses seen (capped at 12).
    pub response_samples: Vec<ResponseInfo>,
    /// Deduplicated responses classified as job-data candidates (capped at 40).
    pub relevant_responses: Vec<ResponseInfo>,
    /// Ordered human-readable log of every orchestration step.
    pub trace: Vec<String>,
}

/// Result of one single-URL extraction.
///
/// `titles` and `jobs` are parallel in intent (roughly one record per title);
/// when a strategy produces titles without structured records the engine
/// synthesizes title-only records, so order correspondence is preserved
/// where the source strategy provides it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub titles: Vec<String>,
    pub jobs: Vec<JobRecord>,
    pub debug: ExtractionDebug,
}

impl ExtractionResult {
    /// Empty result carrying only diagnostics, used for failed calls.
    pub fn empty(debug: ExtractionDebug) -> Self {
        Self {
            titles: Vec::new(),
            jobs: Vec::new(),
            debug,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str) -> JobRecord {
        JobRecord::from_title(title)
    }

    #[test]
    fn test_fingerprint_prefers_id() {
        let mut a = record("Registered Nurse");
        a.id = Some("178687".to_string());
        let mut b = record("Registered Nurse II");
        b.id = Some("178687".to_string());
        // Same id overrides title drift.
        assert_eq!(fingerprint(&a), fingerprint(&b));
        assert_eq!(fingerprint(&a), "id:178687");
    }

    #[test]
    fn test_fingerprint_fallback_order() {
        let mut r = record("Data Engineer");
        assert_eq!(fingerprint(&r), "title:Data Engineer");

        r.posted_at = Some("2026-01-05".to_string());
        assert_eq!(fingerprint(&r), "title:Data Engineer|posted:2026-01-05");

        r.url = Some("https://example.com/job/42".to_string());
        assert_eq!(fingerprint(&r), "url:https://example.com/job/42");

        r.id = Some("42".to_string());
        assert_eq!(fingerprint(&r), "id:42");
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let mut r = record("Pharmacist");
        r.url = Some("https://example.com/job/7".to_string());
        assert_eq!(fingerprint(&r), fingerprint(&r.clone()));
    }

    #[test]
    fn test_fingerprint_ignores_empty_optionals() {
        let mut r = record("Surgical Technician");
        r.id = Some(String::new());
        r.url = Some(String::new());
        assert_eq!(fingerprint(&r), "title:Surgical Technician");
    }

    #[test]
    fn test_records_from_titles_preserves_order() {
        let titles = vec!["A Role".to_string(), "B Role".to_string()];
        let records = records_from_titles(&titles);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "A Role");
        assert_eq!(records[1].title, "B Role");
    }
}
