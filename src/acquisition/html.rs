//! Static HTML snapshot extractor.
//!
//! Runs an ordered list of CSS selectors over a parsed document, job-card
//! scoped title elements first, generic headings last, then two anchor
//! passes keyed on job-detail path segments. Returns raw candidates in
//! document order — the caller applies the classifier and cleanup.
//!
//! All entry points are synchronous because `scraper` types are `!Send`;
//! callers on the async runtime wrap in `tokio::task::spawn_blocking`.

use scraper::{ElementRef, Html, Selector};

/// Selectors tried in priority order: explicit title classes and attributes,
/// then card-scoped headings, then headings scoped to content landmarks,
/// then bare headings excluding nav/menu/header chrome.
const TITLE_SELECTORS: &[&str] = &[
    r#"[class*="job-title"]"#,
    r#"[class*="job_title"]"#,
    r#"[class*="position-title"]"#,
    r#"[class*="listing-title"]"#,
    r#"[class*="opening-title"]"#,
    r#"[class*="role-title"]"#,
    r#"[data-job-title]"#,
    r#"[class*="job-card"] h2"#,
    r#"[class*="job-card"] h3"#,
    r#"[class*="job-card"] h4"#,
    r#"[class*="job-card"] [class*="title"]"#,
    r#"[class*="job-card"] a"#,
    r#"[class*="position-card"] h2"#,
    r#"[class*="position-card"] h3"#,
    r#"[class*="listing-card"] h2"#,
    r#"[class*="listing-card"] h3"#,
    r#"[class*="job-listing"] h2"#,
    r#"[class*="job-listing"] h3"#,
    r#"[class*="job"] h2"#,
    r#"[class*="job"] h3"#,
    r#"[class*="position"] h2"#,
    r#"[class*="position"] h3"#,
    "article h2",
    "article h3",
    "main h2",
    "main h3",
    r#"h2:not([class*="nav"]):not([class*="menu"]):not([class*="header"])"#,
    r#"h3:not([class*="nav"]):not([class*="menu"]):not([class*="header"])"#,
];

/// Class/id/aria-label substrings marking promoted listings shown outside
/// the main result list. Anchors under these are skipped to avoid
/// double-counting.
const EXCLUDED_SECTION_KEYWORDS: &[&str] = &[
    "featured",
    "recommended",
    "highlighted",
    "spotlight",
    "similar-jobs",
    "related-jobs",
];

/// Extract raw title candidates from a static HTML document.
pub fn extract_titles(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut titles = Vec::new();

    for sel_str in TITLE_SELECTORS {
        if let Ok(sel) = Selector::parse(sel_str) {
            for el in document.select(&sel) {
                titles.push(element_text(&el));
            }
        }
    }

    // Job-detail links carry the title as their text. Prefer singular
    // /job/123 detail pages over /jobs/category pages, and skip promoted
    // sections.
    if let Ok(sel) = Selector::parse(r#"a[href*="/job/"]"#) {
        for el in document.select(&sel) {
            let href = el.value().attr("href").unwrap_or("");
            if href.contains("/jobs/") {
                continue; // category link, not a job detail
            }
            if inside_excluded_section(&el) {
                continue;
            }
            titles.push(element_text(&el));
        }
    }

    // Looser anchor patterns, no section exclusion.
    if let Ok(sel) =
        Selector::parse(r#"a[href*="/jobs/"], a[href*="/position/"], a[href*="/openings/"]"#)
    {
        for el in document.select(&sel) {
            titles.push(element_text(&el));
        }
    }

    titles.retain(|t| !t.is_empty());
    titles
}

fn element_text(el: &ElementRef) -> String {
    let text: String = el.text().collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn inside_excluded_section(el: &ElementRef) -> bool {
    for node in el.ancestors() {
        let Some(ancestor) = ElementRef::wrap(node) else {
            continue;
        };
        let v = ancestor.value();
        let mut combined = String::new();
        for attr in ["class", "id", "aria-label"] {
            if let Some(value) = v.attr(attr) {
                combined.push_str(value);
                combined.push(' ');
            }
        }
        let lower = combined.to_ascii_lowercase();
        if EXCLUDED_SECTION_KEYWORDS.iter().any(|k| lower.contains(k)) {
            return true;
        }
    }
    false
}
