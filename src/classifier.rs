//! Text/noise classifier: decides whether a text fragment is a plausible job
//! title or navigation/legal/marketing chatter.
//!
//! This is the single point of truth for "is this string worth keeping".
//! Every extraction strategy routes its candidates through
//! [`clean_and_filter_titles`] before they can appear in a result. Pure
//! functions, no I/O, deterministic.

use scraper::Html;

/// Phrases to exclude: navigation, footer, buttons, categories, cookie text.
/// Matched against the normalized candidate as an exact phrase, or as a
/// leading/trailing phrase.
const BLOCKLIST: &[&str] = &[
    "opens in a new tab",
    "search jobs",
    "already applied",
    "current employee",
    "be more at",
    "view details and apply", // button text, not a job title
    "here",
    "job id:",
    "employment type:",
    "location:",
    "back to",
    "sign in",
    "create account",
    "careers home",
    "job search",
    "benefits",
    "about us",
    "filter results",
    "open jobs",
    "talent community",
    "we use cookies",
    "cookie list",
    "digital privacy policy",
    "disclaimer",
    "terms of use",
    "accept our",
    "give you the best website",
    "by using our site",
    "create your candidate profile",
];

/// Longer cookie/legal phrases rejected anywhere in the text. These never
/// occur as substrings of real job titles.
const CONTAINS_BLOCKLIST: &[&str] = &[
    "we use cookies",
    "digital privacy policy",
    "terms of use",
    "by using our site",
    "give you the best website",
    "cookie list",
];

/// Signature keywords indicating the page served an anti-bot challenge
/// instead of content.
pub fn detect_blocked(content: &str) -> Option<&'static str> {
    let lower = content.to_lowercase();
    if lower.contains("access denied") || lower.contains("request blocked") {
        return Some("access_denied");
    }
    if lower.contains("captcha") || lower.contains("are you human") {
        return Some("captcha");
    }
    if lower.contains("robot") || lower.contains("automated") {
        return Some("bot_check");
    }
    None
}

/// Strip markup from a candidate and collapse internal whitespace.
///
/// Candidates arriving from JSON payloads or innerText are usually plain
/// already; only strings that look like markup pay for a fragment parse.
pub fn strip_html(input: &str) -> String {
    let s = input.trim();
    if s.is_empty() {
        return String::new();
    }
    if s.contains('<') && s.contains('>') {
        let fragment = Html::parse_fragment(s);
        let text: String = fragment.root_element().text().collect();
        return collapse_whitespace(&text);
    }
    collapse_whitespace(s)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// True when the text matches the phrase blocklist after normalization
/// (lowercase, leading/trailing bullet and dash characters trimmed).
pub fn is_blocklisted(text: &str) -> bool {
    let lower = text.to_lowercase();
    let lower = lower
        .trim()
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, '•' | '·' | '-' | '*'))
        .trim();

    if BLOCKLIST.iter().any(|b| phrase_match(lower, b)) {
        return true;
    }
    if CONTAINS_BLOCKLIST.iter().any(|b| lower.contains(b)) {
        return true;
    }
    // Page/category title pattern: "X Jobs at Y at Z".
    if has_jobs_at(lower) && lower.matches(" at ").count() >= 2 {
        return true;
    }
    // Very short single words are nav chrome, not titles.
    let words = lower.split_whitespace().count();
    if words == 1 && text.trim().chars().count() < 4 {
        return true;
    }
    false
}

/// Exact match, or phrase at start ("phrase ...") or end ("... phrase").
fn phrase_match(text: &str, phrase: &str) -> bool {
    if text == phrase {
        return true;
    }
    if text.len() > phrase.len() {
        if text.starts_with(phrase) && text.as_bytes()[phrase.len()] == b' ' {
            return true;
        }
        if text.ends_with(phrase) && text.as_bytes()[text.len() - phrase.len() - 1] == b' ' {
            return true;
        }
    }
    false
}

/// "jobs at " preceded by a word boundary.
fn has_jobs_at(text: &str) -> bool {
    let mut start = 0;
    while let Some(pos) = text[start..].find("jobs at ") {
        let abs = start + pos;
        if abs == 0 || !text.as_bytes()[abs - 1].is_ascii_alphanumeric() {
            return true;
        }
        start = abs + 1;
    }
    false
}

/// Decide whether a text fragment is a plausible job title.
///
/// Single words must be at least 4 characters (allows "Nurse", rejects
/// "FAQ"); multi-word texts at least 8 characters total (allows
/// "Nurse Manager"); everything over 250 characters is paragraph text.
pub fn looks_like_job_title(text: &str) -> bool {
    let t = text.trim();
    if t.is_empty() {
        return false;
    }
    let len = t.chars().count();
    if len > 250 {
        return false;
    }
    let words = t.split_whitespace().count();
    if words == 1 {
        return len >= 4 && !is_blocklisted(t);
    }
    len >= 8 && !is_blocklisted(t)
}

/// Shared post-processing for every extraction strategy: strip markup,
/// drop empties and noise, keep the rest in original order.
///
/// No deduplication — repeated titles across different postings are
/// legitimate.
pub fn clean_and_filter_titles<I>(titles: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut out = Vec::new();
    for t in titles {
        let cleaned = strip_html(t.as_ref());
        if cleaned.is_empty() {
            continue;
        }
        if !looks_like_job_title(&cleaned) {
            continue;
        }
        out.push(cleaned);
    }
    out
}
