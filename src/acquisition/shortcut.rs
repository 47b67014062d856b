//! Direct search-results API shortcut.
//!
//! Several hosted job-search frontends expose their results through a JSON
//! endpoint on the same origin:
//!
//! ```text
//! search page:  <origin>/search/searchjobs?...
//! results API:  <origin>/Search/SearchResults?...&jtStartIndex=0&jtPageSize=50
//! ```
//!
//! When the page URL matches that shape, a single direct request replaces
//! the whole browser session. Any failure — network error, non-success
//! status, malformed JSON — reports no result so the orchestrator falls
//! through to the browser-driven path.

use crate::classifier::clean_and_filter_titles;
use dashmap::DashSet;
use serde::Deserialize;
use url::Url;

/// Advisory cache of origins confirmed to answer the results API.
///
/// Purely an optimization hint: losing it (or swapping in
/// [`NoopOriginCache`]) must never affect which results come back, only the
/// telemetry about which strategy was expected to work.
pub trait OriginCache: Send + Sync {
    fn contains(&self, origin: &str) -> bool;
    fn insert(&self, origin: &str);
}

/// Process-wide in-memory cache, no eviction, no persistence.
#[derive(Default)]
pub struct MemoryOriginCache {
    origins: DashSet<String>,
}

impl MemoryOriginCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OriginCache for MemoryOriginCache {
    fn contains(&self, origin: &str) -> bool {
        self.origins.contains(origin)
    }
    fn insert(&self, origin: &str) {
        self.origins.insert(origin.to_string());
    }
}

/// Cache that remembers nothing; correctness must not depend on the cache.
pub struct NoopOriginCache;

impl OriginCache for NoopOriginCache {
    fn contains(&self, _origin: &str) -> bool {
        false
    }
    fn insert(&self, _origin: &str) {}
}

#[derive(Debug, Deserialize)]
struct SearchResultsPayload {
    #[serde(rename = "Records", default)]
    records: Vec<SearchResultRecord>,
}

#[derive(Debug, Deserialize)]
struct SearchResultRecord {
    #[serde(rename = "Title", default)]
    title: Option<String>,
}

/// Origin (`scheme://host[:port]`) of a URL, for cache keys and trace lines.
pub fn origin_of(url: &str) -> Option<String> {
    let u = Url::parse(url).ok()?;
    Some(u.origin().ascii_serialization())
}

/// Build the results-API URL for a matching search page URL, forwarding the
/// original query parameters and forcing first-page pagination.
fn results_api_url(page_url: &str) -> Option<Url> {
    let page = Url::parse(page_url).ok()?;
    if !page.path().to_ascii_lowercase().contains("/search/searchjobs") {
        return None;
    }
    let mut api = page.join("/Search/SearchResults").ok()?;
    api.set_query(None);
    {
        let mut pairs = api.query_pairs_mut();
        for (k, v) in page.query_pairs() {
            if k == "jtStartIndex" || k == "jtPageSize" {
                continue;
            }
            pairs.append_pair(&k, &v);
        }
        pairs.append_pair("jtStartIndex", "0");
        pairs.append_pair("jtPageSize", "50");
    }
    Some(api)
}

/// Try the direct results API for a search-page URL.
///
/// Returns `None` when the URL does not match the shortcut shape or the
/// request failed in any way; `Some(titles)` when the API answered (the
/// list may be empty — the caller decides whether that short-circuits).
/// A non-empty answer records the origin in the cache.
pub async fn try_search_results_api(
    client: &reqwest::Client,
    url: &str,
    cache: &dyn OriginCache,
) -> Option<Vec<String>> {
    let api = results_api_url(url)?;
    let origin = origin_of(url)?;

    let response = client
        .get(api)
        .header(reqwest::header::ACCEPT, "application/json,text/plain,*/*")
        .send()
        .await
        .ok()?;
    if !response.status().is_success() {
        return None;
    }
    let payload: SearchResultsPayload = response.json().await.ok()?;

    let titles = clean_and_filter_titles(payload.records.into_iter().filter_map(|r| r.title));
    if !titles.is_empty() {
        cache.insert(&origin);
    }
    Some(titles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> reqwest::Client {
        reqwest::Client::builder()
            .user_agent(crate::config::USER_AGENT)
            .build()
            .unwrap()
    }

    #[test]
    fn test_api_url_shape() {
        let api =
            results_api_url("https://jobs.example.com/search/searchjobs?q=nurse&loc=TX").unwrap();
        assert_eq!(api.path(), "/Search/SearchResults");
        let query = api.query().unwrap();
        assert!(query.contains("q=nurse"));
        assert!(query.contains("loc=TX"));
        assert!(query.contains("jtStartIndex=0"));
        assert!(query.contains("jtPageSize=50"));
    }

    #[test]
    fn test_pagination_params_forced_not_duplicated() {
        let api = results_api_url(
            "https://jobs.example.com/Search/SearchJobs?q=rn&jtStartIndex=40&jtPageSize=10",
        )
        .unwrap();
        let query = api.query().unwrap();
        assert_eq!(query.matches("jtStartIndex").count(), 1);
        assert!(query.contains("jtStartIndex=0"));
        assert!(query.contains("jtPageSize=50"));
    }

    #[test]
    fn test_non_matching_url_is_skipped() {
        assert!(results_api_url("https://jobs.example.com/careers").is_none());
        assert!(results_api_url("not a url").is_none());
    }

    #[tokio::test]
    async fn test_successful_lookup_records_origin() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Search/SearchResults"))
            .and(query_param("jtPageSize", "50"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Records": [
                    { "Title": "Registered Nurse" },
                    { "Title": "Search Jobs" },
                    { "Title": "Registered Nurse" }
                ]
            })))
            .mount(&server)
            .await;

        let cache = MemoryOriginCache::new();
        let page = format!("{}/search/searchjobs?q=nurse", server.uri());
        let titles = try_search_results_api(&client(), &page, &cache)
            .await
            .unwrap();
        // Noise filtered, duplicates kept.
        assert_eq!(titles, vec!["Registered Nurse", "Registered Nurse"]);
        assert!(cache.contains(&origin_of(&page).unwrap()));
    }

    #[tokio::test]
    async fn test_empty_answer_does_not_record_origin() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Search/SearchResults"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "Records": [] })),
            )
            .mount(&server)
            .await;

        let cache = MemoryOriginCache::new();
        let page = format!("{}/search/searchjobs?q=none", server.uri());
        let titles = try_search_results_api(&client(), &page, &cache)
            .await
            .unwrap();
        assert!(titles.is_empty());
        assert!(!cache.contains(&origin_of(&page).unwrap()));
    }

    #[tokio::test]
    async fn test_http_error_reports_no_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Search/SearchResults"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let page = format!("{}/search/searchjobs?q=nurse", server.uri());
        let result = try_search_results_api(&client(), &page, &NoopOriginCache).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_malformed_json_reports_no_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Search/SearchResults"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
            .mount(&server)
            .await;

        let page = format!("{}/search/searchjobs?q=nurse", server.uri());
        let result = try_search_results_api(&client(), &page, &NoopOriginCache).await;
        assert!(result.is_none());
    }
}
