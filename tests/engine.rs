//! End-to-end orchestration tests against a fake browser engine.
//!
//! The fakes exercise the engine's contract without a real browser: the
//! fallback order between strategies, the shortcut-empty fall-through, the
//! error taxonomy, and the close-exactly-once teardown guarantee on every
//! exit path.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use joblens::acquisition::shortcut::{MemoryOriginCache, NoopOriginCache};
use joblens::config::EngineConfig;
use joblens::renderer::{
    BrowserEngine, BrowserSession, FrameHandle, PageHandle, ResponseObserver,
};
use joblens::Engine;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Canned behavior for one fake browser run, plus launch/close counters.
#[derive(Default)]
struct FakeBehavior {
    launch_fails: bool,
    navigate_fails: bool,
    /// Titles the DOM sweep returns.
    dom_titles: Vec<String>,
    /// Titles the vendor DOM sweep returns.
    vendor_titles: Vec<String>,
    /// Network responses replayed to the observer during navigation:
    /// (url, content type, body).
    responses: Vec<(String, String, String)>,
    /// Final page HTML for the snapshot fallback.
    html: String,
    launches: AtomicUsize,
    closes: AtomicUsize,
}

struct FakeBrowser {
    behavior: Arc<FakeBehavior>,
}

#[async_trait]
impl BrowserEngine for FakeBrowser {
    async fn launch(&self, _config: &EngineConfig) -> Result<Box<dyn BrowserSession>> {
        if self.behavior.launch_fails {
            return Err(anyhow!("chromium not found"));
        }
        self.behavior.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            behavior: Arc::clone(&self.behavior),
        }))
    }
}

struct FakeSession {
    behavior: Arc<FakeBehavior>,
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn open_page(
        &mut self,
        observer: Arc<dyn ResponseObserver>,
    ) -> Result<Arc<dyn PageHandle>> {
        Ok(Arc::new(FakePage {
            behavior: Arc::clone(&self.behavior),
            observer,
        }))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.behavior.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakePage {
    behavior: Arc<FakeBehavior>,
    observer: Arc<dyn ResponseObserver>,
}

#[async_trait]
impl PageHandle for FakePage {
    async fn navigate(&self, _url: &str, _timeout_ms: u64) -> Result<()> {
        if self.behavior.navigate_fails {
            return Err(anyhow!("net::ERR_TIMED_OUT"));
        }
        // Replay canned network traffic through the registered observer,
        // the way responses arrive during a real page load.
        for (url, content_type, body) in &self.behavior.responses {
            if self.observer.on_response(url, content_type) {
                self.observer.on_body(url, content_type, body);
            }
        }
        Ok(())
    }

    async fn wait_for_network_idle(&self, _timeout_ms: u64) {}

    async fn wait_for_text(&self, _js_regex: &str, _timeout_ms: u64) -> bool {
        false
    }

    async fn current_url(&self) -> String {
        "https://jobs.example.com/final".to_string()
    }

    async fn title(&self) -> Option<String> {
        Some("Careers".to_string())
    }

    async fn frames(&self) -> Vec<Arc<dyn FrameHandle>> {
        vec![Arc::new(FakeFrame {
            behavior: Arc::clone(&self.behavior),
        })]
    }

    async fn content(&self) -> Result<String> {
        Ok(self.behavior.html.clone())
    }
}

struct FakeFrame {
    behavior: Arc<FakeBehavior>,
}

#[async_trait]
impl FrameHandle for FakeFrame {
    fn url(&self) -> String {
        "https://jobs.example.com/final".to_string()
    }

    /// Dispatch on distinctive tokens of the embedded scripts.
    async fn evaluate(&self, script: &str) -> Result<Value> {
        if script.contains("linkTitles") {
            return Ok(json!(self.behavior.dom_titles));
        }
        if script.contains("data-automation-id") {
            return Ok(json!(self.behavior.vendor_titles));
        }
        if script.contains("headings") {
            return Ok(json!({ "ctas": 2, "headings": ["Open Positions"] }));
        }
        if script.contains("let count") {
            return Ok(json!(2));
        }
        if script.contains("LABELS") {
            return Ok(json!(false)); // no consent dialog
        }
        Ok(Value::Null) // scrolls etc.
    }
}

fn fast_config() -> EngineConfig {
    EngineConfig {
        settle_ms: 0,
        cta_probe_timeout_ms: 1,
        vendor_settle_ms: 0,
        scroll_settle_ms: 0,
        post_scroll_settle_ms: 0,
        ..Default::default()
    }
}

fn engine_with(behavior: Arc<FakeBehavior>) -> Engine {
    Engine::with_parts(
        fast_config(),
        Arc::new(FakeBrowser { behavior }),
        Arc::new(NoopOriginCache),
    )
}

#[tokio::test]
async fn frame_extraction_wins_and_browser_closes_once() {
    let behavior = Arc::new(FakeBehavior {
        dom_titles: vec!["Registered Nurse".to_string(), "Pharmacist".to_string()],
        responses: vec![(
            "https://jobs.example.com/api/search".to_string(),
            "application/json".to_string(),
            json!({ "results": [{ "jobTitle": "From The Miner", "jobId": 12345 }] }).to_string(),
        )],
        ..Default::default()
    });
    let engine = engine_with(Arc::clone(&behavior));

    let result = engine.extract("https://jobs.example.com/careers").await;

    // First strategy that yields wins; miner results are not merged in.
    assert_eq!(result.titles, vec!["Registered Nurse", "Pharmacist"]);
    assert_eq!(result.jobs.len(), 2);
    assert_eq!(result.jobs[0].title, "Registered Nurse");
    assert_eq!(behavior.closes.load(Ordering::SeqCst), 1);

    // Diagnostics reflect the run.
    assert_eq!(result.debug.frame_count, Some(1));
    assert_eq!(result.debug.cta_count, Some(2));
    assert_eq!(
        result.debug.final_url.as_deref(),
        Some("https://jobs.example.com/final")
    );
    assert!(result.debug.responses_scanned >= 1);
    assert!(!result.debug.trace.is_empty());
}

#[tokio::test]
async fn miner_results_used_when_dom_is_empty() {
    let body = json!({
        "items": [{
            "requisitionList": {
                "items": [
                    { "RequisitionTitle": "Registered Nurse", "RequisitionId": "178687" },
                    { "RequisitionTitle": "Respiratory Therapist", "RequisitionId": "178901" }
                ]
            }
        }]
    })
    .to_string();
    let behavior = Arc::new(FakeBehavior {
        responses: vec![(
            "https://host.oraclecloud.com/hcmRestApi/resources/latest/recruitingCEJobRequisitions"
                .to_string(),
            "application/vnd.oracle.adf.resourcecollection+json".to_string(),
            body,
        )],
        ..Default::default()
    });
    let engine = engine_with(Arc::clone(&behavior));

    let result = engine.extract("https://jobs.example.com/careers").await;

    assert_eq!(
        result.titles,
        vec!["Registered Nurse", "Respiratory Therapist"]
    );
    // Structured vendor records preferred over synthesized ones.
    assert_eq!(result.jobs[0].id.as_deref(), Some("178687"));
    assert_eq!(result.jobs[1].id.as_deref(), Some("178901"));
    assert_eq!(behavior.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn vendor_dom_sweep_runs_for_vendor_urls() {
    let behavior = Arc::new(FakeBehavior {
        vendor_titles: vec!["Clinical Dietitian".to_string()],
        ..Default::default()
    });
    let engine = engine_with(Arc::clone(&behavior));

    let result = engine
        .extract("https://acme.fa.us2.oraclecloud.com/hcmUI/CandidateExperience/en/sites/CX")
        .await;

    assert_eq!(result.titles, vec!["Clinical Dietitian"]);
    assert_eq!(result.debug.blocked_hint.as_deref(), Some("vendor_dom"));
    assert_eq!(behavior.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn html_snapshot_is_the_terminal_fallback() {
    let behavior = Arc::new(FakeBehavior {
        html: r#"<html><body>
            <a href="/job/1/unit-secretary">Unit Secretary</a>
            <a href="/job/2/lab-assistant">Lab Assistant</a>
        </body></html>"#
            .to_string(),
        ..Default::default()
    });
    let engine = engine_with(Arc::clone(&behavior));

    let result = engine.extract("https://jobs.example.com/careers").await;

    assert_eq!(result.titles, vec!["Unit Secretary", "Lab Assistant"]);
    assert_eq!(behavior.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn blocked_page_yields_empty_result_with_hint() {
    let behavior = Arc::new(FakeBehavior {
        html: "<html><body>Access Denied: request blocked</body></html>".to_string(),
        ..Default::default()
    });
    let engine = engine_with(Arc::clone(&behavior));

    let result = engine.extract("https://jobs.example.com/careers").await;

    assert!(result.titles.is_empty());
    assert_eq!(result.debug.blocked_hint.as_deref(), Some("access_denied"));
    assert_eq!(behavior.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn launch_failure_is_fatal_but_contained() {
    let behavior = Arc::new(FakeBehavior {
        launch_fails: true,
        ..Default::default()
    });
    let engine = engine_with(Arc::clone(&behavior));

    let result = engine.extract("https://jobs.example.com/careers").await;

    assert!(result.titles.is_empty());
    assert!(result.jobs.is_empty());
    let hint = result.debug.blocked_hint.unwrap();
    assert!(hint.starts_with("browser_error: launch:"), "hint: {hint}");
    // Nothing launched, nothing to close.
    assert_eq!(behavior.launches.load(Ordering::SeqCst), 0);
    assert_eq!(behavior.closes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn navigation_failure_still_closes_the_browser() {
    let behavior = Arc::new(FakeBehavior {
        navigate_fails: true,
        ..Default::default()
    });
    let engine = engine_with(Arc::clone(&behavior));

    let result = engine.extract("https://jobs.example.com/careers").await;

    assert!(result.titles.is_empty());
    let hint = result.debug.blocked_hint.unwrap();
    assert!(
        hint.starts_with("browser_error: navigation:"),
        "hint: {hint}"
    );
    assert_eq!(behavior.launches.load(Ordering::SeqCst), 1);
    assert_eq!(behavior.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn direct_api_success_skips_the_browser() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Search/SearchResults"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Records": [ { "Title": "Registered Nurse" }, { "Title": "Pharmacist" } ]
        })))
        .mount(&server)
        .await;

    let behavior = Arc::new(FakeBehavior {
        dom_titles: vec!["Should Never Appear".to_string()],
        ..Default::default()
    });
    let engine = Engine::with_parts(
        fast_config(),
        Arc::new(FakeBrowser {
            behavior: Arc::clone(&behavior),
        }),
        Arc::new(MemoryOriginCache::new()),
    );

    let url = format!("{}/search/searchjobs?q=nurse", server.uri());
    let result = engine.extract(&url).await;

    assert_eq!(result.titles, vec!["Registered Nurse", "Pharmacist"]);
    assert_eq!(result.debug.blocked_hint.as_deref(), Some("direct_api"));
    assert_eq!(behavior.launches.load(Ordering::SeqCst), 0);
    assert_eq!(behavior.closes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_direct_api_answer_falls_through_to_browser() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Search/SearchResults"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Records": [] })))
        .mount(&server)
        .await;

    let behavior = Arc::new(FakeBehavior {
        dom_titles: vec!["Surgical Technologist".to_string()],
        ..Default::default()
    });
    let engine = engine_with(Arc::clone(&behavior));

    let url = format!("{}/search/searchjobs?q=nobody", server.uri());
    let result = engine.extract(&url).await;

    // An answered-but-empty shortcut must not short-circuit the call.
    assert_eq!(result.titles, vec!["Surgical Technologist"]);
    assert_eq!(behavior.launches.load(Ordering::SeqCst), 1);
    assert_eq!(behavior.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn origin_cache_is_only_an_optimization() {
    // Identical runs with a real cache and a no-op cache must produce
    // identical results.
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Search/SearchResults"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Records": [ { "Title": "Registered Nurse" } ]
        })))
        .mount(&server)
        .await;
    let url = format!("{}/search/searchjobs?q=rn", server.uri());

    let with_cache = Engine::with_parts(
        fast_config(),
        Arc::new(FakeBrowser {
            behavior: Arc::new(FakeBehavior::default()),
        }),
        Arc::new(MemoryOriginCache::new()),
    );
    let without_cache = Engine::with_parts(
        fast_config(),
        Arc::new(FakeBrowser {
            behavior: Arc::new(FakeBehavior::default()),
        }),
        Arc::new(NoopOriginCache),
    );

    let a = with_cache.extract(&url).await;
    let b = without_cache.extract(&url).await;
    assert_eq!(a.titles, b.titles);

    // Second call with the warm cache: same answer again.
    let c = with_cache.extract(&url).await;
    assert_eq!(a.titles, c.titles);
}

#[tokio::test]
async fn every_emitted_title_passes_the_classifier() {
    let behavior = Arc::new(FakeBehavior {
        dom_titles: vec![
            "Registered Nurse".to_string(),
            "Search Jobs".to_string(), // nav chrome, must be filtered
            "We use cookies to give you the best website experience".to_string(),
        ],
        ..Default::default()
    });
    let engine = engine_with(behavior);

    let result = engine.extract("https://jobs.example.com/careers").await;
    assert_eq!(result.titles, vec!["Registered Nurse"]);
    assert!(result
        .titles
        .iter()
        .all(|t| joblens::classifier::looks_like_job_title(t)));
}
