// Copyright 2026 Joblens Contributors
// SPDX-License-Identifier: Apache-2.0

//! Orchestrator: sequences extraction strategies with fallback.
//!
//! Linear state machine, no retries of the same strategy:
//!
//! 1. Direct search-results API — on ≥1 title, done, no browser at all.
//! 2. Launch browser, register the network miner, navigate, dismiss consent.
//! 3. Browser-driven DOM extraction across all frames.
//! 4. Everything the network miner accumulated.
//! 5. Vendor-specific DOM sweep (when the URL is on the vendor's domain).
//! 6. HTML snapshot of the final page — the always-terminates path.
//!
//! The first strategy yielding any classifier-approved titles wins; results
//! from different strategies are never merged. The browser session is
//! closed on every exit path, including errors.

use crate::acquisition::netwatch::NetworkMiner;
use crate::acquisition::shortcut::{self, MemoryOriginCache, OriginCache};
use crate::acquisition::{browser_dom, html, text_pattern};
use crate::classifier::{self, clean_and_filter_titles, looks_like_job_title};
use crate::config::{EngineConfig, USER_AGENT};
use crate::error::EngineError;
use crate::renderer::chromium::ChromiumEngine;
use crate::renderer::{BrowserEngine, BrowserSession, ResponseObserver};
use crate::types::{records_from_titles, ExtractionDebug, ExtractionResult, JobRecord};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Ordered trace of orchestration steps, mirrored to `tracing`.
struct Trace {
    lines: Vec<String>,
}

impl Trace {
    fn new() -> Self {
        Self { lines: Vec::new() }
    }

    fn log(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        info!("{msg}");
        self.lines.push(msg);
    }
}

/// Titles + records produced by whichever strategy won.
struct StrategyOutcome {
    titles: Vec<String>,
    jobs: Vec<JobRecord>,
}

impl StrategyOutcome {
    fn from_titles(titles: Vec<String>) -> Self {
        let jobs = records_from_titles(&titles);
        Self { titles, jobs }
    }
}

/// The job-listing extraction engine.
///
/// Holds no per-URL state; every [`Engine::extract`] call creates and tears
/// down its own browser session, so concurrent calls on different URLs are
/// safe and fully isolated. The only state shared across calls is the
/// advisory origin cache.
pub struct Engine {
    config: EngineConfig,
    browser: Arc<dyn BrowserEngine>,
    origin_cache: Arc<dyn OriginCache>,
    http: reqwest::Client,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Engine with configuration read from the environment.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::from_env())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_parts(
            config,
            Arc::new(ChromiumEngine),
            Arc::new(MemoryOriginCache::new()),
        )
    }

    /// Fully injected constructor, used by tests to swap the browser engine
    /// and the origin cache.
    pub fn with_parts(
        config: EngineConfig,
        browser: Arc<dyn BrowserEngine>,
        origin_cache: Arc<dyn OriginCache>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self {
            config,
            browser,
            origin_cache,
            http,
        }
    }

    /// Extract job titles and records from a job-search page URL.
    ///
    /// Never raises: every internal failure is captured into an empty
    /// result whose debug log and `blocked_hint` describe the failure.
    pub async fn extract(&self, url: &str) -> ExtractionResult {
        let mut trace = Trace::new();
        let mut debug = ExtractionDebug::default();
        trace.log(format!("starting extraction: {url}"));

        // Strategy 0: direct API shortcut — skips browser automation
        // entirely. An answered-but-empty result falls through: empty is
        // not proof the page has no postings.
        if let Some(origin) = shortcut::origin_of(url) {
            if self.origin_cache.contains(&origin) {
                trace.log("origin previously confirmed for the direct search api");
            }
        }
        match shortcut::try_search_results_api(&self.http, url, self.origin_cache.as_ref()).await {
            Some(titles) if !titles.is_empty() => {
                trace.log(format!("direct search api returned {} titles", titles.len()));
                let outcome = StrategyOutcome::from_titles(titles);
                debug.blocked_hint = Some("direct_api".to_string());
                debug.trace = trace.lines;
                return ExtractionResult {
                    titles: outcome.titles,
                    jobs: outcome.jobs,
                    debug,
                };
            }
            Some(_) => {
                trace.log("direct search api answered with no records, trying the browser path");
            }
            None => {}
        }

        let miner = Arc::new(NetworkMiner::new());
        match self
            .browser_extract(url, Arc::clone(&miner), &mut debug, &mut trace)
            .await
        {
            Ok(outcome) => {
                self.attach_miner_stats(&miner, &mut debug);
                trace.log(format!("returning {} titles", outcome.titles.len()));
                debug.trace = trace.lines;
                ExtractionResult {
                    titles: outcome.titles,
                    jobs: outcome.jobs,
                    debug,
                }
            }
            Err(err) => {
                warn!("extraction failed for {url}: {err}");
                self.attach_miner_stats(&miner, &mut debug);
                trace.log(format!("error: {err}"));
                debug.blocked_hint = Some(format!("browser_error: {err}"));
                debug.trace = trace.lines;
                ExtractionResult::empty(debug)
            }
        }
    }

    /// Convenience wrapper returning titles only.
    pub async fn extract_titles(&self, url: &str) -> Vec<String> {
        self.extract(url).await.titles
    }

    /// Launch the browser, run the fallback chain, and guarantee teardown
    /// on every exit path.
    async fn browser_extract(
        &self,
        url: &str,
        miner: Arc<NetworkMiner>,
        debug: &mut ExtractionDebug,
        trace: &mut Trace,
    ) -> Result<StrategyOutcome, EngineError> {
        trace.log("launching browser");
        let mut session = self
            .browser
            .launch(&self.config)
            .await
            .map_err(|e| EngineError::Launch(e.to_string()))?;

        let result = self
            .run_strategies(session.as_mut(), url, miner, debug, trace)
            .await;

        trace.log("closing browser");
        if let Err(e) = session.close().await {
            warn!("browser close failed: {e}");
            trace.log(format!("browser close failed: {e}"));
        }
        result
    }

    async fn run_strategies(
        &self,
        session: &mut dyn BrowserSession,
        url: &str,
        miner: Arc<NetworkMiner>,
        debug: &mut ExtractionDebug,
        trace: &mut Trace,
    ) -> Result<StrategyOutcome, EngineError> {
        let observer: Arc<dyn ResponseObserver> = miner.clone();
        let page = session
            .open_page(observer)
            .await
            .map_err(|e| EngineError::Launch(e.to_string()))?;

        trace.log("navigating");
        page.navigate(url, self.config.nav_timeout_ms)
            .await
            .map_err(|e| EngineError::Navigation(e.to_string()))?;
        trace.log("page loaded, waiting for network idle");
        page.wait_for_network_idle(self.config.nav_timeout_ms).await;

        if let Some(main) = page.frames().await.first() {
            if browser_dom::dismiss_consent(main.as_ref()).await {
                trace.log("consent dialog dismissed");
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }

        let final_url = page.current_url().await;
        debug.page_title = page.title().await;
        trace.log(format!("final url: {final_url}"));
        trace.log(format!(
            "page title: {}",
            debug.page_title.as_deref().unwrap_or("(none)")
        ));
        debug.final_url = Some(final_url);

        // Lazy-rendered listings: wait for a details CTA to show up, then a
        // fixed settle. Mined network responses may arrive during this
        // window, which is why the miner is read only afterwards.
        if page
            .wait_for_text(r"View\s+Details", self.config.cta_probe_timeout_ms)
            .await
        {
            trace.log("call-to-action text appeared");
        }
        tokio::time::sleep(Duration::from_millis(self.config.settle_ms)).await;

        let frames = page.frames().await;
        debug.frame_count = Some(frames.len());
        trace.log(format!("frames: {}", frames.len()));

        let cta_count = browser_dom::count_ctas(&frames).await;
        debug.cta_count = Some(cta_count);
        trace.log(format!("call-to-action elements: {cta_count}"));

        let mut stats = browser_dom::frame_stats(&frames).await;
        stats.truncate(10);
        debug.frame_stats = stats;

        // Strategy 1: browser-driven DOM extraction across all frames.
        let raw = browser_dom::collect_titles_across_frames(&frames).await;
        let titles = clean_and_filter_titles(raw);
        trace.log(format!("frame extraction: {} titles", titles.len()));
        if !titles.is_empty() {
            return Ok(StrategyOutcome::from_titles(titles));
        }

        // Strategy 2: whatever the network miner accumulated during load.
        let harvest = miner.harvest();
        for note in &harvest.notes {
            trace.log(note.clone());
        }
        let json_titles = clean_and_filter_titles(harvest.raw_titles.iter().map(String::as_str));
        trace.log(format!(
            "network mining: {} raw candidates, {} after filter",
            harvest.raw_titles.len(),
            json_titles.len()
        ));
        if !json_titles.is_empty() {
            // Prefer structured vendor records when the vendor walker
            // produced any; otherwise synthesize title-only records.
            let records: Vec<JobRecord> = harvest
                .records
                .iter()
                .filter(|r| looks_like_job_title(&r.title))
                .cloned()
                .collect();
            let jobs = if records.is_empty() {
                records_from_titles(&json_titles)
            } else {
                records
            };
            return Ok(StrategyOutcome {
                titles: json_titles,
                jobs,
            });
        }

        // Strategy 3: vendor candidate-experience pages render lazily;
        // scroll to force the list in, then sweep vendor-specific DOM.
        if is_vendor_host(url) {
            trace.log("vendor host detected: extra settle and lazy-load scroll");
            tokio::time::sleep(Duration::from_millis(self.config.vendor_settle_ms)).await;
            let frames = page.frames().await;
            if let Some(main) = frames.first() {
                let _ = main
                    .evaluate("window.scrollTo(0, document.body.scrollHeight)")
                    .await;
                tokio::time::sleep(Duration::from_millis(self.config.scroll_settle_ms)).await;
                let _ = main.evaluate("window.scrollTo(0, 0)").await;
                tokio::time::sleep(Duration::from_millis(self.config.post_scroll_settle_ms)).await;
            }
            let frames = page.frames().await;
            let titles =
                clean_and_filter_titles(browser_dom::collect_oracle_titles(&frames).await);
            trace.log(format!("vendor dom extraction: {} titles", titles.len()));
            if !titles.is_empty() {
                debug.blocked_hint = Some("vendor_dom".to_string());
                return Ok(StrategyOutcome::from_titles(titles));
            }
        }

        // Strategy 4: snapshot of the final markup — always terminates,
        // possibly with zero titles.
        trace.log("falling back to html snapshot extraction");
        let page_html = page.content().await.unwrap_or_default();
        if let Some(hint) = classifier::detect_blocked(&page_html) {
            debug.blocked_hint = Some(hint.to_string());
            trace.log(format!("blocked signature detected: {hint}"));
        }
        // scraper types are !Send, so the parse runs on the blocking pool.
        let raw = tokio::task::spawn_blocking(move || {
            let mut candidates = html::extract_titles(&page_html);
            candidates.extend(text_pattern::extract_titles(&page_html));
            candidates
        })
        .await
        .unwrap_or_default();
        let titles = clean_and_filter_titles(raw);
        trace.log(format!("html extraction: {} titles", titles.len()));
        Ok(StrategyOutcome::from_titles(titles))
    }

    fn attach_miner_stats(&self, miner: &NetworkMiner, debug: &mut ExtractionDebug) {
        let harvest = miner.harvest();
        debug.responses_scanned = harvest.responses_scanned;
        debug.response_samples = harvest.samples;
        debug.relevant_responses = harvest.relevant;
    }
}

/// The enterprise vendor hosts its candidate-experience pages on one domain.
fn is_vendor_host(url: &str) -> bool {
    url.to_ascii_lowercase().contains("oraclecloud.com")
}
