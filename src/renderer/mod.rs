//! Renderer abstraction for browser-driven extraction.
//!
//! The extraction heuristics never touch a browser API directly: they run
//! against [`FrameHandle`]s, which expose script evaluation and a URL and
//! nothing else. That keeps the heuristics testable against fake frames,
//! and confines the engine-specific plumbing (currently Chromium via
//! chromiumoxide) to one module.

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::EngineConfig;

/// Observer for network responses captured during page load. Registered
/// before navigation; responses may keep arriving after the navigation
/// future resolves.
pub trait ResponseObserver: Send + Sync {
    /// Record response metadata. Return `true` when the body should be
    /// fetched and delivered to [`ResponseObserver::on_body`] — body
    /// retrieval is skipped entirely for irrelevant responses.
    fn on_response(&self, url: &str, content_type: &str) -> bool;

    /// Deliver a fetched response body.
    fn on_body(&self, url: &str, content_type: &str, body: &str);
}

/// A browser engine that can launch isolated sessions.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Launch a browser process for one extraction call.
    async fn launch(&self, config: &EngineConfig) -> Result<Box<dyn BrowserSession>>;
}

/// One launched browser, scoped exclusively to a single extraction call.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Open the session's single page: realistic user agent, fixed
    /// viewport, automation-fingerprint masking, and the response observer
    /// wired up before any navigation.
    async fn open_page(&mut self, observer: Arc<dyn ResponseObserver>)
        -> Result<Arc<dyn PageHandle>>;

    /// Tear the session down (page, then browser). Must be called on every
    /// exit path — a leaked browser process has no other mitigation.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// The one page opened in a session.
#[async_trait]
pub trait PageHandle: Send + Sync {
    /// Navigate and wait for DOM content load, bounded by `timeout_ms`.
    async fn navigate(&self, url: &str, timeout_ms: u64) -> Result<()>;

    /// Best-effort wait for network quiet; timing out is not an error.
    async fn wait_for_network_idle(&self, timeout_ms: u64);

    /// Best-effort wait for text matching a JS regex source to appear in
    /// the page. Returns whether it appeared within the timeout.
    async fn wait_for_text(&self, js_regex: &str, timeout_ms: u64) -> bool;

    /// Current URL after redirects.
    async fn current_url(&self) -> String;

    /// Rendered page title, if any.
    async fn title(&self) -> Option<String>;

    /// All frames, main frame first. Frames that cannot be enumerated are
    /// simply absent.
    async fn frames(&self) -> Vec<Arc<dyn FrameHandle>>;

    /// Full HTML of the final rendered page.
    async fn content(&self) -> Result<String>;
}

/// A single frame (main or nested) exposed to the extraction heuristics.
#[async_trait]
pub trait FrameHandle: Send + Sync {
    /// Frame URL as last observed.
    fn url(&self) -> String;

    /// Evaluate a script expression in the frame and return its
    /// JSON-serialized result. Cross-origin evaluation failures surface as
    /// errors and must be treated as "no contribution from this frame".
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;
}
