//! Chromium-based renderer using chromiumoxide.
//!
//! One launched browser per extraction call, one page per browser. The page
//! is opened with a realistic user agent, a fixed viewport, and an
//! automation-masking init script; network responses are streamed to the
//! registered [`ResponseObserver`] from the moment the page exists, so
//! nothing fired during navigation is missed.
//!
//! Child frames are enumerated through `Page.getFrameTree` and evaluated in
//! isolated worlds. Out-of-process (cross-origin) frames are not reachable
//! from this CDP session — their evaluation errors are surfaced to the
//! caller, which treats them as "no contribution from this frame".

use crate::config::{EngineConfig, ProxyConfig, USER_AGENT};
use crate::renderer::{BrowserEngine, BrowserSession, FrameHandle, PageHandle, ResponseObserver};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::fetch;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams as NetworkEnableParams, EventResponseReceived, GetResponseBodyParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, CreateIsolatedWorldParams, FrameId, FrameTree,
    GetFrameTreeParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Masks the most common automation fingerprints before any site script runs.
const STEALTH_JS: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
window.chrome = window.chrome || { runtime: {} };
"#;

/// Find the Chromium binary path.
pub fn find_chromium(config: &EngineConfig) -> Option<PathBuf> {
    // 1. Explicit override
    if let Some(path) = &config.chromium_path {
        if path.exists() {
            return Some(path.clone());
        }
    }

    // 2. Serverless images ship the binary at a fixed location
    if config.serverless {
        for candidate in ["/opt/chromium/chrome", "/opt/chrome/chrome", "/usr/bin/chromium"] {
            let path = PathBuf::from(candidate);
            if path.exists() {
                return Some(path);
            }
        }
    }

    // 3. ~/.joblens/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".joblens/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".joblens/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".joblens/chromium/chrome-linux64/chrome"),
                home.join(".joblens/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 4. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 5. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Launches headless Chromium instances.
pub struct ChromiumEngine;

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn launch(&self, config: &EngineConfig) -> Result<Box<dyn BrowserSession>> {
        let chrome_path = find_chromium(config)
            .context("Chromium not found; set JOBLENS_CHROMIUM_PATH or install a browser")?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .viewport(Some(Viewport {
                width: 1280,
                height: 800,
                device_scale_factor: Some(1.0),
                ..Default::default()
            }))
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--lang=en-US")
            .arg(format!("--user-agent={USER_AGENT}"));

        if config.serverless {
            builder = builder.arg("--single-process").arg("--no-zygote");
        }
        if let Some(proxy) = &config.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy.server));
        }

        let browser_config = builder
            .build()
            .map_err(|e| anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .context("failed to launch Chromium")?;

        // Drain CDP events for the lifetime of the session.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok(Box::new(ChromiumSession {
            browser,
            handler_task,
            proxy: config.proxy.clone(),
            page: None,
            aux_tasks: Vec::new(),
        }))
    }
}

/// One launched browser and its single page.
pub struct ChromiumSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    proxy: Option<ProxyConfig>,
    page: Option<Page>,
    aux_tasks: Vec<JoinHandle<()>>,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn open_page(
        &mut self,
        observer: Arc<dyn ResponseObserver>,
    ) -> Result<Arc<dyn PageHandle>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to create page")?;

        // Fingerprint masking must be installed before any navigation.
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_JS))
            .await
            .ok();
        page.execute(NetworkEnableParams::default())
            .await
            .context("failed to enable network domain")?;

        if let Some(proxy) = self.proxy.clone() {
            if proxy.username.is_some() {
                let tasks = spawn_proxy_auth(&page, proxy).await?;
                self.aux_tasks.extend(tasks);
            }
        }

        let last_activity = Arc::new(Mutex::new(Instant::now()));

        // Response listener: registered before navigation so nothing fired
        // during page load is missed. Bodies are fetched only for responses
        // the observer wants.
        let mut events = page
            .event_listener::<EventResponseReceived>()
            .await
            .context("failed to subscribe to network responses")?;
        let body_page = page.clone();
        let last = Arc::clone(&last_activity);
        let listener = tokio::spawn(async move {
            while let Some(ev) = events.next().await {
                *last.lock().expect("activity lock") = Instant::now();
                let url = ev.response.url.clone();
                let content_type = ev.response.mime_type.clone();
                if !observer.on_response(&url, &content_type) {
                    continue;
                }
                match body_page
                    .execute(GetResponseBodyParams::new(ev.request_id.clone()))
                    .await
                {
                    Ok(body) => {
                        let text = if body.base64_encoded {
                            BASE64
                                .decode(body.body.as_bytes())
                                .ok()
                                .and_then(|raw| String::from_utf8(raw).ok())
                                .unwrap_or_default()
                        } else {
                            body.body.clone()
                        };
                        if !text.is_empty() {
                            observer.on_body(&url, &content_type, &text);
                        }
                    }
                    Err(e) => debug!("response body unavailable for {url}: {e}"),
                }
            }
        });
        self.aux_tasks.push(listener);

        self.page = Some(page.clone());
        Ok(Arc::new(ChromiumPage {
            page,
            last_activity,
        }))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let ChromiumSession {
            mut browser,
            handler_task,
            proxy: _,
            page,
            aux_tasks,
        } = *self;

        for task in aux_tasks {
            task.abort();
        }
        if let Some(page) = page {
            let _ = page.close().await;
        }
        if let Err(e) = browser.close().await {
            warn!("browser close failed: {e}");
        }
        handler_task.abort();
        Ok(())
    }
}

/// Answer proxy auth challenges with the configured credentials. Enabling
/// the Fetch domain pauses every request, so paused requests must be
/// continued as well.
async fn spawn_proxy_auth(page: &Page, proxy: ProxyConfig) -> Result<Vec<JoinHandle<()>>> {
    let mut enable = fetch::EnableParams::default();
    enable.handle_auth_requests = Some(true);
    page.execute(enable)
        .await
        .context("failed to enable fetch interception")?;

    let mut paused = page.event_listener::<fetch::EventRequestPaused>().await?;
    let continue_page = page.clone();
    let continue_task = tokio::spawn(async move {
        while let Some(ev) = paused.next().await {
            let _ = continue_page
                .execute(fetch::ContinueRequestParams::new(ev.request_id.clone()))
                .await;
        }
    });

    let mut auth_events = page.event_listener::<fetch::EventAuthRequired>().await?;
    let auth_page = page.clone();
    let username = proxy.username.unwrap_or_default();
    let password = proxy.password.unwrap_or_default();
    let auth_task = tokio::spawn(async move {
        while let Some(ev) = auth_events.next().await {
            let mut challenge = fetch::AuthChallengeResponse::new(
                fetch::AuthChallengeResponseResponse::ProvideCredentials,
            );
            challenge.username = Some(username.clone());
            challenge.password = Some(password.clone());
            let _ = auth_page
                .execute(fetch::ContinueWithAuthParams::new(
                    ev.request_id.clone(),
                    challenge,
                ))
                .await;
        }
    });

    Ok(vec![continue_task, auth_task])
}

/// The session's single page.
pub struct ChromiumPage {
    page: Page,
    last_activity: Arc<Mutex<Instant>>,
}

#[async_trait]
impl PageHandle for ChromiumPage {
    async fn navigate(&self, url: &str, timeout_ms: u64) -> Result<()> {
        *self.last_activity.lock().expect("activity lock") = Instant::now();

        let result = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.page.goto(url.to_string()),
        )
        .await;

        match result {
            Ok(Ok(_)) => {
                // Wait for the load event, bounded by the same timeout.
                let _ = tokio::time::timeout(
                    Duration::from_millis(timeout_ms),
                    self.page.wait_for_navigation(),
                )
                .await;
                Ok(())
            }
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {timeout_ms}ms"),
        }
    }

    async fn wait_for_network_idle(&self, timeout_ms: u64) {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            let quiet_for = self.last_activity.lock().expect("activity lock").elapsed();
            if quiet_for >= Duration::from_millis(500) || Instant::now() >= deadline {
                return;
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }

    async fn wait_for_text(&self, js_regex: &str, timeout_ms: u64) -> bool {
        let script = format!(
            "(() => {{ try {{ const re = new RegExp({source:?}, 'i'); \
             return re.test(document.body ? document.body.innerText : ''); }} \
             catch (e) {{ return false; }} }})()",
            source = js_regex
        );
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            if let Ok(result) = self.page.evaluate(script.clone()).await {
                if let Ok(true) = result.into_value::<bool>() {
                    return true;
                }
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    async fn current_url(&self) -> String {
        self.page
            .url()
            .await
            .unwrap_or_default()
            .map(|u| u.to_string())
            .unwrap_or_default()
    }

    async fn title(&self) -> Option<String> {
        let result = self.page.evaluate("document.title").await.ok()?;
        let title: String = result.into_value().ok()?;
        let title = title.trim().to_string();
        if title.is_empty() {
            None
        } else {
            Some(title)
        }
    }

    async fn frames(&self) -> Vec<Arc<dyn FrameHandle>> {
        let mut frames: Vec<Arc<dyn FrameHandle>> = Vec::new();
        match self.page.execute(GetFrameTreeParams::default()).await {
            Ok(tree) => {
                let mut nodes: Vec<(String, Option<FrameId>)> = Vec::new();
                flatten_frame_tree(&tree.frame_tree, true, &mut nodes);
                for (url, frame_id) in nodes {
                    frames.push(Arc::new(ChromiumFrame {
                        page: self.page.clone(),
                        frame_id,
                        url,
                    }));
                }
            }
            Err(e) => {
                // Fall back to the main frame alone.
                debug!("frame tree unavailable: {e}");
                let url = self.current_url().await;
                frames.push(Arc::new(ChromiumFrame {
                    page: self.page.clone(),
                    frame_id: None,
                    url,
                }));
            }
        }
        frames
    }

    async fn content(&self) -> Result<String> {
        let result = self
            .page
            .evaluate("document.documentElement.outerHTML")
            .await
            .context("failed to get page HTML")?;
        let html: String = result
            .into_value()
            .map_err(|e| anyhow!("failed to convert HTML result: {e:?}"))?;
        Ok(html)
    }
}

fn flatten_frame_tree(
    tree: &FrameTree,
    is_main: bool,
    out: &mut Vec<(String, Option<FrameId>)>,
) {
    // The main frame evaluates in the page's own world; children get
    // isolated worlds keyed by frame id.
    let id = if is_main {
        None
    } else {
        Some(tree.frame.id.clone())
    };
    out.push((tree.frame.url.clone(), id));
    if let Some(children) = &tree.child_frames {
        for child in children {
            flatten_frame_tree(child, false, out);
        }
    }
}

/// One frame of the page, main or nested.
pub struct ChromiumFrame {
    page: Page,
    /// `None` for the main frame.
    frame_id: Option<FrameId>,
    url: String,
}

#[async_trait]
impl FrameHandle for ChromiumFrame {
    fn url(&self) -> String {
        self.url.clone()
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        match &self.frame_id {
            None => {
                let result = self
                    .page
                    .evaluate(script.to_string())
                    .await
                    .context("main frame evaluation failed")?;
                let value: Value = result.into_value().unwrap_or(Value::Null);
                Ok(value)
            }
            Some(frame_id) => {
                let params = CreateIsolatedWorldParams::builder()
                    .frame_id(frame_id.clone())
                    .world_name("__joblens__")
                    .grant_univeral_access(true)
                    .build()
                    .map_err(|e| anyhow!("isolated world params: {e}"))?;
                let world = self
                    .page
                    .execute(params)
                    .await
                    .context("isolated world creation failed")?;

                let eval = EvaluateParams::builder()
                    .expression(script)
                    .context_id(world.execution_context_id.clone())
                    .return_by_value(true)
                    .build()
                    .map_err(|e| anyhow!("evaluate params: {e}"))?;
                let resp = self
                    .page
                    .execute(eval)
                    .await
                    .context("frame evaluation failed")?;

                if let Some(exception) = &resp.exception_details {
                    bail!("frame evaluation exception: {}", exception.text);
                }
                Ok(resp.result.result.value.clone().unwrap_or(Value::Null))
            }
        }
    }
}
