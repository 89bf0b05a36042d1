//! Chromium-backed session using chromiumoxide (CDP).
//!
//! Element lookups are done with small JavaScript snippets evaluated in the
//! page, since CDP has no notion of role or text locators.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use chromiumoxide::cdp::browser_protocol::network::{
    EventRequestWillBeSent, GetRequestPostDataParams, RequestId, SetBlockedUrLsParams,
    SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::target::{CreateBrowserContextParams, CreateTargetParams};
use chromiumoxide::handler::HandlerConfig;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{InterceptedRequest, Key, Locator, RequestStream, Session, SessionLauncher};
use crate::config::BrowserSettings;
use crate::site::BLOCKED_URL_PATTERNS;

/// Launches (or connects to) Chrome and opens one page per session.
pub struct ChromiumLauncher {
    settings: BrowserSettings,
}

impl ChromiumLauncher {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        // Common install locations
        "/opt/google/chrome/google-chrome",
    ];

    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }

    /// Find Chrome executable.
    fn find_chrome() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("LISTACQUIRE_CHROME") {
            let p = PathBuf::from(&path);
            if p.exists() {
                return Ok(p);
            }
            warn!("LISTACQUIRE_CHROME points to missing file: {}", path);
        }

        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                debug!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in [
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(path) = which::which(cmd) {
                debug!("Found Chrome in PATH: {}", path.display());
                return Ok(path);
            }
        }

        Err(anyhow::anyhow!(
            "Chrome/Chromium not found. Please install it:\n\
             - Arch/Manjaro: sudo pacman -S chromium\n\
             - Ubuntu/Debian: sudo apt install chromium-browser\n\
             - Fedora: sudo dnf install chromium\n\
             - Or set LISTACQUIRE_CHROME to the executable path"
        ))
    }

    /// Launch a local browser process.
    async fn launch_local(&self) -> Result<(Browser, JoinHandle<()>)> {
        info!("Launching browser (headless={})", self.settings.headless);

        let chrome_path = Self::find_chrome()?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .request_timeout(self.settings.request_timeout);

        // with_head means NOT headless
        if !self.settings.headless {
            builder = builder.with_head();
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--disable-sync")
            .arg("--disable-translate")
            .arg("--no-sandbox") // Often needed for headless in containers
            .arg("--disable-gpu");

        for arg in &self.settings.chrome_args {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {}", e))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch browser")?;

        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok((browser, handler_task))
    }

    /// Connect to a remote Chrome instance.
    async fn connect_remote(&self, url: &str) -> Result<(Browser, JoinHandle<()>)> {
        info!("Connecting to remote browser at {}", url);

        // Get WebSocket URL from the /json/version endpoint
        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let resp: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .send()
            .await
            .context("Failed to connect to remote browser")?
            .json()
            .await
            .context("Failed to parse browser version info")?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("No webSocketDebuggerUrl in response"))?;

        debug!("Connecting to WebSocket: {}", ws_url);

        let handler_config = HandlerConfig {
            request_timeout: self.settings.request_timeout,
            ..Default::default()
        };

        let (browser, mut handler) = Browser::connect_with_config(ws_url, handler_config)
            .await
            .context("Failed to connect to remote browser")?;

        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok((browser, handler_task))
    }

    /// Create an isolated context with one configured page in it.
    async fn open_page(&self, browser: &mut Browser) -> Result<(BrowserContextId, Page)> {
        let context_id = browser
            .create_browser_context(CreateBrowserContextParams::default())
            .await
            .context("Failed to create browser context")?;

        match self.configure_page(browser, &context_id).await {
            Ok(page) => Ok((context_id, page)),
            Err(e) => {
                if let Err(dispose_err) = browser.dispose_browser_context(context_id).await {
                    warn!("Failed to dispose browser context: {}", dispose_err);
                }
                Err(e)
            }
        }
    }

    async fn configure_page(&self, browser: &Browser, context_id: &BrowserContextId) -> Result<Page> {
        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(|e| anyhow::anyhow!("Invalid target params: {}", e))?;

        let page = browser.new_page(target).await.context("Failed to open page")?;

        // Set user agent before any navigation
        page.execute(SetUserAgentOverrideParams::new(
            self.settings.user_agent.clone(),
        ))
        .await
        .context("Failed to set user agent")?;

        if self.settings.block_resources {
            let params = SetBlockedUrLsParams {
                urls: BLOCKED_URL_PATTERNS.iter().map(|p| p.to_string()).collect(),
            };
            page.execute(params)
                .await
                .context("Failed to configure resource blocking")?;
            debug!("Blocking {} URL patterns", BLOCKED_URL_PATTERNS.len());
        }

        Ok(page)
    }
}

#[async_trait]
impl SessionLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn Session>> {
        let (mut browser, handler, owns_process) = match self.settings.remote_url.as_deref() {
            Some(url) => {
                let (browser, handler) = self.connect_remote(url).await?;
                (browser, handler, false)
            }
            None => {
                let (browser, handler) = self.launch_local().await?;
                (browser, handler, true)
            }
        };

        match self.open_page(&mut browser).await {
            Ok((context_id, page)) => Ok(Box::new(ChromiumSession {
                browser,
                handler,
                context_id,
                page,
                listener: None,
                owns_process,
            })),
            Err(e) => {
                if owns_process {
                    if let Err(close_err) = browser.close().await {
                        warn!("Failed to close browser after setup error: {}", close_err);
                    }
                    if let Err(wait_err) = browser.wait().await {
                        warn!("Failed waiting for browser exit: {}", wait_err);
                    }
                }
                handler.abort();
                Err(e)
            }
        }
    }
}

/// A single page inside its own browser context.
pub struct ChromiumSession {
    browser: Browser,
    handler: JoinHandle<()>,
    context_id: BrowserContextId,
    page: Page,
    listener: Option<JoinHandle<()>>,
    /// False when attached to a remote browser we must not shut down.
    owns_process: bool,
}

impl ChromiumSession {
    async fn eval<T: serde::de::DeserializeOwned>(&self, script: String) -> Result<T> {
        self.page
            .evaluate(script)
            .await
            .context("JS execution failed")?
            .into_value()
            .context("Failed to convert JS result")
    }
}

#[async_trait]
impl Session for ChromiumSession {
    async fn subscribe_requests(&mut self) -> Result<RequestStream> {
        let mut events = self
            .page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .context("Failed to subscribe to network requests")?;

        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let request = InterceptedRequest {
                    request_id: event.request_id.inner().clone(),
                    method: event.request.method.clone(),
                    url: event.request.url.clone(),
                    // Bodies are read on demand via Network.getRequestPostData.
                    post_data: None,
                    has_post_data: event.request.has_post_data.unwrap_or(false),
                };
                if tx.send(request).is_err() {
                    break;
                }
            }
            debug!("Network request stream ended");
        });

        if let Some(previous) = self.listener.replace(task) {
            previous.abort();
        }

        Ok(rx)
    }

    async fn post_data(&self, request: &InterceptedRequest) -> Result<Option<String>> {
        if request.post_data.is_some() {
            return Ok(request.post_data.clone());
        }
        if !request.has_post_data {
            return Ok(None);
        }

        let params = GetRequestPostDataParams::new(RequestId::new(request.request_id.clone()));
        let response = self
            .page
            .execute(params)
            .await
            .context("Failed to read request body")?;
        Ok(Some(response.result.post_data.clone()))
    }

    async fn goto(&self, url: &str) -> Result<()> {
        info!("Navigating to {}", url);
        self.page
            .goto(url)
            .await
            .with_context(|| format!("Failed to navigate to {}", url))?;
        Ok(())
    }

    async fn is_visible(&self, locator: &Locator) -> Result<bool> {
        let script = format!(
            "(() => {{ const el = {}; if (!el) return false; \
             const style = window.getComputedStyle(el); const rect = el.getBoundingClientRect(); \
             return style.visibility !== 'hidden' && style.display !== 'none' \
             && rect.width > 0 && rect.height > 0; }})()",
            element_expression(locator)
        );
        self.eval(script).await
    }

    async fn inner_text(&self, locator: &Locator) -> Result<Option<String>> {
        let script = format!(
            "(() => {{ const el = {}; return el ? el.innerText : null; }})()",
            element_expression(locator)
        );
        self.eval(script).await
    }

    async fn scroll_into_view(&self, locator: &Locator) -> Result<()> {
        let script = format!(
            "(() => {{ const el = {}; if (!el) return false; \
             if (el.scrollIntoViewIfNeeded) {{ el.scrollIntoViewIfNeeded(true); }} \
             else {{ el.scrollIntoView({{ block: 'center' }}); }} return true; }})()",
            element_expression(locator)
        );
        let found: bool = self.eval(script).await?;
        if !found {
            anyhow::bail!("element not found: {:?}", locator);
        }
        Ok(())
    }

    async fn press(&self, key: Key) -> Result<()> {
        for event_type in [DispatchKeyEventType::KeyDown, DispatchKeyEventType::KeyUp] {
            let params = DispatchKeyEventParams::builder()
                .r#type(event_type)
                .key(key.name())
                .code(key.name())
                .windows_virtual_key_code(key.virtual_key_code())
                .native_virtual_key_code(key.virtual_key_code())
                .build()
                .map_err(|e| anyhow::anyhow!("Invalid key event: {}", e))?;
            self.page
                .execute(params)
                .await
                .with_context(|| format!("Failed to press {}", key.name()))?;
        }
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let ChromiumSession {
            mut browser,
            handler,
            context_id,
            page,
            listener,
            owns_process,
        } = *self;

        if let Some(listener) = listener {
            listener.abort();
        }

        if let Err(e) = page.close().await {
            warn!("Failed to close page: {}", e);
        }

        if let Err(e) = browser.dispose_browser_context(context_id).await {
            warn!("Failed to dispose browser context: {}", e);
        }

        let result = if owns_process {
            let closed = browser
                .close()
                .await
                .map(|_| ())
                .context("Failed to close browser");
            if let Err(e) = browser.wait().await {
                warn!("Failed waiting for browser exit: {}", e);
            }
            closed
        } else {
            Ok(())
        };

        handler.abort();
        debug!("Browser session closed");
        result
    }
}

/// JavaScript string literal for `value`.
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Lowercase with runs of whitespace collapsed to one space.
fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// JavaScript expression evaluating to the located element or `undefined`/`null`.
fn element_expression(locator: &Locator) -> String {
    match locator {
        Locator::Text(text) => {
            let needle = js_string(&normalize_text(text));
            format!(
                "(() => {{ const norm = s => (s || '').replace(/\\s+/g, ' ').trim().toLowerCase(); \
                 return Array.from(document.body.querySelectorAll('*')).find(e => \
                 norm(e.innerText).includes({needle}) && \
                 !Array.from(e.children).some(c => norm(c.innerText).includes({needle}))); }})()"
            )
        }
        Locator::TestId(id) => format!(
            "document.querySelector('[data-testid=' + JSON.stringify({}) + ']')",
            js_string(id)
        ),
        Locator::RowLink(ordinal) => format!(
            "Array.from(document.querySelectorAll('a, [role=\"link\"]')).find(e => \
             (e.getAttribute('aria-label') || e.innerText || '').trim().startsWith('{ordinal}.'))"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_string_escapes_quotes() {
        assert_eq!(js_string(r#"it's "private""#), r#""it's \"private\"""#);
    }

    #[test]
    fn test_text_locator_ignores_case_and_spacing() {
        assert_eq!(normalize_text("  This list\n is NOT   public "), "this list is not public");

        let expr = element_expression(&Locator::Text("Private   List".into()));
        assert!(expr.contains(r#"includes("private list")"#));
        assert!(expr.contains("toLowerCase()"));
        assert!(expr.contains(r"replace(/\s+/g, ' ')"));
    }

    #[test]
    fn test_row_link_expression_uses_ordinal_prefix() {
        let expr = element_expression(&Locator::RowLink(250));
        assert!(expr.contains("startsWith('250.')"));
    }

    #[test]
    fn test_test_id_expression_quotes_id() {
        let expr = element_expression(&Locator::TestId("list-page-mc-author".into()));
        assert!(expr.contains(r#"JSON.stringify("list-page-mc-author")"#));
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_session_reads_page() {
        let launcher = ChromiumLauncher::new(BrowserSettings {
            block_resources: false,
            ..Default::default()
        });
        let mut session = launcher.launch().await.expect("failed to launch");
        let _requests = session.subscribe_requests().await.expect("subscribe failed");

        session
            .goto("data:text/html,<div data-testid=\"owner\">Someone</div><a href=\"#\">1. First</a>")
            .await
            .expect("navigation failed");

        assert!(session.is_visible(&Locator::RowLink(1)).await.unwrap());
        assert!(!session.is_visible(&Locator::RowLink(2)).await.unwrap());
        let owner = session
            .inner_text(&Locator::TestId("owner".into()))
            .await
            .unwrap();
        assert_eq!(owner.as_deref(), Some("Someone"));

        session.press(Key::End).await.expect("key press failed");
        session.close().await.expect("close failed");
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_session_reads_post_body() {
        let launcher = ChromiumLauncher::new(BrowserSettings {
            block_resources: false,
            ..Default::default()
        });
        let mut session = launcher.launch().await.expect("failed to launch");
        let mut requests = session.subscribe_requests().await.expect("subscribe failed");

        session
            .goto(
                "data:text/html,<script>fetch('http://127.0.0.1:9/graphql',{method:'POST',\
                 body:JSON.stringify({variables:{idArray:['tt1','tt2']}})}).catch(()=>{})</script>",
            )
            .await
            .expect("navigation failed");

        let request = tokio::time::timeout(std::time::Duration::from_secs(10), async {
            loop {
                let request = requests.recv().await.expect("stream closed");
                if request.method == "POST" {
                    break request;
                }
            }
        })
        .await
        .expect("no POST request seen");

        assert!(request.has_post_data);
        let body = session
            .post_data(&request)
            .await
            .expect("body read failed")
            .expect("body missing");
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["variables"]["idArray"][1], "tt2");

        session.close().await.expect("close failed");
    }
}
