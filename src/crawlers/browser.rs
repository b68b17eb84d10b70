use crate::config::CrawlerConfig;
use crate::crawlers::crawler::PageFetcher;
use crate::error::{CrawlError, Result};
use crate::extraction::{self, Captured, Extraction, PerformanceSnapshot, RenderedPage};
use crate::filter::UrlFilter;
use crate::http::{HttpSource, RedirectProbe};
use crate::results::PageResult;
use async_trait::async_trait;
use fantoccini::wd::{Capabilities, TimeoutConfiguration, WindowHandle};
use fantoccini::{Client, ClientBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::{Duration, Instant};

/// Installs observers for Largest Contentful Paint and Cumulative Layout Shift.
/// Buffered entries are delivered before the next WebDriver command runs.
const PERFORMANCE_OBSERVER_SCRIPT: &str = r#"
    window.__auditLcp = 0;
    window.__auditCls = 0;
    try {
        new PerformanceObserver((list) => {
            for (const entry of list.getEntries()) {
                window.__auditLcp = entry.renderTime || entry.loadTime || entry.startTime;
            }
        }).observe({ type: 'largest-contentful-paint', buffered: true });
    } catch (e) {}
    try {
        new PerformanceObserver((list) => {
            for (const entry of list.getEntries()) {
                if (!entry.hadRecentInput) {
                    window.__auditCls += entry.value;
                }
            }
        }).observe({ type: 'layout-shift', buffered: true });
    } catch (e) {}
    return true;
"#;

const SNAPSHOT_SCRIPT: &str = r#"
    const nav = performance.getEntriesByType('navigation')[0];
    let bytes = nav ? (nav.transferSize || 0) : 0;
    for (const entry of performance.getEntriesByType('resource')) {
        bytes += entry.transferSize || 0;
    }
    return {
        html: document.documentElement ? document.documentElement.outerHTML : null,
        innerText: document.body ? document.body.innerText : null,
        scrollWidth: document.body ? document.body.scrollWidth : null,
        status: nav && nav.responseStatus ? nav.responseStatus : null,
        ttfb: nav && nav.responseStart > 0 ? nav.responseStart - nav.startTime : null,
        lcp: typeof window.__auditLcp === 'number' ? window.__auditLcp : null,
        cls: typeof window.__auditCls === 'number' ? window.__auditCls : null,
        bytes: bytes
    };
"#;

/// Common WebDriver endpoints tried when the configured one is unreachable
const FALLBACK_WEBDRIVER_URLS: [&str; 3] = [
    "http://localhost:9515", // ChromeDriver default
    "http://127.0.0.1:4444",
    "http://localhost:4444",
];

/// Upper bound for closing a session on behalf of a crawl that was cut off
const SESSION_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// A WebDriver session addressed directly over HTTP, for the commands fantoccini
/// does not expose and for closing a session whose client is gone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserSession {
    pub webdriver_url: String,
    pub session_id: String,
}

impl BrowserSession {
    fn endpoint(&self, command: &str) -> String {
        format!(
            "{}/session/{}{}",
            self.webdriver_url.trim_end_matches('/'),
            self.session_id,
            command
        )
    }

    async fn post(
        &self,
        http: &reqwest::Client,
        command: &str,
        body: Value,
        timeout: Duration,
    ) -> Captured<Value> {
        let res = http
            .post(self.endpoint(command))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| format!("{command} request failed: {e}"))?;
        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| format!("{command} response read failed: {e}"))?;
        if !status.is_success() {
            return Err(format!("{command} answered HTTP {}", status.as_u16()));
        }
        serde_json::from_str(&body).map_err(|e| format!("{command} response parse failed: {e}"))
    }

    /// Drain the browser's console log buffer, keeping SEVERE entries
    pub async fn console_errors(&self, http: &reqwest::Client, timeout: Duration) -> Captured<Vec<String>> {
        let value = self
            .post(http, "/se/log", json!({ "type": "browser" }), timeout)
            .await?;
        Ok(severe_messages(&value))
    }

    /// Drop every cookie in the browser and the storage of `origin`, through
    /// chromedriver's DevTools passthrough
    pub async fn clear_site_data(
        &self,
        http: &reqwest::Client,
        origin: &str,
        timeout: Duration,
    ) -> Captured<()> {
        let commands = [
            json!({ "cmd": "Network.clearBrowserCookies", "params": {} }),
            json!({
                "cmd": "Storage.clearDataForOrigin",
                "params": { "origin": origin, "storageTypes": "all" }
            }),
        ];
        for command in commands {
            self.post(http, "/goog/cdp/execute", command, timeout).await?;
        }
        Ok(())
    }

    /// End the session on the WebDriver server, which also quits its browser.
    /// A session the server no longer knows counts as closed.
    pub async fn close(&self) -> Result<()> {
        let res = reqwest::Client::new()
            .delete(self.endpoint(""))
            .timeout(SESSION_CLOSE_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                CrawlError::WebDriver(format!("cannot close session {}: {e}", self.session_id))
            })?;

        let status = res.status();
        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            ::log::debug!("Closed browser session {}", self.session_id);
            Ok(())
        } else {
            Err(CrawlError::WebDriver(format!(
                "closing session {} answered HTTP {}",
                self.session_id,
                status.as_u16()
            )))
        }
    }
}

/// Renders pages in one WebDriver session, one fresh tab per page
pub struct BrowserFetcher {
    client: Client,
    session: Option<BrowserSession>,
    base_window: WindowHandle,
    filter: UrlFilter,
    http: HttpSource,
    log_client: reqwest::Client,
    viewport_width: u32,
    max_redirects: usize,
    probe_timeout: Duration,
}

impl BrowserFetcher {
    /// Open a browser session configured for mobile rendering
    pub async fn connect(config: &CrawlerConfig, filter: UrlFilter, http: HttpSource) -> Result<Self> {
        let (client, webdriver_url) = connect_to_webdriver(config).await?;

        let timeouts = TimeoutConfiguration::new(
            Some(config.script_timeout()),
            Some(config.navigation_timeout()),
            Some(Duration::ZERO),
        );
        client
            .update_timeouts(timeouts)
            .await
            .map_err(|e| CrawlError::WebDriver(format!("cannot set timeouts: {e}")))?;

        let base_window = client
            .window()
            .await
            .map_err(|e| CrawlError::WebDriver(format!("cannot read window handle: {e}")))?;
        let session = client
            .session_id()
            .await
            .ok()
            .flatten()
            .map(|session_id| BrowserSession {
                webdriver_url,
                session_id,
            });

        Ok(Self {
            client,
            session,
            base_window,
            filter,
            http,
            log_client: reqwest::Client::new(),
            viewport_width: config.viewport_width,
            max_redirects: config.max_redirects,
            probe_timeout: config.navigation_timeout(),
        })
    }

    /// The WebDriver session behind this fetcher, when the server reported its id
    pub fn session(&self) -> Option<&BrowserSession> {
        self.session.as_ref()
    }

    /// Open a new tab and make it current
    async fn open_tab(&mut self, url: &str) -> Result<()> {
        let navigation_error = |e: fantoccini::error::CmdError| CrawlError::Navigation {
            url: url.to_string(),
            message: format!("cannot open tab: {e}"),
        };

        let tab = self.client.new_window(true).await.map_err(navigation_error)?;
        self.client
            .switch_to_window(tab.handle)
            .await
            .map_err(navigation_error)?;
        Ok(())
    }

    /// Clear cookies and storage left by `url` while its tab still shows it, so
    /// the next page starts without them
    async fn clear_site_data(&self, url: &str) {
        if let Err(e) = self.client.delete_all_cookies().await {
            ::log::debug!("Could not delete cookies of {}: {}", url, e);
        }

        let Some(session) = &self.session else {
            return;
        };
        let current = match self.client.current_url().await {
            Ok(current) => current,
            Err(_) => match url::Url::parse(url) {
                Ok(parsed) => parsed,
                Err(_) => return,
            },
        };
        let origin = current.origin().ascii_serialization();
        if let Err(e) = session
            .clear_site_data(&self.log_client, &origin, self.probe_timeout)
            .await
        {
            ::log::debug!("Could not clear browser data after {}: {}", url, e);
        }
    }

    async fn close_tab(&mut self) {
        if let Err(e) = self.client.close_window().await {
            ::log::warn!("Failed to close tab: {}", e);
        }
        if let Err(e) = self.client.switch_to_window(self.base_window.clone()).await {
            ::log::warn!("Failed to switch back to base window: {}", e);
        }
    }

    async fn load(&mut self, url: &str, depth: usize) -> Result<Extraction> {
        // Console errors logged before this navigation belong to earlier pages
        if let Err(e) = self.browser_logs().await {
            ::log::debug!("Could not drain console log before {}: {}", url, e);
        }

        let started = Instant::now();
        self.client
            .goto(url)
            .await
            .map_err(|e| CrawlError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        let load_time = started.elapsed().as_secs_f64();

        if let Err(e) = self.client.execute(PERFORMANCE_OBSERVER_SCRIPT, vec![]).await {
            ::log::warn!("Could not inject LCP/CLS observer on {}: {}", url, e);
        }

        let snapshot = self
            .client
            .execute(SNAPSHOT_SCRIPT, vec![])
            .await
            .map_err(|e| format!("snapshot script failed: {e}"));
        let snapshot = Snapshot::from_value(snapshot);

        let probe = match self
            .http
            .probe_redirects(url, self.max_redirects, self.probe_timeout)
            .await
        {
            Ok(probe) => Some(probe),
            Err(e) => {
                ::log::debug!("Redirect probe failed for {}: {}", url, e);
                None
            }
        };
        let status = resolve_status(snapshot.status, probe.as_ref());
        let redirect_chain = probe.map(|p| p.chain).unwrap_or_default();

        if status >= 400 {
            ::log::warn!("{} answered with HTTP {}", url, status);
            let page = PageResult::status_only(url.to_string(), status, depth, redirect_chain, load_time);
            return Ok(Extraction::status_only(page));
        }

        let final_url = match self.client.current_url().await {
            Ok(current) => current.to_string(),
            Err(_) => url.to_string(),
        };
        let console_errors = self.browser_logs().await;

        let rendered = RenderedPage {
            url: url.to_string(),
            final_url,
            status,
            depth,
            load_time,
            redirect_chain,
            html: snapshot.html,
            inner_text: snapshot.inner_text,
            scroll_width: snapshot.scroll_width,
            performance: snapshot.performance,
            console_errors,
        };

        Ok(extraction::extract_page(rendered, &self.filter, self.viewport_width))
    }

    async fn browser_logs(&self) -> Captured<Vec<String>> {
        match &self.session {
            Some(session) => {
                session
                    .console_errors(&self.log_client, self.probe_timeout)
                    .await
            }
            None => Err("no session id".to_string()),
        }
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&mut self, url: &str, depth: usize) -> Result<Extraction> {
        ::log::debug!("SCRAPE: {}", url);
        self.open_tab(url).await?;
        let result = self.load(url, depth).await;
        self.clear_site_data(url).await;
        self.close_tab().await;
        result
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.client
            .clone()
            .close()
            .await
            .map_err(|e| CrawlError::WebDriver(format!("failed to close session: {e}")))
    }
}

/// Connects to the configured WebDriver, then to common local endpoints
async fn connect_to_webdriver(config: &CrawlerConfig) -> Result<(Client, String)> {
    let caps = capabilities(config);

    let mut last_error = match ClientBuilder::native()
        .capabilities(caps.clone())
        .connect(&config.webdriver_url)
        .await
    {
        Ok(client) => {
            ::log::debug!("Connected to WebDriver at {}", config.webdriver_url);
            return Ok((client, config.webdriver_url.clone()));
        }
        Err(e) => {
            ::log::error!("Failed to connect to WebDriver at {}: {}", config.webdriver_url, e);
            CrawlError::from(e)
        }
    };

    for url in FALLBACK_WEBDRIVER_URLS {
        if url == config.webdriver_url {
            continue;
        }
        ::log::info!("Trying fallback WebDriver URL: {}", url);
        match ClientBuilder::native().capabilities(caps.clone()).connect(url).await {
            Ok(client) => {
                ::log::debug!("Connected to fallback WebDriver at {}", url);
                return Ok((client, url.to_string()));
            }
            Err(e) => last_error = CrawlError::from(e),
        }
    }

    ::log::error!(
        "Make sure a WebDriver server is running or set the WEBDRIVER_URL environment variable"
    );
    Err(last_error)
}

/// Chrome capabilities: mobile emulation plus browser log capture
pub fn capabilities(config: &CrawlerConfig) -> Capabilities {
    let mut args = vec![
        format!("--window-size={},{}", config.viewport_width, config.viewport_height),
        "--disable-gpu".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
    ];
    if config.headless {
        args.push("--headless=new".to_string());
    }
    if !cfg!(target_os = "macos") {
        args.push("--no-sandbox".to_string());
    }

    let mut caps = Capabilities::new();
    caps.insert("browserName".to_string(), json!("chrome"));
    caps.insert("acceptInsecureCerts".to_string(), json!(true));
    caps.insert(
        "goog:chromeOptions".to_string(),
        json!({
            "args": args,
            "mobileEmulation": {
                "deviceMetrics": {
                    "width": config.viewport_width,
                    "height": config.viewport_height,
                    "pixelRatio": 2.0,
                    "touch": true
                },
                "userAgent": config.mobile_user_agent
            }
        }),
    );
    caps.insert("goog:loggingPrefs".to_string(), json!({ "browser": "ALL" }));
    caps
}

/// Status reported by the browser, else by the HTTP probe. A page the browser rendered
/// without either source is taken as 200.
fn resolve_status(browser_status: Option<u16>, probe: Option<&RedirectProbe>) -> u16 {
    browser_status
        .or_else(|| probe.map(|p| p.status))
        .unwrap_or(200)
}

/// Messages of SEVERE entries in a WebDriver log response
fn severe_messages(value: &Value) -> Vec<String> {
    value
        .get("value")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter(|e| e.get("level").and_then(Value::as_str) == Some("SEVERE"))
                .filter_map(|e| e.get("message").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Fields of the snapshot script's result, each captured on its own
struct Snapshot {
    status: Option<u16>,
    html: Captured<String>,
    inner_text: Captured<String>,
    scroll_width: Captured<u32>,
    performance: Captured<PerformanceSnapshot>,
}

impl Snapshot {
    fn from_value(value: Captured<Value>) -> Self {
        let value = match value {
            Ok(v) => v,
            Err(e) => {
                return Self {
                    status: None,
                    html: Err(e.clone()),
                    inner_text: Err(e.clone()),
                    scroll_width: Err(e.clone()),
                    performance: Err(e),
                };
            }
        };

        let string_field = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| format!("{key} not available"))
        };

        Self {
            status: value
                .get("status")
                .and_then(Value::as_u64)
                .and_then(|s| u16::try_from(s).ok())
                .filter(|s| *s > 0),
            html: string_field("html"),
            inner_text: string_field("innerText"),
            scroll_width: value
                .get("scrollWidth")
                .and_then(Value::as_f64)
                .map(|w| w.max(0.0).round() as u32)
                .ok_or_else(|| "scrollWidth not available".to_string()),
            performance: Ok(PerformanceSnapshot {
                ttfb_ms: value.get("ttfb").and_then(Value::as_f64),
                lcp_ms: value.get("lcp").and_then(Value::as_f64),
                cls: value.get("cls").and_then(Value::as_f64),
                transfer_bytes: value
                    .get("bytes")
                    .and_then(Value::as_f64)
                    .map(|b| b.max(0.0) as u64)
                    .unwrap_or(0),
            }),
        }
    }
}
