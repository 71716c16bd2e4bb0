//! Chromium rendering session and per-page browsing contexts

use super::policy::ResourcePolicy;
use super::{LinkSnapshot, Renderer};
use crate::config::Config;
use crate::{PageError, PageResult, ScrapeError};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{BrowserContextId, CloseParams};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetLocaleOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams as FetchEnableParams, EventRequestPaused,
    FailRequestParams,
};
use chromiumoxide::cdp::browser_protocol::network::{ErrorReason, SetUserAgentOverrideParams};
use chromiumoxide::cdp::browser_protocol::security::SetIgnoreCertificateErrorsParams;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use url::Url;

/// Interval between main-content selector checks
const CONTENT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Collects every anchor href and the document base in one evaluation
const COLLECT_LINKS_JS: &str = r#"(() => ({
    base: document.baseURI,
    hrefs: Array.from(document.querySelectorAll('a[href]'), a => a.getAttribute('href'))
}))()"#;

/// Settings applied to every browsing context
#[derive(Debug, Clone)]
struct ContextSettings {
    user_agent: String,
    locale: String,
    viewport_width: u32,
    viewport_height: u32,
    ignore_tls_errors: bool,
    resources: ResourcePolicy,
    navigation_timeout: Duration,
    content_wait: Duration,
    content_selector: String,
}

impl ContextSettings {
    fn from_config(config: &Config) -> Self {
        Self {
            user_agent: config.browser.user_agent.clone(),
            locale: config.browser.locale.clone(),
            viewport_width: config.browser.viewport_width,
            viewport_height: config.browser.viewport_height,
            ignore_tls_errors: config.browser.ignore_tls_errors,
            resources: ResourcePolicy::blocking(config.browser.blocked_resources.iter().copied()),
            navigation_timeout: Duration::from_millis(config.scraper.navigation_timeout_ms),
            content_wait: Duration::from_millis(config.scraper.content_wait_ms),
            content_selector: config.extraction.content_selectors.join(", "),
        }
    }
}

/// One browser process shared by every page fetch
///
/// Each fetch gets its own browser context from [`acquire_context`]; the
/// number of live contexts is capped at the configured concurrency limit.
///
/// [`acquire_context`]: RenderingSession::acquire_context
pub struct RenderingSession {
    browser: Arc<Browser>,
    handler: JoinHandle<()>,
    permits: Arc<Semaphore>,
    settings: Arc<ContextSettings>,
}

impl RenderingSession {
    /// Launches Chromium and starts the CDP event handler
    ///
    /// # Errors
    ///
    /// * `ScrapeError::Browser` - the browser could not be configured or started
    pub async fn launch(config: &Config) -> crate::Result<Self> {
        let browser_config = &config.browser;

        let mut builder = BrowserConfig::builder()
            .window_size(browser_config.viewport_width, browser_config.viewport_height);
        if !browser_config.headless {
            builder = builder.with_head();
        }
        if browser_config.no_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(path) = &browser_config.executable {
            builder = builder.chrome_executable(path);
        }
        if browser_config.ignore_tls_errors {
            builder = builder.arg("--ignore-certificate-errors");
        }
        let launch_config = builder.build().map_err(ScrapeError::Browser)?;

        let (browser, mut handler) = Browser::launch(launch_config)
            .await
            .map_err(|e| ScrapeError::Browser(format!("Failed to launch browser: {}", e)))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("CDP handler error: {}", e);
                }
            }
            tracing::debug!("CDP handler stopped");
        });

        tracing::info!(
            "Browser launched (headless: {}, contexts: {})",
            browser_config.headless,
            config.scraper.concurrency_limit
        );

        Ok(Self {
            browser: Arc::new(browser),
            handler,
            permits: Arc::new(Semaphore::new(config.scraper.concurrency_limit as usize)),
            settings: Arc::new(ContextSettings::from_config(config)),
        })
    }

    /// Creates an isolated browsing context with one blank page
    ///
    /// Waits while the maximum number of contexts is live. The returned guard
    /// disposes the context when released or dropped.
    pub async fn acquire_context(&self) -> crate::Result<ContextGuard> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| ScrapeError::Browser(format!("Context pool closed: {}", e)))?;

        let context_id = self
            .browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(|e| ScrapeError::Browser(format!("Failed to create context: {}", e)))?
            .result
            .browser_context_id;

        let mut guard = ContextGuard {
            page: None,
            context_id: Some(context_id.clone()),
            interceptor: None,
            permit: Some(permit),
            browser: Arc::clone(&self.browser),
            settings: Arc::clone(&self.settings),
            runtime_handle: tokio::runtime::Handle::current(),
        };

        let mut target = CreateTargetParams::new("about:blank");
        target.browser_context_id = Some(context_id);
        match self.browser.new_page(target).await {
            Ok(page) => guard.page = Some(page),
            Err(e) => {
                guard.release().await;
                return Err(ScrapeError::Browser(format!("Failed to open page: {}", e)));
            }
        }

        if let Err(e) = guard.configure().await {
            guard.release().await;
            return Err(ScrapeError::Browser(format!(
                "Failed to configure context: {}",
                e
            )));
        }

        Ok(guard)
    }

    /// Closes the browser and stops the handler task
    pub async fn shutdown(&self) {
        if let Err(e) = self.browser.execute(CloseParams::default()).await {
            tracing::debug!("Browser close command failed: {}", e);
        }
        self.handler.abort();
        tracing::info!("Browser shut down");
    }
}

#[async_trait]
impl Renderer for RenderingSession {
    async fn collect_links(&self, url: &Url) -> PageResult<LinkSnapshot> {
        let guard = self.acquire_context().await.map_err(|e| render_error(url, e))?;

        let result = async {
            guard.navigate(url).await?;
            guard.wait_for("body").await;
            guard.collect_links(url).await
        }
        .await;

        guard.release().await;
        result
    }

    async fn render_html(&self, url: &Url) -> PageResult<String> {
        let guard = self.acquire_context().await.map_err(|e| render_error(url, e))?;

        let result = async {
            guard.navigate(url).await?;
            let selector = guard.settings.content_selector.clone();
            if !selector.is_empty() {
                guard.wait_for(&selector).await;
            }
            guard.content(url).await
        }
        .await;

        guard.release().await;
        result
    }
}

/// A live browsing context and its page
///
/// Provides two cleanup paths:
/// 1. Explicit async [`release`](ContextGuard::release), preferred
/// 2. Drop fallback, which spawns the same cleanup on the captured runtime
///
/// The context's concurrency permit is held until cleanup finishes.
pub struct ContextGuard {
    page: Option<Page>,
    context_id: Option<BrowserContextId>,
    interceptor: Option<JoinHandle<()>>,
    permit: Option<OwnedSemaphorePermit>,
    browser: Arc<Browser>,
    settings: Arc<ContextSettings>,
    runtime_handle: tokio::runtime::Handle,
}

impl ContextGuard {
    fn page(&self) -> Result<&Page, CdpError> {
        self.page
            .as_ref()
            .ok_or_else(|| CdpError::ChromeMessage("page already released".to_string()))
    }

    /// Applies viewport, locale, user agent, TLS and resource settings
    async fn configure(&mut self) -> Result<(), CdpError> {
        let settings = Arc::clone(&self.settings);
        let page = self.page()?.clone();

        page.execute(SetDeviceMetricsOverrideParams::new(
            i64::from(settings.viewport_width),
            i64::from(settings.viewport_height),
            1.0,
            false,
        ))
        .await?;

        if let Err(e) = page
            .execute(SetLocaleOverrideParams {
                locale: Some(settings.locale.clone()),
            })
            .await
        {
            tracing::debug!("Locale override rejected: {}", e);
        }

        let user_agent = SetUserAgentOverrideParams::builder()
            .user_agent(settings.user_agent.clone())
            .accept_language(settings.locale.clone())
            .build()
            .map_err(CdpError::ChromeMessage)?;
        page.execute(user_agent).await?;

        if settings.ignore_tls_errors {
            page.execute(SetIgnoreCertificateErrorsParams::new(true))
                .await?;
        }

        if !settings.resources.is_empty() {
            let mut paused = page.event_listener::<EventRequestPaused>().await?;
            page.execute(FetchEnableParams {
                patterns: Some(settings.resources.request_patterns()),
                handle_auth_requests: None,
            })
            .await?;

            let policy = settings.resources.clone();
            let intercept_page = page.clone();
            self.interceptor = Some(self.runtime_handle.spawn(async move {
                while let Some(event) = paused.next().await {
                    let outcome = if policy.allows_request(&event.resource_type) {
                        intercept_page
                            .execute(ContinueRequestParams::new(event.request_id.clone()))
                            .await
                            .map(|_| ())
                    } else {
                        tracing::trace!("Blocked {:?} {}", event.resource_type, event.request.url);
                        intercept_page
                            .execute(FailRequestParams::new(
                                event.request_id.clone(),
                                ErrorReason::BlockedByClient,
                            ))
                            .await
                            .map(|_| ())
                    };
                    if let Err(e) = outcome {
                        tracing::trace!("Paused request not resolved: {}", e);
                    }
                }
            }));
        }

        Ok(())
    }

    /// Navigates to `url` within the navigation timeout
    pub async fn navigate(&self, url: &Url) -> PageResult<()> {
        let page = self.page().map_err(|e| render_error(url, e))?;
        let timeout = self.settings.navigation_timeout;

        match tokio::time::timeout(timeout, page.goto(url.as_str())).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(navigation_error(url, timeout, e)),
            Err(_) => Err(PageError::Timeout {
                url: url.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    /// Polls until `selector` matches or the content wait elapses
    ///
    /// Returns whether the selector matched; running out of time is not an
    /// error.
    pub async fn wait_for(&self, selector: &str) -> bool {
        let Ok(page) = self.page() else {
            return false;
        };
        let Ok(quoted) = serde_json::to_string(selector) else {
            return false;
        };
        let expression = format!("document.querySelector({}) !== null", quoted);
        let deadline = Instant::now() + self.settings.content_wait;

        loop {
            let found = match page.evaluate(expression.clone()).await {
                Ok(result) => result.into_value::<bool>().unwrap_or(false),
                Err(_) => false,
            };
            if found {
                return true;
            }
            if Instant::now() >= deadline {
                tracing::debug!("No element matched '{}' before the wait ran out", selector);
                return false;
            }
            tokio::time::sleep(CONTENT_POLL_INTERVAL).await;
        }
    }

    /// Reads every anchor href in a single in-page query
    pub async fn collect_links(&self, url: &Url) -> PageResult<LinkSnapshot> {
        let page = self.page().map_err(|e| render_error(url, e))?;
        let params = EvaluateParams::builder()
            .expression(COLLECT_LINKS_JS)
            .return_by_value(true)
            .build()
            .map_err(|message| PageError::Query {
                url: url.to_string(),
                message,
            })?;

        page.evaluate_expression(params)
            .await
            .and_then(|result| {
                result
                    .into_value::<LinkSnapshot>()
                    .map_err(CdpError::from)
            })
            .map_err(|e| PageError::Query {
                url: url.to_string(),
                message: e.to_string(),
            })
    }

    /// Serializes the current DOM
    pub async fn content(&self, url: &Url) -> PageResult<String> {
        let page = self.page().map_err(|e| render_error(url, e))?;
        page.content().await.map_err(|e| render_error(url, e))
    }

    /// Closes the page and disposes the context
    pub async fn release(mut self) {
        let cleanup = self.take_cleanup();
        cleanup.run().await;
    }

    fn take_cleanup(&mut self) -> Cleanup {
        Cleanup {
            page: self.page.take(),
            context_id: self.context_id.take(),
            interceptor: self.interceptor.take(),
            permit: self.permit.take(),
            browser: Arc::clone(&self.browser),
        }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if self.page.is_none() && self.context_id.is_none() {
            return;
        }
        let cleanup = self.take_cleanup();
        self.runtime_handle.spawn(async move {
            cleanup.run().await;
            tracing::trace!("Context released from drop");
        });
    }
}

/// Resources owned by a context, released together
struct Cleanup {
    page: Option<Page>,
    context_id: Option<BrowserContextId>,
    interceptor: Option<JoinHandle<()>>,
    permit: Option<OwnedSemaphorePermit>,
    browser: Arc<Browser>,
}

impl Cleanup {
    async fn run(self) {
        if let Some(interceptor) = self.interceptor {
            interceptor.abort();
        }
        if let Some(page) = self.page {
            if let Err(e) = page.close().await {
                tracing::debug!("Failed to close page: {}", e);
            }
        }
        if let Some(context_id) = self.context_id {
            if let Err(e) = self
                .browser
                .execute(DisposeBrowserContextParams::new(context_id))
                .await
            {
                tracing::debug!("Failed to dispose browser context: {}", e);
            }
        }
        drop(self.permit);
    }
}

/// Maps a failed navigation to a page error
fn navigation_error(url: &Url, timeout: Duration, error: CdpError) -> PageError {
    match error {
        CdpError::Timeout => PageError::Timeout {
            url: url.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        },
        CdpError::NoResponse | CdpError::Ws(_) => render_error(url, error),
        other => PageError::Fetch {
            url: url.to_string(),
            message: other.to_string(),
        },
    }
}

fn render_error(url: &Url, error: impl std::fmt::Display) -> PageError {
    PageError::Render {
        url: url.to_string(),
        message: error.to_string(),
    }
}
