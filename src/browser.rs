//! The browsing collaborator: a minimal page-automation surface and its
//! Chromium implementation.
//!
//! The rest of the crate only talks to the [`Browser`] and [`BrowserPage`]
//! traits. [`ChromeBrowser`] implements them on top of `chromiumoxide`, driving
//! a Chromium instance over the DevTools protocol.
//!
//! Optional steps (consent overlays, filter controls) are probed with
//! [`BrowserPage::wait_for_selector`] and [`BrowserPage::click_text`], which
//! return `false` when the element never shows up instead of failing.

use crate::error::{Result, ScrapeError};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::Page;
use futures::StreamExt;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, instrument, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// How far a navigation has to progress before `goto` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    /// The navigation was committed; the document may still be loading.
    Commit,
    Load,
}

/// Element condition awaited by [`BrowserPage::wait_for_selector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementState {
    Attached,
    Visible,
}

/// Document readiness awaited by [`BrowserPage::wait_for_load_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    DomContentLoaded,
    Load,
}

/// One browser tab.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    async fn goto(&self, url: &str, wait_until: WaitUntil) -> Result<()>;

    /// Replace the value of the input matching `selector` with `text`.
    async fn fill(&self, selector: &str, text: &str) -> Result<()>;

    async fn click(&self, selector: &str) -> Result<()>;

    /// Focus the element matching `selector` and press `key` on it.
    async fn press(&self, selector: &str, key: &str) -> Result<()>;

    /// Wait until an element matching `selector` reaches `state`.
    /// Returns `false` if it did not within `timeout`.
    async fn wait_for_selector(
        &self,
        selector: &str,
        state: ElementState,
        timeout: Duration,
    ) -> Result<bool>;

    /// Click the first visible `tag` element whose text contains `text`.
    /// Returns `false` if no such element appeared within `timeout`.
    async fn click_text(&self, tag: &str, text: &str, timeout: Duration) -> Result<bool>;

    /// Wait for the document to reach `state`. Returns `false` on timeout.
    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> Result<bool>;

    /// The rendered document markup.
    async fn content(&self) -> Result<String>;

    async fn close(&self) -> Result<()>;
}

/// A browser context able to open isolated pages.
#[async_trait]
pub trait Browser: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>>;

    /// Drop every cookie held by the browser context.
    async fn clear_cookies(&self) -> Result<()>;

    /// Close the browser and release its process.
    async fn shutdown(&self) -> Result<()>;
}

/// Launch options for [`ChromeBrowser`].
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    pub ignore_https_errors: bool,
    /// Timeout applied to every DevTools request and to navigations.
    pub default_timeout: Duration,
    pub window_size: (u32, u32),
    /// Chrome/Chromium binary; auto-detected when `None`.
    pub executable: Option<PathBuf>,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            ignore_https_errors: true,
            default_timeout: Duration::from_secs(60),
            window_size: (1366, 768),
            executable: None,
        }
    }
}

/// Chromium driven through `chromiumoxide`.
pub struct ChromeBrowser {
    browser: Mutex<CdpBrowser>,
    handler_task: JoinHandle<()>,
    navigation_timeout: Duration,
}

impl ChromeBrowser {
    #[instrument(level = "info", skip_all, fields(headless = options.headless))]
    pub async fn launch(options: &BrowserOptions) -> Result<Self> {
        let config = browser_config(options)?;

        let (browser, mut handler) = CdpBrowser::launch(config).await?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    let message = e.to_string();
                    // newer Chrome builds send messages chromiumoxide cannot decode
                    if message.contains("did not match any variant") {
                        continue;
                    }
                    if message.contains("connection closed") || message.contains("websocket closed") {
                        warn!(error = %e, "Browser connection lost; stopping CDP handler");
                        break;
                    }
                    debug!(error = %e, "CDP handler error (continuing)");
                }
            }
            debug!("CDP handler task completed");
        });

        info!("Browser launched");
        Ok(Self {
            browser: Mutex::new(browser),
            handler_task,
            navigation_timeout: options.default_timeout,
        })
    }
}

fn browser_config(options: &BrowserOptions) -> Result<BrowserConfig> {
    let (width, height) = options.window_size;
    let mut builder = BrowserConfig::builder()
        .request_timeout(options.default_timeout)
        .window_size(width, height)
        .args(["--no-sandbox", "--disable-dev-shm-usage", "--no-first-run"]);
    if !options.headless {
        builder = builder.with_head();
    }
    // chromiumoxide ignores certificate errors unless told otherwise
    if !options.ignore_https_errors {
        builder = builder.respect_https_errors();
    }
    if let Some(path) = &options.executable {
        builder = builder.chrome_executable(path);
    }
    builder.build().map_err(ScrapeError::Browser)
}

#[async_trait]
impl Browser for ChromeBrowser {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>> {
        let page = self.browser.lock().await.new_page("about:blank").await?;
        Ok(Box::new(ChromePage {
            page,
            navigation_timeout: self.navigation_timeout,
        }))
    }

    async fn clear_cookies(&self) -> Result<()> {
        self.browser.lock().await.clear_cookies().await?;
        debug!("Cleared browser cookies");
        Ok(())
    }

    #[instrument(level = "info", skip_all)]
    async fn shutdown(&self) -> Result<()> {
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            debug!(error = %e, "Browser close error (ignored)");
        }
        if let Err(e) = browser.wait().await {
            debug!(error = %e, "Browser wait error (ignored)");
        }
        self.handler_task.abort();
        info!("Browser closed");
        Ok(())
    }
}

pub struct ChromePage {
    page: Page,
    navigation_timeout: Duration,
}

impl ChromePage {
    async fn evaluate_bool(&self, script: String) -> Result<bool> {
        Ok(self.page.evaluate(script).await?.into_value::<bool>()?)
    }
}

/// Poll `probe` until it yields `true` or `timeout` elapses.
///
/// Probe errors count as "not yet": scripts fail routinely while a navigation
/// swaps the execution context.
async fn poll_until<F, Fut>(timeout: Duration, mut probe: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        match probe().await {
            Ok(true) => return true,
            Ok(false) => {}
            Err(e) => debug!(error = %e, "Probe failed; retrying"),
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(POLL_INTERVAL).await;
    }
}

fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

const IS_VISIBLE_FN: &str = "function isVisible(el) { \
    const style = window.getComputedStyle(el); \
    const rect = el.getBoundingClientRect(); \
    return style.visibility !== 'hidden' && style.display !== 'none' && rect.width > 0 && rect.height > 0; \
}";

fn selector_probe(selector: &str, state: ElementState) -> String {
    match state {
        ElementState::Attached => {
            format!("document.querySelector({}) !== null", js_string(selector))
        }
        ElementState::Visible => format!(
            "(() => {{ {IS_VISIBLE_FN} const el = document.querySelector({}); return el !== null && isVisible(el); }})()",
            js_string(selector)
        ),
    }
}

fn click_text_script(tag: &str, text: &str) -> String {
    format!(
        "(() => {{ {IS_VISIBLE_FN} \
        const match = Array.from(document.getElementsByTagName({})) \
            .find(el => el.textContent.includes({}) && isVisible(el)); \
        if (!match) return false; \
        match.click(); \
        return true; }})()",
        js_string(tag),
        js_string(text)
    )
}

fn ready_state_probe(state: LoadState) -> &'static str {
    match state {
        LoadState::DomContentLoaded => {
            "document.readyState === 'interactive' || document.readyState === 'complete'"
        }
        LoadState::Load => "document.readyState === 'complete'",
    }
}

#[async_trait]
impl BrowserPage for ChromePage {
    #[instrument(level = "debug", skip(self))]
    async fn goto(&self, url: &str, wait_until: WaitUntil) -> Result<()> {
        let navigation = async {
            match wait_until {
                WaitUntil::Commit => {
                    self.page.execute(NavigateParams::new(url)).await?;
                }
                WaitUntil::Load => {
                    self.page.goto(url).await?;
                }
            }
            Ok::<(), ScrapeError>(())
        };
        timeout(self.navigation_timeout, navigation)
            .await
            .map_err(|_| ScrapeError::NavigationTimeout {
                what: url.to_string(),
                timeout: self.navigation_timeout,
            })?
    }

    async fn fill(&self, selector: &str, text: &str) -> Result<()> {
        let element = self.page.find_element(selector).await?;
        element.click().await?;
        element
            .call_js_fn("function() { this.value = ''; }", false)
            .await?;
        element.type_str(text).await?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.page.find_element(selector).await?.click().await?;
        Ok(())
    }

    async fn press(&self, selector: &str, key: &str) -> Result<()> {
        let element = self.page.find_element(selector).await?;
        element.focus().await?;
        element.press_key(key).await?;
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        state: ElementState,
        timeout: Duration,
    ) -> Result<bool> {
        let script = selector_probe(selector, state);
        Ok(poll_until(timeout, || self.evaluate_bool(script.clone())).await)
    }

    async fn click_text(&self, tag: &str, text: &str, timeout: Duration) -> Result<bool> {
        let script = click_text_script(tag, text);
        Ok(poll_until(timeout, || self.evaluate_bool(script.clone())).await)
    }

    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> Result<bool> {
        let script = ready_state_probe(state);
        Ok(poll_until(timeout, || self.evaluate_bool(script.to_string())).await)
    }

    async fn content(&self) -> Result<String> {
        Ok(self.page.content().await?)
    }

    async fn close(&self) -> Result<()> {
        self.page.clone().close().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_js_string_escapes_quotes() {
        assert_eq!(js_string(r#"span "x""#), r#""span \"x\"""#);
    }

    #[test]
    fn test_selector_probe_embeds_escaped_selector() {
        let script = selector_probe("#onetrust-accept-btn-handler", ElementState::Visible);
        assert!(script.contains(r##"document.querySelector("#onetrust-accept-btn-handler")"##));
        assert!(script.contains("isVisible(el)"));

        let attached = selector_probe("div.a", ElementState::Attached);
        assert_eq!(attached, r#"document.querySelector("div.a") !== null"#);
    }

    #[test]
    fn test_click_text_script_matches_by_text() {
        let script = click_text_script("span", "Stories");
        assert!(script.contains(r#"getElementsByTagName("span")"#));
        assert!(script.contains(r#"includes("Stories")"#));
    }

    #[test]
    fn test_default_options() {
        let options = BrowserOptions::default();
        assert!(options.headless);
        assert!(options.ignore_https_errors);
        assert_eq!(options.default_timeout, Duration::from_secs(60));
        assert!(options.executable.is_none());
    }

    fn options_with(ignore_https_errors: bool) -> BrowserOptions {
        BrowserOptions {
            ignore_https_errors,
            executable: Some(PathBuf::from("/usr/bin/chromium")),
            ..BrowserOptions::default()
        }
    }

    #[test]
    fn test_config_respects_https_errors_when_asked() {
        let config = format!("{:?}", browser_config(&options_with(false)).unwrap());
        assert!(config.contains("ignore_https_errors: false"));
        assert!(!config.contains("--ignore-certificate-errors"));
    }

    #[test]
    fn test_config_ignores_https_errors_by_default() {
        let config = format!("{:?}", browser_config(&options_with(true)).unwrap());
        assert!(config.contains("ignore_https_errors: true"));
        assert!(config.contains("/usr/bin/chromium"));
    }

    #[tokio::test]
    async fn test_poll_until_succeeds_after_retries() {
        let calls = AtomicUsize::new(0);
        let found = poll_until(Duration::from_secs(5), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(n >= 2) }
        })
        .await;
        assert!(found);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_until_times_out() {
        let found = poll_until(Duration::from_millis(10), || async {
            Err(ScrapeError::SelectorNotFound("never".into()))
        })
        .await;
        assert!(!found);
    }
}
