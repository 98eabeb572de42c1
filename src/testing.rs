//! In-memory stand-ins for the browser and HTTP collaborators.

use crate::browser::{Browser, BrowserPage, ElementState, LoadState, WaitUntil};
use crate::config::Settings;
use crate::error::{Result, ScrapeError};
use crate::fetch::{FetchedAsset, HttpFetch};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Settings pointing at `output_dir` with every wait shortened to zero.
pub fn fast_settings(output_dir: &Path) -> Settings {
    Settings {
        output_dir: output_dir.to_string_lossy().into_owned(),
        consent_timeout_secs: 0,
        search_overlay_pause_ms: 0,
        load_timeout_secs: 0,
        filter_timeout_secs: 0,
        results_timeout_secs: 0,
        results_settle_secs: 0,
        date_settle_secs: 0,
        ..Settings::default()
    }
}

#[derive(Default)]
pub struct FakeState {
    documents: HashMap<String, String>,
    selectors: HashSet<String>,
    texts: HashSet<String>,
    failing: HashSet<String>,
    actions: Mutex<Vec<String>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
    shut_down: AtomicBool,
}

/// A browser serving canned documents keyed by URL.
///
/// Selectors registered with [`FakeBrowser::with_selector`] exist on every page;
/// clicking anything else fails with [`ScrapeError::SelectorNotFound`].
pub struct FakeBrowser {
    state: Arc<FakeState>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self {
            state: Arc::new(FakeState::default()),
        }
    }

    fn state_mut(&mut self) -> &mut FakeState {
        Arc::get_mut(&mut self.state).expect("configure the fake before opening pages")
    }

    pub fn with_document(mut self, url: &str, html: &str) -> Self {
        self.state_mut()
            .documents
            .insert(url.to_string(), html.to_string());
        self
    }

    pub fn with_selector(mut self, selector: &str) -> Self {
        self.state_mut().selectors.insert(selector.to_string());
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.state_mut().texts.insert(text.to_string());
        self
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.state_mut().failing.insert(url.to_string());
        self
    }

    pub fn actions(&self) -> Vec<String> {
        self.state.actions.lock().unwrap().clone()
    }

    pub fn opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.shut_down.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>> {
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePage {
            state: Arc::clone(&self.state),
            current: Mutex::new(None),
        }))
    }

    async fn clear_cookies(&self) -> Result<()> {
        self.state.actions.lock().unwrap().push("clear_cookies".to_string());
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        self.state.shut_down.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakePage {
    state: Arc<FakeState>,
    current: Mutex<Option<String>>,
}

impl FakePage {
    fn record(&self, action: String) {
        self.state.actions.lock().unwrap().push(action);
    }

    fn require(&self, selector: &str) -> Result<()> {
        if self.state.selectors.contains(selector) {
            Ok(())
        } else {
            Err(ScrapeError::SelectorNotFound(selector.to_string()))
        }
    }
}

#[async_trait]
impl BrowserPage for FakePage {
    async fn goto(&self, url: &str, _wait_until: WaitUntil) -> Result<()> {
        self.record(format!("goto {url}"));
        if self.state.failing.contains(url) {
            return Err(ScrapeError::NavigationTimeout {
                what: url.to_string(),
                timeout: Duration::from_secs(0),
            });
        }
        *self.current.lock().unwrap() = Some(url.to_string());
        Ok(())
    }

    async fn fill(&self, selector: &str, text: &str) -> Result<()> {
        self.require(selector)?;
        self.record(format!("fill {selector}={text}"));
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.require(selector)?;
        self.record(format!("click {selector}"));
        Ok(())
    }

    async fn press(&self, selector: &str, key: &str) -> Result<()> {
        self.require(selector)?;
        self.record(format!("press {selector}:{key}"));
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        _state: ElementState,
        _timeout: Duration,
    ) -> Result<bool> {
        Ok(self.state.selectors.contains(selector))
    }

    async fn click_text(&self, tag: &str, text: &str, _timeout: Duration) -> Result<bool> {
        if self.state.texts.contains(text) {
            self.record(format!("click_text {tag}:{text}"));
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn wait_for_load_state(&self, _state: LoadState, _timeout: Duration) -> Result<bool> {
        Ok(true)
    }

    async fn content(&self) -> Result<String> {
        let current = self.current.lock().unwrap().clone();
        current
            .and_then(|url| self.state.documents.get(&url).cloned())
            .ok_or_else(|| ScrapeError::Parse("no document loaded".to_string()))
    }

    async fn close(&self) -> Result<()> {
        self.state.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Serves canned responses; unknown URLs answer 404.
#[derive(Default)]
pub struct FakeFetcher {
    assets: HashMap<String, FetchedAsset>,
    requested: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asset(
        mut self,
        url: &str,
        status: u16,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Self {
        self.assets.insert(
            url.to_string(),
            FetchedAsset {
                status,
                content_type: content_type.map(str::to_string),
                bytes: bytes.to_vec(),
            },
        );
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpFetch for FakeFetcher {
    async fn get(&self, url: &str) -> Result<FetchedAsset> {
        self.requested.lock().unwrap().push(url.to_string());
        Ok(self.assets.get(url).cloned().unwrap_or(FetchedAsset {
            status: 404,
            content_type: None,
            bytes: Vec::new(),
        }))
    }
}
