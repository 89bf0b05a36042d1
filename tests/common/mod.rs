//! Scripted in-memory browser session for driving the orchestrator.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedSender};

use listacquire::session::{
    InterceptedRequest, Key, Locator, RequestStream, Session, SessionLauncher,
};
use listacquire::site::{SiteProfile, GRAPHQL_ENDPOINT};
use listacquire::Settings;

/// How the fake page behaves.
#[derive(Debug, Clone, Default)]
pub struct Script {
    /// Sizes of the batches the page requests, in order.
    pub batch_sizes: Vec<usize>,
    /// Send unrelated and malformed requests around every batch.
    pub noise: bool,
    pub private: bool,
    pub owner: Option<String>,
    pub fail_launch: bool,
    pub fail_navigation: bool,
    /// Rows never appear, however often End is pressed.
    pub rows_never_render: bool,
    /// Drop the traffic stream right after navigation.
    pub close_traffic_after_goto: bool,
    /// Send one more full batch right after the final one.
    pub late_batch: bool,
    /// Index of a batch whose last entry is `null` instead of an identifier.
    pub null_entry_batch: Option<usize>,
}

/// Observations shared between the fake and the test.
#[derive(Debug, Default)]
pub struct Recorder {
    pub launches: AtomicUsize,
    pub closes: AtomicUsize,
    pub presses: AtomicUsize,
    pub body_reads: AtomicUsize,
    pub scrolled_rows: Mutex<Vec<usize>>,
    pub navigations: Mutex<Vec<String>>,
}

impl Recorder {
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn presses(&self) -> usize {
        self.presses.load(Ordering::SeqCst)
    }

    pub fn body_reads(&self) -> usize {
        self.body_reads.load(Ordering::SeqCst)
    }

    pub fn scrolled_rows(&self) -> Vec<usize> {
        self.scrolled_rows.lock().unwrap().clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }
}

/// Identifier for the n-th row (0-based) the fake page serves.
pub fn row_id(n: usize) -> String {
    format!("tt{:07}", n)
}

/// Identifiers of the first `count` rows, in order.
pub fn expected_ids(count: usize) -> Vec<String> {
    (0..count).map(row_id).collect()
}

/// Settings suitable for the fake: short deadline, fast polling.
pub fn test_settings(timeout: Duration) -> Settings {
    Settings {
        timeout,
        poll_interval: Duration::from_millis(1),
        ..Default::default()
    }
}

pub struct FakeLauncher {
    script: Script,
    recorder: Arc<Recorder>,
}

impl FakeLauncher {
    pub fn new(script: Script) -> (Self, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        (
            Self {
                script,
                recorder: Arc::clone(&recorder),
            },
            recorder,
        )
    }
}

#[async_trait]
impl SessionLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn Session>> {
        if self.script.fail_launch {
            bail!("Chrome/Chromium not found");
        }
        self.recorder.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            script: self.script.clone(),
            recorder: Arc::clone(&self.recorder),
            site: SiteProfile::default(),
            page: Mutex::new(PageState::default()),
        }))
    }
}

#[derive(Default)]
struct PageState {
    tx: Option<UnboundedSender<InterceptedRequest>>,
    next_batch: usize,
    served_rows: usize,
    rendered_rows: usize,
    request_seq: usize,
}

pub struct FakeSession {
    script: Script,
    recorder: Arc<Recorder>,
    site: SiteProfile,
    page: Mutex<PageState>,
}

impl FakeSession {
    fn send(page: &mut PageState, method: &str, url: &str, body: Option<String>) {
        page.request_seq += 1;
        let request = InterceptedRequest {
            request_id: format!("req-{}", page.request_seq),
            method: method.to_string(),
            url: url.to_string(),
            has_post_data: body.is_some(),
            post_data: body,
        };
        if let Some(tx) = &page.tx {
            let _ = tx.send(request);
        }
    }

    fn send_noise(page: &mut PageState) {
        Self::send(page, "GET", GRAPHQL_ENDPOINT, None);
        Self::send(
            page,
            "POST",
            "https://www.imdb.com/api/metrics",
            Some(r#"{"variables":{"idArray":["tt9999999"]}}"#.to_string()),
        );
        Self::send(page, "POST", GRAPHQL_ENDPOINT, Some("not json".to_string()));
        Self::send(page, "POST", GRAPHQL_ENDPOINT, Some(r#"{"variables":{}}"#.to_string()));
        Self::send(
            page,
            "POST",
            GRAPHQL_ENDPOINT,
            Some(r#"{"variables":{"idArray":"tt1"}}"#.to_string()),
        );
        Self::send(
            page,
            "POST",
            GRAPHQL_ENDPOINT,
            Some(r#"{"variables":{"idArray":[]}}"#.to_string()),
        );
    }

    fn send_rows(page: &mut PageState, size: usize, null_last: bool) {
        let mut ids: Vec<serde_json::Value> = (page.served_rows..page.served_rows + size)
            .map(|n| serde_json::Value::from(row_id(n)))
            .collect();
        if null_last {
            if let Some(last) = ids.last_mut() {
                *last = serde_json::Value::Null;
            }
        }
        page.served_rows += size;
        let body = serde_json::json!({
            "operationName": "TitleListMainPage",
            "variables": { "idArray": ids },
        });
        Self::send(page, "POST", GRAPHQL_ENDPOINT, Some(body.to_string()));
    }

    /// Request the next scripted batch, if any remain.
    fn serve_next_batch(&self, page: &mut PageState) {
        let Some(&size) = self.script.batch_sizes.get(page.next_batch) else {
            return;
        };
        let index = page.next_batch;
        page.next_batch += 1;

        if self.script.noise {
            Self::send_noise(page);
        }
        Self::send_rows(page, size, self.script.null_entry_batch == Some(index));

        let is_last = page.next_batch == self.script.batch_sizes.len();
        if is_last && self.script.late_batch {
            Self::send_rows(page, self.site.page_threshold, false);
        }
    }
}

#[async_trait]
impl Session for FakeSession {
    async fn subscribe_requests(&mut self) -> Result<RequestStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.page.lock().unwrap().tx = Some(tx);
        Ok(rx)
    }

    async fn post_data(&self, request: &InterceptedRequest) -> Result<Option<String>> {
        self.recorder.body_reads.fetch_add(1, Ordering::SeqCst);
        Ok(request.post_data.clone())
    }

    async fn goto(&self, url: &str) -> Result<()> {
        self.recorder.navigations.lock().unwrap().push(url.to_string());
        if self.script.fail_navigation {
            bail!("net::ERR_NAME_NOT_RESOLVED");
        }

        let mut page = self.page.lock().unwrap();
        self.serve_next_batch(&mut page);
        if self.script.close_traffic_after_goto {
            page.tx = None;
        }
        Ok(())
    }

    async fn is_visible(&self, locator: &Locator) -> Result<bool> {
        let page = self.page.lock().unwrap();
        Ok(match locator {
            Locator::Text(text) => {
                self.script.private && self.site.private_markers.iter().any(|m| m == text)
            }
            Locator::TestId(id) => *id == self.site.owner_test_id && self.script.owner.is_some(),
            Locator::RowLink(n) => *n <= page.rendered_rows,
        })
    }

    async fn inner_text(&self, locator: &Locator) -> Result<Option<String>> {
        Ok(match locator {
            Locator::TestId(id) if *id == self.site.owner_test_id => self.script.owner.clone(),
            _ => None,
        })
    }

    async fn scroll_into_view(&self, locator: &Locator) -> Result<()> {
        let Locator::RowLink(n) = locator else {
            bail!("unexpected scroll target {:?}", locator);
        };
        self.recorder.scrolled_rows.lock().unwrap().push(*n);
        let mut page = self.page.lock().unwrap();
        self.serve_next_batch(&mut page);
        Ok(())
    }

    async fn press(&self, key: Key) -> Result<()> {
        assert_eq!(key, Key::End);
        self.recorder.presses.fetch_add(1, Ordering::SeqCst);
        {
            let mut page = self.page.lock().unwrap();
            if !self.script.rows_never_render {
                page.rendered_rows = page.served_rows;
            }
        }
        tokio::task::yield_now().await;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.recorder.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
