use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::ScanProvider;

/// Scripted provider for tests and local development.
///
/// Submission responses are served from an explicit queue; with
/// `accept_all`, an exhausted queue falls back to generated ids instead
/// of rejections. Results are keyed by external id and absent until set.
#[derive(Debug, Default)]
pub struct MockProvider {
    submit_responses: Mutex<VecDeque<Option<String>>>,
    results: Mutex<HashMap<String, serde_json::Value>>,
    submitted: Mutex<Vec<String>>,
    fetched: Mutex<Vec<String>>,
    accept_all: AtomicBool,
    next_id: AtomicU64,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept every submission with a generated id once the scripted
    /// queue is exhausted.
    pub fn accept_all(self) -> Self {
        self.accept_all.store(true, Ordering::Relaxed);
        self
    }

    /// Queue the response for the next unscripted submission.
    pub fn enqueue_submit(&self, response: Option<&str>) {
        self.submit_responses
            .lock()
            .expect("mock provider mutex poisoned")
            .push_back(response.map(str::to_string));
    }

    /// Make `fetch_result(external_id)` return this payload.
    pub fn set_result(&self, external_id: &str, result: serde_json::Value) {
        self.results
            .lock()
            .expect("mock provider mutex poisoned")
            .insert(external_id.to_string(), result);
    }

    /// URLs submitted so far, in call order.
    pub fn submitted(&self) -> Vec<String> {
        self.submitted
            .lock()
            .expect("mock provider mutex poisoned")
            .clone()
    }

    /// External ids fetched so far, in call order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched
            .lock()
            .expect("mock provider mutex poisoned")
            .clone()
    }
}

#[async_trait]
impl ScanProvider for MockProvider {
    async fn submit(&self, url: &str) -> Option<String> {
        self.submitted
            .lock()
            .expect("mock provider mutex poisoned")
            .push(url.to_string());

        let scripted = self
            .submit_responses
            .lock()
            .expect("mock provider mutex poisoned")
            .pop_front();

        match scripted {
            Some(response) => response,
            None if self.accept_all.load(Ordering::Relaxed) => {
                let n = self.next_id.fetch_add(1, Ordering::Relaxed);
                Some(format!("mock-scan-{n}"))
            }
            None => None,
        }
    }

    async fn fetch_result(&self, external_id: &str) -> Option<serde_json::Value> {
        self.fetched
            .lock()
            .expect("mock provider mutex poisoned")
            .push(external_id.to_string());

        self.results
            .lock()
            .expect("mock provider mutex poisoned")
            .get(external_id)
            .cloned()
    }
}
