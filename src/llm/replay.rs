//! Scripted gateway for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::LlmError;
use crate::llm::{CompletionGateway, CompletionRequest};

/// Replays canned results in order and records every request.
#[derive(Default)]
pub struct ReplayGateway {
    results: Mutex<Vec<Result<Value, String>>>,
    seen: Mutex<Vec<CompletionRequest>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ReplayGateway {
    pub fn new(results: Vec<Value>) -> Self {
        Self {
            results: Mutex::new(results.into_iter().map(Ok).collect()),
            ..Default::default()
        }
    }

    /// Queue a transport failure after the queued results.
    pub fn then_fail(self, reason: &str) -> Self {
        self.results.lock().unwrap().push(Err(reason.to_string()));
        self
    }

    /// Hold every round-trip for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    /// Highest number of round-trips observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionGateway for ReplayGateway {
    async fn complete(&self, request: CompletionRequest) -> Result<Value, LlmError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = {
            let mut results = self.results.lock().unwrap();
            (!results.is_empty()).then(|| results.remove(0))
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match next {
            Some(Ok(value)) => Ok(value),
            Some(Err(reason)) => Err(LlmError::RequestFailed {
                provider: "replay".to_string(),
                reason,
            }),
            None => Err(LlmError::RequestFailed {
                provider: "replay".to_string(),
                reason: "no scripted result left".to_string(),
            }),
        }
    }

    fn provider_name(&self) -> &str {
        "replay"
    }
}

/// A gateway that never answers.
pub struct StalledGateway;

#[async_trait]
impl CompletionGateway for StalledGateway {
    async fn complete(&self, _request: CompletionRequest) -> Result<Value, LlmError> {
        std::future::pending().await
    }

    fn provider_name(&self) -> &str {
        "stalled"
    }
}
