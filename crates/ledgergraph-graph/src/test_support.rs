//! Shared test doubles for the graph crate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use ledgergraph::{Error, Result};
use ledgergraph_bedrock::{Completion, CompletionModel, CompletionRequest, ContentBlock};

/// A completion model that replays canned responses in order, then fails.
pub struct StubModel {
    responses: Mutex<Vec<String>>,
    calls: AtomicUsize,
    fail: bool,
}

impl StubModel {
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses),
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    /// A model that errors on every call, for LLM-free code paths.
    pub fn failing() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionModel for StubModel {
    async fn complete(&self, _request: CompletionRequest) -> Result<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::network("stub model configured to fail"));
        }
        let mut responses = self.responses.lock().unwrap_or_else(|e| e.into_inner());
        if responses.is_empty() {
            return Err(Error::network("stub model exhausted"));
        }
        let text = responses.remove(0);
        Ok(Completion {
            content: vec![ContentBlock::Text(text)],
            stop_reason: Some("end_turn".into()),
        })
    }
}
