//! Semantic-cache seam.
//!
//! # Data Flow
//! ```text
//! Request body phase:
//!     → add_pending(request_id, model, query)
//!
//! Response body phase:
//!     → update_with_response(request_id, body)   pending → completed
//!     → discard_pending(request_id)               streamed, empty or aborted
//!
//! Later requests:
//!     → get(model, query)                         completed bodies only
//! ```
//!
//! # Design Decisions
//! - The pipeline treats every cache failure as non-fatal
//! - The in-memory implementation matches queries exactly; similarity search
//!   belongs to a real cache backend behind the same trait

use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("no pending entry for request {0}")]
    UnknownRequest(String),
    #[error("request {0} already has a response")]
    AlreadyCompleted(String),
}

/// Call contract for the semantic cache.
pub trait ResponseCache: Send + Sync {
    fn add_pending(&self, request_id: &str, model: &str, query: &str);
    fn update_with_response(&self, request_id: &str, body: &[u8]) -> Result<(), CacheError>;
    /// Drop a pending entry that will never be completed. Completed entries
    /// are kept.
    fn discard_pending(&self, request_id: &str);
    fn get(&self, model: &str, query: &str) -> Option<Bytes>;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    model: String,
    query: String,
    response: Option<Bytes>,
}

/// Process-local cache keyed by request id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryResponseCache {
    inner: Arc<DashMap<String, CacheEntry>>,
}

impl InMemoryResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Number of entries still waiting for a response.
    pub fn pending(&self) -> usize {
        self.inner.iter().filter(|e| e.value().response.is_none()).count()
    }
}

impl ResponseCache for InMemoryResponseCache {
    fn add_pending(&self, request_id: &str, model: &str, query: &str) {
        self.inner.insert(
            request_id.to_string(),
            CacheEntry {
                model: model.to_string(),
                query: query.to_string(),
                response: None,
            },
        );
    }

    fn update_with_response(&self, request_id: &str, body: &[u8]) -> Result<(), CacheError> {
        let mut entry = self
            .inner
            .get_mut(request_id)
            .ok_or_else(|| CacheError::UnknownRequest(request_id.to_string()))?;
        if entry.response.is_some() {
            return Err(CacheError::AlreadyCompleted(request_id.to_string()));
        }
        entry.response = Some(Bytes::copy_from_slice(body));
        Ok(())
    }

    fn discard_pending(&self, request_id: &str) {
        self.inner.remove_if(request_id, |_, entry| entry.response.is_none());
    }

    fn get(&self, model: &str, query: &str) -> Option<Bytes> {
        self.inner.iter().find_map(|entry| {
            let e = entry.value();
            if e.model == model && e.query == query {
                e.response.clone()
            } else {
                None
            }
        })
    }
}

/// Cache that stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl ResponseCache for NoopCache {
    fn add_pending(&self, _request_id: &str, _model: &str, _query: &str) {}

    fn update_with_response(&self, _request_id: &str, _body: &[u8]) -> Result<(), CacheError> {
        Ok(())
    }

    fn discard_pending(&self, _request_id: &str) {}

    fn get(&self, _model: &str, _query: &str) -> Option<Bytes> {
        None
    }
}
