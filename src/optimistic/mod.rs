//! Optimistic mutations
//!
//! Every create, update and delete in the views runs the same protocol:
//!
//! ```text
//! validate ──► speculate ──► patch caches ──► await gateway ─┬─► swap in authoritative record
//!    │                                                       │   (tokens committed)
//!    └─► notify, nothing patched                             └─► undo every token, notify
//! ```
//!
//! The await is the only suspension point. Between patch and settlement any
//! reader sees the speculative state.

mod coordinator;

pub use coordinator::MutationCoordinator;

use crate::cache::{QueryKey, Tag};

/// What one mutation touches and how it reports.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationSpec {
    /// Log label, e.g. "create_project"
    pub operation: &'static str,
    /// Query results patched speculatively, in this order
    pub keys: Vec<QueryKey>,
    /// Tags invalidated once the mutation settles
    pub invalidate: Vec<Tag>,
    /// Error title, and the detail when the backend gave no message
    pub fallback: String,
    /// Success notification title; `None` stays quiet
    pub success: Option<String>,
}

impl MutationSpec {
    pub fn new(operation: &'static str, fallback: impl Into<String>) -> Self {
        Self {
            operation,
            keys: Vec::new(),
            invalidate: Vec::new(),
            fallback: fallback.into(),
            success: None,
        }
    }

    pub fn patch(mut self, key: QueryKey) -> Self {
        if !self.keys.contains(&key) {
            self.keys.push(key);
        }
        self
    }

    pub fn invalidate(mut self, tag: Tag) -> Self {
        if !self.invalidate.contains(&tag) {
            self.invalidate.push(tag);
        }
        self
    }

    pub fn on_success(mut self, title: impl Into<String>) -> Self {
        self.success = Some(title.into());
        self
    }
}
