//! Identifier generation seam.
//!
//! Story nodes and jobs need fresh identifiers at several points in the
//! orchestration flow; routing them through a trait keeps production on
//! UUID v4 while tests substitute deterministic sequences and assert on
//! exact ids.

use std::sync::atomic::{AtomicU64, Ordering};

/// Source of fresh identifiers.
pub trait IdSource: Send + Sync {
    fn generate(&self) -> String;
}

/// Production source: random UUID v4 strings.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidSource;

impl IdSource for UuidSource {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Deterministic source for tests: `{prefix}-0`, `{prefix}-1`, ...
#[derive(Debug)]
pub struct SequenceIds {
    prefix: String,
    counter: AtomicU64,
}

impl SequenceIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl IdSource for SequenceIds {
    fn generate(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}-{n}", self.prefix)
    }
}
