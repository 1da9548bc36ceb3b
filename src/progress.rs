//! Stage notifications for extraction and comparison runs.
//!
//! Inject an [`Arc<dyn PipelineObserver>`] via
//! [`crate::config::ProcessorConfigBuilder::observer`] to follow each run
//! through its states. The library itself keeps no session state; a UI that
//! needs to know "where the user is" builds that from these events.
//!
//! # Example
//!
//! ```rust
//! use lease_compare::{PipelineObserver, ProcessorConfig, Stage};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Default)]
//! struct Recorder(Mutex<Vec<Stage>>);
//!
//! impl PipelineObserver for Recorder {
//!     fn on_stage(&self, _document: &str, stage: Stage) {
//!         self.0.lock().unwrap().push(stage);
//!     }
//! }
//!
//! let config = ProcessorConfig::builder()
//!     .api_key("sk-test")
//!     .observer(Arc::new(Recorder::default()))
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;

/// A state of the extraction or comparison state machine.
///
/// Extraction runs `Normalizing → Assembling → Invoking`, then always
/// `Cleanup`, then `Done`. Comparison runs `Assembling → Invoking → Done`.
/// A failure jumps straight to `Cleanup` (extraction) or `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Normalizing,
    Assembling,
    Invoking,
    Cleanup,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Normalizing => "normalizing",
            Stage::Assembling => "assembling",
            Stage::Invoking => "invoking",
            Stage::Cleanup => "cleanup",
            Stage::Done => "done",
        };
        f.write_str(s)
    }
}

/// Receives stage transitions from a [`crate::DocumentProcessor`].
///
/// `document` is the label of the document being extracted, or
/// `"<a> vs <b>"` for a comparison. Two extractions may run concurrently
/// (see [`crate::DocumentProcessor::extract_pair`]), so implementations must
/// synchronise shared state. All methods default to no-ops.
pub trait PipelineObserver: Send + Sync {
    /// Called on entering `stage`.
    fn on_stage(&self, document: &str, stage: Stage) {
        let _ = (document, stage);
    }

    /// Called once after normalisation with the number of rendered pages.
    fn on_pages(&self, document: &str, page_count: usize) {
        let _ = (document, page_count);
    }

    /// Called once when the run has finished. `success` is false when the
    /// run produced the empty sentinel.
    fn on_complete(&self, document: &str, success: bool) {
        let _ = (document, success);
    }
}

/// Observer that ignores every event. Used when none is configured.
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}
