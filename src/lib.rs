//! # lease-compare
//!
//! Extract structured terms from rental agreements with a vision LLM and
//! compare two agreements field by field.
//!
//! ## Why images and text?
//!
//! Leases arrive as scanned PDFs, exported Word files and everything in
//! between. The text layer alone misses stamps, tables and handwritten
//! amendments; images alone miss exact figures in small print. Each page is
//! therefore sent as an image, followed by the text pdfium could recover, and
//! the model answers under a strict JSON Schema that is validated again on
//! receipt.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Document (bytes or path)
//!  │
//!  ├─ 1. Stage     sniff format, write into a per-run workspace
//!  ├─ 2. Convert   DOCX/DOC/ODT/RTF → PDF via headless LibreOffice
//!  ├─ 3. Render    page text + one PNG per page via pdfium (spawn_blocking)
//!  ├─ 4. Assemble  system → page images → text → format reminder
//!  ├─ 5. Invoke    schema-constrained chat completion, transient retries
//!  ├─ 6. Validate  serde + contract checks, whitespace cleanup
//!  └─ 7. Cleanup   workspace removed on every exit path
//! ```
//!
//! Comparison skips steps 1–3: both records are serialised into the prompt.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lease_compare::{Document, DocumentProcessor, ProcessorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ProcessorConfig::builder().from_env().build()?;
//!     let processor = DocumentProcessor::new(config)?;
//!
//!     let a = processor.extract(&Document::from_path("lease-a.pdf")).await;
//!     let b = processor.extract(&Document::from_path("lease-b.docx")).await;
//!     let report = processor.compare(&a, &b).await;
//!
//!     match report.record() {
//!         Some(r) => println!("{}", serde_json::to_string_pretty(r)?),
//!         None => eprintln!("comparison failed: {:?}", report.failure()),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Empty results
//!
//! [`DocumentProcessor::extract`] and [`DocumentProcessor::compare`] never
//! return `Err`. A failed run yields [`Outcome::Empty`], which serialises as
//! `{}` and carries the [`LeaseError`] that caused it. Only
//! [`DocumentProcessor::new`] fails eagerly (missing API key, bad config).
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `lease-compare` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! lease-compare = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod processor;
pub mod progress;
pub mod prompts;
pub mod provider;
pub mod schema;
pub mod workspace;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ProcessorConfig, ProcessorConfigBuilder, SamplingParams};
pub use error::{ErrorKind, LeaseError, ModelError};
pub use output::{Outcome, PairReport};
pub use pipeline::input::{Document, DocumentFormat};
pub use pipeline::render::{NormalizedDocument, PageImage};
pub use processor::DocumentProcessor;
pub use progress::{NoopObserver, PipelineObserver, Stage};
pub use provider::{ChatMessage, ChatModel, ChatRequest, OpenAiChatModel, Role};
pub use schema::{
    AgreementField, ComparisonEntry, ComparisonRecord, CriticalTerm, ExtractionRecord,
    SchemaContract, UtilitiesResponsibility,
};
pub use workspace::{Workspace, WorkspaceRoot};
