//! Pipeline stages for agreement extraction and comparison.
//!
//! Each submodule implements one transformation step and is testable on its
//! own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ office ──▶ render ──▶ messages ──▶ llm ──▶ postprocess
//! (stage)   (soffice)  (pdfium)   (prompts)    (API)   (cleanup)
//! ```
//!
//! 1. [`input`]  : sniff the format and stage bytes into the workspace
//! 2. [`office`] : convert word-processor documents to PDF
//! 3. [`render`] : extract page text and rasterise pages; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 4. [`encode`] : PNG-encode pages and wrap them as base64 data URIs
//! 5. [`messages`] : assemble the ordered message sequence
//! 6. [`llm`]    : schema-constrained model call with retry/backoff; the only
//!    stage with network I/O
//! 7. [`postprocess`] : deterministic cleanup of the returned JSON and text

pub mod encode;
pub mod input;
pub mod llm;
pub mod messages;
pub mod office;
pub mod postprocess;
pub mod render;
