//! Error types for the lease-compare library.
//!
//! Two error types mirror the two boundaries of the pipeline:
//!
//! * [`LeaseError`]: everything that can stop a single extraction or
//!   comparison (bad input, failed conversion, model failure, missing
//!   precondition). The pipelines never return it as `Err`; it travels inside
//!   [`crate::output::Outcome::Empty`] so callers detect failure by checking
//!   for the empty sentinel. Only construction-time problems (missing API key,
//!   invalid configuration) surface as `Err(LeaseError)`.
//!
//! * [`ModelError`]: failures at the model endpoint boundary (transport,
//!   HTTP status, malformed or schema-violating payloads). Wrapped into
//!   [`LeaseError::Model`] by the Model Invoker.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`LeaseError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing, unreadable, corrupt or empty document; workspace I/O.
    Input,
    /// Word-processor → PDF conversion failed.
    Conversion,
    /// Endpoint unreachable, bad status, malformed or non-conforming response.
    Model,
    /// Comparison requested without two extraction records.
    Precondition,
    /// Missing credential or invalid configuration.
    Config,
    /// Unexpected internal failure (task panic etc.).
    Internal,
}

/// All failures produced by the lease-compare library.
#[derive(Debug, Error)]
pub enum LeaseError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The document is neither a PDF nor a supported word-processor format.
    #[error("Unsupported document format for '{document}': {detail}")]
    UnsupportedFormat { document: String, detail: String },

    /// pdfium could not open the (possibly converted) PDF.
    #[error("Document '{document}' is corrupt or unreadable: {detail}")]
    CorruptDocument { document: String, detail: String },

    /// The document has no pages, so there is nothing to send to the model.
    #[error("Document '{document}' has no pages; nothing to extract")]
    EmptyDocument { document: String },

    /// Page rasterisation failed for a specific page.
    #[error("Rasterisation failed for page {page} of '{document}': {detail}")]
    RasterisationFailed {
        document: String,
        page: usize,
        detail: String,
    },

    /// Creating or writing into a workspace failed.
    #[error("Workspace I/O failed at '{path}': {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Conversion errors ─────────────────────────────────────────────────
    /// The external converter binary could not be started.
    #[error("Document converter '{program}' is not available: {detail}\nInstall LibreOffice or set LEASE_COMPARE_SOFFICE.")]
    ConverterUnavailable { program: String, detail: String },

    /// The converter ran but did not produce a PDF.
    #[error("Failed to convert '{document}' to PDF: {detail}")]
    ConversionFailed { document: String, detail: String },

    /// The converter did not finish within the configured timeout.
    #[error("Conversion of '{document}' timed out after {secs}s")]
    ConversionTimeout { document: String, secs: u64 },

    // ── Model errors ──────────────────────────────────────────────────────
    /// The model call failed or returned a non-conforming payload.
    #[error("Model call failed during {stage} of '{document}': {source}")]
    Model {
        stage: String,
        document: String,
        #[source]
        source: ModelError,
    },

    // ── Precondition errors ───────────────────────────────────────────────
    /// Comparison needs two extraction records; at least one is empty.
    #[error("Cannot compare: extraction record for {missing} is empty")]
    MissingComparisonInput { missing: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// No API credential for the model endpoint.
    #[error("No API key configured for the model endpoint.\nSet OPEN_AI_API_KEY (or OPENAI_API_KEY) or pass one to the builder.")]
    MissingCredential,

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not bind to a pdfium library.
    #[error("Failed to bind to pdfium library: {0}\nSet PDFIUM_LIB_PATH to the directory holding libpdfium.")]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LeaseError {
    /// Which failure class this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LeaseError::FileNotFound { .. }
            | LeaseError::PermissionDenied { .. }
            | LeaseError::UnsupportedFormat { .. }
            | LeaseError::CorruptDocument { .. }
            | LeaseError::EmptyDocument { .. }
            | LeaseError::RasterisationFailed { .. }
            | LeaseError::Workspace { .. } => ErrorKind::Input,
            LeaseError::ConverterUnavailable { .. }
            | LeaseError::ConversionFailed { .. }
            | LeaseError::ConversionTimeout { .. } => ErrorKind::Conversion,
            LeaseError::Model { .. } => ErrorKind::Model,
            LeaseError::MissingComparisonInput { .. } => ErrorKind::Precondition,
            LeaseError::MissingCredential
            | LeaseError::InvalidConfig(_)
            | LeaseError::PdfiumBindingFailed(_) => ErrorKind::Config,
            LeaseError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn workspace(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LeaseError::Workspace {
            path: path.into(),
            source,
        }
    }
}

/// A failure at the model endpoint boundary.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    /// Connection refused, DNS failure, TLS error, ...
    #[error("transport error: {0}")]
    Transport(String),

    /// The request did not complete in time.
    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The endpoint answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The response carried no choices or no content.
    #[error("response contained no content")]
    EmptyResponse,

    /// The model declined to answer.
    #[error("model refused: {0}")]
    Refusal(String),

    /// The content was not valid JSON.
    #[error("response is not valid JSON: {0}")]
    MalformedJson(String),

    /// The JSON did not match the target schema.
    #[error("response violates schema: {}", .0.join("; "))]
    SchemaViolation(Vec<String>),
}

impl ModelError {
    /// Whether retrying the same request may succeed.
    ///
    /// Only transport-level failures qualify. A payload that failed parsing or
    /// validation is never retried.
    pub fn is_transient(&self) -> bool {
        match self {
            ModelError::Transport(_) | ModelError::Timeout { .. } => true,
            ModelError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
