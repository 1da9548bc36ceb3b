//! Extraction and comparison entry points.
//!
//! [`DocumentProcessor`] owns everything that is fixed for a process: the
//! model client, decoding parameters, the workspace root and converter
//! settings. It holds no per-session state; callers keep the records they
//! get back and pass them to [`DocumentProcessor::compare`].
//!
//! Both entry points always complete with an [`Outcome`]. Failures of any
//! stage become [`Outcome::Empty`] carrying the [`LeaseError`]; nothing is
//! raised to the caller.

use crate::config::ProcessorConfig;
use crate::error::{ErrorKind, LeaseError};
use crate::output::{Outcome, PairReport};
use crate::pipeline::input::{stage_input, Document};
use crate::pipeline::llm::{CallStage, ModelInvoker};
use crate::pipeline::messages::{build_comparison_messages, build_extraction_messages};
use crate::pipeline::office::Converter;
use crate::pipeline::render::{normalize_pdf, RenderSettings};
use crate::progress::{NoopObserver, PipelineObserver, Stage};
use crate::provider::{ChatModel, OpenAiChatModel};
use crate::schema::{ComparisonRecord, ExtractionRecord};
use crate::workspace::{Workspace, WorkspaceRoot};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

const FIRST: &str = "Document-1";
const SECOND: &str = "Document-2";

/// Runs the extraction and comparison pipelines.
pub struct DocumentProcessor {
    config: ProcessorConfig,
    invoker: ModelInvoker,
    workspaces: WorkspaceRoot,
    converter: Converter,
    render: RenderSettings,
    observer: Arc<dyn PipelineObserver>,
}

impl std::fmt::Debug for DocumentProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentProcessor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DocumentProcessor {
    /// Create a processor.
    ///
    /// # Errors
    /// [`LeaseError::MissingCredential`] when neither an API key nor a
    /// [`ChatModel`] is configured, so the problem shows up before any
    /// document is processed.
    pub fn new(config: ProcessorConfig) -> Result<Self, LeaseError> {
        let model = resolve_model(&config)?;
        let invoker = ModelInvoker::new(model, &config);
        let observer = config
            .observer
            .clone()
            .unwrap_or_else(|| Arc::new(NoopObserver));

        Ok(Self {
            invoker,
            workspaces: WorkspaceRoot::new(config.workspace_root.clone()),
            converter: Converter {
                program: config.converter_program.clone(),
                timeout_secs: config.conversion_timeout_secs,
            },
            render: RenderSettings {
                dpi: config.dpi,
                max_pixels: config.max_rendered_pixels,
                pdfium_lib_dir: config.pdfium_lib_dir.clone(),
            },
            observer,
            config,
        })
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    // ── Extraction ──────────────────────────────────────────────────────

    /// Extract an [`ExtractionRecord`] from one document.
    ///
    /// The run's workspace is destroyed before this returns, whatever the
    /// outcome. A document with no pages yields the empty sentinel without
    /// calling the model.
    pub async fn extract(&self, document: &Document) -> Outcome<ExtractionRecord> {
        let label = document.label();
        let start = Instant::now();
        info!("Starting extraction: {}", label);

        let result = match self.workspaces.create() {
            Ok(workspace) => {
                let result = self.run_extraction(document, &workspace, &label).await;
                self.observer.on_stage(&label, Stage::Cleanup);
                workspace.destroy();
                result
            }
            Err(e) => Err(e),
        };

        self.finish(&label, &result);
        if result.is_ok() {
            info!("Extraction of {} complete in {:?}", label, start.elapsed());
        }
        result.into()
    }

    async fn run_extraction(
        &self,
        document: &Document,
        workspace: &Workspace,
        label: &str,
    ) -> Result<ExtractionRecord, LeaseError> {
        self.observer.on_stage(label, Stage::Normalizing);
        let staged = stage_input(document, workspace).await?;
        let pdf = if staged.format.needs_conversion() {
            self.converter
                .to_pdf(&staged.path, workspace.path(), label)
                .await?
        } else {
            staged.path
        };

        let normalized = normalize_pdf(&pdf, workspace, &self.render, label).await?;
        self.observer.on_pages(label, normalized.pages.len());
        if normalized.is_empty() {
            return Err(LeaseError::EmptyDocument {
                document: label.to_string(),
            });
        }
        if normalized.text.trim().is_empty() {
            warn!("{} has no text layer; relying on page images only", label);
        }

        self.observer.on_stage(label, Stage::Assembling);
        let messages = build_extraction_messages(&normalized).await?;

        self.observer.on_stage(label, Stage::Invoking);
        self.invoker
            .invoke(messages, CallStage::Extraction, label)
            .await
    }

    // ── Comparison ──────────────────────────────────────────────────────

    /// Compare two extraction outcomes.
    ///
    /// If either is empty the model is not called and the result is empty
    /// with [`LeaseError::MissingComparisonInput`]. Calling this again on the
    /// same pair runs the model again; nothing is cached.
    pub async fn compare(
        &self,
        first: &Outcome<ExtractionRecord>,
        second: &Outcome<ExtractionRecord>,
    ) -> Outcome<ComparisonRecord> {
        self.compare_labeled(first, second, &format!("{FIRST} vs {SECOND}"))
            .await
    }

    /// Compare two records that are known to be present.
    pub async fn compare_records(
        &self,
        first: &ExtractionRecord,
        second: &ExtractionRecord,
    ) -> Outcome<ComparisonRecord> {
        let label = format!("{FIRST} vs {SECOND}");
        let result = self.run_comparison(first, second, &label).await;
        self.finish(&label, &result);
        result.into()
    }

    async fn compare_labeled(
        &self,
        first: &Outcome<ExtractionRecord>,
        second: &Outcome<ExtractionRecord>,
        label: &str,
    ) -> Outcome<ComparisonRecord> {
        info!("Starting comparison: {}", label);
        let result = match (first.record(), second.record()) {
            (Some(a), Some(b)) => self.run_comparison(a, b, label).await,
            (a, b) => {
                let missing = match (a.is_none(), b.is_none()) {
                    (true, true) => format!("{FIRST} and {SECOND}"),
                    (true, false) => FIRST.to_string(),
                    _ => SECOND.to_string(),
                };
                Err(LeaseError::MissingComparisonInput { missing })
            }
        };
        self.finish(label, &result);
        result.into()
    }

    async fn run_comparison(
        &self,
        first: &ExtractionRecord,
        second: &ExtractionRecord,
        label: &str,
    ) -> Result<ComparisonRecord, LeaseError> {
        self.observer.on_stage(label, Stage::Assembling);
        let messages = build_comparison_messages(first, second)?;

        self.observer.on_stage(label, Stage::Invoking);
        self.invoker
            .invoke(messages, CallStage::Comparison, label)
            .await
    }

    // ── Pair ────────────────────────────────────────────────────────────

    /// Extract both documents concurrently, then compare.
    ///
    /// The comparison starts only after both extractions have finished, and
    /// is skipped (empty) when either extraction is empty.
    pub async fn extract_pair(&self, first: &Document, second: &Document) -> PairReport {
        let (a, b) = tokio::join!(self.extract(first), self.extract(second));
        let label = format!("{} vs {}", first.label(), second.label());
        let comparison = self.compare_labeled(&a, &b, &label).await;
        PairReport {
            first: a,
            second: b,
            comparison,
        }
    }

    fn finish<T>(&self, label: &str, result: &Result<T, LeaseError>) {
        self.observer.on_stage(label, Stage::Done);
        self.observer.on_complete(label, result.is_ok());
        if let Err(e) = result {
            // Model failures are logged by the invoker with their stage.
            if e.kind() != ErrorKind::Model {
                error!("{} failed: {}", label, e);
            }
        }
    }
}

fn resolve_model(config: &ProcessorConfig) -> Result<Arc<dyn ChatModel>, LeaseError> {
    if let Some(model) = &config.chat_model {
        return Ok(Arc::clone(model));
    }
    match config.api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => Ok(Arc::new(OpenAiChatModel::new(
            key,
            config.base_url.clone(),
            config.api_timeout_secs,
        )?)),
        _ => Err(LeaseError::MissingCredential),
    }
}
