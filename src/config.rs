//! Configuration for the extraction and comparison pipelines.
//!
//! Everything a [`crate::DocumentProcessor`] needs is in [`ProcessorConfig`],
//! built through [`ProcessorConfigBuilder`]. The API credential is read once,
//! here, and checked when the processor is constructed: a missing key fails
//! construction instead of surfacing as an empty result on the first call.

use crate::error::LeaseError;
use crate::progress::PipelineObserver;
use crate::provider::ChatModel;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default OpenAI-compatible endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Upper bound accepted for [`ProcessorConfig::max_retries`].
pub const MAX_RETRIES: u32 = 10;

/// Decoding parameters sent with every model call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    /// Near zero but not zero: zero invites repetition loops on long outputs.
    pub temperature: f32,
    pub max_tokens: usize,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.0125,
            max_tokens: 2000,
            frequency_penalty: 0.007,
            presence_penalty: 0.007,
        }
    }
}

/// Configuration for a [`crate::DocumentProcessor`].
///
/// # Example
/// ```rust
/// use lease_compare::ProcessorConfig;
///
/// let config = ProcessorConfig::builder()
///     .api_key("sk-test")
///     .model("gpt-4o-mini")
///     .dpi(150)
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 150);
/// ```
#[derive(Clone)]
pub struct ProcessorConfig {
    /// Model identifier sent to the endpoint. Default: `gpt-4o-mini`.
    pub model: String,

    /// Base URL of the OpenAI-compatible endpoint.
    pub base_url: String,

    /// API key. Redacted in `Debug` output.
    pub api_key: Option<String>,

    /// Decoding parameters.
    pub sampling: SamplingParams,

    /// Rendering DPI used when rasterising pages. Range: 72–400. Default: 150.
    pub dpi: u32,

    /// Cap on the longest edge of a rendered page, in pixels. Default: 2000.
    ///
    /// Applied after DPI scaling so oversized pages stay within the image
    /// budget the vision endpoint accepts.
    pub max_rendered_pixels: u32,

    /// Parent directory for per-run workspaces. Default: `$TMPDIR/lease-compare`.
    pub workspace_root: PathBuf,

    /// Word-processor → PDF converter executable. Default: `soffice`.
    pub converter_program: String,

    /// Timeout for one conversion, in seconds. Default: 120.
    pub conversion_timeout_secs: u64,

    /// Directory containing the pdfium shared library. `None` tries the
    /// working directory, then the system library path.
    pub pdfium_lib_dir: Option<PathBuf>,

    /// Per-request timeout for the model endpoint, in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Retries for transient transport failures (429, 5xx, timeouts). Default: 2.
    ///
    /// Malformed or schema-violating responses are never retried.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Pre-constructed model client. Takes precedence over `api_key`.
    pub chat_model: Option<Arc<dyn ChatModel>>,

    /// Receives stage transitions for each pipeline run.
    pub observer: Option<Arc<dyn PipelineObserver>>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            sampling: SamplingParams::default(),
            dpi: 150,
            max_rendered_pixels: 2000,
            workspace_root: std::env::temp_dir().join("lease-compare"),
            converter_program: "soffice".to_string(),
            conversion_timeout_secs: 120,
            pdfium_lib_dir: None,
            api_timeout_secs: 120,
            max_retries: 2,
            retry_backoff_ms: 500,
            chat_model: None,
            observer: None,
        }
    }
}

impl fmt::Debug for ProcessorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("sampling", &self.sampling)
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("workspace_root", &self.workspace_root)
            .field("converter_program", &self.converter_program)
            .field("pdfium_lib_dir", &self.pdfium_lib_dir)
            .field("max_retries", &self.max_retries)
            .field("chat_model", &self.chat_model.as_ref().map(|_| "<dyn ChatModel>"))
            .finish()
    }
}

impl ProcessorConfig {
    pub fn builder() -> ProcessorConfigBuilder {
        ProcessorConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ProcessorConfig`].
#[derive(Debug)]
pub struct ProcessorConfigBuilder {
    config: ProcessorConfig,
}

impl ProcessorConfigBuilder {
    /// Overlay settings from environment variables.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `OPEN_AI_API_KEY`, then `OPENAI_API_KEY` | `api_key` |
    /// | `LEASE_COMPARE_MODEL` | `model` |
    /// | `OPENAI_BASE_URL` | `base_url` |
    /// | `LEASE_COMPARE_WORKDIR` | `workspace_root` |
    /// | `LEASE_COMPARE_SOFFICE` | `converter_program` |
    /// | `PDFIUM_LIB_PATH` | `pdfium_lib_dir` |
    pub fn from_env(self) -> Self {
        self.from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("OPEN_AI_API_KEY").or_else(|| get("OPENAI_API_KEY")) {
            self.config.api_key = Some(key);
        }
        if let Some(model) = get("LEASE_COMPARE_MODEL") {
            self.config.model = model;
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.config.base_url = url;
        }
        if let Some(dir) = get("LEASE_COMPARE_WORKDIR") {
            self.config.workspace_root = PathBuf::from(dir);
        }
        if let Some(program) = get("LEASE_COMPARE_SOFFICE") {
            self.config.converter_program = program;
        }
        if let Some(dir) = get("PDFIUM_LIB_PATH") {
            self.config.pdfium_lib_dir = Some(PathBuf::from(dir));
        }
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn sampling(mut self, sampling: SamplingParams) -> Self {
        self.config.sampling = sampling;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.workspace_root = root.into();
        self
    }

    pub fn converter_program(mut self, program: impl Into<String>) -> Self {
        self.config.converter_program = program.into();
        self
    }

    pub fn conversion_timeout_secs(mut self, secs: u64) -> Self {
        self.config.conversion_timeout_secs = secs;
        self
    }

    pub fn pdfium_lib_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_dir = Some(dir.into());
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn chat_model(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.config.chat_model = Some(model);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ProcessorConfig, LeaseError> {
        let c = &self.config;
        let s = &c.sampling;
        if !(s.temperature > 0.0 && s.temperature <= 2.0) {
            return Err(LeaseError::InvalidConfig(format!(
                "temperature must be in (0, 2], got {}",
                s.temperature
            )));
        }
        if s.max_tokens == 0 {
            return Err(LeaseError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        for (name, v) in [
            ("frequency_penalty", s.frequency_penalty),
            ("presence_penalty", s.presence_penalty),
        ] {
            if !(-2.0..=2.0).contains(&v) {
                return Err(LeaseError::InvalidConfig(format!(
                    "{name} must be in [-2, 2], got {v}"
                )));
            }
        }
        if c.model.trim().is_empty() {
            return Err(LeaseError::InvalidConfig("model must not be empty".into()));
        }
        if c.api_timeout_secs == 0 || c.conversion_timeout_secs == 0 {
            return Err(LeaseError::InvalidConfig("timeouts must be ≥ 1s".into()));
        }
        if c.max_retries > MAX_RETRIES {
            return Err(LeaseError::InvalidConfig(format!(
                "max_retries must be ≤ {MAX_RETRIES}, got {}",
                c.max_retries
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_deterministic_decoding() {
        let c = ProcessorConfig::default();
        assert_eq!(c.model, "gpt-4o-mini");
        assert_eq!(c.sampling.temperature, 0.0125);
        assert_eq!(c.sampling.max_tokens, 2000);
        assert_eq!(c.sampling.frequency_penalty, 0.007);
        assert_eq!(c.sampling.presence_penalty, 0.007);
        assert!(c.api_key.is_none());
    }

    #[test]
    fn zero_temperature_is_rejected() {
        let err = ProcessorConfig::builder()
            .sampling(SamplingParams {
                temperature: 0.0,
                ..Default::default()
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, LeaseError::InvalidConfig(_)));
    }

    #[test]
    fn excessive_retries_are_rejected() {
        let err = ProcessorConfig::builder()
            .max_retries(u32::MAX)
            .build()
            .unwrap_err();
        assert!(matches!(err, LeaseError::InvalidConfig(_)));
        assert!(ProcessorConfig::builder()
            .max_retries(MAX_RETRIES)
            .build()
            .is_ok());
    }

    #[test]
    fn dpi_is_clamped() {
        let c = ProcessorConfig::builder().dpi(1000).build().unwrap();
        assert_eq!(c.dpi, 400);
        let c = ProcessorConfig::builder().dpi(10).build().unwrap();
        assert_eq!(c.dpi, 72);
    }

    #[test]
    fn env_prefers_original_key_name() {
        let env: HashMap<&str, &str> = [
            ("OPEN_AI_API_KEY", "sk-original"),
            ("OPENAI_API_KEY", "sk-standard"),
            ("LEASE_COMPARE_MODEL", "gpt-4o"),
            ("PDFIUM_LIB_PATH", "/opt/pdfium/lib"),
        ]
        .into_iter()
        .collect();
        let c = ProcessorConfig::builder()
            .from_lookup(|k| env.get(k).map(|v| v.to_string()))
            .build()
            .unwrap();
        assert_eq!(c.api_key.as_deref(), Some("sk-original"));
        assert_eq!(c.model, "gpt-4o");
        assert_eq!(c.pdfium_lib_dir, Some(PathBuf::from("/opt/pdfium/lib")));
    }

    #[test]
    fn env_falls_back_and_ignores_blank() {
        let env: HashMap<&str, &str> =
            [("OPEN_AI_API_KEY", "  "), ("OPENAI_API_KEY", "sk-standard")]
                .into_iter()
                .collect();
        let c = ProcessorConfig::builder()
            .from_lookup(|k| env.get(k).map(|v| v.to_string()))
            .build()
            .unwrap();
        assert_eq!(c.api_key.as_deref(), Some("sk-standard"));
    }

    #[test]
    fn debug_redacts_key() {
        let c = ProcessorConfig::builder().api_key("sk-secret").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("<redacted>"));
    }
}
