//! Configuration types for document ingestion.
//!
//! All ingestion behaviour is controlled through [`IngestConfig`], built via
//! its [`IngestConfigBuilder`]. One struct carries every knob so a config can
//! be shared across concurrent runs and logged as a whole.

use crate::error::IngestError;
use crate::lang;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Languages sampled for detection when the caller does not choose.
pub const DEFAULT_SUPPORTED_LANGUAGES: &[&str] = &["en", "fr", "de", "es", "it"];

/// Configuration for one or more ingestion runs.
///
/// Built via [`IngestConfig::builder()`] or using [`IngestConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_ingest::IngestConfig;
///
/// let config = IngestConfig::builder()
///     .dpi(200)
///     .page_cap(3)
///     .supported_languages(["en", "fr"])
///     .build()
///     .unwrap();
/// assert_eq!(config.page_cap, Some(3));
/// ```
#[derive(Clone)]
pub struct IngestConfig {
    /// Rendering resolution for multi-page documents, in samples per inch.
    /// Range: 72–600. Default: 300.
    ///
    /// OCR accuracy drops quickly below ~200 DPI on body text; 300 is the
    /// usual scanning resolution and what recognition models are trained on.
    pub dpi: u32,

    /// Longest rendered edge in pixels. Default: 4000.
    ///
    /// Caps memory on oversized pages (posters, plans) independently of DPI.
    pub max_rendered_pixels: u32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Maximum number of pages to run full recognition on. Default: None (all).
    ///
    /// Every page is still rasterised; only extraction is capped.
    pub page_cap: Option<usize>,

    /// ISO 639-1 codes the detector may choose from. Default: en, fr, de, es, it.
    pub supported_languages: Vec<String>,

    /// Language used when detection is skipped or fails. Default: "en".
    pub default_language: String,

    /// Pages recognised per batch. Default: 4.
    ///
    /// Bounds how many pages are in flight at once; never changes output.
    pub batch_size: usize,

    /// Concurrent recognition calls within a batch. Default: 2.
    pub concurrency: usize,

    /// Which recognition engine to construct. Default: [`EngineBackend::Vision`].
    pub engine: EngineBackend,

    /// Directory containing the pdfium shared library.
    /// Falls back to `PDFIUM_LIB_PATH`, then the system library.
    pub pdfium_library_path: Option<PathBuf>,

    /// LLM model identifier for the vision engine and the agent.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for LLM calls. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per call. Default: 4096.
    pub max_tokens: usize,

    /// Per-LLM-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Per-page and per-stage progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            max_rendered_pixels: 4000,
            password: None,
            page_cap: None,
            supported_languages: DEFAULT_SUPPORTED_LANGUAGES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            default_language: "en".to_string(),
            batch_size: 4,
            concurrency: 2,
            engine: EngineBackend::default(),
            pdfium_library_path: None,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 4096,
            api_timeout_secs: 60,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("page_cap", &self.page_cap)
            .field("supported_languages", &self.supported_languages)
            .field("default_language", &self.default_language)
            .field("batch_size", &self.batch_size)
            .field("concurrency", &self.concurrency)
            .field("engine", &self.engine)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("progress_callback", &self.progress_callback.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl IngestConfig {
    /// Create a new builder for `IngestConfig`.
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder {
            config: Self::default(),
        }
    }

    /// Check the invariants `ingest` relies on.
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.dpi < 72 || self.dpi > 600 {
            return Err(IngestError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                self.dpi
            )));
        }
        if self.batch_size == 0 {
            return Err(IngestError::InvalidConfig("Batch size must be ≥ 1".into()));
        }
        if self.concurrency == 0 {
            return Err(IngestError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if self.page_cap == Some(0) {
            return Err(IngestError::InvalidConfig("Page cap must be ≥ 1".into()));
        }
        if self.supported_languages.is_empty() {
            return Err(IngestError::InvalidConfig(
                "At least one supported language is required".into(),
            ));
        }
        for code in &self.supported_languages {
            if lang::lookup(code).is_none() {
                return Err(IngestError::InvalidConfig(format!(
                    "Unknown language code '{code}'"
                )));
            }
        }
        if !self.supports(&self.default_language) {
            return Err(IngestError::InvalidConfig(format!(
                "Default language '{}' is not in the supported set {:?}",
                self.default_language, self.supported_languages
            )));
        }
        Ok(())
    }

    /// Whether `code` belongs to the supported set (case-insensitive).
    pub fn supports(&self, code: &str) -> bool {
        self.supported_languages
            .iter()
            .any(|s| s.eq_ignore_ascii_case(code))
    }

    /// Number of pages extraction will process out of `total`.
    pub fn pages_to_extract(&self, total: usize) -> usize {
        self.page_cap.map_or(total, |cap| cap.min(total))
    }
}

/// Builder for [`IngestConfig`].
#[derive(Debug)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn page_cap(mut self, cap: usize) -> Self {
        self.config.page_cap = Some(cap);
        self
    }

    pub fn no_page_cap(mut self) -> Self {
        self.config.page_cap = None;
        self
    }

    pub fn supported_languages<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.supported_languages = codes
            .into_iter()
            .map(|c| c.into().trim().to_ascii_lowercase())
            .collect();
        self
    }

    pub fn default_language(mut self, code: impl Into<String>) -> Self {
        self.config.default_language = code.into().trim().to_ascii_lowercase();
        self
    }

    pub fn batch_size(mut self, n: usize) -> Self {
        self.config.batch_size = n.max(1);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn engine(mut self, engine: EngineBackend) -> Self {
        self.config.engine = engine;
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<IngestConfig, IngestError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which text-recognition engine the default pipeline constructs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineBackend {
    /// A vision LLM transcribes each page (needs an API key or local model).
    #[default]
    Vision,
    /// Local libtesseract (crate feature `tesseract`).
    Tesseract {
        /// `tessdata` directory; None uses Tesseract's compiled-in default.
        datapath: Option<PathBuf>,
    },
}
