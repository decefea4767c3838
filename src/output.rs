//! Output types: [`PipelineResult`] and its per-page and aggregate parts.

use crate::document::PageImage;
use crate::error::PageError;
use serde::{Deserialize, Serialize};

/// Where a pipeline run is in its lifecycle.
///
/// ```text
/// Created ─▶ Rasterized ─▶ LanguageDetected ─▶ Extracted ─▶ Done
/// ```
///
/// `LanguageDetected` is reached even when detection fails (the default
/// language is kept). Fatal errors report the stage they interrupted via
/// [`crate::error::IngestError::stage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IngestStage {
    Created,
    Rasterized,
    LanguageDetected,
    Extracted,
    Done,
}

/// How `detected_language` was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LanguageSource {
    /// The classifier ranked this language first on the sample page.
    Classified,
    /// Detection was skipped or failed; the configured default is used.
    Default,
}

/// Outcome of the language-detection stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub language: String,
    pub confidence: Option<f32>,
    pub source: LanguageSource,
}

impl Detection {
    pub fn fallback(default_language: &str) -> Self {
        Self {
            language: default_language.to_string(),
            confidence: None,
            source: LanguageSource::Default,
        }
    }
}

/// Recognised text for one processed page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageText {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Fragments joined with single spaces; empty when recognition failed.
    pub text: String,
    pub fragment_count: usize,
    pub duration_ms: u64,
    pub error: Option<PageError>,
}

impl PageText {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate numbers for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestStats {
    /// Pages produced by rasterisation.
    pub total_pages: usize,
    /// Pages whose recognition succeeded.
    pub processed_pages: usize,
    /// Pages whose recognition failed (empty segment in the output).
    pub failed_pages: usize,
    /// Pages beyond the page cap.
    pub skipped_pages: usize,
    pub rasterize_duration_ms: u64,
    pub detect_duration_ms: u64,
    pub extract_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// The complete result of one `ingest` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Every rasterised page, in physical order. Not serialised.
    #[serde(skip)]
    pub pages: Vec<PageImage>,
    pub detected_language: String,
    pub language_confidence: Option<f32>,
    pub language_source: LanguageSource,
    /// Page texts joined with `\n`, one segment per processed page.
    pub extracted_text: String,
    pub page_texts: Vec<PageText>,
    pub stats: IngestStats,
}

impl PipelineResult {
    /// Number of pages whose recognition failed.
    pub fn failed_pages(&self) -> usize {
        self.stats.failed_pages
    }
}
