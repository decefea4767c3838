//! Eager (whole-document) ingestion entry points.
//!
//! [`Pipeline`] owns the three collaborators a run needs: a rasteriser, an
//! engine cache and a language classifier. One pipeline can serve many
//! documents concurrently; the engine cache is the only shared state.
//!
//! Use [`crate::stream`] instead when pages should be consumed as they are
//! recognised.

use crate::config::IngestConfig;
use crate::document::{Document, DocumentKind, PageImage};
use crate::error::IngestError;
use crate::lang::{LanguageClassifier, StopwordClassifier};
use crate::output::{Detection, IngestStage, IngestStats, PipelineResult};
use crate::pipeline::detect::detect_language;
use crate::pipeline::extract::{extract_text, join_pages};
use crate::pipeline::input::resolve_document;
use crate::pipeline::rasterize::{rasterize, DocumentRasterizer, Rasterizer, RenderOptions};
use crate::recognize::{self, EngineCache};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Pages and detected language, ready for extraction.
pub(crate) struct Prepared {
    pub pages: Vec<PageImage>,
    pub detection: Detection,
    pub rasterize_duration_ms: u64,
    pub detect_duration_ms: u64,
}

/// The convert → sample → detect → extract sequence for one document.
#[derive(Clone)]
pub struct Pipeline {
    rasterizer: Arc<dyn Rasterizer>,
    engines: Arc<EngineCache>,
    classifier: Arc<dyn LanguageClassifier>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("engines", &self.engines)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(
        rasterizer: Arc<dyn Rasterizer>,
        engines: Arc<EngineCache>,
        classifier: Arc<dyn LanguageClassifier>,
    ) -> Self {
        Self {
            rasterizer,
            engines,
            classifier,
        }
    }

    /// Default collaborators: pdfium/image rasteriser, the engine backend
    /// selected by `config.engine`, and the stop-word classifier.
    ///
    /// # Errors
    /// [`IngestError::ProviderNotConfigured`] when the vision engine has no
    /// usable LLM provider; [`IngestError::InvalidConfig`] for a backend
    /// this build does not include.
    pub fn from_config(config: &IngestConfig) -> Result<Self, IngestError> {
        let factory = recognize::factory_from_config(config)?;
        Ok(Self::new(
            Arc::new(DocumentRasterizer::from_config(config)),
            Arc::new(EngineCache::new(factory)),
            Arc::new(StopwordClassifier::new()),
        ))
    }

    /// The engine cache shared by every run of this pipeline.
    pub fn engines(&self) -> &Arc<EngineCache> {
        &self.engines
    }

    /// Ingest one document: rasterise, detect the language, extract text.
    ///
    /// # Returns
    /// `Ok(PipelineResult)` even if some pages failed recognition
    /// (check `result.stats.failed_pages`).
    ///
    /// # Errors
    /// - [`IngestError::Decode`] (and password / binding errors) when the
    ///   bytes cannot be rasterised; no recognition is attempted.
    /// - [`IngestError::ExtractionFailed`] when every processed page failed.
    pub async fn ingest(
        &self,
        document: Document,
        config: &IngestConfig,
    ) -> Result<PipelineResult, IngestError> {
        let total_start = Instant::now();
        let prepared = self.prepare(document, config).await?;
        let Prepared {
            pages,
            detection,
            rasterize_duration_ms,
            detect_duration_ms,
        } = prepared;

        // ── Stage C: full extraction ─────────────────────────────────────
        let extract_start = Instant::now();
        let page_texts = extract_text(&pages, &detection.language, &self.engines, config).await?;
        let extract_duration_ms = extract_start.elapsed().as_millis() as u64;
        emit(config, IngestStage::Extracted);

        let extracted_text = join_pages(&page_texts);
        let processed = page_texts.iter().filter(|p| p.is_ok()).count();
        let failed = page_texts.len() - processed;

        let stats = IngestStats {
            total_pages: pages.len(),
            processed_pages: processed,
            failed_pages: failed,
            skipped_pages: pages.len() - page_texts.len(),
            rasterize_duration_ms,
            detect_duration_ms,
            extract_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };

        info!(
            "Ingestion complete: {}/{} pages in '{}', {} chars, {}ms total",
            processed,
            pages.len(),
            detection.language,
            extracted_text.len(),
            stats.total_duration_ms
        );
        emit(config, IngestStage::Done);

        Ok(PipelineResult {
            pages,
            detected_language: detection.language,
            language_confidence: detection.confidence,
            language_source: detection.source,
            extracted_text,
            page_texts,
            stats,
        })
    }

    /// Stages A and B, shared with the streaming API.
    pub(crate) async fn prepare(
        &self,
        document: Document,
        config: &IngestConfig,
    ) -> Result<Prepared, IngestError> {
        config.validate()?;
        info!(
            "Starting ingestion: {} ({}, {} bytes)",
            document.name(),
            document.kind(),
            document.bytes().len()
        );
        emit(config, IngestStage::Created);

        // ── Stage A: rasterisation ───────────────────────────────────────
        let render_start = Instant::now();
        let pages = rasterize(
            Arc::clone(&self.rasterizer),
            document,
            RenderOptions::from_config(config),
        )
        .await?;
        let rasterize_duration_ms = render_start.elapsed().as_millis() as u64;
        info!(
            "Rasterized {} page(s) in {}ms",
            pages.len(),
            rasterize_duration_ms
        );
        emit(config, IngestStage::Rasterized);

        // ── Stage B: language detection ──────────────────────────────────
        let detect_start = Instant::now();
        let detection =
            detect_language(pages.first(), &self.engines, self.classifier.as_ref(), config).await;
        let detect_duration_ms = detect_start.elapsed().as_millis() as u64;
        debug!("Language detection took {}ms", detect_duration_ms);
        emit(config, IngestStage::LanguageDetected);

        Ok(Prepared {
            pages,
            detection,
            rasterize_duration_ms,
            detect_duration_ms,
        })
    }

    /// Resolve a path or URL, then [`ingest`](Self::ingest) it.
    pub async fn ingest_path(
        &self,
        input: impl AsRef<str>,
        kind: Option<DocumentKind>,
        config: &IngestConfig,
    ) -> Result<PipelineResult, IngestError> {
        let document = resolve_document(input.as_ref(), kind, config.download_timeout_secs).await?;
        self.ingest(document, config).await
    }

    /// Ingest a document and write `extracted_text` to `output_path`.
    ///
    /// Uses atomic write (temp file + rename) to prevent partial files.
    pub async fn ingest_to_file(
        &self,
        document: Document,
        output_path: impl AsRef<Path>,
        config: &IngestConfig,
    ) -> Result<PipelineResult, IngestError> {
        let result = self.ingest(document, config).await?;
        write_atomic(output_path.as_ref(), &result.extracted_text).await?;
        Ok(result)
    }
}

/// Write `contents` to a sibling temp file, then rename over `path`.
pub(crate) async fn write_atomic(path: &Path, contents: &str) -> Result<(), IngestError> {
    let write_err = |e: std::io::Error| IngestError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("txt.tmp");
    tokio::fs::write(&tmp_path, contents).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

fn emit(config: &IngestConfig, stage: IngestStage) {
    debug!("Stage reached: {:?}", stage);
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage(stage);
    }
}

/// Ingest a file path or URL with a one-shot default pipeline.
///
/// This is the primary entry point for the library.
///
/// # Example
/// ```rust,no_run
/// use edgequake_ingest::{ingest, IngestConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = IngestConfig::default();
/// let result = ingest("scan.pdf", &config).await?;
/// println!("[{}] {}", result.detected_language, result.extracted_text);
/// # Ok(())
/// # }
/// ```
pub async fn ingest(
    input: impl AsRef<str>,
    config: &IngestConfig,
) -> Result<PipelineResult, IngestError> {
    Pipeline::from_config(config)?
        .ingest_path(input, None, config)
        .await
}

/// Synchronous wrapper around [`ingest`].
///
/// Creates a temporary tokio runtime internally.
pub fn ingest_sync(
    input: impl AsRef<str>,
    config: &IngestConfig,
) -> Result<PipelineResult, IngestError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| IngestError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(ingest(input, config))
}
