//! Error types for the edgequake-ingest library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`IngestError`] — **Fatal**: the run cannot produce a meaningful
//!   result (input is not the declared kind, every page failed OCR, the
//!   rendering library is missing). Returned as `Err(IngestError)` from the
//!   top-level `ingest*` functions.
//!
//! * [`PageError`] — **Non-fatal**: recognition failed on a single page, but
//!   the others are fine. Stored inside [`crate::output::PageText`] so the
//!   page keeps its position (with empty text) in the joined output.
//!
//! Collaborator seams have their own small error types
//! ([`RecognitionError`], [`ClassificationError`], [`ChatError`]); the
//! pipeline decides whether each one is absorbed or escalated.

use crate::document::DocumentKind;
use crate::output::IngestStage;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-ingest library.
///
/// Per-page recognition failures use [`PageError`] and are stored in
/// [`crate::output::PageText`] rather than propagated here.
#[derive(Debug, Error)]
pub enum IngestError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input's kind could not be determined or is not supported.
    #[error("Unsupported input '{input}': {reason}")]
    UnsupportedInput { input: String, reason: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Rasterisation errors ──────────────────────────────────────────────
    /// The bytes cannot be interpreted as the declared kind.
    #[error("Cannot decode input as {kind}: {detail}")]
    Decode { kind: DocumentKind, detail: String },

    /// The PDF requires a password but none was provided.
    #[error("PDF is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired,

    /// A password was provided but it is wrong.
    #[error("Wrong password for encrypted PDF")]
    WrongPassword,

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Multi-page documents are rendered with PDFium. You can:\n\
  • Install libpdfium system-wide, or\n\
  • Set PDFIUM_LIB_PATH=/path/to/dir/containing/libpdfium.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Extraction errors ─────────────────────────────────────────────────
    /// Every processed page failed recognition; the text would be meaningless.
    #[error("All {total} pages failed text recognition.\nFirst error: {first_error}")]
    ExtractionFailed { total: usize, first_error: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// A document-analysis chat call failed.
    #[error("Chat call failed: {0}")]
    Chat(#[from] ChatError),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output text file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IngestError {
    /// The pipeline stage a run was in when it failed with this error.
    ///
    /// `None` for errors raised outside a pipeline run (input resolution,
    /// configuration, output writing, chat).
    pub fn stage(&self) -> Option<IngestStage> {
        match self {
            IngestError::Decode { .. }
            | IngestError::PasswordRequired
            | IngestError::WrongPassword
            | IngestError::PdfiumBindingFailed(_) => Some(IngestStage::Created),
            IngestError::ExtractionFailed { .. } => Some(IngestStage::LanguageDetected),
            _ => None,
        }
    }

    /// Whether the input bytes were rejected as not being the declared kind.
    pub fn is_decode(&self) -> bool {
        matches!(self, IngestError::Decode { .. })
    }
}

/// A non-fatal error for a single page.
///
/// Stored alongside [`crate::output::PageText`] when a page fails.
/// The run continues unless ALL processed pages fail.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The recognition engine failed on this page.
    #[error("Page {page}: text recognition failed: {detail}")]
    RecognitionFailed { page: usize, detail: String },
}

/// Errors from a text-recognition engine or its factory.
#[derive(Debug, Clone, Error)]
pub enum RecognitionError {
    /// Building an engine for the requested languages failed.
    #[error("Failed to construct recognition engine for '{languages}': {detail}")]
    Construct { languages: String, detail: String },

    /// The engine could not read the page.
    #[error("Recognition failed: {0}")]
    Recognize(String),
}

/// Errors from a language classifier. Always recovered by the pipeline.
#[derive(Debug, Clone, Error)]
pub enum ClassificationError {
    /// The sample carries no signal for any candidate language.
    #[error("No candidate language matched the sample ({words} words)")]
    Inconclusive { words: usize },

    /// No candidate languages were supplied.
    #[error("No candidate languages")]
    NoCandidates,
}

/// Failure of a language-model chat call.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ChatError(pub String);
