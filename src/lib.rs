//! # edgequake-ingest
//!
//! Turn an uploaded image or PDF into plain text plus a detected-language
//! tag, then optionally hand that text to a language model for analysis.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image / PDF bytes
//!  │
//!  ├─ A. Rasterize  decode or render every page, grayscale + equalise
//!  ├─ B. Detect     recognise page 1 with a multi-language engine, classify
//!  └─ C. Extract    recognise pages with the engine for that language
//!                   (batched, order-preserving), join page texts with '\n'
//! ```
//!
//! Recognition engines are expensive to build, so they are constructed at
//! most once per language set and shared through an [`EngineCache`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_ingest::{ingest, IngestConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Vision provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / ...
//!     let config = IngestConfig::builder()
//!         .supported_languages(["en", "fr"])
//!         .page_cap(3)
//!         .build()?;
//!     let result = ingest("scan.pdf", &config).await?;
//!     println!("[{}] {}", result.detected_language, result.extracted_text);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature     | Default | Description |
//! |-------------|---------|-------------|
//! | `cli`       | on      | Enables the `ingest` binary (clap + anyhow + indicatif + tracing-subscriber) |
//! | `tesseract` | off     | Local libtesseract engine ([`EngineBackend::Tesseract`]) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-ingest = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod agent;
pub mod chat;
pub mod config;
pub mod document;
pub mod error;
pub mod ingest;
pub mod lang;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod recognize;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use agent::{AgentReport, DocumentAgent, DocumentType};
pub use chat::{ChatClient, ProviderChat};
pub use config::{EngineBackend, IngestConfig, IngestConfigBuilder};
pub use document::{Document, DocumentKind, PageImage};
pub use error::{ChatError, ClassificationError, IngestError, PageError, RecognitionError};
pub use ingest::{ingest, ingest_sync, Pipeline};
pub use lang::{Classification, LanguageClassifier, StopwordClassifier};
pub use output::{Detection, IngestStage, IngestStats, LanguageSource, PageText, PipelineResult};
pub use pipeline::input::resolve_document;
pub use pipeline::rasterize::{DocumentRasterizer, Rasterizer, RenderOptions};
pub use progress::{IngestProgressCallback, NoopProgressCallback, ProgressCallback};
pub use recognize::{EngineCache, EngineFactory, EngineKey, RecognitionEngine};
pub use stream::{IngestStream, PageStream};
