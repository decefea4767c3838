//! Pipeline stages for document ingestion.
//!
//! Each submodule implements exactly one transformation step, so stages are
//! independently testable and backends can be swapped behind their traits.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ rasterize ──▶ detect ──▶ extract
//! (URL/path)  (image/pdfium)  (page 1)   (all pages)
//! ```
//!
//! 1. [`input`]     — resolve a path or URL to an in-memory `Document`
//! 2. [`rasterize`] — bytes to equalised grayscale pages; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 3. [`detect`]    — classify the language of the first page; never fatal
//! 4. [`extract`]   — recognise every page (up to the cap) in that language
//!
//! [`encode`] and [`postprocess`] are shared by the vision engine: PNG/base64
//! wrapping of a page and cleanup of the model's transcription.

pub mod detect;
pub mod encode;
pub mod extract;
pub mod input;
pub mod postprocess;
pub mod rasterize;
