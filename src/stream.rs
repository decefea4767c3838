//! Streaming ingestion: yield page texts as they are recognised.
//!
//! Rasterisation and language detection run up front (extraction needs the
//! language), then [`Pipeline::ingest_stream`] hands back a `Stream` of
//! [`PageText`]s. Pages are always yielded in page order; up to
//! `concurrency` recognitions run ahead of the consumer.
//!
//! Unlike [`Pipeline::ingest`], the stream cannot know in advance whether
//! every page will fail, so it never returns `ExtractionFailed` after the
//! engine is built; check `PageText::error` per item instead.

use crate::config::IngestConfig;
use crate::document::Document;
use crate::error::IngestError;
use crate::ingest::{Pipeline, Prepared};
use crate::output::{Detection, PageText};
use crate::pipeline::extract::recognize_page;
use crate::recognize::EngineKey;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of page texts, in page order.
pub type PageStream = Pin<Box<dyn Stream<Item = PageText> + Send>>;

/// A prepared document whose pages are recognised on demand.
pub struct IngestStream {
    /// Language chosen for extraction.
    pub detection: Detection,
    /// Pages produced by rasterisation.
    pub total_pages: usize,
    /// Pages the stream will yield (after the page cap).
    pub pages_to_extract: usize,
    pub pages: PageStream,
}

impl Pipeline {
    /// Rasterise and detect, then stream per-page extraction results.
    ///
    /// # Example
    /// ```rust,no_run
    /// use edgequake_ingest::{Document, DocumentKind, IngestConfig, Pipeline};
    /// use futures::StreamExt;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = IngestConfig::default();
    /// let pipeline = Pipeline::from_config(&config)?;
    /// let doc = Document::new(std::fs::read("scan.pdf")?, DocumentKind::MultiPageDocument);
    /// let mut run = pipeline.ingest_stream(doc, &config).await?;
    /// while let Some(page) = run.pages.next().await {
    ///     println!("Page {}: {}", page.page_num, page.text);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// Rasterisation errors as in [`Pipeline::ingest`];
    /// [`IngestError::ExtractionFailed`] when the extraction engine cannot
    /// be built.
    pub async fn ingest_stream(
        &self,
        document: Document,
        config: &IngestConfig,
    ) -> Result<IngestStream, IngestError> {
        let Prepared {
            pages, detection, ..
        } = self.prepare(document, config).await?;

        let total_pages = pages.len();
        let n = config.pages_to_extract(total_pages);

        let engine = self
            .engines()
            .get(&EngineKey::single(&detection.language))
            .await
            .map_err(|e| IngestError::ExtractionFailed {
                total: n,
                first_error: e.to_string(),
            })?;

        info!(
            "Streaming {} page(s) in '{}' (concurrency {})",
            n, detection.language, config.concurrency
        );
        if let Some(ref cb) = config.progress_callback {
            cb.on_extraction_start(n);
        }

        let concurrency = config.concurrency;
        let config = config.clone();
        let s = stream::iter(pages.into_iter().take(n).enumerate())
            .map(move |(idx, page)| {
                let engine = Arc::clone(&engine);
                let cfg = config.clone();
                async move { recognize_page(engine.as_ref(), &page, idx + 1, n, &cfg).await }
            })
            .buffered(concurrency);

        Ok(IngestStream {
            detection,
            total_pages,
            pages_to_extract: n,
            pages: Box::pin(s),
        })
    }
}
