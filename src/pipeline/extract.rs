//! Stage C — full text extraction in the detected language.
//!
//! Pages are processed in batches of `batch_size`; inside a batch up to
//! `concurrency` pages are in flight. `buffered` (not `buffer_unordered`)
//! keeps results in page order, so the output never depends on either knob.

use super::postprocess::join_fragments;
use crate::config::IngestConfig;
use crate::document::PageImage;
use crate::error::{IngestError, PageError};
use crate::output::PageText;
use crate::recognize::{EngineCache, EngineKey, RecognitionEngine};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Recognise every page up to the page cap with the engine for `language`.
///
/// Returns one [`PageText`] per processed page, in page order. A failed
/// page keeps its slot with empty text and a [`PageError`].
///
/// # Errors
/// [`IngestError::ExtractionFailed`] when the engine cannot be built or
/// every processed page fails.
pub async fn extract_text(
    pages: &[PageImage],
    language: &str,
    engines: &EngineCache,
    config: &IngestConfig,
) -> Result<Vec<PageText>, IngestError> {
    let n = config.pages_to_extract(pages.len());
    let pages = &pages[..n];
    if n == 0 {
        return Ok(Vec::new());
    }

    let engine = engines
        .get(&EngineKey::single(language))
        .await
        .map_err(|e| IngestError::ExtractionFailed {
            total: n,
            first_error: e.to_string(),
        })?;

    // Start and complete are always paired.
    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_start(n);
    }

    info!(
        "Extracting {} page(s) in '{}' (batch {}, concurrency {})",
        n, language, config.batch_size, config.concurrency
    );

    let mut results = Vec::with_capacity(n);
    for (batch_idx, batch) in pages.chunks(config.batch_size).enumerate() {
        let offset = batch_idx * config.batch_size;
        let futures: Vec<_> = batch
            .iter()
            .enumerate()
            .map(|(i, page)| {
                let engine = Arc::clone(&engine);
                async move { recognize_page(engine.as_ref(), page, offset + i + 1, n, config).await }
            })
            .collect();
        let batch_results: Vec<PageText> = stream::iter(futures)
            .buffered(config.concurrency)
            .collect()
            .await;
        results.extend(batch_results);
    }

    let succeeded = results.iter().filter(|p| p.is_ok()).count();
    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_complete(n, succeeded);
    }

    if succeeded == 0 {
        let first_error = results
            .iter()
            .find_map(|p| p.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(IngestError::ExtractionFailed {
            total: n,
            first_error,
        });
    }

    Ok(results)
}

/// Recognise one page, absorbing failure into the returned [`PageText`].
pub async fn recognize_page(
    engine: &dyn RecognitionEngine,
    page: &PageImage,
    page_num: usize,
    total_pages: usize,
    config: &IngestConfig,
) -> PageText {
    if let Some(ref cb) = config.progress_callback {
        cb.on_page_start(page_num, total_pages);
    }
    let start = Instant::now();

    let result = engine.recognize(page).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(fragments) => {
            let text = join_fragments(&fragments);
            debug!(
                "Page {}/{}: {} fragments, {} chars in {}ms",
                page_num,
                total_pages,
                fragments.len(),
                text.len(),
                duration_ms
            );
            if let Some(ref cb) = config.progress_callback {
                cb.on_page_complete(page_num, total_pages, text.len());
            }
            PageText {
                page_num,
                text,
                fragment_count: fragments.len(),
                duration_ms,
                error: None,
            }
        }
        Err(e) => {
            let error = PageError::RecognitionFailed {
                page: page_num,
                detail: e.to_string(),
            };
            warn!("{}", error);
            if let Some(ref cb) = config.progress_callback {
                cb.on_page_error(page_num, total_pages, &error.to_string());
            }
            PageText {
                page_num,
                text: String::new(),
                fragment_count: 0,
                duration_ms,
                error: Some(error),
            }
        }
    }
}

/// Join page texts with newlines, one segment per processed page.
pub fn join_pages(pages: &[PageText]) -> String {
    pages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecognitionError;
    use crate::progress::IngestProgressCallback;
    use crate::recognize::EngineFactory;
    use async_trait::async_trait;
    use image::{GrayImage, Luma};

    /// Reads the page number back from the first pixel; fails on `fail`.
    struct PixelEngine {
        fail: Vec<u8>,
    }

    #[async_trait]
    impl RecognitionEngine for PixelEngine {
        async fn recognize(&self, page: &PageImage) -> Result<Vec<String>, RecognitionError> {
            let n = page.as_raw()[0];
            tokio::task::yield_now().await;
            if self.fail.contains(&n) {
                return Err(RecognitionError::Recognize(format!("page {n} unreadable")));
            }
            Ok(vec![format!("p{n}"), "body".to_string()])
        }
    }

    struct PixelFactory {
        fail: Vec<u8>,
    }

    #[async_trait]
    impl EngineFactory for PixelFactory {
        async fn construct(&self, _key: &EngineKey) -> Result<Arc<dyn RecognitionEngine>, RecognitionError> {
            Ok(Arc::new(PixelEngine {
                fail: self.fail.clone(),
            }))
        }
    }

    fn pages(n: u8) -> Vec<PageImage> {
        (1..=n)
            .map(|i| PageImage::new(GrayImage::from_pixel(2, 2, Luma([i]))))
            .collect()
    }

    fn cache(fail: &[u8]) -> EngineCache {
        EngineCache::new(Arc::new(PixelFactory { fail: fail.to_vec() }))
    }

    #[tokio::test]
    async fn pages_joined_in_order() {
        let config = IngestConfig::default();
        let texts = extract_text(&pages(3), "en", &cache(&[]), &config).await.unwrap();
        assert_eq!(join_pages(&texts), "p1 body\np2 body\np3 body");
        assert_eq!(texts[1].fragment_count, 2);
    }

    #[tokio::test]
    async fn order_independent_of_batching() {
        let baseline = join_pages(
            &extract_text(&pages(7), "en", &cache(&[]), &IngestConfig::default())
                .await
                .unwrap(),
        );
        for (batch, conc) in [(1, 1), (2, 5), (3, 3), (10, 4)] {
            let config = IngestConfig::builder()
                .batch_size(batch)
                .concurrency(conc)
                .build()
                .unwrap();
            let texts = extract_text(&pages(7), "en", &cache(&[]), &config).await.unwrap();
            assert_eq!(join_pages(&texts), baseline, "batch {batch} concurrency {conc}");
        }
    }

    #[tokio::test]
    async fn failed_page_keeps_empty_slot() {
        let texts = extract_text(&pages(3), "en", &cache(&[2]), &IngestConfig::default())
            .await
            .unwrap();
        assert_eq!(join_pages(&texts), "p1 body\n\np3 body");
        assert!(matches!(
            texts[1].error,
            Some(PageError::RecognitionFailed { page: 2, .. })
        ));
    }

    #[tokio::test]
    async fn cap_limits_processed_pages() {
        let config = IngestConfig::builder().page_cap(2).build().unwrap();
        let texts = extract_text(&pages(5), "en", &cache(&[]), &config).await.unwrap();
        assert_eq!(texts.len(), 2);
        assert_eq!(join_pages(&texts), "p1 body\np2 body");
    }

    #[derive(Default)]
    struct Bracket {
        events: parking_lot::Mutex<Vec<String>>,
    }

    impl IngestProgressCallback for Bracket {
        fn on_extraction_start(&self, total_pages: usize) {
            self.events.lock().push(format!("start {total_pages}"));
        }

        fn on_extraction_complete(&self, total_pages: usize, success_count: usize) {
            self.events.lock().push(format!("complete {success_count}/{total_pages}"));
        }
    }

    struct NoEngine;

    #[async_trait]
    impl EngineFactory for NoEngine {
        async fn construct(&self, key: &EngineKey) -> Result<Arc<dyn RecognitionEngine>, RecognitionError> {
            Err(RecognitionError::Construct {
                languages: key.to_string(),
                detail: "traineddata missing".into(),
            })
        }
    }

    #[tokio::test]
    async fn start_and_complete_are_paired() {
        let events = Arc::new(Bracket::default());
        let config = IngestConfig::builder()
            .progress_callback(events.clone())
            .build()
            .unwrap();

        extract_text(&pages(2), "en", &cache(&[2]), &config).await.unwrap();
        assert_eq!(*events.events.lock(), vec!["start 2", "complete 1/2"]);

        events.events.lock().clear();
        let err = extract_text(&pages(2), "en", &EngineCache::new(Arc::new(NoEngine)), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::ExtractionFailed { total: 2, .. }));
        assert!(events.events.lock().is_empty());
    }

    #[tokio::test]
    async fn all_failed_is_fatal() {
        let err = extract_text(&pages(2), "en", &cache(&[1, 2]), &IngestConfig::default())
            .await
            .unwrap_err();
        match err {
            IngestError::ExtractionFailed { total, first_error } => {
                assert_eq!(total, 2);
                assert!(first_error.contains("page 1 unreadable"), "{first_error}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
