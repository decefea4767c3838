//! Integration tests for the ingestion pipeline.
//!
//! Rasterisation and recognition are replaced by in-memory fakes so these
//! run without pdfium, Tesseract or an API key. The fake rasteriser turns
//! every input byte into one page whose pixels carry that byte; the fake
//! engine "reads" a page by looking its pixel value up in a script.
//!
//! Live tests against a real provider are gated behind `E2E_ENABLED`:
//!   E2E_ENABLED=1 cargo test --test pipeline -- --nocapture

use async_trait::async_trait;
use edgequake_ingest::{
    Document, DocumentKind, DocumentRasterizer, EngineCache, EngineFactory, EngineKey,
    IngestConfig, IngestError, IngestProgressCallback, IngestStage, LanguageSource, PageImage,
    Pipeline, Rasterizer, RecognitionEngine, RecognitionError, RenderOptions, StopwordClassifier,
};
use futures::StreamExt;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

// ── Fakes ────────────────────────────────────────────────────────────────────

/// One 3x2 page per input byte, every pixel set to that byte.
struct ByteRasterizer;

impl Rasterizer for ByteRasterizer {
    fn render(
        &self,
        bytes: &[u8],
        _kind: DocumentKind,
        _options: &RenderOptions,
    ) -> Result<Vec<PageImage>, IngestError> {
        Ok(bytes
            .iter()
            .map(|&b| PageImage::new(GrayImage::from_pixel(3, 2, Luma([b]))))
            .collect())
    }
}

#[derive(Default)]
struct Script {
    /// Text for a page value; pages without an entry read as `page<N>`.
    text: HashMap<u8, &'static str>,
    /// Page values whose recognition fails.
    failing: Vec<u8>,
}

struct ScriptedEngine {
    script: Arc<Script>,
}

#[async_trait]
impl RecognitionEngine for ScriptedEngine {
    async fn recognize(&self, page: &PageImage) -> Result<Vec<String>, RecognitionError> {
        let value = page.as_raw()[0];
        // Later pages finish first, to shake out ordering bugs.
        tokio::time::sleep(std::time::Duration::from_millis(u64::from(20 - value.min(20)))).await;
        if self.script.failing.contains(&value) {
            return Err(RecognitionError::Recognize(format!("page value {value} is unreadable")));
        }
        Ok(match self.script.text.get(&value) {
            Some(text) => text.lines().map(str::to_string).collect(),
            None => vec![format!("page{value}")],
        })
    }
}

/// Records every key it is asked to construct.
struct ScriptedFactory {
    script: Arc<Script>,
    constructed: Mutex<Vec<EngineKey>>,
}

impl ScriptedFactory {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script: Arc::new(script),
            constructed: Mutex::new(Vec::new()),
        })
    }

    fn constructions_of(&self, key: &EngineKey) -> usize {
        self.constructed.lock().iter().filter(|k| *k == key).count()
    }
}

#[async_trait]
impl EngineFactory for ScriptedFactory {
    async fn construct(&self, key: &EngineKey) -> Result<Arc<dyn RecognitionEngine>, RecognitionError> {
        self.constructed.lock().push(key.clone());
        Ok(Arc::new(ScriptedEngine {
            script: Arc::clone(&self.script),
        }))
    }
}

#[derive(Default)]
struct StageRecorder {
    stages: Mutex<Vec<IngestStage>>,
    page_errors: Mutex<Vec<usize>>,
}

impl IngestProgressCallback for StageRecorder {
    fn on_stage(&self, stage: IngestStage) {
        self.stages.lock().push(stage);
    }

    fn on_page_error(&self, page_num: usize, _total: usize, _error: &str) {
        self.page_errors.lock().push(page_num);
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

const FRENCH: &str = "Le contrat est signé par les parties\net la facture est jointe";

fn french_script() -> Script {
    Script {
        text: HashMap::from([(1, FRENCH)]),
        ..Default::default()
    }
}

fn pipeline_with(factory: Arc<ScriptedFactory>) -> Pipeline {
    Pipeline::new(
        Arc::new(ByteRasterizer),
        Arc::new(EngineCache::new(factory)),
        Arc::new(StopwordClassifier::new()),
    )
}

fn doc(pages: u8) -> Document {
    Document::new((1..=pages).collect::<Vec<u8>>(), DocumentKind::MultiPageDocument)
}

fn all_languages() -> EngineKey {
    EngineKey::set(IngestConfig::default().supported_languages.as_slice())
}

fn png(img: GrayImage) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

// ── Single image ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn single_image_yields_one_page() {
    let factory = ScriptedFactory::new(Script::default());
    let pipeline = Pipeline::new(
        Arc::new(DocumentRasterizer::new()),
        Arc::new(EngineCache::new(factory.clone())),
        Arc::new(StopwordClassifier::new()),
    );

    let bytes = png(GrayImage::from_fn(16, 8, |x, _| Luma([(x * 16) as u8])));
    let result = pipeline
        .ingest(Document::new(bytes, DocumentKind::Image), &IngestConfig::default())
        .await
        .unwrap();

    assert_eq!(result.pages.len(), 1);
    assert_eq!(result.page_texts.len(), 1);
    // Equalised page starts at 0, so the engine reads "page0".
    assert_eq!(result.extracted_text, "page0");
    assert_eq!(result.stats.total_pages, 1);
}

// ── Multi-page ordering ──────────────────────────────────────────────────────

#[tokio::test]
async fn segments_follow_page_order_for_any_batching() {
    let expected: String = std::iter::once(FRENCH.replace('\n', " "))
        .chain((2..=6).map(|p| format!("page{p}")))
        .collect::<Vec<_>>()
        .join("\n");

    for (batch, concurrency) in [(1, 1), (4, 2), (2, 6), (10, 10), (3, 1)] {
        let pipeline = pipeline_with(ScriptedFactory::new(french_script()));
        let config = IngestConfig::builder()
            .batch_size(batch)
            .concurrency(concurrency)
            .build()
            .unwrap();

        let result = pipeline.ingest(doc(6), &config).await.unwrap();
        assert_eq!(result.pages.len(), 6);
        assert_eq!(result.extracted_text.split('\n').count(), 6);
        assert_eq!(result.extracted_text, expected, "batch {batch}, concurrency {concurrency}");
        assert_eq!(result.detected_language, "fr");
        assert_eq!(result.language_source, LanguageSource::Classified);
    }
}

#[tokio::test]
async fn repeated_runs_are_identical() {
    let factory = ScriptedFactory::new(french_script());
    let pipeline = pipeline_with(factory.clone());
    let config = IngestConfig::default();

    let first = pipeline.ingest(doc(4), &config).await.unwrap();
    let second = pipeline.ingest(doc(4), &config).await.unwrap();

    assert_eq!(first.extracted_text, second.extracted_text);
    assert_eq!(first.detected_language, second.detected_language);
}

// ── Page cap ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn cap_limits_extraction_not_rasterisation() {
    let pipeline = pipeline_with(ScriptedFactory::new(Script::default()));
    let config = IngestConfig::builder().page_cap(2).build().unwrap();

    let result = pipeline.ingest(doc(5), &config).await.unwrap();
    assert_eq!(result.pages.len(), 5);
    assert_eq!(result.page_texts.len(), 2);
    assert_eq!(result.extracted_text, "page1\npage2");
    assert_eq!(result.stats.skipped_pages, 3);
    assert_eq!(result.stats.processed_pages, 2);
}

// ── Language fallback ────────────────────────────────────────────────────────

#[tokio::test]
async fn blank_sample_falls_back_to_default_engine() {
    let factory = ScriptedFactory::new(Script {
        text: HashMap::from([(1, "")]),
        ..Default::default()
    });
    let pipeline = pipeline_with(factory.clone());
    let config = IngestConfig::builder()
        .supported_languages(["en", "de"])
        .default_language("de")
        .build()
        .unwrap();

    let result = pipeline.ingest(doc(2), &config).await.unwrap();
    assert_eq!(result.detected_language, "de");
    assert_eq!(result.language_source, LanguageSource::Default);
    assert_eq!(result.language_confidence, None);
    assert_eq!(factory.constructions_of(&EngineKey::single("de")), 1);
    assert_eq!(factory.constructions_of(&EngineKey::single("en")), 0);
    assert_eq!(result.extracted_text, "\npage2");
}

// ── Engine reuse ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn engines_constructed_once_across_runs() {
    let factory = ScriptedFactory::new(french_script());
    let cache = Arc::new(EngineCache::new(factory.clone()));
    let config = IngestConfig::default();

    // Two pipelines sharing one cache.
    for _ in 0..2 {
        let pipeline = Pipeline::new(
            Arc::new(ByteRasterizer),
            Arc::clone(&cache),
            Arc::new(StopwordClassifier::new()),
        );
        pipeline.ingest(doc(3), &config).await.unwrap();
    }

    assert_eq!(factory.constructions_of(&EngineKey::single("fr")), 1);
    assert_eq!(factory.constructions_of(&all_languages()), 1);
    assert_eq!(cache.constructed(), 2);
}

#[tokio::test]
async fn batch_of_documents_shares_one_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let inputs: Vec<String> = [("a.pdf", vec![1u8, 2]), ("b.pdf", vec![1, 2, 3])]
        .into_iter()
        .map(|(name, bytes)| {
            let path = dir.path().join(name);
            std::fs::write(&path, bytes).unwrap();
            path.to_string_lossy().into_owned()
        })
        .chain([dir.path().join("missing.pdf").to_string_lossy().into_owned()])
        .chain([dir.path().join("a.pdf").to_string_lossy().into_owned()])
        .collect();

    let factory = ScriptedFactory::new(french_script());
    let pipeline = pipeline_with(factory.clone());
    let config = IngestConfig::builder().page_cap(2).build().unwrap();

    let mut outcomes = Vec::new();
    for input in &inputs {
        outcomes.push(
            pipeline
                .ingest_path(input, Some(DocumentKind::MultiPageDocument), &config)
                .await,
        );
    }

    let first = outcomes[0].as_ref().unwrap();
    assert_eq!(first.detected_language, "fr");
    assert_eq!(first.extracted_text, format!("{}\npage2", FRENCH.replace('\n', " ")));
    let second = outcomes[1].as_ref().unwrap();
    assert_eq!(second.stats.total_pages, 3);
    assert_eq!(second.stats.skipped_pages, 1);
    assert!(matches!(outcomes[2], Err(IngestError::FileNotFound { .. })));
    // A failed document does not stop the ones after it.
    assert_eq!(
        outcomes[3].as_ref().unwrap().extracted_text,
        outcomes[0].as_ref().unwrap().extracted_text
    );

    assert_eq!(factory.constructions_of(&EngineKey::single("fr")), 1);
    assert_eq!(factory.constructions_of(&all_languages()), 1);
    assert_eq!(pipeline.engines().constructed(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_runs_share_engines() {
    let factory = ScriptedFactory::new(french_script());
    let pipeline = pipeline_with(factory.clone());

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.ingest(doc(3), &IngestConfig::default()).await })
        })
        .collect();
    for h in handles {
        assert_eq!(h.await.unwrap().unwrap().detected_language, "fr");
    }

    assert_eq!(factory.constructions_of(&EngineKey::single("fr")), 1);
}

// ── Fatal paths ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn garbage_is_decode_error_for_either_kind() {
    let factory = ScriptedFactory::new(Script::default());
    let pipeline = Pipeline::new(
        Arc::new(DocumentRasterizer::new()),
        Arc::new(EngineCache::new(factory.clone())),
        Arc::new(StopwordClassifier::new()),
    );

    for kind in [DocumentKind::Image, DocumentKind::MultiPageDocument] {
        let recorder = Arc::new(StageRecorder::default());
        let config = IngestConfig::builder()
            .progress_callback(recorder.clone())
            .build()
            .unwrap();
        let garbage = Document::new(b"this is neither a PNG nor a PDF".to_vec(), kind);

        let err = pipeline.ingest(garbage, &config).await.unwrap_err();
        assert!(err.is_decode(), "{kind}: {err}");
        assert_eq!(err.stage(), Some(IngestStage::Created));
        assert_eq!(*recorder.stages.lock(), vec![IngestStage::Created]);
    }
    assert!(factory.constructed.lock().is_empty());
}

#[tokio::test]
async fn every_page_failing_is_fatal() {
    let pipeline = pipeline_with(ScriptedFactory::new(Script {
        failing: vec![1, 2, 3],
        ..Default::default()
    }));

    let err = pipeline
        .ingest(doc(3), &IngestConfig::default())
        .await
        .unwrap_err();
    match err {
        IngestError::ExtractionFailed { total, ref first_error } => {
            assert_eq!(total, 3);
            assert!(first_error.contains("Page 1"), "{first_error}");
        }
        ref other => panic!("expected ExtractionFailed, got {other}"),
    }
    assert_eq!(err.stage(), Some(IngestStage::LanguageDetected));
}

#[tokio::test]
async fn some_pages_failing_leaves_empty_segments() {
    let recorder = Arc::new(StageRecorder::default());
    let pipeline = pipeline_with(ScriptedFactory::new(Script {
        failing: vec![2, 4],
        ..Default::default()
    }));
    let config = IngestConfig::builder()
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    let result = pipeline.ingest(doc(4), &config).await.unwrap();
    assert_eq!(result.extracted_text, "page1\n\npage3\n");
    assert_eq!(result.failed_pages(), 2);
    assert!(result.page_texts[1].error.is_some());

    let mut errors = recorder.page_errors.lock().clone();
    errors.sort_unstable();
    assert_eq!(errors, vec![2, 4]);
    assert_eq!(
        *recorder.stages.lock(),
        vec![
            IngestStage::Created,
            IngestStage::Rasterized,
            IngestStage::LanguageDetected,
            IngestStage::Extracted,
            IngestStage::Done,
        ]
    );
}

// ── Streaming and file output ────────────────────────────────────────────────

#[tokio::test]
async fn stream_yields_pages_in_order() {
    let pipeline = pipeline_with(ScriptedFactory::new(french_script()));
    let config = IngestConfig::builder()
        .concurrency(4)
        .page_cap(5)
        .build()
        .unwrap();

    let run = pipeline.ingest_stream(doc(7), &config).await.unwrap();
    assert_eq!(run.detection.language, "fr");
    assert_eq!(run.total_pages, 7);
    assert_eq!(run.pages_to_extract, 5);

    let pages: Vec<_> = run.pages.collect().await;
    let numbers: Vec<usize> = pages.iter().map(|p| p.page_num).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
    assert_eq!(pages[4].text, "page5");
}

#[tokio::test]
async fn ingest_to_file_writes_text() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out/result.txt");
    let pipeline = pipeline_with(ScriptedFactory::new(Script::default()));

    let result = pipeline
        .ingest_to_file(doc(2), &out, &IngestConfig::default())
        .await
        .unwrap();
    assert_eq!(std::fs::read_to_string(&out).unwrap(), result.extracted_text);
    assert_eq!(result.extracted_text, "page1\npage2");
}

#[tokio::test]
async fn result_serialises_to_json() {
    let pipeline = pipeline_with(ScriptedFactory::new(french_script()));
    let result = pipeline.ingest(doc(2), &IngestConfig::default()).await.unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["detected_language"], "fr");
    assert_eq!(json["language_source"], "Classified");
    assert_eq!(json["page_texts"].as_array().map(Vec::len), Some(2));
    assert!(json.get("pages").is_none());
}

// ── Live provider (gated) ────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

#[tokio::test]
async fn live_scan_extraction() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP — set E2E_ENABLED=1 to run live tests");
        return;
    }
    let path = test_cases_dir().join("scan.pdf");
    if !path.exists() {
        println!("SKIP — test file not found: {}", path.display());
        return;
    }

    let config = IngestConfig::builder().page_cap(2).build().unwrap();
    let result = edgequake_ingest::ingest(path.to_string_lossy(), &config)
        .await
        .expect("live ingestion should succeed");

    assert!(!result.extracted_text.trim().is_empty());
    assert!(config.supports(&result.detected_language));
    println!(
        "[live] {} pages, language {}, {} chars",
        result.stats.total_pages,
        result.detected_language,
        result.extracted_text.len()
    );
}

#[test]
fn pipeline_usable_from_sync_code() {
    let pipeline = pipeline_with(ScriptedFactory::new(Script::default()));
    let result = tokio_test::block_on(pipeline.ingest(doc(2), &IngestConfig::default())).unwrap();
    assert_eq!(result.extracted_text, "page1\npage2");
}
