//! Text-recognition engines and the per-language engine cache.
//!
//! An engine is expensive to build (model weights, traineddata, provider
//! clients) and cheap to call, so engines are built by an [`EngineFactory`]
//! at most once per [`EngineKey`] and then shared through an
//! [`EngineCache`]. The cache is an explicit object: callers decide its
//! lifetime and tests get a fresh one per case.

pub mod vision;

#[cfg(feature = "tesseract")]
pub mod tesseract;

use crate::chat::ProviderChat;
use crate::config::{EngineBackend, IngestConfig};
use crate::document::PageImage;
use crate::error::{IngestError, RecognitionError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

/// Identifies an engine by the languages it reads.
///
/// Codes are lowercased, sorted and deduplicated, so `["fr", "EN", "fr"]`
/// and `["en", "fr"]` name the same engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EngineKey(Vec<String>);

impl EngineKey {
    pub fn single(language: &str) -> Self {
        Self::set(&[language])
    }

    pub fn set<S: AsRef<str>>(languages: &[S]) -> Self {
        let mut codes: Vec<String> = languages
            .iter()
            .map(|l| l.as_ref().trim().to_ascii_lowercase())
            .filter(|l| !l.is_empty())
            .collect();
        codes.sort_unstable();
        codes.dedup();
        Self(codes)
    }

    pub fn languages(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for EngineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("+"))
    }
}

/// A constructed, language-specific text recogniser.
#[async_trait]
pub trait RecognitionEngine: Send + Sync {
    /// Recognise the text fragments on one page.
    ///
    /// Fragment order follows the engine's reading order; callers only
    /// concatenate them.
    async fn recognize(&self, page: &PageImage) -> Result<Vec<String>, RecognitionError>;
}

/// Builds engines. Construction is the expensive step the cache amortises.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    async fn construct(&self, key: &EngineKey) -> Result<Arc<dyn RecognitionEngine>, RecognitionError>;
}

type Slot = Arc<OnceCell<Arc<dyn RecognitionEngine>>>;

/// Construct-once, read-many pool of engines keyed by [`EngineKey`].
///
/// Concurrent requests for the same uncached key wait on one construction.
/// A failed construction leaves the slot empty so a later request retries.
pub struct EngineCache {
    factory: Arc<dyn EngineFactory>,
    slots: Mutex<HashMap<EngineKey, Slot>>,
    constructed: AtomicUsize,
}

impl EngineCache {
    pub fn new(factory: Arc<dyn EngineFactory>) -> Self {
        Self {
            factory,
            slots: Mutex::new(HashMap::new()),
            constructed: AtomicUsize::new(0),
        }
    }

    /// Return the cached engine for `key`, constructing it on first use.
    pub async fn get(&self, key: &EngineKey) -> Result<Arc<dyn RecognitionEngine>, RecognitionError> {
        let slot = {
            let mut slots = self.slots.lock();
            Arc::clone(slots.entry(key.clone()).or_default())
        };

        let engine = slot
            .get_or_try_init(|| async {
                info!("Constructing recognition engine for '{}'", key);
                let engine = self.factory.construct(key).await?;
                self.constructed.fetch_add(1, Ordering::SeqCst);
                Ok::<_, RecognitionError>(engine)
            })
            .await?;

        Ok(Arc::clone(engine))
    }

    /// Number of successful constructions so far.
    pub fn constructed(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }

    /// Whether an engine for `key` is already built.
    pub fn contains(&self, key: &EngineKey) -> bool {
        self.slots
            .lock()
            .get(key)
            .is_some_and(|slot| slot.initialized())
    }
}

impl fmt::Debug for EngineCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineCache")
            .field("slots", &self.slots.lock().len())
            .field("constructed", &self.constructed())
            .finish()
    }
}

/// Build the engine factory selected by `config.engine`.
pub fn factory_from_config(config: &IngestConfig) -> Result<Arc<dyn EngineFactory>, IngestError> {
    match &config.engine {
        EngineBackend::Vision => {
            let chat = ProviderChat::from_config(config)?;
            Ok(Arc::new(vision::VisionEngineFactory::new(Arc::new(chat))))
        }
        #[cfg(feature = "tesseract")]
        EngineBackend::Tesseract { datapath } => {
            Ok(Arc::new(tesseract::TesseractEngineFactory::new(datapath.clone())))
        }
        #[cfg(not(feature = "tesseract"))]
        EngineBackend::Tesseract { .. } => Err(IngestError::InvalidConfig(
            "the Tesseract engine requires building with `--features tesseract`".into(),
        )),
    }
}
