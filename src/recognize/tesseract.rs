//! Local libtesseract recognition engine (crate feature `tesseract`).
//!
//! One Tesseract instance is initialised per [`EngineKey`]; multi-language
//! keys map to Tesseract's `eng+fra` syntax. The instance is not reentrant,
//! so calls on one engine are serialised behind a mutex and executed on the
//! blocking thread pool.

use super::{EngineFactory, EngineKey, RecognitionEngine};
use crate::document::PageImage;
use crate::error::RecognitionError;
use crate::lang;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tesseract::Tesseract;
use tracing::{debug, warn};

/// Builds [`TesseractEngine`]s from a `tessdata` directory.
pub struct TesseractEngineFactory {
    datapath: Option<PathBuf>,
}

impl TesseractEngineFactory {
    pub fn new(datapath: Option<PathBuf>) -> Self {
        Self { datapath }
    }
}

/// Map ISO 639-1 codes to a Tesseract language string (`deu+eng`).
fn tesseract_languages(key: &EngineKey) -> Result<String, RecognitionError> {
    let names = key
        .languages()
        .iter()
        .map(|code| {
            lang::lookup(code)
                .map(|l| l.tesseract)
                .ok_or_else(|| RecognitionError::Construct {
                    languages: key.to_string(),
                    detail: format!("no Tesseract model name for '{code}'"),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names.join("+"))
}

fn init(datapath: Option<&str>, languages: &str) -> Result<Tesseract, RecognitionError> {
    Tesseract::new(datapath, Some(languages)).map_err(|e| RecognitionError::Construct {
        languages: languages.to_string(),
        detail: e.to_string(),
    })
}

#[async_trait]
impl EngineFactory for TesseractEngineFactory {
    async fn construct(&self, key: &EngineKey) -> Result<Arc<dyn RecognitionEngine>, RecognitionError> {
        let languages = tesseract_languages(key)?;
        let datapath = self
            .datapath
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned());

        let dp = datapath.clone();
        let langs = languages.clone();
        let instance = tokio::task::spawn_blocking(move || init(dp.as_deref(), &langs))
            .await
            .map_err(|e| RecognitionError::Construct {
                languages: languages.clone(),
                detail: format!("init task panicked: {e}"),
            })??;

        Ok(Arc::new(TesseractEngine {
            datapath,
            languages,
            instance: Arc::new(Mutex::new(Some(instance))),
        }))
    }
}

/// A libtesseract instance for one language set.
pub struct TesseractEngine {
    datapath: Option<String>,
    languages: String,
    instance: Arc<Mutex<Option<Tesseract>>>,
}

impl TesseractEngine {
    fn recognize_blocking(
        slot: &Mutex<Option<Tesseract>>,
        datapath: Option<&str>,
        languages: &str,
        samples: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<String>, RecognitionError> {
        let mut guard = slot.lock();
        // The consuming tesseract API drops the instance on error; rebuild it.
        let tess = match guard.take() {
            Some(t) => t,
            None => {
                warn!("Re-initialising Tesseract instance for '{}'", languages);
                init(datapath, languages)?
            }
        };

        let tess = tess
            .set_frame(samples, width as i32, height as i32, 1, width as i32)
            .map_err(|e| RecognitionError::Recognize(format!("set_frame: {e}")))?;
        let mut tess = tess
            .recognize()
            .map_err(|e| RecognitionError::Recognize(format!("recognize: {e}")))?;
        let text = tess.get_text();
        *guard = Some(tess);

        let text = text.map_err(|e| RecognitionError::Recognize(format!("get_text: {e}")))?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}

#[async_trait]
impl RecognitionEngine for TesseractEngine {
    async fn recognize(&self, page: &PageImage) -> Result<Vec<String>, RecognitionError> {
        let slot = Arc::clone(&self.instance);
        let datapath = self.datapath.clone();
        let languages = self.languages.clone();
        let samples = page.as_raw().to_vec();
        let (width, height) = (page.width(), page.height());

        let fragments = tokio::task::spawn_blocking(move || {
            Self::recognize_blocking(&slot, datapath.as_deref(), &languages, &samples, width, height)
        })
        .await
        .map_err(|e| RecognitionError::Recognize(format!("recognition task panicked: {e}")))??;

        debug!("Tesseract '{}': {} lines", self.languages, fragments.len());
        Ok(fragments)
    }
}
