//! Stage B — language detection from a one-page sample.
//!
//! Only the first page is read, with an engine configured for the whole
//! supported set. Detection can never fail a run: every problem is logged
//! and the configured default language is kept.

use super::postprocess::join_fragments;
use crate::config::IngestConfig;
use crate::document::PageImage;
use crate::lang::LanguageClassifier;
use crate::output::{Detection, LanguageSource};
use crate::recognize::{EngineCache, EngineKey};
use tracing::{debug, info, warn};

/// Detect the dominant language of `sample`.
///
/// Returns [`Detection::fallback`] when there is no sample, the sample has
/// no text, or any collaborator fails.
pub async fn detect_language(
    sample: Option<&PageImage>,
    engines: &EngineCache,
    classifier: &dyn LanguageClassifier,
    config: &IngestConfig,
) -> Detection {
    let fallback = Detection::fallback(&config.default_language);

    let Some(sample) = sample else {
        debug!("No sample page; keeping default language");
        return fallback;
    };

    let key = EngineKey::set(config.supported_languages.as_slice());
    let engine = match engines.get(&key).await {
        Ok(engine) => engine,
        Err(e) => {
            warn!("Language detection skipped: {}", e);
            return fallback;
        }
    };

    let text = match engine.recognize(sample).await {
        Ok(fragments) => join_fragments(&fragments),
        Err(e) => {
            warn!("Language detection skipped: sample page: {}", e);
            return fallback;
        }
    };

    if text.trim().is_empty() {
        info!(
            "Sample page has no text; using default language '{}'",
            config.default_language
        );
        return fallback;
    }

    match classifier.classify(&text, &config.supported_languages) {
        Ok(c) if config.supports(&c.language) => {
            info!(
                "Detected language '{}' (confidence {:.2})",
                c.language, c.confidence
            );
            Detection {
                language: c.language.to_ascii_lowercase(),
                confidence: Some(c.confidence),
                source: LanguageSource::Classified,
            }
        }
        Ok(c) => {
            warn!(
                "Classifier returned unsupported language '{}'; using '{}'",
                c.language, config.default_language
            );
            fallback
        }
        Err(e) => {
            warn!(
                "Language classification failed: {}; using '{}'",
                e, config.default_language
            );
            fallback
        }
    }
}
