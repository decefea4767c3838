//! Vision-LLM recognition engine.
//!
//! Each page is PNG-encoded and sent to a vision model with a transcription
//! prompt that names the expected language(s). "Constructing" an engine is
//! cheap here (the prompt is built once per key), but going through the
//! cache keeps the engine contract identical to local OCR backends.

use super::{EngineFactory, EngineKey, RecognitionEngine};
use crate::chat::ChatClient;
use crate::document::PageImage;
use crate::error::RecognitionError;
use crate::pipeline::{encode, postprocess};
use crate::prompts::ocr_system_prompt;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Builds [`VisionEngine`]s that share one chat client.
pub struct VisionEngineFactory {
    chat: Arc<dyn ChatClient>,
}

impl VisionEngineFactory {
    pub fn new(chat: Arc<dyn ChatClient>) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl EngineFactory for VisionEngineFactory {
    async fn construct(&self, key: &EngineKey) -> Result<Arc<dyn RecognitionEngine>, RecognitionError> {
        if key.languages().is_empty() {
            return Err(RecognitionError::Construct {
                languages: key.to_string(),
                detail: "no languages requested".into(),
            });
        }
        Ok(Arc::new(VisionEngine {
            chat: Arc::clone(&self.chat),
            system_prompt: ocr_system_prompt(
                &key.languages().iter().map(String::as_str).collect::<Vec<_>>(),
            ),
            key: key.clone(),
        }))
    }
}

/// Transcribes pages through a vision model.
pub struct VisionEngine {
    chat: Arc<dyn ChatClient>,
    system_prompt: String,
    key: EngineKey,
}

#[async_trait]
impl RecognitionEngine for VisionEngine {
    async fn recognize(&self, page: &PageImage) -> Result<Vec<String>, RecognitionError> {
        let image = encode::encode_page(page)
            .map_err(|e| RecognitionError::Recognize(format!("image encoding failed: {e}")))?;

        let reply = self
            .chat
            .send(Some(&self.system_prompt), "", vec![image])
            .await
            .map_err(|e| RecognitionError::Recognize(e.to_string()))?;

        let fragments = postprocess::fragments(&reply);
        debug!(
            "Vision engine '{}': {} fragments from {}x{} page",
            self.key,
            fragments.len(),
            page.width(),
            page.height()
        );
        Ok(fragments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatError;
    use edgequake_llm::ImageData;
    use parking_lot::Mutex;

    struct ScriptedChat {
        reply: Result<String, ChatError>,
        seen_system: Mutex<Vec<String>>,
        seen_images: Mutex<usize>,
    }

    #[async_trait]
    impl ChatClient for ScriptedChat {
        async fn send(
            &self,
            system: Option<&str>,
            _prompt: &str,
            images: Vec<ImageData>,
        ) -> Result<String, ChatError> {
            self.seen_system.lock().push(system.unwrap_or_default().to_string());
            *self.seen_images.lock() += images.len();
            self.reply.clone()
        }
    }

    fn chat(reply: Result<String, ChatError>) -> Arc<ScriptedChat> {
        Arc::new(ScriptedChat {
            reply,
            seen_system: Mutex::new(Vec::new()),
            seen_images: Mutex::new(0),
        })
    }

    fn page() -> PageImage {
        PageImage::new(image::GrayImage::from_pixel(8, 8, image::Luma([200])))
    }

    #[tokio::test]
    async fn transcription_lines_become_fragments() {
        let chat = chat(Ok("```\nFACTURE N° 42\r\n\r\nTotal : 120 €\n```".into()));
        let factory = VisionEngineFactory::new(chat.clone());
        let engine = factory.construct(&EngineKey::single("fr")).await.unwrap();

        let fragments = engine.recognize(&page()).await.unwrap();
        assert_eq!(fragments, vec!["FACTURE N° 42", "Total : 120 €"]);
        assert_eq!(*chat.seen_images.lock(), 1);
        assert!(chat.seen_system.lock()[0].contains("French"));
    }

    #[tokio::test]
    async fn chat_failure_is_recognition_error() {
        let factory = VisionEngineFactory::new(chat(Err(ChatError("rate limited".into()))));
        let engine = factory.construct(&EngineKey::single("en")).await.unwrap();

        let err = engine.recognize(&page()).await.unwrap_err();
        assert!(err.to_string().contains("rate limited"));
    }

    #[tokio::test]
    async fn empty_key_cannot_be_constructed() {
        let factory = VisionEngineFactory::new(chat(Ok(String::new())));
        let empty: [&str; 0] = [];
        assert!(factory.construct(&EngineKey::set(&empty)).await.is_err());
    }
}
