//! Document-analysis agent: classify → choose mission → execute.
//!
//! The agent works on already-extracted text and talks to a language model
//! through [`ChatClient`]. Each step is one chat call; failures surface as
//! [`IngestError::Chat`] and are not retried.

use crate::chat::ChatClient;
use crate::error::IngestError;
use crate::prompts::{document_type_prompt, mission_prompt, question_prompt, DEFAULT_QUESTION};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Kinds of document the agent knows a mission for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Invoice,
    Contract,
    Resume,
    Article,
    Letter,
    TechnicalDocument,
    Unknown,
}

impl DocumentType {
    /// Parse a model's label. Accepts English labels and their French
    /// equivalents (`facture`, `contrat`, `cv`, `courrier`, ...); anything
    /// else is [`DocumentType::Unknown`].
    pub fn parse(label: &str) -> Self {
        let label = label
            .trim()
            .trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
            .to_lowercase()
            .replace([' ', '-'], "_");

        match label.as_str() {
            "invoice" | "facture" => DocumentType::Invoice,
            "contract" | "contrat" => DocumentType::Contract,
            "resume" | "cv" | "curriculum_vitae" => DocumentType::Resume,
            "article" => DocumentType::Article,
            "letter" | "courrier" | "lettre" => DocumentType::Letter,
            "technical_document" | "document_technique" => DocumentType::TechnicalDocument,
            _ => DocumentType::Unknown,
        }
    }

    /// The task the agent performs for this type.
    pub fn mission(self) -> &'static str {
        match self {
            DocumentType::Invoice => "Extract the important accounting information.",
            DocumentType::Contract => "Summarise the obligations, risks and key points.",
            DocumentType::Resume => "Extract the candidate's profile and skills.",
            DocumentType::Article => "Produce a structured summary.",
            DocumentType::Letter => "Explain the purpose of the letter and the expected actions.",
            DocumentType::TechnicalDocument => "Explain the purpose and the technical points.",
            DocumentType::Unknown => "Produce a general summary.",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentType::Invoice => "invoice",
            DocumentType::Contract => "contract",
            DocumentType::Resume => "resume",
            DocumentType::Article => "article",
            DocumentType::Letter => "letter",
            DocumentType::TechnicalDocument => "technical_document",
            DocumentType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of [`DocumentAgent::run`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentReport {
    pub document_type: DocumentType,
    pub mission: String,
    pub analysis: String,
}

/// Runs analysis missions over extracted text.
#[derive(Clone)]
pub struct DocumentAgent {
    chat: Arc<dyn ChatClient>,
}

impl DocumentAgent {
    pub fn new(chat: Arc<dyn ChatClient>) -> Self {
        Self { chat }
    }

    /// Ask the model which [`DocumentType`] `text` is.
    pub async fn classify(&self, text: &str) -> Result<DocumentType, IngestError> {
        let reply = self
            .chat
            .send(None, &document_type_prompt(text), Vec::new())
            .await?;
        let doc_type = DocumentType::parse(&reply);
        debug!("Classifier reply {:?} → {}", reply.trim(), doc_type);
        Ok(doc_type)
    }

    /// Carry out `mission` on `text`.
    pub async fn execute(&self, text: &str, mission: &str) -> Result<String, IngestError> {
        Ok(self
            .chat
            .send(None, &mission_prompt(mission, text), Vec::new())
            .await?)
    }

    /// Classify, pick the matching mission and execute it.
    pub async fn run(&self, text: &str) -> Result<AgentReport, IngestError> {
        let document_type = self.classify(text).await?;
        let mission = document_type.mission();
        info!("Document classified as '{}'", document_type);

        let analysis = self.execute(text, mission).await?;
        Ok(AgentReport {
            document_type,
            mission: mission.to_string(),
            analysis,
        })
    }

    /// Answer a question about `text`; `None` asks for a summary.
    pub async fn answer(&self, text: &str, question: Option<&str>) -> Result<String, IngestError> {
        let question = question
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .unwrap_or(DEFAULT_QUESTION);
        Ok(self
            .chat
            .send(None, &question_prompt(text, question), Vec::new())
            .await?)
    }
}
