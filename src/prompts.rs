//! Prompts for the vision OCR engine and the document-analysis agent.
//!
//! Every prompt lives here so wording changes happen in one place and unit
//! tests can inspect prompts without calling a model.

use crate::lang;

/// System prompt for transcribing one page image.
///
/// `{languages}` is replaced by the expected language name(s).
const OCR_SYSTEM_PROMPT: &str = r#"You are an OCR engine. Transcribe ALL text visible in the page image.

Rules:
- The text is expected to be in {languages}.
- Output the text exactly as written; do not translate, summarise or correct it.
- One line of output per line of text, in reading order.
- Do not describe images, layout or formatting.
- Do not wrap the output in code fences and do not add commentary.
- If the page contains no text, output nothing."#;

/// Build the OCR system prompt for the given ISO 639-1 codes.
pub fn ocr_system_prompt(languages: &[&str]) -> String {
    let names: Vec<&str> = languages
        .iter()
        .map(|code| lang::lookup(code).map_or(*code, |l| l.name))
        .collect();
    let languages = match names.as_slice() {
        [] => "any language".to_string(),
        [one] => (*one).to_string(),
        [init @ .., last] => format!("{} or {}", init.join(", "), last),
    };
    OCR_SYSTEM_PROMPT.replace("{languages}", &languages)
}

/// Ask the model for a single document-type label.
pub fn document_type_prompt(document_text: &str) -> String {
    format!(
        "Classify the following document into exactly one of these types:\n\
         invoice, contract, resume, article, letter, technical_document, unknown.\n\
         Answer with the type only, in lowercase, without punctuation.\n\n\
         Document:\n\"\"\"\n{document_text}\n\"\"\""
    )
}

/// Ask the model to carry out a mission on the document.
pub fn mission_prompt(mission: &str, document_text: &str) -> String {
    format!(
        "Your mission: {mission}\n\n\
         Work only from the document below. Be concise and structured.\n\n\
         Document:\n\"\"\"\n{document_text}\n\"\"\""
    )
}

/// Question asked when the user does not supply one.
pub const DEFAULT_QUESTION: &str =
    "Please analyze this text: summarize it, explain what it contains, and highlight key points.";

/// Ask a free-form question about extracted text.
pub fn question_prompt(document_text: &str, question: &str) -> String {
    format!(
        "Here is the text extracted from the document:\n\n{document_text}\n\n\
         User's question:\n{question}"
    )
}
