//! Language codes and language identification.
//!
//! Codes throughout the crate are ISO 639-1 (`"en"`, `"fr"`, …). Engines
//! that need another spelling (Tesseract wants `"eng"`, prompts want
//! `"English"`) look it up in [`LANGUAGES`].
//!
//! The built-in [`StopwordClassifier`] scores a text sample against short
//! function-word lists plus language-specific diacritics. It is cheap, has no
//! model files, and is only ever asked to choose among the configured
//! supported set.

use crate::error::ClassificationError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Static description of a language the crate knows how to name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageInfo {
    /// ISO 639-1 code.
    pub code: &'static str,
    /// Tesseract traineddata name (ISO 639-2/T).
    pub tesseract: &'static str,
    /// English name, used in prompts.
    pub name: &'static str,
}

pub const LANGUAGES: &[LanguageInfo] = &[
    LanguageInfo { code: "en", tesseract: "eng", name: "English" },
    LanguageInfo { code: "fr", tesseract: "fra", name: "French" },
    LanguageInfo { code: "de", tesseract: "deu", name: "German" },
    LanguageInfo { code: "es", tesseract: "spa", name: "Spanish" },
    LanguageInfo { code: "it", tesseract: "ita", name: "Italian" },
    LanguageInfo { code: "pt", tesseract: "por", name: "Portuguese" },
    LanguageInfo { code: "nl", tesseract: "nld", name: "Dutch" },
];

/// Look up a language by ISO 639-1 code (case-insensitive).
pub fn lookup(code: &str) -> Option<&'static LanguageInfo> {
    let code = code.trim();
    LANGUAGES.iter().find(|l| l.code.eq_ignore_ascii_case(code))
}

/// Top-ranked output of a classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub language: String,
    /// Share of the total score won by `language`, in `0.0..=1.0`.
    pub confidence: f32,
}

/// Assigns a probable language code to a text sample.
///
/// `candidates` is the supported-language set; implementations should
/// restrict (or at least bias) their answer to it.
pub trait LanguageClassifier: Send + Sync {
    fn classify(&self, text: &str, candidates: &[String]) -> Result<Classification, ClassificationError>;
}

// ── Stop-word classifier ─────────────────────────────────────────────────────

static RE_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{L}+").unwrap());

fn stopwords(code: &str) -> &'static [&'static str] {
    match code {
        "en" => &[
            "the", "and", "of", "to", "in", "is", "that", "for", "it", "with", "as", "was",
            "on", "are", "this", "be", "by", "at", "from", "have", "or", "not", "which", "you",
        ],
        "fr" => &[
            "le", "la", "les", "de", "et", "des", "du", "un", "une", "est", "dans", "que", "qui",
            "pour", "pas", "sur", "au", "aux", "avec", "ce", "cette", "sont", "nous", "vous", "par",
        ],
        "de" => &[
            "der", "die", "das", "und", "ist", "nicht", "ein", "eine", "zu", "den", "von", "mit",
            "sich", "des", "auf", "für", "im", "dem", "auch", "es", "wir", "sie", "oder", "wird",
        ],
        "es" => &[
            "de", "la", "el", "los", "las", "le", "y", "que", "en", "un", "una", "es", "por",
            "con", "para", "del", "se", "su", "al", "lo", "como", "más", "pero", "sus", "está",
            "son", "muy",
        ],
        "it" => &[
            "il", "la", "lo", "gli", "e", "che", "di", "in", "un", "una", "è", "per", "non", "con",
            "sono", "della", "del", "nel", "alla", "come", "anche", "più", "questo", "ma", "ha", "le",
        ],
        "pt" => &[
            "o", "os", "as", "e", "que", "do", "da", "em", "um", "uma", "não", "com",
            "para", "por", "dos", "das", "na", "no", "ao", "mais", "como", "mas", "foi", "são",
        ],
        "nl" => &[
            "de", "het", "een", "en", "van", "is", "dat", "niet", "op", "te", "zijn", "met",
            "voor", "ook", "aan", "er", "maar", "bij", "wordt", "naar", "dit", "ik", "je", "wij",
        ],
        _ => &[],
    }
}

fn marker_chars(code: &str) -> &'static [char] {
    match code {
        "fr" => &['é', 'è', 'ê', 'à', 'ç', 'ù', 'û', 'œ', 'î', 'ô'],
        "de" => &['ä', 'ö', 'ü', 'ß'],
        "es" => &['ñ', 'á', 'í', 'ó', 'ú', '¿', '¡'],
        "it" => &['ò', 'ì', 'à', 'è'],
        "pt" => &['ã', 'õ', 'ç', 'á', 'â'],
        _ => &[],
    }
}

/// Diacritics are weaker evidence than whole function words.
const MARKER_WEIGHT: f32 = 0.25;

/// Function-word and diacritic scoring classifier.
#[derive(Debug, Default, Clone, Copy)]
pub struct StopwordClassifier;

impl StopwordClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Score every candidate. A function word shared by `n` candidate lists
    /// adds `1/n` to each of them, so "de" or "la" cannot carry a language on
    /// their own.
    fn scores(codes: &[String], words: &[String], text: &str) -> Vec<f32> {
        let lists: Vec<HashSet<&str>> = codes
            .iter()
            .map(|c| stopwords(c).iter().copied().collect())
            .collect();

        let mut scores: Vec<f32> = codes
            .iter()
            .map(|c| {
                let markers = marker_chars(c);
                text.chars().filter(|ch| markers.contains(ch)).count() as f32 * MARKER_WEIGHT
            })
            .collect();

        for word in words {
            let owners: Vec<usize> = lists
                .iter()
                .enumerate()
                .filter(|(_, l)| l.contains(word.as_str()))
                .map(|(i, _)| i)
                .collect();
            if owners.is_empty() {
                continue;
            }
            let share = 1.0 / owners.len() as f32;
            for i in owners {
                scores[i] += share;
            }
        }
        scores
    }
}

impl LanguageClassifier for StopwordClassifier {
    fn classify(&self, text: &str, candidates: &[String]) -> Result<Classification, ClassificationError> {
        if candidates.is_empty() {
            return Err(ClassificationError::NoCandidates);
        }

        let lowered = text.to_lowercase();
        let words: Vec<String> = RE_WORD
            .find_iter(&lowered)
            .map(|m| m.as_str().to_string())
            .collect();

        let codes: Vec<String> = candidates.iter().map(|c| c.to_ascii_lowercase()).collect();
        let scores: Vec<(&String, f32)> = candidates
            .iter()
            .zip(Self::scores(&codes, &words, &lowered))
            .collect();

        let total: f32 = scores.iter().map(|(_, s)| s).sum();
        if total <= 0.0 {
            return Err(ClassificationError::Inconclusive { words: words.len() });
        }

        // First candidate wins ties, so the caller's ordering acts as a prior.
        let mut best = scores[0];
        for &(code, score) in &scores[1..] {
            if score > best.1 {
                best = (code, score);
            }
        }

        Ok(Classification {
            language: best.0.to_ascii_lowercase(),
            confidence: best.1 / total,
        })
    }
}
