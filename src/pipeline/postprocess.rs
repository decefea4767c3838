//! Post-processing: turn raw recogniser output into clean text fragments.
//!
//! Vision models occasionally wrap their transcription in code fences, emit
//! CRLF line endings or sprinkle zero-width characters, even when told not
//! to. These deterministic rules strip those artefacts without touching the
//! recognised content. Rules run in order: fences first (they span lines),
//! then line endings, then per-line cleanup.

use once_cell::sync::Lazy;
use regex::Regex;

/// Split a raw transcription into trimmed, non-empty line fragments.
///
/// Rules (applied in order):
/// 1. Strip outer code fences
/// 2. Normalise line endings (CRLF / CR → LF)
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 4. Collapse runs of horizontal whitespace inside each line
/// 5. Drop lines that are empty after trimming
pub fn fragments(raw: &str) -> Vec<String> {
    let s = strip_code_fences(raw);
    let s = normalise_line_endings(&s);
    let s = remove_invisible_chars(&s);
    s.lines()
        .map(collapse_whitespace)
        .filter(|l| !l.is_empty())
        .collect()
}

/// Join a page's fragments into the page text.
pub fn join_fragments(fragments: &[String]) -> String {
    fragments.join(" ")
}

// ── Rule 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\r?\n(.*?)\r?\n?```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 4: Collapse horizontal whitespace ───────────────────────────────────

static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\x{00A0}]+").unwrap());

fn collapse_whitespace(line: &str) -> String {
    RE_SPACES.replace_all(line.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_lines() {
        assert_eq!(fragments("Hello\nWorld\n"), vec!["Hello", "World"]);
    }

    #[test]
    fn strips_fences_with_language_tag() {
        assert_eq!(fragments("```text\nline one\nline two\n```"), vec!["line one", "line two"]);
    }

    #[test]
    fn inner_fences_are_kept() {
        let f = fragments("before\n```\ncode\n```\nafter");
        assert_eq!(f.first().map(String::as_str), Some("before"));
        assert!(f.contains(&"```".to_string()));
    }

    #[test]
    fn crlf_and_blank_lines() {
        assert_eq!(fragments("a\r\n\r\n  \r\nb\rc"), vec!["a", "b", "c"]);
    }

    #[test]
    fn invisible_chars_removed() {
        assert_eq!(fragments("\u{FEFF}Ti\u{200B}tle"), vec!["Title"]);
    }

    #[test]
    fn whitespace_collapsed() {
        assert_eq!(fragments("  Total\t :   42\u{00A0}€  "), vec!["Total : 42 €"]);
    }

    #[test]
    fn empty_reply_has_no_fragments() {
        assert!(fragments("").is_empty());
        assert!(fragments("\n \n\t").is_empty());
    }

    #[test]
    fn join_uses_single_spaces() {
        let parts = vec!["a".to_string(), "b c".to_string()];
        assert_eq!(join_fragments(&parts), "a b c");
        assert_eq!(join_fragments(&[]), "");
    }
}
