//! Text normalisation: two spell-correction passes over recognised text.
//!
//! ## Pass order
//!
//! 1. **Dictionary pass.** The language's engine finds misspelled spans in
//!    the raw text once; each span is replaced by its first suggestion.
//!    Spans are applied from the end of the text backwards so that earlier
//!    offsets stay valid after a replacement changes the length.
//! 2. **Digit pass.** OCR often turns letters into digits (`he11o`). Tokens
//!    matching `[a-zA-Z0-9]+[.,!?]?` are re-checked: one trailing
//!    punctuation mark is set aside, and a token containing a digit (or, for
//!    primary-language text, any token the primary engine flags) is replaced
//!    by its first suggestion with the punctuation put back.
//!
//! Neither pass can fail; a word without suggestions is left as it is.

use crate::config::{Language, ReplacementMode};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

/// A misspelled byte range in some text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectionSpan {
    pub start: usize,
    pub end: usize,
    /// The flagged word as it appeared.
    pub original: String,
}

impl CorrectionSpan {
    pub fn new(start: usize, end: usize, original: impl Into<String>) -> Self {
        Self {
            start,
            end,
            original: original.into(),
        }
    }
}

static RE_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{L}+(?:'\p{L}+)*").unwrap());

static RE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-zA-Z0-9]+[.,!?]?").unwrap());

/// A dictionary-backed spell checker for one language.
pub trait SpellEngine: Send + Sync {
    fn is_misspelled(&self, word: &str) -> bool;

    /// Replacement candidates, best first.
    fn suggestions(&self, word: &str) -> Vec<String>;

    /// Misspelled spans of `text`, ascending.
    fn misspellings(&self, text: &str) -> Vec<CorrectionSpan> {
        RE_WORD
            .find_iter(text)
            .filter(|m| self.is_misspelled(m.as_str()))
            .map(|m| CorrectionSpan::new(m.start(), m.end(), m.as_str()))
            .collect()
    }
}

/// Applies both correction passes with one engine per language.
#[derive(Clone)]
pub struct TextNormalizer {
    primary: Arc<dyn SpellEngine>,
    secondary: Arc<dyn SpellEngine>,
    mode: ReplacementMode,
}

impl TextNormalizer {
    pub fn new(
        primary: Arc<dyn SpellEngine>,
        secondary: Arc<dyn SpellEngine>,
        mode: ReplacementMode,
    ) -> Self {
        Self {
            primary,
            secondary,
            mode,
        }
    }

    fn engine(&self, language: Language) -> &dyn SpellEngine {
        match language {
            Language::Primary => self.primary.as_ref(),
            Language::Secondary => self.secondary.as_ref(),
        }
    }

    /// Run the dictionary pass, then the digit pass.
    pub fn normalize(&self, text: &str, language: Language) -> String {
        let corrected = dictionary_pass(text, self.engine(language));
        let corrected = self.digit_pass(&corrected, language);
        debug!(
            "Normalised {} chars ({:?}), changed: {}",
            text.len(),
            language,
            corrected != text
        );
        corrected
    }

    /// Pass 2 on its own.
    pub fn digit_pass(&self, text: &str, language: Language) -> String {
        let mut corrections: Vec<(usize, &str, String)> = Vec::new();
        for m in RE_TOKEN.find_iter(text) {
            let token = m.as_str();
            let (word, punctuation) = split_trailing_punctuation(token);
            let has_digit = word.bytes().any(|b| b.is_ascii_digit());

            let engine: Option<&dyn SpellEngine> = match language {
                Language::Primary if has_digit || self.primary.is_misspelled(word) => {
                    Some(self.primary.as_ref())
                }
                Language::Secondary if has_digit => Some(self.secondary.as_ref()),
                _ => None,
            };
            if let Some(fix) = engine.and_then(|e| e.suggestions(word).into_iter().next()) {
                corrections.push((m.start(), token, format!("{}{}", fix, punctuation)));
            }
        }

        let mut out = text.to_string();
        match self.mode {
            ReplacementMode::FirstOccurrence => {
                for (_, token, replacement) in corrections {
                    out = out.replacen(token, &replacement, 1);
                }
            }
            ReplacementMode::TokenPosition => {
                for (start, token, replacement) in corrections.into_iter().rev() {
                    out.replace_range(start..start + token.len(), &replacement);
                }
            }
        }
        out
    }
}

// ── Pass 1 ───────────────────────────────────────────────────────────────────

/// Replace every span `engine` flags in `text` with its first suggestion.
///
/// Spans that are empty, out of range, not on char boundaries, or overlap a
/// span already replaced are skipped.
pub fn dictionary_pass(text: &str, engine: &dyn SpellEngine) -> String {
    let mut spans = engine.misspellings(text);
    spans.sort_by(|a, b| b.start.cmp(&a.start));

    let mut out = text.to_string();
    let mut floor = text.len();
    for span in spans {
        let valid = span.start < span.end
            && span.end <= floor
            && text.is_char_boundary(span.start)
            && text.is_char_boundary(span.end);
        if !valid {
            continue;
        }
        let word = &text[span.start..span.end];
        if let Some(fix) = engine.suggestions(word).into_iter().next() {
            out.replace_range(span.start..span.end, &fix);
            floor = span.start;
        }
    }
    out
}

// ── Pass 2 helpers ───────────────────────────────────────────────────────────

fn split_trailing_punctuation(token: &str) -> (&str, &str) {
    match token.char_indices().last() {
        Some((i, '.' | ',' | '!' | '?')) => token.split_at(i),
        _ => (token, ""),
    }
}
