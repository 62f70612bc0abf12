//! Word-list spell engine.
//!
//! Loads a plain word list (one word per line) or a hunspell `.dic` file
//! (leading entry count and `/FLAGS` suffixes are ignored). Suggestions are
//! the dictionary words within a small edit distance, closest first, ties
//! in dictionary order.

use crate::error::IngestError;
use crate::pipeline::normalize::SpellEngine;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

const DEFAULT_MAX_DISTANCE: usize = 2;
const DEFAULT_MAX_SUGGESTIONS: usize = 5;

#[derive(Debug, Clone)]
pub struct WordListDictionary {
    lookup: HashSet<String>,
    /// Entries as written, in file order, paired with their lowercase form.
    entries: Vec<(String, Vec<char>)>,
    max_distance: usize,
    max_suggestions: usize,
}

impl WordListDictionary {
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut lookup = HashSet::new();
        let mut entries = Vec::new();
        for word in words {
            let word = word.as_ref().trim();
            if word.is_empty() {
                continue;
            }
            let lower = word.to_lowercase();
            if lookup.insert(lower.clone()) {
                entries.push((word.to_string(), lower.chars().collect()));
            }
        }
        Self {
            lookup,
            entries,
            max_distance: DEFAULT_MAX_DISTANCE,
            max_suggestions: DEFAULT_MAX_SUGGESTIONS,
        }
    }

    /// Parse a word list or hunspell `.dic` body.
    pub fn parse(content: &str) -> Self {
        let mut lines = content.lines().peekable();
        if lines
            .peek()
            .is_some_and(|l| !l.trim().is_empty() && l.trim().bytes().all(|b| b.is_ascii_digit()))
        {
            lines.next();
        }
        Self::from_words(lines.filter(|l| !l.trim_start().starts_with('#')).map(|l| {
            let l = l.trim();
            let l = l.split(['\t', ' ']).next().unwrap_or(l);
            l.split('/').next().unwrap_or(l)
        }))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, IngestError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| IngestError::ArtifactIo {
            path: path.to_path_buf(),
            source: e,
        })?;
        let dictionary = Self::parse(&content);
        info!("Loaded {} words from {}", dictionary.len(), path.display());
        Ok(dictionary)
    }

    pub fn with_max_distance(mut self, distance: usize) -> Self {
        self.max_distance = distance.max(1);
        self
    }

    pub fn with_max_suggestions(mut self, n: usize) -> Self {
        self.max_suggestions = n.max(1);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, word: &str) -> bool {
        self.lookup.contains(&word.to_lowercase())
    }
}

impl SpellEngine for WordListDictionary {
    fn is_misspelled(&self, word: &str) -> bool {
        word.chars().any(char::is_alphabetic) && !self.contains(word)
    }

    fn suggestions(&self, word: &str) -> Vec<String> {
        let query: Vec<char> = word.to_lowercase().chars().collect();
        if query.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, usize)> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, (_, chars))| chars.len().abs_diff(query.len()) <= self.max_distance)
            .filter_map(|(i, (_, chars))| {
                let d = edit_distance(&query, chars);
                (d <= self.max_distance).then_some((d, i))
            })
            .collect();
        scored.sort_unstable();

        scored
            .into_iter()
            .take(self.max_suggestions)
            .map(|(_, i)| match_case(word, &self.entries[i].0))
            .collect()
    }
}

/// Levenshtein distance over chars.
fn edit_distance(a: &[char], b: &[char]) -> usize {
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            cur[j + 1] = substitution.min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// Carry the query's capitalisation over to `suggestion`.
fn match_case(query: &str, suggestion: &str) -> String {
    let letters: Vec<char> = query.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.len() > 1 && letters.iter().all(|c| c.is_uppercase()) {
        return suggestion.to_uppercase();
    }
    match (query.chars().next(), suggestion.chars().next()) {
        (Some(q), Some(s)) if q.is_uppercase() && !s.is_uppercase() => {
            let mut out: String = s.to_uppercase().collect();
            out.push_str(&suggestion[s.len_utf8()..]);
            out
        }
        _ => suggestion.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn distance() {
        assert_eq!(edit_distance(&chars("kitten"), &chars("sitting")), 3);
        assert_eq!(edit_distance(&chars(""), &chars("abc")), 3);
        assert_eq!(edit_distance(&chars("straße"), &chars("strasse")), 2);
    }

    #[test]
    fn parses_hunspell_dic() {
        let dict = WordListDictionary::parse("3\nHaus/SN\nStraße/P\tpo:noun\n# comment\ngehen/XY\n");
        assert_eq!(dict.len(), 3);
        assert!(dict.contains("haus"));
        assert!(dict.contains("Straße"));
        assert!(!dict.contains("3"));
    }

    #[test]
    fn misspelling_ignores_case_and_numbers() {
        let dict = WordListDictionary::from_words(["hello", "world"]);
        assert!(!dict.is_misspelled("Hello"));
        assert!(dict.is_misspelled("helo"));
        assert!(!dict.is_misspelled("2024"));
        assert!(dict.is_misspelled("he11o"));
    }

    #[test]
    fn suggestions_closest_first_with_case() {
        let dict = WordListDictionary::from_words(["hello", "help", "yellow", "hollow"]);
        assert_eq!(dict.suggestions("He11o").first().map(String::as_str), Some("Hello"));
        assert_eq!(dict.suggestions("HELO")[0], "HELLO");
        assert_eq!(dict.suggestions("helo"), vec!["hello", "help"]);
        assert!(dict.suggestions("zzzzzzzz").is_empty());
    }

    #[test]
    fn default_misspellings_finds_unknown_words() {
        let dict = WordListDictionary::from_words(["the", "cat", "sat"]);
        let spans = dict.misspellings("the kat sat");
        assert_eq!(spans.len(), 1);
        assert_eq!((spans[0].start, spans[0].end), (4, 7));
    }
}
