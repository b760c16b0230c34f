//! Text utilities shared by the chunker, synthesizer and mode guard

use crate::config::TokenizerKind;
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, LazyLock};
use tiktoken_rs::CoreBPE;
use unicode_normalization::UnicodeNormalization;

static CL100K: LazyLock<Option<Arc<CoreBPE>>> = LazyLock::new(|| match tiktoken_rs::cl100k_base() {
    Ok(bpe) => Some(Arc::new(bpe)),
    Err(e) => {
        tracing::warn!("Failed to load cl100k tokenizer, using word heuristic: {}", e);
        None
    }
});

/// Function words ignored when measuring query overlap
static STOPWORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "about", "all", "am", "an", "and", "any", "are", "as", "at", "be", "been", "but", "by",
        "can", "could", "did", "do", "does", "for", "from", "had", "has", "have", "how", "if",
        "in", "into", "is", "it", "its", "me", "my", "no", "not", "of", "on", "or", "our",
        "please", "should", "so", "tell", "than", "that", "the", "their", "them", "then",
        "there", "these", "they", "this", "those", "to", "was", "we", "were", "what", "when",
        "where", "which", "who", "whom", "whose", "why", "will", "with", "would", "you",
        "your",
    ]
    .into_iter()
    .collect()
});

/// Unicode NFC, control characters removed, space runs collapsed, lines trimmed
///
/// Newlines and tabs survive: they carry record and table structure.
pub fn normalize_text(text: &str) -> String {
    let nfc: String = text.nfc().collect();
    let unified = nfc.replace("\r\n", "\n").replace('\r', "\n");

    let lines: Vec<String> = unified
        .split('\n')
        .map(|line| {
            let mut out = String::with_capacity(line.len());
            let mut pending_space = false;
            for c in line.chars() {
                if c == '\t' {
                    pending_space = false;
                    out.push('\t');
                } else if c.is_whitespace() || c.is_control() {
                    pending_space = true;
                } else {
                    if pending_space && !out.is_empty() && !out.ends_with('\t') {
                        out.push(' ');
                    }
                    pending_space = false;
                    out.push(c);
                }
            }
            out.trim_matches(|c: char| c == ' ' || c == '\t').to_string()
        })
        .collect();

    lines.join("\n").trim().to_string()
}

/// First `max_chars` characters of `text`
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Lower-cased alphanumeric terms
///
/// Possessive `'s` is stripped and inner apostrophes removed, so "A's" yields "a"
/// and "don't" yields "dont".
pub fn terms(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase().replace(['\u{2019}', '\u{2018}'], "'");
    lowered
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter_map(|raw| {
            let trimmed = raw.trim_matches('\'');
            let base = trimmed.strip_suffix("'s").unwrap_or(trimmed);
            let term: String = base.chars().filter(|c| *c != '\'').collect();
            (!term.is_empty()).then_some(term)
        })
        .collect()
}

pub fn is_stopword(term: &str) -> bool {
    STOPWORDS.contains(term)
}

/// Distinct terms that are not stop words
///
/// A single letter only counts when it is used as a name: upper-case and either
/// possessive ("A's") or inside a sentence ("Who is B?"). The pronoun "I" and the
/// article "a" never count.
pub fn meaningful_terms(text: &str) -> BTreeSet<String> {
    let identifiers = letter_identifiers(text);
    terms(text)
        .into_iter()
        .filter(|t| !is_stopword(t))
        .filter(|t| !is_single_letter(t) || identifiers.contains(t))
        .collect()
}

fn is_single_letter(term: &str) -> bool {
    let mut chars = term.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_alphabetic())
}

/// Lower-cased single letters written as identifiers in `text`
fn letter_identifiers(text: &str) -> HashSet<String> {
    let mut found = HashSet::new();
    let mut sentence_start = true;

    for word in text.split_whitespace() {
        let word = word.replace(['\u{2019}', '\u{2018}'], "'");
        let core = word
            .trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
            .trim_matches('\'');
        let (base, possessive) = match core.strip_suffix("'s") {
            Some(base) => (base, true),
            None => (core, false),
        };

        let mut chars = base.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if c.is_uppercase() && c != 'I' && (possessive || !sentence_start) {
                found.insert(c.to_lowercase().collect());
            }
        }
        sentence_start = word.ends_with(['.', '!', '?']);
    }

    found
}

/// Split text into sentences
///
/// Newlines are hard boundaries. Inside a line, a sentence ends at `.`, `!` or `?`
/// followed by whitespace and an upper-case letter, digit, quote or parenthesis.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let chars: Vec<(usize, char)> = line.char_indices().collect();
        let mut start = 0;
        for i in 0..chars.len() {
            let (idx, c) = chars[i];
            if !matches!(c, '.' | '!' | '?') {
                continue;
            }
            let Some(&(_, next)) = chars.get(i + 1) else {
                continue;
            };
            if !next.is_whitespace() {
                continue;
            }
            let opener = chars[i + 1..].iter().map(|(_, c)| *c).find(|c| !c.is_whitespace());
            if let Some(opener) = opener {
                if opener.is_uppercase() || opener.is_ascii_digit() || matches!(opener, '"' | '\'' | '(') {
                    let end = idx + c.len_utf8();
                    let sentence = line[start..end].trim();
                    if !sentence.is_empty() {
                        sentences.push(sentence.to_string());
                    }
                    start = end;
                }
            }
        }

        let tail = line[start..].trim();
        if !tail.is_empty() {
            sentences.push(tail.to_string());
        }
    }
    sentences
}

/// Token estimator used for chunk budgets
#[derive(Clone)]
pub enum TokenCounter {
    /// Exact `cl100k_base` token counts
    Bpe(Arc<CoreBPE>),
    /// 1.3 tokens per word, rounded up
    Heuristic,
}

impl TokenCounter {
    /// Build the configured counter, falling back to the heuristic if the BPE tables
    /// cannot be loaded
    pub fn new(kind: TokenizerKind) -> Self {
        match kind {
            TokenizerKind::Cl100k => match CL100K.as_ref() {
                Some(bpe) => Self::Bpe(Arc::clone(bpe)),
                None => Self::Heuristic,
            },
            TokenizerKind::Heuristic => Self::Heuristic,
        }
    }

    pub fn count(&self, text: &str) -> usize {
        match self {
            Self::Bpe(bpe) => bpe.encode_with_special_tokens(text).len(),
            Self::Heuristic => heuristic_tokens(text),
        }
    }
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bpe(_) => f.write_str("TokenCounter::Bpe(cl100k_base)"),
            Self::Heuristic => f.write_str("TokenCounter::Heuristic"),
        }
    }
}

pub fn heuristic_tokens(text: &str) -> usize {
    (word_count(text) * 13).div_ceil(10)
}
