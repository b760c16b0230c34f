//! Extractive answer synthesis with a grounding guard
//!
//! Answers are assembled only from sentences of the retrieved chunks. In strict mode
//! an answer that shares too few meaningful terms with the query is replaced by a
//! fixed refusal and carries no citations.

use crate::chunker::Chunk;
use crate::config::SynthesisConfig;
use crate::text::{meaningful_terms, split_sentences, terms};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// Reply used in chatty mode when nothing relevant could be extracted
pub const CHATTY_FALLBACK: &str = "I couldn't find anything about that in the indexed documents.";

/// Source of an answer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Citation {
    pub doc_id: String,
    pub section: String,
}

/// How an answer was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKind {
    /// Extracted from retrieved chunks, with citations
    Grounded,
    /// Strict-mode refusal
    Refusal,
    /// Canned small-talk reply
    SmallTalk,
    /// Chatty-mode reply when nothing could be extracted
    Fallback,
}

/// Final answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    /// Answer body followed by `[1][2]…` markers when cited
    pub text: String,
    /// One entry per printed marker, in marker order
    pub citations: Vec<Citation>,
    /// Whether the query ran in strict mode
    pub strict: bool,
    pub kind: AnswerKind,
}

impl Answer {
    pub fn refusal(text: impl Into<String>, strict: bool) -> Self {
        Self {
            text: text.into(),
            citations: Vec::new(),
            strict,
            kind: AnswerKind::Refusal,
        }
    }

    pub fn small_talk(reply: impl Into<String>, strict: bool) -> Self {
        Self {
            text: reply.into(),
            citations: Vec::new(),
            strict,
            kind: AnswerKind::SmallTalk,
        }
    }

    pub fn fallback(strict: bool) -> Self {
        Self {
            text: CHATTY_FALLBACK.to_string(),
            citations: Vec::new(),
            strict,
            kind: AnswerKind::Fallback,
        }
    }

    pub fn is_refusal(&self) -> bool {
        self.kind == AnswerKind::Refusal
    }

    /// `[1][2]…`, one marker per citation
    pub fn citation_markers(&self) -> String {
        (1..=self.citations.len()).map(|i| format!("[{i}]")).collect()
    }
}

/// Extractive synthesizer
#[derive(Debug, Clone, Default)]
pub struct Synthesizer {
    config: SynthesisConfig,
}

impl Synthesizer {
    pub fn new(config: SynthesisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    pub fn refusal(&self, strict: bool) -> Answer {
        Answer::refusal(self.config.refusal_text.clone(), strict)
    }

    /// Build an answer from reranked chunks, best first
    ///
    /// # Examples
    ///
    /// ```
    /// use ragline_core::chunker::Chunk;
    /// use ragline_core::synth::{AnswerKind, Synthesizer};
    ///
    /// let chunk = Chunk {
    ///     chunk_id: "d1#0".into(),
    ///     doc_id: "d1".into(),
    ///     seq: 0,
    ///     section: "Bio".into(),
    ///     text: "Bio\nName: A\nRole: Engineer".into(),
    ///     token_count: 9,
    /// };
    ///
    /// let answer = Synthesizer::default().synthesize("What is A's role?", &[chunk], true);
    /// assert_eq!(answer.kind, AnswerKind::Grounded);
    /// assert_eq!(answer.text, "Name: A. Role: Engineer. [1]");
    /// assert_eq!(answer.citations[0].section, "Bio");
    /// ```
    pub fn synthesize(&self, query: &str, chunks: &[Chunk], strict: bool) -> Answer {
        let query_terms = meaningful_terms(query);

        let picked: Vec<(&Chunk, Vec<String>)> = chunks
            .iter()
            .take(self.config.chunks_considered)
            .filter_map(|chunk| {
                let sentences = self.extract(&query_terms, chunk);
                (!sentences.is_empty()).then_some((chunk, sentences))
            })
            .collect();

        if picked.is_empty() {
            debug!(strict, "No sentence shares a term with the query");
            return if strict {
                self.refusal(strict)
            } else {
                Answer::fallback(strict)
            };
        }

        let extracted_terms: BTreeSet<String> = picked
            .iter()
            .flat_map(|(_, sentences)| sentences.iter())
            .flat_map(|s| terms(s))
            .collect();
        let grounding = query_terms.intersection(&extracted_terms).count();

        if strict && grounding < self.config.min_grounding_overlap {
            debug!(
                grounding,
                required = self.config.min_grounding_overlap,
                "Answer not grounded, refusing"
            );
            return self.refusal(strict);
        }

        let body = picked
            .iter()
            .flat_map(|(_, sentences)| sentences.iter())
            .map(|s| with_terminal_punctuation(s))
            .collect::<Vec<_>>()
            .join(" ");
        let body = cap_words(&body, self.config.max_words);

        let mut seen = HashSet::new();
        let citations: Vec<Citation> = picked
            .iter()
            .map(|(chunk, _)| Citation {
                doc_id: chunk.doc_id.clone(),
                section: chunk.section.clone(),
            })
            .filter(|c| seen.insert(c.clone()))
            .collect();

        let mut answer = Answer {
            text: body,
            citations,
            strict,
            kind: AnswerKind::Grounded,
        };
        answer.text = format!("{} {}", answer.text, answer.citation_markers());
        answer
    }

    /// Best-overlapping sentences of one chunk, in source order
    fn extract(&self, query_terms: &BTreeSet<String>, chunk: &Chunk) -> Vec<String> {
        let sentences = split_sentences(chunk.body());

        let mut scored: Vec<(usize, usize)> = sentences
            .iter()
            .enumerate()
            .filter_map(|(idx, sentence)| {
                let sentence_terms: HashSet<String> = terms(sentence).into_iter().collect();
                let overlap = query_terms
                    .iter()
                    .filter(|t| sentence_terms.contains(*t))
                    .count();
                (overlap > 0).then_some((idx, overlap))
            })
            .collect();

        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored.truncate(self.config.sentences_per_chunk);
        scored.sort_by_key(|(idx, _)| *idx);

        scored
            .into_iter()
            .map(|(idx, _)| sentences[idx].clone())
            .collect()
    }
}

fn with_terminal_punctuation(sentence: &str) -> String {
    let trimmed = sentence.trim();
    if trimmed.ends_with(['.', '!', '?', '\u{2026}']) {
        trimmed.to_string()
    } else {
        format!("{trimmed}.")
    }
}

/// Cut to `max_words`, dropping trailing punctuation and appending an ellipsis
fn cap_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        return text.to_string();
    }
    let cut = words[..max_words].join(" ");
    format!("{}\u{2026}", cut.trim_end_matches([',', '.', ';', ':']))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_REFUSAL;

    fn chunk(doc_id: &str, seq: usize, section: &str, body: &str) -> Chunk {
        Chunk {
            chunk_id: Chunk::make_id(doc_id, seq),
            doc_id: doc_id.to_string(),
            seq,
            section: section.to_string(),
            text: format!("{section}\n{body}"),
            token_count: body.split_whitespace().count(),
        }
    }

    #[test]
    fn test_grounded_answer() {
        let synth = Synthesizer::default();
        let chunks = vec![chunk("d1", 0, "Bio", "Name: A\nRole: Engineer")];
        let answer = synth.synthesize("What is A's role?", &chunks, true);

        assert_eq!(answer.kind, AnswerKind::Grounded);
        assert!(answer.text.contains("Engineer"));
        assert_eq!(
            answer.citations,
            vec![Citation {
                doc_id: "d1".into(),
                section: "Bio".into()
            }]
        );
        assert!(answer.text.ends_with("[1]"));
    }

    #[test]
    fn test_strict_refuses_without_overlap() {
        let synth = Synthesizer::default();
        let chunks = vec![chunk("d1", 0, "Bio", "Name: A\nRole: Engineer")];
        let answer = synth.synthesize("What is the capital of France?", &chunks, true);

        assert!(answer.is_refusal());
        assert_eq!(answer.text, DEFAULT_REFUSAL);
        assert!(answer.citations.is_empty());
    }

    #[test]
    fn test_pronouns_and_articles_do_not_ground() {
        let synth = Synthesizer::default();
        let chunks = vec![chunk("d1", 0, "Diary", "I bought a car yesterday.")];
        let answer = synth.synthesize("Can I get a refund for my flight?", &chunks, true);

        assert!(answer.is_refusal());
        assert!(answer.citations.is_empty());
    }

    #[test]
    fn test_strict_refuses_below_threshold_chatty_answers() {
        let synth = Synthesizer::default();
        let chunks = vec![chunk("d1", 0, "Bio", "Role: Engineer")];

        let strict = synth.synthesize("Which role fits Paris?", &chunks, true);
        assert!(strict.is_refusal());

        let chatty = synth.synthesize("Which role fits Paris?", &chunks, false);
        assert_eq!(chatty.kind, AnswerKind::Grounded);
        assert_eq!(chatty.text, "Role: Engineer. [1]");
        assert!(!chatty.strict);
    }

    #[test]
    fn test_chatty_fallback() {
        let synth = Synthesizer::default();
        let chunks = vec![chunk("d1", 0, "Bio", "Name: A")];

        let answer = synth.synthesize("capital of France", &chunks, false);
        assert_eq!(answer.kind, AnswerKind::Fallback);
        assert_eq!(answer.text, CHATTY_FALLBACK);
        assert!(answer.citations.is_empty());

        let empty = synth.synthesize("anything", &[], true);
        assert!(empty.is_refusal());
    }

    #[test]
    fn test_ranked_order_and_markers() {
        let synth = Synthesizer::default();
        let chunks = vec![
            chunk("d2", 0, "Ops > Runtime", "Tokio schedules async tasks. Unrelated filler here."),
            chunk("d1", 3, "Guide > Tasks", "Spawned tasks run on the runtime."),
            chunk("d3", 0, "Other", "Tasks again on the runtime."),
        ];
        let answer = synth.synthesize("How does the runtime schedule tasks?", &chunks, true);

        assert_eq!(answer.kind, AnswerKind::Grounded);
        assert_eq!(
            answer.text,
            "Tokio schedules async tasks. Spawned tasks run on the runtime. [1][2]"
        );
        // Third chunk is beyond chunks_considered
        let sections: Vec<&str> = answer.citations.iter().map(|c| c.section.as_str()).collect();
        assert_eq!(sections, vec!["Ops > Runtime", "Guide > Tasks"]);
        assert_eq!(answer.citation_markers(), "[1][2]");
    }

    #[test]
    fn test_citations_deduplicated() {
        let synth = Synthesizer::default();
        let chunks = vec![
            chunk("d1", 0, "Bio", "Name: A\nRole: Engineer"),
            chunk("d1", 1, "Bio", "Team: Platform\nRole: Lead"),
        ];
        let answer = synth.synthesize("What is A's role?", &chunks, true);

        assert_eq!(answer.citations.len(), 1);
        assert!(answer.text.ends_with("[1]"));
        assert!(!answer.text.contains("[2]"));
    }

    #[test]
    fn test_sentence_selection_keeps_source_order() {
        let synth = Synthesizer::default();
        let chunks = vec![chunk(
            "d1",
            0,
            "Doc",
            "Cats purr. Dogs bark loudly at cats. Birds sing. Dogs and cats play.",
        )];
        let answer = synth.synthesize("dogs cats", &chunks, true);
        assert_eq!(answer.text, "Dogs bark loudly at cats. Dogs and cats play. [1]");
    }

    #[test]
    fn test_word_cap() {
        let synth = Synthesizer::new(SynthesisConfig {
            max_words: 5,
            ..Default::default()
        });
        let chunks = vec![chunk(
            "d1",
            0,
            "Doc",
            "Rust ownership rules, borrowing rules and lifetimes prevent data races.",
        )];
        let answer = synth.synthesize("rust ownership", &chunks, true);
        assert_eq!(answer.text, "Rust ownership rules, borrowing rules\u{2026} [1]");
    }

    #[test]
    fn test_cap_words_trims_punctuation() {
        assert_eq!(cap_words("one two, three", 2), "one two\u{2026}");
        assert_eq!(cap_words("short", 5), "short");
    }
}
