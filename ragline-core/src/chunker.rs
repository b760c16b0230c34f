//! Structure-aware chunking
//!
//! Documents are split into section-prefixed chunks of roughly
//! [`ChunkingConfig::target_tokens`] tokens. The chunker recognises four kinds of
//! structure and never mixes them inside one chunk:
//!
//! - **Headings** (markdown `#` or short title-cased lines) start a new section
//! - **Records**: runs of `key: value` lines, kept together when they fit
//! - **Rows**: bursts of delimited lines (`,` `;` `|` tab), rendered as `a ; b ; c`
//! - **Prose**: sentences packed greedily with a small trailing overlap
//!
//! Every chunk text starts with its section label (`Title` or `Title > Heading`)
//! on its own line, so the section survives into both indexes.

use crate::config::ChunkingConfig;
use crate::text::{normalize_text, split_sentences, truncate_chars, TokenCounter};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::LazyLock;

static MARKDOWN_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#{1,6}\s+(.+?)\s*#*$").expect("valid markdown heading regex")
});

static KEY_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^:]{1,40}):\s+(\S.*)$").expect("valid key:value regex")
});

static GUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}|[0-9a-f]{32})\b",
    )
    .expect("valid guid regex")
});

const ROW_DELIMITERS: [char; 4] = [',', ';', '|', '\t'];
const UNTITLED: &str = "Document";

/// A chunk of an ingested document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// `{doc_id}#{seq}`
    pub chunk_id: String,
    /// Owning document
    pub doc_id: String,
    /// Position within the document, contiguous from the first chunk
    pub seq: usize,
    /// `Title` or `Title > Heading` (or `Title > rows a-b` for headless tables)
    pub section: String,
    /// Section label, a newline, then the body
    pub text: String,
    /// Estimated tokens of `text`
    pub token_count: usize,
}

impl Chunk {
    pub fn make_id(doc_id: &str, seq: usize) -> String {
        format!("{doc_id}#{seq}")
    }

    /// Text without the section label line
    pub fn body(&self) -> &str {
        self.text
            .strip_prefix(self.section.as_str())
            .and_then(|rest| rest.strip_prefix('\n'))
            .unwrap_or(&self.text)
    }
}

/// A chunk before identifiers are assigned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPiece {
    pub section: String,
    pub text: String,
    pub token_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum LineKind {
    Heading(String),
    KeyValue,
    Row(char),
    Plain,
    Blank,
}

#[derive(Debug, Clone)]
struct Line {
    kind: LineKind,
    text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunKind {
    Prose,
    Record,
    Rows,
}

#[derive(Debug, Clone)]
struct Unit {
    text: String,
    tokens: usize,
    row: Option<usize>,
}

/// Document chunker
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
    counter: TokenCounter,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Self {
        let counter = TokenCounter::new(config.tokenizer);
        Self { config, counter }
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    pub fn token_counter(&self) -> &TokenCounter {
        &self.counter
    }

    /// Chunk a document and assign ids starting at `first_seq`
    ///
    /// # Examples
    ///
    /// ```
    /// use ragline_core::chunker::Chunker;
    /// use ragline_core::config::ChunkingConfig;
    ///
    /// let chunker = Chunker::new(ChunkingConfig::default());
    /// let chunks = chunker.chunk_document("d1", "Bio", "Name: A\nRole: Engineer", 0);
    ///
    /// assert_eq!(chunks.len(), 1);
    /// assert_eq!(chunks[0].chunk_id, "d1#0");
    /// assert_eq!(chunks[0].text, "Bio\nName: A\nRole: Engineer");
    /// ```
    pub fn chunk_document(&self, doc_id: &str, title: &str, raw: &str, first_seq: usize) -> Vec<Chunk> {
        self.chunk(title, raw)
            .into_iter()
            .enumerate()
            .map(|(i, piece)| {
                let seq = first_seq + i;
                Chunk {
                    chunk_id: Chunk::make_id(doc_id, seq),
                    doc_id: doc_id.to_string(),
                    seq,
                    section: piece.section,
                    text: piece.text,
                    token_count: piece.token_count,
                }
            })
            .collect()
    }

    /// Chunk raw text into section-prefixed pieces
    ///
    /// Whitespace-only input yields no pieces.
    pub fn chunk(&self, title: &str, raw: &str) -> Vec<ChunkPiece> {
        let text = normalize_text(raw);
        if text.is_empty() {
            return Vec::new();
        }

        let title = title.trim();
        let title = if title.is_empty() { UNTITLED } else { title };

        let lines = self.annotate(&text);
        let mut assembler = Assembler::new(title, &self.config, &self.counter);
        let mut window: VecDeque<bool> = VecDeque::with_capacity(self.config.row_window);

        for line in lines {
            if line.kind == LineKind::Blank {
                assembler.blank();
                continue;
            }

            if window.len() == self.config.row_window {
                window.pop_front();
            }
            window.push_back(matches!(line.kind, LineKind::Row(_)));
            let rows = window.iter().filter(|is_row| **is_row).count();
            let in_rows = rows as f64 >= self.config.row_density * window.len() as f64;

            match line.kind {
                LineKind::Heading(heading) => assembler.heading(heading),
                LineKind::Row(delimiter) if in_rows => {
                    let cells = self.render_row(&line.text, delimiter);
                    assembler.row(cells);
                }
                _ if in_rows => assembler.row(line.text),
                LineKind::KeyValue => assembler.record_line(line.text),
                LineKind::Row(_) | LineKind::Plain => {
                    for sentence in split_sentences(&line.text) {
                        assembler.sentence(sentence);
                    }
                }
                LineKind::Blank => {}
            }
        }

        assembler.finish()
    }

    /// Classify lines and drop noise
    fn annotate(&self, text: &str) -> Vec<Line> {
        let raw_lines: Vec<&str> = text.lines().collect();

        let mut repeats: HashMap<String, usize> = HashMap::new();
        for line in &raw_lines {
            let fp = fingerprint(line);
            if !fp.is_empty() {
                *repeats.entry(fp).or_default() += 1;
            }
        }

        let mut seen_boilerplate: HashSet<String> = HashSet::new();
        let mut lines = Vec::with_capacity(raw_lines.len());

        for raw_line in raw_lines {
            if raw_line.trim().is_empty() {
                lines.push(Line {
                    kind: LineKind::Blank,
                    text: String::new(),
                });
                continue;
            }

            let Some(cleaned) = strip_identifiers(raw_line) else {
                continue;
            };
            let kind = self.classify(&cleaned);

            if !cleaned.chars().any(char::is_alphabetic) {
                continue;
            }

            if matches!(kind, LineKind::Plain | LineKind::Heading(_)) {
                let fp = fingerprint(&cleaned);
                let count = repeats.get(&fp).copied().unwrap_or(0);
                if count >= self.config.boilerplate_repeat && !seen_boilerplate.insert(fp) {
                    continue;
                }
            }

            let text = match kind {
                LineKind::KeyValue => self.cap_field(&cleaned),
                _ => cleaned,
            };
            lines.push(Line { kind, text });
        }

        lines
    }

    fn classify(&self, line: &str) -> LineKind {
        if let Some(caps) = MARKDOWN_HEADING.captures(line) {
            return LineKind::Heading(caps[1].trim().to_string());
        }
        if KEY_VALUE.is_match(line) {
            return LineKind::KeyValue;
        }
        if let Some(delimiter) = row_delimiter(line) {
            return LineKind::Row(delimiter);
        }
        if looks_like_heading(line) {
            return LineKind::Heading(line.to_string());
        }
        LineKind::Plain
    }

    fn cap_field(&self, line: &str) -> String {
        match KEY_VALUE.captures(line) {
            Some(caps) => format!(
                "{}: {}",
                caps[1].trim(),
                truncate_chars(caps[2].trim(), self.config.max_field_chars)
            ),
            None => line.to_string(),
        }
    }

    fn render_row(&self, line: &str, delimiter: char) -> String {
        line.split(delimiter)
            .map(str::trim)
            .filter(|cell| !cell.is_empty())
            .map(|cell| truncate_chars(cell, self.config.max_field_chars))
            .collect::<Vec<_>>()
            .join(" ; ")
    }
}

/// Greedy packer for one document
struct Assembler<'a> {
    title: &'a str,
    config: &'a ChunkingConfig,
    counter: &'a TokenCounter,
    heading: Option<String>,
    run: Option<RunKind>,
    units: Vec<Unit>,
    tokens: usize,
    fresh: usize,
    rows_seen: usize,
    pieces: Vec<ChunkPiece>,
}

impl<'a> Assembler<'a> {
    fn new(title: &'a str, config: &'a ChunkingConfig, counter: &'a TokenCounter) -> Self {
        Self {
            title,
            config,
            counter,
            heading: None,
            run: None,
            units: Vec::new(),
            tokens: 0,
            fresh: 0,
            rows_seen: 0,
            pieces: Vec::new(),
        }
    }

    fn heading(&mut self, heading: String) {
        self.close(false);
        self.heading = Some(heading);
    }

    /// Blank lines end records; prose and rows continue across them
    fn blank(&mut self) {
        if self.run == Some(RunKind::Record) {
            self.close(false);
        }
    }

    fn record_line(&mut self, text: String) {
        self.push(RunKind::Record, text, None);
    }

    fn sentence(&mut self, text: String) {
        if self.run == Some(RunKind::Record) {
            self.close(false);
        }
        self.push(RunKind::Prose, text, None);
    }

    fn row(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        if self.run == Some(RunKind::Rows) && self.fresh >= self.config.max_rows_per_chunk {
            self.close(false);
        }
        self.rows_seen += 1;
        let row = self.rows_seen;
        self.push(RunKind::Rows, text, Some(row));
    }

    fn push(&mut self, kind: RunKind, text: String, row: Option<usize>) {
        if self.run != Some(kind) {
            self.close(false);
            self.run = Some(kind);
        }

        let tokens = self.counter.count(&text);
        if self.tokens + tokens > self.config.target_tokens {
            if self.fresh > 0 {
                self.close(true);
            }
            // Overlap alone must never push a fresh unit over budget
            if self.tokens + tokens > self.config.target_tokens {
                self.units.clear();
                self.tokens = 0;
            }
        }

        self.units.push(Unit { text, tokens, row });
        self.tokens += tokens;
        self.fresh += 1;
    }

    /// Emit the pending chunk, optionally carrying trailing units as overlap
    fn close(&mut self, carry: bool) {
        if self.fresh == 0 {
            self.units.clear();
            self.tokens = 0;
            return;
        }

        let separator = match self.run {
            Some(RunKind::Prose) | None => " ",
            Some(RunKind::Record) | Some(RunKind::Rows) => "\n",
        };
        let body = self
            .units
            .iter()
            .map(|u| u.text.as_str())
            .collect::<Vec<_>>()
            .join(separator);
        let section = self.section_label();
        let (body, token_count) = if body.chars().count() > self.config.max_chunk_chars {
            let capped = truncate_chars(&body, self.config.max_chunk_chars)
                .trim_end()
                .to_string();
            let tokens = self.counter.count(&capped) + self.counter.count(&section);
            (capped, tokens)
        } else {
            (body, self.tokens + self.counter.count(&section))
        };

        self.pieces.push(ChunkPiece {
            text: format!("{section}\n{body}"),
            section,
            token_count,
        });

        let mut carried = Vec::new();
        let mut carried_tokens = 0;
        if carry {
            for unit in self.units.iter().rev() {
                if carried.len() + 1 >= self.units.len()
                    || carried_tokens + unit.tokens >= self.config.overlap_tokens
                {
                    break;
                }
                carried_tokens += unit.tokens;
                carried.push(unit.clone());
            }
            carried.reverse();
        }

        self.units = carried;
        self.tokens = carried_tokens;
        self.fresh = 0;
    }

    fn section_label(&self) -> String {
        if let Some(heading) = &self.heading {
            return format!("{} > {}", self.title, heading);
        }
        if self.run == Some(RunKind::Rows) {
            let first = self.units.iter().find_map(|u| u.row);
            let last = self.units.iter().rev().find_map(|u| u.row);
            if let (Some(first), Some(last)) = (first, last) {
                return format!("{} > rows {}-{}", self.title, first, last);
            }
        }
        self.title.to_string()
    }

    fn finish(mut self) -> Vec<ChunkPiece> {
        self.close(false);
        self.pieces
    }
}

/// Remove GUID-like identifiers; `None` when nothing meaningful is left
fn strip_identifiers(line: &str) -> Option<String> {
    if !GUID.is_match(line) {
        return Some(line.to_string());
    }
    let stripped = GUID.replace_all(line, "");
    let cleaned = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    let cleaned = cleaned.trim();
    if cleaned.ends_with(':') || !cleaned.chars().any(char::is_alphanumeric) {
        return None;
    }
    Some(cleaned.to_string())
}

/// Lower-cased line with digits removed, for boilerplate detection
fn fingerprint(line: &str) -> String {
    line.to_lowercase()
        .chars()
        .filter(|c| !c.is_ascii_digit())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// The delimiter occurring at least twice, preferring the most frequent
fn row_delimiter(line: &str) -> Option<char> {
    ROW_DELIMITERS
        .iter()
        .map(|&d| (d, line.matches(d).count()))
        .filter(|(_, count)| *count >= 2)
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(d, _)| d)
}

/// Short title-cased line without terminal punctuation
fn looks_like_heading(line: &str) -> bool {
    let words: Vec<&str> = line.split_whitespace().collect();
    if !(2..=12).contains(&words.len()) {
        return false;
    }
    let starts_upper = line.chars().next().is_some_and(char::is_uppercase);
    let ends_alnum = line.chars().last().is_some_and(char::is_alphanumeric);
    if !starts_upper || !ends_alnum {
        return false;
    }
    let capitalized = words
        .iter()
        .filter(|w| w.chars().next().is_some_and(|c| c.is_uppercase() || c.is_ascii_digit()))
        .count();
    capitalized as f64 / words.len() as f64 > 0.6
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenizerKind;

    fn heuristic_chunker() -> Chunker {
        Chunker::new(ChunkingConfig {
            tokenizer: TokenizerKind::Heuristic,
            ..Default::default()
        })
    }

    #[test]
    fn test_empty_input() {
        let chunker = heuristic_chunker();
        assert!(chunker.chunk("Doc", "").is_empty());
        assert!(chunker.chunk("Doc", " \n\t\n ").is_empty());
    }

    #[test]
    fn test_key_value_record() {
        let chunker = Chunker::new(ChunkingConfig::default());
        let chunks = chunker.chunk_document("d1", "Bio", "Name: A\nRole: Engineer", 0);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section, "Bio");
        assert_eq!(chunks[0].text, "Bio\nName: A\nRole: Engineer");
        assert_eq!(chunks[0].body(), "Name: A\nRole: Engineer");
        assert!(chunks[0].token_count > 0);
    }

    #[test]
    fn test_records_split_on_blank_lines() {
        let chunker = heuristic_chunker();
        let raw = "Name: A\nRole: Engineer\n\nName: B\nRole: Designer";
        let pieces = chunker.chunk("People", raw);

        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0].text, "People\nName: A\nRole: Engineer");
        assert_eq!(pieces[1].text, "People\nName: B\nRole: Designer");
    }

    #[test]
    fn test_headings_become_sections() {
        let chunker = heuristic_chunker();
        let raw = "# Install\nRun the installer. It takes a minute.\n\n## Usage Notes\nStart the daemon first.";
        let pieces = chunker.chunk("Guide", raw);

        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0].section, "Guide > Install");
        assert_eq!(pieces[0].text, "Guide > Install\nRun the installer. It takes a minute.");
        assert_eq!(pieces[1].section, "Guide > Usage Notes");
    }

    #[test]
    fn test_heuristic_heading() {
        let chunker = heuristic_chunker();
        let pieces = chunker.chunk("Manual", "Safety Guidelines\nWear gloves at all times.");

        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0].section, "Manual > Safety Guidelines");
    }

    #[test]
    fn test_prose_respects_budget_with_overlap() {
        let config = ChunkingConfig {
            target_tokens: 40,
            overlap_tokens: 15,
            tokenizer: TokenizerKind::Heuristic,
            ..Default::default()
        };
        let chunker = Chunker::new(config);
        let raw: String = (0..30)
            .map(|i| format!("Sentence number {i} talks about the scheduler. "))
            .collect();
        let pieces = chunker.chunk("Notes", &raw);

        assert!(pieces.len() > 1);
        for piece in &pieces {
            let section_tokens = chunker.token_counter().count(&piece.section);
            assert!(piece.token_count - section_tokens <= 40, "{piece:?}");
            assert!(piece.text.starts_with("Notes\n"));
        }

        // The last sentence of a chunk opens the next one
        let first_body = pieces[0].text.strip_prefix("Notes\n").unwrap_or_default();
        let last_sentence = split_sentences(first_body).pop().unwrap_or_default();
        assert!(pieces[1].text.contains(&last_sentence));
    }

    #[test]
    fn test_oversized_sentence_is_its_own_chunk() {
        let config = ChunkingConfig {
            target_tokens: 10,
            overlap_tokens: 3,
            tokenizer: TokenizerKind::Heuristic,
            ..Default::default()
        };
        let chunker = Chunker::new(config);
        let long = "word ".repeat(30);
        let raw = format!("Short start here. Then {}end.", long);
        let pieces = chunker.chunk("Doc", &raw);

        assert_eq!(pieces.len(), 2);
        assert!(pieces[1].text.contains("word word"));
        assert!(!pieces[1].text.contains("Short start"));
    }

    #[test]
    fn test_unbroken_line_is_capped_not_dropped() {
        let config = ChunkingConfig {
            max_chunk_chars: 600,
            tokenizer: TokenizerKind::Heuristic,
            ..Default::default()
        };
        let chunker = Chunker::new(config);
        let pieces = chunker.chunk("Doc", &"word ".repeat(5000));

        assert_eq!(pieces.len(), 1);
        let body = pieces[0].text.strip_prefix("Doc\n").unwrap();
        assert!(body.starts_with("word word"));
        assert!(body.chars().count() <= 600);
        assert!(body.chars().count() > 500);
        assert_eq!(
            pieces[0].token_count,
            chunker.token_counter().count(body) + chunker.token_counter().count("Doc")
        );

        let default_cap = heuristic_chunker().chunk("Doc", &"word ".repeat(5000));
        assert!(default_cap[0].text.chars().count() <= "Doc\n".len() + 1500);
    }

    #[test]
    fn test_row_burst() {
        let chunker = heuristic_chunker();
        let raw = "sku,name,price\nA1, Widget ,9.99\nB2,Gadget,19.99\n3,4,5\nC3,Gizmo,4.50";
        let pieces = chunker.chunk("Catalog", raw);

        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0].section, "Catalog > rows 1-4");
        assert_eq!(
            pieces[0].text,
            "Catalog > rows 1-4\nsku ; name ; price\nA1 ; Widget ; 9.99\nB2 ; Gadget ; 19.99\nC3 ; Gizmo ; 4.50"
        );
    }

    #[test]
    fn test_row_chunks_are_capped() {
        let config = ChunkingConfig {
            max_rows_per_chunk: 5,
            overlap_tokens: 1,
            tokenizer: TokenizerKind::Heuristic,
            ..Default::default()
        };
        let chunker = Chunker::new(config);
        let raw: String = (0..12).map(|i| format!("item{i}|red|large\n")).collect();
        let pieces = chunker.chunk("Stock", &raw);

        assert_eq!(pieces.len(), 3);
        assert!(pieces.iter().all(|p| p.text.lines().count() <= 6));
        assert_eq!(pieces[0].section, "Stock > rows 1-5");
    }

    #[test]
    fn test_field_cap() {
        let config = ChunkingConfig {
            max_field_chars: 10,
            tokenizer: TokenizerKind::Heuristic,
            ..Default::default()
        };
        let chunker = Chunker::new(config);
        let pieces = chunker.chunk("Doc", "Summary: abcdefghijklmnopqrstuvwxyz");
        assert_eq!(pieces[0].text, "Doc\nSummary: abcdefghij");
    }

    #[test]
    fn test_noise_removed() {
        let chunker = heuristic_chunker();
        let raw = "Ref 123e4567-e89b-12d3-a456-426614174000 was approved.\n\
                   Owner: 123e4567-e89b-12d3-a456-426614174000\n\
                   12345 67890\n\
                   Page 1 of 9\nAlpha team ships. \nPage 2 of 9\nPage 3 of 9";
        let pieces = chunker.chunk("Log", raw);
        let all: String = pieces.iter().map(|p| p.text.as_str()).collect::<Vec<_>>().join("\n");

        assert!(all.contains("Ref was approved."));
        assert!(!all.contains("123e4567"));
        assert!(!all.contains("Owner"));
        assert!(!all.contains("12345"));
        assert_eq!(all.matches("Page").count(), 1);
        assert!(all.contains("Alpha team ships."));
    }

    #[test]
    fn test_deterministic_ids() {
        let chunker = heuristic_chunker();
        let raw = "# A\nFirst part.\n# B\nSecond part.";
        let first = chunker.chunk_document("doc", "T", raw, 3);
        let second = chunker.chunk_document("doc", "T", raw, 3);

        assert_eq!(first, second);
        let ids: Vec<&str> = first.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["doc#3", "doc#4"]);
    }

    #[test]
    fn test_empty_title_defaults() {
        let chunker = heuristic_chunker();
        let pieces = chunker.chunk("  ", "just text here.");
        assert_eq!(pieces[0].section, "Document");
    }
}
