//! Conversation mode guard
//!
//! | mode   | small talk     | question  |
//! |--------|----------------|-----------|
//! | strict | retrieve       | retrieve  |
//! | chatty | canned reply   | retrieve  |
//!
//! Strict mode never classifies: every query goes through retrieval and the
//! grounding guard.

use crate::text::terms;
use serde::{Deserialize, Serialize};

/// Answering mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Grounding guard on, small talk retrieved like any query
    #[default]
    Strict,
    /// Small talk answered directly, no refusals
    Chatty,
}

impl Mode {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            Self::Strict
        } else {
            Self::Chatty
        }
    }

    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Strict)
    }
}

/// Kind of small talk, in detection priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmallTalkKind {
    Greeting,
    CheckIn,
    Thanks,
    Farewell,
}

impl SmallTalkKind {
    /// Canned reply
    pub fn reply(&self) -> &'static str {
        match self {
            Self::Greeting => "Hello! Ask me anything about the indexed documents.",
            Self::CheckIn => {
                "I'm doing well, thanks for asking. What would you like to know about the indexed documents?"
            }
            Self::Thanks => "You're welcome!",
            Self::Farewell => "Goodbye!",
        }
    }
}

/// Classified query intent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryIntent {
    SmallTalk(SmallTalkKind),
    Qa,
}

/// What the pipeline does with a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Answer with a canned reply, no index access
    Reply(SmallTalkKind),
    /// Run retrieval and synthesis
    Retrieve,
}

/// Phrases as produced by [`terms`], so "how's" reads as "how"
const PHRASES: &[(SmallTalkKind, &[&str])] = &[
    (SmallTalkKind::Greeting, &["hi"]),
    (SmallTalkKind::Greeting, &["hello"]),
    (SmallTalkKind::Greeting, &["hey"]),
    (SmallTalkKind::Greeting, &["hiya"]),
    (SmallTalkKind::Greeting, &["howdy"]),
    (SmallTalkKind::Greeting, &["hola"]),
    (SmallTalkKind::Greeting, &["greetings"]),
    (SmallTalkKind::Greeting, &["good", "morning"]),
    (SmallTalkKind::Greeting, &["good", "afternoon"]),
    (SmallTalkKind::Greeting, &["good", "evening"]),
    (SmallTalkKind::CheckIn, &["how", "are", "you"]),
    (SmallTalkKind::CheckIn, &["how", "are", "you", "doing"]),
    (SmallTalkKind::CheckIn, &["how", "are", "u"]),
    (SmallTalkKind::CheckIn, &["how", "r", "u"]),
    (SmallTalkKind::CheckIn, &["how", "it", "going"]),
    (SmallTalkKind::CheckIn, &["how", "is", "it", "going"]),
    (SmallTalkKind::CheckIn, &["what", "up"]),
    (SmallTalkKind::CheckIn, &["sup"]),
    (SmallTalkKind::Thanks, &["thanks"]),
    (SmallTalkKind::Thanks, &["thank", "you"]),
    (SmallTalkKind::Thanks, &["thx"]),
    (SmallTalkKind::Thanks, &["ty"]),
    (SmallTalkKind::Thanks, &["cheers"]),
    (SmallTalkKind::Thanks, &["much", "appreciated"]),
    (SmallTalkKind::Farewell, &["bye"]),
    (SmallTalkKind::Farewell, &["goodbye"]),
    (SmallTalkKind::Farewell, &["see", "ya"]),
    (SmallTalkKind::Farewell, &["see", "you"]),
    (SmallTalkKind::Farewell, &["later"]),
    (SmallTalkKind::Farewell, &["catch", "you", "later"]),
    (SmallTalkKind::Farewell, &["good", "night"]),
];

/// Words allowed around a phrase without making the query a question
const FILLER: &[&str] = &[
    "there", "friend", "friends", "everyone", "all", "bot", "buddy", "again", "so", "much",
    "very", "a", "lot", "today", "ok", "okay", "oh", "and", "then",
];

/// Small-talk classifier
#[derive(Debug, Clone, Copy, Default)]
pub struct ModeGuard;

impl ModeGuard {
    /// Classify a query
    ///
    /// A query is small talk only when every word is covered by a known phrase or a
    /// filler word, and at least one phrase matched.
    ///
    /// # Examples
    ///
    /// ```
    /// use ragline_core::mode::{ModeGuard, QueryIntent, SmallTalkKind};
    ///
    /// assert_eq!(ModeGuard::classify("Hi there!"), QueryIntent::SmallTalk(SmallTalkKind::Greeting));
    /// assert_eq!(ModeGuard::classify("hi, what is A's role?"), QueryIntent::Qa);
    /// ```
    pub fn classify(query: &str) -> QueryIntent {
        let words = terms(query);
        let mut kinds: Vec<SmallTalkKind> = Vec::new();
        let mut pos = 0;

        while pos < words.len() {
            let rest = &words[pos..];
            let matched = PHRASES
                .iter()
                .filter(|(_, phrase)| {
                    phrase.len() <= rest.len()
                        && phrase.iter().zip(rest).all(|(p, w)| *p == w.as_str())
                })
                .max_by_key(|(_, phrase)| phrase.len());

            if let Some((kind, phrase)) = matched {
                kinds.push(*kind);
                pos += phrase.len();
            } else if FILLER.contains(&rest[0].as_str()) {
                pos += 1;
            } else {
                return QueryIntent::Qa;
            }
        }

        match kinds.into_iter().min() {
            Some(kind) => QueryIntent::SmallTalk(kind),
            None => QueryIntent::Qa,
        }
    }

    /// Route a query; strict mode skips classification entirely
    pub fn route(mode: Mode, query: &str) -> Route {
        let intent = match mode {
            Mode::Strict => QueryIntent::Qa,
            Mode::Chatty => Self::classify(query),
        };
        decide(mode, intent)
    }
}

/// The mode × intent table
pub fn decide(mode: Mode, intent: QueryIntent) -> Route {
    match (mode, intent) {
        (Mode::Chatty, QueryIntent::SmallTalk(kind)) => Route::Reply(kind),
        (Mode::Chatty, QueryIntent::Qa) => Route::Retrieve,
        (Mode::Strict, QueryIntent::SmallTalk(_)) => Route::Retrieve,
        (Mode::Strict, QueryIntent::Qa) => Route::Retrieve,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_talk(query: &str) -> Option<SmallTalkKind> {
        match ModeGuard::classify(query) {
            QueryIntent::SmallTalk(kind) => Some(kind),
            QueryIntent::Qa => None,
        }
    }

    #[test]
    fn test_phrases() {
        assert_eq!(small_talk("hi"), Some(SmallTalkKind::Greeting));
        assert_eq!(small_talk("Good morning, everyone"), Some(SmallTalkKind::Greeting));
        assert_eq!(small_talk("how are you?"), Some(SmallTalkKind::CheckIn));
        assert_eq!(small_talk("How's it going"), Some(SmallTalkKind::CheckIn));
        assert_eq!(small_talk("thanks so much!"), Some(SmallTalkKind::Thanks));
        assert_eq!(small_talk("Thank you"), Some(SmallTalkKind::Thanks));
        assert_eq!(small_talk("bye"), Some(SmallTalkKind::Farewell));
        assert_eq!(small_talk("catch you later"), Some(SmallTalkKind::Farewell));
    }

    #[test]
    fn test_priority() {
        assert_eq!(small_talk("hi, how are you"), Some(SmallTalkKind::Greeting));
        assert_eq!(small_talk("thanks, bye"), Some(SmallTalkKind::Thanks));
    }

    #[test]
    fn test_questions_are_not_small_talk() {
        assert_eq!(small_talk("hi what is A's role"), None);
        assert_eq!(small_talk("hello world"), None);
        assert_eq!(small_talk("how are you implemented"), None);
        assert_eq!(small_talk("there"), None);
        assert_eq!(small_talk(""), None);
    }

    #[test]
    fn test_decision_table() {
        let chatty_talk = decide(Mode::Chatty, QueryIntent::SmallTalk(SmallTalkKind::Greeting));
        assert_eq!(chatty_talk, Route::Reply(SmallTalkKind::Greeting));
        assert_eq!(decide(Mode::Chatty, QueryIntent::Qa), Route::Retrieve);
        assert_eq!(
            decide(Mode::Strict, QueryIntent::SmallTalk(SmallTalkKind::Thanks)),
            Route::Retrieve
        );
        assert_eq!(decide(Mode::Strict, QueryIntent::Qa), Route::Retrieve);
    }

    #[test]
    fn test_route() {
        assert_eq!(ModeGuard::route(Mode::Strict, "hi"), Route::Retrieve);
        assert_eq!(
            ModeGuard::route(Mode::Chatty, "hi"),
            Route::Reply(SmallTalkKind::Greeting)
        );
        assert_eq!(Mode::from_strict(false), Mode::Chatty);
        assert!(Mode::default().is_strict());
    }
}
