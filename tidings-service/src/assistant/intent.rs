//! Ordered rule classifier for user utterances.
//!
//! Every rule is a predicate plus an extractor. Rules are evaluated in order
//! and the first rule whose predicate holds and whose extractor produces a
//! classification wins. The small-talk rule always produces one, so
//! classification is total.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use strum::{Display, IntoStaticStr};

use super::location::{correction_location, normalize_location};
use crate::config::AssistantConfig;
use crate::models::ConversationMessage;
use crate::tools::motorsport::{MotorsportQuery, RaceView};

/// How many trailing history messages a correction may refer back to
const CORRECTION_WINDOW: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, Serialize)]
#[strum(serialize_all = "snake_case")]
pub enum Intent {
    Weather,
    Motorsport,
    Equity,
    Correction,
    SmallTalk,
}

/// Canned conversational topics, in matching order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum SmallTalkTopic {
    Greeting,
    HowAreYou,
    GoodMorning,
    GoodAfternoon,
    GoodEvening,
    Thanks,
    Farewell,
    Help,
    Capability,
    Region,
    Uncertain,
    Fallback,
}

/// An intent together with the parameters its handler needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Weather { location: String },
    Motorsport(MotorsportQuery),
    Equity { symbol: String },
    Correction { location: String },
    SmallTalk(SmallTalkTopic),
}

impl Classification {
    pub fn intent(&self) -> Intent {
        match self {
            Classification::Weather { .. } => Intent::Weather,
            Classification::Motorsport(_) => Intent::Motorsport,
            Classification::Equity { .. } => Intent::Equity,
            Classification::Correction { .. } => Intent::Correction,
            Classification::SmallTalk(_) => Intent::SmallTalk,
        }
    }
}

/// Pre-digested view of the latest utterance
struct Utterance<'a> {
    text: &'a str,
    lower: String,
    /// Lower-cased words joined by single spaces and padded with one space
    /// on each side, so phrases can be matched on word boundaries
    padded: String,
}

impl<'a> Utterance<'a> {
    fn new(text: &'a str) -> Self {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !(c.is_alphanumeric() || c == '\''))
            .map(|w| w.trim_matches('\''))
            .filter(|w| !w.is_empty())
            .collect();
        let padded = format!(" {} ", words.join(" "));
        Self {
            text,
            lower,
            padded,
        }
    }

    fn contains_any(&self, needles: &[&str]) -> bool {
        needles.iter().any(|n| self.lower.contains(n))
    }

    /// Whole-word (or whole-phrase) match
    fn has_phrase(&self, phrase: &str) -> bool {
        self.padded.contains(&format!(" {} ", phrase))
    }

    fn has_any_phrase(&self, phrases: &[&str]) -> bool {
        phrases.iter().any(|p| self.has_phrase(p))
    }
}

type Predicate = fn(&Utterance<'_>, &[ConversationMessage]) -> bool;
type Extractor = fn(&Classifier, &Utterance<'_>, &[ConversationMessage]) -> Option<Classification>;

struct Rule {
    intent: Intent,
    applies: Predicate,
    extract: Extractor,
}

/// Evaluated top to bottom
const RULES: &[Rule] = &[
    Rule {
        intent: Intent::Weather,
        applies: |u, _| u.contains_any(&["weather", "temp"]),
        extract: |c, u, _| {
            Some(Classification::Weather {
                location: normalize_location(u.text)
                    .unwrap_or_else(|| c.default_location.clone()),
            })
        },
    },
    Rule {
        intent: Intent::Motorsport,
        applies: |u, _| u.contains_any(&["f1", "formula"]),
        extract: |_, u, _| Some(Classification::Motorsport(motorsport_query(u))),
    },
    Rule {
        intent: Intent::Equity,
        applies: |u, _| u.contains_any(&["stock", "price"]),
        extract: |c, u, _| {
            Some(Classification::Equity {
                symbol: equity_symbol(u.text).unwrap_or_else(|| c.default_symbol.clone()),
            })
        },
    },
    Rule {
        intent: Intent::Correction,
        applies: |u, history| {
            u.has_any_phrase(&["not", "no", "meant", "actually"])
                && history
                    .iter()
                    .rev()
                    .take(CORRECTION_WINDOW)
                    .any(ConversationMessage::mentions_weather)
        },
        extract: |_, u, _| {
            correction_location(u.text).map(|location| Classification::Correction { location })
        },
    },
    Rule {
        intent: Intent::SmallTalk,
        applies: |_, _| true,
        extract: |_, u, _| Some(Classification::SmallTalk(small_talk_topic(u))),
    },
];

/// Topic keyword table, in matching order
const SMALL_TALK: &[(SmallTalkTopic, &[&str])] = &[
    (SmallTalkTopic::Greeting, &["hi", "hello", "hey", "hiya", "greetings"]),
    (
        SmallTalkTopic::HowAreYou,
        &["how are you", "how are u", "how's it going", "how do you do"],
    ),
    (SmallTalkTopic::GoodMorning, &["good morning", "morning"]),
    (SmallTalkTopic::GoodAfternoon, &["good afternoon", "afternoon"]),
    (SmallTalkTopic::GoodEvening, &["good evening", "evening"]),
    (SmallTalkTopic::Thanks, &["thanks", "thank", "thx", "ty"]),
    (
        SmallTalkTopic::Farewell,
        &["bye", "goodbye", "see you", "see ya", "cya", "good night"],
    ),
    (SmallTalkTopic::Help, &["help", "what can you do"]),
    (
        SmallTalkTopic::Capability,
        &["optimize", "optimise", "optimizing", "improve", "improving", "improvement"],
    ),
    (
        SmallTalkTopic::Region,
        &["america", "american", "usa", "united states"],
    ),
    (
        SmallTalkTopic::Uncertain,
        &["don't know", "dont know", "not sure", "no idea"],
    ),
];

/// Upper-case words the symbol patterns pick up that are never tickers
const NOT_SYMBOLS: &[&str] = &["I", "STOCK", "PRICE", "OF", "FOR"];

static SYMBOL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\b([A-Z]{1,5})\s+(?i:stock)",
        r"\b([A-Z]{1,5})\s+(?i:price)",
        r"(?i:stock)s?\s+([A-Z]{1,5})\b",
        r"(?i:price)s?\s+([A-Z]{1,5})\b",
        r"(?i:stock|price)s?\s+(?i:of|for)\s+([A-Z]{1,5})\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("symbol pattern is valid"))
    .collect()
});

/// Deterministic intent classification over the latest utterance
#[derive(Debug, Clone)]
pub struct Classifier {
    default_location: String,
    default_symbol: String,
}

impl Classifier {
    pub fn new(config: &AssistantConfig) -> Self {
        Self {
            default_location: config.default_location.clone(),
            default_symbol: config.default_symbol.clone(),
        }
    }

    /// Classify `latest` given the messages that preceded it
    pub fn classify(&self, history: &[ConversationMessage], latest: &str) -> Classification {
        let utterance = Utterance::new(latest);
        RULES
            .iter()
            .filter(|rule| (rule.applies)(&utterance, history))
            .find_map(|rule| {
                let classification = (rule.extract)(self, &utterance, history);
                debug_assert!(
                    classification
                        .as_ref()
                        .is_none_or(|c| c.intent() == rule.intent)
                );
                classification
            })
            .unwrap_or(Classification::SmallTalk(SmallTalkTopic::Fallback))
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(&AssistantConfig::default())
    }
}

fn motorsport_query(u: &Utterance<'_>) -> MotorsportQuery {
    let view = if u.contains_any(&["result", "latest"]) {
        RaceView::LatestRace
    } else if u.contains_any(&["standing"]) {
        RaceView::Standings
    } else {
        RaceView::NextRace
    };
    MotorsportQuery {
        view,
        compact: u.has_any_phrase(&["podium", "top"]),
    }
}

fn equity_symbol(text: &str) -> Option<String> {
    SYMBOL_PATTERNS
        .iter()
        .flat_map(|p| p.captures_iter(text))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .find(|candidate| !NOT_SYMBOLS.contains(candidate))
        .map(str::to_string)
}

fn small_talk_topic(u: &Utterance<'_>) -> SmallTalkTopic {
    SMALL_TALK
        .iter()
        .find(|(_, phrases)| u.has_any_phrase(phrases))
        .map(|(topic, _)| *topic)
        .unwrap_or(SmallTalkTopic::Fallback)
}
