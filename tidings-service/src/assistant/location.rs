//! Place-name extraction from free text.

use regex::Regex;
use std::sync::LazyLock;

use super::gazetteer;

/// Characters a captured place name may span; stops at `?`, `,`, `!` and friends
macro_rules! place {
    () => {
        r"([a-z][a-z .'\-]*)"
    };
}

/// Tried in order; the first capture that survives cleaning wins
static EXTRACTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        concat!(r"(?i)\bweather\s+(?:like\s+)?(?:in|for|at|of)\s+", place!()),
        concat!(r"(?i)\btemperature\s+(?:like\s+)?(?:in|for|at|of)\s+", place!()),
        concat!(r"(?i)\btemp\s+(?:in|for|at|of)\s+", place!()),
        r"(?i)\bknow\s+(?:the\s+)?([a-z][a-z .'\-]*?)\s+weather\b",
        r"(?i)([a-z][a-z .'\-]*?)\s+weather\b",
        concat!(r"(?i)\bweather\s+", place!()),
    ]
    .iter()
    .map(|p| Regex::new(p).expect("location pattern is valid"))
    .collect()
});

/// "I meant X", "actually X", "not X"
static CORRECTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        concat!(r"(?i)\bmeant\s+(?:in\s+)?", place!()),
        concat!(r"(?i)\bactually\s+(?:in\s+)?", place!()),
        concat!(r"(?i)\bnot\s+(?:in\s+)?", place!()),
    ]
    .iter()
    .map(|p| Regex::new(p).expect("correction pattern is valid"))
    .collect()
});

/// Words that over-greedy captures drag along with the place name
const STOP_WORDS: &[&str] = &[
    "a", "about", "an", "and", "are", "at", "be", "can", "check", "city", "could", "current",
    "currently", "do", "does", "for", "forecast", "give", "going", "how", "how's", "hows", "i",
    "in", "is", "it", "it's", "its", "know", "like", "me", "my", "now", "of", "outside",
    "please", "right", "show", "tell", "temp", "temperature", "the", "there", "this", "to",
    "today", "tomorrow", "tonight", "want", "weather", "week", "weekend", "what", "what's",
    "whats", "will", "would", "you",
];

/// Extract a canonical place name from an utterance.
///
/// Pure: the same input always yields the same output. Returns `None` when
/// nothing plausible is found so the caller can apply its default.
pub fn normalize_location(utterance: &str) -> Option<String> {
    EXTRACTION_PATTERNS
        .iter()
        .filter_map(|pattern| pattern.captures(utterance))
        .filter_map(|caps| caps.get(1))
        .find_map(|m| {
            // Known cities are matched before stop-words are stripped so
            // names such as "Salt Lake City" keep their suffix
            gazetteer::scan(m.as_str())
                .map(str::to_string)
                .or_else(|| clean_candidate(m.as_str()).map(|c| resolve_candidate(&c)))
        })
        .or_else(|| gazetteer::scan(utterance).map(str::to_string))
}

/// Extract the place a correction utterance points at.
///
/// Only gazetteer cities are accepted: a correction has to name somewhere we
/// recognize, otherwise it is treated as ordinary conversation.
pub fn correction_location(utterance: &str) -> Option<String> {
    CORRECTION_PATTERNS
        .iter()
        .filter_map(|pattern| pattern.captures(utterance))
        .filter_map(|caps| caps.get(1))
        .find_map(|m| {
            gazetteer::scan(m.as_str()).or_else(|| {
                clean_candidate(m.as_str()).and_then(|candidate| gazetteer::canonical(&candidate))
            })
        })
        .or_else(|| gazetteer::scan(utterance))
        .map(str::to_string)
}

/// Drop stop-words and punctuation; `None` when too little is left
fn clean_candidate(raw: &str) -> Option<String> {
    let cleaned = raw
        .split_whitespace()
        .map(|token| {
            let token = token.trim_matches(|c: char| !c.is_alphanumeric());
            token
                .strip_suffix("'s")
                .unwrap_or(token)
                .to_lowercase()
        })
        .filter(|token| !token.is_empty() && !STOP_WORDS.contains(&token.as_str()))
        .collect::<Vec<_>>()
        .join(" ");

    (cleaned.chars().count() > 1).then_some(cleaned)
}

fn resolve_candidate(candidate: &str) -> String {
    gazetteer::canonical(candidate)
        .or_else(|| gazetteer::scan(candidate))
        .map(str::to_string)
        .unwrap_or_else(|| gazetteer::correct_city_name(candidate))
}
