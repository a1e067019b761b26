//! Helpers for turning transcribed speech into usable text.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TextError {
    #[error("illegal number word: {0}")]
    IllegalWord(String),
    #[error("number too large")]
    Overflow,
}

static YES_OR_NO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:ye\w*|sure|please|correct|ok(?:ay)?)\b").unwrap());

static POSITIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:sure|yes|yeah|go)\b").unwrap());

static NEGATIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:not?|don't|stop|end)\b").unwrap());

static SPOKEN_PUNCTUATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*\b(period|question[- ]mark|exclamation[- ]point)\b").unwrap()
});

static SENTENCE_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]\s*").unwrap());

static NUMBER_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(zero|one|two|three|four|five|six|seven|eight|nine|ten)\b").unwrap()
});

static OPERATORS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(plus|added to|minus|divided by|multiplied by|times)\b").unwrap()
});

/// Whole-word, case-insensitive containment.
pub fn contains_word(text: &str, word: &str) -> bool {
    let word = word.trim();
    if word.is_empty() {
        return false;
    }
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .any(|w| w == word.to_lowercase())
}

/// The word that addresses the assistant, compiled once into a
/// case-insensitive whole-word pattern.
#[derive(Debug, Clone)]
pub struct WakeWord {
    word: String,
    pattern: Regex,
}

impl WakeWord {
    /// Returns `None` when `word` is blank.
    pub fn new(word: &str) -> Option<Self> {
        let word = word.trim().to_lowercase();
        if word.is_empty() {
            return None;
        }
        // A possessive ("Nikita's") goes with the word.
        let pattern =
            Regex::new(&format!(r"(?i)\b{}(?:['’]s)?\b[,.!?]*", regex::escape(&word))).ok()?;
        Some(Self { word, pattern })
    }

    /// The lower-cased word.
    pub fn as_str(&self) -> &str {
        &self.word
    }

    /// Removes every occurrence of the word along with its trailing
    /// punctuation. Returns `None` when the word is absent.
    ///
    /// With wake word "nikita", `"Nikita, what movie?"` becomes
    /// `"what movie?"`.
    pub fn strip(&self, text: &str) -> Option<String> {
        if !self.pattern.is_match(text) {
            return None;
        }
        let stripped = self.pattern.replace_all(text, " ");
        let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
        Some(
            collapsed
                .trim_matches(|c: char| c == ',' || c.is_whitespace())
                .to_string(),
        )
    }
}

/// Loose agreement check for answers to yes/no questions: any "ye..." word,
/// "sure", "please", "correct" or "ok".
pub fn yes_or_no(text: &str) -> bool {
    YES_OR_NO.is_match(text)
}

/// "sure", "yes", "yeah" or "go" as a whole word.
pub fn is_positive(text: &str) -> bool {
    POSITIVE.is_match(text)
}

/// "no", "not", "don't", "stop" or "end" as a whole word.
pub fn is_negative(text: &str) -> bool {
    NEGATIVE.is_match(text)
}

/// Replaces spoken punctuation with symbols and capitalizes each sentence.
///
/// `"hi there period how are you question mark"` becomes
/// `"Hi there. How are you?"`.
pub fn convert_punctuation(text: &str) -> String {
    let replaced = SPOKEN_PUNCTUATION.replace_all(text, |caps: &Captures<'_>| {
        let word = caps[1].to_lowercase();
        if word == "period" {
            ".".to_string()
        } else if word.starts_with("question") {
            "?".to_string()
        } else {
            "!".to_string()
        }
    });

    let mut out = String::with_capacity(replaced.len());
    let mut last = 0;
    for m in SENTENCE_SPLIT.find_iter(&replaced) {
        out.push_str(&capitalize(&replaced[last..m.start()]));
        out.push_str(m.as_str());
        last = m.end();
    }
    out.push_str(&capitalize(&replaced[last..]));
    out
}

fn capitalize(sentence: &str) -> String {
    let lower = sentence.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Replaces "zero" through "ten" with digits. Only whole words are touched,
/// so "someone" and "often" survive.
pub fn convert_number_words(text: &str) -> String {
    NUMBER_WORDS
        .replace_all(text, |caps: &Captures<'_>| {
            let digit = match caps[1].to_lowercase().as_str() {
                "zero" => "0",
                "one" => "1",
                "two" => "2",
                "three" => "3",
                "four" => "4",
                "five" => "5",
                "six" => "6",
                "seven" => "7",
                "eight" => "8",
                "nine" => "9",
                _ => "10",
            };
            digit.to_string()
        })
        .into_owned()
}

/// Replaces spoken arithmetic operators with `+ - * /`.
pub fn convert_operators(text: &str) -> String {
    OPERATORS
        .replace_all(text, |caps: &Captures<'_>| {
            let symbol = match caps[1].to_lowercase().as_str() {
                "plus" | "added to" => "+",
                "minus" => "-",
                "divided by" => "/",
                _ => "*",
            };
            symbol.to_string()
        })
        .into_owned()
}

/// (scale, increment) for each English number word.
static NUM_WORDS: Lazy<HashMap<&'static str, (u64, u64)>> = Lazy::new(|| {
    const UNITS: [&str; 20] = [
        "zero",
        "one",
        "two",
        "three",
        "four",
        "five",
        "six",
        "seven",
        "eight",
        "nine",
        "ten",
        "eleven",
        "twelve",
        "thirteen",
        "fourteen",
        "fifteen",
        "sixteen",
        "seventeen",
        "eighteen",
        "nineteen",
    ];
    const TENS: [&str; 8] = [
        "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
    ];

    let mut words = HashMap::new();
    words.insert("and", (1, 0));
    for (idx, word) in UNITS.iter().enumerate() {
        words.insert(*word, (1, idx as u64));
    }
    for (idx, word) in TENS.iter().enumerate() {
        words.insert(*word, (1, (idx as u64 + 2) * 10));
    }
    words.insert("hundred", (100, 0));
    words.insert("thousand", (1_000, 0));
    words.insert("million", (1_000_000, 0));
    words.insert("billion", (1_000_000_000, 0));
    words.insert("trillion", (1_000_000_000_000, 0));
    words
});

/// Parses English number words, e.g. "two hundred and forty two" → 242.
pub fn text_to_int(text: &str) -> Result<u64, TextError> {
    let mut current: u64 = 0;
    let mut result: u64 = 0;

    for word in text.split_whitespace() {
        let word = word.to_lowercase();
        let Some(&(scale, increment)) = NUM_WORDS.get(word.as_str()) else {
            return Err(TextError::IllegalWord(word));
        };
        current = current
            .checked_mul(scale)
            .and_then(|c| c.checked_add(increment))
            .ok_or(TextError::Overflow)?;
        if scale > 100 {
            result = result.checked_add(current).ok_or(TextError::Overflow)?;
            current = 0;
        }
    }

    result.checked_add(current).ok_or(TextError::Overflow)
}
