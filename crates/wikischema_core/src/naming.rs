use std::sync::LazyLock;

use regex::Regex;

pub const FALLBACK_NAME: &str = "field";

/// Turns a human-readable meaning into a camelCase identifier.
///
/// Implementations must be deterministic; the same meaning always maps to the
/// same identifier so that fields can be matched by name across versions.
pub trait NameDeriver {
    fn derive(&self, meaning: &str) -> String;
}

impl<F> NameDeriver for F
where
    F: Fn(&str) -> String,
{
    fn derive(&self, meaning: &str) -> String {
        self(meaning)
    }
}

/// Rule-based deriver that needs no external models.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternNameDeriver;

static QUOTES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"['"`]"#).expect("quotes"));

/// Trimming rules applied in order before words are collected.
static TRIM_RULES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\s*\([^)]*\)",
        r"\s*\{[^}]*\}",
        r"\s*\[[^\]]*\]",
        r"\s*\*[^*]*(?:\*|$)",
        r"[;:]\s*.*$",
        r"\?\s*.*$",
        r"\.\s+.*$",
        r"\s*-\s*.*$",
        r"(?i)^the\s+",
        r"(?i)^number\s+of\s+",
        r"(?i)^total\s+",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("naming trim rule"))
    .collect()
});

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z]+").expect("word"));

const FILLER_WORDS: [&str; 14] = [
    "a", "an", "the", "of", "in", "on", "at", "to", "for", "with", "by", "that", "which", "used",
];
const BOOLEAN_PREFIXES: [&str; 3] = ["is", "has", "can"];
const MEASURE_SUFFIXES: [&str; 10] = [
    "timer", "time", "ticks", "duration", "delay", "level", "state", "type", "variant", "mode",
];

impl NameDeriver for PatternNameDeriver {
    fn derive(&self, meaning: &str) -> String {
        if meaning.trim().is_empty() {
            return FALLBACK_NAME.to_string();
        }

        let mut text = QUOTES_RE.replace_all(meaning.trim(), "").into_owned();
        for rule in TRIM_RULES.iter() {
            text = rule.replace_all(&text, "").into_owned();
        }

        let words = WORD_RE
            .find_iter(text.trim())
            .map(|found| found.as_str())
            .filter(|word| !FILLER_WORDS.contains(&word.to_ascii_lowercase().as_str()))
            .collect::<Vec<_>>();
        let Some(first) = words.first() else {
            return FALLBACK_NAME.to_string();
        };

        let first_word = first.to_ascii_lowercase();
        if BOOLEAN_PREFIXES.contains(&first_word.as_str()) {
            let tail = words.iter().skip(1).take(4).map(|word| capitalize(word));
            return first_word + &tail.collect::<String>();
        }

        let last_word = words[words.len() - 1].to_ascii_lowercase();
        if MEASURE_SUFFIXES.contains(&last_word.as_str()) {
            if words.len() == 1 {
                return last_word;
            }
            let max_prefix = match last_word.as_str() {
                "timer" | "time" | "ticks" => 3,
                _ => 2,
            };
            let base = camel_case(&words[..words.len() - 1], max_prefix);
            return match last_word.as_str() {
                "duration" | "delay" => base,
                _ => base + &capitalize(&last_word),
            };
        }

        let lowered = words
            .iter()
            .map(|word| word.to_ascii_lowercase())
            .collect::<Vec<_>>();
        let has_id = lowered.iter().any(|word| word == "id");
        if has_id || lowered.iter().any(|word| word == "entity") {
            let meaningful = words
                .iter()
                .zip(&lowered)
                .filter(|(_, lower)| *lower != "id" && *lower != "entity")
                .map(|(word, _)| *word)
                .collect::<Vec<_>>();
            if !meaningful.is_empty() {
                let base = camel_case(&meaningful, 3);
                let suffix = if has_id { "Id" } else { "Entity" };
                if base.ends_with(suffix) {
                    return base;
                }
                return base + suffix;
            }
        }

        let total_chars = words.iter().map(|word| word.len()).sum::<usize>();
        let max_words = if total_chars <= 15 {
            words.len()
        } else if total_chars <= 25 {
            4
        } else {
            3
        };
        camel_case(&words, max_words)
    }
}

/// `"Air Ticks"` style words to `airTicks`, keeping at most `limit` words.
fn camel_case(words: &[&str], limit: usize) -> String {
    words
        .iter()
        .take(limit)
        .enumerate()
        .map(|(position, word)| {
            if position == 0 {
                word.to_ascii_lowercase()
            } else {
                capitalize(word)
            }
        })
        .collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// `"Armor Stand"` to `armor_stand`.
pub fn to_snake_case(name: &str) -> String {
    let mut output = String::with_capacity(name.len());
    let mut pending_separator = false;
    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_separator && !output.is_empty() {
                output.push('_');
            }
            pending_separator = false;
            output.push(ch.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }
    output
}
