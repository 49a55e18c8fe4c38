use regex::Regex;
use std::sync::LazyLock;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

static TOKEN_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\-]+").expect("token separator pattern is valid"));

/// Canonicalize a raw keyword or context string.
///
/// Non-breaking spaces become plain spaces, byte-order marks are dropped,
/// whitespace runs collapse to one space and leading/trailing `;`, `,` and
/// spaces are trimmed. Empty input yields an empty string.
pub fn normalize(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }

    let cleaned = s.replace('\u{00A0}', " ").replace('\u{FEFF}', "");
    let collapsed = WHITESPACE.replace_all(cleaned.trim(), " ");

    collapsed
        .trim_matches(|c| matches!(c, ';' | ',' | ' '))
        .to_string()
}

/// Naive English singularization by suffix stripping.
///
/// This is a best-effort heuristic for author keywords ("polymers",
/// "properties"), not a linguistic guarantee: irregular plurals and words
/// that merely end in `s` are handled wrongly.
pub fn singularize_english(word: &str) -> String {
    let w = normalize(word);
    let len = w.chars().count();

    if len > 3 {
        if let Some(stem) = strip_suffix_ignore_case(&w, "ies") {
            return format!("{stem}y");
        }
        if ends_with_ignore_case(&w, "ses") {
            return w[..w.len() - 1].to_string();
        }
    }

    if len > 2 && ends_with_ignore_case(&w, "s") && !ends_with_ignore_case(&w, "ss") {
        return w[..w.len() - 1].to_string();
    }

    w
}

/// Lowercase and split on runs of characters that are neither word
/// characters nor hyphens.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    TOKEN_SEPARATOR
        .split(&lower)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn ends_with_ignore_case(word: &str, suffix: &str) -> bool {
    strip_suffix_ignore_case(word, suffix).is_some()
}

fn strip_suffix_ignore_case<'a>(word: &'a str, suffix: &str) -> Option<&'a str> {
    let split = word.len().checked_sub(suffix.len())?;
    let tail = word.get(split..)?;
    if tail.eq_ignore_ascii_case(suffix) {
        word.get(..split)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("  machine   learning  "), "machine learning");
        assert_eq!(normalize("\u{FEFF}polymer\u{00A0}chemistry;"), "polymer chemistry");
        assert_eq!(normalize(";, catalysis ,;"), "catalysis");
        assert_eq!(normalize("deep\n\tlearning"), "deep learning");
    }

    #[test]
    fn test_singularize() {
        assert_eq!(singularize_english("properties"), "property");
        assert_eq!(singularize_english("analyses"), "analyse");
        assert_eq!(singularize_english("polymers"), "polymer");
        assert_eq!(singularize_english("Banks"), "Bank");
        assert_eq!(singularize_english("glass"), "glass");
        assert_eq!(singularize_english("gas"), "ga");
        assert_eq!(singularize_english("is"), "is");
        assert_eq!(singularize_english("ties"), "ty");
        assert_eq!(singularize_english("POLICIES"), "POLICy");
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("Self-healing Polymers: a review (2021)"),
            vec!["self-healing", "polymers", "a", "review", "2021"]
        );
        assert!(tokenize("  ;; ").is_empty());
        assert_eq!(tokenize("Économie, café"), vec!["économie", "café"]);
    }
}
