use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref TERM_RE: Regex = Regex::new(r"[a-z0-9]+").expect("valid regex");
}

/// Lowercase the input and split it into runs of ASCII letters and digits.
///
/// Used identically at indexing time and query time so term matching is
/// symmetric. Empty input yields an empty sequence.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TERM_RE
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}
