//! Keyword extraction used by the relatedness test.

use std::collections::HashSet;

/// Words that carry no signal about what a ticket touches.
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "into", "onto", "over", "under", "about", "after",
    "before", "between", "through", "within", "without", "this", "that", "these", "those",
    "their", "there", "where", "when", "then", "than", "will", "should", "must", "have", "been",
    "being", "implement", "implements", "implementation", "add", "adds", "adding", "fix",
    "fixes", "fixing", "create", "creates", "update", "updates", "make", "makes", "build",
    "builds", "support", "supports", "ensure", "allow", "allows", "handle", "handles",
];

/// Extract the keyword set of a piece of text.
///
/// Lower-cases, splits on non-word characters and drops tokens of three
/// characters or fewer as well as stop words.
pub fn extract_keywords(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|token| token.chars().count() > 3)
        .filter(|token| !STOP_WORDS.contains(token))
        .map(str::to_string)
        .collect()
}

/// Number of keywords two sets have in common.
pub fn shared_keywords(a: &HashSet<String>, b: &HashSet<String>) -> usize {
    a.intersection(b).count()
}
