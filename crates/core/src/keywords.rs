use std::collections::BTreeSet;

/// Common English function words and pronouns dropped from prompts.
pub const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "nor", "so", "yet", "if", "then", "than", "because",
    "while", "of", "in", "on", "at", "to", "for", "with", "by", "from", "into", "onto", "as",
    "is", "am", "are", "was", "were", "be", "been", "being", "do", "does", "did", "doing",
    "have", "has", "had", "having", "can", "could", "will", "would", "shall", "should", "may",
    "might", "must", "not", "no", "i", "me", "my", "mine", "myself", "we", "us", "our", "ours",
    "you", "your", "yours", "he", "him", "his", "she", "her", "hers", "it", "its", "they",
    "them", "their", "theirs", "this", "that", "these", "those", "what", "which", "who", "whom",
    "whose", "when", "where", "why", "how", "there", "here", "some", "any", "all", "each",
    "just", "very", "too", "also", "only", "own", "same", "such", "more", "most", "other",
];

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

fn trim_token(token: &str) -> &str {
    token.trim_matches(|c: char| !c.is_alphanumeric())
}

/// Lowercased whitespace tokens with surrounding punctuation stripped.
pub fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace()
        .map(|t| trim_token(t).to_lowercase())
        .filter(|t| !t.is_empty())
}

/// Every prompt word, stop words included.
pub fn prompt_words(prompt: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    tokens(prompt).filter(|w| seen.insert(w.clone())).collect()
}

/// Meaningful keywords of a prompt: no stop words, nothing shorter than 3 chars.
pub fn extract_keywords(prompt: &str) -> BTreeSet<String> {
    tokens(prompt)
        .filter(|w| w.chars().count() > 2)
        .filter(|w| !is_stop_word(w))
        .collect()
}
