//! Search phrase occurrence counting.

/// Count case-insensitive, non-overlapping occurrences of `phrase` in the
/// concatenation of `title` and `description` (no separator in between).
///
/// An empty or whitespace-only phrase counts as 0; counting empty matches has
/// no useful meaning.
pub fn count(title: &str, description: &str, phrase: &str) -> usize {
    if phrase.trim().is_empty() {
        return 0;
    }
    let haystack = format!("{title}{description}").to_lowercase();
    haystack.matches(&phrase.to_lowercase()).count()
}
