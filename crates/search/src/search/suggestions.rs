//! Autocomplete suggestion strings
//!
//! Suggestions are stored as keyword values and matched with a prefix
//! query, so every suffix that a user might start typing from becomes its
//! own value: "alice.smith" yields "alice.smith", ".smith" and "smith".

/// Every suffix of `term` split on `separator`, rejoined with it
///
/// For separators other than a space, each suffix after the first is also
/// emitted with the separator in front.
pub fn split_by(term: &str, separator: &str) -> Vec<String> {
    if term.is_empty() {
        return Vec::new();
    }

    let parts: Vec<&str> = term.split(separator).collect();
    let suffixes: Vec<String> = (0..parts.len()).map(|i| parts[i..].join(separator)).collect();

    if separator == " " {
        return suffixes.into_iter().filter(|s| !s.is_empty()).collect();
    }

    let mut suggestions = Vec::with_capacity(suffixes.len() * 2);
    for (i, suffix) in suffixes.into_iter().enumerate() {
        if i > 0 {
            suggestions.push(format!("{}{}", separator, suffix));
        }
        suggestions.push(suffix);
    }
    suggestions.retain(|s| !s.is_empty());
    suggestions
}

/// [`split_by`] for each separator, duplicates removed in first-seen order
pub fn split_by_multiple(term: &str, separators: &[&str]) -> Vec<String> {
    let mut suggestions = Vec::new();
    for separator in separators {
        extend_unique(&mut suggestions, split_by(term, separator));
    }
    suggestions
}

/// Append values not already present
pub fn extend_unique(target: &mut Vec<String>, values: impl IntoIterator<Item = String>) {
    for value in values {
        if !target.contains(&value) {
            target.push(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_by_space() {
        assert_eq!(
            split_by("alice in wonderland", " "),
            vec!["alice in wonderland", "in wonderland", "wonderland"]
        );
    }

    #[test]
    fn test_split_by_separator_prefixes_suffixes() {
        assert_eq!(
            split_by("alice.smith", "."),
            vec!["alice.smith", ".smith", "smith"]
        );
    }

    #[test]
    fn test_split_without_separator_present() {
        assert_eq!(split_by("alice", "-"), vec!["alice"]);
    }

    #[test]
    fn test_split_empty() {
        assert!(split_by("", " ").is_empty());
    }

    #[test]
    fn test_split_by_multiple_dedupes() {
        assert_eq!(
            split_by_multiple("john_doe", &[".", "-", "_"]),
            vec!["john_doe", "_doe", "doe"]
        );
    }

    #[test]
    fn test_split_by_multiple_combines_separators() {
        let suggestions = split_by_multiple("a.b-c", &[".", "-"]);
        assert_eq!(suggestions, vec!["a.b-c", ".b-c", "b-c", "-c", "c"]);
    }
}
