//! Facilities for loading and normalising line-oriented word lists.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use rustc_hash::FxHashSet;

use crate::error::{Result, WbpeError};

/// Loads a word list from disk, taking the first whitespace-delimited field of
/// each line as a candidate word.
///
/// Words are case-folded with [`str::to_lowercase`] and deduplicated in
/// first-seen order, so a word's corpus frequency plays no role in training.
/// Lines without a field are skipped; richer validation is the caller's
/// responsibility.
pub fn load_word_list<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|err| WbpeError::io(err, Some(path.to_path_buf())))?;
    let mut words = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|err| WbpeError::io(err, Some(path.to_path_buf())))?;
        if let Some(field) = line.split_whitespace().next() {
            words.push(field.to_lowercase());
        }
    }
    Ok(dedup_words(words))
}

/// Deduplicates words preserving the order of first appearance.
#[must_use]
pub fn dedup_words<I>(words: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = FxHashSet::default();
    words
        .into_iter()
        .filter(|word| seen.insert(word.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn load_word_list_takes_first_field_and_folds_case() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("words.tsv");
        fs::write(&path, "Talo\t42\nkala 7\n\ntalo\t3\nMERI\n").expect("write word list");

        let words = load_word_list(&path).expect("load word list");
        assert_eq!(words, vec!["talo", "kala", "meri"]);
    }

    #[test]
    fn dedup_preserves_first_seen_order() {
        let words = vec![
            "aaab".to_string(),
            "aaab".to_string(),
            "abab".to_string(),
            "aaab".to_string(),
        ];
        assert_eq!(dedup_words(words), vec!["aaab", "abab"]);
    }

    #[test]
    fn load_word_list_reports_missing_file() {
        let err = load_word_list("/nonexistent/words.tsv").expect_err("load should fail");
        assert!(matches!(err, WbpeError::Io { .. }));
    }
}
