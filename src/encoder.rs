//! Greedy application of a trained vocabulary to text.
//!
//! Segmentation replays the learned merges by rank: among all adjacent pairs
//! in the working sequence, the earliest-learned one is applied across every
//! non-overlapping occurrence, until no adjacent pair is ranked. The result
//! is deterministic and idempotent for a fixed vocabulary.

use std::path::Path;

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::error::Result;
use crate::model::{BpeModel, SymbolId};
use crate::serialization::{self, parse_merge, VocabFile};

/// Glyph substituted for unknown ids and encoded for unknown characters.
pub const PLACEHOLDER: char = '\u{FFFD}';

/// Surface of the word separator inserted between encoded words.
pub const SEPARATOR: &str = " ";

/// Read-only tokenizer over one trained vocabulary.
#[must_use]
#[derive(Debug, Clone)]
pub struct Tokenizer {
    vocab: FxHashMap<String, SymbolId>,
    reverse: FxHashMap<SymbolId, String>,
    ranks: FxHashMap<(String, String), usize>,
    merges: Vec<(String, String)>,
    freq: FxHashMap<String, u64>,
    // Parent-pointer table: composite surface -> the first merge producing it.
    parents: FxHashMap<String, (String, String)>,
    separator: Option<SymbolId>,
    placeholder: SymbolId,
}

/// Recursive decomposition of a token into the merges that built it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenTree {
    /// Surface of this node.
    pub token: String,
    /// The two operands of the producing merge; empty for leaves.
    pub children: Vec<TokenTree>,
}

impl Tokenizer {
    /// Loads a tokenizer from a vocabulary file on disk.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_vocab_file(serialization::load_vocabulary(path)?)
    }

    /// Builds a tokenizer directly from a trained model.
    pub fn from_model(model: &BpeModel) -> Result<Self> {
        Self::from_vocab_file(VocabFile::from_model(model))
    }

    /// Builds a tokenizer from the interchange form.
    pub fn from_vocab_file(file: VocabFile) -> Result<Self> {
        let mut ranks = FxHashMap::default();
        let mut parents = FxHashMap::default();
        let mut merges = Vec::with_capacity(file.merges.len());
        for (rank, entry) in file.merges.iter().enumerate() {
            let (left, right) = parse_merge(entry)?;
            let mut combined = String::with_capacity(left.len() + right.len());
            combined.push_str(&left);
            combined.push_str(&right);
            // Duplicate merge entries: the latest rank wins for selection,
            // the earliest merge wins for ancestry.
            ranks.insert((left.clone(), right.clone()), rank);
            parents
                .entry(combined)
                .or_insert_with(|| (left.clone(), right.clone()));
            merges.push((left, right));
        }

        let reverse: FxHashMap<SymbolId, String> = file
            .vocab
            .iter()
            .map(|(surface, &id)| (id, surface.clone()))
            .collect();
        let separator = file.vocab.get(SEPARATOR).copied();
        let placeholder = file
            .vocab
            .get(&PLACEHOLDER.to_string())
            .copied()
            .unwrap_or_else(|| file.vocab.values().max().map_or(0, |&max| max + 1));

        Ok(Self {
            vocab: file.vocab,
            reverse,
            ranks,
            merges,
            freq: file.freq,
            parents,
            separator,
            placeholder,
        })
    }

    /// Number of distinct surfaces in the vocabulary.
    #[must_use]
    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    /// The rank-ordered merge list.
    #[must_use]
    pub fn merges(&self) -> &[(String, String)] {
        &self.merges
    }

    /// Training frequency recorded for a surface, if any.
    #[must_use]
    pub fn frequency(&self, surface: &str) -> Option<u64> {
        self.freq.get(surface).copied()
    }

    /// Id inserted between words during full-text encoding, when the
    /// vocabulary learned a separator.
    #[must_use]
    pub fn separator_id(&self) -> Option<SymbolId> {
        self.separator
    }

    /// Id substituted for unknown characters.
    #[must_use]
    pub fn placeholder_id(&self) -> SymbolId {
        self.placeholder
    }

    /// Segments a single word into subword surfaces.
    pub fn encode_word(&self, word: &str) -> Vec<String> {
        let mut pieces: Vec<String> = word.chars().map(|ch| ch.to_string()).collect();
        while pieces.len() > 1 {
            let mut best: Option<(usize, usize)> = None;
            for i in 0..pieces.len() - 1 {
                let key = (pieces[i].clone(), pieces[i + 1].clone());
                if let Some(&rank) = self.ranks.get(&key) {
                    if best.map_or(true, |(best_rank, _)| rank < best_rank) {
                        best = Some((rank, i));
                    }
                }
            }
            let Some((_, anchor)) = best else {
                break;
            };
            let left = pieces[anchor].clone();
            let right = pieces[anchor + 1].clone();

            let mut next = Vec::with_capacity(pieces.len());
            let mut i = 0;
            while i < pieces.len() {
                if i + 1 < pieces.len() && pieces[i] == left && pieces[i + 1] == right {
                    let mut merged = String::with_capacity(left.len() + right.len());
                    merged.push_str(&left);
                    merged.push_str(&right);
                    next.push(merged);
                    i += 2;
                } else {
                    next.push(pieces[i].clone());
                    i += 1;
                }
            }
            pieces = next;
        }
        pieces
    }

    /// Encodes full text to symbol ids: lowercase, whitespace-split, one
    /// separator id between words. Never fails; unknown subwords degrade to
    /// per-character ids and unknown characters to the placeholder id.
    pub fn encode(&self, text: &str) -> Vec<SymbolId> {
        let mut ids = Vec::new();
        for word in text.to_lowercase().split_whitespace() {
            if !ids.is_empty() {
                ids.push(self.separator.unwrap_or(self.placeholder));
            }
            for piece in self.encode_word(word) {
                self.resolve_subword(&piece, &mut ids);
            }
        }
        ids
    }

    /// Ordered fallback: known subword id, else per-character ids, else the
    /// placeholder id per unknown character.
    fn resolve_subword(&self, subword: &str, out: &mut Vec<SymbolId>) {
        if let Some(&id) = self.vocab.get(subword) {
            out.push(id);
            return;
        }
        let mut buf = [0u8; 4];
        for ch in subword.chars() {
            let key: &str = ch.encode_utf8(&mut buf);
            out.push(self.vocab.get(key).copied().unwrap_or(self.placeholder));
        }
    }

    /// Decodes symbol ids back to text; unknown ids render the placeholder
    /// glyph. A true inverse of [`Tokenizer::encode`] only for id sequences
    /// produced by this same vocabulary.
    #[must_use]
    pub fn decode(&self, ids: &[SymbolId]) -> String {
        let mut text = String::new();
        for id in ids {
            match self.reverse.get(id) {
                Some(surface) => text.push_str(surface),
                None => text.push(PLACEHOLDER),
            }
        }
        text
    }

    /// Space-joined surface forms of the given ids, for diagnostics.
    #[must_use]
    pub fn token_texts(&self, ids: &[SymbolId]) -> String {
        ids.iter()
            .map(|id| {
                self.reverse
                    .get(id)
                    .map_or_else(|| PLACEHOLDER.to_string(), Clone::clone)
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Returns the merge ancestry of a token: its producing merge followed by
    /// the ancestries of the left and right operands.
    #[must_use]
    pub fn lineage(&self, token: &str) -> Vec<(String, String)> {
        let mut history = Vec::new();
        self.collect_lineage(token, &mut history);
        history
    }

    fn collect_lineage(&self, token: &str, out: &mut Vec<(String, String)>) {
        if token.chars().count() <= 1 {
            return;
        }
        if let Some((left, right)) = self.parents.get(token).cloned() {
            out.push((left.clone(), right.clone()));
            self.collect_lineage(&left, out);
            self.collect_lineage(&right, out);
        }
    }

    /// Builds the recursive decomposition of one token.
    pub fn token_tree(&self, token: &str) -> TokenTree {
        if token.chars().count() <= 1 {
            return TokenTree {
                token: token.to_string(),
                children: Vec::new(),
            };
        }
        match self.parents.get(token).cloned() {
            Some((left, right)) => TokenTree {
                token: token.to_string(),
                children: vec![self.token_tree(&left), self.token_tree(&right)],
            },
            None => TokenTree {
                token: token.to_string(),
                children: Vec::new(),
            },
        }
    }

    /// Segments a word and decomposes every resulting subword.
    pub fn tokenization_trees(&self, word: &str) -> Vec<TokenTree> {
        self.encode_word(word)
            .iter()
            .map(|piece| self.token_tree(piece))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainerConfig;
    use crate::trainer::Trainer;

    fn trained_tokenizer(words: &[&str], budget: usize) -> Tokenizer {
        let cfg = TrainerConfig::builder()
            .merge_budget(budget)
            .show_progress(false)
            .build()
            .unwrap();
        let words: Vec<String> = words.iter().map(|w| (*w).to_string()).collect();
        let artifacts = Trainer::new(cfg).train_from_words(&words).expect("training");
        Tokenizer::from_model(&artifacts.model).expect("tokenizer")
    }

    fn hand_built(vocab: &[(&str, u32)], merges: &[&str]) -> Tokenizer {
        let file = VocabFile {
            vocab: vocab.iter().map(|&(s, id)| (s.to_string(), id)).collect(),
            merges: merges.iter().map(|m| (*m).to_string()).collect(),
            freq: vocab.iter().map(|&(s, _)| (s.to_string(), 1)).collect(),
        };
        Tokenizer::from_vocab_file(file).expect("tokenizer")
    }

    #[test]
    fn encoding_is_idempotent() {
        let tokenizer = trained_tokenizer(&["banana", "bandana", "cabana"], 8);
        let first = tokenizer.encode("banana cabana");
        let second = tokenizer.encode("banana cabana");
        assert_eq!(first, second);
    }

    #[test]
    fn earlier_merges_always_win() {
        // With ("a","b") learned before ("ab","c"), "abc" must become the
        // single unit "abc", never "a"+"bc" or a final "ab"+"c".
        let tokenizer = hand_built(
            &[("a", 0), ("b", 1), ("c", 2), ("ab", 3), ("abc", 4)],
            &["a b", "ab c"],
        );
        assert_eq!(tokenizer.encode_word("abc"), vec!["abc"]);
        assert_eq!(tokenizer.encode("abc"), vec![4]);
    }

    #[test]
    fn unranked_pairs_leave_the_sequence_untouched() {
        let tokenizer = hand_built(&[("a", 0), ("b", 1), ("ab", 2)], &["a b"]);
        assert_eq!(tokenizer.encode_word("ba"), vec!["b", "a"]);
        assert_eq!(tokenizer.encode_word("abab"), vec!["ab", "ab"]);
    }

    #[test]
    fn unknown_characters_degrade_to_placeholders() {
        let tokenizer = trained_tokenizer(&["aaab", "abab"], 2);
        let ids = tokenizer.encode("xyz");
        assert_eq!(ids, vec![tokenizer.placeholder_id(); 3]);
        assert_eq!(tokenizer.decode(&ids), "\u{FFFD}\u{FFFD}\u{FFFD}");
    }

    #[test]
    fn unknown_subword_falls_back_to_characters() {
        // "ba" was never merged, so the pieces resolve character by
        // character; "q" is absent entirely and lands on the placeholder.
        let tokenizer = hand_built(&[("a", 0), ("b", 1), ("ab", 2)], &["a b"]);
        assert_eq!(tokenizer.encode("baq"), vec![1, 0, tokenizer.placeholder_id()]);
    }

    #[test]
    fn words_are_separated_by_the_separator_token() {
        let tokenizer = trained_tokenizer(&["aaab", "abab"], 2);
        let separator = tokenizer.separator_id().expect("separator learned");
        let ids = tokenizer.encode("ab ab ab");
        let separators = ids.iter().filter(|&&id| id == separator).count();
        assert_eq!(separators, 2);
        assert_eq!(tokenizer.decode(&ids), "ab ab ab");
    }

    #[test]
    fn case_folding_matches_training() {
        let tokenizer = trained_tokenizer(&["aaab", "abab"], 2);
        assert_eq!(tokenizer.encode("ABAB"), tokenizer.encode("abab"));
    }

    #[test]
    fn decode_inverts_encode_for_known_text() {
        let tokenizer = trained_tokenizer(&["banana", "bandana", "cabana"], 8);
        let ids = tokenizer.encode("banana bandana");
        assert_eq!(tokenizer.decode(&ids), "banana bandana");
    }

    #[test]
    fn reloaded_vocabulary_encodes_identically() {
        use tempfile::tempdir;

        let cfg = TrainerConfig::builder()
            .merge_budget(8)
            .show_progress(false)
            .build()
            .unwrap();
        let words: Vec<String> = ["banana", "bandana", "cabana"]
            .iter()
            .map(|w| (*w).to_string())
            .collect();
        let artifacts = Trainer::new(cfg).train_from_words(&words).expect("training");

        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("vocab.json");
        artifacts.model.save(&path, false).expect("save");

        let direct = Tokenizer::from_model(&artifacts.model).expect("tokenizer");
        let reloaded = Tokenizer::from_file(&path).expect("tokenizer from file");
        for text in ["banana", "bandana cabana", "unseen words here"] {
            assert_eq!(direct.encode(text), reloaded.encode(text));
        }
    }

    #[test]
    fn lineage_walks_the_parent_table() {
        let tokenizer = hand_built(
            &[("a", 0), ("b", 1), ("c", 2), ("ab", 3), ("abc", 4)],
            &["a b", "ab c"],
        );
        assert_eq!(
            tokenizer.lineage("abc"),
            vec![
                ("ab".to_string(), "c".to_string()),
                ("a".to_string(), "b".to_string()),
            ]
        );
        assert!(tokenizer.lineage("a").is_empty());
        assert!(tokenizer.lineage("zz").is_empty());
    }

    #[test]
    fn token_tree_decomposes_to_characters() {
        let tokenizer = hand_built(
            &[("a", 0), ("b", 1), ("c", 2), ("ab", 3), ("abc", 4)],
            &["a b", "ab c"],
        );
        let tree = tokenizer.token_tree("abc");
        assert_eq!(tree.token, "abc");
        assert_eq!(tree.children.len(), 2);
        assert_eq!(tree.children[0].token, "ab");
        assert_eq!(tree.children[1].token, "c");
        assert_eq!(tree.children[0].children[0].token, "a");
    }

    #[test]
    fn separator_isolation_no_merge_spans_words() {
        let tokenizer = trained_tokenizer(&["aaab", "abab", "baba"], 16);
        for (left, right) in tokenizer.merges() {
            assert!(!left.contains(' '), "merge operand spans separator");
            assert!(!right.contains(' '), "merge operand spans separator");
        }
    }
}
