//! Helpers for (de)serialising vocabularies in the three-part JSON format.

pub mod vocab_json;

pub use vocab_json::{load_vocabulary, parse_merge, save_vocabulary, vocabulary_json, VocabFile};
