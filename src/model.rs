//! Model types for trained vocabularies.

use std::path::Path;

use rustc_hash::FxHashMap;

use crate::config::TrainerConfig;
use crate::error::Result;
use crate::serialization;

/// Symbol identifier used throughout the crate.
///
/// Ids are assigned in strictly increasing order: base characters in order of
/// first appearance in the joined corpus stream, then one new id per merge.
pub type SymbolId = u32;
/// Merge pair encoded as `(left, right)` symbol identifiers.
pub type Pair = (SymbolId, SymbolId);

/// Append-only table holding the surface string and accumulated training
/// frequency for every symbol.
///
/// Symbols are never removed; a symbol consumed everywhere in the stream
/// remains a valid vocabulary entry. Merged symbols may share a surface with
/// an earlier symbol (two different merge chains can spell the same string);
/// both entries are kept.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    surfaces: Vec<String>,
    frequencies: Vec<u64>,
    base_lookup: FxHashMap<char, SymbolId>,
}

impl SymbolTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a base character, returning its id. Repeated calls with the
    /// same character return the same id.
    pub fn intern_base(&mut self, ch: char) -> SymbolId {
        if let Some(&id) = self.base_lookup.get(&ch) {
            return id;
        }
        let id = self.surfaces.len() as SymbolId;
        self.surfaces.push(ch.to_string());
        self.frequencies.push(0);
        self.base_lookup.insert(ch, id);
        id
    }

    /// Allocates a new merged symbol whose surface is the concatenation of the
    /// two operand surfaces. Always appends, even when the surface duplicates
    /// an existing entry.
    pub fn alloc_merged(&mut self, left: SymbolId, right: SymbolId) -> SymbolId {
        let mut surface = String::with_capacity(
            self.surfaces[left as usize].len() + self.surfaces[right as usize].len(),
        );
        surface.push_str(&self.surfaces[left as usize]);
        surface.push_str(&self.surfaces[right as usize]);
        let id = self.surfaces.len() as SymbolId;
        self.surfaces.push(surface);
        self.frequencies.push(0);
        id
    }

    /// Increments a symbol's training frequency.
    #[inline]
    pub fn bump(&mut self, id: SymbolId) {
        self.frequencies[id as usize] += 1;
    }

    /// Returns the surface string for `id`.
    #[must_use]
    pub fn surface(&self, id: SymbolId) -> &str {
        &self.surfaces[id as usize]
    }

    /// Returns the accumulated training frequency for `id`.
    #[must_use]
    pub fn frequency(&self, id: SymbolId) -> u64 {
        self.frequencies[id as usize]
    }

    /// Number of symbols allocated so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    /// Returns `true` when no symbols have been allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    /// Iterates `(id, surface, frequency)` in id order.
    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &str, u64)> {
        self.surfaces
            .iter()
            .zip(&self.frequencies)
            .enumerate()
            .map(|(id, (surface, &freq))| (id as SymbolId, surface.as_str(), freq))
    }
}

/// Trained vocabulary: symbol table plus the rank-ordered merge list.
#[must_use]
#[derive(Debug, Clone)]
pub struct BpeModel {
    symbols: SymbolTable,
    merges: Vec<Pair>,
    config: TrainerConfig,
}

impl BpeModel {
    /// Constructs a model from the supplied table, merges, and configuration.
    pub fn new(symbols: SymbolTable, merges: Vec<Pair>, config: TrainerConfig) -> Self {
        Self {
            symbols,
            merges,
            config,
        }
    }

    /// Returns the symbol table backing the vocabulary.
    #[must_use]
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Returns the merge list encoded as `(left, right)` symbol identifiers;
    /// list order is rank order.
    #[must_use]
    pub fn merges(&self) -> &[Pair] {
        &self.merges
    }

    /// Returns the merge list rendered as surface-string pairs.
    #[must_use]
    pub fn merge_surfaces(&self) -> Vec<(String, String)> {
        self.merges
            .iter()
            .map(|&(left, right)| {
                (
                    self.symbols.surface(left).to_string(),
                    self.symbols.surface(right).to_string(),
                )
            })
            .collect()
    }

    /// Returns the [`TrainerConfig`] used to produce the model.
    #[must_use]
    pub fn trainer_config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Total vocabulary size, base characters and merged symbols combined.
    #[must_use]
    pub fn vocab_size(&self) -> usize {
        self.symbols.len()
    }

    /// Serialises the vocabulary to disk in the three-part JSON format.
    pub fn save<P: AsRef<Path>>(&self, path: P, pretty: bool) -> Result<()> {
        serialization::save_vocabulary(self, path, pretty)
    }

    /// Serialises the vocabulary to a JSON string.
    pub fn to_json(&self, pretty: bool) -> Result<String> {
        serialization::vocabulary_json(self, pretty)
    }
}
