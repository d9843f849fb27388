//! Three-part vocabulary JSON: `vocab`, `merges`, `freq`.
//!
//! The artifact is the only channel between training runs, encoders, and
//! downstream tooling. `merges` order is the rank table and must survive
//! every serialize/deserialize cycle exactly, duplicates included. `vocab`
//! and `freq` are plain surface-keyed maps; where two symbols share a surface
//! the later id wins, matching the writer's insertion order.

use std::fs;
use std::path::Path;

use rustc_hash::FxHashMap;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::{Result, WbpeError};
use crate::model::BpeModel;

/// In-memory form of a vocabulary file. All three parts are required;
/// deserialising a document missing any of them fails.
#[derive(Debug, Clone, Deserialize)]
pub struct VocabFile {
    /// Surface string to symbol id.
    pub vocab: FxHashMap<String, u32>,
    /// Rank-ordered merges, each rendered as `"<left> <right>"`.
    pub merges: Vec<String>,
    /// Surface string to accumulated training frequency.
    pub freq: FxHashMap<String, u64>,
}

impl VocabFile {
    /// Projects a trained model into the interchange form.
    #[must_use]
    pub fn from_model(model: &BpeModel) -> Self {
        let mut vocab = FxHashMap::default();
        let mut freq = FxHashMap::default();
        for (id, surface, frequency) in model.symbols().iter() {
            vocab.insert(surface.to_string(), id);
            freq.insert(surface.to_string(), frequency);
        }
        let merges = model
            .merge_surfaces()
            .into_iter()
            .map(|(left, right)| format!("{left} {right}"))
            .collect();
        Self {
            vocab,
            merges,
            freq,
        }
    }
}

/// Splits one merge entry into its two surface fields.
///
/// Entries with any other field count are rejected; merged surfaces never
/// contain the separator, so a two-field split is unambiguous.
pub fn parse_merge(entry: &str) -> Result<(String, String)> {
    let mut fields = entry.split_whitespace();
    match (fields.next(), fields.next(), fields.next()) {
        (Some(left), Some(right), None) => Ok((left.to_string(), right.to_string())),
        _ => Err(WbpeError::Serialization(format!(
            "merge entry {entry:?} must contain exactly two fields"
        ))),
    }
}

/// Serialises the vocabulary to a JSON string with deterministic key order.
pub fn vocabulary_json(model: &BpeModel, pretty: bool) -> Result<String> {
    let mut vocab = Map::new();
    let mut freq = Map::new();
    for (id, surface, frequency) in model.symbols().iter() {
        vocab.insert(surface.to_string(), json!(id));
        freq.insert(surface.to_string(), json!(frequency));
    }
    let merges: Vec<String> = model
        .merge_surfaces()
        .into_iter()
        .map(|(left, right)| format!("{left} {right}"))
        .collect();
    let value = json!({
        "vocab": Value::Object(vocab),
        "merges": merges,
        "freq": Value::Object(freq),
    });
    let rendered = if pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    };
    Ok(rendered)
}

/// Writes the vocabulary artifact to disk.
pub fn save_vocabulary<P: AsRef<Path>>(model: &BpeModel, path: P, pretty: bool) -> Result<()> {
    let path = path.as_ref();
    let rendered = vocabulary_json(model, pretty)?;
    fs::write(path, rendered).map_err(|err| WbpeError::io(err, Some(path.to_path_buf())))
}

/// Loads a vocabulary artifact from disk.
///
/// A document missing `vocab`, `merges`, or `freq` is a fatal error; the
/// encoder refuses to operate on a partial vocabulary.
pub fn load_vocabulary<P: AsRef<Path>>(path: P) -> Result<VocabFile> {
    let path = path.as_ref();
    let data =
        fs::read_to_string(path).map_err(|err| WbpeError::io(err, Some(path.to_path_buf())))?;
    let file: VocabFile = serde_json::from_str(&data)?;
    Ok(file)
}
