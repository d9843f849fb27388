//! Mutable symbol stream and pair bookkeeping used by the training loop.
//!
//! The stream is an arena with soft deletion: a fixed-length array of optional
//! symbol ids where a merge overwrites the left slot and tombstones the right
//! one. The pair index tracks frequency counts and occurrence positions for
//! every currently-adjacent live pair, so a merge only ever touches the
//! neighborhoods of the merged occurrences rather than rescanning the stream.

use std::cmp::Ordering;
use std::collections::{hash_map::Entry, BinaryHeap};

use rustc_hash::FxHashMap;

use crate::error::{Result, WbpeError};
use crate::model::{Pair, SymbolId, SymbolTable};

/// Stream position; `u32` keeps the position lists compact for large corpora.
pub type StreamPos = u32;

/// Fixed-length sequence of live symbol ids and tombstones.
#[derive(Debug, Clone)]
pub struct SymbolStream {
    slots: Vec<Option<SymbolId>>,
    live: usize,
    separator: Option<SymbolId>,
}

impl SymbolStream {
    /// Builds the stream by joining the deduplicated words with single-space
    /// separators and interning every base character.
    pub fn from_words(words: &[String], symbols: &mut SymbolTable) -> Result<Self> {
        let total_chars: usize = words.iter().map(|w| w.chars().count()).sum::<usize>()
            + words.len().saturating_sub(1);
        if total_chars > StreamPos::MAX as usize {
            return Err(WbpeError::InvalidConfig(format!(
                "joined corpus holds {total_chars} symbols, exceeding the supported maximum"
            )));
        }

        let mut slots = Vec::with_capacity(total_chars);
        let mut separator = None;
        for (idx, word) in words.iter().enumerate() {
            if idx > 0 {
                let sep = symbols.intern_base(' ');
                separator = Some(sep);
                slots.push(Some(sep));
            }
            for ch in word.chars() {
                slots.push(Some(symbols.intern_base(ch)));
            }
        }

        Ok(Self {
            live: slots.len(),
            slots,
            separator,
        })
    }

    /// Scans the stream once left to right, accumulating base symbol
    /// frequencies and the initial pair index. Pairs touching the separator
    /// are never tracked.
    pub fn scan_pairs(&self, symbols: &mut SymbolTable) -> PairIndex {
        let mut index = PairIndex::default();
        for slot in &self.slots {
            if let Some(id) = *slot {
                symbols.bump(id);
            }
        }
        for i in 0..self.slots.len().saturating_sub(1) {
            let (Some(left), Some(right)) = (self.slots[i], self.slots[i + 1]) else {
                continue;
            };
            if self.is_separator(left) || self.is_separator(right) {
                continue;
            }
            index.record((left, right), (i as StreamPos, (i + 1) as StreamPos));
        }
        index
    }

    /// Total slot count, tombstones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` when the stream has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Count of live (non-tombstone) slots; monotonically non-increasing.
    #[must_use]
    pub fn live_symbols(&self) -> usize {
        self.live
    }

    /// Returns the separator symbol id, if the corpus contained one.
    #[must_use]
    pub fn separator(&self) -> Option<SymbolId> {
        self.separator
    }

    /// Returns `true` when `id` is the word separator.
    #[inline]
    #[must_use]
    pub fn is_separator(&self, id: SymbolId) -> bool {
        self.separator == Some(id)
    }

    /// Returns the live symbol at `pos`, or `None` for a tombstone.
    #[inline]
    #[must_use]
    pub fn get(&self, pos: StreamPos) -> Option<SymbolId> {
        self.slots[pos as usize]
    }

    /// Nearest live symbol strictly before `pos`, skipping tombstones.
    #[must_use]
    pub fn prev_live(&self, pos: StreamPos) -> Option<(StreamPos, SymbolId)> {
        (0..pos as usize)
            .rev()
            .find_map(|k| self.slots[k].map(|id| (k as StreamPos, id)))
    }

    /// Nearest live symbol strictly after `pos`, skipping tombstones.
    #[must_use]
    pub fn next_live(&self, pos: StreamPos) -> Option<(StreamPos, SymbolId)> {
        (pos as usize + 1..self.slots.len())
            .find_map(|k| self.slots[k].map(|id| (k as StreamPos, id)))
    }

    /// Collapses one occurrence: slot `i` takes the merged id, slot `j`
    /// becomes a tombstone, and the live count drops by one.
    pub fn collapse(&mut self, i: StreamPos, j: StreamPos, merged: SymbolId) {
        self.slots[i as usize] = Some(merged);
        self.slots[j as usize] = None;
        self.live -= 1;
    }
}

/// Frequency counts and occurrence positions for currently-adjacent pairs.
///
/// Counts are authoritative; position lists are validated lazily, so an entry
/// is meaningful only while both slots still hold the recorded symbols. Pairs
/// whose count reaches zero are removed from both maps.
#[derive(Debug, Clone, Default)]
pub struct PairIndex {
    counts: FxHashMap<Pair, u64>,
    positions: FxHashMap<Pair, Vec<(StreamPos, StreamPos)>>,
}

impl PairIndex {
    /// Records one occurrence of `pair` starting at `pos`.
    pub fn record(&mut self, pair: Pair, pos: (StreamPos, StreamPos)) {
        *self.counts.entry(pair).or_insert(0) += 1;
        self.positions.entry(pair).or_default().push(pos);
    }

    /// Current frequency of `pair`, zero when untracked.
    #[must_use]
    pub fn count(&self, pair: Pair) -> u64 {
        self.counts.get(&pair).copied().unwrap_or(0)
    }

    /// Number of distinct tracked pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Returns `true` when no pairs are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Iterates `(pair, frequency)` over all tracked pairs.
    pub fn iter_counts(&self) -> impl Iterator<Item = (Pair, u64)> + '_ {
        self.counts.iter().map(|(&pair, &count)| (pair, count))
    }

    /// Removes `pair` from both maps, returning its recorded positions.
    fn take(&mut self, pair: Pair) -> Vec<(StreamPos, StreamPos)> {
        self.counts.remove(&pair);
        self.positions.remove(&pair).unwrap_or_default()
    }

    /// Applies one net frequency delta, dropping the pair entirely when the
    /// count reaches zero and re-pushing the updated score otherwise.
    fn apply_delta(&mut self, pair: Pair, delta: i64, heap: &mut BinaryHeap<PairScore>) {
        match delta.cmp(&0) {
            Ordering::Greater => {
                let count = self.counts.entry(pair).or_insert(0);
                *count += delta.unsigned_abs();
                heap.push(PairScore::new(pair, *count));
            }
            Ordering::Less => {
                if let Entry::Occupied(mut occupied) = self.counts.entry(pair) {
                    let remaining = occupied.get().saturating_sub(delta.unsigned_abs());
                    if remaining == 0 {
                        occupied.remove();
                        self.positions.remove(&pair);
                    } else {
                        *occupied.get_mut() = remaining;
                        heap.push(PairScore::new(pair, remaining));
                    }
                }
            }
            Ordering::Equal => {}
        }
    }

    /// Appends freshly recorded positions for a pair that survived the batch.
    fn extend_positions(&mut self, pair: Pair, fresh: Vec<(StreamPos, StreamPos)>) {
        if self.counts.contains_key(&pair) {
            self.positions.entry(pair).or_default().extend(fresh);
        }
    }

    /// Verifies that every tracked pair's count equals the number of its
    /// recorded positions that are still valid in `stream`. Used by tests and
    /// debug assertions.
    #[must_use]
    pub fn is_consistent(&self, stream: &SymbolStream) -> bool {
        self.counts.iter().all(|(&(left, right), &count)| {
            let valid = self
                .positions
                .get(&(left, right))
                .map(|entries| {
                    entries
                        .iter()
                        .filter(|&&(i, j)| {
                            stream.get(i) == Some(left)
                                && stream.get(j) == Some(right)
                                && stream.next_live(i).map(|(pos, _)| pos) == Some(j)
                        })
                        .count() as u64
                })
                .unwrap_or(0);
            valid == count
        })
    }
}

/// Heap entry ordering pair candidates by frequency, breaking ties towards the
/// lexicographically smallest `(left, right)` id pair so selection is
/// deterministic across runs.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PairScore {
    /// Frequency at the time the score was pushed.
    pub frequency: u64,
    /// The candidate pair.
    pub pair: Pair,
}

impl PairScore {
    /// Creates a new score entry.
    #[must_use]
    pub fn new(pair: Pair, frequency: u64) -> Self {
        Self { frequency, pair }
    }
}

impl Ord for PairScore {
    fn cmp(&self, other: &Self) -> Ordering {
        self.frequency
            .cmp(&other.frequency)
            .then_with(|| other.pair.cmp(&self.pair))
    }
}

impl PartialOrd for PairScore {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Applies one merge to the stream and pair index, returning the number of
/// occurrences collapsed.
///
/// Every recorded occurrence of `pair` is revisited; entries whose slots no
/// longer hold the pair (tombstoned or consumed earlier in the same batch) are
/// skipped. Frequency deltas accumulate in a batch and are applied once at the
/// end, avoiding order-dependent intermediate states; freshly created pair
/// positions are kept only when the pair's post-batch count is positive.
pub fn apply_merge(
    stream: &mut SymbolStream,
    index: &mut PairIndex,
    heap: &mut BinaryHeap<PairScore>,
    symbols: &mut SymbolTable,
    pair: Pair,
    merged: SymbolId,
) -> usize {
    let occurrences = index.take(pair);
    let mut deltas: FxHashMap<Pair, i64> = FxHashMap::default();
    let mut fresh: FxHashMap<Pair, Vec<(StreamPos, StreamPos)>> = FxHashMap::default();
    let mut collapsed = 0usize;

    for (i, j) in occurrences {
        if stream.get(i) != Some(pair.0) || stream.get(j) != Some(pair.1) {
            continue;
        }

        if let Some((prev_pos, prev)) = stream.prev_live(i) {
            if !stream.is_separator(prev) {
                *deltas.entry((prev, pair.0)).or_insert(0) -= 1;
                *deltas.entry((prev, merged)).or_insert(0) += 1;
                fresh.entry((prev, merged)).or_default().push((prev_pos, i));
            }
        }
        if let Some((next_pos, next)) = stream.next_live(j) {
            if !stream.is_separator(next) {
                *deltas.entry((pair.1, next)).or_insert(0) -= 1;
                *deltas.entry((merged, next)).or_insert(0) += 1;
                fresh.entry((merged, next)).or_default().push((i, next_pos));
            }
        }

        stream.collapse(i, j, merged);
        symbols.bump(merged);
        collapsed += 1;
    }

    for (delta_pair, delta) in deltas {
        index.apply_delta(delta_pair, delta, heap);
    }
    for (fresh_pair, positions) in fresh {
        index.extend_positions(fresh_pair, positions);
    }

    collapsed
}
