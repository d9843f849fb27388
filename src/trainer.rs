//! Core training loop responsible for producing vocabulary artifacts.

use std::collections::BinaryHeap;
use std::fmt;
use std::path::Path;
use std::time::Instant;

use log::info;

use crate::config::{StopCondition, TrainerBuilder, TrainerConfig};
use crate::corpus::load_word_list;
use crate::error::{Result, WbpeError};
use crate::metrics::{sample_rss_kb, IterationMetrics, StopReason, TrainingMetrics};
use crate::model::{BpeModel, Pair, SymbolTable};
use crate::stream::{apply_merge, PairIndex, PairScore, SymbolStream};

/// High-level facade configuring and executing BPE training runs.
#[derive(Debug, Clone)]
pub struct Trainer {
    cfg: TrainerConfig,
}

/// Artifacts returned after a training session completes.
#[must_use]
#[derive(Debug, Clone)]
pub struct TrainerArtifacts {
    /// Trained vocabulary.
    pub model: BpeModel,
    /// Detailed metrics captured during training.
    pub metrics: TrainingMetrics,
}

impl Trainer {
    /// Creates a new trainer for the supplied configuration.
    #[must_use]
    pub fn new(cfg: TrainerConfig) -> Self {
        Self { cfg }
    }

    /// Returns a [`TrainerBuilder`] with default settings.
    #[must_use]
    pub fn builder() -> TrainerBuilder {
        TrainerConfig::builder()
    }

    /// Returns an immutable reference to the underlying configuration.
    #[must_use]
    pub fn config(&self) -> &TrainerConfig {
        &self.cfg
    }

    /// Trains a model from a word-list file on disk.
    pub fn train_from_path<P: AsRef<Path>>(&self, input: P) -> Result<TrainerArtifacts> {
        let words = load_word_list(input)?;
        self.train_from_words(&words)
    }

    /// Trains a model from already-deduplicated words.
    ///
    /// Fails with [`WbpeError::NoMergeablePairs`] when the joined stream
    /// contains no adjacent pair eligible for merging, for example when every
    /// word has length one.
    pub fn train_from_words(&self, words: &[String]) -> Result<TrainerArtifacts> {
        self.cfg.validate()?;

        let mut symbols = SymbolTable::new();
        let mut stream = SymbolStream::from_words(words, &mut symbols)?;
        let mut index = stream.scan_pairs(&mut symbols);
        if index.is_empty() {
            return Err(WbpeError::NoMergeablePairs(format!(
                "{} deduplicated words produced an empty pair index",
                words.len()
            )));
        }

        let mut heap = BinaryHeap::with_capacity(index.len());
        for (pair, count) in index.iter_counts() {
            heap.push(PairScore::new(pair, count));
        }

        let capacity_hint = match self.cfg.stop {
            StopCondition::MergeBudget(budget) => budget.min(16_384),
            StopCondition::MinPairFrequency(_) => 1024,
        };
        let mut metrics = TrainingMetrics::new(capacity_hint);
        let mut merges: Vec<Pair> = Vec::with_capacity(capacity_hint);
        let training_start = Instant::now();
        let mut iteration = 0usize;

        loop {
            if let StopCondition::MergeBudget(budget) = self.cfg.stop {
                if merges.len() >= budget {
                    metrics.stop_reason = StopReason::MergeBudgetReached;
                    break;
                }
            }

            let iteration_start = Instant::now();
            let Some((pair, frequency)) = pop_best(&mut heap, &index) else {
                metrics.stop_reason = StopReason::NoEligiblePairs;
                break;
            };
            if let StopCondition::MinPairFrequency(floor) = self.cfg.stop {
                if frequency < floor {
                    metrics.stop_reason = StopReason::FrequencyFloorReached;
                    break;
                }
            }

            let merged = symbols.alloc_merged(pair.0, pair.1);
            let collapsed = apply_merge(
                &mut stream,
                &mut index,
                &mut heap,
                &mut symbols,
                pair,
                merged,
            );
            debug_assert!(index.is_consistent(&stream));
            merges.push(pair);
            iteration += 1;

            if self.cfg.show_progress {
                info!(
                    "iter {:>6} freq {:>8} collapsed {:>8} distinct_pairs {:>8} live {:>10}",
                    iteration,
                    frequency,
                    collapsed,
                    index.len(),
                    stream.live_symbols()
                );
            }

            metrics.iterations.push(IterationMetrics {
                iteration,
                best_frequency: frequency,
                occurrences_collapsed: collapsed,
                distinct_pairs: index.len(),
                live_symbols: stream.live_symbols(),
                elapsed_iteration: iteration_start.elapsed(),
                elapsed_total: training_start.elapsed(),
                rss_kb: sample_rss_kb(),
            });
        }

        metrics.total_duration = training_start.elapsed();
        if self.cfg.show_progress {
            info!(
                "completed {} merges in {:.2?}; vocab size {}",
                merges.len(),
                metrics.total_duration,
                symbols.len()
            );
        }

        let model = BpeModel::new(symbols, merges, self.cfg.clone());
        Ok(TrainerArtifacts { model, metrics })
    }
}

/// Pops the highest-frequency candidate, discarding entries whose recorded
/// frequency no longer matches the index.
fn pop_best(heap: &mut BinaryHeap<PairScore>, index: &PairIndex) -> Option<(Pair, u64)> {
    loop {
        let score = heap.pop()?;
        let current = index.count(score.pair);
        if current == 0 || current != score.frequency {
            continue;
        }
        return Some((score.pair, current));
    }
}

impl fmt::Display for TrainerArtifacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "BPE vocabulary with {} symbols ({} merges)",
            self.model.vocab_size(),
            self.model.merges().len()
        )?;
        writeln!(f, "Stop reason: {:?}", self.metrics.stop_reason)?;
        writeln!(f, "Total duration: {:?}", self.metrics.total_duration)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::dedup_words;

    fn trainer(cfg: TrainerConfig) -> Trainer {
        Trainer::new(cfg)
    }

    fn owned(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| (*w).to_string()).collect()
    }

    #[test]
    fn first_merge_is_most_frequent_pair_within_words() {
        // ["aaab","aaab","abab"] dedups to {"aaab","abab"}; in "aaab abab"
        // (a,b) occurs three times and nothing crosses the space.
        let words = dedup_words(owned(&["aaab", "aaab", "abab"]));
        assert_eq!(words, vec!["aaab", "abab"]);

        let cfg = TrainerConfig::builder()
            .merge_budget(1)
            .show_progress(false)
            .build()
            .unwrap();
        let artifacts = trainer(cfg).train_from_words(&words).unwrap();
        let merges = artifacts.model.merge_surfaces();
        assert_eq!(merges, vec![("a".to_string(), "b".to_string())]);
        assert_eq!(artifacts.metrics.iterations[0].best_frequency, 3);
    }

    #[test]
    fn zero_merge_budget_yields_base_characters_only() {
        let cfg = TrainerConfig::builder()
            .merge_budget(0)
            .show_progress(false)
            .build()
            .unwrap();
        let artifacts = trainer(cfg)
            .train_from_words(&owned(&["aaab", "abab"]))
            .unwrap();
        assert!(artifacts.model.merges().is_empty());
        // a, b, and the separator.
        assert_eq!(artifacts.model.vocab_size(), 3);
        assert_eq!(
            artifacts.metrics.stop_reason,
            StopReason::MergeBudgetReached
        );
    }

    #[test]
    fn frequency_floor_stops_before_rare_merges() {
        let cfg = TrainerConfig::builder()
            .min_pair_frequency(2)
            .show_progress(false)
            .build()
            .unwrap();
        let artifacts = trainer(cfg)
            .train_from_words(&owned(&["aaab", "abab"]))
            .unwrap();
        // Only (a,b) reaches the floor; every later candidate has frequency 1.
        assert_eq!(
            artifacts.model.merge_surfaces(),
            vec![("a".to_string(), "b".to_string())]
        );
        assert_eq!(
            artifacts.metrics.stop_reason,
            StopReason::FrequencyFloorReached
        );
        for it in &artifacts.metrics.iterations {
            assert!(it.best_frequency >= 2);
        }
    }

    #[test]
    fn frequency_ties_break_towards_smallest_id_pair() {
        // "ab cd": both pairs occur once; (a,b) holds the smaller ids because
        // its characters were interned first.
        let cfg = TrainerConfig::builder()
            .merge_budget(1)
            .show_progress(false)
            .build()
            .unwrap();
        let artifacts = trainer(cfg)
            .train_from_words(&owned(&["ab", "cd"]))
            .unwrap();
        assert_eq!(
            artifacts.model.merge_surfaces(),
            vec![("a".to_string(), "b".to_string())]
        );
    }

    #[test]
    fn live_symbol_count_is_monotonically_non_increasing() {
        let cfg = TrainerConfig::builder()
            .merge_budget(16)
            .show_progress(false)
            .build()
            .unwrap();
        let artifacts = trainer(cfg)
            .train_from_words(&owned(&["banana", "bandana", "cabana"]))
            .unwrap();
        let iterations = &artifacts.metrics.iterations;
        assert!(!iterations.is_empty());
        for window in iterations.windows(2) {
            assert!(window[1].live_symbols <= window[0].live_symbols);
            assert_eq!(
                window[0].live_symbols - window[1].live_symbols,
                window[1].occurrences_collapsed
            );
        }
    }

    #[test]
    fn single_character_words_fail_with_no_mergeable_pairs() {
        let cfg = TrainerConfig::builder()
            .merge_budget(8)
            .show_progress(false)
            .build()
            .unwrap();
        let err = trainer(cfg)
            .train_from_words(&owned(&["a", "b", "c"]))
            .expect_err("training should fail");
        assert!(matches!(err, WbpeError::NoMergeablePairs(_)));
    }

    #[test]
    fn merged_symbol_ids_increase_in_merge_order() {
        let cfg = TrainerConfig::builder()
            .merge_budget(8)
            .show_progress(false)
            .build()
            .unwrap();
        let artifacts = trainer(cfg)
            .train_from_words(&owned(&["banana", "bandana"]))
            .unwrap();
        let base = artifacts.model.vocab_size() - artifacts.model.merges().len();
        for (rank, &(left, right)) in artifacts.model.merges().iter().enumerate() {
            let merged = (base + rank) as u32;
            assert!(left < merged && right < merged);
        }
    }

    #[test]
    fn training_is_deterministic_across_runs() {
        let cfg = TrainerConfig::builder()
            .merge_budget(12)
            .show_progress(false)
            .build()
            .unwrap();
        let words = owned(&["banana", "bandana", "cabana", "carrot"]);
        let first = trainer(cfg.clone()).train_from_words(&words).unwrap();
        let second = trainer(cfg).train_from_words(&words).unwrap();
        assert_eq!(first.model.merges(), second.model.merges());
        assert_eq!(
            first.model.to_json(false).unwrap(),
            second.model.to_json(false).unwrap()
        );
    }
}
