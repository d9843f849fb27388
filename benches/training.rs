use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, SamplingMode, Throughput};
use wbpe::{Trainer, TrainerConfig};

fn build_word_list() -> Vec<String> {
    // Synthetic morphology: stems crossed with suffixes gives the trainer
    // repeated substructure to discover.
    let stems = [
        "walk", "talk", "jump", "read", "write", "play", "work", "light", "dark", "quick", "slow",
        "happy", "grand", "under", "over", "out",
    ];
    let suffixes = [
        "", "s", "ed", "ing", "er", "est", "ly", "ness", "ful", "less", "able", "ment",
    ];
    let mut words = Vec::with_capacity(stems.len() * suffixes.len());
    for stem in stems {
        for suffix in suffixes {
            words.push(format!("{stem}{suffix}"));
        }
    }
    words
}

fn bench_training(c: &mut Criterion) {
    let words = build_word_list();
    let total_bytes: usize = words.iter().map(String::len).sum();
    let cfg = TrainerConfig::builder()
        .merge_budget(256)
        .show_progress(false)
        .build()
        .expect("configuration");

    let mut group = c.benchmark_group("train_word_list");
    group.throughput(Throughput::Bytes(total_bytes as u64));
    group.sampling_mode(SamplingMode::Flat);
    group.bench_function(BenchmarkId::from_parameter("words_192"), |b| {
        b.iter(|| {
            let trainer = Trainer::new(cfg.clone());
            let artefacts = trainer.train_from_words(&words).expect("training");
            let _ = black_box(artefacts);
        });
    });
    group.finish();
}

criterion_group!(benches, bench_training);
criterion_main!(benches);
