//! Word-list byte pair encoding (BPE) training library and CLI.
//!
//! The crate exposes both a library API and a `wbpe` command line interface
//! for training subword vocabularies from deduplicated word lists.  Training
//! joins the unique words into a single space-separated symbol stream and
//! repeatedly collapses the most frequent adjacent pair, producing a
//! `BpeModel` whose rank-ordered merge list drives a greedy [`Tokenizer`].
//!
//! ```no_run
//! use wbpe::{Tokenizer, Trainer, TrainerConfig};
//!
//! # fn main() -> wbpe::Result<()> {
//! let cfg = TrainerConfig::builder()
//!     .merge_budget(4096)
//!     .show_progress(false)
//!     .build()?;
//! let artifacts = Trainer::new(cfg).train_from_path("/path/to/words.txt")?;
//! artifacts.model.save("vocab.json", true)?;
//!
//! let tokenizer = Tokenizer::from_model(&artifacts.model)?;
//! let ids = tokenizer.encode("some unseen text");
//! assert_eq!(tokenizer.decode(&ids), "some unseen text");
//! # Ok(())
//! # }
//! ```
//!
//! The CLI is enabled by default through the `cli` feature.  Users targeting
//! the library portion only can disable default features to avoid the CLI
//! dependencies: `wbpe = { version = "...", default-features = false }`.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    clippy::all,
    rust_2018_idioms,
    future_incompatible,
    unused_lifetimes,
    unreachable_pub
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::doc_markdown,
    clippy::multiple_crate_versions
)]

pub mod config;
pub mod corpus;
pub mod encoder;
pub mod error;
pub mod metrics;
pub mod model;
pub mod serialization;
pub mod stream;
pub mod trainer;

pub use config::{StopCondition, TrainerBuilder, TrainerConfig};
pub use encoder::{TokenTree, Tokenizer};
pub use error::{Result, WbpeError};
pub use metrics::{IterationMetrics, StopReason, TrainingMetrics};
pub use model::{BpeModel, Pair, SymbolId};
pub use trainer::{Trainer, TrainerArtifacts};
