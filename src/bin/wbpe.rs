use std::fs::{self, File};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, ArgGroup, Args, Parser, Subcommand};
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use serde_json::json;
use wbpe::corpus::load_word_list;
use wbpe::serialization;
use wbpe::{Tokenizer, Trainer, TrainerConfig};

const DEFAULT_OUTPUT: &str = "vocab.json";

#[derive(Parser, Debug)]
#[command(author, version, about = "Word-list BPE toolkit", long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q, -qq)
    #[arg(short = 'q', long, global = true, action = ArgAction::Count)]
    quiet: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train a new vocabulary from a word list
    Train(TrainArgs),
    /// Encode text with a trained vocabulary
    Encode(EncodeArgs),
    /// Decode symbol ids back into text
    Decode(DecodeArgs),
    /// Inspect vocabulary metadata
    Info(InfoArgs),
    /// Show the merge ancestry of a token
    Lineage(LineageArgs),
}

#[derive(Args, Debug)]
#[command(group(
    ArgGroup::new("stop").required(true).args(["merges", "min_frequency"])
))]
struct TrainArgs {
    /// Word-list file, one word per line
    input: PathBuf,

    /// Output path for vocab.json
    #[arg(short, long, value_name = "PATH", default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Stop after this many merges
    #[arg(long, value_name = "COUNT")]
    merges: Option<usize>,

    /// Stop once the best pair frequency falls below this floor
    #[arg(long, value_name = "FREQ")]
    min_frequency: Option<u64>,

    /// Disable per-iteration logging/progress
    #[arg(long)]
    no_progress: bool,

    /// Emit pretty JSON
    #[arg(long)]
    pretty: bool,
}

#[derive(Args, Debug)]
struct EncodeArgs {
    /// Vocabulary JSON to load
    #[arg(short = 'm', long, value_name = "PATH")]
    vocab: PathBuf,

    /// Text to encode when --input is omitted
    #[arg(value_name = "TEXT", required_unless_present = "input")]
    text: Vec<String>,

    /// Read the text to encode from a file
    #[arg(long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Emit a JSON record instead of human-readable output
    #[arg(long)]
    json: bool,

    /// Print subword surfaces alongside the ids
    #[arg(long)]
    pieces: bool,
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// Vocabulary JSON to load
    #[arg(short = 'm', long, value_name = "PATH")]
    vocab: PathBuf,

    /// Symbol ids to decode when --input is omitted
    #[arg(value_name = "ID", required_unless_present = "input")]
    ids: Vec<u32>,

    /// Path to whitespace separated symbol ids
    #[arg(long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Output file for decoded text (defaults to stdout)
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct InfoArgs {
    /// Vocabulary JSON to inspect
    #[arg(short = 'm', long, value_name = "PATH")]
    vocab: PathBuf,

    /// Emit machine-readable JSON summary
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct LineageArgs {
    /// Vocabulary JSON to load
    #[arg(short = 'm', long, value_name = "PATH")]
    vocab: PathBuf,

    /// Token whose ancestry to display
    token: String,

    /// Emit the decomposition tree as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Train(args) => run_train(args),
        Commands::Encode(args) => run_encode(args),
        Commands::Decode(args) => run_decode(args),
        Commands::Info(args) => run_info(args),
        Commands::Lineage(args) => run_lineage(args),
    }
}

fn init_logging(verbose: u8, quiet: u8) {
    use log::LevelFilter;

    let level = if quiet > 0 {
        match quiet {
            0 => LevelFilter::Info,
            1 => LevelFilter::Warn,
            _ => LevelFilter::Error,
        }
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    builder.filter_level(level);
    let _ = builder.try_init();
}

fn run_train(args: TrainArgs) -> Result<()> {
    let mut cfg = TrainerConfig::builder();
    if let Some(merges) = args.merges {
        cfg = cfg.merge_budget(merges);
    }
    if let Some(floor) = args.min_frequency {
        cfg = cfg.min_pair_frequency(floor);
    }
    cfg = cfg.show_progress(!args.no_progress);
    let trainer_cfg = cfg.build()?;

    let words = load_word_list(&args.input)
        .with_context(|| format!("failed to load word list from {}", args.input.display()))?;
    info!("loaded {} unique words", words.len());

    let spinner = if args.no_progress {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner} training merges... {elapsed}")
            .unwrap()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(80));
        Some(pb)
    };

    let trainer = Trainer::new(trainer_cfg);
    let start = Instant::now();
    let artifacts = trainer.train_from_words(&words)?;
    if let Some(pb) = spinner {
        pb.finish_with_message("training complete");
    }

    let elapsed = start.elapsed();
    let merges = artifacts.model.merges().len();
    let vocab_size = artifacts.model.vocab_size();

    artifacts
        .model
        .save(&args.output, args.pretty)
        .with_context(|| format!("failed to save vocabulary to {}", args.output.display()))?;

    info!("training complete: merges={merges} vocab={vocab_size} duration={elapsed:.2?}");
    println!(
        "wrote vocabulary with {} symbols ({} merges) to {}",
        vocab_size,
        merges,
        args.output.display()
    );

    Ok(())
}

fn load_tokenizer(path: &PathBuf) -> Result<Tokenizer> {
    let file = serialization::load_vocabulary(path)
        .with_context(|| format!("failed to load vocabulary from {}", path.display()))?;
    Ok(Tokenizer::from_vocab_file(file)?)
}

fn run_encode(args: EncodeArgs) -> Result<()> {
    let tokenizer = load_tokenizer(&args.vocab)?;

    let text = if let Some(input_path) = &args.input {
        fs::read_to_string(input_path)
            .with_context(|| format!("failed to read {}", input_path.display()))?
    } else {
        args.text.join(" ")
    };

    let ids = tokenizer.encode(&text);
    if args.json {
        let record = json!({
            "text": text,
            "ids": ids,
            "pieces": tokenizer.token_texts(&ids),
        });
        println!("{}", serde_json::to_string(&record)?);
    } else {
        let rendered: Vec<String> = ids.iter().map(ToString::to_string).collect();
        println!("{}", rendered.join(" "));
        if args.pieces {
            println!("{}", tokenizer.token_texts(&ids));
        }
    }

    Ok(())
}

fn run_decode(args: DecodeArgs) -> Result<()> {
    let tokenizer = load_tokenizer(&args.vocab)?;

    let ids = if let Some(input_path) = &args.input {
        let contents = fs::read_to_string(input_path)
            .with_context(|| format!("failed to read {}", input_path.display()))?;
        parse_id_list(&contents)?
    } else {
        args.ids
    };

    let text = tokenizer.decode(&ids);
    if let Some(path) = &args.output {
        let mut file =
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        file.write_all(text.as_bytes())
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("wrote {} bytes to {}", text.len(), path.display());
    } else {
        let mut stdout = io::stdout();
        stdout.write_all(text.as_bytes())?;
        stdout.write_all(b"\n")?;
    }

    Ok(())
}

fn run_info(args: InfoArgs) -> Result<()> {
    let file = serialization::load_vocabulary(&args.vocab)
        .with_context(|| format!("failed to load vocabulary from {}", args.vocab.display()))?;

    // Duplicate merged surfaces collapse in the vocab map, so saturate.
    let base_symbols = file.vocab.len().saturating_sub(file.merges.len());
    let summary = json!({
        "path": args.vocab.display().to_string(),
        "vocab_size": file.vocab.len(),
        "base_symbols": base_symbols,
        "merges": file.merges.len(),
    });

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Vocab size  : {}", file.vocab.len());
        println!("Base symbols: {base_symbols}");
        println!("Merges      : {}", file.merges.len());
    }

    Ok(())
}

fn run_lineage(args: LineageArgs) -> Result<()> {
    let tokenizer = load_tokenizer(&args.vocab)?;

    if args.json {
        let tree = tokenizer.token_tree(&args.token);
        println!("{}", serde_json::to_string_pretty(&tree)?);
        return Ok(());
    }

    let history = tokenizer.lineage(&args.token);
    if history.is_empty() {
        println!("{}: no recorded merges", args.token);
    } else {
        for (left, right) in history {
            println!("{left} + {right} -> {left}{right}");
        }
    }

    Ok(())
}

fn parse_id_list(contents: &str) -> Result<Vec<u32>> {
    contents
        .split_whitespace()
        .map(|field| {
            field
                .parse::<u32>()
                .map_err(|_| anyhow!("invalid symbol id {field:?}"))
        })
        .collect()
}
