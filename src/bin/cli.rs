//! seq2seq-rs CLI
//!
//! Command-line interface for beam search translation.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seq2seq_rs::weights::weight_shapes;
use seq2seq_rs::{BeamParams, Seq2SeqConfig, Translator};

#[derive(Parser)]
#[command(name = "seq2seq-cli")]
#[command(about = "Subword seq2seq translation with beam search", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate a single sentence
    Translate {
        /// Model directory (config.json, tokenizers, safetensors)
        #[arg(short, long)]
        model: PathBuf,

        /// Source sentence
        #[arg(short, long)]
        text: String,

        /// Hypotheses kept per step
        #[arg(short = 'k', long, default_value = "5")]
        beam_width: usize,

        /// Maximum output tokens (defaults to the model's max_len_target)
        #[arg(short = 'n', long)]
        max_len: Option<usize>,

        /// Length normalization exponent (0 disables)
        #[arg(long, default_value = "0.0")]
        length_alpha: f32,

        /// Use argmax decoding instead of beam search
        #[arg(long)]
        greedy: bool,
    },

    /// Translate a file with one sentence per line
    File {
        /// Model directory (config.json, tokenizers, safetensors)
        #[arg(short, long)]
        model: PathBuf,

        /// Input file, one source sentence per line
        #[arg(short, long)]
        input: PathBuf,

        /// Hypotheses kept per step
        #[arg(short = 'k', long, default_value = "5")]
        beam_width: usize,

        /// Maximum output tokens (defaults to the model's max_len_target)
        #[arg(short = 'n', long)]
        max_len: Option<usize>,

        /// Length normalization exponent (0 disables)
        #[arg(long, default_value = "0.0")]
        length_alpha: f32,
    },

    /// Show model configuration and weight shapes
    Inspect {
        /// Model directory
        #[arg(short, long)]
        model: PathBuf,
    },
}

fn beam_params(translator_max: usize, beam_width: usize, max_len: Option<usize>, length_alpha: f32) -> BeamParams {
    BeamParams {
        beam_width,
        max_output_length: max_len.unwrap_or(translator_max),
        length_alpha,
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Translate {
            model,
            text,
            beam_width,
            max_len,
            length_alpha,
            greedy,
        } => {
            eprintln!("Model loading...");
            let load_start = Instant::now();
            let translator = Translator::from_pretrained(&model)?;
            eprintln!("Model loaded in {:.2}s", load_start.elapsed().as_secs_f64());

            let params = beam_params(translator.config().max_len_target, beam_width, max_len, length_alpha);

            let start = Instant::now();
            let translation = if greedy {
                translator.translate_greedy(&text, params.max_output_length)?
            } else {
                translator.translate(&text, &params)?
            };
            let elapsed = start.elapsed();

            println!("{}", translation.text);

            eprintln!("\n--- Stats ---");
            eprintln!("Decode time: {:.3}s", elapsed.as_secs_f64());
            eprintln!("Tokens: {}", translation.tokens.len());
            eprintln!("Log-prob: {:.4}", translation.log_prob);
            if translation.truncated {
                eprintln!("Truncated: no hypothesis reached END within {} tokens", params.max_output_length);
            }
        }

        Commands::File {
            model,
            input,
            beam_width,
            max_len,
            length_alpha,
        } => {
            let translator = Translator::from_pretrained(&model)?;
            let params = beam_params(translator.config().max_len_target, beam_width, max_len, length_alpha);

            let content = std::fs::read_to_string(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let lines: Vec<&str> = content.lines().collect();
            tracing::info!("Translating {} lines with beam width {}", lines.len(), beam_width);

            let start = Instant::now();
            let results = translator.translate_batch(&lines, &params);
            let mut truncated = 0usize;
            for (i, result) in results.into_iter().enumerate() {
                let translation = result.with_context(|| format!("Line {} failed", i + 1))?;
                if translation.truncated {
                    truncated += 1;
                }
                println!("{}", translation.text);
            }

            let elapsed = start.elapsed().as_secs_f64();
            eprintln!(
                "Translated {} lines in {:.2}s ({:.1} lines/s), {} truncated",
                lines.len(),
                elapsed,
                lines.len() as f64 / elapsed.max(f64::EPSILON),
                truncated
            );
        }

        Commands::Inspect { model } => {
            let config = Seq2SeqConfig::from_file(model.join("config.json"))
                .context("Failed to load config.json")?;
            println!("{}", serde_json::to_string_pretty(&config)?);

            let shapes = weight_shapes(&model)?;
            let total: usize = shapes.values().map(|s| s.iter().product::<usize>()).sum();
            println!("\n{:<48} shape", "tensor");
            println!("{}", "-".repeat(64));
            for (name, shape) in &shapes {
                println!("{:<48} {:?}", name, shape);
            }
            println!("\n{} tensors, {} parameters", shapes.len(), total);
        }
    }

    Ok(())
}
