//! Block encoder inspection tool
//!
//! Reads one sample per line, splits the samples into blocks, marshals every
//! block, verifies the round trip and prints the tag and size of each block.
//!
//! # Usage
//!
//! ```text
//! sac_inspect samples.txt --block-size 1024
//! sac_inspect samples.txt --floats --best --codecs
//! sac_inspect samples.txt --config sac.toml
//! ```
//!
//! `RUST_LOG` overrides the configured log level.

use clap::Parser;
use sac_encoding::compression::codecs::all_codecs;
use sac_encoding::compression::parallel::ParallelEncoder;
use sac_encoding::compression::statistics::complex_hamming_distance_with;
use sac_encoding::config::EncodingConfig;
use sac_encoding::EncodedBlock;
use std::path::PathBuf;
use tracing::{debug, error, info};

#[derive(Parser)]
#[command(name = "sac_inspect")]
#[command(version, about = "Classify and verify blocks of 64-bit samples", long_about = None)]
struct Cli {
    /// File with one sample per line
    file: PathBuf,

    /// Values per block
    #[arg(short, long, default_value_t = 1024)]
    block_size: usize,

    /// Parse samples as f64 and encode their bit patterns
    #[arg(long)]
    floats: bool,

    /// Try every applicable tag and keep the smallest body
    #[arg(long)]
    best: bool,

    /// Also compare the standalone codecs on every block
    #[arg(long)]
    codecs: bool,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn parse_samples(contents: &str, floats: bool) -> Result<Vec<i64>, String> {
    contents
        .lines()
        .enumerate()
        .map(|(n, line)| (n, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(n, line)| {
            if floats {
                line.parse::<f64>()
                    .map(|f| f.to_bits() as i64)
                    .map_err(|e| format!("line {}: {}", n + 1, e))
            } else {
                line.parse::<i64>().map_err(|e| format!("line {}: {}", n + 1, e))
            }
        })
        .collect()
}

fn compare_codecs(blocks: &[&[i64]]) {
    println!();
    println!("{:<18} {:>12} {:>10}", "codec", "bytes", "ratio");
    for codec in all_codecs() {
        let mut total = 0usize;
        let mut raw = 0usize;
        let mut failed = 0usize;
        for values in blocks {
            match codec.compress(values) {
                Ok((body, _)) => {
                    total += body.len() + 8;
                    raw += values.len() * 8;
                },
                Err(e) => {
                    debug!(codec = codec.name(), error = %e, "codec skipped block");
                    failed += 1;
                },
            }
        }
        let ratio = if total == 0 { 0.0 } else { raw as f64 / total as f64 };
        if failed > 0 {
            println!("{:<18} {:>12} {:>9.2}x  ({} blocks skipped)", codec.name(), total, ratio, failed);
        } else {
            println!("{:<18} {:>12} {:>9.2}x", codec.name(), total, ratio);
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EncodingConfig::from_file_with_env(&path.to_string_lossy())?,
        None => EncodingConfig::from_env(),
    };
    config.validate()?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.monitoring.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if cli.block_size == 0 {
        return Err("block size must be > 0".into());
    }

    let contents = std::fs::read_to_string(&cli.file)?;
    let samples = parse_samples(&contents, cli.floats)?;
    info!(samples = samples.len(), block_size = cli.block_size, "loaded samples");

    let blocks: Vec<&[i64]> = samples.chunks(cli.block_size).collect();
    let encoder = ParallelEncoder::from_config(&config)?;
    let (results, stats) = if cli.best {
        let start = std::time::Instant::now();
        let results = encoder.marshal_blocks_best(&blocks);
        debug!(elapsed_us = start.elapsed().as_micros() as u64, "exhaustive trial done");
        let mut stats = sac_encoding::compression::parallel::BatchStats {
            block_count: blocks.len(),
            total_items: samples.len(),
            total_original_bytes: samples.len() * 8,
            ..Default::default()
        };
        for result in &results {
            match result {
                Ok(block) => stats.total_encoded_bytes += block.encoded_size(),
                Err(_) => stats.failed_count += 1,
            }
        }
        (results, stats)
    } else {
        encoder.marshal_blocks_with_stats(&blocks)
    };

    println!("{:>6} {:>8} {:<20} {:>10} {:>9}", "block", "items", "type", "bytes", "distance");
    let mut encoded: Vec<EncodedBlock> = Vec::with_capacity(results.len());
    let mut indices: Vec<usize> = Vec::with_capacity(results.len());
    for (i, (values, result)) in blocks.iter().zip(results).enumerate() {
        let (distance, _) = complex_hamming_distance_with(values, config.selector.repeat_ratio_threshold);
        match result {
            Ok(block) => {
                println!(
                    "{:>6} {:>8} {:<20} {:>10} {:>9.3}",
                    i,
                    values.len(),
                    block.marshal_type.name(),
                    block.body.len(),
                    distance
                );
                encoded.push(block);
                indices.push(i);
            },
            Err(e) => {
                error!(block = i, error = %e, "cannot marshal block");
                println!("{:>6} {:>8} {:<20} {:>10} {:>9.3}", i, values.len(), "error", "-", distance);
            },
        }
    }

    // Lossy precision only bounds the error, so only exact configs compare values
    let exact = config.selector.precision_bits == 64;
    let mut mismatches = 0usize;
    let decoded = encoder.unmarshal_blocks(&encoded);
    for ((block, result), &i) in encoded.iter().zip(decoded).zip(&indices) {
        match result {
            Ok(values) if values.len() == block.item_count && (!exact || values.as_slice() == blocks[i]) => {},
            Ok(_) => {
                error!(block = i, marshal_type = %block.marshal_type, "round trip mismatch");
                mismatches += 1;
            },
            Err(e) => {
                error!(block = i, marshal_type = %block.marshal_type, error = %e, "cannot unmarshal block");
                mismatches += 1;
            },
        }
    }

    println!();
    println!(
        "blocks={} items={} encoded_bytes={} ratio={:.2}x bits/value={:.2} failed={} mismatches={}",
        stats.block_count,
        stats.total_items,
        stats.total_encoded_bytes,
        stats.compression_ratio(),
        stats.bits_per_value(),
        stats.failed_count,
        mismatches
    );

    if cli.codecs {
        compare_codecs(&blocks);
    }

    println!();
    print!("{}", encoder.encoder().metrics().to_prometheus());

    if mismatches > 0 || stats.failed_count > 0 {
        return Err(format!("{} blocks failed verification", mismatches + stats.failed_count).into());
    }
    Ok(())
}
