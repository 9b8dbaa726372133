//! Batch command - extract fields from many text files.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use super::build_extractor;

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files or glob pattern (e.g. "invoices/*.txt")
    #[arg(required = true)]
    input: String,

    /// Write a summary CSV to this path
    #[arg(short, long)]
    summary: Option<PathBuf>,

    /// Continue on unreadable files
    #[arg(long)]
    continue_on_error: bool,
}

/// Result of one file.
struct BatchRow {
    path: PathBuf,
    customer: Option<String>,
    amount: Option<i64>,
    error: Option<String>,
}

pub fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let extractor = build_extractor(config_path)?;

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
            matches!(ext.to_lowercase().as_str(), "txt" | "text")
        })
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching text files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("##-"),
    );

    let mut rows = Vec::with_capacity(files.len());
    for path in &files {
        pb.set_message(path.display().to_string());

        match fs::read_to_string(path) {
            Ok(text) => {
                let filename = path.file_name().map(|n| n.to_string_lossy().into_owned());
                let result = extractor.extract(&text, filename.as_deref(), false);
                debug!(file = %path.display(), "processed");
                rows.push(BatchRow {
                    path: path.clone(),
                    customer: result.customer,
                    amount: result.amount,
                    error: None,
                });
            }
            Err(e) => {
                warn!(file = %path.display(), "failed to read: {e}");
                if !args.continue_on_error {
                    pb.abandon();
                    anyhow::bail!("Failed to read {}: {e}", path.display());
                }
                rows.push(BatchRow {
                    path: path.clone(),
                    customer: None,
                    amount: None,
                    error: Some(e.to_string()),
                });
            }
        }

        pb.inc(1);
    }
    pb.finish_with_message("Done");

    print_summary(&rows);

    if let Some(summary_path) = &args.summary {
        write_summary_csv(summary_path, &rows)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    debug!("Total batch time: {:?}", start.elapsed());

    Ok(())
}

fn print_summary(rows: &[BatchRow]) {
    let extracted = rows
        .iter()
        .filter(|r| r.customer.is_some() || r.amount.is_some())
        .count();

    println!();
    for row in rows {
        let status = if row.error.is_some() {
            style("✗").red()
        } else if row.customer.is_some() && row.amount.is_some() {
            style("✓").green()
        } else {
            style("△").yellow()
        };
        println!(
            "{} {} | {} | {}",
            status,
            row.path.display(),
            row.customer.as_deref().unwrap_or("-"),
            row.amount.map(|a| a.to_string()).unwrap_or_else(|| "-".to_string())
        );
    }
    println!();
    println!(
        "{} Extracted fields from {}/{} files",
        style("ℹ").blue(),
        extracted,
        rows.len()
    );
}

fn write_summary_csv(path: &PathBuf, rows: &[BatchRow]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["file", "customer", "amount", "error"])?;
    for row in rows {
        writer.write_record([
            row.path.display().to_string(),
            row.customer.clone().unwrap_or_default(),
            row.amount.map(|a| a.to_string()).unwrap_or_default(),
            row.error.clone().unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
