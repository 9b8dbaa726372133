//! Extract command - pull fields from a single text file.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use tracing::debug;

use seikyu_core::ExtractionResult;

use super::build_extractor;

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Input text file (e.g. pdftotext or OCR output)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Filename used for the cache key and the fallback ladder
    /// (default: the input file name)
    #[arg(long)]
    filename_hint: Option<String>,

    /// Recompute even when a cached result exists
    #[arg(long)]
    force_refresh: bool,

    /// Show runner-up customer candidates
    #[arg(long)]
    show_alternatives: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Plain text summary
    Text,
}

pub fn run(args: ExtractArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let extractor = build_extractor(config_path)?;
    let text = fs::read_to_string(&args.input)?;

    let filename = args.filename_hint.clone().or_else(|| {
        args.input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
    });

    let result = extractor.extract(&text, filename.as_deref(), args.force_refresh);

    let output = format_result(&result, args.format)?;
    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if args.show_alternatives {
        let key = extractor.cache_key_for(&text, filename.as_deref());
        let alternatives = extractor.get_alternatives(&key);
        if alternatives.is_empty() {
            println!("{} No alternative candidates", style("ℹ").blue());
        } else {
            println!("{} Alternatives:", style("ℹ").blue());
            for alt in alternatives {
                println!(
                    "  - {} (score {}, {})",
                    alt.masked.as_deref().unwrap_or(&alt.name),
                    alt.score,
                    alt.source.as_str()
                );
            }
        }
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

fn format_result(result: &ExtractionResult, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Text => {
            let customer = result.customer.as_deref().unwrap_or("(not found)");
            let amount = result
                .amount
                .map(|a| format!("{a}円"))
                .unwrap_or_else(|| "(not found)".to_string());
            Ok(format!(
                "customer: {customer}\namount:   {amount}\nmethod:   {}",
                result.context.method
            ))
        }
    }
}
