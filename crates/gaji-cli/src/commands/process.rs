//! Process command - extract data from a single payslip file.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use tracing::{debug, info};

use gaji_core::{EligibilityEvaluator, PayslipParser};

use super::output::{format_report, Detail, OutputFormat, PayslipReport};
use super::{load_config, load_rules, read_payslip_text};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file (text or PDF with a text layer)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Institution rules (JSON list); defaults to the config file's
    #[arg(short, long)]
    rules: Option<PathBuf>,

    /// Applicant age, enables maximum-age rules
    #[arg(long)]
    age: Option<u32>,

    /// Show extraction confidence scores
    #[arg(long)]
    show_confidence: bool,

    /// Show the extraction event trail
    #[arg(long)]
    show_events: bool,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = load_config(config_path)?;
    let rules = load_rules(args.rules.as_ref(), &config)?;

    info!("Processing file: {}", args.input.display());

    let text = read_payslip_text(&args.input, &config.extraction)?;

    let parser = PayslipParser::new()?.with_config(&config);
    let result = parser.parse(&text)?;
    let processing_time_ms = result.processing_time_ms;

    let mut evaluator = EligibilityEvaluator::new();
    if let Some(age) = args.age {
        evaluator = evaluator.with_age(age);
    }
    let report = PayslipReport::new(result, &evaluator, &rules);

    let detail = Detail {
        confidence: args.show_confidence,
        events: args.show_events,
    };
    let output = format_report(&report, args.format, detail)?;

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

    // The text format carries these inline
    if args.show_confidence && !matches!(args.format, OutputFormat::Text) {
        eprintln!();
        eprintln!(
            "{} Extraction confidence: {:.1}% (completeness {:.0}%)",
            style("ℹ").blue(),
            report.record.confidence_score,
            report.record.completeness
        );
        eprintln!("{} Processing time: {}ms", style("ℹ").blue(), processing_time_ms);
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}
