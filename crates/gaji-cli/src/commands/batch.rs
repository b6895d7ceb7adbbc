//! Batch processing command for multiple payslip files.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use gaji_core::models::config::ExtractionConfig;
use gaji_core::{EligibilityEvaluator, Field, InstitutionRule, PayslipParser};

use super::output::{field_cell, format_report, Detail, OutputFormat, PayslipReport};
use super::{is_supported, load_config, load_rules, read_payslip_text};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: String,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Institution rules (JSON list); defaults to the config file's
    #[arg(short, long)]
    rules: Option<PathBuf>,

    /// Applicant age, enables maximum-age rules
    #[arg(long)]
    age: Option<u32>,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Number of parallel workers
    #[arg(short = 'j', long, default_value = "4")]
    jobs: usize,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,
}

/// Result of processing a single file.
#[derive(Debug)]
struct ProcessResult {
    path: PathBuf,
    report: Option<PayslipReport>,
    error: Option<String>,
    processing_time_ms: u64,
}

/// Everything a worker needs, shared read-only across workers.
struct Worker {
    parser: PayslipParser,
    evaluator: EligibilityEvaluator,
    rules: Vec<InstitutionRule>,
    extraction: ExtractionConfig,
}

impl Worker {
    fn process(&self, path: &Path) -> anyhow::Result<PayslipReport> {
        let text = read_payslip_text(path, &self.extraction)?;
        let result = self.parser.parse(&text)?;
        Ok(PayslipReport::new(result, &self.evaluator, &self.rules))
    }
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = load_config(config_path)?;
    let rules = load_rules(args.rules.as_ref(), &config)?;

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| is_supported(p))
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let overall_pb = ProgressBar::new(files.len() as u64);
    overall_pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    let mut evaluator = EligibilityEvaluator::new();
    if let Some(age) = args.age {
        evaluator = evaluator.with_age(age);
    }
    let worker = Arc::new(Worker {
        parser: PayslipParser::new()?.with_config(&config),
        evaluator,
        rules,
        extraction: config.extraction.clone(),
    });

    let results = match process_all(
        worker,
        files,
        args.jobs,
        args.continue_on_error,
        overall_pb.clone(),
    )
    .await
    {
        Ok(results) => results,
        Err(e) => {
            overall_pb.abandon();
            return Err(e);
        }
    };

    overall_pb.finish_with_message("Complete");

    let successful: Vec<_> = results.iter().filter(|r| r.report.is_some()).collect();
    let failed: Vec<_> = results.iter().filter(|r| r.error.is_some()).collect();

    if let Some(output_dir) = &args.output_dir {
        for result in &successful {
            let Some(report) = &result.report else {
                continue;
            };
            let output_path = output_dir.join(output_file_name(&result.path, args.format));

            let content = format_report(report, args.format, Detail::default())?;
            fs::write(&output_path, content)?;
            debug!("Wrote output to {}", output_path.display());
        }
    }

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &results)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed",
        style(successful.len()).green(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for result in &failed {
            println!(
                "  - {}: {}",
                result.path.display(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

/// Run every file through the worker pool, returning results in input order.
///
/// Without `continue_on_error` no new file is started once one has failed,
/// and the first failure in input order is returned.
async fn process_all(
    worker: Arc<Worker>,
    files: Vec<PathBuf>,
    jobs: usize,
    continue_on_error: bool,
    pb: ProgressBar,
) -> anyhow::Result<Vec<ProcessResult>> {
    let semaphore = Arc::new(Semaphore::new(jobs.max(1)));
    let stop = Arc::new(AtomicBool::new(false));
    let mut handles = Vec::with_capacity(files.len());

    for path in files {
        let permit = semaphore.clone().acquire_owned().await?;
        // A failed worker sets the flag before releasing its permit
        if stop.load(Ordering::SeqCst) {
            debug!("Not starting {} after an earlier failure", path.display());
            break;
        }

        let worker = Arc::clone(&worker);
        let stop = Arc::clone(&stop);
        let pb = pb.clone();

        handles.push(tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let file_start = Instant::now();
            let outcome = worker.process(&path);
            if outcome.is_err() && !continue_on_error {
                stop.store(true, Ordering::SeqCst);
            }
            pb.inc(1);
            (path, outcome, file_start.elapsed().as_millis() as u64)
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        let (path, outcome, processing_time_ms) = handle.await?;

        match outcome {
            Ok(report) => results.push(ProcessResult {
                path,
                report: Some(report),
                error: None,
                processing_time_ms,
            }),
            Err(e) => {
                let error_msg = e.to_string();
                if continue_on_error {
                    warn!("Failed to process {}: {}", path.display(), error_msg);
                    results.push(ProcessResult {
                        path,
                        report: None,
                        error: Some(error_msg),
                        processing_time_ms,
                    });
                } else {
                    error!("Failed to process {}: {}", path.display(), error_msg);
                    anyhow::bail!("Processing failed for {}: {}", path.display(), error_msg);
                }
            }
        }
    }

    Ok(results)
}

/// Per-file output name; the input extension is kept so `a.txt` and `a.pdf`
/// do not overwrite each other.
fn output_file_name(path: &Path, format: OutputFormat) -> String {
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("payslip");
    format!("{}.{}", name, format.extension())
}

fn write_summary(path: &Path, results: &[ProcessResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "nama",
        "no_gaji",
        "bulan",
        "gaji_bersih",
        "peratus_gaji_bersih",
        "confidence",
        "completeness",
        "eligible_institutions",
        "processing_time_ms",
        "error",
    ])?;

    for result in results {
        let filename = result
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_string();

        let row = match &result.report {
            Some(report) => {
                let record = &report.record;
                vec![
                    filename,
                    "success".to_string(),
                    field_cell(record, Field::Nama),
                    field_cell(record, Field::NoGaji),
                    field_cell(record, Field::Bulan),
                    field_cell(record, Field::GajiBersih),
                    field_cell(record, Field::PeratusGajiBersih),
                    format!("{:.1}", record.confidence_score),
                    format!("{:.0}", record.completeness),
                    report.eligible_institutions().join(";"),
                    result.processing_time_ms.to_string(),
                    String::new(),
                ]
            }
            None => {
                let mut row = vec![filename, "error".to_string()];
                row.extend(std::iter::repeat_n(String::new(), 8));
                row.push(result.processing_time_ms.to_string());
                row.push(result.error.clone().unwrap_or_default());
                row
            }
        };
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}
