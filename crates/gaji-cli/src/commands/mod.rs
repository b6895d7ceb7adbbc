//! Subcommands and the input handling they share.

pub mod batch;
pub mod config;
pub mod output;
pub mod process;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use gaji_core::models::config::ExtractionConfig;
use gaji_core::{GajiConfig, InstitutionRule};

/// Extensions accepted as payslip input.
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["txt", "text", "pdf"];

/// Load the config file named on the command line, or the defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<GajiConfig> {
    match config_path {
        Some(path) => Ok(GajiConfig::from_file(Path::new(path))?),
        None => Ok(GajiConfig::default()),
    }
}

/// Institution rules from `--rules`, falling back to the config file.
pub fn load_rules(rules_path: Option<&PathBuf>, config: &GajiConfig) -> anyhow::Result<Vec<InstitutionRule>> {
    match rules_path {
        Some(path) => {
            let json = fs::read_to_string(path)?;
            let rules = InstitutionRule::list_from_json(&json)
                .map_err(|e| anyhow::anyhow!("Invalid rules file {}: {}", path.display(), e))?;
            debug!("Loaded {} institution rules from {}", rules.len(), path.display());
            Ok(rules)
        }
        None => Ok(config.institutions.clone()),
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Whether a path looks like a payslip input.
pub fn is_supported(path: &Path) -> bool {
    SUPPORTED_EXTENSIONS.contains(&extension_of(path).as_str())
}

/// Read a payslip file as text, refusing oversized input.
pub fn read_payslip_text(path: &Path, config: &ExtractionConfig) -> anyhow::Result<String> {
    if !path.exists() {
        anyhow::bail!("Input file not found: {}", path.display());
    }

    let size = fs::metadata(path)?.len();
    if size > config.max_input_bytes as u64 {
        anyhow::bail!(
            "Input file {} is {} bytes, larger than the {} byte limit",
            path.display(),
            size,
            config.max_input_bytes
        );
    }

    let extension = extension_of(path);
    let text = match extension.as_str() {
        "pdf" => {
            let data = fs::read(path)?;
            pdf_extract::extract_text_from_mem(&data)
                .map_err(|e| anyhow::anyhow!("Failed to extract PDF text: {}", e))?
        }
        "txt" | "text" => String::from_utf8_lossy(&fs::read(path)?).into_owned(),
        _ => anyhow::bail!("Unsupported file format: {}", extension),
    };

    if text.trim().is_empty() {
        anyhow::bail!("No text could be extracted from {}", path.display());
    }

    debug!("Read {} characters from {}", text.len(), path.display());
    Ok(text)
}
