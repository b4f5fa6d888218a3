//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{NodeBlueprint, SensorKind, TransportKind};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    device_id: String,
    producer_count: usize,
    handoff: bool,
    transport: String,
    command_channel: bool,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    device_id: blueprint.node.device_id.clone(),
                    producer_count: blueprint.producers.len(),
                    handoff: blueprint.handoff_producer().is_some(),
                    transport: format!("{:?}", blueprint.transport.kind),
                    command_channel: blueprint.command_channel.enabled,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &NodeBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    for kind in SensorKind::ALL {
        if !blueprint.participants().contains(&kind) {
            warnings.push(format!(
                "No '{kind}' producer - its payload fields will always be null"
            ));
        }
    }

    if blueprint.handoff_producer().is_none() {
        warnings.push("No handoff producer - the fan motor is driven by commands only".into());
    }

    if blueprint.dispatch.round_timeout().is_none() {
        warnings.push(
            "dispatch.round_timeout_ms is 0 - a stalled producer blocks dispatch forever".into(),
        );
    }

    if blueprint.transport.kind == TransportKind::Log {
        warnings.push("Transport is 'log' - payloads are only written to the log".into());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Device: {}", summary.device_id);
            println!("  Producers: {}", summary.producer_count);
            println!("  Handoff: {}", summary.handoff);
            println!("  Transport: {}", summary.transport);
            println!("  Command channel: {}", summary.command_channel);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CONFIG: &str = r#"
[node]
device_id = "node-7"

[[producers]]
kind = "particulate"
handoff = true

[[producers]]
kind = "gas"

[transport]
kind = "file"
[transport.params]
path = "/tmp/airnode.jsonl"
"#;

    fn args_for(content: &str) -> (tempfile::NamedTempFile, ValidateArgs) {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        };
        (file, args)
    }

    #[test]
    fn test_valid_config_with_warnings() {
        let (_file, args) = args_for(CONFIG);
        let result = validate_config(&args);
        assert!(result.valid);
        let warnings = result.warnings.unwrap();
        assert!(warnings.iter().any(|w| w.contains("'climate'")));
        assert_eq!(result.summary.unwrap().producer_count, 2);
    }

    #[test]
    fn test_invalid_config_reports_error() {
        let (_file, args) = args_for(&CONFIG.replace("kind = \"gas\"", "kind = \"particulate\""));
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("duplicate producer kind"));
    }

    #[test]
    fn test_missing_file() {
        let args = ValidateArgs {
            config: "/nonexistent/node.toml".into(),
            json: false,
        };
        assert!(!validate_config(&args).valid);
        assert!(run_validate(&args).is_err());
    }
}
