//! CLI command definitions and handlers

use crate::config::{self, AuditConfig};
use crate::enrich::{AiConfig, AiExplainer, CveIntelProvider, Enricher, LlmBackend};
use crate::models::{ReportThresholds, Severity};
use crate::notify::dispatch_webhook;
use crate::pipeline;
use crate::report::render::{render, OutputFormat};
use crate::sources::{AuditSource, ComposerSource, CustomSource, NpmSource};
use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, warn};

/// Depwarden - dependency vulnerability audit pipeline
#[derive(Parser, Debug)]
#[command(name = "depwarden")]
#[command(
    version,
    about = "Audit Composer and npm dependencies, enrich findings with AI and CVE intelligence, and gate CI builds by severity",
    after_help = "\
Examples:
  depwarden .                                 Audit current directory
  depwarden audit . --format json             JSON output for scripting
  depwarden audit . --report-threshold low    Report everything at low or above
  depwarden audit . --fail-threshold high     Exit code 1 on high+ findings (CI mode)
  depwarden audit . --source npm              Only run npm audit
  depwarden audit . --no-enrich               Skip AI and CVE-intel enrichment
  depwarden init                              Write a starter depwarden.toml

Exit codes: 0 success, 1 severity gate tripped, 2 pipeline error"
)]
pub struct Cli {
    /// Path to repository (default: current directory)
    #[arg(global = true, default_value = ".")]
    pub path: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a depwarden.toml config file with example settings
    Init,

    /// Run the dependency audit (default when no subcommand is given)
    Audit {
        /// Output format: text, json
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
        format: String,

        /// Output file path (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Sources to run (repeatable); defaults to config
        #[arg(long = "source", value_parser = ["composer", "npm", "custom"])]
        sources: Vec<String>,

        /// Minimum severity to report
        #[arg(long, value_parser = ["critical", "high", "medium", "low", "unknown"])]
        report_threshold: Option<String>,

        /// Minimum severity to fail the build ("none" disables the gate)
        #[arg(long, value_parser = ["critical", "high", "medium", "low", "unknown", "none"])]
        fail_threshold: Option<String>,

        /// Skip AI and CVE-intel enrichment
        #[arg(long)]
        no_enrich: bool,

        /// Only audit production dependencies (npm)
        #[arg(long)]
        production: bool,

        /// Webhook URL for the notification body (overrides config)
        #[arg(long, env = "DEPWARDEN_WEBHOOK_URL")]
        webhook_url: Option<String>,
    },
}

/// Dispatch the parsed CLI, returning the process exit code.
pub fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Some(Commands::Init) => run_init(&cli.path),
        Some(Commands::Audit {
            format,
            output,
            sources,
            report_threshold,
            fail_threshold,
            no_enrich,
            production,
            webhook_url,
        }) => run_audit(AuditArgs {
            path: cli.path,
            format,
            output,
            sources,
            report_threshold,
            fail_threshold,
            no_enrich,
            production,
            webhook_url,
        }),
        // Bare `depwarden <path>` audits with defaults.
        None => run_audit(AuditArgs {
            path: cli.path,
            ..AuditArgs::default()
        }),
    }
}

#[derive(Debug, Default)]
struct AuditArgs {
    path: PathBuf,
    format: String,
    output: Option<PathBuf>,
    sources: Vec<String>,
    report_threshold: Option<String>,
    fail_threshold: Option<String>,
    no_enrich: bool,
    production: bool,
    webhook_url: Option<String>,
}

fn run_init(path: &PathBuf) -> Result<i32> {
    let target = path.join(config::CONFIG_FILE);
    if target.exists() {
        println!("{} already exists, leaving it untouched", target.display());
        return Ok(0);
    }
    std::fs::write(&target, config::STARTER_CONFIG)?;
    println!("{} Wrote {}", style("✓").green(), target.display());
    Ok(0)
}

fn run_audit(args: AuditArgs) -> Result<i32> {
    let file_config = config::load_config(&args.path);

    let thresholds = resolve_thresholds(&args, &file_config);
    let source_names = if args.sources.is_empty() {
        file_config.sources.clone()
    } else {
        args.sources.clone()
    };

    let sources = build_sources(&source_names, &args, &file_config);
    let enrichers = if args.no_enrich {
        Vec::new()
    } else {
        build_enrichers(&file_config)
    };

    let outcome = pipeline::run(&sources, &enrichers, &thresholds, file_config.empty_run)?;

    let format = if args.format.is_empty() {
        OutputFormat::Text
    } else {
        OutputFormat::from_str(&args.format)?
    };
    let rendered = render(&outcome, format)?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, &rendered)?;
            println!("Report written to {}", path.display());
        }
        None => print!("{}", rendered),
    }

    let webhook = args
        .webhook_url
        .as_deref()
        .or(file_config.webhook_url.as_deref());
    if let Some(url) = webhook {
        if outcome.report.rows.is_empty() {
            info!("no reportable findings, skipping webhook notification");
        } else if let Err(e) = dispatch_webhook(url, &outcome.report.notification_body) {
            warn!("webhook notification failed: {}", e);
            eprintln!("{} webhook notification failed: {}", style("!").yellow(), e);
        }
    }

    if outcome.should_fail {
        eprintln!(
            "{} severity gate tripped (fail threshold: {})",
            style("✗").red().bold(),
            thresholds
                .fail
                .map(|s| s.to_string())
                .unwrap_or_else(|| "disabled".to_string())
        );
        return Ok(1);
    }
    Ok(0)
}

fn resolve_thresholds(args: &AuditArgs, file_config: &AuditConfig) -> ReportThresholds {
    let report_raw = args
        .report_threshold
        .clone()
        .unwrap_or_else(|| file_config.report_threshold.clone());
    let report = Severity::from_config(&report_raw).unwrap_or_else(|| {
        warn!(
            "unrecognized report threshold '{}', using '{}'",
            report_raw,
            Severity::Medium
        );
        Severity::Medium
    });

    let fail_raw = args
        .fail_threshold
        .clone()
        .or_else(|| file_config.fail_threshold.clone());
    let fail = match fail_raw.as_deref() {
        None | Some("none") | Some("off") => None,
        Some(raw) => {
            let parsed = Severity::from_config(raw);
            if parsed.is_none() {
                warn!("unrecognized fail threshold '{}', severity gating disabled", raw);
            }
            parsed
        }
    };

    ReportThresholds { report, fail }
}

fn build_sources(
    names: &[String],
    args: &AuditArgs,
    file_config: &AuditConfig,
) -> Vec<Box<dyn AuditSource>> {
    let mut sources: Vec<Box<dyn AuditSource>> = Vec::new();
    for name in names {
        match name.as_str() {
            "composer" => sources.push(Box::new(ComposerSource::new(&args.path))),
            "npm" => sources.push(Box::new(
                NpmSource::new(&args.path).with_production_only(args.production),
            )),
            "custom" => {
                let base_url = file_config.custom_api.base_url.clone().unwrap_or_default();
                let api_key = file_config
                    .custom_api
                    .api_key_env
                    .as_deref()
                    .and_then(|env_var| std::env::var(env_var).ok());
                sources.push(Box::new(CustomSource::new(base_url, api_key)));
            }
            other => warn!("unknown source '{}' ignored", other),
        }
    }
    sources
}

fn build_enrichers(file_config: &AuditConfig) -> Vec<Box<dyn Enricher>> {
    let mut enrichers: Vec<Box<dyn Enricher>> = Vec::new();

    if file_config.ai.enabled {
        let ai_config = AiConfig {
            backend: LlmBackend::from_config(&file_config.ai.backend),
            model: file_config.ai.model.clone(),
            ..Default::default()
        };
        match AiExplainer::from_env(ai_config) {
            Ok(explainer) => enrichers.push(Box::new(explainer)),
            Err(e) => info!("AI explanations disabled: {}", e),
        }
    }

    if let Some(base_url) = &file_config.custom_api.base_url {
        let api_key = file_config
            .custom_api
            .api_key_env
            .as_deref()
            .and_then(|env_var| std::env::var(env_var).ok());
        enrichers.push(Box::new(CveIntelProvider::new(base_url.clone(), api_key)));
    }

    enrichers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_with(report: Option<&str>, fail: Option<&str>) -> AuditArgs {
        AuditArgs {
            report_threshold: report.map(String::from),
            fail_threshold: fail.map(String::from),
            ..AuditArgs::default()
        }
    }

    #[test]
    fn test_thresholds_from_flags() {
        let config = AuditConfig::default();
        let t = resolve_thresholds(&args_with(Some("low"), Some("critical")), &config);
        assert_eq!(t.report, Severity::Low);
        assert_eq!(t.fail, Some(Severity::Critical));
    }

    #[test]
    fn test_fail_threshold_defaults_to_disabled() {
        let config = AuditConfig::default();
        let t = resolve_thresholds(&args_with(None, None), &config);
        assert_eq!(t.report, Severity::Medium);
        assert_eq!(t.fail, None);
    }

    #[test]
    fn test_fail_threshold_none_disables_config_value() {
        let mut config = AuditConfig::default();
        config.fail_threshold = Some("high".to_string());
        let t = resolve_thresholds(&args_with(None, Some("none")), &config);
        assert_eq!(t.fail, None);
    }

    #[test]
    fn test_unrecognized_fail_threshold_disables_gate() {
        let mut config = AuditConfig::default();
        config.fail_threshold = Some("sev1".to_string());
        let t = resolve_thresholds(&args_with(None, None), &config);
        assert_eq!(t.fail, None);
    }

    #[test]
    fn test_unrecognized_report_threshold_falls_back() {
        let mut config = AuditConfig::default();
        config.report_threshold = "enormous".to_string();
        let t = resolve_thresholds(&args_with(None, None), &config);
        assert_eq!(t.report, Severity::Medium);
    }

    #[test]
    fn test_build_sources_respects_selection() {
        let config = AuditConfig::default();
        let args = AuditArgs::default();
        let sources = build_sources(
            &["npm".to_string(), "composer".to_string()],
            &args,
            &config,
        );
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].kind(), crate::models::FindingSource::Npm);
        assert_eq!(sources[1].kind(), crate::models::FindingSource::Composer);
    }

    #[test]
    fn test_cli_parses_audit_flags() {
        let cli = Cli::parse_from([
            "depwarden",
            "audit",
            ".",
            "--format",
            "json",
            "--report-threshold",
            "low",
            "--fail-threshold",
            "high",
            "--source",
            "npm",
            "--no-enrich",
        ]);
        match cli.command {
            Some(Commands::Audit {
                format,
                report_threshold,
                fail_threshold,
                sources,
                no_enrich,
                ..
            }) => {
                assert_eq!(format, "json");
                assert_eq!(report_threshold.as_deref(), Some("low"));
                assert_eq!(fail_threshold.as_deref(), Some("high"));
                assert_eq!(sources, vec!["npm"]);
                assert!(no_enrich);
            }
            other => panic!("expected audit command, got {:?}", other),
        }
    }
}
