mod config;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

use clip_core::checker::script_dir;
use clip_core::{
    convert_file, AssembleError, AssembleOptions, Assembler, AssemblyEvent, Checker,
    ConvertOptions, Finding, HttpRenderService, Severity, ValidationConfig, ValidationReport,
};

use crate::config::AppConfig;

fn version_string() -> &'static str {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const GIT_HASH: &str = env!("GIT_HASH");

    if GIT_HASH.is_empty() {
        // Leak is fine: called once, lives for the program's lifetime.
        Box::leak(VERSION.to_string().into_boxed_str())
    } else {
        Box::leak(format!("{VERSION} ({GIT_HASH})").into_boxed_str())
    }
}

/// Validate, convert and render Shotstack video scripts.
#[derive(Parser)]
#[command(name = "fast-clip", version = version_string(), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a JSON script without contacting the render service.
    Check {
        /// Script to validate.
        script: PathBuf,

        /// Fail on warnings as well as errors.
        #[arg(long)]
        strict: bool,

        /// Do not check that local media files exist.
        #[arg(long)]
        skip_files: bool,

        /// Only check that the script is valid JSON.
        #[arg(long)]
        skip_validate: bool,

        /// Probe every media reference, even repeated ones.
        #[arg(long)]
        no_cache: bool,

        /// Maximum concurrent file probes.
        #[arg(long)]
        max_workers: Option<usize>,

        /// Distinct media paths needed before probing in parallel.
        #[arg(long)]
        parallel_threshold: Option<usize>,

        /// Media root, overriding the script's resourcesDir.
        #[arg(long)]
        resources_dir: Option<PathBuf>,

        /// Path to TOML config file.
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long)]
        verbose: bool,

        /// Print nothing; only the exit code reports the verdict.
        #[arg(short, long)]
        quiet: bool,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Convert a Markdown script into a JSON render request.
    Convert {
        /// Markdown (.md) script.
        input: PathBuf,

        /// Output file. Defaults to the input path with a .json extension.
        output: Option<PathBuf>,

        /// Emit a template with {{placeholders}} and a merge array.
        #[arg(long)]
        template: bool,

        #[arg(short, long)]
        verbose: bool,
    },
    /// Validate, upload media, render and download a script.
    Assemble {
        /// Script to render.
        script: PathBuf,

        /// Output file or directory.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Render without validating first.
        #[arg(long)]
        skip_validate: bool,

        /// Fail validation on warnings.
        #[arg(long)]
        strict: bool,

        /// Path to TOML config file.
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let ok = match cli.command {
        Commands::Check {
            script,
            strict,
            skip_files,
            skip_validate,
            no_cache,
            max_workers,
            parallel_threshold,
            resources_dir,
            config,
            verbose,
            quiet,
            format,
        } => {
            let app_config = match load_config(config.as_deref(), &script, verbose) {
                Some(c) => c,
                None => return ExitCode::FAILURE,
            };
            let mut validation = app_config.to_validation_config();
            if strict {
                validation = validation.with_strict_mode(true);
            }
            if skip_files {
                validation = validation.with_skip_file_validation(true);
            }
            if skip_validate {
                validation = validation.with_skip_validate(true);
            }
            if no_cache {
                validation = validation.with_cache(false);
            }
            if let Some(n) = max_workers {
                validation = validation.with_max_workers(n);
            }
            if let Some(n) = parallel_threshold {
                validation = validation.with_parallel_threshold(n);
            }
            if let Some(dir) = resources_dir {
                let dir = std::path::absolute(&dir).unwrap_or(dir);
                validation = validation.with_resources_dir(dir);
            }
            if verbose {
                validation = validation.with_verbose(true);
            }
            run_check(&script, &validation, quiet, format).await
        }
        Commands::Convert {
            input,
            output,
            template,
            verbose,
        } => {
            init_tracing("pretty", verbose);
            run_convert(&input, output.as_deref(), template)
        }
        Commands::Assemble {
            script,
            output,
            skip_validate,
            strict,
            config,
            verbose,
        } => {
            let app_config = match load_config(config.as_deref(), &script, verbose) {
                Some(c) => c,
                None => return ExitCode::FAILURE,
            };
            let options = AssembleOptions {
                output,
                skip_validate,
            };
            run_assemble(&script, &app_config, strict, &options).await
        }
    };

    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Resolve the config for `script` and install tracing with its log format.
fn load_config(explicit: Option<&Path>, script: &Path, verbose: bool) -> Option<AppConfig> {
    match AppConfig::resolve(explicit, &script_dir(script)) {
        Ok(c) => {
            init_tracing(&c.logging.format, verbose || c.validation.verbose == Some(true));
            Some(c)
        }
        Err(e) => {
            init_tracing("pretty", verbose);
            eprintln!("{} {}", style("error:").red().bold(), e);
            None
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    script: String,
    errors: usize,
    warnings: usize,
    #[serde(flatten)]
    report: &'a ValidationReport,
}

async fn run_check(
    script: &Path,
    config: &ValidationConfig,
    quiet: bool,
    format: OutputFormat,
) -> bool {
    let report = match Checker::new(config).check_path(script).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            return false;
        }
    };

    match render_report(script, &report, format, quiet, config.verbose) {
        Ok(Some(out)) => println!("{out}"),
        Ok(None) => {}
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            return false;
        }
    }
    report.passed
}

/// Text or JSON rendering of a report; `None` when `quiet`.
fn render_report(
    script: &Path,
    report: &ValidationReport,
    format: OutputFormat,
    quiet: bool,
    verbose: bool,
) -> Result<Option<String>, serde_json::Error> {
    if quiet {
        return Ok(None);
    }
    let out = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&JsonReport {
            script: script.display().to_string(),
            errors: report.count(Severity::Error),
            warnings: report.count(Severity::Warning),
            report,
        })?,
        OutputFormat::Text => {
            let mut lines = format_findings(&report.findings, verbose);
            lines.push(verdict_line(script, report));
            lines.join("\n")
        }
    };
    Ok(Some(out))
}

fn format_findings(findings: &[Finding], verbose: bool) -> Vec<String> {
    let mut lines = Vec::new();
    for f in findings {
        if f.severity == Severity::Info && !verbose {
            continue;
        }
        let label = format!("{:<7}", f.severity.to_string());
        let label = match f.severity {
            Severity::Error => style(label).red().bold(),
            Severity::Warning => style(label).yellow().bold(),
            Severity::Info => style(label).cyan(),
        };
        lines.push(format!(
            "  {} {} {}  {}",
            label,
            style(format!("[{}]", f.category)).dim(),
            f.field,
            f.message
        ));
        if let Some(ref s) = f.suggestion {
            lines.push(format!("          {} {}", style("hint:").dim(), s));
        }
        if f.locations.len() > 1 {
            for loc in &f.locations {
                lines.push(format!("          {} {}", style("at").dim(), loc));
            }
        }
    }
    lines
}

fn verdict_line(script: &Path, report: &ValidationReport) -> String {
    let errors = report.count(Severity::Error);
    let warnings = report.count(Severity::Warning);
    let verdict = if report.passed {
        style("PASS").green().bold()
    } else {
        style("FAIL").red().bold()
    };
    let strict = if report.strict {
        format!(" {}", style("(strict)").dim())
    } else {
        String::new()
    };
    format!(
        "{} {}  {} error(s), {} warning(s){}",
        verdict,
        style(script.display()).bold(),
        errors,
        warnings,
        strict
    )
}

fn run_convert(input: &Path, output: Option<&Path>, template: bool) -> bool {
    match convert_file(input, output, ConvertOptions { template }) {
        Ok((path, conversion)) => {
            for row in &conversion.skipped {
                println!(
                    "  {} line {}: {}",
                    style("skipped").yellow(),
                    row.line,
                    row.reason
                );
            }
            for v in &conversion.dropped {
                println!(
                    "  {} line {}: unknown {} '{}'",
                    style("dropped").yellow(),
                    v.line,
                    v.kind,
                    v.value
                );
            }
            println!(
                "{} {} {} {}  {} clip(s)",
                style("converted").green().bold(),
                input.display(),
                style("->").dim(),
                style(path.display()).bold(),
                conversion.clips
            );
            true
        }
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            false
        }
    }
}

async fn run_assemble(
    script: &Path,
    app_config: &AppConfig,
    strict: bool,
    options: &AssembleOptions,
) -> bool {
    let Some(service_config) = app_config.to_service_config() else {
        eprintln!(
            "{} no API key configured: set SHOTSTACK_API_KEY or [shotstack] api_key",
            style("error:").red().bold()
        );
        return false;
    };
    let mut validation = app_config.to_validation_config();
    if strict {
        validation = validation.with_strict_mode(true);
    }

    let service = match HttpRenderService::new(&service_config) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            return false;
        }
    };

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let assembler = Assembler::new(service, validation, service_config).with_events(tx);

    let spinner = ProgressBar::new_spinner().with_style(
        ProgressStyle::with_template("{spinner:.cyan} {elapsed:>4} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(format!("{}", style(script.display()).bold()));

    let bar = spinner.clone();
    let progress = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                AssemblyEvent::Uploaded { .. }
                | AssemblyEvent::Validated { .. }
                | AssemblyEvent::ValidationSkipped
                | AssemblyEvent::Submitted { .. } => {
                    bar.println(format!("  {} {}", style("✓").green(), event));
                }
                AssemblyEvent::Finished { .. } => {}
                _ => bar.set_message(event.to_string()),
            }
        }
    });

    let result = assembler.assemble(script, options).await;
    drop(assembler);
    let _ = progress.await;
    spinner.finish_and_clear();

    match result {
        Ok(outcome) => {
            println!(
                "{} {}  {} bytes, render {}",
                style("saved").green().bold(),
                style(outcome.output_path.display()).bold(),
                outcome.bytes,
                outcome.render_id
            );
            true
        }
        Err(AssembleError::ValidationFailed { report, .. }) => {
            for line in format_findings(&report.findings, false) {
                println!("{line}");
            }
            println!("{}", verdict_line(script, &report));
            false
        }
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            false
        }
    }
}

fn init_tracing(log_format: &str, verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    match log_format {
        "json" => {
            fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .json()
                .init();
        }
        _ => {
            fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
