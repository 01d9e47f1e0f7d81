mod cli;

use canvas_review::checks::Registry;
use canvas_review::config::EngineConfig;
use canvas_review::orchestrator::{self, CompareOptions, ReviewOptions};
use canvas_review::session::SessionStore;
use canvas_review::spec::SpecLoader;
use clap::Parser;
use cli::{Cli, Command};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let project_root = std::env::current_dir().unwrap_or_default();
    let config = match EngineConfig::discover(&project_root) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{{\"ok\":false,\"errorKind\":\"{}\",\"message\":\"{}\"}}", err.kind(), err);
            return ExitCode::FAILURE;
        }
    };

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{{\"ok\":false,\"errorKind\":\"{}\",\"message\":\"{}\"}}", err.kind(), err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: EngineConfig) -> canvas_review::Result<()> {
    let loader = SpecLoader::new(std::env::current_dir().unwrap_or_default());
    let registry = Registry::with_builtins();
    let store = SessionStore::new(&config.artifact_root);

    match cli.command {
        Command::Review { url, spec, scope, annotate, compact, markdown } => {
            let options = ReviewOptions {
                scope_selector: scope,
                annotate,
                compact,
                generate_markdown: markdown,
                viewport: config.viewport,
                ..Default::default()
            };
            let result = orchestrator::review(&url, &spec, &loader, &registry, &store, options).await?;
            print_result(cli.json, &result);
        }
        Command::Compare { url, reference, pixel_threshold, ssim_threshold, diff_style } => {
            let options = CompareOptions {
                pixel_threshold,
                ssim_threshold,
                diff_style: diff_style.into(),
                viewport: config.viewport,
                ..Default::default()
            };
            let result = orchestrator::compare(&url, &reference, &store, options).await?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "ok": true,
                        "sessionId": result.session_id,
                        "pixelDiffPercent": result.comparison.pixel_diff_percent,
                        "ssimScore": result.comparison.ssim_score,
                        "match": result.comparison.r#match,
                    })
                );
            } else {
                println!(
                    "match={} pixelDiff={:.2}% ssim={:.3} session={}",
                    result.comparison.r#match,
                    result.comparison.pixel_diff_percent,
                    result.comparison.ssim_score,
                    result.session_id
                );
            }
        }
        Command::ValidateSpec { path } => {
            let source = std::fs::read_to_string(&path)?;
            let spec = canvas_review::spec::Spec::from_markdown(&source)?;
            let errors = spec.validate();
            if errors.is_empty() {
                println!("{} is valid ({} checks)", spec.name, spec.checks_in_order().count());
            } else {
                for error in &errors {
                    eprintln!("{error}");
                }
                return Err(canvas_review::Error::SpecParseError(errors.join("; ")));
            }
        }
    }

    Ok(())
}

fn print_result(json: bool, result: &orchestrator::ReviewResult) {
    if json {
        println!(
            "{}",
            serde_json::json!({
                "ok": result.ok,
                "sessionId": result.session_id,
                "summary": {
                    "blocking": result.summary.blocking,
                    "major": result.summary.major,
                    "minor": result.summary.minor,
                },
                "issueCount": result.issues.len(),
            })
        );
    } else {
        println!(
            "session {} — blocking={} major={} minor={} ({} issues)",
            result.session_id,
            result.summary.blocking,
            result.summary.major,
            result.summary.minor,
            result.issues.len()
        );
        println!("artifacts: {}", result.session_dir.display());
    }
}
