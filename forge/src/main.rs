//! Workflow Forge - Entry Point
//!
//! Serves the local workflow API, or renders a single deployment request
//! with `--render=<request.json>`.

use std::collections::HashMap;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};

use workflow_forge::app::options::AppOptions;
use workflow_forge::app::run::run;
use workflow_forge::authn::StaticTokenProvider;
use workflow_forge::logs::{init_logging, LogOptions};
use workflow_forge::models::DeploymentRequest;
use workflow_forge::storage::settings::{Settings, DEFAULT_SETTINGS_PATH};
use workflow_forge::template::WorkflowRenderer;
use workflow_forge::utils::version_info;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{}", json),
            Err(_) => println!("{}", version.version),
        }
        return ExitCode::SUCCESS;
    }

    // Retrieve the settings file
    let settings_path = cli_args
        .get("settings")
        .cloned()
        .or_else(|| env::var("FORGE_SETTINGS").ok())
        .unwrap_or_else(|| DEFAULT_SETTINGS_PATH.to_string());
    let mut settings = match Settings::load(&settings_path).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Unable to read settings file: {}", e);
            return ExitCode::FAILURE;
        }
    };
    settings.apply_env_overrides();

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        json_format: settings.json_logs,
        ..Default::default()
    };
    if let Err(e) = init_logging(log_options) {
        eprintln!("Failed to initialize logging: {e}");
    }

    // Render a single request and exit
    if let Some(path) = cli_args.get("render") {
        return match render_once(path, &settings).await {
            Ok(yaml) => {
                print!("{}", yaml);
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("Failed to render {}: {:#}", path, e);
                ExitCode::FAILURE
            }
        };
    }

    // Run the server
    let options = AppOptions::from_settings(&settings);
    let tokens = Arc::new(StaticTokenProvider::from_settings(&settings));

    info!(
        "Running Workflow Forge {} ({}) on {}:{}",
        version.version, version.git_hash, options.server.host, options.server.port
    );
    match run(options, tokens, await_shutdown_signal()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Failed to run Workflow Forge: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn render_once(path: &str, settings: &Settings) -> anyhow::Result<String> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path))?;
    let request: DeploymentRequest =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path))?;

    request.validate()?;
    let renderer = WorkflowRenderer::new(settings.github.reusable_workflows.clone());
    Ok(renderer.render(&request)?)
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                _ => {
                    error!("Unable to install signal handlers, waiting for Ctrl+C only");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Ctrl+C received, shutting down...");
    }
}
