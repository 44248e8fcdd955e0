//! Vect CLI
//!
//! Serves the lesson generator API and the built front-end.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use vect_engine::{create_router, AppState, Config, LessonPipeline};
use vect_gemini::{GeminiClient, GeminiConfig};

/// Vect - AI lesson generator
///
/// Turns a topic into a short structured lesson (title, explanation, three key
/// points, and a quiz question) using the Gemini API.
#[derive(Parser, Debug)]
#[command(name = "vect")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: vect.json in current directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Port for the HTTP server (overrides the config file)
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Directory with the built front-end (overrides the config file)
    #[arg(long, value_name = "DIR")]
    static_dir: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Vect starting");
    tracing::debug!(config = ?args.config, "Config file");

    match serve(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Loads configuration, wires the pipeline to Gemini, and serves until Ctrl+C.
async fn serve(args: Args) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;

    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(ref static_dir) = args.static_dir {
        config.static_dir.clone_from(static_dir);
    }

    // Re-validate after overrides
    config.validate()?;

    print_config(&config);

    let api_key = config.gemini.api_key_from_env()?;
    let gemini = GeminiClient::new(&GeminiConfig::from_settings(&config.gemini, api_key))
        .map_err(|e| {
            anyhow::anyhow!("{e}\n\nSuggestion: Check the gemini section of your vect.json")
        })?;
    tracing::info!(endpoint = %gemini.endpoint(), "Gemini client ready");

    let policy = config.generation.policy();
    tracing::info!(
        attempt_timeout_s = policy.attempt_timeout.as_secs(),
        max_retries = policy.max_retries,
        worst_case_ms = u64::try_from(policy.worst_case_latency().as_millis()).unwrap_or(u64::MAX),
        "Generation policy"
    );

    let pipeline = LessonPipeline::new(Arc::new(gemini), policy);
    let static_dir = PathBuf::from(&config.static_dir);
    let router = create_router(AppState::new(pipeline), Some(&static_dir));

    let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    println!();
    println!("Server running on http://{addr}");
    println!("Press Ctrl+C to stop");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("HTTP server error: {e}"))?;

    println!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received Ctrl+C, shutting down");
}

fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

fn print_config(config: &Config) {
    println!("Configuration loaded:");
    println!("  Port: {}", config.port);
    println!("  Static directory: {}", config.static_dir);
    println!("  Model: {}", config.gemini.model);
    println!("  API key variable: {}", config.gemini.api_key_env);
    println!("  Attempt timeout: {}s", config.generation.timeout_seconds);
    println!("  Max retries: {}", config.generation.max_retries);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["vect"]).unwrap();
        assert!(args.config.is_none());
        assert!(args.static_dir.is_none());
        assert!(!args.verbose);
    }

    #[test]
    fn test_args_overrides() {
        let args = Args::try_parse_from([
            "vect",
            "--config",
            "custom.json",
            "--port",
            "8080",
            "--static-dir",
            "public",
            "-v",
        ])
        .unwrap();
        assert_eq!(args.config.as_deref(), Some("custom.json"));
        assert_eq!(args.port, Some(8080));
        assert_eq!(args.static_dir.as_deref(), Some("public"));
        assert!(args.verbose);
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Some("/definitely/not/here/vect.json")).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }
}
