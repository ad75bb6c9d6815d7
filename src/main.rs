//! expvard - Main entry point.
//!
//! Runs the expvar debug extension until interrupted.
//!
//! Usage: expvard [OPTIONS]
//!
//! Options:
//!   --config, -c <FILE>  Settings file (default: <config dir>/expvard/config.toml)
//!   --version, -v        Show version
//!   --help, -h           Show this help

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use expvard::{
    ComponentId, Context, Extension, Factory, Settings, TelemetrySettings, VERSION, expvar,
    logging,
};

/// Upper bound on binding the endpoint.
const START_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on draining in-flight requests at exit.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

const USAGE: &str = "Usage: expvard [--config <FILE>] [--version] [--help]";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command-line arguments
    let args: Vec<String> = env::args().collect();

    // Handle --version flag
    if args.iter().any(|a| a == "--version" || a == "-v") {
        println!("expvard v{}", VERSION);
        return Ok(());
    }

    // Handle --help flag
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{}", USAGE);
        return Ok(());
    }

    let config_path = match args.iter().position(|a| a == "--config" || a == "-c") {
        Some(idx) => match args.get(idx + 1) {
            Some(path) => Some(PathBuf::from(path)),
            None => {
                eprintln!("--config requires a path\n{}", USAGE);
                std::process::exit(2);
            }
        },
        None => None,
    };

    let settings = match &config_path {
        Some(path) => Settings::load(path)?,
        None => Settings::load_default()?,
    };
    settings.validate()?;

    // Keep the guard alive so buffered file logs are flushed at exit
    let log_guard = logging::init(&settings.log)?;

    let registry = settings.build_registry()?;
    expvar::vars().new_str("version")?.set(VERSION);

    let id = ComponentId::new(Factory::TYPE)?;
    let mut extension = Factory.create(TelemetrySettings::new(&id), settings.expvar.clone());

    if let Err(e) = extension
        .start(&Context::with_timeout(START_TIMEOUT), &registry)
        .await
    {
        tracing::error!("Failed to start {}: {}", id, e);
        eprintln!("expvard: failed to start {}: {}", id, e);
        // process::exit skips destructors; flush the file writer first
        drop(log_guard);
        std::process::exit(1);
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Interrupt received, shutting down");

    extension
        .shutdown(&Context::with_timeout(SHUTDOWN_TIMEOUT))
        .await?;

    Ok(())
}
