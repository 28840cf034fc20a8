//! Depwarden - dependency vulnerability audit CLI
//!
//! Audits Composer and npm dependencies, enriches findings with AI
//! explanations and CVE intelligence, and gates CI builds by severity.

use clap::Parser;
use depwarden::cli;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() {
    let args = cli::Cli::parse();

    // Initialize logging; RUST_LOG overrides the --log-level flag.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.clone()));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli::run(args) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(2);
        }
    }
}
