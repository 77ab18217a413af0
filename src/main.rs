use std::process::ExitCode;

use clap::Parser;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use salon_ledger::cli::{self, Cli};

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so stdout stays parseable JSON.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("salon_ledger=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();

    match cli::run(args).await {
        Ok(output) => {
            println!("{output:#}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("{:#}", json!({ "code": e.code(), "error": e.to_string() }));
            ExitCode::FAILURE
        }
    }
}
