use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;
use url::Url;

use domo_stream_uploader::cli::{Cli, Command};
use domo_stream_uploader::commands;
use domo_stream_uploader::domo::{self, DomoClient};
use domo_stream_uploader::error::AppError;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let base_url = Url::parse(domo::DEFAULT_API_BASE)
        .map_err(|e| AppError::Internal(format!("Failed to parse API base URL: {}", e)))?;
    let http = Arc::new(reqwest::Client::new());

    debug!("Getting Domo access token");
    let auth =
        domo::fetch_access_token(&http, &base_url, &cli.client_id, &cli.client_secret).await?;

    let client = DomoClient::new(http, base_url, auth.access_token);

    match cli.command {
        Command::Create(args) => commands::create::run(client, args).await,
        Command::Import(args) => commands::import::run(client, args).await,
        Command::Cancel(args) => commands::cancel::run(client, args).await,
    }
}
