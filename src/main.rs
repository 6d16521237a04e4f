//! drive_fetch CLI - Download the newest matching file from a Google Drive folder.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use drive_fetch::client::DEFAULT_CHUNK_SIZE;
use drive_fetch::config::{
    auth_timeout_from_secs, DEFAULT_AUTH_TIMEOUT_SECS, DEFAULT_CLIENT_SECRET_FILE,
    DEFAULT_FILE_NAME, DEFAULT_FOLDER_ID, DEFAULT_TOKEN_CACHE_FILE,
};
use drive_fetch::models::format_size;
use drive_fetch::{
    extract_folder_id, telemetry, Config, CredentialManager, DriveClient, Fetcher,
    LoopbackAuthorizer, TokenCache,
};

/// Download the most recently created file with a given name from a Google Drive folder.
#[derive(Parser)]
#[command(name = "drive_fetch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Local destination path for the downloaded file.
    output: PathBuf,

    /// Folder URL or ID to search.
    #[arg(long, env = "GOOGLE_DRIVE_FOLDER_ID", default_value = DEFAULT_FOLDER_ID)]
    folder: String,

    /// Exact file name to look for.
    #[arg(long, env = "GOOGLE_DRIVE_FILE_NAME", default_value = DEFAULT_FILE_NAME)]
    name: String,

    /// OAuth client secret JSON downloaded from the Google Cloud console.
    #[arg(long, default_value = DEFAULT_CLIENT_SECRET_FILE)]
    client_secret: PathBuf,

    /// Where the acquired credential is cached between runs.
    #[arg(long, default_value = DEFAULT_TOKEN_CACHE_FILE)]
    token_cache: PathBuf,

    /// Seconds to wait for browser authorization (0 waits forever).
    #[arg(long, default_value_t = DEFAULT_AUTH_TIMEOUT_SECS)]
    auth_timeout: u64,

    /// Bytes requested per download chunk.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE, value_parser = clap::value_parser!(u64).range(1..))]
    chunk_size: u64,

    /// Enable debug logging (includes a listing of the folder).
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return parse_error_exit_code(&e);
        }
    };

    telemetry::init_subscriber(if cli.verbose {
        "warn,drive_fetch=debug"
    } else {
        "warn"
    });

    let result = try_main(cli).await;
    if let Err(ref e) = result {
        eprintln!("Error: {:#}", e);
    }
    exit_code(&result)
}

/// Usage errors exit 1; `--help` and `--version` exit 0.
fn parse_error_exit_code(e: &clap::Error) -> ExitCode {
    if e.use_stderr() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn exit_code(result: &Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}

async fn try_main(cli: Cli) -> Result<()> {
    let config = build_config(cli)?;
    run(&config).await
}

fn build_config(cli: Cli) -> Result<Config> {
    let folder_id = extract_folder_id(&cli.folder)
        .with_context(|| format!("Invalid folder URL or ID: {}", cli.folder))?;

    let mut config = Config::new(cli.output);
    config.folder_id = folder_id;
    config.file_name = cli.name;
    config.client_secret_path = cli.client_secret;
    config.token_cache_path = cli.token_cache;
    config.auth_timeout = auth_timeout_from_secs(cli.auth_timeout);
    config.chunk_size = cli.chunk_size;
    Ok(config)
}

async fn run(config: &Config) -> Result<()> {
    let manager = CredentialManager::new(
        TokenCache::new(&config.token_cache_path),
        &config.client_secret_path,
        LoopbackAuthorizer::new(config.auth_timeout),
    );
    let credential = manager
        .acquire()
        .await
        .context("Failed to obtain Google Drive credentials")?;

    let client = DriveClient::new(&credential).with_chunk_size(config.chunk_size);
    let mut fetcher = Fetcher::new(&client);

    println!(
        "Searching folder {} for '{}'...",
        config.folder_id, config.file_name
    );

    let outcome = fetcher
        .fetch_latest(
            &config.folder_id,
            &config.file_name,
            &config.output_path,
            |progress| println!("Downloading: {}%", progress.percent()),
        )
        .await
        .with_context(|| format!("Failed to fetch '{}'", config.file_name))?;

    println!(
        "Download complete: {} ({}, ID: {})",
        outcome.path.display(),
        format_size(outcome.bytes),
        outcome.file.id
    );

    Ok(())
}
