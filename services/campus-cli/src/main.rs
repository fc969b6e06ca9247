//! Campus CLI
//!
//! Command-line front end for the campus API:
//! 1. Loads configuration (base URL, session file, refresh policy)
//! 2. Opens the on-disk session store
//! 3. Runs one command through the authenticated request pipeline
//! 4. Prints the result as JSON on stdout

mod cli;
mod config;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use api_client::{ApiClient, ReqwestTransport, UrlResolver};
use campus::{ChatOptions, SubmissionUpload};
use clap::Parser;
use serde_json::Value;
use session::{CredentialStore, FileStore};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};
use crate::config::Config;

/// Exit code when the stored session can no longer be used.
const EXIT_SESSION_ENDED: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support.
    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    // Usage errors exit 1 so that 2 keeps meaning "session ended".
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if session_ended(&err) => {
            eprintln!("error: {err}");
            eprintln!("session ended, run `campus-cli login <username> <password>`");
            ExitCode::from(EXIT_SESSION_ENDED)
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let location = Config::resolve_path(cli.config.as_deref());
    debug!(path = %location.path.display(), explicit = location.explicit, "loading configuration");
    let config = Config::load(&location)
        .with_context(|| format!("failed to load config from {}", location.path.display()))?;

    info!(
        base_url = %config.api.base_url,
        store = %config.storage.path.display(),
        "configuration loaded"
    );

    let store_path = config.storage.path.clone();
    if let Some(parent) = store_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let store = FileStore::open(store_path.clone())
        .with_context(|| format!("failed to open session store {}", store_path.display()))?;

    let client = ApiClient::with_refresh_policy(
        UrlResolver::new(config.api.base_url.clone()),
        Arc::new(ReqwestTransport::default()),
        CredentialStore::new(Arc::new(store)),
        config.refresh_policy(),
    );

    let output = execute(&client, cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn execute(client: &ApiClient, command: Command) -> Result<Value> {
    let output = match command {
        Command::Login { username, password } => {
            let user = campus::auth::login(client, &username, &password).await?;
            serde_json::to_value(user)?
        }
        Command::Me => campus::auth::me(client).await?,
        Command::Logout => {
            campus::auth::logout(client)?;
            serde_json::json!({ "signedOut": true })
        }
        Command::Assignments { open } => {
            let items = if open {
                campus::assignments::list_open(client).await?
            } else {
                campus::assignments::list_all(client).await?
            };
            serde_json::to_value(items)?
        }
        Command::Scores => serde_json::to_value(campus::scores::list_mine(client).await?)?,
        Command::Courses => serde_json::to_value(campus::courses::list_courses(client).await?)?,
        Command::Submit {
            assignment_id,
            answers,
            files,
        } => {
            let submission = SubmissionUpload {
                assignment_id,
                answers,
                files,
            };
            campus::submissions::upload(client, submission).await?
        }
        Command::Ask { question, images } => {
            let images = campus::assistant::upload_images(client, images.as_slice()).await?;
            let options = ChatOptions {
                images,
                ..ChatOptions::default()
            };
            campus::assistant::send_message(client, &question, options).await?
        }
        Command::DeviceId => Value::String(client.credentials().device_id()?),
    };
    Ok(output)
}

/// Whether `err` means the user has to sign in again.
fn session_ended(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<api_client::Error>())
        .any(api_client::Error::is_auth_expired)
}
