//! Steward - permission propagation runner
//!
//! Loads a site snapshot into the in-memory repository, runs one request
//! file against it and prints the structured result as JSON.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod request;

use config::Settings;
use request::Request;
use steward_core::{CapabilityModel, ContentType, RequestContext, Template};
use steward_engine::PermissionEngine;
use steward_store::{InMemoryContentRepository, RepositorySnapshot};

/// Grant, revoke and copy content permissions
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Extra configuration file, layered over config/default and config/local
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a request file against a site snapshot
    Run {
        /// Site snapshot (JSON)
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Request document (JSON)
        #[arg(short, long)]
        request: PathBuf,

        /// Save the resulting site state back to the snapshot file
        #[arg(short, long)]
        write_back: bool,

        /// Actor recorded on the request context
        #[arg(long)]
        actor: Option<String>,
    },

    /// List the capabilities valid on a content type
    Capabilities {
        content_type: ContentType,
    },

    /// Show the capabilities a template grants
    Template {
        template: Template,

        /// Narrow to what this content type accepts
        #[arg(long)]
        content_type: Option<ContentType>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Command::Run {
            snapshot,
            request,
            write_back,
            actor,
        } => run(&settings, &snapshot, &request, write_back, actor).await,
        Command::Capabilities { content_type } => {
            let names: Vec<&str> = CapabilityModel::valid_capabilities(content_type)
                .iter()
                .map(|c| c.as_str())
                .collect();
            print_json(&names)
        }
        Command::Template {
            template,
            content_type,
        } => {
            let capabilities = match content_type {
                Some(content_type) => CapabilityModel::template_capabilities_for(template, content_type),
                None => CapabilityModel::template_capabilities(template),
            };
            print_json(&capabilities)
        }
    }
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,steward=debug"));

    // stdout carries the JSON result
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}

async fn run(
    settings: &Settings,
    snapshot_path: &Path,
    request_path: &Path,
    write_back: bool,
    actor: Option<String>,
) -> Result<()> {
    let json = std::fs::read_to_string(snapshot_path)
        .with_context(|| format!("Failed to read snapshot {}", snapshot_path.display()))?;
    let snapshot = RepositorySnapshot::from_json(&json)?;
    let request = Request::from_file(request_path)?;

    let repo = Arc::new(InMemoryContentRepository::from_snapshot(&snapshot));
    let engine = PermissionEngine::new(repo.clone(), &settings.engine);

    let mut ctx = RequestContext::new(snapshot.site_id);
    if let Some(actor) = actor.or_else(|| settings.run.actor.clone()) {
        ctx = ctx.with_actor(actor);
    }

    info!(
        site = %ctx.site_id,
        session = %ctx.session_id,
        contents = snapshot.contents.len(),
        "Running request from {}",
        request_path.display()
    );

    let deadline = Duration::from_secs(settings.run.timeout_secs);
    let response = match tokio::time::timeout(deadline, request.execute(&engine, &ctx)).await {
        Ok(response) => response,
        Err(_) => bail!(
            "Request did not finish within {}s; items already processed stay applied",
            settings.run.timeout_secs
        ),
    };

    print_json(&response)?;

    if response.has_failures() {
        warn!("Request completed with failures");
    }

    if write_back {
        let updated = repo.snapshot(ctx.site_id).to_json_pretty()?;
        std::fs::write(snapshot_path, updated)
            .with_context(|| format!("Failed to write snapshot {}", snapshot_path.display()))?;
        info!("Snapshot written to {}", snapshot_path.display());
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to encode output")?;
    println!("{json}");
    Ok(())
}
