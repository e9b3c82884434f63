//! dbsync command-line tool.
//!
//! Provides subcommands for downloading (`pull`) and uploading (`push`)
//! versioned database files against a remote history service, inspecting
//! local tracking state, and generating / validating configuration files.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dbsync_core::config::AppConfig;
use dbsync_core::policy::PushRequest;
use dbsync_core::remote::HttpRemote;
use dbsync_core::sync::{PullOutcome, PushOutcome, ResolvedVia, SyncClient};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// dbsync command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "dbsync",
    version,
    about = "Synchronize versioned database files with a remote history service"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download a database from the remote.
    Pull {
        /// Database name.
        database: String,

        /// Remote branch the database will be downloaded from.
        #[arg(long)]
        branch: Option<String>,

        /// Commit ID of the database version to download.
        #[arg(long)]
        commit: Option<String>,
    },

    /// Upload a database to the remote.
    Push {
        /// Database file to upload.
        file: PathBuf,

        /// Remote branch the database will be uploaded to.
        #[arg(long)]
        branch: Option<String>,

        /// ID of the previous commit this upload extends.
        #[arg(long)]
        commit: Option<String>,

        /// Commit message for this upload (required).
        #[arg(short, long)]
        message: String,

        /// Author name, overriding the configured value.
        #[arg(long)]
        author: Option<String>,

        /// Author email, overriding the configured value.
        #[arg(long)]
        email: Option<String>,

        /// Name to store the database under, defaulting to the file name.
        #[arg(long)]
        name: Option<String>,

        /// Licence ID for the database.
        #[arg(long)]
        licence: Option<String>,

        /// Should the database be public?
        #[arg(long)]
        public: bool,

        /// Overwrite remote commit history (non-fast-forward push).
        #[arg(long)]
        force: bool,
    },

    /// Show local tracking state for a database.
    Status {
        /// Database name.
        database: String,
    },

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./dbsync.toml")]
        output: PathBuf,
    },

    /// Validate the configuration file.
    Validate,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    // Minimal logging for CLI
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .without_time()
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = config_path(cli.config.as_deref());

    match cli.command {
        Commands::Init { output } => cmd_init(&output),
        Commands::Validate => cmd_validate(&config_path),
        Commands::Status { database } => {
            let config = load_config(&config_path)?;
            cmd_status(&config, &database)
        }
        Commands::Pull {
            database,
            branch,
            commit,
        } => {
            let config = load_config(&config_path)?;
            cmd_pull(&config, &database, branch.as_deref(), commit.as_deref()).await
        }
        Commands::Push {
            file,
            branch,
            commit,
            message,
            author,
            email,
            name,
            licence,
            public,
            force,
        } => {
            let config = load_config(&config_path)?;
            let mut req = PushRequest::new(&config, file, name, author, email);
            req.branch = branch;
            req.base_commit = commit;
            req.message = message;
            req.licence = licence;
            req.public = public;
            req.force = force;
            cmd_push(&config, &req).await
        }
    }
}

/// Explicit `--config` wins; otherwise the platform config directory,
/// falling back to the current directory.
fn config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    dirs::config_dir()
        .map(|d| d.join("dbsync").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("./dbsync.toml"))
}

fn load_config(path: &Path) -> Result<AppConfig> {
    AppConfig::load_and_resolve(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}

fn client(config: &AppConfig) -> SyncClient<HttpRemote> {
    SyncClient::new(HttpRemote::new(&config.remote), config.cache.dir.clone())
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn cmd_pull(
    config: &AppConfig,
    database: &str,
    branch: Option<&str>,
    commit: Option<&str>,
) -> Result<()> {
    let client = client(config);
    let working = PathBuf::from(database);
    let outcome = client.pull(database, &working, branch, commit).await?;
    print_pull(config, &outcome);
    Ok(())
}

async fn cmd_push(config: &AppConfig, req: &PushRequest) -> Result<()> {
    let client = client(config);
    let outcome = client.push(req).await?;
    print_push(config, &outcome);
    Ok(())
}

fn cmd_status(config: &AppConfig, database: &str) -> Result<()> {
    let client = client(config);
    let rec = client.tracking().load(database);
    let meta = client.metadata().load(database);

    println!("Database: {}", database);
    println!("  State: {}", rec.state);
    println!("  Tracked branch: {}", rec.branch.as_deref().unwrap_or("(none)"));
    println!("  Tracked commit: {}", rec.commit.as_deref().unwrap_or("(none)"));
    if !meta.active_branch.is_empty() {
        println!("  Active branch: {}", meta.active_branch);
    }
    if !meta.branches.is_empty() {
        println!("  Branches:");
        let mut branches: Vec<_> = meta.branches.iter().collect();
        branches.sort();
        for (name, commit_id) in branches {
            println!("    {} -> {}", name, commit_id);
        }
    }
    Ok(())
}

fn cmd_init(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!("refusing to overwrite existing file {}", output.display());
    }
    let sample = r#"# dbsync configuration

[remote]
# Base URL of the remote history service.
url = "https://db4s.dbhub.io"
# Account that owns your databases.
owner = "your-account"
# Environment variable holding your API key.
api_key_env = "DBSYNC_API_KEY"

[author]
name = "Your Name"
email = "you@example.com"

[cache]
# Root directory for per-database cache state.
dir = ".dbsync"
"#;
    std::fs::write(output, sample)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("Wrote sample configuration to {}", output.display());
    Ok(())
}

fn cmd_validate(path: &Path) -> Result<()> {
    let config = load_config(path)?;
    println!(
        "Configuration is valid (remote: {}, owner: {})",
        config.remote.url, config.remote.owner
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_pull(config: &AppConfig, outcome: &PullOutcome) {
    println!(
        "Database '{}' downloaded from {}.  Size: {} bytes",
        outcome.db, config.remote.url, outcome.bytes
    );
    match &outcome.resolved {
        ResolvedVia::Branch(b) => println!("Branch: '{}'", b),
        ResolvedVia::Commit(c) => println!("Commit: {}", c),
        ResolvedVia::Default(Some(c)) => println!("Commit: {}", c),
        ResolvedVia::Default(None) => {}
    }
}

fn print_push(config: &AppConfig, outcome: &PushOutcome) {
    println!("Database uploaded to {}\n", config.remote.url);
    println!("  * Name: {}", outcome.db);
    println!("    Branch: {}", outcome.branch);
    if let Some(ref licence) = outcome.licence {
        println!("    Licence: {}", licence);
    }
    println!("    Size: {} bytes", outcome.bytes);
    println!("    Commit: {}", outcome.commit_id);
    println!("    Commit message: {}", outcome.message);
}
