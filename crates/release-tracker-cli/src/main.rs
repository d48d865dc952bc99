//! Release Tracker CLI
//!
//! The `release-tracker` command records releases and their annotations and
//! answers queries about them.
//!
//! ## Commands
//!
//! - `create`: Record a release happening now
//! - `put`: Create or update a release at a given tick, with annotations
//! - `get`, `by-id`: Show one release with all annotations
//! - `list`, `current`, `releases`: Query releases by scope
//! - `annotation`: Read or delete a single annotation
//! - `tick`: Print the tick for now or for an ISO 8601 date-time
//!
//! Query results are printed as JSON on stdout. A query that matches nothing
//! exits with status 2; a store fault exits with status 1.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, Level};

use release_tracker_core::telemetry::init_tracing;
use release_tracker_core::{
    sanitize, AnnotationKind, Outcome, ReleaseId, ReleaseTracker, ServiceConfig, StoreConfig,
    StoreHandle, Tick, TrackerError,
};

const SUCCESS: u8 = 0;
const FAILURE: u8 = 1;
/// Exit status for a query that matched nothing.
const NOT_FOUND: u8 = 2;

#[derive(Parser)]
#[command(name = "release-tracker")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Record and query application releases", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

/// Store and service settings. Each flag falls back to its environment
/// variable; settings without a flag (credentials) are read from the
/// environment only.
#[derive(Args, Debug, Default)]
struct Settings {
    /// SurrealDB endpoint, e.g. ws://localhost:8000 (default: in-memory)
    #[arg(long, global = true, env = "RELEASE_TRACKER_DB_URL")]
    db_url: Option<String>,

    #[arg(long, global = true, env = "RELEASE_TRACKER_DB_NAMESPACE")]
    db_namespace: Option<String>,

    #[arg(long, global = true, env = "RELEASE_TRACKER_DB_DATABASE")]
    db_database: Option<String>,

    /// Deadline for one annotation fan-out, in seconds
    #[arg(long, global = true, env = "RELEASE_TRACKER_FANOUT_TIMEOUT_SECS")]
    fanout_timeout_secs: Option<String>,

    #[arg(long, global = true, env = "RELEASE_TRACKER_MAX_IDENTIFIER_LEN")]
    max_identifier_len: Option<String>,

    /// refetch or fail
    #[arg(long, global = true, env = "RELEASE_TRACKER_CONFLICT_POLICY")]
    conflict_policy: Option<String>,
}

impl Settings {
    fn lookup(&self, key: &str) -> Option<String> {
        let flag = match key {
            "RELEASE_TRACKER_DB_URL" => &self.db_url,
            "RELEASE_TRACKER_DB_NAMESPACE" => &self.db_namespace,
            "RELEASE_TRACKER_DB_DATABASE" => &self.db_database,
            "RELEASE_TRACKER_FANOUT_TIMEOUT_SECS" => &self.fanout_timeout_secs,
            "RELEASE_TRACKER_MAX_IDENTIFIER_LEN" => &self.max_identifier_len,
            "RELEASE_TRACKER_CONFLICT_POLICY" => &self.conflict_policy,
            _ => return std::env::var(key).ok(),
        };
        flag.clone()
    }

    fn store_config(&self) -> Result<StoreConfig> {
        StoreConfig::from_lookup(|key| self.lookup(key)).context("Invalid store configuration")
    }

    fn service_config(&self) -> Result<ServiceConfig> {
        ServiceConfig::from_lookup(|key| self.lookup(key)).context("Invalid service configuration")
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print a tick
    Tick {
        /// ISO 8601 date-time with offset (default: now)
        at: Option<String>,
    },

    #[command(flatten)]
    Store(StoreCommand),
}

/// Commands that need a store connection.
#[derive(Subcommand)]
enum StoreCommand {
    /// Record a release of a version happening now
    Create {
        application: String,
        environment: String,
        version: String,
    },

    /// Create a release at a tick if it does not exist, then write annotations
    Put {
        application: String,
        environment: String,
        version: String,

        /// Nanoseconds since the Unix epoch
        #[arg(long, value_parser = parse_tick)]
        tick: Tick,

        /// Optional information as JSON (releaseName, description, changes,
        /// responsibility, buildLocation)
        #[arg(long, conflicts_with = "payload_file")]
        payload: Option<String>,

        /// Read the optional information from a file
        #[arg(long)]
        payload_file: Option<PathBuf>,
    },

    /// Show a release with all of its annotations
    Get {
        application: String,
        environment: String,
        version: String,

        #[arg(long, value_parser = parse_tick)]
        tick: Tick,
    },

    /// Show a release by its surrogate id
    ById { id: String },

    /// List every recorded timestamp of a version
    Releases {
        application: String,
        environment: String,
        version: String,
    },

    /// List releases with annotations, optionally scoped
    List {
        #[arg(short, long)]
        application: Option<String>,

        /// Requires --application
        #[arg(short, long, requires = "application")]
        environment: Option<String>,
    },

    /// Show the latest release of an application
    Current {
        application: String,

        #[arg(short, long)]
        environment: Option<String>,
    },

    /// Single annotation operations
    Annotation {
        #[command(subcommand)]
        action: AnnotationAction,
    },
}

#[derive(Subcommand)]
enum AnnotationAction {
    /// Print one annotation as {"label": "value"}
    Get {
        application: String,
        environment: String,
        version: String,

        #[arg(long, value_parser = parse_tick)]
        tick: Tick,

        /// release-name, description, changes, responsibility or build-location
        #[arg(long, value_parser = parse_kind)]
        kind: AnnotationKind,
    },
    /// Remove one annotation
    Delete {
        application: String,
        environment: String,
        version: String,

        #[arg(long, value_parser = parse_tick)]
        tick: Tick,

        #[arg(long, value_parser = parse_kind)]
        kind: AnnotationKind,
    },
}

fn parse_tick(s: &str) -> std::result::Result<Tick, TrackerError> {
    sanitize::tick(s).ok_or_else(|| TrackerError::InvalidTick(s.to_string()))
}

fn parse_kind(s: &str) -> std::result::Result<AnnotationKind, String> {
    AnnotationKind::from_label(s).ok_or_else(|| {
        let labels: Vec<&str> = AnnotationKind::ALL.iter().map(|k| k.label()).collect();
        format!("unknown annotation '{s}' (expected one of {})", labels.join(", "))
    })
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let status = match cli.command {
        Commands::Tick { at } => cmd_tick(at.as_deref())?,
        Commands::Store(command) => run(&cli.settings, command).await?,
    };
    Ok(ExitCode::from(status))
}

/// Connect to the store and execute a command that needs it.
async fn run(settings: &Settings, command: StoreCommand) -> Result<u8> {
    let config = settings.service_config()?;
    let handle = StoreHandle::connect(&settings.store_config()?)
        .await
        .context("Failed to connect to release store")?;
    let max_len = config.max_identifier_len;
    let tracker = ReleaseTracker::from_handle(&handle, config);

    match command {
        StoreCommand::Create {
            application,
            environment,
            version,
        } => {
            let (app, env, ver) = identifiers(&application, &environment, &version, max_len)?;
            Ok(report(tracker.creation.create(app, env, ver).await))
        }
        StoreCommand::Put {
            application,
            environment,
            version,
            tick,
            payload,
            payload_file,
        } => {
            let (app, env, ver) = identifiers(&application, &environment, &version, max_len)?;
            let payload = read_payload(payload, payload_file.as_deref())?;
            cmd_put(&tracker, app, env, ver, &tick, &payload).await
        }
        StoreCommand::Get {
            application,
            environment,
            version,
            tick,
        } => {
            let (app, env, ver) = identifiers(&application, &environment, &version, max_len)?;
            Ok(report(tracker.access.get(app, env, ver, &tick).await))
        }
        StoreCommand::ById { id } => Ok(report(tracker.access.by_id(&ReleaseId(id)).await)),
        StoreCommand::Releases {
            application,
            environment,
            version,
        } => {
            let (app, env, ver) = identifiers(&application, &environment, &version, max_len)?;
            Ok(report(tracker.access.releases(app, env, ver).await))
        }
        StoreCommand::List {
            application,
            environment,
        } => cmd_list(&tracker, application.as_deref(), environment.as_deref(), max_len).await,
        StoreCommand::Current {
            application,
            environment,
        } => {
            let app = identifier("application", &application, max_len)?;
            let outcome = match environment {
                Some(environment) => {
                    let env = identifier("environment", &environment, max_len)?;
                    tracker
                        .access
                        .current_by_application_and_environment(app, env)
                        .await
                }
                None => tracker.access.current_by_application(app).await,
            };
            Ok(report(outcome))
        }
        StoreCommand::Annotation { action } => match action {
            AnnotationAction::Get {
                application,
                environment,
                version,
                tick,
                kind,
            } => {
                let (app, env, ver) = identifiers(&application, &environment, &version, max_len)?;
                Ok(report(
                    tracker.annotations.annotation(app, env, ver, &tick, kind).await,
                ))
            }
            AnnotationAction::Delete {
                application,
                environment,
                version,
                tick,
                kind,
            } => {
                let (app, env, ver) = identifiers(&application, &environment, &version, max_len)?;
                let outcome = tracker
                    .annotations
                    .delete_annotation(app, env, ver, &tick, kind)
                    .await;
                Ok(report(outcome.map(|_| format!("Deleted {kind}"))))
            }
        },
    }
}

// ========== Validation ==========

fn identifier<'a>(field: &str, value: &'a str, max_len: usize) -> Result<&'a str> {
    match sanitize::safe_string_within_length(value, max_len) {
        Some(valid) => Ok(valid),
        None => bail!("invalid {field} '{value}': use letters, digits, space and _|.;,- (at most {max_len} characters)"),
    }
}

fn identifiers<'a>(
    application: &'a str,
    environment: &'a str,
    version: &'a str,
    max_len: usize,
) -> Result<(&'a str, &'a str, &'a str)> {
    Ok((
        identifier("application", application, max_len)?,
        identifier("environment", environment, max_len)?,
        identifier("version", version, max_len)?,
    ))
}

fn read_payload(inline: Option<String>, file: Option<&std::path::Path>) -> Result<String> {
    match (inline, file) {
        (Some(payload), _) => Ok(payload),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read payload from {}", path.display())),
        (None, None) => Ok(String::new()),
    }
}

// ========== Output ==========

/// Print a query result and pick the exit status.
fn report(outcome: Outcome<String>) -> u8 {
    match outcome {
        Outcome::Present(json) => {
            println!("{json}");
            SUCCESS
        }
        Outcome::Empty => {
            eprintln!("No matching release");
            NOT_FOUND
        }
        Outcome::Error => {
            eprintln!("Request failed; see the log for details");
            FAILURE
        }
    }
}

// ========== Commands ==========

async fn cmd_put(
    tracker: &ReleaseTracker,
    application: &str,
    environment: &str,
    version: &str,
    tick: &Tick,
    payload: &str,
) -> Result<u8> {
    let outcome = tracker
        .creation
        .create_or_update(application, environment, version, tick, payload)
        .await;
    Ok(report(outcome.map(|done| {
        if done.created {
            done.json
        } else {
            debug!("release already existed");
            format!("Updated {application} {environment} {version} at {tick}")
        }
    })))
}

async fn cmd_list(
    tracker: &ReleaseTracker,
    application: Option<&str>,
    environment: Option<&str>,
    max_len: usize,
) -> Result<u8> {
    let outcome = match (application, environment) {
        (Some(application), Some(environment)) => {
            let app = identifier("application", application, max_len)?;
            let env = identifier("environment", environment, max_len)?;
            tracker
                .access
                .all_by_application_and_environment(app, env)
                .await
        }
        (Some(application), None) => {
            let app = identifier("application", application, max_len)?;
            tracker.access.all_by_application(app).await
        }
        (None, Some(_)) => bail!("--environment requires --application"),
        (None, None) => tracker.access.all().await,
    };
    Ok(report(outcome))
}

fn cmd_tick(at: Option<&str>) -> Result<u8> {
    let tick = match at {
        Some(at) => match sanitize::offset_date_time(at) {
            Some(instant) => Tick::from(instant),
            None => bail!("'{at}' is not an ISO 8601 date-time with offset"),
        },
        None => Tick::now(),
    };
    println!("{tick}");
    Ok(SUCCESS)
}
