use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use tracelens::engine::View;
use tracelens::prelude::*;
use tracelens::render;

#[derive(Parser)]
#[command(name = "tracelens")]
#[command(about = "Live traces, agent sessions and alerts from an observability backend", long_about = None)]
struct Cli {
    /// Use the live backend instead of the built-in fixtures
    #[arg(long, global = true)]
    live: bool,

    /// JSON config file (defaults to TRACELENS_* environment variables)
    #[arg(long, global = true, env = "TRACELENS_CONFIG")]
    config: Option<PathBuf>,

    /// Backend base URL, overriding the config
    #[arg(long, global = true)]
    api_base: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ViewKind {
    Dashboard,
    Alerts,
    Workflow,
    Tracking,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a view, applying live updates until Ctrl-C or `quit`
    Watch {
        view: ViewKind,
        /// Print the first loaded snapshot and exit
        #[arg(long)]
        once: bool,
    },
    /// Print the span tree of a session
    Tree {
        session: i64,
        /// Expand every span
        #[arg(long)]
        expand_all: bool,
        /// Expand the given span ids
        #[arg(long)]
        expand: Vec<i64>,
    },
    /// Inspect and act on alerts
    Alerts {
        #[command(subcommand)]
        action: AlertCommands,
    },
    /// Manage alert thresholds
    Thresholds {
        #[command(subcommand)]
        action: ThresholdCommands,
    },
    /// Log in as the given email
    Login { email: String, password: String },
    /// Register and log in
    Register { username: String, email: String, password: String },
    /// Forget the current login
    Logout,
    /// Show the current login
    Whoami,
}

#[derive(Subcommand)]
enum AlertCommands {
    List,
    Ack { id: i64 },
    Resolve { id: i64 },
    /// Ask the backend to evaluate all thresholds
    Check,
}

#[derive(Subcommand)]
enum ThresholdCommands {
    List,
    Add {
        metric: String,
        value: f64,
        #[arg(long, default_value = "MEDIUM")]
        severity: Severity,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        disabled: bool,
    },
    Update {
        id: i64,
        #[arg(long)]
        metric: Option<String>,
        #[arg(long)]
        value: Option<f64>,
        #[arg(long)]
        severity: Option<Severity>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        enabled: Option<bool>,
    },
    Remove { id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .compact()
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let session = Arc::new(
        SessionContext::open(config.session_db.as_deref()).context("Failed to open credential store")?,
    );

    match cli.command {
        Commands::Watch { view, once } => watch_view(view, &config, session, once).await,
        Commands::Tree { session: id, expand_all, expand } => print_tree(&config, id, expand_all, &expand).await,
        Commands::Alerts { action } => run_alerts(action, &config, &session).await,
        Commands::Thresholds { action } => run_thresholds(action, &config).await,
        Commands::Login { email, password } => {
            warn_if_ephemeral(&config);
            let user = session.login(&email, &password)?;
            println!("Logged in as {} <{}>", user.username, user.email);
            Ok(())
        }
        Commands::Register { username, email, password } => {
            warn_if_ephemeral(&config);
            let user = session.register(&username, &email, &password)?;
            println!("Registered {} <{}>", user.username, user.email);
            Ok(())
        }
        Commands::Logout => {
            session.logout()?;
            println!("Logged out");
            Ok(())
        }
        Commands::Whoami => {
            match session.current_user() {
                Some(user) => println!("{} <{}>", user.username, user.email),
                None => println!("Not logged in"),
            }
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ClientConfig::from_env()?,
    };
    if let Some(base) = &cli.api_base {
        config.api_base = base.clone();
        config.validate()?;
    }
    if cli.live {
        config.mode = DataMode::Live;
    }
    info!(mode = %config.mode, api_base = %config.api_base, "Configuration loaded");
    Ok(config)
}

fn warn_if_ephemeral(config: &ClientConfig) {
    if config.session_db.is_none() {
        warn!("TRACELENS_SESSION_DB is not set; the login will not outlive this process");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Watch
// ─────────────────────────────────────────────────────────────────────────────

async fn watch_view(kind: ViewKind, config: &ClientConfig, session: Arc<SessionContext>, once: bool) -> Result<()> {
    let sources = tracelens::sources(config);
    let limits = config.limits;

    match kind {
        ViewKind::Dashboard => {
            let view = DashboardView::new(limits, config.timeseries_hours);
            let handle = ViewRuntime::spawn(view, sources, session, config.mode, config.reconnect);
            watch(handle, render::dashboard, |_| None, once).await
        }
        ViewKind::Alerts => {
            let handle = ViewRuntime::spawn(AlertsView::new(limits), sources, session, config.mode, config.reconnect);
            watch(handle, render::alerts, parse_alerts_action, once).await
        }
        ViewKind::Workflow => {
            let view = WorkflowView::new(limits, config.summary_hours);
            let handle = ViewRuntime::spawn(view, sources, session, config.mode, config.reconnect);
            watch(handle, render::workflow, parse_workflow_action, once).await
        }
        ViewKind::Tracking => {
            let view = TrackingView::new(limits, config.timeseries_hours);
            let handle = ViewRuntime::spawn(view, sources, session, config.mode, config.reconnect);
            watch(handle, render::tracking, parse_tracking_action, once).await
        }
    }
}

fn parse_alerts_action(words: &[&str]) -> Option<AlertsAction> {
    match words {
        ["ack", id] => id.parse().ok().map(AlertsAction::Acknowledge),
        ["resolve", id] => id.parse().ok().map(AlertsAction::Resolve),
        ["check"] => Some(AlertsAction::CheckThresholds),
        ["rm-threshold", id] => id.parse().ok().map(AlertsAction::DeleteThreshold),
        _ => None,
    }
}

fn parse_workflow_action(words: &[&str]) -> Option<WorkflowAction> {
    match words {
        ["select", id] => id.parse().ok().map(WorkflowAction::SelectSession),
        ["toggle", id] => id.parse().ok().map(WorkflowAction::ToggleSpan),
        ["expand"] => Some(WorkflowAction::ExpandAll),
        ["collapse"] => Some(WorkflowAction::CollapseAll),
        _ => None,
    }
}

fn parse_tracking_action(words: &[&str]) -> Option<TrackingAction> {
    let filter = |value: &str| (value != "*").then(|| value.to_string());
    match words {
        ["hours", hours] => hours.parse().ok().map(TrackingAction::SetTimeRange),
        ["model", model] => Some(TrackingAction::FilterModel(filter(*model))),
        ["provider", provider] => Some(TrackingAction::FilterProvider(filter(*provider))),
        _ => None,
    }
}

/// Prints every changed update. Reads commands from stdin: `mock`, `live`,
/// `refresh`, `quit`, plus whatever `parse` accepts.
async fn watch<V: View>(
    handle: ViewHandle<V>,
    draw: fn(&V::Snapshot) -> Vec<String>,
    parse: fn(&[&str]) -> Option<V::Action>,
    once: bool,
) -> Result<()> {
    let name = handle.name();

    if once {
        let update = handle
            .wait_for(|u| u.loads > 0 || u.stale)
            .await
            .ok_or_else(|| anyhow!("{name} view stopped before loading"))?;
        print_update(name, &update, draw);
        handle.shutdown().await;
        return Ok(());
    }

    let mut updates = handle.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut last_printed = Vec::new();

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let update = updates.borrow_and_update().clone();
                let mut out = vec![render::status_line(name, &update)];
                out.extend(draw(&update.snapshot));
                if out != last_printed {
                    println!("{}\n", out.join("\n"));
                    last_printed = out;
                }
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    let words: Vec<&str> = line.split_whitespace().collect();
                    match words.as_slice() {
                        [] => {}
                        ["quit" | "q"] => break,
                        ["mock"] => handle.set_mode(DataMode::Mock),
                        ["live"] => handle.set_mode(DataMode::Live),
                        ["refresh" | "r"] => handle.reload(),
                        words => match parse(words) {
                            Some(action) => handle.dispatch(action),
                            None => warn!(input = %line, "Unrecognised command"),
                        },
                    }
                }
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!(error = %e, "Failed to read stdin");
                    stdin_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    let last = handle.shutdown().await;
    info!(view = name, loads = last.loads, "Stopped watching");
    Ok(())
}

fn print_update<S>(name: &str, update: &ViewUpdate<S>, draw: fn(&S) -> Vec<String>) {
    println!("{}", render::status_line(name, update));
    for line in draw(&update.snapshot) {
        println!("{line}");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// One-shot commands
// ─────────────────────────────────────────────────────────────────────────────

async fn print_tree(config: &ClientConfig, session_id: i64, expand_all: bool, expand: &[i64]) -> Result<()> {
    let source = tracelens::sources(config).get(config.mode);
    let spans = source.session_spans_tree(session_id).await?;
    let forest = build_tree(spans);

    let mut expansion = ExpansionState::new();
    if expand_all {
        expansion.expand_all(&forest);
    }
    for id in expand {
        expansion.expand(*id);
    }

    println!("session #{session_id}: {} spans", forest.len());
    for line in render::tree_rows(&forest.visible_rows(&expansion)) {
        println!("{line}");
    }
    Ok(())
}

async fn run_alerts(action: AlertCommands, config: &ClientConfig, session: &SessionContext) -> Result<()> {
    let source = tracelens::sources(config).get(config.mode);

    match action {
        AlertCommands::List => {
            let filter = tracelens::core::AlertFilter::limit(config.limits.alerts);
            for alert in source.alerts(&filter).await? {
                println!("{}", render::alert_line(&alert));
            }
        }
        AlertCommands::Ack { id } => {
            let actor = session.actor();
            let alert = source.acknowledge_alert(id, actor.as_deref()).await?;
            println!("{}", render::alert_line(&alert));
        }
        AlertCommands::Resolve { id } => {
            let alert = source.resolve_alert(id).await?;
            println!("{}", render::alert_line(&alert));
        }
        AlertCommands::Check => {
            let check = source.check_thresholds().await?;
            println!(
                "Checked {} thresholds, {} new alerts",
                check.checked_thresholds, check.new_alerts_created
            );
        }
    }
    Ok(())
}

async fn run_thresholds(action: ThresholdCommands, config: &ClientConfig) -> Result<()> {
    let source = tracelens::sources(config).get(config.mode);

    match action {
        ThresholdCommands::List => {
            for threshold in source.thresholds().await? {
                println!("{}", render::threshold_line(&threshold));
            }
        }
        ThresholdCommands::Add { metric, value, severity, description, disabled } => {
            let mut draft = ThresholdDraft::new(metric, value, severity).with_enabled(!disabled);
            if let Some(description) = description {
                draft = draft.with_description(description);
            }
            let threshold = source.create_threshold(&draft).await?;
            println!("{}", render::threshold_line(&threshold));
        }
        ThresholdCommands::Update { id, metric, value, severity, description, enabled } => {
            let existing = source
                .thresholds()
                .await?
                .into_iter()
                .find(|t| t.id == id)
                .ok_or_else(|| anyhow!("threshold {id} not found"))?;

            let mut draft = existing.to_draft();
            if let Some(metric) = metric {
                draft.metric_name = metric;
            }
            if let Some(value) = value {
                draft.threshold_value = value;
            }
            if let Some(severity) = severity {
                draft.severity = severity;
            }
            if let Some(description) = description {
                draft.description = Some(description);
            }
            if let Some(enabled) = enabled {
                draft.enabled = enabled;
            }

            let threshold = source.update_threshold(id, &draft).await?;
            println!("{}", render::threshold_line(&threshold));
        }
        ThresholdCommands::Remove { id } => {
            source.delete_threshold(id).await?;
            println!("Removed threshold {id}");
        }
    }
    Ok(())
}
