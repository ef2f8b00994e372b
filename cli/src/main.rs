//! CLI entrypoint for plenum
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, bail};
use clap::Parser;
use plenum_application::{
    AuditLogger, CastVoteInput, CastVoteUseCase, CloseSessionOutput, CloseSessionUseCase,
    CommandGateway, InMemoryReceiptStore, NoAuditLogger, ReceiptStore, ResolveOutcomeUseCase,
    VotingSyncEngine, VotingView,
};
use plenum_domain::{MeetingId, SessionId, SessionView};
use plenum_infrastructure::{
    ConfigLoader, FileConfig, JsonFileReceiptStore, JsonlAuditLogger, MemoryDocumentStore,
    StoreFixture,
};
use plenum_presentation::{Cli, OutputFormatter, formatter_for};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// How long to wait for the store to reflect a command.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.show_config {
        ConfigLoader::print_config_sources(cli.config.as_ref());
        return Ok(());
    }

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?
    };
    config.validate().context("Invalid configuration")?;

    let log_file = cli.log_file.clone().or_else(|| config.logging.file.clone());
    let _log_guard = init_tracing(cli.verbose, log_file.as_deref())?;

    if !config.output.color {
        colored::control::set_override(false);
    }

    info!("Starting plenum");

    let mut viewer = config.viewer.to_viewer();
    if let Some(uid) = &cli.viewer {
        viewer = plenum_domain::Viewer::new(uid.as_str(), cli.name.clone().unwrap_or(uid.clone()));
    } else if let Some(name) = &cli.name {
        viewer.name = name.clone();
    }

    let meeting_id = match cli.meeting.as_deref().map(MeetingId::from) {
        Some(meeting_id) => meeting_id,
        None => match config.meeting.meeting_id() {
            Some(meeting_id) => meeting_id,
            None => bail!("No meeting selected. Pass --meeting or set meeting.default."),
        },
    };

    // === Dependency Injection ===
    let store = Arc::new(match &cli.fixture {
        Some(path) => MemoryDocumentStore::from_fixture(StoreFixture::load(path)?),
        None => {
            warn!("No --fixture given, starting with an empty store");
            MemoryDocumentStore::new()
        }
    });
    let receipts = receipt_store(&cli, &config)?;
    let audit_logger = audit_logger(&cli, &config);
    let gateway: Arc<dyn CommandGateway> = store.clone();

    let engine = VotingSyncEngine::spawn(store.clone(), receipts.clone(), viewer.clone());
    engine.set_meeting(Some(meeting_id.clone()));
    let mut views = engine.view();
    settle(&mut views, |v| !v.loading).await?;

    let formatter = formatter_for(cli.output);

    // --vote
    let cast_vote = CastVoteUseCase::new(gateway.clone(), receipts.clone())
        .with_audit_logger(audit_logger.clone());
    for vote in &cli.vote {
        let session = session_view(&views, &vote.session_id)?.session;
        let output = cast_vote
            .execute(CastVoteInput::new(
                meeting_id.clone(),
                session,
                vote.option_id.clone(),
                viewer.clone(),
            ))
            .await
            .with_context(|| format!("Could not vote in session {}", vote.session_id))?;
        info!(
            "Vote {} recorded (receipt saved: {})",
            output.vote_id, output.receipt_saved
        );
        if output.receipt_saved {
            engine.refresh_own_vote(vote.session_id.clone());
        }
        settle(&mut views, |v| {
            v.session(&vote.session_id).is_some_and(|s| s.has_voted)
        })
        .await?;
    }

    // --close
    let close_session =
        CloseSessionUseCase::new(gateway.clone()).with_audit_logger(audit_logger.clone());
    for session_id in cli.close.iter().map(|s| SessionId::from(s.as_str())) {
        let session = session_view(&views, &session_id)?.session;
        let output = close_session
            .execute(&meeting_id, &session, &viewer)
            .await
            .with_context(|| format!("Could not close session {}", session_id))?;
        if output == CloseSessionOutput::AlreadyClosed {
            warn!("Session {} was already closed", session_id);
        }
        settle(&mut views, |v| {
            v.session(&session_id)
                .is_some_and(|s| !s.is_open() && s.votes.is_some())
        })
        .await?;
    }

    // --resolve
    let resolve_outcome =
        ResolveOutcomeUseCase::new(gateway.clone()).with_audit_logger(audit_logger.clone());
    let mut reports = Vec::new();
    for session_id in cli.resolve.iter().map(|s| SessionId::from(s.as_str())) {
        settle(&mut views, |v| {
            v.session(&session_id)
                .is_some_and(|s| s.is_open() || s.votes.is_some())
        })
        .await?;
        let view = session_view(&views, &session_id)?;
        let report = resolve_outcome
            .execute(&meeting_id, &view)
            .await
            .with_context(|| format!("Could not resolve session {}", session_id))?;
        reports.push(report);
    }

    print_view(formatter.as_ref(), &views.borrow().clone());
    for report in &reports {
        println!("{}", formatter.format_report(report));
    }

    if cli.watch {
        watch_views(formatter.as_ref(), &mut views).await;
    }

    engine.shutdown().await;
    Ok(())
}

fn init_tracing(verbose: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    // Initialize logging based on verbosity level
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    };

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
            let dir = dir.unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Could not create log directory {}", dir.display()))?;
            let name = path
                .file_name()
                .context("--log-file must name a file")?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(EnvFilter::new(level));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(EnvFilter::new(level)),
        )
        .with(file_layer)
        .init();

    Ok(guard)
}

fn receipt_store(cli: &Cli, config: &FileConfig) -> Result<Arc<dyn ReceiptStore>> {
    if config.receipts.ephemeral && cli.receipts.is_none() {
        return Ok(Arc::new(InMemoryReceiptStore::new()));
    }
    let path = cli
        .receipts
        .clone()
        .or_else(|| config.receipts.resolved_path())
        .context("No receipt store location; set receipts.path or receipts.ephemeral")?;
    let store = JsonFileReceiptStore::open(&path)
        .with_context(|| format!("Could not open receipt store {}", path.display()))?;
    Ok(Arc::new(store))
}

fn audit_logger(cli: &Cli, config: &FileConfig) -> Arc<dyn AuditLogger> {
    let path = cli.audit_log.clone().or_else(|| config.logging.audit_log.clone());
    match path.and_then(JsonlAuditLogger::new) {
        Some(logger) => {
            info!("Audit log: {}", logger.path().display());
            Arc::new(logger)
        }
        None => Arc::new(NoAuditLogger),
    }
}

/// Wait until the published view satisfies `ready`.
async fn settle(
    views: &mut watch::Receiver<VotingView>,
    ready: impl FnMut(&VotingView) -> bool,
) -> Result<()> {
    match tokio::time::timeout(SETTLE_TIMEOUT, views.wait_for(ready)).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(_)) => bail!("Voting sync engine stopped unexpectedly"),
        Err(_) => bail!("Timed out waiting for the store"),
    }
}

fn session_view(views: &watch::Receiver<VotingView>, session_id: &SessionId) -> Result<SessionView> {
    let view = views.borrow();
    match view.session(session_id) {
        Some(session) => Ok(session.clone()),
        None => bail!("Unknown voting session {}", session_id),
    }
}

fn print_view(formatter: &dyn OutputFormatter, view: &VotingView) {
    println!("{}", formatter.format_view(view));
}

async fn watch_views(formatter: &dyn OutputFormatter, views: &mut watch::Receiver<VotingView>) {
    info!("Watching for changes, press Ctrl-C to stop");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                print_view(formatter, &view);
            }
        }
    }
}
