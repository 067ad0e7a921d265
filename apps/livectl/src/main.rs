use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    load_settings_from, AutoConfirm, ClientEvent, CommandOutcome, ConfirmationGate,
    CreateOutcome, DurationChoice, NotificationId, ScheduleController, ScheduleDraft,
};
use shared::domain::ScheduleId;
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tracing::warn;

mod prompt;
mod render;

use prompt::StdinGate;

const SNAPSHOT_WAIT: Duration = Duration::from_secs(10);
const RESOLUTION_WAIT: Duration = Duration::from_secs(60);

#[derive(Parser, Debug)]
#[command(name = "livectl", about = "Schedule and control livestreams")]
struct Cli {
    /// Overrides the configured server URL.
    #[arg(long)]
    server_url: Option<String>,
    /// Settings file; defaults to ./client.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Answer yes to every confirmation.
    #[arg(long)]
    yes: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print snapshots and notifications until Ctrl+C.
    Watch,
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        video: String,
        /// YYYY-MM-DD, local time.
        #[arg(long)]
        date: String,
        /// HH:MM, local time.
        #[arg(long)]
        time: String,
        #[arg(long)]
        rtmp_server: Option<String>,
        #[arg(long)]
        stream_key: String,
        /// Minutes to stream; loops until stopped when omitted.
        #[arg(long)]
        duration: Option<String>,
    },
    Stop {
        id: String,
    },
    Delete {
        id: String,
    },
    EmergencyStop,
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings_from(cli.config.as_deref())?;
    if let Some(server_url) = cli.server_url {
        settings.server_url = server_url;
    }
    let gate: Arc<dyn ConfirmationGate> = if cli.yes {
        Arc::new(AutoConfirm)
    } else {
        Arc::new(StdinGate)
    };

    let controller = ScheduleController::new(&settings, gate)
        .with_context(|| format!("cannot use server url '{}'", settings.server_url))?;
    let mut events = controller.subscribe_events();
    controller.connect().await?;

    let result = match cli.command {
        Command::Watch => watch(events).await,
        Command::Create {
            title,
            video,
            date,
            time,
            rtmp_server,
            stream_key,
            duration,
        } => {
            let mut draft = ScheduleDraft::new(settings.default_rtmp_server.clone());
            draft.title = title;
            draft.video_identifier = video;
            draft.date = date;
            draft.time = time;
            if let Some(rtmp_server) = rtmp_server {
                draft.rtmp_server = rtmp_server;
            }
            draft.stream_key = stream_key;
            draft.duration = duration.map_or(DurationChoice::Indefinite, DurationChoice::Custom);
            create(&controller, &mut events, &draft).await
        }
        Command::Stop { id } => {
            wait_for_snapshot(&controller, &mut events).await?;
            let outcome = controller.issue_stop(&ScheduleId::new(id)).await?;
            finish(outcome, &mut events).await
        }
        Command::Delete { id } => {
            wait_for_snapshot(&controller, &mut events).await?;
            let outcome = controller.issue_delete(&ScheduleId::new(id)).await?;
            finish(outcome, &mut events).await
        }
        Command::EmergencyStop => {
            let outcome = controller.issue_emergency_stop().await?;
            print_pending(&mut events);
            report_declined(outcome);
            Ok(())
        }
        Command::Stats => stats(&controller, &mut events).await,
    };

    controller.disconnect().await;
    result
}

async fn watch(events: broadcast::Receiver<ClientEvent>) -> Result<()> {
    let mut stream = BroadcastStream::new(events);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            next = stream.next() => match next {
                Some(Ok(event)) => render::event(&event),
                Some(Err(err)) => warn!(%err, "event stream lagged"),
                None => return Ok(()),
            },
        }
    }
}

async fn create(
    controller: &ScheduleController,
    events: &mut broadcast::Receiver<ClientEvent>,
    draft: &ScheduleDraft,
) -> Result<()> {
    let outcome = controller.issue_create(draft).await?;
    print_pending(events);
    match outcome {
        CreateOutcome::Scheduled => Ok(()),
        CreateOutcome::Failed { message } => bail!(message),
    }
}

async fn stats(
    controller: &ScheduleController,
    events: &mut broadcast::Receiver<ClientEvent>,
) -> Result<()> {
    controller.request_process_stats().await?;
    let found = wait_until(events, SNAPSHOT_WAIT, |event| {
        matches!(event, ClientEvent::ProcessStats(_))
    })
    .await;
    match found {
        Some(ClientEvent::ProcessStats(stats)) => {
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
        _ => bail!("server sent no process stats within {SNAPSHOT_WAIT:?}"),
    }
}

async fn wait_for_snapshot(
    controller: &ScheduleController,
    events: &mut broadcast::Receiver<ClientEvent>,
) -> Result<()> {
    if controller.has_snapshot().await {
        return Ok(());
    }
    let found = wait_until(events, SNAPSHOT_WAIT, |event| {
        matches!(event, ClientEvent::SchedulesUpdated(_))
    })
    .await;
    if found.is_none() && !controller.has_snapshot().await {
        bail!("no schedule snapshot received within {SNAPSHOT_WAIT:?}");
    }
    Ok(())
}

/// Waits for the loading notification raised by a stop or delete to resolve.
async fn finish(
    outcome: CommandOutcome,
    events: &mut broadcast::Receiver<ClientEvent>,
) -> Result<()> {
    if outcome == CommandOutcome::Declined {
        report_declined(outcome);
        return Ok(());
    }
    let mut loading: Option<NotificationId> = None;
    let resolved = wait_until(events, RESOLUTION_WAIT, |event| {
        let ClientEvent::Notification(note) = event else {
            return false;
        };
        if !note.is_resolved() {
            loading.get_or_insert(note.id);
            return false;
        }
        loading == Some(note.id)
    })
    .await;
    if resolved.is_none() {
        println!("still waiting on the server; run `livectl watch` to follow up");
    }
    Ok(())
}

fn report_declined(outcome: CommandOutcome) {
    if outcome == CommandOutcome::Declined {
        println!("cancelled");
    }
}

fn print_pending(events: &mut broadcast::Receiver<ClientEvent>) {
    while let Ok(event) = events.try_recv() {
        render::event(&event);
    }
}

/// Prints every event until one matches, or the wait runs out.
async fn wait_until(
    events: &mut broadcast::Receiver<ClientEvent>,
    wait: Duration,
    mut matches: impl FnMut(&ClientEvent) -> bool,
) -> Option<ClientEvent> {
    tokio::time::timeout(wait, async {
        loop {
            match events.recv().await {
                Ok(event) => {
                    render::event(&event);
                    if matches(&event) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}
