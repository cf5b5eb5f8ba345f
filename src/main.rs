use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use renderflow::api::{HttpBackend, StatusSource};
use renderflow::cli::{Cli, Command};
use renderflow::config::RenderflowConfig;
use renderflow::demo::{SimulatedBackend, demo_request};
use renderflow::gate::SubmissionOutcome;
use renderflow::jobs::{BatchSlot, GenerationRequest};
use renderflow::model::{AggregateSnapshot, OrchestratorEvent};
use renderflow::orchestrator::Orchestrator;
use renderflow::poller::PollPolicy;
use renderflow::session::StopReason;
use renderflow::ui::{BatchProgress, print_listing};

/// How long to wait for the completion notice after the last job resolved.
const NOTICE_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = RenderflowConfig::load(cli.config.as_deref())?;
    let policy = config.poll_policy(cli.interval_ms, cli.window_secs)?;
    tracing::debug!(
        base_url = %config.api_base_url,
        interval_ms = policy.interval.as_millis() as u64,
        window_secs = policy.max_window.as_secs(),
        "Configuration loaded",
    );

    match cli.command {
        Command::Submit {
            project,
            prompt,
            kind,
            quality,
            aspect_ratio,
            duration,
            labels,
            count,
            cost,
            credits,
            no_wait,
        } => {
            let slots = if labels.is_empty() {
                vec![BatchSlot::default(); count.max(1)]
            } else {
                labels.into_iter().map(BatchSlot::labelled).collect()
            };
            let mut request = GenerationRequest::new(project.clone(), prompt, kind.into())
                .with_cost(cost)
                .with_slots(slots);
            request.quality = quality.into();
            request.aspect_ratio = aspect_ratio;
            request.duration_secs = duration;

            let orch = Orchestrator::with_backend(project, policy, http_backend(&config)?);
            let events = orch.events();
            let outcome = orch.submit(&request, credits).await?;
            if let SubmissionOutcome::LimitReached(limit) = &outcome {
                bail!("{} limit reached: {}", limit.limit_type, limit.message);
            }

            if no_wait {
                for record in outcome.records() {
                    println!("{}\t{}", record.id(), record.label());
                }
                orch.cancel();
                return Ok(());
            }
            finish(&orch, events, "Generating").await
        }

        Command::Watch { project, ids } => {
            let orch = Orchestrator::with_backend(project, policy, http_backend(&config)?);
            let events = orch.events();
            let tracked = orch.track(&ids);
            tracing::info!(tracked, "Watching jobs");
            finish(&orch, events, "Waiting").await
        }

        Command::Status { project, json } => {
            let backend = http_backend(&config)?;
            let jobs = backend
                .list_project_jobs(&project)
                .await
                .with_context(|| format!("failed to list jobs for project {project}"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&jobs)?);
            } else {
                print_listing(&jobs);
            }
            Ok(())
        }

        Command::Demo { jobs } => run_demo(jobs, policy).await,
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "renderflow=debug"
    } else {
        "renderflow=warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn http_backend(config: &RenderflowConfig) -> Result<Arc<HttpBackend>> {
    let backend = HttpBackend::with_base_url(
        config.api_key(),
        config.api_base_url.clone(),
        config.request_timeout(),
    )
    .context("failed to build HTTP client")?;
    Ok(Arc::new(backend))
}

async fn run_demo(jobs: usize, policy: PollPolicy) -> Result<()> {
    println!("Running demo: {jobs} simulated job(s), polling every {:?}", policy.interval);
    let backend = Arc::new(SimulatedBackend::new(1_000).with_latency(Duration::from_millis(150)));
    let orch = Orchestrator::with_backend("demo", policy, backend.clone());
    let events = orch.events();

    orch.submit(&demo_request("demo", jobs.max(1)), Some(backend.balance()))
        .await?;
    finish(&orch, events, "Generating").await?;
    println!("  Credits left: {}", backend.balance());
    Ok(())
}

/// Render progress until the session stops, then report how it ended.
async fn finish(
    orch: &Orchestrator,
    mut events: broadcast::Receiver<OrchestratorEvent>,
    title: &str,
) -> Result<()> {
    let mut snapshots = orch.subscribe();
    let mut current = snapshots.borrow_and_update().clone();
    let mut progress = BatchProgress::start(title, current.jobs.len());
    progress.update(&current);

    while current.is_polling() {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                current = snapshots.borrow_and_update().clone();
                progress.update(&current);
            }
            event = events.recv() => match event {
                Ok(event) => progress.notify(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Missed orchestrator events");
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                orch.cancel();
            }
        }
    }

    let mut announced = false;
    while let Ok(event) = events.try_recv() {
        announced |= matches!(event, OrchestratorEvent::BatchCompleted { .. });
        progress.notify(&event);
    }

    if !announced && current.stop_reason == Some(StopReason::Completed) {
        // The notice follows the balance refresh; give it a moment.
        let notice = tokio::time::timeout(NOTICE_GRACE, async {
            loop {
                match events.recv().await {
                    Ok(event @ OrchestratorEvent::BatchCompleted { .. }) => return Some(event),
                    Ok(event) => progress.notify(&event),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => return None,
                }
            }
        })
        .await;
        if let Ok(Some(event)) = notice {
            progress.notify(&event);
        }
    }

    progress.finish(&current);
    exit_status(&current)
}

fn exit_status(snapshot: &AggregateSnapshot) -> Result<()> {
    match &snapshot.stop_reason {
        Some(StopReason::PollFailed(message)) => bail!("status polling failed: {message}"),
        Some(StopReason::TimedOut) => bail!(
            "timed out with {} job(s) still pending",
            snapshot.jobs.iter().filter(|j| j.is_pending()).count()
        ),
        _ => Ok(()),
    }
}
