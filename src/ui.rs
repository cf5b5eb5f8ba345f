//! Interface de terminal do renderflow: barra de progresso e saída colorida.
//!
//! Usa as crates `indicatif` para a barra de progresso e `console` para
//! estilização com cores. O [`BatchProgress`] é alimentado pelos snapshots
//! publicados pelo orquestrador e nunca consulta o backend por conta própria.

use std::collections::HashSet;
use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::api::{RemoteJob, RemoteStatus};
use crate::model::{AggregateSnapshot, OrchestratorEvent};
use crate::session::StopReason;

/// Indicador visual de progresso para um lote de jobs.
///
/// A barra avança a cada job concluído; cada resultado é impresso uma
/// única vez, com o rótulo atribuído na submissão.
pub struct BatchProgress {
    pb: ProgressBar,
    announced: HashSet<String>,
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
}

impl BatchProgress {
    /// Inicia a barra com o título e o tamanho inicial do lote.
    pub fn start(title: &str, total: usize) -> Self {
        let pb = ProgressBar::new(total as u64);
        // Template fixo; se for rejeitado, fica o estilo padrão.
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}") {
            pb.set_style(style.progress_chars("=> "));
        }
        pb.set_message(title.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));

        Self {
            pb,
            announced: HashSet::new(),
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
        }
    }

    /// Reflete um snapshot: posição, fase e resultados recém-concluídos.
    pub fn update(&mut self, snapshot: &AggregateSnapshot) {
        self.pb.set_length(snapshot.jobs.len() as u64);
        self.pb.set_position(snapshot.completed_count() as u64);
        self.pb
            .set_message(format!("{} ({} pending)", snapshot.phase, snapshot.pending));

        for job in &snapshot.jobs {
            let Some(url) = job.output_url() else {
                continue;
            };
            if self.announced.insert(job.id().to_string()) {
                let took = job
                    .turnaround()
                    .map(|d| format!(" ({})", elapsed(d)))
                    .unwrap_or_default();
                self.pb.println(format!(
                    "  {} {}{took}  {}",
                    self.green.apply_to("✓"),
                    job.label(),
                    self.dim.apply_to(url)
                ));
            }
        }
    }

    /// Imprime uma notificação do orquestrador acima da barra.
    pub fn notify(&self, event: &OrchestratorEvent) {
        let line = match event {
            OrchestratorEvent::BatchCompleted { final_count, .. } => format!(
                "  {} {final_count} result(s) ready",
                self.green.apply_to("●")
            ),
            OrchestratorEvent::SubmissionFailed { message } => {
                format!("  {} {message}", self.red.apply_to("✗"))
            }
            OrchestratorEvent::LimitReached(limit) => {
                let usage = match (limit.current, limit.limit) {
                    (Some(current), Some(max)) => format!(" ({current}/{max})"),
                    _ => String::new(),
                };
                let plan = limit
                    .plan_name
                    .as_deref()
                    .map(|p| format!(" on the {p} plan"))
                    .unwrap_or_default();
                format!(
                    "  {} {}{usage}{plan}. Upgrade to continue.",
                    self.yellow.apply_to("!"),
                    limit.message
                )
            }
        };
        self.pb.println(line);
    }

    /// Finaliza a barra e resume como a sessão terminou.
    pub fn finish(&self, snapshot: &AggregateSnapshot) {
        self.pb.finish_and_clear();
        let done = snapshot.completed_count();
        let total = snapshot.jobs.len();
        match &snapshot.stop_reason {
            Some(StopReason::Completed) | None => {
                println!("  {} {done}/{total} completed", self.green.apply_to("✓"));
            }
            Some(StopReason::TimedOut) => println!(
                "  {} Stopped waiting: {done}/{total} completed, the rest may still finish",
                self.yellow.apply_to("⏱")
            ),
            Some(StopReason::Cancelled) => {
                println!("  {} Cancelled: {done}/{total} completed", self.yellow.apply_to("■"));
            }
            Some(StopReason::PollFailed(message)) => println!(
                "  {} Status check failed ({message}): {done}/{total} completed",
                self.red.apply_to("✗")
            ),
        }
        for job in snapshot.jobs.iter().filter(|j| j.is_pending()) {
            println!("    {} {} ({})", self.dim.apply_to("…"), job.label(), job.id());
        }
    }
}

/// Formata a duração de um job: `42s` ou `3m05s`.
fn elapsed(d: chrono::Duration) -> String {
    let secs = d.num_seconds().max(0);
    if secs < 60 {
        format!("{secs}s")
    } else {
        format!("{}m{:02}s", secs / 60, secs % 60)
    }
}

/// Imprime a listagem de jobs de um projeto, uma linha por job.
pub fn print_listing(jobs: &[RemoteJob]) {
    if jobs.is_empty() {
        println!("  No jobs found.");
        return;
    }
    for job in jobs {
        let style = match job.status {
            RemoteStatus::Completed => Style::new().green(),
            RemoteStatus::Failed => Style::new().red(),
            RemoteStatus::Pending | RemoteStatus::Processing => Style::new().yellow(),
            RemoteStatus::Unknown => Style::new().dim(),
        };
        let status = format!("{:?}", job.status).to_lowercase();
        println!(
            "  {:<38} {:<11} {}",
            job.id,
            style.apply_to(status),
            job.resolved_url().unwrap_or("-")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobRecord;
    use crate::model::LimitReached;
    use crate::session::SessionPhase;

    fn snapshot() -> AggregateSnapshot {
        AggregateSnapshot {
            jobs: vec![
                JobRecord::completed("a", "Floor Plan", "https://cdn/a.png"),
                JobRecord::pending("b", "Result 2"),
            ],
            pending: 1,
            phase: SessionPhase::Active,
            stop_reason: None,
        }
    }

    #[test]
    fn update_announces_each_result_once() {
        let mut progress = BatchProgress::start("test", 2);
        progress.update(&snapshot());
        progress.update(&snapshot());
        assert_eq!(progress.announced.len(), 1);
        assert!(progress.announced.contains("a"));
        assert_eq!(progress.pb.position(), 1);
        assert_eq!(progress.pb.length(), Some(2));
        progress.finish(&snapshot());
    }

    #[test]
    fn elapsed_formats_seconds_and_minutes() {
        assert_eq!(elapsed(chrono::Duration::seconds(42)), "42s");
        assert_eq!(elapsed(chrono::Duration::seconds(185)), "3m05s");
        assert_eq!(elapsed(chrono::Duration::seconds(-1)), "0s");
    }

    #[test]
    fn notify_handles_every_event() {
        let progress = BatchProgress::start("test", 0);
        progress.notify(&OrchestratorEvent::BatchCompleted {
            session: 1,
            final_count: 2,
        });
        progress.notify(&OrchestratorEvent::SubmissionFailed {
            message: "boom".into(),
        });
        progress.notify(&OrchestratorEvent::LimitReached(LimitReached {
            limit_type: "video".into(),
            current: Some(5),
            limit: Some(5),
            message: "Video limit reached".into(),
            plan_name: Some("Starter".into()),
        }));
        progress.finish(&AggregateSnapshot::default());
    }
}
