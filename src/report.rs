//! Saída de terminal do bureau — spinners, escalonamento e relatórios.
//!
//! Usa as crates `indicatif` para o spinner de progresso e `console` para
//! estilização com cores. Os relatórios consomem apenas o histórico, o
//! feedback e os contadores de cada tarefa; nada aqui altera estado.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::engine::Escalation;
use crate::state_machine::{TaskState, TranslationTask};

/// Escalonamento para revisão manual via terminal.
pub struct ConsoleEscalation {
    red: Style,
}

impl ConsoleEscalation {
    pub fn new() -> Self {
        Self {
            red: Style::new().red().bold(),
        }
    }
}

impl Default for ConsoleEscalation {
    fn default() -> Self {
        Self::new()
    }
}

impl Escalation for ConsoleEscalation {
    fn flag_for_manual_review(&self, task: &TranslationTask, reason: &str) {
        eprintln!(
            "  {} Task {} ({}) requires MANUAL REVIEW: {reason}",
            self.red.apply_to("⚠"),
            task.id,
            task.current_state
        );
    }
}

/// Indicador visual de progresso para uma execução do pipeline.
pub struct RunProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl RunProgress {
    /// Inicia o spinner com o total de tarefas da execução.
    pub fn start(total: usize) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("invalid template"),
        );
        pb.set_message(format!("Processing {total} task(s) through the pipeline"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Finaliza o spinner e imprime uma linha por tarefa, colorida pelo
    /// desfecho.
    pub fn finish(&self, tasks: &[TranslationTask]) {
        self.pb.finish_and_clear();
        for task in tasks {
            let line = format!("{} -> {}", task.id, task.current_state);
            match task.current_state {
                TaskState::Completed(_) => {
                    println!("  {} {line}", self.green.apply_to("✓"));
                }
                state if state.is_hard_failure() => {
                    println!("  {} {line}", self.red.apply_to("✗"));
                }
                _ => {
                    println!("  {} {line}", self.yellow.apply_to("•"));
                }
            }
        }
    }
}

/// Imprime o registro completo de uma tarefa em JSON formatado, com o
/// cabeçalho colorido pelo desfecho.
pub fn print_audit(task: &TranslationTask) {
    let style = match task.current_state {
        TaskState::Completed(_) => Style::new().green().bold(),
        state if state.is_hard_failure() => Style::new().red().bold(),
        _ => Style::new().yellow(),
    };
    println!();
    println!(
        "{}",
        style.apply_to(format!("─── Audit Record: {} ───", task.id))
    );
    println!(
        "{}",
        serde_json::to_string_pretty(task).unwrap_or_default()
    );
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{cut}...")
    }
}

/// Relatório detalhado de uma tarefa: estado, contadores, histórico e
/// feedback completos, para pós-mortem.
pub fn task_report(task: &TranslationTask) -> String {
    let mut parts = vec![format!(
        "--- Task Summary Report for Task ID: {} ---",
        task.id
    )];
    parts.push(format!(
        "  Original Text: '{}'",
        truncate(&task.original_text, 100)
    ));
    parts.push(format!(
        "  Source Language: {}, Target Language: {}",
        task.source_language, task.target_language
    ));
    parts.push(format!("  Current Status: {}", task.current_state));
    if let Some(reason) = &task.failure_reason {
        parts.push(format!("  Failure Reason: {reason}"));
    }
    parts.push(format!(
        "  Project: {}, Target Style: {}",
        task.settings.project_code, task.settings.target_style
    ));
    parts.push(format!("  API Call Retry Count: {}", task.retry_count));
    parts.push(format!(
        "  Revision Counts by Stage: {:?}",
        task.revision_counts
    ));

    parts.push("\n  Workflow History:".to_string());
    for event in &task.history {
        let mut line = format!(
            "    - {} | {} | {:?}",
            event.timestamp.format("%H:%M:%S%.3f"),
            event.actor,
            event.action
        );
        if let (Some(previous), Some(new)) = (event.previous_state, event.new_state) {
            line.push_str(&format!(" | {previous} -> {new}"));
        }
        line.push_str(&format!(" | {}", truncate(&event.details, 150)));
        parts.push(line);
    }

    parts.push("\n  QA Feedback Received:".to_string());
    if task.feedback.is_empty() {
        parts.push("    - No QA feedback recorded.".to_string());
    } else {
        for fb in &task.feedback {
            let target = fb
                .target_revision_state
                .map(|s| s.to_string())
                .unwrap_or_else(|| "N/A".to_string());
            parts.push(format!(
                "    - {} | {} ({}): {} [Action: {:?}, Target: {target}]",
                fb.timestamp.format("%H:%M:%S%.3f"),
                fb.actor,
                fb.kind,
                truncate(&fb.comment, 120),
                fb.requested_action
            ));
        }
    }

    parts.push("--- End of Report ---".to_string());
    parts.join("\n")
}

/// Relatório agregado do bureau: contagens por estado final e detalhamento
/// das falhas.
pub fn bureau_report(tasks: &[TranslationTask]) -> String {
    let mut parts = vec!["--- Bureau Summary Report ---".to_string()];
    parts.push(format!("Total Tasks Processed: {}", tasks.len()));

    let mut by_state: Vec<(String, usize)> = Vec::new();
    for task in tasks {
        let name = task.current_state.to_string();
        match by_state.iter_mut().find(|(state, _)| *state == name) {
            Some((_, count)) => *count += 1,
            None => by_state.push((name, 1)),
        }
    }
    parts.push("\n  Tasks by Final Status:".to_string());
    for (state, count) in &by_state {
        parts.push(format!("    - {state}: {count}"));
    }

    let completed = tasks
        .iter()
        .filter(|t| matches!(t.current_state, TaskState::Completed(_)))
        .count();
    let max_retries = tasks
        .iter()
        .filter(|t| t.current_state == TaskState::MaxRetriesExceeded)
        .count();
    let max_revisions = tasks
        .iter()
        .filter(|t| t.current_state == TaskState::MaxRevisionsExceeded)
        .count();
    let other_failures = tasks
        .iter()
        .filter(|t| {
            matches!(
                t.current_state,
                TaskState::FailedFinalReview
                    | TaskState::ConfigurationError
                    | TaskState::UnknownFailure
            )
        })
        .count();

    parts.push(format!("\n  Successfully Completed: {completed}"));
    parts.push(format!("  Failed (Max API Retries): {max_retries}"));
    parts.push(format!("  Failed (Max Revisions): {max_revisions}"));
    parts.push(format!("  Failed (Other reasons): {other_failures}"));
    parts.push("\n--- End of Bureau Summary ---".to_string());
    parts.join("\n")
}
