//! Porta de observabilidade do fluxo de trabalho.
//!
//! Em vez de um logger global, o motor e cada estágio recebem um
//! [`WorkflowObserver`] injetado. A implementação de console usa a crate
//! `console` para estilização; a nula serve para testes.

use chrono::Utc;
use console::Style;

/// Nível de um evento de observabilidade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

/// Porta injetada no motor e nos processadores de estágio.
pub trait WorkflowObserver: Send + Sync {
    fn event(&self, task_id: Option<&str>, level: Level, message: &str);
}

/// Observador de terminal com saída colorida.
///
/// Eventos `Info` só aparecem em modo verboso; avisos e erros sempre.
pub struct ConsoleObserver {
    verbose: bool,
    yellow: Style,
    red: Style,
    dim: Style,
}

impl ConsoleObserver {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            yellow: Style::new().yellow(),
            red: Style::new().red().bold(),
            dim: Style::new().dim(),
        }
    }
}

impl WorkflowObserver for ConsoleObserver {
    fn event(&self, task_id: Option<&str>, level: Level, message: &str) {
        if level == Level::Info && !self.verbose {
            return;
        }
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ");
        let tag = match task_id {
            Some(id) => format!(" [Task: {id}]"),
            None => String::new(),
        };
        let line = match level {
            Level::Info => self
                .dim
                .apply_to(format!("{timestamp} [INFO]{tag}: {message}"))
                .to_string(),
            Level::Warn => self
                .yellow
                .apply_to(format!("{timestamp} [WARN]{tag}: {message}"))
                .to_string(),
            Level::Error => self
                .red
                .apply_to(format!("{timestamp} [ERROR]{tag}: {message}"))
                .to_string(),
        };
        eprintln!("{line}");
    }
}

/// Observador nulo para testes.
pub struct NullObserver;

impl WorkflowObserver for NullObserver {
    fn event(&self, _task_id: Option<&str>, _level: Level, _message: &str) {}
}
