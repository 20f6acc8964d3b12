//! External assessor contract and the bureau's bundled implementations.
//!
//! The workflow core only ever sees the [`Assessor`] trait: rule-based
//! checkers, the HTTP-backed remote client and the fault-injection wrapper
//! are all interchangeable behind it.

pub mod fault;
pub mod grammar;
pub mod nuance;
pub mod remote;
pub mod style;
pub mod terminology;
pub mod translate;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state_machine::{Direction, TranslationTask};

pub use fault::{FaultInjector, NeverFlag, QualityProbe, RandomProbe};
pub use grammar::{CaEnglishGrammarAssessor, CaFrenchGrammarAssessor};
pub use nuance::NuanceAssessor;
pub use remote::RemoteAssessor;
pub use style::StyleToneAssessor;
pub use terminology::TerminologyAssessor;
pub use translate::{MockTranslator, Translator};

/// Severity of a single finding. `Info` findings are acknowledgments and
/// never block a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    High,
}

/// One issue reported by an assessor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub kind: String,
    pub term: String,
    pub suggestion: Option<String>,
    pub severity: Severity,
}

impl Finding {
    pub fn new(kind: &str, term: &str, suggestion: Option<String>, severity: Severity) -> Self {
        Self {
            kind: kind.to_string(),
            term: term.to_string(),
            suggestion,
            severity,
        }
    }
}

/// Structured result of one assessment call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredResult {
    /// Stage-interpreted quality score in `[0, 1]`.
    pub score: f64,
    pub findings: Vec<Finding>,
    pub notes: String,
}

impl StructuredResult {
    pub fn clean(score: f64, notes: &str) -> Self {
        Self {
            score,
            findings: Vec::new(),
            notes: notes.to_string(),
        }
    }

    /// Findings that should block the stage (everything above `Info`).
    pub fn blocking_findings(&self) -> Vec<Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity != Severity::Info)
            .cloned()
            .collect()
    }

    /// Findings that must stop the terminology stage specifically.
    pub fn critical_findings(&self) -> Vec<Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::High)
            .cloned()
            .collect()
    }
}

/// Failure signals an assessor may raise. Everything except `Internal` is a
/// transient infrastructure failure and gets routed to a retry state.
#[derive(Debug, Error)]
pub enum AssessorError {
    #[error("assessor call timed out")]
    Timeout,

    #[error("assessor service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("assessor resource not found: {0}")]
    ResourceNotFound(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("assessor internal error: {0}")]
    Internal(String),
}

impl AssessorError {
    pub fn is_transient(&self) -> bool {
        !matches!(self, AssessorError::Internal(_))
    }
}

/// Per-call context handed to every assessor.
#[derive(Debug, Clone)]
pub struct AssessContext {
    pub task_id: String,
    pub direction: Direction,
    pub project_code: String,
    pub target_style: String,
}

impl AssessContext {
    pub fn for_task(task: &TranslationTask, direction: Direction) -> Self {
        Self {
            task_id: task.id.clone(),
            direction,
            project_code: task.settings.project_code.clone(),
            target_style: task.settings.target_style.clone(),
        }
    }
}

/// An external quality check. Implementations must be safe for concurrent
/// invocation; the engine shares them across units behind `Arc`.
#[async_trait]
pub trait Assessor: Send + Sync {
    async fn assess(
        &self,
        content: &str,
        ctx: &AssessContext,
    ) -> Result<StructuredResult, AssessorError>;
}

/// Whole-word, case-insensitive matcher for a literal term.
pub(crate) fn word_pattern(term: &str) -> regex::Regex {
    regex::RegexBuilder::new(&format!(r"\b{}\b", regex::escape(term)))
        .case_insensitive(true)
        .build()
        .expect("invalid term pattern")
}

/// Run an assessor call under a deadline. Expiry is indistinguishable from
/// any other transient failure.
pub async fn assess_with_timeout(
    assessor: &dyn Assessor,
    content: &str,
    ctx: &AssessContext,
    deadline: Duration,
) -> Result<StructuredResult, AssessorError> {
    match tokio::time::timeout(deadline, assessor.assess(content, ctx)).await {
        Ok(result) => result,
        Err(_) => Err(AssessorError::Timeout),
    }
}
