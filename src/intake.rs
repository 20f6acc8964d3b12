//! Intake collaborator: turns seed tuples into workflow units.
//!
//! Seeds come from a TOML or JSON file (`run`) or from the built-in sample
//! corpus (`demo`). No wire format is mandated beyond the tuple shape; the
//! file formats here are conveniences, not a contract.

use std::path::Path;

use serde::Deserialize;
use uuid::Uuid;

use crate::error::BureauError;
use crate::state_machine::{TaskSettings, TranslationTask};

/// One intake tuple: identity, content, locale pair and optional settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskSeed {
    #[serde(default)]
    pub id: Option<String>,
    pub text: String,
    pub source_language: String,
    pub target_language: String,
    #[serde(default)]
    pub project_code: Option<String>,
    #[serde(default)]
    pub target_style: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SeedFile {
    tasks: Vec<TaskSeed>,
}

/// Load seeds from a `.toml` or `.json` file.
pub fn load_seeds(path: &Path) -> Result<Vec<TaskSeed>, BureauError> {
    let contents = std::fs::read_to_string(path)?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    let file: SeedFile = match extension {
        "toml" => toml::from_str(&contents)?,
        "json" => serde_json::from_str(&contents)?,
        other => {
            return Err(BureauError::Intake(format!(
                "unsupported seed file extension '{other}' (expected .toml or .json)"
            )));
        }
    };
    if file.tasks.is_empty() {
        return Err(BureauError::Intake(format!(
            "no tasks defined in {}",
            path.display()
        )));
    }
    Ok(file.tasks)
}

/// Materialize units from seeds. Missing ids get a UUID; missing settings
/// fall back to the configured defaults.
pub fn seed_tasks(
    seeds: Vec<TaskSeed>,
    default_project: &str,
    default_style: &str,
) -> Vec<TranslationTask> {
    seeds
        .into_iter()
        .map(|seed| {
            let id = seed
                .id
                .unwrap_or_else(|| format!("task_{}", Uuid::new_v4()));
            let settings = TaskSettings {
                project_code: seed
                    .project_code
                    .unwrap_or_else(|| default_project.to_string()),
                target_style: seed
                    .target_style
                    .unwrap_or_else(|| default_style.to_string()),
                final_checklist: None,
                last_revision_request_key: None,
            };
            TranslationTask::new(
                id,
                seed.text,
                &seed.source_language,
                &seed.target_language,
                settings,
            )
        })
        .collect()
}

/// The demo corpus: a handful of documents chosen to exercise anglicism
/// detection, glossary enforcement, universal names, the mirrored
/// direction, an unknown term-base project and an unsupported locale pair.
pub fn sample_corpus() -> Vec<TaskSeed> {
    let texts: &[(&str, &str, &str, &str, Option<&str>)] = &[
        (
            "text_001_en_ca",
            "The early bird gets the worm, eh? My car needs a new bumper. Let's check the CPU usage on the internet.",
            "EN_CA",
            "FR_CA",
            None,
        ),
        (
            "text_002_en_ca",
            "I'm going to the dépanneur to grab a poutine for the cottage this weekend. It's going to be a fun party.",
            "EN_CA",
            "FR_CA",
            None,
        ),
        (
            "text_003_en_ca",
            "For this project, the application framework and the main computer software needs to be robust. Please check the colour-coded documentation.",
            "EN_CA",
            "FR_CA",
            None,
        ),
        (
            "text_004_fr_ca",
            "Salut mon chum! On va-tu vérifier le match des Glorieux à soir? C'est agréable de regarder le hockey.",
            "FR_CA",
            "EN_CA",
            None,
        ),
        (
            "text_005_fr_ca",
            "Le client veut une interface utilisateur conviviale pour son logiciel. Assurez-vous que la terminologie est conforme au glossaire.",
            "FR_CA",
            "EN_CA",
            None,
        ),
        (
            "text_006_en_ca",
            "The report must be impeccable. Please verify every detail before the deadline.",
            "EN_CA",
            "FR_CA",
            Some("proj_beta_nonexistent"),
        ),
        (
            "text_007_de_de",
            "Guten Tag! Dieses Dokument ist auf Deutsch.",
            "DE_DE",
            "FR_CA",
            None,
        ),
    ];

    texts
        .iter()
        .map(|(id, text, source, target, project)| TaskSeed {
            id: Some((*id).to_string()),
            text: (*text).to_string(),
            source_language: (*source).to_string(),
            target_language: (*target).to_string(),
            project_code: project.map(str::to_string),
            target_style: None,
        })
        .collect()
}
