use async_trait::async_trait;

use super::{AssessContext, AssessorError};
use crate::state_machine::Direction;

/// Machine-translation port. The workflow only needs a draft; whether it
/// comes from a human queue, an MT engine or the mock below is irrelevant to
/// the pipeline.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        source: &str,
        direction: Direction,
        ctx: &AssessContext,
    ) -> Result<String, AssessorError>;
}

/// Deterministic stand-in translator.
///
/// With `quirks` enabled it reproduces the classic slips of a rushed first
/// draft (anglicisms, France-French terms, glossary terms left untranslated)
/// so the downstream review stages have something real to catch. With quirks
/// off it produces a clean draft.
pub struct MockTranslator {
    quirks: bool,
}

impl MockTranslator {
    pub fn new() -> Self {
        Self { quirks: false }
    }

    pub fn with_quirks() -> Self {
        Self { quirks: true }
    }
}

impl Default for MockTranslator {
    fn default() -> Self {
        Self::new()
    }
}

fn preview(text: &str) -> String {
    text.chars().take(40).collect()
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(
        &self,
        source: &str,
        direction: Direction,
        ctx: &AssessContext,
    ) -> Result<String, AssessorError> {
        let lower = source.to_lowercase();
        match direction {
            Direction::EnToFrCa => {
                let mut out = format!(
                    "Le texte source était: «{}...». Traduction initiale.",
                    preview(source)
                );
                if self.quirks {
                    if lower.contains("hockey") {
                        out.push_str(" Le hockey est populaire ici.");
                    }
                    if lower.contains("computer") && ctx.project_code == "proj_alpha" {
                        out.push_str(" J'ai un nouveau computer.");
                    }
                    if lower.contains("application") && ctx.project_code == "proj_alpha" {
                        out.push_str(" Cette application est utile.");
                    }
                    if lower.contains("check") || lower.contains("verify") {
                        out.push_str(" Il faut checker ça.");
                    }
                    if lower.contains("fun") {
                        out.push_str(" C'est vraiment le fun.");
                    }
                    if lower.contains("weekend") {
                        out.push_str(" On se voit ce weekend.");
                    }
                }
                Ok(out)
            }
            Direction::FrCaToEn => {
                let mut out = format!("Source text was: «{}...». Initial translation.", preview(source));
                if self.quirks {
                    if lower.contains("vérifier") || lower.contains("organiser") {
                        out.push_str(" We will organize and check the color of the report.");
                    }
                    if lower.contains("logiciel") && ctx.project_code == "proj_alpha" {
                        out.push_str(" The logiciel must stay stable.");
                    }
                } else {
                    out.push_str(" We will use proper Canadian spelling like colour and analyse.");
                }
                Ok(out)
            }
        }
    }
}
