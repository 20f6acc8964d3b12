use async_trait::async_trait;

use super::{AssessContext, Assessor, AssessorError, Finding, Severity, StructuredResult};

const BASE_SCORE: f64 = 0.88;
const FLAGGED_SCORE: f64 = 0.5;

/// Cultural-appropriateness scorer.
///
/// Returns a high base score and drops below the stage threshold only when a
/// known register slip is present in the text.
pub struct NuanceAssessor {
    register_slips: Vec<(&'static str, &'static str)>,
}

impl NuanceAssessor {
    pub fn new() -> Self {
        Self {
            register_slips: vec![
                ("faux pas example", "rephrase for the target audience"),
                ("trop cool", "très intéressant"),
                ("super le fun", "très agréable"),
            ],
        }
    }
}

impl Default for NuanceAssessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Assessor for NuanceAssessor {
    async fn assess(
        &self,
        content: &str,
        ctx: &AssessContext,
    ) -> Result<StructuredResult, AssessorError> {
        let lower = content.to_lowercase();
        let findings: Vec<Finding> = self
            .register_slips
            .iter()
            .filter(|(slip, _)| lower.contains(slip))
            .map(|(slip, suggestion)| {
                Finding::new("register", slip, Some((*suggestion).to_string()), Severity::Low)
            })
            .collect();

        let score = if findings.is_empty() {
            BASE_SCORE
        } else {
            FLAGGED_SCORE
        };
        Ok(StructuredResult {
            score,
            findings,
            notes: format!("appropriateness for {}", ctx.direction),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::Direction;

    fn ctx() -> AssessContext {
        AssessContext {
            task_id: "t1".to_string(),
            direction: Direction::EnToFrCa,
            project_code: "proj_alpha".to_string(),
            target_style: "neutral_formal".to_string(),
        }
    }

    #[tokio::test]
    async fn clean_text_scores_above_threshold() {
        let result = NuanceAssessor::new()
            .assess("Le logiciel est convivial.", &ctx())
            .await
            .unwrap();
        assert_eq!(result.score, BASE_SCORE);
        assert!(result.findings.is_empty());
    }

    #[tokio::test]
    async fn register_slip_drops_the_score() {
        let result = NuanceAssessor::new()
            .assess("Ce logiciel est trop cool.", &ctx())
            .await
            .unwrap();
        assert_eq!(result.score, FLAGGED_SCORE);
        assert_eq!(result.findings[0].kind, "register");
        assert_eq!(
            result.findings[0].suggestion.as_deref(),
            Some("très intéressant")
        );
    }
}
