use async_trait::async_trait;

use super::{AssessContext, Assessor, AssessorError, Finding, Severity, StructuredResult};

const BASE_SCORE: f64 = 0.92;
const CLASH_SCORE: f64 = 0.6;

/// Tone-match scorer. The expected tone comes in through the call context
/// (`target_style`); informal markers clash with any formal target.
pub struct StyleToneAssessor {
    informal_markers: Vec<(&'static str, &'static str)>,
}

impl StyleToneAssessor {
    pub fn new() -> Self {
        Self {
            informal_markers: vec![
                ("buddy", "colleague"),
                ("super chill", "very relaxed"),
                ("genre là", "par exemple"),
            ],
        }
    }
}

impl Default for StyleToneAssessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Assessor for StyleToneAssessor {
    async fn assess(
        &self,
        content: &str,
        ctx: &AssessContext,
    ) -> Result<StructuredResult, AssessorError> {
        let lower = content.to_lowercase();
        let formal_expected = ctx.target_style.contains("formal");

        let findings: Vec<Finding> = if formal_expected {
            self.informal_markers
                .iter()
                .filter(|(marker, _)| lower.contains(marker))
                .map(|(marker, suggestion)| {
                    Finding::new(
                        "tone_clash",
                        marker,
                        Some((*suggestion).to_string()),
                        Severity::Low,
                    )
                })
                .collect()
        } else {
            Vec::new()
        };

        let score = if findings.is_empty() {
            BASE_SCORE
        } else {
            CLASH_SCORE
        };
        Ok(StructuredResult {
            score,
            findings,
            notes: format!("tone match against '{}'", ctx.target_style),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::Direction;

    fn ctx(style: &str) -> AssessContext {
        AssessContext {
            task_id: "t1".to_string(),
            direction: Direction::FrCaToEn,
            project_code: "proj_alpha".to_string(),
            target_style: style.to_string(),
        }
    }

    #[tokio::test]
    async fn formal_target_flags_informal_marker() {
        let result = StyleToneAssessor::new()
            .assess("Thanks buddy, the report is done.", &ctx("neutral_formal"))
            .await
            .unwrap();
        assert_eq!(result.score, CLASH_SCORE);
        assert_eq!(result.findings[0].term, "buddy");
        assert_eq!(result.findings[0].suggestion.as_deref(), Some("colleague"));
    }

    #[tokio::test]
    async fn informal_target_tolerates_informal_marker() {
        let result = StyleToneAssessor::new()
            .assess("Thanks buddy, the report is done.", &ctx("casual"))
            .await
            .unwrap();
        assert_eq!(result.score, BASE_SCORE);
        assert!(result.findings.is_empty());
    }

    #[tokio::test]
    async fn clean_formal_text_passes() {
        let result = StyleToneAssessor::new()
            .assess("The report has been finalized for review.", &ctx("neutral_formal"))
            .await
            .unwrap();
        assert_eq!(result.score, BASE_SCORE);
    }
}
