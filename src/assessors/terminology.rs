use std::collections::HashSet;

use async_trait::async_trait;
use regex::Regex;

use super::{
    word_pattern, AssessContext, Assessor, AssessorError, Finding, Severity, StructuredResult,
};
use crate::state_machine::Direction;

/// Bilingual glossary entry for one project term.
struct TermPair {
    en: &'static str,
    fr: &'static str,
    en_pattern: Regex,
    fr_pattern: Regex,
}

/// Project term-base and universal-name checker.
///
/// A glossary term left in the source language is a high-severity issue; a
/// universal name correctly kept in its original form is acknowledged at
/// info level. An unknown project code means the term base itself cannot be
/// resolved, which surfaces as a retryable resource error.
pub struct TerminologyAssessor {
    known_projects: HashSet<&'static str>,
    term_pairs: Vec<TermPair>,
    universal_names: Vec<(Regex, &'static str)>,
}

impl TerminologyAssessor {
    pub fn new() -> Self {
        let pairs: &[(&str, &str)] = &[
            ("application", "logiciel"),
            ("framework", "cadre d'architecture"),
            ("computer", "ordinateur"),
        ];
        let universal: &[&str] = &[
            "poutine", "igloo", "wi-fi", "tsunami", "hockey", "parking", "stop", "jeans",
            "sandwich", "internet", "email", "cpu", "usb", "ceo", "cto", "québec",
        ];

        Self {
            known_projects: HashSet::from(["proj_alpha"]),
            term_pairs: pairs
                .iter()
                .map(|(en, fr)| TermPair {
                    en,
                    fr,
                    en_pattern: word_pattern(en),
                    fr_pattern: word_pattern(fr),
                })
                .collect(),
            universal_names: universal
                .iter()
                .map(|name| (word_pattern(name), *name))
                .collect(),
        }
    }

    fn project_terms_apply(&self, project_code: &str) -> Result<bool, AssessorError> {
        if project_code.is_empty() {
            return Ok(false);
        }
        if self.known_projects.contains(project_code) {
            return Ok(true);
        }
        Err(AssessorError::ResourceNotFound(format!(
            "termbase for project '{project_code}' not found"
        )))
    }
}

impl Default for TerminologyAssessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Assessor for TerminologyAssessor {
    async fn assess(
        &self,
        content: &str,
        ctx: &AssessContext,
    ) -> Result<StructuredResult, AssessorError> {
        let mut findings = Vec::new();
        let check_project_terms = self.project_terms_apply(&ctx.project_code)?;

        if check_project_terms {
            for pair in &self.term_pairs {
                let (source_term, source_pattern, expected, expected_pattern) =
                    match ctx.direction {
                        Direction::EnToFrCa => (pair.en, &pair.en_pattern, pair.fr, &pair.fr_pattern),
                        Direction::FrCaToEn => (pair.fr, &pair.fr_pattern, pair.en, &pair.en_pattern),
                    };
                if source_pattern.is_match(content) && !expected_pattern.is_match(content) {
                    findings.push(Finding {
                        kind: "untranslated_term".to_string(),
                        term: source_term.to_string(),
                        suggestion: Some(expected.to_string()),
                        severity: Severity::High,
                    });
                }
            }
        }

        for (pattern, name) in &self.universal_names {
            if pattern.is_match(content) {
                findings.push(Finding::new(
                    "universal_name_present",
                    name,
                    None,
                    Severity::Info,
                ));
            }
        }

        let critical = findings
            .iter()
            .filter(|f| f.severity == Severity::High)
            .count();
        Ok(StructuredResult {
            score: if critical == 0 { 1.0 } else { 0.4 },
            findings,
            notes: format!(
                "checked against project_{}_{}_terms",
                ctx.project_code,
                ctx.direction.target_tag()
            ),
        })
    }
}
