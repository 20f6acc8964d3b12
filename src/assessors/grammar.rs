use async_trait::async_trait;
use regex::{Regex, RegexBuilder};

use super::{
    word_pattern, AssessContext, Assessor, AssessorError, Finding, Severity, StructuredResult,
};

/// Rule-based Canadian-French grammar and usage checker.
///
/// Flags common anglicisms, France-French terms with preferred Quebec
/// alternatives and a handful of generic grammar patterns.
pub struct CaFrenchGrammarAssessor {
    anglicisms: Vec<(Regex, &'static str, &'static str)>,
    france_terms: Vec<(Regex, &'static str, &'static str, &'static str)>,
    grammar_patterns: Vec<(Regex, &'static str)>,
}

impl CaFrenchGrammarAssessor {
    pub fn new() -> Self {
        let anglicisms: &[(&str, &str)] = &[
            ("le fun", "du plaisir (ou un contexte plus spécifique)"),
            ("checker", "vérifier (ou consulter, regarder selon le contexte)"),
            ("watcher", "regarder (surtout pour la télévision, un film)"),
            ("party", "fête (ou soirée)"),
            ("anyway", "de toute façon (ou en tout cas, bref)"),
            ("bumper", "pare-chocs"),
            ("flat", "crevaison (pour un pneu)"),
            ("appointment", "rendez-vous"),
        ];
        let france_terms: &[(&str, &str, &str)] = &[
            (
                "voiture",
                "auto",
                "Bien que 'voiture' soit compris, 'auto' est l'option courante au Québec.",
            ),
            (
                "dîner",
                "souper",
                "'Dîner' au Québec réfère typiquement au repas de midi.",
            ),
            (
                "petit déjeuner",
                "déjeuner",
                "'Déjeuner' au Québec est le repas du matin.",
            ),
            (
                "weekend",
                "fin de semaine",
                "'Fin de semaine' est l'expression courante au Québec.",
            ),
        ];
        let grammar_patterns: &[(&str, &str)] = &[
            (
                r"\bil les a (donner|manger|voir|prendre|faire)\b",
                "Potential past participle agreement error with 'avoir' and preceding direct object.",
            ),
            (
                r"\bsi j'aurais\b",
                "Incorrect conditional: 'si j'avais' is preferred for past unreal conditions.",
            ),
            (
                r"\bc'est les (filles|gars|livres)\b",
                "Potential agreement error: 'ce sont les...' is preferred in formal writing.",
            ),
        ];

        Self {
            anglicisms: anglicisms
                .iter()
                .map(|(term, sug)| (word_pattern(term), *term, *sug))
                .collect(),
            france_terms: france_terms
                .iter()
                .map(|(term, sug, note)| (word_pattern(term), *term, *sug, *note))
                .collect(),
            grammar_patterns: grammar_patterns
                .iter()
                .map(|(pat, desc)| {
                    (
                        RegexBuilder::new(pat)
                            .case_insensitive(true)
                            .build()
                            .expect("invalid grammar pattern"),
                        *desc,
                    )
                })
                .collect(),
        }
    }
}

impl Default for CaFrenchGrammarAssessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Assessor for CaFrenchGrammarAssessor {
    async fn assess(
        &self,
        content: &str,
        _ctx: &AssessContext,
    ) -> Result<StructuredResult, AssessorError> {
        let mut findings = Vec::new();

        for (pattern, term, suggestion) in &self.anglicisms {
            if pattern.is_match(content) {
                findings.push(Finding::new(
                    "anglicism",
                    term,
                    Some((*suggestion).to_string()),
                    Severity::Low,
                ));
            }
        }
        for (pattern, term, suggestion, note) in &self.france_terms {
            if pattern.is_match(content) {
                findings.push(Finding {
                    kind: "preferred_term".to_string(),
                    term: (*term).to_string(),
                    suggestion: Some(format!("{suggestion} ({note})")),
                    severity: Severity::Low,
                });
            }
        }
        for (pattern, description) in &self.grammar_patterns {
            if let Some(m) = pattern.find(content) {
                findings.push(Finding::new(
                    "grammar_pattern",
                    m.as_str(),
                    Some((*description).to_string()),
                    Severity::Low,
                ));
            }
        }

        let score = if findings.is_empty() {
            1.0
        } else {
            (1.0 - findings.len() as f64 * 0.08).max(0.3)
        };
        let notes = if findings.is_empty() {
            "Good adherence to Canadian French grammar and usage.".to_string()
        } else {
            format!("{} issue(s) found.", findings.len())
        };

        Ok(StructuredResult {
            score,
            findings,
            notes,
        })
    }
}

/// Rule-based Canadian-English spelling and usage checker.
pub struct CaEnglishGrammarAssessor {
    color: Regex,
    ize_words: Regex,
}

impl CaEnglishGrammarAssessor {
    pub fn new() -> Self {
        Self {
            color: word_pattern("color"),
            ize_words: RegexBuilder::new(r"\b(\w+)ize\b")
                .case_insensitive(true)
                .build()
                .expect("invalid ize pattern"),
        }
    }
}

impl Default for CaEnglishGrammarAssessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Assessor for CaEnglishGrammarAssessor {
    async fn assess(
        &self,
        content: &str,
        _ctx: &AssessContext,
    ) -> Result<StructuredResult, AssessorError> {
        let mut findings = Vec::new();

        if self.color.is_match(content) {
            findings.push(Finding::new(
                "spelling",
                "color",
                Some("colour".to_string()),
                Severity::Low,
            ));
        }
        for caps in self.ize_words.captures_iter(content) {
            let root = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let word = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
            findings.push(Finding::new(
                "spelling_preference",
                word,
                Some(format!("{root}ise")),
                Severity::Low,
            ));
        }

        let score = if findings.is_empty() {
            0.95
        } else {
            (0.95 - findings.len() as f64 * 0.1).max(0.5)
        };
        let notes = if findings.is_empty() {
            "Good adherence to Canadian English grammar.".to_string()
        } else {
            "Review for Canadian English spelling and grammar points.".to_string()
        };

        Ok(StructuredResult {
            score,
            findings,
            notes,
        })
    }
}
