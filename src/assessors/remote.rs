//! Cliente HTTP para serviços de avaliação remotos.
//!
//! O [`RemoteAssessor`] fala um formato JSON simples com qualquer serviço de
//! QA (gramática, terminologia, etc.): envia o conteúdo e o contexto, recebe
//! um resultado estruturado. A `base_url` pode ser sobrescrita para testes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{AssessContext, Assessor, AssessorError, Finding, Severity, StructuredResult};

/// Corpo da requisição enviada ao serviço de avaliação.
#[derive(Debug, Clone, Serialize)]
struct AssessRequest<'a> {
    /// Tipo de verificação solicitada (ex.: "grammar", "terminology").
    check: &'a str,
    /// Conteúdo a ser avaliado.
    content: &'a str,
    /// Idioma alvo, ex.: "FR_CA".
    language: &'a str,
    /// Código do projeto para resolução de glossários.
    project: &'a str,
    /// Estilo alvo esperado, ex.: "neutral_formal".
    style: &'a str,
}

/// Um achado no formato de fio retornado pelo serviço.
#[derive(Debug, Clone, Deserialize)]
struct WireFinding {
    #[serde(rename = "type")]
    kind: String,
    term: String,
    #[serde(default)]
    suggestion: Option<String>,
    #[serde(default = "default_severity")]
    severity: String,
}

fn default_severity() -> String {
    "low".to_string()
}

/// Resposta do serviço de avaliação.
#[derive(Debug, Clone, Deserialize)]
struct AssessResponse {
    score: f64,
    #[serde(default)]
    findings: Vec<WireFinding>,
    #[serde(default)]
    notes: Option<String>,
}

/// Avaliador remoto via HTTP. Uma instância por tipo de verificação.
pub struct RemoteAssessor {
    client: Client,
    base_url: String,
    api_key: String,
    check: String,
}

impl RemoteAssessor {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, check: &str) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            check: check.to_string(),
        }
    }
}

fn parse_severity(raw: &str) -> Severity {
    match raw {
        "high" => Severity::High,
        "info" => Severity::Info,
        _ => Severity::Low,
    }
}

#[async_trait]
impl Assessor for RemoteAssessor {
    async fn assess(
        &self,
        content: &str,
        ctx: &AssessContext,
    ) -> Result<StructuredResult, AssessorError> {
        let req = AssessRequest {
            check: &self.check,
            content,
            language: ctx.direction.target_tag(),
            project: &ctx.project_code,
            style: &ctx.target_style,
        };

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&req)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AssessorError::Timeout
                } else {
                    AssessorError::Network(e)
                }
            })?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("?")
                .to_string();
            return Err(AssessorError::ServiceUnavailable(format!(
                "rate limited, retry after {retry_after}s"
            )));
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(AssessorError::ResourceNotFound(format!(
                "{} check for project '{}'",
                self.check, ctx.project_code
            )));
        }
        if status.is_server_error() {
            return Err(AssessorError::ServiceUnavailable(format!(
                "server returned {status}"
            )));
        }
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(AssessorError::Internal(format!(
                "status {status}: {message}"
            )));
        }

        let body: AssessResponse = response
            .json()
            .await
            .map_err(|e| AssessorError::Internal(format!("failed to parse response: {e}")))?;

        Ok(StructuredResult {
            score: body.score,
            findings: body
                .findings
                .into_iter()
                .map(|f| Finding {
                    kind: f.kind,
                    term: f.term,
                    suggestion: f.suggestion,
                    severity: parse_severity(&f.severity),
                })
                .collect(),
            notes: body.notes.unwrap_or_default(),
        })
    }
}
