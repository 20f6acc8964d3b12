//! Configuração do bureau carregada a partir de `bureau.toml`.
//!
//! A struct [`BureauConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `BUREAU_ASSESSOR_API_KEY` tem precedência sobre o
//! arquivo para a chave do serviço de avaliação remoto.

use anyhow::Result;
use serde::Deserialize;
use std::path::Path;

/// Uma verificação do portão final de qualidade. A ordem em
/// [`BureauConfig::final_check_order`] define a prioridade quando várias
/// falham ao mesmo tempo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalCheck {
    /// Presença dos marcadores esperados dos estágios anteriores.
    Formatting,
    /// Varredura por problemas de QA anteriores nunca resolvidos.
    UnresolvedQa,
    /// Coesão contextual entre o contexto da fonte e o registro do texto.
    Cohesion,
    /// Amostragem de qualidade sutil, limitada por sua própria cota.
    SubtleQuality,
}

/// Configuração de nível superior carregada de `bureau.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct BureauConfig {
    /// Máximo de retentativas de API antes de falhar a tarefa.
    #[serde(default = "default_max_api_retries")]
    pub max_api_retries: u32,

    /// Cota padrão de revisões por chave de estágio.
    #[serde(default = "default_max_revisions")]
    pub max_revisions_per_stage: u32,

    /// Cota própria da verificação de qualidade sutil do portão final.
    #[serde(default = "default_max_final_quality_revisions")]
    pub max_final_quality_revisions: u32,

    /// Prazo em milissegundos para cada chamada de avaliador.
    #[serde(default = "default_assessor_timeout_ms")]
    pub assessor_timeout_ms: u64,

    /// Atraso base em milissegundos para backoff exponencial de retentativas.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Teto de iterações do motor (rede de segurança contra livelock).
    #[serde(default = "default_max_engine_iterations")]
    pub max_engine_iterations: u32,

    /// Ordem de prioridade das verificações do portão final.
    #[serde(default = "default_final_check_order")]
    pub final_check_order: Vec<FinalCheck>,

    /// Código de projeto usado quando a entrada não especifica um.
    #[serde(default = "default_project_code")]
    pub default_project_code: String,

    /// Estilo alvo usado quando a entrada não especifica um.
    #[serde(default = "default_target_style")]
    pub default_target_style: String,

    /// Taxa de falhas transitórias injetadas no modo demo.
    #[serde(default = "default_demo_fault_rate")]
    pub demo_fault_rate: f64,

    /// Semente para os injetores do modo demo; usa 42 quando ausente.
    #[serde(default)]
    pub demo_seed: Option<u64>,

    /// Serviço de avaliação remoto opcional; quando presente, substitui os
    /// avaliadores locais baseados em regras.
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
}

/// Configuração do serviço de avaliação remoto.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
}

fn default_max_api_retries() -> u32 {
    3
}

fn default_max_revisions() -> u32 {
    2
}

fn default_max_final_quality_revisions() -> u32 {
    1
}

fn default_assessor_timeout_ms() -> u64 {
    5000
}

fn default_retry_base_delay_ms() -> u64 {
    250
}

fn default_max_engine_iterations() -> u32 {
    150
}

fn default_final_check_order() -> Vec<FinalCheck> {
    vec![
        FinalCheck::Formatting,
        FinalCheck::UnresolvedQa,
        FinalCheck::Cohesion,
        FinalCheck::SubtleQuality,
    ]
}

fn default_project_code() -> String {
    "proj_alpha".to_string()
}

fn default_target_style() -> String {
    "neutral_formal".to_string()
}

fn default_demo_fault_rate() -> f64 {
    0.2
}

impl Default for BureauConfig {
    fn default() -> Self {
        Self {
            max_api_retries: default_max_api_retries(),
            max_revisions_per_stage: default_max_revisions(),
            max_final_quality_revisions: default_max_final_quality_revisions(),
            assessor_timeout_ms: default_assessor_timeout_ms(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            max_engine_iterations: default_max_engine_iterations(),
            final_check_order: default_final_check_order(),
            default_project_code: default_project_code(),
            default_target_style: default_target_style(),
            demo_fault_rate: default_demo_fault_rate(),
            demo_seed: None,
            remote: None,
        }
    }
}

impl BureauConfig {
    /// Carrega a configuração de `bureau.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("bureau.toml"))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<BureauConfig>(&contents)?
        } else {
            Self::default()
        };

        // Variável de ambiente tem precedência sobre o arquivo para a chave.
        if let Ok(key) = std::env::var("BUREAU_ASSESSOR_API_KEY")
            && !key.is_empty()
            && let Some(remote) = config.remote.as_mut()
        {
            remote.api_key = key;
        }

        Ok(config)
    }
}
