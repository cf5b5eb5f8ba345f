//! Configuração do renderflow carregada a partir de `renderflow.toml`.
//!
//! A struct [`RenderflowConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `RENDERFLOW_API_KEY` tem precedência sobre o arquivo.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::poller::PollPolicy;

/// Nome do arquivo procurado no diretório atual.
pub const DEFAULT_CONFIG_FILE: &str = "renderflow.toml";

/// Variável de ambiente que sobrescreve `api_key`.
pub const API_KEY_ENV: &str = "RENDERFLOW_API_KEY";

/// Configuração de nível superior carregada de `renderflow.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RenderflowConfig {
    /// URL base da API de renders.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Token enviado como `Authorization: Bearer`.
    #[serde(default)]
    pub api_key: String,

    /// Intervalo entre consultas de status, em milissegundos.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Duração máxima de uma sessão de polling, em segundos.
    #[serde(default = "default_max_poll_window_secs")]
    pub max_poll_window_secs: u64,

    /// Timeout de cada requisição HTTP, em segundos.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

// Valor padrão da URL base: servidor local de desenvolvimento.
fn default_api_base_url() -> String {
    "http://localhost:3000".to_string()
}

// Valor padrão do intervalo: 2000ms.
fn default_poll_interval_ms() -> u64 {
    2000
}

// Valor padrão da janela: 5 minutos.
fn default_max_poll_window_secs() -> u64 {
    300
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for RenderflowConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_key: String::new(),
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_window_secs: default_max_poll_window_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl RenderflowConfig {
    /// Carrega a configuração de `path`, ou de `renderflow.toml` no
    /// diretório atual. Usa valores padrão se o arquivo implícito não
    /// existir; um caminho explícito inexistente é erro.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)?
                } else {
                    Self::default()
                }
            }
        };

        // Variável de ambiente tem precedência sobre o arquivo para a chave API.
        if let Ok(key) = std::env::var(API_KEY_ENV)
            && !key.is_empty()
        {
            config.api_key = key;
        }

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("invalid config in {}", path.display()))?;
        if config.poll_interval_ms == 0 {
            bail!("invalid config in {}: poll_interval_ms must be greater than 0", path.display());
        }
        Ok(config)
    }

    /// A chave API, se configurada.
    pub fn api_key(&self) -> Option<String> {
        Some(self.api_key.clone()).filter(|k| !k.is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Política de polling, com sobrescritas opcionais vindas da CLI.
    /// Um intervalo zero é recusado: viraria um laço de consultas sem pausa.
    pub fn poll_policy(
        &self,
        interval_ms: Option<u64>,
        window_secs: Option<u64>,
    ) -> Result<PollPolicy> {
        let interval_ms = interval_ms.unwrap_or(self.poll_interval_ms);
        if interval_ms == 0 {
            bail!("poll interval must be greater than 0 ms");
        }
        Ok(PollPolicy {
            interval: Duration::from_millis(interval_ms),
            max_window: Duration::from_secs(window_secs.unwrap_or(self.max_poll_window_secs)),
        })
    }
}
