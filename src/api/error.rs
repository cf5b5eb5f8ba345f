//! Tipos de erro para os colaboradores remotos (submissão, status e saldo).
//!
//! Define [`BackendError`] com variantes para erros HTTP da API, falhas de
//! rede e respostas que não puderam ser decodificadas. Usa `thiserror` para
//! derivar `Display` e `Error` a partir dos atributos `#[error(...)]`.

use thiserror::Error;

/// Erros que podem ocorrer ao falar com o backend de geração.
///
/// - [`Api`](BackendError::Api): o servidor respondeu com status 4xx/5xx
/// - [`Network`](BackendError::Network): falha na camada de rede
/// - [`Decode`](BackendError::Decode): o corpo da resposta não tinha o formato esperado
#[derive(Debug, Error)]
pub enum BackendError {
    /// Erro retornado pela API (ex.: 401 token inválido, 500 erro interno).
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Falha de rede subjacente (DNS, conexão recusada, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Resposta recebida mas impossível de interpretar.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Decode(err.to_string())
    }
}
