//! Tipos de dados trocados com o backend de geração.
//!
//! Todas as structs derivam `Serialize` e `Deserialize` no formato JSON
//! camelCase usado pelas ações de render do servidor. Ids aceitam tanto
//! `id` quanto `renderId`, pois o backend usa os dois nomes.

use serde::{Deserialize, Serialize};

/// Referência mínima a um job criado pelo backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStub {
    #[serde(alias = "renderId")]
    pub id: String,
    /// Presente apenas quando o job terminou de forma síncrona.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
}

/// Detalhes de um limite de plano ou cota atingido.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitPayload {
    pub limit_type: String,
    #[serde(default)]
    pub current: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default, alias = "error")]
    pub message: Option<String>,
    #[serde(default)]
    pub plan_name: Option<String>,
}

/// O campo `data` de uma resposta de submissão.
///
/// Variantes não marcadas: a ordem importa, um array é tentado primeiro.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubmissionData {
    Many(Vec<JobStub>),
    One(JobStub),
    Limit(LimitPayload),
}

/// Corpo da resposta de `POST /api/renders`.
///
/// O backend pode sinalizar limite atingido de duas formas: com os campos
/// no nível superior (`limitReached: true`, `limitType`, ...) ou com um
/// [`LimitPayload`] dentro de `data`. [`SubmissionResponse::limit`] unifica.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<SubmissionData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub limit_reached: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_name: Option<String>,
}

impl SubmissionResponse {
    /// Resposta de sucesso contendo os stubs fornecidos.
    pub fn accepted(data: SubmissionData) -> Self {
        Self {
            success: true,
            data: Some(data),
            ..Default::default()
        }
    }

    /// Resposta de falha genérica.
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Retorna os detalhes do limite, se a resposta sinalizar um.
    pub fn limit(&self) -> Option<LimitPayload> {
        if let Some(SubmissionData::Limit(payload)) = &self.data {
            return Some(payload.clone());
        }
        if !self.limit_reached {
            return None;
        }
        Some(LimitPayload {
            limit_type: self
                .limit_type
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            current: self.current,
            limit: self.limit,
            message: self.error.clone(),
            plan_name: self.plan_name.clone(),
        })
    }
}

/// Status de um job como reportado pelo backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

/// Um job como listado por `GET /api/projects/{id}/renders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteJob {
    #[serde(alias = "renderId")]
    pub id: String,
    pub status: RemoteStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
}

impl RemoteJob {
    /// A URL de saída, somente se o job concluiu com uma URL não vazia.
    pub fn resolved_url(&self) -> Option<&str> {
        match (self.status, self.output_url.as_deref()) {
            (RemoteStatus::Completed, Some(url)) if !url.is_empty() => Some(url),
            _ => None,
        }
    }
}

/// Envelope `{ success, data, error }` das rotas de leitura.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_response_deserializes_array() {
        let json = r#"{
            "success": true,
            "data": [{"renderId": "r-1"}, {"id": "r-2", "outputUrl": null}]
        }"#;
        let resp: SubmissionResponse = serde_json::from_str(json).unwrap();
        match &resp.data {
            Some(SubmissionData::Many(stubs)) => {
                assert_eq!(stubs.len(), 2);
                assert_eq!(stubs[0].id, "r-1");
                assert_eq!(stubs[1].id, "r-2");
                assert!(stubs[1].output_url.is_none());
            }
            other => panic!("expected batch data, got {other:?}"),
        }
        assert!(resp.limit().is_none());
    }

    /// `RemoteJob` não implementa `Default`; o envelope precisa funcionar assim mesmo.
    fn read<T: serde::de::DeserializeOwned>(json: &str) -> Envelope<T> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn envelope_without_default_payload() {
        let ok: Envelope<RemoteJob> =
            read(r#"{"success": true, "data": {"id": "r-1", "status": "processing"}}"#);
        assert_eq!(ok.data.map(|j| j.id), Some("r-1".to_string()));

        let failed: Envelope<RemoteJob> = read(r#"{"success": false, "error": "Not found"}"#);
        assert!(!failed.success);
        assert!(failed.data.is_none());
        assert_eq!(failed.error.as_deref(), Some("Not found"));
    }

    #[test]
    fn single_response_deserializes_object() {
        let json = r#"{"success": true, "data": {"renderId": "r-9", "outputUrl": "https://cdn/x.png"}}"#;
        let resp: SubmissionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            resp.data,
            Some(SubmissionData::One(JobStub {
                id: "r-9".into(),
                output_url: Some("https://cdn/x.png".into()),
            }))
        );
    }

    #[test]
    fn top_level_limit_fields_are_recognized() {
        let json = r#"{
            "success": false,
            "error": "Insufficient credits",
            "limitReached": true,
            "limitType": "credits",
            "current": 3,
            "limit": 10,
            "planName": "Free"
        }"#;
        let resp: SubmissionResponse = serde_json::from_str(json).unwrap();
        let limit = resp.limit().unwrap();
        assert_eq!(limit.limit_type, "credits");
        assert_eq!(limit.current, Some(3));
        assert_eq!(limit.limit, Some(10));
        assert_eq!(limit.message.as_deref(), Some("Insufficient credits"));
        assert_eq!(limit.plan_name.as_deref(), Some("Free"));
    }

    #[test]
    fn limit_inside_data_is_recognized() {
        let json = r#"{
            "success": false,
            "data": {"limitType": "video", "current": 1, "limit": 1, "error": "Video not in plan"}
        }"#;
        let resp: SubmissionResponse = serde_json::from_str(json).unwrap();
        let limit = resp.limit().unwrap();
        assert_eq!(limit.limit_type, "video");
        assert_eq!(limit.message.as_deref(), Some("Video not in plan"));
    }

    #[test]
    fn unknown_remote_status_is_tolerated() {
        let json = r#"{"id": "r-1", "status": "queued"}"#;
        let job: RemoteJob = serde_json::from_str(json).unwrap();
        assert_eq!(job.status, RemoteStatus::Unknown);
        assert!(job.resolved_url().is_none());
    }

    #[test]
    fn resolved_url_requires_completed_and_non_empty() {
        let mut job = RemoteJob {
            id: "r-1".into(),
            status: RemoteStatus::Completed,
            output_url: Some(String::new()),
        };
        assert!(job.resolved_url().is_none());

        job.output_url = Some("https://cdn/r-1.png".into());
        assert_eq!(job.resolved_url(), Some("https://cdn/r-1.png"));

        job.status = RemoteStatus::Failed;
        assert!(job.resolved_url().is_none());
    }
}
