use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use super::error::BackendError;
use super::types::{Envelope, RemoteJob, SubmissionResponse};
use super::{BalanceSource, StatusSource, SubmissionBackend};
use crate::jobs::GenerationRequest;

const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// REST client for the render API. Implements every collaborator trait.
pub struct HttpBackend {
    api_key: Option<String>,
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self, BackendError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string(), timeout)
    }

    /// Create a client pointing at a custom base URL (useful for testing).
    pub fn with_base_url(
        api_key: Option<String>,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            api_key,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) if !key.is_empty() => builder.bearer_auth(key),
            _ => builder,
        }
    }

    async fn read_envelope<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(BackendError::Api {
                status: status.as_u16(),
                message: if body.is_empty() {
                    "unknown error".to_string()
                } else {
                    body
                },
            });
        }

        let envelope: Envelope<T> = serde_json::from_str(&body)?;
        if !envelope.success {
            return Err(BackendError::Api {
                status: status.as_u16(),
                message: envelope.error.unwrap_or_else(|| "request failed".to_string()),
            });
        }
        envelope
            .data
            .ok_or_else(|| BackendError::Decode("response has no data".to_string()))
    }
}

#[async_trait]
impl SubmissionBackend for HttpBackend {
    async fn submit_generation(
        &self,
        request: &GenerationRequest,
    ) -> Result<SubmissionResponse, BackendError> {
        let response = self
            .authorize(self.client.post(self.url("/api/renders")))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        // Limit and validation failures come back as 4xx with a regular
        // submission body, so try to decode before giving up on the status.
        match serde_json::from_str::<SubmissionResponse>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(_) if !status.is_success() => Err(BackendError::Api {
                status: status.as_u16(),
                message: if body.is_empty() {
                    "unknown error".to_string()
                } else {
                    body
                },
            }),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl StatusSource for HttpBackend {
    async fn list_project_jobs(&self, project_id: &str) -> Result<Vec<RemoteJob>, BackendError> {
        let path = format!("/api/projects/{project_id}/renders");
        let response = self.authorize(self.client.get(self.url(&path))).send().await?;
        Self::read_envelope(response).await
    }
}

#[async_trait]
impl BalanceSource for HttpBackend {
    async fn refresh_balance(&self) -> Result<(), BackendError> {
        let response = self
            .authorize(self.client.post(self.url("/api/credits/refresh")))
            .send()
            .await?;
        Self::read_envelope::<serde_json::Value>(response).await?;
        Ok(())
    }
}
