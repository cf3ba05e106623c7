/// REST client for the translation backend
use async_trait::async_trait;
use document::{
    Ack, CreateVersionRequest, Document, DocumentId, DocumentVersion, ErrorBody, HandoverRequest,
    LockLease, LockStatus, SaveRequest, UserRef,
};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::{BackendError, BackendResult, TranslationBackend};

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USER_NAME_HEADER: &str = "X-User-Name";

/// Where the backend lives and who is calling it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub api_url: String,
    pub user_id: String,
    pub user_name: String,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8080/api".to_string(),
            user_id: "local".to_string(),
            user_name: "Local Translator".to_string(),
            timeout_secs: 30,
        }
    }
}

impl BackendConfig {
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_user(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.user_id = id.into();
        self.user_name = name.into();
        self
    }

    pub fn user(&self) -> UserRef {
        UserRef::new(&self.user_id, &self.user_name)
    }
}

pub struct HttpBackend {
    api_url: String,
    user: UserRef,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> BackendResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            user: config.user(),
            client,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    fn identify(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(USER_ID_HEADER, &self.user.id)
            .header(USER_NAME_HEADER, &self.user.name)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> BackendResult<T> {
        debug!("GET {}", path);
        let response = self.identify(self.client.get(self.url(path))).send().await?;
        read_response(response).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> BackendResult<T> {
        debug!("POST {}", path);
        let response = self
            .identify(self.client.post(self.url(path)))
            .json(body)
            .send()
            .await?;
        read_response(response).await
    }
}

async fn read_response<T: DeserializeOwned>(response: Response) -> BackendResult<T> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()));
    }
    let body = response.json::<ErrorBody>().await.ok();
    Err(error_for_status(status, body))
}

/// Maps a non-success status onto the error taxonomy.
pub fn error_for_status(status: StatusCode, body: Option<ErrorBody>) -> BackendError {
    let message = body
        .as_ref()
        .map(|b| b.error.clone())
        .unwrap_or_else(|| status.to_string());
    match status {
        StatusCode::CONFLICT => match body.and_then(|b| b.holder) {
            Some(holder) => BackendError::Conflict { holder },
            None => BackendError::Rejected {
                status: status.as_u16(),
                message,
            },
        },
        StatusCode::LOCKED => BackendError::LockContention(message),
        StatusCode::SERVICE_UNAVAILABLE => BackendError::Unavailable(message),
        StatusCode::NOT_FOUND => BackendError::NotFound(message),
        _ => BackendError::Rejected {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl TranslationBackend for HttpBackend {
    fn user(&self) -> &UserRef {
        &self.user
    }

    async fn document(&self, id: &DocumentId) -> BackendResult<Document> {
        self.get(&format!("/documents/{}", id)).await
    }

    async fn versions(&self, id: &DocumentId) -> BackendResult<Vec<DocumentVersion>> {
        self.get(&format!("/documents/{}/versions", id)).await
    }

    async fn create_version(
        &self,
        id: &DocumentId,
        request: &CreateVersionRequest,
    ) -> BackendResult<DocumentVersion> {
        self.post(&format!("/documents/{}/versions", id), request).await
    }

    async fn acquire_lock(&self, id: &DocumentId) -> BackendResult<LockLease> {
        self.post(&format!("/translation-work/{}/lock", id), &serde_json::json!({}))
            .await
    }

    async fn lock_status(&self, id: &DocumentId) -> BackendResult<LockStatus> {
        self.get(&format!("/translation-work/{}/lock/status", id)).await
    }

    async fn save(&self, id: &DocumentId, request: &SaveRequest) -> BackendResult<Ack> {
        self.post(&format!("/translation-work/{}/save", id), request).await
    }

    async fn handover(&self, id: &DocumentId, request: &HandoverRequest) -> BackendResult<Ack> {
        self.post(&format!("/translation-work/{}/handover", id), request)
            .await
    }

    async fn complete(&self, id: &DocumentId, request: &SaveRequest) -> BackendResult<Ack> {
        self.post(&format!("/translation-work/{}/complete", id), request)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_with_holder() {
        let body = ErrorBody {
            error: "locked".into(),
            holder: Some(UserRef::new("y", "Yuki")),
        };
        assert_eq!(
            error_for_status(StatusCode::CONFLICT, Some(body)),
            BackendError::Conflict {
                holder: UserRef::new("y", "Yuki")
            }
        );
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            error_for_status(StatusCode::LOCKED, None),
            BackendError::LockContention(_)
        ));
        assert!(matches!(
            error_for_status(StatusCode::SERVICE_UNAVAILABLE, None),
            BackendError::Unavailable(_)
        ));
        assert!(matches!(
            error_for_status(StatusCode::NOT_FOUND, None),
            BackendError::NotFound(_)
        ));
        assert_eq!(
            error_for_status(StatusCode::BAD_REQUEST, None),
            BackendError::Rejected {
                status: 400,
                message: "400 Bad Request".into()
            }
        );
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let config = BackendConfig::default().with_api_url("http://host/api/");
        let backend = HttpBackend::new(&config).unwrap();
        assert_eq!(backend.url("/documents/1"), "http://host/api/documents/1");
    }
}
