/// REST endpoints for translation work
/// Documents, versions and the lease protocol over the in-memory store
use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use collaboration::{BackendError, InMemoryStore, USER_ID_HEADER, USER_NAME_HEADER};
use document::{
    Ack, CreateVersionRequest, Document, DocumentId, DocumentVersion, ErrorBody, HandoverRequest,
    LockLease, LockStatus, SaveRequest, UserRef,
};
use std::sync::Arc;
use tracing::{debug, warn};

pub type AppState = Arc<InMemoryStore>;

/// Backend failure rendered as status code plus [`ErrorBody`].
pub struct ApiError(BackendError);

impl From<BackendError> for ApiError {
    fn from(err: BackendError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            warn!("request failed: {}", self.0);
        } else {
            debug!("request rejected: {}", self.0);
        }
        let holder = match &self.0 {
            BackendError::Conflict { holder } => Some(holder.clone()),
            _ => None,
        };
        let body = ErrorBody {
            error: self.0.to_string(),
            holder,
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Calling worker, taken from the identity headers.
pub struct Caller(pub UserRef);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let id = header(USER_ID_HEADER).ok_or_else(|| BackendError::Rejected {
            status: 401,
            message: format!("missing {} header", USER_ID_HEADER),
        })?;
        let name = header(USER_NAME_HEADER).unwrap_or_else(|| id.clone());
        Ok(Caller(UserRef::new(id, name)))
    }
}

pub fn router(store: AppState) -> Router {
    Router::new()
        .route("/api/documents", get(list_documents))
        .route("/api/documents/:id", get(get_document))
        .route(
            "/api/documents/:id/versions",
            get(list_versions).post(create_version),
        )
        .route("/api/translation-work/:id/lock", post(acquire_lock))
        .route("/api/translation-work/:id/lock/status", get(lock_status))
        .route("/api/translation-work/:id/save", post(save))
        .route("/api/translation-work/:id/handover", post(handover))
        .route("/api/translation-work/:id/complete", post(complete))
        .with_state(store)
}

/// GET /api/documents
pub async fn list_documents(State(store): State<AppState>) -> ApiResult<Vec<Document>> {
    let documents = store
        .document_ids()
        .iter()
        .map(|id| store.document(id))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(documents))
}

/// GET /api/documents/:id
pub async fn get_document(
    State(store): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Document> {
    Ok(Json(store.document(&DocumentId::from(id))?))
}

/// GET /api/documents/:id/versions
pub async fn list_versions(
    State(store): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<DocumentVersion>> {
    Ok(Json(store.versions(&DocumentId::from(id))?))
}

/// POST /api/documents/:id/versions
pub async fn create_version(
    State(store): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<CreateVersionRequest>,
) -> ApiResult<DocumentVersion> {
    Ok(Json(store.create_version(&DocumentId::from(id), &request)?))
}

/// POST /api/translation-work/:id/lock
pub async fn acquire_lock(
    State(store): State<AppState>,
    Path(id): Path<String>,
    Caller(user): Caller,
) -> ApiResult<LockLease> {
    Ok(Json(store.acquire_lock(&DocumentId::from(id), &user)?))
}

/// GET /api/translation-work/:id/lock/status
pub async fn lock_status(
    State(store): State<AppState>,
    Path(id): Path<String>,
    Caller(user): Caller,
) -> ApiResult<LockStatus> {
    Ok(Json(store.lock_status(&DocumentId::from(id), &user)?))
}

/// POST /api/translation-work/:id/save
pub async fn save(
    State(store): State<AppState>,
    Path(id): Path<String>,
    Caller(user): Caller,
    Json(request): Json<SaveRequest>,
) -> ApiResult<Ack> {
    Ok(Json(store.save(&DocumentId::from(id), &user, &request)?))
}

/// POST /api/translation-work/:id/handover
pub async fn handover(
    State(store): State<AppState>,
    Path(id): Path<String>,
    Caller(user): Caller,
    Json(request): Json<HandoverRequest>,
) -> ApiResult<Ack> {
    Ok(Json(store.handover(&DocumentId::from(id), &user, &request)?))
}

/// POST /api/translation-work/:id/complete
pub async fn complete(
    State(store): State<AppState>,
    Path(id): Path<String>,
    Caller(user): Caller,
    Json(request): Json<SaveRequest>,
) -> ApiResult<Ack> {
    Ok(Json(store.complete(&DocumentId::from(id), &user, &request)?))
}
