use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::concept::Concept;
use crate::construct::BoundingBox;
use crate::error::SkosError;
use crate::thesaurus::Thesaurus;

#[derive(Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

#[derive(Serialize)]
pub struct QueryResponse {
    pub status: String,
    pub elapsed_ms: f64,
    pub columns: Vec<String>,
    pub row_count: usize,
    pub rows: Vec<Vec<Option<String>>>,
}

#[derive(Deserialize)]
pub struct CodeParams {
    pub namespace: String,
    pub code: String,
}

#[derive(Deserialize)]
pub struct ConceptRequest {
    pub namespace: String,
    pub code: String,
    pub label: String,
    pub note: String,
    pub language: String,
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
}

#[derive(Deserialize)]
pub struct RenameRequest {
    pub namespace: String,
    pub old_code: String,
    pub new_code: String,
}

#[derive(Serialize)]
pub struct ThesaurusSummary {
    pub key: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub thesaurus_type: String,
    pub dname: String,
    pub fname: String,
    pub statements: usize,
}

impl ThesaurusSummary {
    fn of(thesaurus: &Thesaurus) -> Self {
        Self {
            key: thesaurus.key(),
            title: thesaurus.title().to_string(),
            date: thesaurus.date_string(),
            thesaurus_type: thesaurus.thesaurus_type().to_string(),
            dname: thesaurus.dname().to_string(),
            fname: thesaurus.fname().to_string(),
            statements: thesaurus.graph().len(),
        }
    }
}

// ------------- Errors -------------
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<SkosError> for ApiError {
    fn from(e: SkosError) -> Self {
        let status = match e {
            SkosError::UnknownThesaurus(_) => StatusCode::NOT_FOUND,
            SkosError::Parse { .. } | SkosError::MalformedInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(msg = %self.message, code = %self.status.as_u16(), "request failed");
        let body = json!({ "status": "error", "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

// Thesaurus work is synchronous and holds the thesaurus lock, so it runs on
// the blocking pool.
async fn with_thesaurus<T, F>(catalog: Arc<Catalog>, key: String, work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&mut Thesaurus) -> crate::error::Result<T> + Send + 'static,
{
    let thesaurus = catalog.get(&key)?;
    let result = tokio::task::spawn_blocking(move || {
        let mut guard = thesaurus.lock()?;
        work(&mut guard)
    })
    .await
    .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, format!("Join error: {e}")))?;
    Ok(result?)
}

// ------------- Routes -------------
pub fn router(catalog: Arc<Catalog>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);
    Router::new()
        .route("/v1/thesauri", get(list_thesauri))
        .route("/v1/thesauri/:key/query", post(run_query))
        .route("/v1/thesauri/:key/save", post(save_thesaurus))
        .route(
            "/v1/thesauri/:key/concepts",
            post(add_concept).put(update_concept).delete(remove_concept),
        )
        .route("/v1/thesauri/:key/concepts/free", get(free_code))
        .route("/v1/thesauri/:key/concepts/rename", post(rename_code))
        .route("/v1/thesauri/:key/concept", get(read_concept))
        .with_state(catalog)
        .layer(cors)
}

async fn list_thesauri(State(catalog): State<Arc<Catalog>>) -> Result<Json<Vec<ThesaurusSummary>>, ApiError> {
    let summaries = tokio::task::spawn_blocking(move || {
        let mut summaries = Vec::with_capacity(catalog.len());
        for key in catalog.keys() {
            let thesaurus = catalog.get(&key)?;
            let guard = thesaurus.lock()?;
            summaries.push(ThesaurusSummary::of(&guard));
        }
        Ok::<_, SkosError>(summaries)
    })
    .await
    .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, format!("Join error: {e}")))??;
    Ok(Json(summaries))
}

async fn run_query(
    State(catalog): State<Arc<Catalog>>,
    Path(key): Path<String>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let started = Instant::now();
    let table = with_thesaurus(catalog, key, move |thesaurus| {
        thesaurus.perform_request(&request.query)
    })
    .await?;
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    info!(ms = elapsed_ms, rows = table.row_count(), "query complete");
    let rows = table
        .rows()
        .iter()
        .map(|row| row.iter().map(|cell| cell.as_ref().map(|term| term.to_string())).collect())
        .collect();
    Ok(Json(QueryResponse {
        status: "ok".into(),
        elapsed_ms,
        columns: table.columns().to_vec(),
        row_count: table.row_count(),
        rows,
    }))
}

async fn save_thesaurus(
    State(catalog): State<Arc<Catalog>>,
    Path(key): Path<String>,
) -> Result<StatusCode, ApiError> {
    with_thesaurus(catalog, key, |thesaurus| thesaurus.save()).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn free_code(
    State(catalog): State<Arc<Catalog>>,
    Path(key): Path<String>,
    Query(params): Query<CodeParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let free = with_thesaurus(catalog, key, move |thesaurus| {
        Ok(thesaurus.is_free_code(&params.namespace, &params.code))
    })
    .await?;
    Ok(Json(json!({ "free": free })))
}

// The free code check and the insertion happen under the same lock, so two requests
// for one code cannot both succeed.
async fn add_concept(
    State(catalog): State<Arc<Catalog>>,
    Path(key): Path<String>,
    Json(request): Json<ConceptRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let added = with_thesaurus(catalog, key, move |thesaurus| {
        let ConceptRequest { namespace, code, label, note, language, bbox } = request;
        if !thesaurus.is_free_code(&namespace, &code) {
            return Ok(None);
        }
        let uri = match bbox {
            Some(bbox) => thesaurus.add_concept_with_bbox(&namespace, &code, &label, &note, &bbox, &language)?,
            None => thesaurus.add_concept(&namespace, &code, &label, &note, &language)?,
        };
        Ok(Some(uri.as_string()))
    })
    .await?;
    match added {
        Some(uri) => Ok((StatusCode::CREATED, Json(json!({ "uri": uri })))),
        None => Err(ApiError::new(StatusCode::CONFLICT, "code is already in use")),
    }
}

async fn update_concept(
    State(catalog): State<Arc<Catalog>>,
    Path(key): Path<String>,
    Json(request): Json<ConceptRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let uri = with_thesaurus(catalog, key, move |thesaurus| {
        let ConceptRequest { namespace, code, label, note, language, bbox } = request;
        match bbox {
            Some(bbox) => {
                thesaurus.update_label_note_and_bbox(&namespace, &code, &label, &note, &bbox, &language)
            }
            None => thesaurus.update_label_and_note(&namespace, &code, &label, &note, &language),
        }
    })
    .await?;
    Ok(Json(json!({ "uri": uri.as_string() })))
}

async fn remove_concept(
    State(catalog): State<Arc<Catalog>>,
    Path(key): Path<String>,
    Query(params): Query<CodeParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let removed = with_thesaurus(catalog, key, move |thesaurus| {
        thesaurus.remove_concept_code(&params.namespace, &params.code)
    })
    .await?;
    Ok(Json(json!({ "removed": removed })))
}

async fn rename_code(
    State(catalog): State<Arc<Catalog>>,
    Path(key): Path<String>,
    Json(request): Json<RenameRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let renamed = with_thesaurus(catalog, key, move |thesaurus| {
        thesaurus.rename_code(&request.namespace, &request.old_code, &request.new_code)
    })
    .await?;
    Ok(Json(json!({ "renamed": renamed })))
}

async fn read_concept(
    State(catalog): State<Arc<Catalog>>,
    Path(key): Path<String>,
    Query(params): Query<CodeParams>,
) -> Result<Json<Concept>, ApiError> {
    let concept = with_thesaurus(catalog, key, move |thesaurus| {
        thesaurus.concept(&params.namespace, &params.code)
    })
    .await?;
    concept
        .map(Json)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "no such concept"))
}
