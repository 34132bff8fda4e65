mod config;
mod db;
mod structurer;
mod worker;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Multipart, Path as AxumPath, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{routing::get, routing::post, Json, Router};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task;
use tracing::{error, info};

use config::ServiceConfig;
use db::{JobRecord, JobStatus, ServiceDb};
use structurer::{HttpStructurer, Structurer};

use pdfrag_llm::LlmClient;
use pdfrag_rag::{answer_query, EmbeddingClient, QdrantStore, QueryRequest};

pub struct AppState {
    pub config: ServiceConfig,
    pub db: ServiceDb,
    pub store: QdrantStore,
    pub embeddings: EmbeddingClient,
    pub llm: LlmClient,
    pub caption_client: LlmClient,
    pub structurer: Box<dyn Structurer>,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt::init();
    let config = ServiceConfig::from_env()?;
    let db = ServiceDb::open(&config.db_path)?;
    let store = QdrantStore::new(&config.qdrant_url, config.qdrant_api_key.clone())?;
    let embeddings = EmbeddingClient::from_env().unwrap_or_else(|_| EmbeddingClient::hash());
    let llm = LlmClient::new(config.llm_provider, config.llm_model.clone())?;
    let caption_client = LlmClient::new(config.llm_provider, config.caption_model.clone())?;
    let structurer = Box::new(HttpStructurer::new(&config.structurer_url)?);
    let addr: SocketAddr = config.bind_addr.parse()?;
    let state = Arc::new(AppState {
        config,
        db,
        store,
        embeddings,
        llm,
        caption_client,
        structurer,
    });
    let app = Router::new()
        .route("/api/ingest", post(handle_ingest))
        .route("/api/jobs", get(handle_list_jobs))
        .route("/api/jobs/:job_id", get(handle_job_status))
        .route("/api/documents/:document_id/pages", get(handle_document_pages))
        .route("/api/query", post(handle_query))
        .with_state(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct IngestParams {
    kb_name: String,
}

#[derive(Debug, Serialize)]
struct IngestResponse {
    job_id: String,
    status: String,
    kb_name: String,
}

#[derive(Debug, Serialize)]
struct JobResponse {
    job_id: String,
    status: String,
    kb_name: String,
    created_at: String,
}

impl From<JobRecord> for JobResponse {
    fn from(record: JobRecord) -> Self {
        Self {
            job_id: record.job_id,
            status: record.status.as_str().to_string(),
            kb_name: record.kb_name,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct JobListResponse {
    jobs: Vec<JobResponse>,
}

#[derive(Debug, Deserialize)]
struct RetrieveRequest {
    query: String,
    collection_name: String,
}

#[derive(Debug, Serialize)]
struct RetrieveResponse {
    response: String,
}

async fn handle_ingest(
    State(state): State<Arc<AppState>>,
    Query(params): Query<IngestParams>,
    mut multipart: Multipart,
) -> Result<Json<IngestResponse>, AppError> {
    let pdf = extract_pdf(&mut multipart).await?;
    let job_id = new_job_id();
    let kb_name = params.kb_name;
    {
        let state = state.clone();
        let job_id = job_id.clone();
        let kb_name = kb_name.clone();
        task::spawn_blocking(move || state.db.add_job(&job_id, &kb_name))
            .await
            .map_err(AppError::internal)?
            .map_err(AppError::internal)?;
    }
    {
        let state = state.clone();
        let job_id = job_id.clone();
        let kb_name = kb_name.clone();
        let _ = task::spawn_blocking(move || worker::process_ingestion(state, job_id, kb_name, pdf));
    }
    Ok(Json(IngestResponse {
        job_id,
        status: JobStatus::InQueue.as_str().to_string(),
        kb_name,
    }))
}

async fn handle_job_status(
    State(state): State<Arc<AppState>>,
    AxumPath(job_id): AxumPath<String>,
) -> Result<Json<JobResponse>, AppError> {
    let lookup_id = job_id.clone();
    let record = task::spawn_blocking(move || state.db.get_job(&lookup_id))
        .await
        .map_err(AppError::internal)?
        .map_err(AppError::internal)?;
    match record {
        Some(job) => Ok(Json(job.into())),
        None => Err(AppError::not_found(format!("job {job_id} not found"))),
    }
}

async fn handle_list_jobs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JobListResponse>, AppError> {
    let jobs = task::spawn_blocking(move || state.db.list_jobs())
        .await
        .map_err(AppError::internal)?
        .map_err(AppError::internal)?;
    Ok(Json(JobListResponse {
        jobs: jobs.into_iter().map(JobResponse::from).collect(),
    }))
}

#[derive(Debug, Serialize)]
struct DocumentPage {
    page_number: u32,
    tagged: String,
    markdown: String,
}

#[derive(Debug, Serialize)]
struct DocumentPagesResponse {
    document_id: String,
    pages: Vec<DocumentPage>,
}

async fn handle_document_pages(
    State(state): State<Arc<AppState>>,
    AxumPath(document_id): AxumPath<String>,
) -> Result<Json<DocumentPagesResponse>, AppError> {
    let lookup_id = document_id.clone();
    let pages = task::spawn_blocking(move || state.db.pages_for_document(&lookup_id))
        .await
        .map_err(AppError::internal)?
        .map_err(AppError::internal)?;
    if pages.is_empty() {
        return Err(AppError::not_found(format!(
            "no pages stored for document {document_id}"
        )));
    }
    Ok(Json(DocumentPagesResponse {
        document_id,
        pages: pages
            .into_iter()
            .map(|(page_number, tagged, markdown)| DocumentPage {
                page_number,
                tagged,
                markdown,
            })
            .collect(),
    }))
}

async fn handle_query(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RetrieveRequest>,
) -> Result<Json<RetrieveResponse>, AppError> {
    let response = task::spawn_blocking(move || {
        let request = QueryRequest {
            collection: body.collection_name,
            query: body.query,
            top_k: state.config.top_k,
        };
        answer_query(&state.store, &state.embeddings, &state.llm, &request)
    })
    .await
    .map_err(AppError::internal)?;
    Ok(Json(RetrieveResponse { response }))
}

async fn extract_pdf(multipart: &mut Multipart) -> Result<Vec<u8>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(AppError::bad_request)?
    {
        if field.name() == Some("file") {
            if field.content_type() != Some("application/pdf") {
                return Err(AppError::bad_request("Only PDF files are supported."));
            }
            let data = field.bytes().await.map_err(AppError::bad_request)?;
            return Ok(data.to_vec());
        }
    }
    Err(AppError::bad_request("missing file"))
}

fn new_job_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[derive(Debug, Error)]
enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn bad_request<E: ToString>(msg: E) -> Self {
        Self::BadRequest(msg.to_string())
    }

    fn not_found<E: ToString>(msg: E) -> Self {
        Self::NotFound(msg.to_string())
    }

    fn internal<E: Into<anyhow::Error>>(err: E) -> Self {
        Self::Internal(err.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg).into_response(),
            AppError::Internal(err) => {
                error!("internal_error" = %err);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
            }
        }
    }
}
