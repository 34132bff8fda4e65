use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};

use pdfrag_rag::{collect_chunks, embed_and_store, reconcile_document, LlmCaptioner};

use crate::db::JobStatus;
use crate::AppState;

pub fn process_ingestion(state: Arc<AppState>, job_id: String, kb_name: String, pdf: Vec<u8>) {
    info!(job_id = %job_id, kb_name = %kb_name, "starting ingestion");
    if let Err(err) = run(&state, &job_id, &kb_name, &pdf) {
        error!(job_id = %job_id, "ingestion failed: {err:#}");
        if let Err(db_err) = state.db.update_job_status(&job_id, JobStatus::Failed) {
            error!(job_id = %job_id, error = %db_err, "failed to record job failure");
        }
    }
}

fn run(state: &AppState, job_id: &str, kb_name: &str, pdf: &[u8]) -> Result<()> {
    state.db.update_job_status(job_id, JobStatus::Processing)?;

    let structured = state.structurer.structure(pdf)?;
    info!(job_id = %job_id, pages = structured.len(), "document structured");

    let captioner = LlmCaptioner::new(&state.caption_client);
    let prepared = reconcile_document(job_id, structured, &captioner);

    fs::create_dir_all(&state.config.figures_dir)?;
    for figure in &prepared.figures {
        let path = state
            .config
            .figures_dir
            .join(format!("{}.png", figure.unique_id));
        fs::write(&path, &figure.image_png)
            .with_context(|| format!("failed to write figure {}", figure.unique_id))?;
    }
    state.db.add_pages(&prepared.pages)?;

    let chunks = collect_chunks(&prepared.pages, &state.config.split);
    embed_and_store(&state.store, &state.embeddings, kb_name, &chunks)?;

    state.db.update_job_status(job_id, JobStatus::Completed)?;
    info!(
        job_id = %job_id,
        pages = prepared.pages.len(),
        figures = prepared.figures.len(),
        chunks = chunks.len(),
        "ingestion completed"
    );
    Ok(())
}
