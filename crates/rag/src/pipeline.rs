use anyhow::Result;
use tracing::error;

use crate::embedding::EmbeddingClient;
use crate::prompt::{build_context, system_prompt, user_prompt};
use crate::qdrant::QdrantStore;
use pdfrag_llm::{LlmClient, LlmRequest};

const ANSWER_TEMPERATURE: f32 = 0.1;

#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub collection: String,
    pub query: String,
    pub top_k: usize,
}

pub fn answer_query(
    store: &QdrantStore,
    embeddings: &EmbeddingClient,
    llm: &LlmClient,
    request: &QueryRequest,
) -> String {
    match run_query(store, embeddings, llm, request) {
        Ok(answer) => answer,
        Err(err) => {
            error!(
                collection = %request.collection,
                error = %err,
                "retrieval failed"
            );
            let exists = store.collection_exists(&request.collection).ok();
            compose_failure_answer(&request.collection, exists)
        }
    }
}

fn run_query(
    store: &QdrantStore,
    embeddings: &EmbeddingClient,
    llm: &LlmClient,
    request: &QueryRequest,
) -> Result<String> {
    let query_embedding = embeddings.embed(&request.query)?;
    let hits = store.search(&request.collection, &query_embedding, request.top_k)?;
    let context = build_context(&hits);
    let response = llm.chat_blocking(&LlmRequest {
        system: Some(system_prompt(&context)),
        user: user_prompt(&request.query),
        temperature: Some(ANSWER_TEMPERATURE),
    })?;
    Ok(response.content)
}

fn compose_failure_answer(collection: &str, exists: Option<bool>) -> String {
    match exists {
        Some(false) => format!("Error: Collection '{collection}' not found."),
        _ => "An error occurred during retrieval.".to_string(),
    }
}
