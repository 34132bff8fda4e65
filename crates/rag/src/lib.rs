pub mod embedding;
pub mod ingest;
pub mod pipeline;
pub mod prompt;
pub mod qdrant;

pub use embedding::{EmbeddingBackend, EmbeddingClient, HashEmbedder, HashEmbedderConfig};
pub use ingest::{
    collect_chunks, embed_and_store, embed_chunks, point_id, reconcile_document, LlmCaptioner,
    PreparedDocument,
};
pub use pipeline::{answer_query, QueryRequest};
pub use prompt::{build_context, system_prompt, user_prompt, CONTEXT_SEPARATOR, DEFAULT_TOP_K};
pub use qdrant::{ChunkPayload, PointInsert, QdrantStore, ScoredPoint};

pub use pdfrag_llm::{LlmClient, LlmProvider, LlmRequest, LlmResponse};
