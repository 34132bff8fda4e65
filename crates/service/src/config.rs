use anyhow::{anyhow, Result};
use std::env;
use std::path::PathBuf;

use pdfrag_core::SplitConfig;
use pdfrag_llm::LlmProvider;
use pdfrag_rag::DEFAULT_TOP_K;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: String,
    pub db_path: String,
    pub figures_dir: PathBuf,
    pub qdrant_url: String,
    pub qdrant_api_key: Option<String>,
    pub structurer_url: String,
    pub split: SplitConfig,
    pub top_k: usize,
    pub llm_provider: LlmProvider,
    pub llm_model: String,
    pub caption_model: String,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        let provider_name = env::var("LLM_PROVIDER").unwrap_or_else(|_| "openai".to_string());
        let llm_provider = LlmProvider::from_str(&provider_name)
            .ok_or_else(|| anyhow!(format!("unknown provider {provider_name}")))?;
        let llm_model =
            env::var("LLM_MODEL").unwrap_or_else(|_| default_model(llm_provider).to_string());
        let caption_model =
            env::var("CAPTION_MODEL").unwrap_or_else(|_| default_model(llm_provider).to_string());
        let chunk_size = env::var("CHUNK_SIZE")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(1200);
        let chunk_overlap = env::var("CHUNK_OVERLAP")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(200);
        Ok(Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            db_path: env::var("PDFRAG_DB").unwrap_or_else(|_| "pdfrag.sqlite".to_string()),
            figures_dir: env::var("FIGURES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("storage/figures")),
            qdrant_url: env::var("QDRANT_URL")
                .unwrap_or_else(|_| "http://localhost:6333".to_string()),
            qdrant_api_key: env::var("QDRANT_API_KEY").ok(),
            structurer_url: env::var("STRUCTURER_URL")
                .unwrap_or_else(|_| "http://localhost:9000/structure".to_string()),
            split: SplitConfig {
                chunk_size,
                chunk_overlap,
            },
            top_k: env::var("RAG_TOP_K")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(DEFAULT_TOP_K),
            llm_provider,
            llm_model,
            caption_model,
        })
    }
}

fn default_model(provider: LlmProvider) -> &'static str {
    match provider {
        LlmProvider::OpenAi => "gpt-4o-mini",
        LlmProvider::Anthropic => "claude-3-5-sonnet",
        LlmProvider::Local => "local",
    }
}
