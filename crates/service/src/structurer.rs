use anyhow::{anyhow, Context, Result};
use base64::Engine;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::env;
use std::time::Duration;

use pdfrag_core::StructuredPage;

const DEFAULT_TIMEOUT_SECS: u64 = 300;

pub trait Structurer: Send + Sync {
    fn structure(&self, pdf: &[u8]) -> Result<Vec<StructuredPage>>;
}

pub struct HttpStructurer {
    http: Client,
    endpoint: String,
}

impl HttpStructurer {
    pub fn new(endpoint: &str) -> Result<Self> {
        let timeout = env::var("STRUCTURER_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .context("failed to build structurer http client")?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
        })
    }
}

impl Structurer for HttpStructurer {
    fn structure(&self, pdf: &[u8]) -> Result<Vec<StructuredPage>> {
        let response = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/pdf")
            .body(pdf.to_vec())
            .send()
            .context("structurer request failed")?;
        if !response.status().is_success() {
            return Err(anyhow!("structurer returned {}", response.status()));
        }
        let parsed: StructureResponse = response
            .json()
            .context("failed to decode structurer response")?;
        decode_pages(parsed)
    }
}

#[derive(Deserialize)]
struct StructureResponse {
    pages: Vec<StructuredPageWire>,
}

#[derive(Deserialize)]
struct StructuredPageWire {
    page_number: u32,
    tagged: String,
    markdown: String,
    image_base64: String,
}

fn decode_pages(parsed: StructureResponse) -> Result<Vec<StructuredPage>> {
    let engine = base64::engine::general_purpose::STANDARD;
    let mut pages = Vec::with_capacity(parsed.pages.len());
    for page in parsed.pages {
        let image_png = engine
            .decode(&page.image_base64)
            .with_context(|| format!("invalid image encoding on page {}", page.page_number))?;
        pages.push(StructuredPage {
            page_number: page.page_number,
            tagged: page.tagged,
            markdown: page.markdown,
            image_png,
        });
    }
    Ok(pages)
}
