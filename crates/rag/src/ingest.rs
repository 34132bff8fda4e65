use anyhow::Result;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::embedding::EmbeddingClient;
use crate::qdrant::{ChunkPayload, PointInsert, QdrantStore};
use pdfrag_core::{
    assemble_pages, attribute_chunks, reconcile_page, split_text, AttributedChunk, Captioner,
    FigureRecord, PageRecord, ReconcileInput, SplitConfig, StructuredPage,
};
use pdfrag_llm::LlmClient;

pub struct LlmCaptioner<'a> {
    client: &'a LlmClient,
}

impl<'a> LlmCaptioner<'a> {
    pub fn new(client: &'a LlmClient) -> Self {
        Self { client }
    }
}

impl Captioner for LlmCaptioner<'_> {
    fn describe(&self, image_png: &[u8]) -> anyhow::Result<String> {
        self.client.describe_image_blocking(image_png)
    }
}

#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub pages: Vec<PageRecord>,
    pub figures: Vec<FigureRecord>,
}

pub fn reconcile_document(
    document_id: &str,
    mut structured: Vec<StructuredPage>,
    captioner: &dyn Captioner,
) -> PreparedDocument {
    structured.sort_by_key(|page| page.page_number);
    let mut pages = Vec::with_capacity(structured.len());
    let mut figures = Vec::new();
    for page in structured {
        let mut record = PageRecord::from_structured(document_id, page);
        let reconciled = reconcile_page(
            &ReconcileInput {
                tagged: &record.tagged,
                markdown: &record.markdown,
                page_image: &record.image_png,
                page_number: record.page_number,
            },
            captioner,
        );
        match reconciled {
            Ok(outcome) => {
                record.tagged = outcome.tagged;
                record.markdown = outcome.markdown;
                figures.extend(outcome.figures);
            }
            Err(err) => {
                warn!(
                    page = record.page_number,
                    error = %err,
                    "figure reconciliation failed, keeping page text unmodified"
                );
            }
        }
        pages.push(record);
    }
    PreparedDocument { pages, figures }
}

pub fn collect_chunks(pages: &[PageRecord], split: &SplitConfig) -> Vec<AttributedChunk> {
    let (full_text, offsets) = assemble_pages(pages);
    let chunks = split_text(&full_text, split);
    attribute_chunks(chunks, &full_text, &offsets, pages)
}

pub fn embed_chunks(embeddings: &EmbeddingClient, chunks: &[AttributedChunk]) -> Vec<PointInsert> {
    let mut points = Vec::with_capacity(chunks.len());
    for (chunk_index, chunk) in chunks.iter().enumerate() {
        let vector = match embeddings.embed(&chunk.text) {
            Ok(vector) => vector,
            Err(err) => {
                warn!(
                    chunk_index,
                    page_number = chunk.page_number,
                    error = %err,
                    "embedding failed, skipping chunk"
                );
                continue;
            }
        };
        points.push(PointInsert {
            id: point_id(&chunk.document_id, chunk_index, &chunk.text),
            vector,
            payload: ChunkPayload {
                document_id: chunk.document_id.clone(),
                page_hash: chunk.page_hash.clone(),
                page_number: chunk.page_number,
                content: chunk.text.clone(),
            },
        });
    }
    points
}

pub fn embed_and_store(
    store: &QdrantStore,
    embeddings: &EmbeddingClient,
    collection: &str,
    chunks: &[AttributedChunk],
) -> Result<usize> {
    store.ensure_collection(collection, embeddings.dimensions())?;
    let points = embed_chunks(embeddings, chunks);
    if points.is_empty() {
        warn!(collection, "no chunks survived embedding, nothing to upsert");
        return Ok(0);
    }
    let stored = store.upsert(collection, &points)?;
    info!(collection, stored, "embedded and stored chunks");
    Ok(stored)
}

pub fn point_id(document_id: &str, chunk_index: usize, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document_id.as_bytes());
    hasher.update(chunk_index.to_be_bytes());
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let hex = hex::encode(&digest[..16]);
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct StubCaptioner;

    impl Captioner for StubCaptioner {
        fn describe(&self, _image_png: &[u8]) -> anyhow::Result<String> {
            Ok("stub description".to_string())
        }
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let buffer = image::RgbImage::from_pixel(width, height, image::Rgb([200, 200, 200]));
        let mut bytes = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(buffer)
            .write_to(&mut bytes, image::ImageFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    fn plain_page(page_number: u32, body: &str) -> StructuredPage {
        StructuredPage {
            page_number,
            tagged: format!("<text>{body}</text>"),
            markdown: body.to_string(),
            image_png: png(50, 50),
        }
    }

    #[test]
    fn pages_are_processed_in_ascending_page_order() {
        let structured = vec![
            plain_page(3, "third"),
            plain_page(1, "first"),
            plain_page(2, "second"),
        ];
        let prepared = reconcile_document("doc", structured, &StubCaptioner);
        let numbers: Vec<u32> = prepared.pages.iter().map(|p| p.page_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn reconciled_markdown_flows_into_chunks() {
        let structured = vec![StructuredPage {
            page_number: 1,
            tagged: "<figure><loc_10><loc_10><loc_90><loc_90>plot</figure>".to_string(),
            markdown: "intro text <!-- image --> closing text".to_string(),
            image_png: png(100, 100),
        }];
        let prepared = reconcile_document("doc", structured, &StubCaptioner);
        assert_eq!(prepared.figures.len(), 1);
        assert_eq!(prepared.figures[0].unique_id, "pg_1_fig_1");

        let chunks = collect_chunks(
            &prepared.pages,
            &SplitConfig {
                chunk_size: 200,
                chunk_overlap: 20,
            },
        );
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.contains("<!-- figure: pg_1_fig_1 -->"));
        assert_eq!(chunks[0].page_number, 1);
    }

    #[test]
    fn chunks_carry_their_page_metadata_into_points() {
        let structured = vec![
            plain_page(1, &"alpha page one. ".repeat(8)),
            plain_page(2, &"beta page two. ".repeat(8)),
        ];
        let prepared = reconcile_document("doc-7", structured, &StubCaptioner);
        let chunks = collect_chunks(
            &prepared.pages,
            &SplitConfig {
                chunk_size: 64,
                chunk_overlap: 8,
            },
        );
        assert!(chunks.len() > 2);

        let embeddings = EmbeddingClient::hash();
        let points = embed_chunks(&embeddings, &chunks);
        assert_eq!(points.len(), chunks.len());
        for (point, chunk) in points.iter().zip(chunks.iter()) {
            assert_eq!(point.payload.content, chunk.text);
            assert_eq!(point.payload.page_number, chunk.page_number);
            assert_eq!(point.payload.document_id, "doc-7");
            assert_eq!(point.vector.len(), embeddings.dimensions());
        }
    }

    #[test]
    fn point_ids_are_deterministic_uuids() {
        let a = point_id("doc", 0, "same text");
        let b = point_id("doc", 0, "same text");
        let c = point_id("doc", 1, "same text");
        assert_eq!(a, b);
        assert_ne!(a, c);
        let groups: Vec<&str> = a.split('-').collect();
        assert_eq!(
            groups.iter().map(|g| g.len()).collect::<Vec<_>>(),
            vec![8, 4, 4, 4, 12]
        );
    }

    #[test]
    fn empty_chunk_list_produces_no_points() {
        let embeddings = EmbeddingClient::hash();
        assert!(embed_chunks(&embeddings, &[]).is_empty());
    }
}
