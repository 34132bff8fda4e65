use tracing::warn;

use crate::assemble::PageOffset;
use crate::document::{AttributedChunk, PageRecord};

pub fn attribute_chunk(chunk: &str, full_text: &str, offsets: &[PageOffset]) -> Option<usize> {
    let chunk_start = full_text.find(chunk)?;
    offsets
        .iter()
        .rev()
        .find(|entry| entry.offset <= chunk_start)
        .map(|entry| entry.page_index)
}

pub fn attribute_chunks(
    chunks: Vec<String>,
    full_text: &str,
    offsets: &[PageOffset],
    pages: &[PageRecord],
) -> Vec<AttributedChunk> {
    let mut attributed = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        match attribute_chunk(&chunk, full_text, offsets) {
            Some(page_index) => {
                let page = &pages[page_index];
                attributed.push(AttributedChunk {
                    text: chunk,
                    page_index,
                    document_id: page.document_id.clone(),
                    page_hash: page.page_hash.clone(),
                    page_number: page.page_number,
                });
            }
            None => {
                warn!(
                    chunk_len = chunk.len(),
                    "dropping chunk without a page attribution"
                );
            }
        }
    }
    attributed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::assemble_pages;
    use crate::split::{split_text, SplitConfig};

    fn page(page_number: u32, markdown: &str) -> PageRecord {
        PageRecord {
            document_id: "doc".to_string(),
            page_number,
            page_hash: format!("hash-{page_number}"),
            tagged: String::new(),
            markdown: markdown.to_string(),
            image_png: Vec::new(),
        }
    }

    #[test]
    fn chunk_is_attributed_to_the_page_containing_its_start() {
        let pages = vec![
            page(1, "alpha content on the first page"),
            page(2, "beta content on the second page"),
        ];
        let (full_text, offsets) = assemble_pages(&pages);

        assert_eq!(attribute_chunk("alpha content", &full_text, &offsets), Some(0));
        assert_eq!(attribute_chunk("beta content", &full_text, &offsets), Some(1));
    }

    #[test]
    fn chunk_spanning_a_boundary_belongs_to_its_start_page() {
        let pages = vec![page(1, "end of page one"), page(2, "start of page two")];
        let (full_text, offsets) = assemble_pages(&pages);
        let spanning = "page one\n\nstart of";
        assert!(full_text.contains(spanning));
        assert_eq!(attribute_chunk(spanning, &full_text, &offsets), Some(0));
    }

    #[test]
    fn repeated_text_uses_the_first_occurrence() {
        let pages = vec![page(1, "shared header text"), page(2, "shared header text")];
        let (full_text, offsets) = assemble_pages(&pages);
        assert_eq!(
            attribute_chunk("shared header text", &full_text, &offsets),
            Some(0)
        );
    }

    #[test]
    fn unlocatable_chunk_is_dropped_not_fatal() {
        let pages = vec![page(1, "present text")];
        let (full_text, offsets) = assemble_pages(&pages);
        assert_eq!(attribute_chunk("absent text", &full_text, &offsets), None);

        let attributed = attribute_chunks(
            vec!["present text".to_string(), "absent text".to_string()],
            &full_text,
            &offsets,
            &pages,
        );
        assert_eq!(attributed.len(), 1);
        assert_eq!(attributed[0].page_number, 1);
        assert_eq!(attributed[0].page_hash, "hash-1");
    }

    #[test]
    fn attribution_is_deterministic_over_a_real_split() {
        let pages: Vec<PageRecord> = (1..=4)
            .map(|n| {
                page(
                    n,
                    &format!("page {n} body with enough words to split into pieces."),
                )
            })
            .collect();
        let (full_text, offsets) = assemble_pages(&pages);
        let chunks = split_text(
            &full_text,
            &SplitConfig {
                chunk_size: 32,
                chunk_overlap: 8,
            },
        );
        let first: Vec<Option<usize>> = chunks
            .iter()
            .map(|chunk| attribute_chunk(chunk, &full_text, &offsets))
            .collect();
        let second: Vec<Option<usize>> = chunks
            .iter()
            .map(|chunk| attribute_chunk(chunk, &full_text, &offsets))
            .collect();
        assert_eq!(first, second);
        assert!(first.iter().all(|page_index| page_index.is_some()));
    }
}
