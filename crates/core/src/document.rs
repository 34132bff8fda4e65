#[derive(Debug, Clone)]
pub struct StructuredPage {
    pub page_number: u32,
    pub tagged: String,
    pub markdown: String,
    pub image_png: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct PageRecord {
    pub document_id: String,
    pub page_number: u32,
    pub page_hash: String,
    pub tagged: String,
    pub markdown: String,
    pub image_png: Vec<u8>,
}

impl PageRecord {
    pub fn from_structured(document_id: &str, page: StructuredPage) -> Self {
        let page_hash = page_hash(&page.tagged, &page.markdown);
        Self {
            document_id: document_id.to_string(),
            page_number: page.page_number,
            page_hash,
            tagged: page.tagged,
            markdown: page.markdown,
            image_png: page.image_png,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AttributedChunk {
    pub text: String,
    pub page_index: usize,
    pub document_id: String,
    pub page_hash: String,
    pub page_number: u32,
}

pub fn page_hash(tagged: &str, markdown: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(tagged.as_bytes());
    hasher.update(markdown.as_bytes());
    hasher.finalize().to_hex().to_string()
}
