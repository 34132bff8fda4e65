use crate::document::PageRecord;

pub const PAGE_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOffset {
    pub page_index: usize,
    pub offset: usize,
}

pub fn assemble_pages(pages: &[PageRecord]) -> (String, Vec<PageOffset>) {
    let mut full_text = String::new();
    let mut offsets = Vec::with_capacity(pages.len());
    for (page_index, page) in pages.iter().enumerate() {
        offsets.push(PageOffset {
            page_index,
            offset: full_text.len(),
        });
        full_text.push_str(&page.markdown);
        full_text.push_str(PAGE_SEPARATOR);
    }
    (full_text, offsets)
}
