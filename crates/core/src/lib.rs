mod assemble;
mod attribute;
mod document;
mod error;
mod figures;
mod pairing;
mod split;
mod textedit;

pub use assemble::{assemble_pages, PageOffset, PAGE_SEPARATOR};
pub use attribute::{attribute_chunk, attribute_chunks};
pub use document::{page_hash, AttributedChunk, PageRecord, StructuredPage};
pub use error::{CoreError, Result};
pub use figures::{
    figure_id, pixel_box, reconcile_page, BoundingBox, Captioner, FigureRecord, PixelBox,
    ReconcileInput, ReconciledPage,
};
pub use pairing::{zip_strict, PairOutcome};
pub use split::{split_text, split_text_with_separators, SplitConfig, SEPARATORS};
pub use textedit::{apply_edits, SpanEdit};
