use std::io::Cursor;

use image::ImageFormat;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

use crate::error::Result;
use crate::pairing::{zip_strict, PairOutcome};
use crate::textedit::{apply_edits, SpanEdit};

static FIGURE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<figure>.*?</figure>").expect("figure regex"));
static IMAGE_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<!-- image -->").expect("placeholder regex"));
static LOC_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<loc_(\d+)>").expect("loc regex"));

pub trait Captioner {
    fn describe(&self, image_png: &[u8]) -> anyhow::Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

#[derive(Debug, Clone)]
pub struct FigureRecord {
    pub page_number: u32,
    pub figure_index: usize,
    pub unique_id: String,
    pub bbox: BoundingBox,
    pub description: String,
    pub image_png: Vec<u8>,
}

pub struct ReconcileInput<'a> {
    pub tagged: &'a str,
    pub markdown: &'a str,
    pub page_image: &'a [u8],
    pub page_number: u32,
}

#[derive(Debug, Clone)]
pub struct ReconciledPage {
    pub tagged: String,
    pub markdown: String,
    pub figures: Vec<FigureRecord>,
}

pub fn figure_id(page_number: u32, figure_index: usize) -> String {
    format!("pg_{page_number}_fig_{figure_index}")
}

pub fn pixel_box(bbox: &BoundingBox, width: u32, height: u32) -> PixelBox {
    let left = (bbox.left * width as f64).round() as u32;
    let right = ((bbox.right * width as f64).round() as u32).min(width);
    let top = ((1.0 - bbox.top) * height as f64).round() as u32;
    let bottom = (((1.0 - bbox.bottom) * height as f64).round() as u32).min(height);
    PixelBox {
        left,
        top,
        right,
        bottom,
    }
}

pub fn reconcile_page(
    input: &ReconcileInput<'_>,
    captioner: &dyn Captioner,
) -> Result<ReconciledPage> {
    let blocks: Vec<_> = FIGURE_BLOCK.find_iter(input.tagged).collect();
    let placeholders: Vec<_> = IMAGE_PLACEHOLDER.find_iter(input.markdown).collect();

    let pairs = match zip_strict(blocks, placeholders) {
        PairOutcome::Paired(pairs) => pairs,
        PairOutcome::CountMismatch { left, right } => {
            warn!(
                page = input.page_number,
                tagged_blocks = left,
                markdown_placeholders = right,
                "figure count mismatch, leaving page untouched"
            );
            return Ok(unchanged(input));
        }
    };
    if pairs.is_empty() {
        return Ok(unchanged(input));
    }
    info!(
        page = input.page_number,
        figures = pairs.len(),
        "reconciling page figures"
    );

    let page_image = image::load_from_memory(input.page_image)?;
    let (width, height) = (page_image.width(), page_image.height());

    let mut figures = Vec::new();
    let mut tagged_edits = Vec::new();
    let mut markdown_edits = Vec::new();

    for (position, (block, placeholder)) in pairs.iter().enumerate() {
        let figure_index = position + 1;
        let locations: Vec<u32> = LOC_TAG
            .captures_iter(block.as_str())
            .filter_map(|caps| caps[1].parse().ok())
            .collect();
        if locations.len() != 4 {
            warn!(
                page = input.page_number,
                figure_index,
                found = locations.len(),
                "expected 4 location tags, skipping figure"
            );
            continue;
        }
        let bbox = BoundingBox {
            left: locations[0] as f64 / 100.0,
            bottom: locations[1] as f64 / 100.0,
            right: locations[2] as f64 / 100.0,
            top: locations[3] as f64 / 100.0,
        };
        let pixels = pixel_box(&bbox, width, height);
        if pixels.right <= pixels.left || pixels.bottom <= pixels.top {
            warn!(
                page = input.page_number,
                figure_index, "degenerate crop region, skipping figure"
            );
            continue;
        }
        let crop = page_image.crop_imm(
            pixels.left,
            pixels.top,
            pixels.right - pixels.left,
            pixels.bottom - pixels.top,
        );
        let mut encoded = Cursor::new(Vec::new());
        if let Err(err) = crop.write_to(&mut encoded, ImageFormat::Png) {
            warn!(
                page = input.page_number,
                figure_index,
                error = %err,
                "failed to encode figure crop, skipping figure"
            );
            continue;
        }
        let image_png = encoded.into_inner();

        let description = match captioner.describe(&image_png) {
            Ok(text) => text,
            Err(err) => {
                warn!(
                    page = input.page_number,
                    figure_index,
                    error = %err,
                    "captioning failed, skipping figure"
                );
                continue;
            }
        };

        let unique_id = figure_id(input.page_number, figure_index);
        let caption = format!("<figcaption>[figure: {unique_id}]{description}</figcaption>");
        let rewritten_block = block
            .as_str()
            .replacen("</figure>", &format!("{caption}</figure>"), 1);
        tagged_edits.push(SpanEdit::new(block.start(), block.end(), rewritten_block));
        markdown_edits.push(SpanEdit::new(
            placeholder.start(),
            placeholder.end(),
            format!("![{description}]<!-- figure: {unique_id} -->"),
        ));
        figures.push(FigureRecord {
            page_number: input.page_number,
            figure_index,
            unique_id,
            bbox,
            description,
            image_png,
        });
    }

    Ok(ReconciledPage {
        tagged: apply_edits(input.tagged, tagged_edits),
        markdown: apply_edits(input.markdown, markdown_edits),
        figures,
    })
}

fn unchanged(input: &ReconcileInput<'_>) -> ReconciledPage {
    ReconciledPage {
        tagged: input.tagged.to_string(),
        markdown: input.markdown.to_string(),
        figures: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct FixedCaptioner;

    impl Captioner for FixedCaptioner {
        fn describe(&self, _image_png: &[u8]) -> anyhow::Result<String> {
            Ok("a small chart".to_string())
        }
    }

    struct FlakyCaptioner {
        fail_on: usize,
        calls: Cell<usize>,
    }

    impl Captioner for FlakyCaptioner {
        fn describe(&self, _image_png: &[u8]) -> anyhow::Result<String> {
            let call = self.calls.get() + 1;
            self.calls.set(call);
            if call == self.fail_on {
                anyhow::bail!("caption service timed out");
            }
            Ok(format!("description {call}"))
        }
    }

    fn page_image_png(width: u32, height: u32) -> Vec<u8> {
        let buffer = image::RgbImage::from_pixel(width, height, image::Rgb([240, 240, 240]));
        let mut bytes = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(buffer)
            .write_to(&mut bytes, ImageFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    fn figure_block(body: &str) -> String {
        format!("<figure><loc_10><loc_20><loc_50><loc_80>{body}</figure>")
    }

    #[test]
    fn normalized_coordinates_resolve_to_expected_pixels() {
        let bbox = BoundingBox {
            left: 0.1,
            bottom: 0.2,
            right: 0.5,
            top: 0.8,
        };
        let pixels = pixel_box(&bbox, 1000, 2000);
        assert_eq!(
            pixels,
            PixelBox {
                left: 100,
                top: 400,
                right: 500,
                bottom: 1600,
            }
        );
    }

    #[test]
    fn count_mismatch_leaves_both_texts_unmodified() {
        let tagged = format!("{}{}", figure_block("one"), figure_block("two"));
        let markdown = "text <!-- image --> text";
        let input = ReconcileInput {
            tagged: &tagged,
            markdown,
            page_image: &page_image_png(100, 100),
            page_number: 1,
        };
        let result = reconcile_page(&input, &FixedCaptioner).unwrap();
        assert_eq!(result.tagged, tagged);
        assert_eq!(result.markdown, markdown);
        assert!(result.figures.is_empty());
    }

    #[test]
    fn page_without_figures_is_a_noop() {
        let input = ReconcileInput {
            tagged: "<text>plain page</text>",
            markdown: "plain page",
            page_image: &page_image_png(100, 100),
            page_number: 1,
        };
        let result = reconcile_page(&input, &FixedCaptioner).unwrap();
        assert_eq!(result.tagged, "<text>plain page</text>");
        assert_eq!(result.markdown, "plain page");
    }

    #[test]
    fn figure_ids_follow_forward_document_order() {
        let tagged = format!(
            "intro {} middle {} then {} outro",
            figure_block("first"),
            figure_block("second"),
            figure_block("third")
        );
        let markdown = "a <!-- image --> b <!-- image --> c <!-- image --> d";
        let input = ReconcileInput {
            tagged: &tagged,
            markdown,
            page_image: &page_image_png(200, 200),
            page_number: 4,
        };
        let result = reconcile_page(&input, &FixedCaptioner).unwrap();

        let ids: Vec<&str> = result.figures.iter().map(|f| f.unique_id.as_str()).collect();
        assert_eq!(ids, vec!["pg_4_fig_1", "pg_4_fig_2", "pg_4_fig_3"]);
        for id in &ids {
            assert_eq!(result.tagged.matches(&format!("[figure: {id}]")).count(), 1);
            assert_eq!(
                result.markdown.matches(&format!("<!-- figure: {id} -->")).count(),
                1
            );
        }
        assert!(result.markdown.find("pg_4_fig_1") < result.markdown.find("pg_4_fig_2"));
        assert!(result.markdown.find("pg_4_fig_2") < result.markdown.find("pg_4_fig_3"));
    }

    #[test]
    fn one_captioning_failure_skips_only_that_figure() {
        let tagged = format!(
            "{}{}{}",
            figure_block("first"),
            figure_block("second"),
            figure_block("third")
        );
        let markdown = "<!-- image --> <!-- image --> <!-- image -->";
        let input = ReconcileInput {
            tagged: &tagged,
            markdown,
            page_image: &page_image_png(200, 200),
            page_number: 2,
        };
        let captioner = FlakyCaptioner {
            fail_on: 2,
            calls: Cell::new(0),
        };
        let result = reconcile_page(&input, &captioner).unwrap();

        assert_eq!(result.figures.len(), 2);
        assert!(result.tagged.contains("[figure: pg_2_fig_1]"));
        assert!(!result.tagged.contains("pg_2_fig_2"));
        assert!(result.tagged.contains("[figure: pg_2_fig_3]"));
        assert_eq!(result.markdown.matches("<!-- image -->").count(), 1);
    }

    #[test]
    fn block_without_four_location_tags_is_skipped() {
        let tagged = format!(
            "<figure><loc_10><loc_20>broken</figure>{}",
            figure_block("fine")
        );
        let markdown = "<!-- image --> <!-- image -->";
        let input = ReconcileInput {
            tagged: &tagged,
            markdown,
            page_image: &page_image_png(200, 200),
            page_number: 7,
        };
        let result = reconcile_page(&input, &FixedCaptioner).unwrap();
        assert_eq!(result.figures.len(), 1);
        assert_eq!(result.figures[0].unique_id, "pg_7_fig_2");
        assert!(result.tagged.contains("<figure><loc_10><loc_20>broken</figure>"));
    }

    #[test]
    fn rewrites_preserve_surrounding_text() {
        let tagged = format!("before {} after", figure_block("x"));
        let markdown = "lead <!-- image --> trail";
        let input = ReconcileInput {
            tagged: &tagged,
            markdown,
            page_image: &page_image_png(100, 100),
            page_number: 1,
        };
        let result = reconcile_page(&input, &FixedCaptioner).unwrap();
        assert!(result.tagged.starts_with("before <figure>"));
        assert!(result.tagged.ends_with("</figure> after"));
        assert!(result.markdown.starts_with("lead !["));
        assert!(result.markdown.ends_with("<!-- figure: pg_1_fig_1 --> trail"));
        assert_eq!(
            result.markdown,
            "lead ![a small chart]<!-- figure: pg_1_fig_1 --> trail"
        );
    }
}
