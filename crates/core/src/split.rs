use serde::{Deserialize, Serialize};

pub const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SplitConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1200,
            chunk_overlap: 200,
        }
    }
}

pub fn split_text(text: &str, config: &SplitConfig) -> Vec<String> {
    split_text_with_separators(text, SEPARATORS, config)
}

pub fn split_text_with_separators(
    text: &str,
    separators: &[&str],
    config: &SplitConfig,
) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(byte, _)| byte)
        .chain(std::iter::once(text.len()))
        .collect();
    let total = boundaries.len() - 1;
    let size = config.chunk_size.max(1);
    let overlap = config.chunk_overlap.min(size.saturating_sub(1));

    let mut chunks = Vec::new();
    let mut start = 0usize;
    loop {
        let hard_end = (start + size).min(total);
        let end = if hard_end == total {
            total
        } else {
            break_position(text, separators, &boundaries, start, hard_end)
        };
        chunks.push(text[boundaries[start]..boundaries[end]].to_string());
        if end == total {
            break;
        }
        let back = end.saturating_sub(overlap);
        start = if back > start { back } else { end };
    }
    chunks
}

fn break_position(
    text: &str,
    separators: &[&str],
    boundaries: &[usize],
    start: usize,
    hard_end: usize,
) -> usize {
    let window = &text[boundaries[start]..boundaries[hard_end]];
    for separator in separators {
        if separator.is_empty() {
            break;
        }
        if let Some(found) = window.rfind(separator) {
            let cut = boundaries[start] + found + separator.len();
            let position = boundaries.partition_point(|&byte| byte < cut);
            if position > start && position <= hard_end {
                return position;
            }
        }
    }
    hard_end
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(chunk_size: usize, chunk_overlap: usize) -> SplitConfig {
        SplitConfig {
            chunk_size,
            chunk_overlap,
        }
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = split_text("just one small piece", &config(100, 10));
        assert_eq!(chunks, vec!["just one small piece".to_string()]);
    }

    #[test]
    fn chunks_cover_every_character() {
        let text: String = (0..60)
            .map(|i| format!("sentence number {i} ends here.\n\n"))
            .collect();
        let chunks = split_text(&text, &config(80, 20));
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(!chunk.is_empty());
            assert!(text.contains(chunk.as_str()));
        }

        let mut covered = vec![false; text.len()];
        let mut cursor = 0usize;
        for chunk in &chunks {
            let at = cursor + text[cursor..].find(chunk.as_str()).unwrap();
            for flag in covered.iter_mut().take(at + chunk.len()).skip(at) {
                *flag = true;
            }
            cursor = at;
        }
        assert!(covered.into_iter().all(|flag| flag));
    }

    #[test]
    fn consecutive_chunks_share_the_configured_overlap() {
        let text: String = "word ".repeat(200);
        let chunks = split_text(&text, &config(50, 10));
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let previous = &pair[0];
            let next = &pair[1];
            let tail: String = previous.chars().skip(previous.chars().count() - 10).collect();
            assert!(next.starts_with(&tail));
        }
    }

    #[test]
    fn prefers_paragraph_breaks_over_finer_separators() {
        let text = "first paragraph body\n\nsecond paragraph body that runs long enough";
        let chunks = split_text(text, &config(30, 0));
        assert_eq!(chunks[0], "first paragraph body\n\n");
    }

    #[test]
    fn unbroken_run_falls_back_to_character_split() {
        let text = "x".repeat(25);
        let chunks = split_text(&text, &config(10, 0));
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 10));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn custom_separator_lists_are_honored() {
        let text = "a|b|c|d|e|f";
        let chunks = split_text_with_separators(text, &["|", ""], &config(4, 0));
        assert_eq!(chunks[0], "a|b|");
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn splitting_is_deterministic() {
        let text = "alpha beta gamma. delta epsilon zeta.\n\neta theta iota".repeat(10);
        let first = split_text(&text, &config(64, 16));
        let second = split_text(&text, &config(64, 16));
        assert_eq!(first, second);
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let text = "héllo wörld çafé über ".repeat(20);
        let chunks = split_text(&text, &config(16, 4));
        for chunk in &chunks {
            assert!(!chunk.is_empty());
            assert!(text.contains(chunk.as_str()));
        }
    }
}
