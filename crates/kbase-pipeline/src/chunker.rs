//! Structure-aware segmentation of merged pages.
//!
//! Text splits on paragraph boundaries and greedily re-merges small
//! paragraphs up to a soft limit; oversize paragraphs split at sentence
//! boundaries. A segment never crosses a page boundary. Segment ids are
//! deterministic (`{doc_id}-{page}-{ordinal}-{type}`), so re-running the
//! chunker on the same input reproduces the same segments.

use kbase_postgres::model::NewSegment;
use kbase_postgres::types::SegType;
use text_splitter::{ChunkConfig, TextSplitter};

use crate::merge::{MergedBlock, MergedPage};

/// Content prefix marking an image segment; keeps the caption text
/// addressable by lexical search over hydrated neighbors.
const IMAGE_MARKER: &str = "[image]";

/// Character budget of the extractive page summary.
const PAGE_SUMMARY_CHARS: usize = 300;

/// Chunker tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct ChunkerConfig {
    /// Soft limit for a text segment in characters.
    pub soft_limit: usize,
    /// Emit one `page_summary` segment per page.
    pub emit_page_summaries: bool,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            soft_limit: crate::config::DEFAULT_SEGMENT_SOFT_LIMIT,
            emit_page_summaries: false,
        }
    }
}

/// Splits merged pages into ordered segments.
pub fn chunk_pages(doc_id: &str, pages: &[MergedPage], config: &ChunkerConfig) -> Vec<NewSegment> {
    let mut segments = Vec::new();

    for page in pages {
        let mut ordinal = 0usize;
        let mut current_title: Option<&str> = None;
        let mut page_text = String::new();

        for block in &page.blocks {
            match block {
                MergedBlock::Title { text } => {
                    current_title = Some(text);
                }
                MergedBlock::Text { text } => {
                    if !page_text.is_empty() {
                        page_text.push('\n');
                    }
                    page_text.push_str(text);

                    for piece in split_text(text, config.soft_limit) {
                        segments.push(make_segment(
                            doc_id,
                            page.page_idx,
                            &mut ordinal,
                            SegType::Text,
                            piece,
                            None,
                            current_title.map(str::to_owned),
                            None,
                        ));
                    }
                }
                MergedBlock::Table {
                    html,
                    caption,
                    footnote,
                } => {
                    segments.push(make_segment(
                        doc_id,
                        page.page_idx,
                        &mut ordinal,
                        SegType::Table,
                        html.clone(),
                        None,
                        caption.clone().or_else(|| current_title.map(str::to_owned)),
                        footnote.clone(),
                    ));
                }
                MergedBlock::Image {
                    path,
                    caption,
                    footnote,
                } => {
                    // Fall back to a positional label so the marker is
                    // never empty.
                    let caption = caption
                        .clone()
                        .unwrap_or_else(|| format!("figure_{}_{}", page.page_idx, ordinal));
                    segments.push(make_segment(
                        doc_id,
                        page.page_idx,
                        &mut ordinal,
                        SegType::Image,
                        format!("{IMAGE_MARKER} {caption}"),
                        Some(path.clone()),
                        Some(caption),
                        footnote.clone(),
                    ));
                }
            }
        }

        if config.emit_page_summaries && !page_text.is_empty() {
            let summary: String = page_text.chars().take(PAGE_SUMMARY_CHARS).collect();
            segments.push(make_segment(
                doc_id,
                page.page_idx,
                &mut ordinal,
                SegType::PageSummary,
                summary,
                None,
                None,
                None,
            ));
        }
    }

    segments
}

#[allow(clippy::too_many_arguments)]
fn make_segment(
    doc_id: &str,
    page_idx: i32,
    ordinal: &mut usize,
    seg_type: SegType,
    content: String,
    image_path: Option<String>,
    caption: Option<String>,
    footnote: Option<String>,
) -> NewSegment {
    let seg_id = format!("{doc_id}-{page_idx}-{ordinal}-{seg_type}");
    *ordinal += 1;

    NewSegment {
        seg_id,
        doc_id: doc_id.to_owned(),
        seg_len: content.chars().count() as i32,
        seg_content: content,
        seg_image_path: image_path,
        seg_caption: caption,
        seg_footnote: footnote,
        seg_type,
        seg_page_idx: page_idx,
    }
}

/// Splits a text run into segment-sized pieces.
///
/// Paragraphs merge greedily until the soft limit; a paragraph that alone
/// exceeds the limit is split at sentence boundaries by the semantic
/// splitter, which never breaks mid-sentence where a boundary is
/// recognizable.
fn split_text(text: &str, soft_limit: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();

    for paragraph in text.split('\n').map(str::trim).filter(|p| !p.is_empty()) {
        if paragraph.chars().count() > soft_limit {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
            }
            pieces.extend(split_oversize(paragraph, soft_limit));
            continue;
        }

        let would_be = current.chars().count() + 1 + paragraph.chars().count();
        if !current.is_empty() && would_be > soft_limit {
            pieces.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(paragraph);
    }

    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

fn split_oversize(paragraph: &str, soft_limit: usize) -> Vec<String> {
    let splitter = TextSplitter::new(ChunkConfig::new(soft_limit).with_trim(true));
    splitter.chunks(paragraph).map(String::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{MergedBlock, MergedPage};

    fn page(page_idx: i32, blocks: Vec<MergedBlock>) -> MergedPage {
        MergedPage { page_idx, blocks }
    }

    fn text_block(s: &str) -> MergedBlock {
        MergedBlock::Text { text: s.to_owned() }
    }

    #[test]
    fn test_two_page_document_segment_shape() {
        // One title, two paragraphs, one table over two pages.
        let pages = vec![
            page(
                1,
                vec![
                    MergedBlock::Title {
                        text: "1. Scope".to_owned(),
                    },
                    text_block("First paragraph of the scope section."),
                    text_block("Second paragraph with more detail."),
                ],
            ),
            page(
                2,
                vec![MergedBlock::Table {
                    html: "<table><tr><td>42</td></tr></table>".to_owned(),
                    caption: Some("Table 1".to_owned()),
                    footnote: None,
                }],
            ),
        ];

        let segments = chunk_pages("doc-1", &pages, &ChunkerConfig::default());

        // Small paragraphs on one page merge into a single text segment.
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].seg_type, SegType::Text);
        assert_eq!(segments[0].seg_page_idx, 1);
        assert_eq!(segments[0].seg_caption.as_deref(), Some("1. Scope"));
        assert_eq!(segments[1].seg_type, SegType::Table);
        assert_eq!(segments[1].seg_page_idx, 2);
        assert_eq!(segments[1].seg_caption.as_deref(), Some("Table 1"));
    }

    #[test]
    fn test_seg_ids_are_deterministic() {
        let pages = vec![page(
            1,
            vec![
                text_block("Some body text for the page."),
                MergedBlock::Image {
                    path: "/data/doc-1/img_0.png".to_owned(),
                    caption: Some("Figure 1".to_owned()),
                    footnote: None,
                },
            ],
        )];

        let first = chunk_pages("doc-1", &pages, &ChunkerConfig::default());
        let second = chunk_pages("doc-1", &pages, &ChunkerConfig::default());

        assert_eq!(first, second);
        assert_eq!(first[0].seg_id, "doc-1-1-0-text");
        assert_eq!(first[1].seg_id, "doc-1-1-1-image");
    }

    #[test]
    fn test_segments_never_cross_pages() {
        let pages = vec![
            page(1, vec![text_block("short page one text")]),
            page(2, vec![text_block("short page two text")]),
        ];

        let segments = chunk_pages("doc-1", &pages, &ChunkerConfig::default());
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].seg_page_idx, 1);
        assert_eq!(segments[1].seg_page_idx, 2);
    }

    #[test]
    fn test_small_paragraphs_merge_up_to_soft_limit() {
        let config = ChunkerConfig {
            soft_limit: 40,
            emit_page_summaries: false,
        };
        let pages = vec![page(
            1,
            vec![text_block(
                "alpha beta gamma.\ndelta epsilon zeta.\neta theta iota kappa lambda mu.",
            )],
        )];

        let segments = chunk_pages("doc-1", &pages, &config);
        assert!(segments.len() >= 2);
        for segment in &segments {
            assert!(segment.seg_len <= 40 + 10, "segment too long: {}", segment.seg_len);
        }
        // Order is preserved.
        assert!(segments[0].seg_content.starts_with("alpha"));
    }

    #[test]
    fn test_oversize_paragraph_splits_on_sentence_boundaries() {
        let sentence = "This is a complete sentence that ends properly. ";
        let paragraph = sentence.repeat(10);
        let config = ChunkerConfig {
            soft_limit: 120,
            emit_page_summaries: false,
        };

        let segments = chunk_pages("doc-1", &[page(1, vec![text_block(&paragraph)])], &config);
        assert!(segments.len() > 1);
        for segment in &segments {
            // No mid-sentence break: every piece ends at a sentence end.
            assert!(
                segment.seg_content.trim_end().ends_with('.'),
                "mid-sentence split: {:?}",
                segment.seg_content
            );
        }
    }

    #[test]
    fn test_image_marker_contains_caption() {
        let pages = vec![page(
            1,
            vec![MergedBlock::Image {
                path: "/data/doc-1/img_0.png".to_owned(),
                caption: Some("network topology diagram".to_owned()),
                footnote: None,
            }],
        )];

        let segments = chunk_pages("doc-1", &pages, &ChunkerConfig::default());
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].seg_type, SegType::Image);
        assert!(segments[0].seg_content.contains("network topology diagram"));
        assert_eq!(
            segments[0].seg_image_path.as_deref(),
            Some("/data/doc-1/img_0.png")
        );
    }

    #[test]
    fn test_page_summary_flag() {
        let pages = vec![page(1, vec![text_block("body text for the summary")])];

        let without = chunk_pages("doc-1", &pages, &ChunkerConfig::default());
        assert!(without.iter().all(|s| s.seg_type != SegType::PageSummary));

        let config = ChunkerConfig {
            soft_limit: 800,
            emit_page_summaries: true,
        };
        let with = chunk_pages("doc-1", &pages, &config);
        let summary = with
            .iter()
            .find(|s| s.seg_type == SegType::PageSummary)
            .expect("page summary segment");
        assert!(summary.seg_content.contains("body text"));
        assert!(summary.seg_id.ends_with("page_summary"));
    }
}
