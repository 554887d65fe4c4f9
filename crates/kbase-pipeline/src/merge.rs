//! Page merge: reading-order blocks grouped per page with caption and
//! footnote attachment.

use serde::{Deserialize, Serialize};

use crate::external::{BlockType, ParsedBlock};

/// How far back a caption may sit from its table or image.
const CAPTION_LOOKBEHIND: usize = 2;

/// A block after page merge, captions and footnotes attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MergedBlock {
    /// Coalesced run of body text.
    Text {
        /// Concatenated text of the run.
        text: String,
    },
    /// Heading kept separate so the chunker can attach it as a caption.
    Title {
        /// Heading text.
        text: String,
    },
    /// Table with proximity-attached caption and footnote.
    Table {
        /// Table body HTML.
        html: String,
        /// Caption, if one was tagged or found nearby.
        caption: Option<String>,
        /// Footnote found below on the same page.
        footnote: Option<String>,
    },
    /// Image with proximity-attached caption and footnote.
    Image {
        /// Extracted image path.
        path: String,
        /// Caption, if one was tagged or found nearby.
        caption: Option<String>,
        /// Footnote found below on the same page.
        footnote: Option<String>,
    },
}

/// The merged content of one page; the unit handed to the chunker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedPage {
    /// 1-based page index.
    pub page_idx: i32,
    /// Blocks in reading order.
    pub blocks: Vec<MergedBlock>,
}

fn join_tagged(parts: &[String]) -> Option<String> {
    let joined = parts
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    (!joined.is_empty()).then_some(joined)
}

/// Finds the nearest preceding caption-tagged block within the lookbehind
/// window on the same page.
fn nearby_caption(blocks: &[ParsedBlock], idx: usize) -> Option<String> {
    let page = blocks[idx].page_idx;
    blocks[..idx]
        .iter()
        .rev()
        .take(CAPTION_LOOKBEHIND)
        .take_while(|b| b.page_idx == page)
        .find(|b| b.block_type == Some(BlockType::Caption) && !b.text.trim().is_empty())
        .map(|b| b.text.trim().to_owned())
}

/// Finds the nearest following footnote-tagged block on the same page.
fn nearby_footnote(blocks: &[ParsedBlock], idx: usize) -> Option<String> {
    let page = blocks[idx].page_idx;
    blocks[idx + 1..]
        .iter()
        .take_while(|b| b.page_idx == page)
        .find(|b| b.block_type == Some(BlockType::Footnote) && !b.text.trim().is_empty())
        .map(|b| b.text.trim().to_owned())
}

/// Merges reading-order parsed blocks into per-page units.
///
/// Consecutive text blocks coalesce into one run; captions the extractor
/// did not already attach are recovered from nearby caption blocks, and
/// footnotes attach from below on the same page. Page indexes shift from
/// the extractor's 0-based convention to the 1-based convention used
/// everywhere downstream.
pub fn merge_pages(blocks: &[ParsedBlock]) -> Vec<MergedPage> {
    let mut pages: Vec<MergedPage> = Vec::new();
    let mut text_run: Vec<&str> = Vec::new();
    let mut run_page: Option<i32> = None;

    fn flush(pages: &mut Vec<MergedPage>, run: &mut Vec<&str>, page: Option<i32>) {
        if run.is_empty() {
            return;
        }
        let text = run.join("\n");
        run.clear();
        if let Some(page_idx) = page {
            push_block(pages, page_idx, MergedBlock::Text { text });
        }
    }

    fn push_block(pages: &mut Vec<MergedPage>, page_idx0: i32, block: MergedBlock) {
        let page_idx = page_idx0 + 1;
        match pages.last_mut() {
            Some(page) if page.page_idx == page_idx => page.blocks.push(block),
            _ => pages.push(MergedPage {
                page_idx,
                blocks: vec![block],
            }),
        }
    }

    for (idx, block) in blocks.iter().enumerate() {
        // A page turn always ends the current text run.
        if run_page.is_some() && run_page != Some(block.page_idx) {
            flush(&mut pages, &mut text_run, run_page);
        }

        match block.block_type {
            Some(BlockType::Text) => {
                let text = block.text.trim();
                if !text.is_empty() {
                    text_run.push(text);
                    run_page = Some(block.page_idx);
                }
            }
            Some(BlockType::Title) => {
                flush(&mut pages, &mut text_run, run_page);
                let text = block.text.trim();
                if !text.is_empty() {
                    push_block(
                        &mut pages,
                        block.page_idx,
                        MergedBlock::Title {
                            text: text.to_owned(),
                        },
                    );
                }
            }
            Some(BlockType::Table) => {
                flush(&mut pages, &mut text_run, run_page);
                let html = block.table_body.trim();
                if html.is_empty() {
                    tracing::warn!(page_idx = block.page_idx, "Skipping table with empty body");
                    continue;
                }
                let caption =
                    join_tagged(&block.table_caption).or_else(|| nearby_caption(blocks, idx));
                let footnote =
                    join_tagged(&block.table_footnote).or_else(|| nearby_footnote(blocks, idx));
                push_block(
                    &mut pages,
                    block.page_idx,
                    MergedBlock::Table {
                        html: html.to_owned(),
                        caption,
                        footnote,
                    },
                );
            }
            Some(BlockType::Image) => {
                flush(&mut pages, &mut text_run, run_page);
                if block.img_path.is_empty() {
                    tracing::warn!(page_idx = block.page_idx, "Skipping image with empty path");
                    continue;
                }
                let caption =
                    join_tagged(&block.img_caption).or_else(|| nearby_caption(blocks, idx));
                let footnote =
                    join_tagged(&block.img_footnote).or_else(|| nearby_footnote(blocks, idx));
                push_block(
                    &mut pages,
                    block.page_idx,
                    MergedBlock::Image {
                        path: block.img_path.clone(),
                        caption,
                        footnote,
                    },
                );
            }
            // Caption and footnote lines are consumed by attachment, and
            // untyped blocks are extractor noise.
            Some(BlockType::Caption) | Some(BlockType::Footnote) | None => {}
        }
    }

    flush(&mut pages, &mut text_run, run_page);
    pages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(page: i32, s: &str) -> ParsedBlock {
        ParsedBlock {
            block_type: Some(BlockType::Text),
            text: s.to_owned(),
            page_idx: page,
            ..ParsedBlock::default()
        }
    }

    fn caption(page: i32, s: &str) -> ParsedBlock {
        ParsedBlock {
            block_type: Some(BlockType::Caption),
            text: s.to_owned(),
            page_idx: page,
            ..ParsedBlock::default()
        }
    }

    fn table(page: i32, html: &str) -> ParsedBlock {
        ParsedBlock {
            block_type: Some(BlockType::Table),
            table_body: html.to_owned(),
            page_idx: page,
            ..ParsedBlock::default()
        }
    }

    #[test]
    fn test_text_runs_coalesce_within_page() {
        let pages = merge_pages(&[
            text(0, "first sentence."),
            text(0, "second sentence."),
            text(1, "next page."),
        ]);

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page_idx, 1);
        assert_eq!(
            pages[0].blocks,
            vec![MergedBlock::Text {
                text: "first sentence.\nsecond sentence.".to_owned()
            }]
        );
        assert_eq!(pages[1].page_idx, 2);
    }

    #[test]
    fn test_caption_attaches_within_two_blocks() {
        let pages = merge_pages(&[
            caption(0, "Table 3: revenue by region"),
            table(0, "<table><tr><td>1</td></tr></table>"),
        ]);

        let MergedBlock::Table { caption, .. } = &pages[0].blocks[0] else {
            panic!("expected table block");
        };
        assert_eq!(caption.as_deref(), Some("Table 3: revenue by region"));
    }

    #[test]
    fn test_caption_beyond_window_is_not_attached() {
        let pages = merge_pages(&[
            caption(0, "Too far away"),
            text(0, "filler one"),
            text(0, "filler two"),
            table(0, "<table><tr><td>1</td></tr></table>"),
        ]);

        let table_block = pages[0]
            .blocks
            .iter()
            .find(|b| matches!(b, MergedBlock::Table { .. }))
            .unwrap();
        let MergedBlock::Table { caption, .. } = table_block else {
            unreachable!()
        };
        assert_eq!(caption.as_deref(), None);
    }

    #[test]
    fn test_caption_does_not_cross_pages() {
        let pages = merge_pages(&[
            caption(0, "Previous page caption"),
            table(1, "<table><tr><td>1</td></tr></table>"),
        ]);

        let MergedBlock::Table { caption, .. } = &pages[0].blocks[0] else {
            panic!("expected table block");
        };
        assert_eq!(caption.as_deref(), None);
    }

    #[test]
    fn test_footnote_attaches_from_below_same_page() {
        let footnote = ParsedBlock {
            block_type: Some(BlockType::Footnote),
            text: "figures unaudited".to_owned(),
            page_idx: 0,
            ..ParsedBlock::default()
        };
        let pages = merge_pages(&[
            table(0, "<table><tr><td>1</td></tr></table>"),
            footnote,
        ]);

        let MergedBlock::Table { footnote, .. } = &pages[0].blocks[0] else {
            panic!("expected table block");
        };
        assert_eq!(footnote.as_deref(), Some("figures unaudited"));
    }

    #[test]
    fn test_extractor_tagged_caption_wins() {
        let mut block = table(0, "<table><tr><td>1</td></tr></table>");
        block.table_caption = vec!["Tagged caption".to_owned()];
        let pages = merge_pages(&[caption(0, "Nearby caption"), block]);

        let MergedBlock::Table { caption, .. } = &pages[0].blocks[0] else {
            panic!("expected table block");
        };
        assert_eq!(caption.as_deref(), Some("Tagged caption"));
    }

    #[test]
    fn test_empty_blocks_are_dropped() {
        let pages = merge_pages(&[
            text(0, "   "),
            table(0, ""),
            ParsedBlock {
                block_type: Some(BlockType::Image),
                img_path: String::new(),
                page_idx: 0,
                ..ParsedBlock::default()
            },
        ]);
        assert!(pages.is_empty());
    }
}
