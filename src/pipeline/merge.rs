//! Second-pass paragraph repair and identifier assignment.
//!
//! Extraction often splits one paragraph into a stack of single-line
//! blocks. After normalisation, body text sits at exactly `1.0`, so a run of
//! consecutive single-fragment `1.0` blocks is folded back into one block.
//! Headings, captions and other non-body blocks are never touched.
//!
//! Must run after [`super::segment::normalize_heights`].

use super::segment::PageBlocks;
use crate::ids::BlockId;
use crate::model::{join_text, Block};
use tracing::debug;

/// Normalised height of body text.
pub const BODY_HEIGHT: f64 = 1.0;

fn is_body_singleton(block: &Block) -> bool {
    block.fragments.len() == 1 && block.height == BODY_HEIGHT
}

/// Fold runs of body-height singleton blocks on one page.
///
/// A block that absorbed its successor keeps absorbing for the rest of the
/// run, so an N-line paragraph ends up as a single block and a second pass
/// has nothing left to fold.
pub fn merge_page(blocks: Vec<Block>) -> Vec<Block> {
    let mut merged: Vec<Block> = Vec::with_capacity(blocks.len());
    let mut run_open = false;

    for block in blocks {
        let singleton = is_body_singleton(&block);
        if singleton && run_open {
            if let Some(prev) = merged.last_mut() {
                join_text(&mut prev.text, &block.text);
                prev.line_break = block.line_break;
                prev.fragments.extend(block.fragments);
                continue;
            }
        }
        run_open = singleton;
        merged.push(block);
    }

    merged
}

/// Run [`merge_page`] over every page.
pub fn merge_document(pages: Vec<PageBlocks>) -> Vec<PageBlocks> {
    let before: usize = pages.iter().map(|p| p.blocks.len()).sum();
    let pages: Vec<PageBlocks> = pages
        .into_iter()
        .map(|p| PageBlocks {
            blocks: merge_page(p.blocks),
            ..p
        })
        .collect();
    let after: usize = pages.iter().map(|p| p.blocks.len()).sum();
    debug!("Merged {} blocks into {}", before, after);
    pages
}

/// Assign `{page}-{block}` ids in traversal order and flatten the pages.
pub fn assign_ids(pages: Vec<PageBlocks>) -> Vec<Block> {
    pages
        .into_iter()
        .flat_map(|p| {
            let page = p.index;
            p.blocks.into_iter().enumerate().map(move |(i, mut block)| {
                block.id = BlockId::new(page, i);
                block
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Fragment;

    fn block(text: &str, height: f64) -> Block {
        Block::start(0, Fragment::new(text, height, 500.0, "F").with_line_break(true))
    }

    fn texts(blocks: &[Block]) -> Vec<&str> {
        blocks.iter().map(|b| b.text.as_str()).collect()
    }

    #[test]
    fn body_lines_fold_into_paragraph() {
        let merged = merge_page(vec![
            block("Heading", 1.6),
            block("first line", 1.0),
            block("second line", 1.0),
            block("third line", 1.0),
            block("caption", 0.8),
            block("next para", 1.0),
        ]);
        assert_eq!(
            texts(&merged),
            vec!["Heading", "first line second line third line", "caption", "next para"]
        );
        assert_eq!(merged[1].fragments.len(), 3);
        assert!(merged[1].line_break);
    }

    #[test]
    fn multi_fragment_blocks_are_left_alone() {
        let mut two = block("Acme", 1.0);
        two.fragments.push(Fragment::new("Corp", 1.0, 500.0, "F"));
        two.text = "Acme Corp".into();
        let merged = merge_page(vec![block("lead", 1.0), two.clone(), block("tail", 1.0)]);
        assert_eq!(texts(&merged), vec!["lead", "Acme Corp", "tail"]);
    }

    #[test]
    fn merge_is_idempotent() {
        let input = vec![
            block("a", 1.0),
            block("b", 1.0),
            block("T", 1.4),
            block("c", 1.0),
            block("d", 1.0),
            block("e", 1.0),
            block("f", 0.7),
            block("g", 1.0),
        ];
        let once = merge_page(input);
        let twice = merge_page(once.clone());
        assert_eq!(once, twice);
        for pair in once.windows(2) {
            assert!(!(is_body_singleton(&pair[0]) && is_body_singleton(&pair[1])));
        }
    }

    #[test]
    fn ids_follow_page_and_position() {
        let pages = vec![
            PageBlocks {
                index: 0,
                height: 800.0,
                blocks: vec![block("a", 1.0), block("b", 1.2)],
            },
            PageBlocks {
                index: 1,
                height: 800.0,
                blocks: vec![],
            },
            PageBlocks {
                index: 4,
                height: 800.0,
                blocks: vec![block("c", 1.0)],
            },
        ];
        let ids: Vec<String> = assign_ids(pages).iter().map(|b| b.id.to_string()).collect();
        assert_eq!(ids, vec!["0-0", "0-1", "4-0"]);
    }
}
