//! Block segmentation and document-wide height normalisation.
//!
//! Fragments are folded into blocks page by page. A fragment extends the
//! block being built when it looks like more of the same run:
//!
//! * its height is `0` (unspecified) or equals the block's height, and
//! * its font name equals the block's font.
//!
//! Anything else starts a new block, and a line-break flag closes the
//! current one. Whitespace-only fragments contribute no text.
//!
//! Normalisation runs once over every page after segmentation. It is a
//! collect-then-rewrite pass: the dominant raw height is computed from the
//! full histogram first, then every block height is rewritten as a ratio to
//! it. The result does not depend on page order beyond tie-breaking.

use crate::model::{join_text, Block, Fragment, PageFragments};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Blocks of one page, before identifiers are assigned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageBlocks {
    pub index: usize,
    pub height: f64,
    pub blocks: Vec<Block>,
}

/// Segment one page's fragments into blocks. An empty page yields no blocks.
pub fn segment_page(page: &PageFragments) -> PageBlocks {
    let mut blocks: Vec<Block> = Vec::new();
    // Whether the last block may still absorb fragments.
    let mut open = false;

    for fragment in &page.fragments {
        if fragment.is_blank() {
            if fragment.line_break {
                if let Some(last) = blocks.last_mut().filter(|_| open) {
                    last.line_break = true;
                }
                open = false;
            }
            continue;
        }

        match blocks.last_mut().filter(|b| open && joins(b, fragment)) {
            Some(block) => extend(block, fragment),
            None => blocks.push(Block::start(page.index, fragment.clone())),
        }
        open = !fragment.line_break;
    }

    PageBlocks {
        index: page.index,
        height: page.height,
        blocks,
    }
}

/// Segment every page, then normalise heights across the whole document.
///
/// Returns the pages and the dominant raw height that became `1.0`.
pub fn segment_document(pages: &[PageFragments]) -> (Vec<PageBlocks>, f64) {
    let mut segmented: Vec<PageBlocks> = pages.iter().map(segment_page).collect();
    let body_height = normalize_heights(&mut segmented);
    debug!(
        "Segmented {} pages into {} blocks (body height {})",
        segmented.len(),
        segmented.iter().map(|p| p.blocks.len()).sum::<usize>(),
        body_height
    );
    (segmented, body_height)
}

/// Most frequent non-zero raw block height; ties go to the first value seen.
pub fn dominant_height<'a>(blocks: impl IntoIterator<Item = &'a Block>) -> Option<f64> {
    let mut histogram: Vec<(f64, usize)> = Vec::new();
    for block in blocks {
        if block.height == 0.0 {
            continue;
        }
        match histogram.iter_mut().find(|(h, _)| *h == block.height) {
            Some((_, count)) => *count += 1,
            None => histogram.push((block.height, 1)),
        }
    }

    let mut best: Option<(f64, usize)> = None;
    for (height, count) in histogram {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((height, count));
        }
    }
    best.map(|(h, _)| h)
}

/// Rewrite every block height as `round(height / body, 3)`.
///
/// A document without any sized block keeps its heights and reports a body
/// height of `1.0`.
pub fn normalize_heights(pages: &mut [PageBlocks]) -> f64 {
    let body = dominant_height(pages.iter().flat_map(|p| &p.blocks)).unwrap_or(1.0);
    for block in pages.iter_mut().flat_map(|p| p.blocks.iter_mut()) {
        block.height = round3(block.height / body);
    }
    body
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

fn joins(block: &Block, fragment: &Fragment) -> bool {
    let height_ok = fragment.height == 0.0 || fragment.height == block.height;
    height_ok && fragment.font == block.font
}

fn extend(block: &mut Block, fragment: &Fragment) {
    join_text(&mut block.text, &fragment.text);
    block.line_break = fragment.line_break;
    block.fragments.push(fragment.clone());
}
