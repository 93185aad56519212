//! Reconstruction: apply a sparse directive set to the identified block
//! sequence and produce the final Markdown string.
//!
//! Ranges are resolved by position in the flat traversal order, so a span
//! that crosses page boundaries covers the tail of its start page, every
//! page in between and the head of its end page. Each directive contributes
//! its text exactly once, at the position of its first block. Blocks with
//! no directive contribute [`Block::verbatim`]. Contributions are joined
//! with no separator.

use crate::directive::Directive;
use crate::error::{BlockdownError, Result};
use crate::ids::BlockId;
use crate::model::Block;
use std::collections::HashMap;
use tracing::debug;

/// Rebuild the output text. Fails on the first directive that does not fit
/// the block sequence.
pub fn reconstruct(blocks: &[Block], directives: &[Directive]) -> Result<String> {
    let claims = claim_blocks(blocks, directives)?;

    let mut out = String::new();
    let mut i = 0;
    while i < blocks.len() {
        match claims[i] {
            Some((d, end)) => {
                out.push_str(directives[d].text());
                i = end + 1;
            }
            None => {
                out.push_str(&blocks[i].verbatim());
                i += 1;
            }
        }
    }

    debug!(
        "Reconstructed {} blocks with {} directives into {} bytes",
        blocks.len(),
        directives.len(),
        out.len()
    );
    Ok(out)
}

/// For each block position, the directive that owns it and the last
/// position of that directive's range.
fn claim_blocks(blocks: &[Block], directives: &[Directive]) -> Result<Vec<Option<(usize, usize)>>> {
    let positions: HashMap<BlockId, usize> = blocks.iter().enumerate().map(|(i, b)| (b.id, i)).collect();
    let position = |id: BlockId| {
        positions
            .get(&id)
            .copied()
            .ok_or_else(|| BlockdownError::UnknownId { id: id.to_string() })
    };

    let mut claims: Vec<Option<(usize, usize)>> = vec![None; blocks.len()];
    for (d, directive) in directives.iter().enumerate() {
        let range = directive.ids();
        let start = position(range.start())?;
        let end = position(range.end())?;
        if end < start {
            return Err(BlockdownError::InvertedRange {
                start: range.start().to_string(),
                end: range.end().to_string(),
            });
        }
        for (pos, slot) in claims.iter_mut().enumerate().take(end + 1).skip(start) {
            if slot.is_some() {
                return Err(BlockdownError::DuplicateDirective {
                    id: blocks[pos].id.to_string(),
                });
            }
            *slot = Some((d, end));
        }
    }
    Ok(claims)
}
