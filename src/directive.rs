//! Sparse output directives produced by a classification strategy.
//!
//! A block with no directive is emitted verbatim. Only the two
//! non-default actions exist as values; the default has no `Output`
//! variant and cannot be materialised by a strategy.

use crate::error::BlockdownError;
use crate::ids::BlockId;
use serde::{Deserialize, Serialize};

/// One block id, or an inclusive `start..=end` span of blocks in traversal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<BlockId>", into = "Vec<BlockId>")]
pub enum IdRange {
    Single(BlockId),
    Span(BlockId, BlockId),
}

impl IdRange {
    /// Build from an id list; only one or two ids form a valid range.
    pub fn from_ids(ids: &[BlockId]) -> Result<Self, BlockdownError> {
        match *ids {
            [id] => Ok(IdRange::Single(id)),
            [start, end] => Ok(IdRange::between(start, end)),
            _ => Err(BlockdownError::InvalidRangeLength { len: ids.len() }),
        }
    }

    /// Inclusive span from `start` to `end`, collapsing to a single id when equal.
    pub fn between(start: BlockId, end: BlockId) -> Self {
        if start == end {
            IdRange::Single(start)
        } else {
            IdRange::Span(start, end)
        }
    }

    pub fn start(&self) -> BlockId {
        match *self {
            IdRange::Single(id) | IdRange::Span(id, _) => id,
        }
    }

    pub fn end(&self) -> BlockId {
        match *self {
            IdRange::Single(id) | IdRange::Span(_, id) => id,
        }
    }
}

impl From<BlockId> for IdRange {
    fn from(id: BlockId) -> Self {
        IdRange::Single(id)
    }
}

impl TryFrom<Vec<BlockId>> for IdRange {
    type Error = BlockdownError;

    fn try_from(ids: Vec<BlockId>) -> Result<Self, Self::Error> {
        IdRange::from_ids(&ids)
    }
}

impl From<IdRange> for Vec<BlockId> {
    fn from(range: IdRange) -> Self {
        match range {
            IdRange::Single(id) => vec![id],
            IdRange::Span(start, end) => vec![start, end],
        }
    }
}

/// What to do with the block(s) a directive targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Directive {
    /// Contribute nothing.
    Omit { ids: IdRange },
    /// Contribute `text` once in place of every targeted block.
    Replace { ids: IdRange, text: String },
}

impl Directive {
    pub fn omit(ids: impl Into<IdRange>) -> Self {
        Directive::Omit { ids: ids.into() }
    }

    pub fn replace(ids: impl Into<IdRange>, text: impl Into<String>) -> Self {
        Directive::Replace {
            ids: ids.into(),
            text: text.into(),
        }
    }

    pub fn ids(&self) -> IdRange {
        match self {
            Directive::Omit { ids } | Directive::Replace { ids, .. } => *ids,
        }
    }

    /// Text this directive contributes to the output.
    pub fn text(&self) -> &str {
        match self {
            Directive::Omit { .. } => "",
            Directive::Replace { text, .. } => text,
        }
    }

    pub fn is_omit(&self) -> bool {
        matches!(self, Directive::Omit { .. })
    }
}
