//! Document model shared by every pipeline stage.
//!
//! ```text
//! Fragment ──(segment)──▶ Block ──(merge)──▶ Block + BlockId ──▶ Document
//! ```
//!
//! Fragments come straight from the extractor and are never mutated.
//! Blocks own copies of the fragments they were built from, so the text of
//! any block can always be traced back to a contiguous run of input
//! fragments.

use crate::ids::{BlockId, FragmentId};
use serde::{Deserialize, Serialize};

/// Atomic text unit produced by the fragment extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub text: String,
    /// Raw glyph height. `0.0` means "unspecified" and matches any block.
    pub height: f64,
    /// Baseline y-coordinate in page space.
    pub y: f64,
    pub font: String,
    /// The extractor saw a line end after this fragment.
    pub line_break: bool,
}

impl Fragment {
    pub fn new(text: impl Into<String>, height: f64, y: f64, font: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            height,
            y,
            font: font.into(),
            line_break: false,
        }
    }

    pub fn with_line_break(mut self, line_break: bool) -> Self {
        self.line_break = line_break;
        self
    }

    pub(crate) fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Ordered fragments of one page, as handed over by the extractor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageFragments {
    /// 0-based page index in the source PDF.
    pub index: usize,
    /// Page height in points; used by position-based heuristics.
    pub height: f64,
    pub fragments: Vec<Fragment>,
}

/// A run of fragments merged into one addressable unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub text: String,
    /// Raw height during segmentation; ratio to the body height afterwards.
    pub height: f64,
    /// Baseline y of the first fragment.
    pub y: f64,
    pub font: String,
    pub line_break: bool,
    /// Source fragments, in order, that make up `text`.
    pub fragments: Vec<Fragment>,
}

impl Block {
    /// A new block seeded by its first fragment. The id is a placeholder
    /// until [`crate::pipeline::merge::assign_ids`] runs.
    pub(crate) fn start(page: usize, fragment: Fragment) -> Self {
        Self {
            id: BlockId::new(page, 0),
            text: fragment.text.clone(),
            height: fragment.height,
            y: fragment.y,
            font: fragment.font.clone(),
            line_break: fragment.line_break,
            fragments: vec![fragment],
        }
    }

    pub fn page(&self) -> usize {
        self.id.page
    }

    /// `{page}-{block}-{fragment}` ids of every source fragment.
    pub fn fragment_ids(&self) -> impl Iterator<Item = FragmentId> + '_ {
        (0..self.fragments.len()).map(|i| self.id.fragment(i))
    }

    /// Text as emitted when no directive targets the block.
    pub fn verbatim(&self) -> String {
        if self.line_break {
            format!("{}\n", self.text)
        } else {
            self.text.clone()
        }
    }
}

/// Simplified table-of-contents node: only the title and nested children survive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineNode {
    pub title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<OutlineNode>,
}

impl OutlineNode {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<OutlineNode>) -> Self {
        self.children = children;
        self
    }
}

/// Identified, normalised blocks plus the context strategies may consult.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub outline: Vec<OutlineNode>,
    pub blocks: Vec<Block>,
    /// Page heights keyed by 0-based page index.
    pub page_heights: Vec<(usize, f64)>,
    /// Dominant raw height that normalised to `1.0`.
    pub body_height: f64,
}

impl Document {
    pub fn page_height(&self, page: usize) -> Option<f64> {
        self.page_heights
            .iter()
            .find(|(index, _)| *index == page)
            .map(|(_, h)| *h)
    }

    /// Vertical position of a block as a fraction of its page height.
    ///
    /// Pages with unknown or zero height report the page centre so that
    /// position-based rules never fire on them.
    pub fn relative_y(&self, block: &Block) -> f64 {
        match self.page_height(block.page()) {
            Some(h) if h > 0.0 => block.y / h,
            _ => 0.5,
        }
    }
}

/// Join `next` onto `text`: a single space when `next` starts with a Latin
/// letter, nothing otherwise.
pub(crate) fn join_text(text: &mut String, next: &str) {
    if next.starts_with(|c: char| c.is_ascii_alphabetic()) {
        text.push(' ');
    }
    text.push_str(next);
}
