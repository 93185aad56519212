//! Hierarchical identifiers for addressable units.
//!
//! Every block surviving the merge pass is named `{page}-{block}` (both
//! 0-based) in document traversal order. Individual source fragments inside
//! a block extend that name with a third component, `{page}-{block}-{fragment}`,
//! so a fragment id always starts with the id of the block that owns it.
//!
//! Ids are the only join key between segmentation output, strategy
//! directives and reconstruction. They serialise as plain strings so the
//! model-facing payload and the diagnostics files stay readable.

use crate::error::BlockdownError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Identifier of a block: `{page}-{block}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId {
    pub page: usize,
    pub block: usize,
}

impl BlockId {
    pub fn new(page: usize, block: usize) -> Self {
        Self { page, block }
    }

    /// Id of the `fragment`-th source fragment inside this block.
    pub fn fragment(self, fragment: usize) -> FragmentId {
        FragmentId {
            block: self,
            fragment,
        }
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.page, self.block)
    }
}

impl FromStr for BlockId {
    type Err = BlockdownError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BlockdownError::InvalidId { id: s.to_string() };
        let (page, block) = s.trim().split_once('-').ok_or_else(invalid)?;
        Ok(Self {
            page: page.parse().map_err(|_| invalid())?,
            block: block.parse().map_err(|_| invalid())?,
        })
    }
}

impl Serialize for BlockId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BlockId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Identifier of one source fragment inside a block: `{page}-{block}-{fragment}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FragmentId {
    block: BlockId,
    fragment: usize,
}

impl FragmentId {
    /// The owning block's id; always a string prefix of this id.
    pub fn block(&self) -> BlockId {
        self.block
    }

    pub fn index(&self) -> usize {
        self.fragment
    }
}

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.block, self.fragment)
    }
}

impl FromStr for FragmentId {
    type Err = BlockdownError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BlockdownError::InvalidId { id: s.to_string() };
        let (block, fragment) = s.trim().rsplit_once('-').ok_or_else(invalid)?;
        let block: BlockId = block.parse().map_err(|_| invalid())?;
        Ok(block.fragment(fragment.parse().map_err(|_| invalid())?))
    }
}

impl Serialize for FragmentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_id_display_and_parse() {
        let id = BlockId::new(2, 14);
        assert_eq!(id.to_string(), "2-14");
        assert_eq!("2-14".parse::<BlockId>().unwrap(), id);
        assert_eq!(" 0-0 ".parse::<BlockId>().unwrap(), BlockId::new(0, 0));
    }

    #[test]
    fn block_id_rejects_garbage() {
        for bad in ["", "3", "a-1", "1-", "1-2-3", "-1-2"] {
            assert!(bad.parse::<BlockId>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn fragment_id_shares_block_prefix() {
        let block = BlockId::new(1, 7);
        let frag = block.fragment(3);
        assert_eq!(frag.to_string(), "1-7-3");
        assert!(frag.to_string().starts_with(&block.to_string()));
        assert_eq!(frag.block(), block);
        assert_eq!("1-7-3".parse::<FragmentId>().unwrap(), frag);
        assert!("1-7".parse::<FragmentId>().is_err());
    }

    #[test]
    fn ordering_follows_traversal() {
        let mut ids = vec![BlockId::new(1, 0), BlockId::new(0, 10), BlockId::new(0, 2)];
        ids.sort();
        assert_eq!(ids, vec![BlockId::new(0, 2), BlockId::new(0, 10), BlockId::new(1, 0)]);
    }

    #[test]
    fn serde_as_string() {
        let json = serde_json::to_string(&BlockId::new(3, 1)).unwrap();
        assert_eq!(json, "\"3-1\"");
        let back: BlockId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, BlockId::new(3, 1));
        assert!(serde_json::from_str::<BlockId>("\"x-1\"").is_err());
    }
}
