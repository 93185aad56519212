//! Progress-callback trait for pipeline stage events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the conversion moves from extraction through classification
//! to reconstruction.
//!
//! # Example
//!
//! ```rust
//! use blockdown::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct BlockCounter {
//!     blocks: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for BlockCounter {
//!     fn on_extraction_complete(&self, pages: usize, blocks: usize) {
//!         self.blocks.store(blocks, Ordering::SeqCst);
//!         eprintln!("{} blocks on {} pages", blocks, pages);
//!     }
//! }
//!
//! let counter = Arc::new(BlockCounter { blocks: AtomicUsize::new(0) });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the conversion pipeline at each stage boundary.
///
/// Stages run one after another, so events arrive in order from a single
/// task. Implementations must still be `Send + Sync` because the pipeline
/// future may move between runtime threads. All methods default to no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// Fragments were segmented, merged and identified.
    ///
    /// # Arguments
    /// * `pages`  — pages that were extracted
    /// * `blocks` — identified blocks handed to the strategy
    fn on_extraction_complete(&self, pages: usize, blocks: usize) {
        let _ = (pages, blocks);
    }

    /// The strategy is about to classify the blocks.
    fn on_classification_start(&self, strategy: &str, blocks: usize) {
        let _ = (strategy, blocks);
    }

    /// A truncated model response is being continued.
    ///
    /// # Arguments
    /// * `attempt` — 1-based continuation number
    /// * `limit`   — configured maximum
    fn on_continuation(&self, attempt: u32, limit: u32) {
        let _ = (attempt, limit);
    }

    /// The strategy produced its directive set.
    fn on_classification_complete(&self, directives: usize) {
        let _ = directives;
    }

    /// Reconstruction finished.
    ///
    /// # Arguments
    /// * `markdown_len` — byte length of the produced Markdown
    fn on_conversion_complete(&self, markdown_len: usize) {
        let _ = markdown_len;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
