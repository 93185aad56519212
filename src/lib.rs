//! # blockdown
//!
//! Convert PDF documents to Markdown by splitting their text into
//! addressable blocks and applying sparse per-block directives.
//!
//! Every block gets a stable `{page}-{block}` id. A classification strategy
//! (passthrough, heuristic rules, or an LLM) answers with directives only
//! for the blocks that need changing: omit it, or replace it with literal
//! Markdown. Blocks without a directive are copied verbatim, so the model
//! never has to reproduce the document's text.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input        resolve local file or download from URL
//!  ├─ 2. Extract      text fragments, outline, metadata via pdfium (spawn_blocking)
//!  ├─ 3. Segment      fragments → blocks, heights normalised to body text = 1.0
//!  ├─ 4. Merge        rejoin split paragraphs, assign ids
//!  ├─ 5. Classify     passthrough / rules / model → sparse directives
//!  └─ 6. Reconstruct  directives + blocks → Markdown
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use blockdown::{convert, ConversionConfig, StrategyKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .strategy(StrategyKind::RuleBased)
//!         .build()?;
//!     let output = convert("document.pdf", &config).await?;
//!     println!("{}", output.markdown);
//!     eprintln!("{} blocks, {} directives",
//!         output.stats.blocks,
//!         output.directives.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `blockdown` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! blockdown = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod directive;
pub mod error;
pub mod ids;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod strategy;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, PageSelection, StrategyKind};
pub use convert::{apply_directives, convert, convert_document, convert_from_bytes, convert_sync, convert_to_file, inspect};
pub use directive::{Directive, IdRange};
pub use error::{BlockdownError, Result};
pub use ids::{BlockId, FragmentId};
pub use model::{Block, Document, Fragment, OutlineNode, PageFragments};
pub use output::{ConversionOutput, ConversionStats, DocumentMetadata};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use strategy::{Classification, Strategy};
