//! Pipeline stages for block-based PDF-to-Markdown conversion.
//!
//! Each submodule implements exactly one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ segment ──▶ merge ──▶ (strategy) ──▶ reconstruct
//! (URL/path) (pdfium)   (blocks)    (ids)     (directives)   (Markdown)
//! ```
//!
//! 1. [`input`]       — canonicalise the user-supplied path or URL to a local file
//! 2. [`extract`]     — read text fragments, outline and metadata; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 3. [`segment`]     — fold fragments into blocks, normalise heights document-wide
//! 4. [`merge`]       — rejoin body paragraphs split into single-line blocks, assign ids
//! 5. [`reconstruct`] — apply the strategy's sparse directives to the block sequence
//!
//! Classification sits between 4 and 5 and lives in [`crate::strategy`].
//! Stages 3 to 5 are synchronous and pure.

pub mod extract;
pub mod input;
pub mod merge;
pub mod reconstruct;
pub mod segment;
