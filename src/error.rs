//! Error types for the blockdown library.
//!
//! Every failure is fatal for the current run. They fall into the stages of
//! the pipeline:
//!
//! * **Input / extraction**: the PDF cannot be found, fetched, bound to
//!   pdfium or decoded. Propagated unchanged from the collaborator.
//! * **Classification**: the strategy could not produce a directive set
//!   (provider missing, API failure, response without a usable JSON object).
//! * **Reconstruction**: a directive does not fit the block sequence
//!   (unknown id, two directives on one block, malformed range). Dropping
//!   such a directive would silently corrupt the output, so it is rejected.
//!
//! Variants carry the offending id or an excerpt of the raw response so a
//! failure can be diagnosed without rerunning the conversion.

use std::path::PathBuf;
use thiserror::Error;

/// Longest raw-response excerpt embedded in an error message.
const EXCERPT_CHARS: usize = 200;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BlockdownError>;

/// All fatal errors returned by the blockdown library.
#[derive(Debug, Error)]
pub enum BlockdownError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// Selected page numbers exceed the actual page count.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// pdfium returned an error while reading a page's text objects.
    #[error("Text extraction failed for page {page}: {detail}")]
    ExtractionFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install libpdfium system-wide, or set PDFIUM_LIB_PATH=/path/to/libpdfium\n\
(a file or the directory containing it).\n"
    )]
    PdfiumBindingFailed(String),

    // ── Classification errors ─────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The LLM API returned an error.
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    /// A single LLM call exceeded the configured timeout.
    #[error("LLM call timed out after {secs}s")]
    ApiTimeout { secs: u64 },

    /// The service stopped for a reason other than completion or length.
    #[error("Unexpected finish reason '{reason}' from the model")]
    UnexpectedFinish { reason: String },

    /// The response was still truncated after every allowed continuation.
    #[error("Model output still truncated after {continuations} continuations")]
    ContinuationLimit { continuations: u32 },

    /// No balanced JSON object could be located in the model output.
    #[error("No JSON object found in model response: {excerpt:?}")]
    MissingJson { excerpt: String },

    /// A JSON object was found but does not match the directive schema.
    #[error("Model response does not match the directive schema: {detail}\nResponse: {excerpt:?}")]
    SchemaMismatch { detail: String, excerpt: String },

    // ── Reconstruction errors ─────────────────────────────────────────────
    /// A directive names a block id that does not exist in the document.
    #[error("Directive references unknown block '{id}'")]
    UnknownId { id: String },

    /// Two directives claim the same block.
    #[error("Block '{id}' is targeted by more than one directive")]
    DuplicateDirective { id: String },

    /// A range whose end precedes its start.
    #[error("Directive range '{start}'..'{end}' runs backwards")]
    InvertedRange { start: String, end: String },

    /// A directive id list with a length other than 1 or 2.
    #[error("Directive id range must hold 1 or 2 ids, got {len}")]
    InvalidRangeLength { len: usize },

    /// A string that is not a `{page}-{block}` (or fragment) identifier.
    #[error("Malformed identifier '{id}'")]
    InvalidId { id: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Shorten a raw model response for inclusion in an error.
pub(crate) fn excerpt(raw: &str) -> String {
    let raw = raw.trim();
    if raw.chars().count() <= EXCERPT_CHARS {
        raw.to_string()
    } else {
        let head: String = raw.chars().take(EXCERPT_CHARS).collect();
        format!("{head}\u{2026}")
    }
}
