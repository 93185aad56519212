//! Conversion entry points.
//!
//! [`convert`] runs the whole pipeline on a path or URL. [`convert_document`]
//! starts from fragments that were already extracted, which is how callers
//! plug in a different extractor and how the pipeline is tested without
//! pdfium.

use crate::config::ConversionConfig;
use crate::directive::Directive;
use crate::error::{BlockdownError, Result};
use crate::model::{Document, OutlineNode, PageFragments};
use crate::output::{ConversionOutput, ConversionStats, DocumentMetadata};
use crate::pipeline::{extract, input, merge, reconstruct, segment};
use crate::progress::ProgressCallback;
use crate::strategy::Strategy;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Model used when a provider is named without one.
const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Convert a PDF file or URL to Markdown.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input_str` — Local file path or HTTP/HTTPS URL to a PDF
/// * `config` — Conversion configuration
///
/// # Errors
/// Every failure is fatal: input, extraction, classification or
/// reconstruction errors abort the run and are returned unchanged.
pub async fn convert(input_str: impl AsRef<str>, config: &ConversionConfig) -> Result<ConversionOutput> {
    let total_start = Instant::now();
    let input_str = input_str.as_ref();
    info!("Starting conversion: {} (strategy: {})", input_str, config.strategy);

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let pdf_path = resolved.path().to_path_buf();

    // ── Step 2: Build strategy (resolves the provider for the model strategy) ──
    let strategy = Strategy::from_config(config).await?;

    // ── Step 3: Extract fragments ────────────────────────────────────────
    let extract_start = Instant::now();
    let extracted = extract::extract_document(&pdf_path, config.password.as_deref(), &config.pages).await?;
    let extraction_duration_ms = extract_start.elapsed().as_millis() as u64;

    // ── Step 4: Segment, classify, reconstruct ───────────────────────────
    let mut output = convert_document(
        extracted.pages,
        extracted.outline,
        &strategy,
        config.progress_callback.as_ref(),
    )
    .await?;

    output.stats.total_pages = extracted.metadata.page_count;
    output.stats.extraction_duration_ms = extraction_duration_ms;
    output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    output.metadata = extracted.metadata;

    info!(
        "Conversion complete: {}/{} pages, {} blocks, {}ms total",
        output.stats.processed_pages, output.stats.total_pages, output.stats.blocks, output.stats.total_duration_ms
    );
    Ok(output)
}

/// Run segmentation, classification and reconstruction on extracted pages.
///
/// Pages must be in document order; their `index` becomes the page part of
/// every block id. Metadata and extraction timings are left at their
/// defaults.
pub async fn convert_document(
    pages: Vec<PageFragments>,
    outline: Vec<OutlineNode>,
    strategy: &Strategy,
    progress: Option<&ProgressCallback>,
) -> Result<ConversionOutput> {
    let start = Instant::now();
    let mut stats = ConversionStats {
        processed_pages: pages.len(),
        fragments: pages.iter().map(|p| p.fragments.len()).sum(),
        ..Default::default()
    };

    let (segmented, body_height) = segment::segment_document(&pages);
    stats.segmented_blocks = segmented.iter().map(|p| p.blocks.len()).sum();
    let page_heights = segmented.iter().map(|p| (p.index, p.height)).collect();
    let blocks = merge::assign_ids(merge::merge_document(segmented));
    stats.blocks = blocks.len();

    let doc = Document {
        outline,
        blocks,
        page_heights,
        body_height,
    };
    if let Some(cb) = progress {
        cb.on_extraction_complete(stats.processed_pages, stats.blocks);
        cb.on_classification_start(strategy.name(), stats.blocks);
    }

    let classify_start = Instant::now();
    let classification = strategy.classify(&doc, progress).await?;
    stats.classification_duration_ms = classify_start.elapsed().as_millis() as u64;
    stats.omit_directives = classification.directives.iter().filter(|d| d.is_omit()).count();
    stats.replace_directives = classification.directives.len() - stats.omit_directives;
    stats.input_tokens = classification.input_tokens as u64;
    stats.output_tokens = classification.output_tokens as u64;
    stats.continuations = classification.continuations;
    if let Some(cb) = progress {
        cb.on_classification_complete(classification.directives.len());
    }

    let reconstruct_start = Instant::now();
    let markdown = reconstruct::reconstruct(&doc.blocks, &classification.directives)?;
    stats.reconstruction_duration_ms = reconstruct_start.elapsed().as_millis() as u64;
    stats.total_duration_ms = start.elapsed().as_millis() as u64;
    debug!("Reconstructed {} bytes of Markdown", markdown.len());

    if let Some(cb) = progress {
        cb.on_conversion_complete(markdown.len());
    }

    Ok(ConversionOutput {
        markdown,
        blocks: doc.blocks,
        directives: classification.directives,
        outline: doc.outline,
        raw_response: classification.raw_response,
        metadata: DocumentMetadata::default(),
        stats,
    })
}

/// Apply an externally produced directive set to extracted pages.
///
/// Runs the same segmentation and id assignment as [`convert_document`], so
/// ids in `directives` refer to the blocks a previous run reported.
pub fn apply_directives(pages: &[PageFragments], directives: &[Directive]) -> Result<String> {
    let (segmented, _) = segment::segment_document(pages);
    let blocks = merge::assign_ids(merge::merge_document(segmented));
    reconstruct::reconstruct(&blocks, directives)
}

/// Convert a PDF and write output directly to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats> {
    let output = convert(input_str, config).await?;
    write_atomic(output_path.as_ref(), &output.markdown).await?;
    Ok(output.stats)
}

/// Write `contents` to a sibling temp file, then rename over `path`.
pub(crate) async fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let write_failed = |e: std::io::Error| BlockdownError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, contents).await.map_err(write_failed)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_failed)?;
    Ok(())
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(input_str: impl AsRef<str>, config: &ConversionConfig) -> Result<ConversionOutput> {
    tokio::runtime::Runtime::new()
        .map_err(|e| BlockdownError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config))
}

/// Extract PDF metadata without converting content.
///
/// Does not require an LLM provider or API key.
pub async fn inspect(input_str: impl AsRef<str>, config: &ConversionConfig) -> Result<DocumentMetadata> {
    let resolved = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    extract::extract_metadata(resolved.path(), config.password.as_deref()).await
}

/// Convert PDF bytes in memory to Markdown.
///
/// The bytes are written to a managed [`tempfile`] that is removed on return.
///
/// # Example
/// ```rust,no_run
/// use blockdown::{convert_from_bytes, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("document.pdf")?;
/// let config = ConversionConfig::default();
/// let output = convert_from_bytes(&bytes, &config).await?;
/// println!("{}", output.markdown);
/// # Ok(())
/// # }
/// ```
pub async fn convert_from_bytes(bytes: &[u8], config: &ConversionConfig) -> Result<ConversionOutput> {
    let mut tmp = tempfile::NamedTempFile::new().map_err(|e| BlockdownError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| BlockdownError::Internal(format!("tempfile write: {e}")))?;
    let path = tmp.path().to_string_lossy().to_string();
    // `tmp` is dropped (and the file deleted) when `convert` returns
    convert(&path, config).await
}

// ── Provider resolution ──────────────────────────────────────────────────

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| BlockdownError::ProviderNotConfigured {
        provider: provider_name.to_string(),
        hint: format!("{e}"),
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. `config.provider`, used as-is
/// 2. `config.provider_name` with `config.model`
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set
/// 4. OpenAI, when `OPENAI_API_KEY` is set
/// 5. [`ProviderFactory::from_env`] auto-detection
pub(crate) async fn resolve_provider(config: &ConversionConfig) -> Result<Arc<dyn LLMProvider>> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (std::env::var("EDGEQUAKE_LLM_PROVIDER"), std::env::var("EDGEQUAKE_MODEL")) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, config.model.as_deref().unwrap_or(&model));
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) = ProviderFactory::from_env().map_err(|e| BlockdownError::ProviderNotConfigured {
        provider: "auto".to_string(),
        hint: format!(
            "No LLM provider could be auto-detected from environment.\n\
            Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
            Error: {}",
            e
        ),
    })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Fragment;

    fn pages() -> Vec<PageFragments> {
        vec![PageFragments {
            index: 0,
            height: 800.0,
            fragments: vec![
                Fragment::new("Acme Corp", 10.0, 700.0, "A"),
                Fragment::new(" — Annual Report", 10.0, 700.0, "A"),
                Fragment::new("2024", 16.0, 700.0, "B").with_line_break(true),
            ],
        }]
    }

    #[tokio::test]
    async fn passthrough_reproduces_block_text() {
        let out = convert_document(pages(), vec![], &Strategy::Passthrough, None).await.unwrap();
        assert_eq!(out.markdown, "Acme Corp — Annual Report2024\n");
        assert_eq!(out.stats.fragments, 3);
        assert_eq!(out.stats.segmented_blocks, 2);
        assert_eq!(out.stats.blocks, 2);
        assert!(out.directives.is_empty());
    }

    #[test]
    fn external_directives_apply_to_same_ids() {
        let id = "0-1".parse::<crate::ids::BlockId>().unwrap();
        let md = apply_directives(&pages(), &[Directive::replace(id, "# 2024\n")]).unwrap();
        assert_eq!(md, "Acme Corp — Annual Report# 2024\n");
    }

    #[tokio::test]
    async fn atomic_write_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.md");
        write_atomic(&path, "# hi\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# hi\n");
        assert!(!path.with_extension("md.tmp").exists());
    }
}
