//! Fragment extraction via pdfium.
//!
//! Each text object on a page becomes one [`Fragment`], in content-stream
//! order. pdfium reports no end-of-line marker, so line breaks are inferred
//! from baselines: a fragment ends a line when the next fragment's baseline
//! differs from its own by more than half its height, and the last fragment
//! of every page ends a line.
//!
//! pdfium is not async-safe, so all work runs in `spawn_blocking`.
//!
//! The library is bound from `PDFIUM_LIB_PATH` (a file, or a directory
//! holding the platform library) when set, otherwise from the system
//! library path.

use crate::config::PageSelection;
use crate::error::{BlockdownError, Result};
use crate::model::{Fragment, OutlineNode, PageFragments};
use crate::output::DocumentMetadata;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Bookmark trees deeper than this are cut off.
const MAX_OUTLINE_DEPTH: usize = 16;
/// Guard against sibling cycles in malformed bookmark trees.
const MAX_OUTLINE_SIBLINGS: usize = 4096;

/// Everything the pipeline needs from a PDF.
#[derive(Debug, Clone, Default)]
pub struct ExtractedDocument {
    pub pages: Vec<PageFragments>,
    pub outline: Vec<OutlineNode>,
    pub metadata: DocumentMetadata,
}

impl ExtractedDocument {
    pub fn fragment_count(&self) -> usize {
        self.pages.iter().map(|p| p.fragments.len()).sum()
    }
}

/// Extract fragments from the selected pages, plus the outline and metadata.
///
/// Fragments keep the real 0-based page index, so a partial selection still
/// yields ids that match the source document.
pub async fn extract_document(
    pdf_path: &Path,
    password: Option<&str>,
    selection: &PageSelection,
) -> Result<ExtractedDocument> {
    let path = pdf_path.to_path_buf();
    let password = password.map(str::to_string);
    let selection = selection.clone();

    tokio::task::spawn_blocking(move || extract_blocking(&path, password.as_deref(), &selection))
        .await
        .map_err(|e| BlockdownError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Read document metadata without touching page content.
pub async fn extract_metadata(pdf_path: &Path, password: Option<&str>) -> Result<DocumentMetadata> {
    let path = pdf_path.to_path_buf();
    let password = password.map(str::to_string);

    tokio::task::spawn_blocking(move || {
        let pdfium = bind_pdfium()?;
        let document = open_document(&pdfium, &path, password.as_deref())?;
        Ok(read_metadata(&document))
    })
    .await
    .map_err(|e| BlockdownError::Internal(format!("Metadata task panicked: {}", e)))?
}

fn extract_blocking(pdf_path: &Path, password: Option<&str>, selection: &PageSelection) -> Result<ExtractedDocument> {
    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, pdf_path, password)?;
    let metadata = read_metadata(&document);
    let total_pages = metadata.page_count;
    info!("PDF loaded: {} pages", total_pages);

    let page_indices = selection.to_indices(total_pages);
    if page_indices.is_empty() {
        return Err(BlockdownError::PageOutOfRange {
            page: first_requested(selection),
            total: total_pages,
        });
    }
    debug!("Selected {} pages for extraction", page_indices.len());

    let mut pages = Vec::with_capacity(page_indices.len());
    for idx in page_indices {
        let page = document
            .pages()
            .get(idx as u16)
            .map_err(|e| BlockdownError::ExtractionFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?;
        let extracted = read_page(idx, &page);
        debug!("Page {}: {} fragments", idx + 1, extracted.fragments.len());
        pages.push(extracted);
    }

    let outline = read_outline(&document);
    let extracted = ExtractedDocument {
        pages,
        outline,
        metadata,
    };
    info!(
        "Extracted {} fragments from {} pages ({} outline entries)",
        extracted.fragment_count(),
        extracted.pages.len(),
        extracted.outline.len()
    );
    Ok(extracted)
}

/// 1-indexed page named by a selection, for error messages.
fn first_requested(selection: &PageSelection) -> usize {
    match selection {
        PageSelection::All => 0,
        PageSelection::Single(p) | PageSelection::Range(p, _) => *p,
        PageSelection::Set(pages) => pages.iter().copied().max().unwrap_or(0),
    }
}

fn bind_pdfium() -> Result<Pdfium> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(p) if !p.is_empty() => {
            let path = PathBuf::from(p);
            let lib = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&path)
            } else {
                path
            };
            debug!("Binding pdfium from {}", lib.display());
            Pdfium::bind_to_library(&lib)
        }
        _ => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| BlockdownError::PdfiumBindingFailed(format!("{:?}", e)))?;
    Ok(Pdfium::new(bindings))
}

fn open_document<'a>(pdfium: &'a Pdfium, pdf_path: &Path, password: Option<&'a str>) -> Result<PdfDocument<'a>> {
    pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                BlockdownError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                BlockdownError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            BlockdownError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}

fn read_page(index: usize, page: &PdfPage) -> PageFragments {
    let mut fragments = Vec::new();
    for object in page.objects().iter() {
        let Some(text) = object.as_text_object() else {
            continue;
        };
        let y = object
            .bounds()
            .map(|b| round_to(b.bottom().value as f64, 1))
            .unwrap_or(0.0);
        fragments.push(Fragment::new(
            text.text(),
            round_to(text.scaled_font_size().value as f64, 2),
            y,
            text.font().name(),
        ));
    }
    infer_line_breaks(&mut fragments);

    PageFragments {
        index,
        height: page.height().value as f64,
        fragments,
    }
}

/// Flag fragments that end a line, judged by the next fragment's baseline.
pub fn infer_line_breaks(fragments: &mut [Fragment]) {
    for i in 0..fragments.len() {
        let line_break = match fragments.get(i + 1) {
            Some(next) => (next.y - fragments[i].y).abs() > fragments[i].height / 2.0,
            None => true,
        };
        fragments[i].line_break = line_break;
    }
}

fn read_outline(document: &PdfDocument) -> Vec<OutlineNode> {
    outline_level(document.bookmarks().root(), 0)
}

fn outline_level(first: Option<PdfBookmark>, depth: usize) -> Vec<OutlineNode> {
    let mut nodes = Vec::new();
    if depth >= MAX_OUTLINE_DEPTH {
        return nodes;
    }
    let mut current = first;
    while let Some(bookmark) = current {
        if nodes.len() >= MAX_OUTLINE_SIBLINGS {
            warn!("Outline level truncated at {} entries", MAX_OUTLINE_SIBLINGS);
            break;
        }
        let title = bookmark.title().unwrap_or_default();
        let children = outline_level(bookmark.first_child(), depth + 1);
        nodes.push(OutlineNode::new(title.trim()).with_children(children));
        current = bookmark.next_sibling();
    }
    nodes
}

fn read_metadata(document: &PdfDocument) -> DocumentMetadata {
    let metadata = document.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
        page_count: document.pages().len() as usize,
        pdf_version: format!("{:?}", document.version()),
    }
}

fn round_to(v: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (v * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(y: f64, height: f64) -> Fragment {
        Fragment::new("w", height, y, "F")
    }

    #[test]
    fn line_breaks_follow_baseline_jumps() {
        let mut fragments = vec![
            frag(700.0, 10.0),
            frag(701.0, 10.0),
            frag(688.0, 10.0),
            frag(688.0, 10.0),
        ];
        infer_line_breaks(&mut fragments);
        let flags: Vec<bool> = fragments.iter().map(|f| f.line_break).collect();
        assert_eq!(flags, vec![false, true, false, true]);
    }

    #[test]
    fn superscript_stays_on_line() {
        let mut fragments = vec![frag(500.0, 12.0), frag(502.0, 7.0), frag(500.0, 12.0)];
        infer_line_breaks(&mut fragments);
        assert_eq!(fragments.iter().filter(|f| f.line_break).count(), 1);
        assert!(fragments[2].line_break);
    }

    #[test]
    fn empty_page_is_fine() {
        let mut fragments: Vec<Fragment> = Vec::new();
        infer_line_breaks(&mut fragments);
        assert!(fragments.is_empty());
    }

    #[test]
    fn out_of_range_reports_requested_page() {
        assert_eq!(first_requested(&PageSelection::Single(9)), 9);
        assert_eq!(first_requested(&PageSelection::Set(vec![4, 12])), 12);
        assert_eq!(first_requested(&PageSelection::All), 0);
    }

    #[test]
    fn rounding() {
        assert_eq!(round_to(11.957, 2), 11.96);
        assert_eq!(round_to(700.04, 1), 700.0);
    }
}
