//! Input resolution: normalise a user-supplied path or URL to a local file.
//!
//! pdfium opens files by path, so URLs are downloaded into a `TempDir`
//! that lives as long as the returned [`ResolvedInput`]. Both kinds of
//! input must start with the `%PDF` magic bytes.

use crate::error::{BlockdownError, Result};
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// The resolved input, either a local path or a downloaded temp file.
#[derive(Debug)]
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; the PDF lives in a temp directory removed on drop.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    /// Get the path to the PDF file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local PDF file path.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

/// Leading four bytes, or `None` when they are `%PDF`.
fn bad_magic(head: &[u8]) -> Option<[u8; 4]> {
    if head.starts_with(PDF_MAGIC) {
        return None;
    }
    let mut magic = [0u8; 4];
    let n = head.len().min(4);
    magic[..n].copy_from_slice(&head[..n]);
    Some(magic)
}

fn resolve_local(path_str: &str) -> Result<ResolvedInput> {
    let path = PathBuf::from(path_str);

    if !path.is_file() {
        return Err(BlockdownError::FileNotFound { path });
    }

    let mut file = match std::fs::File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(BlockdownError::PermissionDenied { path });
        }
        Err(_) => return Err(BlockdownError::FileNotFound { path }),
    };

    let mut head = Vec::with_capacity(4);
    file.by_ref()
        .take(4)
        .read_to_end(&mut head)
        .map_err(|e| BlockdownError::Internal(format!("Failed to read '{}': {}", path.display(), e)))?;
    if let Some(magic) = bad_magic(&head) {
        return Err(BlockdownError::NotAPdf { path, magic });
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput> {
    info!("Downloading PDF from: {}", url);

    let failed = |reason: String| BlockdownError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            BlockdownError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let filename = filename_from_url(url);
    let temp_dir = TempDir::new().map_err(|e| BlockdownError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;

    if let Some(magic) = bad_magic(&bytes) {
        return Err(BlockdownError::NotAPdf { path: file_path, magic });
    }

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| BlockdownError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded {} bytes to: {}", bytes.len(), file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Last path segment of the URL when it looks like a file name.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn filename_falls_back() {
        assert_eq!(filename_from_url("https://example.com/papers/a.pdf"), "a.pdf");
        assert_eq!(filename_from_url("https://example.com/download"), "downloaded.pdf");
        assert_eq!(filename_from_url("not a url"), "downloaded.pdf");
    }

    #[test]
    fn magic_check() {
        assert_eq!(bad_magic(b"%PDF-1.7\n"), None);
        assert_eq!(bad_magic(b"<htm"), Some(*b"<htm"));
        assert_eq!(bad_magic(b"%P"), Some([b'%', b'P', 0, 0]));
    }

    #[test]
    fn local_pdf_resolves() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"%PDF-1.4\n%%EOF\n").unwrap();
        let resolved = resolve_local(f.path().to_str().unwrap()).unwrap();
        assert_eq!(resolved.path(), f.path());
    }

    #[test]
    fn local_non_pdf_is_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello world").unwrap();
        let err = resolve_local(f.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, BlockdownError::NotAPdf { magic, .. } if &magic == b"hell"));
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = resolve_local("/definitely/not/here.pdf").unwrap_err();
        assert!(matches!(err, BlockdownError::FileNotFound { .. }));
    }
}
