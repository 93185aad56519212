//! Conversion results: the Markdown plus everything needed to explain it.

use crate::directive::Directive;
use crate::error::{BlockdownError, Result};
use crate::model::{Block, OutlineNode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Result of one conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Final Markdown document.
    pub markdown: String,
    /// Identified blocks the strategy classified.
    pub blocks: Vec<Block>,
    /// Directives the strategy produced.
    pub directives: Vec<Directive>,
    pub outline: Vec<OutlineNode>,
    /// Raw model output, when the model strategy ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    pub metadata: DocumentMetadata,
    pub stats: ConversionStats,
}

impl ConversionOutput {
    /// Write intermediate artefacts for offline inspection.
    ///
    /// Creates `dir` if needed and writes `blocks.json`, `directives.json`,
    /// `outline.json`, `converted.md` and, when a model ran, `response.txt`.
    /// Returns the paths written.
    pub fn write_diagnostics(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| BlockdownError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let mut files: Vec<(&str, String)> = vec![
            ("blocks.json", to_json(&self.blocks)?),
            ("directives.json", to_json(&self.directives)?),
            ("outline.json", to_json(&self.outline)?),
            ("converted.md", self.markdown.clone()),
        ];
        if let Some(raw) = &self.raw_response {
            files.push(("response.txt", raw.clone()));
        }

        let mut written = Vec::with_capacity(files.len());
        for (name, contents) in files {
            let path = dir.join(name);
            std::fs::write(&path, contents).map_err(|e| BlockdownError::OutputWriteFailed {
                path: path.clone(),
                source: e,
            })?;
            written.push(path);
        }
        debug!("Wrote {} diagnostic files to {}", written.len(), dir.display());
        Ok(written)
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| BlockdownError::Internal(format!("JSON serialisation failed: {e}")))
}

/// Metadata read from the PDF's information dictionary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

/// Counters and timings for one conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Pages in the source document.
    pub total_pages: usize,
    /// Pages that were extracted.
    pub processed_pages: usize,
    pub fragments: usize,
    /// Blocks after segmentation, before merging.
    pub segmented_blocks: usize,
    /// Blocks after merging, as handed to the strategy.
    pub blocks: usize,
    pub omit_directives: usize,
    pub replace_directives: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub continuations: u32,
    pub extraction_duration_ms: u64,
    pub classification_duration_ms: u64,
    pub reconstruction_duration_ms: u64,
    pub total_duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::BlockId;

    fn output(raw: Option<&str>) -> ConversionOutput {
        ConversionOutput {
            markdown: "# Title\nbody\n".into(),
            directives: vec![Directive::omit("0-2".parse::<BlockId>().unwrap())],
            outline: vec![OutlineNode::new("Title")],
            raw_response: raw.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn diagnostics_without_model_response() {
        let dir = tempfile::tempdir().unwrap();
        let written = output(None).write_diagnostics(dir.path().join("diag")).unwrap();
        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["blocks.json", "directives.json", "outline.json", "converted.md"]);

        let md = std::fs::read_to_string(dir.path().join("diag/converted.md")).unwrap();
        assert_eq!(md, "# Title\nbody\n");
        let directives: Vec<Directive> =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("diag/directives.json")).unwrap()).unwrap();
        assert_eq!(directives.len(), 1);
    }

    #[test]
    fn diagnostics_include_raw_response() {
        let dir = tempfile::tempdir().unwrap();
        let written = output(Some("{\"x\":[\"0-2\"]}")).write_diagnostics(dir.path()).unwrap();
        assert_eq!(written.len(), 5);
        let raw = std::fs::read_to_string(dir.path().join("response.txt")).unwrap();
        assert_eq!(raw, "{\"x\":[\"0-2\"]}");
    }
}
