//! Wire format between the model strategy and the chat-completion service.
//!
//! Request:
//!
//! ```json
//! {"outline": [{"title": "Intro"}], "items": [{"i": "0-0", "h": 1.6, "s": "Title", "y": 742.0}]}
//! ```
//!
//! Response, the sparse form and nothing else:
//!
//! ```json
//! {"x": ["0-3"], "r": [["0-0", "# Title\n"]]}
//! ```
//!
//! Both keys may be absent. Any other key, including a dense
//! `instructions` array or an explicit `"o"` list, is a schema error.
//! Text after the JSON object is ignored.

use crate::directive::Directive;
use crate::error::{excerpt, BlockdownError, Result};
use crate::ids::BlockId;
use crate::model::{Document, OutlineNode};
use serde::{Deserialize, Serialize};

/// Request payload sent to the model.
#[derive(Debug, Serialize)]
pub struct ClassificationRequest<'a> {
    pub outline: &'a [OutlineNode],
    pub items: Vec<RequestItem<'a>>,
}

/// One block as the model sees it.
#[derive(Debug, Serialize)]
pub struct RequestItem<'a> {
    pub i: BlockId,
    pub h: f64,
    pub s: &'a str,
    pub y: f64,
}

impl<'a> ClassificationRequest<'a> {
    pub fn from_document(doc: &'a Document) -> Self {
        Self {
            outline: &doc.outline,
            items: doc
                .blocks
                .iter()
                .map(|b| RequestItem {
                    i: b.id,
                    h: b.height,
                    s: &b.text,
                    y: b.y,
                })
                .collect(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| BlockdownError::Internal(format!("request serialisation failed: {e}")))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SparseResponse {
    #[serde(default)]
    x: Vec<String>,
    #[serde(default)]
    r: Vec<(String, String)>,
}

/// Parse raw model output into directives.
///
/// Locates the first balanced JSON object, then validates it against the
/// sparse schema. Id collisions are left to reconstruction, which knows the
/// block sequence.
pub fn parse_response(raw: &str) -> Result<Vec<Directive>> {
    let json = find_json_object(raw).ok_or_else(|| BlockdownError::MissingJson { excerpt: excerpt(raw) })?;

    let mismatch = |detail: String| BlockdownError::SchemaMismatch {
        detail,
        excerpt: excerpt(json),
    };

    let response: SparseResponse = serde_json::from_str(json).map_err(|e| mismatch(e.to_string()))?;
    let id = |s: &str| {
        s.parse::<BlockId>()
            .map_err(|_| mismatch(format!("'{s}' is not a block id")))
    };

    let mut directives = Vec::with_capacity(response.x.len() + response.r.len());
    for s in &response.x {
        directives.push(Directive::omit(id(s)?));
    }
    for (s, text) in response.r {
        directives.push(Directive::replace(id(&s)?, text));
    }
    Ok(directives)
}

/// First balanced top-level `{...}` in `raw` that parses as a JSON object.
///
/// Braces inside string literals are ignored. Candidates that balance but
/// do not parse (prose such as `{see below}`) are skipped. The search stops
/// at the first `{` that is still open at the end of `raw`, so a truncated
/// answer fails in one pass.
pub fn find_json_object(raw: &str) -> Option<&str> {
    let bytes = raw.as_bytes();
    let mut from = 0;
    while let Some(offset) = raw[from..].find('{') {
        let start = from + offset;
        // A `{` that never closes leaves every later one unclosed too.
        let end = balanced_end(bytes, start)?;
        let candidate = &raw[start..=end];
        if matches!(serde_json::from_str::<serde_json::Value>(candidate), Ok(serde_json::Value::Object(_))) {
            return Some(candidate);
        }
        from = start + 1;
    }
    None
}

/// Index of the `}` closing the `{` at `start`.
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Block, Fragment};

    fn id(s: &str) -> BlockId {
        s.parse().unwrap()
    }

    #[test]
    fn request_shape() {
        let mut block = Block::start(0, Fragment::new("Title", 1.6, 742.0, "B"));
        block.id = id("0-0");
        let doc = Document {
            outline: vec![OutlineNode::new("Intro")],
            blocks: vec![block],
            ..Default::default()
        };
        let json = ClassificationRequest::from_document(&doc).to_json().unwrap();
        assert_eq!(
            json,
            r#"{"outline":[{"title":"Intro"}],"items":[{"i":"0-0","h":1.6,"s":"Title","y":742.0}]}"#
        );
    }

    #[test]
    fn parses_sparse_object_surrounded_by_prose() {
        let raw = "Sure! Here you go:\n```json\n{\"x\": [\"0-3\"], \"r\": [[\"0-0\", \"# Title {1}\\n\"]]}\n```\nLet me know {if} you need more.";
        let directives = parse_response(raw).unwrap();
        assert_eq!(
            directives,
            vec![Directive::omit(id("0-3")), Directive::replace(id("0-0"), "# Title {1}\n")]
        );
    }

    #[test]
    fn missing_keys_default_to_empty() {
        assert!(parse_response("{}").unwrap().is_empty());
        assert_eq!(parse_response(r#"{"x":["1-2"]}"#).unwrap(), vec![Directive::omit(id("1-2"))]);
    }

    #[test]
    fn prose_braces_are_skipped() {
        let raw = r#"{not json} then {"r": [["2-0", "$x$"]]}"#;
        assert_eq!(parse_response(raw).unwrap(), vec![Directive::replace(id("2-0"), "$x$")]);
    }

    #[test]
    fn no_json_is_missing_json() {
        let err = parse_response("I cannot help with that.").unwrap_err();
        assert!(matches!(err, BlockdownError::MissingJson { ref excerpt } if excerpt.contains("cannot help")));
        assert!(matches!(parse_response("{\"x\": [").unwrap_err(), BlockdownError::MissingJson { .. }));
    }

    #[test]
    fn explicit_output_and_dense_forms_are_rejected() {
        for raw in [
            r#"{"o": ["0-0"], "x": []}"#,
            r#"{"instructions": [["0-0", "x"]]}"#,
        ] {
            let err = parse_response(raw).unwrap_err();
            assert!(matches!(err, BlockdownError::SchemaMismatch { .. }), "got: {err}");
        }
    }

    #[test]
    fn malformed_entries_are_schema_errors() {
        let err = parse_response(r#"{"r": [["0-0"]]}"#).unwrap_err();
        assert!(matches!(err, BlockdownError::SchemaMismatch { .. }));

        let err = parse_response(r#"{"x": ["title"]}"#).unwrap_err();
        match err {
            BlockdownError::SchemaMismatch { detail, excerpt } => {
                assert!(detail.contains("'title'"));
                assert!(excerpt.contains("\"x\""));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unclosed_brace_ends_the_search() {
        let truncated = format!("{{\"r\": [[\"0-0\", \"{}", "{ [".repeat(20_000));
        assert_eq!(find_json_object(&truncated), None);
        assert!(matches!(parse_response(&truncated).unwrap_err(), BlockdownError::MissingJson { .. }));

        assert_eq!(find_json_object(r#"{"x": [} {"x": []}"#), Some(r#"{"x": []}"#));
        assert_eq!(find_json_object(r#"{"x": ["0-1"]"#), None);
    }

    #[test]
    fn find_json_handles_escaped_quotes() {
        let raw = r#"{"r": [["0-0", "say \"}\" loudly"]]} trailing"#;
        assert_eq!(find_json_object(raw), Some(r#"{"r": [["0-0", "say \"}\" loudly"]]}"#));
    }
}
