//! Prompts for the model-based classification strategy.
//!
//! The model never writes the document itself. It reads the identified
//! block list and answers with a sparse directive object; reconstruction
//! then stitches the final Markdown together locally. The wording below is
//! the default only: callers can override both the system prompt and the
//! instruction template via [`crate::config::ConversionConfig`].

/// Placeholder in the instruction template replaced by the request JSON.
pub const REQUEST_PLACEHOLDER: &str = "{request_json}";

/// Default system prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You turn text blocks extracted from a PDF into Markdown conversion directives. You answer with a single JSON object and nothing else.";

/// Default instruction template. `{request_json}` is substituted with the
/// serialised `{outline, items}` request.
pub const DEFAULT_INSTRUCTION_TEMPLATE: &str = r#"Below is the text of a PDF, split into blocks. Decide how each block should appear in a Markdown rendering of the document.

The request has this shape:

{
  "outline": [{ "title": "...", "children": [{ "title": "..." }] }],
  "items": [{ "i": "<block id>", "s": "<text>", "h": <height>, "y": <baseline y> }]
}

- `outline` is the document's table of contents, when it has one.
- `i` identifies a block as "<page>-<block>".
- `h` is the text height relative to body text: 1.0 is body text, larger values are headings, smaller values are notes, captions, page numbers.
- `y` is the baseline position in page points, measured from the bottom of the page.

Every block is copied to the output unchanged unless you say otherwise. You can say two things:

- omit a block: add its id to the "x" array;
- replace a block: add ["<id>", "<markdown>"] to the "r" array. The markdown is the final text for that block, including any trailing newline it needs.

Answer with exactly this JSON object:

{"x": ["<id>", ...], "r": [["<id>", "<markdown>"], ...]}

Rules:

1. Do not list blocks that should be copied unchanged. There is no "keep" instruction.
2. An id may appear at most once across "x" and "r".
3. When several blocks form one heading, equation, table or paragraph, replace the first block and omit the others.
4. Use the outline to choose heading levels (#, ##, ###).
5. Omit page numbers, running headers and footers.
6. Write tables as GFM pipe tables and mathematical expressions as $...$ or $$...$$.
7. Output nothing after the JSON object.

Request:

```json
{request_json}
```"#;

/// User turn appended when the previous response stopped at the token limit.
pub const CONTINUE_PROMPT: &str =
    "Your answer was cut off. Continue exactly where it stopped, without repeating anything.";

/// Substitute the request JSON into an instruction template.
pub fn render_instructions(template: &str, request_json: &str) -> String {
    template.replace(REQUEST_PLACEHOLDER, request_json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_template_has_placeholder_once() {
        assert_eq!(DEFAULT_INSTRUCTION_TEMPLATE.matches(REQUEST_PLACEHOLDER).count(), 1);
    }

    #[test]
    fn default_template_names_sparse_keys() {
        assert!(DEFAULT_INSTRUCTION_TEMPLATE.contains(r#""x""#));
        assert!(DEFAULT_INSTRUCTION_TEMPLATE.contains(r#""r""#));
    }

    #[test]
    fn render_substitutes_request() {
        let out = render_instructions("data: {request_json}", r#"{"items":[]}"#);
        assert_eq!(out, r#"data: {"items":[]}"#);
    }
}
