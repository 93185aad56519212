//! Deterministic rule-based classifier.
//!
//! Works on normalised heights (body text = `1.0`) and on each block's
//! vertical position as a fraction of its page height. Rules are tried in
//! order and the first match wins:
//!
//! | Rule | Condition | Directive |
//! |------|-----------|-----------|
//! | footer | `h < 0.8` and more than `0.35` away from page centre | omit |
//! | heading | `h > 1.1` | `# text` (`h > 1.5`) or `## text` |
//! | reference | after a `References` heading | `[^n]` |
//! | figure | text starts with `Figure` | `![caption](FigureN.png)` |
//! | table | text starts with `Table` | caption kept, following rows become one GFM table |
//! | math | fewer than 4 chars and `h < 0.9` | consecutive runs become `$...$` |
//!
//! Everything else is left to the implicit verbatim default.

use crate::directive::{Directive, IdRange};
use crate::ids::BlockId;
use crate::model::{Block, Document};
use once_cell::sync::Lazy;
use regex::Regex;

const FOOTER_MAX_HEIGHT: f64 = 0.8;
const FOOTER_MIN_CENTRE_OFFSET: f64 = 0.35;
const HEADING_MIN_HEIGHT: f64 = 1.1;
const H1_MIN_HEIGHT: f64 = 1.5;
const TABLE_MARGIN_MAX_HEIGHT: f64 = 0.9;
const TABLE_MARGIN_EDGE: f64 = 0.05;
const MATH_MAX_CHARS: usize = 4;
const MATH_MAX_HEIGHT: f64 = 0.9;

static FIGURE_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Figure\s*\d+\.\s*").unwrap());
static CELL_GAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

/// Classify every block of `doc`. State lives only for the duration of the call.
pub fn classify(doc: &Document) -> Vec<Directive> {
    RuleClassifier::new(doc).run()
}

struct RuleClassifier<'a> {
    doc: &'a Document,
    directives: Vec<Directive>,
    in_references: bool,
    references: usize,
    figures: usize,
    math: Option<MathRun>,
}

struct MathRun {
    first: BlockId,
    last: BlockId,
    parts: Vec<String>,
    line_break: bool,
}

impl<'a> RuleClassifier<'a> {
    fn new(doc: &'a Document) -> Self {
        Self {
            doc,
            directives: Vec::new(),
            in_references: false,
            references: 0,
            figures: 0,
            math: None,
        }
    }

    fn run(mut self) -> Vec<Directive> {
        let doc = self.doc;
        let blocks = &doc.blocks;
        let mut i = 0;
        while i < blocks.len() {
            let block = &blocks[i];
            let footer = self.is_footer(block);

            if !footer && self.is_math(block) {
                self.push_math(block);
                i += 1;
                continue;
            }
            self.flush_math();

            if footer {
                self.directives.push(Directive::omit(block.id));
            } else if block.height > HEADING_MIN_HEIGHT {
                let level = if block.height > H1_MIN_HEIGHT { "#" } else { "##" };
                self.directives
                    .push(Directive::replace(block.id, format!("{level} {}\n", block.text)));
                if block.text.trim() == "References" {
                    self.in_references = true;
                }
            } else if self.in_references {
                self.references += 1;
                self.directives
                    .push(Directive::replace(block.id, with_break(format!("[^{}]", self.references), block)));
            } else if block.text.starts_with("Figure") {
                self.figures += 1;
                let alt = FIGURE_LABEL.replace(&block.text, "");
                self.directives.push(Directive::replace(
                    block.id,
                    format!("![{alt}](Figure{}.png)\n", self.figures),
                ));
            } else if block.text.starts_with("Table") {
                let end = self.table_end(i + 1);
                if end > i + 1 {
                    let rows = &blocks[i + 1..end];
                    let range = IdRange::between(rows[0].id, rows[rows.len() - 1].id);
                    self.directives.push(Directive::replace(range, render_table(rows)));
                    i = end;
                    continue;
                }
            }
            i += 1;
        }
        self.flush_math();
        self.directives
    }

    fn is_footer(&self, block: &Block) -> bool {
        block.height < FOOTER_MAX_HEIGHT && (self.doc.relative_y(block) - 0.5).abs() > FOOTER_MIN_CENTRE_OFFSET
    }

    fn is_margin(&self, block: &Block) -> bool {
        let y = self.doc.relative_y(block);
        block.height < TABLE_MARGIN_MAX_HEIGHT || y > 1.0 - TABLE_MARGIN_EDGE || y < TABLE_MARGIN_EDGE
    }

    fn is_math(&self, block: &Block) -> bool {
        !self.in_references && block.text.chars().count() < MATH_MAX_CHARS && block.height < MATH_MAX_HEIGHT
    }

    /// Position of the first margin block at or after `from`.
    fn table_end(&self, from: usize) -> usize {
        let blocks = &self.doc.blocks;
        (from..blocks.len())
            .find(|&j| self.is_margin(&blocks[j]))
            .unwrap_or(blocks.len())
    }

    fn push_math(&mut self, block: &Block) {
        let run = self.math.get_or_insert_with(|| MathRun {
            first: block.id,
            last: block.id,
            parts: Vec::new(),
            line_break: false,
        });
        run.last = block.id;
        run.parts.push(block.text.trim().to_string());
        run.line_break = block.line_break;
    }

    fn flush_math(&mut self) {
        if let Some(run) = self.math.take() {
            let mut text = format!("${}$", run.parts.join(" "));
            if run.line_break {
                text.push('\n');
            }
            self.directives
                .push(Directive::replace(IdRange::between(run.first, run.last), text));
        }
    }
}

fn with_break(mut text: String, block: &Block) -> String {
    if block.line_break {
        text.push('\n');
    }
    text
}

/// GFM table from rows whose cells are separated by runs of 2+ spaces.
/// The first row is the header; short rows are padded, long rows cut.
fn render_table(rows: &[Block]) -> String {
    let split = |b: &Block| -> Vec<String> {
        CELL_GAP
            .split(b.text.trim())
            .map(|c| c.replace('|', "\\|"))
            .collect()
    };
    let headers = split(&rows[0]);

    let mut out = String::new();
    out.push('|');
    for h in &headers {
        out.push_str(&format!(" {h} |"));
    }
    out.push('\n');
    out.push('|');
    for _ in &headers {
        out.push_str(" --- |");
    }
    out.push('\n');
    for row in &rows[1..] {
        let cells = split(row);
        out.push('|');
        for cell in cells.iter().take(headers.len()) {
            out.push_str(&format!(" {cell} |"));
        }
        for _ in cells.len()..headers.len() {
            out.push_str(" |");
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Fragment;

    const PAGE: f64 = 800.0;

    fn block(id: &str, text: &str, height: f64, y: f64) -> Block {
        let mut b = Block::start(0, Fragment::new(text, height, y, "F").with_line_break(true));
        b.id = id.parse().unwrap();
        b
    }

    fn doc(blocks: Vec<Block>) -> Document {
        let mut pages: Vec<usize> = blocks.iter().map(|b| b.page()).collect();
        pages.dedup();
        Document {
            page_heights: pages.into_iter().map(|p| (p, PAGE)).collect(),
            blocks,
            body_height: 10.0,
            ..Default::default()
        }
    }

    fn id(s: &str) -> BlockId {
        s.parse().unwrap()
    }

    #[test]
    fn table_span_stops_at_footer() {
        let d = doc(vec![
            block("2-2", "Table 1: Scores", 1.0, 620.0),
            block("2-3", "Name  Score", 1.0, 600.0),
            block("2-4", "Alice  90", 1.0, 585.0),
            block("2-5", "Bob  85", 1.0, 570.0),
            block("2-6", "Page 3", 0.7, 30.0),
        ]);
        let directives = classify(&d);
        assert_eq!(
            directives,
            vec![
                Directive::replace(
                    IdRange::Span(id("2-3"), id("2-5")),
                    "| Name | Score |\n| --- | --- |\n| Alice | 90 |\n| Bob | 85 |\n"
                ),
                Directive::omit(id("2-6")),
            ]
        );
    }

    #[test]
    fn table_rows_are_padded_and_cut() {
        let rows = vec![
            block("0-1", "A  B  C", 1.0, 400.0),
            block("0-2", "1", 1.0, 390.0),
            block("0-3", "x|y  2  3  4", 1.0, 380.0),
        ];
        assert_eq!(
            render_table(&rows),
            "| A | B | C |\n| --- | --- | --- |\n| 1 | | |\n| x\\|y | 2 | 3 |\n"
        );
    }

    #[test]
    fn caption_without_rows_stays_verbatim() {
        let d = doc(vec![block("0-0", "Table 2", 1.0, 400.0), block("0-1", "note", 0.85, 390.0)]);
        assert!(classify(&d).is_empty());
    }

    #[test]
    fn headings_by_height() {
        let d = doc(vec![
            block("0-0", "Title", 1.6, 760.0),
            block("0-1", "Section", 1.2, 700.0),
            block("0-2", "Body text here", 1.0, 680.0),
        ]);
        assert_eq!(
            classify(&d),
            vec![
                Directive::replace(id("0-0"), "# Title\n"),
                Directive::replace(id("0-1"), "## Section\n"),
            ]
        );
    }

    #[test]
    fn footer_needs_small_height_and_edge_position() {
        let d = doc(vec![
            block("0-0", "running header", 0.7, 780.0),
            block("0-1", "small centred note", 0.7, 400.0),
            block("0-2", "12", 1.0, 20.0),
        ]);
        assert_eq!(classify(&d), vec![Directive::omit(id("0-0"))]);
    }

    #[test]
    fn references_become_footnote_markers() {
        let mut no_break = block("1-2", "[2] Roe, 2021", 1.0, 640.0);
        no_break.line_break = false;
        let d = doc(vec![
            block("1-0", "References", 1.2, 700.0),
            block("1-1", "[1] Doe, 2020", 1.0, 660.0),
            no_break,
            block("1-3", "Appendix", 1.3, 600.0),
            block("1-4", "still a reference", 1.0, 580.0),
        ]);
        assert_eq!(
            classify(&d),
            vec![
                Directive::replace(id("1-0"), "## References\n"),
                Directive::replace(id("1-1"), "[^1]\n"),
                Directive::replace(id("1-2"), "[^2]"),
                Directive::replace(id("1-3"), "## Appendix\n"),
                Directive::replace(id("1-4"), "[^3]\n"),
            ]
        );
    }

    #[test]
    fn figures_are_numbered_in_order() {
        let d = doc(vec![
            block("0-0", "Figure 1. Overview of the system", 1.0, 500.0),
            block("0-1", "Figures show trends", 1.0, 480.0),
        ]);
        assert_eq!(
            classify(&d),
            vec![
                Directive::replace(id("0-0"), "![Overview of the system](Figure1.png)\n"),
                Directive::replace(id("0-1"), "![Figures show trends](Figure2.png)\n"),
            ]
        );
    }

    #[test]
    fn math_runs_are_flushed_as_one_span() {
        let d = doc(vec![
            block("0-0", "Let", 1.0, 500.0),
            block("0-1", "x", 0.7, 498.0),
            block("0-2", "+", 0.7, 498.0),
            block("0-3", "y ", 0.7, 498.0),
            block("0-4", "be given", 1.0, 496.0),
            block("0-5", "z", 0.8, 450.0),
        ]);
        assert_eq!(
            classify(&d),
            vec![
                Directive::replace(IdRange::Span(id("0-1"), id("0-3")), "$x + y$\n"),
                Directive::replace(id("0-5"), "$z$\n"),
            ]
        );
    }

    #[test]
    fn math_run_is_flushed_before_footer() {
        let d = doc(vec![block("0-0", "a", 0.85, 400.0), block("0-1", "7", 0.6, 10.0)]);
        assert_eq!(
            classify(&d),
            vec![Directive::replace(id("0-0"), "$a$\n"), Directive::omit(id("0-1"))]
        );
    }
}
