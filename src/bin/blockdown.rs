//! CLI binary for blockdown.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use blockdown::{
    convert, inspect, ConversionConfig, ConversionOutput, ConversionProgressCallback, PageSelection,
    ProgressCallback, StrategyKind,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner whose prefix follows the pipeline
/// stage, plus one log line per finished stage.
struct CliProgressCallback {
    spinner: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        spinner.set_style(style);
        spinner.set_prefix("Extracting");
        spinner.set_message("Opening PDF…");
        spinner.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { spinner })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_extraction_complete(&self, pages: usize, blocks: usize) {
        self.spinner.println(format!(
            "  {} {} pages  →  {} blocks",
            green("✓"),
            bold(&pages.to_string()),
            bold(&blocks.to_string())
        ));
    }

    fn on_classification_start(&self, strategy: &str, blocks: usize) {
        self.spinner.set_prefix("Classifying");
        self.spinner.set_message(format!("{blocks} blocks with {strategy}"));
    }

    fn on_continuation(&self, attempt: u32, limit: u32) {
        self.spinner
            .println(format!("  {} response truncated, continuing ({attempt}/{limit})", cyan("↻")));
    }

    fn on_classification_complete(&self, directives: usize) {
        self.spinner
            .println(format!("  {} {} directives", green("✓"), bold(&directives.to_string())));
        self.spinner.set_prefix("Reconstructing");
        self.spinner.set_message("");
    }

    fn on_conversion_complete(&self, markdown_len: usize) {
        self.spinner.finish_and_clear();
        eprintln!("{} {} chars of Markdown", green("✔"), bold(&markdown_len.to_string()));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Heuristic conversion (stdout, no API key needed)
  blockdown document.pdf

  # Convert to file with a model deciding the directives
  blockdown --strategy model document.pdf -o output.md

  # Plain text dump of the blocks, nothing reformatted
  blockdown --strategy passthrough --pages 1-5 paper.pdf

  # Use a specific model
  blockdown --strategy model --model gpt-4.1 --provider openai document.pdf

  # Convert from URL
  blockdown https://arxiv.org/pdf/1706.03762 -o attention.md

  # Keep blocks, directives, outline and raw model output for inspection
  blockdown --strategy model --diagnostics-dir diag/ paper.pdf -o paper.md

  # Inspect PDF metadata
  blockdown --inspect-only document.pdf

  # JSON output with blocks, directives and stats
  blockdown --json document.pdf > output.json

STRATEGIES:
  passthrough   every block copied verbatim
  rules         footers dropped, headings, references, figures, tables, inline math (default)
  model         a chat model answers with sparse omit/replace directives

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory); defaults to the system library
"#;

/// Convert PDF files and URLs to Markdown with sparse per-block directives.
#[derive(Parser, Debug)]
#[command(
    name = "blockdown",
    version,
    about = "Convert PDF files and URLs to Markdown with sparse per-block directives",
    long_about = "Convert PDF documents (local files or URLs) to Markdown. Text is split into \
blocks with stable ids; a strategy (passthrough, rules or an LLM) returns directives that omit \
or replace individual blocks, and every other block is copied verbatim.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Write Markdown to this file instead of stdout.
    #[arg(short, long, env = "BLOCKDOWN_OUTPUT")]
    output: Option<PathBuf>,

    /// Classification strategy: passthrough, rules, model.
    #[arg(long, env = "BLOCKDOWN_STRATEGY", default_value = "rules")]
    strategy: StrategyKind,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "BLOCKDOWN_PAGES", default_value = "all")]
    pages: PageSelection,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "BLOCKDOWN_PASSWORD")]
    password: Option<String>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "BLOCKDOWN_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Path to a custom instruction template; must contain `{request_json}`.
    #[arg(long, env = "BLOCKDOWN_INSTRUCTIONS")]
    instructions: Option<PathBuf>,

    /// Max LLM output tokens per call.
    #[arg(long, env = "BLOCKDOWN_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// How many times a truncated model response may be continued.
    #[arg(long, env = "BLOCKDOWN_MAX_CONTINUATIONS", default_value_t = 4)]
    max_continuations: u32,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "BLOCKDOWN_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Write blocks, directives, outline and raw model output to this directory.
    #[arg(long, env = "BLOCKDOWN_DIAGNOSTICS_DIR")]
    diagnostics_dir: Option<PathBuf>,

    /// Output structured JSON (ConversionOutput) instead of Markdown, to
    /// `--output` when given.
    #[arg(long, env = "BLOCKDOWN_JSON")]
    json: bool,

    /// Disable progress spinner.
    #[arg(long, env = "BLOCKDOWN_NO_PROGRESS")]
    no_progress: bool,

    /// Print PDF metadata only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "BLOCKDOWN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "BLOCKDOWN_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "BLOCKDOWN_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "BLOCKDOWN_API_TIMEOUT", default_value_t = 300)]
    api_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner replaces INFO logs; verbose mode always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let config = build_config(&cli, None).await?;
        let meta = inspect(&cli.input, &config).await.context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
            );
        } else {
            println!("File:         {}", cli.input);
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            if let Some(ref s) = meta.subject {
                println!("Subject:      {}", s);
            }
            println!("Pages:        {}", meta.page_count);
            println!("PDF Version:  {}", meta.pdf_version);
            if let Some(ref p) = meta.producer {
                println!("Producer:     {}", p);
            }
            if let Some(ref c) = meta.creator {
                println!("Creator:      {}", c);
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    // ── Run conversion ───────────────────────────────────────────────────
    let output = convert(&cli.input, &config).await.context("Conversion failed")?;

    if let Some(ref dir) = cli.diagnostics_dir {
        output
            .write_diagnostics(dir)
            .with_context(|| format!("Failed to write diagnostics to {}", dir.display()))?;
    }

    let rendered = render_output(&output, cli.json)?;
    if let Some(ref output_path) = cli.output {
        std::fs::write(output_path, &rendered)
            .with_context(|| format!("Failed to write {}", output_path.display()))?;
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(rendered.as_bytes())
            .context("Failed to write to stdout")?;
    }

    if !cli.quiet && !cli.json {
        print_summary(&output, cli.output.as_ref());
    }

    Ok(())
}

/// The text `--output` (or stdout) receives: the serialised
/// [`ConversionOutput`] under `--json`, the Markdown otherwise.
fn render_output(output: &ConversionOutput, json: bool) -> Result<String> {
    if json {
        let mut text = serde_json::to_string_pretty(output).context("Failed to serialise output")?;
        text.push('\n');
        Ok(text)
    } else {
        Ok(output.markdown.clone())
    }
}

fn print_summary(output: &ConversionOutput, path: Option<&PathBuf>) {
    let stats = &output.stats;
    let target = path
        .map(|p| format!("  →  {}", bold(&p.display().to_string())))
        .unwrap_or_default();
    eprintln!(
        "{}  {}/{} pages  {} blocks  {} omit / {} replace  {}ms{}",
        green("✔"),
        stats.processed_pages,
        stats.total_pages,
        stats.blocks,
        stats.omit_directives,
        stats.replace_directives,
        stats.total_duration_ms,
        target,
    );
    if stats.input_tokens > 0 || stats.output_tokens > 0 {
        eprintln!(
            "   {} tokens in  /  {} tokens out  /  {} continuations",
            dim(&stats.input_tokens.to_string()),
            dim(&stats.output_tokens.to_string()),
            dim(&stats.continuations.to_string()),
        );
    }
}

/// Map CLI args to `ConversionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .strategy(cli.strategy)
        .pages(cli.pages.clone())
        .max_tokens(cli.max_tokens)
        .max_continuations(cli.max_continuations)
        .temperature(cli.temperature)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref path) = cli.instructions {
        let template = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read instruction template from {:?}", path))?;
        builder = builder.instruction_template(template);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ConversionOutput {
        ConversionOutput {
            markdown: "# Title\nBody\n".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn markdown_is_rendered_verbatim() {
        assert_eq!(render_output(&sample(), false).unwrap(), "# Title\nBody\n");
    }

    #[test]
    fn json_flag_renders_the_whole_output() {
        let text = render_output(&sample(), true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["markdown"], "# Title\nBody\n");
        assert!(value.get("stats").is_some());
    }

    #[test]
    fn json_goes_to_the_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let cli = Cli::try_parse_from(["blockdown", "--json", "-o", path.to_str().unwrap(), "doc.pdf"]).unwrap();
        assert!(cli.json);

        std::fs::write(cli.output.as_ref().unwrap(), render_output(&sample(), cli.json).unwrap()).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.trim_start().starts_with('{'));
        assert!(written.contains("\"markdown\""));
    }
}
