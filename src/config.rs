//! Configuration types for block-based PDF-to-Markdown conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The pipeline stages themselves take no
//! configuration: segmentation, merging and reconstruction are fixed
//! algorithms. The knobs here select the classification strategy, drive the
//! model transport and choose which pages to extract.

use crate::error::{BlockdownError, Result};
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Configuration for a conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use blockdown::{ConversionConfig, StrategyKind};
///
/// let config = ConversionConfig::builder()
///     .strategy(StrategyKind::Model)
///     .model("gpt-4.1-mini")
///     .max_continuations(2)
///     .build()
///     .unwrap();
/// assert_eq!(config.strategy, StrategyKind::Model);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Which classification strategy decides the directives. Default: rule-based.
    pub strategy: StrategyKind,

    /// LLM model identifier, e.g. "gpt-4.1-mini". If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is resolved from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the model strategy. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens the model may generate per call. Default: 8192.
    ///
    /// A response cut at this limit is continued, up to `max_continuations`
    /// extra calls.
    pub max_tokens: usize,

    /// How many times a truncated model response may be continued. Default: 4.
    pub max_continuations: u32,

    /// Per-model-call timeout in seconds. Default: 300.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Custom system prompt for the model strategy. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// Custom instruction template. Must contain `{request_json}`.
    pub instruction_template: Option<String>,

    /// Page selection. Default: All pages.
    pub pages: PageSelection,

    /// Receives stage events while a conversion runs.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 8192,
            max_continuations: 4,
            api_timeout_secs: 300,
            download_timeout_secs: 120,
            password: None,
            system_prompt: None,
            instruction_template: None,
            pages: PageSelection::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("strategy", &self.strategy)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_continuations", &self.max_continuations)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("pages", &self.pages)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn strategy(mut self, kind: StrategyKind) -> Self {
        self.config.strategy = kind;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_continuations(mut self, n: u32) -> Self {
        self.config.max_continuations = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn instruction_template(mut self, template: impl Into<String>) -> Self {
        self.config.instruction_template = Some(template.into());
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.config.progress_callback = Some(callback);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(BlockdownError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if let Some(template) = &c.instruction_template {
            if !template.contains(crate::prompts::REQUEST_PLACEHOLDER) {
                return Err(BlockdownError::InvalidConfig(format!(
                    "instruction template must contain {}",
                    crate::prompts::REQUEST_PLACEHOLDER
                )));
            }
        }
        if let PageSelection::Range(start, end) = c.pages {
            if start == 0 || end < start {
                return Err(BlockdownError::InvalidConfig(format!(
                    "page range {start}-{end} is empty or not 1-indexed"
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which classification strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Emit every block verbatim.
    Passthrough,
    /// Deterministic heuristics: footers, headings, references, figures,
    /// tables, inline math. (default)
    #[default]
    RuleBased,
    /// Delegate to a chat-completion model.
    Model,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Passthrough => "passthrough",
            StrategyKind::RuleBased => "rules",
            StrategyKind::Model => "model",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = BlockdownError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "passthrough" | "none" => Ok(StrategyKind::Passthrough),
            "rules" | "rule-based" | "rulebased" => Ok(StrategyKind::RuleBased),
            "model" | "llm" => Ok(StrategyKind::Model),
            other => Err(BlockdownError::InvalidConfig(format!(
                "unknown strategy '{other}' (expected passthrough, rules or model)"
            ))),
        }
    }
}

/// Specifies which pages of the PDF to convert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Convert all pages (default).
    #[default]
    All,
    /// Convert a single page (1-indexed).
    Single(usize),
    /// Convert a contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Convert specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

impl FromStr for PageSelection {
    type Err = BlockdownError;

    /// Parse `all`, `5`, `3-7` or `1,4,9`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let bad = || BlockdownError::InvalidConfig(format!("invalid page selection '{s}'"));
        let num = |v: &str| v.trim().parse::<usize>().map_err(|_| bad());

        if s.eq_ignore_ascii_case("all") {
            Ok(PageSelection::All)
        } else if s.contains(',') {
            Ok(PageSelection::Set(s.split(',').map(num).collect::<Result<Vec<_>>>()?))
        } else if let Some((a, b)) = s.split_once('-') {
            Ok(PageSelection::Range(num(a)?, num(b)?))
        } else {
            Ok(PageSelection::Single(num(s)?))
        }
    }
}
