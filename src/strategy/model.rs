//! Model-based classification: one chat exchange with an LLM provider.
//!
//! ## Message layout
//!
//! 1. **System message**: [`DEFAULT_SYSTEM_PROMPT`] or the configured override
//! 2. **User message**: the instruction template with the serialised
//!    `{outline, items}` request substituted for `{request_json}`
//!
//! ## Truncation
//!
//! When the provider stops at the token limit the partial answer is echoed
//! back as an assistant turn, followed by [`CONTINUE_PROMPT`], and the next
//! answer is appended to the previous ones. After `max_continuations` extra
//! calls a still-truncated answer is an error. Failures are never retried:
//! a classification error is fatal for the run.

use super::wire::{parse_response, ClassificationRequest};
use super::Classification;
use crate::config::ConversionConfig;
use crate::error::{BlockdownError, Result};
use crate::model::Document;
use crate::progress::ProgressCallback;
use crate::prompts::{render_instructions, CONTINUE_PROMPT, DEFAULT_INSTRUCTION_TEMPLATE, DEFAULT_SYSTEM_PROMPT};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

/// Settings for the model exchange, lifted out of [`ConversionConfig`].
#[derive(Debug, Clone)]
pub struct ModelOptions {
    pub system_prompt: String,
    pub instruction_template: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub max_continuations: u32,
    pub api_timeout_secs: u64,
}

impl ModelOptions {
    pub fn from_config(config: &ConversionConfig) -> Self {
        Self {
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            instruction_template: config
                .instruction_template
                .clone()
                .unwrap_or_else(|| DEFAULT_INSTRUCTION_TEMPLATE.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_continuations: config.max_continuations,
            api_timeout_secs: config.api_timeout_secs,
        }
    }
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self::from_config(&ConversionConfig::default())
    }
}

/// Classifier that asks a chat-completion model for sparse directives.
#[derive(Clone)]
pub struct ModelClassifier {
    provider: Arc<dyn LLMProvider>,
    options: ModelOptions,
}

impl fmt::Debug for ModelClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelClassifier")
            .field("provider", &"<dyn LLMProvider>")
            .field("options", &self.options)
            .finish()
    }
}

impl ModelClassifier {
    pub fn new(provider: Arc<dyn LLMProvider>, options: ModelOptions) -> Self {
        Self { provider, options }
    }

    pub fn options(&self) -> &ModelOptions {
        &self.options
    }

    /// Send the document to the model and parse its directives.
    pub async fn classify(&self, doc: &Document, progress: Option<&ProgressCallback>) -> Result<Classification> {
        let start = Instant::now();
        let request_json = ClassificationRequest::from_document(doc).to_json()?;
        let messages = build_messages(&self.options, &request_json);
        debug!(
            "Model request: {} blocks, {} bytes of JSON",
            doc.blocks.len(),
            request_json.len()
        );

        let secs = self.options.api_timeout_secs;
        let exchange = run_exchange(messages, self.options.max_continuations, progress, |msgs| {
            let provider = Arc::clone(&self.provider);
            let options = build_options(&self.options);
            async move {
                let response = timeout(Duration::from_secs(secs), provider.chat(&msgs, Some(&options)))
                    .await
                    .map_err(|_| BlockdownError::ApiTimeout { secs })?
                    .map_err(|e| BlockdownError::LlmApiError { message: e.to_string() })?;
                Ok(Turn {
                    content: response.content,
                    finish_reason: response.finish_reason,
                    prompt_tokens: response.prompt_tokens,
                    completion_tokens: response.completion_tokens,
                })
            }
        })
        .await?;

        info!(
            "Model answered in {:?}: {} input tokens, {} output tokens, {} continuations",
            start.elapsed(),
            exchange.input_tokens,
            exchange.output_tokens,
            exchange.continuations
        );

        let directives = parse_response(&exchange.raw)?;
        Ok(Classification {
            directives,
            raw_response: Some(exchange.raw),
            input_tokens: exchange.input_tokens,
            output_tokens: exchange.output_tokens,
            continuations: exchange.continuations,
        })
    }
}

/// System prompt plus the rendered instruction template.
pub fn build_messages(options: &ModelOptions, request_json: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(options.system_prompt.as_str()),
        ChatMessage::user(render_instructions(&options.instruction_template, request_json)),
    ]
}

fn build_options(options: &ModelOptions) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(options.temperature),
        max_tokens: Some(options.max_tokens),
        ..Default::default()
    }
}

/// How a single provider answer ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Finish {
    Done,
    Truncated,
}

/// Map a provider finish reason onto [`Finish`].
///
/// Providers spell these differently: OpenAI reports `stop`/`length`,
/// Anthropic `end_turn`/`max_tokens`. A missing reason counts as done.
pub(crate) fn finish_state(reason: Option<&str>) -> Result<Finish> {
    match reason.map(|r| r.trim().to_ascii_lowercase()) {
        None => Ok(Finish::Done),
        Some(r) => match r.as_str() {
            "" | "stop" | "end_turn" | "stop_sequence" | "eos" => Ok(Finish::Done),
            "length" | "max_tokens" => Ok(Finish::Truncated),
            _ => Err(BlockdownError::UnexpectedFinish { reason: r }),
        },
    }
}

/// One provider answer.
#[derive(Debug, Clone, Default)]
pub(crate) struct Turn {
    pub content: String,
    pub finish_reason: Option<String>,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

/// Concatenated result of a possibly continued exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Exchange {
    pub raw: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub continuations: u32,
}

/// Drive `call` until the answer is complete, continuing truncated answers.
pub(crate) async fn run_exchange<F, Fut>(
    mut messages: Vec<ChatMessage>,
    max_continuations: u32,
    progress: Option<&ProgressCallback>,
    mut call: F,
) -> Result<Exchange>
where
    F: FnMut(Vec<ChatMessage>) -> Fut,
    Fut: Future<Output = Result<Turn>>,
{
    let mut exchange = Exchange::default();
    loop {
        let turn = call(messages.clone()).await?;
        exchange.raw.push_str(&turn.content);
        exchange.input_tokens += turn.prompt_tokens;
        exchange.output_tokens += turn.completion_tokens;

        match finish_state(turn.finish_reason.as_deref())? {
            Finish::Done => return Ok(exchange),
            Finish::Truncated => {
                if exchange.continuations >= max_continuations {
                    return Err(BlockdownError::ContinuationLimit {
                        continuations: exchange.continuations,
                    });
                }
                exchange.continuations += 1;
                warn!(
                    "Model output truncated, continuing ({}/{})",
                    exchange.continuations, max_continuations
                );
                if let Some(cb) = progress {
                    cb.on_continuation(exchange.continuations, max_continuations);
                }
                messages.push(ChatMessage::assistant(turn.content));
                messages.push(ChatMessage::user(CONTINUE_PROMPT));
            }
        }
    }
}
