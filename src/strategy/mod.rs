//! Classification strategies: map identified blocks plus the outline to a
//! sparse directive set.
//!
//! The variants form a closed set, so they are an enum rather than a trait
//! object. Each variant keeps its working state inside a single
//! [`Strategy::classify`] call; nothing carries over between runs.
//!
//! | Variant | Directives |
//! |---------|------------|
//! | [`Strategy::Passthrough`] | none, every block is emitted verbatim |
//! | [`Strategy::RuleBased`] | [`rules::classify`] heuristics |
//! | [`Strategy::Model`] | [`model::ModelClassifier`] over the network |
//!
//! Callers must not assume directives come back in block order.

pub mod model;
pub mod rules;
pub mod wire;

use crate::config::{ConversionConfig, StrategyKind};
use crate::directive::Directive;
use crate::error::Result;
use crate::model::Document;
use crate::progress::ProgressCallback;
use model::{ModelClassifier, ModelOptions};
use serde::{Deserialize, Serialize};
use tracing::info;

/// A configured classification strategy.
#[derive(Debug, Clone)]
pub enum Strategy {
    Passthrough,
    RuleBased,
    Model(ModelClassifier),
}

/// What a strategy produced, plus model bookkeeping when one ran.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub directives: Vec<Directive>,
    /// Raw model output, concatenated across continuations.
    pub raw_response: Option<String>,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub continuations: u32,
}

impl Classification {
    fn local(directives: Vec<Directive>) -> Self {
        Self {
            directives,
            ..Default::default()
        }
    }
}

impl Strategy {
    /// Build the strategy selected by `config`, resolving an LLM provider
    /// only for [`StrategyKind::Model`].
    pub async fn from_config(config: &ConversionConfig) -> Result<Self> {
        Ok(match config.strategy {
            StrategyKind::Passthrough => Strategy::Passthrough,
            StrategyKind::RuleBased => Strategy::RuleBased,
            StrategyKind::Model => {
                let provider = crate::convert::resolve_provider(config).await?;
                Strategy::Model(ModelClassifier::new(provider, ModelOptions::from_config(config)))
            }
        })
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::Passthrough => StrategyKind::Passthrough,
            Strategy::RuleBased => StrategyKind::RuleBased,
            Strategy::Model(_) => StrategyKind::Model,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Produce directives for `doc`. Only the model variant suspends.
    pub async fn classify(&self, doc: &Document, progress: Option<&ProgressCallback>) -> Result<Classification> {
        let classification = match self {
            Strategy::Passthrough => Classification::default(),
            Strategy::RuleBased => Classification::local(rules::classify(doc)),
            Strategy::Model(classifier) => classifier.classify(doc, progress).await?,
        };
        info!(
            "Strategy '{}' produced {} directives for {} blocks",
            self.name(),
            classification.directives.len(),
            doc.blocks.len()
        );
        Ok(classification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Block, Fragment};

    fn doc() -> Document {
        let mut heading = Block::start(0, Fragment::new("Intro", 1.6, 700.0, "B").with_line_break(true));
        heading.id = "0-0".parse().unwrap();
        let mut body = Block::start(0, Fragment::new("Body", 1.0, 680.0, "A").with_line_break(true));
        body.id = "0-1".parse().unwrap();
        Document {
            blocks: vec![heading, body],
            page_heights: vec![(0, 800.0)],
            body_height: 10.0,
            ..Default::default()
        }
    }

    #[test]
    fn passthrough_yields_nothing() {
        let c = tokio_test::block_on(Strategy::Passthrough.classify(&doc(), None)).unwrap();
        assert!(c.directives.is_empty());
        assert!(c.raw_response.is_none());
    }

    #[test]
    fn rule_based_runs_heuristics() {
        let c = tokio_test::block_on(Strategy::RuleBased.classify(&doc(), None)).unwrap();
        assert_eq!(c.directives, vec![Directive::replace("0-0".parse::<crate::ids::BlockId>().unwrap(), "# Intro\n")]);
        assert_eq!(c.input_tokens, 0);
    }

    #[test]
    fn local_strategies_need_no_provider() {
        let config = ConversionConfig::builder()
            .strategy(StrategyKind::Passthrough)
            .build()
            .unwrap();
        let s = tokio_test::block_on(Strategy::from_config(&config)).unwrap();
        assert_eq!(s.name(), "passthrough");
    }
}
