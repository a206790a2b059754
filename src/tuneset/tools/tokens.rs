use std::fmt;

use tiktoken_rs::CoreBPE;

use crate::tuneset::tools::error::{Result, ToolError};
use crate::tuneset::tools::model::Metrics;

/// Encoder used when none is configured: the GPT-3 byte-pair encoding.
pub const DEFAULT_ENCODING: &str = "r50k_base";
/// Largest number of tokens a single prompt/completion pair may encode to.
pub const DEFAULT_TOKEN_LIMIT: usize = 2048;
/// Fine-tuning price per thousand tokens.
pub const DEFAULT_COST_PER_1K: f64 = 0.03;

/// Counts the tokens a piece of text encodes to.
pub trait TokenCounter {
    fn count_tokens(&self, text: &str) -> usize;
    fn name(&self) -> &str;
}

/// Byte-pair encoder backed by `tiktoken-rs`.
pub struct BpeTokenizer {
    name: String,
    bpe: CoreBPE,
}

impl BpeTokenizer {
    /// Resolves an encoder by encoding name (`r50k_base`, `cl100k_base`, ...)
    /// or by a model name known to `tiktoken-rs`.
    pub fn from_name(name: &str) -> Result<Self> {
        let bpe = match name {
            "r50k_base" | "gpt2" => tiktoken_rs::r50k_base(),
            "p50k_base" => tiktoken_rs::p50k_base(),
            "p50k_edit" => tiktoken_rs::p50k_edit(),
            "cl100k_base" => tiktoken_rs::cl100k_base(),
            "o200k_base" => tiktoken_rs::o200k_base(),
            model => tiktoken_rs::get_bpe_from_model(model),
        }
        .map_err(|err| {
            ToolError::config("TOKEN_ENCODING", format!("unknown encoding '{name}': {err}"))
        })?;

        Ok(Self {
            name: name.to_string(),
            bpe,
        })
    }
}

impl fmt::Debug for BpeTokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BpeTokenizer").field("name", &self.name).finish()
    }
}

impl TokenCounter for BpeTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Computes [`Metrics`] for prompt/completion pairs and enforces the token
/// ceiling.
pub struct TokenEstimator {
    counter: Box<dyn TokenCounter>,
    cost_per_1k: f64,
    token_limit: usize,
}

impl TokenEstimator {
    pub fn new(counter: Box<dyn TokenCounter>, cost_per_1k: f64, token_limit: usize) -> Self {
        Self {
            counter,
            cost_per_1k,
            token_limit,
        }
    }

    pub fn token_limit(&self) -> usize {
        self.token_limit
    }

    pub fn encoding(&self) -> &str {
        self.counter.name()
    }

    /// Measures `prompt + " " + completion`.
    ///
    /// Fails with [`ToolError::TokenLimitExceeded`] when the pair encodes to
    /// more tokens than the limit; a pair exactly at the limit is accepted.
    pub fn estimate(&self, prompt: &str, completion: &str) -> Result<Metrics> {
        let combined = format!("{prompt} {completion}");
        let token_count = self.counter.count_tokens(&combined);
        if token_count > self.token_limit {
            return Err(ToolError::TokenLimitExceeded {
                tokens: token_count,
                limit: self.token_limit,
            });
        }

        Ok(Metrics {
            word_count: combined.split_whitespace().count(),
            token_count,
            estimated_cost: token_count as f64 * self.cost_per_1k / 1000.0,
        })
    }
}

impl fmt::Debug for TokenEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenEstimator")
            .field("encoding", &self.counter.name())
            .field("cost_per_1k", &self.cost_per_1k)
            .field("token_limit", &self.token_limit)
            .finish()
    }
}
