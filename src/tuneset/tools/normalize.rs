use crate::tuneset::tools::error::Result;
use crate::tuneset::tools::model::{Metrics, Record};
use crate::tuneset::tools::tokens::TokenEstimator;

/// Separator that closes every prompt.
pub const PROMPT_SEPARATOR: &str = "\n\n###\n\n";
/// Marker that closes every completion.
pub const COMPLETION_STOP: &str = " END";

const TERMINATED_COMPLETION: &str = ". END";

/// Turns raw prompt/completion text into canonical [`Record`]s.
#[derive(Debug)]
pub struct Normalizer {
    estimator: TokenEstimator,
}

impl Normalizer {
    pub fn new(estimator: TokenEstimator) -> Self {
        Self { estimator }
    }

    pub fn estimator(&self) -> &TokenEstimator {
        &self.estimator
    }

    /// Trims both sides, applies the prompt and completion markers, and
    /// measures the result.
    ///
    /// The only failure is [`ToolError::TokenLimitExceeded`] from the
    /// estimator.
    ///
    /// [`ToolError::TokenLimitExceeded`]: crate::ToolError::TokenLimitExceeded
    pub fn normalize(&self, prompt: &str, completion: &str) -> Result<(Record, Metrics)> {
        let prompt = ensure_prompt_separator(prompt.trim());
        let completion = ensure_completion_markers(completion.trim());
        let metrics = self.estimator.estimate(&prompt, &completion)?;
        Ok((Record::new(prompt, completion), metrics))
    }
}

/// Appends `" \n\n###\n\n"` unless the prompt already ends with the separator.
///
/// Trimming strips the separator's trailing newlines, so a prompt ending in
/// `"\n\n###"` only gets them back.
pub fn ensure_prompt_separator(prompt: &str) -> String {
    if prompt.ends_with(PROMPT_SEPARATOR) {
        prompt.to_string()
    } else if prompt.ends_with(PROMPT_SEPARATOR.trim_end()) {
        format!("{prompt}\n\n")
    } else {
        format!("{prompt} {PROMPT_SEPARATOR}")
    }
}

/// Makes the completion start with a space and end with `". END"`.
///
/// A completion that already ends with `". END"` keeps its ending, so the
/// function is idempotent.
pub fn ensure_completion_markers(completion: &str) -> String {
    let mut completion = completion.to_string();
    if !completion.ends_with(TERMINATED_COMPLETION) {
        if !completion.ends_with('.') {
            completion.push('.');
        }
        completion.push_str(COMPLETION_STOP);
    }
    if !completion.starts_with(' ') {
        completion.insert(0, ' ');
    }
    completion
}
