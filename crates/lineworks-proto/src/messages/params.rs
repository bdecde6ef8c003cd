//! Request and response parameter documents.
//!
//! Optional engine and sampling parameters are omitted from the encoding when
//! unset, so the engine falls back to its own defaults. Unknown keys are
//! ignored on decode.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Token budget used when a generate request does not specify one.
pub const DEFAULT_MAX_TOKENS: u32 = 256;

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

/// Where generated text is cut off.
///
/// Selected per generate request. See the stop-condition engine for the exact
/// boundary rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StopCondition {
    /// Generate until the engine stops or the token budget is spent
    #[default]
    None,
    /// Stop after the first complete line
    Line,
    /// Stop after the first line followed by a blank line
    Paragraph,
    /// Stop after the first complete sentence
    #[serde(alias = "Sentance")]
    Sentence,
}

impl fmt::Display for StopCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "None",
            Self::Line => "Line",
            Self::Paragraph => "Paragraph",
            Self::Sentence => "Sentence",
        };
        f.write_str(name)
    }
}

/// Parameters of a `load` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadParams {
    /// Model name, resolved to `<models>/<model_path>.gguf` by the server
    pub model_path: String,

    /// Context window size in tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_ctx: Option<u32>,

    /// Number of layers offloaded to the GPU (-1 for all)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_gpu_layers: Option<i32>,

    /// Worker threads used by the engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_threads: Option<u32>,

    /// Engine RNG seed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl LoadParams {
    /// Load parameters for a model with engine defaults.
    pub fn new(model_path: impl Into<String>) -> Self {
        Self { model_path: model_path.into(), n_ctx: None, n_gpu_layers: None, n_threads: None, seed: None }
    }
}

/// Parameters of a `generate` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateParams {
    /// Text the model continues from
    pub prompt: String,

    /// Upper bound on generated tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Boundary at which generation stops early
    #[serde(default)]
    pub stop_condition: StopCondition,

    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Nucleus sampling cutoff
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Top-k sampling cutoff
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,

    /// Minimum probability relative to the most likely token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_p: Option<f32>,

    /// Penalty applied to repeated tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_penalty: Option<f32>,

    /// Sampling RNG seed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl GenerateParams {
    /// Generate parameters with defaults for everything but the prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            stop_condition: StopCondition::None,
            temperature: None,
            top_p: None,
            top_k: None,
            min_p: None,
            repeat_penalty: None,
            seed: None,
        }
    }

    /// Set the stop condition.
    #[must_use]
    pub fn with_stop_condition(mut self, stop_condition: StopCondition) -> Self {
        self.stop_condition = stop_condition;
        self
    }

    /// Set the token budget.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Final result of a generate request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputData {
    /// Parameters the generation ran with
    pub parameters: GenerateParams,

    /// Model that produced the output
    pub model: LoadParams,

    /// Committed text, truncated at the stop boundary if one fired
    pub output: String,

    /// True if the generation was aborted before completing
    pub errored: bool,
}
