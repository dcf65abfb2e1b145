//! Origin tags and the model snapshot stored on generated messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who produced a message
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    #[default]
    #[serde(alias = "user")]
    Human,
    #[serde(alias = "ai")]
    Generated,
}

impl Origin {
    /// Chat-completion role for prompt construction
    pub fn prompt_role(self) -> &'static str {
        match self {
            Self::Human => "user",
            Self::Generated => "assistant",
        }
    }
}

/// Snapshot of the model configuration a generated message was produced with.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Id of the model preset in the external model registry
    pub id: String,
    /// Display name of the preset
    pub name: String,
    /// Provider model id, e.g. `openai/gpt-4o-mini`
    pub base_model: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub parameters: SamplingParameters,
}

impl GenerationConfig {
    pub fn new(base_model: impl Into<String>) -> Self {
        let base_model = base_model.into();
        Self {
            id: base_model.clone(),
            name: base_model.clone(),
            base_model,
            system_prompt: String::new(),
            parameters: SamplingParameters::default(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Tools are only offered when a tool choice is set and is not `none`.
    pub fn enabled_tools(&self) -> &[Value] {
        match &self.parameters.tool_choice {
            None | Some(ToolChoice::Mode(ToolChoiceMode::None)) => &[],
            Some(_) => &self.parameters.tools,
        }
    }
}

/// Sampling parameters forwarded verbatim to the provider.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct SamplingParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repetition_penalty: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
    /// Tool definitions, owned by the external tool editor
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum ToolChoice {
    Mode(ToolChoiceMode),
    Function {
        #[serde(rename = "type")]
        kind: String,
        function: FunctionName,
    },
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoiceMode {
    Auto,
    None,
    Required,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FunctionName {
    pub name: String,
}
