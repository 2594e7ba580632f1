//! LLM provider selection and endpoint resolution.
//!
//! Text and vision calls go through any OpenAI-compatible server. The
//! provider only decides defaults: which base URL and API key to use
//! when the per-role settings leave them blank.

use flyerforge_core::error::EngineError;

/// Default base URL for a local model runtime.
pub const LOCAL_BASE_URL: &str = "http://localhost:11434/v1";

/// API key sent to local runtimes that ignore it anyway.
pub const LOCAL_API_KEY: &str = "ollama";

/// A supported chat-completion provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    /// Local model runtime with an OpenAI-compatible endpoint.
    Ollama,
    /// Hosted OpenAI API.
    OpenAi,
    /// Local MLX serving layer; requires an explicit base URL.
    VllmMlx,
}

impl LlmProvider {
    /// Parse a provider string: trimmed, lowercased, `-` treated as
    /// `_`. An empty string selects the local default.
    pub fn from_name(name: &str) -> Result<Self, EngineError> {
        match name.trim().to_lowercase().replace('-', "_").as_str() {
            "" | "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAi),
            "vllm_mlx" | "vllmmlx" => Ok(Self::VllmMlx),
            other => Err(EngineError::Validation(format!(
                "Unknown LLM provider '{other}'. Must be one of: ollama, openai, vllm-mlx"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
            Self::VllmMlx => "vllm-mlx",
        }
    }
}

/// Which role an LLM endpoint serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmKind {
    Text,
    Vision,
}

/// Endpoint settings as configured; `resolve_*` applies the fallback
/// chain.
#[derive(Debug, Clone, Default)]
pub struct LlmSettings {
    pub provider: Option<String>,
    /// Shared base URL for both roles.
    pub base_url: Option<String>,
    pub text_base_url: Option<String>,
    pub vision_base_url: Option<String>,
    pub api_key: Option<String>,
    pub text_model: Option<String>,
    pub vision_model: Option<String>,
}

impl LlmSettings {
    pub fn provider(&self) -> Result<LlmProvider, EngineError> {
        LlmProvider::from_name(self.provider.as_deref().unwrap_or(""))
    }

    /// Base URL for a role: per-role setting, then the shared setting,
    /// then the local default. `vllm-mlx` has no meaningful default and
    /// requires one of the explicit settings.
    pub fn resolve_base_url(&self, kind: LlmKind) -> Result<String, EngineError> {
        let per_role = match kind {
            LlmKind::Text => self.text_base_url.as_deref(),
            LlmKind::Vision => self.vision_base_url.as_deref(),
        };
        if let Some(url) = per_role.or(self.base_url.as_deref()) {
            return Ok(url.trim_end_matches('/').to_string());
        }
        if self.provider()? == LlmProvider::VllmMlx {
            return Err(EngineError::Validation(
                "vllm-mlx requires an explicit LLM base URL".to_string(),
            ));
        }
        Ok(LOCAL_BASE_URL.to_string())
    }

    /// API key: configured key, else the local placeholder.
    pub fn resolve_api_key(&self) -> String {
        self.api_key
            .clone()
            .unwrap_or_else(|| LOCAL_API_KEY.to_string())
    }

    /// Model identifier for a role. `vllm-mlx` serves a single model
    /// and answers to `"default"` when none is configured.
    pub fn resolve_model(&self, kind: LlmKind) -> Result<String, EngineError> {
        let configured = match kind {
            LlmKind::Text => self.text_model.as_deref(),
            LlmKind::Vision => self.vision_model.as_deref(),
        };
        if let Some(model) = configured {
            return Ok(model.to_string());
        }
        match (self.provider()?, kind) {
            (LlmProvider::VllmMlx, _) => Ok("default".to_string()),
            (_, LlmKind::Text) => Ok("qwen2.5:7b".to_string()),
            (_, LlmKind::Vision) => Ok("llama3.2-vision:latest".to_string()),
        }
    }
}
