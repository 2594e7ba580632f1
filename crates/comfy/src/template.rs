//! Placeholder substitution for workflow templates.
//!
//! Templates are JSON-shaped node graphs containing `{{NAME}}` tokens.
//! Substitution is JSON-safe: string values are quoted and escaped,
//! numeric values (widths, seeds, step counts) land unquoted. A
//! recognized token left without a value is a configuration fault;
//! tokens outside the recognized set are left untouched so templates
//! can evolve ahead of the engine.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use flyerforge_core::error::EngineError;

/// Tokens the engine knows how to fill.
pub const RECOGNIZED_TOKENS: &[&str] = &[
    "PROMPT",
    "NEGATIVE_PROMPT",
    "WIDTH",
    "HEIGHT",
    "HEADLINE",
    "SUBHEAD",
    "BODY",
    "CTA",
    "DISCLAIMER",
    "BUSINESS_BLOCK",
    "AUDIENCE",
    "PALETTE",
    "STYLE_KEYWORDS",
    "LAYOUT_GUIDANCE",
    "BUSINESS_NAME",
    "PRODUCT",
    "OFFER",
    "CONSTRAINTS",
    "PRIMARY_COLOR",
    "ACCENT_COLOR",
    "TEXT_DARK",
    "TEXT_MUTED",
    "TEXT_LIGHT",
    "FONT_PATH",
];

/// Workflow knobs templates may additionally expose as overrides.
pub const OVERRIDE_TOKENS: &[&str] = &[
    "CKPT_NAME",
    "SEED",
    "STEPS",
    "CFG",
    "SAMPLER_NAME",
    "SCHEDULER",
    "DENOISE",
];

/// A value bound to a template token.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateValue {
    Text(String),
    Int(i64),
    Float(f64),
}

impl TemplateValue {
    /// JSON-safe encoding: strings quoted and escaped, numbers bare.
    fn encode(&self) -> String {
        match self {
            Self::Text(s) => serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string()),
            Self::Int(n) => n.to_string(),
            Self::Float(f) => f.to_string(),
        }
    }
}

impl From<&str> for TemplateValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for TemplateValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for TemplateValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for TemplateValue {
    fn from(value: u32) -> Self {
        Self::Int(value as i64)
    }
}

impl From<f64> for TemplateValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

fn token_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{([A-Za-z0-9_]+)\}\}").unwrap())
}

/// Replace every token occurrence, returning the substituted text.
///
/// Fails with [`EngineError::Template`] when a recognized (or override)
/// token appears in the template without a supplied value. Unknown
/// tokens are preserved verbatim.
pub fn substitute(
    template: &str,
    values: &HashMap<String, TemplateValue>,
) -> Result<String, EngineError> {
    let mut text = template.to_string();
    for (key, value) in values {
        let token = format!("{{{{{key}}}}}");
        if text.contains(&token) {
            text = text.replace(&token, &value.encode());
        }
    }

    let mut unresolved: Vec<String> = token_pattern()
        .captures_iter(&text)
        .map(|cap| cap[1].to_string())
        .filter(|name| {
            RECOGNIZED_TOKENS.contains(&name.as_str()) || OVERRIDE_TOKENS.contains(&name.as_str())
        })
        .collect();
    unresolved.sort();
    unresolved.dedup();
    if !unresolved.is_empty() {
        return Err(EngineError::Template(format!(
            "No value supplied for template tokens: {}",
            unresolved.join(", ")
        )));
    }

    Ok(text)
}

/// Substitute and parse into a concrete workflow document.
pub fn render(
    template: &str,
    values: &HashMap<String, TemplateValue>,
) -> Result<serde_json::Value, EngineError> {
    let text = substitute(template, values)?;
    serde_json::from_str(&text).map_err(|e| {
        EngineError::Template(format!("Workflow JSON invalid after substitution: {e}"))
    })
}
