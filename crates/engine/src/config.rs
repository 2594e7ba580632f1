//! Engine configuration.
//!
//! Every knob is environment-driven with a documented default so the
//! worker binary can run against a `.env` file alone. Backend-specific
//! settings (endpoints, models, templates) are assembled by the binary;
//! this struct only carries what the orchestration itself needs.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use flyerforge_core::error::EngineError;
use flyerforge_core::prompt::DEFAULT_PROMPT_BUDGET;
use flyerforge_core::qc::DEFAULT_SCORE_CUTOFF;

/// Which image backend variant a run uses. Resolved once from
/// configuration; there is no mid-run switching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageBackendKind {
    Diffusion,
    Workflow,
    Hosted,
    Cli,
}

impl ImageBackendKind {
    pub fn from_name(name: &str) -> Result<Self, EngineError> {
        match name.trim().to_lowercase().as_str() {
            "diffusion" | "sdxl" => Ok(Self::Diffusion),
            "workflow" | "comfyui" => Ok(Self::Workflow),
            "hosted" | "openai" => Ok(Self::Hosted),
            "cli" | "local-cli" => Ok(Self::Cli),
            other => Err(EngineError::Validation(format!(
                "Unknown image backend '{other}'. Must be one of: diffusion, workflow, hosted, cli"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Diffusion => "diffusion",
            Self::Workflow => "workflow",
            Self::Hosted => "hosted",
            Self::Cli => "cli",
        }
    }
}

/// Orchestration knobs for one engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Variants per run when the request does not say.
    pub variant_count: u32,
    /// Attempt cap per variant (first attempt included).
    pub max_attempts: u32,
    /// Concurrent variant orchestrators per run.
    pub variant_parallelism: usize,
    /// Global ceiling on in-flight image generation calls.
    pub image_parallelism: usize,
    pub qc_enabled: bool,
    pub qc_cutoff: f64,
    /// Deadline per image generation call.
    pub image_timeout: Duration,
    /// Deadline per chat/vision call.
    pub llm_timeout: Duration,
    /// Character budget for image prompts.
    pub prompt_budget: usize,
    /// Root directory for the local image store.
    pub output_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            variant_count: 3,
            max_attempts: 3,
            variant_parallelism: 2,
            image_parallelism: 1,
            qc_enabled: true,
            qc_cutoff: DEFAULT_SCORE_CUTOFF,
            image_timeout: Duration::from_secs(300),
            llm_timeout: Duration::from_secs(120),
            prompt_budget: DEFAULT_PROMPT_BUDGET,
            output_dir: PathBuf::from("output"),
        }
    }
}

impl EngineConfig {
    /// Read configuration from `FLYERFORGE_*` environment variables,
    /// falling back to the defaults above. Unparseable values are
    /// rejected rather than silently defaulted.
    pub fn from_env() -> Result<Self, EngineError> {
        let defaults = Self::default();
        Ok(Self {
            variant_count: env_parse("FLYERFORGE_VARIANTS", defaults.variant_count)?,
            max_attempts: env_parse("FLYERFORGE_MAX_ATTEMPTS", defaults.max_attempts)?.max(1),
            variant_parallelism: env_parse(
                "FLYERFORGE_VARIANT_PARALLELISM",
                defaults.variant_parallelism,
            )?
            .max(1),
            image_parallelism: env_parse(
                "FLYERFORGE_IMAGE_PARALLELISM",
                defaults.image_parallelism,
            )?
            .max(1),
            qc_enabled: env_flag("FLYERFORGE_QC_ENABLED", defaults.qc_enabled),
            qc_cutoff: env_parse("FLYERFORGE_QC_CUTOFF", defaults.qc_cutoff)?,
            image_timeout: Duration::from_secs(env_parse(
                "FLYERFORGE_IMAGE_TIMEOUT_SECS",
                defaults.image_timeout.as_secs(),
            )?),
            llm_timeout: Duration::from_secs(env_parse(
                "FLYERFORGE_LLM_TIMEOUT_SECS",
                defaults.llm_timeout.as_secs(),
            )?),
            prompt_budget: env_parse("FLYERFORGE_PROMPT_BUDGET", defaults.prompt_budget)?,
            output_dir: std::env::var("FLYERFORGE_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
        })
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, EngineError> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| {
            EngineError::Validation(format!("{key} has unparseable value '{raw}'"))
        }),
        Err(_) => Ok(default),
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(raw) => raw.trim() == "1",
        Err(_) => default,
    }
}
