//! Run the flyer generation engine against a brief file.
//!
//! Usage: `flyerforge-worker <brief.json> [variant_count]`
//!
//! All backend selection and tuning comes from `FLYERFORGE_*`
//! environment variables (a `.env` file is honored). The run outcome is
//! printed to stdout as JSON; the process exits non-zero when the run
//! ends FAILED.

use std::sync::Arc;

use anyhow::{bail, Context};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flyerforge_backends::chat::ChatClient;
use flyerforge_backends::cli::{CliConfig, CliModelBackend};
use flyerforge_backends::diffusion::{DiffusionBackend, DiffusionConfig};
use flyerforge_backends::health;
use flyerforge_backends::hosted::{HostedConfig, HostedImageBackend};
use flyerforge_backends::image::{ImageBackend, ImageClient};
use flyerforge_backends::provider::{LlmKind, LlmSettings};
use flyerforge_backends::text::LlmCopywriter;
use flyerforge_backends::vision::VisionInspector;
use flyerforge_backends::workflow::WorkflowBackend;
use flyerforge_core::brief::RawBrief;
use flyerforge_core::state::RunStatus;
use flyerforge_db::store::PgRunStore;
use flyerforge_engine::config::{EngineConfig, ImageBackendKind};
use flyerforge_engine::run::RunController;
use flyerforge_engine::store::{ImageStore, LocalImageStore, MemoryRunStore, RunStore};

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn llm_settings() -> LlmSettings {
    LlmSettings {
        provider: env_opt("FLYERFORGE_LLM_PROVIDER"),
        base_url: env_opt("FLYERFORGE_LLM_BASE_URL"),
        text_base_url: env_opt("FLYERFORGE_TEXT_BASE_URL"),
        vision_base_url: env_opt("FLYERFORGE_VISION_BASE_URL"),
        api_key: env_opt("FLYERFORGE_LLM_API_KEY"),
        text_model: env_opt("FLYERFORGE_TEXT_MODEL"),
        vision_model: env_opt("FLYERFORGE_VISION_MODEL"),
    }
}

fn image_backend(kind: ImageBackendKind) -> anyhow::Result<Box<dyn ImageBackend>> {
    match kind {
        ImageBackendKind::Diffusion => {
            let defaults = DiffusionConfig::default();
            Ok(Box::new(DiffusionBackend::new(DiffusionConfig {
                api_url: env_opt("FLYERFORGE_SDXL_API_URL").unwrap_or(defaults.api_url),
                steps: env_opt("FLYERFORGE_SDXL_STEPS")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.steps),
                cfg_scale: env_opt("FLYERFORGE_SDXL_CFG_SCALE")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.cfg_scale),
                sampler: env_opt("FLYERFORGE_SDXL_SAMPLER").unwrap_or(defaults.sampler),
            })))
        }
        ImageBackendKind::Workflow => {
            let api_url = env_opt("FLYERFORGE_COMFY_API_URL")
                .unwrap_or_else(|| "http://localhost:8188".to_string());
            let template_path = env_opt("FLYERFORGE_WORKFLOW_TEMPLATE")
                .context("FLYERFORGE_WORKFLOW_TEMPLATE is required for the workflow backend")?;
            let template = std::fs::read_to_string(&template_path)
                .with_context(|| format!("reading workflow template {template_path}"))?;
            let mut backend = WorkflowBackend::new(&api_url, template)
                .with_output_node(env_opt("FLYERFORGE_COMFY_OUTPUT_NODE"));
            if let Some(font_path) = env_opt("FLYERFORGE_FONT_PATH") {
                backend = backend.with_font_path(font_path);
            }
            Ok(Box::new(backend))
        }
        ImageBackendKind::Hosted => {
            let defaults = HostedConfig::default();
            Ok(Box::new(HostedImageBackend::new(HostedConfig {
                api_url: env_opt("FLYERFORGE_OPENAI_BASE_URL").unwrap_or(defaults.api_url),
                api_key: env_opt("OPENAI_API_KEY")
                    .context("OPENAI_API_KEY is required for the hosted backend")?,
                model: env_opt("FLYERFORGE_IMAGE_MODEL").unwrap_or(defaults.model),
                quality: env_opt("FLYERFORGE_IMAGE_QUALITY").unwrap_or(defaults.quality),
            })))
        }
        ImageBackendKind::Cli => Ok(Box::new(CliModelBackend::new(CliConfig {
            command: env_opt("FLYERFORGE_CLI_COMMAND")
                .context("FLYERFORGE_CLI_COMMAND is required for the cli backend")?,
            extra_args: env_opt("FLYERFORGE_CLI_ARGS")
                .map(|raw| raw.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            model: env_opt("FLYERFORGE_CLI_MODEL").unwrap_or_else(|| "default".to_string()),
            work_dir: std::env::temp_dir().join("flyerforge"),
        }))),
    }
}

async fn report_health(settings: &LlmSettings, kind: ImageBackendKind) -> anyhow::Result<()> {
    let text_base = settings.resolve_base_url(LlmKind::Text)?;
    let vision_base = settings.resolve_base_url(LlmKind::Vision)?;
    let mut checks = health::check_llm(&text_base, &vision_base).await;
    match kind {
        ImageBackendKind::Diffusion => {
            let api_url = env_opt("FLYERFORGE_SDXL_API_URL")
                .unwrap_or_else(|| DiffusionConfig::default().api_url);
            checks.push(health::check_diffusion(&api_url).await);
        }
        ImageBackendKind::Workflow => {
            let api_url = env_opt("FLYERFORGE_COMFY_API_URL")
                .unwrap_or_else(|| "http://localhost:8188".to_string());
            checks.push(health::check_compositor(&api_url).await);
        }
        _ => {}
    }
    for check in &checks {
        if check.ok {
            tracing::info!(check = %check.name, detail = %check.detail, "Health check passed");
        } else {
            tracing::warn!(check = %check.name, detail = %check.detail, "Health check failed");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flyerforge=info,flyerforge_worker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let Some(brief_path) = args.next() else {
        bail!("usage: flyerforge-worker <brief.json> [variant_count]");
    };
    let variant_count: Option<u32> = match args.next() {
        Some(raw) => Some(raw.parse().context("variant_count must be a number")?),
        None => None,
    };

    let brief_text = std::fs::read_to_string(&brief_path)
        .with_context(|| format!("reading brief {brief_path}"))?;
    let raw_brief: RawBrief =
        serde_json::from_str(&brief_text).context("brief file is not valid JSON")?;

    let config = EngineConfig::from_env()?;
    let settings = llm_settings();
    let kind = ImageBackendKind::from_name(
        &env_opt("FLYERFORGE_IMAGE_BACKEND").unwrap_or_else(|| "diffusion".to_string()),
    )?;
    tracing::info!(
        backend = kind.as_str(),
        variants = variant_count.unwrap_or(config.variant_count),
        qc_enabled = config.qc_enabled,
        "Worker starting",
    );

    report_health(&settings, kind).await?;

    let api_key = settings.resolve_api_key();
    let text_chat = ChatClient::new(
        settings.resolve_base_url(LlmKind::Text)?,
        api_key.clone(),
        "text-llm",
        config.llm_timeout,
    );
    let vision_chat = ChatClient::new(
        settings.resolve_base_url(LlmKind::Vision)?,
        api_key.clone(),
        "vision-llm",
        config.llm_timeout,
    );
    let vision_model = settings.resolve_model(LlmKind::Vision)?;
    let copywriter = LlmCopywriter::new(text_chat, settings.resolve_model(LlmKind::Text)?)
        .with_vision(
            ChatClient::new(
                settings.resolve_base_url(LlmKind::Vision)?,
                api_key,
                "vision-llm",
                config.llm_timeout,
            ),
            vision_model.clone(),
        );
    let inspector = VisionInspector::new(vision_chat, vision_model, config.qc_cutoff);

    let images = Arc::new(ImageClient::new(
        image_backend(kind)?,
        config.image_parallelism,
        config.image_timeout,
    ));

    let persist_enabled = env_opt("FLYERFORGE_PERSIST_ENABLED").as_deref() == Some("1");
    let store: Arc<dyn RunStore> = if persist_enabled {
        let database_url = env_opt("DATABASE_URL")
            .context("DATABASE_URL is required when FLYERFORGE_PERSIST_ENABLED=1")?;
        let pool = flyerforge_db::create_pool(&database_url)
            .await
            .context("connecting to the database")?;
        Arc::new(PgRunStore::new(pool))
    } else {
        Arc::new(MemoryRunStore::new())
    };
    let image_store: Arc<dyn ImageStore> = Arc::new(LocalImageStore::new(&config.output_dir));

    let controller = RunController::new(
        config,
        Arc::new(copywriter),
        Arc::new(inspector),
        images,
        store,
        image_store,
    );

    let outcome = controller.execute(raw_brief, variant_count).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if outcome.status == RunStatus::Failed {
        std::process::exit(1);
    }
    Ok(())
}
