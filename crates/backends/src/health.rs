//! Pre-run health probes for the configured model and image backends.
//!
//! Cheap liveness checks with short timeouts; pure reporting, never
//! fatal. The worker binary runs these before starting a run so a dead
//! local server fails loudly instead of burning a retry budget.

use std::time::Duration;

use flyerforge_comfy::api::CompositorApi;

/// One probed endpoint.
#[derive(Debug, Clone)]
pub struct HealthCheck {
    pub name: String,
    pub ok: bool,
    pub detail: String,
}

/// Probe timeout; these endpoints answer instantly when alive.
const PROBE_TIMEOUT: Duration = Duration::from_millis(2500);

fn probe_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(PROBE_TIMEOUT)
        .build()
        .unwrap_or_default()
}

async fn probe_get(name: &str, url: &str) -> HealthCheck {
    match probe_client().get(url).send().await {
        Ok(response) if response.status().is_success() => HealthCheck {
            name: name.to_string(),
            ok: true,
            detail: "ok".to_string(),
        },
        Ok(response) => HealthCheck {
            name: name.to_string(),
            ok: false,
            detail: format!("error: HTTP {}", response.status()),
        },
        Err(e) => HealthCheck {
            name: name.to_string(),
            ok: false,
            detail: format!("error: {e}"),
        },
    }
}

/// Probe the text and vision model endpoints via `GET /models`.
///
/// When both roles share a base URL a single `llm` check is emitted;
/// otherwise one check per role.
pub async fn check_llm(text_base_url: &str, vision_base_url: &str) -> Vec<HealthCheck> {
    let text = text_base_url.trim_end_matches('/');
    let vision = vision_base_url.trim_end_matches('/');
    if text == vision {
        return vec![probe_get("llm", &format!("{text}/models")).await];
    }
    vec![
        probe_get("llm_text", &format!("{text}/models")).await,
        probe_get("llm_vision", &format!("{vision}/models")).await,
    ]
}

/// Probe a diffusion server's options endpoint.
///
/// Accepts either the base URL or the full txt2img endpoint.
pub async fn check_diffusion(api_url: &str) -> HealthCheck {
    let base = match api_url.split_once("/sdapi/v1/") {
        Some((base, _)) => base,
        None => api_url,
    };
    probe_get(
        "diffusion",
        &format!("{}/sdapi/v1/options", base.trim_end_matches('/')),
    )
    .await
}

/// Probe a workflow compositor's system-stats endpoint.
pub async fn check_compositor(api_url: &str) -> HealthCheck {
    let api = CompositorApi::new(api_url);
    match tokio::time::timeout(PROBE_TIMEOUT, api.system_stats()).await {
        Ok(Ok(())) => HealthCheck {
            name: "compositor".to_string(),
            ok: true,
            detail: "ok".to_string(),
        },
        Ok(Err(e)) => HealthCheck {
            name: "compositor".to_string(),
            ok: false,
            detail: format!("error: {e}"),
        },
        Err(_) => HealthCheck {
            name: "compositor".to_string(),
            ok: false,
            detail: "error: probe timed out".to_string(),
        },
    }
}

/// Overall verdict across a set of checks.
pub fn all_ok(checks: &[HealthCheck]) -> bool {
    checks.iter().all(|check| check.ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_ok_requires_every_check() {
        let ok = HealthCheck {
            name: "llm".into(),
            ok: true,
            detail: "ok".into(),
        };
        let bad = HealthCheck {
            name: "diffusion".into(),
            ok: false,
            detail: "error: connection refused".into(),
        };
        assert!(all_ok(&[ok.clone()]));
        assert!(!all_ok(&[ok, bad]));
        assert!(all_ok(&[]));
    }

    #[tokio::test]
    async fn shared_llm_base_url_probes_once() {
        // Unroutable address: the probe fails fast, which is all this
        // test needs to observe the dedup behavior.
        let checks = check_llm("http://127.0.0.1:1/v1", "http://127.0.0.1:1/v1/").await;
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].name, "llm");
    }

    #[tokio::test]
    async fn distinct_llm_base_urls_probe_both_roles() {
        let checks = check_llm("http://127.0.0.1:1/v1", "http://127.0.0.1:2/v1").await;
        assert_eq!(checks.len(), 2);
        assert_eq!(checks[0].name, "llm_text");
        assert_eq!(checks[1].name, "llm_vision");
    }
}
