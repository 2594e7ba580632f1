//! REST client for the workflow-compositor HTTP endpoints.
//!
//! Wraps the compositor's HTTP API (workflow submission, history
//! polling, output download, cancellation) using [`reqwest`]. The
//! compositor executes asynchronously: submit returns a prompt id, and
//! the caller polls [`CompositorApi::outputs_for`] until the node
//! outputs appear.

use serde::Deserialize;

/// HTTP client for a single compositor server.
pub struct CompositorApi {
    client: reqwest::Client,
    api_url: String,
}

/// Response returned by the compositor `/prompt` endpoint after
/// successfully queuing a workflow.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned identifier for the queued workflow.
    pub prompt_id: String,
    /// Position in the execution queue.
    #[serde(default)]
    pub number: i32,
}

/// One produced image reference inside a node's outputs.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputImage {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    #[serde(default = "default_output_type", rename = "type")]
    pub image_type: String,
}

fn default_output_type() -> String {
    "output".to_string()
}

/// Errors from the compositor REST layer.
#[derive(Debug, thiserror::Error)]
pub enum CompositorApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The compositor returned a non-2xx status code.
    #[error("Compositor API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The execution finished without a usable image output.
    #[error("Compositor produced no image output: {0}")]
    MissingOutput(String),
}

impl CompositorApi {
    /// Create a new API client for a compositor server.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8188`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Base HTTP API URL.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Submit a workflow for execution.
    ///
    /// Sends `POST /prompt` with the rendered workflow document and a
    /// client id, returning the server-assigned `prompt_id`.
    pub async fn submit_workflow(
        &self,
        workflow: &serde_json::Value,
        client_id: &str,
    ) -> Result<SubmitResponse, CompositorApiError> {
        let body = serde_json::json!({
            "prompt": workflow,
            "client_id": client_id,
        });

        let response = self
            .client
            .post(format!("{}/prompt", self.api_url))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// One polling step: fetch `GET /history/{prompt_id}` and return the
    /// node outputs if the execution has produced any yet.
    pub async fn outputs_for(
        &self,
        prompt_id: &str,
    ) -> Result<Option<serde_json::Value>, CompositorApiError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.api_url, prompt_id))
            .send()
            .await?;
        let history: serde_json::Value = Self::parse_response(response).await?;
        Ok(history
            .get(prompt_id)
            .and_then(|entry| entry.get("outputs"))
            .filter(|outputs| outputs.as_object().is_some_and(|o| !o.is_empty()))
            .cloned())
    }

    /// Download one produced image via `GET /view`.
    pub async fn fetch_image(&self, image: &OutputImage) -> Result<Vec<u8>, CompositorApiError> {
        let response = self
            .client
            .get(format!("{}/view", self.api_url))
            .query(&[
                ("filename", image.filename.as_str()),
                ("subfolder", image.subfolder.as_str()),
                ("type", image.image_type.as_str()),
            ])
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Cancel a queued execution.
    ///
    /// Sends `POST /queue` asking the compositor to delete the prompt
    /// from its queue.
    pub async fn cancel_execution(&self, prompt_id: &str) -> Result<(), CompositorApiError> {
        let body = serde_json::json!({
            "delete": [prompt_id],
        });

        let response = self
            .client
            .post(format!("{}/queue", self.api_url))
            .json(&body)
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Liveness probe against `GET /system_stats`.
    pub async fn system_stats(&self) -> Result<(), CompositorApiError> {
        let response = self
            .client
            .get(format!("{}/system_stats", self.api_url))
            .send()
            .await?;
        Self::check_status(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a
    /// [`CompositorApiError::ApiError`] containing the status and body
    /// text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, CompositorApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(CompositorApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, CompositorApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), CompositorApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

/// Pick the image to keep from an execution's node outputs.
///
/// The designated output node wins when it produced images; otherwise
/// the first node with images is taken.
pub fn select_output_image(
    outputs: &serde_json::Value,
    preferred_node: Option<&str>,
) -> Result<OutputImage, CompositorApiError> {
    let nodes = outputs.as_object().ok_or_else(|| {
        CompositorApiError::MissingOutput("outputs is not an object".to_string())
    })?;

    let first_image = |node: &serde_json::Value| -> Option<OutputImage> {
        node.get("images")
            .and_then(|images| images.as_array())
            .and_then(|images| images.first())
            .and_then(|image| serde_json::from_value(image.clone()).ok())
    };

    if let Some(preferred) = preferred_node {
        if let Some(node) = nodes.get(preferred) {
            if let Some(image) = first_image(node) {
                return Ok(image);
            }
        }
    }
    for node in nodes.values() {
        if let Some(image) = first_image(node) {
            return Ok(image);
        }
    }
    Err(CompositorApiError::MissingOutput(
        "no node produced images".to_string(),
    ))
}
