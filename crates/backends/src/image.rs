//! The uniform image-generation contract and its gated client wrapper.
//!
//! Every backend variant adapts its own HTTP or process contract to
//! [`ImageBackend::generate`]. [`ImageClient`] wraps the selected
//! backend with the pieces every run needs regardless of backend: a
//! global concurrency ceiling (many local backends only support one
//! in-flight job), a per-call timeout, backend-name error tagging, and
//! a dimension check on returned buffers.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::time::Duration;

use flyerforge_core::brand::BrandStyle;
use flyerforge_core::brief::Brief;
use flyerforge_core::copy::AdCopy;
use flyerforge_core::error::EngineError;
use flyerforge_core::size::PrintSize;

/// Style parameters a backend may bind; each backend takes its subset
/// and ignores the rest rather than failing.
#[derive(Debug, Clone, Default)]
pub struct StyleParams {
    pub steps: Option<u32>,
    pub guidance_scale: Option<f64>,
    pub sampler: Option<String>,
    pub scheduler: Option<String>,
    pub seed: Option<i64>,
    pub denoise: Option<f64>,
    pub checkpoint: Option<String>,
    pub quality: Option<String>,
    /// Designated output node for workflow backends.
    pub output_node: Option<String>,
}

/// One image-generation request.
///
/// The prompt pair and size drive every backend; the creative context
/// is carried for backends that typeset the copy themselves (the
/// workflow compositor) and ignored by the rest.
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub prompt: String,
    pub negative_prompt: String,
    pub size: PrintSize,
    pub params: StyleParams,
    pub brief: Arc<Brief>,
    pub style: Arc<BrandStyle>,
    pub copy: AdCopy,
    pub variant_index: u32,
}

/// What a backend produced: raw bytes, or a reference the backend
/// already hosts.
#[derive(Debug, Clone)]
pub enum ImagePayload {
    Bytes(Vec<u8>),
    Url(String),
}

/// A generated image plus the backend that produced it.
#[derive(Debug, Clone)]
pub struct ImageResult {
    pub payload: ImagePayload,
    pub backend: &'static str,
}

/// One image-producing backend variant.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    /// Stable backend name used in error tags and run records.
    fn name(&self) -> &'static str;

    async fn generate(&self, request: &ImageRequest) -> Result<ImageResult, EngineError>;
}

// ---------------------------------------------------------------------------
// Gated client
// ---------------------------------------------------------------------------

/// The image generation client handed to orchestrators.
pub struct ImageClient {
    backend: Box<dyn ImageBackend>,
    /// Global ceiling on in-flight generation calls, independent of how
    /// many variants are logically concurrent.
    gate: Arc<Semaphore>,
    timeout: Duration,
}

impl ImageClient {
    pub fn new(backend: Box<dyn ImageBackend>, max_inflight: usize, timeout: Duration) -> Self {
        Self {
            backend,
            gate: Arc::new(Semaphore::new(max_inflight.max(1))),
            timeout,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Generate one image under the global ceiling and timeout.
    ///
    /// A timed-out call surfaces as a [`EngineError::Generation`]
    /// tagged with the backend name, identical to a transport failure
    /// for retry purposes.
    pub async fn generate_image(&self, request: &ImageRequest) -> Result<ImageResult, EngineError> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| EngineError::Internal("image gate closed".to_string()))?;

        let result = match tokio::time::timeout(self.timeout, self.backend.generate(request)).await
        {
            Err(_) => {
                return Err(EngineError::generation(
                    self.backend.name(),
                    format!("timed out after {:?}", self.timeout),
                ))
            }
            Ok(Err(e)) => return Err(e),
            Ok(Ok(result)) => result,
        };

        if let ImagePayload::Bytes(bytes) = &result.payload {
            verify_dimensions(bytes, request.size, self.backend.name())?;
        }
        Ok(result)
    }
}

/// Header-only decode to confirm the buffer matches the requested
/// print format.
fn verify_dimensions(
    bytes: &[u8],
    size: PrintSize,
    backend: &'static str,
) -> Result<(), EngineError> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| EngineError::generation(backend, format!("unreadable image buffer: {e}")))?;
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| EngineError::generation(backend, format!("undecodable image header: {e}")))?;
    let (want_w, want_h) = size.dimensions();
    if (width, height) != (want_w, want_h) {
        return Err(EngineError::generation(
            backend,
            format!("produced {width}x{height}, requested {want_w}x{want_h}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use flyerforge_core::brief::{normalize, BusinessDetails, RawBrief};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn request() -> ImageRequest {
        let brief = normalize(RawBrief {
            business: BusinessDetails {
                name: "Acme HVAC".into(),
                address: None,
                city: None,
                state: None,
                postal_code: None,
                phone: None,
                website: None,
                service_area: None,
                hours: None,
            },
            product: "Furnace tune-up".into(),
            offer: "$79 seasonal special".into(),
            tone: None,
            cta: None,
            audience: None,
            size: "6x9".into(),
            constraints: vec![],
            brand_colors: vec![],
            style_keywords: vec![],
            reference_images: vec![],
        })
        .unwrap();
        ImageRequest {
            prompt: "warm living room".into(),
            negative_prompt: "text".into(),
            size: brief.size,
            params: StyleParams::default(),
            brief: Arc::new(brief),
            style: Arc::new(BrandStyle::default()),
            copy: AdCopy {
                headline: "h".into(),
                subhead: "s".into(),
                body: "b".into(),
                cta: "c".into(),
                disclaimer: None,
            },
            variant_index: 0,
        }
    }

    /// Backend that records peak concurrency and sleeps briefly.
    struct CountingBackend {
        inflight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ImageBackend for CountingBackend {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn generate(&self, _request: &ImageRequest) -> Result<ImageResult, EngineError> {
            let now = self.inflight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.inflight.fetch_sub(1, Ordering::SeqCst);
            Ok(ImageResult {
                payload: ImagePayload::Url("http://img/1.png".into()),
                backend: "counting",
            })
        }
    }

    struct SlowBackend;

    #[async_trait]
    impl ImageBackend for SlowBackend {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn generate(&self, _request: &ImageRequest) -> Result<ImageResult, EngineError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            unreachable!("the timeout should fire first")
        }
    }

    #[tokio::test]
    async fn ceiling_serializes_calls() {
        let inflight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let client = Arc::new(ImageClient::new(
            Box::new(CountingBackend {
                inflight: Arc::clone(&inflight),
                peak: Arc::clone(&peak),
            }),
            1,
            Duration::from_secs(5),
        ));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let client = Arc::clone(&client);
            let request = request();
            handles.push(tokio::spawn(async move {
                client.generate_image(&request).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_surfaces_as_tagged_generation_error() {
        let client = ImageClient::new(Box::new(SlowBackend), 1, Duration::from_millis(50));
        let err = client.generate_image(&request()).await.unwrap_err();
        assert_matches!(err, EngineError::Generation { backend, .. } if backend == "slow");
    }

    fn png_of(width: u32, height: u32) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(image::RgbaImage::new(width, height))
            .write_to(&mut buffer, image::ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    #[test]
    fn dimension_mismatch_is_a_generation_error() {
        // A valid PNG, but the wrong size for a 6x9 flyer.
        let tiny = png_of(1, 1);
        let err = verify_dimensions(&tiny, PrintSize::Flyer6x9, "test").unwrap_err();
        assert_matches!(err, EngineError::Generation { message, .. } if message.contains("1x1"));
    }

    #[test]
    fn matching_dimensions_pass() {
        let buffer = png_of(1024, 1536);
        assert!(verify_dimensions(&buffer, PrintSize::Flyer6x9, "test").is_ok());
    }
}
