//! Shared mock backends for engine integration tests.
//!
//! The mocks are programmable: fail the first N calls with a transport
//! or parse error, score QC per variant index, or return a template
//! fault. Call counts are exposed so tests can assert retry accounting
//! and copy reuse.

use std::io::Cursor;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use flyerforge_backends::image::{
    ImageBackend, ImageClient, ImagePayload, ImageRequest, ImageResult,
};
use flyerforge_backends::text::TextGenerator;
use flyerforge_backends::vision::QualityInspector;
use flyerforge_core::brand::BrandStyle;
use flyerforge_core::brief::{BusinessDetails, Brief, RawBrief};
use flyerforge_core::copy::AdCopy;
use flyerforge_core::error::EngineError;
use flyerforge_core::qc::QcOutcome;
use flyerforge_engine::config::EngineConfig;
use flyerforge_engine::run::RunController;
use flyerforge_engine::store::{MemoryImageStore, MemoryRunStore};

pub fn raw_brief() -> RawBrief {
    RawBrief {
        business: BusinessDetails {
            name: "Sunrise Smoothies".into(),
            address: Some("12 Main St".into()),
            city: Some("Springfield".into()),
            state: Some("IL".into()),
            postal_code: Some("62704".into()),
            phone: Some("(217) 555-0188".into()),
            website: None,
            service_area: None,
            hours: None,
        },
        product: "Fresh fruit smoothies".into(),
        offer: "Buy one get one free".into(),
        tone: Some("upbeat".into()),
        cta: Some("Visit us today".into()),
        audience: None,
        size: "6x9".into(),
        constraints: vec![],
        brand_colors: vec!["coral".into()],
        style_keywords: vec!["fresh".into()],
        reference_images: vec![],
    }
}

/// Pull the variant index back out of the instruction's variation hint.
fn index_from_instruction(instruction: &str) -> u32 {
    instruction
        .rfind("Variation ")
        .and_then(|at| {
            instruction[at + "Variation ".len()..]
                .split(':')
                .next()?
                .trim()
                .parse::<u32>()
                .ok()
        })
        .map(|n| n - 1)
        .unwrap_or(0)
}

fn index_from_copy(copy: &AdCopy) -> usize {
    copy.headline
        .rsplit(' ')
        .next()
        .and_then(|tail| tail.parse().ok())
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Text mock
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockText {
    pub copy_calls: AtomicU32,
    pub style_calls: AtomicU32,
    parse_failures: AtomicU32,
    transport_failures: AtomicU32,
}

impl MockText {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the first `n` copy calls with a parse error.
    pub fn with_parse_failures(self: Arc<Self>, n: u32) -> Arc<Self> {
        self.parse_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Fail the first `n` copy calls with a transport error.
    pub fn with_transport_failures(self: Arc<Self>, n: u32) -> Arc<Self> {
        self.transport_failures.store(n, Ordering::SeqCst);
        self
    }
}

fn take_failure(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl TextGenerator for MockText {
    fn model_id(&self) -> String {
        "mock-text".to_string()
    }

    async fn generate_copy(
        &self,
        instruction: &str,
        _brief: &Brief,
    ) -> Result<AdCopy, EngineError> {
        self.copy_calls.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.transport_failures) {
            return Err(EngineError::generation("text-llm", "connection reset"));
        }
        if take_failure(&self.parse_failures) {
            return Err(EngineError::Parse("no JSON in response".to_string()));
        }
        let index = index_from_instruction(instruction);
        Ok(AdCopy {
            headline: format!("Mock Headline {index}"),
            subhead: "Two smoothies, one price".into(),
            body: "Real fruit blended fresh every morning.".into(),
            cta: "Visit Us Today".into(),
            disclaimer: Some("Terms apply.".into()),
        })
    }

    async fn derive_style(&self, _brief: &Brief) -> Result<BrandStyle, EngineError> {
        self.style_calls.fetch_add(1, Ordering::SeqCst);
        Ok(BrandStyle {
            palette: vec!["coral".into(), "sunny yellow".into()],
            style_keywords: vec!["fresh".into(), "bright".into()],
            layout_guidance: "Bold top banner. Clean footer.".into(),
            typography_guidance: "Rounded sans-serif.".into(),
        })
    }
}

// ---------------------------------------------------------------------------
// Inspector mock
// ---------------------------------------------------------------------------

pub struct MockInspector {
    pub calls: AtomicU32,
    /// Score per variant index; indices past the end score 0.95.
    scores: Vec<f64>,
    cutoff: f64,
    transport_failures: AtomicU32,
}

impl MockInspector {
    pub fn pass_all() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            scores: Vec::new(),
            cutoff: 0.5,
            transport_failures: AtomicU32::new(0),
        })
    }

    pub fn with_scores(scores: Vec<f64>, cutoff: f64) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            scores,
            cutoff,
            transport_failures: AtomicU32::new(0),
        })
    }

    pub fn with_transport_failures(self: Arc<Self>, n: u32) -> Arc<Self> {
        self.transport_failures.store(n, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl QualityInspector for MockInspector {
    fn model_id(&self) -> String {
        "mock-vision".to_string()
    }

    async fn evaluate(
        &self,
        _image: &ImagePayload,
        _brief: &Brief,
        copy: &AdCopy,
    ) -> Result<QcOutcome, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.transport_failures) {
            return Err(EngineError::generation("vision-llm", "connection reset"));
        }
        let index = index_from_copy(copy);
        let score = self.scores.get(index).copied().unwrap_or(0.95);
        Ok(QcOutcome {
            passed: score >= self.cutoff,
            score,
            rationale: format!("mock score {score}"),
        })
    }
}

// ---------------------------------------------------------------------------
// Image backend mock
// ---------------------------------------------------------------------------

pub enum MockImageMode {
    /// Return a hosted-style URL reference.
    Url,
    /// Return an in-memory PNG of the requested print size.
    Bytes,
    /// Fail every call with a template fault.
    TemplateFault,
}

pub struct MockImageBackend {
    pub calls: Arc<AtomicU32>,
    mode: MockImageMode,
    transport_failures: AtomicU32,
}

impl MockImageBackend {
    pub fn new(mode: MockImageMode) -> Self {
        Self {
            calls: Arc::new(AtomicU32::new(0)),
            mode,
            transport_failures: AtomicU32::new(0),
        }
    }

    pub fn with_transport_failures(self, n: u32) -> Self {
        self.transport_failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn call_counter(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.calls)
    }
}

/// Encode a real PNG at the requested dimensions so the client's
/// header check passes.
pub fn png_of(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::new(width, height);
    let mut buffer = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut buffer, image::ImageFormat::Png)
        .unwrap();
    buffer.into_inner()
}

#[async_trait]
impl ImageBackend for MockImageBackend {
    fn name(&self) -> &'static str {
        "mock-image"
    }

    async fn generate(&self, request: &ImageRequest) -> Result<ImageResult, EngineError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.transport_failures) {
            return Err(EngineError::generation("mock-image", "connection reset"));
        }
        let payload = match self.mode {
            MockImageMode::Url => ImagePayload::Url(format!("http://img.mock/{call}.png")),
            MockImageMode::Bytes => {
                let (w, h) = request.size.dimensions();
                ImagePayload::Bytes(png_of(w, h))
            }
            MockImageMode::TemplateFault => {
                return Err(EngineError::Template(
                    "No value supplied for template tokens: CTA".to_string(),
                ))
            }
        };
        Ok(ImageResult {
            payload,
            backend: "mock-image",
        })
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub controller: RunController,
    pub store: Arc<MemoryRunStore>,
    pub image_store: Arc<MemoryImageStore>,
}

pub fn harness(
    config: EngineConfig,
    text: Arc<MockText>,
    inspector: Arc<MockInspector>,
    backend: MockImageBackend,
) -> Harness {
    let store = Arc::new(MemoryRunStore::new());
    let image_store = Arc::new(MemoryImageStore::new());
    let images = Arc::new(ImageClient::new(
        Box::new(backend),
        config.image_parallelism,
        config.image_timeout,
    ));
    let controller = RunController::new(
        config,
        text,
        inspector,
        images,
        Arc::clone(&store) as _,
        Arc::clone(&image_store) as _,
    );
    Harness {
        controller,
        store,
        image_store,
    }
}
