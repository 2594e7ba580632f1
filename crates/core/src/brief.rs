//! Brief validation and normalization.
//!
//! A [`RawBrief`] is what the caller submits; [`normalize`] validates it
//! and produces the canonical immutable [`Brief`] every other component
//! consumes. Rejected briefs never create a run.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::EngineError;
use crate::size::PrintSize;

/// Opening hours for a single day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayHours {
    pub day: String,
    #[serde(default)]
    pub open: Option<String>,
    #[serde(default)]
    pub close: Option<String>,
    #[serde(default)]
    pub closed: bool,
}

/// Weekly opening hours, with an optional pre-formatted display override.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusinessHours {
    /// When set, used verbatim instead of the weekly breakdown.
    #[serde(default)]
    pub display: Option<String>,
    #[serde(default)]
    pub weekly: Vec<DayHours>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl BusinessHours {
    /// Render the hours as a single printable line.
    pub fn format(&self) -> String {
        if let Some(display) = &self.display {
            return display.clone();
        }
        let mut parts: Vec<String> = Vec::new();
        for day in &self.weekly {
            if day.closed {
                parts.push(format!("{} closed", day.day));
                continue;
            }
            match (&day.open, &day.close) {
                (Some(open), Some(close)) => parts.push(format!("{} {open}-{close}", day.day)),
                (Some(open), None) => parts.push(format!("{} {open}", day.day)),
                _ => {}
            }
        }
        if let Some(notes) = &self.notes {
            parts.push(notes.clone());
        }
        parts.join("; ")
    }
}

/// Identity and contact details for the business being advertised.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BusinessDetails {
    #[validate(length(min = 1, message = "business name is required"))]
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub service_area: Option<String>,
    #[serde(default)]
    pub hours: Option<BusinessHours>,
}

/// The brief exactly as submitted by the caller.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RawBrief {
    #[validate(nested)]
    pub business: BusinessDetails,
    #[validate(length(min = 1, message = "product is required"))]
    pub product: String,
    #[validate(length(min = 1, message = "offer is required"))]
    pub offer: String,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub cta: Option<String>,
    #[serde(default)]
    pub audience: Option<String>,
    /// Physical print format, e.g. `"6x9"`.
    pub size: String,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub brand_colors: Vec<String>,
    #[serde(default)]
    pub style_keywords: Vec<String>,
    #[serde(default)]
    pub reference_images: Vec<String>,
}

/// The canonical brief. Immutable once a run starts.
#[derive(Debug, Clone, Serialize)]
pub struct Brief {
    pub business: BusinessDetails,
    pub product: String,
    pub offer: String,
    pub tone: String,
    pub cta: Option<String>,
    pub audience: Option<String>,
    pub size: PrintSize,
    pub constraints: Vec<String>,
    pub brand_colors: Vec<String>,
    pub style_keywords: Vec<String>,
    pub reference_images: Vec<String>,
}

/// Default tone when the caller leaves it blank.
const DEFAULT_TONE: &str = "friendly";

/// Trim entries and drop the ones that end up empty.
fn normalize_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validate and canonicalize a raw brief.
///
/// Rejects with [`EngineError::Validation`] when the business name,
/// product, or offer is missing, or when the size is not a recognized
/// physical format. No side effects.
pub fn normalize(raw: RawBrief) -> Result<Brief, EngineError> {
    raw.validate()
        .map_err(|e| EngineError::Validation(e.to_string()))?;
    let size = PrintSize::from_name(&raw.size)?;

    let mut business = raw.business;
    business.name = business.name.trim().to_string();
    business.address = non_empty(business.address);
    business.city = non_empty(business.city);
    business.state = non_empty(business.state);
    business.postal_code = non_empty(business.postal_code);
    business.phone = non_empty(business.phone);
    business.website = non_empty(business.website);
    business.service_area = non_empty(business.service_area);

    Ok(Brief {
        business,
        product: raw.product.trim().to_string(),
        offer: raw.offer.trim().to_string(),
        tone: non_empty(raw.tone).unwrap_or_else(|| DEFAULT_TONE.to_string()),
        cta: non_empty(raw.cta),
        audience: non_empty(raw.audience),
        size,
        constraints: normalize_list(raw.constraints),
        brand_colors: normalize_list(raw.brand_colors),
        style_keywords: normalize_list(raw.style_keywords),
        reference_images: normalize_list(raw.reference_images),
    })
}

impl Brief {
    /// The contact block printed on the flyer footer: name, address,
    /// phone, website, hours, service area -- whatever is present.
    pub fn business_block(&self) -> String {
        let d = &self.business;
        let city_line = [d.city.as_deref(), d.state.as_deref(), d.postal_code.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        let hours = d.hours.as_ref().map(|h| h.format()).unwrap_or_default();
        let mut parts: Vec<&str> = vec![d.name.as_str()];
        for part in [
            d.address.as_deref(),
            if city_line.is_empty() {
                None
            } else {
                Some(city_line.as_str())
            },
            d.phone.as_deref(),
            d.website.as_deref(),
            if hours.is_empty() {
                None
            } else {
                Some(hours.as_str())
            },
            d.service_area.as_deref(),
        ]
        .into_iter()
        .flatten()
        {
            parts.push(part);
        }
        parts.join(" ")
    }

    /// Every literal string the finished flyer must carry: business
    /// details plus phrases mandated by "include ..." constraints.
    ///
    /// Used by the QC gate as its required-text checklist.
    pub fn required_literals(&self) -> Vec<String> {
        let mut required = extract_required_from_constraints(&self.constraints);
        let d = &self.business;
        let hours = d.hours.as_ref().map(|h| h.format()).unwrap_or_default();
        for value in [
            Some(d.name.as_str()),
            d.address.as_deref(),
            d.city.as_deref(),
            d.state.as_deref(),
            d.postal_code.as_deref(),
            d.phone.as_deref(),
            d.website.as_deref(),
            if hours.is_empty() {
                None
            } else {
                Some(hours.as_str())
            },
            d.service_area.as_deref(),
        ]
        .into_iter()
        .flatten()
        {
            required.push(value.to_string());
        }
        required
    }
}

/// Pull mandated phrases out of free-text constraints.
///
/// Only constraints mentioning "include" contribute. Quoted phrases win
/// (`include 'Free Estimate'`); otherwise a trailing `:`-separated value
/// is taken (`must include: Licensed & Insured`).
fn extract_required_from_constraints(constraints: &[String]) -> Vec<String> {
    let mut required = Vec::new();
    for item in constraints {
        let text = item.trim();
        if text.is_empty() || !text.to_lowercase().contains("include") {
            continue;
        }
        if text.contains('\'') {
            let parts: Vec<&str> = text.split('\'').collect();
            for idx in (1..parts.len()).step_by(2) {
                let phrase = parts[idx].trim();
                if !phrase.is_empty() {
                    required.push(phrase.to_string());
                }
            }
            continue;
        }
        if let Some((_, value)) = text.split_once(':') {
            let value = value.trim();
            if !value.is_empty() {
                required.push(value.to_string());
            }
        }
    }
    required
}
