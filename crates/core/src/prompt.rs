//! Prompt composition for copy generation, brand-style derivation, and
//! image generation.
//!
//! Everything here is deterministic: identical inputs produce identical
//! strings. The only variation across variant indices is the explicit
//! variation hint appended to the copy instruction, which keeps parallel
//! variants from being near-duplicates.

use crate::brand::BrandStyle;
use crate::brief::Brief;
use crate::copy::{
    AdCopy, MAX_BODY_WORDS, MAX_CTA_WORDS, MAX_DISCLAIMER_WORDS, MAX_HEADLINE_WORDS,
    MAX_SUBHEAD_WORDS,
};

/// Default character budget for an image prompt when the backend does
/// not declare one.
pub const DEFAULT_PROMPT_BUDGET: usize = 1800;

/// Schema reminder appended when the model returns un-parseable copy.
pub const COPY_SCHEMA_REMINDER: &str = "Return valid JSON matching the schema \
    {\"headline\": string, \"subhead\": string, \"body\": string, \
    \"cta\": string, \"disclaimer\": string}. JSON only, no markdown.";

/// Angle hints cycled across variant indices.
const VARIATION_HINTS: &[&str] = &[
    "lead with the offer and a sense of urgency",
    "lead with the product experience and concrete sensory detail",
    "lead with the audience and how the product fits their day",
    "lead with the business name and neighborhood trust",
    "lead with the savings and plain numbers",
];

// ---------------------------------------------------------------------------
// Copy instruction
// ---------------------------------------------------------------------------

/// Build the text-generation instruction for one variant's ad copy.
pub fn copy_instruction(brief: &Brief, style: &BrandStyle, variant_index: u32) -> String {
    let palette = pick_list(&style.palette, &brief.brand_colors);
    let keywords = pick_list(&style.style_keywords, &brief.style_keywords);
    let constraints = brief.constraints.join("; ");
    let hint = variation_hint(variant_index);

    let mut out = format!(
        "You are a direct-response copywriter for a mailer flyer. \
         Return one copy variant as a JSON object with keys: headline, subhead, body, cta, disclaimer. \
         Constraints: headline <= {MAX_HEADLINE_WORDS} words, subhead <= {MAX_SUBHEAD_WORDS} words, \
         body <= {MAX_BODY_WORDS} words, cta <= {MAX_CTA_WORDS} words, \
         disclaimer <= {MAX_DISCLAIMER_WORDS} words. \
         Keep text clean and printable. Avoid emojis. English only. \
         Include the business name in the copy. "
    );
    if let Some(cta) = &brief.cta {
        out.push_str(&format!("Preferred CTA: {cta}. Use it as the CTA if possible. "));
    }
    out.push_str(&format!(
        "Required details: {}. ",
        if constraints.is_empty() {
            "none"
        } else {
            constraints.as_str()
        }
    ));
    out.push_str(&format!("Business details: {}. ", brief.business_block()));
    out.push_str(&format!(
        "Business: {}. Product: {}. Offer: {}. Tone: {}. Audience: {}. ",
        brief.business.name,
        brief.product,
        brief.offer,
        brief.tone,
        brief.audience.as_deref().unwrap_or("local households"),
    ));
    if !palette.is_empty() {
        out.push_str(&format!("Palette: {}. ", palette.join(", ")));
    }
    out.push_str(&format!(
        "Style: {}. ",
        if keywords.is_empty() {
            "modern, friendly".to_string()
        } else {
            keywords.join(", ")
        }
    ));
    out.push_str("Return JSON only, no markdown. ");
    out.push_str(&hint);
    out
}

/// The per-index variation hint appended to the copy instruction.
pub fn variation_hint(variant_index: u32) -> String {
    let hint = VARIATION_HINTS[variant_index as usize % VARIATION_HINTS.len()];
    format!("Variation {}: {hint}.", variant_index + 1)
}

/// Re-prompt for the single corrective retry after a parse failure.
pub fn corrective_instruction(original: &str) -> String {
    format!("{original} {COPY_SCHEMA_REMINDER}")
}

// ---------------------------------------------------------------------------
// Brand style instructions
// ---------------------------------------------------------------------------

/// Instruction for deriving a brand style from the brief text alone.
pub fn style_instruction(brief: &Brief) -> String {
    format!(
        "You are a brand designer for direct-mail flyers. Return JSON with keys: \
         palette (array of color names), style_keywords (array), layout_guidance (string), \
         typography_guidance (string). Return JSON only. \
         Business: {}. Product: {}. Offer: {}. Tone: {}. Audience: {}.",
        brief.business.name,
        brief.product,
        brief.offer,
        brief.tone,
        brief.audience.as_deref().unwrap_or("local households"),
    )
}

/// Instruction for deriving a brand style from reference images.
pub const STYLE_FROM_IMAGES_INSTRUCTION: &str = "Analyze the brand visuals and return JSON \
    with keys: palette (array of hex or color names), style_keywords (array), \
    layout_guidance (string), typography_guidance (string). Return JSON only, no markdown.";

// ---------------------------------------------------------------------------
// Image prompt
// ---------------------------------------------------------------------------

/// Fixed negative prompt for every image backend.
pub const NEGATIVE_PROMPT: &str = "text, letters, words, numbers, logos, watermarks, labels, \
    signage, icons, diagrams, charts, UI, people, faces, hands, clutter";

/// Build the image-generation prompt for one variant, within `budget`
/// characters.
///
/// The prompt asks for a text-free background with overlay regions
/// reserved for the copy. When the assembled prompt exceeds the budget,
/// style keywords are dropped from the end first, then the layout
/// guidance, then the palette. The brand-critical sentence (business
/// name, product, offer) is never truncated.
pub fn image_prompt(brief: &Brief, style: &BrandStyle, _copy: &AdCopy, budget: usize) -> String {
    let palette = pick_list(&style.palette, &brief.brand_colors);
    let mut keywords = pick_list(&style.style_keywords, &brief.style_keywords);
    let mut include_layout = !style.layout_guidance.is_empty();
    let mut include_palette = true;

    loop {
        let prompt = assemble_image_prompt(
            brief,
            style,
            &keywords,
            &palette,
            include_layout,
            include_palette,
        );
        if prompt.len() <= budget {
            return prompt;
        }
        if !keywords.is_empty() {
            keywords.pop();
        } else if include_layout {
            include_layout = false;
        } else if include_palette {
            include_palette = false;
        } else {
            // Only the brand-critical base remains; emit it as-is.
            return prompt;
        }
    }
}

fn assemble_image_prompt(
    brief: &Brief,
    style: &BrandStyle,
    keywords: &[String],
    palette: &[String],
    include_layout: bool,
    include_palette: bool,
) -> String {
    let size = brief.size.as_str();
    let mut out = format!(
        "Create a photorealistic background image for a {size} inch direct-mail promo flyer. \
         Do NOT include any text, letters, words, logos, signage, menus, labels, or typography. \
         Design the composition to leave clean space for overlays: top third reserved for \
         headline and subhead; mid area reserved for body; lower area reserved for a CTA button \
         and footer details. Keep those regions simple and uncluttered. "
    );
    out.push_str(&format!(
        "Visual style: {}. ",
        if keywords.is_empty() {
            "clean, modern, photographic".to_string()
        } else {
            keywords.join(", ")
        }
    ));
    if include_palette {
        out.push_str(&format!(
            "Color palette: {}. ",
            if palette.is_empty() {
                "clean whites, one strong accent color".to_string()
            } else {
                palette.join(", ")
            }
        ));
    }
    if include_layout {
        out.push_str(&format!("Layout guidance: {} ", style.layout_guidance));
    }
    out.push_str(&format!(
        "Business: {}. Product: {}. Offer: {}. ",
        brief.business.name, brief.product, brief.offer,
    ));
    out.push_str("No people, faces, hands. High contrast and printable.");
    out
}

/// Style fields win over the raw brief lists; both may be empty.
fn pick_list(style_list: &[String], brief_list: &[String]) -> Vec<String> {
    if !style_list.is_empty() {
        style_list.to_vec()
    } else {
        brief_list.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brief::{normalize, BusinessDetails, RawBrief};

    fn brief() -> Brief {
        normalize(RawBrief {
            business: BusinessDetails {
                name: "Sunrise Smoothies".into(),
                address: None,
                city: None,
                state: None,
                postal_code: None,
                phone: None,
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
            style_keywords: vec!["fresh".into(), "bright".into(), "summery".into()],
            reference_images: vec![],
        })
        .unwrap()
    }

    fn copy() -> AdCopy {
        AdCopy {
            headline: "BOGO Smoothie Days".into(),
            subhead: "Two smoothies, one price".into(),
            body: "Real fruit blended fresh.".into(),
            cta: "Visit Us Today".into(),
            disclaimer: None,
        }
    }

    // -- determinism and variation --------------------------------------------

    #[test]
    fn copy_instruction_is_deterministic() {
        let b = brief();
        let style = BrandStyle::default();
        assert_eq!(copy_instruction(&b, &style, 2), copy_instruction(&b, &style, 2));
    }

    #[test]
    fn variant_indices_differ_only_by_hint() {
        let b = brief();
        let style = BrandStyle::default();
        let a = copy_instruction(&b, &style, 0);
        let c = copy_instruction(&b, &style, 1);
        assert_ne!(a, c);
        assert!(a.contains("Variation 1"));
        assert!(c.contains("Variation 2"));
    }

    #[test]
    fn variation_hints_cycle() {
        let n = VARIATION_HINTS.len() as u32;
        assert_eq!(
            variation_hint(0).replace("Variation 1", ""),
            variation_hint(n).replace(&format!("Variation {}", n + 1), ""),
        );
    }

    #[test]
    fn corrective_instruction_appends_schema() {
        let out = corrective_instruction("write copy");
        assert!(out.starts_with("write copy"));
        assert!(out.contains("valid JSON matching the schema"));
    }

    // -- budget enforcement ---------------------------------------------------

    #[test]
    fn image_prompt_within_generous_budget_keeps_keywords() {
        let prompt = image_prompt(&brief(), &BrandStyle::default(), &copy(), 4000);
        assert!(prompt.contains("fresh, bright, summery"));
        assert!(prompt.contains("coral"));
    }

    #[test]
    fn tight_budget_truncates_keywords_before_brand_fields() {
        let b = brief();
        let full = image_prompt(&b, &BrandStyle::default(), &copy(), 4000);
        let tight = image_prompt(&b, &BrandStyle::default(), &copy(), full.len() - 10);
        assert!(!tight.contains("summery"));
        assert!(tight.contains("Sunrise Smoothies"));
        assert!(tight.contains("Buy one get one free"));
    }

    #[test]
    fn brand_fields_survive_any_budget() {
        let prompt = image_prompt(&brief(), &BrandStyle::default(), &copy(), 10);
        assert!(prompt.contains("Sunrise Smoothies"));
        assert!(prompt.contains("Buy one get one free"));
    }

    #[test]
    fn style_keywords_from_brand_style_win_over_brief() {
        let style = BrandStyle {
            style_keywords: vec!["minimal".into()],
            ..Default::default()
        };
        let prompt = image_prompt(&brief(), &style, &copy(), 4000);
        assert!(prompt.contains("minimal"));
        assert!(!prompt.contains("summery"));
    }
}
