//! Brand style derivation results and color handling.
//!
//! [`BrandStyle`] is what the style-derivation model call returns for a
//! run; sanitization strips human-subject language because the image
//! prompts must stay people-free. The named-color table maps the loose
//! color names briefs tend to use onto printable hex values.

use serde::{Deserialize, Serialize};

/// Resolved brand styling for a run, derived once at run start.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrandStyle {
    #[serde(default)]
    pub palette: Vec<String>,
    #[serde(default)]
    pub style_keywords: Vec<String>,
    #[serde(default)]
    pub layout_guidance: String,
    #[serde(default)]
    pub typography_guidance: String,
}

/// Tokens that must never reach an image prompt.
const HUMAN_SUBJECT_TOKENS: &[&str] = &[
    "people", "person", "faces", "face", "hands", "human", "portrait",
];

impl BrandStyle {
    /// Drop human-subject style keywords and layout sentences that
    /// mention them.
    pub fn sanitized(self) -> BrandStyle {
        let style_keywords = self
            .style_keywords
            .into_iter()
            .filter(|kw| !HUMAN_SUBJECT_TOKENS.contains(&kw.to_lowercase().as_str()))
            .collect();

        let mut clean_sentences: Vec<&str> = Vec::new();
        for sentence in self.layout_guidance.split('.') {
            let sentence = sentence.trim();
            if sentence.is_empty() {
                continue;
            }
            let lower = sentence.to_lowercase();
            if HUMAN_SUBJECT_TOKENS.iter().any(|t| lower.contains(t)) {
                continue;
            }
            clean_sentences.push(sentence);
        }
        let mut layout_guidance = clean_sentences.join(". ");
        if !layout_guidance.is_empty() {
            layout_guidance.push('.');
        }

        BrandStyle {
            palette: self.palette,
            style_keywords,
            layout_guidance,
            typography_guidance: self.typography_guidance,
        }
    }
}

// ---------------------------------------------------------------------------
// Color resolution
// ---------------------------------------------------------------------------

/// Loose color names briefs and style models commonly produce.
const NAMED_COLORS: &[(&str, &str)] = &[
    ("black", "#111111"),
    ("white", "#ffffff"),
    ("navy", "#0a2140"),
    ("gold", "#d4af37"),
    ("blue", "#1e67b6"),
    ("red", "#c82020"),
    ("green", "#1c8c55"),
    ("mint green", "#98ffcc"),
    ("coral", "#ff7f50"),
    ("sunny yellow", "#ffd640"),
    ("coral_red", "#ff6f61"),
    ("soft grey", "#d9d9d9"),
    ("soft gray", "#d9d9d9"),
    ("citrus yellow", "#ffd640"),
    ("sky blue", "#62b6ff"),
    ("mushroom tan", "#cdb79e"),
    ("powder pink", "#ffd1dc"),
];

/// Resolve a color name or hex string to `#rrggbb`.
///
/// Named colors come from the table; `#abc` expands to `#aabbcc`;
/// anything else returns `None`.
pub fn normalize_hex(value: &str) -> Option<String> {
    let raw = value.trim().to_lowercase();
    if raw.is_empty() {
        return None;
    }
    if let Some((_, hex)) = NAMED_COLORS.iter().find(|(name, _)| *name == raw) {
        return Some((*hex).to_string());
    }
    if let Some(hex) = raw.strip_prefix('#') {
        if hex.len() == 3 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
            let expanded: String = hex.chars().flat_map(|c| [c, c]).collect();
            return Some(format!("#{expanded}"));
        }
        if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Some(format!("#{hex}"));
        }
    }
    None
}

/// First resolvable color in the palette, or the fallback.
pub fn resolve_palette_hex(palette: &[String], fallback: &str) -> String {
    palette
        .iter()
        .find_map(|item| normalize_hex(item))
        .unwrap_or_else(|| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- sanitization ---------------------------------------------------------

    #[test]
    fn sanitize_removes_human_keywords() {
        let style = BrandStyle {
            style_keywords: vec!["fresh".into(), "Faces".into(), "bold".into()],
            ..Default::default()
        };
        assert_eq!(style.sanitized().style_keywords, vec!["fresh", "bold"]);
    }

    #[test]
    fn sanitize_drops_layout_sentences_mentioning_humans() {
        let style = BrandStyle {
            layout_guidance: "Bold top banner. Smiling people in the center. Clean footer".into(),
            ..Default::default()
        };
        assert_eq!(
            style.sanitized().layout_guidance,
            "Bold top banner. Clean footer."
        );
    }

    #[test]
    fn sanitize_empty_layout_stays_empty() {
        let style = BrandStyle::default();
        assert_eq!(style.sanitized().layout_guidance, "");
    }

    // -- color resolution -----------------------------------------------------

    #[test]
    fn named_colors_resolve() {
        assert_eq!(normalize_hex("coral").as_deref(), Some("#ff7f50"));
        assert_eq!(normalize_hex(" Sunny Yellow ").as_deref(), Some("#ffd640"));
    }

    #[test]
    fn short_hex_expands() {
        assert_eq!(normalize_hex("#1af").as_deref(), Some("#11aaff"));
    }

    #[test]
    fn full_hex_passes_through() {
        assert_eq!(normalize_hex("#1E67B6").as_deref(), Some("#1e67b6"));
    }

    #[test]
    fn unknown_color_is_none() {
        assert_eq!(normalize_hex("sparkly"), None);
        assert_eq!(normalize_hex("#12"), None);
    }

    #[test]
    fn palette_resolution_falls_back() {
        let palette = vec!["sparkly".to_string(), "navy".to_string()];
        assert_eq!(resolve_palette_hex(&palette, "#1e67b6"), "#0a2140");
        assert_eq!(resolve_palette_hex(&[], "#1e67b6"), "#1e67b6");
    }
}
