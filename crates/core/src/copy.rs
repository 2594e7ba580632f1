//! Ad copy schema and length constraints.
//!
//! The copy limits keep every field printable at flyer scale; the text
//! generation client asks the model for exactly this schema and the
//! composer repeats the limits in its instruction.

use serde::{Deserialize, Serialize};

/// Maximum words per copy field.
pub const MAX_HEADLINE_WORDS: usize = 6;
pub const MAX_SUBHEAD_WORDS: usize = 10;
pub const MAX_BODY_WORDS: usize = 28;
pub const MAX_CTA_WORDS: usize = 4;
pub const MAX_DISCLAIMER_WORDS: usize = 12;

/// One variant's ad copy in the fixed generation schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdCopy {
    pub headline: String,
    pub subhead: String,
    pub body: String,
    pub cta: String,
    #[serde(default)]
    pub disclaimer: Option<String>,
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

impl AdCopy {
    /// Whether every field is non-empty (disclaimer excepted) and within
    /// its word limit.
    pub fn within_limits(&self) -> bool {
        let disclaimer_words = self
            .disclaimer
            .as_deref()
            .map(word_count)
            .unwrap_or_default();
        (1..=MAX_HEADLINE_WORDS).contains(&word_count(&self.headline))
            && (1..=MAX_SUBHEAD_WORDS).contains(&word_count(&self.subhead))
            && (1..=MAX_BODY_WORDS).contains(&word_count(&self.body))
            && (1..=MAX_CTA_WORDS).contains(&word_count(&self.cta))
            && disclaimer_words <= MAX_DISCLAIMER_WORDS
    }

    /// Every non-empty copy string, in flyer order. These are part of
    /// the QC gate's required-text checklist.
    pub fn required_strings(&self) -> Vec<String> {
        let mut out = vec![
            self.headline.clone(),
            self.subhead.clone(),
            self.body.clone(),
            self.cta.clone(),
        ];
        if let Some(disclaimer) = &self.disclaimer {
            if !disclaimer.is_empty() {
                out.push(disclaimer.clone());
            }
        }
        out.retain(|s| !s.trim().is_empty());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn copy() -> AdCopy {
        AdCopy {
            headline: "Fresh Smoothies Every Morning".into(),
            subhead: "Cold pressed and blended to order".into(),
            body: "Stop by for a healthy start. Real fruit, no syrups.".into(),
            cta: "Visit Us Today".into(),
            disclaimer: Some("Offer valid through June".into()),
        }
    }

    #[test]
    fn valid_copy_within_limits() {
        assert!(copy().within_limits());
    }

    #[test]
    fn long_headline_out_of_limits() {
        let mut c = copy();
        c.headline = "This headline definitely has far too many words in it".into();
        assert!(!c.within_limits());
    }

    #[test]
    fn empty_body_out_of_limits() {
        let mut c = copy();
        c.body = "".into();
        assert!(!c.within_limits());
    }

    #[test]
    fn missing_disclaimer_is_allowed() {
        let mut c = copy();
        c.disclaimer = None;
        assert!(c.within_limits());
    }

    #[test]
    fn required_strings_skip_empty_disclaimer() {
        let mut c = copy();
        c.disclaimer = Some("".into());
        assert_eq!(c.required_strings().len(), 4);
    }
}
