//! Recognized physical print formats for direct-mail pieces.
//!
//! Generation dimensions are model-friendly pixel sizes (multiples of 8)
//! matching each format's aspect ratio, not raw 300 DPI dimensions.

use crate::error::EngineError;

/// A recognized direct-mail print format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PrintSize {
    /// 4x6 inch postcard.
    Postcard4x6,
    /// 6x9 inch flyer.
    Flyer6x9,
    /// 8.5x11 inch letter sheet.
    Letter8x11,
}

impl PrintSize {
    /// Parse from a user-supplied size string.
    ///
    /// Accepts the inch notation used by the caller-facing request
    /// (`"4x6"`, `"6x9"`, `"8.5x11"`), case-insensitive with surrounding
    /// whitespace ignored.
    pub fn from_name(name: &str) -> Result<Self, EngineError> {
        match name.trim().to_lowercase().as_str() {
            "4x6" => Ok(Self::Postcard4x6),
            "6x9" => Ok(Self::Flyer6x9),
            "8.5x11" => Ok(Self::Letter8x11),
            other => Err(EngineError::Validation(format!(
                "Unrecognized print size '{other}'. Must be one of: 4x6, 6x9, 8.5x11"
            ))),
        }
    }

    /// Canonical name, matching the accepted input notation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Postcard4x6 => "4x6",
            Self::Flyer6x9 => "6x9",
            Self::Letter8x11 => "8.5x11",
        }
    }

    /// Generation dimensions in pixels, portrait orientation.
    ///
    /// 4x6 and 6x9 share the same 2:3 aspect and use the SDXL-native
    /// 1024x1536; letter is the nearest multiple-of-8 pair to 8.5:11.
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Self::Postcard4x6 => (1024, 1536),
            Self::Flyer6x9 => (1024, 1536),
            Self::Letter8x11 => (1192, 1544),
        }
    }

    /// Width in pixels.
    pub fn width(self) -> u32 {
        self.dimensions().0
    }

    /// Height in pixels.
    pub fn height(self) -> u32 {
        self.dimensions().1
    }

    /// The `WxH` size string some hosted image APIs expect.
    pub fn as_pixel_string(self) -> String {
        let (w, h) = self.dimensions();
        format!("{w}x{h}")
    }
}
