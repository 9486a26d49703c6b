//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the conversion worker (which decides whether a page is
//! downscaled) and the [`codec`](super::codec) (which does the actual pixel
//! work). This separation allows swapping codecs (e.g. for testing with a
//! mock) without changing conversion logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (0–100, default 85). Clamped on construction.
//! - [`ResizeDecision`]: Whether a page keeps its size or is scaled to a target height.
//! - [`EncodeParams`]: Everything the encoder needs besides the pixels.

/// Quality setting for lossy image encoding (0-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.min(100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(85)
    }
}

/// Outcome of the resize policy for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeDecision {
    /// Encode at the decoded dimensions.
    Unchanged,
    /// Scale to this height; the width follows the aspect ratio.
    Resize { target_height: u32 },
}

impl ResizeDecision {
    pub fn target_height(self) -> Option<u32> {
        match self {
            Self::Unchanged => None,
            Self::Resize { target_height } => Some(target_height),
        }
    }
}

/// Parameters for a single encode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeParams {
    pub quality: Quality,
    pub target_height: Option<u32>,
}
