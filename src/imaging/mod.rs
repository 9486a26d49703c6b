//! Page image processing.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::load_from_memory` (JPEG, PNG, WebP, BMP, GIF, TGA) |
//! | **Resize policy** | [`decide_resize`]: downscale only when taller than the cap |
//! | **Resize** | Lanczos3 via `image::imageops::resize` |
//! | **Encode** | lossy WebP via the `webp` crate |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Codec**: [`ImageCodec`] trait + [`RustCodec`]

mod calculations;
pub mod codec;
mod params;
pub mod rust_codec;

pub use calculations::{decide_resize, scaled_width};
pub use codec::{CodecError, DecodedImage, ImageCodec};
pub use params::{EncodeParams, Quality, ResizeDecision};
pub use rust_codec::RustCodec;
