//! Image codec trait and shared types.
//!
//! The [`ImageCodec`] trait defines the two operations the conversion worker
//! needs: decode raw bytes into pixels, and encode pixels into the output
//! format (optionally downscaled on the way).
//!
//! The production implementation is
//! [`RustCodec`](super::rust_codec::RustCodec). Tests use the mock in
//! [`tests::MockCodec`], which fabricates pixels from a textual payload so
//! pipeline logic can be exercised without real image files.

use super::params::EncodeParams;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("unsupported pixel layout: {channels} channels")]
    UnsupportedLayout { channels: u8 },
}

/// A decoded page: 8 bits per channel, row-major, tightly packed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    /// Wrap a raw pixel buffer, checking that its length matches the dimensions.
    pub fn from_raw(
        width: u32,
        height: u32,
        channels: u8,
        pixels: Vec<u8>,
    ) -> Result<Self, CodecError> {
        let expected = width as usize * height as usize * channels as usize;
        if pixels.len() != expected {
            return Err(CodecError::Decode(format!(
                "pixel buffer is {} bytes, expected {expected} for {width}x{height}x{channels}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            pixels,
        })
    }
}

/// Trait for image codecs.
///
/// `Sync` because one codec instance is shared by every conversion worker.
pub trait ImageCodec: Sync {
    /// Decode an encoded image held in memory.
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, CodecError>;

    /// Encode pixels into the output format, scaling to
    /// `params.target_height` (aspect preserved) when set.
    fn encode(&self, image: &DecodedImage, params: EncodeParams) -> Result<Vec<u8>, CodecError>;

    /// Suffix of the produced format, without the dot.
    fn output_extension(&self) -> &'static str;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::calculations::scaled_width;
    use crate::imaging::Quality;
    use std::sync::Mutex;

    /// Mock codec that records operations without touching real image data.
    ///
    /// Payload convention:
    /// - `b"WxH"` decodes to a `W`×`H` RGB image of zeros.
    /// - `b"WxH!"` decodes the same way, but encoding it fails.
    /// - anything else fails to decode.
    ///
    /// Encoding produces `b"OWxOH@Q"` where `OW`×`OH` are the output
    /// dimensions and `Q` the quality, so tests can read back what happened.
    ///
    /// Uses Mutex (not RefCell) so it is Sync and works across rayon workers.
    #[derive(Default)]
    pub struct MockCodec {
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Decode {
            width: u32,
            height: u32,
        },
        Encode {
            width: u32,
            height: u32,
            quality: u32,
            target_height: Option<u32>,
        },
    }

    /// Payload that the mock decodes to a `width`×`height` page.
    pub fn mock_payload(width: u32, height: u32) -> Vec<u8> {
        format!("{width}x{height}").into_bytes()
    }

    /// Payload that decodes but whose encode fails.
    pub fn mock_payload_failing_encode(width: u32, height: u32) -> Vec<u8> {
        format!("{width}x{height}!").into_bytes()
    }

    /// Parse `OWxOH@Q` produced by [`MockCodec::encode`].
    pub fn parse_mock_output(bytes: &[u8]) -> (u32, u32, u32) {
        let text = std::str::from_utf8(bytes).unwrap();
        let (dims, quality) = text.split_once('@').unwrap();
        let (w, h) = dims.split_once('x').unwrap();
        (w.parse().unwrap(), h.parse().unwrap(), quality.parse().unwrap())
    }

    /// Marker byte stored in the first pixel of pages whose encode must fail.
    const FAIL_ENCODE: u8 = 0xEE;

    impl MockCodec {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }
    }

    impl ImageCodec for MockCodec {
        fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, CodecError> {
            let text = std::str::from_utf8(bytes)
                .map_err(|_| CodecError::Decode("not a mock payload".into()))?;
            let (text, fail_encode) = match text.strip_suffix('!') {
                Some(t) => (t, true),
                None => (text, false),
            };
            let (w, h) = text
                .split_once('x')
                .and_then(|(w, h)| Some((w.parse::<u32>().ok()?, h.parse::<u32>().ok()?)))
                .ok_or_else(|| CodecError::Decode(format!("bad mock payload {text:?}")))?;

            self.operations.lock().unwrap().push(RecordedOp::Decode {
                width: w,
                height: h,
            });

            let mut pixels = vec![0u8; w as usize * h as usize * 3];
            if fail_encode {
                if let Some(first) = pixels.first_mut() {
                    *first = FAIL_ENCODE;
                }
            }
            DecodedImage::from_raw(w, h, 3, pixels)
        }

        fn encode(
            &self,
            image: &DecodedImage,
            params: EncodeParams,
        ) -> Result<Vec<u8>, CodecError> {
            self.operations.lock().unwrap().push(RecordedOp::Encode {
                width: image.width,
                height: image.height,
                quality: params.quality.value(),
                target_height: params.target_height,
            });

            if image.pixels.first() == Some(&FAIL_ENCODE) {
                return Err(CodecError::Encode("mock encode failure".into()));
            }

            let (w, h) = match params.target_height {
                Some(th) => (scaled_width(image.width, image.height, th), th),
                None => (image.width, image.height),
            };
            Ok(format!("{w}x{h}@{}", params.quality.value()).into_bytes())
        }

        fn output_extension(&self) -> &'static str {
            "webp"
        }
    }

    #[test]
    fn from_raw_accepts_matching_buffer() {
        let img = DecodedImage::from_raw(4, 2, 3, vec![0; 24]).unwrap();
        assert_eq!((img.width, img.height, img.channels), (4, 2, 3));
    }

    #[test]
    fn from_raw_rejects_short_buffer() {
        let result = DecodedImage::from_raw(4, 2, 3, vec![0; 23]);
        assert!(matches!(result, Err(CodecError::Decode(_))));
    }

    #[test]
    fn mock_records_decode() {
        let codec = MockCodec::new();
        let img = codec.decode(&mock_payload(800, 600)).unwrap();
        assert_eq!(img.width, 800);
        assert_eq!(img.height, 600);

        let ops = codec.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(
            &ops[0],
            RecordedOp::Decode {
                width: 800,
                height: 600
            }
        ));
    }

    #[test]
    fn mock_rejects_garbage() {
        let codec = MockCodec::new();
        assert!(codec.decode(b"\x89PNG garbage").is_err());
        assert!(codec.get_operations().is_empty());
    }

    #[test]
    fn mock_encode_reports_scaled_dimensions() {
        let codec = MockCodec::new();
        let img = codec.decode(&mock_payload(2000, 3000)).unwrap();
        let out = codec
            .encode(
                &img,
                EncodeParams {
                    quality: Quality::new(80),
                    target_height: Some(1440),
                },
            )
            .unwrap();
        assert_eq!(parse_mock_output(&out), (960, 1440, 80));
    }

    #[test]
    fn mock_encode_failure_payload() {
        let codec = MockCodec::new();
        let img = codec.decode(&mock_payload_failing_encode(10, 10)).unwrap();
        let result = codec.encode(
            &img,
            EncodeParams {
                quality: Quality::default(),
                target_height: None,
            },
        );
        assert!(matches!(result, Err(CodecError::Encode(_))));
    }
}
