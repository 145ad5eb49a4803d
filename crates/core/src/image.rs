//! Image decoding seam and decoded-image payloads.
//!
//! Sample decoding (DCT, CCITT, bit depths, color conversion) lives behind
//! [`ImageDecoder`]. The evaluator handles sizing checks, mask
//! special-casing, inline embedding and caching; see the interp module.

use crate::error::Result;
use crate::model::Dict;
use async_trait::async_trait;
use bytes::Bytes;

/// Inline images at or below this decoded size are memoized per call and
/// embedded directly in operator lists.
pub const SMALL_IMAGE_BYTES: usize = 1000;

/// Pixel layout of decoded image data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Gray8,
    Rgb24,
    Rgba32,
}

/// A decoded raster image ready for the renderer.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub kind: ImageKind,
    pub data: Bytes,
}

impl DecodedImage {
    pub fn byte_size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// A decoded 1-bit stencil mask. Mask pixels take the fill color active at
/// paint time, so masks bypass the general image pipeline.
#[derive(Debug, Clone)]
pub struct MaskData {
    pub width: u32,
    pub height: u32,
    /// One byte per pixel, 0 = transparent
    pub data: Bytes,
}

/// External image decoding.
#[async_trait]
pub trait ImageDecoder: Send + Sync {
    /// Decode image samples out-of-band. The returned pixel buffer is
    /// pushed to the renderer by identifier.
    async fn build_image(
        &self,
        dict: &Dict,
        data: Bytes,
        resources: &Dict,
        force_rgba: bool,
    ) -> Result<DecodedImage>;

    /// Decode a 1-bit image mask directly.
    fn create_mask(&self, data: Bytes, width: u32, height: u32, invert: bool) -> Result<MaskData>;
}

/// Decoder that treats stream data as already-decoded samples. Backs tests
/// and the CLI tools, where no codec stack is wired up.
pub struct RawImageDecoder;

#[async_trait]
impl ImageDecoder for RawImageDecoder {
    async fn build_image(
        &self,
        dict: &Dict,
        data: Bytes,
        _resources: &Dict,
        force_rgba: bool,
    ) -> Result<DecodedImage> {
        let width = dict.get("Width").and_then(|w| w.as_num().ok()).unwrap_or(0.0) as u32;
        let height = dict
            .get("Height")
            .and_then(|h| h.as_num().ok())
            .unwrap_or(0.0) as u32;
        let kind = if force_rgba {
            ImageKind::Rgba32
        } else {
            match dict.get("ColorSpace").and_then(|cs| cs.as_name().ok()) {
                Some("DeviceRGB") | Some("RGB") => ImageKind::Rgb24,
                _ => ImageKind::Gray8,
            }
        };
        Ok(DecodedImage {
            width,
            height,
            kind,
            data,
        })
    }

    fn create_mask(&self, data: Bytes, width: u32, height: u32, invert: bool) -> Result<MaskData> {
        // Unpack one bit per pixel, rows padded to byte boundaries.
        let row_bytes = ((width as usize) + 7) / 8;
        let mut out = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height as usize {
            for x in 0..width as usize {
                let byte = data.get(y * row_bytes + x / 8).copied().unwrap_or(0);
                let bit = (byte >> (7 - (x % 8))) & 1;
                let on = (bit == 1) != invert;
                out.push(if on { 0xff } else { 0 });
            }
        }
        Ok(MaskData {
            width,
            height,
            data: Bytes::from(out),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_mask_unpacks_bits() {
        let decoder = RawImageDecoder;
        // Two rows of 4 pixels: 1010, 0110
        let mask = decoder
            .create_mask(Bytes::from_static(&[0b1010_0000, 0b0110_0000]), 4, 2, false)
            .unwrap();
        assert_eq!(mask.data.as_ref(), &[255, 0, 255, 0, 0, 255, 255, 0]);
    }

    #[test]
    fn test_create_mask_invert() {
        let decoder = RawImageDecoder;
        let mask = decoder
            .create_mask(Bytes::from_static(&[0b1000_0000]), 1, 1, true)
            .unwrap();
        assert_eq!(mask.data.as_ref(), &[0]);
    }
}
