//! Image encoding: [`PageImage`] → base64 PNG wrapped in `ImageData`.
//!
//! Vision APIs accept images as base64 data embedded in the JSON request.
//! PNG keeps glyph edges lossless, which matters more than size for OCR.
//! `detail: "high"` lets GPT-4-class models tile the full page instead of
//! reading a single downscaled overview.

use crate::document::PageImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page as a base64 PNG ready for a vision model.
pub fn encode_page(page: &PageImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    DynamicImage::ImageLuma8(page.as_gray().clone())
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!(
        "Encoded {}x{} page → {} bytes base64",
        page.width(),
        page.height(),
        b64.len()
    );

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn encode_small_page() {
        let page = PageImage::new(GrayImage::from_pixel(10, 10, Luma([128])));
        let data = encode_page(&page).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");

        let png = STANDARD.decode(&data.data).unwrap();
        assert!(png.starts_with(b"\x89PNG"));
    }
}
