//! Stage A — rasterisation: turn a [`Document`] into grayscale [`PageImage`]s.
//!
//! ## Why spawn_blocking?
//!
//! Decoding and page rendering are CPU-bound, and `pdfium-render` wraps a C++
//! library with thread-local state. [`rasterize`] moves the work onto the
//! blocking pool so async worker threads never stall on a 300 DPI render.
//!
//! ## Contrast normalisation
//!
//! Every page, whether decoded from an image or rendered from a PDF, is
//! histogram-equalised so phone photos and greyish scans span the full
//! 0–255 range before recognition.

use crate::config::IngestConfig;
use crate::document::{Document, DocumentKind, PageImage};
use crate::error::IngestError;
use image::GrayImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Rendering parameters shared by every page of one run.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Target resolution in samples per inch (PDF pages only).
    pub dpi: u32,
    /// Longest rendered edge in pixels.
    pub max_rendered_pixels: u32,
    /// PDF user password.
    pub password: Option<String>,
}

impl RenderOptions {
    pub fn from_config(config: &IngestConfig) -> Self {
        Self {
            dpi: config.dpi,
            max_rendered_pixels: config.max_rendered_pixels,
            password: config.password.clone(),
        }
    }
}

/// Converts document bytes into page images.
pub trait Rasterizer: Send + Sync {
    /// Render every page of `bytes`, interpreted as `kind`.
    ///
    /// # Errors
    /// [`IngestError::Decode`] when the bytes are not a valid `kind`.
    fn render(
        &self,
        bytes: &[u8],
        kind: DocumentKind,
        options: &RenderOptions,
    ) -> Result<Vec<PageImage>, IngestError>;
}

/// Run `rasterizer` on the blocking pool and enforce the non-empty contract.
pub async fn rasterize(
    rasterizer: Arc<dyn Rasterizer>,
    document: Document,
    options: RenderOptions,
) -> Result<Vec<PageImage>, IngestError> {
    let kind = document.kind();
    let bytes = document.into_bytes();

    let pages = tokio::task::spawn_blocking(move || rasterizer.render(&bytes, kind, &options))
        .await
        .map_err(|e| IngestError::Internal(format!("Render task panicked: {}", e)))??;

    if pages.is_empty() {
        return Err(IngestError::Decode {
            kind,
            detail: "document has no pages".into(),
        });
    }
    if let Some((i, p)) = pages
        .iter()
        .enumerate()
        .find(|(_, p)| p.width() == 0 || p.height() == 0)
    {
        return Err(IngestError::Decode {
            kind,
            detail: format!("page {} has empty dimensions {}x{}", i + 1, p.width(), p.height()),
        });
    }
    Ok(pages)
}

/// Default rasteriser: the `image` crate for images, pdfium for PDFs.
#[derive(Debug, Clone, Default)]
pub struct DocumentRasterizer {
    pdfium_library_path: Option<PathBuf>,
}

impl DocumentRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load pdfium from this directory (or library file) instead of
    /// `PDFIUM_LIB_PATH` / the system library.
    pub fn with_pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.pdfium_library_path = Some(path.into());
        self
    }

    pub fn from_config(config: &IngestConfig) -> Self {
        Self {
            pdfium_library_path: config.pdfium_library_path.clone(),
        }
    }

    fn render_pdf(&self, bytes: &[u8], options: &RenderOptions) -> Result<Vec<PageImage>, IngestError> {
        // Checked before binding so garbage input never needs the library.
        if !bytes.starts_with(b"%PDF") {
            let magic: Vec<u8> = bytes.iter().take(4).copied().collect();
            return Err(IngestError::Decode {
                kind: DocumentKind::MultiPageDocument,
                detail: format!("missing %PDF header (first bytes: {:?})", magic),
            });
        }

        let pdfium = bind_pdfium(self.pdfium_library_path.as_deref())?;
        let password = options.password.as_deref();

        let document = pdfium
            .load_pdf_from_byte_slice(bytes, password)
            .map_err(|e| {
                let err_str = format!("{:?}", e);
                if err_str.contains("Password") || err_str.contains("password") {
                    if password.is_some() {
                        IngestError::WrongPassword
                    } else {
                        IngestError::PasswordRequired
                    }
                } else {
                    IngestError::Decode {
                        kind: DocumentKind::MultiPageDocument,
                        detail: err_str,
                    }
                }
            })?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        info!("PDF loaded: {} pages", total_pages);

        let scale = options.dpi as f32 / 72.0;
        let max = options.max_rendered_pixels as i32;
        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(scale)
            .set_maximum_width(max)
            .set_maximum_height(max);

        let mut results = Vec::with_capacity(total_pages);
        for (idx, page) in pages.iter().enumerate() {
            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|e| IngestError::Decode {
                    kind: DocumentKind::MultiPageDocument,
                    detail: format!("page {}: {:?}", idx + 1, e),
                })?;

            let gray = bitmap.as_image().to_luma8();
            debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                gray.width(),
                gray.height()
            );
            results.push(PageImage::new(equalize_histogram(&gray)));
        }

        Ok(results)
    }
}

impl Rasterizer for DocumentRasterizer {
    fn render(
        &self,
        bytes: &[u8],
        kind: DocumentKind,
        options: &RenderOptions,
    ) -> Result<Vec<PageImage>, IngestError> {
        match kind {
            DocumentKind::Image => decode_image(bytes).map(|page| vec![page]),
            DocumentKind::MultiPageDocument => self.render_pdf(bytes, options),
        }
    }
}

/// Decode a single raster image to an equalised grayscale page.
pub fn decode_image(bytes: &[u8]) -> Result<PageImage, IngestError> {
    let img = image::load_from_memory(bytes).map_err(|e| IngestError::Decode {
        kind: DocumentKind::Image,
        detail: e.to_string(),
    })?;
    let gray = img.to_luma8();
    debug!("Decoded image → {}x{} px", gray.width(), gray.height());
    Ok(PageImage::new(equalize_histogram(&gray)))
}

/// Bind pdfium from an explicit path, `PDFIUM_LIB_PATH`, or the system library.
fn bind_pdfium(path: Option<&Path>) -> Result<Pdfium, IngestError> {
    let location = path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

    let bindings = match location {
        Some(location) => {
            let library = if location.is_file() {
                location
            } else {
                Pdfium::pdfium_platform_library_name_at_path(&location)
            };
            debug!("Binding pdfium from {}", library.display());
            Pdfium::bind_to_library(&library)
        }
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| IngestError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// Histogram equalisation (contrast normalisation) of an 8-bit grayscale image.
///
/// Maps each level through the normalised cumulative histogram so the
/// output spans 0–255. Single-level images are returned unchanged.
pub fn equalize_histogram(img: &GrayImage) -> GrayImage {
    let total = img.width() as u64 * img.height() as u64;
    let mut hist = [0u64; 256];
    for &v in img.as_raw() {
        hist[v as usize] += 1;
    }

    let cdf_min = hist.iter().copied().find(|&c| c > 0).unwrap_or(0);
    if total == 0 || total == cdf_min {
        return img.clone();
    }

    let denom = (total - cdf_min) as f64;
    let mut lut = [0u8; 256];
    let mut cumulative = 0u64;
    for (level, &count) in hist.iter().enumerate() {
        cumulative += count;
        lut[level] = if cumulative <= cdf_min {
            0
        } else {
            ((cumulative - cdf_min) as f64 * 255.0 / denom).round() as u8
        };
    }

    let mut out = img.clone();
    for pixel in out.pixels_mut() {
        pixel.0[0] = lut[pixel.0[0] as usize];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Luma};
    use std::io::Cursor;

    fn png_bytes(img: GrayImage) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn options() -> RenderOptions {
        RenderOptions::from_config(&IngestConfig::default())
    }

    #[test]
    fn equalization_spreads_levels() {
        let img = GrayImage::from_fn(4, 1, |x, _| Luma([50 + 50 * x as u8]));
        let out = equalize_histogram(&img);
        let levels: Vec<u8> = out.as_raw().clone();
        assert_eq!(levels, vec![0, 85, 170, 255]);
    }

    #[test]
    fn equalization_keeps_flat_image() {
        let img = GrayImage::from_pixel(3, 3, Luma([77]));
        assert_eq!(equalize_histogram(&img), img);
    }

    #[test]
    fn equalization_preserves_order() {
        let img = GrayImage::from_fn(16, 16, |x, y| Luma([(100 + (x + y) % 40) as u8]));
        let out = equalize_histogram(&img);
        let (src, dst) = (img.as_raw(), out.as_raw());
        for i in 0..src.len() {
            for j in 0..src.len() {
                if src[i] < src[j] {
                    assert!(dst[i] < dst[j]);
                }
            }
        }
    }

    #[test]
    fn decodes_png_to_one_gray_page() {
        let img = GrayImage::from_fn(20, 10, |x, _| Luma([(x * 10) as u8]));
        let pages = DocumentRasterizer::new()
            .render(&png_bytes(img), DocumentKind::Image, &options())
            .unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!((pages[0].width(), pages[0].height()), (20, 10));
        assert_eq!(pages[0].as_raw().iter().max(), Some(&255));
        assert_eq!(pages[0].as_raw().iter().min(), Some(&0));
    }

    #[test]
    fn garbage_is_decode_error_for_both_kinds() {
        let r = DocumentRasterizer::new();
        let garbage = b"definitely not an image or a pdf";
        for kind in [DocumentKind::Image, DocumentKind::MultiPageDocument] {
            let err = r.render(garbage, kind, &options()).unwrap_err();
            assert!(err.is_decode(), "{kind}: {err}");
        }
    }

    #[tokio::test]
    async fn rasterize_rejects_empty_output() {
        struct Empty;
        impl Rasterizer for Empty {
            fn render(&self, _: &[u8], _: DocumentKind, _: &RenderOptions) -> Result<Vec<PageImage>, IngestError> {
                Ok(Vec::new())
            }
        }
        let doc = Document::new(b"%PDF-1.4".to_vec(), DocumentKind::MultiPageDocument);
        let err = rasterize(Arc::new(Empty), doc, options()).await.unwrap_err();
        assert!(err.is_decode());
        assert!(err.to_string().contains("no pages"));
    }
}
