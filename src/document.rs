//! Input and intermediate data: [`Document`], [`DocumentKind`], [`PageImage`].

use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the uploaded bytes claim to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    /// A single raster image (PNG, JPEG).
    Image,
    /// A paginated document (PDF).
    MultiPageDocument,
}

impl DocumentKind {
    /// Infer the kind from a file extension (case-insensitive, leading dot allowed).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "png" | "jpg" | "jpeg" => Some(DocumentKind::Image),
            "pdf" => Some(DocumentKind::MultiPageDocument),
            _ => None,
        }
    }

    /// Infer the kind from a MIME type; parameters (`; charset=…`) are ignored.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "image/png" | "image/jpeg" | "image/jpg" => Some(DocumentKind::Image),
            "application/pdf" | "application/x-pdf" => Some(DocumentKind::MultiPageDocument),
            _ => None,
        }
    }

    /// Infer the kind from leading magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"%PDF") {
            Some(DocumentKind::MultiPageDocument)
        } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") || bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(DocumentKind::Image)
        } else {
            None
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Image => f.write_str("image"),
            DocumentKind::MultiPageDocument => f.write_str("multi-page document"),
        }
    }
}

/// One uploaded document. Consumed by a single pipeline run.
#[derive(Clone)]
pub struct Document {
    bytes: Vec<u8>,
    kind: DocumentKind,
    name: Option<String>,
}

impl Document {
    pub fn new(bytes: impl Into<Vec<u8>>, kind: DocumentKind) -> Self {
        Self {
            bytes: bytes.into(),
            kind,
            name: None,
        }
    }

    /// Attach a display name (file name or URL) used in logs.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("<upload>")
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .finish()
    }
}

/// One rasterised page: an 8-bit grayscale sample grid.
#[derive(Clone, PartialEq)]
pub struct PageImage {
    image: GrayImage,
}

impl PageImage {
    pub fn new(image: GrayImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Row-major samples, `width * height` bytes.
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.image
    }
}

impl fmt::Debug for PageImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PageImage({}x{})", self.width(), self.height())
    }
}
