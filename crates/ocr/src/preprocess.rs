use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::PathBuf;
use std::process::Command;
use std::time::Instant;
use thiserror::Error;

use crate::process::{run_until, RunError};

/// Upload ceiling (10 MiB). Checked before any decoding.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Longest side, in pixels, handed to the OCR engine.
/// Tesseract works best at 300 DPI / ~2000 px.
pub const DEFAULT_MAX_DIMENSION: u32 = 2800;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Unsupported file type: '{0}'")]
    FileType(String),
    #[error("File too large: {size} bytes (limit {limit})")]
    FileTooLarge { size: u64, limit: u64 },
    #[error("Failed to load image: {0}")]
    Load(#[from] image::ImageError),
    #[error("Failed to render PDF page: {0}")]
    Render(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
    #[error("PDF rendering stopped at the deadline")]
    DeadlineExceeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Pdf,
    Jpeg,
    Png,
}

impl MediaType {
    /// Resolve a declared type: a bare extension (`"pdf"`, `".PNG"`), a file
    /// name (`"recibo.jpg"`) or a MIME type (`"image/jpeg"`). Case-insensitive.
    pub fn from_declared(declared: &str) -> Option<Self> {
        let lower = declared.trim().to_lowercase();
        let last_segment = lower.rsplit('/').next().unwrap_or("");
        let token = last_segment.rsplit('.').next().unwrap_or("");
        match token {
            "pdf" => Some(MediaType::Pdf),
            "jpg" | "jpeg" => Some(MediaType::Jpeg),
            "png" => Some(MediaType::Png),
            _ => None,
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaType::Pdf => write!(f, "pdf"),
            MediaType::Jpeg => write!(f, "jpeg"),
            MediaType::Png => write!(f, "png"),
        }
    }
}

/// An uploaded bill as received from the caller. Lives for one `submit` call.
#[derive(Debug, Clone)]
pub struct UploadedArtifact {
    pub bytes: Vec<u8>,
    /// Extension, file name or MIME type as declared by the uploader.
    pub media_type: String,
}

impl UploadedArtifact {
    pub fn new(bytes: impl Into<Vec<u8>>, media_type: impl Into<String>) -> Self {
        Self { bytes: bytes.into(), media_type: media_type.into() }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Turns an uploaded document into a single PNG raster ready for OCR.
#[derive(Debug, Clone)]
pub struct Normalizer {
    pdftoppm_path: PathBuf,
    max_dimension: u32,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            pdftoppm_path: PathBuf::from("pdftoppm"),
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }
}

impl Normalizer {
    pub fn new(pdftoppm_path: impl Into<PathBuf>, max_dimension: u32) -> Self {
        Self { pdftoppm_path: pdftoppm_path.into(), max_dimension: max_dimension.max(1) }
    }

    /// Type and size gate. Touches no image data.
    pub fn check(&self, artifact: &UploadedArtifact) -> Result<MediaType, PreprocessError> {
        let media_type = MediaType::from_declared(&artifact.media_type)
            .ok_or_else(|| PreprocessError::FileType(artifact.media_type.clone()))?;
        if artifact.size() > MAX_UPLOAD_BYTES {
            return Err(PreprocessError::FileTooLarge {
                size: artifact.size(),
                limit: MAX_UPLOAD_BYTES,
            });
        }
        Ok(media_type)
    }

    /// Check, rasterize (first page only for PDFs), downscale, and return PNG bytes.
    /// A PDF renderer still running at `deadline` is killed.
    pub fn normalize(
        &self,
        artifact: &UploadedArtifact,
        deadline: Instant,
    ) -> Result<Vec<u8>, PreprocessError> {
        let img = match self.check(artifact)? {
            MediaType::Pdf => {
                let page = self.render_first_page(&artifact.bytes, deadline)?;
                image::load_from_memory(&page)?
            }
            MediaType::Jpeg | MediaType::Png => image::load_from_memory(&artifact.bytes)?,
        };
        encode_as_png(normalize(img, self.max_dimension))
    }

    /// Rasterize page 1 with `pdftoppm`. The scratch directory is removed when
    /// `work_dir` drops, on success and on every error path.
    fn render_first_page(&self, pdf: &[u8], deadline: Instant) -> Result<Vec<u8>, PreprocessError> {
        let work_dir = tempfile::tempdir()?;
        let input = work_dir.path().join("upload.pdf");
        let out_prefix = work_dir.path().join("page1");
        std::fs::write(&input, pdf)?;

        let mut cmd = Command::new(&self.pdftoppm_path);
        cmd.args(["-f", "1", "-l", "1", "-singlefile", "-png"])
            .arg(&input)
            .arg(&out_prefix);

        let done = run_until(cmd, work_dir.path(), deadline).map_err(|e| match e {
            RunError::Launch(io) => PreprocessError::Render(format!(
                "failed to launch {}: {io}",
                self.pdftoppm_path.display()
            )),
            RunError::Io(io) => PreprocessError::Io(io),
            RunError::DeadlineExceeded => PreprocessError::DeadlineExceeded,
        })?;

        if !done.status.success() {
            let stderr = String::from_utf8_lossy(&done.stderr);
            return Err(PreprocessError::Render(stderr.trim().to_string()));
        }

        Ok(std::fs::read(out_prefix.with_extension("png"))?)
    }
}

/// Downscale, grayscale, contrast stretch.
fn normalize(img: DynamicImage, max_dimension: u32) -> DynamicImage {
    let img = if img.width() > max_dimension || img.height() > max_dimension {
        img.resize(max_dimension, max_dimension, image::imageops::FilterType::Lanczos3)
    } else {
        img
    };

    let gray: GrayImage = img.to_luma8();

    let (min_px, max_px) = gray
        .pixels()
        .fold((255u8, 0u8), |(mn, mx), p| (mn.min(p[0]), mx.max(p[0])));

    if max_px <= min_px {
        // Uniform (or empty) image.
        return DynamicImage::ImageLuma8(gray);
    }

    let range = (max_px - min_px) as u32;
    let stretched: GrayImage = ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        let p = gray.get_pixel(x, y)[0];
        let v = ((p - min_px) as u32 * 255 / range) as u8;
        Luma([v])
    });

    DynamicImage::ImageLuma8(stretched)
}

fn encode_as_png(img: DynamicImage) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(buf)
}
