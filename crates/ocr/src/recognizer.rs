use std::path::PathBuf;
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::process::{run_until, RunError};

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("OCR engine not available: {0}")]
    NotAvailable(String),
    #[error("OCR engine returned no text")]
    EmptyText,
    #[error("OCR engine stopped at the deadline")]
    DeadlineExceeded,
}

/// Abstraction over an OCR backend.
/// Implementations accept PNG image bytes and return the recognized text.
/// Calls block; the pipeline runs them on the blocking pool. A backend must
/// give up by `deadline` and leave no engine process running behind it.
pub trait OcrBackend: Send + Sync {
    fn recognize(&self, image_bytes: &[u8], deadline: Instant) -> Result<String, OcrError>;
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns a pre-set string and counts how often it was asked.
pub struct MockRecognizer {
    pub text: String,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), delay: None, calls: AtomicUsize::new(0) }
    }

    /// Take this long inside every `recognize` call, to simulate a slow engine.
    /// Gives up at the deadline like a real backend.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OcrBackend for MockRecognizer {
    fn recognize(&self, _image_bytes: &[u8], deadline: Instant) -> Result<String, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            let remaining = deadline.saturating_duration_since(Instant::now());
            std::thread::sleep(delay.min(remaining));
            if delay > remaining {
                return Err(OcrError::DeadlineExceeded);
            }
        }
        Ok(self.text.clone())
    }
}

// ── Tesseract CLI backend ─────────────────────────────────────────────────────

const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs the `tesseract` binary: `tesseract <image> stdout -l <lang>`.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    binary: PathBuf,
    language: String,
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self::new("tesseract", "spa")
    }
}

impl TesseractCli {
    pub fn new(binary: impl Into<PathBuf>, language: &str) -> Self {
        Self { binary: binary.into(), language: language.to_string() }
    }

    pub fn is_available(&self) -> bool {
        let Ok(work_dir) = tempfile::tempdir() else {
            return false;
        };
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--version");
        run_until(cmd, work_dir.path(), Instant::now() + VERSION_CHECK_TIMEOUT)
            .map(|done| done.status.success())
            .unwrap_or(false)
    }
}

impl OcrBackend for TesseractCli {
    fn recognize(&self, image_bytes: &[u8], deadline: Instant) -> Result<String, OcrError> {
        // Scratch files live only as long as `work_dir`.
        let work_dir = tempfile::tempdir().map_err(|e| OcrError::Engine(e.to_string()))?;
        let input = work_dir.path().join("page.png");
        std::fs::write(&input, image_bytes).map_err(|e| OcrError::Engine(e.to_string()))?;

        let mut cmd = Command::new(&self.binary);
        cmd.arg(&input).arg("stdout").arg("-l").arg(&self.language);

        let done = run_until(cmd, work_dir.path(), deadline).map_err(|e| match e {
            RunError::Launch(io) if io.kind() == std::io::ErrorKind::NotFound => {
                OcrError::NotAvailable(self.binary.display().to_string())
            }
            RunError::DeadlineExceeded => OcrError::DeadlineExceeded,
            other => OcrError::Engine(other.to_string()),
        })?;

        if !done.status.success() {
            let stderr = String::from_utf8_lossy(&done.stderr);
            return Err(OcrError::Engine(format!(
                "exit code {}: {}",
                done.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&done.stdout).into_owned())
    }
}

// ── In-process engine via libtesseract (`tesseract` feature) ──────────────────

#[cfg(feature = "tesseract")]
pub mod embedded {
    use super::{OcrBackend, OcrError};
    use leptess::LepTess;
    use std::path::PathBuf;
    use std::time::Instant;

    /// Links libtesseract instead of shelling out. A fresh engine per call,
    /// since `LepTess` is not `Sync`. A running recognition cannot be
    /// interrupted, so the deadline is only checked before it starts.
    pub struct EmbeddedTesseract {
        tessdata: Option<PathBuf>,
        language: String,
    }

    impl EmbeddedTesseract {
        pub fn new(tessdata: Option<PathBuf>, language: &str) -> Self {
            Self { tessdata, language: language.to_string() }
        }
    }

    impl OcrBackend for EmbeddedTesseract {
        fn recognize(&self, image_bytes: &[u8], deadline: Instant) -> Result<String, OcrError> {
            if Instant::now() >= deadline {
                return Err(OcrError::DeadlineExceeded);
            }
            let tessdata = self.tessdata.as_ref().map(|p| p.to_string_lossy().into_owned());
            let mut engine = LepTess::new(tessdata.as_deref(), &self.language).map_err(|e| {
                OcrError::NotAvailable(format!("libtesseract ({}): {e}", self.language))
            })?;
            engine
                .set_image_from_mem(image_bytes)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            engine.get_utf8_text().map_err(|e| OcrError::Engine(e.to_string()))
        }
    }

}
