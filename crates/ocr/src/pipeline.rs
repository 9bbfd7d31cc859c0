use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::aggregate::extract_outcome;
use crate::classify::{classify, ClassifiedError};
use crate::hash;
use crate::preprocess::{MediaType, Normalizer, PreprocessError, UploadedArtifact};
use crate::recognizer::{OcrBackend, OcrError};
use crate::types::ExtractionOutcome;

/// Recommended bound on one OCR call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Extra wait past the deadline for the blocking task to kill its child
/// process and drop its scratch dir before the call returns.
const KILL_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No file provided")]
    NoFile,
    #[error("Document normalization failed: {0}")]
    Preprocess(#[from] PreprocessError),
    #[error("OCR recognition failed: {0}")]
    Ocr(#[from] OcrError),
    #[error("OCR did not finish within {0:?}")]
    Timeout(Duration),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    fn hit_deadline(&self) -> bool {
        matches!(
            self,
            PipelineError::Ocr(OcrError::DeadlineExceeded)
                | PipelineError::Preprocess(PreprocessError::DeadlineExceeded)
        )
    }
}

/// Orchestrates: gate → normalize → OCR (bounded) → parse → score → aggregate.
///
/// Holds no per-upload state, so one pipeline can serve concurrent uploads.
pub struct BillPipeline<R: OcrBackend> {
    recognizer: Arc<R>,
    normalizer: Normalizer,
}

impl<R: OcrBackend + 'static> BillPipeline<R> {
    pub fn new(recognizer: R) -> Self {
        Self { recognizer: Arc::new(recognizer), normalizer: Normalizer::default() }
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn recognizer(&self) -> &R {
        &self.recognizer
    }

    /// The boundary call. Every failure comes back classified.
    ///
    /// An outcome with `success == false` (nothing recognizable) is still `Ok`;
    /// it carries its own `error_message`.
    pub async fn submit(
        &self,
        artifact: Option<UploadedArtifact>,
        timeout: Duration,
    ) -> Result<ExtractionOutcome, ClassifiedError> {
        self.process(artifact, timeout).await.map_err(|e| {
            let classified = classify(&e);
            tracing::warn!(code = %classified.code, "Bill extraction failed: {e}");
            classified
        })
    }

    /// Presence, type and size gate. Touches no image data, so it can run
    /// before anything is handed to the blocking pool.
    pub fn accept(&self, artifact: Option<&UploadedArtifact>) -> Result<MediaType, PipelineError> {
        let artifact = artifact
            .filter(|a| !a.bytes.is_empty())
            .ok_or(PipelineError::NoFile)?;
        Ok(self.normalizer.check(artifact)?)
    }

    /// Same as [`submit`](Self::submit) with the raw error.
    pub async fn process(
        &self,
        artifact: Option<UploadedArtifact>,
        timeout: Duration,
    ) -> Result<ExtractionOutcome, PipelineError> {
        // 1. Gate. Nothing is decoded before this passes.
        let media_type = self.accept(artifact.as_ref())?;
        let Some(artifact) = artifact else {
            return Err(PipelineError::NoFile);
        };
        let digest = hash::short_digest(&artifact.bytes);
        tracing::info!(
            digest = %digest,
            media_type = %media_type,
            size = artifact.size(),
            "Bill upload accepted"
        );

        // 2-3. Normalize and recognize on the blocking pool. Both stages kill
        // their external tool at `deadline`, so the task ends with the call.
        let deadline = Instant::now() + timeout;
        let recognizer = Arc::clone(&self.recognizer);
        let normalizer = self.normalizer.clone();
        let task = tokio::task::spawn_blocking(move || -> Result<String, PipelineError> {
            let image = normalizer.normalize(&artifact, deadline)?;
            Ok(recognizer.recognize(&image, deadline)?)
        });

        // The outer bound only fires for a backend that cannot be interrupted.
        let text = match tokio::time::timeout(timeout + KILL_GRACE, task).await {
            Err(_) => return Err(PipelineError::Timeout(timeout)),
            Ok(Err(join_err)) => return Err(PipelineError::Internal(join_err.to_string())),
            Ok(Ok(Err(e))) if e.hit_deadline() => return Err(PipelineError::Timeout(timeout)),
            Ok(Ok(result)) => result?,
        };

        if text.trim().is_empty() {
            return Err(OcrError::EmptyText.into());
        }

        // 4. Parse, score, aggregate.
        let outcome = extract_outcome(&text);
        tracing::info!(
            digest = %digest,
            found = outcome.found_count(),
            all_low = outcome.all_low_confidence(),
            success = outcome.success,
            "Bill extraction finished"
        );
        Ok(outcome)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
