pub mod aggregate;
pub mod classify;
pub mod extract;
mod hash;
pub mod pipeline;
pub mod preprocess;
mod process;
pub mod recognizer;
pub mod score;
pub mod types;

pub use aggregate::{aggregate, extract_outcome};
pub use classify::{classify, ClassifiedError, ErrorCode};
pub use extract::{FieldParser, FieldRule, RULES};
pub use pipeline::{BillPipeline, PipelineError, DEFAULT_TIMEOUT};
pub use preprocess::{
    MediaType, Normalizer, PreprocessError, UploadedArtifact, DEFAULT_MAX_DIMENSION,
    MAX_UPLOAD_BYTES,
};
pub use recognizer::{MockRecognizer, OcrBackend, OcrError, TesseractCli};
pub use score::score;
pub use types::ExtractionOutcome;
