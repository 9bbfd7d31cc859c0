use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::PipelineError;
use crate::preprocess::PreprocessError;
use crate::recognizer::OcrError;

/// Stable, user-facing failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NoFile,
    UnsupportedType,
    FileTooLarge,
    NoText,
    NoCfeData,
    Timeout,
    Unexpected,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 7] = [
        ErrorCode::NoFile,
        ErrorCode::UnsupportedType,
        ErrorCode::FileTooLarge,
        ErrorCode::NoText,
        ErrorCode::NoCfeData,
        ErrorCode::Timeout,
        ErrorCode::Unexpected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NoFile => "no_file",
            ErrorCode::UnsupportedType => "unsupported_type",
            ErrorCode::FileTooLarge => "file_too_large",
            ErrorCode::NoText => "no_text",
            ErrorCode::NoCfeData => "no_cfe_data",
            ErrorCode::Timeout => "timeout",
            ErrorCode::Unexpected => "unexpected",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::NoFile => "No file was provided. Select a photo or PDF of your CFE bill.",
            ErrorCode::UnsupportedType => "Unsupported file type. Use a PDF, JPG or PNG file.",
            ErrorCode::FileTooLarge => "The file is larger than 10 MB. Try a smaller photo or scan.",
            ErrorCode::NoText => "No text could be read from the document. Try a sharper, well-lit photo.",
            ErrorCode::NoCfeData => "No CFE bill data found in the document. You can fill in the form manually.",
            ErrorCode::Timeout => "Reading the document took too long. Try again with a smaller image.",
            ErrorCode::Unexpected => "Something went wrong while reading the document. Please try again.",
        }
    }

    /// Only a missing file needs the user to act before another attempt.
    pub fn can_retry(self) -> bool {
        !matches!(self, ErrorCode::NoFile)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the caller sees for any failure: code, fixed message, retry flag.
/// Never carries internal diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct ClassifiedError {
    pub code: ErrorCode,
    pub message: String,
    pub can_retry: bool,
}

impl From<ErrorCode> for ClassifiedError {
    fn from(code: ErrorCode) -> Self {
        ClassifiedError {
            code,
            message: code.message().to_string(),
            can_retry: code.can_retry(),
        }
    }
}

/// Map a pipeline failure onto the public taxonomy.
pub fn classify(err: &PipelineError) -> ClassifiedError {
    let code = match err {
        PipelineError::NoFile => ErrorCode::NoFile,
        PipelineError::Preprocess(PreprocessError::FileType(_)) => ErrorCode::UnsupportedType,
        PipelineError::Preprocess(PreprocessError::FileTooLarge { .. }) => ErrorCode::FileTooLarge,
        PipelineError::Ocr(OcrError::DeadlineExceeded)
        | PipelineError::Preprocess(PreprocessError::DeadlineExceeded)
        | PipelineError::Timeout(_) => ErrorCode::Timeout,
        PipelineError::Ocr(_) => ErrorCode::NoText,
        PipelineError::Preprocess(_) | PipelineError::Internal(_) => ErrorCode::Unexpected,
    };
    ClassifiedError::from(code)
}

impl From<&PipelineError> for ClassifiedError {
    fn from(err: &PipelineError) -> Self {
        classify(err)
    }
}

impl From<PipelineError> for ClassifiedError {
    fn from(err: PipelineError) -> Self {
        classify(&err)
    }
}
