use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::middleware::logging::current_request_id;
use crate::services::extractor::ExtractionError;
use crate::services::llm_client::LlmError;
use crate::services::response_parser::ParseError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Missing API key in request header (X-Api-Key)")]
    MissingApiKey,

    #[error("No file field (files) found in request")]
    MissingFiles,

    #[error("No files selected")]
    NoFilesSelected,

    #[error("Too many files: {count} uploaded, at most {limit} allowed")]
    TooManyFiles { count: usize, limit: usize },

    #[error("Unsupported file type: '{filename}' (allowed: .pdf, .docx, .pptx, .txt)")]
    UnsupportedFileType { filename: String },

    #[error("File too large: '{filename}' is {size}MB, limit is {limit}MB")]
    FileTooLarge { filename: String, size: usize, limit: usize },

    #[error("Upload too large: request body exceeds {limit_bytes} bytes")]
    RequestTooLarge { limit_bytes: usize },

    #[error("Invalid multipart request: {message}")]
    InvalidMultipart { message: String },

    #[error("{message}")]
    Extraction { message: String },

    #[error("No valid text could be extracted from the uploaded files. Check that they are not empty, corrupted, or image-only")]
    NoValidText,

    #[error("{message}")]
    Upstream { message: String },

    #[error("{message}")]
    InvalidModelOutput { message: String, raw_response: String },

    #[error("Rate limit exceeded: maximum concurrent requests reached")]
    RateLimitExceeded,

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl AppError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::MissingApiKey => "MISSING_API_KEY",
            AppError::MissingFiles => "MISSING_FILES",
            AppError::NoFilesSelected => "NO_FILES_SELECTED",
            AppError::TooManyFiles { .. } => "TOO_MANY_FILES",
            AppError::UnsupportedFileType { .. } => "UNSUPPORTED_FILE_TYPE",
            AppError::FileTooLarge { .. } => "FILE_TOO_LARGE",
            AppError::RequestTooLarge { .. } => "FILE_TOO_LARGE",
            AppError::InvalidMultipart { .. } => "INVALID_MULTIPART",
            AppError::Extraction { .. } => "EXTRACTION_ERROR",
            AppError::NoValidText => "NO_VALID_TEXT",
            AppError::Upstream { .. } => "UPSTREAM_ERROR",
            AppError::InvalidModelOutput { .. } => "INVALID_MODEL_OUTPUT",
            AppError::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            AppError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingApiKey => StatusCode::UNAUTHORIZED,
            AppError::MissingFiles => StatusCode::BAD_REQUEST,
            AppError::NoFilesSelected => StatusCode::BAD_REQUEST,
            AppError::TooManyFiles { .. } => StatusCode::BAD_REQUEST,
            AppError::UnsupportedFileType { .. } => StatusCode::BAD_REQUEST,
            AppError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::RequestTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::InvalidMultipart { .. } => StatusCode::BAD_REQUEST,
            AppError::Extraction { .. } => StatusCode::BAD_REQUEST,
            AppError::NoValidText => StatusCode::BAD_REQUEST,
            AppError::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InvalidModelOutput { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();
        let request_id = current_request_id().unwrap_or_else(|| Uuid::new_v4().to_string());
        let timestamp = chrono::Utc::now().to_rfc3339();

        tracing::error!(
            error_code = error_code,
            status_code = %status,
            request_id = %request_id,
            error_message = %message,
            "API error occurred"
        );

        let mut body = json!({
            "success": false,
            "error": message,
            "code": error_code,
            "request_id": request_id,
            "timestamp": timestamp
        });

        // Only format failures carry the model's reply, for manual inspection.
        if let AppError::InvalidModelOutput { raw_response, .. } = self {
            body["raw_response"] = json!(raw_response);
        }

        (status, Json(body)).into_response()
    }
}

impl From<ExtractionError> for AppError {
    fn from(err: ExtractionError) -> Self {
        match err {
            ExtractionError::UnsupportedFileType { filename } => {
                AppError::UnsupportedFileType { filename }
            }
            other => AppError::Extraction {
                message: other.to_string(),
            },
        }
    }
}

impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        AppError::Upstream {
            message: err.to_string(),
        }
    }
}

impl From<ParseError> for AppError {
    fn from(err: ParseError) -> Self {
        let raw_response = err.raw_response().to_string();
        AppError::InvalidModelOutput {
            message: err.to_string(),
            raw_response,
        }
    }
}

impl AppError {
    pub fn multipart(message: impl Into<String>) -> Self {
        AppError::InvalidMultipart {
            message: message.into(),
        }
    }
}
