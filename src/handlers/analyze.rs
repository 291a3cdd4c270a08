use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use serde_json::Value;
use std::time::Instant;
use tracing::{info, warn, debug, error};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::ApiKey;
use crate::middleware::logging::RequestId;
use crate::models::{DocumentKind, UploadedDocument};
use crate::services::extractor::extract_document;
use crate::services::prompt::join_documents;
use crate::services::response_parser::parse_summary;
use crate::state::AppState;

pub const FILES_FIELD: &str = "files";

/// `POST /analyze`: extract every upload, build the prompt, ask the model,
/// and echo the summary object it returns.
pub async fn analyze_handler(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Extension(ApiKey(api_key)): Extension<ApiKey>,
    mut multipart: Multipart,
) -> AppResult<Json<Value>> {
    let start = Instant::now();

    info!(request_id = %request_id, "Starting analysis request");

    let documents = match collect_uploads(&mut multipart, &state.config).await {
        Ok(documents) => documents,
        Err(e) => {
            warn!(request_id = %request_id, error = %e, "Rejected upload");
            return Err(e);
        }
    };

    info!(
        request_id = %request_id,
        files = documents.len(),
        total_bytes = documents.iter().map(|d| d.size).sum::<usize>(),
        "Uploads received"
    );

    let texts = extract_all(documents, &request_id).await?;
    if texts.is_empty() {
        warn!(request_id = %request_id, "No usable text in any upload");
        return Err(AppError::NoValidText);
    }

    let combined = join_documents(&texts);
    let combined_chars = combined.chars().count();
    let prompt = state.composer.compose(&combined);

    info!(
        request_id = %request_id,
        documents = texts.len(),
        combined_chars = combined_chars,
        truncated = combined_chars > state.composer.max_chars(),
        prompt_chars = prompt.chars().count(),
        model = %state.config.llm.model,
        "Prompt composed, calling model"
    );

    let content = match state.llm.complete(&state.config.llm.model, &prompt, &api_key).await {
        Ok(content) => content,
        Err(e) => {
            error!(request_id = %request_id, error = %e, "Model call failed");
            return Err(e.into());
        }
    };

    let (summary_json, summary) = match parse_summary(state.parser.as_ref(), &content) {
        Ok(parsed) => parsed,
        Err(e) => {
            error!(request_id = %request_id, error = %e, "Model reply could not be parsed");
            return Err(e.into());
        }
    };

    match summary.classification() {
        Some(property) => info!(request_id = %request_id, property = property.label(), "Document classified"),
        None => warn!(
            request_id = %request_id,
            property = %summary.property,
            "Model returned an unknown property label"
        ),
    }

    info!(
        request_id = %request_id,
        total_time_ms = start.elapsed().as_millis() as u64,
        "Request completed successfully"
    );

    Ok(Json(summary_json))
}

/// Reads the `files` parts, enforcing count, allow-list and size limits
/// before any extraction happens. Parts with an empty filename are the
/// browser's "nothing selected" placeholder and are skipped.
async fn collect_uploads(multipart: &mut Multipart, config: &Config) -> AppResult<Vec<UploadedDocument>> {
    let mut saw_files_field = false;
    let mut documents = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, "Failed to read multipart field", config))?
    {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }
        saw_files_field = true;

        let filename = field.file_name().unwrap_or("").to_string();
        if filename.is_empty() {
            debug!("Skipping empty file part");
            continue;
        }

        if documents.len() == config.max_file_uploads {
            return Err(AppError::TooManyFiles {
                count: documents.len() + 1,
                limit: config.max_file_uploads,
            });
        }

        // Validate the extension before pulling the body.
        let kind = match DocumentKind::from_filename(&filename) {
            Some(kind) => kind,
            None => return Err(AppError::UnsupportedFileType { filename }),
        };

        let data = field.bytes().await.map_err(|e| {
            multipart_error(e, &format!("Failed to read file data for '{}'", filename), config)
        })?;

        if data.len() > config.max_file_size_bytes() {
            return Err(AppError::FileTooLarge {
                filename,
                size: data.len() / (1024 * 1024),
                limit: config.max_file_size_mb,
            });
        }

        let document = UploadedDocument::new(filename, kind, data);
        debug!(file_name = %document.filename, kind = %document.kind, size = document.size, "File received");
        documents.push(document);
    }

    if !saw_files_field {
        return Err(AppError::MissingFiles);
    }
    if documents.is_empty() {
        return Err(AppError::NoFilesSelected);
    }

    Ok(documents)
}

/// A body that outgrows the request limit is reported as 413, anything
/// else as a malformed multipart request.
fn multipart_error(err: MultipartError, context: &str, config: &Config) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::RequestTooLarge {
            limit_bytes: config.max_body_bytes(),
        }
    } else {
        AppError::multipart(format!("{}: {}", context, err))
    }
}

/// Extracts each document in upload order. The first failure aborts the
/// request; documents with only whitespace are dropped.
async fn extract_all(documents: Vec<UploadedDocument>, request_id: &str) -> AppResult<Vec<String>> {
    let mut texts = Vec::with_capacity(documents.len());

    for document in documents {
        let filename = document.filename.clone();
        let result = tokio::task::spawn_blocking(move || extract_document(&document))
            .await
            .map_err(|join_error| AppError::Internal {
                message: format!("extraction task for '{}' aborted: {}", filename, join_error),
            })?;

        let text = match result {
            Ok(text) => text,
            Err(e) => {
                error!(request_id = %request_id, file_name = %filename, error = %e, "Extraction failed");
                return Err(e.into());
            }
        };

        if text.trim().is_empty() {
            info!(request_id = %request_id, file_name = %filename, "No text in file, skipping");
            continue;
        }

        texts.push(text);
    }

    Ok(texts)
}
