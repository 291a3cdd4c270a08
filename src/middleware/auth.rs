use std::fmt;

use axum::{
    extract::Request,
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::error::AppError;

pub const API_KEY_HEADER: &str = "x-api-key";

/// The caller's model-provider key, forwarded as the LLM credential.
#[derive(Clone)]
pub struct ApiKey(pub String);

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey(<{} chars>)", self.0.len())
    }
}

/// Rejects requests without a usable `X-Api-Key` before the body is read.
pub async fn api_key_middleware(mut request: Request, next: Next) -> Result<Response, AppError> {
    let path = request.uri().path().to_string();
    let method = request.method().clone();

    let key = match request.headers().get(API_KEY_HEADER) {
        Some(header) => match header.to_str() {
            Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
            Ok(_) => {
                warn!("Empty X-Api-Key header for {} {}", method, path);
                return Err(AppError::MissingApiKey);
            }
            Err(_) => {
                warn!("Invalid X-Api-Key header format for {} {}", method, path);
                return Err(AppError::MissingApiKey);
            }
        },
        None => {
            warn!("Missing X-Api-Key header for {} {}", method, path);
            return Err(AppError::MissingApiKey);
        }
    };

    debug!(key_length = key.len(), "API key present for {} {}", method, path);
    request.extensions_mut().insert(ApiKey(key));
    Ok(next.run(request).await)
}
