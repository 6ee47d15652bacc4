use engine_core::error::StoreError;
use reqwest::{Response, StatusCode};

/// Connection-level failures: refused, timed out, reset.
pub fn transport(err: reqwest::Error) -> StoreError {
    StoreError::Transport(err.to_string())
}

pub fn decode(err: impl std::fmt::Display) -> StoreError {
    StoreError::Decode(err.to_string())
}

/// Maps a non-success response onto the store error taxonomy.
pub fn classify(status: StatusCode, body: String, index: Option<&str>) -> StoreError {
    if status == StatusCode::NOT_FOUND {
        if body.contains("search_context_missing_exception")
            || body.contains("No search context found")
        {
            return StoreError::CursorExpired(body);
        }
        if body.contains("index_not_found_exception") {
            return StoreError::IndexNotFound(index.unwrap_or("unknown").to_string());
        }
    }
    StoreError::Status {
        status: status.as_u16(),
        body,
    }
}

/// Passes successful responses through, turns the rest into errors.
pub async fn check(response: Response, index: Option<&str>) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.map_err(transport)?;
    Err(classify(status, body, index))
}
