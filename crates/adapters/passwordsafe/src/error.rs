//! Mapping of Password Safe API failures to ProviderError

use pwsafe_errors::ProviderError;
use reqwest::StatusCode;

/// Longest slice of an error body carried into an error message
const MAX_BODY_IN_ERROR: usize = 256;

/// Which step of a request flow failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Authentication,
    Retrieval,
}

/// Convert a non-success HTTP response to ProviderError
pub(crate) fn map_api_error(
    phase: Phase,
    status: StatusCode,
    body: &str,
    context: &str,
) -> ProviderError {
    let detail = truncate(body.trim());
    let message = if detail.is_empty() {
        context.to_string()
    } else {
        format!("{}: {}", context, detail)
    };

    match phase {
        Phase::Authentication => ProviderError::authentication(Some(status.as_u16()), message),
        Phase::Retrieval if status == StatusCode::NOT_FOUND => {
            ProviderError::secret_not_found(message)
        }
        Phase::Retrieval => ProviderError::retrieval(Some(status.as_u16()), message),
    }
}

/// Convert a transport failure (connect, TLS, timeout, body decode) to ProviderError
pub(crate) fn map_transport_error(
    phase: Phase,
    err: reqwest::Error,
    context: &str,
) -> ProviderError {
    let kind = if err.is_timeout() {
        "timed out"
    } else if err.is_connect() {
        "connection failed"
    } else if err.is_decode() {
        "invalid response body"
    } else {
        "request failed"
    };
    let message = format!("{}: {}: {}", context, kind, err);

    // decode failures follow a success status and are not transient
    let status = err
        .is_decode()
        .then_some(StatusCode::UNPROCESSABLE_ENTITY.as_u16());

    match phase {
        Phase::Authentication => ProviderError::authentication(status, message),
        Phase::Retrieval => ProviderError::retrieval(status, message),
    }
}

fn truncate(body: &str) -> &str {
    if body.len() <= MAX_BODY_IN_ERROR {
        return body;
    }
    let mut end = MAX_BODY_IN_ERROR;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
