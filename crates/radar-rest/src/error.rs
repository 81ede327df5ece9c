//! Error types and response mapping

use radar_core::BackendError;
use serde::Deserialize;
use thiserror::Error;

/// PostgREST: function not found in the schema cache
const FUNCTION_NOT_FOUND: &str = "PGRST202";

/// Postgres: undefined_function
const UNDEFINED_FUNCTION: &str = "42883";

/// Errors building the REST adapter
#[derive(Debug, Error)]
pub enum RestError {
    /// The API key or session token is not a valid header value
    #[error("invalid credential header: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    /// The HTTP client could not be constructed
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    /// The base URL cannot carry the RPC path
    #[error("invalid base URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Error body returned by the RPC endpoint
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Map a non-success RPC response onto a [`BackendError`]
///
/// `function` names the RPC that was called and `body` is the raw response
/// body.
pub fn map_status(function: &str, status: u16, body: &str) -> BackendError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();

    let missing_function = matches!(
        parsed.code.as_deref(),
        Some(FUNCTION_NOT_FOUND) | Some(UNDEFINED_FUNCTION)
    );
    if missing_function || status == 404 {
        return BackendError::SetupRequired {
            function: function.to_string(),
        };
    }

    match status {
        401 | 403 => BackendError::Unauthorized,
        _ => {
            let message = parsed
                .message
                .unwrap_or_else(|| body.trim().chars().take(200).collect());
            BackendError::Http { status, message }
        }
    }
}

/// Map a transport-level failure onto a [`BackendError`]
pub(crate) fn map_transport(error: reqwest::Error) -> BackendError {
    if error.is_decode() {
        BackendError::Decode(error.to_string())
    } else {
        BackendError::Network(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_cache_miss_is_setup_required() {
        let body = r#"{"code":"PGRST202","message":"Could not find the function"}"#;
        let error = map_status("get_unread_message_counts", 404, body);
        assert_eq!(
            error,
            BackendError::SetupRequired {
                function: "get_unread_message_counts".into()
            }
        );
    }

    #[test]
    fn test_undefined_function_is_setup_required() {
        let body = r#"{"code":"42883","message":"function does not exist"}"#;
        assert!(map_status("mark_messages_read", 400, body).is_setup_required());
    }

    #[test]
    fn test_bare_404_is_setup_required() {
        assert!(map_status("mark_messages_delivered", 404, "").is_setup_required());
    }

    #[test]
    fn test_auth_failures() {
        assert_eq!(map_status("f", 401, "{}"), BackendError::Unauthorized);
        assert_eq!(map_status("f", 403, "{}"), BackendError::Unauthorized);
    }

    #[test]
    fn test_other_status_keeps_message() {
        let body = r#"{"code":"XX000","message":"boom"}"#;
        assert_eq!(
            map_status("f", 500, body),
            BackendError::Http {
                status: 500,
                message: "boom".into()
            }
        );
    }

    #[test]
    fn test_non_json_body_falls_back_to_text() {
        assert_eq!(
            map_status("f", 502, " bad gateway \n"),
            BackendError::Http {
                status: 502,
                message: "bad gateway".into()
            }
        );
    }
}
