use std::collections::HashMap;

use thiserror::Error;

/// Client-side error taxonomy. Every network call classifies into one of
/// these; none of them is fatal to the host — the worst case is a feature
/// (calendar sync) being unavailable while CRUD keeps working.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request timed out")]
    Timeout,

    /// 404 or an unconfigured optional endpoint.
    #[error("not found: {0}")]
    NotFound(String),

    /// 401 after the refresh exchange was already attempted (or impossible).
    #[error("session expired, please sign in again")]
    AuthExpired,

    /// Backend returned a field-keyed error map (HTTP 400).
    #[error("validation failed")]
    Validation(HashMap<String, String>),

    /// Backend error envelope with a code we can surface as-is.
    #[error("{code}: {message}")]
    Api { code: String, message: String },

    #[error("failed to initiate authentication")]
    AuthInitFailed,

    /// A second sign-in was requested while a popup is already pending.
    #[error("authentication already in progress")]
    AuthInProgress,

    /// The host shell could not open the auth popup.
    #[error("failed to open authentication popup; allow popups for this site")]
    PopupBlocked,

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected response: {0}")]
    Unexpected(String),
}

impl ApiError {
    pub fn not_found(what: impl Into<String>) -> Self {
        ApiError::NotFound(what.into())
    }

    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Api {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn invalid_credentials() -> Self {
        ApiError::api("INVALID_CREDENTIALS", "Username or password is incorrect")
    }

    pub fn general_validation(message: impl Into<String>) -> Self {
        let mut fields = HashMap::new();
        fields.insert("general".to_string(), message.into());
        ApiError::Validation(fields)
    }

    /// Field-keyed errors for inline display, when present.
    pub fn field_errors(&self) -> Option<&HashMap<String, String>> {
        match self {
            ApiError::Validation(fields) => Some(fields),
            _ => None,
        }
    }

    /// Transient/infrastructure failures degrade silently to an empty or
    /// disconnected state instead of an error banner.
    pub fn is_degradable(&self) -> bool {
        matches!(self, ApiError::Timeout | ApiError::NotFound(_) | ApiError::Network(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::Unexpected(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degradable_classes() {
        assert!(ApiError::Timeout.is_degradable());
        assert!(ApiError::not_found("/google-calendar/connection/").is_degradable());
        assert!(ApiError::Network("connection refused".into()).is_degradable());

        assert!(!ApiError::AuthExpired.is_degradable());
        assert!(!ApiError::general_validation("bad").is_degradable());
    }

    #[test]
    fn test_field_errors_only_on_validation() {
        let err = ApiError::general_validation("Failed to save appointment.");
        assert_eq!(
            err.field_errors().and_then(|f| f.get("general")).map(String::as_str),
            Some("Failed to save appointment.")
        );
        assert!(ApiError::Timeout.field_errors().is_none());
    }
}
