use serde::Deserialize;

/// All errors an [`AuthorizeApi`](crate::AuthorizeApi) call can return.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// The server answered with a non-success status.
    #[error("{status} {code}: {message}")]
    Status {
        status: u16,
        code: String,
        message: String,
    },

    /// The request never produced a response (DNS, connect, TLS, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// A response arrived but its body is not the JSON we expected.
    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("request cancelled")]
    Cancelled,

    /// Credentials or endpoints are missing.
    #[error("client not configured: {0}")]
    NotConfigured(String),
}

/// PingOne error body: `{"id", "code", "message", "details": [...]}`.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

impl ApiError {
    /// Build a status error, with no body to interpret.
    pub fn status(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Status {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Interpret an error response body. Bodies that are not PingOne error
    /// documents are kept verbatim as the message.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let mut message = if parsed.message.is_empty() {
            body.trim().to_string()
        } else {
            parsed.message
        };
        let details: Vec<&str> = parsed
            .details
            .iter()
            .map(|d| d.message.as_str())
            .filter(|m| !m.is_empty())
            .collect();
        if !details.is_empty() {
            message = format!("{} ({})", message, details.join("; "));
        }
        ApiError::Status {
            status,
            code: parsed.code,
            message,
        }
    }

    /// HTTP status, if the server answered.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.http_status() == Some(404)
    }

    /// Server-provided message, or the display form for local errors.
    pub fn message(&self) -> String {
        match self {
            ApiError::Status { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
