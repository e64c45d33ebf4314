use thiserror::Error;

/// Failures the session engine can report.
///
/// Everything here is recovered at the boundary of the component that
/// detects it and converted into an explicit return value (`false`/`None`);
/// the variants exist so logs and callers can tell the failure modes apart.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("missing configuration: {0}")]
    Configuration(String),

    #[error("login page missing `{0}` field")]
    HandshakeFieldMissing(&'static str),

    #[error("password encryption failed: {0}")]
    Cipher(#[from] crate::auth::cipher::CipherError),

    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("authentication rejected by the gateway")]
    AuthenticationRejected,

    #[error("no session identifier in redirect chain")]
    TokenNotFound,

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for response bodies quoted in log lines
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Truncate a response body to avoid logging excessive data
pub fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        body.to_string()
    } else {
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_body_short() {
        assert_eq!(truncate_body("ok"), "ok");
    }

    #[test]
    fn test_truncate_body_long() {
        let body = "x".repeat(1000);
        let truncated = truncate_body(&body);
        assert!(truncated.starts_with(&"x".repeat(500)));
        assert!(truncated.contains("1000 total bytes"));
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        // Multi-byte characters straddling the cut point must not panic
        let body = "统一身份认证".repeat(100);
        let truncated = truncate_body(&body);
        assert!(truncated.contains("truncated"));
    }
}
