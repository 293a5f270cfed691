/// Failure of a backend call. The variants separate what callers can act
/// on (auth, missing rows, conflicts) from transport noise.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("request failed with status {status}: {message}")]
    Http { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("not authorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("realtime: {0}")]
    Realtime(String),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("backend: {0}")]
    Backend(String),
}

impl RemoteError {
    /// Map a non-success HTTP status and its body to an error.
    pub fn from_status(status: u16, body: String) -> Self {
        let message = extract_message(&body).unwrap_or(body);
        match status {
            401 | 403 => RemoteError::Unauthorized(message),
            404 => RemoteError::NotFound(message),
            409 => RemoteError::Conflict(message),
            _ => RemoteError::Http { status, message },
        }
    }
}

/// PostgREST, storage and auth errors all carry a human message under one
/// of these keys.
fn extract_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "msg", "error_description", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(|s| s.to_string())
}

/// At most `max_chars` characters of `text`, cut on a char boundary.
pub(crate) fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_never_splits_a_char() {
        let body = format!("{}é trailing", "a".repeat(199));
        let cut = excerpt(&body, 200);
        assert_eq!(cut.chars().count(), 200);
        assert!(cut.ends_with('é'));
        assert_eq!(excerpt("short", 200), "short");
        assert_eq!(excerpt("日本語", 2), "日本");
    }

    #[test]
    fn status_mapping() {
        let err = RemoteError::from_status(409, r#"{"message":"duplicate key"}"#.into());
        assert!(matches!(err, RemoteError::Conflict(ref m) if m == "duplicate key"));

        let err = RemoteError::from_status(401, r#"{"msg":"JWT expired"}"#.into());
        assert!(matches!(err, RemoteError::Unauthorized(ref m) if m == "JWT expired"));

        let err = RemoteError::from_status(502, "bad gateway".into());
        assert!(matches!(err, RemoteError::Http { status: 502, ref message } if message == "bad gateway"));
    }
}
