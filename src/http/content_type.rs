//! Content-type policy shared by request and response capture.
//!
//! One table decides how a body is treated in the access log, whichever
//! direction it travels:
//!
//! | media type                          | kind           | request         | response      |
//! |-------------------------------------|----------------|-----------------|---------------|
//! | `application/json`                  | Json           | normalized      | passthrough   |
//! | `application/x-www-form-urlencoded` | UrlEncodedForm | parsed fields   | passthrough   |
//! | `multipart/form-data`               | MultipartForm  | parsed fields   | passthrough   |
//! | `application/octet-stream`          | Binary         | `[BINARY DATA]` | `[BINARY DATA]` |
//! | `audio/mpeg`, `text/html`           | Binary         | `[BINARY DATA]` | `[BINARY DATA]` |
//! | anything else                       | Unsupported    | query or marker | marker        |

use axum::http::{header, HeaderMap};

/// Marker logged instead of binary content.
pub const BINARY_DATA: &str = "[BINARY DATA]";

/// How a body of a given media type is captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Json,
    UrlEncodedForm,
    MultipartForm,
    Binary,
    Unsupported,
}

const POLICY: &[(&str, ContentKind)] = &[
    ("application/json", ContentKind::Json),
    ("application/x-www-form-urlencoded", ContentKind::UrlEncodedForm),
    ("multipart/form-data", ContentKind::MultipartForm),
    ("application/octet-stream", ContentKind::Binary),
    ("audio/mpeg", ContentKind::Binary),
    ("text/html", ContentKind::Binary),
];

impl ContentKind {
    /// Look up a bare media type (see [`media_type`]) in the policy table.
    pub fn classify(media_type: &str) -> Self {
        POLICY
            .iter()
            .find(|(name, _)| *name == media_type)
            .map(|(_, kind)| *kind)
            .unwrap_or(ContentKind::Unsupported)
    }

    /// Whether a body of this kind is read for the log: parsed on requests,
    /// copied as text on responses.
    pub fn is_text(self) -> bool {
        matches!(
            self,
            ContentKind::Json | ContentKind::UrlEncodedForm | ContentKind::MultipartForm
        )
    }
}

/// Strip parameters from a `Content-Type` value: `"Application/JSON; charset=utf-8"` → `"application/json"`.
pub fn media_type(value: &str) -> String {
    value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// The bare media type of a header map, empty when absent or not valid text.
pub fn media_type_of(headers: &HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(media_type)
        .unwrap_or_default()
}

/// Marker logged for media types outside the policy table.
pub fn unsupported(media_type: &str) -> String {
    format!("[UNSUPPORTED CONTENT TYPE: {}]", media_type)
}

/// Marker logged when a body exceeds the capture limit.
pub fn too_large(len: u64) -> String {
    format!("[BODY TOO LARGE: {} bytes]", len)
}

/// Marker logged when an undeclared body runs past the capture limit.
pub fn too_large_over(limit: usize) -> String {
    format!("[BODY TOO LARGE: over {} bytes]", limit)
}

/// Marker logged for a multipart file part.
pub fn file_marker(file_name: &str) -> String {
    format!("[FILE: {}]", file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn classifies_known_types() {
        assert_eq!(ContentKind::classify("application/json"), ContentKind::Json);
        assert_eq!(
            ContentKind::classify("application/x-www-form-urlencoded"),
            ContentKind::UrlEncodedForm
        );
        assert_eq!(
            ContentKind::classify("multipart/form-data"),
            ContentKind::MultipartForm
        );
        assert_eq!(
            ContentKind::classify("application/octet-stream"),
            ContentKind::Binary
        );
        assert_eq!(ContentKind::classify("audio/mpeg"), ContentKind::Binary);
        assert_eq!(ContentKind::classify("text/html"), ContentKind::Binary);
    }

    #[test]
    fn everything_else_is_unsupported() {
        for media in ["text/plain", "application/xml", "image/png", ""] {
            assert_eq!(ContentKind::classify(media), ContentKind::Unsupported);
        }
    }

    #[test]
    fn strips_parameters_and_case() {
        assert_eq!(media_type("application/json; charset=utf-8"), "application/json");
        assert_eq!(
            media_type("Multipart/Form-Data; boundary=abc"),
            "multipart/form-data"
        );
        assert_eq!(media_type("  text/html  "), "text/html");
        assert_eq!(media_type(""), "");
    }

    #[test]
    fn reads_header_map() {
        let mut headers = HeaderMap::new();
        assert_eq!(media_type_of(&headers), "");

        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json;charset=UTF-8"),
        );
        assert_eq!(media_type_of(&headers), "application/json");
    }

    #[test]
    fn text_kinds() {
        assert!(ContentKind::Json.is_text());
        assert!(ContentKind::UrlEncodedForm.is_text());
        assert!(ContentKind::MultipartForm.is_text());
        assert!(!ContentKind::Binary.is_text());
        assert!(!ContentKind::Unsupported.is_text());
    }

    #[test]
    fn markers() {
        assert_eq!(unsupported("text/plain"), "[UNSUPPORTED CONTENT TYPE: text/plain]");
        assert_eq!(too_large(42), "[BODY TOO LARGE: 42 bytes]");
        assert_eq!(too_large_over(8), "[BODY TOO LARGE: over 8 bytes]");
        assert_eq!(file_marker("a.txt"), "[FILE: a.txt]");
    }
}
