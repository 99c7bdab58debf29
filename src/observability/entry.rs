//! The per-request access log entry.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Form or query fields, keyed by name in sorted order.
pub type FormFields = BTreeMap<String, Vec<String>>;

/// What was captured from the request for the `PARAMS` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestParams {
    /// Nothing captured (empty body, or a JSON body that failed to decode).
    None,
    /// Normalized JSON object.
    Json(String),
    /// Decoded form or query fields.
    Fields(FormFields),
    /// Fixed marker standing in for content that is not captured.
    Placeholder(String),
}

impl RequestParams {
    /// Value of a captured field, if the params hold fields.
    pub fn field(&self, name: &str) -> Option<&[String]> {
        match self {
            RequestParams::Fields(fields) => fields.get(name).map(Vec::as_slice),
            _ => None,
        }
    }
}

impl fmt::Display for RequestParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestParams::None => f.write_str("<nil>"),
            RequestParams::Json(json) => f.write_str(json),
            RequestParams::Fields(fields) => {
                let rendered = serde_json::to_string(fields).map_err(|_| fmt::Error)?;
                f.write_str(&rendered)
            }
            RequestParams::Placeholder(marker) => f.write_str(marker),
        }
    }
}

/// One request/response cycle, as written to the access log.
#[derive(Debug, Clone)]
pub struct RequestLog {
    pub request_id: String,
    /// Route template that handled the request, `-` when nothing matched.
    pub handler: String,
    pub path: String,
    pub method: String,
    pub params: RequestParams,
    pub client_ip: String,
    pub status: u16,
    /// Handler error messages, one `Error #NN: ...` line each.
    pub errors: String,
    pub response_data: String,
    /// Bytes of response body that passed through to the client.
    pub response_size: u64,
    pub elapsed: Duration,
}

impl fmt::Display for RequestLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "X-Request-Id:{}", self.request_id)?;
        writeln!(
            f,
            "---------------------------REQUEST START-----------------------------"
        )?;
        writeln!(f, "HANDLER: {}", self.handler)?;
        writeln!(f, "PATH: {}", self.path)?;
        writeln!(f, "HTTP METHOD: {}", self.method)?;
        writeln!(f, "PARAMS: {}", self.params)?;
        writeln!(f, "IP: {}", self.client_ip)?;
        writeln!(f, "X-Request-Id:{}", self.request_id)?;
        writeln!(f, "HTTP STATUS: {}", self.status)?;
        writeln!(f, "Error Messages: {}", self.errors)?;
        writeln!(f, "RESPONSE DATA: {}", self.response_data)?;
        writeln!(f, "RESPONSE SIZE: {}", self.response_size)?;
        writeln!(f, "ELAPSED: {:?}", self.elapsed)?;
        write!(
            f,
            "---------------------------REQUEST END-----------------------------"
        )
    }
}

#[cfg(test)]
pub(crate) fn sample_entry() -> RequestLog {
    RequestLog {
        request_id: "req-1".to_string(),
        handler: "/users/{id}".to_string(),
        path: "/users/7".to_string(),
        method: "GET".to_string(),
        params: RequestParams::None,
        client_ip: "10.0.0.1".to_string(),
        status: 200,
        errors: String::new(),
        response_data: r#"{"id":7}"#.to_string(),
        response_size: 8,
        elapsed: Duration::from_millis(3),
    }
}
