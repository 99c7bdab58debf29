//! Request body capture.
//!
//! # Responsibilities
//! - Decide from the content type what the `PARAMS` line shows
//! - Read bodies that are logged, and put the exact bytes back on the request
//! - Leave binary and oversized bodies untouched
//!
//! # Design Decisions
//! - The handler always sees the original bytes, whether or not parsing succeeded
//! - JSON objects are normalized (compact, sorted keys); other JSON is not logged
//! - Capture problems surface as log content, never as a failed request

use axum::{
    body::{Body, Bytes},
    extract::{FromRequest, Multipart},
    http::{header, HeaderMap, Request, Uri},
};
use futures_util::StreamExt;
use serde_json::{Map, Value};

use crate::config::CaptureConfig;
use crate::http::content_type::{self, media_type_of, ContentKind, BINARY_DATA};
use crate::observability::entry::{FormFields, RequestParams};

/// Capture the request's parameters, returning the request ready for the handler.
pub async fn capture_request(
    request: Request<Body>,
    config: &CaptureConfig,
) -> (Request<Body>, RequestParams) {
    let media_type = media_type_of(request.headers());
    let kind = ContentKind::classify(&media_type);

    match kind {
        ContentKind::Binary => {
            return (request, RequestParams::Placeholder(BINARY_DATA.to_string()));
        }
        ContentKind::Unsupported => {
            let params = match query_fields(request.uri()) {
                Some(fields) => RequestParams::Fields(fields),
                None => RequestParams::Placeholder(content_type::unsupported(&media_type)),
            };
            return (request, params);
        }
        ContentKind::Json | ContentKind::UrlEncodedForm | ContentKind::MultipartForm => {}
    }

    if let Some(len) = declared_length(request.headers()) {
        if len > config.max_body_bytes as u64 {
            return (request, RequestParams::Placeholder(content_type::too_large(len)));
        }
    }

    let (parts, body) = request.into_parts();
    let bytes = match read_capped(body, config.max_body_bytes).await {
        Ok(Buffered::Complete(bytes)) => bytes,
        Ok(Buffered::Oversized(body)) => {
            let marker = content_type::too_large_over(config.max_body_bytes);
            return (Request::from_parts(parts, body), RequestParams::Placeholder(marker));
        }
        Err(e) => {
            tracing::warn!(
                path = %parts.uri.path(),
                error = %e,
                "Failed to read request body for logging"
            );
            return (Request::from_parts(parts, Body::empty()), RequestParams::None);
        }
    };

    let params = match kind {
        ContentKind::Json if bytes.is_empty() => RequestParams::None,
        ContentKind::Json => normalize_json(&bytes).map_or(RequestParams::None, RequestParams::Json),
        ContentKind::UrlEncodedForm => {
            let mut fields = parse_urlencoded(&bytes);
            merge_query(&mut fields, &parts.uri);
            fields_or_none(fields)
        }
        _ => {
            let mut fields = multipart_fields(&parts.headers, bytes.clone()).await;
            merge_query(&mut fields, &parts.uri);
            fields_or_none(fields)
        }
    };

    (Request::from_parts(parts, Body::from(bytes)), params)
}

/// A request body after an attempt to buffer it for the log.
enum Buffered {
    /// The whole body fit under the limit.
    Complete(Bytes),
    /// The limit was crossed; the body replays what was read, then the rest.
    Oversized(Body),
}

/// Read `body` until it ends or exceeds `limit` bytes.
async fn read_capped(body: Body, limit: usize) -> Result<Buffered, axum::Error> {
    let mut stream = body.into_data_stream();
    let mut chunks = Vec::new();
    let mut read = 0usize;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        read += chunk.len();
        chunks.push(chunk);

        if read > limit {
            let replay = futures_util::stream::iter(chunks.into_iter().map(Ok::<_, axum::Error>));
            return Ok(Buffered::Oversized(Body::from_stream(replay.chain(stream))));
        }
    }

    let mut buffer = Vec::with_capacity(read);
    for chunk in &chunks {
        buffer.extend_from_slice(chunk);
    }
    Ok(Buffered::Complete(Bytes::from(buffer)))
}

/// Decode a JSON object and re-encode it compactly with sorted keys.
///
/// Returns `None` for malformed JSON and for JSON that is not an object.
pub fn normalize_json(bytes: &[u8]) -> Option<String> {
    match serde_json::from_slice::<Map<String, Value>>(bytes) {
        Ok(object) => serde_json::to_string(&object).ok(),
        Err(e) => {
            tracing::debug!(error = %e, "Request body is not a JSON object, skipping normalization");
            None
        }
    }
}

/// Fields of a query string, `None` when there are none.
pub fn query_fields(uri: &Uri) -> Option<FormFields> {
    let fields = parse_urlencoded(uri.query()?.as_bytes());
    (!fields.is_empty()).then_some(fields)
}

fn parse_urlencoded(input: &[u8]) -> FormFields {
    let mut fields = FormFields::new();
    for (name, value) in url::form_urlencoded::parse(input) {
        fields
            .entry(name.into_owned())
            .or_default()
            .push(value.into_owned());
    }
    fields
}

/// Append query values after body values, as form parsing conventionally does.
fn merge_query(fields: &mut FormFields, uri: &Uri) {
    if let Some(query) = query_fields(uri) {
        for (name, values) in query {
            fields.entry(name).or_default().extend(values);
        }
    }
}

fn fields_or_none(fields: FormFields) -> RequestParams {
    if fields.is_empty() {
        RequestParams::None
    } else {
        RequestParams::Fields(fields)
    }
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Text fields of a multipart body; file parts are recorded by name only.
async fn multipart_fields(headers: &HeaderMap, bytes: Bytes) -> FormFields {
    let mut fields = FormFields::new();

    let mut builder = Request::builder();
    if let Some(content_type) = headers.get(header::CONTENT_TYPE) {
        builder = builder.header(header::CONTENT_TYPE, content_type.clone());
    }
    let Ok(request) = builder.body(Body::from(bytes)) else {
        return fields;
    };

    let mut multipart = match Multipart::from_request(request, &()).await {
        Ok(multipart) => multipart,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Multipart body could not be parsed for logging");
            return fields;
        }
    };

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "Multipart body truncated while parsing for logging");
                break;
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        let value = match field.file_name().map(content_type::file_marker) {
            Some(marker) => marker,
            None => match field.text().await {
                Ok(text) => text,
                Err(e) => {
                    tracing::debug!(field = %name, error = %e, "Multipart field is not text");
                    break;
                }
            },
        };
        fields.entry(name).or_default().push(value);
    }

    fields
}
