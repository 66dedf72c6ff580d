//! TraceLayer span maker that keeps tokens out of logs.

use axum::http::Request;
use tower_http::trace::MakeSpan;
use tracing::Span;

/// Query parameter names whose values must be redacted in logs.
const SENSITIVE_PARAMS: &[&str] = &["token", "code", "password", "email", "session_token"];

/// A `MakeSpan` that logs the URI with sensitive query values replaced.
#[derive(Clone, Debug)]
pub struct SanitizedMakeSpan;

impl<B> MakeSpan<B> for SanitizedMakeSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let forwarded_from = request
            .headers()
            .get(crate::routing::FORWARDED_FROM_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %sanitize_uri(request.uri()),
            version = ?request.version(),
            forwarded_from,
        )
    }
}

/// Example: `/api/v1/email/confirm?token=jp.abc` becomes
/// `/api/v1/email/confirm?token=[REDACTED]`
fn sanitize_uri(uri: &axum::http::Uri) -> String {
    let Some(query) = uri.query() else {
        return uri.path().to_string();
    };

    let sanitized_pairs: Vec<String> = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if SENSITIVE_PARAMS.contains(&key.to_ascii_lowercase().as_str()) => {
                format!("{key}=[REDACTED]")
            }
            _ => pair.to_string(),
        })
        .collect();

    format!("{}?{}", uri.path(), sanitized_pairs.join("&"))
}
