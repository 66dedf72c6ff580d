//! Replay a captured request against the owning region and stream its answer back

use super::CapturedRequest;
use crate::config::ProxyConfig;
use crate::domain::Region;
use crate::error::{AppError, Result};
use crate::telemetry::metrics::{FORWARDED_REQUESTS_TOTAL, FORWARD_DURATION};
use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue},
    response::Response,
};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Set on every proxied request, carrying the tag of the forwarding region.
pub const FORWARDED_FROM_HEADER: &str = "x-accounts-forwarded-from";

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(name)
}

/// Copy end-to-end headers. `host` and `content-length` are recomputed by the client.
fn end_to_end_headers(source: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(source.len());
    for (name, value) in source {
        if is_hop_by_hop(name) || name == header::HOST || name == header::CONTENT_LENGTH {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

pub struct RegionForwarder {
    client: reqwest::Client,
    endpoints: HashMap<Region, String>,
    local: Region,
}

impl RegionForwarder {
    pub fn new(
        local: Region,
        endpoints: HashMap<Region, String>,
        config: &ProxyConfig,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoints,
            local,
        })
    }

    /// Send the request to `region` and hand back its response untouched.
    ///
    /// Dropping the returned future aborts the upstream call.
    pub async fn forward(&self, region: Region, request: CapturedRequest) -> Result<Response> {
        if let Some(origin) = request.headers.get(FORWARDED_FROM_HEADER) {
            return Err(AppError::BadGateway(format!(
                "Request forwarded by {:?} is not owned by {}",
                origin, self.local
            )));
        }

        let endpoint = self
            .endpoints
            .get(&region)
            .ok_or_else(|| AppError::BadGateway(format!("No endpoint for region {}", region)))?;
        let url = format!("{}{}", endpoint, request.path_and_query());

        let mut headers = end_to_end_headers(&request.headers);
        headers.insert(
            HeaderName::from_static(FORWARDED_FROM_HEADER),
            HeaderValue::from_static(self.local.tag()),
        );

        tracing::debug!(
            method = %request.method,
            target_region = %region,
            path = %request.uri.path(),
            "Forwarding request"
        );

        let start = Instant::now();
        let sent = self
            .client
            .request(request.method, &url)
            .headers(headers)
            .body(request.body)
            .send()
            .await;
        histogram_forward(region, start);

        let upstream = match sent {
            Ok(resp) => resp,
            Err(e) => {
                metrics::counter!(
                    FORWARDED_REQUESTS_TOTAL,
                    "region" => region.tag(),
                    "outcome" => "error"
                )
                .increment(1);
                tracing::warn!(target_region = %region, error = %e, "Forwarding failed");
                return Err(AppError::Http(e));
            }
        };

        metrics::counter!(
            FORWARDED_REQUESTS_TOTAL,
            "region" => region.tag(),
            "outcome" => upstream.status().as_u16().to_string()
        )
        .increment(1);

        let status = upstream.status();
        let headers = end_to_end_headers(upstream.headers());
        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

fn histogram_forward(region: Region, start: Instant) {
    metrics::histogram!(FORWARD_DURATION, "region" => region.tag())
        .record(start.elapsed().as_secs_f64());
}
