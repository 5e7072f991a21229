//! Request logging middleware.
//!
//! [`RequestLogLayer`] wraps the mock dispatch path. For every request it
//! buffers the request body and hands an identical body to the inner
//! service, buffers the response body and returns the same bytes to the
//! caller, then appends a [`NewLogEntry`] to the shared [`RequestLogStore`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Request, Response, Uri};
use axum::response::IntoResponse;
use bytes::Bytes;
use chrono::Utc;
use percent_encoding::percent_decode_str;
use tower::{Layer, Service};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::request_log::{LoggedHeaders, NewLogEntry, RequestLogStore};

/// Limit when reading a body into memory (no limit).
const BODY_READ_LIMIT: usize = usize::MAX;

/// Admin control-plane paths. These are never logged.
pub const ADMIN_PATHS: &[&str] = &[
    "/__mock/ui",
    "/__mock/list",
    "/__mock/add",
    "/__mock/delete",
    "/__mock/logs",
    "/__mock/logs/clear",
];

/// Whether `path` is one of the admin endpoints.
pub fn is_admin_path(path: &str) -> bool {
    ADMIN_PATHS.contains(&path)
}

/// Percent-decoded request path. Invalid UTF-8 is decoded lossily.
pub fn request_path(uri: &Uri) -> String {
    percent_decode_str(uri.path())
        .decode_utf8_lossy()
        .into_owned()
}

/// Keep the first value of each header name.
///
/// Non-UTF-8 values are decoded lossily.
pub fn flatten_headers(headers: &HeaderMap) -> LoggedHeaders {
    headers
        .keys()
        .filter_map(|name| {
            let value = headers.get(name)?;
            Some((
                name.to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            ))
        })
        .collect()
}

/// Layer that records each request/response cycle into a log store.
#[derive(Clone)]
pub struct RequestLogLayer {
    logs: Arc<RequestLogStore>,
}

impl RequestLogLayer {
    pub fn new(logs: Arc<RequestLogStore>) -> Self {
        Self { logs }
    }
}

impl<S> Layer<S> for RequestLogLayer {
    type Service = RequestLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLogService {
            inner,
            logs: self.logs.clone(),
        }
    }
}

/// Service produced by [`RequestLogLayer`].
#[derive(Clone)]
pub struct RequestLogService<S> {
    inner: S,
    logs: Arc<RequestLogStore>,
}

impl<S> Service<Request<Body>> for RequestLogService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Error: Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        // Use the clone that was driven to readiness and leave a fresh one behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let logs = self.logs.clone();

        if is_admin_path(req.uri().path()) {
            return Box::pin(inner.call(req));
        }

        Box::pin(async move {
            let started = Instant::now();
            let timestamp = Utc::now();

            let (parts, body) = req.into_parts();
            let request_body = match to_bytes(body, BODY_READ_LIMIT).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(error = %err, "Failed to read request body");
                    let error = ApiError::InvalidInput("Failed to read request body".to_string());
                    return Ok(error.into_response());
                }
            };

            let method = parts.method.to_string();
            let path = request_path(&parts.uri);
            let request_headers = flatten_headers(&parts.headers);

            let req_for_inner = Request::from_parts(parts, Body::from(request_body.clone()));
            let resp = inner.call(req_for_inner).await?;

            let (resp_parts, resp_body) = resp.into_parts();
            let response_body = read_response_body(resp_body).await;
            let status_code = resp_parts.status.as_u16();
            let response_headers = flatten_headers(&resp_parts.headers);

            let new_resp = Response::from_parts(resp_parts, Body::from(response_body.clone()));

            let duration = started.elapsed();
            let id = logs.append(NewLogEntry {
                timestamp,
                method,
                path,
                request_headers,
                request_body: String::from_utf8_lossy(&request_body).into_owned(),
                response_headers,
                response_body: String::from_utf8_lossy(&response_body).into_owned(),
                status_code,
                duration,
            });
            debug!(id, status = status_code, ?duration, "Request logged");

            Ok(new_resp)
        })
    }
}

async fn read_response_body(body: Body) -> Bytes {
    match to_bytes(body, BODY_READ_LIMIT).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(error = %err, "Failed to read response body, returning it empty");
            Bytes::new()
        }
    }
}
