//! HTTP dispatcher and admin handlers.
//!
//! Admin endpoints under `/__mock/` are served directly. Every other request
//! goes through [`RequestLogLayer`] and is answered from the
//! [`MockRegistry`].

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use bytes::Bytes;
use tokio::net::TcpListener;
use tower::Layer;
use tracing::{info, warn};

use crate::config::{GlobalSettings, MockResponse, MockRoute, MockServerConfig, RouteKey};
use crate::error::ApiError;
use crate::interceptor::{request_path, RequestLogLayer};
use crate::registry::{MockRegistry, RegistrySnapshot};
use crate::request_log::{RequestLogEntry, RequestLogStore};
use crate::ui::{UiContext, UiRenderer};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<MockRegistry>,
    pub logs: Arc<RequestLogStore>,
    pub settings: Arc<GlobalSettings>,
    ui_page: Arc<str>,
}

/// Mock server
///
/// Owns the registry and the request log for the lifetime of the process.
pub struct MockServer {
    state: AppState,
}

impl MockServer {
    /// Create a server from configuration, registering its seed mocks.
    pub fn new(config: MockServerConfig) -> anyhow::Result<Self> {
        config.validate()?;

        let registry = MockRegistry::from_routes(config.mocks);
        let logs = RequestLogStore::with_capacity(config.settings.max_logs);
        let ui_page = UiRenderer::new()?.render_index(&UiContext::default())?;

        info!(
            mocks = registry.len(),
            max_logs = logs.capacity(),
            "Mock server initialized"
        );

        Ok(Self {
            state: AppState {
                registry: Arc::new(registry),
                logs: Arc::new(logs),
                settings: Arc::new(config.settings),
                ui_page: ui_page.into(),
            },
        })
    }

    pub fn registry(&self) -> &Arc<MockRegistry> {
        &self.state.registry
    }

    pub fn logs(&self) -> &Arc<RequestLogStore> {
        &self.state.logs
    }

    /// Build the request router.
    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Serve requests on `listener` until the process exits.
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        axum::serve(listener, self.router()).await
    }
}

/// Build the dispatcher: admin routes first, everything else mocked and logged.
pub fn router(state: AppState) -> Router {
    let mock_router: Router = Router::new().fallback(serve_mock).with_state(state.clone());
    let mock_service = RequestLogLayer::new(state.logs.clone()).layer(mock_router);

    Router::new()
        .route("/__mock/ui", any(web_ui))
        .route("/__mock/list", any(list_mocks))
        .route("/__mock/add", any(add_mock))
        .route("/__mock/delete", any(delete_mock))
        .route("/__mock/logs", any(list_logs))
        .route("/__mock/logs/clear", any(clear_logs))
        // Canned bodies may be arbitrarily large.
        .layer(DefaultBodyLimit::disable())
        .fallback_service(mock_service)
        .with_state(state)
}

fn require_method(method: &Method, allowed: &'static str) -> Result<(), ApiError> {
    if method.as_str() == allowed {
        Ok(())
    } else {
        Err(ApiError::MethodNotAllowed(allowed))
    }
}

fn invalid_json(err: serde_json::Error) -> ApiError {
    warn!(error = %err, "Rejecting admin request body");
    ApiError::InvalidInput("Invalid JSON".to_string())
}

async fn web_ui(State(state): State<AppState>, method: Method) -> Result<Html<String>, ApiError> {
    require_method(&method, "GET")?;
    Ok(Html(state.ui_page.to_string()))
}

async fn list_mocks(
    State(state): State<AppState>,
    method: Method,
) -> Result<Json<RegistrySnapshot>, ApiError> {
    require_method(&method, "GET")?;
    Ok(Json(state.registry.snapshot()))
}

async fn add_mock(
    State(state): State<AppState>,
    method: Method,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    require_method(&method, "POST")?;
    let route: MockRoute = serde_json::from_slice(&body).map_err(invalid_json)?;

    info!(method = %route.method, path = %route.path, status = route.response.status_code, "Mock registered");
    state
        .registry
        .upsert(route.path, route.method, route.response);

    Ok((StatusCode::CREATED, "Mock added"))
}

async fn delete_mock(
    State(state): State<AppState>,
    method: Method,
    body: Bytes,
) -> Result<&'static str, ApiError> {
    require_method(&method, "DELETE")?;
    let key: RouteKey = serde_json::from_slice(&body).map_err(invalid_json)?;

    state.registry.delete(&key.path, &key.method)?;
    info!(method = %key.method, path = %key.path, "Mock deleted");

    Ok("Mock deleted")
}

async fn list_logs(
    State(state): State<AppState>,
    method: Method,
) -> Result<Json<Vec<RequestLogEntry>>, ApiError> {
    require_method(&method, "GET")?;
    Ok(Json(state.logs.list()))
}

async fn clear_logs(State(state): State<AppState>, method: Method) -> Result<&'static str, ApiError> {
    require_method(&method, "DELETE")?;
    state.logs.clear();
    info!("Request logs cleared");
    Ok("Logs cleared")
}

async fn serve_mock(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    let path = request_path(&uri);
    let path = path.as_str();

    match state.registry.lookup(path, method.as_str()) {
        Some(mock) => {
            if state.settings.log_matches {
                info!(method = %method, path = %path, status = mock.status_code, "Request matched mock");
            }
            mock_response(&mock)
        }
        None => {
            if state.settings.log_unmatched {
                warn!(method = %method, path = %path, "No matching mock found");
            }
            ApiError::NotFound.into_response()
        }
    }
}

/// Convert a stored mock into an HTTP response.
///
/// Headers that are not valid HTTP are skipped; an unusable status code
/// yields 500.
pub fn mock_response(mock: &MockResponse) -> Response {
    let Ok(status) = StatusCode::from_u16(mock.status_code) else {
        warn!(status = mock.status_code, "Mock has an invalid status code");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Invalid mock status code: {}", mock.status_code),
        )
            .into_response();
    };

    let mut response = Response::new(Body::from(mock.body.clone()));
    *response.status_mut() = status;

    for (name, value) in &mock.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().insert(name, value);
            }
            _ => warn!(header = %name, "Skipping invalid mock header"),
        }
    }

    response
}
