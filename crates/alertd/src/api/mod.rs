//! The HTTP surface: one axum fallback route feeding a manual router.
//!
//! Dispatch is two-level. The first path segment selects a resource family
//! (triggers, alerts, events, ...); each family then matches
//! (method, token count, literal tokens) in an explicit priority order.
//! Several shapes are prefix-ambiguous (`/{triggerId}` vs `/trigger` vs
//! `/groups`), so arm order within each family is load-bearing and covered
//! by tests.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub mod actions;
pub mod alerts;
pub mod criteria;
mod error;
pub mod events;
pub mod import_export;
pub mod paging;
pub mod params;
pub mod plugins;
pub mod status;
pub mod triggers;

#[cfg(test)]
mod test;

pub use error::ApiError;
use params::Params;

/// Header carrying the tenant id; required on every request but `/status`.
pub const TENANT_HEADER: &str = "X-Tenant";

/// Request bodies above this size are rejected before parsing.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub struct App {
    pub definitions: Arc<dyn services::DefinitionsService>,
    pub alerts: Arc<dyn services::AlertsService>,
    pub actions: Arc<dyn services::ActionsService>,
    /// Poll interval for watch connections that don't specify one.
    pub watch_interval: std::time::Duration,
}

/// One inbound request, reduced to what the manual router consumes. The
/// parameter map is built once and never mutated afterwards.
pub struct ApiRequest {
    pub method: Method,
    /// Full request path, for the uniform wrong-path rejection.
    pub path: String,
    /// Path remainder after the family segment, always `/`-prefixed.
    pub subpath: String,
    /// Path and query as received, the base for pagination links.
    pub uri: String,
    pub tenant_id: Option<String>,
    pub params: Params,
    pub body: Bytes,
}

impl ApiRequest {
    /// Split the subpath into its non-empty tokens: `/a/b` → `["a", "b"]`.
    pub fn tokens(&self) -> Vec<&str> {
        self.subpath
            .split('/')
            .filter(|token| !token.is_empty())
            .collect()
    }

    /// Tenant rejection happens before any resource-specific logic, with
    /// the same client-error shape everywhere.
    pub fn require_tenant(&self) -> Result<&str, ApiError> {
        match self.tenant_id.as_deref() {
            Some(tenant) if !tenant.trim().is_empty() => Ok(tenant),
            _ => Err(ApiError::bad_request(format!(
                "{TENANT_HEADER} header is required"
            ))),
        }
    }

    /// Parse the JSON body, surfacing the parse failure message as a
    /// client error rather than swallowing it.
    pub fn parse_body<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body)
            .map_err(|err| ApiError::bad_request(format!("Error parsing body: {err}")))
    }

    pub fn wrong_path(&self) -> ApiError {
        ApiError::wrong_path(&self.method, &self.path)
    }
}

pub fn ok<T: Serialize>(value: &T) -> Response {
    (StatusCode::OK, axum::Json(value)).into_response()
}

/// Empty acknowledgement for mutations with nothing to return.
pub fn ok_empty() -> Response {
    StatusCode::OK.into_response()
}

/// Bulk deletes return the number of records removed, never the records.
pub fn ok_deleted(count: usize) -> Response {
    ok(&serde_json::json!({ "deleted": count }))
}

/// Build the daemon's router: every path funnels through the fallback into
/// the manual dispatch below.
pub fn build_router(app: Arc<App>) -> axum::Router {
    axum::Router::new()
        .fallback(dispatch)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(app)
}

async fn dispatch(State(app): State<Arc<App>>, request: axum::extract::Request) -> Response {
    let (parts, body) = request.into_parts();

    let path = parts.uri.path().to_string();
    let uri = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| path.clone());
    let params = parse_query(parts.uri.query().unwrap_or(""));
    let tenant_id = parts
        .headers
        .get(TENANT_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(err) => {
            return ApiError::bad_request(format!("Error reading body: {err}")).into_response()
        }
    };

    let trimmed = path.trim_start_matches('/');
    let (family, subpath) = match trimmed.split_once('/') {
        Some((family, rest)) => (family.to_string(), format!("/{rest}")),
        None => (trimmed.to_string(), "/".to_string()),
    };

    let request = ApiRequest {
        method: parts.method,
        path,
        subpath,
        uri,
        tenant_id,
        params,
        body,
    };

    tracing::debug!(
        method = %request.method,
        path = %request.path,
        "dispatching request"
    );

    let result = match family.as_str() {
        "status" => status::process(&app, request).await,
        "triggers" => triggers::process(&app, request).await,
        "alerts" => alerts::process(&app, request).await,
        "events" => events::process(&app, request).await,
        "actions" => actions::process(&app, request).await,
        "plugins" => plugins::process(&app, request).await,
        "export" => import_export::process_export(&app, request).await,
        "import" => import_export::process_import(&app, request).await,
        _ => Err(request.wrong_path()),
    };
    result.unwrap_or_else(IntoResponse::into_response)
}

/// Decode the query string into an ordered, multi-valued parameter map.
fn parse_query(query: &str) -> Params {
    let mut params = Params::new();
    for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
        params
            .entry(name.into_owned())
            .or_default()
            .push(value.into_owned());
    }
    params
}
