//! Deployment status. The only surface that doesn't require a tenant.

use axum::response::Response;

use super::{ok, ApiError, ApiRequest, App};

pub async fn process(_app: &App, req: ApiRequest) -> Result<Response, ApiError> {
    match (req.method.as_str(), req.tokens().as_slice()) {
        ("GET", []) => Ok(ok(&serde_json::json!({
            "status": "STARTED",
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        }))),
        _ => Err(req.wrong_path()),
    }
}
