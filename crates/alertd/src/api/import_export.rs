//! Import and export of a tenant's full definition set.

use axum::response::Response;

use models::{Definitions, ImportType};

use super::{ok, ApiError, ApiRequest, App};

pub async fn process_export(app: &App, req: ApiRequest) -> Result<Response, ApiError> {
    let tenant_id = req.require_tenant()?.to_string();
    match (req.method.as_str(), req.tokens().as_slice()) {
        ("GET", []) => {
            let definitions = app.definitions.export_definitions(&tenant_id).await?;
            Ok(ok(&definitions))
        }
        _ => Err(req.wrong_path()),
    }
}

pub async fn process_import(app: &App, req: ApiRequest) -> Result<Response, ApiError> {
    let tenant_id = req.require_tenant()?.to_string();
    match (req.method.as_str(), req.tokens().as_slice()) {
        ("POST", [strategy]) => {
            let strategy = strategy.parse::<ImportType>()?;
            let definitions: Definitions = req.parse_body()?;
            let imported = app
                .definitions
                .import_definitions(&tenant_id, definitions, strategy)
                .await?;
            tracing::debug!(tenant_id, imported = imported.triggers.len(), "imported definitions");
            Ok(ok(&imported))
        }
        _ => Err(req.wrong_path()),
    }
}
