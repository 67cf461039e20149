//! The `/actions` resource family: action definition CRUD and execution
//! history queries.

use axum::response::Response;

use models::ActionDefinition;

use super::criteria::build_actions_criteria;
use super::paging::{extract_paging, paginated_ok};
use super::{ok, ok_deleted, ok_empty, ApiError, ApiRequest, App};

pub async fn process(app: &App, req: ApiRequest) -> Result<Response, ApiError> {
    let tenant_id = req.require_tenant()?.to_string();
    let tokens = req.tokens();

    match (req.method.as_str(), tokens.as_slice()) {
        ("GET", []) => find_action_ids(app, &tenant_id).await,
        ("POST", []) => {
            let definition = checked_definition(&req)?;
            create_action_definition(app, &tenant_id, definition).await
        }
        ("PUT", []) => {
            let definition = checked_definition(&req)?;
            update_action_definition(app, &tenant_id, definition).await
        }
        ("GET", ["history"]) => find_actions_history(app, &tenant_id, &req).await,
        ("PUT", ["history", "delete"]) => delete_actions_history(app, &tenant_id, &req).await,
        ("GET", ["plugin", action_plugin]) => {
            find_action_ids_by_plugin(app, &tenant_id, action_plugin).await
        }
        ("GET", [action_plugin, action_id]) => {
            get_action_definition(app, &tenant_id, action_plugin, action_id).await
        }
        ("DELETE", [action_plugin, action_id]) => {
            delete_action_definition(app, &tenant_id, action_plugin, action_id).await
        }

        _ => Err(req.wrong_path()),
    }
}

/// Required fields are validated before the backing service sees anything.
fn checked_definition(req: &ApiRequest) -> Result<ActionDefinition, ApiError> {
    let definition: ActionDefinition = req.parse_body()?;
    if definition.action_plugin.is_empty() {
        return Err(ApiError::bad_request("actionPlugin must be not null"));
    }
    if definition.action_id.is_empty() {
        return Err(ApiError::bad_request("actionId must be not null"));
    }
    if definition.properties.is_empty() {
        return Err(ApiError::bad_request("properties must be not null"));
    }
    Ok(definition)
}

async fn find_action_ids(app: &App, tenant_id: &str) -> Result<Response, ApiError> {
    let actions = app.definitions.get_action_definition_ids(tenant_id).await?;
    Ok(ok(&actions))
}

async fn find_action_ids_by_plugin(
    app: &App,
    tenant_id: &str,
    action_plugin: &str,
) -> Result<Response, ApiError> {
    let actions = app
        .definitions
        .get_action_definition_ids_by_plugin(tenant_id, action_plugin)
        .await?;
    Ok(ok(&actions))
}

async fn get_action_definition(
    app: &App,
    tenant_id: &str,
    action_plugin: &str,
    action_id: &str,
) -> Result<Response, ApiError> {
    let Some(definition) = app
        .definitions
        .get_action_definition(tenant_id, action_plugin, action_id)
        .await?
    else {
        return Err(ApiError::not_found(format!(
            "No action found for actionPlugin: {action_plugin} and actionId: {action_id}"
        )));
    };
    Ok(ok(&definition))
}

async fn create_action_definition(
    app: &App,
    tenant_id: &str,
    mut definition: ActionDefinition,
) -> Result<Response, ApiError> {
    definition.tenant_id = tenant_id.to_string();
    if app
        .definitions
        .get_action_definition(tenant_id, &definition.action_plugin, &definition.action_id)
        .await?
        .is_some()
    {
        return Err(ApiError::bad_request(format!(
            "Existing ActionDefinition: {}/{}",
            definition.action_plugin, definition.action_id
        )));
    }
    app.definitions
        .add_action_definition(tenant_id, definition.clone())
        .await?;
    tracing::debug!(tenant_id, action_id = %definition.action_id, "created action definition");
    Ok(ok(&definition))
}

async fn update_action_definition(
    app: &App,
    tenant_id: &str,
    mut definition: ActionDefinition,
) -> Result<Response, ApiError> {
    definition.tenant_id = tenant_id.to_string();
    if app
        .definitions
        .get_action_definition(tenant_id, &definition.action_plugin, &definition.action_id)
        .await?
        .is_none()
    {
        return Err(ApiError::not_found(format!(
            "ActionDefinition: {}/{} not found for update",
            definition.action_plugin, definition.action_id
        )));
    }
    app.definitions
        .update_action_definition(tenant_id, definition.clone())
        .await?;
    tracing::debug!(tenant_id, action_id = %definition.action_id, "updated action definition");
    Ok(ok(&definition))
}

async fn delete_action_definition(
    app: &App,
    tenant_id: &str,
    action_plugin: &str,
    action_id: &str,
) -> Result<Response, ApiError> {
    if app
        .definitions
        .get_action_definition(tenant_id, action_plugin, action_id)
        .await?
        .is_none()
    {
        return Err(ApiError::not_found(format!(
            "ActionPlugin: {action_plugin} ActionId: {action_id} not found for delete"
        )));
    }
    app.definitions
        .remove_action_definition(tenant_id, action_plugin, action_id)
        .await?;
    tracing::debug!(tenant_id, action_plugin, action_id, "removed action definition");
    Ok(ok_empty())
}

async fn find_actions_history(
    app: &App,
    tenant_id: &str,
    req: &ApiRequest,
) -> Result<Response, ApiError> {
    let pager = extract_paging(&req.params)?;
    let criteria = build_actions_criteria(&req.params)?;
    let page = app.actions.get_actions(tenant_id, &criteria, &pager).await?;
    tracing::debug!(tenant_id, total = page.total_size, "actions");
    Ok(paginated_ok(page, &req.uri))
}

async fn delete_actions_history(
    app: &App,
    tenant_id: &str,
    req: &ApiRequest,
) -> Result<Response, ApiError> {
    let criteria = build_actions_criteria(&req.params)?;
    let deleted = app.actions.delete_actions(tenant_id, &criteria).await?;
    tracing::debug!(tenant_id, deleted, "deleted actions");
    Ok(ok_deleted(deleted))
}
