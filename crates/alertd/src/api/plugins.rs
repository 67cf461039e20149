//! The `/plugins` resource family: the action plugins registered with
//! this deployment and their expected properties.

use axum::response::Response;

use super::{ok, ApiError, ApiRequest, App};

pub async fn process(app: &App, req: ApiRequest) -> Result<Response, ApiError> {
    req.require_tenant()?;
    let tokens = req.tokens();

    match (req.method.as_str(), tokens.as_slice()) {
        ("GET", []) => {
            let plugins = app.definitions.get_action_plugins().await?;
            Ok(ok(&plugins))
        }
        ("GET", [action_plugin]) => {
            let Some(properties) = app.definitions.get_action_plugin(action_plugin).await? else {
                return Err(ApiError::not_found(format!(
                    "Not found action plugin: {action_plugin}"
                )));
            };
            Ok(ok(&properties))
        }
        _ => Err(req.wrong_path()),
    }
}
