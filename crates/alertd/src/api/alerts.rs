//! The `/alerts` resource family: filtered/paginated queries, lifecycle
//! operations (ack, resolve, notes, tags), telemetry ingestion, and the
//! live watch endpoint.

use axum::response::Response;

use models::tags::parse_tags;
use models::{AlertsCriteria, Data};

use super::criteria::build_alerts_criteria;
use super::paging::{extract_paging, paginated_ok};
use super::params::{self, Params};
use super::{ok, ok_deleted, ok_empty, ApiError, ApiRequest, App};
use crate::watch;

const PARAM_ALERT_IDS: &str = "alertIds";
const PARAM_ACK_BY: &str = "ackBy";
const PARAM_ACK_NOTES: &str = "ackNotes";
const PARAM_RESOLVED_BY: &str = "resolvedBy";
const PARAM_RESOLVED_NOTES: &str = "resolvedNotes";
const PARAM_TAGS: &str = "tags";
const PARAM_TAG_NAMES: &str = "tagNames";
const PARAM_USER: &str = "user";
const PARAM_TEXT: &str = "text";
const PARAM_THIN: &str = "thin";

pub async fn process(app: &App, req: ApiRequest) -> Result<Response, ApiError> {
    let tenant_id = req.require_tenant()?.to_string();
    let tokens = req.tokens();

    match (req.method.as_str(), tokens.as_slice()) {
        ("GET", []) => find_alerts(app, &tenant_id, &req).await,
        ("GET", ["watch"]) => watch_alerts(app, &tenant_id, &req.params).await,
        ("PUT", ["tags"]) => add_tags(app, &tenant_id, &req.params).await,
        ("DELETE", ["tags"]) => remove_tags(app, &tenant_id, &req.params).await,
        ("PUT", ["ack"]) => ack_alerts(app, &tenant_id, &req.params).await,
        ("DELETE", ["delete"]) => delete_alerts(app, &tenant_id, &req.params).await,
        ("PUT", ["resolve"]) => resolve_alerts(app, &tenant_id, &req.params).await,
        ("POST", ["data"]) => send_data(app, &tenant_id, req.parse_body()?).await,
        ("DELETE", [alert_id]) => delete_alert(app, &tenant_id, alert_id).await,

        ("PUT", ["ack", alert_id]) => ack_alert(app, &tenant_id, alert_id, &req.params).await,
        ("PUT", ["note", alert_id]) => add_note(app, &tenant_id, alert_id, &req.params).await,
        ("GET", ["alert", alert_id]) => get_alert(app, &tenant_id, alert_id, &req.params).await,
        ("PUT", ["resolve", alert_id]) => {
            resolve_alert(app, &tenant_id, alert_id, &req.params).await
        }

        _ => Err(req.wrong_path()),
    }
}

async fn find_alerts(app: &App, tenant_id: &str, req: &ApiRequest) -> Result<Response, ApiError> {
    let pager = extract_paging(&req.params)?;
    let criteria = build_alerts_criteria(&req.params)?;
    let page = app.alerts.get_alerts(tenant_id, &criteria, &pager).await?;
    tracing::debug!(tenant_id, total = page.total_size, "alerts");
    Ok(paginated_ok(page, &req.uri))
}

/// Open a live watch: criteria are captured once and re-evaluated by a
/// per-connection poll loop until the client disconnects.
async fn watch_alerts(app: &App, tenant_id: &str, params: &Params) -> Result<Response, ApiError> {
    let criteria = build_alerts_criteria(params)?;
    let interval = watch::watch_interval(params, app.watch_interval)?;
    let feed = watch::AlertsFeed {
        service: app.alerts.clone(),
        tenant_id: tenant_id.to_string(),
        criteria,
    };
    Ok(watch::stream_response(feed, interval))
}

async fn get_alert(
    app: &App,
    tenant_id: &str,
    alert_id: &str,
    params: &Params,
) -> Result<Response, ApiError> {
    let thin = params::flag(params, PARAM_THIN);
    let Some(alert) = app.alerts.get_alert(tenant_id, alert_id, thin).await? else {
        return Err(ApiError::not_found(format!("alertId: {alert_id} not found")));
    };
    Ok(ok(&alert))
}

async fn ack_alert(
    app: &App,
    tenant_id: &str,
    alert_id: &str,
    params: &Params,
) -> Result<Response, ApiError> {
    if alert_id.is_empty() {
        return Err(ApiError::bad_request("AlertId required for ack"));
    }
    let ack_by = params::first(params, PARAM_ACK_BY).map(str::to_string);
    let ack_notes = params::first(params, PARAM_ACK_NOTES).map(str::to_string);
    app.alerts
        .ack_alerts(tenant_id, &[alert_id.to_string()], ack_by, ack_notes)
        .await?;
    tracing::debug!(tenant_id, alert_id, "acked alert");
    Ok(ok_empty())
}

async fn ack_alerts(app: &App, tenant_id: &str, params: &Params) -> Result<Response, ApiError> {
    let alert_ids = params::csv(params, PARAM_ALERT_IDS);
    if alert_ids.is_empty() {
        return Err(ApiError::bad_request("AlertIds required for ack"));
    }
    let ack_by = params::first(params, PARAM_ACK_BY).map(str::to_string);
    let ack_notes = params::first(params, PARAM_ACK_NOTES).map(str::to_string);
    app.alerts
        .ack_alerts(tenant_id, &alert_ids, ack_by, ack_notes)
        .await?;
    tracing::debug!(tenant_id, count = alert_ids.len(), "acked alerts");
    Ok(ok_empty())
}

async fn resolve_alert(
    app: &App,
    tenant_id: &str,
    alert_id: &str,
    params: &Params,
) -> Result<Response, ApiError> {
    if alert_id.is_empty() {
        return Err(ApiError::bad_request("AlertId required for resolve"));
    }
    let resolved_by = params::first(params, PARAM_RESOLVED_BY).map(str::to_string);
    let resolved_notes = params::first(params, PARAM_RESOLVED_NOTES).map(str::to_string);
    app.alerts
        .resolve_alerts(tenant_id, &[alert_id.to_string()], resolved_by, resolved_notes)
        .await?;
    tracing::debug!(tenant_id, alert_id, "resolved alert");
    Ok(ok_empty())
}

async fn resolve_alerts(app: &App, tenant_id: &str, params: &Params) -> Result<Response, ApiError> {
    let alert_ids = params::csv(params, PARAM_ALERT_IDS);
    if alert_ids.is_empty() {
        return Err(ApiError::bad_request("AlertIds required for resolve"));
    }
    let resolved_by = params::first(params, PARAM_RESOLVED_BY).map(str::to_string);
    let resolved_notes = params::first(params, PARAM_RESOLVED_NOTES).map(str::to_string);
    app.alerts
        .resolve_alerts(tenant_id, &alert_ids, resolved_by, resolved_notes)
        .await?;
    tracing::debug!(tenant_id, count = alert_ids.len(), "resolved alerts");
    Ok(ok_empty())
}

async fn add_note(
    app: &App,
    tenant_id: &str,
    alert_id: &str,
    params: &Params,
) -> Result<Response, ApiError> {
    if alert_id.is_empty() {
        return Err(ApiError::bad_request("AlertId required for adding notes"));
    }
    let user = params::first(params, PARAM_USER).map(str::to_string);
    let text = params::first(params, PARAM_TEXT).map(str::to_string);
    app.alerts.add_note(tenant_id, alert_id, user, text).await?;
    tracing::debug!(tenant_id, alert_id, "noted alert");
    Ok(ok_empty())
}

async fn add_tags(app: &App, tenant_id: &str, params: &Params) -> Result<Response, ApiError> {
    let alert_ids = params::csv(params, PARAM_ALERT_IDS);
    let tags = params::first(params, PARAM_TAGS);
    let (false, Some(tags)) = (alert_ids.is_empty(), tags) else {
        return Err(ApiError::bad_request(
            "AlertIds and Tags required for adding tags",
        ));
    };
    let tags = parse_tags(tags)?;
    app.alerts.add_alert_tags(tenant_id, &alert_ids, tags).await?;
    tracing::debug!(tenant_id, count = alert_ids.len(), "tagged alerts");
    Ok(ok_empty())
}

async fn remove_tags(app: &App, tenant_id: &str, params: &Params) -> Result<Response, ApiError> {
    let alert_ids = params::csv(params, PARAM_ALERT_IDS);
    let tag_names = params::csv(params, PARAM_TAG_NAMES);
    if alert_ids.is_empty() || tag_names.is_empty() {
        return Err(ApiError::bad_request(
            "AlertIds and Tags required for removing tags",
        ));
    }
    app.alerts
        .remove_alert_tags(tenant_id, &alert_ids, &tag_names)
        .await?;
    tracing::debug!(tenant_id, count = alert_ids.len(), "untagged alerts");
    Ok(ok_empty())
}

async fn delete_alert(app: &App, tenant_id: &str, alert_id: &str) -> Result<Response, ApiError> {
    let criteria = AlertsCriteria {
        alert_ids: vec![alert_id.to_string()],
        ..Default::default()
    };
    let deleted = app.alerts.delete_alerts(tenant_id, &criteria).await?;
    if deleted == 1 {
        tracing::debug!(tenant_id, alert_id, "deleted alert");
        return Ok(ok_empty());
    }
    Err(ApiError::not_found(format!(
        "Alert {alert_id} doesn't exist for delete"
    )))
}

async fn delete_alerts(app: &App, tenant_id: &str, params: &Params) -> Result<Response, ApiError> {
    let criteria = build_alerts_criteria(params)?;
    let deleted = app.alerts.delete_alerts(tenant_id, &criteria).await?;
    tracing::debug!(tenant_id, deleted, "deleted alerts");
    Ok(ok_deleted(deleted))
}

async fn send_data(app: &App, tenant_id: &str, mut data: Vec<Data>) -> Result<Response, ApiError> {
    if data.is_empty() {
        return Err(ApiError::bad_request("Data is empty"));
    }
    for datum in &mut data {
        datum.tenant_id = tenant_id.to_string();
    }
    app.alerts.send_data(data).await?;
    Ok(ok_empty())
}
