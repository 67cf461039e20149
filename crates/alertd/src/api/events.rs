//! The `/events` resource family: direct event creation, pipeline
//! ingestion, filtered/paginated queries, tags, and the live watch.

use axum::response::Response;

use models::tags::parse_tags;
use models::{Event, Trigger};

use super::criteria::build_events_criteria;
use super::paging::{extract_paging, paginated_ok};
use super::params::{self, Params};
use super::{ok, ok_deleted, ok_empty, ApiError, ApiRequest, App};
use crate::watch;

const PARAM_EVENT_IDS: &str = "eventIds";
const PARAM_TAGS: &str = "tags";
const PARAM_TAG_NAMES: &str = "tagNames";
const PARAM_THIN: &str = "thin";

pub async fn process(app: &App, req: ApiRequest) -> Result<Response, ApiError> {
    let tenant_id = req.require_tenant()?.to_string();
    let tokens = req.tokens();

    match (req.method.as_str(), tokens.as_slice()) {
        ("POST", []) => create_event(app, &tenant_id, req.parse_body()?).await,
        ("POST", ["data"]) => send_events(app, &tenant_id, req.parse_body()?).await,
        ("PUT", ["tags"]) => add_tags(app, &tenant_id, &req.params).await,
        ("DELETE", ["tags"]) => remove_tags(app, &tenant_id, &req.params).await,
        ("GET", []) => find_events(app, &tenant_id, &req).await,
        ("GET", ["watch"]) => watch_events(app, &tenant_id, &req.params).await,
        ("PUT", ["delete"]) => delete_events(app, &tenant_id, &req.params).await,
        ("GET", ["event", event_id]) => get_event(app, &tenant_id, event_id, &req.params).await,

        _ => Err(req.wrong_path()),
    }
}

async fn create_event(app: &App, tenant_id: &str, mut event: Event) -> Result<Response, ApiError> {
    if event.id.is_empty() {
        return Err(ApiError::bad_request("Event with id null"));
    }
    if event.category.is_empty() {
        return Err(ApiError::bad_request("Event with category null"));
    }
    event.tenant_id = tenant_id.to_string();
    if app
        .alerts
        .get_event(tenant_id, &event.id, true)
        .await?
        .is_some()
    {
        return Err(ApiError::bad_request(format!(
            "Event with ID [{}] exists.",
            event.id
        )));
    }
    if !Trigger::check_tags(&event.tags) {
        return Err(ApiError::bad_request(format!(
            "Tags {:?} must be non empty.",
            event.tags
        )));
    }
    app.alerts.add_events(vec![event.clone()]).await?;
    Ok(ok(&event))
}

async fn send_events(
    app: &App,
    tenant_id: &str,
    mut events: Vec<Event>,
) -> Result<Response, ApiError> {
    if events.is_empty() {
        return Err(ApiError::bad_request("Events is empty"));
    }
    for event in &mut events {
        event.tenant_id = tenant_id.to_string();
    }
    app.alerts.send_events(events).await?;
    Ok(ok_empty())
}

async fn find_events(app: &App, tenant_id: &str, req: &ApiRequest) -> Result<Response, ApiError> {
    let pager = extract_paging(&req.params)?;
    let criteria = build_events_criteria(&req.params)?;
    let page = app.alerts.get_events(tenant_id, &criteria, &pager).await?;
    tracing::debug!(tenant_id, total = page.total_size, "events");
    Ok(paginated_ok(page, &req.uri))
}

async fn watch_events(app: &App, tenant_id: &str, params: &Params) -> Result<Response, ApiError> {
    let criteria = build_events_criteria(params)?;
    let interval = watch::watch_interval(params, app.watch_interval)?;
    let feed = watch::EventsFeed {
        service: app.alerts.clone(),
        tenant_id: tenant_id.to_string(),
        criteria,
    };
    Ok(watch::stream_response(feed, interval))
}

async fn get_event(
    app: &App,
    tenant_id: &str,
    event_id: &str,
    params: &Params,
) -> Result<Response, ApiError> {
    let thin = params::flag(params, PARAM_THIN);
    let Some(event) = app.alerts.get_event(tenant_id, event_id, thin).await? else {
        return Err(ApiError::not_found(format!("eventId: {event_id} not found")));
    };
    Ok(ok(&event))
}

async fn add_tags(app: &App, tenant_id: &str, params: &Params) -> Result<Response, ApiError> {
    let event_ids = params::csv(params, PARAM_EVENT_IDS);
    let tags = params::first(params, PARAM_TAGS);
    let (false, Some(tags)) = (event_ids.is_empty(), tags) else {
        return Err(ApiError::bad_request(
            "EventIds and Tags required for adding tags",
        ));
    };
    let tags = parse_tags(tags)?;
    app.alerts.add_event_tags(tenant_id, &event_ids, tags).await?;
    tracing::debug!(tenant_id, count = event_ids.len(), "tagged events");
    Ok(ok_empty())
}

async fn remove_tags(app: &App, tenant_id: &str, params: &Params) -> Result<Response, ApiError> {
    let event_ids = params::csv(params, PARAM_EVENT_IDS);
    let tag_names = params::csv(params, PARAM_TAG_NAMES);
    if event_ids.is_empty() || tag_names.is_empty() {
        return Err(ApiError::bad_request(
            "EventIds and Tags required for removing tags",
        ));
    }
    app.alerts
        .remove_event_tags(tenant_id, &event_ids, &tag_names)
        .await?;
    tracing::debug!(tenant_id, count = event_ids.len(), "untagged events");
    Ok(ok_empty())
}

async fn delete_events(app: &App, tenant_id: &str, params: &Params) -> Result<Response, ApiError> {
    let criteria = build_events_criteria(params)?;
    let deleted = app.alerts.delete_events(tenant_id, &criteria).await?;
    tracing::debug!(tenant_id, deleted, "deleted events");
    Ok(ok_deleted(deleted))
}
