//! Request-level tests of the manual router: every call goes through the
//! full axum dispatch, so route priority, tenant gating, and response
//! envelopes are exercised exactly as a client sees them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};
use tower::ServiceExt;

use models::{Page, Pager};
use services::{AlertsService, StandaloneStore};

use super::{build_router, App, TENANT_HEADER};

const TENANT: &str = "test-tenant";

fn test_app() -> (axum::Router, Arc<StandaloneStore>) {
    let store = Arc::new(StandaloneStore::new());
    store.register_plugin("email", ["to", "from"]);
    let app = Arc::new(App {
        definitions: store.clone(),
        alerts: store.clone(),
        actions: store.clone(),
        watch_interval: std::time::Duration::from_secs(1),
    });
    (build_router(app), store)
}

async fn send(
    router: &axum::Router,
    method: &str,
    uri: &str,
    tenant: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, HeaderMap, serde_json::Value) {
    let mut request = axum::http::Request::builder().method(method).uri(uri);
    if let Some(tenant) = tenant {
        request = request.header(TENANT_HEADER, tenant);
    }
    let body = match body {
        Some(value) => axum::body::Body::from(value.to_string()),
        None => axum::body::Body::empty(),
    };
    let response = router
        .clone()
        .oneshot(request.body(body).expect("request builds"))
        .await
        .expect("infallible");

    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("body is JSON")
    };
    (status, headers, json)
}

fn error_msg(body: &serde_json::Value) -> &str {
    body["errorMsg"].as_str().unwrap_or_default()
}

#[tokio::test]
async fn missing_tenant_is_rejected_for_every_family() {
    let (router, _store) = test_app();
    let probes = [
        ("GET", "/triggers"),
        ("GET", "/alerts"),
        ("GET", "/events"),
        ("GET", "/actions"),
        ("GET", "/plugins"),
        ("GET", "/export"),
        ("POST", "/import/all"),
    ];
    for (method, uri) in probes {
        let (status, _, body) = send(&router, method, uri, None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{method} {uri}");
        assert!(
            error_msg(&body).contains(TENANT_HEADER),
            "{method} {uri}: {body}"
        );

        // A present-but-blank header is the same client error.
        let (status, _, _) = send(&router, method, uri, Some("  "), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{method} {uri} blank");
    }
}

/// ActionsService fake that counts calls, proving the tenant rejection
/// happens before any backing-service call.
#[derive(Default)]
struct CountingActions {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl services::ActionsService for CountingActions {
    async fn get_actions(
        &self,
        _tenant_id: &str,
        _criteria: &models::ActionsCriteria,
        pager: &Pager,
    ) -> Result<Page<models::Action>, services::ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Page::slice(Vec::new(), pager))
    }

    async fn delete_actions(
        &self,
        _tenant_id: &str,
        _criteria: &models::ActionsCriteria,
    ) -> Result<usize, services::ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(0)
    }
}

#[tokio::test]
async fn tenant_rejection_precedes_backing_service_calls() {
    let store = Arc::new(StandaloneStore::new());
    let counting = Arc::new(CountingActions::default());
    let app = Arc::new(App {
        definitions: store.clone(),
        alerts: store,
        actions: counting.clone(),
        watch_interval: std::time::Duration::from_secs(1),
    });
    let router = build_router(app);

    let (status, _, _) = send(&router, "GET", "/actions/history", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(counting.calls.load(Ordering::SeqCst), 0);

    let (status, _, _) = send(&router, "GET", "/actions/history", Some(TENANT), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unmatched_shapes_name_the_method_and_path() {
    let (router, _store) = test_app();
    for (method, uri, path) in [
        ("GET", "/nope", "/nope"),
        ("PATCH", "/triggers", "/triggers"),
        ("POST", "/triggers/a/b/c/d/e", "/triggers/a/b/c/d/e"),
        ("GET", "/alerts/bogus/extra/more", "/alerts/bogus/extra/more"),
    ] {
        let (status, _, body) = send(&router, method, uri, Some(TENANT), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{method} {uri}");
        let msg = error_msg(&body);
        assert!(
            msg.contains(method) && msg.contains(path),
            "{method} {uri}: {msg}"
        );
    }
}

#[tokio::test]
async fn literal_tokens_beat_dynamic_segments() {
    let (router, _store) = test_app();

    // `/trigger` and `/groups` are literal route tokens, not trigger ids.
    let full = serde_json::json!({
        "trigger": {"id": "full-1", "name": "full trigger"},
        "conditions": [
            {"dataId": "cpu", "type": "THRESHOLD", "operator": "GT", "threshold": 90.0}
        ],
    });
    let (status, _, _) = send(&router, "POST", "/triggers/trigger", Some(TENANT), Some(full)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, body) =
        send(&router, "GET", "/triggers/trigger/full-1", Some(TENANT), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["trigger"]["id"], "full-1");
    assert_eq!(body["conditions"][0]["dataId"], "cpu");

    // A plain get of the same id goes through the dynamic arm.
    let (status, _, body) = send(&router, "GET", "/triggers/full-1", Some(TENANT), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "full-1");

    // `PUT /triggers/enabled` is bulk enablement, not an update of a
    // trigger with id "enabled".
    let (status, _, _) = send(
        &router,
        "PUT",
        "/triggers/enabled?triggerIds=full-1&enabled=true",
        Some(TENANT),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, _, body) = send(&router, "GET", "/triggers/full-1", Some(TENANT), None).await;
    assert_eq!(body["enabled"], true);
}

#[tokio::test]
async fn trigger_crud_contract() {
    let (router, _store) = test_app();
    let trigger = serde_json::json!({"id": "t1", "name": "one"});

    let (status, _, _) = send(&router, "POST", "/triggers", Some(TENANT), Some(trigger.clone())).await;
    assert_eq!(status, StatusCode::OK);

    // Duplicate create is a client error, not an overwrite.
    let (status, _, body) = send(&router, "POST", "/triggers", Some(TENANT), Some(trigger)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_msg(&body).contains("t1"));

    // Update of a non-existent id is not an implicit create.
    let (status, _, _) = send(
        &router,
        "PUT",
        "/triggers/missing",
        Some(TENANT),
        Some(serde_json::json!({"name": "ghost"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // First delete succeeds; the second is a not-found.
    let (status, _, _) = send(&router, "DELETE", "/triggers/t1", Some(TENANT), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(&router, "DELETE", "/triggers/t1", Some(TENANT), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn paginated_responses_carry_link_and_total_count() {
    let (router, _store) = test_app();
    for i in 0..5 {
        let body = serde_json::json!({"id": format!("t{i}"), "name": format!("trigger {i}")});
        let (status, _, _) = send(&router, "POST", "/triggers", Some(TENANT), Some(body)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, headers, body) = send(
        &router,
        "GET",
        "/triggers?page=0&per_page=2",
        Some(TENANT),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
    assert_eq!(headers["X-Total-Count"], "5");
    let link = headers["link"].to_str().unwrap();
    assert!(link.contains(r#"rel="current""#), "{link}");
    assert!(link.contains(r#"rel="next""#), "{link}");
    assert!(link.contains(r#"rel="last""#), "{link}");
    assert!(!link.contains(r#"rel="prev""#), "{link}");

    // Unlimited queries return everything with no pagination headers.
    let (status, headers, body) = send(&router, "GET", "/triggers", Some(TENANT), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 5);
    assert!(!headers.contains_key("link"));
    assert!(!headers.contains_key("X-Total-Count"));
}

#[tokio::test]
async fn dampening_update_returns_the_updated_policy() {
    let (router, _store) = test_app();
    let (status, _, _) = send(
        &router,
        "POST",
        "/triggers",
        Some(TENANT),
        Some(serde_json::json!({"id": "t1", "name": "one"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let dampening = serde_json::json!({
        "triggerMode": "FIRING",
        "type": "STRICT",
        "evalTrueSetting": 2,
    });
    let (status, _, body) = send(
        &router,
        "POST",
        "/triggers/t1/dampenings",
        Some(TENANT),
        Some(dampening),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dampeningId"], "t1-FIRING");

    // A successful update returns the updated dampening, not a not-found.
    let updated = serde_json::json!({
        "triggerMode": "FIRING",
        "type": "STRICT",
        "evalTrueSetting": 4,
    });
    let (status, _, body) = send(
        &router,
        "PUT",
        "/triggers/t1/dampenings/t1-FIRING",
        Some(TENANT),
        Some(updated.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["evalTrueSetting"], 4);

    // Not-found applies only when the dampening really is absent.
    let (status, _, _) = send(
        &router,
        "PUT",
        "/triggers/t1/dampenings/t1-AUTORESOLVE",
        Some(TENANT),
        Some(updated),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn condition_mode_must_agree_with_the_path() {
    let (router, _store) = test_app();
    send(
        &router,
        "POST",
        "/triggers",
        Some(TENANT),
        Some(serde_json::json!({"id": "t1", "name": "one"})),
    )
    .await;

    let conditions = serde_json::json!([{
        "dataId": "cpu",
        "type": "THRESHOLD",
        "operator": "GT",
        "threshold": 90.0,
        "triggerMode": "AUTORESOLVE",
    }]);
    let (status, _, body) = send(
        &router,
        "PUT",
        "/triggers/t1/conditions/FIRING",
        Some(TENANT),
        Some(conditions.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_msg(&body).contains("triggerMode"));

    let (status, _, body) = send(
        &router,
        "PUT",
        "/triggers/t1/conditions/AUTORESOLVE",
        Some(TENANT),
        Some(conditions),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["conditionSetSize"], 1);

    // An invalid mode segment is a client error, not a server fault.
    let (status, _, _) = send(
        &router,
        "PUT",
        "/triggers/t1/conditions/RESOLVED",
        Some(TENANT),
        Some(serde_json::json!([])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn event_create_validates_and_rejects_duplicates() {
    let (router, _store) = test_app();

    let (status, _, body) = send(
        &router,
        "POST",
        "/events",
        Some(TENANT),
        Some(serde_json::json!({"id": "e1"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_msg(&body).contains("category"));

    let event = serde_json::json!({"id": "e1", "category": "DEPLOY", "text": "rolled out"});
    let (status, _, _) = send(&router, "POST", "/events", Some(TENANT), Some(event.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(&router, "POST", "/events", Some(TENANT), Some(event)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, body) = send(&router, "GET", "/events/event/e1", Some(TENANT), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["category"], "DEPLOY");
}

#[tokio::test]
async fn action_definitions_validate_before_the_backing_call() {
    let (router, _store) = test_app();

    let incomplete = serde_json::json!({"actionPlugin": "email", "actionId": "notify-ops"});
    let (status, _, body) = send(&router, "POST", "/actions", Some(TENANT), Some(incomplete)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_msg(&body).contains("properties"));

    let definition = serde_json::json!({
        "actionPlugin": "email",
        "actionId": "notify-ops",
        "properties": {"to": "ops@example.com"},
    });
    let (status, _, _) = send(&router, "POST", "/actions", Some(TENANT), Some(definition.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(&router, "POST", "/actions", Some(TENANT), Some(definition.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Update of an unknown definition is a not-found, not a create.
    let unknown = serde_json::json!({
        "actionPlugin": "email",
        "actionId": "unknown",
        "properties": {"to": "ops@example.com"},
    });
    let (status, _, _) = send(&router, "PUT", "/actions", Some(TENANT), Some(unknown)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, body) = send(&router, "GET", "/actions", Some(TENANT), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"][0], "notify-ops");

    let (status, _, _) = send(&router, "GET", "/plugins/email", Some(TENANT), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(&router, "GET", "/plugins/pager", Some(TENANT), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn export_import_round_trip() {
    let (router, _store) = test_app();
    send(
        &router,
        "POST",
        "/triggers",
        Some(TENANT),
        Some(serde_json::json!({"id": "t1", "name": "exported"})),
    )
    .await;

    let (status, _, exported) = send(&router, "GET", "/export", Some(TENANT), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(exported["triggers"].as_array().unwrap().len(), 1);

    let (status, _, _) = send(&router, "DELETE", "/triggers/t1", Some(TENANT), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = send(&router, "POST", "/import/all", Some(TENANT), Some(exported)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, body) = send(&router, "GET", "/triggers/t1", Some(TENANT), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "exported");

    // An unknown import strategy is a client error.
    let (status, _, _) = send(
        &router,
        "POST",
        "/import/sideways",
        Some(TENANT),
        Some(serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn status_needs_no_tenant() {
    let (router, _store) = test_app();
    let (status, _, body) = send(&router, "GET", "/status", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "STARTED");
}

#[tokio::test(start_paused = true)]
async fn watch_streams_alerts_as_json_lines() {
    use futures::StreamExt;

    let (router, store) = test_app();
    let request = axum::http::Request::builder()
        .method("GET")
        .uri("/alerts/watch?watchInterval=1&severities=CRITICAL")
        .header(TENANT_HEADER, TENANT)
        .body(axum::body::Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let mut frames = response.into_body().into_data_stream();

    let now = services::now_millis();
    store
        .add_alerts(vec![models::Alert {
            tenant_id: TENANT.to_string(),
            id: "critical-1".to_string(),
            ctime: now + 10,
            trigger_id: None,
            severity: models::Severity::Critical,
            status: models::Status::Open,
            ack_by: None,
            ack_time: None,
            ack_notes: None,
            resolved_by: None,
            resolved_time: None,
            resolved_notes: None,
            notes: Vec::new(),
            tags: Default::default(),
            context: Default::default(),
            trigger: None,
            eval_sets: None,
        }])
        .await
        .unwrap();

    let frame = frames.next().await.expect("stream open").expect("frame ok");
    let line = String::from_utf8(frame.to_vec()).unwrap();
    assert!(line.ends_with("\r\n"), "{line:?}");
    let alert: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
    assert_eq!(alert["id"], "critical-1");
    assert_eq!(alert["severity"], "CRITICAL");
}
