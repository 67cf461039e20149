//! The `/triggers` resource family: trigger CRUD, group templates and
//! their members, dampenings, and conditions.

use axum::response::Response;

use models::{
    Condition, Dampening, FullTrigger, GroupConditionsInfo, GroupMemberInfo, Mode, Trigger,
    UnorphanMemberInfo,
};

use super::criteria::build_triggers_criteria;
use super::paging::{extract_paging, paginated_ok};
use super::params::{self, Params};
use super::{ok, ok_empty, ApiError, ApiRequest, App};

const PARAM_KEEP_NON_ORPHANS: &str = "keepNonOrphans";
const PARAM_KEEP_ORPHANS: &str = "keepOrphans";
const PARAM_INCLUDE_ORPHANS: &str = "includeOrphans";
const PARAM_TRIGGER_IDS: &str = "triggerIds";
const PARAM_ENABLED: &str = "enabled";

pub async fn process(app: &App, req: ApiRequest) -> Result<Response, ApiError> {
    let tenant_id = req.require_tenant()?.to_string();
    let tokens = req.tokens();

    // Arm order mirrors the route table's priority: exact root, then
    // literal tokens, then dynamic segments, by increasing token count.
    // `/trigger`, `/groups` and `/enabled` are literal ids a plain
    // `/{triggerId}` pattern would otherwise capture.
    match (req.method.as_str(), tokens.as_slice()) {
        ("GET", []) => find_triggers(app, &tenant_id, &req).await,
        ("POST", []) => {
            create_trigger(app, &tenant_id, req.parse_body()?, false).await
        }
        ("POST", ["trigger"]) => {
            create_full_trigger(app, &tenant_id, req.parse_body()?).await
        }
        ("POST", ["groups"]) => {
            create_trigger(app, &tenant_id, req.parse_body()?, true).await
        }
        ("PUT", ["enabled"]) => {
            set_triggers_enabled(app, &tenant_id, &req.params, false).await
        }
        ("GET", [trigger_id]) => get_trigger(app, &tenant_id, trigger_id, false).await,
        ("PUT", [trigger_id]) => {
            update_trigger(app, &tenant_id, trigger_id, req.parse_body()?, false).await
        }
        ("DELETE", [trigger_id]) => delete_trigger(app, &tenant_id, trigger_id).await,

        ("GET", ["trigger", trigger_id]) => {
            get_trigger(app, &tenant_id, trigger_id, true).await
        }
        ("GET", [trigger_id, "dampenings"]) => {
            get_trigger_dampenings(app, &tenant_id, trigger_id, None).await
        }
        ("GET", [trigger_id, "conditions"]) => {
            get_trigger_conditions(app, &tenant_id, trigger_id).await
        }
        ("POST", ["groups", "members"]) => {
            create_group_member(app, &tenant_id, req.parse_body()?).await
        }
        ("POST", [trigger_id, "dampenings"]) => {
            create_dampening(app, &tenant_id, trigger_id, req.parse_body()?, false).await
        }
        ("PUT", ["groups", "enabled"]) => {
            set_triggers_enabled(app, &tenant_id, &req.params, true).await
        }
        ("PUT", ["groups", group_id]) => {
            update_trigger(app, &tenant_id, group_id, req.parse_body()?, true).await
        }
        ("PUT", [trigger_id, "conditions"]) => {
            set_conditions(app, &tenant_id, trigger_id, None, req.parse_body()?).await
        }
        ("DELETE", ["groups", group_id]) => {
            delete_group_trigger(app, &tenant_id, group_id, &req.params).await
        }

        ("GET", [trigger_id, "dampenings", dampening_id]) => {
            get_dampening(app, &tenant_id, trigger_id, dampening_id).await
        }
        ("GET", ["groups", group_id, "members"]) => {
            find_group_members(app, &tenant_id, group_id, &req.params).await
        }
        ("POST", ["groups", group_id, "dampenings"]) => {
            create_dampening(app, &tenant_id, group_id, req.parse_body()?, true).await
        }
        ("PUT", [trigger_id, "dampenings", dampening_id]) => {
            update_dampening(app, &tenant_id, trigger_id, dampening_id, req.parse_body()?, false)
                .await
        }
        ("PUT", [trigger_id, "conditions", mode]) => {
            let mode = mode.parse::<Mode>()?;
            set_conditions(app, &tenant_id, trigger_id, Some(mode), req.parse_body()?).await
        }
        ("PUT", ["groups", group_id, "conditions"]) => {
            set_group_conditions(app, &tenant_id, group_id, None, req.parse_body()?).await
        }
        ("DELETE", [trigger_id, "dampenings", dampening_id]) => {
            delete_dampening(app, &tenant_id, trigger_id, dampening_id, false).await
        }

        ("GET", [trigger_id, "dampenings", "mode", mode]) => {
            let mode = mode.parse::<Mode>()?;
            get_trigger_dampenings(app, &tenant_id, trigger_id, Some(mode)).await
        }
        ("POST", ["groups", "members", member_id, "orphan"]) => {
            orphan_member_trigger(app, &tenant_id, member_id).await
        }
        ("POST", ["groups", "members", member_id, "unorphan"]) => {
            unorphan_member_trigger(app, &tenant_id, member_id, req.parse_body()?).await
        }
        ("PUT", ["groups", group_id, "dampenings", dampening_id]) => {
            update_dampening(app, &tenant_id, group_id, dampening_id, req.parse_body()?, true)
                .await
        }
        ("PUT", ["groups", group_id, "conditions", mode]) => {
            let mode = mode.parse::<Mode>()?;
            set_group_conditions(app, &tenant_id, group_id, Some(mode), req.parse_body()?).await
        }
        ("DELETE", ["groups", group_id, "dampenings", dampening_id]) => {
            delete_dampening(app, &tenant_id, group_id, dampening_id, true).await
        }

        _ => Err(req.wrong_path()),
    }
}

async fn find_triggers(app: &App, tenant_id: &str, req: &ApiRequest) -> Result<Response, ApiError> {
    let pager = extract_paging(&req.params)?;
    let criteria = build_triggers_criteria(&req.params)?;
    let page = app.definitions.get_triggers(tenant_id, &criteria, &pager).await?;
    tracing::debug!(tenant_id, total = page.total_size, "triggers");
    Ok(paginated_ok(page, &req.uri))
}

async fn create_trigger(
    app: &App,
    tenant_id: &str,
    mut trigger: Trigger,
    is_group: bool,
) -> Result<Response, ApiError> {
    trigger.tenant_id = tenant_id.to_string();
    if trigger.id.is_empty() {
        trigger.id = Trigger::generate_id();
    } else if app
        .definitions
        .get_trigger(tenant_id, &trigger.id)
        .await?
        .is_some()
    {
        return Err(ApiError::bad_request(format!(
            "Trigger with ID [{}] exists.",
            trigger.id
        )));
    }
    if !Trigger::check_tags(&trigger.tags) {
        return Err(ApiError::bad_request(format!(
            "Tags {:?} must be non empty.",
            trigger.tags
        )));
    }
    if is_group {
        app.definitions.add_group_trigger(tenant_id, trigger.clone()).await?;
    } else {
        app.definitions.add_trigger(tenant_id, trigger.clone()).await?;
    }
    tracing::debug!(tenant_id, trigger_id = %trigger.id, "created trigger");
    Ok(ok(&trigger))
}

async fn create_full_trigger(
    app: &App,
    tenant_id: &str,
    mut full: FullTrigger,
) -> Result<Response, ApiError> {
    let trigger = &mut full.trigger;
    trigger.tenant_id = tenant_id.to_string();
    if trigger.id.is_empty() {
        trigger.id = Trigger::generate_id();
    } else if app
        .definitions
        .get_trigger(tenant_id, &trigger.id)
        .await?
        .is_some()
    {
        return Err(ApiError::bad_request(format!(
            "Trigger with ID [{}] exists.",
            trigger.id
        )));
    }
    if !Trigger::check_tags(&trigger.tags) {
        return Err(ApiError::bad_request(format!(
            "Tags {:?} must be non empty.",
            trigger.tags
        )));
    }
    let trigger_id = trigger.id.clone();
    app.definitions
        .add_trigger(tenant_id, full.trigger.clone())
        .await?;

    for dampening in &mut full.dampenings {
        dampening.tenant_id = tenant_id.to_string();
        dampening.trigger_id = trigger_id.clone();
        let dampening_id = Dampening::derive_id(&trigger_id, dampening.trigger_mode);
        if app
            .definitions
            .get_dampening(tenant_id, &dampening_id)
            .await?
            .is_some()
        {
            app.definitions.remove_dampening(tenant_id, &dampening_id).await?;
        }
        *dampening = app
            .definitions
            .add_dampening(tenant_id, dampening.clone())
            .await?;
    }

    for condition in &mut full.conditions {
        condition.tenant_id = tenant_id.to_string();
        condition.trigger_id = trigger_id.clone();
    }
    let (firing, autoresolve) = split_by_mode(full.conditions.clone());
    let mut updated = Vec::new();
    if !firing.is_empty() {
        updated.extend(
            app.definitions
                .set_conditions(tenant_id, &trigger_id, Mode::Firing, firing)
                .await?,
        );
    }
    if !autoresolve.is_empty() {
        updated.extend(
            app.definitions
                .set_conditions(tenant_id, &trigger_id, Mode::Autoresolve, autoresolve)
                .await?,
        );
    }
    full.conditions = updated;
    tracing::debug!(tenant_id, trigger_id = %trigger_id, "created full trigger");
    Ok(ok(&full))
}

async fn create_group_member(
    app: &App,
    tenant_id: &str,
    member: GroupMemberInfo,
) -> Result<Response, ApiError> {
    if member.group_id.is_empty() {
        return Err(ApiError::bad_request("MemberTrigger groupId is null"));
    }
    if !Trigger::check_tags(&member.member_tags) {
        return Err(ApiError::bad_request(format!(
            "Tags {:?} must be non empty.",
            member.member_tags
        )));
    }
    let child = app.definitions.add_member_trigger(tenant_id, member).await?;
    tracing::debug!(tenant_id, member_id = %child.id, "created member trigger");
    Ok(ok(&child))
}

async fn get_trigger(
    app: &App,
    tenant_id: &str,
    trigger_id: &str,
    full: bool,
) -> Result<Response, ApiError> {
    let Some(trigger) = app.definitions.get_trigger(tenant_id, trigger_id).await? else {
        return Err(ApiError::not_found(format!(
            "triggerId: {trigger_id} not found"
        )));
    };
    if full {
        let dampenings = app
            .definitions
            .get_trigger_dampenings(tenant_id, trigger_id, None)
            .await?;
        let conditions = app
            .definitions
            .get_trigger_conditions(tenant_id, trigger_id, None)
            .await?;
        return Ok(ok(&FullTrigger {
            trigger,
            dampenings,
            conditions,
        }));
    }
    Ok(ok(&trigger))
}

async fn update_trigger(
    app: &App,
    tenant_id: &str,
    trigger_id: &str,
    mut trigger: Trigger,
    is_group: bool,
) -> Result<Response, ApiError> {
    trigger.id = trigger_id.to_string();
    if !Trigger::check_tags(&trigger.tags) {
        return Err(ApiError::bad_request(format!(
            "Tags {:?} must be non empty.",
            trigger.tags
        )));
    }
    if is_group {
        app.definitions.update_group_trigger(tenant_id, trigger).await?;
    } else {
        app.definitions.update_trigger(tenant_id, trigger).await?;
    }
    tracing::debug!(tenant_id, trigger_id, "updated trigger");
    Ok(ok_empty())
}

async fn delete_trigger(app: &App, tenant_id: &str, trigger_id: &str) -> Result<Response, ApiError> {
    app.definitions.remove_trigger(tenant_id, trigger_id).await?;
    tracing::debug!(tenant_id, trigger_id, "removed trigger");
    Ok(ok_empty())
}

async fn delete_group_trigger(
    app: &App,
    tenant_id: &str,
    group_id: &str,
    params: &Params,
) -> Result<Response, ApiError> {
    let keep_non_orphans = params::flag(params, PARAM_KEEP_NON_ORPHANS);
    let keep_orphans = params::flag(params, PARAM_KEEP_ORPHANS);
    app.definitions
        .remove_group_trigger(tenant_id, group_id, keep_non_orphans, keep_orphans)
        .await?;
    tracing::debug!(tenant_id, group_id, keep_non_orphans, keep_orphans, "removed group trigger");
    Ok(ok_empty())
}

async fn set_triggers_enabled(
    app: &App,
    tenant_id: &str,
    params: &Params,
    is_group: bool,
) -> Result<Response, ApiError> {
    let trigger_ids = params::csv(params, PARAM_TRIGGER_IDS);
    if trigger_ids.is_empty() {
        return Err(ApiError::bad_request("TriggerIds must be non empty."));
    }
    let Some(enabled) = params::parse_bool(params, PARAM_ENABLED) else {
        return Err(ApiError::bad_request("Enabled must be non-empty."));
    };
    if is_group {
        app.definitions
            .update_group_trigger_enablement(tenant_id, &trigger_ids, enabled)
            .await?;
    } else {
        app.definitions
            .update_trigger_enablement(tenant_id, &trigger_ids, enabled)
            .await?;
    }
    Ok(ok_empty())
}

async fn find_group_members(
    app: &App,
    tenant_id: &str,
    group_id: &str,
    params: &Params,
) -> Result<Response, ApiError> {
    let include_orphans = params::flag(params, PARAM_INCLUDE_ORPHANS);
    let members = app
        .definitions
        .get_member_triggers(tenant_id, group_id, include_orphans)
        .await?;
    Ok(ok(&members))
}

async fn orphan_member_trigger(
    app: &App,
    tenant_id: &str,
    member_id: &str,
) -> Result<Response, ApiError> {
    let child = app.definitions.orphan_member_trigger(tenant_id, member_id).await?;
    tracing::debug!(tenant_id, member_id = %child.id, "orphaned member trigger");
    Ok(ok_empty())
}

async fn unorphan_member_trigger(
    app: &App,
    tenant_id: &str,
    member_id: &str,
    info: UnorphanMemberInfo,
) -> Result<Response, ApiError> {
    if !Trigger::check_tags(&info.member_tags) {
        return Err(ApiError::bad_request(format!(
            "Tags {:?} must be non empty.",
            info.member_tags
        )));
    }
    let child = app
        .definitions
        .unorphan_member_trigger(tenant_id, member_id, info)
        .await?;
    tracing::debug!(tenant_id, member_id = %child.id, "unorphaned member trigger");
    Ok(ok_empty())
}

async fn get_trigger_dampenings(
    app: &App,
    tenant_id: &str,
    trigger_id: &str,
    mode: Option<Mode>,
) -> Result<Response, ApiError> {
    let dampenings = app
        .definitions
        .get_trigger_dampenings(tenant_id, trigger_id, mode)
        .await?;
    Ok(ok(&dampenings))
}

async fn get_dampening(
    app: &App,
    tenant_id: &str,
    trigger_id: &str,
    dampening_id: &str,
) -> Result<Response, ApiError> {
    let Some(found) = app.definitions.get_dampening(tenant_id, dampening_id).await? else {
        return Err(ApiError::not_found(format!(
            "No dampening found for triggerId: {trigger_id} and dampeningId: {dampening_id}"
        )));
    };
    Ok(ok(&found))
}

async fn create_dampening(
    app: &App,
    tenant_id: &str,
    trigger_id: &str,
    mut dampening: Dampening,
    is_group: bool,
) -> Result<Response, ApiError> {
    dampening.tenant_id = tenant_id.to_string();
    dampening.trigger_id = trigger_id.to_string();
    let dampening_id = Dampening::derive_id(trigger_id, dampening.trigger_mode);
    if app
        .definitions
        .get_dampening(tenant_id, &dampening_id)
        .await?
        .is_some()
    {
        return Err(ApiError::bad_request(format!(
            "Existing dampening for dampeningId: {dampening_id}"
        )));
    }
    let created = if is_group {
        app.definitions.add_group_dampening(tenant_id, dampening).await?
    } else {
        app.definitions.add_dampening(tenant_id, dampening).await?
    };
    tracing::debug!(tenant_id, dampening_id = %created.dampening_id, "created dampening");
    Ok(ok(&created))
}

/// Update an existing dampening. Success returns the updated dampening;
/// not-found applies only when the dampening id is actually absent.
async fn update_dampening(
    app: &App,
    tenant_id: &str,
    trigger_id: &str,
    dampening_id: &str,
    mut dampening: Dampening,
    is_group: bool,
) -> Result<Response, ApiError> {
    if app
        .definitions
        .get_dampening(tenant_id, dampening_id)
        .await?
        .is_none()
    {
        return Err(ApiError::not_found(format!(
            "No dampening found for dampeningId: {dampening_id}"
        )));
    }
    dampening.tenant_id = tenant_id.to_string();
    dampening.trigger_id = trigger_id.to_string();
    let updated = if is_group {
        app.definitions.update_group_dampening(tenant_id, dampening).await?
    } else {
        app.definitions.update_dampening(tenant_id, dampening).await?
    };
    tracing::debug!(tenant_id, dampening_id = %updated.dampening_id, "updated dampening");
    Ok(ok(&updated))
}

async fn delete_dampening(
    app: &App,
    tenant_id: &str,
    trigger_id: &str,
    dampening_id: &str,
    is_group: bool,
) -> Result<Response, ApiError> {
    if app
        .definitions
        .get_dampening(tenant_id, dampening_id)
        .await?
        .is_none()
    {
        return Err(ApiError::not_found(format!(
            "Dampening {dampening_id} not found for triggerId: {trigger_id}"
        )));
    }
    if is_group {
        app.definitions.remove_group_dampening(tenant_id, dampening_id).await?;
    } else {
        app.definitions.remove_dampening(tenant_id, dampening_id).await?;
    }
    tracing::debug!(tenant_id, dampening_id, "removed dampening");
    Ok(ok_empty())
}

async fn get_trigger_conditions(
    app: &App,
    tenant_id: &str,
    trigger_id: &str,
) -> Result<Response, ApiError> {
    let conditions = app
        .definitions
        .get_trigger_conditions(tenant_id, trigger_id, None)
        .await?;
    Ok(ok(&conditions))
}

/// Partition a condition payload by mode; an absent mode means firing.
fn split_by_mode(conditions: Vec<Condition>) -> (Vec<Condition>, Vec<Condition>) {
    conditions
        .into_iter()
        .partition(|condition| condition.mode() == Mode::Firing)
}

/// Conditions whose explicit mode disagrees with a mode path segment are
/// rejected before anything is forwarded.
fn check_modes(conditions: &[Condition], mode: Mode) -> Result<(), ApiError> {
    for condition in conditions {
        if condition.trigger_mode != Some(mode) {
            return Err(ApiError::bad_request(format!(
                "Condition {} has a different triggerMode [{mode}]",
                condition.data_id
            )));
        }
    }
    Ok(())
}

async fn set_conditions(
    app: &App,
    tenant_id: &str,
    trigger_id: &str,
    mode: Option<Mode>,
    mut conditions: Vec<Condition>,
) -> Result<Response, ApiError> {
    for condition in &mut conditions {
        condition.trigger_id = trigger_id.to_string();
    }
    match mode {
        None => {
            // Replace both mode-scoped sets atomically from the caller's
            // point of view; a mode absent from the payload is cleared.
            let (firing, autoresolve) = split_by_mode(conditions);
            let mut updated = app
                .definitions
                .set_conditions(tenant_id, trigger_id, Mode::Firing, firing)
                .await?;
            updated.extend(
                app.definitions
                    .set_conditions(tenant_id, trigger_id, Mode::Autoresolve, autoresolve)
                    .await?,
            );
            Ok(ok(&updated))
        }
        Some(mode) => {
            check_modes(&conditions, mode)?;
            let updated = app
                .definitions
                .set_conditions(tenant_id, trigger_id, mode, conditions)
                .await?;
            Ok(ok(&updated))
        }
    }
}

async fn set_group_conditions(
    app: &App,
    tenant_id: &str,
    group_id: &str,
    mode: Option<Mode>,
    mut info: GroupConditionsInfo,
) -> Result<Response, ApiError> {
    for condition in &mut info.conditions {
        condition.trigger_id = group_id.to_string();
    }
    let data_id_member_map = info.data_id_member_map;
    match mode {
        None => {
            let (firing, autoresolve) = split_by_mode(info.conditions);
            let mut updated = app
                .definitions
                .set_group_conditions(
                    tenant_id,
                    group_id,
                    Mode::Firing,
                    firing,
                    data_id_member_map.clone(),
                )
                .await?;
            updated.extend(
                app.definitions
                    .set_group_conditions(
                        tenant_id,
                        group_id,
                        Mode::Autoresolve,
                        autoresolve,
                        data_id_member_map,
                    )
                    .await?,
            );
            Ok(ok(&updated))
        }
        Some(mode) => {
            check_modes(&info.conditions, mode)?;
            let updated = app
                .definitions
                .set_group_conditions(tenant_id, group_id, mode, info.conditions, data_id_member_map)
                .await?;
            Ok(ok(&updated))
        }
    }
}
