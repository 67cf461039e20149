//! In-memory backing store.
//!
//! `StandaloneStore` implements all three service traits against maps held
//! under one `RwLock`. Locks are taken per operation and never held across
//! an await point; group mutations stage every derived member update first
//! and apply them within a single lock scope, so a failed validation leaves
//! the store untouched.

mod alerts;
mod definitions;
#[cfg(test)]
mod test;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use async_trait::async_trait;
use models::{
    Action, ActionsCriteria, Alert, AlertsCriteria, Condition, Dampening, Event, EventsCriteria,
    Mode, Order, Page, Pager, Trigger, TriggersCriteria, tags,
};

use super::{ActionsService, ServiceError};

type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Default)]
pub(crate) struct State {
    /// Keyed by (tenantId, triggerId).
    pub triggers: BTreeMap<(String, String), Trigger>,
    /// Keyed by (tenantId, dampeningId).
    pub dampenings: BTreeMap<(String, String), Dampening>,
    /// Keyed by (tenantId, triggerId, mode); each value is a full set.
    pub conditions: BTreeMap<(String, String, Mode), Vec<Condition>>,
    /// Keyed by (tenantId, alertId).
    pub alerts: BTreeMap<(String, String), Alert>,
    /// Keyed by (tenantId, eventId).
    pub events: BTreeMap<(String, String), Event>,
    /// Keyed by (tenantId, actionPlugin, actionId).
    pub action_definitions: BTreeMap<(String, String, String), models::ActionDefinition>,
    /// Action execution history, append-ordered.
    pub actions: Vec<Action>,
    /// Registered action plugins and their property names.
    pub plugins: BTreeMap<String, BTreeSet<String>>,
}

pub struct StandaloneStore {
    pub(crate) state: RwLock<State>,
}

impl Default for StandaloneStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StandaloneStore {
    pub fn new() -> StandaloneStore {
        StandaloneStore {
            state: RwLock::new(State::default()),
        }
    }

    /// Register the action plugins this deployment knows about.
    pub fn register_plugin(&self, name: &str, properties: impl IntoIterator<Item = &'static str>) {
        let mut state = self.state.write().unwrap();
        state.plugins.insert(
            name.to_string(),
            properties.into_iter().map(str::to_string).collect(),
        );
    }

    /// Append an action execution record. Called by the action dispatch
    /// subsystem; exposed here so deployments and tests can seed history.
    pub fn record_action(&self, action: Action) {
        let mut state = self.state.write().unwrap();
        state.actions.push(action);
    }
}

// Criteria evaluation and ordering over the in-memory maps. The backing
// engine owns the full tag-query grammar; `tags::matches_tag_query` covers
// the conjunctive subset produced by the `tags` parameter.

pub(crate) fn alert_matches(criteria: &AlertsCriteria, alert: &Alert) -> bool {
    if criteria.start_time.is_some_and(|start| alert.ctime < start) {
        return false;
    }
    if criteria.end_time.is_some_and(|end| alert.ctime > end) {
        return false;
    }
    if !criteria.alert_ids.is_empty() && !criteria.alert_ids.contains(&alert.id) {
        return false;
    }
    if !criteria.trigger_ids.is_empty() {
        match &alert.trigger_id {
            Some(id) if criteria.trigger_ids.contains(id) => {}
            _ => return false,
        }
    }
    if !criteria.statuses.is_empty() && !criteria.statuses.contains(&alert.status) {
        return false;
    }
    if !criteria.severities.is_empty() && !criteria.severities.contains(&alert.severity) {
        return false;
    }
    if let Some(query) = &criteria.tag_query {
        if !tags::matches_tag_query(query, &alert.tags) {
            return false;
        }
    }
    let in_window = |time: Option<i64>, start: Option<i64>, end: Option<i64>| match (start, end) {
        (None, None) => true,
        _ => time.is_some_and(|t| {
            start.map_or(true, |s| t >= s) && end.map_or(true, |e| t <= e)
        }),
    };
    if !in_window(
        alert.resolved_time,
        criteria.start_resolved_time,
        criteria.end_resolved_time,
    ) {
        return false;
    }
    if !in_window(alert.ack_time, criteria.start_ack_time, criteria.end_ack_time) {
        return false;
    }
    // Status time: the most recent lifecycle transition.
    let status_time = alert
        .resolved_time
        .or(alert.ack_time)
        .unwrap_or(alert.ctime);
    if criteria
        .start_status_time
        .is_some_and(|start| status_time < start)
        || criteria.end_status_time.is_some_and(|end| status_time > end)
    {
        return false;
    }
    true
}

pub(crate) fn event_matches(criteria: &EventsCriteria, event: &Event) -> bool {
    if criteria.start_time.is_some_and(|start| event.ctime < start) {
        return false;
    }
    if criteria.end_time.is_some_and(|end| event.ctime > end) {
        return false;
    }
    if !criteria.event_ids.is_empty() && !criteria.event_ids.contains(&event.id) {
        return false;
    }
    if !criteria.trigger_ids.is_empty() {
        match &event.trigger_id {
            Some(id) if criteria.trigger_ids.contains(id) => {}
            _ => return false,
        }
    }
    if !criteria.categories.is_empty() && !criteria.categories.contains(&event.category) {
        return false;
    }
    if let Some(query) = &criteria.tag_query {
        if !tags::matches_tag_query(query, &event.tags) {
            return false;
        }
    }
    true
}

pub(crate) fn trigger_matches(criteria: &TriggersCriteria, trigger: &Trigger) -> bool {
    if !criteria.trigger_ids.is_empty() && !criteria.trigger_ids.contains(&trigger.id) {
        return false;
    }
    criteria.tags.iter().all(|(key, value)| {
        trigger
            .tags
            .get(key)
            .is_some_and(|v| value == "*" || v == value)
    })
}

pub(crate) fn action_matches(criteria: &ActionsCriteria, action: &Action) -> bool {
    if criteria.start_time.is_some_and(|start| action.ctime < start) {
        return false;
    }
    if criteria.end_time.is_some_and(|end| action.ctime > end) {
        return false;
    }
    if !criteria.action_plugins.is_empty()
        && !criteria.action_plugins.contains(&action.action_plugin)
    {
        return false;
    }
    if !criteria.action_ids.is_empty() && !criteria.action_ids.contains(&action.action_id) {
        return false;
    }
    if !criteria.alert_ids.is_empty() && !criteria.alert_ids.contains(&action.event_id) {
        return false;
    }
    if !criteria.results.is_empty() {
        match &action.result {
            Some(result) if criteria.results.contains(result) => {}
            _ => return false,
        }
    }
    true
}

/// Order `items` by the pager's criteria. Each entity family exposes its
/// sortable fields through `key_of`; an unknown field is a client error.
pub(crate) fn sort_by_orders<T>(
    items: &mut [T],
    orders: &[Order],
    key_of: impl Fn(&T, &str) -> Option<SortKey>,
) -> Result<()> {
    use std::cmp::Ordering;

    for order in orders {
        // Probe the field name once, so bad sorts fail rather than silently
        // leaving the result unsorted.
        if let Some(item) = items.first() {
            if key_of(item, &order.field).is_none() {
                return Err(ServiceError::bad_argument(format!(
                    "unknown sort field '{}'",
                    order.field
                )));
            }
        }
    }

    items.sort_by(|a, b| {
        for order in orders {
            let ord = match (key_of(a, &order.field), key_of(b, &order.field)) {
                (Some(ka), Some(kb)) => ka.cmp(&kb),
                _ => Ordering::Equal,
            };
            let ord = match order.direction {
                models::Direction::Ascending => ord,
                models::Direction::Descending => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
    Ok(())
}

/// A totally-ordered sort key over the field types that appear in the model.
#[derive(PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum SortKey {
    Num(i64),
    Text(String),
}

pub(crate) fn paged<T>(
    mut items: Vec<T>,
    pager: &Pager,
    key_of: impl Fn(&T, &str) -> Option<SortKey>,
    default_field: &str,
) -> Result<Page<T>> {
    let orders = if pager.order.is_empty() {
        vec![Order::by(default_field, models::Direction::Ascending)]
    } else {
        pager.order.clone()
    };
    sort_by_orders(&mut items, &orders, key_of)?;
    Ok(Page::slice(items, pager))
}

#[async_trait]
impl ActionsService for StandaloneStore {
    async fn get_actions(
        &self,
        tenant_id: &str,
        criteria: &ActionsCriteria,
        pager: &Pager,
    ) -> Result<Page<Action>> {
        let state = self.state.read().unwrap();
        let matches: Vec<Action> = state
            .actions
            .iter()
            .filter(|action| action.tenant_id == tenant_id && action_matches(criteria, action))
            .cloned()
            .collect();
        drop(state);
        paged(matches, pager, action_sort_key, "ctime")
    }

    async fn delete_actions(&self, tenant_id: &str, criteria: &ActionsCriteria) -> Result<usize> {
        let mut state = self.state.write().unwrap();
        let before = state.actions.len();
        state
            .actions
            .retain(|action| !(action.tenant_id == tenant_id && action_matches(criteria, action)));
        Ok(before - state.actions.len())
    }
}

pub(crate) fn action_sort_key(action: &Action, field: &str) -> Option<SortKey> {
    match field {
        "ctime" => Some(SortKey::Num(action.ctime)),
        "actionPlugin" => Some(SortKey::Text(action.action_plugin.clone())),
        "actionId" => Some(SortKey::Text(action.action_id.clone())),
        "eventId" => Some(SortKey::Text(action.event_id.clone())),
        "result" => Some(SortKey::Text(action.result.clone().unwrap_or_default())),
        _ => None,
    }
}
