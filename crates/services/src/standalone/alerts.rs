use async_trait::async_trait;
use std::collections::BTreeMap;

use models::{
    Alert, AlertsCriteria, Data, Event, EventsCriteria, Page, Pager, Status,
};

use super::{alert_matches, event_matches, paged, SortKey, StandaloneStore};
use crate::{now_millis, AlertsService, ServiceError};

type Result<T> = std::result::Result<T, ServiceError>;

#[async_trait]
impl AlertsService for StandaloneStore {
    async fn get_alerts(
        &self,
        tenant_id: &str,
        criteria: &AlertsCriteria,
        pager: &Pager,
    ) -> Result<Page<Alert>> {
        let state = self.state.read().unwrap();
        let matches: Vec<Alert> = state
            .alerts
            .range((tenant_id.to_string(), String::new())..)
            .take_while(|((tenant, _), _)| tenant == tenant_id)
            .filter(|(_, alert)| alert_matches(criteria, alert))
            .map(|(_, alert)| alert.clone())
            .collect();
        drop(state);
        let page = paged(matches, pager, alert_sort_key, "ctime")?;
        Ok(if criteria.thin {
            page.map(Alert::thinned)
        } else {
            page
        })
    }

    async fn get_alert(
        &self,
        tenant_id: &str,
        alert_id: &str,
        thin: bool,
    ) -> Result<Option<Alert>> {
        let state = self.state.read().unwrap();
        let alert = state
            .alerts
            .get(&(tenant_id.to_string(), alert_id.to_string()))
            .cloned();
        Ok(if thin {
            alert.map(Alert::thinned)
        } else {
            alert
        })
    }

    async fn add_alerts(&self, alerts: Vec<Alert>) -> Result<()> {
        let mut state = self.state.write().unwrap();
        for mut alert in alerts {
            if alert.id.is_empty() {
                return Err(ServiceError::bad_argument("Alert with id null".to_string()));
            }
            if alert.ctime == 0 {
                alert.ctime = now_millis();
            }
            state
                .alerts
                .insert((alert.tenant_id.clone(), alert.id.clone()), alert);
        }
        Ok(())
    }

    async fn ack_alerts(
        &self,
        tenant_id: &str,
        alert_ids: &[String],
        ack_by: Option<String>,
        ack_notes: Option<String>,
    ) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let now = now_millis();
        for alert_id in alert_ids {
            let Some(alert) = state
                .alerts
                .get_mut(&(tenant_id.to_string(), alert_id.clone()))
            else {
                continue; // Acking a missing or already-deleted alert is a no-op.
            };
            if alert.status != Status::Open {
                continue;
            }
            alert.status = Status::Acknowledged;
            alert.ack_time = Some(now);
            alert.ack_by = ack_by.clone();
            alert.ack_notes = ack_notes.clone();
        }
        Ok(())
    }

    async fn resolve_alerts(
        &self,
        tenant_id: &str,
        alert_ids: &[String],
        resolved_by: Option<String>,
        resolved_notes: Option<String>,
    ) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let now = now_millis();
        for alert_id in alert_ids {
            let Some(alert) = state
                .alerts
                .get_mut(&(tenant_id.to_string(), alert_id.clone()))
            else {
                continue;
            };
            if alert.status == Status::Resolved {
                continue;
            }
            alert.status = Status::Resolved;
            alert.resolved_time = Some(now);
            alert.resolved_by = resolved_by.clone();
            alert.resolved_notes = resolved_notes.clone();
        }
        Ok(())
    }

    async fn add_note(
        &self,
        tenant_id: &str,
        alert_id: &str,
        user: Option<String>,
        text: Option<String>,
    ) -> Result<()> {
        let (Some(user), Some(text)) = (user, text) else {
            return Err(ServiceError::bad_argument(
                "user and text required for adding notes".to_string(),
            ));
        };
        let mut state = self.state.write().unwrap();
        let alert = state
            .alerts
            .get_mut(&(tenant_id.to_string(), alert_id.to_string()))
            .ok_or_else(|| ServiceError::not_found(format!("alertId: {alert_id} not found")))?;
        alert.notes.push(models::Note {
            user,
            ctime: now_millis(),
            text,
        });
        Ok(())
    }

    async fn add_alert_tags(
        &self,
        tenant_id: &str,
        alert_ids: &[String],
        tags: BTreeMap<String, String>,
    ) -> Result<()> {
        let mut state = self.state.write().unwrap();
        for alert_id in alert_ids {
            if let Some(alert) = state
                .alerts
                .get_mut(&(tenant_id.to_string(), alert_id.clone()))
            {
                alert.tags.extend(tags.clone());
            }
        }
        Ok(())
    }

    async fn remove_alert_tags(
        &self,
        tenant_id: &str,
        alert_ids: &[String],
        tag_names: &[String],
    ) -> Result<()> {
        let mut state = self.state.write().unwrap();
        for alert_id in alert_ids {
            if let Some(alert) = state
                .alerts
                .get_mut(&(tenant_id.to_string(), alert_id.clone()))
            {
                alert.tags.retain(|key, _| !tag_names.contains(key));
            }
        }
        Ok(())
    }

    async fn delete_alerts(&self, tenant_id: &str, criteria: &AlertsCriteria) -> Result<usize> {
        let mut state = self.state.write().unwrap();
        let before = state.alerts.len();
        state.alerts.retain(|(tenant, _), alert| {
            !(tenant == tenant_id && alert_matches(criteria, alert))
        });
        Ok(before - state.alerts.len())
    }

    async fn send_data(&self, data: Vec<Data>) -> Result<()> {
        if data.iter().any(|d| d.id.is_empty()) {
            return Err(ServiceError::bad_argument("Data with id null".to_string()));
        }
        // Evaluation is the engine's concern; the standalone store accepts
        // and drops datums so the ingestion path stays exercisable.
        tracing::debug!(count = data.len(), "discarding data, no engine attached");
        Ok(())
    }

    async fn get_events(
        &self,
        tenant_id: &str,
        criteria: &EventsCriteria,
        pager: &Pager,
    ) -> Result<Page<Event>> {
        let state = self.state.read().unwrap();
        let matches: Vec<Event> = state
            .events
            .range((tenant_id.to_string(), String::new())..)
            .take_while(|((tenant, _), _)| tenant == tenant_id)
            .filter(|(_, event)| event_matches(criteria, event))
            .map(|(_, event)| event.clone())
            .collect();
        drop(state);
        let page = paged(matches, pager, event_sort_key, "ctime")?;
        Ok(if criteria.thin {
            page.map(Event::thinned)
        } else {
            page
        })
    }

    async fn get_event(
        &self,
        tenant_id: &str,
        event_id: &str,
        thin: bool,
    ) -> Result<Option<Event>> {
        let state = self.state.read().unwrap();
        let event = state
            .events
            .get(&(tenant_id.to_string(), event_id.to_string()))
            .cloned();
        Ok(if thin {
            event.map(Event::thinned)
        } else {
            event
        })
    }

    async fn add_events(&self, events: Vec<Event>) -> Result<()> {
        let mut state = self.state.write().unwrap();
        for mut event in events {
            if event.id.is_empty() {
                return Err(ServiceError::bad_argument("Event with id null".to_string()));
            }
            if event.ctime == 0 {
                event.ctime = now_millis();
            }
            state
                .events
                .insert((event.tenant_id.clone(), event.id.clone()), event);
        }
        Ok(())
    }

    async fn send_events(&self, events: Vec<Event>) -> Result<()> {
        tracing::debug!(
            count = events.len(),
            "persisting events, evaluation skipped with no engine attached"
        );
        self.add_events(events).await
    }

    async fn delete_events(&self, tenant_id: &str, criteria: &EventsCriteria) -> Result<usize> {
        let mut state = self.state.write().unwrap();
        let before = state.events.len();
        state.events.retain(|(tenant, _), event| {
            !(tenant == tenant_id && event_matches(criteria, event))
        });
        Ok(before - state.events.len())
    }

    async fn add_event_tags(
        &self,
        tenant_id: &str,
        event_ids: &[String],
        tags: BTreeMap<String, String>,
    ) -> Result<()> {
        let mut state = self.state.write().unwrap();
        for event_id in event_ids {
            if let Some(event) = state
                .events
                .get_mut(&(tenant_id.to_string(), event_id.clone()))
            {
                event.tags.extend(tags.clone());
            }
        }
        Ok(())
    }

    async fn remove_event_tags(
        &self,
        tenant_id: &str,
        event_ids: &[String],
        tag_names: &[String],
    ) -> Result<()> {
        let mut state = self.state.write().unwrap();
        for event_id in event_ids {
            if let Some(event) = state
                .events
                .get_mut(&(tenant_id.to_string(), event_id.clone()))
            {
                event.tags.retain(|key, _| !tag_names.contains(key));
            }
        }
        Ok(())
    }
}

pub(crate) fn alert_sort_key(alert: &Alert, field: &str) -> Option<SortKey> {
    match field {
        "ctime" => Some(SortKey::Num(alert.ctime)),
        "severity" => Some(SortKey::Num(alert.severity as i64)),
        "status" => Some(SortKey::Num(alert.status as i64)),
        "id" | "alertId" => Some(SortKey::Text(alert.id.clone())),
        "triggerId" => Some(SortKey::Text(alert.trigger_id.clone().unwrap_or_default())),
        _ => None,
    }
}

pub(crate) fn event_sort_key(event: &Event, field: &str) -> Option<SortKey> {
    match field {
        "ctime" => Some(SortKey::Num(event.ctime)),
        "id" | "eventId" => Some(SortKey::Text(event.id.clone())),
        "category" => Some(SortKey::Text(event.category.clone())),
        "triggerId" => Some(SortKey::Text(event.trigger_id.clone().unwrap_or_default())),
        _ => None,
    }
}
