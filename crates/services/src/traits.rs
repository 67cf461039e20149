use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};

use models::{
    Action, ActionDefinition, ActionsCriteria, Alert, AlertsCriteria, Condition, Dampening, Data,
    Definitions, Event, EventsCriteria, GroupMemberInfo, ImportType, Mode, Page, Pager, Trigger,
    TriggersCriteria, UnorphanMemberInfo,
};

use super::ServiceError;

type Result<T> = std::result::Result<T, ServiceError>;

/// Trigger, dampening, condition, and action-definition management.
///
/// Group semantics: `add_member_trigger` instantiates a member from its
/// group template; `*_group_*` mutations propagate to every non-orphan
/// member; orphaned members are excluded from propagation until unorphaned.
#[async_trait]
pub trait DefinitionsService: Send + Sync {
    // Triggers.
    async fn get_triggers(
        &self,
        tenant_id: &str,
        criteria: &TriggersCriteria,
        pager: &Pager,
    ) -> Result<Page<Trigger>>;
    async fn get_trigger(&self, tenant_id: &str, trigger_id: &str) -> Result<Option<Trigger>>;
    async fn add_trigger(&self, tenant_id: &str, trigger: Trigger) -> Result<()>;
    async fn add_group_trigger(&self, tenant_id: &str, trigger: Trigger) -> Result<()>;
    async fn update_trigger(&self, tenant_id: &str, trigger: Trigger) -> Result<()>;
    async fn update_group_trigger(&self, tenant_id: &str, trigger: Trigger) -> Result<()>;
    async fn remove_trigger(&self, tenant_id: &str, trigger_id: &str) -> Result<()>;
    async fn remove_group_trigger(
        &self,
        tenant_id: &str,
        group_id: &str,
        keep_non_orphans: bool,
        keep_orphans: bool,
    ) -> Result<()>;
    async fn update_trigger_enablement(
        &self,
        tenant_id: &str,
        trigger_ids: &[String],
        enabled: bool,
    ) -> Result<()>;
    async fn update_group_trigger_enablement(
        &self,
        tenant_id: &str,
        group_ids: &[String],
        enabled: bool,
    ) -> Result<()>;

    // Group members.
    async fn get_member_triggers(
        &self,
        tenant_id: &str,
        group_id: &str,
        include_orphans: bool,
    ) -> Result<Vec<Trigger>>;
    async fn add_member_trigger(&self, tenant_id: &str, member: GroupMemberInfo)
        -> Result<Trigger>;
    async fn orphan_member_trigger(&self, tenant_id: &str, member_id: &str) -> Result<Trigger>;
    async fn unorphan_member_trigger(
        &self,
        tenant_id: &str,
        member_id: &str,
        info: UnorphanMemberInfo,
    ) -> Result<Trigger>;

    // Dampenings.
    async fn get_trigger_dampenings(
        &self,
        tenant_id: &str,
        trigger_id: &str,
        mode: Option<Mode>,
    ) -> Result<Vec<Dampening>>;
    async fn get_dampening(&self, tenant_id: &str, dampening_id: &str)
        -> Result<Option<Dampening>>;
    async fn add_dampening(&self, tenant_id: &str, dampening: Dampening) -> Result<Dampening>;
    async fn add_group_dampening(&self, tenant_id: &str, dampening: Dampening)
        -> Result<Dampening>;
    async fn update_dampening(&self, tenant_id: &str, dampening: Dampening) -> Result<Dampening>;
    async fn update_group_dampening(
        &self,
        tenant_id: &str,
        dampening: Dampening,
    ) -> Result<Dampening>;
    async fn remove_dampening(&self, tenant_id: &str, dampening_id: &str) -> Result<()>;
    async fn remove_group_dampening(&self, tenant_id: &str, dampening_id: &str) -> Result<()>;

    // Conditions.
    async fn get_trigger_conditions(
        &self,
        tenant_id: &str,
        trigger_id: &str,
        mode: Option<Mode>,
    ) -> Result<Vec<Condition>>;
    async fn set_conditions(
        &self,
        tenant_id: &str,
        trigger_id: &str,
        mode: Mode,
        conditions: Vec<Condition>,
    ) -> Result<Vec<Condition>>;
    async fn set_group_conditions(
        &self,
        tenant_id: &str,
        group_id: &str,
        mode: Mode,
        conditions: Vec<Condition>,
        data_id_member_map: BTreeMap<String, BTreeMap<String, String>>,
    ) -> Result<Vec<Condition>>;

    // Action definitions and plugins.
    async fn get_action_definition_ids(
        &self,
        tenant_id: &str,
    ) -> Result<BTreeMap<String, BTreeSet<String>>>;
    async fn get_action_definition_ids_by_plugin(
        &self,
        tenant_id: &str,
        action_plugin: &str,
    ) -> Result<Vec<String>>;
    async fn get_action_definition(
        &self,
        tenant_id: &str,
        action_plugin: &str,
        action_id: &str,
    ) -> Result<Option<ActionDefinition>>;
    async fn add_action_definition(
        &self,
        tenant_id: &str,
        definition: ActionDefinition,
    ) -> Result<()>;
    async fn update_action_definition(
        &self,
        tenant_id: &str,
        definition: ActionDefinition,
    ) -> Result<()>;
    async fn remove_action_definition(
        &self,
        tenant_id: &str,
        action_plugin: &str,
        action_id: &str,
    ) -> Result<()>;
    async fn get_action_plugins(&self) -> Result<Vec<String>>;
    async fn get_action_plugin(&self, name: &str) -> Result<Option<BTreeSet<String>>>;

    // Import/export.
    async fn export_definitions(&self, tenant_id: &str) -> Result<Definitions>;
    async fn import_definitions(
        &self,
        tenant_id: &str,
        definitions: Definitions,
        strategy: ImportType,
    ) -> Result<Definitions>;
}

/// Alert and event queries and lifecycle operations, plus the ingestion
/// entry points feeding the evaluation engine.
#[async_trait]
pub trait AlertsService: Send + Sync {
    async fn get_alerts(
        &self,
        tenant_id: &str,
        criteria: &AlertsCriteria,
        pager: &Pager,
    ) -> Result<Page<Alert>>;
    async fn get_alert(&self, tenant_id: &str, alert_id: &str, thin: bool)
        -> Result<Option<Alert>>;
    async fn add_alerts(&self, alerts: Vec<Alert>) -> Result<()>;
    async fn ack_alerts(
        &self,
        tenant_id: &str,
        alert_ids: &[String],
        ack_by: Option<String>,
        ack_notes: Option<String>,
    ) -> Result<()>;
    async fn resolve_alerts(
        &self,
        tenant_id: &str,
        alert_ids: &[String],
        resolved_by: Option<String>,
        resolved_notes: Option<String>,
    ) -> Result<()>;
    async fn add_note(
        &self,
        tenant_id: &str,
        alert_id: &str,
        user: Option<String>,
        text: Option<String>,
    ) -> Result<()>;
    async fn add_alert_tags(
        &self,
        tenant_id: &str,
        alert_ids: &[String],
        tags: BTreeMap<String, String>,
    ) -> Result<()>;
    async fn remove_alert_tags(
        &self,
        tenant_id: &str,
        alert_ids: &[String],
        tag_names: &[String],
    ) -> Result<()>;
    async fn delete_alerts(&self, tenant_id: &str, criteria: &AlertsCriteria) -> Result<usize>;

    async fn send_data(&self, data: Vec<Data>) -> Result<()>;

    async fn get_events(
        &self,
        tenant_id: &str,
        criteria: &EventsCriteria,
        pager: &Pager,
    ) -> Result<Page<Event>>;
    async fn get_event(&self, tenant_id: &str, event_id: &str, thin: bool)
        -> Result<Option<Event>>;
    /// Persist events without pushing them through the evaluation pipeline.
    async fn add_events(&self, events: Vec<Event>) -> Result<()>;
    /// Persist events and feed them to the evaluation pipeline.
    async fn send_events(&self, events: Vec<Event>) -> Result<()>;
    async fn delete_events(&self, tenant_id: &str, criteria: &EventsCriteria) -> Result<usize>;
    async fn add_event_tags(
        &self,
        tenant_id: &str,
        event_ids: &[String],
        tags: BTreeMap<String, String>,
    ) -> Result<()>;
    async fn remove_event_tags(
        &self,
        tenant_id: &str,
        event_ids: &[String],
        tag_names: &[String],
    ) -> Result<()>;
}

/// Action execution history.
#[async_trait]
pub trait ActionsService: Send + Sync {
    async fn get_actions(
        &self,
        tenant_id: &str,
        criteria: &ActionsCriteria,
        pager: &Pager,
    ) -> Result<Page<Action>>;
    async fn delete_actions(&self, tenant_id: &str, criteria: &ActionsCriteria) -> Result<usize>;
}
