use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};

use models::{
    Condition, Dampening, Definitions, FullTrigger, GroupMemberInfo, ImportType, Mode, Page,
    Pager, Trigger, TriggerType, TriggersCriteria, UnorphanMemberInfo,
};

use super::{paged, trigger_matches, SortKey, StandaloneStore, State};
use crate::{DefinitionsService, ServiceError};

type Result<T> = std::result::Result<T, ServiceError>;

const MODES: [Mode; 2] = [Mode::Firing, Mode::Autoresolve];

impl State {
    fn trigger(&self, tenant_id: &str, trigger_id: &str) -> Result<&Trigger> {
        self.triggers
            .get(&(tenant_id.to_string(), trigger_id.to_string()))
            .ok_or_else(|| {
                ServiceError::not_found(format!("Trigger {trigger_id} not found"))
            })
    }

    fn group_trigger(&self, tenant_id: &str, group_id: &str) -> Result<&Trigger> {
        let group = self.trigger(tenant_id, group_id)?;
        if !group.is_group() {
            return Err(ServiceError::bad_argument(format!(
                "Trigger {group_id} is not a group trigger"
            )));
        }
        Ok(group)
    }

    /// Ids of the group's members, orphans included.
    fn member_ids(&self, tenant_id: &str, group_id: &str) -> Vec<String> {
        self.triggers
            .range((tenant_id.to_string(), String::new())..)
            .take_while(|((tenant, _), _)| tenant == tenant_id)
            .filter(|(_, t)| t.is_member() && t.member_of.as_deref() == Some(group_id))
            .map(|(_, t)| t.id.clone())
            .collect()
    }

    fn set_condition_set(
        &mut self,
        tenant_id: &str,
        trigger_id: &str,
        mode: Mode,
        mut conditions: Vec<Condition>,
    ) -> Vec<Condition> {
        Condition::number_set(&mut conditions, tenant_id, trigger_id, mode);
        let key = (tenant_id.to_string(), trigger_id.to_string(), mode);
        if conditions.is_empty() {
            self.conditions.remove(&key);
        } else {
            self.conditions.insert(key, conditions.clone());
        }
        conditions
    }

    fn condition_set(&self, tenant_id: &str, trigger_id: &str, mode: Mode) -> Vec<Condition> {
        self.conditions
            .get(&(tenant_id.to_string(), trigger_id.to_string(), mode))
            .cloned()
            .unwrap_or_default()
    }

    fn trigger_dampenings(&self, tenant_id: &str, trigger_id: &str) -> Vec<Dampening> {
        MODES
            .iter()
            .filter_map(|mode| {
                let id = Dampening::derive_id(trigger_id, *mode);
                self.dampenings.get(&(tenant_id.to_string(), id)).cloned()
            })
            .collect()
    }

    /// Drop a trigger together with its conditions and dampenings.
    fn remove_trigger_definition(&mut self, tenant_id: &str, trigger_id: &str) {
        self.triggers
            .remove(&(tenant_id.to_string(), trigger_id.to_string()));
        for mode in MODES {
            self.conditions
                .remove(&(tenant_id.to_string(), trigger_id.to_string(), mode));
            self.dampenings.remove(&(
                tenant_id.to_string(),
                Dampening::derive_id(trigger_id, mode),
            ));
        }
    }
}

/// Resolve a group condition's dataId to a member's concrete dataId.
///
/// The member's stored dataIdMap binds dataIds known at instantiation time;
/// `data_id_member_map` supplies bindings for dataIds introduced by the
/// update. A dataId bound by neither is a client error, reported before any
/// state is modified.
fn map_member_conditions(
    group_conditions: &[Condition],
    member: &Trigger,
    data_id_member_map: &BTreeMap<String, BTreeMap<String, String>>,
) -> Result<(Vec<Condition>, BTreeMap<String, String>)> {
    let mut data_id_map = member.data_id_map.clone();
    let mut mapped = Vec::with_capacity(group_conditions.len());
    for condition in group_conditions {
        let member_data_id = data_id_map.get(&condition.data_id).cloned().or_else(|| {
            data_id_member_map
                .get(&condition.data_id)
                .and_then(|per_member| per_member.get(&member.id))
                .cloned()
        });
        let Some(member_data_id) = member_data_id else {
            return Err(ServiceError::bad_argument(format!(
                "No dataId mapping of dataId {} for member {}",
                condition.data_id, member.id
            )));
        };
        data_id_map.insert(condition.data_id.clone(), member_data_id.clone());
        let mut condition = condition.clone();
        condition.data_id = member_data_id;
        mapped.push(condition);
    }
    Ok((mapped, data_id_map))
}

#[async_trait]
impl DefinitionsService for StandaloneStore {
    async fn get_triggers(
        &self,
        tenant_id: &str,
        criteria: &TriggersCriteria,
        pager: &Pager,
    ) -> Result<Page<Trigger>> {
        let state = self.state.read().unwrap();
        let mut matches: Vec<Trigger> = state
            .triggers
            .range((tenant_id.to_string(), String::new())..)
            .take_while(|((tenant, _), _)| tenant == tenant_id)
            .filter(|(_, t)| trigger_matches(criteria, t))
            .map(|(_, t)| t.clone())
            .collect();
        drop(state);
        if criteria.thin {
            for trigger in &mut matches {
                trigger.context.clear();
            }
        }
        paged(matches, pager, trigger_sort_key, "id")
    }

    async fn get_trigger(&self, tenant_id: &str, trigger_id: &str) -> Result<Option<Trigger>> {
        let state = self.state.read().unwrap();
        Ok(state
            .triggers
            .get(&(tenant_id.to_string(), trigger_id.to_string()))
            .cloned())
    }

    async fn add_trigger(&self, tenant_id: &str, mut trigger: Trigger) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let key = (tenant_id.to_string(), trigger.id.clone());
        if state.triggers.contains_key(&key) {
            return Err(ServiceError::bad_argument(format!(
                "Trigger with ID [{}] exists",
                trigger.id
            )));
        }
        trigger.tenant_id = tenant_id.to_string();
        trigger.trigger_type = TriggerType::Standalone;
        trigger.member_of = None;
        state.triggers.insert(key, trigger);
        Ok(())
    }

    async fn add_group_trigger(&self, tenant_id: &str, mut trigger: Trigger) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let key = (tenant_id.to_string(), trigger.id.clone());
        if state.triggers.contains_key(&key) {
            return Err(ServiceError::bad_argument(format!(
                "Trigger with ID [{}] exists",
                trigger.id
            )));
        }
        trigger.tenant_id = tenant_id.to_string();
        trigger.trigger_type = TriggerType::Group;
        trigger.member_of = None;
        state.triggers.insert(key, trigger);
        Ok(())
    }

    async fn update_trigger(&self, tenant_id: &str, mut trigger: Trigger) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let existing = state.trigger(tenant_id, &trigger.id)?;
        if existing.is_group() {
            return Err(ServiceError::bad_argument(format!(
                "Trigger {} is a group trigger and must be updated via the groups path",
                trigger.id
            )));
        }
        if existing.is_member() && !existing.is_orphan() {
            return Err(ServiceError::bad_argument(format!(
                "Trigger {} is a member trigger and is managed via its group",
                trigger.id
            )));
        }
        // Structural fields are never updatable in place.
        trigger.tenant_id = tenant_id.to_string();
        trigger.trigger_type = existing.trigger_type;
        trigger.member_of = existing.member_of.clone();
        trigger.data_id_map = existing.data_id_map.clone();
        state
            .triggers
            .insert((tenant_id.to_string(), trigger.id.clone()), trigger);
        Ok(())
    }

    async fn update_group_trigger(&self, tenant_id: &str, mut group: Trigger) -> Result<()> {
        let mut state = self.state.write().unwrap();
        state.group_trigger(tenant_id, &group.id)?;

        // Propagate the shared definition to non-orphan members; member
        // identity, name, tags and context remain member-local.
        let members = state.member_ids(tenant_id, &group.id);
        for member_id in members {
            let member = state
                .triggers
                .get_mut(&(tenant_id.to_string(), member_id))
                .expect("member listed but not stored");
            if member.is_orphan() {
                continue;
            }
            member.description = group.description.clone();
            member.enabled = group.enabled;
            member.severity = group.severity;
        }

        group.tenant_id = tenant_id.to_string();
        group.trigger_type = TriggerType::Group;
        group.member_of = None;
        state
            .triggers
            .insert((tenant_id.to_string(), group.id.clone()), group);
        Ok(())
    }

    async fn remove_trigger(&self, tenant_id: &str, trigger_id: &str) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let existing = state.trigger(tenant_id, trigger_id)?;
        if existing.is_group() {
            return Err(ServiceError::bad_argument(format!(
                "Trigger {trigger_id} is a group trigger and must be removed via the groups path"
            )));
        }
        state.remove_trigger_definition(tenant_id, trigger_id);
        Ok(())
    }

    async fn remove_group_trigger(
        &self,
        tenant_id: &str,
        group_id: &str,
        keep_non_orphans: bool,
        keep_orphans: bool,
    ) -> Result<()> {
        let mut state = self.state.write().unwrap();
        state.group_trigger(tenant_id, group_id)?;

        let members: Vec<(String, bool)> = state
            .member_ids(tenant_id, group_id)
            .into_iter()
            .map(|id| {
                let orphan = state
                    .triggers
                    .get(&(tenant_id.to_string(), id.clone()))
                    .is_some_and(Trigger::is_orphan);
                (id, orphan)
            })
            .collect();
        for (member_id, orphan) in members {
            let keep = if orphan { keep_orphans } else { keep_non_orphans };
            if keep {
                // Surviving members become standalone triggers.
                let member = state
                    .triggers
                    .get_mut(&(tenant_id.to_string(), member_id))
                    .expect("member listed but not stored");
                member.trigger_type = TriggerType::Standalone;
                member.member_of = None;
                member.data_id_map.clear();
            } else {
                state.remove_trigger_definition(tenant_id, &member_id);
            }
        }
        state.remove_trigger_definition(tenant_id, group_id);
        Ok(())
    }

    async fn update_trigger_enablement(
        &self,
        tenant_id: &str,
        trigger_ids: &[String],
        enabled: bool,
    ) -> Result<()> {
        let mut state = self.state.write().unwrap();
        // Validate the whole batch before flipping anything.
        for trigger_id in trigger_ids {
            let trigger = state.trigger(tenant_id, trigger_id)?;
            if trigger.is_group() {
                return Err(ServiceError::bad_argument(format!(
                    "Trigger {trigger_id} is a group trigger and must be enabled via the groups path"
                )));
            }
        }
        for trigger_id in trigger_ids {
            let trigger = state
                .triggers
                .get_mut(&(tenant_id.to_string(), trigger_id.clone()))
                .expect("validated above");
            trigger.enabled = enabled;
        }
        Ok(())
    }

    async fn update_group_trigger_enablement(
        &self,
        tenant_id: &str,
        group_ids: &[String],
        enabled: bool,
    ) -> Result<()> {
        let mut state = self.state.write().unwrap();
        for group_id in group_ids {
            state.group_trigger(tenant_id, group_id)?;
        }
        for group_id in group_ids {
            for member_id in state.member_ids(tenant_id, group_id) {
                let member = state
                    .triggers
                    .get_mut(&(tenant_id.to_string(), member_id))
                    .expect("member listed but not stored");
                if !member.is_orphan() {
                    member.enabled = enabled;
                }
            }
            let group = state
                .triggers
                .get_mut(&(tenant_id.to_string(), group_id.clone()))
                .expect("validated above");
            group.enabled = enabled;
        }
        Ok(())
    }

    async fn get_member_triggers(
        &self,
        tenant_id: &str,
        group_id: &str,
        include_orphans: bool,
    ) -> Result<Vec<Trigger>> {
        let state = self.state.read().unwrap();
        state.group_trigger(tenant_id, group_id)?;
        Ok(state
            .member_ids(tenant_id, group_id)
            .into_iter()
            .filter_map(|id| state.triggers.get(&(tenant_id.to_string(), id)).cloned())
            .filter(|member| include_orphans || !member.is_orphan())
            .collect())
    }

    async fn add_member_trigger(
        &self,
        tenant_id: &str,
        member: GroupMemberInfo,
    ) -> Result<Trigger> {
        let mut state = self.state.write().unwrap();
        let group = state.group_trigger(tenant_id, &member.group_id)?.clone();

        let member_id = member
            .member_id
            .unwrap_or_else(Trigger::generate_id);
        if state
            .triggers
            .contains_key(&(tenant_id.to_string(), member_id.clone()))
        {
            return Err(ServiceError::bad_argument(format!(
                "Trigger with ID [{member_id}] exists"
            )));
        }

        let mut child = Trigger {
            tenant_id: tenant_id.to_string(),
            id: member_id.clone(),
            name: member.member_name.unwrap_or_else(|| group.name.clone()),
            description: member.member_description.or_else(|| group.description.clone()),
            trigger_type: TriggerType::Member,
            member_of: Some(group.id.clone()),
            data_id_map: member.data_id_map,
            enabled: group.enabled,
            severity: group.severity,
            context: if member.member_context.is_empty() {
                group.context.clone()
            } else {
                member.member_context
            },
            tags: if member.member_tags.is_empty() {
                group.tags.clone()
            } else {
                member.member_tags
            },
        };

        // Stage the member's condition sets before touching the store, so a
        // missing dataId binding leaves no partial member behind.
        let mut staged = Vec::new();
        for mode in MODES {
            let group_conditions = state.condition_set(tenant_id, &group.id, mode);
            let (mapped, data_id_map) =
                map_member_conditions(&group_conditions, &child, &BTreeMap::new())?;
            child.data_id_map = data_id_map;
            staged.push((mode, mapped));
        }

        for (mode, conditions) in staged {
            state.set_condition_set(tenant_id, &member_id, mode, conditions);
        }
        for group_dampening in state.trigger_dampenings(tenant_id, &group.id) {
            let mut dampening = group_dampening;
            dampening.trigger_id = member_id.clone();
            dampening.dampening_id = Dampening::derive_id(&member_id, dampening.trigger_mode);
            state.dampenings.insert(
                (tenant_id.to_string(), dampening.dampening_id.clone()),
                dampening,
            );
        }
        state
            .triggers
            .insert((tenant_id.to_string(), member_id), child.clone());

        Ok(child)
    }

    async fn orphan_member_trigger(&self, tenant_id: &str, member_id: &str) -> Result<Trigger> {
        let mut state = self.state.write().unwrap();
        let member = state.trigger(tenant_id, member_id)?;
        if member.trigger_type != TriggerType::Member {
            return Err(ServiceError::bad_argument(format!(
                "Trigger {member_id} is not a member trigger"
            )));
        }
        let member = state
            .triggers
            .get_mut(&(tenant_id.to_string(), member_id.to_string()))
            .expect("checked above");
        member.trigger_type = TriggerType::Orphan;
        Ok(member.clone())
    }

    async fn unorphan_member_trigger(
        &self,
        tenant_id: &str,
        member_id: &str,
        info: UnorphanMemberInfo,
    ) -> Result<Trigger> {
        let mut state = self.state.write().unwrap();
        let member = state.trigger(tenant_id, member_id)?.clone();
        if member.trigger_type != TriggerType::Orphan {
            return Err(ServiceError::bad_argument(format!(
                "Trigger {member_id} is not an orphan member trigger"
            )));
        }
        let group_id = member
            .member_of
            .clone()
            .expect("orphan member has an owning group");
        let group = state.group_trigger(tenant_id, &group_id)?.clone();

        let mut child = member;
        child.trigger_type = TriggerType::Member;
        child.data_id_map = info.data_id_map;
        child.context = info.member_context;
        child.tags = info.member_tags;
        child.description = group.description.clone();
        child.enabled = group.enabled;
        child.severity = group.severity;

        // Re-bind conditions from the group definition through the fresh map.
        let mut staged = Vec::new();
        for mode in MODES {
            let group_conditions = state.condition_set(tenant_id, &group_id, mode);
            let (mapped, data_id_map) =
                map_member_conditions(&group_conditions, &child, &BTreeMap::new())?;
            child.data_id_map = data_id_map;
            staged.push((mode, mapped));
        }
        for (mode, conditions) in staged {
            state.set_condition_set(tenant_id, member_id, mode, conditions);
        }
        state
            .triggers
            .insert((tenant_id.to_string(), member_id.to_string()), child.clone());
        Ok(child)
    }

    async fn get_trigger_dampenings(
        &self,
        tenant_id: &str,
        trigger_id: &str,
        mode: Option<Mode>,
    ) -> Result<Vec<Dampening>> {
        let state = self.state.read().unwrap();
        state.trigger(tenant_id, trigger_id)?;
        Ok(state
            .trigger_dampenings(tenant_id, trigger_id)
            .into_iter()
            .filter(|d| mode.map_or(true, |m| d.trigger_mode == m))
            .collect())
    }

    async fn get_dampening(
        &self,
        tenant_id: &str,
        dampening_id: &str,
    ) -> Result<Option<Dampening>> {
        let state = self.state.read().unwrap();
        Ok(state
            .dampenings
            .get(&(tenant_id.to_string(), dampening_id.to_string()))
            .cloned())
    }

    async fn add_dampening(&self, tenant_id: &str, dampening: Dampening) -> Result<Dampening> {
        let mut state = self.state.write().unwrap();
        state.trigger(tenant_id, &dampening.trigger_id)?;
        let dampening = clean_for(tenant_id, dampening)?;
        state.dampenings.insert(
            (tenant_id.to_string(), dampening.dampening_id.clone()),
            dampening.clone(),
        );
        Ok(dampening)
    }

    async fn add_group_dampening(
        &self,
        tenant_id: &str,
        dampening: Dampening,
    ) -> Result<Dampening> {
        let mut state = self.state.write().unwrap();
        state.group_trigger(tenant_id, &dampening.trigger_id)?;
        let group_dampening = clean_for(tenant_id, dampening)?;

        for member_id in state.member_ids(tenant_id, &group_dampening.trigger_id) {
            let member = state.trigger(tenant_id, &member_id)?;
            if member.is_orphan() {
                continue;
            }
            let mut member_dampening = group_dampening.clone();
            member_dampening.trigger_id = member_id.clone();
            member_dampening.dampening_id =
                Dampening::derive_id(&member_id, member_dampening.trigger_mode);
            state.dampenings.insert(
                (tenant_id.to_string(), member_dampening.dampening_id.clone()),
                member_dampening,
            );
        }
        state.dampenings.insert(
            (tenant_id.to_string(), group_dampening.dampening_id.clone()),
            group_dampening.clone(),
        );
        Ok(group_dampening)
    }

    async fn update_dampening(&self, tenant_id: &str, dampening: Dampening) -> Result<Dampening> {
        let mut state = self.state.write().unwrap();
        let dampening = clean_for(tenant_id, dampening)?;
        if !state
            .dampenings
            .contains_key(&(tenant_id.to_string(), dampening.dampening_id.clone()))
        {
            return Err(ServiceError::not_found(format!(
                "No dampening found for dampeningId: {}",
                dampening.dampening_id
            )));
        }
        state.dampenings.insert(
            (tenant_id.to_string(), dampening.dampening_id.clone()),
            dampening.clone(),
        );
        Ok(dampening)
    }

    async fn update_group_dampening(
        &self,
        tenant_id: &str,
        dampening: Dampening,
    ) -> Result<Dampening> {
        let mut state = self.state.write().unwrap();
        state.group_trigger(tenant_id, &dampening.trigger_id)?;
        let group_dampening = clean_for(tenant_id, dampening)?;
        if !state
            .dampenings
            .contains_key(&(tenant_id.to_string(), group_dampening.dampening_id.clone()))
        {
            return Err(ServiceError::not_found(format!(
                "No dampening found for dampeningId: {}",
                group_dampening.dampening_id
            )));
        }
        for member_id in state.member_ids(tenant_id, &group_dampening.trigger_id) {
            let member = state.trigger(tenant_id, &member_id)?;
            if member.is_orphan() {
                continue;
            }
            let mut member_dampening = group_dampening.clone();
            member_dampening.trigger_id = member_id.clone();
            member_dampening.dampening_id =
                Dampening::derive_id(&member_id, member_dampening.trigger_mode);
            state.dampenings.insert(
                (tenant_id.to_string(), member_dampening.dampening_id.clone()),
                member_dampening,
            );
        }
        state.dampenings.insert(
            (tenant_id.to_string(), group_dampening.dampening_id.clone()),
            group_dampening.clone(),
        );
        Ok(group_dampening)
    }

    async fn remove_dampening(&self, tenant_id: &str, dampening_id: &str) -> Result<()> {
        let mut state = self.state.write().unwrap();
        state
            .dampenings
            .remove(&(tenant_id.to_string(), dampening_id.to_string()))
            .ok_or_else(|| {
                ServiceError::not_found(format!(
                    "No dampening found for dampeningId: {dampening_id}"
                ))
            })?;
        Ok(())
    }

    async fn remove_group_dampening(&self, tenant_id: &str, dampening_id: &str) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let group_dampening = state
            .dampenings
            .get(&(tenant_id.to_string(), dampening_id.to_string()))
            .cloned()
            .ok_or_else(|| {
                ServiceError::not_found(format!(
                    "No dampening found for dampeningId: {dampening_id}"
                ))
            })?;
        state.group_trigger(tenant_id, &group_dampening.trigger_id)?;

        for member_id in state.member_ids(tenant_id, &group_dampening.trigger_id) {
            let member = state.trigger(tenant_id, &member_id)?;
            if member.is_orphan() {
                continue;
            }
            let member_dampening_id =
                Dampening::derive_id(&member_id, group_dampening.trigger_mode);
            state
                .dampenings
                .remove(&(tenant_id.to_string(), member_dampening_id));
        }
        state
            .dampenings
            .remove(&(tenant_id.to_string(), dampening_id.to_string()));
        Ok(())
    }

    async fn get_trigger_conditions(
        &self,
        tenant_id: &str,
        trigger_id: &str,
        mode: Option<Mode>,
    ) -> Result<Vec<Condition>> {
        let state = self.state.read().unwrap();
        state.trigger(tenant_id, trigger_id)?;
        Ok(MODES
            .iter()
            .filter(|m| mode.map_or(true, |wanted| **m == wanted))
            .flat_map(|m| state.condition_set(tenant_id, trigger_id, *m))
            .collect())
    }

    async fn set_conditions(
        &self,
        tenant_id: &str,
        trigger_id: &str,
        mode: Mode,
        conditions: Vec<Condition>,
    ) -> Result<Vec<Condition>> {
        let mut state = self.state.write().unwrap();
        let trigger = state.trigger(tenant_id, trigger_id)?;
        if trigger.is_group() {
            return Err(ServiceError::bad_argument(format!(
                "Trigger {trigger_id} is a group trigger and must be managed via the groups path"
            )));
        }
        if trigger.is_member() && !trigger.is_orphan() {
            return Err(ServiceError::bad_argument(format!(
                "Trigger {trigger_id} is a member trigger and is managed via its group"
            )));
        }
        Ok(state.set_condition_set(tenant_id, trigger_id, mode, conditions))
    }

    async fn set_group_conditions(
        &self,
        tenant_id: &str,
        group_id: &str,
        mode: Mode,
        conditions: Vec<Condition>,
        data_id_member_map: BTreeMap<String, BTreeMap<String, String>>,
    ) -> Result<Vec<Condition>> {
        let mut state = self.state.write().unwrap();
        state.group_trigger(tenant_id, group_id)?;

        // Phase one: stage every member's mapped set. Nothing is applied
        // until all members resolve, so one bad binding cannot leave the
        // group half-propagated.
        let mut numbered = conditions;
        Condition::number_set(&mut numbered, tenant_id, group_id, mode);

        let mut staged = Vec::new();
        for member_id in state.member_ids(tenant_id, group_id) {
            let member = state.trigger(tenant_id, &member_id)?;
            if member.is_orphan() {
                continue;
            }
            let (mapped, data_id_map) =
                map_member_conditions(&numbered, member, &data_id_member_map)?;
            staged.push((member_id, mapped, data_id_map));
        }

        // Phase two: apply group and member sets.
        for (member_id, mapped, data_id_map) in staged {
            state.set_condition_set(tenant_id, &member_id, mode, mapped);
            let member = state
                .triggers
                .get_mut(&(tenant_id.to_string(), member_id))
                .expect("member listed but not stored");
            member.data_id_map = data_id_map;
        }
        Ok(state.set_condition_set(tenant_id, group_id, mode, numbered))
    }

    async fn get_action_definition_ids(
        &self,
        tenant_id: &str,
    ) -> Result<BTreeMap<String, BTreeSet<String>>> {
        let state = self.state.read().unwrap();
        let mut ids: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for ((tenant, plugin, action_id), _) in &state.action_definitions {
            if tenant == tenant_id {
                ids.entry(plugin.clone()).or_default().insert(action_id.clone());
            }
        }
        Ok(ids)
    }

    async fn get_action_definition_ids_by_plugin(
        &self,
        tenant_id: &str,
        action_plugin: &str,
    ) -> Result<Vec<String>> {
        let state = self.state.read().unwrap();
        Ok(state
            .action_definitions
            .keys()
            .filter(|(tenant, plugin, _)| tenant == tenant_id && plugin == action_plugin)
            .map(|(_, _, action_id)| action_id.clone())
            .collect())
    }

    async fn get_action_definition(
        &self,
        tenant_id: &str,
        action_plugin: &str,
        action_id: &str,
    ) -> Result<Option<models::ActionDefinition>> {
        let state = self.state.read().unwrap();
        Ok(state
            .action_definitions
            .get(&(
                tenant_id.to_string(),
                action_plugin.to_string(),
                action_id.to_string(),
            ))
            .cloned())
    }

    async fn add_action_definition(
        &self,
        tenant_id: &str,
        mut definition: models::ActionDefinition,
    ) -> Result<()> {
        let mut state = self.state.write().unwrap();
        if !state.plugins.contains_key(&definition.action_plugin) {
            return Err(ServiceError::bad_argument(format!(
                "Action plugin {} is not deployed",
                definition.action_plugin
            )));
        }
        let key = (
            tenant_id.to_string(),
            definition.action_plugin.clone(),
            definition.action_id.clone(),
        );
        if state.action_definitions.contains_key(&key) {
            return Err(ServiceError::bad_argument(format!(
                "Existing ActionDefinition: {}/{}",
                definition.action_plugin, definition.action_id
            )));
        }
        definition.tenant_id = tenant_id.to_string();
        state.action_definitions.insert(key, definition);
        Ok(())
    }

    async fn update_action_definition(
        &self,
        tenant_id: &str,
        mut definition: models::ActionDefinition,
    ) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let key = (
            tenant_id.to_string(),
            definition.action_plugin.clone(),
            definition.action_id.clone(),
        );
        if !state.action_definitions.contains_key(&key) {
            return Err(ServiceError::not_found(format!(
                "ActionDefinition {}/{} not found for update",
                definition.action_plugin, definition.action_id
            )));
        }
        definition.tenant_id = tenant_id.to_string();
        state.action_definitions.insert(key, definition);
        Ok(())
    }

    async fn remove_action_definition(
        &self,
        tenant_id: &str,
        action_plugin: &str,
        action_id: &str,
    ) -> Result<()> {
        let mut state = self.state.write().unwrap();
        state
            .action_definitions
            .remove(&(
                tenant_id.to_string(),
                action_plugin.to_string(),
                action_id.to_string(),
            ))
            .ok_or_else(|| {
                ServiceError::not_found(format!(
                    "ActionDefinition {action_plugin}/{action_id} not found for delete"
                ))
            })?;
        Ok(())
    }

    async fn get_action_plugins(&self) -> Result<Vec<String>> {
        let state = self.state.read().unwrap();
        Ok(state.plugins.keys().cloned().collect())
    }

    async fn get_action_plugin(&self, name: &str) -> Result<Option<BTreeSet<String>>> {
        let state = self.state.read().unwrap();
        Ok(state.plugins.get(name).cloned())
    }

    async fn export_definitions(&self, tenant_id: &str) -> Result<Definitions> {
        let state = self.state.read().unwrap();
        let triggers = state
            .triggers
            .range((tenant_id.to_string(), String::new())..)
            .take_while(|((tenant, _), _)| tenant == tenant_id)
            .map(|(_, trigger)| FullTrigger {
                dampenings: state.trigger_dampenings(tenant_id, &trigger.id),
                conditions: MODES
                    .iter()
                    .flat_map(|mode| state.condition_set(tenant_id, &trigger.id, *mode))
                    .collect(),
                trigger: trigger.clone(),
            })
            .collect();
        let actions = state
            .action_definitions
            .range((tenant_id.to_string(), String::new(), String::new())..)
            .take_while(|((tenant, _, _), _)| tenant == tenant_id)
            .map(|(_, definition)| definition.clone())
            .collect();
        Ok(Definitions { triggers, actions })
    }

    async fn import_definitions(
        &self,
        tenant_id: &str,
        definitions: Definitions,
        strategy: ImportType,
    ) -> Result<Definitions> {
        let mut state = self.state.write().unwrap();

        if strategy == ImportType::Delete {
            let trigger_ids: Vec<String> = state
                .triggers
                .range((tenant_id.to_string(), String::new())..)
                .take_while(|((tenant, _), _)| tenant == tenant_id)
                .map(|(_, t)| t.id.clone())
                .collect();
            for trigger_id in trigger_ids {
                state.remove_trigger_definition(tenant_id, &trigger_id);
            }
            state
                .action_definitions
                .retain(|(tenant, _, _), _| tenant != tenant_id);
        }

        let mut imported = Definitions::default();
        for full in definitions.triggers {
            let exists = state
                .triggers
                .contains_key(&(tenant_id.to_string(), full.trigger.id.clone()));
            let apply = match strategy {
                ImportType::Delete | ImportType::All => true,
                ImportType::New => !exists,
                ImportType::Old => exists,
            };
            if !apply {
                continue;
            }
            let FullTrigger {
                mut trigger,
                dampenings,
                conditions,
            } = full;
            trigger.tenant_id = tenant_id.to_string();
            let trigger_id = trigger.id.clone();
            state
                .triggers
                .insert((tenant_id.to_string(), trigger_id.clone()), trigger.clone());

            let mut imported_dampenings = Vec::new();
            for mut dampening in dampenings {
                dampening.trigger_id = trigger_id.clone();
                let dampening = clean_for(tenant_id, dampening)?;
                state.dampenings.insert(
                    (tenant_id.to_string(), dampening.dampening_id.clone()),
                    dampening.clone(),
                );
                imported_dampenings.push(dampening);
            }
            let mut imported_conditions = Vec::new();
            for mode in MODES {
                let for_mode: Vec<Condition> = conditions
                    .iter()
                    .filter(|c| c.mode() == mode)
                    .cloned()
                    .collect();
                if !for_mode.is_empty() {
                    imported_conditions.extend(state.set_condition_set(
                        tenant_id,
                        &trigger_id,
                        mode,
                        for_mode,
                    ));
                }
            }
            imported.triggers.push(FullTrigger {
                trigger,
                dampenings: imported_dampenings,
                conditions: imported_conditions,
            });
        }

        for mut definition in definitions.actions {
            let key = (
                tenant_id.to_string(),
                definition.action_plugin.clone(),
                definition.action_id.clone(),
            );
            let exists = state.action_definitions.contains_key(&key);
            let apply = match strategy {
                ImportType::Delete | ImportType::All => true,
                ImportType::New => !exists,
                ImportType::Old => exists,
            };
            if !apply {
                continue;
            }
            definition.tenant_id = tenant_id.to_string();
            state.action_definitions.insert(key, definition.clone());
            imported.actions.push(definition);
        }

        Ok(imported)
    }
}

fn clean_for(tenant_id: &str, mut dampening: Dampening) -> Result<Dampening> {
    dampening.tenant_id = tenant_id.to_string();
    dampening
        .clean()
        .map_err(|err| ServiceError::bad_argument(err.to_string()))
}

pub(crate) fn trigger_sort_key(trigger: &Trigger, field: &str) -> Option<SortKey> {
    match field {
        "id" => Some(SortKey::Text(trigger.id.clone())),
        "name" => Some(SortKey::Text(trigger.name.clone())),
        "severity" => Some(SortKey::Num(trigger.severity as i64)),
        "enabled" => Some(SortKey::Num(trigger.enabled as i64)),
        _ => None,
    }
}
