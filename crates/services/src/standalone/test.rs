use std::collections::BTreeMap;

use models::{
    Alert, AlertsCriteria, CompareOp, Condition, ConditionExpr, Dampening, DampeningType,
    Definitions, FullTrigger, GroupMemberInfo, ImportType, Mode, Pager, Severity, Status, Trigger,
    TriggerType, UnorphanMemberInfo,
};

use crate::{AlertsService, DefinitionsService, ServiceError, StandaloneStore};

const TENANT: &str = "test-tenant";

fn threshold(data_id: &str, threshold: f64) -> Condition {
    Condition {
        tenant_id: String::new(),
        trigger_id: String::new(),
        trigger_mode: None,
        data_id: data_id.to_string(),
        expr: ConditionExpr::Threshold {
            operator: CompareOp::GT,
            threshold,
        },
        condition_set_size: 0,
        condition_set_index: 0,
    }
}

fn open_alert(id: &str, ctime: i64, severity: Severity) -> Alert {
    Alert {
        tenant_id: TENANT.to_string(),
        id: id.to_string(),
        ctime,
        trigger_id: Some("trigger-1".to_string()),
        severity,
        status: Status::Open,
        ack_by: None,
        ack_time: None,
        ack_notes: None,
        resolved_by: None,
        resolved_time: None,
        resolved_notes: None,
        notes: Vec::new(),
        tags: BTreeMap::new(),
        context: BTreeMap::new(),
        trigger: None,
        eval_sets: None,
    }
}

async fn store_with_group() -> StandaloneStore {
    let store = StandaloneStore::new();
    let mut group = Trigger::new(TENANT, "group-1", "cpu group");
    group.enabled = true;
    group.severity = Severity::High;
    store.add_group_trigger(TENANT, group).await.unwrap();
    store
        .set_group_conditions(
            TENANT,
            "group-1",
            Mode::Firing,
            vec![threshold("cpu-template", 90.0)],
            BTreeMap::new(),
        )
        .await
        .unwrap();
    store
}

fn member_info(member_id: &str, data_id: &str) -> GroupMemberInfo {
    GroupMemberInfo {
        group_id: "group-1".to_string(),
        member_id: Some(member_id.to_string()),
        member_name: Some(format!("{member_id} name")),
        member_description: None,
        member_context: BTreeMap::new(),
        member_tags: BTreeMap::new(),
        data_id_map: BTreeMap::from([("cpu-template".to_string(), data_id.to_string())]),
    }
}

#[tokio::test]
async fn member_instantiation_maps_data_ids() {
    let store = store_with_group().await;
    let child = store
        .add_member_trigger(TENANT, member_info("member-1", "cpu-host-1"))
        .await
        .unwrap();

    assert_eq!(child.trigger_type, TriggerType::Member);
    assert_eq!(child.member_of.as_deref(), Some("group-1"));
    assert!(child.enabled, "member inherits group enablement");
    assert_eq!(child.severity, Severity::High);

    let conditions = store
        .get_trigger_conditions(TENANT, "member-1", None)
        .await
        .unwrap();
    assert_eq!(conditions.len(), 1);
    assert_eq!(conditions[0].data_id, "cpu-host-1");
    assert_eq!(conditions[0].trigger_id, "member-1");
}

#[tokio::test]
async fn member_instantiation_fails_without_binding() {
    let store = store_with_group().await;
    let mut info = member_info("member-1", "cpu-host-1");
    info.data_id_map.clear();

    let err = store.add_member_trigger(TENANT, info).await.unwrap_err();
    assert!(matches!(err, ServiceError::BadArgument(_)));
    // Staged updates were discarded: no partial member remains.
    assert!(store
        .get_trigger(TENANT, "member-1")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn group_condition_update_skips_orphans_until_unorphaned() {
    let store = store_with_group().await;
    store
        .add_member_trigger(TENANT, member_info("member-1", "cpu-host-1"))
        .await
        .unwrap();
    store
        .add_member_trigger(TENANT, member_info("member-2", "cpu-host-2"))
        .await
        .unwrap();
    store
        .orphan_member_trigger(TENANT, "member-2")
        .await
        .unwrap();

    // Update the group's conditions: the orphan must keep its old binding.
    store
        .set_group_conditions(
            TENANT,
            "group-1",
            Mode::Firing,
            vec![threshold("cpu-template", 99.0)],
            BTreeMap::new(),
        )
        .await
        .unwrap();

    let member_1 = store
        .get_trigger_conditions(TENANT, "member-1", None)
        .await
        .unwrap();
    let orphan = store
        .get_trigger_conditions(TENANT, "member-2", None)
        .await
        .unwrap();
    assert_eq!(
        member_1[0].expr,
        ConditionExpr::Threshold {
            operator: CompareOp::GT,
            threshold: 99.0
        }
    );
    assert_eq!(
        orphan[0].expr,
        ConditionExpr::Threshold {
            operator: CompareOp::GT,
            threshold: 90.0
        },
        "orphaned member must not receive group updates"
    );

    // Unorphan with a fresh mapping: bindings resolve anew and propagation
    // resumes on the next group update.
    store
        .unorphan_member_trigger(
            TENANT,
            "member-2",
            UnorphanMemberInfo {
                member_context: BTreeMap::new(),
                member_tags: BTreeMap::new(),
                data_id_map: BTreeMap::from([(
                    "cpu-template".to_string(),
                    "cpu-host-2b".to_string(),
                )]),
            },
        )
        .await
        .unwrap();

    let rebound = store
        .get_trigger_conditions(TENANT, "member-2", None)
        .await
        .unwrap();
    assert_eq!(rebound[0].data_id, "cpu-host-2b");

    store
        .set_group_conditions(
            TENANT,
            "group-1",
            Mode::Firing,
            vec![threshold("cpu-template", 50.0)],
            BTreeMap::new(),
        )
        .await
        .unwrap();
    let rebound = store
        .get_trigger_conditions(TENANT, "member-2", None)
        .await
        .unwrap();
    assert_eq!(
        rebound[0].expr,
        ConditionExpr::Threshold {
            operator: CompareOp::GT,
            threshold: 50.0
        }
    );
}

#[tokio::test]
async fn group_condition_update_stages_before_applying() {
    let store = store_with_group().await;
    store
        .add_member_trigger(TENANT, member_info("member-1", "cpu-host-1"))
        .await
        .unwrap();

    // A second condition with no binding for member-1 fails the whole
    // update; the group's conditions must be unchanged.
    let err = store
        .set_group_conditions(
            TENANT,
            "group-1",
            Mode::Firing,
            vec![threshold("cpu-template", 95.0), threshold("mem-template", 80.0)],
            BTreeMap::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::BadArgument(_)));

    let group_conditions = store
        .get_trigger_conditions(TENANT, "group-1", None)
        .await
        .unwrap();
    assert_eq!(group_conditions.len(), 1);
    assert_eq!(group_conditions[0].data_id, "cpu-template");

    // Supplying the binding through dataIdMemberMap succeeds and records
    // the new binding on the member.
    store
        .set_group_conditions(
            TENANT,
            "group-1",
            Mode::Firing,
            vec![threshold("cpu-template", 95.0), threshold("mem-template", 80.0)],
            BTreeMap::from([(
                "mem-template".to_string(),
                BTreeMap::from([("member-1".to_string(), "mem-host-1".to_string())]),
            )]),
        )
        .await
        .unwrap();

    let member = store.get_trigger(TENANT, "member-1").await.unwrap().unwrap();
    assert_eq!(member.data_id_map["mem-template"], "mem-host-1");
}

#[tokio::test]
async fn group_dampening_propagates_to_members() {
    let store = store_with_group().await;
    store
        .add_member_trigger(TENANT, member_info("member-1", "cpu-host-1"))
        .await
        .unwrap();

    let dampening = Dampening {
        tenant_id: String::new(),
        trigger_id: "group-1".to_string(),
        dampening_id: String::new(),
        trigger_mode: Mode::Firing,
        dampening_type: DampeningType::Strict,
        eval_true_setting: 3,
        eval_total_setting: 0,
        eval_time_setting: 0,
    };
    store.add_group_dampening(TENANT, dampening).await.unwrap();

    let member_dampening = store
        .get_dampening(TENANT, "member-1-FIRING")
        .await
        .unwrap()
        .expect("member dampening propagated");
    assert_eq!(member_dampening.trigger_id, "member-1");
    assert_eq!(member_dampening.eval_total_setting, 3);

    store
        .remove_group_dampening(TENANT, "group-1-FIRING")
        .await
        .unwrap();
    assert!(store
        .get_dampening(TENANT, "member-1-FIRING")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn group_removal_honors_keep_flags() {
    let store = store_with_group().await;
    store
        .add_member_trigger(TENANT, member_info("member-1", "cpu-host-1"))
        .await
        .unwrap();
    store
        .add_member_trigger(TENANT, member_info("member-2", "cpu-host-2"))
        .await
        .unwrap();
    store
        .orphan_member_trigger(TENANT, "member-2")
        .await
        .unwrap();

    store
        .remove_group_trigger(TENANT, "group-1", false, true)
        .await
        .unwrap();

    assert!(store.get_trigger(TENANT, "group-1").await.unwrap().is_none());
    assert!(
        store.get_trigger(TENANT, "member-1").await.unwrap().is_none(),
        "non-orphan deleted with the group"
    );
    let survivor = store
        .get_trigger(TENANT, "member-2")
        .await
        .unwrap()
        .expect("orphan kept");
    assert_eq!(survivor.trigger_type, TriggerType::Standalone);
    assert!(survivor.member_of.is_none());
}

#[tokio::test]
async fn direct_updates_of_group_managed_triggers_are_rejected() {
    let store = store_with_group().await;
    let child = store
        .add_member_trigger(TENANT, member_info("member-1", "cpu-host-1"))
        .await
        .unwrap();

    let err = store.update_trigger(TENANT, child.clone()).await.unwrap_err();
    assert!(matches!(err, ServiceError::BadArgument(_)));

    // Orphaning detaches the member and makes it editable.
    store
        .orphan_member_trigger(TENANT, "member-1")
        .await
        .unwrap();
    let mut editable = child;
    editable.name = "edited".to_string();
    store.update_trigger(TENANT, editable).await.unwrap();
    let trigger = store.get_trigger(TENANT, "member-1").await.unwrap().unwrap();
    assert_eq!(trigger.name, "edited");
    assert_eq!(trigger.trigger_type, TriggerType::Orphan, "type is preserved");
}

#[tokio::test]
async fn enablement_validates_the_batch_first() {
    let store = StandaloneStore::new();
    store
        .add_trigger(TENANT, Trigger::new(TENANT, "t1", "one"))
        .await
        .unwrap();

    let err = store
        .update_trigger_enablement(
            TENANT,
            &["t1".to_string(), "missing".to_string()],
            true,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    // The batch failed whole: t1 was not flipped.
    let t1 = store.get_trigger(TENANT, "t1").await.unwrap().unwrap();
    assert!(!t1.enabled);
}

#[tokio::test]
async fn duplicate_trigger_create_is_rejected() {
    let store = StandaloneStore::new();
    store
        .add_trigger(TENANT, Trigger::new(TENANT, "t1", "one"))
        .await
        .unwrap();
    let err = store
        .add_trigger(TENANT, Trigger::new(TENANT, "t1", "again"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::BadArgument(_)));
}

#[tokio::test]
async fn import_strategies() {
    let store = StandaloneStore::new();
    store
        .add_trigger(TENANT, Trigger::new(TENANT, "existing", "old name"))
        .await
        .unwrap();

    let definitions = Definitions {
        triggers: vec![
            FullTrigger {
                trigger: Trigger::new(TENANT, "existing", "new name"),
                dampenings: Vec::new(),
                conditions: vec![threshold("cpu", 90.0)],
            },
            FullTrigger {
                trigger: Trigger::new(TENANT, "brand-new", "brand new"),
                dampenings: Vec::new(),
                conditions: Vec::new(),
            },
        ],
        actions: Vec::new(),
    };

    // NEW: only the unknown trigger lands.
    let imported = store
        .import_definitions(TENANT, definitions.clone(), ImportType::New)
        .await
        .unwrap();
    assert_eq!(imported.triggers.len(), 1);
    assert_eq!(imported.triggers[0].trigger.id, "brand-new");
    let existing = store.get_trigger(TENANT, "existing").await.unwrap().unwrap();
    assert_eq!(existing.name, "old name");

    // OLD: only known ids are overwritten.
    let imported = store
        .import_definitions(TENANT, definitions.clone(), ImportType::Old)
        .await
        .unwrap();
    assert_eq!(imported.triggers.len(), 2, "both ids exist by now");
    let existing = store.get_trigger(TENANT, "existing").await.unwrap().unwrap();
    assert_eq!(existing.name, "new name");

    // DELETE: unrelated definitions are dropped before importing.
    store
        .add_trigger(TENANT, Trigger::new(TENANT, "unrelated", "unrelated"))
        .await
        .unwrap();
    store
        .import_definitions(TENANT, definitions, ImportType::Delete)
        .await
        .unwrap();
    assert!(store
        .get_trigger(TENANT, "unrelated")
        .await
        .unwrap()
        .is_none());
    let exported = store.export_definitions(TENANT).await.unwrap();
    assert_eq!(exported.triggers.len(), 2);
}

#[tokio::test]
async fn alert_lifecycle_and_bulk_delete() {
    let store = StandaloneStore::new();
    store
        .add_alerts(vec![
            open_alert("a1", 1_000, Severity::Critical),
            open_alert("a2", 2_000, Severity::Low),
            open_alert("a3", 3_000, Severity::Critical),
        ])
        .await
        .unwrap();

    store
        .ack_alerts(
            TENANT,
            &["a1".to_string()],
            Some("admin".to_string()),
            Some("looking".to_string()),
        )
        .await
        .unwrap();
    let a1 = store.get_alert(TENANT, "a1", false).await.unwrap().unwrap();
    assert_eq!(a1.status, Status::Acknowledged);
    assert_eq!(a1.ack_by.as_deref(), Some("admin"));

    store
        .resolve_alerts(TENANT, &["a1".to_string()], None, None)
        .await
        .unwrap();
    let a1 = store.get_alert(TENANT, "a1", false).await.unwrap().unwrap();
    assert_eq!(a1.status, Status::Resolved);

    // Criteria-scoped bulk delete returns the removed count.
    let criteria = AlertsCriteria {
        severities: vec![Severity::Critical],
        ..Default::default()
    };
    let deleted = store.delete_alerts(TENANT, &criteria).await.unwrap();
    assert_eq!(deleted, 2);
    let remaining = store
        .get_alerts(TENANT, &AlertsCriteria::default(), &Pager::unlimited())
        .await
        .unwrap();
    assert_eq!(remaining.total_size, 1);
    assert_eq!(remaining.items[0].id, "a2");
}

#[tokio::test]
async fn unknown_sort_field_is_a_client_error() {
    let store = StandaloneStore::new();
    store
        .add_alerts(vec![open_alert("a1", 1_000, Severity::Low)])
        .await
        .unwrap();
    let pager = Pager {
        page: 0,
        page_size: Some(10),
        order: vec![models::Order::by("bogus", models::Direction::Ascending)],
    };
    let err = store
        .get_alerts(TENANT, &AlertsCriteria::default(), &pager)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::BadArgument(_)));
}

#[tokio::test]
async fn action_history_filters_and_pages() {
    use crate::ActionsService;
    use models::{Action, ActionsCriteria};

    let store = StandaloneStore::new();
    for i in 0..4 {
        store.record_action(Action {
            tenant_id: TENANT.to_string(),
            action_plugin: if i % 2 == 0 { "email" } else { "webhook" }.to_string(),
            action_id: format!("action-{i}"),
            event_id: format!("alert-{i}"),
            ctime: 1_000 + i,
            result: Some("SUCCESS".to_string()),
        });
    }

    let criteria = ActionsCriteria {
        action_plugins: vec!["email".to_string()],
        ..Default::default()
    };
    let page = store
        .get_actions(TENANT, &criteria, &Pager::single_page(0, 1))
        .await
        .unwrap();
    assert_eq!(page.total_size, 2);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].action_id, "action-0");

    let deleted = store.delete_actions(TENANT, &criteria).await.unwrap();
    assert_eq!(deleted, 2);
}
