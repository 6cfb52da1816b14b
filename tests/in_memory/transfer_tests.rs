//! Transfers between workbaskets and routing-driven reroutes.

use super::helpers::{Harness, access_id, admin, harness, reader, workbasket_id, workbasket_ref};
use rstest::rstest;
use tasklane::task::{
    adapters::memory::StaticRouter,
    domain::{Task, TaskId, TaskState, WorkbasketId},
    ports::{TaskEventKind, TaskRouter, WorkbasketPermission},
    services::TaskError,
};

/// Sends every task of priority 3 or more to `TEAMLEAD_1`.
struct UrgentToTeamLead;

impl TaskRouter for UrgentToTeamLead {
    fn route(&self, task: &Task) -> Option<WorkbasketId> {
        (task.priority() >= 3).then(|| workbasket_id("TEAMLEAD_1"))
    }
}

fn routed_harness() -> Harness {
    Harness::with_router(
        StaticRouter::new()
            .with_route("L20000", workbasket_id("TEAMLEAD_1"))
            .with_route("L30000", workbasket_id("MISSING")),
    )
}

fn event_kinds(harness: &Harness, id: TaskId) -> Vec<TaskEventKind> {
    harness
        .history
        .events_for(id)
        .into_iter()
        .map(|event| event.kind)
        .collect()
}

#[rstest]
fn transfer_resets_claim_and_sets_flag(harness: Harness) {
    let id = harness.create_id("L10000");
    harness.lifecycle.claim(id).expect("claim succeeds");

    let moved = harness
        .transfers
        .transfer(id, &workbasket_ref("TEAMLEAD_1"), None, true)
        .expect("transfer succeeds");

    assert_eq!(moved.state(), TaskState::Ready);
    assert_eq!(moved.workbasket().id, workbasket_id("TEAMLEAD_1"));
    assert_eq!(moved.owner(), None);
    assert_eq!(moved.claimed(), None);
    assert!(!moved.is_read());
    assert!(moved.is_transferred());
    harness.act_as(admin());
    let stored = harness.reload(id);
    assert_eq!(stored.workbasket().key, "TEAMLEAD_1");
    assert_eq!(
        event_kinds(&harness, id).last(),
        Some(&TaskEventKind::Transferred)
    );
}

#[rstest]
fn transfer_can_assign_owner_and_keep_flag(harness: Harness) {
    let id = harness.create_id("L10000");

    let moved = harness
        .transfers
        .transfer(id, &workbasket_ref("TEAMLEAD_1"), Some(access_id("user-1-2")), false)
        .expect("transfer succeeds");

    assert_eq!(moved.owner(), Some(&access_id("user-1-2")));
    assert!(!moved.is_transferred());
}

#[rstest]
fn completed_task_cannot_be_transferred(harness: Harness) {
    let id = harness.create_id("L10000");
    harness.complete(id);

    let result = harness
        .transfers
        .transfer(id, &workbasket_ref("TEAMLEAD_1"), None, true);

    assert!(matches!(
        result,
        Err(TaskError::InvalidState {
            state: TaskState::Completed,
            ..
        })
    ));
    let stored = harness.reload(id);
    assert_eq!(stored.workbasket().id, workbasket_id("GPK_KSC"));
    assert!(!stored.is_transferred());
}

#[rstest]
fn transfer_requires_append_on_destination(harness: Harness) {
    let id = harness.create_id("L10000");

    let result = harness
        .transfers
        .transfer(id, &workbasket_ref("GPK_B_KSC"), None, true);

    assert!(matches!(result, Err(TaskError::NotAuthorized { .. })));
    assert_eq!(harness.reload(id).workbasket().id, workbasket_id("GPK_KSC"));
}

#[rstest]
fn transfer_requires_transfer_on_source(harness: Harness) {
    let id = harness.create_id("L10000");
    harness
        .directory
        .grant(&workbasket_id("TEAMLEAD_1"), access_id("user-1-2"), [WorkbasketPermission::Append])
        .expect("grant stored");
    harness.act_as(reader());

    let result = harness
        .transfers
        .transfer(id, &workbasket_ref("TEAMLEAD_1"), None, true);

    assert!(matches!(result, Err(TaskError::NotAuthorized { .. })));
    assert_eq!(harness.reload(id).workbasket().id, workbasket_id("GPK_KSC"));
}

#[rstest]
fn transfer_tasks_reports_item_failures(harness: Harness) {
    let ready = harness.create_id("L10000");
    let claimed = harness.create_id("L10000");
    harness.lifecycle.claim(claimed).expect("claim succeeds");
    let done = harness.create_id("L10000");
    harness.complete(done);
    let missing = TaskId::new();

    let result = harness
        .transfers
        .transfer_tasks(&workbasket_ref("TEAMLEAD_1"), &[ready, claimed, done, missing], None)
        .expect("bulk transfer succeeds");

    assert_eq!(result.len(), 2);
    assert!(matches!(result.error_for(&done), Some(TaskError::InvalidState { .. })));
    assert!(matches!(result.error_for(&missing), Some(TaskError::NotFound(_))));
    harness.act_as(admin());
    for id in [ready, claimed] {
        let stored = harness.reload(id);
        assert_eq!(stored.workbasket().id, workbasket_id("TEAMLEAD_1"));
        assert_eq!(stored.state(), TaskState::Ready);
        assert!(stored.is_transferred());
    }
    assert_eq!(harness.reload(done).workbasket().id, workbasket_id("GPK_KSC"));
}

#[rstest]
fn transfer_tasks_to_unknown_destination_fails_whole_call(harness: Harness) {
    let id = harness.create_id("L10000");

    let result = harness
        .transfers
        .transfer_tasks(&workbasket_ref("NOWHERE"), &[id], None);

    assert!(matches!(result, Err(TaskError::NotFound(_))));
}

#[rstest]
fn reroute_moves_task_to_routed_workbasket() {
    let harness = routed_harness();
    let id = harness.create_id("L20000");

    let moved = harness.transfers.reroute(id).expect("reroute succeeds");

    assert_eq!(moved.workbasket().id, workbasket_id("TEAMLEAD_1"));
    assert!(moved.is_transferred());
    assert_eq!(
        event_kinds(&harness, id),
        [TaskEventKind::Created, TaskEventKind::Rerouted]
    );
}

#[rstest]
fn reroute_consults_a_host_supplied_router() {
    let harness = Harness::with_router(UrgentToTeamLead);
    let urgent = harness.create_id("L20000");
    let routine = harness.create_id("L10000");

    let result = harness
        .transfers
        .reroute_tasks(&[urgent, routine])
        .expect("bulk reroute succeeds");

    assert!(result.is_empty());
    assert_eq!(harness.reload(routine).workbasket().id, workbasket_id("GPK_KSC"));
    harness.act_as(admin());
    assert_eq!(harness.reload(urgent).workbasket().id, workbasket_id("TEAMLEAD_1"));
}

#[rstest]
fn reroute_without_route_leaves_task_in_place() {
    let harness = routed_harness();
    let id = harness.create_id("L10000");

    let unchanged = harness.transfers.reroute(id).expect("reroute succeeds");

    assert_eq!(unchanged.workbasket().id, workbasket_id("GPK_KSC"));
    assert_eq!(event_kinds(&harness, id), [TaskEventKind::Created]);
}

#[rstest]
fn reroute_tasks_fails_only_tasks_with_unusable_destination() {
    let harness = routed_harness();
    let routed = harness.create_id("L20000");
    let stranded = harness.create_id("L30000");
    let unrouted = harness.create_id("L10000");

    let result = harness
        .transfers
        .reroute_tasks(&[routed, stranded, unrouted])
        .expect("bulk reroute succeeds");

    assert_eq!(result.len(), 1);
    assert!(matches!(result.error_for(&stranded), Some(TaskError::NotFound(_))));
    assert_eq!(harness.reload(unrouted).workbasket().id, workbasket_id("GPK_KSC"));
    assert_eq!(harness.reload(stranded).workbasket().id, workbasket_id("GPK_KSC"));
    harness.act_as(admin());
    assert_eq!(harness.reload(routed).workbasket().id, workbasket_id("TEAMLEAD_1"));
    assert_eq!(
        event_kinds(&harness, routed).last(),
        Some(&TaskEventKind::Rerouted)
    );
}
