//! Single-task lifecycle behaviour against the in-memory store.

use super::helpers::{
    Harness, access_id, admin, date, harness, primary_reference, reader, user, workbasket_id,
    workbasket_ref,
};
use rstest::rstest;
use tasklane::task::{
    domain::{ExternalId, ObjectReference, TaskState},
    ports::TaskEventKind,
    query::{QueryField, SortDirection, TaskQuery},
    services::{CreateTaskRequest, TaskError, WorkbasketRef},
};

#[rstest]
fn created_task_is_ready_with_derived_dates(harness: Harness) {
    let task = harness
        .lifecycle
        .create_task(
            CreateTaskRequest::new(workbasket_ref("GPK_KSC"), "L10000", primary_reference())
                .with_name("Akte 1")
                .with_external_id(ExternalId::new("ETI:1").expect("valid external id")),
        )
        .expect("task creation succeeds");

    assert_eq!(task.state(), TaskState::Ready);
    assert_eq!(task.priority(), 1);
    assert_eq!(task.creator(), Some(&access_id("user-1-1")));
    assert_eq!(task.external_id().as_str(), "ETI:1");
    assert!(task.business_process_id().starts_with("BPI:"));
    assert_eq!(task.planned().map(|instant| instant.date_naive()), Some(date(2026, 3, 2)));
    assert_eq!(task.due().map(|instant| instant.date_naive()), Some(date(2026, 3, 3)));
    assert_eq!(harness.reload(task.id()).name(), Some("Akte 1"));
}

#[rstest]
fn workbasket_can_be_addressed_by_key_and_domain(harness: Harness) {
    let destination = WorkbasketRef::KeyDomain {
        key: "GPK_KSC".to_owned(),
        domain: "DOMAIN_A".to_owned(),
    };

    let task = harness
        .lifecycle
        .create_task(CreateTaskRequest::new(destination, "L10000", primary_reference()))
        .expect("task creation succeeds");

    assert_eq!(task.workbasket().id, workbasket_id("GPK_KSC"));
}

#[rstest]
fn create_requires_append_permission(harness: Harness) {
    harness.act_as(reader());

    let result = harness.lifecycle.create_task(CreateTaskRequest::new(
        workbasket_ref("GPK_KSC"),
        "L10000",
        primary_reference(),
    ));

    assert!(matches!(result, Err(TaskError::NotAuthorized { .. })));
}

#[rstest]
#[case::unknown_classification("GPK_KSC", "L99999")]
#[case::unknown_workbasket("NOWHERE", "L10000")]
fn create_with_unknown_reference_is_not_found(
    harness: Harness,
    #[case] workbasket: &str,
    #[case] classification_key: &str,
) {
    let result = harness.lifecycle.create_task(CreateTaskRequest::new(
        workbasket_ref(workbasket),
        classification_key,
        primary_reference(),
    ));

    assert!(matches!(result, Err(TaskError::NotFound(_))));
}

#[rstest]
fn create_in_retired_workbasket_is_not_found(harness: Harness) {
    harness
        .directory
        .mark_for_deletion(&workbasket_id("GPK_KSC"))
        .expect("workbasket flagged");

    let result = harness.lifecycle.create_task(CreateTaskRequest::new(
        workbasket_ref("GPK_KSC"),
        "L10000",
        primary_reference(),
    ));

    assert!(matches!(result, Err(TaskError::NotFound(_))));
}

#[rstest]
fn create_rejects_blank_object_reference(harness: Harness) {
    let result = harness.lifecycle.create_task(CreateTaskRequest::new(
        workbasket_ref("GPK_KSC"),
        "L10000",
        ObjectReference::new("MyCompany1", "MyType1", ""),
    ));

    assert!(matches!(result, Err(TaskError::InvalidArgument(_))));
}

#[rstest]
fn duplicate_external_id_is_rejected(harness: Harness) {
    let external_id = ExternalId::new("ETI:dup").expect("valid external id");
    let request = CreateTaskRequest::new(workbasket_ref("GPK_KSC"), "L10000", primary_reference())
        .with_external_id(external_id.clone());
    harness
        .lifecycle
        .create_task(request.clone())
        .expect("first creation succeeds");

    let result = harness.lifecycle.create_task(request);

    assert!(matches!(result, Err(TaskError::AlreadyExists(id)) if id == external_id));
    assert_eq!(
        harness.queries.count(&TaskQuery::new()).expect("count succeeds"),
        1
    );
}

#[rstest]
fn claim_records_owner_and_timestamps(harness: Harness) {
    let id = harness.create_id("L10000");

    let claimed = harness.lifecycle.claim(id).expect("claim succeeds");

    assert_eq!(claimed.state(), TaskState::Claimed);
    assert_eq!(claimed.owner(), Some(&access_id("user-1-1")));
    assert!(claimed.claimed().is_some());
    assert!(claimed.is_read());
    assert_eq!(claimed.modified(), claimed.claimed().expect("claimed timestamp"));
    let stored = harness.reload(id);
    assert_eq!(stored.state(), TaskState::Claimed);
    assert_eq!(stored.owner(), claimed.owner());

    let kinds: Vec<TaskEventKind> = harness
        .history
        .events_for(id)
        .into_iter()
        .map(|event| event.kind)
        .collect();
    assert_eq!(kinds, [TaskEventKind::Created, TaskEventKind::Claimed]);
}

#[rstest]
fn claim_of_foreign_claim_needs_force(harness: Harness) {
    let id = harness.create_id("L10000");
    harness.lifecycle.claim(id).expect("claim succeeds");
    harness.act_as(reader());

    let refused = harness.lifecycle.claim(id);
    let forced = harness.lifecycle.force_claim(id).expect("forced claim succeeds");

    assert!(matches!(refused, Err(TaskError::InvalidOwner { .. })));
    assert_eq!(forced.owner(), Some(&access_id("user-1-2")));
}

#[rstest]
fn cancel_claim_returns_task_to_ready(harness: Harness) {
    let id = harness.create_id("L10000");
    harness.lifecycle.claim(id).expect("claim succeeds");

    let released = harness.lifecycle.cancel_claim(id).expect("cancel succeeds");

    assert_eq!(released.state(), TaskState::Ready);
    assert_eq!(released.owner(), None);
    assert_eq!(released.claimed(), None);
}

#[rstest]
fn completing_twice_is_idempotent(harness: Harness) {
    let id = harness.create_id("L10000");
    let completed = harness.complete(id);

    let again = harness.lifecycle.complete(id).expect("repeat completion succeeds");

    assert_eq!(completed.state(), TaskState::Completed);
    assert_eq!(again.completed(), completed.completed());
    assert_eq!(again.modified(), completed.modified());
    let completions = harness
        .history
        .events_for(id)
        .into_iter()
        .filter(|event| event.kind == TaskEventKind::Completed)
        .count();
    assert_eq!(completions, 1);
}

#[rstest]
fn complete_of_unclaimed_task_is_invalid_state(harness: Harness) {
    let id = harness.create_id("L10000");

    let result = harness.lifecycle.complete(id);

    assert!(matches!(
        result,
        Err(TaskError::InvalidState {
            state: TaskState::Ready,
            ..
        })
    ));
    let forced = harness.lifecycle.force_complete(id).expect("forced completion succeeds");
    assert_eq!(forced.state(), TaskState::Completed);
    assert_eq!(forced.owner(), Some(&access_id("user-1-1")));
}

#[rstest]
fn stale_update_is_rejected_and_leaves_row_unchanged(harness: Harness) {
    let id = harness.create_id("L10000");
    let mut stale = harness.reload(id);
    harness
        .lifecycle
        .set_task_read(id, true)
        .expect("read flag updated");
    stale.set_note(Some("overwritten".to_owned()));

    let result = harness.lifecycle.update_task(stale);

    assert!(matches!(result, Err(TaskError::Concurrency(task_id)) if task_id == id));
    let stored = harness.reload(id);
    assert_eq!(stored.note(), None);
    assert!(stored.is_read());
}

#[rstest]
fn update_persists_changed_attributes(harness: Harness) {
    let id = harness.create_id("L10000");
    let mut task = harness.reload(id);
    task.set_note(Some("call back".to_owned()));
    task.set_primary_object_reference(ObjectReference::new("MyCompany2", "MyType1", "MyValue9"));

    let updated = harness.lifecycle.update_task(task).expect("update succeeds");

    let stored = harness.reload(id);
    assert_eq!(stored.note(), Some("call back"));
    assert_eq!(stored.primary_object_reference().value(), "MyValue9");
    assert_eq!(stored.modified(), updated.modified());
    let changed_fields: Vec<String> = harness
        .history
        .events_for(id)
        .into_iter()
        .filter(|event| event.kind == TaskEventKind::Updated)
        .flat_map(|event| event.changes)
        .map(|change| change.field)
        .collect();
    assert!(changed_fields.contains(&"note".to_owned()));
}

#[rstest]
fn update_rejects_workbasket_change(harness: Harness) {
    let id = harness.create_id("L10000");
    let mut task = harness.reload(id);
    let mut moved = task.workbasket().clone();
    moved.id = workbasket_id("TEAMLEAD_1");
    task.set_workbasket(moved);

    let result = harness.lifecycle.update_task(task);

    assert!(matches!(result, Err(TaskError::InvalidArgument(_))));
}

#[rstest]
fn owner_changes_only_while_ready(harness: Harness) {
    let id = harness.create_id("L10000");
    let mut task = harness.lifecycle.claim(id).expect("claim succeeds");
    task.set_owner(Some(access_id("user-1-2")));

    let result = harness.lifecycle.update_task(task);

    assert!(matches!(result, Err(TaskError::InvalidState { .. })));
}

#[rstest]
fn reading_requires_read_permission(harness: Harness) {
    harness.act_as(admin());
    let id = harness.create("GPK_B_KSC", "L10000").id();
    harness.act_as(reader());

    let result = harness.lifecycle.get_task(id);

    assert!(matches!(result, Err(TaskError::NotAuthorized { .. })));
}

#[rstest]
fn deletion_requires_admin_and_completion(harness: Harness) {
    let id = harness.create_id("L10000");

    let as_user = harness.lifecycle.delete_task(id);
    harness.act_as(admin());
    let not_completed = harness.lifecycle.delete_task(id);
    harness.lifecycle.force_delete_task(id).expect("forced delete succeeds");

    assert!(matches!(as_user, Err(TaskError::NotAuthorized { .. })));
    assert!(matches!(not_completed, Err(TaskError::InvalidState { .. })));
    assert!(matches!(
        harness.lifecycle.get_task(id),
        Err(TaskError::NotFound(_))
    ));
}

#[rstest]
fn completed_task_can_be_deleted(harness: Harness) {
    let id = harness.create_id("L10000");
    harness.complete(id);
    harness.act_as(admin());

    harness.lifecycle.delete_task(id).expect("delete succeeds");

    assert!(matches!(
        harness.lifecycle.delete_task(id),
        Err(TaskError::NotFound(_))
    ));
}

#[rstest]
fn select_and_claim_takes_highest_priority_first(harness: Harness) {
    let low = harness.create_id("L10000");
    let high = harness.create_id("L20000");
    let query = TaskQuery::new()
        .workbasket_id_in([workbasket_id("GPK_KSC")])
        .order_by(QueryField::Priority, SortDirection::Descending);

    let first = harness.lifecycle.select_and_claim(&query).expect("selection succeeds");
    let second = harness.lifecycle.select_and_claim(&query).expect("selection succeeds");
    let third = harness.lifecycle.select_and_claim(&query).expect("selection succeeds");

    assert_eq!(first.as_ref().map(|task| task.id()), Some(high));
    assert_eq!(second.as_ref().map(|task| task.id()), Some(low));
    assert!(third.is_none());
    let stored = harness.reload(high);
    assert_eq!(stored.state(), TaskState::Claimed);
    assert_eq!(stored.owner(), Some(user().user_id()));
}
