//! Bulk operations and their per-item failure reporting.

use std::collections::BTreeMap;

use super::helpers::{
    Harness, access_id, admin, harness, primary_reference, reader, stranger, workbasket_ref,
};
use rstest::rstest;
use tasklane::task::{
    domain::{CallbackState, CustomField, ExternalId, ObjectReference, TaskId, TaskState},
    services::{CreateTaskRequest, TaskError},
};

fn unknown_id() -> TaskId {
    TaskId::new()
}

fn fields(pairs: &[(&str, Option<&str>)]) -> BTreeMap<String, Option<String>> {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_owned(), value.map(ToOwned::to_owned)))
        .collect()
}

fn external(value: &str) -> ExternalId {
    ExternalId::new(value).expect("valid external id")
}

#[rstest]
fn set_owner_only_touches_ready_tasks(harness: Harness) {
    let ready = harness.create_id("L10000");
    let claimed = harness.create_id("L10000");
    harness.lifecycle.claim(claimed).expect("claim succeeds");
    let missing = unknown_id();

    let result = harness
        .lifecycle
        .set_owner_of_tasks(&access_id("user-1-2"), &[ready, claimed, missing])
        .expect("bulk call succeeds");

    assert_eq!(result.len(), 2);
    assert!(matches!(
        result.error_for(&claimed),
        Some(TaskError::InvalidState {
            state: TaskState::Claimed,
            ..
        })
    ));
    assert!(matches!(result.error_for(&missing), Some(TaskError::NotFound(_))));
    assert!(!result.contains(&ready));
    assert_eq!(harness.reload(ready).owner(), Some(&access_id("user-1-2")));
    assert_eq!(harness.reload(claimed).owner(), Some(&access_id("user-1-1")));
}

#[rstest]
fn bulk_calls_report_unreadable_tasks_per_id(harness: Harness) {
    let first = harness.create_id("L10000");
    let second = harness.create_id("L10000");
    harness.act_as(stranger());

    let result = harness
        .lifecycle
        .set_owner_of_tasks(&access_id("user-9-9"), &[first, second])
        .expect("bulk call succeeds");

    assert_eq!(result.len(), 2);
    for id in [first, second] {
        assert!(matches!(
            result.error_for(&id),
            Some(TaskError::NotAuthorized { .. })
        ));
    }
}

#[rstest]
fn empty_id_list_yields_empty_result(harness: Harness) {
    let result = harness
        .lifecycle
        .complete_tasks(&[])
        .expect("bulk call succeeds");

    assert!(result.is_empty());
}

#[rstest]
fn complete_tasks_skips_completed_and_rejects_unclaimed(harness: Harness) {
    let claimed = harness.create_id("L10000");
    harness.lifecycle.claim(claimed).expect("claim succeeds");
    let unclaimed = harness.create_id("L10000");
    let done = harness.create_id("L10000");
    harness.complete(done);

    let result = harness
        .lifecycle
        .complete_tasks(&[claimed, unclaimed, done, claimed])
        .expect("bulk call succeeds");

    assert_eq!(result.len(), 1);
    assert!(matches!(
        result.error_for(&unclaimed),
        Some(TaskError::InvalidState {
            state: TaskState::Ready,
            ..
        })
    ));
    let stored = harness.reload(claimed);
    assert_eq!(stored.state(), TaskState::Completed);
    assert!(stored.completed().is_some());
    assert!(stored.is_read());
}

#[rstest]
fn complete_tasks_refuses_foreign_claims(harness: Harness) {
    let id = harness.create_id("L10000");
    harness.lifecycle.claim(id).expect("claim succeeds");
    harness.act_as(reader());

    let result = harness
        .lifecycle
        .complete_tasks(&[id])
        .expect("bulk call succeeds");

    assert!(matches!(result.error_for(&id), Some(TaskError::InvalidOwner { .. })));
}

#[rstest]
fn force_complete_tasks_claims_for_the_caller(harness: Harness) {
    let unclaimed = harness.create_id("L10000");
    let foreign = harness.create_id("L10000");
    harness.lifecycle.claim(foreign).expect("claim succeeds");
    harness.act_as(reader());

    let result = harness
        .lifecycle
        .force_complete_tasks(&[unclaimed, foreign])
        .expect("bulk call succeeds");

    assert!(result.is_empty());
    let stored = harness.reload(unclaimed);
    assert_eq!(stored.state(), TaskState::Completed);
    assert_eq!(stored.owner(), Some(&access_id("user-1-2")));
    assert!(stored.claimed().is_some());
    assert_eq!(harness.reload(foreign).state(), TaskState::Completed);
}

#[rstest]
fn delete_tasks_requires_admin(harness: Harness) {
    let id = harness.create_id("L10000");
    harness.complete(id);

    let result = harness.lifecycle.delete_tasks(&[id]);

    assert!(matches!(result, Err(TaskError::NotAuthorized { .. })));
    assert_eq!(harness.reload(id).state(), TaskState::Completed);
}

#[rstest]
fn delete_tasks_removes_completed_tasks_only(harness: Harness) {
    let done = harness.create_id("L10000");
    harness.complete(done);
    let open = harness.create_id("L10000");
    let missing = unknown_id();
    harness.act_as(admin());

    let result = harness
        .lifecycle
        .delete_tasks(&[done, open, missing])
        .expect("bulk call succeeds");

    assert_eq!(result.len(), 2);
    assert!(matches!(result.error_for(&open), Some(TaskError::InvalidState { .. })));
    assert!(matches!(result.error_for(&missing), Some(TaskError::NotFound(_))));
    assert!(matches!(harness.lifecycle.get_task(done), Err(TaskError::NotFound(_))));
    assert_eq!(harness.reload(open).state(), TaskState::Ready);
}

#[rstest]
fn force_delete_tasks_ignores_state_but_not_pending_callbacks(harness: Harness) {
    let open = harness.create_id("L10000");
    let pending = harness
        .lifecycle
        .create_task(
            CreateTaskRequest::new(workbasket_ref("GPK_KSC"), "L10000", primary_reference())
                .with_callback_state(CallbackState::CallbackProcessingRequired),
        )
        .expect("task creation succeeds")
        .id();
    harness.act_as(admin());

    let result = harness
        .lifecycle
        .force_delete_tasks(&[open, pending])
        .expect("bulk call succeeds");

    assert_eq!(result.len(), 1);
    assert!(matches!(
        result.error_for(&pending),
        Some(TaskError::InvalidCallbackState { .. })
    ));
    assert!(matches!(harness.lifecycle.get_task(open), Err(TaskError::NotFound(_))));
}

#[rstest]
fn callback_state_is_set_by_external_id(harness: Harness) {
    let open = harness
        .lifecycle
        .create_task(
            CreateTaskRequest::new(workbasket_ref("GPK_KSC"), "L10000", primary_reference())
                .with_external_id(external("ETI:open")),
        )
        .expect("task creation succeeds");
    let done = harness
        .lifecycle
        .create_task(
            CreateTaskRequest::new(workbasket_ref("GPK_KSC"), "L10000", primary_reference())
                .with_external_id(external("ETI:done")),
        )
        .expect("task creation succeeds");
    harness.complete(done.id());

    let result = harness
        .lifecycle
        .set_callback_state_for_tasks(
            &[external("ETI:open"), external("ETI:done"), external("ETI:nowhere")],
            CallbackState::CallbackProcessingRequired,
        )
        .expect("bulk call succeeds");

    assert_eq!(result.len(), 2);
    assert!(!result.contains(&external("ETI:open")));
    assert!(matches!(
        result.error_for(&external("ETI:done")),
        Some(TaskError::InvalidState {
            state: TaskState::Completed,
            ..
        })
    ));
    assert!(matches!(
        result.error_for(&external("ETI:nowhere")),
        Some(TaskError::NotFound(_))
    ));
    assert_eq!(
        harness.reload(open.id()).callback_state(),
        CallbackState::CallbackProcessingRequired
    );
    assert_eq!(harness.reload(done.id()).callback_state(), CallbackState::None);
}

#[rstest]
fn custom_fields_are_updated_on_open_tasks(harness: Harness) {
    let open = harness
        .lifecycle
        .create_task(
            CreateTaskRequest::new(workbasket_ref("GPK_KSC"), "L10000", primary_reference())
                .with_custom_field(CustomField::Custom2, "stale"),
        )
        .expect("task creation succeeds")
        .id();
    let done = harness.create_id("L10000");
    harness.complete(done);

    let written = harness
        .lifecycle
        .update_custom_fields_by_ids(
            &[open, done, unknown_id()],
            &fields(&[("custom_1", Some("urgent")), ("custom_2", None)]),
        )
        .expect("update succeeds");

    assert_eq!(written, [open]);
    let stored = harness.reload(open);
    assert_eq!(stored.custom_field(CustomField::Custom1), Some("urgent"));
    assert_eq!(stored.custom_field(CustomField::Custom2), None);
    assert_eq!(harness.reload(done).custom_field(CustomField::Custom1), None);
}

#[rstest]
#[case::empty(&[])]
#[case::unknown_key(&[("custom_17", Some("x"))])]
fn custom_field_maps_are_validated(harness: Harness, #[case] pairs: &[(&str, Option<&str>)]) {
    let id = harness.create_id("L10000");

    let result = harness
        .lifecycle
        .update_custom_fields_by_ids(&[id], &fields(pairs));

    assert!(matches!(result, Err(TaskError::InvalidArgument(_))));
}

#[rstest]
fn custom_fields_are_updated_by_primary_reference(harness: Harness) {
    let matching = harness.create_id("L10000");
    let other = harness
        .lifecycle
        .create_task(CreateTaskRequest::new(
            workbasket_ref("GPK_KSC"),
            "L10000",
            ObjectReference::new("MyCompany1", "MyType1", "Elsewhere"),
        ))
        .expect("task creation succeeds")
        .id();

    let written = harness
        .lifecycle
        .update_custom_fields_by_reference(
            &primary_reference(),
            &fields(&[("custom_5", Some("batch-7"))]),
        )
        .expect("update succeeds");

    assert_eq!(written, [matching]);
    assert_eq!(
        harness.reload(matching).custom_field(CustomField::Custom5),
        Some("batch-7")
    );
    assert_eq!(harness.reload(other).custom_field(CustomField::Custom5), None);
}
