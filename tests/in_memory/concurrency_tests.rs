//! Writes that race a competing writer between read and write.

use std::collections::BTreeSet;

use chrono::{DateTime, TimeDelta, Utc};
use rstest::rstest;
use tasklane::task::{
    domain::{Attachment, CallbackState, ClassificationSummary, Task, TaskId, TaskState},
    ports::{AttachmentRepository, TaskPatch, TaskRepository},
    services::{CreateTaskRequest, TaskError},
};

use super::helpers::{
    Harness, TickingClock, access_id, admin, monday_morning, primary_reference, workbasket_ref,
};
use super::racing_store::Interference;

fn with_channels(harness: &Harness, channels: &[&str]) -> Task {
    let request = channels.iter().fold(
        CreateTaskRequest::new(workbasket_ref("GPK_KSC"), "L10000", primary_reference()),
        |request, channel| {
            request.with_attachment(
                Attachment::new(ClassificationSummary::from_key("L10000")).with_channel(*channel),
            )
        },
    );
    harness
        .lifecycle
        .create_task(request)
        .expect("task creation succeeds")
}

fn channels(task: &Task) -> BTreeSet<String> {
    task.attachments()
        .iter()
        .filter_map(|item| item.channel().map(ToOwned::to_owned))
        .collect()
}

/// Another writer applies `patch` to `id` right before the next write.
fn competing_write(id: TaskId, patch: TaskPatch) -> Interference {
    Interference::Meddle(Box::new(move |store| {
        store
            .update_many(&[id], &patch, None)
            .expect("competing write succeeds");
    }))
}

fn later() -> DateTime<Utc> {
    monday_morning() + TimeDelta::hours(1)
}

#[rstest]
fn row_conflict_on_update_leaves_children_untouched() {
    let (harness, racing) = Harness::racing();
    let created = with_channels(&harness, &["email", "fax"]);
    let mut task = harness.reload(created.id());
    let email = task
        .attachments()
        .iter()
        .find(|item| item.channel() == Some("email"))
        .map(Attachment::id)
        .expect("email attachment present");
    task.remove_attachment(email);
    task.add_attachment(
        Attachment::new(ClassificationSummary::from_key("L20000")).with_channel("scan"),
    );
    racing.before_next_write(competing_write(
        created.id(),
        TaskPatch::new(later()).with_read(true),
    ));

    let result = harness.lifecycle.update_task(task);

    assert!(matches!(result, Err(TaskError::Concurrency(id)) if id == created.id()));
    let stored = harness.reload(created.id());
    assert!(stored.is_read());
    assert_eq!(
        channels(&stored),
        BTreeSet::from(["email".to_owned(), "fax".to_owned()])
    );
}

#[rstest]
fn sub_microsecond_clock_keeps_follow_up_updates_fresh() {
    let start = monday_morning() + TimeDelta::nanoseconds(123_456_789);
    let harness = Harness::with_clock(TickingClock::starting_at(start));
    let id = harness.create_id("L10000");
    let other = harness.create_id("L10000");

    let claimed = harness.lifecycle.claim(id).expect("claim succeeds");

    assert_eq!(claimed.modified().timestamp_subsec_nanos(), 123_456_000);
    assert_eq!(
        claimed.claimed().map(|instant| instant.timestamp_subsec_nanos()),
        Some(123_456_000)
    );
    harness
        .lifecycle
        .update_task(claimed)
        .expect("update of a fresh claim succeeds");
    let owners = harness
        .lifecycle
        .set_owner_of_tasks(&access_id("user-1-2"), &[other])
        .expect("bulk call succeeds");
    assert!(owners.is_empty());
}

#[rstest]
fn task_claimed_before_owner_write_is_invalid_state() {
    let (harness, racing) = Harness::racing();
    let (kept, taken) = (harness.create_id("L10000"), harness.create_id("L10000"));
    racing.before_next_write(competing_write(
        taken,
        TaskPatch::new(later())
            .with_state(TaskState::Claimed)
            .with_owner(Some(access_id("user-1-1"))),
    ));

    let result = harness
        .lifecycle
        .set_owner_of_tasks(&access_id("user-1-2"), &[kept, taken])
        .expect("bulk call succeeds");

    assert_eq!(result.len(), 1);
    assert!(matches!(
        result.error_for(&taken),
        Some(TaskError::InvalidState { state: TaskState::Claimed, .. })
    ));
    assert_eq!(harness.reload(kept).owner(), Some(&access_id("user-1-2")));
    assert_eq!(harness.reload(taken).owner(), Some(&access_id("user-1-1")));
}

#[rstest]
fn row_skipped_by_batched_write_is_a_concurrency_failure() {
    let (harness, racing) = Harness::racing();
    let (written, skipped) = (harness.create_id("L10000"), harness.create_id("L10000"));
    racing.before_next_write(Interference::Skip(skipped));

    let result = harness
        .lifecycle
        .set_owner_of_tasks(&access_id("user-1-2"), &[written, skipped])
        .expect("bulk call succeeds");

    assert_eq!(result.failed_ids().copied().collect::<Vec<_>>(), [skipped]);
    assert!(matches!(
        result.error_for(&skipped),
        Some(TaskError::Concurrency(id)) if *id == skipped
    ));
    assert_eq!(result.unattributed_count(), 0);
    assert_eq!(harness.reload(skipped).owner(), None);
}

#[rstest]
fn row_removed_before_batched_write_is_not_found() {
    let (harness, racing) = Harness::racing();
    let (written, removed) = (harness.create_id("L10000"), harness.create_id("L10000"));
    racing.before_next_write(Interference::Meddle(Box::new(move |store| {
        store.delete(removed).expect("competing delete succeeds");
    })));

    let result = harness
        .lifecycle
        .set_owner_of_tasks(&access_id("user-1-2"), &[written, removed])
        .expect("bulk call succeeds");

    assert!(matches!(
        result.error_for(&removed),
        Some(TaskError::NotFound(_))
    ));
    assert!(result.error_for(&written).is_none());
}

#[rstest]
fn under_reported_batch_leaves_an_unattributed_failure() {
    let (harness, racing) = Harness::racing();
    let ids = [harness.create_id("L10000"), harness.create_id("L10000")];
    racing.before_next_write(Interference::UnderReport);

    let result = harness
        .lifecycle
        .set_owner_of_tasks(&access_id("user-1-2"), &ids)
        .expect("bulk call succeeds");

    assert_eq!(result.len(), 1);
    assert_eq!(result.unattributed_count(), 1);
    assert_eq!(result.failed_ids().count(), 0);
    for id in ids {
        assert_eq!(harness.reload(id).owner(), Some(&access_id("user-1-2")));
    }
}

#[rstest]
fn callback_requested_before_delete_keeps_task_and_children() {
    let (harness, racing) = Harness::racing();
    let pending = with_channels(&harness, &["email"]).id();
    let deletable = with_channels(&harness, &["fax"]).id();
    harness.complete(pending);
    harness.complete(deletable);
    harness.act_as(admin());
    racing.before_next_write(competing_write(
        pending,
        TaskPatch::new(later()).with_callback_state(CallbackState::CallbackProcessingRequired),
    ));

    let result = harness
        .lifecycle
        .delete_tasks(&[pending, deletable])
        .expect("bulk call succeeds");

    assert_eq!(result.len(), 1);
    assert!(matches!(
        result.error_for(&pending),
        Some(TaskError::InvalidCallbackState { .. })
    ));
    assert_eq!(channels(&harness.reload(pending)), BTreeSet::from(["email".to_owned()]));
    assert!(matches!(
        harness.lifecycle.get_task(deletable),
        Err(TaskError::NotFound(_))
    ));
    assert!(
        harness
            .store
            .find_attachments(&[deletable])
            .expect("attachments readable")
            .is_empty()
    );
}

#[rstest]
fn task_reopened_before_delete_is_invalid_state() {
    let (harness, racing) = Harness::racing();
    let id = with_channels(&harness, &["email"]).id();
    harness.complete(id);
    harness.act_as(admin());
    racing.before_next_write(competing_write(
        id,
        TaskPatch::new(later()).with_state(TaskState::Ready),
    ));

    let result = harness.lifecycle.delete_task(id);

    assert!(matches!(
        result,
        Err(TaskError::InvalidState { state: TaskState::Ready, .. })
    ));
    assert_eq!(channels(&harness.reload(id)), BTreeSet::from(["email".to_owned()]));
}

#[rstest]
fn task_left_alone_by_delete_is_a_concurrency_failure() {
    let (harness, racing) = Harness::racing();
    let id = harness.create_id("L10000");
    harness.complete(id);
    harness.act_as(admin());
    racing.before_next_write(Interference::Skip(id));

    let result = harness
        .lifecycle
        .delete_tasks(&[id])
        .expect("bulk call succeeds");

    assert!(matches!(
        result.error_for(&id),
        Some(TaskError::Concurrency(task_id)) if *task_id == id
    ));
    assert_eq!(harness.reload(id).state(), TaskState::Completed);
}
