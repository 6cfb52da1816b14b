//! Attachments and secondary object references through create and update.

use std::collections::BTreeSet;

use super::helpers::{Harness, admin, harness, primary_reference, workbasket_ref};
use rstest::rstest;
use tasklane::task::{
    domain::{Attachment, ClassificationSummary, ObjectReference, Task, TaskSummary},
    ports::AttachmentRepository,
    query::TaskQuery,
    services::{CreateTaskRequest, TaskError},
};

fn attachment(classification_key: &str, channel: &str) -> Attachment {
    Attachment::new(ClassificationSummary::from_key(classification_key)).with_channel(channel)
}

fn with_attachments(harness: &Harness, attachments: Vec<Attachment>) -> Task {
    let request = attachments.into_iter().fold(
        CreateTaskRequest::new(workbasket_ref("GPK_KSC"), "L10000", primary_reference()),
        CreateTaskRequest::with_attachment,
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

#[rstest]
fn attachments_are_read_back_with_resolved_classifications(harness: Harness) {
    let created = with_attachments(
        &harness,
        vec![
            attachment("L10000", "email"),
            attachment("L20000", "fax"),
            attachment("L30000", "scan"),
        ],
    );

    let stored = harness.reload(created.id());

    assert_eq!(stored.attachments().len(), 3);
    for item in stored.attachments() {
        assert_eq!(item.task_id(), Some(created.id()));
        assert!(item.classification().service_level.is_some());
        assert!(item.classification().name.is_some());
    }
    assert_eq!(stored.priority(), 3);
    assert_eq!(TaskSummary::from(&stored).attachment_ids.len(), 3);
}

#[rstest]
fn attachment_with_unknown_classification_fails_creation(harness: Harness) {
    let result = harness.lifecycle.create_task(
        CreateTaskRequest::new(workbasket_ref("GPK_KSC"), "L10000", primary_reference())
            .with_attachment(attachment("L99999", "email")),
    );

    assert!(matches!(result, Err(TaskError::NotFound(_))));
    assert_eq!(
        harness
            .queries
            .count(&TaskQuery::new())
            .expect("count succeeds"),
        0
    );
}

#[rstest]
fn invalid_attachment_reference_rolls_back_creation(harness: Harness) {
    let broken = attachment("L10000", "email").with_object_reference(ObjectReference::new(
        "MyCompany1",
        "",
        "MyValue1",
    ));

    let result = harness.lifecycle.create_task(
        CreateTaskRequest::new(workbasket_ref("GPK_KSC"), "L10000", primary_reference())
            .with_attachment(broken),
    );

    assert!(matches!(result, Err(TaskError::InvalidArgument(_))));
    assert_eq!(
        harness
            .queries
            .count(&TaskQuery::new())
            .expect("count succeeds"),
        0
    );
}

#[rstest]
fn update_synchronises_attachment_changes(harness: Harness) {
    let created = with_attachments(
        &harness,
        vec![attachment("L10000", "email"), attachment("L10000", "fax")],
    );
    let mut task = harness.reload(created.id());
    let [first, second] = [0, 1].map(|position| {
        task.attachments()
            .get(position)
            .map(Attachment::id)
            .expect("two attachments")
    });
    task.remove_attachment(first);
    task.attachment_mut(second)
        .expect("attachment present")
        .set_channel(Some("portal".to_owned()));
    task.add_attachment(attachment("L20000", "scan"));

    harness.lifecycle.update_task(task).expect("update succeeds");

    let stored = harness.reload(created.id());
    assert_eq!(stored.attachments().len(), 2);
    assert_eq!(
        channels(&stored),
        BTreeSet::from(["portal".to_owned(), "scan".to_owned()])
    );
    assert_eq!(stored.priority(), 3);
}

#[rstest]
fn secondary_references_are_stored_and_synchronised(harness: Harness) {
    let created = harness
        .lifecycle
        .create_task(
            CreateTaskRequest::new(workbasket_ref("GPK_KSC"), "L10000", primary_reference())
                .with_secondary_object_reference(ObjectReference::new("C", "T", "one"))
                .with_secondary_object_reference(ObjectReference::new("C", "T", "two")),
        )
        .expect("task creation succeeds");
    let mut task = harness.reload(created.id());
    let removed = task
        .secondary_object_references()
        .iter()
        .find(|item| item.reference().value() == "one")
        .map(|item| item.id())
        .expect("reference present");
    task.remove_secondary_object_reference(removed);

    harness.lifecycle.update_task(task).expect("update succeeds");

    let values: Vec<String> = harness
        .reload(created.id())
        .secondary_object_references()
        .iter()
        .map(|item| item.reference().value().to_owned())
        .collect();
    assert_eq!(values, ["two"]);
}

#[rstest]
fn force_delete_removes_children(harness: Harness) {
    let created = with_attachments(&harness, vec![attachment("L10000", "email")]);
    harness.act_as(admin());

    harness
        .lifecycle
        .force_delete_task(created.id())
        .expect("delete succeeds");

    let remaining = harness
        .store
        .find_attachments(&[created.id()])
        .expect("lookup succeeds");
    assert!(remaining.is_empty());
}

#[rstest]
fn malformed_new_attachment_leaves_stored_children_untouched(harness: Harness) {
    let created = with_attachments(
        &harness,
        vec![attachment("L10000", "email"), attachment("L10000", "fax")],
    );
    let mut task = harness.reload(created.id());
    let email = task
        .attachments()
        .iter()
        .find(|item| item.channel() == Some("email"))
        .map(Attachment::id)
        .expect("email attachment present");
    task.remove_attachment(email);
    task.set_note(Some("changed".to_owned()));
    task.add_attachment(attachment("L10000", "scan").with_object_reference(
        ObjectReference::new("MyCompany1", " ", "MyValue1"),
    ));

    let result = harness.lifecycle.update_task(task);

    assert!(matches!(result, Err(TaskError::InvalidArgument(_))));
    let stored = harness.reload(created.id());
    assert_eq!(
        channels(&stored),
        BTreeSet::from(["email".to_owned(), "fax".to_owned()])
    );
    assert_eq!(stored.note(), None);
    assert_eq!(stored.version(), created.version());
}

#[rstest]
fn failed_attachment_insert_restores_row_and_children(harness: Harness) {
    let other = with_attachments(&harness, vec![attachment("L10000", "portal")]);
    let created = with_attachments(
        &harness,
        vec![attachment("L10000", "email"), attachment("L10000", "fax")],
    );
    let mut task = harness.reload(created.id());
    let email = task
        .attachments()
        .iter()
        .find(|item| item.channel() == Some("email"))
        .map(Attachment::id)
        .expect("email attachment present");
    task.remove_attachment(email);
    task.set_note(Some("changed".to_owned()));
    let taken = other
        .attachments()
        .first()
        .cloned()
        .expect("other task has an attachment");
    task.add_attachment(taken);

    let result = harness.lifecycle.update_task(task);

    assert!(matches!(result, Err(TaskError::AttachmentAlreadyExists(_))));
    let stored = harness.reload(created.id());
    assert_eq!(
        channels(&stored),
        BTreeSet::from(["email".to_owned(), "fax".to_owned()])
    );
    assert_eq!(stored.note(), None);
    assert_eq!(stored.version(), created.version());
    assert_eq!(harness.reload(other.id()).attachments().len(), 1);
}
