//! Priority and planned/due derivation through the engine.

use super::helpers::{
    Harness, at, classification, date, harness, primary_reference, workbasket_ref,
};
use chrono::NaiveDate;
use rstest::rstest;
use tasklane::task::{
    domain::{Attachment, ClassificationSummary, Task, TaskState},
    services::{CreateTaskRequest, TaskError},
};

fn planned_and_due(task: &Task) -> (Option<NaiveDate>, Option<NaiveDate>) {
    (
        task.planned().map(|instant| instant.date_naive()),
        task.due().map(|instant| instant.date_naive()),
    )
}

fn planned_on(harness: &Harness, classification_key: &str, planned: NaiveDate) -> Task {
    let start = planned.and_hms_opt(9, 0, 0).expect("valid time").and_utc();
    harness
        .lifecycle
        .create_task(
            CreateTaskRequest::new(
                workbasket_ref("GPK_KSC"),
                classification_key,
                primary_reference(),
            )
            .with_planned(start),
        )
        .expect("task creation succeeds")
}

#[rstest]
fn shortest_service_level_and_highest_priority_win(harness: Harness) {
    let task = harness
        .lifecycle
        .create_task(
            CreateTaskRequest::new(workbasket_ref("GPK_KSC"), "L20000", primary_reference())
                .with_attachment(Attachment::new(ClassificationSummary::from_key("L10000"))),
        )
        .expect("task creation succeeds");

    let resolution = harness
        .lifecycle
        .resolver()
        .resolve(&task)
        .expect("service level resolves");

    assert_eq!(resolution.working_days(), 1);
    assert_eq!(resolution.priority, 3);
    assert_eq!(task.priority(), 3);
    assert_eq!(planned_and_due(&task), (Some(date(2026, 3, 2)), Some(date(2026, 3, 3))));
}

#[rstest]
fn due_skips_the_weekend(harness: Harness) {
    let task = planned_on(&harness, "L10000", date(2026, 3, 6));

    assert_eq!(planned_and_due(&task), (Some(date(2026, 3, 6)), Some(date(2026, 3, 9))));
}

#[rstest]
fn due_skips_easter_holidays(harness: Harness) {
    let task = planned_on(&harness, "L10000", date(2026, 4, 2));

    assert_eq!(planned_and_due(&task), (Some(date(2026, 4, 2)), Some(date(2026, 4, 7))));
}

#[rstest]
fn changing_due_alone_moves_planned_backwards(harness: Harness) {
    let id = harness.create_id("L10000");
    let mut task = harness.reload(id);
    task.set_due(Some(at(2026, 3, 6, 17)));

    let updated = harness.lifecycle.update_task(task).expect("update succeeds");

    assert_eq!(planned_and_due(&updated), (Some(date(2026, 3, 5)), Some(date(2026, 3, 6))));
    assert_eq!(planned_and_due(&harness.reload(id)), planned_and_due(&updated));
}

#[rstest]
fn inconsistent_planned_and_due_are_rejected(harness: Harness) {
    let id = harness.create_id("L10000");
    let mut task = harness.reload(id);
    task.set_planned(Some(at(2026, 3, 4, 9)));
    task.set_due(Some(at(2026, 3, 9, 9)));

    let result = harness.lifecycle.update_task(task);

    assert!(matches!(result, Err(TaskError::InvalidArgument(_))));
    assert_eq!(
        planned_and_due(&harness.reload(id)),
        (Some(date(2026, 3, 2)), Some(date(2026, 3, 3)))
    );
}

#[rstest]
fn consistent_planned_and_due_are_accepted(harness: Harness) {
    let id = harness.create_id("L10000");
    let mut task = harness.reload(id);
    task.set_planned(Some(at(2026, 3, 4, 9)));
    task.set_due(Some(at(2026, 3, 5, 9)));

    let updated = harness.lifecycle.update_task(task).expect("update succeeds");

    assert_eq!(planned_and_due(&updated), (Some(date(2026, 3, 4)), Some(date(2026, 3, 5))));
}

#[rstest]
fn set_planned_recomputes_due_per_service_level(harness: Harness) {
    let short = harness.create_id("L10000");
    let long = harness.create_id("L30000");
    let done = harness.create_id("L10000");
    harness.complete(done);

    let result = harness
        .lifecycle
        .set_planned_of_tasks(at(2026, 3, 6, 9), &[short, long, done])
        .expect("bulk call succeeds");

    assert_eq!(result.len(), 1);
    assert!(matches!(
        result.error_for(&done),
        Some(TaskError::InvalidState {
            state: TaskState::Completed,
            ..
        })
    ));
    assert_eq!(
        planned_and_due(&harness.reload(short)),
        (Some(date(2026, 3, 6)), Some(date(2026, 3, 9)))
    );
    assert_eq!(
        planned_and_due(&harness.reload(long)),
        (Some(date(2026, 3, 6)), Some(date(2026, 3, 11)))
    );
}

#[rstest]
fn refresh_follows_changed_classification(harness: Harness) {
    let id = harness.create_id("L10000");
    harness
        .directory
        .add_classification(classification("L10000", "P3D", 1))
        .expect("classification replaced");

    let result = harness
        .lifecycle
        .resolver()
        .refresh_due_dates(&[id])
        .expect("refresh succeeds");

    assert!(result.is_empty());
    assert_eq!(
        planned_and_due(&harness.reload(id)),
        (Some(date(2026, 3, 2)), Some(date(2026, 3, 5)))
    );
}

#[rstest]
fn refresh_reports_unreachable_due_dates_per_task(harness: Harness) {
    let short = harness.create_id("L10000");
    let endless = harness.create_id("L20000");
    harness
        .directory
        .add_classification(classification("L10000", "P3D", 1))
        .expect("classification replaced");
    harness
        .directory
        .add_classification(classification("L20000", "P99999D", 3))
        .expect("classification replaced");

    let result = harness
        .lifecycle
        .resolver()
        .refresh_due_dates(&[endless, short])
        .expect("refresh continues past a failing task");

    assert_eq!(result.len(), 1);
    assert!(matches!(result.error_for(&endless), Some(TaskError::System(_))));
    assert_eq!(
        planned_and_due(&harness.reload(short)),
        (Some(date(2026, 3, 2)), Some(date(2026, 3, 5)))
    );
    assert_eq!(
        planned_and_due(&harness.reload(endless)),
        (Some(date(2026, 3, 2)), Some(date(2026, 3, 4)))
    );
}
