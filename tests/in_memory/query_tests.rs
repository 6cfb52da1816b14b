//! Filtering, ordering, paging and read scoping of task queries.

use super::helpers::{
    Harness, admin, harness, primary_reference, user, workbasket_id, workbasket_ref,
};
use rstest::rstest;
use tasklane::task::{
    domain::{Attachment, ClassificationSummary, TaskId, TaskState},
    query::{FilterValue, QueryField, SortDirection, TaskQuery},
    services::{CreateTaskRequest, TaskError},
};

fn named(harness: &Harness, workbasket: &str, classification_key: &str, name: &str) -> TaskId {
    harness
        .lifecycle
        .create_task(
            CreateTaskRequest::new(
                workbasket_ref(workbasket),
                classification_key,
                primary_reference(),
            )
            .with_name(name),
        )
        .expect("task creation succeeds")
        .id()
}

fn ids(harness: &Harness, query: &TaskQuery) -> Vec<TaskId> {
    harness
        .queries
        .list(query)
        .expect("query succeeds")
        .into_iter()
        .map(|summary| summary.id)
        .collect()
}

#[rstest]
fn filters_intersect_with_readable_workbaskets(harness: Harness) {
    let visible = named(&harness, "GPK_KSC", "L20000", "Akte 1");
    named(&harness, "GPK_KSC", "L10000", "Akte 2");
    harness.act_as(admin());
    named(&harness, "TEAMLEAD_1", "L20000", "Akte 3");
    harness.act_as(user());

    let query = TaskQuery::new()
        .state_in([TaskState::Ready])
        .priority_in([3]);

    assert_eq!(ids(&harness, &query), [visible]);
    harness.act_as(admin());
    assert_eq!(harness.queries.count(&query).expect("count succeeds"), 2);
}

#[rstest]
fn group_membership_grants_read_access(harness: Harness) {
    harness.act_as(admin());
    let grouped = named(&harness, "GPK_B_KSC", "L10000", "Gruppe");
    harness.act_as(user());

    let found = ids(&harness, &TaskQuery::new().workbasket_id_in([workbasket_id("GPK_B_KSC")]));

    assert_eq!(found, [grouped]);
}

#[rstest]
fn named_workbasket_without_read_is_refused(harness: Harness) {
    let query = TaskQuery::new().workbasket_id_in([workbasket_id("TEAMLEAD_1")]);

    let result = harness.queries.list(&query);

    assert!(matches!(result, Err(TaskError::NotAuthorized { .. })));
}

#[rstest]
fn unknown_named_workbasket_is_not_found(harness: Harness) {
    let query = TaskQuery::new().workbasket_id_in([workbasket_id("NOWHERE")]);

    let result = harness.queries.count(&query);

    assert!(matches!(result, Err(TaskError::NotFound(_))));
}

#[rstest]
fn results_follow_sort_keys_in_order(harness: Harness) {
    let low_b = named(&harness, "GPK_KSC", "L10000", "B");
    let high = named(&harness, "GPK_KSC", "L20000", "C");
    let low_a = named(&harness, "GPK_KSC", "L10000", "A");
    let mid = named(&harness, "GPK_KSC", "L30000", "A");

    let query = TaskQuery::new()
        .order_by(QueryField::Priority, SortDirection::Descending)
        .order_by(QueryField::Name, SortDirection::Ascending);

    assert_eq!(ids(&harness, &query), [high, mid, low_a, low_b]);
}

#[rstest]
fn like_patterns_ignore_case(harness: Harness) {
    let upper = named(&harness, "GPK_KSC", "L10000", "AKTE 7");
    let lower = named(&harness, "GPK_KSC", "L10000", "akte 8");
    named(&harness, "GPK_KSC", "L10000", "Brief");

    let mut found = ids(&harness, &TaskQuery::new().name_like(["Akte%"]));
    found.sort_unstable();
    let mut expected = vec![upper, lower];
    expected.sort_unstable();

    assert_eq!(found, expected);
}

#[rstest]
fn pages_slice_the_ordered_result(harness: Harness) {
    let first = named(&harness, "GPK_KSC", "L10000", "1");
    let second = named(&harness, "GPK_KSC", "L10000", "2");
    let third = named(&harness, "GPK_KSC", "L10000", "3");
    let query = TaskQuery::new().order_by(QueryField::Name, SortDirection::Ascending);

    let page: Vec<TaskId> = harness
        .queries
        .list_page(&query, 1, 5)
        .expect("page succeeds")
        .into_iter()
        .map(|summary| summary.id)
        .collect();

    assert_eq!(page, [second, third]);
    assert_eq!(
        harness
            .queries
            .list_page(&query, 0, 1)
            .expect("page succeeds")
            .first()
            .map(|summary| summary.id),
        Some(first)
    );
}

#[rstest]
fn page_beyond_last_match_is_rejected(harness: Harness) {
    named(&harness, "GPK_KSC", "L10000", "only");
    let query = TaskQuery::new();

    let beyond = harness.queries.list_page(&query, 1, 10);
    let empty_first_page = harness
        .queries
        .list_page(&TaskQuery::new().name_like(["nothing%"]), 0, 10)
        .expect("first page of nothing is empty");

    assert!(matches!(
        beyond,
        Err(TaskError::PageOutOfRange {
            offset: 1,
            available: 1
        })
    ));
    assert!(empty_first_page.is_empty());
}

#[rstest]
fn distinct_values_skip_duplicates_and_nulls(harness: Harness) {
    let attachment = |channel: Option<&str>| {
        let plain = Attachment::new(ClassificationSummary::from_key("L10000"));
        match channel {
            Some(value) => plain.with_channel(value),
            None => plain,
        }
    };
    harness
        .lifecycle
        .create_task(
            CreateTaskRequest::new(workbasket_ref("GPK_KSC"), "L10000", primary_reference())
                .with_attachment(attachment(Some("fax")))
                .with_attachment(attachment(Some("email")))
                .with_attachment(attachment(None)),
        )
        .expect("task creation succeeds");
    harness
        .lifecycle
        .create_task(
            CreateTaskRequest::new(workbasket_ref("GPK_KSC"), "L10000", primary_reference())
                .with_attachment(attachment(Some("email"))),
        )
        .expect("task creation succeeds");

    let values = harness
        .queries
        .list_values(&TaskQuery::new(), QueryField::AttachmentChannel, SortDirection::Ascending)
        .expect("values succeed");

    assert_eq!(
        values,
        [
            FilterValue::Text("email".to_owned()),
            FilterValue::Text("fax".to_owned())
        ]
    );
}

#[rstest]
fn single_returns_first_match_and_count_counts_all(harness: Harness) {
    named(&harness, "GPK_KSC", "L10000", "b");
    let first = named(&harness, "GPK_KSC", "L10000", "a");
    let query = TaskQuery::new().order_by(QueryField::Name, SortDirection::Ascending);

    let single = harness.queries.single(&query).expect("query succeeds");
    let none = harness
        .queries
        .single(&TaskQuery::new().state_in([TaskState::Completed]))
        .expect("query succeeds");

    assert_eq!(single.map(|summary| summary.id), Some(first));
    assert!(none.is_none());
    assert_eq!(harness.queries.count(&query).expect("count succeeds"), 2);
}
