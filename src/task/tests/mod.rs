//! Unit tests for the task domain, query planning and SQL rendering.


use crate::task::domain::{
    AccessId, CallbackState, ClassificationId, ClassificationSummary, ExternalId, NewTaskData,
    ObjectReference, Task, WorkbasketId, WorkbasketSummary,
};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;

/// Fixed instant on a Monday.
pub(super) fn monday_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0)
        .single()
        .expect("valid fixed instant")
}

pub(super) fn access_id(value: &str) -> AccessId {
    AccessId::new(value).expect("valid access id")
}

pub(super) fn classification(key: &str, service_level: &str, priority: i32) -> ClassificationSummary {
    ClassificationSummary {
        id: Some(ClassificationId::new(format!("CLI:{key}")).expect("valid classification id")),
        service_level: Some(service_level.to_owned()),
        priority,
        domain: "DOMAIN_A".to_owned(),
        category: Some("EXTERNAL".to_owned()),
        ..ClassificationSummary::from_key(key)
    }
}

pub(super) fn workbasket(key: &str) -> WorkbasketSummary {
    WorkbasketSummary {
        id: WorkbasketId::new(format!("WBI:{key}")).expect("valid workbasket id"),
        key: key.to_owned(),
        domain: "DOMAIN_A".to_owned(),
        name: None,
    }
}

/// A `Ready` task in `GPK_KSC` created at [`monday_morning`].
pub(super) fn ready_task() -> Task {
    let data = NewTaskData {
        external_id: ExternalId::new("ETI:unit").expect("valid external id"),
        workbasket: workbasket("GPK_KSC"),
        classification: classification("L10000", "P1D", 1),
        primary_object_reference: ObjectReference::new("MyCompany1", "MyType1", "MyValue1"),
        business_process_id: "BPI:unit".to_owned(),
        parent_business_process_id: None,
        name: Some("unit task".to_owned()),
        note: None,
        owner: None,
        creator: Some(access_id("user-1-1")),
        planned: None,
        due: None,
        received: None,
        callback_state: CallbackState::None,
        callback_info: BTreeMap::new(),
        custom: BTreeMap::new(),
        custom_int: BTreeMap::new(),
        custom_attributes: BTreeMap::new(),
        attachments: Vec::new(),
        secondary_object_references: Vec::new(),
    };
    Task::new(data, monday_morning())
}
