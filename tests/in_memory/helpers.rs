//! Shared fixtures for the in-memory engine integration tests.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Local, NaiveDate, TimeDelta, TimeZone, Utc};
use mockable::Clock;
use rstest::fixture;

use super::racing_store::RacingStore;
use tasklane::task::{
    adapters::memory::{
        InMemoryDirectory, InMemoryTaskStore, RecordingHistorySink, StaticCallerContext,
        StaticRouter,
    },
    config::TaskEngineConfig,
    domain::{AccessId, ClassificationId, ClassificationSummary, ObjectReference, Task, TaskId,
        WorkbasketId, WorkbasketSummary},
    ports::{Caller, Role, TaskRouter, TaskStore, Workbasket, WorkbasketPermission},
    services::{
        CreateTaskRequest, TaskLifecycleService, TaskPorts, TaskQueryService,
        TaskTransferService, WorkbasketRef,
    },
};

/// Domain every fixture workbasket and classification lives in.
pub const DOMAIN: &str = "DOMAIN_A";

/// Clock that moves forward one second on every reading.
#[derive(Debug)]
pub struct TickingClock {
    now: Mutex<DateTime<Utc>>,
}

impl TickingClock {
    /// Starts the clock at `start`.
    #[must_use]
    pub const fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }
}

impl Clock for TickingClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += TimeDelta::seconds(1);
        *now
    }
}

/// Monday 2 March 2026, 09:00 UTC.
#[must_use]
pub fn monday_morning() -> DateTime<Utc> {
    at(2026, 3, 2, 9)
}

/// Builds an instant on the hour.
#[must_use]
pub fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
        .single()
        .expect("valid fixture instant")
}

/// Builds a calendar date.
#[must_use]
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid fixture date")
}

#[must_use]
pub fn access_id(value: &str) -> AccessId {
    AccessId::new(value).expect("valid access id")
}

#[must_use]
pub fn workbasket_id(key: &str) -> WorkbasketId {
    WorkbasketId::new(format!("WBI:{key}")).expect("valid workbasket id")
}

#[must_use]
pub fn workbasket_ref(key: &str) -> WorkbasketRef {
    WorkbasketRef::Id(workbasket_id(key))
}

#[must_use]
pub fn classification(key: &str, service_level: &str, priority: i32) -> ClassificationSummary {
    ClassificationSummary {
        id: Some(ClassificationId::new(format!("CLI:{key}")).expect("valid classification id")),
        name: Some(format!("Classification {key}")),
        service_level: Some(service_level.to_owned()),
        priority,
        domain: DOMAIN.to_owned(),
        category: Some("EXTERNAL".to_owned()),
        ..ClassificationSummary::from_key(key)
    }
}

#[must_use]
pub fn primary_reference() -> ObjectReference {
    ObjectReference::new("MyCompany1", "MyType1", "MyValue1")
}

/// Regular user `user-1-1`, member of `group-1`.
#[must_use]
pub fn user() -> Caller {
    Caller::new(access_id("user-1-1")).with_groups([access_id("group-1")])
}

/// User `user-1-2` who may only read `GPK_KSC`.
#[must_use]
pub fn reader() -> Caller {
    Caller::new(access_id("user-1-2"))
}

/// User without any workbasket grant.
#[must_use]
pub fn stranger() -> Caller {
    Caller::new(access_id("user-9-9"))
}

#[must_use]
pub fn admin() -> Caller {
    Caller::new(access_id("admin")).with_roles([Role::User, Role::Admin])
}

/// Engine wired to in-memory adapters.
///
/// Workbaskets:
/// - `GPK_KSC`: `user-1-1` may read, append and transfer; `user-1-2` may read.
/// - `GPK_B_KSC`: `group-1` may read.
/// - `TEAMLEAD_1`: `user-1-1` may append only.
///
/// Classifications `L10000` (P1D, priority 1), `L20000` (P2D, priority 3)
/// and `L30000` (P3D, priority 2). `admin` holds every permission.
pub struct Harness {
    pub directory: InMemoryDirectory,
    pub store: InMemoryTaskStore,
    pub caller: StaticCallerContext,
    pub history: RecordingHistorySink,
    pub lifecycle: TaskLifecycleService,
    pub queries: TaskQueryService,
    pub transfers: TaskTransferService,
}

impl Harness {
    /// Builds the engine with German working days and `router`.
    #[must_use]
    pub fn with_router(router: impl TaskRouter + 'static) -> Self {
        Self::build(router, TickingClock::starting_at(monday_morning()), in_memory)
    }

    /// Builds the engine reading time from `clock`.
    #[must_use]
    pub fn with_clock(clock: TickingClock) -> Self {
        Self::build(StaticRouter::new(), clock, in_memory)
    }

    /// Builds the engine over a [`RacingStore`] and returns a handle to it.
    #[must_use]
    pub fn racing() -> (Self, Arc<RacingStore>) {
        let mut handle = None;
        let harness = Self::build(
            StaticRouter::new(),
            TickingClock::starting_at(monday_morning()),
            |store| -> Arc<dyn TaskStore> {
                let racing = Arc::new(RacingStore::new(store));
                handle = Some(Arc::clone(&racing));
                racing
            },
        );
        (harness, handle.expect("store is wrapped"))
    }

    fn build(
        router: impl TaskRouter + 'static,
        clock: TickingClock,
        wrap: impl FnOnce(InMemoryTaskStore) -> Arc<dyn TaskStore>,
    ) -> Self {
        let directory = seeded_directory();
        let store = InMemoryTaskStore::new(directory.clone());
        let caller = StaticCallerContext::new(user());
        let history = RecordingHistorySink::new();
        let ports = TaskPorts::new(
            wrap(store.clone()),
            Arc::new(directory.clone()),
            Arc::new(directory.clone()),
            Arc::new(caller.clone()),
            Arc::new(clock),
        )
        .with_history(Arc::new(history.clone()))
        .with_router(Arc::new(router))
        .with_config(TaskEngineConfig::german());
        Self {
            directory,
            store,
            caller,
            history,
            lifecycle: TaskLifecycleService::new(ports.clone()),
            queries: TaskQueryService::new(ports.clone()),
            transfers: TaskTransferService::new(ports),
        }
    }

    pub fn act_as(&self, caller: Caller) {
        self.caller.act_as(caller);
    }

    /// Creates a `Ready` task in `workbasket` as the current caller.
    pub fn create(&self, workbasket: &str, classification_key: &str) -> Task {
        self.lifecycle
            .create_task(CreateTaskRequest::new(
                workbasket_ref(workbasket),
                classification_key,
                primary_reference(),
            ))
            .expect("task creation succeeds")
    }

    /// Creates a task as `user-1-1` and returns its id.
    pub fn create_id(&self, classification_key: &str) -> TaskId {
        self.create("GPK_KSC", classification_key).id()
    }

    /// Claims and completes a task as the current caller.
    pub fn complete(&self, id: TaskId) -> Task {
        self.lifecycle.claim(id).expect("claim succeeds");
        self.lifecycle.complete(id).expect("completion succeeds")
    }

    pub fn reload(&self, id: TaskId) -> Task {
        self.lifecycle.get_task(id).expect("task is readable")
    }
}

#[fixture]
pub fn harness() -> Harness {
    Harness::with_router(StaticRouter::new())
}

fn in_memory(store: InMemoryTaskStore) -> Arc<dyn TaskStore> {
    Arc::new(store)
}

fn seeded_directory() -> InMemoryDirectory {
    let directory = InMemoryDirectory::new();
    for key in ["GPK_KSC", "GPK_B_KSC", "TEAMLEAD_1"] {
        directory
            .add_workbasket(Workbasket {
                summary: WorkbasketSummary {
                    id: workbasket_id(key),
                    key: key.to_owned(),
                    domain: DOMAIN.to_owned(),
                    name: Some(format!("Basket {key}")),
                },
                marked_for_deletion: false,
            })
            .expect("workbasket registered");
        directory
            .grant(&workbasket_id(key), access_id("admin"), all_permissions())
            .expect("grant stored");
    }
    directory
        .grant(
            &workbasket_id("GPK_KSC"),
            access_id("user-1-1"),
            [
                WorkbasketPermission::Read,
                WorkbasketPermission::Append,
                WorkbasketPermission::Transfer,
            ],
        )
        .expect("grant stored");
    directory
        .grant(&workbasket_id("GPK_KSC"), access_id("user-1-2"), [WorkbasketPermission::Read])
        .expect("grant stored");
    directory
        .grant(&workbasket_id("GPK_B_KSC"), access_id("group-1"), [WorkbasketPermission::Read])
        .expect("grant stored");
    directory
        .grant(
            &workbasket_id("TEAMLEAD_1"),
            access_id("user-1-1"),
            [WorkbasketPermission::Append],
        )
        .expect("grant stored");

    for (key, level, priority) in [("L10000", "P1D", 1), ("L20000", "P2D", 3), ("L30000", "P3D", 2)] {
        directory
            .add_classification(classification(key, level, priority))
            .expect("classification registered");
    }
    directory
}

fn all_permissions() -> [WorkbasketPermission; 5] {
    [
        WorkbasketPermission::Read,
        WorkbasketPermission::Open,
        WorkbasketPermission::Append,
        WorkbasketPermission::Transfer,
        WorkbasketPermission::Distribute,
    ]
}
