//! `PostgreSQL` implementation of the task store ports.

use super::{
    conversion::{
        attachment_to_row, reference_to_row, row_to_attachment, row_to_reference, row_to_task,
        stored_instant, task_to_row,
    },
    models::{
        AttachmentRow, BooleanValueRow, CountRow, IdRow, IntegerValueRow, ObjectReferenceRow,
        TaskRow, TextValueRow, TimestampValueRow,
    },
    schema::{attachments, object_references, tasks},
    sql::{self, SqlParam, SqlStatement},
};
use crate::task::{
    domain::{
        AccessId, Attachment, AttachmentId, CallbackState, ExternalId, MinimalTask,
        ObjectReferenceId, SecondaryObjectReference, Task, TaskId, TaskState, TaskSummary,
        TaskVersion,
    },
    ports::{
        AttachmentRepository, ObjectReferenceRepository, TaskPatch, TaskQueryStore,
        TaskRepository, TaskStoreError, TaskStoreResult, WorkbasketPermission,
    },
    query::{FilterValue, QueryField, QueryPlan, ValueKind},
};
use chrono::{DateTime, Utc};
use diesel::PgExpressionMethods;
use diesel::pg::{Pg, PgConnection};
use diesel::prelude::*;
use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::{Array, BigInt, Bool, Jsonb, Nullable, Text, Timestamptz};
use std::collections::BTreeMap;
use tracing::debug;

/// `PostgreSQL` connection pool type used by task adapters.
pub type TaskPgPool = Pool<ConnectionManager<PgConnection>>;

type PooledConn = PooledConnection<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed task store.
///
/// Every call checks out one pooled connection. Read scoping joins the
/// `workbasket_access_list` table; name filters join `workbaskets` and
/// `classifications`.
#[derive(Debug, Clone)]
pub struct PostgresTaskStore {
    pool: TaskPgPool,
}

impl PostgresTaskStore {
    /// Creates a store from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: TaskPgPool) -> Self {
        Self { pool }
    }

    fn connection(&self) -> TaskStoreResult<PooledConn> {
        self.pool.get().map_err(TaskStoreError::persistence)
    }
}

impl From<DieselError> for TaskStoreError {
    fn from(err: DieselError) -> Self {
        Self::persistence(err)
    }
}

fn bound(statement: &SqlStatement) -> BoxedSqlQuery<'static, Pg, SqlQuery> {
    let mut query = diesel::sql_query(statement.sql.clone()).into_boxed::<Pg>();
    for param in &statement.params {
        query = match param.clone() {
            SqlParam::Text(value) => query.bind::<Text, _>(value),
            SqlParam::NullableText(value) => query.bind::<Nullable<Text>, _>(value),
            SqlParam::BigInt(value) => query.bind::<BigInt, _>(value),
            SqlParam::Bool(value) => query.bind::<Bool, _>(value),
            SqlParam::Timestamp(value) => query.bind::<Timestamptz, _>(value),
            SqlParam::NullableTimestamp(value) => query.bind::<Nullable<Timestamptz>, _>(value),
            SqlParam::Uuids(value) => query.bind::<Array<diesel::sql_types::Uuid>, _>(value),
            SqlParam::Texts(value) => query.bind::<Array<Text>, _>(value),
            SqlParam::Json(value) => query.bind::<Jsonb, _>(value),
        };
    }
    query
}

fn uuids(ids: &[TaskId]) -> Vec<uuid::Uuid> {
    ids.iter().map(|id| id.into_inner()).collect()
}

fn constraint_is(info: &dyn DatabaseErrorInformation, name: &str) -> bool {
    info.constraint_name().is_some_and(|constraint| constraint == name)
}

fn load_attachments(
    connection: &mut PgConnection,
    ids: &[uuid::Uuid],
) -> TaskStoreResult<BTreeMap<TaskId, Vec<Attachment>>> {
    let rows = attachments::table
        .filter(attachments::task_id.eq_any(ids))
        .order((attachments::task_id, attachments::created, attachments::id))
        .select(AttachmentRow::as_select())
        .load::<AttachmentRow>(connection)
        .map_err(TaskStoreError::persistence)?;
    let mut grouped: BTreeMap<TaskId, Vec<Attachment>> = BTreeMap::new();
    for row in rows {
        let task_id = TaskId::from_uuid(row.task_id);
        grouped
            .entry(task_id)
            .or_default()
            .push(row_to_attachment(row)?);
    }
    Ok(grouped)
}

fn load_references(
    connection: &mut PgConnection,
    ids: &[uuid::Uuid],
) -> TaskStoreResult<BTreeMap<TaskId, Vec<SecondaryObjectReference>>> {
    let rows = object_references::table
        .filter(object_references::task_id.eq_any(ids))
        .order((object_references::task_id, object_references::id))
        .select(ObjectReferenceRow::as_select())
        .load::<ObjectReferenceRow>(connection)
        .map_err(TaskStoreError::persistence)?;
    let mut grouped: BTreeMap<TaskId, Vec<SecondaryObjectReference>> = BTreeMap::new();
    for row in rows {
        grouped
            .entry(TaskId::from_uuid(row.task_id))
            .or_default()
            .push(row_to_reference(row));
    }
    Ok(grouped)
}

/// Attaches children to the rows, preserving row order.
fn assemble(connection: &mut PgConnection, rows: Vec<TaskRow>) -> TaskStoreResult<Vec<Task>> {
    let ids: Vec<uuid::Uuid> = rows.iter().map(|row| row.id).collect();
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut attachments = load_attachments(connection, &ids)?;
    let mut references = load_references(connection, &ids)?;
    rows.into_iter()
        .map(|row| {
            let id = TaskId::from_uuid(row.id);
            row_to_task(
                row,
                attachments.remove(&id).unwrap_or_default(),
                references.remove(&id).unwrap_or_default(),
            )
        })
        .collect()
}

fn load_rows(connection: &mut PgConnection, ids: &[uuid::Uuid]) -> TaskStoreResult<Vec<TaskRow>> {
    tasks::table
        .filter(tasks::id.eq_any(ids))
        .select(TaskRow::as_select())
        .load::<TaskRow>(connection)
        .map_err(TaskStoreError::persistence)
}

fn minimal_from_rows(rows: Vec<TaskRow>) -> TaskStoreResult<Vec<MinimalTask>> {
    rows.into_iter()
        .map(|row| row_to_task(row, Vec::new(), Vec::new()).map(|task| MinimalTask::from(&task)))
        .collect()
}

fn permission_column(permission: WorkbasketPermission) -> &'static str {
    match permission {
        WorkbasketPermission::Read => "perm_read",
        WorkbasketPermission::Open => "perm_open",
        WorkbasketPermission::Append => "perm_append",
        WorkbasketPermission::Transfer => "perm_transfer",
        WorkbasketPermission::Distribute => "perm_distribute",
    }
}

impl TaskRepository for PostgresTaskStore {
    fn find_by_id(&self, id: TaskId) -> TaskStoreResult<Option<Task>> {
        let mut connection = self.connection()?;
        let rows = load_rows(&mut connection, &[id.into_inner()])?;
        Ok(assemble(&mut connection, rows)?.into_iter().next())
    }

    fn insert(&self, task: &Task) -> TaskStoreResult<()> {
        let row = task_to_row(task)?;
        let mut connection = self.connection()?;
        diesel::insert_into(tasks::table)
            .values(&row)
            .execute(&mut connection)
            .map_err(|err| match err {
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info)
                    if constraint_is(info.as_ref(), "tasks_external_id_key") =>
                {
                    TaskStoreError::DuplicateExternalId(task.external_id().clone())
                }
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                    TaskStoreError::DuplicateTask(task.id())
                }
                _ => TaskStoreError::persistence(err),
            })?;
        Ok(())
    }

    fn update(&self, task: &Task, expected: &TaskVersion) -> TaskStoreResult<bool> {
        let row = task_to_row(task)?;
        let mut connection = self.connection()?;
        let changed = diesel::update(
            tasks::table
                .filter(tasks::id.eq(task.id().into_inner()))
                .filter(tasks::modified.eq(stored_instant(expected.modified)))
                .filter(tasks::state.eq(expected.state.as_str()))
                .filter(
                    tasks::claimed.is_not_distinct_from(expected.claimed.map(stored_instant)),
                ),
        )
        .set(&row)
        .execute(&mut connection)
        .map_err(TaskStoreError::persistence)?;
        if changed == 0 {
            debug!(task_id = %task.id(), "version guard rejected task update");
        }
        Ok(changed == 1)
    }

    fn delete(&self, id: TaskId) -> TaskStoreResult<bool> {
        let mut connection = self.connection()?;
        let removed = diesel::delete(tasks::table.filter(tasks::id.eq(id.into_inner())))
            .execute(&mut connection)
            .map_err(TaskStoreError::persistence)?;
        Ok(removed == 1)
    }

    fn delete_many(
        &self,
        ids: &[TaskId],
        required_states: Option<&[TaskState]>,
        blocked_callback: CallbackState,
    ) -> TaskStoreResult<Vec<TaskId>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let targets = tasks::table
            .filter(tasks::id.eq_any(uuids(ids)))
            .filter(tasks::callback_state.ne(blocked_callback.as_str()));
        let mut connection = self.connection()?;
        let removed: Vec<uuid::Uuid> = match required_states {
            Some(states) => {
                let names: Vec<&str> = states.iter().copied().map(TaskState::as_str).collect();
                diesel::delete(targets.filter(tasks::state.eq_any(names)))
                    .returning(tasks::id)
                    .get_results(&mut connection)
            }
            None => diesel::delete(targets)
                .returning(tasks::id)
                .get_results(&mut connection),
        }
        .map_err(TaskStoreError::persistence)?;
        Ok(removed.into_iter().map(TaskId::from_uuid).collect())
    }

    fn update_many(
        &self,
        ids: &[TaskId],
        patch: &TaskPatch,
        required_states: Option<&[TaskState]>,
    ) -> TaskStoreResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut stored = patch.clone();
        stored.modified = stored_instant(patch.modified);
        let statement = sql::update_many(ids, &stored, required_states);
        let mut connection = self.connection()?;
        bound(&statement)
            .execute(&mut connection)
            .map_err(TaskStoreError::persistence)
    }

    fn find_minimal(&self, ids: &[TaskId]) -> TaskStoreResult<Vec<MinimalTask>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut connection = self.connection()?;
        let mut found: BTreeMap<TaskId, MinimalTask> =
            minimal_from_rows(load_rows(&mut connection, &uuids(ids))?)?
                .into_iter()
                .map(|task| (task.id, task))
                .collect();
        Ok(ids.iter().filter_map(|id| found.remove(id)).collect())
    }

    fn find_minimal_by_external_ids(
        &self,
        external_ids: &[ExternalId],
    ) -> TaskStoreResult<Vec<MinimalTask>> {
        if external_ids.is_empty() {
            return Ok(Vec::new());
        }
        let names: Vec<&str> = external_ids.iter().map(ExternalId::as_str).collect();
        let mut connection = self.connection()?;
        let rows = tasks::table
            .filter(tasks::external_id.eq_any(names))
            .select(TaskRow::as_select())
            .load::<TaskRow>(&mut connection)
            .map_err(TaskStoreError::persistence)?;
        let mut found: BTreeMap<ExternalId, MinimalTask> = minimal_from_rows(rows)?
            .into_iter()
            .map(|task| (task.external_id.clone(), task))
            .collect();
        Ok(external_ids
            .iter()
            .filter_map(|external_id| found.remove(external_id))
            .collect())
    }

    fn find_ids_without_permission(
        &self,
        ids: &[TaskId],
        access_ids: &[AccessId],
        permission: WorkbasketPermission,
    ) -> TaskStoreResult<Vec<TaskId>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let statement = SqlStatement {
            sql: format!(
                "SELECT t.id FROM tasks t WHERE t.id = ANY($1) AND NOT EXISTS (\
                 SELECT 1 FROM workbasket_access_list acl \
                 WHERE acl.workbasket_id = t.workbasket_id AND acl.{} \
                 AND acl.access_id = ANY($2))",
                permission_column(permission)
            ),
            params: vec![
                SqlParam::Uuids(uuids(ids)),
                SqlParam::Texts(
                    access_ids
                        .iter()
                        .map(|access_id| access_id.as_str().to_owned())
                        .collect(),
                ),
            ],
        };
        let mut connection = self.connection()?;
        let rows = bound(&statement)
            .load::<IdRow>(&mut connection)
            .map_err(TaskStoreError::persistence)?;
        Ok(rows.into_iter().map(|row| TaskId::from_uuid(row.id)).collect())
    }
}

impl AttachmentRepository for PostgresTaskStore {
    fn find_attachments(&self, task_ids: &[TaskId]) -> TaskStoreResult<Vec<Attachment>> {
        if task_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut connection = self.connection()?;
        Ok(load_attachments(&mut connection, &uuids(task_ids))?
            .into_values()
            .flatten()
            .collect())
    }

    fn insert_attachment(&self, attachment: &Attachment) -> TaskStoreResult<()> {
        let row = attachment_to_row(attachment)?;
        let mut connection = self.connection()?;
        diesel::insert_into(attachments::table)
            .values(&row)
            .execute(&mut connection)
            .map_err(|err| match err {
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                    TaskStoreError::DuplicateAttachment(attachment.id())
                }
                _ => TaskStoreError::persistence(err),
            })?;
        Ok(())
    }

    fn update_attachment(&self, attachment: &Attachment) -> TaskStoreResult<()> {
        let row = attachment_to_row(attachment)?;
        let mut connection = self.connection()?;
        diesel::update(attachments::table.filter(attachments::id.eq(row.id)))
            .set(&row)
            .execute(&mut connection)
            .map_err(TaskStoreError::persistence)?;
        Ok(())
    }

    fn delete_attachment(&self, id: AttachmentId) -> TaskStoreResult<()> {
        let mut connection = self.connection()?;
        diesel::delete(attachments::table.filter(attachments::id.eq(id.into_inner())))
            .execute(&mut connection)
            .map_err(TaskStoreError::persistence)?;
        Ok(())
    }

    fn delete_attachments_of(&self, task_ids: &[TaskId]) -> TaskStoreResult<usize> {
        if task_ids.is_empty() {
            return Ok(0);
        }
        let mut connection = self.connection()?;
        diesel::delete(attachments::table.filter(attachments::task_id.eq_any(uuids(task_ids))))
            .execute(&mut connection)
            .map_err(TaskStoreError::persistence)
    }
}

impl ObjectReferenceRepository for PostgresTaskStore {
    fn find_object_references(
        &self,
        task_ids: &[TaskId],
    ) -> TaskStoreResult<Vec<SecondaryObjectReference>> {
        if task_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut connection = self.connection()?;
        Ok(load_references(&mut connection, &uuids(task_ids))?
            .into_values()
            .flatten()
            .collect())
    }

    fn insert_object_reference(&self, reference: &SecondaryObjectReference) -> TaskStoreResult<()> {
        let row = reference_to_row(reference)?;
        let mut connection = self.connection()?;
        diesel::insert_into(object_references::table)
            .values(&row)
            .execute(&mut connection)
            .map_err(|err| match err {
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                    TaskStoreError::DuplicateObjectReference(reference.id())
                }
                _ => TaskStoreError::persistence(err),
            })?;
        Ok(())
    }

    fn update_object_reference(&self, reference: &SecondaryObjectReference) -> TaskStoreResult<()> {
        let row = reference_to_row(reference)?;
        let mut connection = self.connection()?;
        diesel::update(object_references::table.filter(object_references::id.eq(row.id)))
            .set(&row)
            .execute(&mut connection)
            .map_err(TaskStoreError::persistence)?;
        Ok(())
    }

    fn delete_object_reference(&self, id: ObjectReferenceId) -> TaskStoreResult<()> {
        let mut connection = self.connection()?;
        diesel::delete(object_references::table.filter(object_references::id.eq(id.into_inner())))
            .execute(&mut connection)
            .map_err(TaskStoreError::persistence)?;
        Ok(())
    }

    fn delete_object_references_of(&self, task_ids: &[TaskId]) -> TaskStoreResult<usize> {
        if task_ids.is_empty() {
            return Ok(0);
        }
        let mut connection = self.connection()?;
        diesel::delete(
            object_references::table.filter(object_references::task_id.eq_any(uuids(task_ids))),
        )
        .execute(&mut connection)
        .map_err(TaskStoreError::persistence)
    }
}

impl TaskQueryStore for PostgresTaskStore {
    fn select(&self, plan: &QueryPlan) -> TaskStoreResult<Vec<TaskSummary>> {
        let statement = sql::select_tasks(plan);
        let mut connection = self.connection()?;
        let rows = bound(&statement)
            .load::<TaskRow>(&mut connection)
            .map_err(TaskStoreError::persistence)?;
        Ok(assemble(&mut connection, rows)?
            .iter()
            .map(TaskSummary::from)
            .collect())
    }

    fn count(&self, plan: &QueryPlan) -> TaskStoreResult<usize> {
        let statement = sql::count_tasks(plan);
        let mut connection = self.connection()?;
        let row = bound(&statement)
            .get_result::<CountRow>(&mut connection)
            .map_err(TaskStoreError::persistence)?;
        usize::try_from(row.total).map_err(TaskStoreError::invalid_data)
    }

    fn select_values(
        &self,
        plan: &QueryPlan,
        field: QueryField,
    ) -> TaskStoreResult<Vec<FilterValue>> {
        let statement = sql::select_values(plan, field);
        let query = bound(&statement);
        let mut connection = self.connection()?;
        let values: Vec<FilterValue> = match field.kind() {
            ValueKind::Text => query
                .load::<TextValueRow>(&mut connection)
                .map_err(TaskStoreError::persistence)?
                .into_iter()
                .map(|row| row.value.into())
                .collect(),
            ValueKind::Integer => query
                .load::<IntegerValueRow>(&mut connection)
                .map_err(TaskStoreError::persistence)?
                .into_iter()
                .map(|row| row.value.into())
                .collect(),
            ValueKind::Boolean => query
                .load::<BooleanValueRow>(&mut connection)
                .map_err(TaskStoreError::persistence)?
                .into_iter()
                .map(|row| row.value.into())
                .collect(),
            ValueKind::Timestamp => query
                .load::<TimestampValueRow>(&mut connection)
                .map_err(TaskStoreError::persistence)?
                .into_iter()
                .map(|row| row.value.into())
                .collect(),
        };
        Ok(values)
    }

    fn claim_first(
        &self,
        plan: &QueryPlan,
        owner: &AccessId,
        now: DateTime<Utc>,
    ) -> TaskStoreResult<Option<Task>> {
        let statement = sql::claim_candidate(plan);
        let mut connection = self.connection()?;
        connection.transaction::<_, TaskStoreError, _>(|tx| {
            let Some(candidate) = bound(&statement)
                .get_result::<IdRow>(tx)
                .optional()
                .map_err(TaskStoreError::persistence)?
            else {
                return Ok(None);
            };
            let rows = load_rows(tx, &[candidate.id])?;
            let Some(mut task) = assemble(tx, rows)?.into_iter().next() else {
                return Ok(None);
            };
            task.claim(owner, false, stored_instant(now))
                .map_err(TaskStoreError::invalid_data)?;
            let row = task_to_row(&task)?;
            diesel::update(tasks::table.filter(tasks::id.eq(row.id)))
                .set(&row)
                .execute(tx)
                .map_err(TaskStoreError::persistence)?;
            Ok(Some(task))
        })
    }
}
