//! Diesel row models for task persistence.

use super::schema::{attachments, object_references, tasks};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Bool, Nullable, Text, Timestamptz};
use serde_json::Value;

/// Task row, used for reads, inserts and guarded overwrites.
#[derive(Debug, Clone, PartialEq, Queryable, QueryableByName, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = tasks)]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaskRow {
    /// Task identifier.
    pub id: uuid::Uuid,
    /// External identifier.
    pub external_id: String,
    /// Creation timestamp.
    pub created: DateTime<Utc>,
    /// Last modification timestamp.
    pub modified: DateTime<Utc>,
    /// Claim timestamp.
    pub claimed: Option<DateTime<Utc>>,
    /// Completion timestamp.
    pub completed: Option<DateTime<Utc>>,
    /// Planned start.
    pub planned: Option<DateTime<Utc>>,
    /// Due date.
    pub due: Option<DateTime<Utc>>,
    /// Receive timestamp.
    pub received: Option<DateTime<Utc>>,
    /// Display name.
    pub name: Option<String>,
    /// Note.
    pub note: Option<String>,
    /// Priority.
    pub priority: i32,
    /// Lifecycle state.
    pub state: String,
    /// Callback state.
    pub callback_state: String,
    /// Callback key/value pairs.
    pub callback_info: Value,
    /// Classification identifier.
    pub classification_id: Option<String>,
    /// Classification key.
    pub classification_key: String,
    /// Classification category.
    pub classification_category: Option<String>,
    /// Workbasket identifier.
    pub workbasket_id: String,
    /// Workbasket key.
    pub workbasket_key: String,
    /// Workbasket domain.
    pub domain: String,
    /// Business process identifier.
    pub business_process_id: String,
    /// Parent business process identifier.
    pub parent_business_process_id: Option<String>,
    /// Owner.
    pub owner: Option<String>,
    /// Creator.
    pub creator: Option<String>,
    /// Primary reference company.
    pub por_company: String,
    /// Primary reference system.
    pub por_system: Option<String>,
    /// Primary reference system instance.
    pub por_system_instance: Option<String>,
    /// Primary reference type.
    pub por_type: String,
    /// Primary reference value.
    pub por_value: String,
    /// Read flag.
    pub is_read: bool,
    /// Transferred flag.
    pub is_transferred: bool,
    /// Custom text fields.
    pub custom_fields: Value,
    /// Custom integer fields.
    pub custom_int_fields: Value,
    /// Custom attributes.
    pub custom_attributes: Value,
}

/// Attachment row.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = attachments)]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AttachmentRow {
    /// Attachment identifier.
    pub id: uuid::Uuid,
    /// Owning task.
    pub task_id: uuid::Uuid,
    /// Creation timestamp.
    pub created: DateTime<Utc>,
    /// Last modification timestamp.
    pub modified: DateTime<Utc>,
    /// Classification identifier.
    pub classification_id: Option<String>,
    /// Classification key.
    pub classification_key: String,
    /// Classification category.
    pub classification_category: Option<String>,
    /// Referenced object company.
    pub ref_company: Option<String>,
    /// Referenced object system.
    pub ref_system: Option<String>,
    /// Referenced object system instance.
    pub ref_system_instance: Option<String>,
    /// Referenced object type.
    pub ref_type: Option<String>,
    /// Referenced object value.
    pub ref_value: Option<String>,
    /// Receive channel.
    pub channel: Option<String>,
    /// Receive timestamp.
    pub received: Option<DateTime<Utc>>,
    /// Custom attributes.
    pub custom_attributes: Value,
}

/// Secondary object reference row.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = object_references)]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ObjectReferenceRow {
    /// Reference identifier.
    pub id: uuid::Uuid,
    /// Owning task.
    pub task_id: uuid::Uuid,
    /// Company.
    pub company: String,
    /// System.
    pub system: Option<String>,
    /// System instance.
    pub system_instance: Option<String>,
    /// Object type.
    pub kind: String,
    /// Object value.
    pub value: String,
}

/// Row of a `COUNT(*)` query.
#[derive(Debug, Clone, Copy, QueryableByName)]
pub struct CountRow {
    /// Number of rows.
    #[diesel(sql_type = BigInt)]
    pub total: i64,
}

/// Row of an identifier query.
#[derive(Debug, Clone, Copy, QueryableByName)]
pub struct IdRow {
    /// Task identifier.
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    pub id: uuid::Uuid,
}

/// Distinct text value.
#[derive(Debug, Clone, QueryableByName)]
pub struct TextValueRow {
    /// Value.
    #[diesel(sql_type = Nullable<Text>)]
    pub value: Option<String>,
}

/// Distinct integer value.
#[derive(Debug, Clone, Copy, QueryableByName)]
pub struct IntegerValueRow {
    /// Value.
    #[diesel(sql_type = Nullable<BigInt>)]
    pub value: Option<i64>,
}

/// Distinct flag value.
#[derive(Debug, Clone, Copy, QueryableByName)]
pub struct BooleanValueRow {
    /// Value.
    #[diesel(sql_type = Nullable<Bool>)]
    pub value: Option<bool>,
}

/// Distinct timestamp value.
#[derive(Debug, Clone, Copy, QueryableByName)]
pub struct TimestampValueRow {
    /// Value.
    #[diesel(sql_type = Nullable<Timestamptz>)]
    pub value: Option<DateTime<Utc>>,
}
