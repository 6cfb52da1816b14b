//! Rendering of query plans and batched updates into parameterised SQL.
//!
//! Values are always bound as parameters. The only text spliced into
//! statements comes from closed sets: column expressions of
//! [`QueryField`] and custom field keys.
//!
//! Joins to attachments and secondary references can multiply task rows.
//! Task selection therefore evaluates the clauses inside a correlated
//! `EXISTS` over the outer-joined children, which keeps every task at most
//! once and lets a task without children match on absent values.

use crate::task::{
    domain::{TaskId, TaskState},
    ports::TaskPatch,
    query::{
        Condition, FilterClause, FilterValue, Interval, Join, QueryField, QueryPlan,
        SortDirection, ValueKind,
    },
};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Columns of [`super::models::TaskRow`], qualified with the task alias.
pub const TASK_COLUMNS: &str = concat!(
    "t.id, t.external_id, t.created, t.modified, t.claimed, t.completed, t.planned, t.due, ",
    "t.received, t.name, t.note, t.priority, t.state, t.callback_state, t.callback_info, ",
    "t.classification_id, t.classification_key, t.classification_category, t.workbasket_id, ",
    "t.workbasket_key, t.domain, t.business_process_id, t.parent_business_process_id, ",
    "t.owner, t.creator, t.por_company, t.por_system, t.por_system_instance, t.por_type, ",
    "t.por_value, t.is_read, t.is_transferred, t.custom_fields, t.custom_int_fields, ",
    "t.custom_attributes",
);

/// A bound statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// `TEXT`.
    Text(String),
    /// Nullable `TEXT`.
    NullableText(Option<String>),
    /// `BIGINT`.
    BigInt(i64),
    /// `BOOLEAN`.
    Bool(bool),
    /// `TIMESTAMPTZ`.
    Timestamp(DateTime<Utc>),
    /// Nullable `TIMESTAMPTZ`.
    NullableTimestamp(Option<DateTime<Utc>>),
    /// `UUID[]`.
    Uuids(Vec<uuid::Uuid>),
    /// `TEXT[]`.
    Texts(Vec<String>),
    /// `JSONB`.
    Json(Value),
}

/// SQL text with its positional parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlStatement {
    /// Statement text using `$n` placeholders.
    pub sql: String,
    /// Parameters in placeholder order.
    pub params: Vec<SqlParam>,
}

impl SqlStatement {
    /// Adds a parameter and returns its placeholder.
    fn bind(&mut self, param: SqlParam) -> String {
        self.params.push(param);
        format!("${}", self.params.len())
    }

    fn bind_value(&mut self, value: &FilterValue) -> String {
        let param = match value {
            FilterValue::Null => SqlParam::NullableText(None),
            FilterValue::Text(text) => SqlParam::Text(text.clone()),
            FilterValue::Integer(number) => SqlParam::BigInt(*number),
            FilterValue::Boolean(flag) => SqlParam::Bool(*flag),
            FilterValue::Timestamp(instant) => SqlParam::Timestamp(*instant),
        };
        self.bind(param)
    }
}

/// SQL expression reading `field`.
#[must_use]
pub fn column(field: QueryField) -> String {
    let fixed = match field {
        QueryField::Custom(custom) => return format!("(t.custom_fields->>'{}')", custom.as_str()),
        QueryField::CustomInt(custom) => {
            return format!("((t.custom_int_fields->>'{}')::BIGINT)", custom.as_str());
        }
        QueryField::TaskId => "CAST(t.id AS TEXT)",
        QueryField::ExternalId => "t.external_id",
        QueryField::State => "t.state",
        QueryField::CallbackState => "t.callback_state",
        QueryField::Owner => "t.owner",
        QueryField::Creator => "t.creator",
        QueryField::WorkbasketId => "t.workbasket_id",
        QueryField::WorkbasketKey => "t.workbasket_key",
        QueryField::Domain => "t.domain",
        QueryField::ClassificationId => "t.classification_id",
        QueryField::ClassificationKey => "t.classification_key",
        QueryField::ClassificationCategory => "t.classification_category",
        QueryField::Priority => "t.priority",
        QueryField::Name => "t.name",
        QueryField::Note => "t.note",
        QueryField::BusinessProcessId => "t.business_process_id",
        QueryField::ParentBusinessProcessId => "t.parent_business_process_id",
        QueryField::Created => "t.created",
        QueryField::Modified => "t.modified",
        QueryField::Claimed => "t.claimed",
        QueryField::Completed => "t.completed",
        QueryField::Planned => "t.planned",
        QueryField::Due => "t.due",
        QueryField::Received => "t.received",
        QueryField::Read => "t.is_read",
        QueryField::Transferred => "t.is_transferred",
        QueryField::PrimaryCompany => "t.por_company",
        QueryField::PrimarySystem => "t.por_system",
        QueryField::PrimarySystemInstance => "t.por_system_instance",
        QueryField::PrimaryType => "t.por_type",
        QueryField::PrimaryValue => "t.por_value",
        QueryField::AttachmentClassificationKey => "a.classification_key",
        QueryField::AttachmentClassificationId => "a.classification_id",
        QueryField::AttachmentChannel => "a.channel",
        QueryField::AttachmentReferenceValue => "a.ref_value",
        QueryField::AttachmentReceived => "a.received",
        QueryField::SecondaryCompany => "r.company",
        QueryField::SecondarySystem => "r.system",
        QueryField::SecondarySystemInstance => "r.system_instance",
        QueryField::SecondaryType => "r.type",
        QueryField::SecondaryValue => "r.value",
        QueryField::ClassificationName => "c.name",
        QueryField::WorkbasketName => "w.name",
    };
    fixed.to_owned()
}

/// Renders the page of matching task rows.
#[must_use]
pub fn select_tasks(plan: &QueryPlan) -> SqlStatement {
    let mut statement = SqlStatement::default();
    let filter = where_clause(plan, &mut statement, false);
    let mut sql = format!("SELECT {TASK_COLUMNS} {}{filter}", from_clause(plan, false));
    sql.push_str(&order_clause(plan));
    push_page(plan, &mut statement, &mut sql);
    statement.sql = sql;
    statement
}

/// Renders the count of matching tasks, ignoring the page window.
#[must_use]
pub fn count_tasks(plan: &QueryPlan) -> SqlStatement {
    let mut statement = SqlStatement::default();
    let filter = where_clause(plan, &mut statement, false);
    statement.sql = format!("SELECT COUNT(*) AS total {}{filter}", from_clause(plan, false));
    statement
}

/// Renders the distinct non-null values of `field` over the matching rows.
///
/// Children are outer-joined directly so that only values of rows
/// satisfying the clauses are returned.
#[must_use]
pub fn select_values(plan: &QueryPlan, field: QueryField) -> SqlStatement {
    let mut statement = SqlStatement::default();
    let expression = value_expression(field);
    let mut filter = where_clause(plan, &mut statement, true);
    filter.push_str(if filter.is_empty() { " WHERE " } else { " AND " });
    filter.push_str(&format!("{} IS NOT NULL", column(field)));
    let direction = plan
        .sort()
        .first()
        .map_or(SortDirection::Ascending, |key| key.direction);
    let mut sql = format!(
        "SELECT DISTINCT {expression} AS value {}{filter} ORDER BY value {}",
        from_clause(plan, true),
        direction_keyword(direction)
    );
    push_page(plan, &mut statement, &mut sql);
    statement.sql = sql;
    statement
}

/// Renders the locking selection of the first claimable matching task.
#[must_use]
pub fn claim_candidate(plan: &QueryPlan) -> SqlStatement {
    let mut statement = SqlStatement::default();
    let claimable: Vec<String> = TaskState::ALL
        .into_iter()
        .filter(|state| !state.is_final() && !state.is_claimed())
        .map(|state| state.as_str().to_owned())
        .collect();
    let placeholder = statement.bind(SqlParam::Texts(claimable));
    let mut filter = where_clause(plan, &mut statement, false);
    filter.push_str(if filter.is_empty() { " WHERE " } else { " AND " });
    filter.push_str(&format!("t.state = ANY({placeholder})"));
    statement.sql = format!(
        "SELECT t.id {}{filter}{} LIMIT 1 FOR UPDATE OF t SKIP LOCKED",
        from_clause(plan, false),
        order_clause(plan)
    );
    statement
}

/// Renders a batched patch of the listed tasks, restricted to
/// `required_states` when given.
#[must_use]
pub fn update_many(
    ids: &[TaskId],
    patch: &TaskPatch,
    required_states: Option<&[TaskState]>,
) -> SqlStatement {
    let mut statement = SqlStatement::default();
    let mut assignments = vec![format!(
        "modified = {}",
        statement.bind(SqlParam::Timestamp(patch.modified))
    )];
    if let Some(state) = patch.state {
        let placeholder = statement.bind(SqlParam::Text(state.as_str().to_owned()));
        assignments.push(format!("state = {placeholder}"));
    }
    if let Some(owner) = &patch.owner {
        let value = owner.as_ref().map(|access_id| access_id.as_str().to_owned());
        let placeholder = statement.bind(SqlParam::NullableText(value));
        assignments.push(format!("owner = {placeholder}"));
    }
    for (name, value) in [
        ("claimed", patch.claimed),
        ("completed", patch.completed),
        ("planned", patch.planned),
        ("due", patch.due),
    ] {
        if let Some(instant) = value {
            let placeholder = statement.bind(SqlParam::NullableTimestamp(instant));
            assignments.push(format!("{name} = {placeholder}"));
        }
    }
    for (name, value) in [("is_read", patch.read), ("is_transferred", patch.transferred)] {
        if let Some(flag) = value {
            let placeholder = statement.bind(SqlParam::Bool(flag));
            assignments.push(format!("{name} = {placeholder}"));
        }
    }
    if let Some(workbasket) = &patch.workbasket {
        for (name, value) in [
            ("workbasket_id", workbasket.id.as_str()),
            ("workbasket_key", workbasket.key.as_str()),
            ("domain", workbasket.domain.as_str()),
        ] {
            let placeholder = statement.bind(SqlParam::Text(value.to_owned()));
            assignments.push(format!("{name} = {placeholder}"));
        }
    }
    if let Some(callback_state) = patch.callback_state {
        let placeholder = statement.bind(SqlParam::Text(callback_state.as_str().to_owned()));
        assignments.push(format!("callback_state = {placeholder}"));
    }
    if !patch.custom.is_empty() {
        let mut set = Map::new();
        let mut cleared = Vec::new();
        for (field, value) in &patch.custom {
            match value {
                Some(text) => {
                    set.insert(field.as_str().to_owned(), Value::String(text.clone()));
                }
                None => cleared.push(field.as_str().to_owned()),
            }
        }
        let merged = statement.bind(SqlParam::Json(Value::Object(set)));
        let removed = statement.bind(SqlParam::Texts(cleared));
        assignments.push(format!(
            "custom_fields = (custom_fields || {merged}::jsonb) - {removed}::text[]"
        ));
    }

    let id_values = ids.iter().map(|id| id.into_inner()).collect();
    let id_placeholder = statement.bind(SqlParam::Uuids(id_values));
    let mut sql = format!(
        "UPDATE tasks SET {} WHERE id = ANY({id_placeholder})",
        assignments.join(", ")
    );
    if let Some(states) = required_states {
        let names = states.iter().map(|state| state.as_str().to_owned()).collect();
        let placeholder = statement.bind(SqlParam::Texts(names));
        sql.push_str(&format!(" AND state = ANY({placeholder})"));
    }
    statement.sql = sql;
    statement
}

fn from_clause(plan: &QueryPlan, expand_children: bool) -> String {
    let mut from = String::from("FROM tasks t");
    if plan.requires(Join::Classification) {
        from.push_str(" LEFT JOIN classifications c ON c.id = t.classification_id");
    }
    if plan.requires(Join::Workbasket) {
        from.push_str(" LEFT JOIN workbaskets w ON w.id = t.workbasket_id");
    }
    if expand_children {
        from.push_str(&child_joins(plan));
    }
    from
}

fn child_joins(plan: &QueryPlan) -> String {
    let mut joins = String::new();
    if plan.requires(Join::Attachments) {
        joins.push_str(" LEFT JOIN attachments a ON a.task_id = t.id");
    }
    if plan.requires(Join::SecondaryReferences) {
        joins.push_str(" LEFT JOIN object_references r ON r.task_id = t.id");
    }
    joins
}

/// Renders the `WHERE` clause, empty when nothing restricts the rows.
fn where_clause(plan: &QueryPlan, statement: &mut SqlStatement, expand_children: bool) -> String {
    let mut predicates = Vec::new();
    if let Some(access_ids) = plan.access_filter() {
        let ids = access_ids
            .iter()
            .map(|access_id| access_id.as_str().to_owned())
            .collect();
        let placeholder = statement.bind(SqlParam::Texts(ids));
        predicates.push(format!(
            "EXISTS (SELECT 1 FROM workbasket_access_list acl \
             WHERE acl.workbasket_id = t.workbasket_id AND acl.perm_read \
             AND acl.access_id = ANY({placeholder}))"
        ));
    }
    let clauses: Vec<String> = plan
        .clauses()
        .iter()
        .map(|clause| render_clause(clause, statement))
        .collect();
    if plan.distinct() && !expand_children && !clauses.is_empty() {
        predicates.push(format!(
            "EXISTS (SELECT 1 FROM (SELECT 1) AS seed{} WHERE {})",
            child_joins(plan),
            clauses.join(" AND ")
        ));
    } else {
        predicates.extend(clauses);
    }
    if predicates.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", predicates.join(" AND "))
    }
}

fn render_clause(clause: &FilterClause, statement: &mut SqlStatement) -> String {
    let column = column(clause.field);
    match &clause.condition {
        Condition::In(values) => {
            let (present, has_null) = split_null(values);
            let placeholders: Vec<String> =
                present.iter().map(|value| statement.bind_value(value)).collect();
            match (placeholders.is_empty(), has_null) {
                (true, _) => format!("{column} IS NULL"),
                (false, false) => format!("{column} IN ({})", placeholders.join(", ")),
                (false, true) => format!(
                    "({column} IN ({}) OR {column} IS NULL)",
                    placeholders.join(", ")
                ),
            }
        }
        Condition::NotIn(values) => {
            let (present, has_null) = split_null(values);
            let placeholders: Vec<String> =
                present.iter().map(|value| statement.bind_value(value)).collect();
            match (placeholders.is_empty(), has_null) {
                (true, _) => format!("{column} IS NOT NULL"),
                (false, false) => format!(
                    "({column} IS NULL OR {column} NOT IN ({}))",
                    placeholders.join(", ")
                ),
                (false, true) => format!(
                    "({column} IS NOT NULL AND {column} NOT IN ({}))",
                    placeholders.join(", ")
                ),
            }
        }
        Condition::Like(patterns) => format!("({})", like_any(&column, patterns, statement)),
        Condition::NotLike(patterns) => format!(
            "({column} IS NULL OR NOT ({}))",
            like_any(&column, patterns, statement)
        ),
        Condition::Within(intervals) => {
            let ranges: Vec<String> = intervals
                .iter()
                .map(|interval| render_interval(&column, interval, statement))
                .collect();
            format!("({})", ranges.join(" OR "))
        }
    }
}

fn split_null(values: &[FilterValue]) -> (Vec<&FilterValue>, bool) {
    let present: Vec<&FilterValue> = values.iter().filter(|value| !value.is_null()).collect();
    let has_null = present.len() < values.len();
    (present, has_null)
}

fn like_any(column: &str, patterns: &[String], statement: &mut SqlStatement) -> String {
    patterns
        .iter()
        .map(|pattern| {
            let placeholder = statement.bind(SqlParam::Text(pattern.clone()));
            format!("{column} ILIKE {placeholder} ESCAPE ''")
        })
        .collect::<Vec<_>>()
        .join(" OR ")
}

fn render_interval(column: &str, interval: &Interval, statement: &mut SqlStatement) -> String {
    let mut bounds = Vec::new();
    if let Some(lower) = interval.lower.as_ref().filter(|value| !value.is_null()) {
        bounds.push(format!("{column} >= {}", statement.bind_value(lower)));
    }
    if let Some(upper) = interval.upper.as_ref().filter(|value| !value.is_null()) {
        bounds.push(format!("{column} <= {}", statement.bind_value(upper)));
    }
    format!("({})", bounds.join(" AND "))
}

fn order_clause(plan: &QueryPlan) -> String {
    let mut keys: Vec<String> = plan
        .sort()
        .iter()
        .map(|key| {
            let nulls = match key.direction {
                SortDirection::Ascending => "NULLS FIRST",
                SortDirection::Descending => "NULLS LAST",
            };
            format!(
                "{} {} {nulls}",
                column(key.field),
                direction_keyword(key.direction)
            )
        })
        .collect();
    keys.push("t.id ASC".to_owned());
    format!(" ORDER BY {}", keys.join(", "))
}

const fn direction_keyword(direction: SortDirection) -> &'static str {
    match direction {
        SortDirection::Ascending => "ASC",
        SortDirection::Descending => "DESC",
    }
}

fn value_expression(field: QueryField) -> String {
    let expression = column(field);
    match field.kind() {
        ValueKind::Text => format!("CAST({expression} AS TEXT)"),
        ValueKind::Integer => format!("CAST({expression} AS BIGINT)"),
        ValueKind::Boolean | ValueKind::Timestamp => expression,
    }
}

fn push_page(plan: &QueryPlan, statement: &mut SqlStatement, sql: &mut String) {
    if let Some(page) = plan.page() {
        let limit = statement.bind(SqlParam::BigInt(i64::try_from(page.limit).unwrap_or(i64::MAX)));
        let offset =
            statement.bind(SqlParam::BigInt(i64::try_from(page.offset).unwrap_or(i64::MAX)));
        sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));
    }
}
