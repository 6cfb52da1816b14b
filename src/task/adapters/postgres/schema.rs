//! Diesel schema for task persistence.
//!
//! `workbaskets`, `classifications` and `workbasket_access_list` are owned
//! by the services behind the lookup ports; task queries only read them
//! through rendered SQL, so they have no typed table here.

diesel::table! {
    /// Task rows.
    tasks (id) {
        /// Task identifier.
        id -> Uuid,
        /// Unique external identifier.
        #[max_length = 255]
        external_id -> Varchar,
        /// Creation timestamp.
        created -> Timestamptz,
        /// Last modification timestamp.
        modified -> Timestamptz,
        /// Claim timestamp.
        claimed -> Nullable<Timestamptz>,
        /// Completion timestamp.
        completed -> Nullable<Timestamptz>,
        /// Planned start.
        planned -> Nullable<Timestamptz>,
        /// Due date.
        due -> Nullable<Timestamptz>,
        /// Receive timestamp.
        received -> Nullable<Timestamptz>,
        /// Display name.
        #[max_length = 255]
        name -> Nullable<Varchar>,
        /// Free-text note.
        #[max_length = 4096]
        note -> Nullable<Varchar>,
        /// Derived priority.
        priority -> Int4,
        /// Lifecycle state.
        #[max_length = 50]
        state -> Varchar,
        /// Callback handshake state.
        #[max_length = 50]
        callback_state -> Varchar,
        /// Callback key/value pairs.
        callback_info -> Jsonb,
        /// Classification identifier.
        #[max_length = 255]
        classification_id -> Nullable<Varchar>,
        /// Classification key.
        #[max_length = 255]
        classification_key -> Varchar,
        /// Classification category.
        #[max_length = 255]
        classification_category -> Nullable<Varchar>,
        /// Workbasket identifier.
        #[max_length = 255]
        workbasket_id -> Varchar,
        /// Workbasket key.
        #[max_length = 255]
        workbasket_key -> Varchar,
        /// Workbasket domain.
        #[max_length = 255]
        domain -> Varchar,
        /// Business process identifier.
        #[max_length = 255]
        business_process_id -> Varchar,
        /// Parent business process identifier.
        #[max_length = 255]
        parent_business_process_id -> Nullable<Varchar>,
        /// Owner access id.
        #[max_length = 255]
        owner -> Nullable<Varchar>,
        /// Creator access id.
        #[max_length = 255]
        creator -> Nullable<Varchar>,
        /// Primary reference company.
        #[max_length = 255]
        por_company -> Varchar,
        /// Primary reference system.
        #[max_length = 255]
        por_system -> Nullable<Varchar>,
        /// Primary reference system instance.
        #[max_length = 255]
        por_system_instance -> Nullable<Varchar>,
        /// Primary reference type.
        #[max_length = 255]
        por_type -> Varchar,
        /// Primary reference value.
        #[max_length = 255]
        por_value -> Varchar,
        /// Read flag.
        is_read -> Bool,
        /// Transferred flag.
        is_transferred -> Bool,
        /// Custom text fields keyed by field name.
        custom_fields -> Jsonb,
        /// Custom integer fields keyed by field name.
        custom_int_fields -> Jsonb,
        /// Free-form custom attributes.
        custom_attributes -> Jsonb,
    }
}

diesel::table! {
    /// Task attachments.
    attachments (id) {
        /// Attachment identifier.
        id -> Uuid,
        /// Owning task.
        task_id -> Uuid,
        /// Creation timestamp.
        created -> Timestamptz,
        /// Last modification timestamp.
        modified -> Timestamptz,
        /// Classification identifier.
        #[max_length = 255]
        classification_id -> Nullable<Varchar>,
        /// Classification key.
        #[max_length = 255]
        classification_key -> Varchar,
        /// Classification category.
        #[max_length = 255]
        classification_category -> Nullable<Varchar>,
        /// Referenced object company.
        #[max_length = 255]
        ref_company -> Nullable<Varchar>,
        /// Referenced object system.
        #[max_length = 255]
        ref_system -> Nullable<Varchar>,
        /// Referenced object system instance.
        #[max_length = 255]
        ref_system_instance -> Nullable<Varchar>,
        /// Referenced object type.
        #[max_length = 255]
        ref_type -> Nullable<Varchar>,
        /// Referenced object value.
        #[max_length = 255]
        ref_value -> Nullable<Varchar>,
        /// Receive channel.
        #[max_length = 255]
        channel -> Nullable<Varchar>,
        /// Receive timestamp.
        received -> Nullable<Timestamptz>,
        /// Free-form custom attributes.
        custom_attributes -> Jsonb,
    }
}

diesel::table! {
    /// Secondary object references of tasks.
    object_references (id) {
        /// Reference identifier.
        id -> Uuid,
        /// Owning task.
        task_id -> Uuid,
        /// Company.
        #[max_length = 255]
        company -> Varchar,
        /// System.
        #[max_length = 255]
        system -> Nullable<Varchar>,
        /// System instance.
        #[max_length = 255]
        system_instance -> Nullable<Varchar>,
        /// Object type.
        #[sql_name = "type"]
        #[max_length = 255]
        kind -> Varchar,
        /// Object value.
        #[max_length = 255]
        value -> Varchar,
    }
}

diesel::joinable!(attachments -> tasks (task_id));
diesel::joinable!(object_references -> tasks (task_id));
diesel::allow_tables_to_appear_in_same_query!(tasks, attachments, object_references);
