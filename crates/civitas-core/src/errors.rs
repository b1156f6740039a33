use civitas_core_types::{RequestId, TraceId};
use thiserror::Error;

/// Result type alias using RecordError
pub type Result<T> = std::result::Result<T, RecordError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Every failure surfaced by the record store is classified into one of
/// these kinds. Each kind maps to a stable error code that callers can
/// match on without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    /// Unknown field type, duplicate declaration or dangling reference at definition time
    Schema,
    /// Field not in the allow-list, or a value failed its cast
    Validation,
    /// Operation targets a nonexistent (or trashed) record
    NotFound,
    /// Foreign-key or uniqueness violation reported by storage
    Constraint,
    /// A lifecycle side effect failed; the triggering operation was rolled back
    Hook,

    // Integration/IO
    Persistence,
    Serialization,
    Config,
    Io,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::Schema => "ERR_SCHEMA",
            ExErrorKind::Validation => "ERR_VALIDATION",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::Constraint => "ERR_CONSTRAINT",
            ExErrorKind::Hook => "ERR_HOOK",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Config => "ERR_CONFIG",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Carries the classification plus whatever context the failing layer knew:
/// the operation, the entity and record it was working on, the offending
/// field, and the request that triggered it.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity: Option<String>,
    record_id: Option<i64>,
    field: Option<String>,
    request_id: Option<RequestId>,
    trace_id: Option<TraceId>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity: None,
            record_id: None,
            field: None,
            request_id: None,
            trace_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add entity (table) context
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Add record id context
    pub fn with_record_id(mut self, id: i64) -> Self {
        self.record_id = Some(id);
        self
    }

    /// Add field context
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Add request ID context
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Add trace ID context
    pub fn with_trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Fill in operation/entity context only where the error does not already carry it
    pub fn or_context(mut self, op: &str, entity: &str) -> Self {
        if self.op.is_none() {
            self.op = Some(op.to_string());
        }
        if self.entity.is_none() {
            self.entity = Some(entity.to_string());
        }
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn entity(&self) -> Option<&str> {
        self.entity.as_deref()
    }

    pub fn record_id(&self) -> Option<i64> {
        self.record_id
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    pub fn trace_id(&self) -> Option<&TraceId> {
        self.trace_id.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(entity) = &self.entity {
            write!(f, " (entity: {})", entity)?;
        }
        if let Some(id) = self.record_id {
            write!(f, " (record_id: {})", id)?;
        }
        if let Some(field) = &self.field {
            write!(f, " (field: {})", field)?;
        }
        if let Some(source) = &self.source {
            write!(f, "; caused by {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Precise failures raised by the pure (no I/O) part of the record layer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    // ===== Definition time =====
    /// Field declared with a type name that is not a known cast
    #[error("Unknown field type '{type_name}' for {entity}.{field}")]
    UnknownFieldType {
        entity: String,
        field: String,
        type_name: String,
    },

    /// Table, column or relation name is not a plain identifier
    #[error("Invalid identifier '{name}': {reason}")]
    InvalidIdentifier { name: String, reason: String },

    #[error("Field {entity}.{field} is declared more than once")]
    DuplicateField { entity: String, field: String },

    /// Field name collides with a column the store manages itself
    #[error("Field {entity}.{field} uses a reserved column name")]
    ReservedField { entity: String, field: String },

    #[error("Entity '{entity}' is already defined")]
    DuplicateEntity { entity: String },

    #[error("Entity '{entity}' is not defined")]
    UnknownEntity { entity: String },

    #[error("Relation {entity}.{relation} is declared more than once")]
    DuplicateRelation { entity: String, relation: String },

    #[error("Entity '{entity}' has no relation named '{relation}'")]
    UnknownRelation { entity: String, relation: String },

    #[error("Entity '{entity}' has no scope named '{scope}'")]
    UnknownScope { entity: String, scope: String },

    /// Cross-entity reference points at something that does not exist or has the wrong shape
    #[error("Invalid reference from {entity}: {reason}")]
    InvalidReference { entity: String, reason: String },

    // ===== Validation =====
    /// Field is not declared on the entity
    #[error("Entity '{entity}' has no field '{field}'")]
    UnknownField { entity: String, field: String },

    /// Field exists but is not in the mass-assignment allow-list
    #[error("Field {entity}.{field} is not fillable")]
    NotFillable { entity: String, field: String },

    /// Value could not be converted to the field's declared type
    #[error("Cannot cast {entity}.{field} to {expected}: {reason}")]
    CastFailed {
        entity: String,
        field: String,
        expected: String,
        reason: String,
    },

    /// Non-nullable field missing on create
    #[error("Field {entity}.{field} is required")]
    MissingRequired { entity: String, field: String },

    /// A scope was invoked with missing or mistyped arguments
    #[error("Scope {entity}.{scope}: {reason}")]
    InvalidScopeArgs {
        entity: String,
        scope: String,
        reason: String,
    },

    // ===== Lookup =====
    #[error("Record {entity}#{id} not found")]
    RecordNotFound { entity: String, id: i64 },

    // ===== Serialization =====
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl From<RecordError> for ExError {
    fn from(err: RecordError) -> Self {
        let message = err.to_string();
        match err {
            RecordError::UnknownFieldType { entity, field, .. }
            | RecordError::DuplicateField { entity, field }
            | RecordError::ReservedField { entity, field } => ExError::new(ExErrorKind::Schema)
                .with_op("define")
                .with_entity(entity)
                .with_field(field)
                .with_message(message),

            RecordError::InvalidIdentifier { .. } => ExError::new(ExErrorKind::Schema)
                .with_op("define")
                .with_message(message),

            RecordError::DuplicateEntity { entity }
            | RecordError::UnknownEntity { entity }
            | RecordError::DuplicateRelation { entity, .. }
            | RecordError::UnknownRelation { entity, .. }
            | RecordError::UnknownScope { entity, .. }
            | RecordError::InvalidReference { entity, .. } => ExError::new(ExErrorKind::Schema)
                .with_entity(entity)
                .with_message(message),

            RecordError::UnknownField { entity, field }
            | RecordError::NotFillable { entity, field }
            | RecordError::CastFailed { entity, field, .. }
            | RecordError::MissingRequired { entity, field } => {
                ExError::new(ExErrorKind::Validation)
                    .with_entity(entity)
                    .with_field(field)
                    .with_message(message)
            }

            RecordError::InvalidScopeArgs { entity, .. } => ExError::new(ExErrorKind::Validation)
                .with_entity(entity)
                .with_message(message),

            RecordError::RecordNotFound { entity, id } => ExError::new(ExErrorKind::NotFound)
                .with_entity(entity)
                .with_record_id(id)
                .with_message(message),

            RecordError::Serialization { .. } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }
        }
    }
}

impl From<serde_json::Error> for RecordError {
    fn from(err: serde_json::Error) -> Self {
        RecordError::Serialization {
            message: err.to_string(),
        }
    }
}
