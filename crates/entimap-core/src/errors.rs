use thiserror::Error;

/// Result type alias using EntimapError
pub type Result<T> = std::result::Result<T, EntimapError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Every [`EntimapError`] maps onto one of these kinds. Each kind carries a
/// stable `ERR_*` code used in structured logs and by callers that branch on
/// failures programmatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Model access
    PropertyNotDefined,
    ReadOnlyViolation,
    InvalidInput,

    // Wiring
    RepositoryNotRegistered,
    RepositoryNotInitialized,
    NotImplemented,

    // Schema
    PrimaryKey,

    // Persistence
    CouldNotPersist,
    Sql,
    Serialization,
    ExternalService,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::PropertyNotDefined => "ERR_PROPERTY_NOT_DEFINED",
            ExErrorKind::ReadOnlyViolation => "ERR_READ_ONLY_VIOLATION",
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::RepositoryNotRegistered => "ERR_REPOSITORY_NOT_REGISTERED",
            ExErrorKind::RepositoryNotInitialized => "ERR_REPOSITORY_NOT_INITIALIZED",
            ExErrorKind::NotImplemented => "ERR_NOT_IMPLEMENTED",
            ExErrorKind::PrimaryKey => "ERR_PRIMARY_KEY",
            ExErrorKind::CouldNotPersist => "ERR_COULD_NOT_PERSIST",
            ExErrorKind::Sql => "ERR_SQL",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::ExternalService => "ERR_EXTERNAL_SERVICE",
        }
    }
}

/// Canonical structured error type
///
/// A classified, context-carrying view of a failure, built from an
/// [`EntimapError`] at operation boundaries.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    model: Option<String>,
    field: Option<String>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            model: None,
            field: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add the model kind (or table) the failure concerns
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Add the field the failure concerns
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

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
        if let Some(model) = &self.model {
            write!(f, " (model: {})", model)?;
        }
        if let Some(field) = &self.field {
            write!(f, " (field: {})", field)?;
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

// ========== Domain Errors ==========

/// Errors raised by the mapping layer.
///
/// Absence of a record is not an error: lookups return `Ok(None)`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EntimapError {
    #[error("Property {field} is not defined on model {model}")]
    PropertyNotDefined { model: String, field: String },

    #[error("Cannot write read-only property {field} on model {model}")]
    ReadOnlyViolation { model: String, field: String },

    #[error("Repository for model {model} not found")]
    RepositoryNotRegistered { model: String },

    #[error("Repository {repository} is not attached to a manager")]
    RepositoryNotInitialized { repository: String },

    #[error("Method {method} is not implemented by repository {repository}")]
    RepositoryMethodNotImplemented { repository: String, method: String },

    #[error("Model {model} must declare exactly one primary key column, found {found}")]
    PrimaryKey { model: String, found: usize },

    #[error("Model {model} has no value for primary key {column}")]
    MissingPrimaryKey { model: String, column: String },

    #[error("Could not persist {model}: {detail}")]
    CouldNotPersist { model: String, detail: String },

    #[error("Host call {operation} failed: {detail}")]
    HostFailure { operation: String, detail: String },

    #[error("SQL error: {message}")]
    Sql { message: String },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl EntimapError {
    /// Shorthand for [`EntimapError::Sql`].
    pub fn sql(message: impl Into<String>) -> Self {
        EntimapError::Sql {
            message: message.into(),
        }
    }

    pub fn not_implemented(repository: impl Into<String>, method: impl Into<String>) -> Self {
        EntimapError::RepositoryMethodNotImplemented {
            repository: repository.into(),
            method: method.into(),
        }
    }
}

impl From<serde_json::Error> for EntimapError {
    fn from(err: serde_json::Error) -> Self {
        EntimapError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<EntimapError> for ExError {
    fn from(err: EntimapError) -> Self {
        let message = err.to_string();
        match err {
            EntimapError::PropertyNotDefined { model, field } => {
                ExError::new(ExErrorKind::PropertyNotDefined)
                    .with_model(model)
                    .with_field(field)
                    .with_message(message)
            }
            EntimapError::ReadOnlyViolation { model, field } => {
                ExError::new(ExErrorKind::ReadOnlyViolation)
                    .with_op("set")
                    .with_model(model)
                    .with_field(field)
                    .with_message(message)
            }
            EntimapError::RepositoryNotRegistered { model } => {
                ExError::new(ExErrorKind::RepositoryNotRegistered)
                    .with_op("get_model_repository")
                    .with_model(model)
                    .with_message(message)
            }
            EntimapError::RepositoryNotInitialized { repository } => {
                ExError::new(ExErrorKind::RepositoryNotInitialized)
                    .with_model(repository)
                    .with_message(message)
            }
            EntimapError::RepositoryMethodNotImplemented { repository, method } => {
                ExError::new(ExErrorKind::NotImplemented)
                    .with_op(method)
                    .with_model(repository)
                    .with_message(message)
            }
            EntimapError::PrimaryKey { model, .. } => ExError::new(ExErrorKind::PrimaryKey)
                .with_model(model)
                .with_message(message),
            EntimapError::MissingPrimaryKey { model, column } => {
                ExError::new(ExErrorKind::PrimaryKey)
                    .with_model(model)
                    .with_field(column)
                    .with_message(message)
            }
            EntimapError::CouldNotPersist { model, .. } => {
                ExError::new(ExErrorKind::CouldNotPersist)
                    .with_op("save")
                    .with_model(model)
                    .with_message(message)
            }
            EntimapError::HostFailure { operation, .. } => {
                ExError::new(ExErrorKind::ExternalService)
                    .with_op(operation)
                    .with_message(message)
            }
            EntimapError::Sql { .. } => ExError::new(ExErrorKind::Sql).with_message(message),
            EntimapError::InvalidInput { .. } => {
                ExError::new(ExErrorKind::InvalidInput).with_message(message)
            }
            EntimapError::Serialization { .. } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_prefixed_and_unique() {
        let kinds = [
            ExErrorKind::PropertyNotDefined,
            ExErrorKind::ReadOnlyViolation,
            ExErrorKind::InvalidInput,
            ExErrorKind::RepositoryNotRegistered,
            ExErrorKind::RepositoryNotInitialized,
            ExErrorKind::NotImplemented,
            ExErrorKind::PrimaryKey,
            ExErrorKind::CouldNotPersist,
            ExErrorKind::Sql,
            ExErrorKind::Serialization,
            ExErrorKind::ExternalService,
        ];
        let mut codes: Vec<&str> = kinds.iter().map(|k| k.code()).collect();
        assert!(codes.iter().all(|c| c.starts_with("ERR_")));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
    }

    #[test]
    fn display_includes_code_and_context() {
        let err = ExError::new(ExErrorKind::ReadOnlyViolation)
            .with_op("set")
            .with_model("post")
            .with_field("date")
            .with_message("nope");
        let rendered = err.to_string();
        assert!(rendered.starts_with("[ERR_READ_ONLY_VIOLATION]"));
        assert!(rendered.contains("'set'"));
        assert!(rendered.contains("(model: post)"));
        assert!(rendered.contains("(field: date)"));
    }
}
