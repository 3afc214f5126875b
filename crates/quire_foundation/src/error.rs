//! Error types for the Quire system.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.

use std::fmt;

use thiserror::Error;

use crate::types::Type;

/// Result alias used throughout Quire.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Quire operations.
#[derive(Debug, Clone, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Creates a field not found error.
    #[must_use]
    pub fn field_not_found(field: impl Into<String>) -> Self {
        Self::new(ErrorKind::FieldNotFound(field.into()))
    }

    /// Creates a duplicate field error.
    #[must_use]
    pub fn duplicate_field(field: impl Into<String>) -> Self {
        Self::new(ErrorKind::DuplicateField(field.into()))
    }

    /// Creates a type mismatch error.
    #[must_use]
    pub fn type_mismatch(expected: Type, actual: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch {
            expected,
            actual: actual.into(),
        })
    }

    /// Creates an invalid value error.
    #[must_use]
    pub fn invalid_value(what: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidValue {
            what: what.into(),
            value: value.into(),
        })
    }

    /// Creates an unknown entry error.
    #[must_use]
    pub fn unknown_entry(what: impl Into<String>, entry: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownEntry {
            what: what.into(),
            entry: entry.into(),
        })
    }

    /// Creates an index out of bounds error.
    #[must_use]
    pub fn index_out_of_bounds(index: usize, length: usize) -> Self {
        Self::new(ErrorKind::IndexOutOfBounds { index, length })
    }

    /// Creates an unresolved module error.
    #[must_use]
    pub fn unresolved_module(module: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnresolvedModule(module.into()))
    }

    /// Creates a serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SerializationError(message.into()))
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal(message.into()))
    }

    /// Returns the rank of this error; lower ranks are simpler errors.
    #[must_use]
    pub fn rank(&self) -> u8 {
        self.kind.rank()
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Clone, Error)]
pub enum ErrorKind {
    /// Field does not exist in the format.
    #[error("field not found: {0}")]
    FieldNotFound(String),

    /// Field name is declared twice.
    #[error("duplicate field: {0}")]
    DuplicateField(String),

    /// Field is redeclared at a different position.
    #[error("field {field} is already declared at position {existing}, not {requested}")]
    FieldPosition {
        /// The field name.
        field: String,
        /// Position it was declared at first.
        existing: usize,
        /// Position of the conflicting declaration.
        requested: usize,
    },

    /// The format belongs to an owner that does not allow changes.
    #[error("format is read-only: cannot change field {0}")]
    ReadOnlyFormat(String),

    /// Model property has a getter and no setter.
    #[error("property is read-only: {0}")]
    ReadOnlyProperty(String),

    /// Value does not fit the declared field type.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The declared type.
        expected: Type,
        /// Description of the actual value.
        actual: String,
    },

    /// Value has the right type but an unacceptable form.
    #[error("invalid {what}: {value}")]
    InvalidValue {
        /// What was looked up.
        what: String,
        /// The rejected value.
        value: String,
    },

    /// Name is not part of a dictionary (enum value, flag name).
    #[error("unknown {what}: {entry}")]
    UnknownEntry {
        /// The dictionary kind looked up.
        what: String,
        /// The missing entry.
        entry: String,
    },
    /// Index out of bounds.
    #[error("index out of bounds: {index} (length {length})")]
    IndexOutOfBounds {
        /// The index that was accessed.
        index: usize,
        /// The actual length of the collection.
        length: usize,
    },

    /// Computed property re-entered itself.
    #[error("recursive property evaluation: {0}")]
    RecursiveProperty(String),

    /// Module name could not be resolved to a class.
    #[error("unresolved module: {0}")]
    UnresolvedModule(String),

    /// Resolved class cannot be revived.
    #[error("module {0} does not provide from_json")]
    MissingFromJson(String),

    /// Link points to an instance id that is not in the document.
    #[error("dangling link to instance {0}")]
    DanglingLink(u64),

    /// Two instance signatures share an id.
    #[error("duplicate instance id {0}")]
    DuplicateInstance(u64),

    /// Instance cannot be serialized because it has no module name.
    #[error("instance has no module name: {0}")]
    MissingModuleName(String),

    /// Function cannot be serialized or revived.
    #[error("unsupported function: {0}")]
    UnsupportedFunction(String),

    /// Instance cannot restore a deferred link at the given path.
    #[error("cannot restore link at {0}")]
    UnresolvedLink(String),

    /// Encoding or decoding failed.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

impl ErrorKind {
    /// Returns how simple this error is; batch operations report the lowest rank.
    #[must_use]
    pub fn rank(&self) -> u8 {
        match self {
            Self::TypeMismatch { .. } | Self::InvalidValue { .. } => 0,
            Self::IndexOutOfBounds { .. } => 1,
            Self::FieldNotFound(_)
            | Self::UnknownEntry { .. }
            | Self::DuplicateField(_)
            | Self::FieldPosition { .. } => 2,
            Self::ReadOnlyFormat(_) | Self::ReadOnlyProperty(_) => 3,
            Self::RecursiveProperty(_) => 4,
            Self::UnresolvedModule(_)
            | Self::MissingFromJson(_)
            | Self::DanglingLink(_)
            | Self::DuplicateInstance(_)
            | Self::MissingModuleName(_)
            | Self::UnsupportedFunction(_)
            | Self::UnresolvedLink(_)
            | Self::SerializationError(_) => 5,
            Self::Internal(_) => 6,
        }
    }
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Entity or module the error relates to.
    pub source: Option<String>,
    /// Field path, outermost first.
    pub path: Vec<String>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the source.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Appends a path segment.
    #[must_use]
    pub fn with_segment(mut self, segment: impl Into<String>) -> Self {
        self.path.push(segment.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = &self.source {
            write!(f, "in {source}")?;
        }
        if !self.path.is_empty() {
            write!(f, " at {}", self.path.join("."))?;
        }
        Ok(())
    }
}
