use std::borrow::Cow;

use thiserror::Error;

/// Top-level error type returned by snugmodel fields, models and keys.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A field or model was declared with invalid or incompatible options.
    #[error("configuration error: {message}")]
    Configuration { message: Cow<'static, str> },

    /// A value has the wrong runtime type, failed a validator, or is outside the choice set.
    #[error("bad value for {field}: {message}")]
    BadValue { field: String, message: String },

    /// A filter could not be built for the requested field and value.
    #[error("bad filter: {message}")]
    BadFilter { message: String },

    /// An argument of the wrong shape was supplied.
    #[error("bad argument: {message}")]
    BadArgument { message: String },

    /// A resource id could not be decoded into a key.
    #[error("'{resource_id}' is not a valid resource id")]
    InvalidId { resource_id: String },

    /// An attribute name did not resolve to a declared field.
    #[error("model {kind} has no attribute {attribute}")]
    UnknownAttribute { kind: String, attribute: String },

    /// An internal invariant did not hold. Indicates a logic error, not bad input.
    #[error("internal invariant violated: {message}")]
    Internal { message: String },

    /// Entity-level validation failed for one or more fields.
    #[error("validation failed")]
    Validation(#[from] ValidationError),
}

impl ModelError {
    pub fn config(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn bad_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BadValue {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn bad_filter(message: impl Into<String>) -> Self {
        Self::BadFilter {
            message: message.into(),
        }
    }

    pub fn bad_argument(message: impl Into<String>) -> Self {
        Self::BadArgument {
            message: message.into(),
        }
    }

    pub fn invalid_id(resource_id: impl Into<String>) -> Self {
        Self::InvalidId {
            resource_id: resource_id.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Collection of validation issues found while checking an entity before persistence.
#[derive(Debug, Error)]
#[error("validation errors: {issues:?}")]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new<I>(issues: I) -> Self
    where
        I: IntoIterator<Item = ValidationIssue>,
    {
        Self {
            issues: issues.into_iter().collect(),
        }
    }

    /// Convenience helper for constructing a single-field validation error.
    pub fn single(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new([ValidationIssue::new(field, code, message)])
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Detailed validation failure for a single field or dotted path.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}

pub type ModelResult<T> = Result<T, ModelError>;

pub type ValidationResult<T> = Result<T, ValidationError>;
