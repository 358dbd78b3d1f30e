//! Error taxonomy shared by the automation core.
//!
//! Each component owns one error enum. Parse-time and validation failures are
//! surfaced to callers as values; per-action execution failures are folded into
//! `ExecutionResult`s by the engine and never escape a sequence.

use thiserror::Error;

/// Malformed action descriptor or action parameter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ActionError(pub String);

impl ActionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Malformed rule descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("rule requires condition or conditions")]
    MissingCondition,

    #[error("rule descriptor must be an object")]
    NotAnObject,

    #[error("unsupported condition: {0}")]
    InvalidCondition(String),

    #[error("unknown operator '{0}'")]
    UnknownOperator(String),

    #[error("invalid rule field '{0}'")]
    InvalidField(&'static str),
}

/// Workflow validation or compilation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    /// One or more validation errors, joined with `"; "`.
    #[error("{}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error("workflow graph contains cycles or disconnected nodes")]
    Cycle,

    #[error("workflow contains no executable actions")]
    Empty,

    #[error("invalid flowgram payload: {0}")]
    FlowGram(String),
}

/// Replay setup failure (bad speed, missing items, unreadable replay file).
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("speed must be greater than 0")]
    InvalidSpeed,

    #[error("no replay items loaded")]
    NothingLoaded,

    #[error("replay file not found: {0}")]
    NotFound(String),

    #[error("replay file must contain a list of events/actions")]
    InvalidPayload,

    #[error("no recorded events to export")]
    NothingRecorded,

    #[error("invalid event: {0}")]
    InvalidEvent(String),

    #[error("replay i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("replay json failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure signalled by the Input/Capture Backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Operator-initiated abort (pointer parked in the failsafe corner).
    #[error("failsafe triggered")]
    FailSafe,

    #[error("input simulation failed: {0}")]
    Input(String),

    #[error("backend connection failed: {0}")]
    Connection(String),

    #[error("unsupported by backend: {0}")]
    Unsupported(String),

    #[error("backend i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    /// Classification recorded in `ExecutionResult.data.error`.
    pub fn kind(&self) -> &'static str {
        match self {
            BackendError::FailSafe => "FailSafe",
            BackendError::Input(_) => "InputError",
            BackendError::Connection(_) => "ConnectionError",
            BackendError::Unsupported(_) => "Unsupported",
            BackendError::Io(_) => "IoError",
        }
    }

    pub fn is_failsafe(&self) -> bool {
        matches!(self, BackendError::FailSafe)
    }

    /// Failures worth re-attempting under an action's `retry` budget.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BackendError::Input(_) | BackendError::Connection(_) | BackendError::Io(_)
        )
    }
}

impl From<enigo::InputError> for BackendError {
    fn from(err: enigo::InputError) -> Self {
        BackendError::Input(err.to_string())
    }
}

impl From<enigo::NewConError> for BackendError {
    fn from(err: enigo::NewConError) -> Self {
        BackendError::Connection(err.to_string())
    }
}

/// Action registry misuse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("action already registered: {0}")]
    AlreadyRegistered(String),

    #[error("cannot override built-in action: {0}")]
    BuiltIn(String),
}

/// Persistence collaborator failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_error_joins_messages() {
        let err = WorkflowError::Invalid(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "a; b");
    }

    #[test]
    fn backend_error_kinds() {
        assert_eq!(BackendError::FailSafe.kind(), "FailSafe");
        assert!(BackendError::FailSafe.is_failsafe());
        assert_eq!(BackendError::Input("x".into()).kind(), "InputError");
        assert!(!BackendError::Unsupported("hscroll".into()).is_failsafe());
        assert!(BackendError::Connection("x".into()).is_transient());
        assert!(!BackendError::FailSafe.is_transient());
        assert!(!BackendError::Unsupported("hscroll".into()).is_transient());
    }
}
