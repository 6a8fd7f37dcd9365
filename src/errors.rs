use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::store::{EntityId, StoreError};
use crate::value::Value;

pub type ScriptResult<T> = Result<T, ScriptError>;

//==================================================
// Section 1.0 - Error Codes
//==================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    UnresolvedOpcode,
    UnresolvedVerb,
    UndefinedVariable,
    TypeMismatch,
    CapabilityDenied,
    GasExhausted,
    Usage,
    Runtime,
    DepthExceeded,
    EntityNotFound,
    Thrown,
    Configuration,
    Store,
    Internal,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::UnresolvedOpcode => "E101",
            ErrorCode::UnresolvedVerb => "E102",
            ErrorCode::UndefinedVariable => "E103",
            ErrorCode::TypeMismatch => "E104",
            ErrorCode::CapabilityDenied => "E201",
            ErrorCode::GasExhausted => "E202",
            ErrorCode::DepthExceeded => "E203",
            ErrorCode::Usage => "E301",
            ErrorCode::Thrown => "E302",
            ErrorCode::Runtime => "E303",
            ErrorCode::EntityNotFound => "E304",
            ErrorCode::Configuration => "E401",
            ErrorCode::Store => "E402",
            ErrorCode::Internal => "E500",
        }
    }
}

//==================================================
// Section 2.0 - Script Errors
//==================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    #[error("unresolved opcode '{0}'")]
    UnresolvedOpcode(String),
    #[error("verb '{verb}' not found on entity {entity} or its prototypes")]
    UnresolvedVerb { entity: EntityId, verb: String },
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("capability denied: {0}")]
    CapabilityDenied(String),
    #[error("gas exhausted (budget {budget})")]
    GasExhausted { budget: u64 },
    #[error("{0}")]
    Usage(String),
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("call depth limit of {0} exceeded")]
    DepthExceeded(usize),
    #[error("entity {0} not found")]
    EntityNotFound(EntityId),
    #[error("{message}")]
    Thrown { message: String, payload: JsonValue },
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ScriptError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ScriptError::UnresolvedOpcode(_) => ErrorCode::UnresolvedOpcode,
            ScriptError::UnresolvedVerb { .. } => ErrorCode::UnresolvedVerb,
            ScriptError::UndefinedVariable(_) => ErrorCode::UndefinedVariable,
            ScriptError::TypeMismatch(_) => ErrorCode::TypeMismatch,
            ScriptError::CapabilityDenied(_) => ErrorCode::CapabilityDenied,
            ScriptError::GasExhausted { .. } => ErrorCode::GasExhausted,
            ScriptError::Usage(_) => ErrorCode::Usage,
            ScriptError::Runtime(_) => ErrorCode::Runtime,
            ScriptError::DepthExceeded(_) => ErrorCode::DepthExceeded,
            ScriptError::EntityNotFound(_) => ErrorCode::EntityNotFound,
            ScriptError::Thrown { .. } => ErrorCode::Thrown,
            ScriptError::Configuration(_) => ErrorCode::Configuration,
            ScriptError::Store(_) => ErrorCode::Store,
            ScriptError::Internal(_) => ErrorCode::Internal,
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code().as_str()
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        ScriptError::TypeMismatch(message.into())
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        ScriptError::Runtime(message.into())
    }

    pub fn denied(message: impl Into<String>) -> Self {
        ScriptError::CapabilityDenied(message.into())
    }

    /// Raise a script-level `throw` carrying `value`.
    pub fn thrown(value: &Value) -> Self {
        let payload = value
            .to_json()
            .unwrap_or_else(|_| JsonValue::String(value.display_string()));
        ScriptError::Thrown {
            message: value.display_string(),
            payload,
        }
    }

    /// Expected, user-facing validation failures raised by verb logic.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, ScriptError::Usage(_) | ScriptError::Thrown { .. })
    }

    /// The engine never retries an invocation on its own; hosts may retry
    /// store hiccups but never budget or authorization failures.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ScriptError::Store(_))
    }

    /// Whether a script-level `try` may intercept this error.
    pub fn is_catchable(&self) -> bool {
        !matches!(
            self,
            ScriptError::GasExhausted { .. }
                | ScriptError::CapabilityDenied(_)
                | ScriptError::UnresolvedOpcode(_)
                | ScriptError::DepthExceeded(_)
                | ScriptError::Configuration(_)
                | ScriptError::Internal(_)
        )
    }

    /// Only registry or engine invariant violations are fatal to the host.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScriptError::Internal(_))
    }

    /// Value bound by a `try` handler.
    pub fn catch_value(&self) -> Value {
        match self {
            ScriptError::Thrown { payload, .. } => Value::from_json(payload),
            other => Value::String(other.to_string()),
        }
    }
}

impl From<StoreError> for ScriptError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::EntityNotFound(id) => ScriptError::EntityNotFound(id),
            other => ScriptError::Store(other.to_string()),
        }
    }
}

//==================================================
// Section 3.0 - Unwinding Signals
//==================================================
// Loop and return control travel beside errors so both engines unwind
// frames through the same `?` paths.

#[derive(Debug, Clone)]
pub(crate) enum Interrupt {
    Error(ScriptError),
    Break,
    Continue,
    Return(Value),
}

impl From<ScriptError> for Interrupt {
    fn from(value: ScriptError) -> Self {
        Interrupt::Error(value)
    }
}

pub(crate) type Flow = Result<Value, Interrupt>;

impl Interrupt {
    /// Resolve a signal at a closure or invocation boundary.
    pub(crate) fn settle(self) -> ScriptResult<Value> {
        match self {
            Interrupt::Return(value) => Ok(value),
            Interrupt::Break => Err(ScriptError::runtime("break outside loop")),
            Interrupt::Continue => Err(ScriptError::runtime("continue outside loop")),
            Interrupt::Error(error) => Err(error),
        }
    }
}

pub(crate) fn settle(flow: Flow) -> ScriptResult<Value> {
    flow.or_else(Interrupt::settle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_and_authorization_failures_are_not_retryable() {
        assert!(!ScriptError::GasExhausted { budget: 10 }.is_retryable());
        assert!(!ScriptError::denied("fs.write").is_retryable());
        assert!(ScriptError::Store("locked".into()).is_retryable());
    }

    #[test]
    fn usage_errors_are_user_facing_and_catchable() {
        let err = ScriptError::Usage("Usage: create_note <title>".into());
        assert!(err.is_user_facing());
        assert!(err.is_catchable());
        assert_eq!(err.code_str(), "E301");
        assert!(!ScriptError::GasExhausted { budget: 1 }.is_catchable());
    }

    #[test]
    fn break_escaping_a_boundary_becomes_runtime_error() {
        let err = settle(Err(Interrupt::Break)).expect_err("break must not escape");
        assert_eq!(err.code(), ErrorCode::Runtime);
        let value = settle(Err(Interrupt::Return(Value::Number(4.0)))).expect("return settles");
        assert_eq!(value, Value::Number(4.0));
    }
}
