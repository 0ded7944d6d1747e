use thiserror::Error;

/// Error kinds from spec §7. `UserError` propagates unchanged; everything
/// else gets a continuation trace attached by `eval::eval` before reaching
/// the driver (`Traced`).
#[derive(Error, Debug, Clone)]
pub enum SchemeError {
    #[error("read error: {0}")]
    ReadError(String),
    #[error("unbound symbol: {0}")]
    UnboundSymbol(String),
    #[error("arity mismatch: expected {expected}, got {got}")]
    Arity { expected: String, got: usize },
    #[error("not callable: {0}")]
    NotCallable(String),
    #[error("improper list: expected a proper list, found {found}")]
    ImproperList { found: String },
    #[error("type error: expected {expected}, found {found}")]
    Type { expected: String, found: String },
    #[error("{message}: {irritant}")]
    UserError { message: String, irritant: String },
    #[error("internal error: {0}")]
    Internal(String),
    #[error("{0}\n{1}")]
    Traced(Box<SchemeError>, String),
}

impl SchemeError {
    /// Wraps a non-user error with a rendering of the pending continuation,
    /// per §7's propagation policy. `UserError` and an already-traced error
    /// pass through unchanged.
    pub fn with_trace(self, trace: impl FnOnce() -> String) -> SchemeError {
        match self {
            SchemeError::UserError { .. } | SchemeError::Traced(..) => self,
            other => SchemeError::Traced(Box::new(other), trace()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SchemeError>;
