//! Error types for the reconciliation engine.

use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can abort a reconciliation.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A ruleset binding carries a pattern that is not a valid regular
    /// expression.
    #[error("invalid ruleset pattern {pattern:?}: {source}")]
    RulesetPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A ruleset binding references a ruleset the declared state does not
    /// define.
    #[error("ruleset {name:?} is not defined in the declared state")]
    UnknownRuleset { name: String },

    /// The executor refused or failed a forwarded operation.
    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

/// Failure reported by the executor for a single forwarded operation.
#[derive(Debug, Error)]
#[error("executor failed on {command}: {message}")]
pub struct ExecutorError {
    /// The operation that failed, in its audit-log spelling.
    pub command: String,
    /// Remote refusal or transport failure detail.
    pub message: String,
}

impl ExecutorError {
    /// Create an executor error for the given command.
    pub fn new(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            message: message.into(),
        }
    }
}
