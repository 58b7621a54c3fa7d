//! Error types for statement rewriting.

use sqlward_core::IdentityError;
use thiserror::Error;

use crate::statement::StatementKind;

/// Errors that can occur while rewriting a statement.
///
/// Every variant except [`WardError::Internal`]'s wrapped causes is
/// fatal to the originating database call: the statement never executes.
/// Retrying a permission failure is meaningless, so there is no retry
/// signal here.
#[derive(Debug, Error)]
pub enum WardError {
    /// SQL text is not a syntactically valid single statement.
    #[error("failed to parse SQL: {0}")]
    Parse(String),

    /// The statement parsed but cannot be safely rewritten. Skipping the
    /// rewrite instead would execute an unrestricted statement.
    #[error("unsupported statement: {reason}")]
    UnsupportedStatement { reason: String },

    /// No caller identity is bound to the current call.
    #[error("no identity bound to the current call")]
    NoIdentity,

    /// The caller identity carries no tenant id.
    #[error("identity carries no tenant id")]
    MissingTenant,

    /// UPDATE or DELETE submitted without a WHERE clause.
    #[error("{kind} without a WHERE clause is blocked")]
    UnguardedMutation { kind: StatementKind },

    /// A CUSTOM policy references a resource with no registered
    /// predicate provider.
    #[error("no custom predicate provider registered for resource '{resource}'")]
    MissingCustomProvider { resource: String },

    /// Failure inside a custom predicate provider.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<IdentityError> for WardError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::NoIdentity => WardError::NoIdentity,
        }
    }
}
