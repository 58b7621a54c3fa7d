//! Full-table mutation guard.

use crate::error::WardError;
use crate::statement::{ParsedStatement, StatementKind};

/// Blocks UPDATE and DELETE statements that carry no WHERE clause.
///
/// Runs first in the chain, on the statement as originally submitted: a
/// predicate injected later in the chain must not be mistaken for caller
/// intent and mask a missing-WHERE bug.
#[derive(Debug, Clone, Copy, Default)]
pub struct MutationGuard;

impl MutationGuard {
    /// Create a new guard.
    pub fn new() -> Self {
        Self
    }

    /// Check a statement. SELECTs always pass; UPDATE/DELETE pass only
    /// with a filter clause present.
    pub fn check(&self, stmt: &ParsedStatement) -> Result<(), WardError> {
        match stmt.kind() {
            StatementKind::Select => Ok(()),
            kind @ (StatementKind::Update | StatementKind::Delete) => {
                if stmt.has_filter() {
                    Ok(())
                } else {
                    tracing::warn!(
                        kind = %kind,
                        table = stmt.primary_table().map(|t| t.name.as_str()).unwrap_or(""),
                        "blocked full-table mutation"
                    );
                    Err(WardError::UnguardedMutation { kind })
                }
            }
        }
    }
}
