//! Row-security policy enforcement.

use std::sync::Arc;

use sqlward_core::{WardConfig, identity};
use sqlward_policy::PolicyRegistry;

use crate::error::WardError;
use crate::predicate::PredicateBuilder;
use crate::statement::{ParsedStatement, StatementKind};

/// Applies the call site's declared row-security policy to a SELECT.
///
/// Resolves the policy, builds its predicate for the current caller, and
/// AND-merges it into the statement's filter. Statements without a
/// resolved, enabled policy pass through; non-SELECT statements always
/// pass through. Any internal failure aborts the call, because an
/// unmodified statement is an unrestricted one.
pub struct RowSecurityInterceptor {
    enabled: bool,
    registry: Arc<PolicyRegistry>,
    builder: PredicateBuilder,
}

impl RowSecurityInterceptor {
    /// Create an interceptor over a sealed registry.
    pub fn new(
        config: Arc<WardConfig>,
        registry: Arc<PolicyRegistry>,
        builder: PredicateBuilder,
    ) -> Self {
        Self {
            enabled: config.data_permission_enabled,
            registry,
            builder,
        }
    }

    /// Merge the policy predicate for `call_site_id` into a SELECT's
    /// filter.
    ///
    /// Returns the predicate text when one was injected, for reporting.
    pub fn apply(
        &self,
        stmt: &mut ParsedStatement,
        call_site_id: &str,
    ) -> Result<Option<String>, WardError> {
        if !self.enabled || stmt.kind() != StatementKind::Select {
            return Ok(None);
        }
        let Some(policy) = self.registry.resolve(call_site_id) else {
            return Ok(None);
        };
        if !policy.enabled {
            return Ok(None);
        }

        let identity = identity::current()?;
        let Some(predicate) = self.builder.build(&policy, &identity)? else {
            return Ok(None);
        };

        let description = predicate.to_string();
        tracing::debug!(
            call_site = call_site_id,
            resource = policy.resource,
            predicate = description,
            "applying row-security policy"
        );
        stmt.merge_filter(predicate);
        Ok(Some(description))
    }
}
