//! Tenant isolation.

use std::sync::Arc;

use sqlparser::ast::{BinaryOperator, Expr, Ident, Value};
use sqlward_core::{WardConfig, identity};

use crate::error::WardError;
use crate::statement::{ParsedStatement, StatementKind};

/// Injects the mandatory tenant predicate into read statements.
///
/// Unlike row security there is no declarative opt-in: every SELECT
/// against a non-exempt table is scoped to the caller's tenant. The
/// predicate composes with a row-security predicate when both apply. An
/// identity without a tenant id is fatal; there is no "show all
/// tenants" fallback.
pub struct TenantInterceptor {
    config: Arc<WardConfig>,
}

impl TenantInterceptor {
    /// Create an interceptor over the given configuration.
    pub fn new(config: Arc<WardConfig>) -> Self {
        Self { config }
    }

    /// Merge `tenant_id = <caller tenant>` into a SELECT's filter.
    ///
    /// Returns the predicate text when one was injected, for reporting.
    pub fn apply(&self, stmt: &mut ParsedStatement) -> Result<Option<String>, WardError> {
        if !self.config.tenant_filter_enabled || stmt.kind() != StatementKind::Select {
            return Ok(None);
        }
        let Some(table) = stmt.primary_table() else {
            // Table-less select, nothing to scope
            return Ok(None);
        };
        if self.config.is_tenant_exempt(&table.name) {
            tracing::debug!(table = table.name, "table exempt from tenant filtering");
            return Ok(None);
        }
        let alias = table.alias.clone();

        let identity = identity::current()?;
        let tenant_id = identity.tenant_id.as_deref().ok_or(WardError::MissingTenant)?;

        let column = match alias {
            Some(alias) => Expr::CompoundIdentifier(vec![
                Ident::new(alias),
                Ident::new(&self.config.tenant_id_column),
            ]),
            None => Expr::Identifier(Ident::new(&self.config.tenant_id_column)),
        };
        let predicate = Expr::BinaryOp {
            left: Box::new(column),
            op: BinaryOperator::Eq,
            right: Box::new(Expr::Value(
                Value::SingleQuotedString(tenant_id.to_string()).into(),
            )),
        };
        let description = predicate.to_string();
        stmt.merge_filter(predicate);
        Ok(Some(description))
    }
}
