//! Predicate construction from a policy and the caller identity.

use std::collections::HashMap;
use std::sync::Arc;

use sqlparser::ast::{BinaryOperator, Expr, Ident, Value};
use sqlward_core::{AccessPolicy, Identity, PolicyKind, WardConfig};

use crate::error::WardError;

/// Supplies the transitive descendant departments of a department.
///
/// The hierarchy itself lives outside this engine; only the resulting id
/// set is consumed here, for [`PolicyKind::DeptAndChild`] predicates.
pub trait DeptHierarchy: Send + Sync {
    /// Ids of every department below `dept_id`, the department itself
    /// excluded.
    fn descendant_ids(&self, dept_id: &str) -> Vec<String>;
}

/// Supplies the predicate for a [`PolicyKind::Custom`] policy.
///
/// Providers are registered per resource. Returning `Ok(None)` means "no
/// restriction", including for admins: the admin bypass does not apply
/// to custom policies, the provider decides.
pub trait CustomPredicateProvider: Send + Sync {
    /// Build the predicate for this policy and caller.
    fn predicate(
        &self,
        policy: &AccessPolicy,
        identity: &Identity,
    ) -> anyhow::Result<Option<Expr>>;
}

/// Builds row-restriction predicates.
///
/// Column names come from the configuration, resolved once at
/// construction. An admin caller (explicit flag, or holder of the
/// configured admin role) is unrestricted for every kind except
/// [`PolicyKind::Custom`].
pub struct PredicateBuilder {
    config: Arc<WardConfig>,
    hierarchy: Option<Arc<dyn DeptHierarchy>>,
    custom: HashMap<String, Arc<dyn CustomPredicateProvider>>,
}

impl PredicateBuilder {
    /// Create a builder over the given configuration.
    pub fn new(config: Arc<WardConfig>) -> Self {
        Self {
            config,
            hierarchy: None,
            custom: HashMap::new(),
        }
    }

    /// Wire the department hierarchy lookup.
    ///
    /// Without one, [`PolicyKind::DeptAndChild`] narrows to the caller's
    /// own department.
    pub fn with_hierarchy(mut self, hierarchy: Arc<dyn DeptHierarchy>) -> Self {
        self.hierarchy = Some(hierarchy);
        self
    }

    /// Register the predicate provider for a custom-policy resource.
    pub fn with_custom_provider(
        mut self,
        resource: impl Into<String>,
        provider: Arc<dyn CustomPredicateProvider>,
    ) -> Self {
        self.custom.insert(resource.into(), provider);
        self
    }

    /// Build the predicate implementing `policy` for `identity`.
    ///
    /// `Ok(None)` means no restriction; the caller leaves the statement's
    /// filter untouched.
    pub fn build(
        &self,
        policy: &AccessPolicy,
        identity: &Identity,
    ) -> Result<Option<Expr>, WardError> {
        let kind = self.effective_kind(policy.kind);
        let admin = identity.is_admin || identity.has_role(&self.config.admin_role_code);
        if admin && kind != PolicyKind::Custom {
            return Ok(None);
        }

        match kind {
            PolicyKind::All => Ok(None),
            PolicyKind::SelfOnly | PolicyKind::Default => Ok(Some(self.equals(
                &policy.table_alias,
                &self.config.user_id_column,
                &identity.user_id,
            ))),
            PolicyKind::Dept => Ok(Some(self.equals(
                &policy.table_alias,
                &self.config.dept_id_column,
                &identity.dept_id,
            ))),
            PolicyKind::DeptAndChild => {
                let mut dept_ids = vec![identity.dept_id.clone()];
                if let Some(hierarchy) = &self.hierarchy {
                    dept_ids.extend(hierarchy.descendant_ids(&identity.dept_id));
                }
                Ok(Some(self.in_list(
                    &policy.table_alias,
                    &self.config.dept_id_column,
                    &dept_ids,
                )))
            }
            PolicyKind::Custom => {
                let provider = self.custom.get(&policy.resource).ok_or_else(|| {
                    WardError::MissingCustomProvider {
                        resource: policy.resource.clone(),
                    }
                })?;
                provider.predicate(policy, identity).map_err(WardError::Internal)
            }
        }
    }

    /// Resolve a declared kind to a concrete one. `Default` follows the
    /// configured default; a configuration that itself says `Default`
    /// falls back to the most restrictive kind.
    fn effective_kind(&self, declared: PolicyKind) -> PolicyKind {
        match declared {
            PolicyKind::Default => match self.config.default_policy_kind {
                PolicyKind::Default => PolicyKind::SelfOnly,
                kind => kind,
            },
            kind => kind,
        }
    }

    fn column(&self, alias: &str, column: &str) -> Expr {
        if alias.is_empty() {
            Expr::Identifier(Ident::new(column))
        } else {
            Expr::CompoundIdentifier(vec![Ident::new(alias), Ident::new(column)])
        }
    }

    fn equals(&self, alias: &str, column: &str, value: &str) -> Expr {
        Expr::BinaryOp {
            left: Box::new(self.column(alias, column)),
            op: BinaryOperator::Eq,
            right: Box::new(string_literal(value)),
        }
    }

    fn in_list(&self, alias: &str, column: &str, values: &[String]) -> Expr {
        Expr::InList {
            expr: Box::new(self.column(alias, column)),
            list: values.iter().map(|v| string_literal(v)).collect(),
            negated: false,
        }
    }
}

fn string_literal(value: &str) -> Expr {
    Expr::Value(Value::SingleQuotedString(value.to_string()).into())
}
