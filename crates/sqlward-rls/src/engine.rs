//! The orchestrating interceptor chain.

use std::collections::HashMap;
use std::sync::Arc;

use sqlward_core::WardConfig;
use sqlward_policy::PolicyRegistry;

use crate::error::WardError;
use crate::guard::MutationGuard;
use crate::predicate::{CustomPredicateProvider, DeptHierarchy, PredicateBuilder};
use crate::row_security::RowSecurityInterceptor;
use crate::statement::StatementParser;
use crate::tenant::TenantInterceptor;

/// Result of a statement rewrite.
#[derive(Debug, Clone)]
pub struct Rewrite {
    /// The statement as submitted.
    pub original_sql: String,
    /// The statement to execute. Identical to `original_sql` when no
    /// predicate was injected.
    pub rewritten_sql: String,
    /// The predicates that were AND-merged into the filter, in
    /// application order (tenant first).
    pub predicates_added: Vec<String>,
}

/// The policy engine: one parse, a fixed interceptor chain, one render.
///
/// Chain order is mutation guard, then tenant isolation, then row
/// security. The guard sees the statement as originally submitted; the
/// two injectors compose through AND-merge. The statement text is
/// substituted atomically: on any error the original SQL is left
/// untouched and the call aborts.
pub struct PolicyEngine {
    parser: StatementParser,
    guard: MutationGuard,
    tenant: TenantInterceptor,
    row_security: RowSecurityInterceptor,
}

impl PolicyEngine {
    /// Start building an engine over the given configuration.
    pub fn builder(config: WardConfig) -> PolicyEngineBuilder {
        PolicyEngineBuilder {
            config,
            registry: None,
            hierarchy: None,
            custom: HashMap::new(),
        }
    }

    /// Rewrite a statement for execution.
    ///
    /// `call_site_id` identifies the data-access method that produced the
    /// statement (`<fully-qualified-type>.<method-name>`), used for
    /// row-security policy resolution.
    pub fn rewrite(&self, sql: &str, call_site_id: &str) -> Result<Rewrite, WardError> {
        let mut stmt = self.parser.parse(sql)?;

        // Guard first, on the original filter: an injected predicate must
        // not mask a missing WHERE.
        self.guard.check(&stmt)?;

        let mut predicates_added = Vec::new();
        if let Some(predicate) = self.tenant.apply(&mut stmt)? {
            predicates_added.push(predicate);
        }
        if let Some(predicate) = self.row_security.apply(&mut stmt, call_site_id)? {
            predicates_added.push(predicate);
        }

        let rewritten_sql = if predicates_added.is_empty() {
            sql.to_string()
        } else {
            let rewritten = stmt.render();
            tracing::debug!(
                call_site = call_site_id,
                original = sql,
                rewritten = rewritten,
                "statement rewritten"
            );
            rewritten
        };

        Ok(Rewrite {
            original_sql: sql.to_string(),
            rewritten_sql,
            predicates_added,
        })
    }

    /// Report what [`PolicyEngine::rewrite`] would do, without any
    /// intent to execute the result.
    pub fn explain(&self, sql: &str, call_site_id: &str) -> Result<Rewrite, WardError> {
        self.rewrite(sql, call_site_id)
    }
}

/// Builder wiring configuration, policy declarations, and extension
/// points into a [`PolicyEngine`].
pub struct PolicyEngineBuilder {
    config: WardConfig,
    registry: Option<PolicyRegistry>,
    hierarchy: Option<Arc<dyn DeptHierarchy>>,
    custom: HashMap<String, Arc<dyn CustomPredicateProvider>>,
}

impl PolicyEngineBuilder {
    /// Use a sealed policy registry.
    pub fn registry(mut self, registry: PolicyRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Wire the department hierarchy lookup.
    pub fn dept_hierarchy(mut self, hierarchy: Arc<dyn DeptHierarchy>) -> Self {
        self.hierarchy = Some(hierarchy);
        self
    }

    /// Register a custom predicate provider for a resource.
    pub fn custom_provider(
        mut self,
        resource: impl Into<String>,
        provider: Arc<dyn CustomPredicateProvider>,
    ) -> Self {
        self.custom.insert(resource.into(), provider);
        self
    }

    /// Assemble the engine.
    pub fn build(self) -> PolicyEngine {
        let config = Arc::new(self.config);
        let registry = Arc::new(
            self.registry
                .unwrap_or_else(|| PolicyRegistry::builder().build()),
        );

        let mut builder = PredicateBuilder::new(config.clone());
        if let Some(hierarchy) = self.hierarchy {
            builder = builder.with_hierarchy(hierarchy);
        }
        for (resource, provider) in self.custom {
            builder = builder.with_custom_provider(resource, provider);
        }

        PolicyEngine {
            parser: StatementParser::new(),
            guard: MutationGuard::new(),
            tenant: TenantInterceptor::new(config.clone()),
            row_security: RowSecurityInterceptor::new(config, registry, builder),
        }
    }
}
