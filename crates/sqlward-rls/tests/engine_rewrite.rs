//! End-to-end rewrite tests for the full interceptor chain.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use sqlparser::ast::Expr;
use sqlward_core::{AccessPolicy, Identity, IdentityScope, PolicyKind, WardConfig};
use sqlward_policy::PolicyRegistry;
use sqlward_rls::{
    CustomPredicateProvider, DeptHierarchy, PolicyEngine, StatementParser, WardError,
};

const SELECT_MINE: &str = "com.acme.OrderMapper.selectMine";
const SELECT_DEPT: &str = "com.acme.OrderMapper.selectForDept";
const SELECT_REPORTS: &str = "com.acme.ReportMapper.selectVisible";

struct StaticHierarchy;

impl DeptHierarchy for StaticHierarchy {
    fn descendant_ids(&self, dept_id: &str) -> Vec<String> {
        match dept_id {
            "A" => vec!["B".to_string(), "C".to_string()],
            _ => Vec::new(),
        }
    }
}

struct VisibleReports;

impl CustomPredicateProvider for VisibleReports {
    fn predicate(
        &self,
        _policy: &AccessPolicy,
        identity: &Identity,
    ) -> anyhow::Result<Option<Expr>> {
        let fragment = format!("visibility = 'public' OR owner = '{}'", identity.user_id);
        let expr = StatementParser::new()
            .parse_predicate(&fragment)
            .map_err(anyhow::Error::from)?;
        Ok(Some(expr))
    }
}

fn engine() -> PolicyEngine {
    engine_with_config(WardConfig::default())
}

fn engine_with_config(config: WardConfig) -> PolicyEngine {
    let registry = PolicyRegistry::builder()
        .method(SELECT_MINE, AccessPolicy::new("order", PolicyKind::SelfOnly))
        .method(SELECT_DEPT, AccessPolicy::new("order", PolicyKind::DeptAndChild))
        .method(SELECT_REPORTS, AccessPolicy::new("report", PolicyKind::Custom))
        .build();
    PolicyEngine::builder(config)
        .registry(registry)
        .dept_hierarchy(Arc::new(StaticHierarchy))
        .custom_provider("report", Arc::new(VisibleReports))
        .build()
}

fn caller() -> Identity {
    Identity::new("u42").with_dept("A").with_tenant("t1")
}

#[test]
fn tenant_predicate_injected_for_plain_select() {
    let _scope = IdentityScope::enter(caller());
    let rewrite = engine()
        .rewrite("SELECT * FROM orders", "com.acme.OrderMapper.selectAll")
        .unwrap();
    assert_eq!(
        rewrite.rewritten_sql,
        "SELECT * FROM orders WHERE tenant_id = 't1'"
    );
    assert_eq!(rewrite.predicates_added, vec!["tenant_id = 't1'".to_string()]);
}

#[test]
fn tenant_and_self_policy_compose() {
    let _scope = IdentityScope::enter(caller());
    let rewrite = engine().rewrite("SELECT * FROM orders", SELECT_MINE).unwrap();
    assert_eq!(
        rewrite.rewritten_sql,
        "SELECT * FROM orders WHERE (tenant_id = 't1') AND (create_user = 'u42')"
    );
}

#[test]
fn caller_filter_is_preserved_under_both_predicates() {
    let _scope = IdentityScope::enter(caller());
    let rewrite = engine()
        .rewrite("SELECT * FROM orders WHERE status = 'pending'", SELECT_MINE)
        .unwrap();
    assert_eq!(
        rewrite.rewritten_sql,
        "SELECT * FROM orders WHERE ((status = 'pending') AND (tenant_id = 't1')) AND (create_user = 'u42')"
    );
}

#[test]
fn dept_and_child_matches_hierarchy_ids() {
    let _scope = IdentityScope::enter(caller());
    let rewrite = engine().rewrite("SELECT * FROM orders", SELECT_DEPT).unwrap();
    assert_eq!(
        rewrite.rewritten_sql,
        "SELECT * FROM orders WHERE (tenant_id = 't1') AND (dept_id IN ('A', 'B', 'C'))"
    );
}

#[test]
fn custom_provider_supplies_the_predicate() {
    let _scope = IdentityScope::enter(caller());
    let rewrite = engine().rewrite("SELECT * FROM reports", SELECT_REPORTS).unwrap();
    assert_eq!(
        rewrite.rewritten_sql,
        "SELECT * FROM reports WHERE (tenant_id = 't1') AND (visibility = 'public' OR owner = 'u42')"
    );
}

#[test]
fn admin_bypasses_row_security_but_not_tenant_isolation() {
    let _scope = IdentityScope::enter(caller().admin());
    let rewrite = engine().rewrite("SELECT * FROM orders", SELECT_MINE).unwrap();
    assert_eq!(
        rewrite.rewritten_sql,
        "SELECT * FROM orders WHERE tenant_id = 't1'"
    );
}

#[test]
fn exempt_table_with_no_policy_needs_no_identity() {
    // No identity bound: nothing on this path requires one
    let rewrite = engine()
        .rewrite("SELECT * FROM sys_dict", "com.acme.DictMapper.selectAll")
        .unwrap();
    assert_eq!(rewrite.rewritten_sql, "SELECT * FROM sys_dict");
    assert!(rewrite.predicates_added.is_empty());
}

#[test]
fn missing_identity_is_fatal_when_a_predicate_is_due() {
    let result = engine().rewrite("SELECT * FROM orders", SELECT_MINE);
    assert!(matches!(result, Err(WardError::NoIdentity)));
}

#[test]
fn missing_tenant_is_fatal() {
    let _scope = IdentityScope::enter(Identity::new("u42").with_dept("A"));
    let result = engine().rewrite("SELECT * FROM orders", SELECT_MINE);
    assert!(matches!(result, Err(WardError::MissingTenant)));
}

#[test]
fn update_without_where_is_blocked() {
    let _scope = IdentityScope::enter(caller());
    let result = engine().rewrite("UPDATE t SET x = 1", "com.acme.TMapper.updateAll");
    assert!(matches!(result, Err(WardError::UnguardedMutation { .. })));
}

#[test]
fn update_with_where_passes_unchanged() {
    let _scope = IdentityScope::enter(caller());
    let rewrite = engine()
        .rewrite("UPDATE t SET x = 1 WHERE id = 5", "com.acme.TMapper.updateOne")
        .unwrap();
    assert_eq!(rewrite.rewritten_sql, "UPDATE t SET x = 1 WHERE id = 5");
    assert!(rewrite.predicates_added.is_empty());
}

#[test]
fn delete_without_where_is_blocked() {
    let _scope = IdentityScope::enter(caller());
    let result = engine().rewrite("DELETE FROM t", "com.acme.TMapper.deleteAll");
    assert!(matches!(result, Err(WardError::UnguardedMutation { .. })));
}

#[test]
fn unchanged_statement_keeps_its_original_text() {
    let _scope = IdentityScope::enter(caller());
    // Odd spacing survives because no predicate was injected
    let sql = "SELECT  *  FROM sys_dict";
    let rewrite = engine().rewrite(sql, "com.acme.DictMapper.selectAll").unwrap();
    assert_eq!(rewrite.rewritten_sql, sql);
}

#[test]
fn second_rewrite_of_rewritten_statement_stays_valid() {
    let _scope = IdentityScope::enter(caller());
    let engine = engine();
    let first = engine.rewrite("SELECT * FROM orders", SELECT_MINE).unwrap();
    let second = engine.rewrite(&first.rewritten_sql, SELECT_MINE).unwrap();
    // Semantically redundant but syntactically valid: it parses again
    StatementParser::new().parse(&second.rewritten_sql).unwrap();
    assert_eq!(
        second.rewritten_sql,
        "SELECT * FROM orders WHERE (((tenant_id = 't1') AND (create_user = 'u42')) AND (tenant_id = 't1')) AND (create_user = 'u42')"
    );
}

#[test]
fn cte_is_rejected_not_skipped() {
    let _scope = IdentityScope::enter(caller());
    let result = engine().rewrite(
        "WITH recent AS (SELECT * FROM orders) SELECT * FROM recent",
        SELECT_MINE,
    );
    assert!(matches!(result, Err(WardError::UnsupportedStatement { .. })));
}

#[test]
fn union_is_rejected_not_skipped() {
    let _scope = IdentityScope::enter(caller());
    let result = engine().rewrite(
        "SELECT id FROM orders UNION SELECT id FROM archived_orders",
        SELECT_MINE,
    );
    assert!(matches!(result, Err(WardError::UnsupportedStatement { .. })));
}

#[test]
fn disabled_toggles_pass_statements_through() {
    let mut config = WardConfig::default();
    config.tenant_filter_enabled = false;
    config.data_permission_enabled = false;
    let _scope = IdentityScope::enter(caller());
    let rewrite = engine_with_config(config)
        .rewrite("SELECT * FROM orders", SELECT_MINE)
        .unwrap();
    assert_eq!(rewrite.rewritten_sql, "SELECT * FROM orders");
}

#[test]
fn explain_reports_without_side_effects() {
    let _scope = IdentityScope::enter(caller());
    let report = engine().explain("SELECT * FROM orders", SELECT_MINE).unwrap();
    assert_eq!(report.original_sql, "SELECT * FROM orders");
    assert_eq!(
        report.predicates_added,
        vec!["tenant_id = 't1'".to_string(), "create_user = 'u42'".to_string()]
    );
}
