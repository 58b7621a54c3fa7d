//! # sqlward-rls
//!
//! SQL parsing and query-time predicate injection for sqlward.
//!
//! This crate rewrites a statement's filter clause, or rejects the
//! statement, just before it reaches the database:
//!
//! - Parse the statement into an owned, mutable AST
//! - Block UPDATE/DELETE without a WHERE clause
//! - Inject the mandatory tenant predicate
//! - Merge in the call site's declared row-security predicate
//!
//! **Before (from the data-access layer):**
//! ```sql
//! SELECT * FROM orders WHERE status = 'pending'
//! ```
//!
//! **After (to the database), tenant `t1`, SELF policy, caller `u42`:**
//! ```sql
//! SELECT * FROM orders WHERE ((status = 'pending') AND (tenant_id = 't1')) AND (create_user = 'u42')
//! ```
//!
//! The chain is fail-closed: parse failures, unsupported statement
//! shapes, missing identity, and missing tenant all abort the call
//! rather than execute an unrestricted statement.

pub mod engine;
pub mod error;
pub mod guard;
pub mod predicate;
pub mod row_security;
pub mod statement;
pub mod tenant;

pub use engine::{PolicyEngine, PolicyEngineBuilder, Rewrite};
pub use error::WardError;
pub use guard::MutationGuard;
pub use predicate::{CustomPredicateProvider, DeptHierarchy, PredicateBuilder};
pub use row_security::RowSecurityInterceptor;
pub use statement::{ParsedStatement, StatementKind, StatementParser, TableReference};
pub use tenant::TenantInterceptor;
