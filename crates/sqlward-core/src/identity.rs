//! Scoped caller identity.
//!
//! The security attributes of the authenticated caller are bound to the
//! current logical call (a thread for synchronous code, a task for async
//! code) by the upstream authentication layer, and consumed here by the
//! interceptors. Binding is scoped: the thread-local form is a RAII guard
//! that restores the previous binding on drop (on normal return and on
//! unwind alike), the task-local form is a `tokio::task_local!` scope
//! that ends when the wrapped future completes or is dropped. An identity
//! can therefore never leak into an unrelated call reusing the same
//! worker thread.
//!
//! [`current`] before a binding is in place fails with
//! [`IdentityError::NoIdentity`]; interceptors surface that as a fatal
//! authorization failure rather than defaulting to "no restriction".

use std::cell::RefCell;
use std::collections::BTreeSet;

use thiserror::Error;

/// Errors raised when reading the caller identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// No identity is bound to the current thread or task.
    #[error("no identity bound to the current call")]
    NoIdentity,
}

/// Security attributes of the authenticated caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    /// User id, matched against the configured user-id column.
    pub user_id: String,
    /// Department id, matched against the configured dept-id column.
    pub dept_id: String,
    /// Role codes granted to the caller.
    pub roles: BTreeSet<String>,
    /// Explicit admin flag set by the authentication layer.
    pub is_admin: bool,
    /// Tenant id; absent for callers outside any tenant.
    pub tenant_id: Option<String>,
}

impl Identity {
    /// Create an identity for a user with no roles, department, or tenant.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    /// Set the department id.
    pub fn with_dept(mut self, dept_id: impl Into<String>) -> Self {
        self.dept_id = dept_id.into();
        self
    }

    /// Set the tenant id.
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Grant a role.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    /// Set the admin flag.
    pub fn admin(mut self) -> Self {
        self.is_admin = true;
        self
    }

    /// Check whether the caller holds a role.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Run a future with this identity bound to the task.
    ///
    /// The binding covers exactly the lifetime of `fut`, including early
    /// drops on cancellation.
    pub async fn scope<F>(self, fut: F) -> F::Output
    where
        F: Future,
    {
        TASK_IDENTITY.scope(self, fut).await
    }
}

thread_local! {
    static THREAD_IDENTITY: RefCell<Option<Identity>> = const { RefCell::new(None) };
}

tokio::task_local! {
    static TASK_IDENTITY: Identity;
}

/// The identity bound to the current call.
///
/// A task-local binding takes precedence over a thread-local one, so a
/// scoped async call sees its own identity even when the worker thread
/// carries an unrelated binding.
pub fn current() -> Result<Identity, IdentityError> {
    if let Ok(identity) = TASK_IDENTITY.try_with(Identity::clone) {
        return Ok(identity);
    }
    THREAD_IDENTITY
        .with(|slot| slot.borrow().clone())
        .ok_or(IdentityError::NoIdentity)
}

/// RAII binding of an identity to the current thread.
///
/// Dropping the scope restores whatever binding was in place before it,
/// so nested scopes compose and an unwinding call cannot leave its
/// identity behind.
#[must_use = "the identity is cleared as soon as the scope is dropped"]
pub struct IdentityScope {
    previous: Option<Identity>,
}

impl IdentityScope {
    /// Bind `identity` to the current thread until the scope is dropped.
    pub fn enter(identity: Identity) -> Self {
        let previous = THREAD_IDENTITY.with(|slot| slot.borrow_mut().replace(identity));
        Self { previous }
    }
}

impl Drop for IdentityScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        THREAD_IDENTITY.with(|slot| {
            *slot.borrow_mut() = previous;
        });
    }
}
