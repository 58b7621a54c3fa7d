//! Declarative access-policy model.
//!
//! A policy is declared once for a call site (a data-access method, or the
//! type declaring it) and never mutated afterwards. Resolution from a
//! call-site identifier to a policy happens in `sqlward-policy`.

use serde::{Deserialize, Serialize};

/// The kind of row restriction a policy applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyKind {
    /// Use the configured default kind. This is never "no restriction";
    /// the fallback is `WardConfig::default_policy_kind`.
    #[default]
    Default,
    /// No row restriction.
    All,
    /// Rows belonging to the caller's department.
    Dept,
    /// Rows belonging to the caller's department or any transitive
    /// descendant department.
    DeptAndChild,
    /// Rows created by the caller.
    #[serde(rename = "SELF")]
    SelfOnly,
    /// Predicate supplied by a registered custom provider, keyed by the
    /// policy's resource.
    Custom,
}

/// A row-security policy declared for a call site.
///
/// Mirrors the declarative attachment surface: a declaration carries a
/// resource identifier, a kind, an enabled flag, and an optional table
/// alias used to qualify injected columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    /// Resource identifier. Selects the custom predicate provider when
    /// `kind` is [`PolicyKind::Custom`].
    #[serde(default)]
    pub resource: String,

    /// The restriction kind.
    #[serde(default)]
    pub kind: PolicyKind,

    /// Disabled policies resolve like an absent policy, but stay cached
    /// as present.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Table alias qualifying the injected column. Empty means the
    /// column is emitted unqualified.
    #[serde(default)]
    pub table_alias: String,
}

impl AccessPolicy {
    /// Declare an enabled policy for a resource.
    pub fn new(resource: impl Into<String>, kind: PolicyKind) -> Self {
        Self {
            resource: resource.into(),
            kind,
            enabled: true,
            table_alias: String::new(),
        }
    }

    /// Qualify injected columns with a table alias.
    pub fn with_table_alias(mut self, alias: impl Into<String>) -> Self {
        self.table_alias = alias.into();
        self
    }

    /// Mark the declaration disabled.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

fn default_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_defaults_to_default() {
        assert_eq!(PolicyKind::default(), PolicyKind::Default);
    }

    #[test]
    fn test_policy_declaration() {
        let policy = AccessPolicy::new("order", PolicyKind::SelfOnly).with_table_alias("o");
        assert!(policy.enabled);
        assert_eq!(policy.table_alias, "o");
        assert_eq!(policy.kind, PolicyKind::SelfOnly);
    }

    #[test]
    fn test_kind_serde_names() {
        let kind: PolicyKind = serde_yaml::from_str("SELF").unwrap();
        assert_eq!(kind, PolicyKind::SelfOnly);

        let kind: PolicyKind = serde_yaml::from_str("DEPT_AND_CHILD").unwrap();
        assert_eq!(kind, PolicyKind::DeptAndChild);
    }

    #[test]
    fn test_policy_yaml_defaults() {
        let policy: AccessPolicy = serde_yaml::from_str("resource: order").unwrap();
        assert!(policy.enabled);
        assert_eq!(policy.kind, PolicyKind::Default);
        assert_eq!(policy.table_alias, "");
    }
}
