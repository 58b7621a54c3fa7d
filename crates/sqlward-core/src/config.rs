//! Engine configuration.
//!
//! Every component receives its configuration explicitly at construction;
//! there is no global state. Configuration can be built in code or loaded
//! from a YAML file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::policy::PolicyKind;

/// Configuration surface of the policy engine.
///
/// Column names are resolved once here, not per call. The tenant
/// exemption set is configuration data (shared reference tables), not
/// security data; membership is checked by exact, case-sensitive name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WardConfig {
    /// Column holding the row creator's user id.
    #[serde(default = "default_user_id_column")]
    pub user_id_column: String,

    /// Column holding the row's department id.
    #[serde(default = "default_dept_id_column")]
    pub dept_id_column: String,

    /// Role code granting an unrestricted view for non-custom policies.
    #[serde(default = "default_admin_role_code")]
    pub admin_role_code: String,

    /// Column holding the row's tenant id.
    #[serde(default = "default_tenant_id_column")]
    pub tenant_id_column: String,

    /// Tables exempt from tenant filtering.
    #[serde(default = "default_tenant_exempt_tables")]
    pub tenant_exempt_tables: BTreeSet<String>,

    /// Whether row-security policies are applied at all.
    #[serde(default = "default_true")]
    pub data_permission_enabled: bool,

    /// Whether the tenant predicate is injected at all.
    #[serde(default = "default_true")]
    pub tenant_filter_enabled: bool,

    /// Kind substituted for [`PolicyKind::Default`] declarations.
    #[serde(default = "default_policy_kind")]
    pub default_policy_kind: PolicyKind,
}

impl Default for WardConfig {
    fn default() -> Self {
        Self {
            user_id_column: default_user_id_column(),
            dept_id_column: default_dept_id_column(),
            admin_role_code: default_admin_role_code(),
            tenant_id_column: default_tenant_id_column(),
            tenant_exempt_tables: default_tenant_exempt_tables(),
            data_permission_enabled: true,
            tenant_filter_enabled: true,
            default_policy_kind: default_policy_kind(),
        }
    }
}

impl WardConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Check whether a table is exempt from tenant filtering.
    ///
    /// Exact match, case-sensitive as stored.
    pub fn is_tenant_exempt(&self, table_name: &str) -> bool {
        self.tenant_exempt_tables.contains(table_name)
    }
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

// Default value functions
fn default_user_id_column() -> String {
    "create_user".to_string()
}

fn default_dept_id_column() -> String {
    "dept_id".to_string()
}

fn default_admin_role_code() -> String {
    "ROLE_ADMIN".to_string()
}

fn default_tenant_id_column() -> String {
    "tenant_id".to_string()
}

fn default_tenant_exempt_tables() -> BTreeSet<String> {
    [
        "sys_config",
        "sys_dict",
        "sys_dict_data",
        "sys_menu",
        "sys_role",
        "sys_user",
        "sys_user_role",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_true() -> bool {
    true
}

fn default_policy_kind() -> PolicyKind {
    PolicyKind::SelfOnly
}
