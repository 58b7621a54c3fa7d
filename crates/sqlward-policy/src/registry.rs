//! Call-site policy registry.

use std::collections::HashMap;

use dashmap::DashMap;
use sqlward_core::AccessPolicy;

/// Registry of access-policy declarations, resolvable by call-site
/// identifier.
///
/// Declarations are immutable once the registry is built. Resolution
/// checks for an exact method-level declaration first, then for a
/// declaration on the declaring type, and memoizes the outcome (absent
/// and disabled declarations included) in a concurrent cache. The cache
/// never needs invalidation: declarations are attached at registration
/// time and never mutated, so resolution is pure and idempotent, and a
/// lost first-insert race writes the same value twice.
pub struct PolicyRegistry {
    methods: HashMap<String, AccessPolicy>,
    types: HashMap<String, AccessPolicy>,
    cache: DashMap<String, Option<AccessPolicy>>,
}

impl PolicyRegistry {
    /// Start building a registry.
    pub fn builder() -> PolicyRegistryBuilder {
        PolicyRegistryBuilder::default()
    }

    /// Resolve the policy declared for a call site.
    ///
    /// Returns `None` when no declaration exists, meaning "no
    /// row-security policy applies". A call-site identifier without the
    /// `<type>.<method>` shape cannot be resolved at all; that case logs
    /// a warning, since it can mask an intended restriction, and also
    /// resolves to `None`.
    ///
    /// Disabled declarations are returned as-is; downstream predicate
    /// building treats them like an absent policy.
    pub fn resolve(&self, call_site_id: &str) -> Option<AccessPolicy> {
        if let Some(hit) = self.cache.get(call_site_id) {
            return hit.clone();
        }
        let resolved = self.lookup(call_site_id);
        let entry = self.cache.entry(call_site_id.to_string()).or_insert(resolved);
        entry.value().clone()
    }

    fn lookup(&self, call_site_id: &str) -> Option<AccessPolicy> {
        if let Some(policy) = self.methods.get(call_site_id) {
            return Some(policy.clone());
        }
        match call_site_id.rsplit_once('.') {
            Some((type_name, _method)) => self.types.get(type_name).cloned(),
            None => {
                tracing::warn!(
                    call_site = call_site_id,
                    "malformed call-site identifier, resolving without a row-security policy"
                );
                None
            }
        }
    }

    /// Number of memoized resolutions.
    pub fn cached_resolutions(&self) -> usize {
        self.cache.len()
    }
}

/// Builder collecting policy declarations before the registry is sealed.
#[derive(Default)]
pub struct PolicyRegistryBuilder {
    methods: HashMap<String, AccessPolicy>,
    types: HashMap<String, AccessPolicy>,
}

impl PolicyRegistryBuilder {
    /// Declare a policy for an exact call site (`<type>.<method>`).
    pub fn method(mut self, call_site_id: impl Into<String>, policy: AccessPolicy) -> Self {
        self.methods.insert(call_site_id.into(), policy);
        self
    }

    /// Declare a policy for every method of a type.
    pub fn type_level(mut self, type_name: impl Into<String>, policy: AccessPolicy) -> Self {
        self.types.insert(type_name.into(), policy);
        self
    }

    /// Seal the declarations into a registry.
    pub fn build(self) -> PolicyRegistry {
        PolicyRegistry {
            methods: self.methods,
            types: self.types,
            cache: DashMap::new(),
        }
    }
}
