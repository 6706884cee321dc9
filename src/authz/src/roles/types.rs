//! Role record definitions

use crate::error::{AuthzError, Result};
use crate::types::{PrincipalId, RoleId, ScopeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Implicit per-scope roles not tied to a principal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentinel {
    /// Held by every identity, signed in or not
    Anonymous,
    /// Held by every signed-in identity
    Authenticated,
}

impl Sentinel {
    /// Reserved role name
    pub fn role_name(self) -> &'static str {
        match self {
            Self::Anonymous => "*anonymous",
            Self::Authenticated => "*authenticated",
        }
    }

    /// Id used when a scope's batch lacks this sentinel
    pub fn synthesized_id(self, scope_id: &str) -> RoleId {
        format!("{}:{}", scope_id, self.role_name())
    }
}

/// Role record
///
/// A role with a `name` is a group (or a sentinel). A role without one is the
/// proxy of exactly one principal inside one scope; group membership is
/// recorded by adding the group's id to that proxy's `uplinks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Unique role id
    pub id: RoleId,

    /// Owning scope
    pub scope_id: ScopeId,

    /// Group name, absent for a principal's proxy role
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Principal directly bound to this role
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<PrincipalId>,

    /// Same-scope roles whose grants this role also carries
    #[serde(default)]
    pub uplinks: BTreeSet<RoleId>,
}

impl Role {
    /// Create a named (group) role
    pub fn named(id: impl Into<RoleId>, scope_id: impl Into<ScopeId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            scope_id: scope_id.into(),
            name: Some(name.into()),
            principal_id: None,
            uplinks: BTreeSet::new(),
        }
    }

    /// Create the proxy role of one principal
    pub fn proxy(
        id: impl Into<RoleId>,
        scope_id: impl Into<ScopeId>,
        principal_id: impl Into<PrincipalId>,
    ) -> Self {
        Self {
            id: id.into(),
            scope_id: scope_id.into(),
            name: None,
            principal_id: Some(principal_id.into()),
            uplinks: BTreeSet::new(),
        }
    }

    /// Create a sentinel role with its synthesized id
    pub fn sentinel(scope_id: impl Into<ScopeId>, sentinel: Sentinel) -> Self {
        let scope_id = scope_id.into();
        Self::named(sentinel.synthesized_id(&scope_id), scope_id, sentinel.role_name())
    }

    /// Add an uplink
    pub fn with_uplink(mut self, role_id: impl Into<RoleId>) -> Self {
        self.uplinks.insert(role_id.into());
        self
    }

    /// Bind a named role directly to a principal
    pub fn bound_to(mut self, principal_id: impl Into<PrincipalId>) -> Self {
        self.principal_id = Some(principal_id.into());
        self
    }

    /// Whether this role is a group (named) role
    pub fn is_named(&self) -> bool {
        self.name.is_some()
    }

    /// Which sentinel this role is, if any
    pub fn sentinel_kind(&self) -> Option<Sentinel> {
        if self.principal_id.is_some() {
            return None;
        }
        match self.name.as_deref() {
            Some(name) if name == Sentinel::Anonymous.role_name() => Some(Sentinel::Anonymous),
            Some(name) if name == Sentinel::Authenticated.role_name() => Some(Sentinel::Authenticated),
            _ => None,
        }
    }

    /// Validate the role definition
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(AuthzError::InvalidInput("Role id cannot be empty".to_string()));
        }

        if self.scope_id.is_empty() {
            return Err(AuthzError::InvalidInput(format!(
                "Role '{}' has an empty scope id",
                self.id
            )));
        }

        if self.name.is_none() && self.principal_id.is_none() {
            return Err(AuthzError::InvalidInput(format!(
                "Role '{}' must have a name or a principal",
                self.id
            )));
        }

        if let Some(name) = &self.name {
            if name.is_empty() {
                return Err(AuthzError::InvalidInput(format!(
                    "Role '{}' has an empty name",
                    self.id
                )));
            }
        }

        if self.uplinks.iter().any(|uplink| uplink.is_empty()) {
            return Err(AuthzError::InvalidInput(format!(
                "Role '{}' has an empty uplink",
                self.id
            )));
        }

        Ok(())
    }
}
