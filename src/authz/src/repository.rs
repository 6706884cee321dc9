//! Role and ACL storage collaborator

use crate::acl::Acl;
use crate::error::{AuthzError, Result};
use crate::roles::Role;
use crate::types::{PrincipalId, RoleId, ScopeId, SecurableId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Storage backend the engine reads roles and ACLs from
///
/// Persistence details belong to the implementor. The engine only reads.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// All role records of one scope
    async fn fetch_roles_for_scope(&self, scope_id: &str) -> Result<Vec<Role>>;

    /// Role records of several scopes in one round trip
    ///
    /// The default issues one call per scope; backends that can batch should
    /// override it. Every requested scope is present in the result.
    async fn fetch_roles_for_scopes(&self, scope_ids: &[ScopeId]) -> Result<HashMap<ScopeId, Vec<Role>>> {
        let mut batch = HashMap::with_capacity(scope_ids.len());
        for scope_id in scope_ids {
            let roles = self.fetch_roles_for_scope(scope_id).await?;
            batch.insert(scope_id.clone(), roles);
        }
        Ok(batch)
    }

    /// ACL attached to a securable; empty when none is stored
    async fn fetch_acl(&self, securable_id: &str) -> Result<Acl>;
}

/// In-memory repository
///
/// Also implements the membership lifecycle: a principal's proxy role is
/// created on first membership and memberships are uplinks on that proxy.
pub struct InMemoryRoleRepository {
    roles: Arc<RwLock<HashMap<RoleId, Role>>>,
    acls: Arc<RwLock<HashMap<SecurableId, Acl>>>,
    fetches: AtomicUsize,
}

impl InMemoryRoleRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self {
            roles: Arc::new(RwLock::new(HashMap::new())),
            acls: Arc::new(RwLock::new(HashMap::new())),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Insert or replace a role
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an invalid record or when another role
    /// already has the same `(principal, scope, name)` binding.
    pub async fn put_role(&self, role: Role) -> Result<()> {
        role.validate()?;

        let mut roles = self.roles.write().await;
        let clash = roles.values().any(|existing| {
            existing.id != role.id
                && existing.scope_id == role.scope_id
                && existing.name == role.name
                && existing.principal_id == role.principal_id
        });
        if clash {
            return Err(AuthzError::InvalidInput(format!(
                "Duplicate role binding in scope {}: name={:?} principal={:?}",
                role.scope_id, role.name, role.principal_id
            )));
        }

        roles.insert(role.id.clone(), role);
        Ok(())
    }

    /// Store the ACL of a securable
    pub async fn put_acl(&self, securable_id: impl Into<SecurableId>, acl: Acl) {
        let mut acls = self.acls.write().await;
        acls.insert(securable_id.into(), acl);
    }

    /// Make `principal_id` a member of the named role `role_id`
    ///
    /// Returns the id of the principal's proxy role, creating it on first
    /// membership in the scope.
    pub async fn add_member(&self, scope_id: &str, principal_id: &str, role_id: &str) -> Result<RoleId> {
        let mut roles = self.roles.write().await;

        match roles.get(role_id) {
            Some(target) if target.scope_id == scope_id && target.is_named() => {}
            Some(_) => {
                return Err(AuthzError::InvalidInput(format!(
                    "Role {} is not a named role of scope {}",
                    role_id, scope_id
                )))
            }
            None => {
                return Err(AuthzError::InvalidInput(format!(
                    "Unknown role {} in scope {}",
                    role_id, scope_id
                )))
            }
        }

        let proxy_id = roles
            .values()
            .find(|r| r.scope_id == scope_id && r.name.is_none() && r.principal_id.as_deref() == Some(principal_id))
            .map(|r| r.id.clone());

        let proxy_id = match proxy_id {
            Some(id) => id,
            None => {
                let proxy = Role::proxy(Uuid::new_v4().to_string(), scope_id, principal_id);
                debug!("Created proxy role {} for {} in scope {}", proxy.id, principal_id, scope_id);
                let id = proxy.id.clone();
                roles.insert(id.clone(), proxy);
                id
            }
        };

        if let Some(proxy) = roles.get_mut(&proxy_id) {
            proxy.uplinks.insert(role_id.to_string());
        }

        Ok(proxy_id)
    }

    /// Drop `principal_id`'s membership in `role_id`
    ///
    /// Returns whether a membership was removed. The proxy role itself stays.
    pub async fn remove_member(&self, scope_id: &str, principal_id: &str, role_id: &str) -> bool {
        let mut roles = self.roles.write().await;
        roles
            .values_mut()
            .find(|r| r.scope_id == scope_id && r.name.is_none() && r.principal_id.as_deref() == Some(principal_id))
            .map(|proxy| proxy.uplinks.remove(role_id))
            .unwrap_or(false)
    }

    /// Proxy role id of a principal in a scope
    pub async fn proxy_role(&self, scope_id: &str, principal_id: &PrincipalId) -> Option<RoleId> {
        let roles = self.roles.read().await;
        roles
            .values()
            .find(|r| r.scope_id == scope_id && r.name.is_none() && r.principal_id.as_ref() == Some(principal_id))
            .map(|r| r.id.clone())
    }

    /// Number of role fetch round trips served so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    fn roles_of(roles: &HashMap<RoleId, Role>, scope_id: &str) -> Vec<Role> {
        roles.values().filter(|r| r.scope_id == scope_id).cloned().collect()
    }
}

impl Default for InMemoryRoleRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoleRepository for InMemoryRoleRepository {
    async fn fetch_roles_for_scope(&self, scope_id: &str) -> Result<Vec<Role>> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let roles = self.roles.read().await;
        Ok(Self::roles_of(&roles, scope_id))
    }

    async fn fetch_roles_for_scopes(&self, scope_ids: &[ScopeId]) -> Result<HashMap<ScopeId, Vec<Role>>> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let roles = self.roles.read().await;
        Ok(scope_ids
            .iter()
            .map(|scope_id| (scope_id.clone(), Self::roles_of(&roles, scope_id)))
            .collect())
    }

    async fn fetch_acl(&self, securable_id: &str) -> Result<Acl> {
        let acls = self.acls.read().await;
        Ok(acls.get(securable_id).cloned().unwrap_or_default())
    }
}
