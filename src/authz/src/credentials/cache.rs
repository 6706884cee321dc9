//! Per-operation credentials cache

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use super::shared::SharedRoleCache;
use crate::error::Result;
use crate::repository::RoleRepository;
use crate::roles::{RoleSet, Sentinel};
use crate::types::{Identity, RoleIdSet, ScopeId};

/// Memoized role sets and identity reaches for one logical operation
///
/// Build one per inbound request or job and drop it afterwards. There is no
/// invalidation: role or ACL changes made while it is alive are not seen.
pub struct CredentialsCache {
    /// Id attached to log lines of this operation
    operation_id: Uuid,

    /// Role storage
    repository: Arc<dyn RoleRepository>,

    /// Optional long-lived cache read through on misses
    shared: Option<Arc<SharedRoleCache>>,

    /// Scope -> role set
    scope_roles: HashMap<ScopeId, Arc<RoleSet>>,

    /// (identity, scope) -> reach
    identity_reach: HashMap<(Identity, ScopeId), Arc<RoleIdSet>>,
}

impl CredentialsCache {
    /// Create a cache over a repository
    pub fn new(repository: Arc<dyn RoleRepository>) -> Self {
        Self {
            operation_id: Uuid::new_v4(),
            repository,
            shared: None,
            scope_roles: HashMap::new(),
            identity_reach: HashMap::new(),
        }
    }

    /// Create a cache that reads through a shared cache
    pub fn with_shared(repository: Arc<dyn RoleRepository>, shared: Arc<SharedRoleCache>) -> Self {
        Self {
            shared: Some(shared),
            ..Self::new(repository)
        }
    }

    /// Operation id for log correlation
    pub fn operation_id(&self) -> Uuid {
        self.operation_id
    }

    /// Number of scopes loaded so far
    pub fn loaded_scopes(&self) -> usize {
        self.scope_roles.len()
    }

    /// Role set of a scope, loading it on first access
    pub async fn role_set(&mut self, scope_id: &str) -> Result<Arc<RoleSet>> {
        if let Some(roles) = self.scope_roles.get(scope_id) {
            return Ok(Arc::clone(roles));
        }

        if let Some(roles) = self.shared.as_ref().and_then(|s| s.role_set(scope_id)) {
            debug!("[{}] Shared cache hit for scope {}", self.operation_id, scope_id);
            self.scope_roles.insert(scope_id.to_string(), Arc::clone(&roles));
            return Ok(roles);
        }

        debug!("[{}] Loading roles for scope {}", self.operation_id, scope_id);
        let records = self.repository.fetch_roles_for_scope(scope_id).await?;
        Ok(self.remember(scope_id, RoleSet::new(scope_id, records)))
    }

    /// Load several scopes with one repository call
    ///
    /// Scopes already held locally or in the shared cache are not requested.
    pub async fn load_scopes(&mut self, scope_ids: &[ScopeId]) -> Result<()> {
        let mut missing = Vec::new();

        for scope_id in scope_ids {
            if self.scope_roles.contains_key(scope_id) || missing.contains(scope_id) {
                continue;
            }
            if let Some(roles) = self.shared.as_ref().and_then(|s| s.role_set(scope_id)) {
                self.scope_roles.insert(scope_id.clone(), roles);
                continue;
            }
            missing.push(scope_id.clone());
        }

        if missing.is_empty() {
            return Ok(());
        }

        debug!("[{}] Batch loading roles for {} scopes", self.operation_id, missing.len());
        let mut batch = self.repository.fetch_roles_for_scopes(&missing).await?;

        for scope_id in missing {
            let records = batch.remove(&scope_id).unwrap_or_default();
            self.remember(&scope_id, RoleSet::new(scope_id.clone(), records));
        }

        Ok(())
    }

    /// Every role id whose grants `identity` receives in `scope_id`
    ///
    /// The union of the closures of the identity's own bound roles, of
    /// `AUTHENTICATED` for signed-in identities and of `ANONYMOUS` always.
    pub async fn identity_reach(&mut self, identity: &Identity, scope_id: &str) -> Result<Arc<RoleIdSet>> {
        let key = (identity.clone(), scope_id.to_string());
        if let Some(reach) = self.identity_reach.get(&key) {
            return Ok(Arc::clone(reach));
        }

        if let Some(reach) = self.shared.as_ref().and_then(|s| s.reach(identity, scope_id)) {
            self.identity_reach.insert(key, Arc::clone(&reach));
            return Ok(reach);
        }

        let roles = self.role_set(scope_id).await?;
        let reach = Arc::new(Self::compute_reach(&roles, identity));

        debug!(
            "[{}] {} reaches {} roles in scope {}",
            self.operation_id,
            identity,
            reach.len(),
            scope_id
        );

        if let Some(shared) = &self.shared {
            shared.put_reach(identity, scope_id, Arc::clone(&reach));
        }
        self.identity_reach.insert(key, Arc::clone(&reach));
        Ok(reach)
    }

    /// `identity_reach` for several scopes, loading roles in one batch
    pub async fn identity_reach_many(
        &mut self,
        identity: &Identity,
        scope_ids: &[ScopeId],
    ) -> Result<HashMap<ScopeId, Arc<RoleIdSet>>> {
        let unresolved: Vec<ScopeId> = scope_ids
            .iter()
            .filter(|scope_id| {
                !self
                    .identity_reach
                    .contains_key(&(identity.clone(), (*scope_id).clone()))
            })
            .cloned()
            .collect();
        self.load_scopes(&unresolved).await?;

        let mut reaches = HashMap::with_capacity(scope_ids.len());
        for scope_id in scope_ids {
            let reach = self.identity_reach(identity, scope_id).await?;
            reaches.insert(scope_id.clone(), reach);
        }
        Ok(reaches)
    }

    fn compute_reach(roles: &RoleSet, identity: &Identity) -> RoleIdSet {
        let mut start = vec![roles.sentinel_id(Sentinel::Anonymous)];

        if let Identity::Principal(principal_id) = identity {
            start.push(roles.sentinel_id(Sentinel::Authenticated));
            start.extend(roles.bound_to(principal_id).map(|role| &role.id));
        }

        roles.reaching(start)
    }

    fn remember(&mut self, scope_id: &str, roles: RoleSet) -> Arc<RoleSet> {
        let roles = Arc::new(roles);
        if let Some(shared) = &self.shared {
            shared.put_role_set(Arc::clone(&roles));
        }
        self.scope_roles.insert(scope_id.to_string(), Arc::clone(&roles));
        roles
    }
}
