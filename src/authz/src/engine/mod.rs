//! Authorization facade
//!
//! Ties role resolution, credentials caching and ACL escalation together
//! behind the entry points the rest of a system calls.
//!
//! ```text
//! Securable ─> owning scope ─> CredentialsCache ─> identity reach
//!                                                       │
//!                 ACL chain <── AclEvaluator <──────────┘
//!                     │
//!               realm admin / overseer override
//! ```

pub mod evaluator;

pub use evaluator::{AclEvaluator, Resolution};

use crate::acl::{enclosing_realm, lineage, owning_scope, RoleRef, Securable};
use crate::credentials::{CacheStats, CredentialsCache, SharedCacheConfig, SharedRoleCache};
use crate::error::{AuthzError, Result};
use crate::repository::RoleRepository;
use crate::roles::{RoleSet, Sentinel};
use crate::types::{
    Identity, Permission, PrincipalId, RoleId, RoleIdSet, ScopeId, ADMIN_PERMISSION, OVERSEER_PERMISSION,
    READ_PERMISSION,
};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Authorizer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizerConfig {
    /// Maximum number of parent links followed by any escalation or lineage walk
    pub max_escalation_depth: usize,

    /// Permission that makes a realm holder an administrator of everything inside
    pub admin_permission: String,

    /// Permission that lets a realm holder read everything inside
    pub overseer_permission: String,

    /// Permission the overseer override applies to
    pub read_permission: String,

    /// Long-lived role cache shared by every operation, off by default
    pub shared_cache: Option<SharedCacheConfig>,
}

impl Default for AuthorizerConfig {
    fn default() -> Self {
        Self {
            max_escalation_depth: 32,
            admin_permission: ADMIN_PERMISSION.to_string(),
            overseer_permission: OVERSEER_PERMISSION.to_string(),
            read_permission: READ_PERMISSION.to_string(),
            shared_cache: None,
        }
    }
}

impl AuthorizerConfig {
    /// Check the configuration for values evaluation cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.max_escalation_depth == 0 {
            return Err(AuthzError::Configuration(
                "max_escalation_depth must be at least 1".to_string(),
            ));
        }

        for name in [&self.admin_permission, &self.overseer_permission, &self.read_permission] {
            match Permission::parse(name) {
                Ok(Permission::Named(_)) => {}
                Ok(Permission::All) => {
                    return Err(AuthzError::Configuration(
                        "Override permissions must be named, not '*'".to_string(),
                    ))
                }
                Err(e) => return Err(AuthzError::Configuration(e.to_string())),
            }
        }

        if let Some(shared) = &self.shared_cache {
            if shared.capacity == 0 {
                return Err(AuthzError::Configuration(
                    "shared_cache.capacity must be at least 1".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Public authorization entry points
///
/// Holds no per-request state. Callers create a [`CredentialsCache`] per
/// operation with [`Authorizer::credentials`] and pass it to every call of
/// that operation.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use warden_authz::acl::{grant, Acl, RoleRef, SecurableKind, SecuredObject};
/// use warden_authz::engine::{Authorizer, AuthorizerConfig};
/// use warden_authz::repository::InMemoryRoleRepository;
/// use warden_authz::roles::Role;
/// use warden_authz::types::Identity;
///
/// # #[tokio::main]
/// # async fn main() -> warden_authz::Result<()> {
/// let repo = Arc::new(InMemoryRoleRepository::new());
/// repo.put_role(Role::named("dev", "p1", "Developer")).await?;
/// repo.add_member("p1", "alice", "dev").await?;
///
/// let acl = grant(&Acl::new(), RoleRef::role("dev"), "write")?;
/// let project = Arc::new(SecuredObject::new("p1", SecurableKind::RootScope("p1".into())).with_acl(acl));
/// let ticket = SecuredObject::new("t1", SecurableKind::Artifact).with_parent(project);
///
/// let authorizer = Authorizer::new(AuthorizerConfig::default(), repo);
/// let mut creds = authorizer.credentials();
///
/// assert!(authorizer.has_access(&mut creds, &ticket, "write", &Identity::principal("alice")).await?);
/// assert!(!authorizer.has_access(&mut creds, &ticket, "write", &Identity::Anonymous).await?);
/// # Ok(())
/// # }
/// ```
pub struct Authorizer {
    /// Role and ACL storage
    repository: Arc<dyn RoleRepository>,

    /// Optional cache shared across operations
    shared: Option<Arc<SharedRoleCache>>,

    /// ACL escalation
    evaluator: AclEvaluator,

    /// Configuration
    config: AuthorizerConfig,
}

impl Authorizer {
    /// Create an authorizer over a repository
    pub fn new(config: AuthorizerConfig, repository: Arc<dyn RoleRepository>) -> Self {
        let shared = config
            .shared_cache
            .clone()
            .map(|cache_config| Arc::new(SharedRoleCache::new(cache_config)));
        let evaluator = AclEvaluator::new(config.max_escalation_depth);

        info!(
            "Authorizer initialized with max_escalation_depth={}, shared_cache={}",
            config.max_escalation_depth,
            shared.is_some()
        );

        Self {
            repository,
            shared,
            evaluator,
            config,
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &AuthorizerConfig {
        &self.config
    }

    /// The evaluator used for escalation
    pub fn evaluator(&self) -> &AclEvaluator {
        &self.evaluator
    }

    /// Fresh credentials cache for one operation
    pub fn credentials(&self) -> CredentialsCache {
        match &self.shared {
            Some(shared) => CredentialsCache::with_shared(Arc::clone(&self.repository), Arc::clone(shared)),
            None => CredentialsCache::new(Arc::clone(&self.repository)),
        }
    }

    /// Whether `identity` may perform `permission` on `securable`
    ///
    /// Checks the securable's ACL chain with the identity's reach in the
    /// owning scope. Failing that, an identity holding the admin permission
    /// on the enclosing realm (or the overseer permission, for reads) is
    /// granted anyway.
    ///
    /// # Errors
    ///
    /// Only repository failures. A refusal is `Ok(false)`.
    pub async fn has_access(
        &self,
        creds: &mut CredentialsCache,
        securable: &dyn Securable,
        permission: &str,
        identity: &Identity,
    ) -> Result<bool> {
        let depth = self.config.max_escalation_depth;
        let realm = if securable.kind().is_realm() {
            None
        } else {
            enclosing_realm(securable, depth)
        };

        // Load both scopes in one round trip when the override may be needed
        let scope_ids: Vec<ScopeId> = owning_scope(securable, depth)
            .into_iter()
            .chain(realm.and_then(|r| owning_scope(r, depth)))
            .collect();
        if scope_ids.len() > 1 {
            creds.identity_reach_many(identity, &scope_ids).await?;
        }

        if self.granted_by_acl(creds, securable, permission, identity).await? {
            debug!(
                "[{}] {} granted '{}' on {}",
                creds.operation_id(),
                identity,
                permission,
                securable.securable_id()
            );
            return Ok(true);
        }

        let Some(realm) = realm else {
            return Ok(false);
        };

        if self
            .granted_by_acl(creds, realm, &self.config.admin_permission, identity)
            .await?
        {
            debug!(
                "[{}] {} granted '{}' on {} as admin of realm {}",
                creds.operation_id(),
                identity,
                permission,
                securable.securable_id(),
                realm.securable_id()
            );
            return Ok(true);
        }

        if permission == self.config.read_permission
            && self
                .granted_by_acl(creds, realm, &self.config.overseer_permission, identity)
                .await?
        {
            debug!(
                "[{}] {} granted '{}' on {} as overseer of realm {}",
                creds.operation_id(),
                identity,
                permission,
                securable.securable_id(),
                realm.securable_id()
            );
            return Ok(true);
        }

        Ok(false)
    }

    /// Like [`has_access`](Self::has_access) but refusal is an error
    pub async fn require_access(
        &self,
        creds: &mut CredentialsCache,
        securable: &dyn Securable,
        permission: &str,
        identity: &Identity,
    ) -> Result<()> {
        if self.has_access(creds, securable, permission, identity).await? {
            Ok(())
        } else {
            Err(AuthzError::AccessDenied {
                securable: securable.securable_id().clone(),
                permission: permission.to_string(),
                identity: identity.to_string(),
            })
        }
    }

    /// Most general roles that hold `permission` on `securable`
    ///
    /// Returns the anonymous sentinel alone when anyone may, the
    /// authenticated sentinel alone when any signed-in identity may, and
    /// otherwise the lowest rungs of each role ladder that qualify. When no
    /// role qualifies the securable's fallback, if any, is asked instead.
    pub async fn roles_with_permission(
        &self,
        creds: &mut CredentialsCache,
        securable: &dyn Securable,
        permission: &str,
    ) -> Result<Vec<RoleId>> {
        let depth = self.config.max_escalation_depth;
        let mut current = securable;

        for _ in 0..depth {
            let Some(scope_id) = owning_scope(current, depth) else {
                warn!(
                    "No owning scope above {}, no role can hold '{}'",
                    current.securable_id(),
                    permission
                );
                return Ok(Vec::new());
            };

            let roles = creds.role_set(&scope_id).await?;
            self.warn_unknown_roles(&roles, current, permission);
            let evaluator = &self.evaluator;
            let holds =
                |role_id: &str| evaluator.single_role_escalate(role_id, current, permission, true) == Resolution::Allow;

            for sentinel in [Sentinel::Anonymous, Sentinel::Authenticated] {
                let sentinel_id = roles.sentinel_id(sentinel);
                if holds(sentinel_id) {
                    return Ok(vec![sentinel_id.clone()]);
                }
            }

            let accepted = evaluator.fundamental_fulfillers(&roles, roles.base_named(), |role| holds(&role.id));
            if !accepted.is_empty() {
                return Ok(accepted);
            }

            match current.fallback() {
                Some(fallback) => {
                    debug!(
                        "No role holds '{}' on {}, falling back to {}",
                        permission,
                        current.securable_id(),
                        fallback.securable_id()
                    );
                    current = fallback;
                }
                None => return Ok(accepted),
            }
        }

        warn!(
            "Fallback chain from {} longer than {}",
            securable.securable_id(),
            depth
        );
        Ok(Vec::new())
    }

    /// Every role id whose grants `identity` receives in a scope
    pub async fn reaching_role_ids(
        &self,
        creds: &mut CredentialsCache,
        identity: &Identity,
        scope_id: &ScopeId,
    ) -> Result<Arc<RoleIdSet>> {
        creds.identity_reach(identity, scope_id).await
    }

    /// Principals whose roles inherit `role_id`
    pub async fn principals_holding(
        &self,
        creds: &mut CredentialsCache,
        scope_id: &str,
        role_id: &str,
    ) -> Result<BTreeSet<PrincipalId>> {
        let roles = creds.role_set(scope_id).await?;
        Ok(roles.principals_of(&roles.reachers(role_id)))
    }

    /// ACL entries along the lineage that name roles unknown to their scope
    ///
    /// Evaluation treats such entries as non-matching; this reports them.
    pub async fn check_acl_references(
        &self,
        creds: &mut CredentialsCache,
        securable: &dyn Securable,
    ) -> Result<Vec<AuthzError>> {
        let depth = self.config.max_escalation_depth;
        let mut problems = Vec::new();

        for node in lineage(securable).take(depth) {
            let Some(scope_id) = owning_scope(node, depth) else {
                continue;
            };
            let roles = creds.role_set(&scope_id).await?;

            for role_id in roles.dangling_refs(node.acl()) {
                let problem = AuthzError::Configuration(format!(
                    "ACL of {} references role {} unknown in scope {}",
                    node.securable_id(),
                    role_id,
                    scope_id
                ));
                warn!("{}", problem);
                problems.push(problem);
            }
        }

        Ok(problems)
    }

    /// Evict everything cached for a scope after a role change
    pub fn invalidate_scope(&self, scope_id: &str) {
        if let Some(shared) = &self.shared {
            shared.evict_scope(scope_id);
        }
    }

    /// Evict one identity's reach, and the scope's role set holding its
    /// memberships, after a membership change
    pub fn invalidate_identity(&self, identity: &Identity, scope_id: &str) {
        if let Some(shared) = &self.shared {
            shared.evict_identity(identity, scope_id);
        }
    }

    /// Shared cache statistics, when a shared cache is configured
    pub fn shared_cache_stats(&self) -> Option<CacheStats> {
        self.shared.as_ref().map(|shared| shared.stats())
    }

    async fn granted_by_acl(
        &self,
        creds: &mut CredentialsCache,
        securable: &dyn Securable,
        permission: &str,
        identity: &Identity,
    ) -> Result<bool> {
        let Some(scope_id) = owning_scope(securable, self.config.max_escalation_depth) else {
            warn!(
                "[{}] No owning scope above {}, treating reach as empty",
                creds.operation_id(),
                securable.securable_id()
            );
            return Ok(false);
        };

        let roles = creds.role_set(&scope_id).await?;
        self.warn_unknown_roles(&roles, securable, permission);

        let reach = creds.identity_reach(identity, &scope_id).await?;
        Ok(self.evaluator.any_role_escalate(&reach, securable, permission))
    }

    /// Log entries covering `permission` on the scope's part of the chain
    /// that name roles the scope does not have. They never match.
    fn warn_unknown_roles(&self, roles: &RoleSet, securable: &dyn Securable, permission: &str) {
        let depth = self.config.max_escalation_depth;

        for node in lineage(securable).take(depth) {
            if owning_scope(node, depth).as_ref() != Some(roles.scope_id()) {
                continue;
            }
            for ace in node.acl() {
                let RoleRef::Role(role_id) = &ace.role else {
                    continue;
                };
                if ace.permission.covers(permission) && !roles.contains(role_id) {
                    warn!(
                        "{}",
                        AuthzError::Configuration(format!(
                            "{} on {} references role {} unknown in scope {}, ignoring it",
                            ace,
                            node.securable_id(),
                            role_id,
                            roles.scope_id()
                        ))
                    );
                }
            }
        }
    }
}
