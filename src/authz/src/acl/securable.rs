//! Securable objects and their escalation chains
//!
//! Anything with an ACL and at most one parent is a [`Securable`]. Escalation
//! walks from an object towards its terminal ancestor. The chain is assumed
//! acyclic but never verified, so every walk here is capped.

use super::types::Acl;
use crate::error::Result;
use crate::repository::RoleRepository;
use crate::types::{ScopeId, SecurableId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What kind of object a securable is
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurableKind {
    /// A resource or artifact (ticket, page, post, file)
    Artifact,
    /// A tool configuration mounted in a scope
    Tool,
    /// A scope nested inside another scope
    Subscope(ScopeId),
    /// A top-level scope
    RootScope(ScopeId),
    /// A top-level realm grouping root scopes
    Realm(ScopeId),
}

impl SecurableKind {
    /// Scope whose roles govern this object, if it is scope-bearing
    pub fn scope_id(&self) -> Option<&ScopeId> {
        match self {
            Self::Subscope(id) | Self::RootScope(id) | Self::Realm(id) => Some(id),
            Self::Artifact | Self::Tool => None,
        }
    }

    /// Whether this is a top-level realm
    pub fn is_realm(&self) -> bool {
        matches!(self, Self::Realm(_))
    }
}

/// Object carrying an ACL and an optional escalation parent
pub trait Securable: Send + Sync {
    /// Stable identifier
    fn securable_id(&self) -> &SecurableId;

    /// Object kind
    fn kind(&self) -> &SecurableKind;

    /// Access control list, in evaluation order
    fn acl(&self) -> &Acl;

    /// Parent to escalate to, `None` when terminal
    fn parent(&self) -> Option<&dyn Securable>;

    /// Object whose grants apply when none of this object's roles qualify
    ///
    /// Only consulted by `roles_with_permission`.
    fn fallback(&self) -> Option<&dyn Securable> {
        None
    }
}

/// Iterator over a securable and its ancestors, nearest first
pub struct Lineage<'a> {
    next: Option<&'a dyn Securable>,
}

impl<'a> Iterator for Lineage<'a> {
    type Item = &'a dyn Securable;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent();
        Some(current)
    }
}

/// Walk `securable` then each parent in turn
pub fn lineage(securable: &dyn Securable) -> Lineage<'_> {
    Lineage {
        next: Some(securable),
    }
}

/// Nearest scope-bearing node at or above `securable`
pub fn owning_scope(securable: &dyn Securable, max_depth: usize) -> Option<ScopeId> {
    lineage(securable)
        .take(max_depth)
        .find_map(|node| node.kind().scope_id().cloned())
}

/// Nearest realm strictly above `securable`
pub fn enclosing_realm(securable: &dyn Securable, max_depth: usize) -> Option<&dyn Securable> {
    lineage(securable)
        .skip(1)
        .take(max_depth)
        .find(|node| node.kind().is_realm())
}

/// Concrete securable node
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use warden_authz::acl::{owning_scope, SecurableKind, SecuredObject};
///
/// let project = Arc::new(SecuredObject::new("p1", SecurableKind::RootScope("p1".into())));
/// let ticket = SecuredObject::new("t1", SecurableKind::Artifact).with_parent(project);
///
/// assert_eq!(owning_scope(&ticket, 32).as_deref(), Some("p1"));
/// ```
#[derive(Debug, Clone)]
pub struct SecuredObject {
    id: SecurableId,
    kind: SecurableKind,
    acl: Acl,
    parent: Option<Arc<SecuredObject>>,
    fallback: Option<Arc<SecuredObject>>,
}

impl SecuredObject {
    /// Create a node with an empty ACL and no parent
    pub fn new(id: impl Into<SecurableId>, kind: SecurableKind) -> Self {
        Self {
            id: id.into(),
            kind,
            acl: Acl::new(),
            parent: None,
            fallback: None,
        }
    }

    /// Create a node whose ACL comes from the repository
    pub async fn load(
        repository: &dyn RoleRepository,
        id: impl Into<SecurableId>,
        kind: SecurableKind,
        parent: Option<Arc<SecuredObject>>,
    ) -> Result<Self> {
        let id = id.into();
        let acl = repository.fetch_acl(&id).await?;
        Ok(Self {
            id,
            kind,
            acl,
            parent,
            fallback: None,
        })
    }

    /// Replace the ACL
    pub fn with_acl(mut self, acl: Acl) -> Self {
        self.acl = acl;
        self
    }

    /// Set the escalation parent
    pub fn with_parent(mut self, parent: Arc<SecuredObject>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Set the grant fallback
    pub fn with_fallback(mut self, fallback: Arc<SecuredObject>) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

impl Securable for SecuredObject {
    fn securable_id(&self) -> &SecurableId {
        &self.id
    }

    fn kind(&self) -> &SecurableKind {
        &self.kind
    }

    fn acl(&self) -> &Acl {
        &self.acl
    }

    fn parent(&self) -> Option<&dyn Securable> {
        self.parent.as_deref().map(|p| p as &dyn Securable)
    }

    fn fallback(&self) -> Option<&dyn Securable> {
        self.fallback.as_deref().map(|f| f as &dyn Securable)
    }
}
