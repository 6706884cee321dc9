//! # Warden Authorization Engine
//!
//! Role graph based authorization: decides whether an identity may perform a
//! permission on a protected object.
//!
//! ## Features
//!
//! - **Role graphs** per scope with cycle-safe forward and backward closures
//! - **Ordered ACLs** with first-match-wins evaluation and `EVERYONE` / `*` wildcards
//! - **Hierarchical escalation** through securable parents, pruning denied roles per level
//! - **Realm overrides** for realm administrators and overseers
//! - **Minimal covering sets** of roles holding a permission
//! - **Per-operation credentials cache** with an optional shared TTL cache
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use warden_authz::{Authorizer, AuthorizerConfig, Identity, InMemoryRoleRepository, Role};
//! use warden_authz::acl::{grant, Acl, RoleRef, SecurableKind, SecuredObject};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let repo = Arc::new(InMemoryRoleRepository::new());
//!     repo.put_role(Role::named("member", "wiki", "Member")).await?;
//!     repo.add_member("wiki", "alice", "member").await?;
//!
//!     let acl = grant(&Acl::new(), RoleRef::role("member"), "edit")?;
//!     let scope = Arc::new(SecuredObject::new("wiki", SecurableKind::RootScope("wiki".into())).with_acl(acl));
//!     let page = SecuredObject::new("page-1", SecurableKind::Artifact).with_parent(scope);
//!
//!     let authorizer = Authorizer::new(AuthorizerConfig::default(), repo);
//!     let mut creds = authorizer.credentials();
//!
//!     authorizer
//!         .require_access(&mut creds, &page, "edit", &Identity::principal("alice"))
//!         .await?;
//!
//!     let holders = authorizer.roles_with_permission(&mut creds, &page, "edit").await?;
//!     assert_eq!(holders, vec!["member".to_string()]);
//!
//!     Ok(())
//! }
//! ```

pub mod acl;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod repository;
pub mod roles;
pub mod types;

// Re-export commonly used types
pub use acl::{Ace, Acl, Disposition, RoleRef, Securable, SecurableKind, SecuredObject};
pub use credentials::{CredentialsCache, SharedCacheConfig, SharedRoleCache};
pub use engine::{AclEvaluator, Authorizer, AuthorizerConfig, Resolution};
pub use error::{AuthzError, Result};
pub use repository::{InMemoryRoleRepository, RoleRepository};
pub use roles::{Role, RoleSet, Sentinel};
pub use types::{Identity, Permission, PrincipalId, RoleId, RoleIdSet, ScopeId, SecurableId};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
