//! Access control module
//!
//! ACL value types, the order-preserving edit helpers and the [`Securable`]
//! abstraction over anything that carries an ACL.

mod securable;
mod types;

pub use securable::{
    enclosing_realm, lineage, owning_scope, Lineage, Securable, SecurableKind, SecuredObject,
};
pub use types::{deny, grant, revoke, Ace, Acl, Disposition, RoleRef};
