//! Role graph module
//!
//! Provides role records, the per-scope [`RoleSet`] view and its cycle-safe
//! forward (`reaching`) and backward (`reachers`) closures.
//!
//! # Example
//!
//! ```rust
//! use warden_authz::roles::{Role, RoleSet};
//!
//! let roles = RoleSet::new("proj", vec![
//!     Role::named("member", "proj", "Member"),
//!     Role::named("developer", "proj", "Developer").with_uplink("member"),
//!     Role::proxy("r-alice", "proj", "alice").with_uplink("developer"),
//! ]);
//!
//! let reach = roles.reaching([&"r-alice".to_string()]);
//! assert!(reach.contains("developer"));
//! assert!(reach.contains("member"));
//!
//! let holders = roles.reachers("member");
//! assert!(holders.contains("r-alice"));
//! ```

pub mod graph;
pub mod types;

#[cfg(test)]
mod tests;

pub use graph::RoleSet;
pub use types::{Role, Sentinel};
