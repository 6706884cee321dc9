//! Access control entries and lists

use crate::error::{AuthzError, Result};
use crate::types::{Permission, RoleId, WILDCARD};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether an entry grants or refuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Disposition {
    /// Grant the permission
    Allow,
    /// Refuse the permission
    Deny,
}

/// Role an entry applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RoleRef {
    /// Every role
    Everyone,
    /// One concrete role
    Role(RoleId),
}

impl RoleRef {
    /// Reference to a concrete role
    pub fn role(id: impl Into<RoleId>) -> Self {
        Self::Role(id.into())
    }

    /// Parse a role reference, `*` meaning everyone
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "" => Err(AuthzError::InvalidAce("Role reference cannot be empty".to_string())),
            WILDCARD => Ok(Self::Everyone),
            id => Ok(Self::Role(id.to_string())),
        }
    }

    /// Whether `role_id` is covered
    pub fn covers(&self, role_id: &str) -> bool {
        match self {
            Self::Everyone => true,
            Self::Role(id) => id == role_id,
        }
    }

    /// String form, `*` for everyone
    pub fn as_str(&self) -> &str {
        match self {
            Self::Everyone => WILDCARD,
            Self::Role(id) => id,
        }
    }
}

impl TryFrom<String> for RoleRef {
    type Error = AuthzError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<RoleRef> for String {
    fn from(role: RoleRef) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for RoleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access control entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ace {
    /// Allow or deny
    pub access: Disposition,

    /// Role (or everyone) the entry applies to
    pub role: RoleRef,

    /// Permission (or all) the entry applies to
    pub permission: Permission,
}

impl Ace {
    /// Build a validated entry
    ///
    /// # Errors
    ///
    /// Returns `InvalidAce` when the permission string is malformed or the
    /// role reference is an empty id.
    pub fn new(access: Disposition, role: RoleRef, permission: &str) -> Result<Self> {
        if let RoleRef::Role(id) = &role {
            if id.is_empty() {
                return Err(AuthzError::InvalidAce("Role reference cannot be empty".to_string()));
            }
        }

        let permission = Permission::parse(permission).map_err(|e| match (&role, e) {
            (RoleRef::Everyone, AuthzError::InvalidAce(msg)) => {
                AuthzError::InvalidAce(format!("{} (entry for everyone)", msg))
            }
            (_, e) => e,
        })?;

        Ok(Self {
            access,
            role,
            permission,
        })
    }

    /// Allow entry
    pub fn allow(role: RoleRef, permission: &str) -> Result<Self> {
        Self::new(Disposition::Allow, role, permission)
    }

    /// Deny entry
    pub fn deny(role: RoleRef, permission: &str) -> Result<Self> {
        Self::new(Disposition::Deny, role, permission)
    }

    /// `DENY(EVERYONE, ALL)`
    pub fn deny_all() -> Self {
        Self {
            access: Disposition::Deny,
            role: RoleRef::Everyone,
            permission: Permission::All,
        }
    }

    /// Whether this entry applies to `(role_id, permission)`
    pub fn matches(&self, role_id: &str, permission: &str) -> bool {
        self.role.covers(role_id) && self.permission.covers(permission)
    }
}

impl fmt::Display for Ace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let access = match self.access {
            Disposition::Allow => "ALLOW",
            Disposition::Deny => "DENY",
        };
        write!(f, "{}({}, {})", access, self.role, self.permission)
    }
}

/// Ordered access control list
///
/// Order is significant: the first matching entry decides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Acl {
    entries: Vec<Ace>,
}

impl Acl {
    /// Empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries in evaluation order
    pub fn iter(&self) -> std::slice::Iter<'_, Ace> {
        self.entries.iter()
    }

    /// Entries as a slice
    pub fn entries(&self) -> &[Ace] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether an identical entry exists
    pub fn contains(&self, ace: &Ace) -> bool {
        self.entries.contains(ace)
    }

    /// First entry matching `(role_id, permission)`
    pub fn first_match(&self, role_id: &str, permission: &str) -> Option<&Ace> {
        self.entries.iter().find(|ace| ace.matches(role_id, permission))
    }

    /// Append an entry unless an identical one exists
    pub fn push_unique(&mut self, ace: Ace) -> bool {
        if self.contains(&ace) {
            return false;
        }
        self.entries.push(ace);
        true
    }
}

impl From<Vec<Ace>> for Acl {
    fn from(entries: Vec<Ace>) -> Self {
        Self { entries }
    }
}

impl FromIterator<Ace> for Acl {
    fn from_iter<T: IntoIterator<Item = Ace>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Acl {
    type Item = &'a Ace;
    type IntoIter = std::slice::Iter<'a, Ace>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Copy of `acl` with `ALLOW(role, permission)` appended
///
/// No-op when an identical allow entry already exists.
pub fn grant(acl: &Acl, role: RoleRef, permission: &str) -> Result<Acl> {
    let ace = Ace::allow(role, permission)?;
    let mut updated = acl.clone();
    updated.push_unique(ace);
    Ok(updated)
}

/// Copy of `acl` with `DENY(role, permission)` appended
///
/// No-op when an identical deny entry already exists.
pub fn deny(acl: &Acl, role: RoleRef, permission: &str) -> Result<Acl> {
    let ace = Ace::deny(role, permission)?;
    let mut updated = acl.clone();
    updated.push_unique(ace);
    Ok(updated)
}

/// Copy of `acl` without any `ALLOW(role, permission)` entry
///
/// Deny entries are kept. Remaining entries keep their order.
pub fn revoke(acl: &Acl, role: &RoleRef, permission: &str) -> Result<Acl> {
    let target = Ace::allow(role.clone(), permission)?;
    Ok(acl.iter().filter(|ace| **ace != target).cloned().collect())
}
