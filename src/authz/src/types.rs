//! Core authorization types

use crate::error::{AuthzError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Unique role identifier
pub type RoleId = String;

/// Organizational scope identifier
pub type ScopeId = String;

/// Principal (user account) identifier
pub type PrincipalId = String;

/// Identifier of anything carrying an ACL
pub type SecurableId = String;

/// Deterministically ordered set of role ids
pub type RoleIdSet = BTreeSet<RoleId>;

/// Permission checked by realm administrators
pub const ADMIN_PERMISSION: &str = "admin";

/// Permission granting read-only oversight of a realm
pub const OVERSEER_PERMISSION: &str = "overseer";

/// Plain read permission
pub const READ_PERMISSION: &str = "read";

/// Wildcard token for permissions and role references
pub const WILDCARD: &str = "*";

const MAX_PERMISSION_LEN: usize = 64;

/// Who is asking
///
/// Authentication happens elsewhere; the engine trusts whatever identity the
/// caller hands it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Identity {
    /// No authenticated principal
    Anonymous,
    /// An authenticated principal
    Principal(PrincipalId),
}

impl Identity {
    /// Identity for a principal id
    pub fn principal(id: impl Into<PrincipalId>) -> Self {
        Self::Principal(id.into())
    }

    /// Whether this is the anonymous sentinel
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    /// Principal id, if authenticated
    pub fn principal_id(&self) -> Option<&PrincipalId> {
        match self {
            Self::Anonymous => None,
            Self::Principal(id) => Some(id),
        }
    }

    /// Principal id, or `Unauthenticated` for the anonymous sentinel
    pub fn require_authenticated(&self) -> Result<&PrincipalId> {
        self.principal_id().ok_or(AuthzError::Unauthenticated)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => write!(f, "*anonymous"),
            Self::Principal(id) => write!(f, "principal:{}", id),
        }
    }
}

/// Permission named by an access control entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Permission {
    /// Matches every permission
    All,
    /// A single named permission
    Named(String),
}

impl Permission {
    /// Parse a permission string, `*` meaning all permissions
    ///
    /// # Errors
    ///
    /// Returns `InvalidAce` for empty or overlong strings and for characters
    /// outside letters, digits, `_`, `-`, `.` and `:`.
    pub fn parse(s: &str) -> Result<Self> {
        if s == WILDCARD {
            return Ok(Self::All);
        }

        if s.is_empty() {
            return Err(AuthzError::InvalidAce("Permission cannot be empty".to_string()));
        }

        if s.len() > MAX_PERMISSION_LEN {
            return Err(AuthzError::InvalidAce(format!(
                "Permission longer than {} characters: '{}'",
                MAX_PERMISSION_LEN, s
            )));
        }

        if let Some(bad) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')))
        {
            return Err(AuthzError::InvalidAce(format!(
                "Invalid character '{}' in permission '{}'",
                bad, s
            )));
        }

        Ok(Self::Named(s.to_string()))
    }

    /// Whether a request for `permission` is covered
    pub fn covers(&self, permission: &str) -> bool {
        match self {
            Self::All => true,
            Self::Named(name) => name == permission,
        }
    }

    /// String form, `*` for all permissions
    pub fn as_str(&self) -> &str {
        match self {
            Self::All => WILDCARD,
            Self::Named(name) => name,
        }
    }
}

impl TryFrom<String> for Permission {
    type Error = AuthzError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Permission> for String {
    fn from(permission: Permission) -> Self {
        permission.as_str().to_string()
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
