//! ACL evaluation over securable chains
//!
//! Three building blocks:
//! - single-role escalation: first matching entry of the nearest ACL that has
//!   one decides for one role
//! - multi-role escalation: one pass per hierarchy level over every candidate
//!   role, dropping roles denied at a level and carrying the undecided ones up
//! - fundamental fulfillers: the most general named roles satisfying a
//!   predicate, found by walking each role ladder from its base

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::acl::{Disposition, Securable};
use crate::roles::graph::sort_roles;
use crate::roles::{Role, RoleSet};
use crate::types::{RoleId, RoleIdSet};

/// Outcome of resolving one role against an ACL chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Resolution {
    /// A matching allow entry decided
    Allow,
    /// A matching deny entry decided
    Deny,
    /// No entry matched
    Unset,
}

impl From<Disposition> for Resolution {
    fn from(access: Disposition) -> Self {
        match access {
            Disposition::Allow => Self::Allow,
            Disposition::Deny => Self::Deny,
        }
    }
}

/// Stateless evaluator with a cap on chain length
#[derive(Debug, Clone, Copy)]
pub struct AclEvaluator {
    max_depth: usize,
}

impl AclEvaluator {
    /// Create an evaluator walking at most `max_depth` levels
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Depth cap
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Resolve one role against `securable`, optionally escalating to parents
    ///
    /// Within one ACL the first matching entry wins. Without a match the
    /// parent is consulted only when `escalate` is set.
    pub fn single_role_escalate(
        &self,
        role_id: &str,
        securable: &dyn Securable,
        permission: &str,
        escalate: bool,
    ) -> Resolution {
        let mut current = Some(securable);
        let mut depth = 0;

        while let Some(node) = current {
            if depth >= self.max_depth {
                warn!(
                    "Escalation for role {} stopped at depth {} below {}",
                    role_id,
                    depth,
                    securable.securable_id()
                );
                return Resolution::Unset;
            }

            if let Some(ace) = node.acl().first_match(role_id, permission) {
                debug!("{} on {} decides role {}", ace, node.securable_id(), role_id);
                return ace.access.into();
            }

            if !escalate {
                return Resolution::Unset;
            }

            current = node.parent();
            depth += 1;
        }

        Resolution::Unset
    }

    /// Whether any of `role_ids` is granted `permission`, level by level
    ///
    /// A role denied at some level is dropped for good; other roles keep
    /// escalating. The first allow anywhere wins.
    pub fn any_role_escalate(&self, role_ids: &RoleIdSet, securable: &dyn Securable, permission: &str) -> bool {
        let mut pending: Vec<&RoleId> = role_ids.iter().collect();
        let mut current = Some(securable);
        let mut depth = 0;

        while let Some(node) = current {
            if depth >= self.max_depth {
                warn!(
                    "Escalation of {} roles stopped at depth {} below {}",
                    pending.len(),
                    depth,
                    securable.securable_id()
                );
                return false;
            }

            let mut carried = Vec::with_capacity(pending.len());
            for role_id in pending {
                match self.single_role_escalate(role_id, node, permission, false) {
                    Resolution::Allow => return true,
                    Resolution::Deny => {
                        debug!("Role {} denied '{}' at {}", role_id, permission, node.securable_id());
                    }
                    Resolution::Unset => carried.push(role_id),
                }
            }

            if carried.is_empty() {
                return false;
            }

            debug!(
                "Carrying {} roles past {} for '{}'",
                carried.len(),
                node.securable_id(),
                permission
            );
            pending = carried;
            current = node.parent();
            depth += 1;
        }

        false
    }

    /// Most general named roles satisfying `predicate`
    ///
    /// Starts from `start` and only expands roles that fail the predicate,
    /// since anything more privileged than an accepted role already inherits
    /// it. Each round is tested in name then id order, and each role at most
    /// once, so cyclic ladders terminate.
    pub fn fundamental_fulfillers<'r, P>(&self, roles: &'r RoleSet, start: Vec<&'r Role>, mut predicate: P) -> Vec<RoleId>
    where
        P: FnMut(&Role) -> bool,
    {
        let mut accepted = Vec::new();
        let mut tested: HashSet<&'r RoleId> = HashSet::new();
        let mut frontier = start;

        while !frontier.is_empty() {
            let mut next = Vec::new();

            for role in frontier {
                if !tested.insert(&role.id) {
                    continue;
                }

                if predicate(role) {
                    accepted.push(role.id.clone());
                } else {
                    next.extend(roles.children_of(&role.id));
                }
            }

            // Children of different parents interleave; keep each round in name order
            sort_roles(&mut next);
            next.dedup_by(|a, b| a.id == b.id);
            next.retain(|role| !tested.contains(&role.id));
            frontier = next;
        }

        accepted
    }
}

impl Default for AclEvaluator {
    fn default() -> Self {
        Self::new(32)
    }
}
