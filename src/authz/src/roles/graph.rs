//! In-memory role graph for one scope
//!
//! Uplinks form a directed graph: an edge `A -> B` means "A also carries B's
//! grants". Misconfigured data may contain cycles, so both closures use
//! three-state DFS marking:
//! - Unvisited: not in the marks map
//! - Visiting: on the current DFS path
//! - Done: fully expanded
//!
//! Meeting a `Visiting` role is a cycle. The branch is truncated and a warning
//! logged; meeting a `Done` role is an ordinary diamond and is skipped silently.

use super::types::{Role, Sentinel};
use crate::acl::{Acl, RoleRef};
use crate::error::AuthzError;
use crate::types::{PrincipalId, RoleId, RoleIdSet, ScopeId};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

/// Traversal direction over the uplink graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// Follow uplinks (towards more general roles)
    Forward,
    /// Follow the reverse index (towards roles that inherit)
    Backward,
}

/// DFS mark
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// The roles of one scope, indexed for closure queries
///
/// # Example
///
/// ```
/// use warden_authz::roles::{Role, RoleSet};
///
/// let roles = RoleSet::new("proj", vec![
///     Role::named("member", "proj", "Member"),
///     Role::named("developer", "proj", "Developer").with_uplink("member"),
///     Role::named("admin", "proj", "Admin").with_uplink("developer"),
/// ]);
///
/// let reach = roles.reaching([&"admin".to_string()]);
/// assert!(reach.contains("member"));
/// ```
#[derive(Debug, Clone)]
pub struct RoleSet {
    /// Scope these roles belong to
    scope_id: ScopeId,

    /// Role id -> role
    index: HashMap<RoleId, Role>,

    /// Role id -> ids of roles whose uplinks contain it
    reverse_index: HashMap<RoleId, RoleIdSet>,

    /// Id of the anonymous sentinel
    anonymous_id: RoleId,

    /// Id of the authenticated sentinel
    authenticated_id: RoleId,
}

impl RoleSet {
    /// Build a role set from a batch of records
    ///
    /// Records from another scope are dropped. Missing sentinels are
    /// synthesized in memory.
    pub fn new(scope_id: impl Into<ScopeId>, roles: impl IntoIterator<Item = Role>) -> Self {
        let scope_id = scope_id.into();
        let mut index = HashMap::new();

        for role in roles {
            if role.scope_id != scope_id {
                warn!(
                    "Dropping role {} of scope {} from role set of scope {}",
                    role.id, role.scope_id, scope_id
                );
                continue;
            }
            index.insert(role.id.clone(), role);
        }

        let anonymous_id = Self::ensure_sentinel(&scope_id, &mut index, Sentinel::Anonymous);
        let authenticated_id = Self::ensure_sentinel(&scope_id, &mut index, Sentinel::Authenticated);

        let mut reverse_index: HashMap<RoleId, RoleIdSet> = HashMap::new();
        for role in index.values() {
            for uplink in &role.uplinks {
                reverse_index
                    .entry(uplink.clone())
                    .or_default()
                    .insert(role.id.clone());
            }
        }

        debug!("Loaded {} roles for scope {}", index.len(), scope_id);

        Self {
            scope_id,
            index,
            reverse_index,
            anonymous_id,
            authenticated_id,
        }
    }

    fn ensure_sentinel(scope_id: &str, index: &mut HashMap<RoleId, Role>, sentinel: Sentinel) -> RoleId {
        if let Some(existing) = index.values().find(|r| r.sentinel_kind() == Some(sentinel)) {
            return existing.id.clone();
        }

        let role = Role::sentinel(scope_id, sentinel);
        let id = role.id.clone();
        debug!("Synthesized {} sentinel for scope {}", sentinel.role_name(), scope_id);
        index.insert(id.clone(), role);
        id
    }

    /// Scope id
    pub fn scope_id(&self) -> &ScopeId {
        &self.scope_id
    }

    /// Direct lookup table
    pub fn index(&self) -> &HashMap<RoleId, Role> {
        &self.index
    }

    /// Role id -> roles whose uplinks contain it
    pub fn reverse_index(&self) -> &HashMap<RoleId, RoleIdSet> {
        &self.reverse_index
    }

    /// Look up one role
    pub fn get(&self, role_id: &str) -> Option<&Role> {
        self.index.get(role_id)
    }

    /// Whether the role exists in this scope
    pub fn contains(&self, role_id: &str) -> bool {
        self.index.contains_key(role_id)
    }

    /// Number of roles, sentinels included
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the set is empty (never true, sentinels always exist)
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Id of a sentinel role
    pub fn sentinel_id(&self, sentinel: Sentinel) -> &RoleId {
        match sentinel {
            Sentinel::Anonymous => &self.anonymous_id,
            Sentinel::Authenticated => &self.authenticated_id,
        }
    }

    /// Roles directly bound to a principal, proxy role included
    pub fn bound_to<'a>(&'a self, principal_id: &'a PrincipalId) -> impl Iterator<Item = &'a Role> + 'a {
        self.index
            .values()
            .filter(move |r| r.principal_id.as_ref() == Some(principal_id))
    }

    /// Named role by name
    pub fn named(&self, name: &str) -> Option<&Role> {
        self.index
            .values()
            .find(|r| r.principal_id.is_none() && r.name.as_deref() == Some(name))
    }

    /// Forward transitive closure through uplinks
    ///
    /// Every known start id is part of the result.
    pub fn reaching<'a, I>(&self, start: I) -> RoleIdSet
    where
        I: IntoIterator<Item = &'a RoleId>,
    {
        let mut marks = HashMap::new();
        for role_id in start {
            self.walk(role_id, Direction::Forward, &mut marks, |path, repeat| self.warn_cycle(path, repeat));
        }
        marks.into_keys().collect()
    }

    /// Backward transitive closure: every role inheriting `target`, itself included
    pub fn reachers(&self, target: &str) -> RoleIdSet {
        let mut marks = HashMap::new();
        self.walk(target, Direction::Backward, &mut marks, |path, repeat| self.warn_cycle(path, repeat));
        marks.into_keys().collect()
    }

    /// Principals whose bound roles are among `role_ids`
    pub fn principals_of(&self, role_ids: &RoleIdSet) -> BTreeSet<PrincipalId> {
        role_ids
            .iter()
            .filter_map(|id| self.index.get(id))
            .filter_map(|role| role.principal_id.clone())
            .collect()
    }

    /// Named roles with no uplinks, the most general rungs of each ladder
    ///
    /// Sentinels are included so ladders hanging off them are reachable.
    pub fn base_named(&self) -> Vec<&Role> {
        let mut base: Vec<&Role> = self
            .index
            .values()
            .filter(|r| r.is_named() && r.uplinks.is_empty())
            .collect();
        sort_roles(&mut base);
        base
    }

    /// Named roles one step more privileged than `role_id`
    pub fn children_of(&self, role_id: &str) -> Vec<&Role> {
        let mut children: Vec<&Role> = self
            .reverse_index
            .get(role_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.index.get(id))
            .filter(|r| r.is_named())
            .collect();
        sort_roles(&mut children);
        children
    }

    /// Role ids referenced by `acl` that do not exist in this scope
    pub fn dangling_refs(&self, acl: &Acl) -> Vec<RoleId> {
        let mut dangling = Vec::new();
        for ace in acl.iter() {
            if let RoleRef::Role(role_id) = &ace.role {
                if !self.contains(role_id) && !dangling.contains(role_id) {
                    dangling.push(role_id.clone());
                }
            }
        }
        dangling
    }

    /// Report dangling uplinks and cycles
    ///
    /// Evaluation tolerates both; this is for operators cleaning up data.
    pub fn diagnostics(&self) -> Vec<AuthzError> {
        let mut problems = Vec::new();

        let mut ids: Vec<&RoleId> = self.index.keys().collect();
        ids.sort();

        for id in &ids {
            let role = &self.index[*id];
            for uplink in &role.uplinks {
                if !self.index.contains_key(uplink) {
                    problems.push(AuthzError::Configuration(format!(
                        "Role {} in scope {} has uplink to unknown role {}",
                        role.id, self.scope_id, uplink
                    )));
                }
            }
        }

        let mut marks = HashMap::new();
        for id in ids {
            self.walk(id, Direction::Forward, &mut marks, |path, repeat| {
                if let Some(start) = path.iter().position(|id| *id == repeat) {
                    let cycle: Vec<&str> = path[start..]
                        .iter()
                        .map(|id| id.as_str())
                        .chain(std::iter::once(repeat.as_str()))
                        .collect();
                    problems.push(AuthzError::CycleDetected(format!(
                        "scope {}: {}",
                        self.scope_id,
                        cycle.join(" -> ")
                    )));
                }
            });
        }

        problems
    }

    /// Iterative DFS from `start`, marking every role before expanding it
    ///
    /// `on_cycle` receives the current path and the `Visiting` role met again.
    /// Unknown ids are skipped without a mark.
    fn walk<F>(&self, start: &str, direction: Direction, marks: &mut HashMap<RoleId, Mark>, mut on_cycle: F)
    where
        F: FnMut(&[&RoleId], &RoleId),
    {
        if marks.contains_key(start) {
            return;
        }
        let Some((start, _)) = self.index.get_key_value(start) else {
            debug!("Skipping unknown role {} in scope {}", start, self.scope_id);
            return;
        };

        marks.insert(start.clone(), Mark::Visiting);
        let mut stack = vec![(start, self.neighbours(start, direction))];

        while let Some((role_id, pending)) = stack.last_mut() {
            let Some(next) = pending.pop() else {
                marks.insert((*role_id).clone(), Mark::Done);
                stack.pop();
                continue;
            };

            match marks.get(next) {
                Some(Mark::Visiting) => {
                    let path: Vec<&RoleId> = stack.iter().map(|(id, _)| *id).collect();
                    on_cycle(&path, next);
                }
                Some(Mark::Done) => {}
                None => match self.index.get_key_value(next.as_str()) {
                    Some((next, _)) => {
                        marks.insert(next.clone(), Mark::Visiting);
                        stack.push((next, self.neighbours(next, direction)));
                    }
                    None => debug!("Skipping unknown role {} in scope {}", next, self.scope_id),
                },
            }
        }
    }

    /// Adjacent ids in `direction`, reversed so popping yields them in order
    fn neighbours(&self, role_id: &str, direction: Direction) -> Vec<&RoleId> {
        let next: Vec<&RoleId> = match direction {
            Direction::Forward => self
                .index
                .get(role_id)
                .into_iter()
                .flat_map(|role| role.uplinks.iter())
                .collect(),
            Direction::Backward => self.reverse_index.get(role_id).into_iter().flatten().collect(),
        };
        next.into_iter().rev().collect()
    }

    fn warn_cycle(&self, path: &[&RoleId], repeat: &RoleId) {
        let path: Vec<&str> = path.iter().map(|id| id.as_str()).collect();
        warn!(
            "{}",
            AuthzError::CycleDetected(format!("scope {}: {} -> {}", self.scope_id, path.join(" -> "), repeat))
        );
    }
}

/// Order roles by name, then id
pub(crate) fn sort_roles(roles: &mut [&Role]) {
    roles.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
}
