//! Fixture loading for the warden-check CLI

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use warden_authz::acl::{Acl, SecurableKind, SecuredObject};
use warden_authz::{AuthorizerConfig, InMemoryRoleRepository, PrincipalId, Role, RoleId, ScopeId, SecurableId};

/// Complete fixture file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Fixture {
    #[serde(default)]
    pub authorizer: AuthorizerConfig,

    #[serde(default)]
    pub roles: Vec<Role>,

    #[serde(default)]
    pub members: Vec<Membership>,

    #[serde(default)]
    pub securables: Vec<SecurableSection>,
}

/// A principal joining a named role
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Membership {
    pub scope_id: ScopeId,
    pub principal_id: PrincipalId,
    pub role_id: RoleId,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SecurableSection {
    pub id: SecurableId,
    pub kind: SecurableKind,
    #[serde(default)]
    pub acl: Acl,
    #[serde(default)]
    pub parent: Option<SecurableId>,
    #[serde(default)]
    pub fallback: Option<SecurableId>,
}

impl Fixture {
    /// Load a fixture from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).context("Failed to read fixture file")?;

        let fixture: Fixture = toml::from_str(&contents).context("Failed to parse fixture file")?;

        Ok(fixture)
    }

    /// Validate the fixture
    pub fn validate(&self) -> Result<()> {
        self.authorizer.validate()?;

        let mut ids = BTreeSet::new();
        for section in &self.securables {
            if !ids.insert(section.id.as_str()) {
                bail!("Securable {} is declared twice", section.id);
            }
        }

        for section in &self.securables {
            for link in [&section.parent, &section.fallback].into_iter().flatten() {
                if !ids.contains(link.as_str()) {
                    bail!("Securable {} links to undeclared securable {}", section.id, link);
                }
            }
        }

        Ok(())
    }

    /// Scopes named by roles or scope-bearing securables
    pub fn scope_ids(&self) -> Vec<ScopeId> {
        let scopes: BTreeSet<ScopeId> = self
            .roles
            .iter()
            .map(|role| role.scope_id.clone())
            .chain(self.securables.iter().filter_map(|s| s.kind.scope_id().cloned()))
            .collect();
        scopes.into_iter().collect()
    }

    /// Repository holding the fixture's roles, memberships and ACLs
    pub async fn repository(&self) -> Result<Arc<InMemoryRoleRepository>> {
        let repo = Arc::new(InMemoryRoleRepository::new());

        for role in &self.roles {
            repo.put_role(role.clone())
                .await
                .with_context(|| format!("Invalid role {}", role.id))?;
        }

        for member in &self.members {
            repo.add_member(&member.scope_id, &member.principal_id, &member.role_id)
                .await
                .with_context(|| format!("Invalid membership of {} in {}", member.principal_id, member.role_id))?;
        }

        for section in &self.securables {
            repo.put_acl(section.id.clone(), section.acl.clone()).await;
        }

        Ok(repo)
    }

    /// Build every securable, parents before children
    ///
    /// ACLs are read back through the repository.
    pub async fn securables(&self, repo: &InMemoryRoleRepository) -> Result<HashMap<SecurableId, Arc<SecuredObject>>> {
        let sections: HashMap<&str, &SecurableSection> =
            self.securables.iter().map(|s| (s.id.as_str(), s)).collect();
        let order = build_order(&sections)?;

        let mut built: HashMap<SecurableId, Arc<SecuredObject>> = HashMap::with_capacity(order.len());
        for id in order {
            let section = sections[id];
            let parent = section.parent.as_ref().and_then(|p| built.get(p)).cloned();

            let mut object = SecuredObject::load(repo, section.id.clone(), section.kind.clone(), parent).await?;
            if let Some(fallback) = section.fallback.as_ref().and_then(|f| built.get(f)) {
                object = object.with_fallback(Arc::clone(fallback));
            }

            debug!("Built securable {}", section.id);
            built.insert(section.id.clone(), Arc::new(object));
        }

        Ok(built)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Depth-first order over parent and fallback links, rejecting cycles
fn build_order<'a>(sections: &HashMap<&'a str, &'a SecurableSection>) -> Result<Vec<&'a str>> {
    let mut marks: HashMap<&'a str, Mark> = HashMap::new();
    let mut order = Vec::with_capacity(sections.len());

    let mut ids: Vec<&'a str> = sections.keys().copied().collect();
    ids.sort_unstable();

    for root in ids {
        if marks.contains_key(root) {
            continue;
        }

        // (id, links expanded yet)
        let mut stack = vec![(root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                marks.insert(id, Mark::Done);
                order.push(id);
                continue;
            }

            match marks.get(id) {
                Some(Mark::Done) => continue,
                Some(Mark::Visiting) => bail!("Securable {} is its own ancestor", id),
                None => {}
            }

            marks.insert(id, Mark::Visiting);
            stack.push((id, true));

            let Some(section) = sections.get(id) else {
                continue;
            };
            for link in [&section.parent, &section.fallback].into_iter().flatten() {
                if let Some((linked, _)) = sections.get_key_value(link.as_str()) {
                    match marks.get(linked) {
                        Some(Mark::Visiting) => bail!("Securable {} is its own ancestor", linked),
                        Some(Mark::Done) => {}
                        None => stack.push((*linked, false)),
                    }
                }
            }
        }
    }

    Ok(order)
}
