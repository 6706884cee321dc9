//! Tests for the role graph
//!
//! Covers closure traversal over ladders, diamonds and cycles, the
//! reverse index, the fulfiller helpers and diagnostics.

use super::graph::RoleSet;
use super::types::{Role, Sentinel};
use crate::acl::{Ace, Acl, RoleRef};
use crate::error::AuthzError;
use crate::types::RoleIdSet;

fn ids(items: &[&str]) -> RoleIdSet {
    items.iter().map(|s| s.to_string()).collect()
}

fn ladder() -> RoleSet {
    RoleSet::new(
        "proj",
        vec![
            Role::named("member", "proj", "Member"),
            Role::named("developer", "proj", "Developer").with_uplink("member"),
            Role::named("admin", "proj", "Admin").with_uplink("developer"),
            Role::proxy("r-alice", "proj", "alice").with_uplink("developer"),
            Role::proxy("r-bob", "proj", "bob").with_uplink("member"),
        ],
    )
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_sentinels_are_synthesized() {
    let roles = ladder();

    assert_eq!(roles.sentinel_id(Sentinel::Anonymous), "proj:*anonymous");
    assert_eq!(roles.sentinel_id(Sentinel::Authenticated), "proj:*authenticated");
    assert!(roles.contains("proj:*anonymous"));
    assert_eq!(roles.len(), 7);
}

#[test]
fn test_existing_sentinels_are_kept() {
    let roles = RoleSet::new(
        "proj",
        vec![
            Role::named("anon-1", "proj", "*anonymous"),
            Role::named("auth-1", "proj", "*authenticated"),
        ],
    );

    assert_eq!(roles.sentinel_id(Sentinel::Anonymous), "anon-1");
    assert_eq!(roles.sentinel_id(Sentinel::Authenticated), "auth-1");
    assert_eq!(roles.len(), 2);
}

#[test]
fn test_foreign_scope_roles_are_dropped() {
    let roles = RoleSet::new(
        "proj",
        vec![
            Role::named("member", "proj", "Member"),
            Role::named("intruder", "other", "Member"),
        ],
    );

    assert!(roles.contains("member"));
    assert!(!roles.contains("intruder"));
}

#[test]
fn test_reverse_index() {
    let roles = ladder();

    assert_eq!(roles.reverse_index()["member"], ids(&["developer", "r-bob"]));
    assert_eq!(roles.reverse_index()["developer"], ids(&["admin", "r-alice"]));
    assert!(!roles.reverse_index().contains_key("admin"));
}

// ============================================================================
// Closures
// ============================================================================

#[test]
fn test_reaching_follows_ladder() {
    let roles = ladder();

    let reach = roles.reaching([&"r-alice".to_string()]);
    assert_eq!(reach, ids(&["r-alice", "developer", "member"]));

    let reach = roles.reaching([&"admin".to_string()]);
    assert_eq!(reach, ids(&["admin", "developer", "member"]));
}

#[test]
fn test_reaching_multiple_start_ids() {
    let roles = ladder();

    let reach = roles.reaching([&"r-bob".to_string(), &"admin".to_string()]);
    assert_eq!(reach, ids(&["r-bob", "admin", "developer", "member"]));
}

#[test]
fn test_reaching_skips_unknown_ids() {
    let roles = RoleSet::new(
        "proj",
        vec![Role::named("a", "proj", "A").with_uplink("ghost")],
    );

    let reach = roles.reaching([&"a".to_string(), &"missing".to_string()]);
    assert_eq!(reach, ids(&["a"]));
}

#[test]
fn test_reaching_two_role_cycle() {
    let roles = RoleSet::new(
        "proj",
        vec![
            Role::named("a", "proj", "A").with_uplink("b"),
            Role::named("b", "proj", "B").with_uplink("a"),
        ],
    );

    assert_eq!(roles.reaching([&"a".to_string()]), ids(&["a", "b"]));
    assert_eq!(roles.reaching([&"b".to_string()]), ids(&["a", "b"]));
}

#[test]
fn test_reaching_self_loop() {
    let roles = RoleSet::new("proj", vec![Role::named("a", "proj", "A").with_uplink("a")]);
    assert_eq!(roles.reaching([&"a".to_string()]), ids(&["a"]));
}

#[test]
fn test_reaching_diamond() {
    // lead -> {backend, frontend} -> member
    let roles = RoleSet::new(
        "proj",
        vec![
            Role::named("member", "proj", "Member"),
            Role::named("backend", "proj", "Backend").with_uplink("member"),
            Role::named("frontend", "proj", "Frontend").with_uplink("member"),
            Role::named("lead", "proj", "Lead")
                .with_uplink("backend")
                .with_uplink("frontend"),
        ],
    );

    let reach = roles.reaching([&"lead".to_string()]);
    assert_eq!(reach, ids(&["lead", "backend", "frontend", "member"]));
}

#[test]
fn test_reachers_follow_reverse_index() {
    let roles = ladder();

    assert_eq!(
        roles.reachers("member"),
        ids(&["member", "developer", "admin", "r-alice", "r-bob"])
    );
    assert_eq!(roles.reachers("admin"), ids(&["admin"]));
    assert!(roles.reachers("ghost").is_empty());
}

#[test]
fn test_reachers_cycle() {
    let roles = RoleSet::new(
        "proj",
        vec![
            Role::named("a", "proj", "A").with_uplink("b"),
            Role::named("b", "proj", "B").with_uplink("c"),
            Role::named("c", "proj", "C").with_uplink("a"),
        ],
    );

    assert_eq!(roles.reachers("a"), ids(&["a", "b", "c"]));
}

#[test]
fn test_principals_of() {
    let roles = ladder();

    let holders = roles.principals_of(&roles.reachers("developer"));
    assert_eq!(holders.into_iter().collect::<Vec<_>>(), vec!["alice".to_string()]);

    let holders = roles.principals_of(&roles.reachers("member"));
    assert_eq!(holders.len(), 2);
}

// ============================================================================
// Fulfiller helpers
// ============================================================================

#[test]
fn test_base_named_includes_sentinels_not_proxies() {
    let roles = ladder();

    let base: Vec<&str> = roles.base_named().iter().map(|r| r.id.as_str()).collect();
    assert_eq!(base, vec!["proj:*anonymous", "proj:*authenticated", "member"]);
}

#[test]
fn test_ladder_hanging_off_sentinel() {
    let roles = RoleSet::new(
        "proj",
        vec![
            Role::named("member", "proj", "Member").with_uplink("proj:*authenticated"),
            Role::named("developer", "proj", "Developer").with_uplink("member"),
            Role::proxy("r-bob", "proj", "bob").with_uplink("member"),
        ],
    );

    assert!(!roles.base_named().iter().any(|r| r.id == "member"));
    let children: Vec<&str> = roles
        .children_of("proj:*authenticated")
        .iter()
        .map(|r| r.id.as_str())
        .collect();
    assert_eq!(children, vec!["member"]);
}

#[test]
fn test_children_of_keeps_bound_named_roles() {
    let roles = RoleSet::new(
        "proj",
        vec![
            Role::named("member", "proj", "Member"),
            Role::named("owner", "proj", "Owner").with_uplink("member").bound_to("carol"),
            Role::proxy("r-dave", "proj", "dave").with_uplink("member"),
        ],
    );

    let children: Vec<&str> = roles.children_of("member").iter().map(|r| r.id.as_str()).collect();
    assert_eq!(children, vec!["owner"]);
}

#[test]
fn test_children_of() {
    let roles = ladder();

    let children: Vec<&str> = roles.children_of("member").iter().map(|r| r.id.as_str()).collect();
    assert_eq!(children, vec!["developer"]);

    let children: Vec<&str> = roles.children_of("developer").iter().map(|r| r.id.as_str()).collect();
    assert_eq!(children, vec!["admin"]);

    assert!(roles.children_of("admin").is_empty());
}

#[test]
fn test_bound_to_and_named() {
    let roles = ladder();
    let alice = "alice".to_string();

    let bound: Vec<&str> = roles.bound_to(&alice).map(|r| r.id.as_str()).collect();
    assert_eq!(bound, vec!["r-alice"]);

    assert_eq!(roles.named("Developer").map(|r| r.id.as_str()), Some("developer"));
    assert!(roles.named("Nobody").is_none());
}

// ============================================================================
// Diagnostics
// ============================================================================

#[test]
fn test_dangling_refs() {
    let roles = ladder();
    let acl = Acl::from(vec![
        Ace::allow(RoleRef::role("developer"), "write").unwrap(),
        Ace::allow(RoleRef::role("ghost"), "read").unwrap(),
        Ace::deny(RoleRef::role("ghost"), "write").unwrap(),
        Ace::allow(RoleRef::Everyone, "read").unwrap(),
    ]);

    assert_eq!(roles.dangling_refs(&acl), vec!["ghost".to_string()]);
}

#[test]
fn test_diagnostics_clean_graph() {
    assert!(ladder().diagnostics().is_empty());
}

#[test]
fn test_diagnostics_reports_cycle_and_dangling_uplink() {
    let roles = RoleSet::new(
        "proj",
        vec![
            Role::named("a", "proj", "A").with_uplink("b"),
            Role::named("b", "proj", "B").with_uplink("a"),
            Role::named("c", "proj", "C").with_uplink("ghost"),
        ],
    );

    let problems = roles.diagnostics();
    assert_eq!(problems.len(), 2);
    assert!(problems
        .iter()
        .any(|p| matches!(p, AuthzError::Configuration(msg) if msg.contains("ghost"))));
    assert!(problems
        .iter()
        .any(|p| matches!(p, AuthzError::CycleDetected(msg) if msg.contains("a -> b -> a"))));
}

#[test]
fn test_long_ladder_walks_without_recursion() {
    let rungs = 100_000;
    let roles = RoleSet::new(
        "proj",
        (0..rungs).map(|i| {
            let role = Role::named(format!("rung-{}", i), "proj", format!("Rung {}", i));
            if i == 0 {
                role
            } else {
                role.with_uplink(format!("rung-{}", i - 1))
            }
        }),
    );

    let top = format!("rung-{}", rungs - 1);
    assert_eq!(roles.reaching([&top]).len(), rungs);
    assert_eq!(roles.reachers("rung-0").len(), rungs);
    assert!(roles.diagnostics().is_empty());
}
