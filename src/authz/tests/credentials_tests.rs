//! Credentials caching through the authorizer
//!
//! Covers per-operation isolation, the shared cache read-through and the
//! eviction hooks mutation paths are expected to call.

use std::sync::Arc;
use warden_authz::acl::{grant, Acl, RoleRef, SecurableKind, SecuredObject};
use warden_authz::{
    Authorizer, AuthorizerConfig, Identity, InMemoryRoleRepository, Role, SharedCacheConfig,
};

async fn repository() -> Arc<InMemoryRoleRepository> {
    let repo = Arc::new(InMemoryRoleRepository::new());
    repo.put_role(Role::named("member", "p1", "Member")).await.unwrap();
    repo.put_role(Role::named("dev", "p1", "Developer").with_uplink("member"))
        .await
        .unwrap();
    repo.put_role(Role::named("reader", "p2", "Reader")).await.unwrap();
    repo.add_member("p1", "alice", "member").await.unwrap();
    repo
}

fn shared_config() -> AuthorizerConfig {
    AuthorizerConfig {
        shared_cache: Some(SharedCacheConfig {
            capacity: 100,
            ttl_secs: 300,
        }),
        ..AuthorizerConfig::default()
    }
}

fn dev_only_ticket() -> SecuredObject {
    let project = Arc::new(
        SecuredObject::new("p1", SecurableKind::RootScope("p1".into()))
            .with_acl(grant(&Acl::new(), RoleRef::role("dev"), "write").unwrap()),
    );
    SecuredObject::new("ticket", SecurableKind::Artifact).with_parent(project)
}

#[tokio::test]
async fn test_each_operation_loads_its_own_roles() {
    let repo = repository().await;
    let authz = Authorizer::new(AuthorizerConfig::default(), repo.clone());
    let ticket = dev_only_ticket();
    let alice = Identity::principal("alice");

    let mut first = authz.credentials();
    authz.has_access(&mut first, &ticket, "write", &alice).await.unwrap();
    authz.has_access(&mut first, &ticket, "read", &alice).await.unwrap();
    assert_eq!(repo.fetch_count(), 1);

    let mut second = authz.credentials();
    authz.has_access(&mut second, &ticket, "write", &alice).await.unwrap();
    assert_eq!(repo.fetch_count(), 2);
    assert_ne!(first.operation_id(), second.operation_id());
}

#[tokio::test]
async fn test_membership_change_seen_by_next_operation() {
    let repo = repository().await;
    let authz = Authorizer::new(AuthorizerConfig::default(), repo.clone());
    let ticket = dev_only_ticket();
    let alice = Identity::principal("alice");

    let mut live = authz.credentials();
    assert!(!authz.has_access(&mut live, &ticket, "write", &alice).await.unwrap());

    repo.add_member("p1", "alice", "dev").await.unwrap();

    // The running operation keeps its snapshot
    assert!(!authz.has_access(&mut live, &ticket, "write", &alice).await.unwrap());

    let mut next = authz.credentials();
    assert!(authz.has_access(&mut next, &ticket, "write", &alice).await.unwrap());
}

#[tokio::test]
async fn test_shared_cache_spans_operations() {
    let repo = repository().await;
    let authz = Authorizer::new(shared_config(), repo.clone());
    let ticket = dev_only_ticket();
    let alice = Identity::principal("alice");

    for _ in 0..3 {
        let mut creds = authz.credentials();
        authz.has_access(&mut creds, &ticket, "write", &alice).await.unwrap();
    }

    assert_eq!(repo.fetch_count(), 1);
    let stats = authz.shared_cache_stats().unwrap();
    assert!(stats.hits >= 2);
    assert!(stats.hit_rate() > 0.0);
}

#[tokio::test]
async fn test_shared_cache_needs_eviction_after_mutation() {
    let repo = repository().await;
    let authz = Authorizer::new(shared_config(), repo.clone());
    let ticket = dev_only_ticket();
    let alice = Identity::principal("alice");

    let mut creds = authz.credentials();
    assert!(!authz.has_access(&mut creds, &ticket, "write", &alice).await.unwrap());

    repo.add_member("p1", "alice", "dev").await.unwrap();

    // Stale until the mutation path evicts
    let mut creds = authz.credentials();
    assert!(!authz.has_access(&mut creds, &ticket, "write", &alice).await.unwrap());

    authz.invalidate_scope("p1");

    let mut creds = authz.credentials();
    assert!(authz.has_access(&mut creds, &ticket, "write", &alice).await.unwrap());
}

#[tokio::test]
async fn test_revoked_member_loses_access_after_identity_eviction() {
    let repo = repository().await;
    repo.add_member("p1", "alice", "dev").await.unwrap();
    let authz = Authorizer::new(shared_config(), repo.clone());
    let ticket = dev_only_ticket();
    let alice = Identity::principal("alice");

    let mut creds = authz.credentials();
    assert!(authz.has_access(&mut creds, &ticket, "write", &alice).await.unwrap());

    assert!(repo.remove_member("p1", "alice", "dev").await);
    authz.invalidate_identity(&alice, "p1");

    let mut creds = authz.credentials();
    assert!(!authz.has_access(&mut creds, &ticket, "write", &alice).await.unwrap());
    assert_eq!(repo.fetch_count(), 2);
}

#[tokio::test]
async fn test_identity_eviction_keeps_other_reaches() {
    let repo = repository().await;
    let authz = Authorizer::new(shared_config(), repo.clone());
    let alice = Identity::principal("alice");
    let scope = "p1".to_string();

    let mut creds = authz.credentials();
    authz.reaching_role_ids(&mut creds, &alice, &scope).await.unwrap();
    let anonymous = authz
        .reaching_role_ids(&mut creds, &Identity::Anonymous, &scope)
        .await
        .unwrap();

    repo.add_member("p1", "alice", "dev").await.unwrap();
    authz.invalidate_identity(&alice, "p1");

    let mut creds = authz.credentials();
    let after = authz.reaching_role_ids(&mut creds, &alice, &scope).await.unwrap();
    assert!(after.contains("dev"));

    // Served from the shared cache without another load
    let fetches = repo.fetch_count();
    let mut creds = authz.credentials();
    let again = authz
        .reaching_role_ids(&mut creds, &Identity::Anonymous, &scope)
        .await
        .unwrap();
    assert_eq!(again, anonymous);
    assert_eq!(repo.fetch_count(), fetches);
}

#[tokio::test]
async fn test_batched_reach_across_scopes() {
    let repo = repository().await;
    let authz = Authorizer::new(AuthorizerConfig::default(), repo.clone());
    let mut creds = authz.credentials();

    let scopes = vec!["p1".to_string(), "p2".to_string()];
    let reaches = creds
        .identity_reach_many(&Identity::principal("alice"), &scopes)
        .await
        .unwrap();

    assert!(reaches["p1"].contains("member"));
    assert!(!reaches["p2"].contains("reader"));
    assert_eq!(repo.fetch_count(), 1);
}
