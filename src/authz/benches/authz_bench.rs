//! Authorization engine benchmarks
//!
//! Reach computation over role ladders and escalation through deep
//! securable chains, plus a full `has_access` with a warm credentials cache.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use tokio::runtime::Runtime;
use warden_authz::acl::{grant, Acl, RoleRef, SecurableKind, SecuredObject};
use warden_authz::{AclEvaluator, Authorizer, AuthorizerConfig, Identity, InMemoryRoleRepository, Role, RoleIdSet, RoleSet};

/// `rung-0 <- rung-1 <- ... <- rung-(n-1)`, plus a back edge closing a cycle
fn create_ladder(rungs: usize) -> RoleSet {
    let roles = (0..rungs).map(|i| {
        let role = Role::named(format!("rung-{}", i), "bench", format!("Rung {}", i));
        match i {
            0 => role.with_uplink(format!("rung-{}", rungs - 1)),
            _ => role.with_uplink(format!("rung-{}", i - 1)),
        }
    });
    RoleSet::new("bench", roles)
}

/// Chain of `depth` artifacts with the only grant at the root
fn create_chain(depth: usize) -> Arc<SecuredObject> {
    let root_acl = grant(&Acl::new(), RoleRef::role("rung-0"), "read").unwrap();
    let mut node = Arc::new(SecuredObject::new("node-0", SecurableKind::RootScope("bench".into())).with_acl(root_acl));

    for i in 1..depth {
        node = Arc::new(SecuredObject::new(format!("node-{}", i), SecurableKind::Artifact).with_parent(node));
    }
    node
}

fn bench_reaching(c: &mut Criterion) {
    let mut group = c.benchmark_group("reaching");

    for rungs in [10, 100, 1000].iter() {
        let roles = create_ladder(*rungs);
        let top = format!("rung-{}", rungs - 1);

        group.bench_with_input(BenchmarkId::new("ladder", rungs), rungs, |b, _| {
            b.iter(|| roles.reaching(black_box([&top])))
        });
        group.bench_with_input(BenchmarkId::new("reachers", rungs), rungs, |b, _| {
            b.iter(|| roles.reachers(black_box("rung-0")))
        });
    }

    group.finish();
}

fn bench_escalation(c: &mut Criterion) {
    let mut group = c.benchmark_group("escalation");
    let evaluator = AclEvaluator::new(256);

    for depth in [4, 32, 128].iter() {
        let leaf = create_chain(*depth);
        let held: RoleIdSet = (0..16).map(|i| format!("rung-{}", i)).collect();

        group.bench_with_input(BenchmarkId::new("any_role", depth), depth, |b, _| {
            b.iter(|| evaluator.any_role_escalate(black_box(&held), leaf.as_ref(), "read"))
        });
    }

    group.finish();
}

fn bench_has_access(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let (authorizer, ticket) = rt.block_on(async {
        let repo = Arc::new(InMemoryRoleRepository::new());
        repo.put_role(Role::named("member", "bench", "Member")).await.unwrap();
        repo.put_role(Role::named("dev", "bench", "Developer").with_uplink("member"))
            .await
            .unwrap();
        repo.add_member("bench", "alice", "dev").await.unwrap();

        let scope = Arc::new(
            SecuredObject::new("bench", SecurableKind::RootScope("bench".into()))
                .with_acl(grant(&Acl::new(), RoleRef::role("member"), "read").unwrap()),
        );
        let ticket = SecuredObject::new("ticket", SecurableKind::Artifact).with_parent(scope);
        (Authorizer::new(AuthorizerConfig::default(), repo), ticket)
    });

    let alice = Identity::principal("alice");
    let mut creds = authorizer.credentials();

    c.bench_function("has_access_warm", |b| {
        b.iter(|| {
            rt.block_on(authorizer.has_access(&mut creds, &ticket, black_box("read"), &alice))
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_reaching, bench_escalation, bench_has_access);
criterion_main!(benches);
