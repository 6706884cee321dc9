//! Warden access checker
//!
//! Loads roles, memberships and securables from a TOML fixture and answers
//! authorization questions against them, printing JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{info, warn};
use warden_authz::acl::owning_scope;
use warden_authz::{Authorizer, Identity, RoleRepository, RoleSet};

mod fixture;

use fixture::Fixture;

/// Warden access checker CLI
#[derive(Parser)]
#[command(name = "warden-check")]
#[command(about = "Answer authorization questions against a role and ACL fixture")]
#[command(version)]
struct Cli {
    /// Path to the fixture file
    #[arg(short, long, default_value = "warden.toml", env = "WARDEN_FIXTURE")]
    fixture: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decide whether an identity holds a permission on a securable
    Check {
        /// Securable id
        #[arg(short, long)]
        securable: String,

        /// Permission to check
        #[arg(short, long)]
        permission: String,

        /// Principal id; anonymous when omitted
        #[arg(long)]
        principal: Option<String>,
    },

    /// List the most general roles, and their principals, holding a permission
    Who {
        /// Securable id
        #[arg(short, long)]
        securable: String,

        /// Permission to check
        #[arg(short, long)]
        permission: String,
    },

    /// Show every role an identity reaches in a scope
    Reach {
        /// Scope id
        #[arg(long)]
        scope: String,

        /// Principal id; anonymous when omitted
        #[arg(long)]
        principal: Option<String>,
    },

    /// Report role graph and ACL problems
    Diagnose,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr, JSON answers to stdout
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},warden_authz={}", log_level, log_level).into()),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let fixture = Fixture::load(&cli.fixture)?;
    fixture.validate()?;
    info!("Loaded fixture from {:?}", cli.fixture);

    let repo = fixture.repository().await?;
    let securables = fixture.securables(&repo).await?;
    let authorizer = Authorizer::new(fixture.authorizer.clone(), repo.clone());
    let mut creds = authorizer.credentials();

    let output = match cli.command {
        Command::Check {
            securable,
            permission,
            principal,
        } => {
            let object = securables
                .get(&securable)
                .with_context(|| format!("Unknown securable {}", securable))?;
            let identity = identity_of(principal);
            let granted = authorizer
                .has_access(&mut creds, object.as_ref(), &permission, &identity)
                .await?;

            json!({
                "securable": securable,
                "permission": permission,
                "identity": identity.to_string(),
                "granted": granted,
                "operation_id": creds.operation_id(),
            })
        }

        Command::Who { securable, permission } => {
            let object = securables
                .get(&securable)
                .with_context(|| format!("Unknown securable {}", securable))?;
            let roles = authorizer
                .roles_with_permission(&mut creds, object.as_ref(), &permission)
                .await?;

            let mut principals = BTreeSet::new();
            if let Some(scope_id) = owning_scope(object.as_ref(), authorizer.config().max_escalation_depth) {
                for role_id in &roles {
                    principals.extend(authorizer.principals_holding(&mut creds, &scope_id, role_id).await?);
                }
            }

            json!({
                "securable": securable,
                "permission": permission,
                "roles": roles,
                "principals": principals,
            })
        }

        Command::Reach { scope, principal } => {
            let identity = identity_of(principal);
            let reach = authorizer.reaching_role_ids(&mut creds, &identity, &scope).await?;

            json!({
                "scope": scope,
                "identity": identity.to_string(),
                "roles": reach.as_ref(),
            })
        }

        Command::Diagnose => {
            let mut problems = Vec::new();

            let scope_ids = fixture.scope_ids();
            let batch = repo.fetch_roles_for_scopes(&scope_ids).await?;
            for (scope_id, records) in batch {
                let roles = RoleSet::new(scope_id, records);
                problems.extend(roles.diagnostics());
            }

            let mut ids: Vec<&String> = securables.keys().collect();
            ids.sort();
            for id in ids {
                let acl_problems = authorizer
                    .check_acl_references(&mut creds, securables[id].as_ref())
                    .await?;
                for problem in acl_problems {
                    if !problems.contains(&problem) {
                        problems.push(problem);
                    }
                }
            }

            for problem in &problems {
                warn!("{}", problem);
            }

            json!({
                "problems": problems.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
            })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn identity_of(principal: Option<String>) -> Identity {
    principal.map(Identity::Principal).unwrap_or(Identity::Anonymous)
}
