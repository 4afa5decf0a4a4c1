//! Permission resolution: ordered strategy chain over role membership, the
//! declarative rule table, and hard-coded degraded-service heuristics.
//!
//! Every path is fail-closed: no roles, storage failure, or a panic anywhere in
//! the chain resolves to deny. Results are never cached; each call re-fetches
//! the role set so a removed role takes effect on the very next check.

use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::warn;

use crate::authz::rules::{RuleDecision, RuleEvaluator};
use crate::authz::{Action, Resource, Role};
use crate::identity::SessionManager;
use crate::store::Directory;

/// Decide whether `user_id` may perform `action` on `resource`.
///
/// Strategy order, first authoritative answer wins:
/// 1. role fetch (empty set or failure => deny)
/// 2. admin shortcut (admin => allow, unconditionally)
/// 3. declarative lookup keyed by user
/// 4. declarative lookup keyed by the fetched role set
/// 5. degraded-service heuristics: gerente => imoveis, corretor => leads
pub fn has_permission(
    dir: &Directory,
    eval: &dyn RuleEvaluator,
    user_id: &str,
    resource: Resource,
    action: Action,
) -> bool {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        resolve(dir, eval, user_id, resource, action)
    }));
    match outcome {
        Ok(allowed) => allowed,
        Err(_) => {
            warn!(target: "authz", "permission resolution panicked for user={} resource={} action={}, denying",
                user_id, resource, action);
            false
        }
    }
}

/// Session-resolving wrapper: no authenticated session means deny.
pub fn has_permission_for_session(
    dir: &Directory,
    eval: &dyn RuleEvaluator,
    sessions: &SessionManager,
    token: Option<&str>,
    resource: Resource,
    action: Action,
) -> bool {
    let Some(token) = token else { return false };
    let Some(principal) = sessions.validate(token) else { return false };
    has_permission(dir, eval, &principal.user_id, resource, action)
}

fn resolve(
    dir: &Directory,
    eval: &dyn RuleEvaluator,
    user_id: &str,
    resource: Resource,
    action: Action,
) -> bool {
    let roles = match dir.roles_for_user(user_id) {
        Ok(roles) => roles,
        Err(e) => {
            warn!(target: "authz", "role fetch failed for user={}, denying: {}", user_id, e);
            return false;
        }
    };
    if roles.is_empty() {
        return false;
    }
    if roles.contains(&Role::Admin) {
        return true;
    }

    // Declarative strategies; a Decided(false) here is final.
    if let RuleDecision::Decided(allowed) = eval.evaluate_for_user(dir, user_id, resource, action) {
        return allowed;
    }
    if let RuleDecision::Decided(allowed) = eval.evaluate_for_roles(dir, &roles, resource, action) {
        return allowed;
    }

    // Both declarative lookups unavailable: conservative hard-coded grants,
    // action-agnostic, everything else denied.
    match resource {
        Resource::Imoveis => roles.contains(&Role::Gerente),
        Resource::Leads => roles.contains(&Role::Corretor),
        Resource::Atividades
        | Resource::Documentos
        | Resource::BaseConhecimento
        | Resource::Usuarios => false,
    }
}
