//! Declarative permission rules and the strategy signal used by the resolver.
//!
//! A deployment may or may not carry a rule table. "No table" is a service
//! state, not a verdict: the resolver falls through to its next strategy on
//! `Unavailable`, while `Decided(false)` is an authoritative deny.

use crate::authz::{Action, Resource, Role};
use crate::store::Directory;

/// Outcome of one resolution strategy. `Unavailable` means "ask the next
/// strategy", never "deny".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleDecision {
    Decided(bool),
    Unavailable,
}

/// Declarative lookup seam. Two variants mirror the two remote procedures a
/// deployment may expose: one resolving roles from the user id itself, one
/// taking an already-fetched role set. Either may be unavailable.
pub trait RuleEvaluator: Send + Sync {
    fn evaluate_for_user(
        &self,
        dir: &Directory,
        user_id: &str,
        resource: Resource,
        action: Action,
    ) -> RuleDecision;

    fn evaluate_for_roles(
        &self,
        dir: &Directory,
        roles: &[Role],
        resource: Resource,
        action: Action,
    ) -> RuleDecision;
}

/// Evaluator backed by the store's optional `permission_rules` table.
///
/// Missing table => `Unavailable`. Present table => `Decided(any rule grants
/// one of the held roles)`; an empty or non-matching table is a real deny.
/// Storage errors during the lookup also degrade to `Unavailable` so the
/// resolver can fall back rather than fail the check outright.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoredRuleEvaluator;

impl StoredRuleEvaluator {
    fn lookup(dir: &Directory, roles: &[Role], resource: Resource, action: Action) -> RuleDecision {
        match dir.rule_table() {
            Ok(Some(rules)) => RuleDecision::Decided(rules.iter().any(|rule| {
                rule.resource == resource && rule.action == action && roles.contains(&rule.role)
            })),
            Ok(None) => RuleDecision::Unavailable,
            Err(e) => {
                tracing::warn!(target: "authz", "rule table lookup failed, treating as unavailable: {}", e);
                RuleDecision::Unavailable
            }
        }
    }
}

impl RuleEvaluator for StoredRuleEvaluator {
    fn evaluate_for_user(
        &self,
        dir: &Directory,
        user_id: &str,
        resource: Resource,
        action: Action,
    ) -> RuleDecision {
        let roles = match dir.roles_for_user(user_id) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(target: "authz", "role fetch failed during rule evaluation: {}", e);
                return RuleDecision::Unavailable;
            }
        };
        Self::lookup(dir, &roles, resource, action)
    }

    fn evaluate_for_roles(
        &self,
        dir: &Directory,
        roles: &[Role],
        resource: Resource,
        action: Action,
    ) -> RuleDecision {
        Self::lookup(dir, roles, resource, action)
    }
}
