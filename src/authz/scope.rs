//! Record-level access scoping: may this actor see that user's data?
//!
//! Ownership and hierarchy decide, not a single global flag. Ordered rules,
//! first applicable wins; any lookup failure is logged and denies.

use std::panic::{AssertUnwindSafe, catch_unwind};

use anyhow::Result;
use tracing::warn;

use crate::authz::Role;
use crate::store::Directory;

/// Whether `actor_id` may view or modify `target_id`'s data.
///
/// 1. self-access is always allowed
/// 2. admin sees everyone
/// 3. a gerente sees their direct reports
/// 4. a corretor sees: (a) a target they hold the manager side of a
///    relationship with — the lookup is keyed (actor, target) here, same order
///    as the gerente rule; (b) any peer sharing the same manager
/// 5. everyone else: deny
pub fn can_access_user_data(dir: &Directory, actor_id: &str, target_id: &str) -> bool {
    let outcome = catch_unwind(AssertUnwindSafe(|| decide(dir, actor_id, target_id)));
    match outcome {
        Ok(Ok(allowed)) => allowed,
        Ok(Err(e)) => {
            warn!(target: "authz", "access scoping failed for actor={} target={}, denying: {}",
                actor_id, target_id, e);
            false
        }
        Err(_) => {
            warn!(target: "authz", "access scoping panicked for actor={} target={}, denying",
                actor_id, target_id);
            false
        }
    }
}

fn decide(dir: &Directory, actor_id: &str, target_id: &str) -> Result<bool> {
    if actor_id == target_id {
        return Ok(true);
    }

    let roles = dir.roles_for_user(actor_id)?;
    if roles.contains(&Role::Admin) {
        return Ok(true);
    }

    if roles.contains(&Role::Gerente) && dir.relationship_exists(actor_id, target_id)? {
        return Ok(true);
    }

    if roles.contains(&Role::Corretor) {
        if dir.relationship_exists(actor_id, target_id)? {
            return Ok(true);
        }
        // Same-manager peers see each other, in both directions.
        if let (Some(actor_mgr), Some(target_mgr)) =
            (dir.manager_of(actor_id)?, dir.manager_of(target_id)?)
        {
            if actor_mgr == target_mgr {
                return Ok(true);
            }
        }
    }

    Ok(false)
}
