//! Role and hierarchy administration: the mutators behind the user-admin
//! screens, plus the read projections they display.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::authz::Role;
use crate::error::{AppError, AppResult};
use crate::identity::hash_password;
use crate::store::{Directory, UserRecord};

/// Row shape for team listings: profile joined with the current role set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamMember {
    pub user_id: String,
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub roles: Vec<Role>,
}

/// Create or replace a user profile. The password is stored as an Argon2 PHC
/// string; role assignments are managed separately.
pub fn create_user(
    dir: &Directory,
    user_id: &str,
    display_name: &str,
    email: Option<&str>,
    phone: Option<&str>,
    password: &str,
) -> AppResult<()> {
    if user_id.trim().is_empty() {
        return Err(AppError::user("empty_user_id", "user id must not be empty"));
    }
    let password_hash = hash_password(password)?;
    dir.upsert_user(UserRecord {
        user_id: user_id.to_string(),
        display_name: display_name.to_string(),
        email: email.map(str::to_string),
        phone: phone.map(str::to_string),
        password_hash,
        created_at: Utc::now().timestamp_millis(),
    })?;
    Ok(())
}

/// Grant a role. A duplicate (user, role) pair is rejected with a conflict;
/// callers surface it without treating it as fatal.
pub fn assign_role(dir: &Directory, user_id: &str, role: Role) -> AppResult<()> {
    let inserted = dir.insert_role_assignment(user_id, role)?;
    if !inserted {
        return Err(AppError::conflict(
            "role_already_assigned".to_string(),
            format!("user '{}' already holds role '{}'", user_id, role),
        ));
    }
    Ok(())
}

/// Revoke a role. Removing an assignment that does not exist succeeds and
/// changes nothing.
pub fn remove_role(dir: &Directory, user_id: &str, role: Role) -> AppResult<()> {
    dir.delete_role_assignments(user_id, role)?;
    Ok(())
}

/// Put a subordinate under a manager. Replace-on-assign: any previous manager
/// relationship of the subordinate is removed in the same operation, so a
/// subordinate never holds two active managers. Self-management is rejected.
/// Relationships are not removed when a role is later revoked; hierarchy edits
/// stay explicit.
pub fn assign_user_to_manager(
    dir: &Directory,
    manager_id: &str,
    subordinate_id: &str,
) -> AppResult<()> {
    if manager_id == subordinate_id {
        return Err(AppError::user(
            "self_manager",
            "a user cannot be assigned as their own manager",
        ));
    }
    dir.delete_relationships_by_subordinate(subordinate_id)?;
    dir.insert_relationship(manager_id, subordinate_id)?;
    Ok(())
}

/// Remove the relationship matching both keys; a missing relationship is a
/// no-op success.
pub fn remove_user_from_manager(
    dir: &Directory,
    manager_id: &str,
    subordinate_id: &str,
) -> AppResult<()> {
    dir.delete_relationship(manager_id, subordinate_id)?;
    Ok(())
}

fn member_for(dir: &Directory, user_id: &str) -> AppResult<Option<TeamMember>> {
    let Some(profile) = dir.find_user(user_id)? else {
        return Ok(None);
    };
    let roles = dir.roles_for_user(user_id)?;
    Ok(Some(TeamMember {
        user_id: profile.user_id,
        display_name: profile.display_name,
        email: profile.email,
        phone: profile.phone,
        roles,
    }))
}

/// Direct reports of a manager, joined with profile and role data. Subordinate
/// ids without a profile row are skipped (inner-join semantics).
pub fn get_manager_subordinates(dir: &Directory, manager_id: &str) -> AppResult<Vec<TeamMember>> {
    let mut members = Vec::new();
    for sub_id in dir.subordinates_of(manager_id)? {
        if let Some(member) = member_for(dir, &sub_id)? {
            members.push(member);
        }
    }
    Ok(members)
}

/// The user's manager as a joined projection, `None` when unmanaged or when
/// the manager has no profile row.
pub fn get_user_manager(dir: &Directory, user_id: &str) -> AppResult<Option<TeamMember>> {
    let Some(manager_id) = dir.manager_of(user_id)? else {
        return Ok(None);
    };
    member_for(dir, &manager_id)
}
