//! Directory store: the persistence collaborator behind the authorization core.
//!
//! Tables are plain JSON arrays under the data root, read and rewritten whole on
//! each mutation. There are no derived caches; every read path re-derives from
//! the source tables, so a crash between two mutations leaves nothing stale.
//!
//! Files under the root:
//! - `users.json`                  user profiles + password hashes
//! - `role_assignments.json`       (user_id, role) pairs, unique
//! - `manager_relationships.json`  (manager_id, subordinate_id) pairs
//! - `permission_rules.json`       optional declarative rule table; a missing
//!   file means the deployment has no rule table provisioned, which is a
//!   different state from "present but empty".

use anyhow::{Context, Result, anyhow};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::authz::{Action, Resource, Role};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    pub user_id: String,
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub password_hash: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleAssignment {
    pub user_id: String,
    pub role: Role,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManagerRelationship {
    pub manager_id: String,
    pub subordinate_id: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PermissionRule {
    pub role: Role,
    pub resource: Resource,
    pub action: Action,
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// File-backed table store rooted at a data folder. All operations serialize
/// through an internal guard so read-modify-write cycles do not interleave.
#[derive(Debug)]
pub struct Directory {
    root: PathBuf,
    guard: Mutex<()>,
}

/// Cloneable shared handle, one per process (plus one per test store).
#[derive(Debug, Clone)]
pub struct SharedDirectory(pub Arc<Directory>);

impl SharedDirectory {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        Ok(Self(Arc::new(Directory::new(root)?)))
    }
}

impl Deref for SharedDirectory {
    type Target = Directory;
    fn deref(&self) -> &Directory {
        &self.0
    }
}

impl Directory {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create or access data root: {}", root.display()))?;
        Ok(Self { root, guard: Mutex::new(()) })
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    fn users_path(&self) -> PathBuf {
        self.root.join("users.json")
    }
    fn assignments_path(&self) -> PathBuf {
        self.root.join("role_assignments.json")
    }
    fn relationships_path(&self) -> PathBuf {
        self.root.join("manager_relationships.json")
    }
    fn rules_path(&self) -> PathBuf {
        self.root.join("permission_rules.json")
    }

    fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading table {}", path.display()))?;
        let rows: Vec<T> = serde_json::from_str(&raw)
            .with_context(|| format!("decoding table {}", path.display()))?;
        Ok(rows)
    }

    fn write_table<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).ok();
        }
        let raw = serde_json::to_string_pretty(rows)?;
        std::fs::write(path, raw).with_context(|| format!("writing table {}", path.display()))?;
        Ok(())
    }

    // ---- users ----

    /// Insert or replace the profile row for `user.user_id`.
    pub fn upsert_user(&self, user: UserRecord) -> Result<()> {
        let _g = self.guard.lock();
        let p = self.users_path();
        let mut rows: Vec<UserRecord> = Self::read_table(&p)?;
        rows.retain(|r| r.user_id != user.user_id);
        rows.push(user);
        Self::write_table(&p, &rows)
    }

    pub fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>> {
        let _g = self.guard.lock();
        let rows: Vec<UserRecord> = Self::read_table(&self.users_path())?;
        Ok(rows.into_iter().find(|r| r.user_id == user_id))
    }

    // ---- role assignments ----

    /// Role set for a user. Missing table or unknown user yields an empty set.
    /// Duplicates are collapsed here, not just at insert time, so a table file
    /// edited by hand still reads back with set semantics.
    pub fn roles_for_user(&self, user_id: &str) -> Result<Vec<Role>> {
        let _g = self.guard.lock();
        let rows: Vec<RoleAssignment> = Self::read_table(&self.assignments_path())?;
        let mut roles: Vec<Role> = Vec::new();
        for row in rows.into_iter().filter(|r| r.user_id == user_id) {
            if !roles.contains(&row.role) {
                roles.push(row.role);
            }
        }
        Ok(roles)
    }

    /// Insert an assignment. Returns `false` when the (user, role) pair already
    /// exists; the table keeps at most one row per pair.
    pub fn insert_role_assignment(&self, user_id: &str, role: Role) -> Result<bool> {
        let _g = self.guard.lock();
        let p = self.assignments_path();
        let mut rows: Vec<RoleAssignment> = Self::read_table(&p)?;
        if rows.iter().any(|r| r.user_id == user_id && r.role == role) {
            return Ok(false);
        }
        rows.push(RoleAssignment { user_id: user_id.to_string(), role, created_at: now_ms() });
        Self::write_table(&p, &rows)?;
        Ok(true)
    }

    /// Delete matching assignments; returns how many rows were removed.
    /// Deleting a non-existent assignment is not an error.
    pub fn delete_role_assignments(&self, user_id: &str, role: Role) -> Result<usize> {
        let _g = self.guard.lock();
        let p = self.assignments_path();
        let mut rows: Vec<RoleAssignment> = Self::read_table(&p)?;
        let before = rows.len();
        rows.retain(|r| !(r.user_id == user_id && r.role == role));
        let removed = before - rows.len();
        if removed > 0 {
            Self::write_table(&p, &rows)?;
        }
        Ok(removed)
    }

    // ---- manager relationships ----

    pub fn relationship_exists(&self, manager_id: &str, subordinate_id: &str) -> Result<bool> {
        let _g = self.guard.lock();
        let rows: Vec<ManagerRelationship> = Self::read_table(&self.relationships_path())?;
        Ok(rows
            .iter()
            .any(|r| r.manager_id == manager_id && r.subordinate_id == subordinate_id))
    }

    /// Manager of a subordinate, when one is recorded. If historical data holds
    /// several rows for the same subordinate, the first wins.
    pub fn manager_of(&self, subordinate_id: &str) -> Result<Option<String>> {
        let _g = self.guard.lock();
        let rows: Vec<ManagerRelationship> = Self::read_table(&self.relationships_path())?;
        Ok(rows
            .into_iter()
            .find(|r| r.subordinate_id == subordinate_id)
            .map(|r| r.manager_id))
    }

    pub fn subordinates_of(&self, manager_id: &str) -> Result<Vec<String>> {
        let _g = self.guard.lock();
        let rows: Vec<ManagerRelationship> = Self::read_table(&self.relationships_path())?;
        Ok(rows
            .into_iter()
            .filter(|r| r.manager_id == manager_id)
            .map(|r| r.subordinate_id)
            .collect())
    }

    pub fn insert_relationship(&self, manager_id: &str, subordinate_id: &str) -> Result<()> {
        if manager_id == subordinate_id {
            return Err(anyhow!("a user cannot be their own manager"));
        }
        let _g = self.guard.lock();
        let p = self.relationships_path();
        let mut rows: Vec<ManagerRelationship> = Self::read_table(&p)?;
        if rows
            .iter()
            .any(|r| r.manager_id == manager_id && r.subordinate_id == subordinate_id)
        {
            return Ok(());
        }
        rows.push(ManagerRelationship {
            manager_id: manager_id.to_string(),
            subordinate_id: subordinate_id.to_string(),
            created_at: now_ms(),
        });
        Self::write_table(&p, &rows)
    }

    /// Delete by both keys; returns rows removed (0 is a no-op success).
    pub fn delete_relationship(&self, manager_id: &str, subordinate_id: &str) -> Result<usize> {
        let _g = self.guard.lock();
        let p = self.relationships_path();
        let mut rows: Vec<ManagerRelationship> = Self::read_table(&p)?;
        let before = rows.len();
        rows.retain(|r| !(r.manager_id == manager_id && r.subordinate_id == subordinate_id));
        let removed = before - rows.len();
        if removed > 0 {
            Self::write_table(&p, &rows)?;
        }
        Ok(removed)
    }

    /// Remove every relationship in which the user is the subordinate. Used by
    /// replace-on-assign to keep a single active manager per subordinate.
    pub fn delete_relationships_by_subordinate(&self, subordinate_id: &str) -> Result<usize> {
        let _g = self.guard.lock();
        let p = self.relationships_path();
        let mut rows: Vec<ManagerRelationship> = Self::read_table(&p)?;
        let before = rows.len();
        rows.retain(|r| r.subordinate_id != subordinate_id);
        let removed = before - rows.len();
        if removed > 0 {
            Self::write_table(&p, &rows)?;
        }
        Ok(removed)
    }

    // ---- declarative permission rules ----

    /// The rule table, or `None` when the deployment has never provisioned one.
    pub fn rule_table(&self) -> Result<Option<Vec<PermissionRule>>> {
        let _g = self.guard.lock();
        let p = self.rules_path();
        if !p.exists() {
            return Ok(None);
        }
        let rows: Vec<PermissionRule> = Self::read_table(&p)?;
        Ok(Some(rows))
    }

    /// Install (or replace) the declarative rule table.
    pub fn provision_rule_table(&self, rules: &[PermissionRule]) -> Result<()> {
        let _g = self.guard.lock();
        Self::write_table(&self.rules_path(), rules)
    }
}
