//! Role and hierarchy mutator tests: uniqueness, idempotent removal,
//! replace-on-assign and the joined read projections.

use tempfile::tempdir;

use imobi::authz::{
    Role, assign_role, assign_user_to_manager, create_user, get_manager_subordinates,
    get_user_manager, remove_role, remove_user_from_manager,
};
use imobi::error::AppError;
use imobi::store::Directory;

fn fresh_dir() -> (tempfile::TempDir, Directory) {
    let tmp = tempdir().expect("tempdir");
    let dir = Directory::new(tmp.path()).expect("directory");
    (tmp, dir)
}

#[test]
fn duplicate_role_assignment_is_a_conflict() {
    let (_tmp, dir) = fresh_dir();
    assign_role(&dir, "bia", Role::Corretor).unwrap();

    let err = assign_role(&dir, "bia", Role::Corretor).unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }), "got {err:?}");
    // The role set is unchanged.
    assert_eq!(dir.roles_for_user("bia").unwrap(), vec![Role::Corretor]);
}

#[test]
fn a_user_may_hold_several_roles() {
    let (_tmp, dir) = fresh_dir();
    assign_role(&dir, "rui", Role::Gerente).unwrap();
    assign_role(&dir, "rui", Role::Corretor).unwrap();

    let roles = dir.roles_for_user("rui").unwrap();
    assert!(roles.contains(&Role::Gerente));
    assert!(roles.contains(&Role::Corretor));
    assert_eq!(roles.len(), 2);
}

#[test]
fn role_reads_collapse_duplicates_from_a_hand_edited_table() {
    let (tmp, dir) = fresh_dir();
    // Non-adjacent duplicate rows, as a hand-edited table file could hold.
    std::fs::write(
        tmp.path().join("role_assignments.json"),
        r#"[
            {"user_id":"bia","role":"corretor","created_at":0},
            {"user_id":"bia","role":"assistente","created_at":0},
            {"user_id":"bia","role":"corretor","created_at":0}
        ]"#,
    )
    .unwrap();

    assert_eq!(dir.roles_for_user("bia").unwrap(), vec![Role::Corretor, Role::Assistente]);
}

#[test]
fn remove_role_twice_is_idempotent() {
    let (_tmp, dir) = fresh_dir();
    assign_role(&dir, "bia", Role::Corretor).unwrap();
    assign_role(&dir, "bia", Role::Assistente).unwrap();

    remove_role(&dir, "bia", Role::Corretor).unwrap();
    let after_first = dir.roles_for_user("bia").unwrap();

    // Second removal succeeds and leaves the set exactly as after the first.
    remove_role(&dir, "bia", Role::Corretor).unwrap();
    assert_eq!(dir.roles_for_user("bia").unwrap(), after_first);
    assert_eq!(after_first, vec![Role::Assistente]);
}

#[test]
fn removing_a_role_never_held_is_a_no_op_success() {
    let (_tmp, dir) = fresh_dir();
    remove_role(&dir, "ghost", Role::Admin).unwrap();
    assert!(dir.roles_for_user("ghost").unwrap().is_empty());
}

#[test]
fn reassigning_a_manager_replaces_the_previous_one() {
    let (_tmp, dir) = fresh_dir();
    assign_user_to_manager(&dir, "rui", "bia").unwrap();
    assign_user_to_manager(&dir, "sol", "bia").unwrap();

    assert_eq!(dir.manager_of("bia").unwrap().as_deref(), Some("sol"));
    // The old edge is fully gone, not shadowed.
    assert!(!dir.relationship_exists("rui", "bia").unwrap());
    assert!(dir.subordinates_of("rui").unwrap().is_empty());
}

#[test]
fn self_management_is_rejected() {
    let (_tmp, dir) = fresh_dir();
    let err = assign_user_to_manager(&dir, "rui", "rui").unwrap_err();
    assert!(matches!(err, AppError::UserInput { .. }), "got {err:?}");
    assert!(dir.manager_of("rui").unwrap().is_none());
}

#[test]
fn removing_a_missing_relationship_is_a_no_op_success() {
    let (_tmp, dir) = fresh_dir();
    remove_user_from_manager(&dir, "rui", "bia").unwrap();

    assign_user_to_manager(&dir, "rui", "bia").unwrap();
    remove_user_from_manager(&dir, "rui", "bia").unwrap();
    remove_user_from_manager(&dir, "rui", "bia").unwrap();
    assert!(dir.manager_of("bia").unwrap().is_none());
}

#[test]
fn remove_relationship_matches_both_keys() {
    let (_tmp, dir) = fresh_dir();
    assign_user_to_manager(&dir, "rui", "bia").unwrap();

    // Wrong manager id: nothing happens.
    remove_user_from_manager(&dir, "sol", "bia").unwrap();
    assert_eq!(dir.manager_of("bia").unwrap().as_deref(), Some("rui"));
}

#[test]
fn subordinate_projection_joins_profile_and_roles() {
    let (_tmp, dir) = fresh_dir();
    create_user(&dir, "bia", "Beatriz Costa", Some("bia@imobi.example"), None, "s3cr3t").unwrap();
    create_user(&dir, "edu", "Eduardo Lima", None, Some("+55 11 98888-0000"), "s3cr3t").unwrap();
    assign_role(&dir, "bia", Role::Corretor).unwrap();
    assign_role(&dir, "edu", Role::Assistente).unwrap();
    assign_user_to_manager(&dir, "rui", "bia").unwrap();
    assign_user_to_manager(&dir, "rui", "edu").unwrap();
    // Subordinate without a profile row is skipped by the join.
    assign_user_to_manager(&dir, "rui", "ghost").unwrap();

    let mut team = get_manager_subordinates(&dir, "rui").unwrap();
    team.sort_by(|a, b| a.user_id.cmp(&b.user_id));
    assert_eq!(team.len(), 2);
    assert_eq!(team[0].user_id, "bia");
    assert_eq!(team[0].display_name, "Beatriz Costa");
    assert_eq!(team[0].email.as_deref(), Some("bia@imobi.example"));
    assert_eq!(team[0].roles, vec![Role::Corretor]);
    assert_eq!(team[1].user_id, "edu");
    assert_eq!(team[1].roles, vec![Role::Assistente]);
}

#[test]
fn manager_projection_for_managed_and_unmanaged_users() {
    let (_tmp, dir) = fresh_dir();
    create_user(&dir, "rui", "Rui Braga", None, None, "s3cr3t").unwrap();
    assign_role(&dir, "rui", Role::Gerente).unwrap();
    assign_user_to_manager(&dir, "rui", "bia").unwrap();

    let manager = get_user_manager(&dir, "bia").unwrap().expect("manager projection");
    assert_eq!(manager.user_id, "rui");
    assert_eq!(manager.display_name, "Rui Braga");
    assert_eq!(manager.roles, vec![Role::Gerente]);

    assert!(get_user_manager(&dir, "rui").unwrap().is_none());
}
