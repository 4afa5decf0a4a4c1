//! Permission resolver integration tests: the strategy chain over a real
//! directory store, with and without a provisioned declarative rule table.

use tempfile::tempdir;

use imobi::authz::{
    Action, Resource, Role, StoredRuleEvaluator, assign_role, has_permission, remove_role,
};
use imobi::store::{Directory, PermissionRule};

fn fresh_dir() -> (tempfile::TempDir, Directory) {
    let tmp = tempdir().expect("tempdir");
    let dir = Directory::new(tmp.path()).expect("directory");
    (tmp, dir)
}

#[test]
fn admin_is_allowed_everything() {
    let (_tmp, dir) = fresh_dir();
    assign_role(&dir, "root", Role::Admin).unwrap();

    for resource in Resource::ALL {
        for action in Action::ALL {
            assert!(
                has_permission(&dir, &StoredRuleEvaluator, "root", resource, action),
                "admin must be allowed on {}/{}",
                resource,
                action
            );
        }
    }
}

#[test]
fn user_without_roles_is_denied_everything() {
    let (_tmp, dir) = fresh_dir();

    for resource in Resource::ALL {
        for action in Action::ALL {
            assert!(
                !has_permission(&dir, &StoredRuleEvaluator, "nobody", resource, action),
                "roleless user must be denied on {}/{}",
                resource,
                action
            );
        }
    }
}

#[test]
fn gerente_without_rule_table_gets_imoveis_only() {
    let (_tmp, dir) = fresh_dir();
    assign_role(&dir, "rui", Role::Gerente).unwrap();

    assert!(has_permission(&dir, &StoredRuleEvaluator, "rui", Resource::Imoveis, Action::Delete));
    assert!(!has_permission(&dir, &StoredRuleEvaluator, "rui", Resource::Leads, Action::Delete));
}

#[test]
fn corretor_without_rule_table_gets_leads_only() {
    let (_tmp, dir) = fresh_dir();
    assign_role(&dir, "bia", Role::Corretor).unwrap();

    assert!(has_permission(&dir, &StoredRuleEvaluator, "bia", Resource::Leads, Action::Update));
    assert!(!has_permission(&dir, &StoredRuleEvaluator, "bia", Resource::Imoveis, Action::Update));
}

#[test]
fn assistente_without_rule_table_is_denied_everything() {
    let (_tmp, dir) = fresh_dir();
    assign_role(&dir, "ana", Role::Assistente).unwrap();

    for resource in Resource::ALL {
        for action in Action::ALL {
            assert!(!has_permission(&dir, &StoredRuleEvaluator, "ana", resource, action));
        }
    }
}

#[test]
fn removing_the_granting_role_flips_the_next_check_to_deny() {
    let (_tmp, dir) = fresh_dir();
    assign_role(&dir, "bia", Role::Corretor).unwrap();
    assert!(has_permission(&dir, &StoredRuleEvaluator, "bia", Resource::Leads, Action::View));

    remove_role(&dir, "bia", Role::Corretor).unwrap();
    assert!(!has_permission(&dir, &StoredRuleEvaluator, "bia", Resource::Leads, Action::View));
}

#[test]
fn provisioned_rule_table_is_authoritative_over_heuristics() {
    let (_tmp, dir) = fresh_dir();
    assign_role(&dir, "rui", Role::Gerente).unwrap();
    dir.provision_rule_table(&[PermissionRule {
        role: Role::Gerente,
        resource: Resource::Atividades,
        action: Action::View,
    }])
    .unwrap();

    // Grant that only exists declaratively.
    assert!(has_permission(&dir, &StoredRuleEvaluator, "rui", Resource::Atividades, Action::View));
    // With the table present its deny is final; the imoveis heuristic must not run.
    assert!(!has_permission(&dir, &StoredRuleEvaluator, "rui", Resource::Imoveis, Action::Delete));
}

#[test]
fn empty_rule_table_denies_non_admins_everywhere() {
    let (_tmp, dir) = fresh_dir();
    assign_role(&dir, "rui", Role::Gerente).unwrap();
    assign_role(&dir, "root", Role::Admin).unwrap();
    dir.provision_rule_table(&[]).unwrap();

    assert!(!has_permission(&dir, &StoredRuleEvaluator, "rui", Resource::Imoveis, Action::View));
    // Admin bypass sits above the declarative path.
    assert!(has_permission(&dir, &StoredRuleEvaluator, "root", Resource::Imoveis, Action::View));
}

#[test]
fn rules_match_on_the_full_role_resource_action_triple() {
    let (_tmp, dir) = fresh_dir();
    assign_role(&dir, "ana", Role::Assistente).unwrap();
    dir.provision_rule_table(&[PermissionRule {
        role: Role::Assistente,
        resource: Resource::Documentos,
        action: Action::View,
    }])
    .unwrap();

    assert!(has_permission(&dir, &StoredRuleEvaluator, "ana", Resource::Documentos, Action::View));
    assert!(!has_permission(&dir, &StoredRuleEvaluator, "ana", Resource::Documentos, Action::Delete));
    assert!(!has_permission(&dir, &StoredRuleEvaluator, "ana", Resource::Leads, Action::View));
}
