//! Authorization core: the sole access-decision surface of the CRM backend.
//! All other modules route permission and data-visibility checks through here
//! instead of reading the role or relationship tables directly.

mod admin;
mod resolver;
mod role;
mod rules;
mod scope;

pub use admin::{
    TeamMember, assign_role, assign_user_to_manager, create_user, get_manager_subordinates,
    get_user_manager, remove_role, remove_user_from_manager,
};
pub use resolver::{has_permission, has_permission_for_session};
pub use role::{Action, ParseVocabError, Resource, Role};
pub use rules::{RuleDecision, RuleEvaluator, StoredRuleEvaluator};
pub use scope::can_access_user_data;
