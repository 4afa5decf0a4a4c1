use serde::{Deserialize, Serialize};

use crate::authz::Role;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attrs {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
}

/// Authenticated identity carried by a session: the user id plus a snapshot of
/// the role set taken at login. Authorization checks re-fetch roles from the
/// store; the snapshot here is informational (display, logging).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub attrs: Attrs,
}
