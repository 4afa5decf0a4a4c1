//! Closed vocabularies for authorization decisions.
//!
//! Roles, resources and actions arrive at the HTTP boundary as strings and are
//! parsed into these enums before any decision logic runs, so the resolvers can
//! match exhaustively and an unknown string is a 400, never a silent deny deep
//! in the chain.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Gerente,
    Corretor,
    Assistente,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Gerente, Role::Corretor, Role::Assistente];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Gerente => "gerente",
            Role::Corretor => "corretor",
            Role::Assistente => "assistente",
        }
    }
}

impl FromStr for Role {
    type Err = ParseVocabError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "gerente" => Ok(Role::Gerente),
            "corretor" => Ok(Role::Corretor),
            "assistente" => Ok(Role::Assistente),
            other => Err(ParseVocabError { kind: "role", value: other.to_string() }),
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CRM surfaces a permission can be scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Leads,
    Imoveis,
    Atividades,
    Documentos,
    BaseConhecimento,
    Usuarios,
}

impl Resource {
    pub const ALL: [Resource; 6] = [
        Resource::Leads,
        Resource::Imoveis,
        Resource::Atividades,
        Resource::Documentos,
        Resource::BaseConhecimento,
        Resource::Usuarios,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Leads => "leads",
            Resource::Imoveis => "imoveis",
            Resource::Atividades => "atividades",
            Resource::Documentos => "documentos",
            Resource::BaseConhecimento => "base_conhecimento",
            Resource::Usuarios => "usuarios",
        }
    }
}

impl FromStr for Resource {
    type Err = ParseVocabError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "leads" => Ok(Resource::Leads),
            "imoveis" => Ok(Resource::Imoveis),
            "atividades" => Ok(Resource::Atividades),
            "documentos" => Ok(Resource::Documentos),
            "base_conhecimento" => Ok(Resource::BaseConhecimento),
            "usuarios" => Ok(Resource::Usuarios),
            other => Err(ParseVocabError { kind: "resource", value: other.to_string() }),
        }
    }
}

impl Display for Resource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    View,
    Create,
    Update,
    Delete,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::View, Action::Create, Action::Update, Action::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl FromStr for Action {
    type Err = ParseVocabError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "view" => Ok(Action::View),
            "create" => Ok(Action::Create),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            other => Err(ParseVocabError { kind: "action", value: other.to_string() }),
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ParseVocabError {
    pub kind: &'static str,
    pub value: String,
}

impl Display for ParseVocabError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown {}: '{}'", self.kind, self.value)
    }
}

impl std::error::Error for ParseVocabError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("GERENTE".parse::<Role>().unwrap(), Role::Gerente);
        assert_eq!(" Imoveis ".parse::<Resource>().unwrap(), Resource::Imoveis);
        assert_eq!("DELETE".parse::<Action>().unwrap(), Action::Delete);
    }

    #[test]
    fn rejects_unknown_vocabulary() {
        assert!("superuser".parse::<Role>().is_err());
        assert!("contratos".parse::<Resource>().is_err());
        assert!("approve".parse::<Action>().is_err());
    }

    #[test]
    fn round_trips_through_as_str() {
        for r in Role::ALL {
            assert_eq!(r.as_str().parse::<Role>().unwrap(), r);
        }
        for r in Resource::ALL {
            assert_eq!(r.as_str().parse::<Resource>().unwrap(), r);
        }
        for a in Action::ALL {
            assert_eq!(a.as_str().parse::<Action>().unwrap(), a);
        }
    }
}
