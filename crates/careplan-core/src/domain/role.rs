use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Clinic role of the current user
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    Doctor,
    Staff,
    Reception,
    /// Any role string the clinic has not defined
    Other(String),
}

impl Role {
    /// Only admins and doctors may change treatment plans
    pub fn can_edit_plans(&self) -> bool {
        matches!(self, Role::Admin | Role::Doctor)
    }

    /// Lowercase name of the role
    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::Doctor => "doctor",
            Role::Staff => "staff",
            Role::Reception => "reception",
            Role::Other(name) => name,
        }
    }
}

impl FromStr for Role {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let role = match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Role::Admin,
            "doctor" => Role::Doctor,
            "staff" => Role::Staff,
            "reception" => Role::Reception,
            _ => Role::Other(s.trim().to_string()),
        };
        Ok(role)
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(role) => role,
            Err(never) => match never {},
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authenticated user as supplied by the session collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: i64,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn can_edit_plans(&self) -> bool {
        self.role.can_edit_plans()
    }
}
