// Actor identity passed explicitly into every draft operation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// League role stored on a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Captain,
    Player,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Captain => "captain",
            Role::Player => "player",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Role::Owner),
            "captain" => Ok(Role::Captain),
            "player" => Ok(Role::Player),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// The caller of a draft operation, resolved once per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub profile_id: i64,
    pub role: Role,
}

impl Actor {
    pub fn new(profile_id: i64, role: Role) -> Self {
        Self { profile_id, role }
    }

    pub fn is_owner(&self) -> bool {
        self.role == Role::Owner
    }
}
