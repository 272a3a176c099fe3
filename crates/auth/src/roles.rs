use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role identifier used for access decisions.
///
/// The set is closed and ordered by [`Role::weight`]. Roles do
/// not implement `PartialOrd`: every comparison goes through the weight table
/// so that declaration order can never leak into a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Password accepted, second factor still outstanding.
    PartiallyLoggedIn,
    User,
    SupportModerator,
    Admin,
    RootAdmin,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl Role {
    /// Every role, lowest weight first.
    pub const ALL: [Role; 5] = [
        Role::PartiallyLoggedIn,
        Role::User,
        Role::SupportModerator,
        Role::Admin,
        Role::RootAdmin,
    ];

    /// Authorization weight. Strictly increasing along [`Role::ALL`].
    pub const fn weight(self) -> u8 {
        match self {
            Role::PartiallyLoggedIn => 1,
            Role::User => 2,
            Role::SupportModerator => 3,
            Role::Admin => 4,
            Role::RootAdmin => 5,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Role::PartiallyLoggedIn => "partially_logged_in",
            Role::User => "user",
            Role::SupportModerator => "support_moderator",
            Role::Admin => "admin",
            Role::RootAdmin => "root_admin",
        }
    }
}

/// Free-function form of [`Role::weight`].
pub fn weight_of(role: Role) -> u8 {
    role.weight()
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
