use std::fmt;
use std::str::FromStr;

use super::state_table;

state_table! {
    SpaceStatus {
        Enabled = 1 => "enabled",
        Disabled = 2 => "disabled",
    }
}

state_table! {
    /// Whether a role is built in or defined by the workspace owner.
    RoleType {
        System = 1 => "system",
        Custom = 2 => "custom",
    }
}

/// Built-in workspace roles, identified by fixed string ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SystemRole {
    SpaceOwner,
    SpaceAdmin,
    SpaceDeveloper,
    SpaceOperator,
    SpaceVisitor,
}

impl SystemRole {
    pub const ALL: [SystemRole; 5] = [
        SystemRole::SpaceOwner,
        SystemRole::SpaceAdmin,
        SystemRole::SpaceDeveloper,
        SystemRole::SpaceOperator,
        SystemRole::SpaceVisitor,
    ];

    /// The stored role id.
    pub fn id(self) -> &'static str {
        match self {
            SystemRole::SpaceOwner => "rs-1001",
            SystemRole::SpaceAdmin => "rs-1002",
            SystemRole::SpaceDeveloper => "rs-1003",
            SystemRole::SpaceOperator => "rs-1004",
            SystemRole::SpaceVisitor => "rs-1005",
        }
    }
}

impl fmt::Display for SystemRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Returned when a string is not a built-in role id.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown system role id: {0}")]
pub struct UnknownRoleId(pub String);

impl FromStr for SystemRole {
    type Err = UnknownRoleId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SystemRole::ALL
            .into_iter()
            .find(|role| role.id() == s)
            .ok_or_else(|| UnknownRoleId(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_role_ids() {
        assert_eq!(SystemRole::SpaceOwner.id(), "rs-1001");
        assert_eq!(SystemRole::SpaceVisitor.to_string(), "rs-1005");
        assert_eq!("rs-1003".parse::<SystemRole>(), Ok(SystemRole::SpaceDeveloper));
        assert!("rs-9999".parse::<SystemRole>().is_err());
    }

    #[test]
    fn test_space_status() {
        assert_eq!(SpaceStatus::try_from(2), Ok(SpaceStatus::Disabled));
        assert_eq!(RoleType::Custom.code(), 2);
    }
}
