use core::str::FromStr;

use crate::commands::{Caller, Reply};

pub const MISSING_ADMINISTRATOR: &str =
    "You need the Administrator permission to use this command.";

/// Discord permission bitfield as sent alongside each interaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Permissions(pub u64);

impl Permissions {
    pub const ADMINISTRATOR: Permissions = Permissions(1 << 3);

    pub fn contains(&self, other: Permissions) -> bool {
        self.0 & other.0 == other.0
    }
}

impl FromStr for Permissions {
    type Err = core::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(Permissions)
    }
}

/// Precondition for admin-only commands; the returned reply is sent instead of running the
/// handler.
pub fn require_admin(caller: &Caller) -> Result<(), Reply> {
    if caller.permissions.contains(Permissions::ADMINISTRATOR) {
        return Ok(());
    }

    tracing::warn!(caller = %caller.id, "admin-only command rejected");
    Err(Reply::ephemeral(MISSING_ADMINISTRATOR))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db::prelude::UserId;

    #[test]
    fn test_require_admin() {
        let admin = Caller {
            id: UserId(1),
            permissions: "2147483656".parse().unwrap(), // ADMINISTRATOR | USE_APPLICATION_COMMANDS
        };
        assert!(require_admin(&admin).is_ok());

        let member = Caller {
            id: UserId(2),
            permissions: "2147483648".parse().unwrap(),
        };
        let rejection = require_admin(&member).unwrap_err();
        assert!(rejection.is_ephemeral());
        assert_eq!(rejection.content.as_deref(), Some(MISSING_ADMINISTRATOR));
    }
}
