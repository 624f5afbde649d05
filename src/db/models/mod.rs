pub mod transaction;

/// Implements the shared plumbing for a Discord snowflake id newtype.
///
/// Snowflakes arrive as decimal strings on the wire and are stored as `INTEGER` in sqlite; every
/// snowflake Discord issues fits in an `i64`.
#[macro_export]
macro_rules! impl_snowflake {
    ($ident:ident) => {
        impl ::core::fmt::Display for $ident {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $ident {
            type Err = ::core::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<i64>().map($ident)
            }
        }

        impl TryFrom<String> for $ident {
            type Error = ::core::num::ParseIntError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$ident> for String {
            fn from(value: $ident) -> Self {
                value.0.to_string()
            }
        }
    };
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
    sqlx::Type,
)]
#[serde(try_from = "String", into = "String")]
#[sqlx(transparent)]
pub struct UserId(pub i64);

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
    sqlx::Type,
)]
#[serde(try_from = "String", into = "String")]
#[sqlx(transparent)]
pub struct GuildId(pub i64);

/// Roles are never persisted; the id only travels between the interaction payload and the member
/// listing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct RoleId(pub i64);

impl_snowflake!(UserId);
impl_snowflake!(GuildId);
impl_snowflake!(RoleId);

impl RoleId {
    /// The `@everyone` role shares its id with the guild it belongs to.
    pub fn is_everyone(&self, guild_id: GuildId) -> bool {
        self.0 == guild_id.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_snowflake_serde() {
        let id: UserId = serde_json::from_str(r#""175928847299117063""#).unwrap();
        assert_eq!(id, UserId(175928847299117063));
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""175928847299117063""#);

        assert!(serde_json::from_str::<GuildId>(r#""not-a-snowflake""#).is_err());
    }

    #[test]
    fn test_everyone_role() {
        let guild = GuildId(81384788765712384);
        assert!(RoleId(81384788765712384).is_everyone(guild));
        assert!(!RoleId(81384788765712385).is_everyone(guild));
    }
}
