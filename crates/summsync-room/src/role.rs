//! The fixed set of tracked entities.

use std::fmt;
use std::str::FromStr;

use crate::RoomError;

/// One lane role whose summoner cooldown a room tracks.
///
/// The set is closed: every room holds exactly these five entities from
/// creation to teardown, which is why [`RoomState`](crate::RoomState)
/// stores them in a fixed-size array indexed by [`Role::index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Top,
    Jungle,
    Mid,
    Adc,
    Support,
}

impl Role {
    /// Number of roles in a room.
    pub const COUNT: usize = 5;

    /// All roles, in display order.
    pub const ALL: [Role; Role::COUNT] =
        [Role::Top, Role::Jungle, Role::Mid, Role::Adc, Role::Support];

    /// The key used on the wire and in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Top => "TOP",
            Self::Jungle => "JUNGLE",
            Self::Mid => "MID",
            Self::Adc => "ADC",
            Self::Support => "SUPPORT",
        }
    }

    /// Position of this role in [`Role::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = RoomError;

    /// Parses a wire key. Matching is exact: `"jungle"` is not a role.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| RoomError::UnknownEntityKey(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_matches_position_in_all() {
        for (i, role) in Role::ALL.into_iter().enumerate() {
            assert_eq!(role.index(), i);
        }
    }

    #[test]
    fn test_from_str_round_trips_every_role() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn test_from_str_rejects_unknown_key() {
        let err = "BARON".parse::<Role>().unwrap_err();
        assert!(matches!(err, RoomError::UnknownEntityKey(k) if k == "BARON"));
        assert!("jungle".parse::<Role>().is_err());
    }
}
