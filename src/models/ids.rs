use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ids arrive as JSON numbers from some backends and as numeric strings from
/// others; both collapse to the canonical `i64` here.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

impl RawId {
    fn into_i64(self) -> Result<i64, String> {
        match self {
            RawId::Number(n) => Ok(n),
            RawId::Text(s) => s.trim().parse().map_err(|_| format!("invalid id '{}'", s)),
        }
    }
}

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                RawId::deserialize(deserializer)?
                    .into_i64()
                    .map($name)
                    .map_err(de::Error::custom)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                $name(id)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map($name)
            }
        }
    };
}

id_type!(
    /// Identity of a meetup row
    MeetupId
);
id_type!(
    /// Identity of a roster member
    MemberId
);
id_type!(
    /// Identity of a meetup/member attendee link row
    AttendeeLinkId
);

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("42" ; "json number")]
    #[test_case("\"42\"" ; "numeric string")]
    #[test_case("\" 42 \"" ; "padded string")]
    fn test_member_id_from_wire(json: &str) {
        let id: MemberId = serde_json::from_str(json).unwrap();
        assert_eq!(id, MemberId(42));
    }

    #[test]
    fn test_rejects_non_numeric_id() {
        assert!(serde_json::from_str::<MeetupId>("\"abc\"").is_err());
    }

    #[test]
    fn test_serializes_as_number() {
        assert_eq!(serde_json::to_string(&AttendeeLinkId(7)).unwrap(), "7");
    }
}
