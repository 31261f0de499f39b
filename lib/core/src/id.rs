//! Typed identifiers for users, mantras and installations.
//!
//! Ids wrap a ULID, serialize as the bare ULID, and display with a short
//! prefix (`usr_...`). Parsing accepts either form.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::{DecodeError, Ulid};

macro_rules! prefixed_ulid {
    ($(#[$meta:meta])* $name:ident => $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Ulid);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "_{}"), self.0)
            }
        }

        impl FromStr for $name {
            type Err = DecodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);
                Ulid::from_string(raw).map(Self)
            }
        }
    };
}

prefixed_ulid!(
    /// The user a mantra is installed for.
    UserId => "usr"
);
prefixed_ulid!(
    /// A reusable automation template.
    MantraId => "mnt"
);
prefixed_ulid!(
    /// One installation of a mantra for one user.
    InstallationId => "inst"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_form_round_trips() {
        let id = MantraId::new();
        let shown = id.to_string();
        assert!(shown.starts_with("mnt_"));
        assert_eq!(shown.parse::<MantraId>().unwrap(), id);
        assert!(UserId::new().to_string().starts_with("usr_"));
    }

    #[test]
    fn serializes_as_bare_ulid() {
        let id = InstallationId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert!(!json.contains("inst_"));
        let bare: String = serde_json::from_str(&json).unwrap();
        assert_eq!(bare.parse::<InstallationId>().unwrap(), id);
    }

    #[test]
    fn foreign_prefix_is_rejected() {
        assert!(UserId::new().to_string().parse::<MantraId>().is_err());
    }
}
