use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use duet_common::{Error, Result};

/// Glare-resolution role of the local endpoint.
///
/// Both endpoints derive their role from the same pair of identifiers, so
/// exactly one side is polite without any extra round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationRole {
    /// Yields to a colliding remote offer.
    Polite,
    /// Keeps its own offer and drops a colliding remote one.
    Impolite,
}

impl NegotiationRole {
    /// The endpoint with the lexicographically smaller id is polite.
    pub fn assign(local_id: &str, remote_id: &str) -> Result<Self> {
        match local_id.cmp(remote_id) {
            Ordering::Less => Ok(Self::Polite),
            Ordering::Greater => Ok(Self::Impolite),
            Ordering::Equal => Err(Error::config(format!(
                "local and remote endpoint ids are both {local_id:?}; roles cannot be assigned"
            ))),
        }
    }

    pub fn is_polite(self) -> bool {
        self == Self::Polite
    }
}

impl fmt::Display for NegotiationRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Polite => f.write_str("polite"),
            Self::Impolite => f.write_str("impolite"),
        }
    }
}

impl FromStr for NegotiationRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "polite" => Ok(Self::Polite),
            "impolite" => Ok(Self::Impolite),
            other => Err(Error::config(format!(
                "unknown negotiation role {other:?}; expected polite or impolite"
            ))),
        }
    }
}
