//! Channel identifiers.

use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// Name of one sub-series of the signal (one sensor lead), e.g. `A3`.
///
/// Identifiers are non-empty, at most [`ChannelId::MAX_LEN`] bytes and free
/// of control characters. The set of channels is configured at startup; the
/// defaults are [`ChannelId::a3`] and [`ChannelId::a4`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct ChannelId(String);

impl ChannelId {
    /// Maximum identifier length in bytes.
    pub const MAX_LEN: usize = 64;

    /// Validate and wrap a channel identifier.
    pub fn new(id: impl Into<String>) -> Result<Self, ChannelError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ChannelError::Empty);
        }
        if id.len() > Self::MAX_LEN {
            return Err(ChannelError::TooLong {
                len: id.len(),
                max: Self::MAX_LEN,
            });
        }
        if id.chars().any(char::is_control) {
            return Err(ChannelError::ControlCharacter);
        }
        Ok(Self(id))
    }

    /// The `A3` lead.
    pub fn a3() -> Self {
        Self("A3".to_string())
    }

    /// The `A4` lead.
    pub fn a4() -> Self {
        Self("A4".to_string())
    }

    /// The channels active when nothing else is configured.
    pub fn defaults() -> Vec<Self> {
        vec![Self::a3(), Self::a4()]
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ChannelId {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ChannelId {
    type Error = ChannelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ChannelId> for String {
    fn from(id: ChannelId) -> Self {
        id.0
    }
}

impl AsRef<str> for ChannelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn printable_identifiers_round_trip(id in "[A-Za-z0-9_ .-]{1,64}") {
            let channel = ChannelId::new(id.clone()).unwrap();
            prop_assert_eq!(channel.as_str(), id.as_str());
        }
    }
}
