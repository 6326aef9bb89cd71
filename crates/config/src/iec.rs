// SPDX-License-Identifier: Apache-2.0

//! Support for IEC-suffixed integers like `"4K"`, `"16 M"`, `"1G"` in
//! configuration files.

use crate::error::Error;
use regex::Regex;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;
use std::sync::LazyLock;

static IEC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s?([KMGTkmgt]?)$").expect("IEC literal pattern is valid")
});

/// An unsigned integer that deserializes from either a plain number or a
/// string with an optional single-letter IEC suffix.
///
/// The suffix grammar is `^(\d+)\s?([KMGT]?)$`, case-insensitive, with
/// multipliers 1, 2^10, 2^20, 2^30 and 2^40. Anything else fails
/// deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IecInt(u64);

impl IecInt {
    /// Creates an `IecInt` holding `value`.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The plain integer value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<IecInt> for u64 {
    fn from(value: IecInt) -> Self {
        value.0
    }
}

impl From<u64> for IecInt {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for IecInt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for IecInt {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let captures = IEC_RE
            .captures(trimmed)
            .ok_or_else(|| Error::InvalidIecLiteral {
                literal: s.to_owned(),
            })?;
        let digits = &captures[1];
        let value: u64 = digits.parse().map_err(|_| Error::InvalidIecLiteral {
            literal: s.to_owned(),
        })?;
        let multiplier: u64 = match captures[2].to_ascii_uppercase().as_str() {
            "K" => 1 << 10,
            "M" => 1 << 20,
            "G" => 1 << 30,
            "T" => 1 << 40,
            _ => 1,
        };
        value
            .checked_mul(multiplier)
            .map(Self)
            .ok_or_else(|| Error::InvalidIecLiteral {
                literal: s.to_owned(),
            })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Value {
    Number(u64),
    String(String),
}

impl<'de> Deserialize<'de> for IecInt {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Number(value) => Ok(Self(value)),
            Value::String(text) => text.parse().map_err(DeError::custom),
        }
    }
}

impl Serialize for IecInt {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(self.0)
    }
}
