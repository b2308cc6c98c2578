//! Price history range tokens.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Range of price history requested from the combined quote endpoint.
///
/// Serialized with the wire tokens the backend expects (`1m`, `3m`, ...).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RangeToken {
    #[serde(rename = "1m")]
    OneMonth,
    #[default]
    #[serde(rename = "3m")]
    ThreeMonths,
    #[serde(rename = "6m")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "max")]
    Max,
}

impl RangeToken {
    /// Wire token understood by the backend.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneMonth => "1m",
            Self::ThreeMonths => "3m",
            Self::SixMonths => "6m",
            Self::OneYear => "1y",
            Self::Max => "max",
        }
    }

    /// All valid tokens, for error messages.
    #[must_use]
    pub fn all() -> &'static [RangeToken] {
        &[
            Self::OneMonth,
            Self::ThreeMonths,
            Self::SixMonths,
            Self::OneYear,
            Self::Max,
        ]
    }
}

impl fmt::Display for RangeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RangeToken {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1m" => Ok(Self::OneMonth),
            "3m" => Ok(Self::ThreeMonths),
            "6m" => Ok(Self::SixMonths),
            "1y" => Ok(Self::OneYear),
            "max" => Ok(Self::Max),
            other => Err(format!("invalid range token '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_wire_tokens() {
        for token in RangeToken::all() {
            assert_eq!(token.as_str().parse::<RangeToken>().unwrap(), *token);
        }
    }

    #[test]
    fn default_is_three_months() {
        assert_eq!(RangeToken::default(), RangeToken::ThreeMonths);
    }

    #[test]
    fn rejects_unknown_token() {
        assert!("7w".parse::<RangeToken>().is_err());
    }
}
