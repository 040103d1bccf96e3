//! MAC address parsing and formatting.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MacParseError {
    #[error("expected 6 octets separated by ':' or '-', got '{0}'")]
    BadFormat(String),
    #[error("mixed separators in '{0}'")]
    MixedSeparators(String),
    #[error("invalid hex octet '{0}'")]
    BadOctet(String),
}

/// Hardware address of a client NIC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Find the first MAC-shaped token in free-form text (e.g. `arp -n` output).
    pub fn find_in(text: &str) -> Option<MacAddress> {
        text.split(|c: char| c.is_whitespace() || c == '(' || c == ')' || c == ',')
            .find_map(|token| token.parse().ok())
    }
}

impl FromStr for MacAddress {
    type Err = MacParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let sep = if s.contains(':') { ':' } else { '-' };
        if s.contains(':') && s.contains('-') {
            return Err(MacParseError::MixedSeparators(s.to_string()));
        }

        let parts: Vec<&str> = s.split(sep).collect();
        if parts.len() != 6 {
            return Err(MacParseError::BadFormat(s.to_string()));
        }

        let mut out = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            if part.len() != 2 || !part.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(MacParseError::BadOctet(part.to_string()));
            }
            out[i] = u8::from_str_radix(part, 16)
                .map_err(|_| MacParseError::BadOctet(part.to_string()))?;
        }
        Ok(MacAddress(out))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}", a, b, c, d, e, g)
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
