//! Address normalization for the connect prompt.
//!
//! Turns raw text typed into the address field into a canonical IPv4
//! dotted-quad, or rejects it. Normalization is pure: it never touches the
//! network, so it can run on every keystroke.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix prepended to a bare octet (`"5"` becomes `"192.168.1.5"`).
pub const DEFAULT_SUBNET_PREFIX: &str = "192.168.1.";

/// Well-known port the mobile app listens on.
pub const DEFAULT_PORT: u16 = 19621;

/// Full-width ideographic full stop, typed by IMEs without an ASCII period.
const FULL_WIDTH_PERIOD: char = '。';

/// Errors from address normalization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressRejected {
    /// Nothing left after trimming.
    #[error("address is empty")]
    Empty,

    /// Wrong number of dot-separated parts.
    #[error("expected 4 octets, found {found}")]
    OctetCount {
        /// Number of parts found.
        found: usize,
    },

    /// An octet is not 1-3 decimal digits in 0..=255.
    #[error("invalid octet {octet:?}")]
    InvalidOctet {
        /// The offending octet text.
        octet: String,
    },
}

/// A normalized IPv4 address string, only obtainable through [`normalize`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ValidAddress(String);

impl ValidAddress {
    /// The canonical dotted-quad text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ValidAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ValidAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ValidAddress {
    type Error = AddressRejected;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        normalize(&value)
    }
}

impl From<ValidAddress> for String {
    fn from(addr: ValidAddress) -> Self {
        addr.0
    }
}

/// Normalize raw user input into a [`ValidAddress`].
///
/// Rules, in order:
/// 1. trim surrounding whitespace
/// 2. replace every full-width period with `.`
/// 3. a value without any `.` is a single octet under [`DEFAULT_SUBNET_PREFIX`]
/// 4. validate as a strict dotted-quad
pub fn normalize(raw: &str) -> Result<ValidAddress, AddressRejected> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AddressRejected::Empty);
    }

    let mut candidate = trimmed.replace(FULL_WIDTH_PERIOD, ".");
    if !candidate.contains('.') {
        candidate.insert_str(0, DEFAULT_SUBNET_PREFIX);
    }

    validate_dotted_quad(&candidate)?;
    Ok(ValidAddress(candidate))
}

fn validate_dotted_quad(candidate: &str) -> Result<(), AddressRejected> {
    let octets: Vec<&str> = candidate.split('.').collect();
    if octets.len() != 4 {
        return Err(AddressRejected::OctetCount {
            found: octets.len(),
        });
    }

    for octet in octets {
        if !is_valid_octet(octet) {
            return Err(AddressRejected::InvalidOctet {
                octet: octet.to_string(),
            });
        }
    }
    Ok(())
}

// Leading zeros are accepted ("010" is 10).
fn is_valid_octet(octet: &str) -> bool {
    (1..=3).contains(&octet.len())
        && octet.bytes().all(|b| b.is_ascii_digit())
        && octet.parse::<u16>().is_ok_and(|v| v <= 255)
}
