//! Canonical recipient addresses.
//!
//! Every address is normalized to E.164 (`+` followed by digits) before it is
//! looked up or stored. Raw user input goes through [`Address::normalize`],
//! which resolves national numbers against the local device's own number.
//! Input that is already canonical (e.g. the source of a push message) goes
//! through [`Address::new`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of digits in an E.164 number.
pub const MAX_DIGITS: usize = 15;

/// Minimum number of digits we accept as a routable number.
pub const MIN_DIGITS: usize = 7;

/// Characters stripped from user input before parsing.
const SEPARATORS: &[char] = &[' ', '-', '.', '(', ')', '/', '\t'];

/// Two-digit ITU-T E.164 country codes. `1` and `7` are the only one-digit
/// codes; every other assigned code has three digits.
const TWO_DIGIT_CODES: &[&str] = &[
    "20", "27", "30", "31", "32", "33", "34", "36", "39", "40", "41", "43", "44", "45", "46", "47",
    "48", "49", "51", "52", "53", "54", "55", "56", "57", "58", "60", "61", "62", "63", "64", "65",
    "66", "81", "82", "84", "86", "90", "91", "92", "93", "94", "95", "98",
];

/// Full national length (trunk prefix included) in plans whose trunk prefix
/// is not `0`.
const NANP_DIALED_LEN: usize = 11;

/// Remove the domestic trunk prefix from a nationally dialed number.
///
/// Italian numbers keep their leading `0`; it is part of the subscriber
/// number.
fn strip_trunk_prefix<'a>(country: &str, dialed: &'a str) -> &'a str {
    let trunk = match country {
        "1" => "1",
        "7" => "8",
        "39" => return dialed,
        _ => "0",
    };
    match dialed.strip_prefix(trunk) {
        Some(rest) if trunk == "0" || dialed.len() == NANP_DIALED_LEN => rest,
        _ => dialed,
    }
}

/// Errors produced while canonicalizing an address.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Input was empty after stripping whitespace
    #[error("address is empty")]
    Empty,

    /// Input contains a character that is not a digit or separator
    #[error("invalid character {0:?} in address")]
    InvalidCharacter(char),

    /// More than [`MAX_DIGITS`] digits
    #[error("address has {0} digits, maximum is 15")]
    TooLong(usize),

    /// Fewer than [`MIN_DIGITS`] digits
    #[error("address has {0} digits, minimum is 7")]
    TooShort(usize),

    /// No country code could be placed in front of the number
    #[error("cannot infer country code for {0}")]
    UnknownCountry(String),
}

/// Canonical E.164 address.
///
/// # Invariants
///
/// - Always `+` followed by 7..=15 ASCII digits
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Parse an already canonical address. Whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, lacks the leading `+`, or has
    /// a digit count outside 7..=15.
    pub fn new(raw: &str) -> Result<Self, AddressError> {
        let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        let Some(digits) = compact.strip_prefix('+') else {
            return match compact.chars().next() {
                None => Err(AddressError::Empty),
                Some(c) if c.is_ascii_digit() => Err(AddressError::UnknownCountry(compact)),
                Some(c) => Err(AddressError::InvalidCharacter(c)),
            };
        };
        Self::from_digits(digits)
    }

    /// Canonicalize user-entered input relative to the local number.
    ///
    /// - `+...` is international as written
    /// - `00...` uses the international call prefix and becomes `+...`
    /// - anything else is national: the local plan's trunk prefix is dropped
    ///   and the local country code is prepended
    ///
    /// The local country code is read off `local` with the E.164 country
    /// code table, never guessed from digit counts.
    ///
    /// # Errors
    ///
    /// Returns an error on empty input, invalid characters, bad length, or
    /// when `local` has no assigned country code.
    pub fn normalize(raw: &str, local: &Self) -> Result<Self, AddressError> {
        let stripped: String = raw.trim().chars().filter(|c| !SEPARATORS.contains(c)).collect();
        if stripped.is_empty() {
            return Err(AddressError::Empty);
        }

        if let Some(digits) = stripped.strip_prefix('+') {
            return Self::from_digits(digits);
        }
        if let Some(digits) = stripped.strip_prefix("00") {
            return Self::from_digits(digits);
        }

        if let Some(c) = stripped.chars().find(|c| !c.is_ascii_digit()) {
            return Err(AddressError::InvalidCharacter(c));
        }

        let country = local
            .country_code()
            .ok_or_else(|| AddressError::UnknownCountry(local.digits().to_string()))?;
        let national = strip_trunk_prefix(country, &stripped);

        Self::from_digits(&format!("{country}{national}"))
    }

    /// E.164 country calling code, if `self` starts with an assigned zone.
    pub fn country_code(&self) -> Option<&str> {
        let digits = self.digits();
        let len = match digits.as_bytes().first()? {
            b'0' => return None,
            b'1' | b'7' => 1,
            _ if TWO_DIGIT_CODES.contains(&digits.get(..2)?) => 2,
            _ => 3,
        };
        digits.get(..len)
    }

    fn from_digits(digits: &str) -> Result<Self, AddressError> {
        if digits.is_empty() {
            return Err(AddressError::Empty);
        }
        if let Some(c) = digits.chars().find(|c| !c.is_ascii_digit()) {
            return Err(AddressError::InvalidCharacter(c));
        }
        match digits.len() {
            n if n > MAX_DIGITS => Err(AddressError::TooLong(n)),
            n if n < MIN_DIGITS => Err(AddressError::TooShort(n)),
            _ => Ok(Self(format!("+{digits}"))),
        }
    }

    /// Canonical string form, including the leading `+`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Digits without the leading `+`.
    pub fn digits(&self) -> &str {
        &self.0[1..]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::new(&raw)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl std::str::FromStr for Address {
    type Err = AddressError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::new(raw)
    }
}
