use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, de::Error};
use smol_str::{SmolStr, SmolStrBuilder};
use std::fmt;
use std::sync::LazyLock;
use std::{ops::Deref, str::FromStr};

use regex::Regex;

/// The sortable base32 alphabet. Character codes increase with digit value,
/// so string order and numeric order agree.
pub const S32_CHAR: &[u8; 32] = b"234567abcdefghijklmnopqrstuvwxyz";

/// Canonical width of an encoded TID. 13 digits cover the full 63-bit domain.
pub const TID_LEN: usize = 13;

/// Low bits of the value holding the clock identifier.
pub const CLOCK_ID_BITS: u32 = 10;

const CLOCK_ID_MASK: u64 = (1 << CLOCK_ID_BITS) - 1;

const S32_INDEX: [u8; 256] = {
    let mut table = [u8::MAX; 256];
    let mut i = 0;
    while i < S32_CHAR.len() {
        table[S32_CHAR[i] as usize] = i as u8;
        i += 1;
    }
    table
};

fn s32_encode(mut i: u64) -> SmolStr {
    let mut s = SmolStrBuilder::new();
    for _ in 0..TID_LEN {
        let c = i & 0x1F;
        s.push(S32_CHAR[c as usize] as char);

        i >>= 5;
    }

    let mut builder = SmolStrBuilder::new();
    for c in s.finish().chars().rev() {
        builder.push(c);
    }
    builder.finish()
}

// input must already be validated against TID_REGEX
fn s32_decode(s: &str) -> u64 {
    s.bytes()
        .fold(0u64, |acc, b| acc * 32 + S32_INDEX[b as usize] as u64)
}

static TID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[234567abcdefghij][234567abcdefghijklmnopqrstuvwxyz]{12}$")
        .expect("TID regex is valid")
});

/// Error returned when a string is not a canonical TID.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, miette::Diagnostic)]
pub enum TidError {
    /// The string is not exactly [`TID_LEN`] characters long.
    #[error("TID must be {expected} characters, got {actual}")]
    #[diagnostic(code(tid::length), url("https://atproto.com/specs/tid"))]
    Length {
        /// Required length
        expected: usize,
        /// Length of the rejected input
        actual: usize,
    },

    /// A character outside the sortable base32 alphabet.
    #[error("invalid character {ch:?} at offset {offset}")]
    #[diagnostic(
        code(tid::character),
        url("https://atproto.com/specs/tid"),
        help("TIDs use the alphabet 234567abcdefghijklmnopqrstuvwxyz")
    )]
    InvalidChar {
        /// The offending character
        ch: char,
        /// Byte offset of the character
        offset: usize,
    },

    /// The leading digit would set the reserved top bit.
    #[error("leading character {ch:?} is out of range")]
    #[diagnostic(
        code(tid::leading_char),
        url("https://atproto.com/specs/tid"),
        help("the first character must be one of 234567abcdefghij")
    )]
    LeadingChar {
        /// The offending character
        ch: char,
    },
}

/// The two halves of a decoded TID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TidParts {
    /// Microseconds since the UNIX epoch (53 bits).
    pub timestamp: u64,
    /// Clock disambiguator (10 bits).
    pub clock_id: u16,
}

/// A [Timestamp Identifier].
///
/// The string form is always [`TID_LEN`] characters, left-padded with the
/// alphabet's zero digit, so comparing two TIDs as strings gives the same
/// answer as comparing the integers they encode.
///
/// [Timestamp Identifier]: https://atproto.com/specs/tid
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Hash)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Tid(SmolStr);

impl Tid {
    /// Parses a `TID` from the given string.
    pub fn new(tid: impl AsRef<str>) -> Result<Self, TidError> {
        let tid = tid.as_ref();
        if tid.len() != TID_LEN {
            return Err(TidError::Length {
                expected: TID_LEN,
                actual: tid.len(),
            });
        }
        if !TID_REGEX.is_match(tid) {
            return Err(Self::classify_failure(tid));
        }
        Ok(Self(SmolStr::new_inline(tid)))
    }

    fn classify_failure(tid: &str) -> TidError {
        for (offset, ch) in tid.char_indices() {
            if !ch.is_ascii() || S32_INDEX[ch as usize] == u8::MAX {
                return TidError::InvalidChar { ch, offset };
            }
        }
        // every character is in the alphabet, so the leading one is too large
        let ch = tid.chars().next().unwrap_or('?');
        TidError::LeadingChar { ch }
    }

    /// Build a TID from a microsecond timestamp and a clock identifier.
    ///
    /// The clock identifier is masked to its low 10 bits, and the timestamp
    /// to 53 bits; out-of-range input is truncated, never rejected.
    pub fn from_parts(timestamp: u64, clock_id: u32) -> Self {
        // The TID is laid out as follows:
        // 0TTTTTTTTTTTTTTT TTTTTTTTTTTTTTTT TTTTTTTTTTTTTTTT TTTTTTCCCCCCCCCC
        let tid = (timestamp << CLOCK_ID_BITS) & 0x7FFF_FFFF_FFFF_FC00
            | (clock_id as u64 & CLOCK_ID_MASK);
        Self(s32_encode(tid))
    }

    /// Encode a TID, filling in whatever is not supplied.
    ///
    /// A missing timestamp is taken from the wall clock; a missing clock
    /// identifier is drawn uniformly from `0..1024` using the thread rng.
    pub fn encode(timestamp: Option<u64>, clock_id: Option<u32>) -> Self {
        Self::encode_with_rng(timestamp, clock_id, &mut rand::rng())
    }

    /// Same as [`Tid::encode`], drawing the clock identifier from `rng`.
    pub fn encode_with_rng<R: Rng + ?Sized>(
        timestamp: Option<u64>,
        clock_id: Option<u32>,
        rng: &mut R,
    ) -> Self {
        let timestamp = timestamp.unwrap_or_else(now_micros);
        let clock_id = clock_id.unwrap_or_else(|| rng.random_range(0..1024));
        Self::from_parts(timestamp, clock_id)
    }

    /// Construct a new [Tid] that represents the current time.
    ///
    /// If you have multiple clock sources, you can use `clock_id` to distinguish between them.
    /// If you are only using a single clock source, you can just specify `0`.
    pub fn now(clock_id: u32) -> Self {
        Self::from_parts(now_micros(), clock_id)
    }

    /// Decode a string straight into its timestamp and clock identifier.
    pub fn decode(tid: impl AsRef<str>) -> Result<TidParts, TidError> {
        Self::new(tid).map(|tid| tid.parts())
    }

    /// The 63-bit integer this TID encodes.
    pub fn as_u64(&self) -> u64 {
        s32_decode(&self.0)
    }

    /// Split into timestamp and clock identifier.
    pub fn parts(&self) -> TidParts {
        let value = self.as_u64();
        TidParts {
            timestamp: value >> CLOCK_ID_BITS,
            clock_id: (value & CLOCK_ID_MASK) as u16,
        }
    }

    /// Microseconds since the UNIX epoch.
    pub fn timestamp(&self) -> u64 {
        self.parts().timestamp
    }

    /// The clock disambiguator.
    pub fn clock_id(&self) -> u16 {
        self.parts().clock_id
    }

    /// Returns the TID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn now_micros() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_micros()).unwrap_or(0)
}

impl FromStr for Tid {
    type Err = TidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl<'de> Deserialize<'de> for Tid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::new(value).map_err(D::Error::custom)
    }
}

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Tid> for String {
    fn from(value: Tid) -> Self {
        value.0.to_string()
    }
}

impl From<Tid> for SmolStr {
    fn from(value: Tid) -> Self {
        value.0
    }
}

impl AsRef<str> for Tid {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Deref for Tid {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}
