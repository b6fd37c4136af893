use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// Number of digits a code is zero-padded to.
pub const CODE_WIDTH: usize = 6;

/// Largest value that still fits in [`CODE_WIDTH`] digits.
pub const MAX_PADDED_VALUE: u64 = 999_999;

/// A sequential code such as `000042`.
///
/// The numeric value is what the ledger audit reasons about; the textual
/// form is always rendered zero-padded to [`CODE_WIDTH`] digits. Values past
/// [`MAX_PADDED_VALUE`] are not rejected, they simply render wider.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceCode(u64);

impl SequenceCode {
    /// The value a freshly bootstrapped counter holds.
    pub const ZERO: SequenceCode = SequenceCode(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the numeric value of the code.
    pub fn value(self) -> u64 {
        self.0
    }

    /// Returns the successor of this code.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Whether the code no longer fits the zero-padded width.
    pub fn exceeds_width(self) -> bool {
        self.0 > MAX_PADDED_VALUE
    }

    /// Parses a stored code string.
    ///
    /// Surrounding whitespace is ignored; anything other than ASCII digits is rejected.
    pub fn parse(code: &str) -> std::result::Result<Self, CoreError> {
        let digits = code.trim();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoreError::InvalidCode(format!(
                "expected decimal digits, got '{}'",
                code
            )));
        }

        digits
            .parse::<u64>()
            .map(Self)
            .map_err(|e| CoreError::InvalidCode(format!("'{}': {e}", code)))
    }
}

impl Display for SequenceCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:0width$}", self.0, width = CODE_WIDTH)
    }
}

impl FromStr for SequenceCode {
    type Err = CoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<u64> for SequenceCode {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Serialize for SequenceCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SequenceCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_zero_padded() {
        assert_eq!(SequenceCode::new(1).to_string(), "000001");
        assert_eq!(SequenceCode::new(42).to_string(), "000042");
        assert_eq!(SequenceCode::ZERO.to_string(), "000000");
        assert_eq!(SequenceCode::new(999_999).to_string(), "999999");
    }

    #[test]
    fn next_increments_by_one() {
        let code = SequenceCode::parse("000041").unwrap();
        assert_eq!(code.next().to_string(), "000042");
    }

    #[test]
    fn overflow_renders_seven_digits() {
        let code = SequenceCode::parse("999999").unwrap().next();
        assert_eq!(code.to_string(), "1000000");
        assert!(code.exceeds_width());
        assert!(!SequenceCode::new(MAX_PADDED_VALUE).exceeds_width());
    }

    #[test]
    fn parse_accepts_padded_and_unpadded() {
        assert_eq!(SequenceCode::parse("000007").unwrap().value(), 7);
        assert_eq!(SequenceCode::parse("7").unwrap().value(), 7);
        assert_eq!(SequenceCode::parse(" 000010 ").unwrap().value(), 10);
    }

    #[test]
    fn parse_rejects_non_digits() {
        assert!(SequenceCode::parse("").is_err());
        assert!(SequenceCode::parse("   ").is_err());
        assert!(SequenceCode::parse("00a001").is_err());
        assert!(SequenceCode::parse("-00001").is_err());
        assert!(SequenceCode::parse("+00001").is_err());
    }

    #[test]
    fn ordering_follows_numeric_value() {
        let mut codes = vec![
            SequenceCode::new(10),
            SequenceCode::new(9),
            SequenceCode::new(100),
        ];
        codes.sort();
        assert_eq!(
            codes,
            vec![
                SequenceCode::new(9),
                SequenceCode::new(10),
                SequenceCode::new(100)
            ]
        );
    }
}
