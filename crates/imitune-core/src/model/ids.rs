use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Number of decimal digits in a rendered [`RecordId`].
pub const ID_WIDTH: usize = 12;

/// Largest ordinal that still fits in [`ID_WIDTH`] digits.
pub const MAX_ORDINAL: u64 = 999_999_999_999;

/// Identifier of a dataset row in the remote index.
///
/// Derived only from the row's zero-based position `i` as the 12-digit,
/// zero-padded decimal of `i + 1`, never from the row's content. The same
/// position always yields the same id, so the id is only as stable as the
/// row order of the sources it was derived from; see
/// [`RowOrderFingerprint`](crate::RowOrderFingerprint) for the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId(u64);

impl RecordId {
    /// Derive the identifier for the row at `position` (zero-based).
    ///
    /// Returns `None` when the ordinal would not fit in 12 digits.
    #[must_use]
    pub fn from_position(position: usize) -> Option<Self> {
        let ordinal = u64::try_from(position).ok()?.checked_add(1)?;
        (ordinal <= MAX_ORDINAL).then_some(Self(ordinal))
    }

    /// The one-based ordinal encoded in this id.
    #[must_use]
    pub const fn ordinal(&self) -> u64 {
        self.0
    }

    /// The zero-based row position this id was derived from.
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.0 - 1
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$}", self.0, width = ID_WIDTH)
    }
}

impl FromStr for RecordId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != ID_WIDTH || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidId(s.to_string()));
        }
        match s.parse::<u64>() {
            Ok(ordinal) if ordinal > 0 => Ok(Self(ordinal)),
            _ => Err(Error::InvalidId(s.to_string())),
        }
    }
}

impl TryFrom<String> for RecordId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_first_position_is_one() {
        let id = RecordId::from_position(0).unwrap();
        assert_eq!(id.to_string(), "000000000001");
        assert_eq!(id.ordinal(), 1);
        assert_eq!(id.position(), 0);
    }

    #[test]
    fn test_position_is_zero_padded_to_twelve_digits() {
        for (position, expected) in [
            (2, "000000000003"),
            (9, "000000000010"),
            (41_999, "000000042000"),
        ] {
            assert_eq!(RecordId::from_position(position).unwrap().to_string(), expected);
        }
    }

    #[test]
    fn test_ids_are_injective_over_a_generation() {
        let ids: HashSet<String> = (0..5_000)
            .map(|i| RecordId::from_position(i).unwrap().to_string())
            .collect();
        assert_eq!(ids.len(), 5_000);
        assert!(ids.iter().all(|id| id.len() == ID_WIDTH));
    }

    #[test]
    fn test_position_beyond_width_is_rejected() {
        let last = usize::try_from(MAX_ORDINAL - 1).unwrap();
        assert_eq!(
            RecordId::from_position(last).unwrap().to_string(),
            "999999999999"
        );
        assert!(RecordId::from_position(last + 1).is_none());
    }

    #[test]
    fn test_parse_round_trips_display() {
        let id: RecordId = "000000000042".parse().unwrap();
        assert_eq!(id, RecordId::from_position(41).unwrap());
    }

    #[test]
    fn test_parse_rejects_malformed_ids() {
        for bad in ["42", "00000000004a", "000000000000", "0000000000001", ""] {
            assert!(bad.parse::<RecordId>().is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_serializes_as_string() {
        let id = RecordId::from_position(6).unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"000000000007\"");
        let back: RecordId = serde_json::from_str("\"000000000007\"").unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<RecordId>("\"7\"").is_err());
    }
}
