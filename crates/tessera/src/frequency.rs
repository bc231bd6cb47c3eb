//! Calendar periods and rebalance horizons.
//!
//! A frequency token such as `"2w"` is a signed count followed by a unit.
//! [`map_horizon`] converts it into the number of extra trading days a
//! forward return looks past the first day after a rebalance, assuming 5
//! trading days per week and 22 per month.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Trading days assumed per week.
pub const TRADING_DAYS_PER_WEEK: i64 = 5;

/// Trading days assumed per month.
pub const TRADING_DAYS_PER_MONTH: i64 = 22;

/// Unit of a [`Period`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    /// Business days (`b`)
    BDays,
    /// Calendar days (`d`)
    Days,
    /// Weeks (`w`)
    Weeks,
    /// Months (`m`)
    Months,
    /// Years (`y`)
    Years,
}

impl TimeUnit {
    /// Token suffix for the unit.
    pub const fn suffix(&self) -> char {
        match self {
            Self::BDays => 'b',
            Self::Days => 'd',
            Self::Weeks => 'w',
            Self::Months => 'm',
            Self::Years => 'y',
        }
    }

    const fn from_suffix(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'b' => Some(Self::BDays),
            'd' => Some(Self::Days),
            'w' => Some(Self::Weeks),
            'm' => Some(Self::Months),
            'y' => Some(Self::Years),
            _ => None,
        }
    }
}

/// A signed calendar period, e.g. `3m` or `-5b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Period {
    /// Number of units (negative periods step backwards)
    pub length: i32,
    /// Unit
    pub unit: TimeUnit,
}

impl Period {
    /// Create a period.
    pub const fn new(length: i32, unit: TimeUnit) -> Self {
        Self { length, unit }
    }

    /// Business-day period.
    pub const fn bdays(length: i32) -> Self {
        Self::new(length, TimeUnit::BDays)
    }

    /// This period repeated `n` times.
    pub fn times(&self, n: i32) -> Result<Self> {
        let length = self
            .length
            .checked_mul(n)
            .ok_or_else(|| Error::DateOutOfRange(format!("{self} * {n}")))?;
        Ok(Self::new(length, self.unit))
    }

    /// Forward-return horizon implied by rebalancing every `self`.
    pub fn horizon(&self) -> Result<usize> {
        if self.length <= 0 {
            return Err(Error::InvalidFrequency(self.to_string()));
        }

        let length = i64::from(self.length);
        let horizon = match self.unit {
            TimeUnit::BDays | TimeUnit::Days => length - 1,
            TimeUnit::Weeks => TRADING_DAYS_PER_WEEK * length - 1,
            TimeUnit::Months => TRADING_DAYS_PER_MONTH * length - 1,
            TimeUnit::Years => return Err(Error::UnrecognizedFrequency(self.to_string())),
        };
        usize::try_from(horizon).map_err(|_| Error::InvalidFrequency(self.to_string()))
    }
}

impl FromStr for Period {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let token = s.trim();
        let unrecognized = || Error::UnrecognizedFrequency(s.to_string());

        let mut chars = token.chars();
        let unit = chars
            .next_back()
            .and_then(TimeUnit::from_suffix)
            .ok_or_else(unrecognized)?;

        let count = chars.as_str();
        let digits = count.strip_prefix(['+', '-']).unwrap_or(count);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(unrecognized());
        }

        let length = count.parse::<i32>().map_err(|_| unrecognized())?;
        Ok(Self::new(length, unit))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.length, self.unit.suffix())
    }
}

/// Horizon (in trading days beyond the first) for a frequency token.
///
/// `"1b"` and `"1d"` map to 0, `"2w"` to 9, `"3m"` to 65.
pub fn map_horizon(frequency: &str) -> Result<usize> {
    frequency.parse::<Period>()?.horizon()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1b", 0)]
    #[case("5b", 4)]
    #[case("1d", 0)]
    #[case("1w", 4)]
    #[case("2w", 9)]
    #[case("1m", 21)]
    #[case("3m", 65)]
    #[case("2W", 9)]
    #[case(" 1m ", 21)]
    fn test_map_horizon(#[case] frequency: &str, #[case] expected: usize) {
        assert_eq!(map_horizon(frequency).unwrap(), expected);
    }

    #[rstest]
    #[case("xyz")]
    #[case("1y")]
    #[case("m")]
    #[case("")]
    #[case("1.5w")]
    #[case("w2")]
    fn test_unrecognized(#[case] frequency: &str) {
        assert!(matches!(
            map_horizon(frequency),
            Err(Error::UnrecognizedFrequency(_))
        ));
    }

    #[rstest]
    #[case("0b")]
    #[case("-2w")]
    fn test_non_positive_length(#[case] frequency: &str) {
        assert!(matches!(map_horizon(frequency), Err(Error::InvalidFrequency(_))));
    }

    #[test]
    fn test_monotone_in_length() {
        for unit in ["b", "d", "w", "m"] {
            let horizons: Vec<usize> = (1..=12)
                .map(|n| map_horizon(&format!("{n}{unit}")).unwrap())
                .collect();
            assert!(horizons.windows(2).all(|w| w[0] <= w[1]), "{unit}: {horizons:?}");
        }
    }

    #[test]
    fn test_signed_period_parsing() {
        let period: Period = "-5b".parse().unwrap();
        assert_eq!(period, Period::bdays(-5));
        assert_eq!(period.to_string(), "-5b");
        assert_eq!("+3M".parse::<Period>().unwrap(), Period::new(3, TimeUnit::Months));
    }
}
