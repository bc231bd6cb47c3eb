//! Business-day calendar and date adjustment.

use crate::error::{Error, Result};
use crate::frequency::{Period, TimeUnit};
use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// How a date falling on a non-business day is moved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BizDayConvention {
    /// Next business day
    #[default]
    Following,
    /// Next business day unless that crosses into the next month, in which
    /// case the previous business day
    ModifiedFollowing,
    /// Previous business day
    Preceding,
    /// Leave the date as is
    Unadjusted,
}

impl fmt::Display for BizDayConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Following => "following",
            Self::ModifiedFollowing => "modified_following",
            Self::Preceding => "preceding",
            Self::Unadjusted => "unadjusted",
        };
        f.write_str(name)
    }
}

impl FromStr for BizDayConvention {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "following" | "f" => Ok(Self::Following),
            "modified_following" | "mf" => Ok(Self::ModifiedFollowing),
            "preceding" | "p" => Ok(Self::Preceding),
            "unadjusted" | "u" => Ok(Self::Unadjusted),
            _ => Err(Error::InvalidConfig(format!("unknown business day convention {s}"))),
        }
    }
}

/// Weekend-aware calendar with an explicit holiday list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calendar {
    #[serde(default)]
    holidays: BTreeSet<NaiveDate>,
}

impl Calendar {
    /// Calendar whose only closures are weekends.
    pub fn weekends_only() -> Self {
        Self::default()
    }

    /// Calendar closed on weekends and on `holidays`.
    pub fn with_holidays<I: IntoIterator<Item = NaiveDate>>(holidays: I) -> Self {
        Self {
            holidays: holidays.into_iter().collect(),
        }
    }

    /// Registered holidays.
    pub const fn holidays(&self) -> &BTreeSet<NaiveDate> {
        &self.holidays
    }

    /// Whether the exchange is open on `date`.
    pub fn is_business_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.holidays.contains(&date)
    }

    /// Move `date` onto a business day according to `convention`.
    pub fn adjust(&self, date: NaiveDate, convention: BizDayConvention) -> Result<NaiveDate> {
        match convention {
            BizDayConvention::Unadjusted => Ok(date),
            BizDayConvention::Following => self.roll(date, 1),
            BizDayConvention::Preceding => self.roll(date, -1),
            BizDayConvention::ModifiedFollowing => {
                let following = self.roll(date, 1)?;
                if following.month() == date.month() {
                    Ok(following)
                } else {
                    self.roll(date, -1)
                }
            }
        }
    }

    /// Shift `date` by `period`, then adjust the result.
    ///
    /// Business-day periods count open days and land on a business day by
    /// construction. Other units move by calendar arithmetic first, so
    /// `Jan 31 + 1m` is the last day of February before adjustment.
    pub fn advance(&self, date: NaiveDate, period: Period, convention: BizDayConvention) -> Result<NaiveDate> {
        let out_of_range = || Error::DateOutOfRange(format!("{date} + {period}"));
        let length = period.length;

        let shifted = match period.unit {
            TimeUnit::BDays => return self.advance_business_days(date, length),
            TimeUnit::Days => shift_days(date, i64::from(length)),
            TimeUnit::Weeks => shift_days(date, 7 * i64::from(length)),
            TimeUnit::Months => shift_months(date, i64::from(length)),
            TimeUnit::Years => shift_months(date, 12 * i64::from(length)),
        }
        .ok_or_else(out_of_range)?;

        self.adjust(shifted, convention)
    }

    /// Move `n` business days from `date` (backwards when negative).
    ///
    /// `n == 0` rolls a non-business day forward.
    pub fn advance_business_days(&self, date: NaiveDate, n: i32) -> Result<NaiveDate> {
        if n == 0 {
            return self.roll(date, 1);
        }

        let step = n.signum();
        let mut current = date;
        for _ in 0..n.unsigned_abs() {
            let next = step_day(current, step)
                .ok_or_else(|| Error::DateOutOfRange(format!("{date} + {n}b")))?;
            current = self.roll(next, step)?;
        }
        Ok(current)
    }

    /// Business days in `[from, to]`.
    pub fn business_days_between(&self, from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
        from.iter_days()
            .take_while(|d| *d <= to)
            .filter(|d| self.is_business_day(*d))
            .collect()
    }

    fn roll(&self, date: NaiveDate, step: i32) -> Result<NaiveDate> {
        let mut current = date;
        while !self.is_business_day(current) {
            current = step_day(current, step)
                .ok_or_else(|| Error::DateOutOfRange(format!("rolling {date}")))?;
        }
        Ok(current)
    }
}

fn step_day(date: NaiveDate, step: i32) -> Option<NaiveDate> {
    if step >= 0 {
        date.succ_opt()
    } else {
        date.pred_opt()
    }
}

fn shift_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    let magnitude = Days::new(days.unsigned_abs());
    if days >= 0 {
        date.checked_add_days(magnitude)
    } else {
        date.checked_sub_days(magnitude)
    }
}

fn shift_months(date: NaiveDate, months: i64) -> Option<NaiveDate> {
    let magnitude = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        date.checked_add_months(magnitude)
    } else {
        date.checked_sub_months(magnitude)
    }
}
