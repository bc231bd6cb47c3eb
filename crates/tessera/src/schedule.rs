//! Rebalance schedule generation.

use crate::calendar::{BizDayConvention, Calendar};
use crate::error::{Error, Result};
use crate::frequency::{Period, TimeUnit};
use chrono::NaiveDate;
use tracing::debug;

/// Rebalance dates from `start` to `end` every `period`.
///
/// Unadjusted dates are `start + k·period` for every `k` that stays strictly
/// before `end`, followed by `end` itself. Each date is adjusted with
/// `convention`, and dates that collapse onto the same business day are
/// merged, so the result is strictly increasing.
pub fn generate_schedule(
    start: NaiveDate,
    end: NaiveDate,
    period: Period,
    calendar: &Calendar,
    convention: BizDayConvention,
) -> Result<Vec<NaiveDate>> {
    if start > end {
        return Err(Error::InvalidDateRange { start, end });
    }
    if period.length <= 0 {
        return Err(Error::InvalidFrequency(period.to_string()));
    }

    let mut raw = vec![start];
    if period.unit == TimeUnit::BDays {
        // Stepping one period at a time is exact for business days.
        let mut current = start;
        loop {
            current = calendar.advance_business_days(current, period.length)?;
            if current >= end {
                break;
            }
            raw.push(current);
        }
    } else {
        // Anchor every date on `start` so month ends don't drift.
        for k in 1.. {
            let next = calendar.advance(start, period.times(k)?, BizDayConvention::Unadjusted)?;
            if next >= end {
                break;
            }
            raw.push(next);
        }
    }
    if start < end {
        raw.push(end);
    }

    let mut dates = raw
        .into_iter()
        .map(|date| calendar.adjust(date, convention))
        .collect::<Result<Vec<_>>>()?;
    dates.sort_unstable();
    dates.dedup();

    debug!("Generated {} schedule dates from {start} to {end} every {period}", dates.len());
    Ok(dates)
}

/// Move `start` back by `warm_start` business days.
///
/// A zero look-back leaves the date untouched.
pub fn warm_start_date(start: NaiveDate, warm_start: u32, calendar: &Calendar) -> Result<NaiveDate> {
    if warm_start == 0 {
        return Ok(start);
    }
    let n = i32::try_from(warm_start)
        .map_err(|_| Error::DateOutOfRange(format!("{start} - {warm_start}b")))?;
    calendar.advance_business_days(start, -n)
}
