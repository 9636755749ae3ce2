//! Calendar helpers for the monthly model grid.
//!
//! Every model period is a calendar month keyed by its first day. These
//! helpers normalise arbitrary dates onto that grid and do the month/quarter
//! arithmetic the debt and cash-flow layers need.

use chrono::{Datelike, Months, NaiveDate};

use crate::error::AssetFinanceError;
use crate::AssetFinanceResult;

/// First day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Shift a date by a signed number of months (day clamped to month end).
pub fn add_months(date: NaiveDate, months: i32) -> AssetFinanceResult<NaiveDate> {
    let shifted = if months >= 0 {
        date.checked_add_months(Months::new(months as u32))
    } else {
        date.checked_sub_months(Months::new(months.unsigned_abs()))
    };
    shifted.ok_or_else(|| {
        AssetFinanceError::DateError(format!("cannot shift {date} by {months} months"))
    })
}

/// Shift a date by whole years (Feb 29 clamps to Feb 28).
pub fn add_years(date: NaiveDate, years: u32) -> AssetFinanceResult<NaiveDate> {
    let months = years
        .checked_mul(12)
        .and_then(|m| i32::try_from(m).ok())
        .ok_or_else(|| AssetFinanceError::DateError(format!("{years} years is out of range")))?;
    add_months(date, months)
}

/// Whole calendar months from `from` to `to` (negative if `to` is earlier).
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i32 {
    (to.year() - from.year()) * 12 + (to.month() as i32 - from.month() as i32)
}

/// Month starts from the month of `start` to the month of `end`, inclusive.
pub fn monthly_range(start: NaiveDate, end: NaiveDate) -> AssetFinanceResult<Vec<NaiveDate>> {
    let first = month_start(start);
    let last = month_start(end);
    if last < first {
        return Ok(Vec::new());
    }
    let count = months_between(first, last) + 1;
    let mut months = Vec::with_capacity(count as usize);
    for offset in 0..count {
        months.push(add_months(first, offset)?);
    }
    Ok(months)
}

/// True for March, June, September and December.
pub fn is_quarter_end(date: NaiveDate) -> bool {
    date.month() % 3 == 0
}

/// First day of the calendar quarter containing `date`.
pub fn quarter_start(date: NaiveDate) -> NaiveDate {
    let month = (date.month0() / 3) * 3 + 1;
    NaiveDate::from_ymd_opt(date.year(), month, 1).unwrap_or(date)
}

/// First month boundary strictly after `date`.
pub fn next_month_start_after(date: NaiveDate) -> AssetFinanceResult<NaiveDate> {
    add_months(month_start(date), 1)
}

/// First calendar-quarter boundary strictly after `date`.
pub fn next_quarter_start_after(date: NaiveDate) -> AssetFinanceResult<NaiveDate> {
    add_months(quarter_start(date), 3)
}

/// Calendar quarter number (1-4).
pub fn quarter_of(date: NaiveDate) -> u32 {
    date.month0() / 3 + 1
}

/// Fiscal year label for `date`: the calendar year in which the fiscal year
/// starting in `start_month` ends.
pub fn fiscal_year(date: NaiveDate, start_month: u32) -> i32 {
    if start_month <= 1 || date.month() < start_month {
        date.year()
    } else {
        date.year() + 1
    }
}
