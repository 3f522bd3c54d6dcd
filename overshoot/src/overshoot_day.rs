//! Overshoot day: the day of the year by which consumption has used up that
//! year's biocapacity.

use std::fmt;

use chrono::NaiveDate;
use tracing::debug;

use crate::{AnnualRecord, AnnualTable, OvershootError, Result};

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_year(year: i32) -> u32 {
    if is_leap_year(year) {
        366
    } else {
        365
    }
}

/// Calendar rendering of an overshoot day.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OvershootDate {
    /// Footprint stayed within biocapacity for the whole year.
    NoOvershoot,
    Date(NaiveDate),
}

impl OvershootDate {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            OvershootDate::NoOvershoot => None,
            OvershootDate::Date(date) => Some(*date),
        }
    }
}

impl fmt::Display for OvershootDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OvershootDate::NoOvershoot => f.write_str("None"),
            OvershootDate::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct OvershootRecord {
    pub annual: AnnualRecord,
    /// Fractional day-of-year index, `days_in_year * biocapacity / footprint`
    pub overshoot_day: f64,
    pub overshoot_day_formatted: OvershootDate,
}

impl OvershootRecord {
    pub fn year(&self) -> i32 {
        self.annual.year
    }

    /// Signed distance from year end in days; negative once the year overshoots.
    pub fn over(&self) -> f64 {
        self.overshoot_day - days_in_year(self.annual.year) as f64
    }
}

/// Compute the overshoot day of every year in `table`, preserving order.
pub fn determine_overshoot_day(table: &AnnualTable) -> Result<Vec<OvershootRecord>> {
    table
        .records()
        .iter()
        .map(|record| {
            let (overshoot_day, formatted) =
                overshoot_day_for(record.year, record.eco_footprint, record.biocapacity)?;
            Ok(OvershootRecord {
                annual: record.clone(),
                overshoot_day,
                overshoot_day_formatted: formatted,
            })
        })
        .collect()
}

fn overshoot_day_for(
    year: i32,
    eco_footprint: f64,
    biocapacity: f64,
) -> Result<(f64, OvershootDate)> {
    if eco_footprint == 0.0 {
        return Err(OvershootError::ZeroFootprint { year });
    }
    let days = days_in_year(year);
    let day = days as f64 * biocapacity / eco_footprint;

    if day > days as f64 {
        debug!("{}: no overshoot (day {:.2})", year, day);
        return Ok((day, OvershootDate::NoOvershoot));
    }

    // Truncate, never round: day 182.9 is still the 182nd day.
    let ordinal = day.trunc();
    let date = if ordinal >= 1.0 {
        NaiveDate::from_yo_opt(year, ordinal as u32)
    } else {
        None
    };
    let date = date.ok_or(OvershootError::DayOutOfRange { year, day })?;
    debug!("{}: overshoot day {:.2} ({})", year, day, date);
    Ok((day, OvershootDate::Date(date)))
}
