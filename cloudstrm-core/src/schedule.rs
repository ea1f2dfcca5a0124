//! Five-field cron expressions
//!
//! `minute hour day-of-month month day-of-week`, each field a `*`, a value,
//! a range `a-b`, a step `*/n` or `a-b/n`, or a comma-separated list of
//! those. Months and weekdays also accept three-letter English names.
//! Weekdays run 0-7 with both 0 and 7 meaning Sunday.
//!
//! As in classic cron, when both day fields are restricted a time matches if
//! either of them does.

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike};
use std::fmt;
use std::str::FromStr;

use crate::{Result, StrmError};

const MONTH_NAMES: &[&str] = &[
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const WEEKDAY_NAMES: &[&str] = &["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// Upper bound for [`CronSchedule::next_after`], a bit over four years so
/// that Feb 29 schedules are found
const SEARCH_MINUTES: i64 = 4 * 366 * 24 * 60;

/// A parsed cron expression, matched at minute resolution
#[derive(Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expr: String,
    minutes: u64,
    hours: u64,
    days: u64,
    months: u64,
    weekdays: u64,
    any_day: bool,
    any_weekday: bool,
}

impl CronSchedule {
    pub fn parse(expr: &str) -> Result<Self> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(StrmError::Config(format!(
                "cron expression '{}' needs 5 fields, found {}",
                expr,
                fields.len()
            )));
        }

        let field_err = |e: String| StrmError::Config(format!("cron expression '{}': {}", expr, e));

        let mut weekdays = parse_field(fields[4], 0, 7, WEEKDAY_NAMES, 0).map_err(field_err)?;
        if weekdays & (1 << 7) != 0 {
            weekdays = (weekdays & !(1 << 7)) | 1;
        }

        Ok(Self {
            expr: fields.join(" "),
            minutes: parse_field(fields[0], 0, 59, &[], 0).map_err(field_err)?,
            hours: parse_field(fields[1], 0, 23, &[], 0).map_err(field_err)?,
            days: parse_field(fields[2], 1, 31, &[], 0).map_err(field_err)?,
            months: parse_field(fields[3], 1, 12, MONTH_NAMES, 1).map_err(field_err)?,
            weekdays,
            any_day: fields[2].starts_with('*'),
            any_weekday: fields[4].starts_with('*'),
        })
    }

    /// Parse an optional expression; blank means "not scheduled"
    pub fn parse_optional(expr: Option<&str>) -> Result<Option<Self>> {
        match expr.map(str::trim) {
            Some(e) if !e.is_empty() => Self::parse(e).map(Some),
            _ => Ok(None),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.expr
    }

    /// Whether the minute containing `time` is scheduled
    pub fn matches<Tz: TimeZone>(&self, time: &DateTime<Tz>) -> bool {
        if !bit(self.minutes, time.minute())
            || !bit(self.hours, time.hour())
            || !bit(self.months, time.month())
        {
            return false;
        }

        let day = bit(self.days, time.day());
        let weekday = bit(self.weekdays, time.weekday().num_days_from_sunday());
        if self.any_day || self.any_weekday {
            day && weekday
        } else {
            day || weekday
        }
    }

    /// First scheduled minute strictly after `time`
    pub fn next_after<Tz: TimeZone>(&self, time: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let start = time.clone().with_second(0)?.with_nanosecond(0)?;
        (1..=SEARCH_MINUTES)
            .map(|m| start.clone() + Duration::minutes(m))
            .find(|t| self.matches(t))
    }
}

impl FromStr for CronSchedule {
    type Err = StrmError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expr)
    }
}

impl fmt::Debug for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CronSchedule({})", self.expr)
    }
}

fn bit(mask: u64, value: u32) -> bool {
    mask & (1 << value) != 0
}

/// Parse one field into a bitmask of allowed values
fn parse_field(
    field: &str,
    min: u32,
    max: u32,
    names: &[&str],
    name_base: u32,
) -> std::result::Result<u64, String> {
    let value = |s: &str| -> std::result::Result<u32, String> {
        if let Ok(v) = s.parse::<u32>() {
            return Ok(v);
        }
        names
            .iter()
            .position(|n| n.eq_ignore_ascii_case(s))
            .map(|i| i as u32 + name_base)
            .ok_or_else(|| format!("invalid value '{}'", s))
    };

    let mut mask = 0u64;
    for part in field.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step.parse().map_err(|_| format!("invalid step '{}'", step))?;
                if step == 0 {
                    return Err("step must be positive".to_string());
                }
                (range, Some(step))
            }
            None => (part, None),
        };

        let (lo, hi) = if range == "*" {
            (min, max)
        } else if let Some((a, b)) = range.split_once('-') {
            (value(a)?, value(b)?)
        } else {
            let v = value(range)?;
            if step.is_some() {
                (v, max)
            } else {
                (v, v)
            }
        };

        if lo < min || hi > max || lo > hi {
            return Err(format!("'{}' is outside {}-{}", part, min, max));
        }

        for v in (lo..=hi).step_by(step.unwrap_or(1) as usize) {
            mask |= 1 << v;
        }
    }

    Ok(mask)
}
