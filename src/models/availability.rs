use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// One recurring weekly availability window: day-of-week 1 (Monday) through
/// 7 (Sunday), time-of-day in minutes since midnight, UTC.
///
/// The serialized form is the interchange format stored in the item row,
/// e.g. `{"startDayOfWeek":1,"endDayOfWeek":3,"startTimeAtInMinute":60,"endTimeAtInMinute":120}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyInterval {
    pub start_day_of_week: u8,
    pub end_day_of_week: u8,
    pub start_time_at_in_minute: u16,
    pub end_time_at_in_minute: u16,
}

impl WeeklyInterval {
    /// Derive a single-occurrence interval from two absolute timestamps.
    pub fn from_window(start_at: DateTime<Utc>, end_at: DateTime<Utc>) -> Self {
        Self {
            start_day_of_week: start_at.weekday().number_from_monday() as u8,
            end_day_of_week: end_at.weekday().number_from_monday() as u8,
            start_time_at_in_minute: minute_of_day(start_at),
            end_time_at_in_minute: minute_of_day(end_at),
        }
    }

    /// True when the instant falls inside this recurring window. Both
    /// boundaries are inclusive.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.contains_point(
            instant.weekday().number_from_monday() as u8,
            minute_of_day(instant),
        )
    }

    fn contains_point(&self, day: u8, minute: u16) -> bool {
        if self.start_day_of_week == self.end_day_of_week {
            return day == self.start_day_of_week
                && minute >= self.start_time_at_in_minute
                && minute <= self.end_time_at_in_minute;
        }
        // Cyclic day range: walking forward from the start day must reach
        // `day` no later than the end day. Covers windows that wrap across
        // the week boundary (e.g. Friday -> Monday).
        if cyclic_offset(self.start_day_of_week, day)
            > cyclic_offset(self.start_day_of_week, self.end_day_of_week)
        {
            return false;
        }
        if day == self.start_day_of_week && minute < self.start_time_at_in_minute {
            return false;
        }
        if day == self.end_day_of_week && minute > self.end_time_at_in_minute {
            return false;
        }
        true
    }

    fn in_bounds(&self) -> bool {
        (1..=7).contains(&self.start_day_of_week)
            && (1..=7).contains(&self.end_day_of_week)
            && self.start_time_at_in_minute < MINUTES_PER_DAY
            && self.end_time_at_in_minute < MINUTES_PER_DAY
    }

    fn is_degenerate(&self) -> bool {
        self.start_day_of_week == self.end_day_of_week
            && self.start_time_at_in_minute == self.end_time_at_in_minute
    }
}

/// True iff a single interval in the set covers both endpoints. A booking
/// must fit inside one recurring window; spanning two adjacent windows does
/// not count.
pub fn contains_dates(
    intervals: &[WeeklyInterval],
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
) -> bool {
    intervals
        .iter()
        .any(|interval| interval.contains(start_at) && interval.contains(end_at))
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntervalSetError {
    #[error("interval {index} has day-of-week or minute fields out of range")]
    OutOfRange { index: usize },
    #[error("interval {index} is zero-length")]
    Degenerate { index: usize },
    #[error("intervals {first} and {second} overlap")]
    Overlapping { first: usize, second: usize },
}

impl IntervalSetError {
    /// Stable machine-readable code for the API layer.
    pub fn code(&self) -> &'static str {
        "INVALID_AVAILABILITY_SET"
    }
}

/// Check a full availability set: every interval well-formed, and no
/// interval's start or end instant contained by another interval. Runs
/// whenever an item's availability is created or replaced, never on read.
pub fn validate_intervals(intervals: &[WeeklyInterval]) -> Result<(), IntervalSetError> {
    for (index, interval) in intervals.iter().enumerate() {
        if !interval.in_bounds() {
            return Err(IntervalSetError::OutOfRange { index });
        }
        if interval.is_degenerate() {
            return Err(IntervalSetError::Degenerate { index });
        }
    }
    for (first, a) in intervals.iter().enumerate() {
        for (second, b) in intervals.iter().enumerate() {
            if first == second {
                continue;
            }
            if b.contains_point(a.start_day_of_week, a.start_time_at_in_minute)
                || b.contains_point(a.end_day_of_week, a.end_time_at_in_minute)
            {
                return Err(IntervalSetError::Overlapping { first, second });
            }
        }
    }
    Ok(())
}

fn cyclic_offset(from: u8, to: u8) -> u8 {
    (to + 7 - from) % 7
}

fn minute_of_day(instant: DateTime<Utc>) -> u16 {
    (instant.hour() * 60 + instant.minute()) as u16
}
