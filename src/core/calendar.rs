//! Calendar system for simulated time-of-day and season
//!
//! Simulated time is derived purely from `time_sec`; nothing here reads the
//! wall clock.

use nom::{
    character::complete::{char, digit1, space0},
    combinator::{all_consuming, map_res, opt},
    sequence::preceded,
    IResult, Parser,
};
use serde::{Deserialize, Serialize};

const SECONDS_PER_HOUR: f64 = 3600.0;
const SECONDS_PER_DAY: u64 = 86_400;
const DAYS_PER_YEAR: u32 = 365;

/// Time of day periods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimePeriod {
    Morning,   // 06:00-12:00
    Afternoon, // 12:00-18:00
    Evening,   // 18:00-22:00
    Night,     // 22:00-06:00
}

impl TimePeriod {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            6..=11 => TimePeriod::Morning,
            12..=17 => TimePeriod::Afternoon,
            18..=21 => TimePeriod::Evening,
            _ => TimePeriod::Night, // 22-23, 0-5
        }
    }
}

/// Northern-hemisphere meteorological seasons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl Season {
    /// Season for a zero-based day of year
    pub fn from_day_of_year(day: u32) -> Self {
        match day % DAYS_PER_YEAR {
            59..=150 => Season::Spring,
            151..=242 => Season::Summer,
            243..=333 => Season::Autumn,
            _ => Season::Winter,
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "winter" => Some(Season::Winter),
            "spring" => Some(Season::Spring),
            "summer" => Some(Season::Summer),
            "autumn" | "fall" => Some(Season::Autumn),
            _ => None,
        }
    }
}

/// Maps simulated seconds onto an hour of day and a day of year
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calendar {
    /// Hour of day at `time_sec == 0`
    pub start_hour: f64,
    /// Zero-based day of year at `time_sec == 0`
    pub start_day_of_year: u32,
}

impl Calendar {
    pub fn new(start_hour: f64, start_day_of_year: u32) -> Self {
        Self {
            start_hour,
            start_day_of_year,
        }
    }

    /// Fractional hour in `[0, 24)`
    pub fn hour_of_day(&self, time_sec: u64) -> f64 {
        (self.start_hour + time_sec as f64 / SECONDS_PER_HOUR).rem_euclid(24.0)
    }

    /// Whole simulated days elapsed since `time_sec == 0`, counted at midnight
    pub fn day_index(&self, time_sec: u64) -> u64 {
        let start_offset = (self.start_hour * SECONDS_PER_HOUR) as u64;
        (time_sec + start_offset) / SECONDS_PER_DAY
    }

    pub fn day_of_year(&self, time_sec: u64) -> u32 {
        ((u64::from(self.start_day_of_year) + self.day_index(time_sec)) % u64::from(DAYS_PER_YEAR))
            as u32
    }

    pub fn season(&self, time_sec: u64) -> Season {
        Season::from_day_of_year(self.day_of_year(time_sec))
    }

    pub fn time_period(&self, time_sec: u64) -> TimePeriod {
        TimePeriod::from_hour(self.hour_of_day(time_sec) as u32)
    }
}

impl Default for Calendar {
    fn default() -> Self {
        // 08:00 on June 21st
        Self::new(8.0, 171)
    }
}

/// A daily window in fractional hours; wraps midnight when `start > end`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl TimeWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, hour: f64) -> bool {
        if self.start <= self.end {
            hour >= self.start && hour < self.end
        } else {
            hour >= self.start || hour < self.end
        }
    }

    /// Parse `"HH:MM-HH:MM"` (minutes optional, e.g. `"22-7"`)
    pub fn parse(text: &str) -> Option<Self> {
        let (_, (start, end)) = all_consuming(window).parse(text).ok()?;
        if !(0.0..=24.0).contains(&start) || !(0.0..=24.0).contains(&end) {
            return None;
        }
        Some(Self::new(start, end))
    }
}

type ParseError<'a> = nom::error::Error<&'a str>;

fn number(input: &str) -> IResult<&str, u32> {
    map_res(digit1::<&str, ParseError>, str::parse::<u32>).parse(input)
}

fn clock(input: &str) -> IResult<&str, f64> {
    let (input, hours) = number(input)?;
    let (input, minutes) = opt(preceded(char::<&str, ParseError>(':'), number)).parse(input)?;
    let minutes = minutes.unwrap_or(0);
    if minutes >= 60 {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Verify,
        )));
    }
    Ok((input, f64::from(hours) + f64::from(minutes) / 60.0))
}

fn window(input: &str) -> IResult<&str, (f64, f64)> {
    let (input, _) = space0::<&str, ParseError>(input)?;
    let (input, start) = clock(input)?;
    let (input, _) = (
        space0::<&str, ParseError>,
        char::<&str, ParseError>('-'),
        space0::<&str, ParseError>,
    )
        .parse(input)?;
    let (input, end) = clock(input)?;
    let (input, _) = space0::<&str, ParseError>(input)?;
    Ok((input, (start, end)))
}
