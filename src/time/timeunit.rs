use crate::time::error::Error;
use core::str::FromStr;
use std::convert::TryFrom;
use lazy_static::*;
use regex::Regex;
use std::time::Duration;

lazy_static! {
    static ref DURATION_REGEX: Regex =
        Regex::new(r"^(?P<value>\d+(?:\.\d+)?)\s*(?P<unit>[a-z]+)?$").expect("Regex compilation error");
}

/// A number of some time unit, e.g. `30s` or `1.5m`.
///
/// A bare number is read as seconds, which is what every timeout-like
/// launcher option has always been expressed in.
#[derive(Debug, PartialEq)]
pub struct DurationUnit {
    value: f64,
    unit: TimeUnit,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeUnit {
    Nanosecond,
    Microsecond,
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
}

impl TimeUnit {
    fn as_secs_f64(self) -> f64 {
        match self {
            TimeUnit::Nanosecond => 1e-9,
            TimeUnit::Microsecond => 1e-6,
            TimeUnit::Millisecond => 1e-3,
            TimeUnit::Second => 1.0,
            TimeUnit::Minute => 60.0,
            TimeUnit::Hour => 60.0 * 60.0,
            TimeUnit::Day => 60.0 * 60.0 * 24.0,
        }
    }
}

impl FromStr for DurationUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let caps = DURATION_REGEX
            .captures(trimmed)
            .ok_or_else(|| Error::Syntax(s.to_owned()))?;
        let value = caps["value"]
            .parse::<f64>()
            .map_err(|_| Error::Syntax(s.to_owned()))?;
        let unit = match caps.name("unit") {
            Some(unit) => unit.as_str().parse::<TimeUnit>()?,
            None => TimeUnit::Second,
        };
        Ok(Self { value, unit })
    }
}

impl TryFrom<DurationUnit> for Duration {
    type Error = Error;

    /// Fails when the value does not fit a `Duration`.
    fn try_from(unit: DurationUnit) -> Result<Self, Self::Error> {
        Duration::try_from_secs_f64(unit.value * unit.unit.as_secs_f64())
            .map_err(|_| Error::Syntax(unit.value.to_string()))
    }
}

impl FromStr for TimeUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ns" | "nanosecond" | "nanos" | "nanoseconds" => Ok(TimeUnit::Nanosecond),
            "us" | "microsecond" | "micros" | "microseconds" => Ok(TimeUnit::Microsecond),
            "ms" | "millisecond" | "millis" | "milliseconds" => Ok(TimeUnit::Millisecond),
            "s" | "sec" | "second" | "secs" | "seconds" => Ok(TimeUnit::Second),
            "m" | "min" | "minute" | "mins" | "minutes" => Ok(TimeUnit::Minute),
            "h" | "hour" | "hours" => Ok(TimeUnit::Hour),
            "d" | "day" | "days" => Ok(TimeUnit::Day),
            _ => Err(Error::UnitNotSupported(s.to_owned())),
        }
    }
}

/// Parses a human written duration, used by the command line options.
pub fn parse_duration(s: &str) -> Result<Duration, Error> {
    let unit = s.parse::<DurationUnit>()?;
    Duration::try_from(unit).map_err(|_| Error::Syntax(s.to_owned()))
}
