//! Query argument parsing.
//!
//! The command line carries a single comma separated argument of `key=value`
//! pairs, e.g. `st=2016/3/29,et=2016/9/22,mnmag=5,fm=yes`. Every key has a
//! default, so an absent argument is a valid query.

use std::fmt;

use camino::Utf8PathBuf;
use chrono::{DateTime, Datelike, Months, NaiveDate, TimeZone, Timelike, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{DepthRange, FocalFlag, MagnitudeRange, Region, TimeWindow};
use crate::error::QuakeError;

pub const DEFAULT_OUTPUT: &str = "catalog.txt";

/// Keys understood by [`QueryBuilder`], shown in the CLI help.
pub const RECOGNIZED_KEYS: &str = "mnla(-90),mxla(90),mnlo(-180),mxlo(180),mndep(0),mxdep(700),\
mnmag(4),mxmag(10),mnrad(0),mxrad(10),clat(None),clon(None),st(-1 month),et(current time),\
fm(no),outfile(catalog.txt)";

const TIME_FORMAT: &str = "%Y/%m/%d/%H/%M/%S";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryDescriptor {
    pub time: TimeWindow,
    pub region: Region,
    pub depth: DepthRange,
    pub magnitude: MagnitudeRange,
    pub focal_mechanism: bool,
}

impl QueryDescriptor {
    /// Canonical `key=value` form. Parsing it again yields an equal descriptor.
    pub fn to_argument(&self) -> String {
        let mut parts = Vec::new();
        match self.region {
            Region::Rectangular {
                min_latitude,
                max_latitude,
                min_longitude,
                max_longitude,
            } => {
                parts.push(format!("mnla={min_latitude}"));
                parts.push(format!("mxla={max_latitude}"));
                parts.push(format!("mnlo={min_longitude}"));
                parts.push(format!("mxlo={max_longitude}"));
            }
            Region::Circular {
                latitude,
                longitude,
                min_radius,
                max_radius,
            } => {
                parts.push(format!("clat={latitude}"));
                parts.push(format!("clon={longitude}"));
                parts.push(format!("mnrad={min_radius}"));
                parts.push(format!("mxrad={max_radius}"));
            }
        }
        parts.push(format!("mndep={}", self.depth.min_km()));
        parts.push(format!("mxdep={}", self.depth.max_km()));
        parts.push(format!("mnmag={}", self.magnitude.min));
        parts.push(format!("mxmag={}", self.magnitude.max));
        parts.push(format!("st={}", self.time.start.format(TIME_FORMAT)));
        parts.push(format!("et={}", self.time.end.format(TIME_FORMAT)));
        parts.push(format!("fm={}", FocalFlag(self.focal_mechanism)));
        parts.join(",")
    }

    /// Human readable summary printed before a fetch.
    pub fn describe(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for QueryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Start time: {}", self.time.start.format(TIME_FORMAT))?;
        writeln!(f, "End time: {}", self.time.end.format(TIME_FORMAT))?;
        match self.region {
            Region::Circular {
                latitude,
                longitude,
                min_radius,
                max_radius,
            } => {
                writeln!(f, "\nSearching for circular region:")?;
                writeln!(f, "Min radius= {min_radius}")?;
                writeln!(f, "Max radius= {max_radius}")?;
                writeln!(f, "Central latitude= {latitude}")?;
                writeln!(f, "Central longitude= {longitude}")?;
            }
            Region::Rectangular {
                min_latitude,
                max_latitude,
                min_longitude,
                max_longitude,
            } => {
                writeln!(f, "\nSearching for rectangular region:")?;
                writeln!(f, "Min latitude= {min_latitude}")?;
                writeln!(f, "Max latitude= {max_latitude}")?;
                writeln!(f, "Min longitude= {min_longitude}")?;
                writeln!(f, "Max longitude= {max_longitude}")?;
            }
        }
        writeln!(f, "Min depth= {}", self.depth.min_km())?;
        writeln!(f, "Max depth= {}", self.depth.max_km())?;
        writeln!(f, "Min magnitude= {}", self.magnitude.min)?;
        write!(f, "Max magnitude= {}", self.magnitude.max)
    }
}

/// A descriptor plus where the catalog should be written.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub descriptor: QueryDescriptor,
    pub output: Utf8PathBuf,
}

#[derive(Debug, Clone)]
pub struct QueryDefaults {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub output: Utf8PathBuf,
}

impl QueryDefaults {
    /// Defaults relative to `now`: the window covers the preceding calendar month.
    pub fn at(now: DateTime<Utc>) -> Self {
        let end = now.with_nanosecond(0).unwrap_or(now);
        let start = end.checked_sub_months(Months::new(1)).unwrap_or(end);
        Self {
            start,
            end,
            output: Utf8PathBuf::from(DEFAULT_OUTPUT),
        }
    }

    pub fn with_output(mut self, output: Utf8PathBuf) -> Self {
        self.output = output;
        self
    }
}

/// What to do when the query argument is malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParsePolicy {
    /// Report the problem and continue with an all-default query.
    #[default]
    DefaultOnParseError,
    Strict,
}

#[derive(Debug)]
pub struct ParseOutcome {
    pub request: QueryRequest,
    /// Set when [`ParsePolicy::DefaultOnParseError`] discarded a malformed argument.
    pub recovered: Option<QuakeError>,
}

#[derive(Debug, Clone)]
pub struct QueryBuilder {
    defaults: QueryDefaults,
}

impl QueryBuilder {
    pub fn new(defaults: QueryDefaults) -> Self {
        Self { defaults }
    }

    pub fn default_request(&self) -> QueryRequest {
        RawQuery::new(&self.defaults).finish()
    }

    pub fn resolve(
        &self,
        argument: Option<&str>,
        policy: ParsePolicy,
    ) -> Result<ParseOutcome, QuakeError> {
        let Some(argument) = argument else {
            return Ok(ParseOutcome {
                request: self.default_request(),
                recovered: None,
            });
        };

        match self.parse_argument(argument) {
            Ok(request) => Ok(ParseOutcome {
                request,
                recovered: None,
            }),
            Err(err) if policy == ParsePolicy::DefaultOnParseError => {
                warn!(error = %err, "query argument rejected, using defaults");
                Ok(ParseOutcome {
                    request: self.default_request(),
                    recovered: Some(err),
                })
            }
            Err(err) => Err(err),
        }
    }

    pub fn parse_argument(&self, argument: &str) -> Result<QueryRequest, QuakeError> {
        let tokens = argument.split(',').collect::<Vec<_>>();
        self.parse(&tokens)
    }

    pub fn parse<S: AsRef<str>>(&self, tokens: &[S]) -> Result<QueryRequest, QuakeError> {
        let mut raw = RawQuery::new(&self.defaults);
        for token in tokens {
            let token = token.as_ref().trim();
            if token.is_empty() {
                continue;
            }
            let (key, value) = token
                .split_once('=')
                .ok_or_else(|| QuakeError::InvalidToken(token.to_string()))?;
            raw.apply(key.trim(), value.trim())?;
        }
        raw.resolve_times()?;
        Ok(raw.finish())
    }
}

struct RawQuery {
    min_latitude: f64,
    max_latitude: f64,
    min_longitude: f64,
    max_longitude: f64,
    min_depth_km: f64,
    max_depth_km: f64,
    min_magnitude: f64,
    max_magnitude: f64,
    min_radius: f64,
    max_radius: f64,
    center_latitude: Option<f64>,
    center_longitude: Option<f64>,
    start: TimeParts,
    end: TimeParts,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    focal_mechanism: bool,
    output: Utf8PathBuf,
}

impl RawQuery {
    fn new(defaults: &QueryDefaults) -> Self {
        Self {
            min_latitude: -90.0,
            max_latitude: 90.0,
            min_longitude: -180.0,
            max_longitude: 180.0,
            min_depth_km: 0.0,
            max_depth_km: 700.0,
            min_magnitude: 4.0,
            max_magnitude: 10.0,
            min_radius: 0.0,
            max_radius: 10.0,
            center_latitude: None,
            center_longitude: None,
            start: TimeParts::from_datetime(&defaults.start),
            end: TimeParts::from_datetime(&defaults.end),
            start_time: defaults.start,
            end_time: defaults.end,
            focal_mechanism: false,
            output: defaults.output.clone(),
        }
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<(), QuakeError> {
        match key {
            "mnla" => self.min_latitude = number(key, value)?,
            "mxla" => self.max_latitude = number(key, value)?,
            "mnlo" => self.min_longitude = number(key, value)?,
            "mxlo" => self.max_longitude = number(key, value)?,
            "mndep" => self.min_depth_km = number(key, value)?,
            "mxdep" => self.max_depth_km = number(key, value)?,
            "mnmag" => self.min_magnitude = number(key, value)?,
            "mxmag" => self.max_magnitude = number(key, value)?,
            "mnrad" => self.min_radius = number(key, value)?,
            "mxrad" => self.max_radius = number(key, value)?,
            "clat" => self.center_latitude = optional_number(key, value)?,
            "clon" => self.center_longitude = optional_number(key, value)?,
            "st" => self.start.apply(key, value)?,
            "et" => self.end.apply(key, value)?,
            "fm" => self.focal_mechanism = value.parse::<FocalFlag>()?.0,
            "outfile" => {
                if value.is_empty() {
                    return Err(QuakeError::InvalidValue {
                        key: key.to_string(),
                        value: value.to_string(),
                    });
                }
                self.output = Utf8PathBuf::from(value);
            }
            other => debug!(key = other, "ignoring unknown query key"),
        }
        Ok(())
    }

    fn resolve_times(&mut self) -> Result<(), QuakeError> {
        self.start_time = self.start.to_datetime("st")?;
        self.end_time = self.end.to_datetime("et")?;
        Ok(())
    }

    fn finish(self) -> QueryRequest {
        let region = match (self.center_latitude, self.center_longitude) {
            (Some(latitude), Some(longitude)) => Region::Circular {
                latitude,
                longitude,
                min_radius: self.min_radius,
                max_radius: self.max_radius,
            },
            _ => Region::Rectangular {
                min_latitude: self.min_latitude,
                max_latitude: self.max_latitude,
                min_longitude: self.min_longitude,
                max_longitude: self.max_longitude,
            },
        };

        QueryRequest {
            descriptor: QueryDescriptor {
                time: TimeWindow {
                    start: self.start_time,
                    end: self.end_time,
                },
                region,
                depth: DepthRange::from_km(self.min_depth_km, self.max_depth_km),
                magnitude: MagnitudeRange {
                    min: self.min_magnitude,
                    max: self.max_magnitude,
                },
                focal_mechanism: self.focal_mechanism,
            },
            output: self.output,
        }
    }
}

/// Calendar components of a time token, `YYYY/MM/DD/HH/MM/SS`.
#[derive(Debug, Clone, Copy)]
struct TimeParts {
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
    /// Whether the day came from a token rather than the defaults.
    day_given: bool,
}

impl TimeParts {
    fn from_datetime(value: &DateTime<Utc>) -> Self {
        Self {
            year: value.year(),
            month: value.month(),
            day: value.day(),
            hour: value.hour(),
            minute: value.minute(),
            second: value.second(),
            day_given: false,
        }
    }

    /// Overwrites the leading components present in `value`; the rest keep
    /// their current values.
    fn apply(&mut self, key: &str, value: &str) -> Result<(), QuakeError> {
        let invalid = || QuakeError::InvalidTime {
            key: key.to_string(),
            value: value.to_string(),
        };
        let parts = value.split('/').collect::<Vec<_>>();
        if parts.len() > 6 {
            return Err(invalid());
        }
        for (index, part) in parts.iter().enumerate() {
            let part = part.trim();
            if part.is_empty() || !part.chars().all(|ch| ch.is_ascii_digit()) {
                return Err(invalid());
            }
            let number = part.parse::<u32>().map_err(|_| invalid())?;
            match index {
                0 => self.year = i32::try_from(number).map_err(|_| invalid())?,
                1 => self.month = number,
                2 => {
                    self.day = number;
                    self.day_given = true;
                }
                3 => self.hour = number,
                4 => self.minute = number,
                _ => self.second = number,
            }
        }
        Ok(())
    }

    /// An inherited day is clamped to the end of the target month; a day
    /// given in the token must exist as written.
    fn to_datetime(self, key: &str) -> Result<DateTime<Utc>, QuakeError> {
        let day = match last_day_of_month(self.year, self.month) {
            Some(last) if !self.day_given => self.day.min(last),
            _ => self.day,
        };
        Utc.with_ymd_and_hms(
            self.year,
            self.month,
            day,
            self.hour,
            self.minute,
            self.second,
        )
        .single()
        .ok_or_else(|| QuakeError::InvalidTime {
            key: key.to_string(),
            value: format!(
                "{:04}/{:02}/{:02}/{:02}/{:02}/{:02}",
                self.year, self.month, self.day, self.hour, self.minute, self.second
            ),
        })
    }
}

fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    (28..=31)
        .rev()
        .find(|&day| NaiveDate::from_ymd_opt(year, month, day).is_some())
}

fn number(key: &str, value: &str) -> Result<f64, QuakeError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|parsed| parsed.is_finite())
        .ok_or_else(|| QuakeError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })
}

fn optional_number(key: &str, value: &str) -> Result<Option<f64>, QuakeError> {
    if value.is_empty() {
        return Ok(None);
    }
    number(key, value).map(Some)
}
