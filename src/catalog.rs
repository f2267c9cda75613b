//! The on-disk catalog artifact.
//!
//! A catalog file is a header line followed by one semicolon delimited line
//! per event. Which header is present tells a reader which of the two
//! layouts it is looking at: the FDSN layout carries magnitude type and an
//! event name, the ISC layout carries a full focal mechanism instead.
//!
//! Values are written with fixed precision (seconds 2 decimals, coordinates 4,
//! depth and magnitude 1, moment and tensor components 3, angles 2). Reading a
//! file back reproduces values to that precision only.

use std::fs;
use std::io::{self, Write};

use camino::Utf8Path;
use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta, Timelike};
use serde::Serialize;

use crate::error::QuakeError;

pub const FDSN_HEADER: &str =
    "YEAR;MONTH;DAY;HOUR;MINUTES;SECONDS;LONGITUDE;LATITUDE;DEPTH;MAG_TYPE;MAG;EVENT_NAME";

pub const ISC_HEADER: &str = "YEAR; MONTH; DAY; HOUR; MIN; SEC; LONGITUDE; LATITUDE; DEPTH; EXP(Nm); M0; MAG; Mrr; Mtt; Mpp; Mrt; Mtp; Mpr; Str1; Dip1; Rake1; Str2; Dip2; Rake2";

const FDSN_FIELDS: usize = 12;
const ISC_FIELDS: usize = 24;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogRecord {
    pub origin: NaiveDateTime,
    pub longitude: f64,
    pub latitude: f64,
    pub depth_km: f64,
    pub magnitude: f64,
}

impl CatalogRecord {
    pub fn origin_seconds(&self) -> f64 {
        f64::from(self.origin.second()) + f64::from(self.origin.nanosecond()) / 1e9
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MomentTensor {
    pub mrr: f64,
    pub mtt: f64,
    pub mpp: f64,
    pub mrt: f64,
    pub mtp: f64,
    pub mpr: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NodalPlane {
    pub strike: f64,
    pub dip: f64,
    pub rake: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FocalMechanism {
    /// Power of ten applied to the scalar moment and tensor, in N·m.
    pub exponent: i32,
    pub scalar_moment: f64,
    pub tensor: MomentTensor,
    pub planes: [NodalPlane; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FdsnRecord {
    pub event: CatalogRecord,
    pub magnitude_type: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IscRecord {
    pub event: CatalogRecord,
    pub mechanism: FocalMechanism,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogSchema {
    Fdsn,
    Isc,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CatalogFile {
    FdsnSchema(Vec<FdsnRecord>),
    IscSchema(Vec<IscRecord>),
}

impl CatalogFile {
    pub fn schema(&self) -> CatalogSchema {
        match self {
            CatalogFile::FdsnSchema(_) => CatalogSchema::Fdsn,
            CatalogFile::IscSchema(_) => CatalogSchema::Isc,
        }
    }

    pub fn header(&self) -> &'static str {
        match self {
            CatalogFile::FdsnSchema(_) => FDSN_HEADER,
            CatalogFile::IscSchema(_) => ISC_HEADER,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            CatalogFile::FdsnSchema(records) => records.len(),
            CatalogFile::IscSchema(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn events(&self) -> Vec<&CatalogRecord> {
        match self {
            CatalogFile::FdsnSchema(records) => records.iter().map(|r| &r.event).collect(),
            CatalogFile::IscSchema(records) => records.iter().map(|r| &r.event).collect(),
        }
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writeln!(writer, "{}", self.header())?;
        match self {
            CatalogFile::FdsnSchema(records) => {
                for record in records {
                    write_fdsn_line(&mut writer, record)?;
                }
            }
            CatalogFile::IscSchema(records) => {
                for record in records {
                    write_isc_line(&mut writer, record)?;
                }
            }
        }
        Ok(())
    }

    pub fn read(path: &Utf8Path) -> Result<Self, QuakeError> {
        let text = fs::read_to_string(path.as_std_path())
            .map_err(|err| QuakeError::Filesystem(format!("read {path}: {err}")))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, QuakeError> {
        let mut lines = text.lines().enumerate();
        let (_, header) = lines
            .next()
            .ok_or_else(|| QuakeError::CatalogParse("empty catalog file".to_string()))?;
        let columns = normalize_header(header);

        if columns == normalize_header(FDSN_HEADER) {
            let records = lines
                .filter(|(_, line)| !line.trim().is_empty())
                .map(|(index, line)| parse_fdsn_line(index + 1, line))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(CatalogFile::FdsnSchema(records))
        } else if columns == normalize_header(ISC_HEADER) {
            let records = lines
                .filter(|(_, line)| !line.trim().is_empty())
                .map(|(index, line)| parse_isc_line(index + 1, line))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(CatalogFile::IscSchema(records))
        } else {
            Err(QuakeError::CatalogParse(format!(
                "unrecognized header: {header}"
            )))
        }
    }
}

/// Builds an origin time from split calendar fields, carrying fractional
/// seconds at millisecond resolution.
pub fn origin_from_parts(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    seconds: f64,
) -> Option<NaiveDateTime> {
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0)?;
    let millis = (seconds * 1000.0).round() as i64;
    base.checked_add_signed(TimeDelta::milliseconds(millis))
}

fn write_fdsn_line<W: Write>(writer: &mut W, record: &FdsnRecord) -> io::Result<()> {
    let event = &record.event;
    writeln!(
        writer,
        "{:4};{:2};{:2};{:2};{:2};{:5.2};{:9.4};{:9.4};{:5.1};{:<5};{:3.1};{}",
        event.origin.year(),
        event.origin.month(),
        event.origin.day(),
        event.origin.hour(),
        event.origin.minute(),
        event.origin_seconds(),
        event.longitude,
        event.latitude,
        event.depth_km,
        record.magnitude_type,
        event.magnitude,
        record.description,
    )
}

fn write_isc_line<W: Write>(writer: &mut W, record: &IscRecord) -> io::Result<()> {
    let event = &record.event;
    let mechanism = &record.mechanism;
    let tensor = &mechanism.tensor;
    let [first, second] = &mechanism.planes;
    writeln!(
        writer,
        "{:4};{:2};{:2};{:2};{:2};{:5.2};{:9.4};{:9.4};{:5.1};{:2};{:5.3};{:3.1};\
         {:6.3};{:6.3};{:6.3};{:6.3};{:6.3};{:6.3};\
         {:7.2};{:5.2};{:7.2};{:7.2};{:5.2};{:7.2}",
        event.origin.year(),
        event.origin.month(),
        event.origin.day(),
        event.origin.hour(),
        event.origin.minute(),
        event.origin_seconds(),
        event.longitude,
        event.latitude,
        event.depth_km,
        mechanism.exponent,
        mechanism.scalar_moment,
        event.magnitude,
        tensor.mrr,
        tensor.mtt,
        tensor.mpp,
        tensor.mrt,
        tensor.mtp,
        tensor.mpr,
        first.strike,
        first.dip,
        first.rake,
        second.strike,
        second.dip,
        second.rake,
    )
}

fn normalize_header(header: &str) -> Vec<&str> {
    header.split(';').map(str::trim).collect()
}

struct Fields<'a> {
    line: usize,
    values: Vec<&'a str>,
}

impl<'a> Fields<'a> {
    fn new(line: usize, values: Vec<&'a str>, expected: usize) -> Result<Self, QuakeError> {
        if values.len() != expected {
            return Err(QuakeError::CatalogParse(format!(
                "line {line}: expected {expected} fields, found {}",
                values.len()
            )));
        }
        Ok(Self { line, values })
    }

    fn text(&self, index: usize) -> &'a str {
        self.values[index].trim()
    }

    fn parse<T: std::str::FromStr>(&self, index: usize) -> Result<T, QuakeError> {
        self.text(index).parse::<T>().map_err(|_| {
            QuakeError::CatalogParse(format!(
                "line {}: invalid value in column {}: {:?}",
                self.line,
                index + 1,
                self.values[index]
            ))
        })
    }

    fn event(&self, coordinates_at: usize) -> Result<CatalogRecord, QuakeError> {
        let origin = origin_from_parts(
            self.parse(0)?,
            self.parse(1)?,
            self.parse(2)?,
            self.parse(3)?,
            self.parse(4)?,
            self.parse(5)?,
        )
        .ok_or_else(|| {
            QuakeError::CatalogParse(format!("line {}: invalid origin time", self.line))
        })?;
        Ok(CatalogRecord {
            origin,
            longitude: self.parse(coordinates_at)?,
            latitude: self.parse(coordinates_at + 1)?,
            depth_km: self.parse(coordinates_at + 2)?,
            magnitude: 0.0,
        })
    }
}

fn parse_fdsn_line(line: usize, text: &str) -> Result<FdsnRecord, QuakeError> {
    let fields = Fields::new(line, text.splitn(FDSN_FIELDS, ';').collect(), FDSN_FIELDS)?;
    let mut event = fields.event(6)?;
    event.magnitude = fields.parse(10)?;
    Ok(FdsnRecord {
        event,
        magnitude_type: fields.text(9).to_string(),
        description: fields.values[11].to_string(),
    })
}

fn parse_isc_line(line: usize, text: &str) -> Result<IscRecord, QuakeError> {
    let fields = Fields::new(line, text.split(';').collect(), ISC_FIELDS)?;
    let mut event = fields.event(6)?;
    event.magnitude = fields.parse(11)?;
    let plane = |at: usize| -> Result<NodalPlane, QuakeError> {
        Ok(NodalPlane {
            strike: fields.parse(at)?,
            dip: fields.parse(at + 1)?,
            rake: fields.parse(at + 2)?,
        })
    };
    let mechanism = FocalMechanism {
        exponent: fields.parse(9)?,
        scalar_moment: fields.parse(10)?,
        tensor: MomentTensor {
            mrr: fields.parse(12)?,
            mtt: fields.parse(13)?,
            mpp: fields.parse(14)?,
            mrt: fields.parse(15)?,
            mtp: fields.parse(16)?,
            mpr: fields.parse(17)?,
        },
        planes: [plane(18)?, plane(21)?],
    };
    Ok(IscRecord { event, mechanism })
}
