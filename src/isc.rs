use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;
use reqwest::blocking::Client;

use crate::catalog::{
    CatalogRecord, FocalMechanism, IscRecord, MomentTensor, NodalPlane, origin_from_parts,
};
use crate::config::HttpSettings;
use crate::domain::Region;
use crate::error::QuakeError;
use crate::query::QueryDescriptor;

pub const DEFAULT_ENDPOINT: &str = "http://isc-mirror.iris.washington.edu/cgi-bin/web-db-v4";

/// Body line the comprehensive search returns when nothing matched.
pub const NO_EVENTS_SENTINEL: &str = "No events were found.";

pub const DEFAULT_PREAMBLE_LINES: usize = 27;
pub const DEFAULT_FOOTER_LINES: usize = 5;

/// Columns that must be non-empty for a row to be kept:
/// date, time, latitude, longitude, depth, exponent, M0, magnitude, Mrr.
pub const REQUIRED_COLUMNS: [usize; 9] = [2, 3, 4, 5, 6, 9, 10, 11, 13];

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").expect("date pattern compiles")
});

static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2}):(\d{1,2}):(\d{1,2}(?:\.\d*)?)$").expect("time pattern compiles")
});

pub trait IscClient: Send + Sync {
    /// Streams the raw search response for `url` into `destination`.
    fn download(&self, url: &Url, destination: &Path) -> Result<(), QuakeError>;
}

#[derive(Clone)]
pub struct IscHttpClient {
    client: Client,
}

impl IscHttpClient {
    pub fn new(settings: &HttpSettings) -> Result<Self, QuakeError> {
        let client = settings
            .client_builder()
            .build()
            .map_err(|err| QuakeError::IscHttp(err.to_string()))?;
        Ok(Self { client })
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, QuakeError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "ISC request failed".to_string());
        Err(QuakeError::IscStatus { status, message })
    }
}

impl IscClient for IscHttpClient {
    fn download(&self, url: &Url, destination: &Path) -> Result<(), QuakeError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|err| QuakeError::IscHttp(err.to_string()))?;
        let mut response = Self::handle_status(response)?;
        let mut file =
            File::create(destination).map_err(|err| QuakeError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| QuakeError::IscHttp(err.to_string()))?;
        Ok(())
    }
}

/// Comprehensive-search URL returning focal mechanisms as CSV.
pub fn search_url(endpoint: &Url, query: &QueryDescriptor) -> Url {
    let mut url = endpoint.clone();
    {
        let mut pairs = url.query_pairs_mut();
        pairs
            .append_pair("request", "COMPREHENSIVE")
            .append_pair("out_format", "FMCSV");

        match query.region {
            Region::Rectangular {
                min_latitude,
                max_latitude,
                min_longitude,
                max_longitude,
            } => {
                pairs
                    .append_pair("searchshape", "RECT")
                    .append_pair("bot_lat", &min_latitude.to_string())
                    .append_pair("top_lat", &max_latitude.to_string())
                    .append_pair("left_lon", &min_longitude.to_string())
                    .append_pair("right_lon", &max_longitude.to_string())
                    .append_pair("ctr_lat", "")
                    .append_pair("ctr_lon", "")
                    .append_pair("radius", "");
            }
            Region::Circular {
                latitude,
                longitude,
                max_radius,
                ..
            } => {
                pairs
                    .append_pair("searchshape", "CIRC")
                    .append_pair("bot_lat", "")
                    .append_pair("top_lat", "")
                    .append_pair("left_lon", "")
                    .append_pair("right_lon", "")
                    .append_pair("ctr_lat", &latitude.to_string())
                    .append_pair("ctr_lon", &longitude.to_string())
                    .append_pair("radius", &max_radius.to_string());
            }
        }
        pairs
            .append_pair("max_dist_units", "deg")
            .append_pair("srn", "")
            .append_pair("grn", "");

        for (prefix, time) in [("start", query.time.start), ("end", query.time.end)] {
            pairs
                .append_pair(&format!("{prefix}_year"), &time.format("%Y").to_string())
                .append_pair(&format!("{prefix}_month"), &time.format("%m").to_string())
                .append_pair(&format!("{prefix}_day"), &time.format("%d").to_string())
                .append_pair(
                    &format!("{prefix}_time"),
                    &time.format("%H:%M:%S").to_string(),
                );
        }

        pairs
            .append_pair("min_dep", &query.depth.min_km().to_string())
            .append_pair("max_dep", &query.depth.max_km().to_string())
            .append_pair("min_mag", &query.magnitude.min.to_string())
            .append_pair("max_mag", &query.magnitude.max.to_string())
            .append_pair("req_mag_type", "")
            .append_pair("req_mag_agcy", "")
            .append_pair("include_links", "off");
    }
    url
}

pub fn is_no_events_response(body: &str) -> bool {
    body.lines().any(|line| line.trim_end() == NO_EVENTS_SENTINEL)
}

/// Drops the provider's fixed preamble and footer, keeping line endings.
pub fn strip_envelope(body: &str, preamble: usize, footer: usize) -> String {
    let lines = body.split_inclusive('\n').collect::<Vec<_>>();
    let end = lines.len().saturating_sub(footer);
    if preamble >= end {
        return String::new();
    }
    lines[preamble..end].concat()
}

/// Parses the headerless FMCSV table left after [`strip_envelope`].
pub fn parse_table<R: Read>(reader: R) -> Result<Vec<IscRecord>, QuakeError> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut rows = 0usize;
    let mut records = Vec::new();
    for (index, row) in csv.records().enumerate() {
        let row = row.map_err(|err| QuakeError::IscParse(err.to_string()))?;
        rows += 1;
        let cells = row.iter().map(str::trim).collect::<Vec<_>>();
        let present = |column: usize| cells.get(column).is_some_and(|value| !value.is_empty());
        if !REQUIRED_COLUMNS.iter().all(|&column| present(column)) {
            continue;
        }
        records.push(parse_row(index + 1, &cells)?);
    }

    if rows == 0 {
        return Err(QuakeError::IscParse("no tabular data in response".to_string()));
    }
    Ok(records)
}

fn parse_row(row: usize, cells: &[&str]) -> Result<IscRecord, QuakeError> {
    let invalid = |what: &str, value: &str| {
        QuakeError::IscParse(format!("row {row}: invalid {what}: {value:?}"))
    };
    let required = |column: usize| -> Result<f64, QuakeError> {
        cells[column]
            .parse::<f64>()
            .map_err(|_| invalid(&format!("column {column}"), cells[column]))
    };
    let optional = |column: usize| -> Result<f64, QuakeError> {
        match cells.get(column).copied() {
            None | Some("") => Ok(f64::NAN),
            Some(value) => value
                .parse::<f64>()
                .map_err(|_| invalid(&format!("column {column}"), value)),
        }
    };

    let date = DATE_RE
        .captures(cells[2])
        .ok_or_else(|| invalid("date", cells[2]))?;
    let time = TIME_RE
        .captures(cells[3])
        .ok_or_else(|| invalid("time", cells[3]))?;
    let component = |value: &str| value.parse::<u32>().map_err(|_| invalid("date", value));
    let year = date[1]
        .parse::<i32>()
        .map_err(|_| invalid("year", &date[1]))?;
    let seconds = time[3]
        .parse::<f64>()
        .map_err(|_| invalid("seconds", &time[3]))?;
    let origin = origin_from_parts(
        year,
        component(&date[2])?,
        component(&date[3])?,
        component(&time[1])?,
        component(&time[2])?,
        seconds,
    )
    .ok_or_else(|| invalid("origin time", &format!("{} {}", cells[2], cells[3])))?;

    let exponent = cells[9]
        .parse::<i32>()
        .map_err(|_| invalid("exponent", cells[9]))?;

    Ok(IscRecord {
        event: CatalogRecord {
            origin,
            longitude: required(5)?,
            latitude: required(4)?,
            depth_km: required(6)?,
            magnitude: required(11)?,
        },
        mechanism: FocalMechanism {
            exponent,
            scalar_moment: required(10)?,
            tensor: MomentTensor {
                mrr: required(13)?,
                mtt: optional(14)?,
                mpp: optional(15)?,
                mrt: optional(16)?,
                mtp: optional(17)?,
                mpr: optional(18)?,
            },
            planes: [
                NodalPlane {
                    strike: optional(19)?,
                    dip: optional(20)?,
                    rake: optional(21)?,
                },
                NodalPlane {
                    strike: optional(22)?,
                    dip: optional(23)?,
                    rake: optional(24)?,
                },
            ],
        },
    })
}
