use chrono::NaiveDateTime;
use reqwest::StatusCode;
use reqwest::Url;
use reqwest::blocking::Client;

use crate::catalog::{CatalogRecord, FdsnRecord};
use crate::config::HttpSettings;
use crate::domain::{Region, km_to_m, m_to_km};
use crate::error::QuakeError;
use crate::query::QueryDescriptor;

pub const DEFAULT_ENDPOINT: &str = "https://service.iris.edu/fdsnws/event/1/query";

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// One event from the FDSN text response. Depth is held in meters.
#[derive(Debug, Clone, PartialEq)]
pub struct FdsnEvent {
    pub origin: NaiveDateTime,
    pub latitude: f64,
    pub longitude: f64,
    pub depth_m: f64,
    pub magnitude_type: String,
    pub magnitude: f64,
    pub description: String,
}

impl FdsnEvent {
    pub fn into_record(self) -> FdsnRecord {
        FdsnRecord {
            event: CatalogRecord {
                origin: self.origin,
                longitude: self.longitude,
                latitude: self.latitude,
                depth_km: m_to_km(self.depth_m),
                magnitude: self.magnitude,
            },
            magnitude_type: self.magnitude_type,
            description: self.description,
        }
    }
}

pub trait FdsnClient: Send + Sync {
    fn get_events(&self, url: &Url) -> Result<Vec<FdsnEvent>, QuakeError>;
}

#[derive(Clone)]
pub struct FdsnHttpClient {
    client: Client,
}

impl FdsnHttpClient {
    pub fn new(settings: &HttpSettings) -> Result<Self, QuakeError> {
        let client = settings
            .client_builder()
            .build()
            .map_err(|err| QuakeError::FdsnHttp(err.to_string()))?;
        Ok(Self { client })
    }
}

impl FdsnClient for FdsnHttpClient {
    fn get_events(&self, url: &Url) -> Result<Vec<FdsnEvent>, QuakeError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|err| QuakeError::FdsnHttp(err.to_string()))?;
        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Err(QuakeError::FdsnNoData);
        }
        if !status.is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| "FDSN request failed".to_string());
            return Err(QuakeError::FdsnStatus {
                status: status.as_u16(),
                message,
            });
        }
        let body = response
            .text()
            .map_err(|err| QuakeError::FdsnHttp(err.to_string()))?;
        let events = parse_events(&body)?;
        if events.is_empty() {
            return Err(QuakeError::FdsnNoData);
        }
        Ok(events)
    }
}

/// Event query URL. Only the parameters of the active region shape are sent;
/// depth goes out in kilometers.
pub fn query_url(endpoint: &Url, query: &QueryDescriptor) -> Url {
    let mut url = endpoint.clone();
    {
        let mut pairs = url.query_pairs_mut();
        pairs
            .append_pair("starttime", &query.time.start.format(TIME_FORMAT).to_string())
            .append_pair("endtime", &query.time.end.format(TIME_FORMAT).to_string());

        match query.region {
            Region::Rectangular {
                min_latitude,
                max_latitude,
                min_longitude,
                max_longitude,
            } => {
                pairs
                    .append_pair("minlatitude", &min_latitude.to_string())
                    .append_pair("maxlatitude", &max_latitude.to_string())
                    .append_pair("minlongitude", &min_longitude.to_string())
                    .append_pair("maxlongitude", &max_longitude.to_string());
            }
            Region::Circular {
                latitude,
                longitude,
                min_radius,
                max_radius,
            } => {
                pairs
                    .append_pair("latitude", &latitude.to_string())
                    .append_pair("longitude", &longitude.to_string())
                    .append_pair("minradius", &min_radius.to_string())
                    .append_pair("maxradius", &max_radius.to_string());
            }
        }

        pairs
            .append_pair("mindepth", &query.depth.min_km().to_string())
            .append_pair("maxdepth", &query.depth.max_km().to_string())
            .append_pair("minmagnitude", &query.magnitude.min.to_string())
            .append_pair("maxmagnitude", &query.magnitude.max.to_string())
            .append_pair("format", "text");
    }
    url
}

/// Parses the `format=text` response:
/// `EventID|Time|Latitude|Longitude|Depth/km|Author|Catalog|Contributor|ContributorID|MagType|Magnitude|MagAuthor|EventLocationName`.
pub fn parse_events(body: &str) -> Result<Vec<FdsnEvent>, QuakeError> {
    body.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| parse_line(index + 1, line))
        .collect()
}

fn parse_line(line_no: usize, line: &str) -> Result<FdsnEvent, QuakeError> {
    let fields = line.split('|').map(str::trim).collect::<Vec<_>>();
    if fields.len() < 11 {
        return Err(QuakeError::FdsnParse(format!(
            "line {line_no}: expected at least 11 fields, found {}",
            fields.len()
        )));
    }
    let number = |index: usize, name: &str| -> Result<f64, QuakeError> {
        fields[index].parse::<f64>().map_err(|_| {
            QuakeError::FdsnParse(format!(
                "line {line_no}: invalid {name}: {:?}",
                fields[index]
            ))
        })
    };

    let time = fields[1].trim_end_matches('Z');
    let origin = NaiveDateTime::parse_from_str(time, "%Y-%m-%dT%H:%M:%S%.f").map_err(|err| {
        QuakeError::FdsnParse(format!("line {line_no}: invalid time {time:?}: {err}"))
    })?;

    Ok(FdsnEvent {
        origin,
        latitude: number(2, "latitude")?,
        longitude: number(3, "longitude")?,
        depth_m: km_to_m(number(4, "depth")?),
        magnitude_type: fields[9].to_string(),
        magnitude: number(10, "magnitude")?,
        description: fields.get(12).map(|value| value.to_string()).unwrap_or_default(),
    })
}
