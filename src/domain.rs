use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::QuakeError;

const METERS_PER_KM: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Isc,
    Fdsn,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Isc => write!(f, "isc"),
            Provider::Fdsn => write!(f, "fdsn"),
        }
    }
}

/// Search area. Exactly one shape is ever active.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum Region {
    Rectangular {
        min_latitude: f64,
        max_latitude: f64,
        min_longitude: f64,
        max_longitude: f64,
    },
    Circular {
        latitude: f64,
        longitude: f64,
        min_radius: f64,
        max_radius: f64,
    },
}

impl Region {
    pub fn is_circular(&self) -> bool {
        matches!(self, Region::Circular { .. })
    }
}

/// Depth bounds, held in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DepthRange {
    pub min_m: f64,
    pub max_m: f64,
}

impl DepthRange {
    pub fn from_km(min_km: f64, max_km: f64) -> Self {
        Self {
            min_m: km_to_m(min_km),
            max_m: km_to_m(max_km),
        }
    }

    pub fn min_km(&self) -> f64 {
        m_to_km(self.min_m)
    }

    pub fn max_km(&self) -> f64 {
        m_to_km(self.max_m)
    }
}

pub fn km_to_m(km: f64) -> f64 {
    km * METERS_PER_KM
}

pub fn m_to_km(m: f64) -> f64 {
    m / METERS_PER_KM
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MagnitudeRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Value of the `fm` query key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocalFlag(pub bool);

impl FromStr for FocalFlag {
    type Err = QuakeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "yes" | "true" | "1" => Ok(Self(true)),
            "no" | "false" | "0" => Ok(Self(false)),
            _ => Err(QuakeError::InvalidValue {
                key: "fm".to_string(),
                value: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for FocalFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 { write!(f, "yes") } else { write!(f, "no") }
    }
}
