//! Marker layout for rendering a catalog on a map.
//!
//! Drawing is left to an external renderer; this module only decides the
//! projection scale, the map extent and, per event, marker colour and size or
//! a focal-mechanism glyph.

use serde::Serialize;

use crate::catalog::{CatalogFile, NodalPlane};
use crate::domain::Region;

/// Extent diagonal, in degrees, above which a global projection is used.
pub const GLOBAL_SPAN_THRESHOLD: f64 = 200.0;
/// Padding around the data when no extent is given.
pub const EXTENT_PADDING: f64 = 3.0;
/// Catalogs at or above this size are not planned.
pub const MAX_PLOTTED_EVENTS: usize = 15_000;

const LEGEND_MAGNITUDES: [f64; 3] = [5.0, 6.0, 7.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MapScale {
    Global,
    Local,
}

impl MapScale {
    pub fn min_marker_size(self) -> f64 {
        match self {
            MapScale::Global => 1.0,
            MapScale::Local => 1.5,
        }
    }

    /// Smallest focal glyph width, in projected map units.
    pub fn min_glyph_width(self) -> f64 {
        match self {
            MapScale::Global => 100_000.0,
            MapScale::Local => 120_000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapExtent {
    pub lower_latitude: f64,
    pub lower_longitude: f64,
    pub upper_latitude: f64,
    pub upper_longitude: f64,
}

impl MapExtent {
    /// The extent of a rectangular search; circular searches have none.
    pub fn from_region(region: &Region) -> Option<Self> {
        match *region {
            Region::Rectangular {
                min_latitude,
                max_latitude,
                min_longitude,
                max_longitude,
            } => Some(Self {
                lower_latitude: min_latitude,
                lower_longitude: min_longitude,
                upper_latitude: max_latitude,
                upper_longitude: max_longitude,
            }),
            Region::Circular { .. } => None,
        }
    }

    pub fn diagonal(&self) -> f64 {
        (self.upper_longitude - self.lower_longitude)
            .hypot(self.upper_latitude - self.lower_latitude)
    }

    pub fn scale(&self) -> MapScale {
        if self.diagonal() > GLOBAL_SPAN_THRESHOLD {
            MapScale::Global
        } else {
            MapScale::Local
        }
    }
}

/// Linear depth normalization used for marker colour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DepthScale {
    pub min_km: f64,
    pub max_km: f64,
}

impl DepthScale {
    pub fn fraction(&self, depth_km: f64) -> Option<f64> {
        if !depth_km.is_finite() {
            return None;
        }
        let span = self.max_km - self.min_km;
        if span <= 0.0 {
            return Some(0.0);
        }
        Some(((depth_km - self.min_km) / span).clamp(0.0, 1.0))
    }
}

/// The classic "jet" colormap, blue through red.
pub fn jet(fraction: f64) -> [u8; 3] {
    let x = fraction.clamp(0.0, 1.0);
    let channel = |offset: f64| {
        let value = (1.5 - (4.0 * x - offset).abs()).clamp(0.0, 1.0);
        (value * 255.0).round() as u8
    };
    [channel(3.0), channel(2.0), channel(1.0)]
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Glyph {
    pub plane: NodalPlane,
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub longitude: f64,
    pub latitude: f64,
    pub depth_km: f64,
    pub magnitude: f64,
    pub color: [u8; 3],
    pub size: f64,
    pub glyph: Option<Glyph>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LegendEntry {
    pub magnitude: f64,
    pub size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapPlan {
    pub scale: MapScale,
    pub extent: MapExtent,
    pub depth_scale: DepthScale,
    pub markers: Vec<Marker>,
    pub legend: Vec<LegendEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct MapPlanBuilder {
    extent: Option<MapExtent>,
    depth_scale: Option<DepthScale>,
}

impl MapPlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extent(mut self, extent: Option<MapExtent>) -> Self {
        self.extent = extent;
        self
    }

    pub fn depth_scale(mut self, depth_scale: DepthScale) -> Self {
        self.depth_scale = Some(depth_scale);
        self
    }

    /// Returns `None` for empty catalogs and for catalogs too large to plot.
    pub fn build(&self, catalog: &CatalogFile) -> Option<MapPlan> {
        let events = catalog.events();
        if events.is_empty() || events.len() >= MAX_PLOTTED_EVENTS {
            return None;
        }

        let extent = self.extent.unwrap_or_else(|| data_extent(catalog));
        let scale = extent.scale();
        let depth_scale = self.depth_scale.unwrap_or_else(|| observed_depths(catalog));
        let min_magnitude = events
            .iter()
            .map(|event| event.magnitude)
            .filter(|magnitude| magnitude.is_finite())
            .fold(f64::INFINITY, f64::min);
        let relative = |magnitude: f64| {
            if magnitude.is_finite() && min_magnitude.is_finite() {
                magnitude - min_magnitude + 1.0
            } else {
                1.0
            }
        };

        let glyph_planes: Vec<Option<NodalPlane>> = match catalog {
            CatalogFile::FdsnSchema(records) => vec![None; records.len()],
            CatalogFile::IscSchema(records) => records
                .iter()
                .map(|record| {
                    let plane = record.mechanism.planes[0];
                    let valid = [plane.strike, plane.dip, plane.rake]
                        .iter()
                        .all(|value| value.is_finite());
                    valid.then_some(plane)
                })
                .collect(),
        };

        let markers = events
            .iter()
            .zip(glyph_planes)
            .map(|(event, plane)| Marker {
                longitude: event.longitude,
                latitude: event.latitude,
                depth_km: event.depth_km,
                magnitude: event.magnitude,
                color: depth_scale.fraction(event.depth_km).map_or([0, 0, 0], jet),
                size: relative(event.magnitude) * scale.min_marker_size() * 2.0,
                glyph: plane.map(|plane| Glyph {
                    plane,
                    width: relative(event.magnitude) * scale.min_glyph_width(),
                }),
            })
            .collect();

        let legend = match catalog {
            CatalogFile::FdsnSchema(_) => LEGEND_MAGNITUDES
                .iter()
                .map(|&magnitude| LegendEntry {
                    magnitude,
                    // Reference magnitudes below the catalog minimum get the smallest marker.
                    size: relative(magnitude).max(1.0) * scale.min_marker_size() * 2.0,
                })
                .collect(),
            CatalogFile::IscSchema(_) => Vec::new(),
        };

        Some(MapPlan {
            scale,
            extent,
            depth_scale,
            markers,
            legend,
        })
    }
}

fn data_extent(catalog: &CatalogFile) -> MapExtent {
    let events = catalog.events();
    let (lat_min, lat_max) = min_max(events.iter().map(|event| event.latitude)).unwrap_or_default();
    let (lon_min, lon_max) = min_max(events.iter().map(|event| event.longitude)).unwrap_or_default();
    MapExtent {
        lower_latitude: lat_min - EXTENT_PADDING,
        lower_longitude: lon_min - EXTENT_PADDING,
        upper_latitude: lat_max + EXTENT_PADDING,
        upper_longitude: lon_max + EXTENT_PADDING,
    }
}

fn observed_depths(catalog: &CatalogFile) -> DepthScale {
    let (min_km, max_km) =
        min_max(catalog.events().iter().map(|event| event.depth_km)).unwrap_or_default();
    DepthScale { min_km, max_km }
}

/// Bounds of the finite values, if there are any.
fn min_max(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .filter(|value| value.is_finite())
        .fold(None, |bounds, value| match bounds {
            None => Some((value, value)),
            Some((low, high)) => Some((f64::min(low, value), f64::max(high, value))),
        })
}
