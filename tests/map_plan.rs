use eqfinder::catalog::CatalogFile;
use eqfinder::fdsn;
use eqfinder::isc::{self, DEFAULT_FOOTER_LINES, DEFAULT_PREAMBLE_LINES};
use eqfinder::map_plan::{DepthScale, MapExtent, MapPlanBuilder, MapScale, jet};

fn fdsn_catalog() -> CatalogFile {
    let events = fdsn::parse_events(include_str!("fixtures/fdsn_events.txt")).unwrap();
    CatalogFile::FdsnSchema(events.into_iter().map(|event| event.into_record()).collect())
}

fn isc_catalog() -> CatalogFile {
    let table = isc::strip_envelope(
        include_str!("fixtures/isc_fmcsv.txt"),
        DEFAULT_PREAMBLE_LINES,
        DEFAULT_FOOTER_LINES,
    );
    CatalogFile::IscSchema(isc::parse_table(table.as_bytes()).unwrap())
}

#[test]
fn data_extent_is_padded() {
    let plan = MapPlanBuilder::new().build(&fdsn_catalog()).unwrap();

    // Sumatra to Ecuador spans more than 200 degrees.
    assert_eq!(plan.scale, MapScale::Global);
    assert_eq!(plan.extent.lower_latitude, -4.9082 - 3.0);
    assert_eq!(plan.extent.upper_longitude, 130.7543 + 3.0);
    assert_eq!(plan.depth_scale.min_km, 10.0);
    assert_eq!(plan.depth_scale.max_km, 24.0);
    assert_eq!(plan.legend.len(), 3);
}

#[test]
fn marker_size_and_colour_follow_magnitude_and_depth() {
    let plan = MapPlanBuilder::new().build(&fdsn_catalog()).unwrap();

    // Magnitudes 7.8, 7.0, 6.2; depths 24.0, 10.0, 20.6.
    let [sumatra, kyushu, ecuador] = &plan.markers[..] else {
        panic!("expected three markers");
    };
    assert!((ecuador.size - 2.0).abs() < 1e-9);
    assert!((sumatra.size - (7.8 - 6.2 + 1.0) * 2.0).abs() < 1e-9);
    assert_eq!(kyushu.color, jet(0.0));
    assert_eq!(sumatra.color, jet(1.0));
    assert!(sumatra.glyph.is_none());
}

#[test]
fn world_bounds_use_global_scale() {
    let world = MapExtent {
        lower_latitude: -90.0,
        lower_longitude: -180.0,
        upper_latitude: 90.0,
        upper_longitude: 180.0,
    };
    let plan = MapPlanBuilder::new()
        .extent(Some(world))
        .depth_scale(DepthScale {
            min_km: 0.0,
            max_km: 700.0,
        })
        .build(&fdsn_catalog())
        .unwrap();

    assert_eq!(plan.scale, MapScale::Global);
    assert_eq!(plan.extent, world);
    assert_eq!(plan.legend[0].magnitude, 5.0);
    assert!((plan.legend[0].size - 2.0).abs() < 1e-9);
}

#[test]
fn isc_markers_carry_first_nodal_plane() {
    let plan = MapPlanBuilder::new().build(&isc_catalog()).unwrap();

    let glyph = plan.markers[0].glyph.expect("plane present");
    assert_eq!(glyph.plane.strike, 4.0);
    assert_eq!(glyph.plane.rake, -177.0);
    assert!((glyph.width - (7.8 - 7.0 + 1.0) * 120_000.0).abs() < 1e-6);
    assert!(plan.markers[1].glyph.is_none());
    assert!(plan.legend.is_empty());
}

#[test]
fn empty_catalog_has_no_plan() {
    assert!(
        MapPlanBuilder::new()
            .build(&CatalogFile::FdsnSchema(Vec::new()))
            .is_none()
    );
}
