use std::collections::HashMap;

use chrono::{TimeZone, Utc};
use reqwest::Url;

use eqfinder::isc::{
    DEFAULT_ENDPOINT, DEFAULT_FOOTER_LINES, DEFAULT_PREAMBLE_LINES, is_no_events_response,
    parse_table, search_url, strip_envelope,
};
use eqfinder::query::{QueryBuilder, QueryDefaults};

const FIXTURE: &str = include_str!("fixtures/isc_fmcsv.txt");

fn query_pairs(url: &Url) -> HashMap<String, String> {
    url.query_pairs()
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}

#[test]
fn fixture_table_parses() {
    let table = strip_envelope(FIXTURE, DEFAULT_PREAMBLE_LINES, DEFAULT_FOOTER_LINES);
    assert!(!table.contains("EVENT_ID"));
    assert!(!table.contains("</pre>"));

    let records = parse_table(table.as_bytes()).unwrap();
    assert_eq!(records.len(), 2, "row without depth is dropped");

    let sumatra = &records[0];
    assert_eq!(
        sumatra.event.origin.to_string(),
        "2016-03-02 12:49:48.110"
    );
    assert_eq!(sumatra.event.longitude, 94.275);
    assert_eq!(sumatra.event.latitude, -4.9082);
    assert_eq!(sumatra.event.depth_km, 24.0);
    assert_eq!(sumatra.event.magnitude, 7.8);
    assert_eq!(sumatra.mechanism.exponent, 20);
    assert_eq!(sumatra.mechanism.tensor.mtp, 7.2);
    assert_eq!(sumatra.mechanism.planes[1].rake, -19.0);

    let kumamoto = &records[1];
    assert_eq!(kumamoto.mechanism.exponent, 19);
    assert!(kumamoto.mechanism.planes[0].strike.is_nan());
}

#[test]
fn fixture_is_not_a_no_events_page() {
    assert!(!is_no_events_response(FIXTURE));
    assert!(is_no_events_response("<pre>\nNo events were found.\n</pre>\n"));
}

#[test]
fn rectangular_search_url() {
    let now = Utc.with_ymd_and_hms(2024, 3, 31, 14, 5, 9).unwrap();
    let request = QueryBuilder::new(QueryDefaults::at(now))
        .parse_argument("mnla=-10,mxla=10,mnlo=90,mxlo=100,mndep=5,mxdep=50,st=2016/3/1/0/0/0,fm=yes")
        .unwrap();
    let url = search_url(&Url::parse(DEFAULT_ENDPOINT).unwrap(), &request.descriptor);
    let pairs = query_pairs(&url);

    assert_eq!(pairs["request"], "COMPREHENSIVE");
    assert_eq!(pairs["out_format"], "FMCSV");
    assert_eq!(pairs["searchshape"], "RECT");
    assert_eq!(pairs["bot_lat"], "-10");
    assert_eq!(pairs["right_lon"], "100");
    assert_eq!(pairs["ctr_lat"], "");
    assert_eq!(pairs["min_dep"], "5");
    assert_eq!(pairs["max_dep"], "50");
    assert_eq!(pairs["start_year"], "2016");
    assert_eq!(pairs["start_month"], "03");
    assert_eq!(pairs["start_time"], "00:00:00");
    assert_eq!(pairs["end_time"], "14:05:09");
    assert_eq!(pairs["include_links"], "off");
}

#[test]
fn circular_search_url() {
    let now = Utc.with_ymd_and_hms(2024, 3, 31, 14, 5, 9).unwrap();
    let request = QueryBuilder::new(QueryDefaults::at(now))
        .parse_argument("clat=35.5,clon=139.7,mxrad=2.5")
        .unwrap();
    let url = search_url(&Url::parse(DEFAULT_ENDPOINT).unwrap(), &request.descriptor);
    let pairs = query_pairs(&url);

    assert_eq!(pairs["searchshape"], "CIRC");
    assert_eq!(pairs["ctr_lat"], "35.5");
    assert_eq!(pairs["ctr_lon"], "139.7");
    assert_eq!(pairs["radius"], "2.5");
    assert_eq!(pairs["bot_lat"], "");
    assert_eq!(pairs["max_dist_units"], "deg");
}
