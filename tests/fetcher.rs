use std::path::Path;
use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use chrono::{TimeZone, Utc};
use reqwest::Url;

use eqfinder::catalog::{CatalogFile, CatalogSchema};
use eqfinder::config::{Config, ConfigLoader};
use eqfinder::domain::Provider;
use eqfinder::error::QuakeError;
use eqfinder::fdsn::{self, FdsnClient, FdsnEvent};
use eqfinder::fetcher::{CatalogFetcher, ProgressEvent, ProgressSink};
use eqfinder::isc::IscClient;
use eqfinder::output::JsonOutput;
use eqfinder::query::{QueryBuilder, QueryDefaults, QueryRequest};
use eqfinder::store::CatalogStore;

const ISC_FIXTURE: &str = include_str!("fixtures/isc_fmcsv.txt");
const FDSN_FIXTURE: &str = include_str!("fixtures/fdsn_events.txt");
const NO_EVENTS_PAGE: &str = "<html>\n<pre>\nNo events were found.\n</pre>\n</html>\n";

#[derive(Default)]
struct MockIsc {
    body: Option<&'static str>,
    calls: Mutex<usize>,
}

impl IscClient for MockIsc {
    fn download(&self, _url: &Url, destination: &Path) -> Result<(), QuakeError> {
        *self.calls.lock().unwrap() += 1;
        match self.body {
            Some(body) => {
                std::fs::write(destination, body).unwrap();
                Ok(())
            }
            None => Err(QuakeError::IscStatus {
                status: 503,
                message: "service unavailable".to_string(),
            }),
        }
    }
}

#[derive(Default)]
struct MockFdsn {
    body: Option<&'static str>,
    calls: Mutex<usize>,
}

impl FdsnClient for MockFdsn {
    fn get_events(&self, _url: &Url) -> Result<Vec<FdsnEvent>, QuakeError> {
        *self.calls.lock().unwrap() += 1;
        match self.body {
            Some(body) => fdsn::parse_events(body),
            None => Err(QuakeError::FdsnHttp("connection refused".to_string())),
        }
    }
}

#[derive(Default)]
struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.messages.lock().unwrap().push(event.message);
    }
}

struct Harness {
    _temp: tempfile::TempDir,
    output: Utf8PathBuf,
    store: CatalogStore,
}

impl Harness {
    fn new() -> Self {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        Self {
            output: root.join("catalog.txt"),
            store: CatalogStore::with_scratch_root(root.join("scratch")),
            _temp: temp,
        }
    }

    fn request(&self, argument: &str) -> QueryRequest {
        let now = Utc.with_ymd_and_hms(2016, 9, 22, 0, 0, 0).unwrap();
        QueryBuilder::new(QueryDefaults::at(now).with_output(self.output.clone()))
            .parse_argument(argument)
            .unwrap()
    }

    fn fetcher(&self, isc: MockIsc, fdsn: MockFdsn) -> CatalogFetcher<MockIsc, MockFdsn> {
        let providers = ConfigLoader::resolve_config(Config::default())
            .unwrap()
            .providers;
        CatalogFetcher::new(self.store.clone(), isc, fdsn, providers)
    }
}

#[test]
fn focal_mechanisms_come_from_isc() {
    let harness = Harness::new();
    let fetcher = harness.fetcher(
        MockIsc {
            body: Some(ISC_FIXTURE),
            ..MockIsc::default()
        },
        MockFdsn::default(),
    );

    let report = fetcher
        .fetch(&harness.request("st=2016/3/1,fm=yes"), &JsonOutput)
        .unwrap();

    assert_eq!(report.provider, Provider::Isc);
    assert_eq!(report.schema, CatalogSchema::Isc);
    assert_eq!(report.events, 2);
    assert!(report.fallback_reason.is_none());

    let catalog = CatalogFile::read(&harness.output).unwrap();
    assert_eq!(catalog.schema(), CatalogSchema::Isc);
    assert_eq!(catalog.len(), 2);
}

#[test]
fn no_events_answer_stops_without_writing() {
    let harness = Harness::new();
    let fdsn = MockFdsn {
        body: Some(FDSN_FIXTURE),
        ..MockFdsn::default()
    };
    let fetcher = harness.fetcher(
        MockIsc {
            body: Some(NO_EVENTS_PAGE),
            ..MockIsc::default()
        },
        fdsn,
    );

    let err = fetcher
        .fetch(&harness.request("fm=yes"), &JsonOutput)
        .unwrap_err();

    assert_matches!(err, QuakeError::NoEventsFound);
    assert!(!harness.output.as_std_path().exists());
}

#[test]
fn isc_failure_falls_back_to_fdsn() {
    let harness = Harness::new();
    let sink = RecordingSink::default();
    let fetcher = harness.fetcher(
        MockIsc::default(),
        MockFdsn {
            body: Some(FDSN_FIXTURE),
            ..MockFdsn::default()
        },
    );

    let report = fetcher
        .fetch(&harness.request("st=2016/3/1,fm=yes"), &sink)
        .unwrap();

    assert_eq!(report.provider, Provider::Fdsn);
    assert_eq!(report.events, 3);
    assert!(report.fallback_reason.unwrap().contains("503"));
    let catalog = CatalogFile::read(&harness.output).unwrap();
    assert_eq!(catalog.schema(), CatalogSchema::Fdsn);
    assert!(
        sink.messages
            .lock()
            .unwrap()
            .iter()
            .any(|message| message.starts_with("phase=Fallback"))
    );
}

#[test]
fn unparsable_isc_table_falls_back_to_fdsn() {
    let harness = Harness::new();
    let fetcher = harness.fetcher(
        MockIsc {
            body: Some("<html>\n<p>maintenance</p>\n</html>\n"),
            ..MockIsc::default()
        },
        MockFdsn {
            body: Some(FDSN_FIXTURE),
            ..MockFdsn::default()
        },
    );

    let report = fetcher
        .fetch(&harness.request("fm=yes"), &JsonOutput)
        .unwrap();
    assert_eq!(report.schema, CatalogSchema::Fdsn);
}

#[test]
fn fdsn_failure_is_fetch_failed_and_leaves_no_file() {
    let harness = Harness::new();
    std::fs::write(harness.output.as_std_path(), "previous run\n").unwrap();
    let fetcher = harness.fetcher(MockIsc::default(), MockFdsn::default());

    let err = fetcher
        .fetch(&harness.request("fm=yes"), &JsonOutput)
        .unwrap_err();

    assert_matches!(
        err,
        QuakeError::FetchFailed { source } if matches!(*source, QuakeError::FdsnHttp(_))
    );
    assert!(!harness.output.as_std_path().exists());
}

#[test]
fn without_focal_mechanisms_isc_is_skipped() {
    let harness = Harness::new();
    std::fs::write(harness.output.as_std_path(), "previous run\n").unwrap();
    let isc = MockIsc {
        body: Some(ISC_FIXTURE),
        ..MockIsc::default()
    };
    let fetcher = harness.fetcher(
        isc,
        MockFdsn {
            body: Some(FDSN_FIXTURE),
            ..MockFdsn::default()
        },
    );

    let report = fetcher
        .fetch(&harness.request("mnmag=6"), &JsonOutput)
        .unwrap();

    assert_eq!(report.provider, Provider::Fdsn);
    assert!(report.replaced_existing);
    assert!(report.fallback_reason.is_none());
}

#[test]
fn empty_fdsn_result_is_fetch_failed() {
    let harness = Harness::new();
    let fetcher = harness.fetcher(
        MockIsc::default(),
        MockFdsn {
            body: Some("#EventID|Time|Latitude\n"),
            ..MockFdsn::default()
        },
    );

    let err = fetcher
        .fetch(&harness.request("mnmag=9"), &JsonOutput)
        .unwrap_err();
    assert_matches!(
        err,
        QuakeError::FetchFailed { source } if matches!(*source, QuakeError::FdsnNoData)
    );
}

#[test]
fn plan_lists_requests_without_fetching() {
    let harness = Harness::new();
    let fetcher = harness.fetcher(MockIsc::default(), MockFdsn::default());

    let plan = fetcher.plan(&harness.request("fm=yes"));
    assert!(plan.isc_url.unwrap().contains("searchshape=RECT"));
    assert!(plan.fdsn_url.contains("format=text"));
    assert_eq!(plan.output, harness.output.to_string());

    let plan = fetcher.plan(&harness.request("fm=no"));
    assert!(plan.isc_url.is_none());
}
