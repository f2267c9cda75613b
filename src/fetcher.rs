use std::fs::{self, File};
use std::io::BufReader;
use std::time::{Duration, Instant};

use camino::Utf8Path;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogFile, CatalogSchema};
use crate::config::ProviderSettings;
use crate::domain::Provider;
use crate::error::QuakeError;
use crate::fdsn::{self, FdsnClient, FdsnEvent};
use crate::isc::{self, IscClient};
use crate::query::{QueryDescriptor, QueryRequest};
use crate::store::CatalogStore;

#[derive(Debug, Clone, Serialize)]
pub struct FetchReport {
    pub provider: Provider,
    pub schema: CatalogSchema,
    pub events: usize,
    pub output: String,
    pub replaced_existing: bool,
    /// Why the ISC path was abandoned, when it was tried and failed.
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchPlan {
    pub isc_url: Option<String>,
    pub fdsn_url: String,
    pub output: String,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Clone)]
pub struct CatalogFetcher<I: IscClient, F: FdsnClient> {
    store: CatalogStore,
    isc: I,
    fdsn: F,
    providers: ProviderSettings,
}

impl<I: IscClient, F: FdsnClient> CatalogFetcher<I, F> {
    pub fn new(store: CatalogStore, isc: I, fdsn: F, providers: ProviderSettings) -> Self {
        Self {
            store,
            isc,
            fdsn,
            providers,
        }
    }

    /// The requests `fetch` would make, without touching network or disk.
    pub fn plan(&self, request: &QueryRequest) -> FetchPlan {
        let query = &request.descriptor;
        FetchPlan {
            isc_url: query
                .focal_mechanism
                .then(|| isc::search_url(&self.providers.isc_endpoint, query).to_string()),
            fdsn_url: fdsn::query_url(&self.providers.fdsn_endpoint, query).to_string(),
            output: request.output.to_string(),
        }
    }

    /// Retrieves the catalog and writes it to `request.output`.
    ///
    /// With focal mechanisms requested the ISC search is tried first. Any ISC
    /// failure other than an explicit "no events" answer falls back to FDSN,
    /// which yields the smaller FDSN layout. An FDSN failure is reported as
    /// [`QuakeError::FetchFailed`] and no file is written.
    pub fn fetch(
        &self,
        request: &QueryRequest,
        sink: &dyn ProgressSink,
    ) -> Result<FetchReport, QuakeError> {
        let started = Instant::now();
        let query = &request.descriptor;
        let output = request.output.as_path();

        let replaced_existing = self.store.remove_existing(output)?;
        if replaced_existing {
            debug!(path = %output, "removed previous catalog");
        }

        let mut fallback_reason = None;
        if query.focal_mechanism {
            sink.event(ProgressEvent {
                message: "phase=Isc; obtaining focal mechanisms".to_string(),
                elapsed: None,
            });
            let attempt = self
                .fetch_isc(query)
                .and_then(|catalog| self.persist(output, &catalog));
            match attempt {
                Ok(events) => {
                    info!(events, path = %output, "catalog written from ISC");
                    sink.event(ProgressEvent {
                        message: format!("phase=Write; {events} events from ISC"),
                        elapsed: Some(started.elapsed()),
                    });
                    return Ok(FetchReport {
                        provider: Provider::Isc,
                        schema: CatalogSchema::Isc,
                        events,
                        output: output.to_string(),
                        replaced_existing,
                        fallback_reason: None,
                    });
                }
                Err(QuakeError::NoEventsFound) => return Err(QuakeError::NoEventsFound),
                Err(err) => {
                    warn!(error = %err, "Unable to fetch the data from ISC, falling back to FDSN");
                    sink.event(ProgressEvent {
                        message: format!("phase=Fallback; ISC failed: {err}"),
                        elapsed: Some(started.elapsed()),
                    });
                    fallback_reason = Some(err.to_string());
                }
            }
        }

        sink.event(ProgressEvent {
            message: "phase=Fdsn; querying event service".to_string(),
            elapsed: None,
        });
        let events = self
            .fetch_fdsn(query)
            .and_then(|catalog| self.persist(output, &catalog))
            .map_err(|err| QuakeError::FetchFailed {
                source: Box::new(err),
            })?;
        info!(events, path = %output, "catalog written from FDSN");
        sink.event(ProgressEvent {
            message: format!("phase=Write; {events} events from FDSN"),
            elapsed: Some(started.elapsed()),
        });

        Ok(FetchReport {
            provider: Provider::Fdsn,
            schema: CatalogSchema::Fdsn,
            events,
            output: output.to_string(),
            replaced_existing,
            fallback_reason,
        })
    }

    fn fetch_isc(&self, query: &QueryDescriptor) -> Result<CatalogFile, QuakeError> {
        let url = isc::search_url(&self.providers.isc_endpoint, query);
        debug!(%url, "ISC comprehensive search");

        let scratch = self.store.scratch()?;
        let raw_path = scratch.raw_response_path();
        self.isc.download(&url, raw_path.as_std_path())?;

        let raw = fs::read(raw_path.as_std_path())
            .map_err(|err| QuakeError::Filesystem(format!("read {raw_path}: {err}")))?;
        let body = String::from_utf8_lossy(&raw);
        if isc::is_no_events_response(&body) {
            return Err(QuakeError::NoEventsFound);
        }

        let table_path = scratch.table_path();
        let table = isc::strip_envelope(
            &body,
            self.providers.isc_preamble_lines,
            self.providers.isc_footer_lines,
        );
        fs::write(table_path.as_std_path(), table)
            .map_err(|err| QuakeError::Filesystem(format!("write {table_path}: {err}")))?;
        let file = File::open(table_path.as_std_path())
            .map_err(|err| QuakeError::Filesystem(format!("open {table_path}: {err}")))?;
        let records = isc::parse_table(BufReader::new(file))?;
        debug!(records = records.len(), "parsed ISC table");

        Ok(CatalogFile::IscSchema(records))
    }

    fn fetch_fdsn(&self, query: &QueryDescriptor) -> Result<CatalogFile, QuakeError> {
        let url = fdsn::query_url(&self.providers.fdsn_endpoint, query);
        debug!(%url, "FDSN event query");

        let events = self.fdsn.get_events(&url)?;
        if events.is_empty() {
            return Err(QuakeError::FdsnNoData);
        }
        Ok(CatalogFile::FdsnSchema(
            events.into_iter().map(FdsnEvent::into_record).collect(),
        ))
    }

    fn persist(&self, output: &Utf8Path, catalog: &CatalogFile) -> Result<usize, QuakeError> {
        self.store.write_catalog(output, catalog)?;
        Ok(catalog.len())
    }
}
