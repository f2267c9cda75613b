use std::fs::File;
use std::io::BufWriter;
use std::process::ExitCode;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use eqfinder::catalog::CatalogFile;
use eqfinder::config::{ConfigLoader, ResolvedConfig};
use eqfinder::error::QuakeError;
use eqfinder::fdsn::FdsnHttpClient;
use eqfinder::fetcher::{CatalogFetcher, ProgressSink};
use eqfinder::isc::IscHttpClient;
use eqfinder::map_plan::{MapExtent, MapPlanBuilder};
use eqfinder::output::{JsonOutput, OutputMode, TextOutput};
use eqfinder::query::{ParsePolicy, QueryBuilder, QueryDefaults, QueryRequest, RECOGNIZED_KEYS};
use eqfinder::store::CatalogStore;

#[derive(Parser)]
#[command(name = "eqfinder")]
#[command(about = "Fetch an earthquake catalog from ISC (with focal mechanisms) or FDSN")]
#[command(version, author)]
struct Cli {
    /// Comma separated key=value pairs, e.g. st=2016/3/29,mnmag=5,fm=yes
    #[arg(long_help = format!("Comma separated key=value pairs. Recognized keys and defaults: {RECOGNIZED_KEYS}"))]
    query: Option<String>,

    #[arg(long)]
    config: Option<String>,

    /// Fail on a malformed query instead of running with defaults.
    #[arg(long)]
    strict: bool,

    /// Print the requests that would be made and exit.
    #[arg(long)]
    dry_run: bool,

    #[arg(long)]
    non_interactive: bool,

    /// Write marker layout for the fetched catalog as JSON.
    #[arg(long, value_name = "PATH")]
    map_plan: Option<Utf8PathBuf>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<QuakeError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &QuakeError) -> u8 {
    match error {
        QuakeError::NoEventsFound => 2,
        QuakeError::FetchFailed { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };
    let policy = if cli.strict {
        ParsePolicy::Strict
    } else {
        ParsePolicy::DefaultOnParseError
    };

    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let defaults = QueryDefaults::at(Utc::now()).with_output(config.output.clone());
    let outcome = QueryBuilder::new(defaults).resolve(cli.query.as_deref(), policy)?;
    if outcome.recovered.is_some() {
        eprintln!("ERROR: Please enter the proper format!");
    }
    let request = outcome.request;

    match output_mode {
        OutputMode::Interactive => TextOutput::print_query(&request.descriptor),
        OutputMode::NonInteractive => {
            JsonOutput::print_query(&request.descriptor).into_diagnostic()?
        }
    }

    let fetcher = build_fetcher(&config)?;
    if cli.dry_run {
        let plan = fetcher.plan(&request);
        return match output_mode {
            OutputMode::Interactive => {
                TextOutput::print_plan(&plan);
                Ok(())
            }
            OutputMode::NonInteractive => JsonOutput::print_plan(&plan).into_diagnostic(),
        };
    }

    let sink: &dyn ProgressSink = match output_mode {
        OutputMode::Interactive => &TextOutput,
        OutputMode::NonInteractive => &JsonOutput,
    };
    let report = fetcher.fetch(&request, sink)?;
    match output_mode {
        OutputMode::Interactive => TextOutput::print_report(&report),
        OutputMode::NonInteractive => JsonOutput::print_report(&report).into_diagnostic()?,
    }

    if let Some(path) = &cli.map_plan {
        write_map_plan(&request, path)?;
    }
    Ok(())
}

fn build_fetcher(
    config: &ResolvedConfig,
) -> miette::Result<CatalogFetcher<IscHttpClient, FdsnHttpClient>> {
    let isc = IscHttpClient::new(&config.http)?;
    let fdsn = FdsnHttpClient::new(&config.http)?;
    Ok(CatalogFetcher::new(
        CatalogStore::new(),
        isc,
        fdsn,
        config.providers.clone(),
    ))
}

fn write_map_plan(request: &QueryRequest, path: &Utf8Path) -> miette::Result<()> {
    let catalog = CatalogFile::read(&request.output)?;
    let Some(plan) = MapPlanBuilder::new()
        .extent(MapExtent::from_region(&request.descriptor.region))
        .build(&catalog)
    else {
        tracing::warn!(
            events = catalog.len(),
            "catalog size outside plottable range, no map plan written"
        );
        return Ok(());
    };
    let file = File::create(path.as_std_path()).into_diagnostic()?;
    JsonOutput::write_map_plan(&plan, BufWriter::new(file)).into_diagnostic()?;
    tracing::info!(path = %path, markers = plan.markers.len(), "map plan written");
    Ok(())
}
