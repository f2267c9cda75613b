use std::io::{self, Write};

use serde::Serialize;

use crate::fetcher::{FetchPlan, FetchReport, ProgressEvent, ProgressSink};
use crate::map_plan::MapPlan;
use crate::query::QueryDescriptor;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(report: &FetchReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_plan(plan: &FetchPlan) -> io::Result<()> {
        Self::print_json(plan)
    }

    pub fn print_query(query: &QueryDescriptor) -> io::Result<()> {
        Self::print_json(query)
    }

    /// Writes a map plan as pretty JSON to `writer`.
    pub fn write_map_plan<W: Write>(plan: &MapPlan, mut writer: W) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut writer, plan).map_err(io::Error::other)?;
        writer.write_all(b"\n")
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Human-readable output for interactive runs. Progress goes to stderr.
pub struct TextOutput;

impl TextOutput {
    pub fn print_query(query: &QueryDescriptor) {
        println!("{}", query.describe());
    }

    pub fn print_report(report: &FetchReport) {
        if let Some(reason) = &report.fallback_reason {
            println!("ISC unavailable ({reason}); catalog taken from FDSN");
        }
        println!("Number of events found: {}", report.events);
        println!("Catalog written to {} ({} layout)", report.output, report.provider);
    }

    pub fn print_plan(plan: &FetchPlan) {
        if let Some(url) = &plan.isc_url {
            println!("ISC:  {url}");
        }
        println!("FDSN: {}", plan.fdsn_url);
        println!("Output: {}", plan.output);
    }
}

impl ProgressSink for TextOutput {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => eprintln!("{} ({:.1}s)", event.message, elapsed.as_secs_f64()),
            None => eprintln!("{}", event.message),
        }
    }
}
