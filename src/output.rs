use std::io::{self, Write};

use serde::Serialize;

use crate::display::DisplayedRow;
use crate::index::SearchHit;
use crate::session::ProjectSummary;
use crate::status::{StatusEvent, StatusSink};

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub project: Option<ProjectSummary>,
    pub error: Option<String>,
    pub events: Vec<StatusEvent>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub prefix: String,
    pub hits: Vec<SearchHit>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompareResult {
    pub treatment_a: String,
    pub treatment_b: String,
    pub source: String,
    pub records: usize,
    pub rows: Vec<DisplayedRow>,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_status(result: &StatusReport) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_search(result: &SearchResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_compare(result: &CompareResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_config(config: &serde_json::Value) -> io::Result<()> {
        Self::print_json(config)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl StatusSink for JsonOutput {
    fn record(&self, _event: StatusEvent) {}
}
