//! Storage collaborators for finished reports.
//!
//! A store failure never touches the simulation: the report is an immutable
//! value by the time it gets here.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::StoreError;
use crate::report::SimulationReport;
use crate::telemetry_export::write_report_parquet;

pub trait ReportStore {
    fn store(&mut self, report: &SimulationReport) -> Result<(), StoreError>;
}

/// Writes the report as pretty-printed JSON to a fixed path.
#[derive(Debug, Clone)]
pub struct JsonReportStore {
    path: PathBuf,
}

impl JsonReportStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<SimulationReport, StoreError> {
        let reader = BufReader::new(File::open(&self.path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

impl ReportStore for JsonReportStore {
    fn store(&mut self, report: &SimulationReport) -> Result<(), StoreError> {
        let writer = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer_pretty(writer, report)?;
        Ok(())
    }
}

/// Writes per-server rows to a parquet file.
#[derive(Debug, Clone)]
pub struct ParquetReportStore {
    path: PathBuf,
}

impl ParquetReportStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ReportStore for ParquetReportStore {
    fn store(&mut self, report: &SimulationReport) -> Result<(), StoreError> {
        write_report_parquet(&self.path, report)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryReportStore {
    pub reports: Vec<SimulationReport>,
    /// Reject every report with this message.
    pub fail_with: Option<String>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            reports: Vec::new(),
            fail_with: Some(message.into()),
        }
    }
}

impl ReportStore for InMemoryReportStore {
    fn store(&mut self, report: &SimulationReport) -> Result<(), StoreError> {
        if let Some(message) = &self.fail_with {
            return Err(StoreError::Rejected(message.clone()));
        }
        self.reports.push(report.clone());
        Ok(())
    }
}

/// Hands `report` to `store`, logging the outcome.
pub fn persist_report(
    store: &mut dyn ReportStore,
    report: &SimulationReport,
) -> Result<(), StoreError> {
    match store.store(report) {
        Ok(()) => {
            info!(seed = report.seed, end_time = report.end_time, "report stored");
            Ok(())
        }
        Err(err) => {
            warn!(error = %err, seed = report.seed, "failed to store report");
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::WashProgramCounts;

    fn report() -> SimulationReport {
        SimulationReport {
            end_time: 120.0,
            seed: 3,
            customers_created: 4,
            customers_departed: 3,
            customers_in_system: 1,
            avg_time_in_system: 17.5,
            wash_programs: WashProgramCounts::default(),
            service_points: Vec::new(),
        }
    }

    #[test]
    fn in_memory_store_keeps_copies() {
        let mut store = InMemoryReportStore::new();
        persist_report(&mut store, &report()).unwrap();
        assert_eq!(store.reports, vec![report()]);
    }

    #[test]
    fn failures_are_returned_not_swallowed() {
        let mut store = InMemoryReportStore::failing("disk full");
        let err = persist_report(&mut store, &report()).unwrap_err();
        assert!(matches!(err, StoreError::Rejected(msg) if msg == "disk full"));
    }

    #[test]
    fn json_store_writes_readable_reports() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonReportStore::new(dir.path().join("report.json"));
        store.store(&report()).unwrap();
        assert_eq!(store.load().unwrap(), report());
    }

    #[test]
    fn json_store_reports_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonReportStore::new(dir.path().join("missing").join("report.json"));
        assert!(matches!(store.store(&report()), Err(StoreError::Io(_))));
    }
}
