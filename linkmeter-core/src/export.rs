//! Plain-text outputs of a run.
//!
//! * the per-packet delay CSV ([`DelayLedger::export_csv`]);
//! * the plot parameters file ([`write_plot_params`]);
//! * the metrics summary ([`MetricsSummary::export`]).
//!
//! Each export opens, writes and flushes its own file. Failures are
//! reported with the path and are never retried.

use crate::{
    defaults::DELAY_CSV_HEADER,
    ledger::DelayLedger,
    stats::StatisticsReport,
};
use std::{
    fmt,
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
#[error("failed to write {path}")]
pub struct ExportError {
    path: PathBuf,
    #[source]
    source: io::Error,
}

/// Headline numbers of a run, one `key,value` line each.
///
/// Values that cannot be computed (no packet received, no delay recorded)
/// are written as `NA`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSummary {
    pub duration_s: Option<f64>,
    pub total_bytes: u64,
    pub throughput_mbps: f64,
    pub loss_pct: f64,
    pub lat_mean_ms: Option<f64>,
    pub lat_median_ms: Option<f64>,
    pub lat_p95_ms: Option<f64>,
}

impl ExportError {
    fn new(path: &Path, source: io::Error) -> Self {
        Self {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DelayLedger {
    /// Writes the `PacketNumber,DelayMs` CSV: the header then one row per
    /// recorded delay, in receive order, with the delay truncated to whole
    /// milliseconds.
    pub fn write_csv<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writeln!(writer, "{DELAY_CSV_HEADER}")?;
        for (id, delay) in self.delays() {
            writeln!(writer, "{id},{}", delay.as_millis())?;
        }
        writer.flush()
    }

    /// [`write_csv`](Self::write_csv) into the file at `path`, created or
    /// truncated.
    ///
    /// Exporting twice without recording anything in between produces the
    /// same bytes.
    pub fn export_csv(&self, path: impl AsRef<Path>) -> Result<(), ExportError> {
        let path = path.as_ref();
        write_file(path, |writer| self.write_csv(writer))?;
        info!(path = %path.display(), rows = self.len(), "delay CSV written");
        Ok(())
    }
}

/// Writes the number of wireless nodes and the number of packets on two
/// lines, without a trailing newline, for the plotting scripts.
pub fn write_plot_params(
    path: impl AsRef<Path>,
    nodes: u32,
    packets: u64,
) -> Result<(), ExportError> {
    let path = path.as_ref();
    write_file(path, |writer| write!(writer, "{nodes}\n{packets}"))
}

impl MetricsSummary {
    /// Throughput, loss and volume come from the report's total; latency
    /// from the ledger.
    pub fn new(report: &StatisticsReport, ledger: &DelayLedger) -> Self {
        let summary = ledger.summary();
        Self {
            duration_s: report
                .total_counters
                .active_duration()
                .map(|duration| duration.as_secs_f64()),
            total_bytes: report.total_bytes(),
            throughput_mbps: report.total.measured.throughput.as_mbps(),
            loss_pct: report.total.measured.loss.value(),
            lat_mean_ms: summary.map(|summary| summary.mean.as_millis_f64()),
            lat_median_ms: ledger.percentile(50.0).map(|delay| delay.as_millis_f64()),
            lat_p95_ms: ledger.percentile(95.0).map(|delay| delay.as_millis_f64()),
        }
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writeln!(writer, "duration_s,{}", Value(self.duration_s, 6))?;
        writeln!(writer, "total_bytes,{}", self.total_bytes)?;
        writeln!(writer, "throughput_mbps,{:.6}", self.throughput_mbps)?;
        writeln!(writer, "loss_pct,{:.3}", self.loss_pct)?;
        writeln!(writer, "lat_mean_ms,{}", Value(self.lat_mean_ms, 3))?;
        writeln!(writer, "lat_median_ms,{}", Value(self.lat_median_ms, 3))?;
        writeln!(writer, "lat_p95_ms,{}", Value(self.lat_p95_ms, 3))?;
        writer.flush()
    }

    pub fn export(&self, path: impl AsRef<Path>) -> Result<(), ExportError> {
        write_file(path.as_ref(), |writer| self.write(writer))
    }
}

/// An optional value with a fixed precision, `NA` when missing.
struct Value(Option<f64>, usize);

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => write!(f, "{:.1$}", value, self.1),
            None => f.write_str("NA"),
        }
    }
}

fn write_file<F>(path: &Path, write: F) -> Result<(), ExportError>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let file = File::create(path).map_err(|error| ExportError::new(path, error))?;
    let mut writer = BufWriter::new(file);
    write(&mut writer)
        .and_then(|()| writer.flush())
        .map_err(|error| ExportError::new(path, error))
}
