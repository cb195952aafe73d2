use crate::session::Measurement;
use anyhow::{Context as _, Result};
use linkmeter_core::export::{MetricsSummary, write_plot_params};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

pub const DELAYS_FILE: &str = "client_delays.csv";
pub const PLOT_PARAMS_FILE: &str = "plot_params.txt";
pub const METRICS_SUMMARY_FILE: &str = "metrics_summary.txt";

/// The files written by [`write_outputs`].
#[derive(Debug, Clone)]
pub struct OutputFiles {
    pub delays: PathBuf,
    pub plot_params: PathBuf,
    pub metrics_summary: PathBuf,
}

impl OutputFiles {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            delays: dir.join(DELAYS_FILE),
            plot_params: dir.join(PLOT_PARAMS_FILE),
            metrics_summary: dir.join(METRICS_SUMMARY_FILE),
        }
    }
}

/// Write the delay CSV, the plot parameters and the metrics summary into
/// `dir`, creating it if needed.
pub fn write_outputs(measurement: &Measurement, dir: &Path) -> Result<OutputFiles> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    let files = OutputFiles::in_dir(dir);

    measurement.ledger.export_csv(&files.delays)?;
    write_plot_params(
        &files.plot_params,
        measurement.scenario.nodes,
        measurement.scenario.packets,
    )?;
    MetricsSummary::new(&measurement.report, &measurement.ledger).export(&files.metrics_summary)?;

    info!(dir = %dir.display(), "outputs written");
    Ok(files)
}

/// Dump the statistics report as pretty-printed JSON.
pub fn write_json(measurement: &Measurement, path: &Path) -> Result<()> {
    let data = serde_json::to_vec_pretty(&measurement.report)
        .context("Failed to serialize statistics report")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write report file {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{scenario::Scenario, session::MeasurementSession};

    fn measurement() -> Measurement {
        let scenario = Scenario::from_toml_str(
            r#"
            [traffic]
            nodes = 3
            packets = 2

            [[flows]]
            id = 1
            tx_packets = 2
            rx_packets = 2
            rx_bytes = 2048
            delay_sum = "100ms"
            first_tx = "2s"
            last_rx = "3s"
            "#,
        )
        .unwrap();
        let mut session = MeasurementSession::new(scenario);
        session
            .replay("tx 1 2s\nrx 1 2.050s\ntx 2 2.5s\nrx 2 2.550s\n".as_bytes())
            .unwrap();
        session.finish()
    }

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("linkmeter-output-{name}-{}", std::process::id()))
    }

    #[test]
    fn outputs() {
        let dir = scratch_dir("outputs").join("nested");
        let files = write_outputs(&measurement(), &dir).unwrap();

        assert_eq!(
            fs::read_to_string(&files.delays).unwrap(),
            "PacketNumber,DelayMs\n1,50\n2,50\n"
        );
        assert_eq!(fs::read_to_string(&files.plot_params).unwrap(), "3\n2");

        let summary = fs::read_to_string(&files.metrics_summary).unwrap();
        assert!(summary.contains("total_bytes,2048\n"));
        assert!(summary.contains("lat_median_ms,50.000\n"));

        fs::remove_dir_all(scratch_dir("outputs")).unwrap();
    }

    #[test]
    fn json_report() {
        let dir = scratch_dir("json");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("report.json");

        write_json(&measurement(), &path).unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();

        assert_eq!(json["total"]["quality"], "excellent");
        assert_eq!(json["total"]["theoretical"], 65.0);
        assert_eq!(json["flows"][0]["id"], 1);
        assert_eq!(json["parameters"]["channel_width"], "20MHz");

        fs::remove_dir_all(dir).unwrap();
    }
}
