use crate::{
    scenario::Scenario,
    trace::{self, ReplayStats},
};
use anyhow::{Context as _, Result};
use linkmeter_core::{
    DelayLedger, DelayRecorder, FlowStatisticsAggregator, StatisticsReport,
    capacity::OfferedLoad,
};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};
use tracing::info;

/// One run being measured: the scenario and the ledger of its traced
/// source.
///
/// The ledger lives as long as the session. Engine notifications go
/// through [`recorder`](Self::recorder) and the flow counters are only
/// read once the session is [finished](Self::finish).
#[derive(Debug)]
pub struct MeasurementSession {
    scenario: Scenario,
    ledger: DelayLedger,
}

/// Everything a finished run produced.
#[derive(Debug)]
pub struct Measurement {
    pub scenario: Scenario,
    pub ledger: DelayLedger,
    pub report: StatisticsReport,
}

impl MeasurementSession {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            ledger: DelayLedger::new(),
        }
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// The offered load the traffic generator should be configured with.
    pub fn offered_load(&self) -> Result<OfferedLoad> {
        Ok(OfferedLoad::plan(
            &self.scenario.parameters,
            self.scenario.packet_size,
        )?)
    }

    /// Where the engine reports the send and receive events of the traced
    /// source.
    pub fn recorder(&mut self) -> impl DelayRecorder + '_ {
        &mut self.ledger
    }

    pub fn replay<B: BufRead>(&mut self, reader: B) -> Result<ReplayStats> {
        Ok(trace::replay(reader, &mut self.ledger)?)
    }

    pub fn replay_file(&mut self, path: &Path) -> Result<ReplayStats> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open event trace {}", path.display()))?;
        self.replay(BufReader::new(file))
            .with_context(|| format!("Failed to replay event trace {}", path.display()))
    }

    /// Aggregate the flow counters of the scenario.
    pub fn finish(self) -> Measurement {
        let report =
            FlowStatisticsAggregator::new(self.scenario.parameters).aggregate(&self.scenario.snapshot);

        info!(
            scenario = %self.scenario.name,
            delays = self.ledger.len(),
            throughput = %report.total.measured.throughput,
            loss = %report.total.measured.loss,
            quality = %report.total.quality,
            "run measured"
        );

        Measurement {
            scenario: self.scenario,
            ledger: self.ledger,
            report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkmeter_core::{Delay, LinkQuality, PacketId, SimTime};

    const SCENARIO: &str = r#"
        [[flows]]
        id = 1
        tx_packets = 100
        rx_packets = 95
        lost_packets = 5
        rx_bytes = 139650
        delay_sum = "950ms"
        first_tx = "1s"
        last_rx = "9s"
    "#;

    #[test]
    fn engine_notifications() {
        let mut session = MeasurementSession::new(Scenario::from_toml_str(SCENARIO).unwrap());

        {
            let mut recorder = session.recorder();
            recorder.record_send(PacketId::new(1), SimTime::from_millis(2_000));
            recorder.record_receive(PacketId::new(1), SimTime::from_millis(2_050));
            recorder.record_receive(PacketId::new(7), SimTime::from_secs(1));
        }

        let measurement = session.finish();
        let summary = measurement.ledger.summary().unwrap();
        assert_eq!(summary.count, 1);
        assert_eq!(summary.mean, Delay::from_millis(50));

        let total = &measurement.report.total;
        assert_eq!(total.measured.loss.value(), 5.0);
        assert_eq!(total.measured.mean_delay, Some(Delay::from_millis(10)));
        assert_eq!(total.quality, LinkQuality::Acceptable);
    }

    #[test]
    fn replayed_trace() {
        let mut session = MeasurementSession::new(Scenario::from_toml_str(SCENARIO).unwrap());
        let stats = session
            .replay("tx 1 2s\nrx 1 2.050s\nrx 7 1s\n".as_bytes())
            .unwrap();
        assert_eq!(stats.recorded, 1);
        assert_eq!(stats.unmatched, 1);

        let measurement = session.finish();
        assert_eq!(measurement.ledger.len(), 1);
    }

    #[test]
    fn missing_trace_file() {
        let mut session = MeasurementSession::new(Scenario::from_toml_str("").unwrap());
        let error = session
            .replay_file(Path::new("/nonexistent/linkmeter/trace.txt"))
            .unwrap_err();
        assert!(error.to_string().contains("trace.txt"));
    }

    #[test]
    fn offered_load() {
        let session = MeasurementSession::new(Scenario::from_toml_str("").unwrap());
        let load = session.offered_load().unwrap();
        assert_eq!(load.rate.as_mbps(), 45.0);
        assert_eq!(load.packet_size, 1_470);
    }
}
