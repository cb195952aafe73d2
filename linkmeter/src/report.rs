//! Console report.

use crate::{session::Measurement, trace::ReplayStats};
use linkmeter_core::{
    ChannelWidth, DelayLedger, LinkQuality, ScenarioParameters, SpatialStreams,
    capacity::OfferedLoad,
    flow::DerivedMetrics,
    stats::FlowReport,
};
use std::io::{self, Write};

pub struct ConsoleReport<'a> {
    measurement: &'a Measurement,
    replay: Option<ReplayStats>,
}

impl<'a> ConsoleReport<'a> {
    pub fn new(measurement: &'a Measurement) -> Self {
        Self {
            measurement,
            replay: None,
        }
    }

    pub fn with_replay(mut self, replay: ReplayStats) -> Self {
        self.replay = Some(replay);
        self
    }

    pub fn print(&self) -> io::Result<()> {
        self.write_to(&mut io::stdout().lock())
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let scenario = &self.measurement.scenario;
        let report = &self.measurement.report;

        writeln!(out, "=== {} ===", scenario.name)?;
        write_parameters(out, &scenario.parameters)?;
        writeln!(
            out,
            "Traffic: {} stations per network, {} packets",
            scenario.nodes, scenario.packets
        )?;

        writeln!(out)?;
        writeln!(out, "=== Flows ===")?;
        for flow in &report.flows {
            write_flow(out, flow)?;
        }

        writeln!(out)?;
        writeln!(out, "=== Total ===")?;
        let total = &report.total_counters;
        writeln!(out, "  Tx Packets: {}", total.tx_packets)?;
        writeln!(out, "  Rx Packets: {}", total.rx_packets)?;
        writeln!(out, "  Lost Packets: {}", total.lost_packets)?;
        write_metrics(out, &report.total)?;
        write_verdicts(out, &report.parameters, &report.total)?;

        if let Some(replay) = &self.replay {
            writeln!(out)?;
            writeln!(out, "=== Event trace ===")?;
            writeln!(out, "  Sends: {}", replay.sends)?;
            writeln!(out, "  Receives recorded: {}", replay.recorded)?;
            if replay.reordered > 0 {
                writeln!(out, "  Receives before their send: {}", replay.reordered)?;
            }
            if replay.unmatched > 0 {
                writeln!(out, "  Receives without a send: {}", replay.unmatched)?;
            }
            if replay.duplicates > 0 {
                writeln!(out, "  Duplicate receives: {}", replay.duplicates)?;
            }
        }

        write_delays(out, &self.measurement.ledger)
    }
}

fn write_parameters<W: Write>(out: &mut W, parameters: &ScenarioParameters) -> io::Result<()> {
    writeln!(out, "Spatial streams: {}", parameters.spatial_streams())?;
    writeln!(out, "Channel width: {}", parameters.channel_width())?;
    writeln!(
        out,
        "Distance: {}m ({})",
        parameters.distance_m(),
        parameters.distance_bucket()
    )
}

fn write_flow<W: Write>(out: &mut W, flow: &FlowReport) -> io::Result<()> {
    writeln!(out, "Flow {}:", flow.id)?;
    writeln!(out, "  Tx Packets: {}", flow.counters.tx_packets)?;
    writeln!(out, "  Rx Packets: {}", flow.counters.rx_packets)?;
    writeln!(out, "  Lost Packets: {}", flow.counters.lost_packets)?;
    write_metrics(out, &flow.metrics)
}

fn write_metrics<W: Write>(out: &mut W, metrics: &DerivedMetrics) -> io::Result<()> {
    if let Some(mean_delay) = metrics.measured.mean_delay {
        writeln!(out, "  Mean Delay: {:.3}ms", mean_delay.as_millis_f64())?;
    }
    writeln!(out, "  Throughput: {}", metrics.measured.throughput)?;
    writeln!(out, "  Theoretical: {}", metrics.theoretical)?;
    writeln!(out, "  Efficiency: {:.2}%", metrics.efficiency)?;
    writeln!(out, "  Loss: {}", metrics.measured.loss)?;
    writeln!(out, "  Link: {}", metrics.quality)
}

fn write_verdicts<W: Write>(
    out: &mut W,
    parameters: &ScenarioParameters,
    total: &DerivedMetrics,
) -> io::Result<()> {
    let verdict = match total.quality {
        LinkQuality::Excellent => "Excellent link",
        LinkQuality::Acceptable => "Acceptable link",
        LinkQuality::Critical => "Critical link",
    };
    writeln!(out, "{verdict}")?;

    if parameters.channel_width() == ChannelWidth::Mhz40 {
        writeln!(out, "Channel bonding 40MHz enabled")?;
    }
    if parameters.spatial_streams() == SpatialStreams::Two && !total.measured.throughput.is_zero() {
        writeln!(out, "MIMO gain: {:.2}% efficiency", total.efficiency)?;
    }
    Ok(())
}

fn write_delays<W: Write>(out: &mut W, ledger: &DelayLedger) -> io::Result<()> {
    let Some(summary) = ledger.summary() else {
        return Ok(());
    };

    writeln!(out)?;
    writeln!(out, "=== Delays ===")?;
    writeln!(out, "  Mean: {:.3}ms", summary.mean.as_millis_f64())?;
    writeln!(out, "  Min: {:.3}ms", summary.min.as_millis_f64())?;
    writeln!(out, "  Max: {:.3}ms", summary.max.as_millis_f64())?;
    if let (Some(median), Some(p95)) = (ledger.percentile(50.0), ledger.percentile(95.0)) {
        writeln!(out, "  Median: {:.3}ms", median.as_millis_f64())?;
        writeln!(out, "  p95: {:.3}ms", p95.as_millis_f64())?;
    }
    writeln!(out, "  Packets measured: {}", summary.count)
}

/// Print what `plan` computed for the traffic generator.
pub fn write_plan<W: Write>(
    out: &mut W,
    parameters: &ScenarioParameters,
    load: &OfferedLoad,
) -> io::Result<()> {
    write_parameters(out, parameters)?;
    writeln!(out, "Theoretical throughput: {}", parameters.theoretical_throughput())?;
    writeln!(out, "Offered load: {}", load.rate)?;
    writeln!(out, "Packet size: {} bytes", load.packet_size)?;
    writeln!(out, "Interval: {:?}", load.interval)
}
