//! Post-run flow statistics.
//!
//! Once the engine has stopped it hands over a [`FlowSnapshot`], the raw
//! counters of every flow it observed. Everything here is a pure function of
//! that snapshot: nothing is accumulated between runs and no I/O happens.

use crate::{
    capacity::ScenarioParameters,
    id::FlowId,
    measure::{LossPercentage, Throughput},
    quality::LinkQuality,
    stats::{FlowReport, StatisticsReport},
    time::{Delay, SimTime},
};
use serde::{Serialize, Serializer};
use std::{collections::BTreeMap, time::Duration};
use thiserror::Error;
use tracing::{debug, warn};

/// Raw counters of one flow, as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FlowCounters {
    pub tx_packets: u64,
    pub rx_packets: u64,
    pub lost_packets: u64,
    pub rx_bytes: u64,
    /// Sum of the one-way delays of the received packets.
    #[serde(serialize_with = "millis")]
    pub delay_sum: Duration,
    pub first_tx: SimTime,
    pub last_rx: SimTime,
}

/// The counters of every flow, keyed by flow.
pub type FlowSnapshot = BTreeMap<FlowId, FlowCounters>;

/// Metrics measured on a flow (or on the sum of all flows).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlowMetrics {
    pub throughput: Throughput,
    pub loss: LossPercentage,
    /// `None` if nothing was received.
    pub mean_delay: Option<Delay>,
}

/// [`FlowMetrics`] compared against the theoretical capacity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DerivedMetrics {
    #[serde(flatten)]
    pub measured: FlowMetrics,
    pub theoretical: Throughput,
    /// measured throughput as a percentage of the theoretical one
    pub efficiency: f64,
    pub quality: LinkQuality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CounterError {
    #[error("received more packets ({rx_packets}) than transmitted ({tx_packets})")]
    MoreReceivedThanTransmitted { tx_packets: u64, rx_packets: u64 },
}

/// Computes per-flow and total [`DerivedMetrics`] for one scenario.
///
/// ```
/// # use linkmeter_core::{flow::*, capacity::*, FlowId, SimTime, LinkQuality};
/// # use std::time::Duration;
/// let parameters = ScenarioParameters::new(SpatialStreams::One, ChannelWidth::Mhz20, 10.0)?;
/// let mut snapshot = FlowSnapshot::new();
/// snapshot.insert(
///     FlowId::new(1),
///     FlowCounters {
///         tx_packets: 100,
///         rx_packets: 97,
///         lost_packets: 3,
///         rx_bytes: 142_590,
///         delay_sum: Duration::from_millis(970),
///         first_tx: SimTime::from_secs(1),
///         last_rx: SimTime::from_secs(9),
///     },
/// );
///
/// let report = FlowStatisticsAggregator::new(parameters).aggregate(&snapshot);
/// assert_eq!(report.total.quality, LinkQuality::Excellent);
/// assert_eq!(report.total.theoretical.as_mbps(), 65.0);
/// # Ok::<(), ParameterError>(())
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FlowStatisticsAggregator {
    parameters: ScenarioParameters,
}

impl FlowCounters {
    /// Checks the counters are consistent with each other.
    pub fn validate(&self) -> Result<(), CounterError> {
        if self.rx_packets > self.tx_packets {
            return Err(CounterError::MoreReceivedThanTransmitted {
                tx_packets: self.tx_packets,
                rx_packets: self.rx_packets,
            });
        }
        Ok(())
    }

    /// Time between the first transmission and the last reception.
    ///
    /// `None` if nothing was received or if that span is empty or negative.
    pub fn active_duration(&self) -> Option<Duration> {
        if self.rx_packets == 0 {
            return None;
        }
        self.last_rx
            .checked_since(self.first_tx)
            .filter(|duration| !duration.is_zero())
    }

    /// The counters of all `flows` summed up, as if they were one flow.
    ///
    /// The first transmission is the earliest of the flows that transmitted
    /// and the last reception the latest of the flows that received.
    pub fn total<'a, I>(flows: I) -> Self
    where
        I: IntoIterator<Item = &'a FlowCounters>,
    {
        let mut total = Self::default();
        let mut first_tx: Option<SimTime> = None;
        let mut last_rx: Option<SimTime> = None;

        for flow in flows {
            total.tx_packets = total.tx_packets.saturating_add(flow.tx_packets);
            total.rx_packets = total.rx_packets.saturating_add(flow.rx_packets);
            total.lost_packets = total.lost_packets.saturating_add(flow.lost_packets);
            total.rx_bytes = total.rx_bytes.saturating_add(flow.rx_bytes);
            total.delay_sum = total.delay_sum.saturating_add(flow.delay_sum);

            if flow.tx_packets > 0 {
                first_tx = Some(first_tx.map_or(flow.first_tx, |t| t.min(flow.first_tx)));
            }
            if flow.rx_packets > 0 {
                last_rx = Some(last_rx.map_or(flow.last_rx, |t| t.max(flow.last_rx)));
            }
        }

        total.first_tx = first_tx.unwrap_or_default();
        total.last_rx = last_rx.unwrap_or_default();
        total
    }
}

/// Loss, mean delay and throughput of a single flow.
///
/// * loss is `100 * lost / transmitted`, `0` if nothing was transmitted;
/// * mean delay is `delay_sum / received`, `None` if nothing was received;
/// * throughput is the received bits over `last_rx - first_tx`, `0` if
///   nothing was received or that span is not positive.
pub fn compute_flow_metrics(counters: &FlowCounters) -> FlowMetrics {
    let loss = LossPercentage::from_counts(counters.lost_packets, counters.tx_packets);

    let mean_delay = (counters.rx_packets > 0).then(|| {
        let nanos = counters.delay_sum.as_nanos() / counters.rx_packets as u128;
        Delay::from_nanos(i64::try_from(nanos).unwrap_or(i64::MAX))
    });

    let throughput = counters
        .active_duration()
        .map_or(Throughput::ZERO, |duration| {
            Throughput::from_bytes_over(counters.rx_bytes, duration)
        });

    FlowMetrics {
        throughput,
        loss,
        mean_delay,
    }
}

/// Metrics of all the flows taken together.
///
/// The counters are summed first and the formulas of
/// [`compute_flow_metrics`] applied on the sums, so a flow with few packets
/// weighs no more than its packets.
pub fn compute_aggregate<'a, I>(flows: I) -> FlowMetrics
where
    I: IntoIterator<Item = &'a FlowCounters>,
{
    compute_flow_metrics(&FlowCounters::total(flows))
}

/// `measured` as a percentage of `theoretical`, `0` if either is `0`.
///
/// ```
/// # use linkmeter_core::{flow::efficiency, measure::Throughput};
/// let measured = Throughput::from_mbps(32.5);
/// assert_eq!(efficiency(measured, Throughput::from_mbps(65.0)), 50.0);
/// assert_eq!(efficiency(measured, Throughput::ZERO), 0.0);
/// ```
pub fn efficiency(measured: Throughput, theoretical: Throughput) -> f64 {
    if measured.is_zero() || theoretical.is_zero() {
        return 0.0;
    }
    100.0 * measured.as_bps() / theoretical.as_bps()
}

impl FlowStatisticsAggregator {
    pub fn new(parameters: ScenarioParameters) -> Self {
        Self { parameters }
    }

    /// Compare `measured` against the scenario's theoretical throughput.
    pub fn derive(&self, measured: FlowMetrics) -> DerivedMetrics {
        let theoretical = self.parameters.theoretical_throughput();
        DerivedMetrics {
            measured,
            theoretical,
            efficiency: efficiency(measured.throughput, theoretical),
            quality: LinkQuality::classify(measured.loss),
        }
    }

    /// One pass over `snapshot`.
    ///
    /// Inconsistent counters are reported with a warning and still used
    /// as they are.
    pub fn aggregate(&self, snapshot: &FlowSnapshot) -> StatisticsReport {
        let flows = snapshot
            .iter()
            .map(|(&id, counters)| {
                if let Err(error) = counters.validate() {
                    warn!(flow = %id, %error, "inconsistent flow counters");
                }
                let metrics = self.derive(compute_flow_metrics(counters));
                debug!(
                    flow = %id,
                    throughput = %metrics.measured.throughput,
                    loss = %metrics.measured.loss,
                    "flow statistics"
                );
                FlowReport {
                    id,
                    counters: *counters,
                    metrics,
                }
            })
            .collect();

        let total_counters = FlowCounters::total(snapshot.values());
        let total = self.derive(compute_flow_metrics(&total_counters));

        StatisticsReport {
            parameters: self.parameters,
            flows,
            total_counters,
            total,
        }
    }
}

fn millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64() * 1_000.0)
}
