//! Statistics report types.
//!
//! A [`StatisticsReport`] is what a run leaves behind once the flow
//! counters have been aggregated. Obtain one via
//! [`FlowStatisticsAggregator::aggregate`](crate::flow::FlowStatisticsAggregator::aggregate).

use crate::{
    capacity::ScenarioParameters,
    flow::{DerivedMetrics, FlowCounters},
    id::FlowId,
};
use serde::Serialize;

/// Statistics of a single flow.
#[derive(Debug, Clone, Serialize)]
pub struct FlowReport {
    /// The flow's identifier.
    pub id: FlowId,
    /// Counters as reported by the engine.
    pub counters: FlowCounters,
    /// Metrics computed from the counters.
    pub metrics: DerivedMetrics,
}

/// Statistics of an entire run.
#[derive(Debug, Clone, Serialize)]
pub struct StatisticsReport {
    /// The scenario the run was configured with.
    pub parameters: ScenarioParameters,
    /// Per-flow statistics, ordered by flow identifier.
    pub flows: Vec<FlowReport>,
    /// Counters of all flows summed up.
    pub total_counters: FlowCounters,
    /// Metrics computed from [`total_counters`](Self::total_counters).
    pub total: DerivedMetrics,
}

impl StatisticsReport {
    /// Look up the statistics of one flow.
    pub fn flow(&self, id: FlowId) -> Option<&FlowReport> {
        self.flows
            .binary_search_by_key(&id, |report| report.id)
            .ok()
            .map(|index| &self.flows[index])
    }

    /// Total bytes received over every flow.
    pub fn total_bytes(&self) -> u64 {
        self.total_counters.rx_bytes
    }
}
