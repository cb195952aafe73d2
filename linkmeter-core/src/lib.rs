//! Measurement primitives for simulated wireless links.
//!
//! The simulation engine reports two things to this crate:
//!
//! * timed send/receive notifications of the traced source, correlated by
//!   the [`DelayLedger`] into one-way delays;
//! * once the run is over, the raw counters of every flow, turned by the
//!   [`FlowStatisticsAggregator`] into throughput, loss and mean delay and
//!   compared against the [theoretical capacity](capacity::THEORETICAL_THROUGHPUT)
//!   of the scenario.
//!
//! Nothing here schedules events or models the radio. The [`export`] module
//! writes the results for the plotting scripts.

pub mod capacity;
pub mod defaults;
pub mod export;
pub mod flow;
mod id;
mod ledger;
pub mod measure;
mod quality;
pub mod stats;
mod time;

pub use self::{
    capacity::{ChannelWidth, ScenarioParameters, SpatialStreams},
    export::ExportError,
    flow::{FlowCounters, FlowSnapshot, FlowStatisticsAggregator},
    id::{FlowId, PacketId},
    ledger::{DelayLedger, DelayRecorder, DelaySummary, PacketRecord, ReceiveOutcome},
    quality::LinkQuality,
    stats::StatisticsReport,
    time::{Delay, SimTime, TimeParseError, parse_duration},
};
