//! Host side of `linkmeter`: loads a scenario, replays the engine's event
//! trace into a [`DelayLedger`](linkmeter_core::DelayLedger), aggregates the
//! flow counters and reports the results on the console and on disk.

pub mod output;
pub mod report;
pub mod scenario;
pub mod session;
pub mod trace;

pub use self::{
    scenario::Scenario,
    session::{Measurement, MeasurementSession},
};
