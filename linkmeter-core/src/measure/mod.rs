mod loss;
mod throughput;

pub use self::{
    loss::{LossPercentage, LossPercentageError},
    throughput::{Throughput, ThroughputParseError},
};
