use serde::{Deserialize, Serialize};
use std::{fmt, num::ParseIntError, str};

/// # Packet Identifier
///
/// Opaque identifier assigned by the simulation engine. It only needs to be
/// unique among the packets in flight for the traced source; the ledger
/// never interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PacketId(u64);

/// The identifier the engine gave to a flow (a stream of packets between a
/// fixed source/destination pair).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowId(u32);

impl PacketId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl FlowId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u64> for PacketId {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl From<u32> for FlowId {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl str::FromStr for PacketId {
    type Err = ParseIntError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl str::FromStr for FlowId {
    type Err = ParseIntError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print() {
        assert_eq!(format!("{}", PacketId(42)), "42");
        assert_eq!(format!("{}", FlowId(7)), "7");
    }

    #[test]
    fn parse() {
        assert_eq!("42".parse::<PacketId>().unwrap(), PacketId(42));
        assert_eq!("7".parse::<FlowId>().unwrap(), FlowId(7));
        assert!("-1".parse::<PacketId>().is_err());
        assert!("".parse::<FlowId>().is_err());
    }
}
