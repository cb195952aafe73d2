//! Event traces of the traced source.
//!
//! One event per line: `tx <packet-id> <time>` when the client sends a
//! packet and `rx <packet-id> <time>` when it receives the echo. The time
//! is anything [`SimTime`] parses, spaces included (`rx 4 2s 50ms`).
//! Blank lines and lines starting with `#` are ignored.

use linkmeter_core::{DelayRecorder, PacketId, ReceiveOutcome, SimTime, TimeParseError};
use std::{
    fmt,
    io::{self, BufRead},
    num::ParseIntError,
    str::FromStr,
};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEvent {
    Send { packet: PacketId, at: SimTime },
    Receive { packet: PacketId, at: SimTime },
}

/// How the events of a trace were taken by the recorder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub sends: u64,
    pub recorded: u64,
    pub reordered: u64,
    pub unmatched: u64,
    pub duplicates: u64,
}

#[derive(Debug, Error)]
pub enum EventParseError {
    #[error("expecting `tx' or `rx', found `{found}'")]
    Direction { found: String },
    #[error("missing packet identifier")]
    MissingPacket,
    #[error("invalid packet identifier")]
    Packet(#[source] ParseIntError),
    #[error("missing time")]
    MissingTime,
    #[error(transparent)]
    Time(#[from] TimeParseError),
}

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: EventParseError,
    },
    #[error("failed to read the trace")]
    Io(#[from] io::Error),
}

impl TraceEvent {
    /// Hand the event to `recorder`.
    pub fn apply<R: DelayRecorder>(self, recorder: &mut R) -> Option<ReceiveOutcome> {
        match self {
            Self::Send { packet, at } => {
                recorder.record_send(packet, at);
                None
            }
            Self::Receive { packet, at } => Some(recorder.record_receive(packet, at)),
        }
    }
}

impl FromStr for TraceEvent {
    type Err = EventParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (direction, rest) = s.trim().split_once(char::is_whitespace).unwrap_or((s.trim(), ""));
        let (packet, time) = rest
            .trim_start()
            .split_once(char::is_whitespace)
            .unwrap_or((rest.trim_start(), ""));
        let time = time.trim();

        let event = |packet: &str, time: &str| -> Result<(PacketId, SimTime), EventParseError> {
            if packet.is_empty() {
                return Err(EventParseError::MissingPacket);
            }
            let packet = packet.parse().map_err(EventParseError::Packet)?;
            if time.is_empty() {
                return Err(EventParseError::MissingTime);
            }
            Ok((packet, time.parse()?))
        };

        match direction {
            "tx" => event(packet, time).map(|(packet, at)| Self::Send { packet, at }),
            "rx" => event(packet, time).map(|(packet, at)| Self::Receive { packet, at }),
            found => Err(EventParseError::Direction {
                found: found.to_owned(),
            }),
        }
    }
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Send { packet, at } => write!(f, "tx {packet} {at}"),
            Self::Receive { packet, at } => write!(f, "rx {packet} {at}"),
        }
    }
}

impl ReplayStats {
    fn count(&mut self, outcome: Option<ReceiveOutcome>) {
        match outcome {
            None => self.sends += 1,
            Some(ReceiveOutcome::Recorded(_)) => self.recorded += 1,
            Some(ReceiveOutcome::Reordered(_)) => self.reordered += 1,
            Some(ReceiveOutcome::Unmatched) => self.unmatched += 1,
            Some(ReceiveOutcome::Duplicate) => self.duplicates += 1,
        }
    }
}

/// Feed every event of `reader` to `recorder`, in order.
///
/// Stops at the first line that does not parse; the events before it have
/// been recorded.
pub fn replay<B, R>(reader: B, mut recorder: R) -> Result<ReplayStats, TraceError>
where
    B: BufRead,
    R: DelayRecorder,
{
    let mut stats = ReplayStats::default();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let event: TraceEvent = line.parse().map_err(|source| TraceError::Parse {
            line: index + 1,
            source,
        })?;
        debug!(%event, "replay");
        stats.count(event.apply(&mut recorder));
    }

    info!(
        sends = stats.sends,
        recorded = stats.recorded,
        reordered = stats.reordered,
        unmatched = stats.unmatched,
        duplicates = stats.duplicates,
        "trace replayed"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkmeter_core::{Delay, DelayLedger};

    #[test]
    fn parse_events() {
        assert_eq!(
            "tx 1 2s".parse::<TraceEvent>().unwrap(),
            TraceEvent::Send {
                packet: PacketId::new(1),
                at: SimTime::from_secs(2)
            }
        );
        assert_eq!(
            "  rx   1   2s 50ms ".parse::<TraceEvent>().unwrap(),
            TraceEvent::Receive {
                packet: PacketId::new(1),
                at: SimTime::from_millis(2_050)
            }
        );
    }

    #[test]
    fn display_parses_back() {
        let event = TraceEvent::Receive {
            packet: PacketId::new(42),
            at: SimTime::from_micros(2_050_500),
        };
        assert_eq!(event.to_string().parse::<TraceEvent>().unwrap(), event);
    }

    #[test]
    fn invalid_events() {
        assert!(matches!(
            "ack 1 2s".parse::<TraceEvent>(),
            Err(EventParseError::Direction { .. })
        ));
        assert!(matches!(
            "tx".parse::<TraceEvent>(),
            Err(EventParseError::MissingPacket)
        ));
        assert!(matches!(
            "tx one 2s".parse::<TraceEvent>(),
            Err(EventParseError::Packet(_))
        ));
        assert!(matches!(
            "rx 1".parse::<TraceEvent>(),
            Err(EventParseError::MissingTime)
        ));
        assert!(matches!(
            "rx 1 soon".parse::<TraceEvent>(),
            Err(EventParseError::Time(_))
        ));
    }

    #[test]
    fn replay_into_ledger() {
        let trace = "\
            # client trace\n\
            tx 1 2s\n\
            \n\
            rx 1 2.050s\n\
            rx 7 1s\n\
            rx 1 2.060s\n\
            tx 2 3s\n\
            rx 2 2.990s\n\
            tx 3 4s\n";

        let mut ledger = DelayLedger::new();
        let stats = replay(trace.as_bytes(), &mut ledger).unwrap();

        assert_eq!(
            stats,
            ReplayStats {
                sends: 3,
                recorded: 1,
                reordered: 1,
                unmatched: 1,
                duplicates: 1,
            }
        );
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.delays()[0], (PacketId::new(1), Delay::from_millis(50)));
        assert_eq!(ledger.outstanding(), 1);
    }

    #[test]
    fn parse_errors_carry_the_line() {
        let trace = "tx 1 2s\n# fine\nrx 1 later\n";

        let mut ledger = DelayLedger::new();
        let error = replay(trace.as_bytes(), &mut ledger).unwrap_err();

        assert!(matches!(error, TraceError::Parse { line: 3, .. }));
        assert!(error.to_string().starts_with("line 3:"));
        // the send before the bad line was kept
        assert_eq!(ledger.outstanding(), 1);
    }
}
