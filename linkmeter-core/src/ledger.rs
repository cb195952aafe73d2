//! Per-packet one-way delay tracking.
//!
//! The [`DelayLedger`] correlates the send and receive notifications of the
//! traced source. Records are keyed by [`PacketId`]; every successful
//! correlation appends `(id, delay)` to an ordered sequence which is what
//! [`DelayLedger::summary`] and the CSV export read from.

use crate::{
    id::PacketId,
    time::{Delay, SimTime},
};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

/// What the ledger knows about one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketRecord {
    id: PacketId,
    send_time: SimTime,
    receive_time: Option<SimTime>,
}

/// The result of a [`DelayRecorder::record_receive`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// The delay was appended to the ledger.
    Recorded(Delay),
    /// The delay was appended to the ledger but it is negative: the receive
    /// was reported before the send it matches.
    Reordered(Delay),
    /// No send was recorded for this packet; the ledger is unchanged.
    Unmatched,
    /// The packet was already received since its last send; the ledger is
    /// unchanged.
    Duplicate,
}

/// The narrow capability handed to whatever subscribes to the engine's
/// send and receive notifications.
///
/// Notifications are expected one at a time and in non-decreasing
/// timestamp order.
pub trait DelayRecorder {
    fn record_send(&mut self, id: PacketId, at: SimTime);

    fn record_receive(&mut self, id: PacketId, at: SimTime) -> ReceiveOutcome;
}

/// count, mean, min and max of the delays of a [`DelayLedger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DelaySummary {
    pub count: usize,
    pub mean: Delay,
    pub min: Delay,
    pub max: Delay,
}

/// Correlates send and receive notifications into one-way delays.
///
/// # Example
///
/// ```
/// # use linkmeter_core::{DelayLedger, DelayRecorder, Delay, PacketId, SimTime};
/// let mut ledger = DelayLedger::new();
///
/// ledger.record_send(PacketId::new(1), SimTime::from_millis(2_000));
/// ledger.record_receive(PacketId::new(1), SimTime::from_millis(2_050));
///
/// let summary = ledger.summary().unwrap();
/// assert_eq!(summary.count, 1);
/// assert_eq!(summary.mean, Delay::from_millis(50));
/// ```
#[derive(Debug, Clone, Default)]
pub struct DelayLedger {
    records: HashMap<PacketId, PacketRecord>,
    delays: Vec<(PacketId, Delay)>,
}

impl PacketRecord {
    pub fn id(&self) -> PacketId {
        self.id
    }

    pub fn send_time(&self) -> SimTime {
        self.send_time
    }

    pub fn receive_time(&self) -> Option<SimTime> {
        self.receive_time
    }

    pub fn is_delivered(&self) -> bool {
        self.receive_time.is_some()
    }

    /// The one-way delay, once delivered.
    pub fn delay(&self) -> Option<Delay> {
        self.receive_time
            .map(|received| Delay::between(self.send_time, received))
    }
}

impl ReceiveOutcome {
    /// The delay that was appended to the ledger, if any.
    pub fn delay(self) -> Option<Delay> {
        match self {
            Self::Recorded(delay) | Self::Reordered(delay) => Some(delay),
            Self::Unmatched | Self::Duplicate => None,
        }
    }
}

impl DelayLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of delays recorded so far.
    pub fn len(&self) -> usize {
        self.delays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delays.is_empty()
    }

    /// The recorded `(id, delay)` pairs, in receive order.
    pub fn delays(&self) -> &[(PacketId, Delay)] {
        &self.delays
    }

    pub fn record(&self, id: PacketId) -> Option<&PacketRecord> {
        self.records.get(&id)
    }

    /// Packets sent and not received (yet).
    pub fn outstanding(&self) -> usize {
        self.records
            .values()
            .filter(|record| !record.is_delivered())
            .count()
    }

    /// Returns `None` if no delay was recorded.
    pub fn summary(&self) -> Option<DelaySummary> {
        let (&(_, first), rest) = self.delays.split_first()?;

        let mut total = first.as_nanos() as i128;
        let mut min = first;
        let mut max = first;
        for &(_, delay) in rest {
            total += delay.as_nanos() as i128;
            min = min.min(delay);
            max = max.max(delay);
        }

        let count = self.delays.len();
        let mean = Delay::from_nanos((total / count as i128) as i64);

        Some(DelaySummary {
            count,
            mean,
            min,
            max,
        })
    }

    /// The `q`-th percentile (`0.0..=100.0`) of the recorded delays, linearly
    /// interpolated between the two closest ranks.
    ///
    /// Returns `None` if no delay was recorded or `q` is out of range.
    pub fn percentile(&self, q: f64) -> Option<Delay> {
        if self.delays.is_empty() || !(0.0..=100.0).contains(&q) {
            return None;
        }

        let mut sorted: Vec<i64> = self.delays.iter().map(|(_, d)| d.as_nanos()).collect();
        sorted.sort_unstable();

        let rank = q / 100.0 * (sorted.len() - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = rank.ceil() as usize;
        let weight = rank - lower as f64;

        let low = sorted[lower] as f64;
        let high = sorted[upper] as f64;
        Some(Delay::from_nanos((low + (high - low) * weight).round() as i64))
    }
}

impl DelayRecorder for DelayLedger {
    /// Creates the record for `id`, or resets it if one already exists.
    fn record_send(&mut self, id: PacketId, at: SimTime) {
        debug!(packet = %id, time = %at, "send");
        self.records.insert(
            id,
            PacketRecord {
                id,
                send_time: at,
                receive_time: None,
            },
        );
    }

    fn record_receive(&mut self, id: PacketId, at: SimTime) -> ReceiveOutcome {
        let Some(record) = self.records.get_mut(&id) else {
            debug!(packet = %id, time = %at, "receive without a recorded send, ignored");
            return ReceiveOutcome::Unmatched;
        };
        if record.receive_time.is_some() {
            debug!(packet = %id, time = %at, "packet already received, ignored");
            return ReceiveOutcome::Duplicate;
        }

        record.receive_time = Some(at);
        let delay = Delay::between(record.send_time, at);
        self.delays.push((id, delay));

        if delay.is_negative() {
            warn!(
                packet = %id,
                sent = %record.send_time,
                received = %at,
                %delay,
                "receive reported before its send, delay recorded as-is"
            );
            ReceiveOutcome::Reordered(delay)
        } else {
            debug!(packet = %id, time = %at, %delay, "receive");
            ReceiveOutcome::Recorded(delay)
        }
    }
}

impl<R> DelayRecorder for &mut R
where
    R: DelayRecorder + ?Sized,
{
    fn record_send(&mut self, id: PacketId, at: SimTime) {
        (**self).record_send(id, at)
    }

    fn record_receive(&mut self, id: PacketId, at: SimTime) -> ReceiveOutcome {
        (**self).record_receive(id, at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaChaRng;
    use rand_core::{Rng as _, SeedableRng as _};
    use std::collections::HashMap;

    fn ms(millis: u64) -> SimTime {
        SimTime::from_millis(millis)
    }

    fn id(id: u64) -> PacketId {
        PacketId::new(id)
    }

    #[test]
    fn single_packet() {
        let mut ledger = DelayLedger::new();

        ledger.record_send(id(1), ms(2_000));
        let outcome = ledger.record_receive(id(1), ms(2_050));

        assert_eq!(outcome, ReceiveOutcome::Recorded(Delay::from_millis(50)));
        assert_eq!(
            ledger.summary(),
            Some(DelaySummary {
                count: 1,
                mean: Delay::from_millis(50),
                min: Delay::from_millis(50),
                max: Delay::from_millis(50),
            })
        );

        let record = ledger.record(id(1)).unwrap();
        assert!(record.is_delivered());
        assert_eq!(record.send_time(), ms(2_000));
        assert_eq!(record.receive_time(), Some(ms(2_050)));
        assert_eq!(record.delay(), Some(Delay::from_millis(50)));
    }

    #[test]
    fn receive_without_send_is_ignored() {
        let mut ledger = DelayLedger::new();

        let outcome = ledger.record_receive(id(7), ms(1_000));

        assert_eq!(outcome, ReceiveOutcome::Unmatched);
        assert!(ledger.is_empty());
        assert!(ledger.record(id(7)).is_none());
        assert_eq!(ledger.summary(), None);
    }

    #[test]
    fn empty_summary() {
        let ledger = DelayLedger::new();
        assert_eq!(ledger.summary(), None);
        assert_eq!(ledger.percentile(50.0), None);
        assert_eq!(ledger.len(), 0);
    }

    #[test]
    fn duplicate_receive_is_ignored() {
        let mut ledger = DelayLedger::new();

        ledger.record_send(id(1), ms(0));
        ledger.record_receive(id(1), ms(10));
        let outcome = ledger.record_receive(id(1), ms(20));

        assert_eq!(outcome, ReceiveOutcome::Duplicate);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.record(id(1)).unwrap().receive_time(), Some(ms(10)));
    }

    #[test]
    fn second_send_resets_the_record() {
        let mut ledger = DelayLedger::new();

        ledger.record_send(id(1), ms(0));
        ledger.record_send(id(1), ms(100));
        assert_eq!(ledger.outstanding(), 1);

        ledger.record_receive(id(1), ms(130));
        assert_eq!(ledger.delays(), &[(id(1), Delay::from_millis(30))]);

        // a new send re-arms the record for another receive
        ledger.record_send(id(1), ms(200));
        assert_eq!(ledger.outstanding(), 1);
        ledger.record_receive(id(1), ms(210));
        assert_eq!(
            ledger.delays(),
            &[(id(1), Delay::from_millis(30)), (id(1), Delay::from_millis(10))]
        );
        assert_eq!(ledger.outstanding(), 0);
    }

    #[test]
    fn negative_delay_is_recorded_unclamped() {
        let mut ledger = DelayLedger::new();

        ledger.record_send(id(3), ms(500));
        let outcome = ledger.record_receive(id(3), ms(480));

        assert_eq!(outcome, ReceiveOutcome::Reordered(Delay::from_millis(-20)));
        assert_eq!(outcome.delay(), Some(Delay::from_millis(-20)));
        assert_eq!(ledger.summary().unwrap().min, Delay::from_millis(-20));
    }

    #[test]
    fn summary_over_many() {
        let mut ledger = DelayLedger::new();
        for (n, delay) in [30u64, 10, 20, 40].into_iter().enumerate() {
            let n = n as u64;
            ledger.record_send(id(n), ms(n * 1_000));
            ledger.record_receive(id(n), ms(n * 1_000 + delay));
        }

        let summary = ledger.summary().unwrap();
        assert_eq!(summary.count, 4);
        assert_eq!(summary.mean, Delay::from_micros(25_000));
        assert_eq!(summary.min, Delay::from_millis(10));
        assert_eq!(summary.max, Delay::from_millis(40));

        // receive order is kept
        let order: Vec<u64> = ledger.delays().iter().map(|(id, _)| id.get()).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn percentiles() {
        let mut ledger = DelayLedger::new();
        for n in 1..=5u64 {
            ledger.record_send(id(n), ms(0));
            ledger.record_receive(id(n), ms(n * 10));
        }

        assert_eq!(ledger.percentile(0.0), Some(Delay::from_millis(10)));
        assert_eq!(ledger.percentile(50.0), Some(Delay::from_millis(30)));
        assert_eq!(ledger.percentile(100.0), Some(Delay::from_millis(50)));
        // rank 3.8 between 40ms and 50ms
        assert_eq!(ledger.percentile(95.0), Some(Delay::from_millis(48)));
        assert_eq!(ledger.percentile(101.0), None);
        assert_eq!(ledger.percentile(f64::NAN), None);
    }

    #[test]
    fn recorder_through_mutable_reference() {
        fn drive<R: DelayRecorder>(mut recorder: R) {
            recorder.record_send(id(9), ms(1));
            recorder.record_receive(id(9), ms(4));
        }

        let mut ledger = DelayLedger::new();
        drive(&mut ledger);
        assert_eq!(ledger.delays(), &[(id(9), Delay::from_millis(3))]);
    }

    /// The number of recorded delays equals the number of receives that
    /// had a prior send and no prior matching receive.
    #[test]
    fn recorded_count_matches_matched_receives() {
        let mut rng = ChaChaRng::seed_from_u64(42);

        for _ in 0..50 {
            let mut ledger = DelayLedger::new();
            // `true` once delivered since the last send
            let mut model: HashMap<u64, bool> = HashMap::new();
            let mut expected = 0usize;
            let mut now = 0u64;

            for _ in 0..200 {
                now += rng.next_u64() % 5;
                let packet = rng.next_u64() % 8;

                if rng.next_u64() % 2 == 0 {
                    ledger.record_send(id(packet), ms(now));
                    model.insert(packet, false);
                } else {
                    let outcome = ledger.record_receive(id(packet), ms(now));
                    match model.get(&packet).copied() {
                        Some(false) => {
                            model.insert(packet, true);
                            expected += 1;
                            assert!(matches!(outcome, ReceiveOutcome::Recorded(_)));
                        }
                        Some(true) => assert_eq!(outcome, ReceiveOutcome::Duplicate),
                        None => assert_eq!(outcome, ReceiveOutcome::Unmatched),
                    }
                }
            }

            assert_eq!(ledger.len(), expected);
            assert_eq!(ledger.summary().map_or(0, |s| s.count), expected);
        }
    }
}
