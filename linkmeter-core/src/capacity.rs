//! The theoretical capacity model.
//!
//! An 802.11n link is characterised here by its channel width, its number of
//! spatial streams and how far the station is from the access point. These
//! three select a cell in a [`CapacityTable`]: [`THEORETICAL_THROUGHPUT`]
//! gives the ceiling used to compute efficiency, [`TARGET_DATA_RATE`] the
//! load the traffic generator is configured to offer. Both tables share the
//! same [`DistanceBucket`] boundaries so that efficiency figures remain
//! comparable across configurations.

use crate::{defaults, measure::Throughput};
use serde::Serialize;
use std::{fmt, time::Duration};
use thiserror::Error;

/// Width of the radio channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ChannelWidth {
    #[serde(rename = "20MHz")]
    Mhz20,
    /// Channel bonding.
    #[serde(rename = "40MHz")]
    Mhz40,
}

/// Number of MIMO spatial streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SpatialStreams {
    #[serde(rename = "1x1")]
    One,
    #[serde(rename = "2x2")]
    Two,
}

/// Three-way partition of the station to access point distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceBucket {
    /// up to [`NEAR_LIMIT_M`] (inclusive)
    ///
    /// [`NEAR_LIMIT_M`]: crate::defaults::NEAR_LIMIT_M
    Near,
    /// up to [`MID_LIMIT_M`] (inclusive)
    ///
    /// [`MID_LIMIT_M`]: crate::defaults::MID_LIMIT_M
    Mid,
    Far,
}

/// The scenario's link configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScenarioParameters {
    spatial_streams: SpatialStreams,
    channel_width: ChannelWidth,
    distance_m: f64,
}

/// A rate for every `(channel width, spatial streams, distance bucket)`.
///
/// The table is a fixed array indexed by the three enums, so every
/// combination has a value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapacityTable {
    /// `[width][streams][bucket]`, in Mbps
    mbps: [[[f64; 3]; 2]; 2],
}

/// The rate the traffic generator offers and the matching spacing between
/// two packets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OfferedLoad {
    pub rate: Throughput,
    pub packet_size: u32,
    pub interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ParameterError {
    #[error("Channel width must be 20 or 40 MHz, got {0} MHz")]
    ChannelWidth(u32),
    #[error("Number of spatial streams must be 1 or 2, got {0}")]
    SpatialStreams(u32),
    #[error("Distance must be a finite, non-negative number of meters, got {0}")]
    Distance(f64),
    #[error("Packet size must not be 0")]
    PacketSize,
}

/// Monotonicity violation reported by [`CapacityTable::check_monotonic`].
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("{key:?} ({value}mbps) is not ordered with {neighbour:?} ({neighbour_value}mbps)")]
pub struct MonotonicityError {
    pub key: (ChannelWidth, SpatialStreams, DistanceBucket),
    pub value: f64,
    pub neighbour: (ChannelWidth, SpatialStreams, DistanceBucket),
    pub neighbour_value: f64,
}

/// Theoretical maximum throughput of an 802.11n link (MCS ceiling under
/// realistic conditions for the distance).
pub const THEORETICAL_THROUGHPUT: CapacityTable = CapacityTable::new([
    // 20 MHz
    [[65.0, 39.0, 19.5], [130.0, 72.2, 28.9]],
    // 40 MHz
    [[135.0, 78.0, 39.0], [270.0, 150.0, 57.8]],
]);

/// Offered load for the traffic generator.
pub const TARGET_DATA_RATE: CapacityTable = CapacityTable::new([
    // 20 MHz
    [[45.0, 30.0, 15.0], [90.0, 60.0, 30.0]],
    // 40 MHz
    [[90.0, 60.0, 30.0], [180.0, 120.0, 60.0]],
]);

impl ChannelWidth {
    pub const ALL: [Self; 2] = [Self::Mhz20, Self::Mhz40];

    pub const fn mhz(self) -> u32 {
        match self {
            Self::Mhz20 => 20,
            Self::Mhz40 => 40,
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Mhz20 => 0,
            Self::Mhz40 => 1,
        }
    }
}

impl SpatialStreams {
    pub const ALL: [Self; 2] = [Self::One, Self::Two];

    pub const fn count(self) -> u32 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::One => 0,
            Self::Two => 1,
        }
    }
}

impl DistanceBucket {
    pub const ALL: [Self; 3] = [Self::Near, Self::Mid, Self::Far];

    /// ```
    /// # use linkmeter_core::capacity::DistanceBucket;
    /// assert_eq!(DistanceBucket::from_distance(20.0), DistanceBucket::Near);
    /// assert_eq!(DistanceBucket::from_distance(20.5), DistanceBucket::Mid);
    /// assert_eq!(DistanceBucket::from_distance(50.0), DistanceBucket::Mid);
    /// assert_eq!(DistanceBucket::from_distance(50.1), DistanceBucket::Far);
    /// ```
    pub fn from_distance(meters: f64) -> Self {
        if meters <= defaults::NEAR_LIMIT_M {
            Self::Near
        } else if meters <= defaults::MID_LIMIT_M {
            Self::Mid
        } else {
            Self::Far
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Near => 0,
            Self::Mid => 1,
            Self::Far => 2,
        }
    }
}

impl TryFrom<u32> for ChannelWidth {
    type Error = ParameterError;
    fn try_from(mhz: u32) -> Result<Self, Self::Error> {
        match mhz {
            20 => Ok(Self::Mhz20),
            40 => Ok(Self::Mhz40),
            other => Err(ParameterError::ChannelWidth(other)),
        }
    }
}

impl TryFrom<u32> for SpatialStreams {
    type Error = ParameterError;
    fn try_from(count: u32) -> Result<Self, Self::Error> {
        match count {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(ParameterError::SpatialStreams(other)),
        }
    }
}

impl fmt::Display for ChannelWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}MHz", self.mhz())
    }
}

impl fmt::Display for SpatialStreams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.count();
        write!(f, "{n}x{n}")
    }
}

impl fmt::Display for DistanceBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Near => write!(f, "<= {}m", defaults::NEAR_LIMIT_M),
            Self::Mid => write!(
                f,
                "{}m - {}m",
                defaults::NEAR_LIMIT_M,
                defaults::MID_LIMIT_M
            ),
            Self::Far => write!(f, "> {}m", defaults::MID_LIMIT_M),
        }
    }
}

impl ScenarioParameters {
    /// # Errors
    ///
    /// Returns [`ParameterError::Distance`] if `distance_m` is negative or
    /// not finite.
    pub fn new(
        spatial_streams: SpatialStreams,
        channel_width: ChannelWidth,
        distance_m: f64,
    ) -> Result<Self, ParameterError> {
        if !distance_m.is_finite() || distance_m < 0.0 {
            return Err(ParameterError::Distance(distance_m));
        }
        Ok(Self {
            spatial_streams,
            channel_width,
            distance_m,
        })
    }

    pub fn spatial_streams(&self) -> SpatialStreams {
        self.spatial_streams
    }

    pub fn channel_width(&self) -> ChannelWidth {
        self.channel_width
    }

    pub fn distance_m(&self) -> f64 {
        self.distance_m
    }

    pub fn distance_bucket(&self) -> DistanceBucket {
        DistanceBucket::from_distance(self.distance_m)
    }

    /// The ceiling from [`THEORETICAL_THROUGHPUT`].
    pub fn theoretical_throughput(&self) -> Throughput {
        THEORETICAL_THROUGHPUT.lookup(self)
    }

    /// The offered load from [`TARGET_DATA_RATE`].
    pub fn target_data_rate(&self) -> Throughput {
        TARGET_DATA_RATE.lookup(self)
    }
}

impl Default for ScenarioParameters {
    fn default() -> Self {
        Self {
            spatial_streams: SpatialStreams::One,
            channel_width: ChannelWidth::Mhz20,
            distance_m: defaults::DEFAULT_DISTANCE_M,
        }
    }
}

impl CapacityTable {
    pub const fn new(mbps: [[[f64; 3]; 2]; 2]) -> Self {
        Self { mbps }
    }

    pub const fn get(
        &self,
        width: ChannelWidth,
        streams: SpatialStreams,
        bucket: DistanceBucket,
    ) -> Throughput {
        Throughput::from_mbps(self.mbps[width.index()][streams.index()][bucket.index()])
    }

    pub fn lookup(&self, parameters: &ScenarioParameters) -> Throughput {
        self.get(
            parameters.channel_width,
            parameters.spatial_streams,
            parameters.distance_bucket(),
        )
    }

    /// Checks that the rate never increases with distance and never
    /// decreases with channel width or spatial streams.
    pub fn check_monotonic(&self) -> Result<(), MonotonicityError> {
        for width in ChannelWidth::ALL {
            for streams in SpatialStreams::ALL {
                for pair in DistanceBucket::ALL.windows(2) {
                    // closer must be >= farther
                    self.ordered((width, streams, pair[1]), (width, streams, pair[0]))?;
                }
            }
        }

        for bucket in DistanceBucket::ALL {
            for streams in SpatialStreams::ALL {
                self.ordered(
                    (ChannelWidth::Mhz20, streams, bucket),
                    (ChannelWidth::Mhz40, streams, bucket),
                )?;
            }
            for width in ChannelWidth::ALL {
                self.ordered(
                    (width, SpatialStreams::One, bucket),
                    (width, SpatialStreams::Two, bucket),
                )?;
            }
        }

        Ok(())
    }

    /// `low` must not be greater than `high`.
    fn ordered(
        &self,
        low: (ChannelWidth, SpatialStreams, DistanceBucket),
        high: (ChannelWidth, SpatialStreams, DistanceBucket),
    ) -> Result<(), MonotonicityError> {
        let low_value = self.get(low.0, low.1, low.2).as_mbps();
        let high_value = self.get(high.0, high.1, high.2).as_mbps();
        if low_value <= high_value {
            Ok(())
        } else {
            Err(MonotonicityError {
                key: low,
                value: low_value,
                neighbour: high,
                neighbour_value: high_value,
            })
        }
    }
}

impl OfferedLoad {
    /// The [`TARGET_DATA_RATE`] for `parameters`, sent as `packet_size`
    /// byte packets.
    ///
    /// ```
    /// # use linkmeter_core::capacity::*;
    /// # use std::time::Duration;
    /// let parameters =
    ///     ScenarioParameters::new(SpatialStreams::One, ChannelWidth::Mhz20, 10.0).unwrap();
    /// let load = OfferedLoad::plan(&parameters, 1_470).unwrap();
    ///
    /// assert_eq!(load.rate.as_mbps(), 45.0);
    /// // 1_470 * 8 bits at 45 Mbps
    /// assert_eq!(load.interval, Duration::from_nanos(261_333));
    /// ```
    pub fn plan(parameters: &ScenarioParameters, packet_size: u32) -> Result<Self, ParameterError> {
        Self::at_rate(parameters.target_data_rate(), packet_size)
    }

    /// Like [`OfferedLoad::plan`] with an explicit rate.
    pub fn at_rate(rate: Throughput, packet_size: u32) -> Result<Self, ParameterError> {
        if packet_size == 0 {
            return Err(ParameterError::PacketSize);
        }
        // a rate too low to space packets within a `Duration` never sends
        let interval = if rate.is_zero() {
            Duration::MAX
        } else {
            Duration::try_from_secs_f64(packet_size as f64 * 8.0 / rate.as_bps())
                .unwrap_or(Duration::MAX)
        };
        Ok(Self {
            rate,
            packet_size,
            interval,
        })
    }
}
