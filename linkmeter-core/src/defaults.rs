/// Upper bound (inclusive) of the [`Near`] distance bucket, in meters.
///
/// [`Near`]: crate::capacity::DistanceBucket::Near
pub const NEAR_LIMIT_M: f64 = 20.0;

/// Upper bound (inclusive) of the [`Mid`] distance bucket, in meters.
///
/// [`Mid`]: crate::capacity::DistanceBucket::Mid
pub const MID_LIMIT_M: f64 = 50.0;

/// Default distance between the station and the access point, in meters.
pub const DEFAULT_DISTANCE_M: f64 = 10.0;

/// Default size of the UDP payload sent by the traffic generator, in bytes.
pub const DEFAULT_PACKET_SIZE: u32 = 1_470;

/// Below this loss percentage a link is [`Excellent`].
///
/// [`Excellent`]: crate::LinkQuality::Excellent
pub const EXCELLENT_LOSS_LIMIT: f64 = 5.0;

/// Below this loss percentage a link is [`Acceptable`], at or above it is
/// [`Critical`].
///
/// [`Acceptable`]: crate::LinkQuality::Acceptable
/// [`Critical`]: crate::LinkQuality::Critical
pub const ACCEPTABLE_LOSS_LIMIT: f64 = 20.0;

/// Header of the per-packet delay CSV export.
pub const DELAY_CSV_HEADER: &str = "PacketNumber,DelayMs";
