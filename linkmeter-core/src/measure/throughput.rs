use logos::{Lexer, Logos};
use serde::{Serialize, Serializer};
use std::{fmt, str::FromStr, time::Duration};
use thiserror::Error;

const KILO: f64 = 1_000.0;
const MEGA: f64 = 1_000_000.0;
const GIGA: f64 = 1_000_000_000.0;

/// A data rate, in bits per second.
///
/// Used both for what a run achieved (computed from byte counters) and for
/// the configuration-specific ceilings of the capacity tables. Multiples are
/// decimal (`1mbps` is `1_000_000` bits per second), which is how wireless
/// PHY rates are quoted.
///
/// # Example
///
/// ```
/// # use linkmeter_core::measure::Throughput;
/// # use std::time::Duration;
/// // 139_650 bytes received over 8 seconds
/// let throughput = Throughput::from_bytes_over(139_650, Duration::from_secs(8));
/// assert!((throughput.as_mbps() - 0.139_65).abs() < 1e-12);
///
/// let parsed: Throughput = "72.2mbps".parse().unwrap();
/// assert_eq!(parsed.to_string(), "72.20mbps");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Throughput(f64);

impl Throughput {
    /// Nothing went through.
    pub const ZERO: Self = Self(0.0);

    #[inline]
    pub const fn from_bps(bits_per_sec: f64) -> Self {
        Self(bits_per_sec)
    }

    #[inline]
    pub const fn from_mbps(mbps: f64) -> Self {
        Self(mbps * MEGA)
    }

    /// The rate at which `bytes` were moved during `elapsed`.
    ///
    /// An empty `elapsed` has no defined rate and yields [`Throughput::ZERO`].
    pub fn from_bytes_over(bytes: u64, elapsed: Duration) -> Self {
        if elapsed.is_zero() {
            return Self::ZERO;
        }
        Self(bytes as f64 * 8.0 / elapsed.as_secs_f64())
    }

    #[inline]
    pub fn as_bps(self) -> f64 {
        self.0
    }

    #[inline]
    pub fn as_mbps(self) -> f64 {
        self.0 / MEGA
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0.0
    }
}

/// Serialized as Mbps.
impl Serialize for Throughput {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_mbps())
    }
}

impl fmt::Display for Throughput {
    /// Formats in Mbps with up to 2 decimal places.
    ///
    /// - `Throughput::from_mbps(65.0)` → `"65mbps"`
    /// - `Throughput::from_mbps(72.2)` → `"72.20mbps"`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mbps = self.as_mbps();
        if mbps.fract() == 0.0 {
            write!(f, "{}mbps", mbps as u64)
        } else {
            write!(f, "{mbps:.2}mbps")
        }
    }
}

#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\n\f]+")] // Ignore this regex pattern between tokens
enum ThroughputToken {
    #[regex("bps|b/s")]
    Bps,
    #[regex("kbps|Kbps|kb/s")]
    Kbps,
    #[regex("mbps|Mbps|Mb/s")]
    Mbps,
    #[regex("gbps|Gbps|Gb/s")]
    Gbps,

    #[regex(r"[0-9]+(\.[0-9]+)?")]
    Value,
}

/// Error returned when parsing a [`Throughput`] from a string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThroughputParseError {
    #[error("expecting to parse a number")]
    MissingValue,
    #[error("expecting to parse a unit (bps, kbps, mbps, gbps)")]
    MissingUnit,
    #[error("invalid number `{0}'")]
    InvalidNumber(String),
    #[error("not expecting any other tokens to parse a throughput")]
    TrailingInput,
}

impl FromStr for Throughput {
    type Err = ThroughputParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lex = Lexer::<'_, ThroughputToken>::new(s);

        let Some(Ok(ThroughputToken::Value)) = lex.next() else {
            return Err(ThroughputParseError::MissingValue);
        };
        let number: f64 = lex
            .slice()
            .parse()
            .map_err(|_| ThroughputParseError::InvalidNumber(lex.slice().to_owned()))?;
        let Some(Ok(token)) = lex.next() else {
            return Err(ThroughputParseError::MissingUnit);
        };
        let bps = match token {
            ThroughputToken::Bps => number,
            ThroughputToken::Kbps => number * KILO,
            ThroughputToken::Mbps => number * MEGA,
            ThroughputToken::Gbps => number * GIGA,
            ThroughputToken::Value => return Err(ThroughputParseError::MissingUnit),
        };

        if lex.next().is_some() {
            return Err(ThroughputParseError::TrailingInput);
        }

        Ok(Self::from_bps(bps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_throughput() {
        macro_rules! assert_throughput {
            ($string:literal == $bps:expr) => {
                assert_eq!(
                    $string.parse::<Throughput>().unwrap(),
                    Throughput::from_bps($bps)
                );
            };
        }

        assert_throughput!("0bps" == 0.0);
        assert_throughput!("42bps" == 42.0);
        assert_throughput!("42kbps" == 42_000.0);
        assert_throughput!("45mbps" == 45_000_000.0);
        assert_throughput!("45 Mbps" == 45_000_000.0);
        assert_throughput!("1.5gbps" == 1_500_000_000.0);
    }

    #[test]
    fn print_throughput() {
        assert_eq!(Throughput::ZERO.to_string(), "0mbps");
        assert_eq!(Throughput::from_mbps(65.0).to_string(), "65mbps");
        assert_eq!(Throughput::from_mbps(19.5).to_string(), "19.50mbps");
        assert_eq!(Throughput::from_bps(139_650.0).to_string(), "0.14mbps");
    }

    #[test]
    fn parse_invalid_strings() {
        assert_eq!("42".parse::<Throughput>(), Err(ThroughputParseError::MissingUnit));
        assert_eq!("mbps".parse::<Throughput>(), Err(ThroughputParseError::MissingValue));
        assert_eq!("".parse::<Throughput>(), Err(ThroughputParseError::MissingValue));
        assert_eq!(
            "42mbps extra".parse::<Throughput>(),
            Err(ThroughputParseError::TrailingInput)
        );
    }

    #[test]
    fn zero_elapsed_is_zero_throughput() {
        assert_eq!(
            Throughput::from_bytes_over(1_470, Duration::ZERO),
            Throughput::ZERO
        );
        assert!(Throughput::from_bytes_over(0, Duration::from_secs(1)).is_zero());
    }

    #[test]
    fn bytes_over_duration() {
        // 1_250_000 bytes in one second is 10 Mbps
        let throughput = Throughput::from_bytes_over(1_250_000, Duration::from_secs(1));
        assert_eq!(throughput.as_mbps(), 10.0);
        assert_eq!(throughput.as_bps(), 10_000_000.0);
    }

    #[test]
    fn ordering() {
        assert!(Throughput::from_mbps(39.0) < Throughput::from_mbps(65.0));
        assert!(Throughput::ZERO < Throughput::from_bps(1.0));
    }
}
