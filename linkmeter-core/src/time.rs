//! Simulated timestamps and one-way delays.
//!
//! The engine reports every notification with a [`SimTime`], the time elapsed
//! since the scenario started. Subtracting two of them gives a [`Delay`],
//! which is signed: a receive reported before its send is an ordering bug
//! upstream and we want to see it rather than hide it.

use logos::{Lexer, Logos};
use serde::{Deserialize, Serialize, Serializer};
use std::{fmt, str::FromStr, time::Duration};
use thiserror::Error;

/// An instant of the simulated run, measured from the scenario start.
///
/// ```
/// # use linkmeter_core::SimTime;
/// let t: SimTime = "2.050s".parse().unwrap();
/// assert_eq!(t, SimTime::from_millis(2_050));
/// assert_eq!(t.to_string(), "2.05s");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SimTime(Duration);

/// Signed one-way delay with nanosecond precision.
///
/// # Truncation
///
/// [`Delay::as_millis`] truncates toward zero, which is what the CSV
/// export writes:
///
/// ```
/// # use linkmeter_core::Delay;
/// assert_eq!(Delay::from_micros(1_999).as_millis(), 1);
/// assert_eq!(Delay::from_micros(-1_999).as_millis(), -1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Delay(i64);

impl SimTime {
    /// The scenario start.
    pub const ZERO: Self = Self(Duration::ZERO);

    #[inline]
    pub const fn new(since_start: Duration) -> Self {
        Self(since_start)
    }

    #[inline]
    pub const fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    #[inline]
    pub const fn from_millis(millis: u64) -> Self {
        Self(Duration::from_millis(millis))
    }

    #[inline]
    pub const fn from_micros(micros: u64) -> Self {
        Self(Duration::from_micros(micros))
    }

    #[inline]
    pub fn into_duration(self) -> Duration {
        self.0
    }

    /// Time elapsed between `earlier` and `self`.
    ///
    /// Returns `None` if `earlier` is after `self`.
    pub fn checked_since(self, earlier: SimTime) -> Option<Duration> {
        self.0.checked_sub(earlier.0)
    }
}

impl Delay {
    pub const ZERO: Self = Self(0);

    #[inline]
    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    #[inline]
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros.saturating_mul(1_000))
    }

    #[inline]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis.saturating_mul(1_000_000))
    }

    /// `received - sent`, negative if the receive predates the send.
    pub fn between(sent: SimTime, received: SimTime) -> Self {
        let sent = sent.0.as_nanos() as i128;
        let received = received.0.as_nanos() as i128;
        let nanos = (received - sent).clamp(i64::MIN as i128, i64::MAX as i128);
        Self(nanos as i64)
    }

    #[inline]
    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    /// Whole milliseconds, truncated toward zero.
    #[inline]
    pub const fn as_millis(self) -> i64 {
        self.0 / 1_000_000
    }

    #[inline]
    pub fn as_millis_f64(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    #[inline]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        <Duration as fmt::Debug>::fmt(&self.0, f)
    }
}

impl fmt::Display for Delay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negative() {
            f.write_str("-")?;
        }
        let magnitude = Duration::from_nanos(self.0.unsigned_abs());
        <Duration as fmt::Debug>::fmt(&magnitude, f)
    }
}

/// Delays are reported in (fractional) milliseconds.
impl Serialize for Delay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_millis_f64())
    }
}

impl From<Duration> for SimTime {
    fn from(value: Duration) -> Self {
        Self::new(value)
    }
}

impl From<SimTime> for Duration {
    fn from(value: SimTime) -> Self {
        value.into_duration()
    }
}

impl From<SimTime> for String {
    fn from(value: SimTime) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for SimTime {
    type Error = TimeParseError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Error returned when parsing a [`SimTime`] from a string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeParseError {
    #[error("empty time value")]
    Empty,
    #[error("failed to parse `{input}'")]
    Unexpected { input: String },
    #[error("expecting time to start with a number, cannot parse `{input}'")]
    MissingValue { input: String },
    #[error("expecting a unit (ns, us, ms, s, m) after the number in `{input}'")]
    MissingUnit { input: String },
    #[error("time value `{input}' is out of range")]
    Overflow { input: String },
}

impl FromStr for SimTime {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_duration(s).map(Self)
    }
}

/// Parse a span of simulated time.
///
/// Accepts a sequence of `<number><unit>` terms which are summed up,
/// e.g. `2s`, `2s 50ms`, `2.050s`. Fractions are allowed on every unit
/// and digits past the nanosecond are truncated.
pub fn parse_duration(s: &str) -> Result<Duration, TimeParseError> {
    let mut lex = Lexer::<'_, Token>::new(s);
    let mut total: u128 = 0;
    let mut terms = 0usize;

    while let Some(next) = lex.next() {
        let token = next.map_err(|()| TimeParseError::Unexpected {
            input: s.to_owned(),
        })?;
        if token != Token::Value {
            return Err(TimeParseError::MissingValue {
                input: s.to_owned(),
            });
        }
        let value = lex.slice();

        let Some(Ok(unit)) = lex.next() else {
            return Err(TimeParseError::MissingUnit {
                input: s.to_owned(),
            });
        };
        let unit_nanos: u128 = match unit {
            Token::NanoSeconds => 1,
            Token::MicroSeconds => 1_000,
            Token::MilliSeconds => 1_000_000,
            Token::Seconds => 1_000_000_000,
            Token::Minutes => 60_000_000_000,
            Token::Value => {
                return Err(TimeParseError::MissingUnit {
                    input: s.to_owned(),
                });
            }
        };

        total = scaled_nanos(value, unit_nanos)
            .and_then(|nanos| total.checked_add(nanos))
            .ok_or_else(|| TimeParseError::Overflow {
                input: s.to_owned(),
            })?;
        terms += 1;
    }

    if terms == 0 {
        return Err(TimeParseError::Empty);
    }

    let nanos = u64::try_from(total).map_err(|_| TimeParseError::Overflow {
        input: s.to_owned(),
    })?;
    Ok(Duration::from_nanos(nanos))
}

/// Largest number of fractional digits we keep, finer than a nanosecond
/// for every supported unit.
const MAX_FRACTION_DIGITS: usize = 12;

/// `value` (e.g. `"2.050"`) multiplied by `unit_nanos`, computed on integers
/// so that `2.050s` is exactly 2_050_000_000ns.
fn scaled_nanos(value: &str, unit_nanos: u128) -> Option<u128> {
    let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));
    let whole: u128 = whole.parse().ok()?;
    let mut nanos = whole.checked_mul(unit_nanos)?;

    let fraction = &fraction[..fraction.len().min(MAX_FRACTION_DIGITS)];
    if !fraction.is_empty() {
        let digits: u128 = fraction.parse().ok()?;
        let scale = 10u128.pow(fraction.len() as u32);
        nanos = nanos.checked_add(digits * unit_nanos / scale)?;
    }
    Some(nanos)
}

#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\n\f]+")] // Ignore this regex pattern between tokens
enum Token {
    #[token("ns")]
    NanoSeconds,
    #[regex("us|µs|μs")]
    MicroSeconds,
    #[token("ms")]
    MilliSeconds,
    #[token("s")]
    Seconds,
    #[token("m")]
    Minutes,

    #[regex(r"[0-9]+(\.[0-9]+)?")]
    Value,
}
