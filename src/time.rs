//! Time systems and tagged instants
use hifitime::{Duration, Epoch, TimeScale};

use std::ops::{Add, Sub};
use std::str::FromStr;

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Time system related errors
#[derive(Error, Clone, Debug, PartialEq)]
pub enum ParsingError {
    #[error("unknown time system \"{0}\"")]
    UnknownTimeSystem(String),
    #[error("failed to parse epoch from \"{0}\"")]
    Epoch(String),
}

/// Reference timescale under which instants are interpreted.
/// Instants declared in different time systems are not comparable,
/// and the store refuses to mix them; [TimeSystem::Any] acts as a
/// wildcard compatible with every system.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TimeSystem {
    /// Wildcard: compatible with any system
    #[default]
    Any,
    /// GPS time
    GPS,
    /// Glonass time
    Glonass,
    /// Galileo system time
    Galileo,
    /// BeiDou time
    BeiDou,
    /// QZSS time
    QZSS,
    /// IRNSS (NavIC) time
    IRNSS,
    /// Coordinated universal time
    UTC,
}

impl TimeSystem {
    /// Returns true if instants declared in `self` and `rhs` may be
    /// compared: either both systems match, or one of them is the
    /// [TimeSystem::Any] wildcard.
    pub fn is_compatible(&self, rhs: TimeSystem) -> bool {
        *self == TimeSystem::Any || rhs == TimeSystem::Any || *self == rhs
    }
    /// Returns associated [TimeScale]. Returns None
    /// when hifitime does not describe this system.
    pub fn timescale(&self) -> Option<TimeScale> {
        match self {
            Self::GPS | Self::QZSS => Some(TimeScale::GPST),
            Self::Galileo => Some(TimeScale::GST),
            Self::BeiDou => Some(TimeScale::BDT),
            Self::UTC | Self::Glonass => Some(TimeScale::UTC),
            _ => None,
        }
    }
    /// Identifies the [TimeSystem] a [TimeScale] belongs to.
    pub fn from_timescale(ts: TimeScale) -> Self {
        match ts {
            TimeScale::GPST => Self::GPS,
            TimeScale::GST => Self::Galileo,
            TimeScale::BDT => Self::BeiDou,
            TimeScale::UTC => Self::UTC,
            _ => Self::Any,
        }
    }
}

impl std::fmt::Display for TimeSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Any => f.write_str("Any"),
            Self::GPS => f.write_str("GPS"),
            Self::Glonass => f.write_str("GLO"),
            Self::Galileo => f.write_str("GAL"),
            Self::BeiDou => f.write_str("BDS"),
            Self::QZSS => f.write_str("QZS"),
            Self::IRNSS => f.write_str("IRN"),
            Self::UTC => f.write_str("UTC"),
        }
    }
}

impl FromStr for TimeSystem {
    type Err = ParsingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "any" => Ok(Self::Any),
            "gps" => Ok(Self::GPS),
            "glo" | "glonass" => Ok(Self::Glonass),
            "gal" | "galileo" => Ok(Self::Galileo),
            "bds" | "beidou" => Ok(Self::BeiDou),
            "qzs" | "qzss" => Ok(Self::QZSS),
            "irn" | "irnss" => Ok(Self::IRNSS),
            "utc" => Ok(Self::UTC),
            _ => Err(ParsingError::UnknownTimeSystem(s.to_string())),
        }
    }
}

/// A timestamp together with the [TimeSystem] it is declared in.
/// Ordering and equality act on the timestamp alone: the tabular stores
/// guarantee that every instant they hold shares a single time system,
/// refusing incompatible ones at ingestion (see
/// [crate::Error::TimeSystemMismatch]).
#[derive(Copy, Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Instant {
    /// Raw timestamp
    pub epoch: Epoch,
    /// System the timestamp is declared in
    pub time_system: TimeSystem,
}

impl Instant {
    /// Builds an [Instant] from a raw [Epoch] and the [TimeSystem]
    /// it is to be interpreted in.
    pub fn new(epoch: Epoch, time_system: TimeSystem) -> Self {
        Self { epoch, time_system }
    }
    /// Builds an [Instant] from an [Epoch], deducing the time system
    /// from the embedded [TimeScale].
    pub fn from_epoch(epoch: Epoch) -> Self {
        Self {
            epoch,
            time_system: TimeSystem::from_timescale(epoch.time_scale),
        }
    }
    /// Returns true if `self` and `rhs` are declared in compatible
    /// time systems and may therefore be compared.
    pub fn comparable(&self, rhs: &Self) -> bool {
        self.time_system.is_compatible(rhs.time_system)
    }
    /// Copies and returns [Self] re-tagged with the given system.
    pub fn with_time_system(&self, time_system: TimeSystem) -> Self {
        Self {
            epoch: self.epoch,
            time_system,
        }
    }
}

impl From<Epoch> for Instant {
    fn from(epoch: Epoch) -> Self {
        Self::from_epoch(epoch)
    }
}

impl FromStr for Instant {
    type Err = ParsingError;
    /// Parses an [Instant] from a standard epoch description,
    /// for example "2023-08-27T18:00:00 GPST".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let epoch = Epoch::from_str(s.trim()).or(Err(ParsingError::Epoch(s.to_string())))?;
        Ok(Self::from_epoch(epoch))
    }
}

impl std::fmt::Display for Instant {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.epoch)
    }
}

impl PartialEq for Instant {
    fn eq(&self, rhs: &Self) -> bool {
        self.epoch == rhs.epoch
    }
}

impl Eq for Instant {}

impl PartialOrd for Instant {
    fn partial_cmp(&self, rhs: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(rhs))
    }
}

impl Ord for Instant {
    fn cmp(&self, rhs: &Self) -> std::cmp::Ordering {
        self.epoch.cmp(&rhs.epoch)
    }
}

impl Sub for Instant {
    type Output = Duration;
    fn sub(self, rhs: Self) -> Duration {
        self.epoch - rhs.epoch
    }
}

impl Add<Duration> for Instant {
    type Output = Instant;
    fn add(self, dt: Duration) -> Instant {
        Self {
            epoch: self.epoch + dt,
            time_system: self.time_system,
        }
    }
}

impl Sub<Duration> for Instant {
    type Output = Instant;
    fn sub(self, dt: Duration) -> Instant {
        Self {
            epoch: self.epoch - dt,
            time_system: self.time_system,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn compatibility() {
        assert!(TimeSystem::Any.is_compatible(TimeSystem::GPS));
        assert!(TimeSystem::GPS.is_compatible(TimeSystem::Any));
        assert!(TimeSystem::GPS.is_compatible(TimeSystem::GPS));
        assert!(!TimeSystem::GPS.is_compatible(TimeSystem::UTC));
        assert!(!TimeSystem::Glonass.is_compatible(TimeSystem::Galileo));
    }
    #[test]
    fn parsing() {
        for (desc, system) in [
            ("GPS", TimeSystem::GPS),
            ("gal", TimeSystem::Galileo),
            ("BeiDou", TimeSystem::BeiDou),
            ("UTC", TimeSystem::UTC),
            ("any", TimeSystem::Any),
        ] {
            assert_eq!(TimeSystem::from_str(desc), Ok(system));
        }
        assert!(TimeSystem::from_str("TAI").is_err());
    }
    #[test]
    fn instant_ordering() {
        let t0 = Instant::from_str("2023-08-27T18:00:00 GPST").unwrap();
        let t1 = Instant::from_str("2023-08-27T18:15:00 GPST").unwrap();
        assert_eq!(t0.time_system, TimeSystem::GPS);
        assert!(t0 < t1);
        assert_eq!((t1 - t0).to_seconds(), 900.0);
        assert_eq!(t0 + (t1 - t0), t1);
    }
    #[test]
    fn instant_equality_ignores_tag() {
        let t = Instant::from_str("2020-01-01T00:00:00 UTC").unwrap();
        let retagged = t.with_time_system(TimeSystem::Glonass);
        assert_eq!(t, retagged);
        assert!(!retagged.comparable(&Instant::new(t.epoch, TimeSystem::GPS)));
    }
}
