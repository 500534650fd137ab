//! Precise satellite ephemeris and clock store.
//!
//! An in-memory tabular database of satellite positions (and possibly
//! velocities) together with clock biases (and possibly drifts), filled from
//! already-parsed orbit and clock products, and queried at any instant within
//! the tables to produce interpolated position, velocity, acceleration,
//! clock offset and clock drift.
//!
//! Two product families feed the store. The combined orbit + clock family
//! (SP3-like) fills both tables; a dedicated high-rate clock-only family
//! (clock-RINEX-like) can replace the clock table entirely, with its own
//! sampling and interpolation settings. Parsing itself is delegated: any
//! type implementing [source::ProductSource] can be ingested with
//! [store::EphemerisStore::load].
#![cfg_attr(docsrs, feature(doc_cfg))]

use thiserror::Error;

use gnss::prelude::SV;

mod interp;

pub mod clock;
pub mod position;
pub mod series;
pub mod source;
pub mod store;
pub mod time;

#[cfg(test)]
mod tests;

pub use interp::{linear, LagrangeBasis};

use crate::series::SeriesKind;
use crate::time::{Instant, TimeSystem};

pub mod prelude {
    pub use crate::clock::{ClockRecord, ClockSeries, InterpolationKind};
    pub use crate::position::{PositionRecord, PositionSeries, Vector3D};
    pub use crate::series::{SeriesKind, SeriesRecord, TabularSeries};
    pub use crate::source::{
        ClockSample, HeaderRecord, LoadSummary, PositionSample, ProductRecord, ProductSource,
        SourceFormat,
    };
    pub use crate::store::{EphemerisStore, Health, Xvt, XvtProvider};
    pub use crate::time::{Instant, TimeSystem};
    pub use crate::Error;
    // Pub re-export
    pub use gnss::prelude::{Constellation, SV};
    pub use hifitime::{Duration, Epoch, TimeScale};
}

/// Errors reported by store queries and ingestion.
#[derive(Debug, Error)]
pub enum Error {
    /// Requested instant lies outside the stored span for that satellite.
    #[error("{series} table: {t} is outside the stored span for {sv}")]
    OutOfRange {
        series: SeriesKind,
        sv: SV,
        t: Instant,
    },
    /// Satellite absent from the queried table(s).
    #[error("no ephemeris for satellite {0}")]
    UnknownSatellite(SV),
    /// The samples bracketing the target are further apart than the
    /// configured gap limit allows.
    #[error("{series} table: {gap_s:.3} s data gap around {t} exceeds {limit_s:.3} s for {sv}")]
    DataGap {
        series: SeriesKind,
        sv: SV,
        t: Instant,
        gap_s: f64,
        limit_s: f64,
    },
    /// The selected interpolation window spans more than the configured
    /// maximum interval.
    #[error("{series} table: {span_s:.3} s window for {sv} exceeds {limit_s:.3} s")]
    IntervalExceeded {
        series: SeriesKind,
        sv: SV,
        span_s: f64,
        limit_s: f64,
    },
    /// Ingested data is declared in a time system incompatible with the
    /// system the store is locked to.
    #[error("time system {file} is incompatible with store time system {store}")]
    TimeSystemMismatch { store: TimeSystem, file: TimeSystem },
    /// Fewer samples than the interpolation order requires.
    #[error("{series} table: {sv} holds {have} sample(s), interpolation needs {needed}")]
    InsufficientSamples {
        series: SeriesKind,
        sv: SV,
        needed: usize,
        have: usize,
    },
    /// Time-bound query on an empty table.
    #[error("{0} table holds no data")]
    NoData(SeriesKind),
    /// Failure surfaced verbatim from the parser collaborator.
    #[error("source parser failure: {0}")]
    Parse(#[source] Box<dyn std::error::Error + Send + Sync>),
}
