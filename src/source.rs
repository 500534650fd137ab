//! Parser collaborator contract and the ingestion coordinator.
//!
//! The store never parses product files itself. A parser implements
//! [ProductSource], yielding tagged records; [crate::store::EphemerisStore::load]
//! validates the whole stream first, then routes samples to the position
//! and clock tables under the configured rejection and source rules, so
//! a failing stream never leaves a partially adopted file behind.
use gnss::prelude::SV;
use hifitime::{Duration, Epoch};

use log::{debug, warn};

use crate::clock::ClockRecord;
use crate::position::{PositionRecord, Vector3D};
use crate::store::EphemerisStore;
use crate::time::{Instant, TimeSystem};
use crate::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Product family a source delivers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SourceFormat {
    /// Combined orbit + clock product (SP3-like): positions at a fixed
    /// step, clock samples alongside.
    Ephemeris,
    /// Dedicated clock-only product (clock-RINEX-like), usually at a
    /// much higher rate, able to replace the clock table entirely.
    Clock,
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Ephemeris => f.write_str("ephemeris"),
            Self::Clock => f.write_str("clock"),
        }
    }
}

/// File-level metadata, delivered before (or between) samples.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HeaderRecord {
    /// Time system every sample instant of this product is declared in
    pub time_system: TimeSystem,
    /// Publication sampling interval, when the format states it
    pub nominal_step: Option<Duration>,
    /// Number of satellites the product claims to describe
    pub satellite_count: Option<usize>,
}

/// One parsed position sample, with producer provenance flags.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PositionSample {
    pub sv: SV,
    /// Timestamp, interpreted in the header's declared time system
    pub epoch: Epoch,
    /// Position [m]
    pub position: Vector3D,
    /// Position standard deviation [m]
    pub position_sigma: Vector3D,
    /// Velocity [dm/s], when the product carries velocity records
    pub velocity: Option<Vector3D>,
    /// Velocity standard deviation [dm/s]
    pub velocity_sigma: Option<Vector3D>,
    /// Flagged by the producer as extrapolated beyond observed data
    pub predicted: bool,
    /// Flagged bad by the producer (sentinel coordinates or sigmas)
    pub bad: bool,
}

/// One parsed clock sample, with producer provenance flags.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClockSample {
    pub sv: SV,
    /// Timestamp, interpreted in the header's declared time system
    pub epoch: Epoch,
    /// Clock bias [s]
    pub bias: f64,
    /// Clock bias standard deviation [s]
    pub bias_sigma: f64,
    /// Clock drift [s/s]
    pub drift: Option<f64>,
    /// Clock drift standard deviation [s/s]
    pub drift_sigma: Option<f64>,
    /// Clock drift change [s/s^2]
    pub acceleration: Option<f64>,
    /// Clock drift change standard deviation [s/s^2]
    pub acceleration_sigma: Option<f64>,
    /// Flagged by the producer as extrapolated beyond observed data
    pub predicted: bool,
    /// Flagged bad by the producer (sentinel bias)
    pub bad: bool,
}

/// Records a [ProductSource] yields.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ProductRecord {
    Header(HeaderRecord),
    Position(PositionSample),
    Clock(ClockSample),
}

/// Implement this to feed a store from any parser. Record order is free,
/// except that a header must precede the samples it describes.
pub trait ProductSource {
    type Error: std::error::Error + Send + Sync + 'static;
    /// Product family this source delivers, as detected by the parser
    /// (not from a file name).
    fn format(&self) -> SourceFormat;
    /// Next record, None when the stream is exhausted.
    fn next_record(&mut self) -> Option<Result<ProductRecord, Self::Error>>;
}

/// Ingestion accounting returned by [EphemerisStore::load].
#[derive(Debug, Clone, PartialEq)]
pub struct LoadSummary {
    /// Family of the ingested product
    pub format: SourceFormat,
    /// Time system the store operates in after this ingestion
    pub time_system: TimeSystem,
    /// Sampling interval claimed by the product header
    pub nominal_step: Option<Duration>,
    /// Satellite count claimed by the product header
    pub satellite_count: Option<usize>,
    /// Position samples adopted
    pub positions_loaded: usize,
    /// Position samples dropped by the rejection flags
    pub positions_rejected: usize,
    /// Clock samples adopted
    pub clocks_loaded: usize,
    /// Clock samples dropped by the rejection flags
    pub clocks_rejected: usize,
}

impl EphemerisStore {
    /// Ingests one product. The stream is drained and validated first:
    /// a parse failure or a time-system mismatch leaves the store
    /// exactly as it was.
    ///
    /// Ephemeris products always feed the position table, and feed the
    /// clock table as long as the clock source is [SourceFormat::Ephemeris].
    /// Clock products feed the clock table only; ingesting one while the
    /// clock source is [SourceFormat::Ephemeris] implicitly switches the
    /// source, dropping previously loaded clock data (with a warning).
    pub fn load<S: ProductSource>(&mut self, mut source: S) -> Result<LoadSummary, Error> {
        let format = source.format();
        let mut file_system = TimeSystem::Any;
        let mut nominal_step = None;
        let mut satellite_count = None;
        let mut positions = Vec::new();
        let mut clocks = Vec::new();

        while let Some(record) = source.next_record() {
            match record.map_err(|e| Error::Parse(Box::new(e)))? {
                ProductRecord::Header(header) => {
                    if !file_system.is_compatible(header.time_system) {
                        return Err(Error::TimeSystemMismatch {
                            store: file_system,
                            file: header.time_system,
                        });
                    }
                    if !self.time_system().is_compatible(header.time_system) {
                        return Err(Error::TimeSystemMismatch {
                            store: self.time_system(),
                            file: header.time_system,
                        });
                    }
                    if header.time_system != TimeSystem::Any {
                        file_system = header.time_system;
                    }
                    nominal_step = header.nominal_step.or(nominal_step);
                    satellite_count = header.satellite_count.or(satellite_count);
                },
                ProductRecord::Position(sample) => positions.push(sample),
                ProductRecord::Clock(sample) => clocks.push(sample),
            }
        }

        // stream fully validated: adopt and route
        self.reconcile_time_system(file_system)?;
        let time_system = self.time_system();

        let feed_clocks = match format {
            SourceFormat::Ephemeris => self.clock_source() == SourceFormat::Ephemeris,
            SourceFormat::Clock => {
                if self.clock_source() == SourceFormat::Ephemeris {
                    warn!(
                        "clock product ingested while the clock table is fed from ephemeris products: switching source, previously loaded clock data is dropped"
                    );
                    self.set_clock_source(SourceFormat::Clock);
                }
                if !positions.is_empty() {
                    warn!(
                        "clock product delivered {} position sample(s), ignored",
                        positions.len()
                    );
                    positions.clear();
                }
                true
            },
        };

        let mut summary = LoadSummary {
            format,
            time_system,
            nominal_step,
            satellite_count,
            positions_loaded: 0,
            positions_rejected: 0,
            clocks_loaded: 0,
            clocks_rejected: 0,
        };

        for sample in positions {
            if (self.rejects_bad_positions() && sample.bad)
                || (self.rejects_predicted_positions() && sample.predicted)
            {
                summary.positions_rejected += 1;
                continue;
            }
            let t = Instant::new(sample.epoch, time_system);
            self.positions_mut().insert(
                sample.sv,
                t,
                PositionRecord {
                    position: sample.position,
                    position_sigma: sample.position_sigma,
                    velocity: sample.velocity,
                    velocity_sigma: sample.velocity_sigma,
                },
            );
            summary.positions_loaded += 1;
        }

        if feed_clocks {
            // producer flags only exist on the ephemeris family
            let police = format == SourceFormat::Ephemeris;
            for sample in clocks {
                if police
                    && ((self.rejects_bad_clocks() && sample.bad)
                        || (self.rejects_predicted_clocks() && sample.predicted))
                {
                    summary.clocks_rejected += 1;
                    continue;
                }
                let t = Instant::new(sample.epoch, time_system);
                self.clocks_mut().insert(
                    sample.sv,
                    t,
                    ClockRecord {
                        bias: sample.bias,
                        bias_sigma: sample.bias_sigma,
                        drift: sample.drift,
                        drift_sigma: sample.drift_sigma,
                        acceleration: sample.acceleration,
                        acceleration_sigma: sample.acceleration_sigma,
                    },
                );
                summary.clocks_loaded += 1;
            }
        }

        debug!(
            "{} product ingested: {} position sample(s) (+{} rejected), {} clock sample(s) (+{} rejected), time system {}",
            format,
            summary.positions_loaded,
            summary.positions_rejected,
            summary.clocks_loaded,
            summary.clocks_rejected,
            time_system,
        );
        Ok(summary)
    }
}
