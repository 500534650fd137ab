//! Composite ephemeris + clock store and its unified query surface.
use gnss::prelude::SV;
use hifitime::Duration;

use crate::clock::{ClockRecord, ClockSeries, InterpolationKind};
use crate::position::{PositionRecord, PositionSeries, Vector3D};
use crate::series::SeriesKind;
use crate::source::SourceFormat;
use crate::time::{Instant, TimeSystem};
use crate::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Health annotation attached to an [Xvt]. The orbit and clock products
/// this store is built from carry no health information: successful
/// queries always report [Health::Unused].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Health {
    /// The state could be determined; the products provide no
    /// health status to go with it.
    Unused,
    /// The state could not be determined from the store content.
    Unavailable,
}

impl std::fmt::Display for Health {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Unused => f.write_str("unused"),
            Self::Unavailable => f.write_str("unavailable"),
        }
    }
}

/// Satellite state at an instant: position, velocity and clock
/// correction, with a [Health] annotation.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Xvt {
    /// ECEF position [m]
    pub position: Vector3D,
    /// ECEF velocity [m/s]
    pub velocity: Vector3D,
    /// Clock bias [s]
    pub clock_bias: f64,
    /// Clock drift [s/s]
    pub clock_drift: f64,
    /// Health annotation
    pub health: Health,
}

impl Xvt {
    fn unavailable() -> Self {
        Self {
            position: (0.0, 0.0, 0.0),
            velocity: (0.0, 0.0, 0.0),
            clock_bias: 0.0,
            clock_drift: 0.0,
            health: Health::Unavailable,
        }
    }
}

/// Query surface of a satellite state provider. [EphemerisStore] is the
/// production implementer.
pub trait XvtProvider {
    /// Satellite state at `t`, or why it cannot be served.
    fn xvt(&self, sv: SV, t: Instant) -> Result<Xvt, Error>;
    /// Satellite state at `t`; never fails. Check the health field:
    /// [Health::Unavailable] flags a state that could not be determined.
    fn compute_xvt(&self, sv: SV, t: Instant) -> Xvt;
    /// Satellite health. The underlying products carry none, so this is
    /// [Health::Unused] at all times.
    fn sv_health(&self, sv: SV, t: Instant) -> Health;
    /// Position [m] at `t`.
    fn position(&self, sv: SV, t: Instant) -> Result<Vector3D, Error>;
    /// Velocity [m/s] at `t`.
    fn velocity(&self, sv: SV, t: Instant) -> Result<Vector3D, Error>;
    /// Acceleration [m/s^2] at `t`.
    fn acceleration(&self, sv: SV, t: Instant) -> Result<Vector3D, Error>;
    /// Earliest instant at which a state can be served.
    fn initial_time(&self) -> Result<Instant, Error>;
    /// Latest instant at which a state can be served.
    fn final_time(&self) -> Result<Instant, Error>;
    /// Time system the store is locked to.
    fn time_system(&self) -> TimeSystem;
    /// True if this satellite can be served at all.
    fn is_present(&self, sv: SV) -> bool;
    /// True while every ingested position sample carried a velocity.
    fn has_velocity(&self) -> bool;
}

/// Store of satellite positions and clock corrections, with independent
/// position and clock tables sharing a single time system. Queries serve
/// the intersection of the two tables; the clock table may be re-sourced
/// from a dedicated high-rate clock product (see
/// [EphemerisStore::set_clock_source]).
#[derive(Debug, Clone)]
pub struct EphemerisStore {
    /// Time system shared by every instant in the store. [TimeSystem::Any]
    /// until the first ingestion declares one; locked afterwards.
    time_system: TimeSystem,
    positions: PositionSeries,
    clocks: ClockSeries,
    clock_source: SourceFormat,
    reject_bad_positions: bool,
    reject_bad_clocks: bool,
    reject_predicted_positions: bool,
    reject_predicted_clocks: bool,
}

impl Default for EphemerisStore {
    fn default() -> Self {
        Self {
            time_system: TimeSystem::Any,
            positions: PositionSeries::default(),
            clocks: ClockSeries::default(),
            clock_source: SourceFormat::Ephemeris,
            reject_bad_positions: true,
            reject_bad_clocks: true,
            reject_predicted_positions: false,
            reject_predicted_clocks: false,
        }
    }
}

impl EphemerisStore {
    /// Read access to the position table.
    pub fn positions(&self) -> &PositionSeries {
        &self.positions
    }
    /// Read access to the clock table.
    pub fn clocks(&self) -> &ClockSeries {
        &self.clocks
    }
    /// Time system the store is locked to; [TimeSystem::Any] while empty.
    pub fn time_system(&self) -> TimeSystem {
        self.time_system
    }
    /// Which product family currently feeds the clock table.
    pub fn clock_source(&self) -> SourceFormat {
        self.clock_source
    }
    /// Selects the product family feeding the clock table. No-op when
    /// unchanged; otherwise the clock table is cleared, since the two
    /// families have incompatible sample densities and flag semantics.
    pub fn set_clock_source(&mut self, source: SourceFormat) {
        if self.clock_source == source {
            return;
        }
        self.clock_source = source;
        self.clocks.clear();
    }

    /// True if this satellite is present in both tables.
    pub fn is_present(&self, sv: SV) -> bool {
        self.positions.table().is_present(sv) && self.clocks.table().is_present(sv)
    }
    /// Satellites present in both tables.
    pub fn satellites(&self) -> Vec<SV> {
        self.positions
            .table()
            .satellites()
            .filter(|sv| self.clocks.table().is_present(*sv))
            .collect()
    }
    /// True while every ingested position sample carried a velocity.
    pub fn has_velocity(&self) -> bool {
        self.positions.has_velocity()
    }
    /// True while every ingested clock sample carried a drift.
    pub fn has_clock_drift(&self) -> bool {
        self.clocks.has_drift()
    }
    /// Total number of position samples.
    pub fn ndata_position(&self) -> usize {
        self.positions.table().len()
    }
    /// Total number of clock samples.
    pub fn ndata_clock(&self) -> usize {
        self.clocks.table().len()
    }

    /// Satellite state at `t`: interpolated position and velocity, clock
    /// bias and drift, with [Health::Unused] (the products carry no
    /// health information).
    pub fn xvt(&self, sv: SV, t: Instant) -> Result<Xvt, Error> {
        if !self.is_present(sv) {
            return Err(Error::UnknownSatellite(sv));
        }
        let (position, velocity) = self.positions.state_at(sv, t)?;
        let (clock_bias, clock_drift) = self.clocks.state_at(sv, t)?;
        Ok(Xvt {
            position,
            velocity,
            clock_bias,
            clock_drift,
            health: Health::Unused,
        })
    }
    /// Satellite state at `t`; never fails. Failures of any kind flatten
    /// into a zeroed state flagged [Health::Unavailable].
    pub fn compute_xvt(&self, sv: SV, t: Instant) -> Xvt {
        self.xvt(sv, t).unwrap_or_else(|_| Xvt::unavailable())
    }
    /// Satellite health: [Health::Unused] at all times, the products
    /// carry no health information.
    pub fn sv_health(&self, _sv: SV, _t: Instant) -> Health {
        Health::Unused
    }
    /// Interpolated position [m] at `t`.
    pub fn position(&self, sv: SV, t: Instant) -> Result<Vector3D, Error> {
        self.positions.position_at(sv, t)
    }
    /// Interpolated velocity [m/s] at `t`.
    pub fn velocity(&self, sv: SV, t: Instant) -> Result<Vector3D, Error> {
        self.positions.velocity_at(sv, t)
    }
    /// Acceleration [m/s^2] at `t`, from the position polynomial.
    pub fn acceleration(&self, sv: SV, t: Instant) -> Result<Vector3D, Error> {
        self.positions.acceleration_at(sv, t)
    }
    /// Interpolated clock (bias [s], drift [s/s]) at `t`.
    pub fn clock_state(&self, sv: SV, t: Instant) -> Result<(f64, f64), Error> {
        self.clocks.state_at(sv, t)
    }

    /// Earliest instant served by both tables.
    pub fn initial_time(&self) -> Result<Instant, Error> {
        let position = self.position_initial_time()?;
        let clock = self.clock_initial_time()?;
        Ok(position.max(clock))
    }
    /// Latest instant served by both tables.
    pub fn final_time(&self) -> Result<Instant, Error> {
        let position = self.position_final_time()?;
        let clock = self.clock_final_time()?;
        Ok(position.min(clock))
    }
    /// Earliest instant served by both tables for this satellite.
    pub fn satellite_initial_time(&self, sv: SV) -> Result<Instant, Error> {
        let position = self
            .positions
            .table()
            .initial_time_sv(sv)
            .ok_or(Error::UnknownSatellite(sv))?;
        let clock = self
            .clocks
            .table()
            .initial_time_sv(sv)
            .ok_or(Error::UnknownSatellite(sv))?;
        Ok(position.max(clock))
    }
    /// Latest instant served by both tables for this satellite.
    pub fn satellite_final_time(&self, sv: SV) -> Result<Instant, Error> {
        let position = self
            .positions
            .table()
            .final_time_sv(sv)
            .ok_or(Error::UnknownSatellite(sv))?;
        let clock = self
            .clocks
            .table()
            .final_time_sv(sv)
            .ok_or(Error::UnknownSatellite(sv))?;
        Ok(position.min(clock))
    }
    /// Earliest instant in the position table.
    pub fn position_initial_time(&self) -> Result<Instant, Error> {
        self.positions
            .table()
            .initial_time()
            .ok_or(Error::NoData(SeriesKind::Position))
    }
    /// Latest instant in the position table.
    pub fn position_final_time(&self) -> Result<Instant, Error> {
        self.positions
            .table()
            .final_time()
            .ok_or(Error::NoData(SeriesKind::Position))
    }
    /// Earliest instant in the clock table.
    pub fn clock_initial_time(&self) -> Result<Instant, Error> {
        self.clocks
            .table()
            .initial_time()
            .ok_or(Error::NoData(SeriesKind::Clock))
    }
    /// Latest instant in the clock table.
    pub fn clock_final_time(&self) -> Result<Instant, Error> {
        self.clocks
            .table()
            .final_time()
            .ok_or(Error::NoData(SeriesKind::Clock))
    }
    /// Nominal sampling interval of the position table for this satellite.
    pub fn position_nominal_step(&self, sv: SV) -> Option<Duration> {
        self.positions.table().nominal_step(sv)
    }
    /// Nominal sampling interval of the clock table for this satellite.
    pub fn clock_nominal_step(&self, sv: SV) -> Option<Duration> {
        self.clocks.table().nominal_step(sv)
    }

    /// Drops all samples outside [tmin, tmax], in both tables.
    pub fn edit(&mut self, tmin: Instant, tmax: Instant) {
        self.positions.edit(tmin, tmax);
        self.clocks.edit(tmin, tmax);
    }
    /// Drops all data from both tables. Configuration, the clock source
    /// selection and the locked time system are kept.
    pub fn clear(&mut self) {
        self.clear_positions();
        self.clear_clocks();
    }
    /// Drops the position table only.
    pub fn clear_positions(&mut self) {
        self.positions.clear();
    }
    /// Drops the clock table only.
    pub fn clear_clocks(&mut self) {
        self.clocks.clear();
    }

    /// Inserts one position record; an existing record at that exact
    /// instant is replaced. The instant's time system must be compatible
    /// with the store's; the store adopts it when still unset.
    pub fn add_position_record(
        &mut self,
        sv: SV,
        t: Instant,
        record: PositionRecord,
    ) -> Result<(), Error> {
        self.reconcile_time_system(t.time_system)?;
        self.positions
            .insert(sv, t.with_time_system(self.time_system), record);
        Ok(())
    }
    /// Inserts one clock record; an existing record at that exact
    /// instant is replaced. Same time-system discipline as
    /// [EphemerisStore::add_position_record].
    pub fn add_clock_record(&mut self, sv: SV, t: Instant, record: ClockRecord) -> Result<(), Error> {
        self.reconcile_time_system(t.time_system)?;
        self.clocks
            .insert(sv, t.with_time_system(self.time_system), record);
        Ok(())
    }

    /// Interpolation order of the position table.
    pub fn position_interpolation_order(&self) -> usize {
        self.positions.interpolation_order()
    }
    /// Sets the interpolation order of the position table; forced even,
    /// odd values round up.
    pub fn set_position_interpolation_order(&mut self, order: usize) {
        self.positions.set_interpolation_order(order);
    }
    /// Interpolation order of the clock table (meaningless in linear
    /// mode).
    pub fn clock_interpolation_order(&self) -> usize {
        self.clocks.interpolation_order()
    }
    /// Sets the interpolation order of the clock table; forced even, odd
    /// values round up. Ignored by linear interpolation.
    pub fn set_clock_interpolation_order(&mut self, order: usize) {
        self.clocks.set_interpolation_order(order);
    }
    /// Interpolation kind of the clock table.
    pub fn clock_interpolation_kind(&self) -> InterpolationKind {
        self.clocks.interpolation_kind()
    }
    /// Selects Lagrange or linear interpolation for the clock table.
    pub fn set_clock_interpolation_kind(&mut self, kind: InterpolationKind) {
        self.clocks.set_interpolation_kind(kind);
    }

    /// When set, samples flagged bad by the producer are dropped at
    /// position ingestion (default: set).
    pub fn reject_bad_positions(&mut self, flag: bool) {
        self.reject_bad_positions = flag;
    }
    /// When set, samples flagged bad by the producer are dropped at
    /// clock ingestion (default: set). Inert when the clock table is fed
    /// from the dedicated clock product, which carries no such flag.
    pub fn reject_bad_clocks(&mut self, flag: bool) {
        self.reject_bad_clocks = flag;
    }
    /// When set, predicted (extrapolated) position samples are dropped
    /// at ingestion (default: unset).
    pub fn reject_predicted_positions(&mut self, flag: bool) {
        self.reject_predicted_positions = flag;
    }
    /// When set, predicted (extrapolated) clock samples are dropped at
    /// ingestion (default: unset). Inert when the clock table is fed
    /// from the dedicated clock product.
    pub fn reject_predicted_clocks(&mut self, flag: bool) {
        self.reject_predicted_clocks = flag;
    }

    /// Sets the position data-gap limit (multiple of the nominal step)
    /// and enables the check.
    pub fn set_position_gap_interval(&mut self, factor: f64) {
        self.positions.set_gap_interval(factor);
    }
    /// Disables position data-gap policing.
    pub fn disable_position_gap_check(&mut self) {
        self.positions.disable_gap_check();
    }
    /// Sets the position maximum-window limit (multiple of the nominal
    /// step) and enables the check.
    pub fn set_position_max_interval(&mut self, factor: f64) {
        self.positions.set_max_interval(factor);
    }
    /// Disables position maximum-window policing.
    pub fn disable_position_interval_check(&mut self) {
        self.positions.disable_interval_check();
    }
    /// Sets the clock data-gap limit (multiple of the nominal step) and
    /// enables the check.
    pub fn set_clock_gap_interval(&mut self, factor: f64) {
        self.clocks.set_gap_interval(factor);
    }
    /// Disables clock data-gap policing.
    pub fn disable_clock_gap_check(&mut self) {
        self.clocks.disable_gap_check();
    }
    /// Sets the clock maximum-window limit (multiple of the nominal
    /// step) and enables the check.
    pub fn set_clock_max_interval(&mut self, factor: f64) {
        self.clocks.set_max_interval(factor);
    }
    /// Disables clock maximum-window policing.
    pub fn disable_clock_interval_check(&mut self) {
        self.clocks.disable_interval_check();
    }

    pub(crate) fn rejects_bad_positions(&self) -> bool {
        self.reject_bad_positions
    }
    pub(crate) fn rejects_bad_clocks(&self) -> bool {
        self.reject_bad_clocks
    }
    pub(crate) fn rejects_predicted_positions(&self) -> bool {
        self.reject_predicted_positions
    }
    pub(crate) fn rejects_predicted_clocks(&self) -> bool {
        self.reject_predicted_clocks
    }
    pub(crate) fn positions_mut(&mut self) -> &mut PositionSeries {
        &mut self.positions
    }
    pub(crate) fn clocks_mut(&mut self) -> &mut ClockSeries {
        &mut self.clocks
    }
    /// Checks the given system against the store's, adopting it when the
    /// store is still unset.
    pub(crate) fn reconcile_time_system(&mut self, ts: TimeSystem) -> Result<(), Error> {
        if !self.time_system.is_compatible(ts) {
            return Err(Error::TimeSystemMismatch {
                store: self.time_system,
                file: ts,
            });
        }
        if self.time_system == TimeSystem::Any {
            self.time_system = ts;
        }
        Ok(())
    }
}

impl std::fmt::Display for EphemerisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "time system: {}", self.time_system)?;
        writeln!(
            f,
            "clock source: {} (lagrange order {}, kind {:?})",
            self.clock_source,
            self.clocks.interpolation_order(),
            self.clocks.interpolation_kind(),
        )?;
        writeln!(
            f,
            "position samples: {} ({} satellites, order {})",
            self.ndata_position(),
            self.positions.table().satellites().count(),
            self.positions.interpolation_order(),
        )?;
        writeln!(
            f,
            "clock samples: {} ({} satellites)",
            self.ndata_clock(),
            self.clocks.table().satellites().count(),
        )?;
        write!(
            f,
            "reject: bad positions {}, bad clocks {}, predicted positions {}, predicted clocks {}",
            self.reject_bad_positions,
            self.reject_bad_clocks,
            self.reject_predicted_positions,
            self.reject_predicted_clocks,
        )
    }
}

impl XvtProvider for EphemerisStore {
    fn xvt(&self, sv: SV, t: Instant) -> Result<Xvt, Error> {
        EphemerisStore::xvt(self, sv, t)
    }
    fn compute_xvt(&self, sv: SV, t: Instant) -> Xvt {
        EphemerisStore::compute_xvt(self, sv, t)
    }
    fn sv_health(&self, sv: SV, t: Instant) -> Health {
        EphemerisStore::sv_health(self, sv, t)
    }
    fn position(&self, sv: SV, t: Instant) -> Result<Vector3D, Error> {
        EphemerisStore::position(self, sv, t)
    }
    fn velocity(&self, sv: SV, t: Instant) -> Result<Vector3D, Error> {
        EphemerisStore::velocity(self, sv, t)
    }
    fn acceleration(&self, sv: SV, t: Instant) -> Result<Vector3D, Error> {
        EphemerisStore::acceleration(self, sv, t)
    }
    fn initial_time(&self) -> Result<Instant, Error> {
        EphemerisStore::initial_time(self)
    }
    fn final_time(&self) -> Result<Instant, Error> {
        EphemerisStore::final_time(self)
    }
    fn time_system(&self) -> TimeSystem {
        EphemerisStore::time_system(self)
    }
    fn is_present(&self, sv: SV) -> bool {
        EphemerisStore::is_present(self, sv)
    }
    fn has_velocity(&self) -> bool {
        EphemerisStore::has_velocity(self)
    }
}
