//! Position table: ephemeris samples and their interpolation.
use gnss::prelude::SV;

use crate::interp::LagrangeBasis;
use crate::series::{SeriesKind, SeriesRecord, TabularSeries};
use crate::time::Instant;
use crate::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 3D position / velocity component triple
pub type Vector3D = (f64, f64, f64);

/// One ephemeris sample. Positions are expressed in meters (ECEF),
/// velocities in decimeters per second, the native scaling of the
/// orbit products this store is fed from.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PositionRecord {
    /// Position [m]
    pub position: Vector3D,
    /// Position standard deviation [m]
    pub position_sigma: Vector3D,
    /// Velocity [dm/s], rarely present
    pub velocity: Option<Vector3D>,
    /// Velocity standard deviation [dm/s]
    pub velocity_sigma: Option<Vector3D>,
}

impl SeriesRecord for PositionRecord {
    fn has_rate(&self) -> bool {
        self.velocity.is_some()
    }
}

/// Tabular position store with Lagrange interpolation of configurable
/// (even) order. When any ingested sample lacks a velocity, velocities
/// are derived from the first derivative of the position polynomial
/// instead; accelerations always come from its second derivative, since
/// the table never stores them.
#[derive(Debug, Clone)]
pub struct PositionSeries {
    series: TabularSeries<PositionRecord>,
    order: usize,
}

impl Default for PositionSeries {
    fn default() -> Self {
        Self {
            series: TabularSeries::new(SeriesKind::Position),
            order: 10,
        }
    }
}

impl PositionSeries {
    /// Read access to the underlying [TabularSeries]: brackets, time
    /// bounds, sample counts, nominal steps.
    pub fn table(&self) -> &TabularSeries<PositionRecord> {
        &self.series
    }
    /// Inserts a sample; a sample already present at that instant is
    /// replaced.
    pub fn insert(&mut self, sv: SV, t: Instant, record: PositionRecord) {
        self.series.insert(sv, t, record);
    }
    /// True while every ingested sample carried a velocity.
    pub fn has_velocity(&self) -> bool {
        self.series.has_rate()
    }
    /// Current interpolation order.
    pub fn interpolation_order(&self) -> usize {
        self.order
    }
    /// Sets the interpolation order; forced even, odd values round up.
    pub fn set_interpolation_order(&mut self, order: usize) {
        let half = (order.max(1) + 1) / 2;
        self.order = 2 * half;
    }
    /// See [TabularSeries::set_gap_interval].
    pub fn set_gap_interval(&mut self, factor: f64) {
        self.series.set_gap_interval(factor);
    }
    /// See [TabularSeries::disable_gap_check].
    pub fn disable_gap_check(&mut self) {
        self.series.disable_gap_check();
    }
    /// See [TabularSeries::set_max_interval].
    pub fn set_max_interval(&mut self, factor: f64) {
        self.series.set_max_interval(factor);
    }
    /// See [TabularSeries::disable_interval_check].
    pub fn disable_interval_check(&mut self) {
        self.series.disable_interval_check();
    }
    /// Drops all samples outside [tmin, tmax].
    pub fn edit(&mut self, tmin: Instant, tmax: Instant) {
        self.series.edit(tmin, tmax);
    }
    /// Drops all satellites; configuration is kept.
    pub fn clear(&mut self) {
        self.series.clear();
    }

    /// Interpolated sample at `t`, in table units: the velocity field is
    /// always populated, from the stored velocities when the table is
    /// complete, otherwise from the position polynomial derivative
    /// (scaled back to dm/s). Derived velocities carry no sigma.
    pub fn value_at(&self, sv: SV, t: Instant) -> Result<PositionRecord, Error> {
        let (record, _) = self.fit(sv, t)?;
        Ok(record)
    }
    /// Interpolated (position [m], velocity [m/s]) at `t`.
    pub fn state_at(&self, sv: SV, t: Instant) -> Result<(Vector3D, Vector3D), Error> {
        let (record, _) = self.fit(sv, t)?;
        let velocity = record.velocity.unwrap_or_default();
        Ok((
            record.position,
            (velocity.0 * 0.1, velocity.1 * 0.1, velocity.2 * 0.1),
        ))
    }
    /// Interpolated position [m] at `t`.
    pub fn position_at(&self, sv: SV, t: Instant) -> Result<Vector3D, Error> {
        let (record, _) = self.fit(sv, t)?;
        Ok(record.position)
    }
    /// Interpolated velocity [m/s] at `t`.
    pub fn velocity_at(&self, sv: SV, t: Instant) -> Result<Vector3D, Error> {
        let (_, velocity) = self.state_at(sv, t)?;
        Ok(velocity)
    }
    /// Acceleration [m/s^2] at `t`: the second derivative of the
    /// position polynomial.
    pub fn acceleration_at(&self, sv: SV, t: Instant) -> Result<Vector3D, Error> {
        let (_, acceleration) = self.fit(sv, t)?;
        Ok(acceleration)
    }

    /*
     * Single interpolation pass: record in table units + acceleration
     * in m/s^2 from the position polynomial second derivative.
     */
    fn fit(&self, sv: SV, t: Instant) -> Result<(PositionRecord, Vector3D), Error> {
        let window = self.series.window(sv, t, self.order / 2)?;
        let t0 = window[0].0;
        let times: Vec<f64> = window.iter().map(|(ti, _)| (*ti - t0).to_seconds()).collect();
        let basis = LagrangeBasis::fit(&times, (t - t0).to_seconds());

        let column = |f: &dyn Fn(&PositionRecord) -> f64| -> Vec<f64> {
            window.iter().map(|(_, r)| f(*r)).collect()
        };
        let x = column(&|r| r.position.0);
        let y = column(&|r| r.position.1);
        let z = column(&|r| r.position.2);
        let position = (basis.value(&x), basis.value(&y), basis.value(&z));
        let position_sigma = (
            basis.value(&column(&|r| r.position_sigma.0)),
            basis.value(&column(&|r| r.position_sigma.1)),
            basis.value(&column(&|r| r.position_sigma.2)),
        );
        let acceleration = (
            basis.second_derivative(&x),
            basis.second_derivative(&y),
            basis.second_derivative(&z),
        );

        let stored_velocity =
            self.series.has_rate() && window.iter().all(|(_, r)| r.velocity.is_some());
        let (velocity, velocity_sigma) = if stored_velocity {
            let vel = (
                basis.value(&column(&|r| r.velocity.map_or(0.0, |v| v.0))),
                basis.value(&column(&|r| r.velocity.map_or(0.0, |v| v.1))),
                basis.value(&column(&|r| r.velocity.map_or(0.0, |v| v.2))),
            );
            let sigma = if window.iter().all(|(_, r)| r.velocity_sigma.is_some()) {
                Some((
                    basis.value(&column(&|r| r.velocity_sigma.map_or(0.0, |v| v.0))),
                    basis.value(&column(&|r| r.velocity_sigma.map_or(0.0, |v| v.1))),
                    basis.value(&column(&|r| r.velocity_sigma.map_or(0.0, |v| v.2))),
                ))
            } else {
                None
            };
            (vel, sigma)
        } else {
            // dm/s in table units, like stored velocities
            let vel = (
                basis.derivative(&x) * 10.0,
                basis.derivative(&y) * 10.0,
                basis.derivative(&z) * 10.0,
            );
            (vel, None)
        };

        Ok((
            PositionRecord {
                position,
                position_sigma,
                velocity: Some(velocity),
                velocity_sigma,
            },
            acceleration,
        ))
    }
}
