//! Clock table: bias samples and their interpolation.
use gnss::prelude::SV;

use crate::interp::{linear, LagrangeBasis};
use crate::series::{SeriesKind, SeriesRecord, TabularSeries};
use crate::time::Instant;
use crate::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One clock sample: bias, with drift and drift change when the
/// producing analysis provides them.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClockRecord {
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
}

impl SeriesRecord for ClockRecord {
    fn has_rate(&self) -> bool {
        self.drift.is_some()
    }
}

/// Interpolation applied to the bias table.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum InterpolationKind {
    /// Even-order Lagrange interpolation (the default)
    #[default]
    Lagrange,
    /// Two point interpolation between the bracketing samples;
    /// ignores the configured order
    Linear,
}

/// Tabular clock store. Bias is interpolated with the configured kind;
/// drift comes from the stored drift samples when every sample carries
/// one, otherwise from the derivative of the bias interpolation.
#[derive(Debug, Clone)]
pub struct ClockSeries {
    series: TabularSeries<ClockRecord>,
    kind: InterpolationKind,
    order: usize,
}

impl Default for ClockSeries {
    fn default() -> Self {
        Self {
            series: TabularSeries::new(SeriesKind::Clock),
            kind: InterpolationKind::default(),
            order: 10,
        }
    }
}

impl ClockSeries {
    /// Read access to the underlying [TabularSeries]: brackets, time
    /// bounds, sample counts, nominal steps.
    pub fn table(&self) -> &TabularSeries<ClockRecord> {
        &self.series
    }
    /// Inserts a sample; a sample already present at that instant is
    /// replaced.
    pub fn insert(&mut self, sv: SV, t: Instant, record: ClockRecord) {
        self.series.insert(sv, t, record);
    }
    /// True while every ingested sample carried a drift.
    pub fn has_drift(&self) -> bool {
        self.series.has_rate()
    }
    /// Current interpolation kind.
    pub fn interpolation_kind(&self) -> InterpolationKind {
        self.kind
    }
    /// Selects the interpolation applied to the bias table. The
    /// configured order is retained across kind changes.
    pub fn set_interpolation_kind(&mut self, kind: InterpolationKind) {
        self.kind = kind;
    }
    /// Current interpolation order (meaningless in linear mode).
    pub fn interpolation_order(&self) -> usize {
        self.order
    }
    /// Sets the interpolation order; forced even, odd values round up.
    /// Ignored by linear interpolation.
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

    /// Interpolated (bias [s], drift [s/s]) at `t`.
    pub fn state_at(&self, sv: SV, t: Instant) -> Result<(f64, f64), Error> {
        let record = self.value_at(sv, t)?;
        Ok((record.bias, record.drift.unwrap_or_default()))
    }
    /// Interpolated sample at `t`. Drift is always populated, from the
    /// stored drifts when the table is complete, otherwise from the
    /// derivative of the bias interpolation. The drift change is kept
    /// when it can be estimated. Derived quantities carry no sigma.
    pub fn value_at(&self, sv: SV, t: Instant) -> Result<ClockRecord, Error> {
        match self.kind {
            InterpolationKind::Linear => self.linear_at(sv, t),
            InterpolationKind::Lagrange => self.lagrange_at(sv, t),
        }
    }

    fn linear_at(&self, sv: SV, t: Instant) -> Result<ClockRecord, Error> {
        let window = self.series.window(sv, t, 1)?;
        let (t0, first) = (window[0].0, window[0].1);
        let (t1, second) = (window[1].0, window[1].1);
        let (x0, x1, x) = (0.0, (t1 - t0).to_seconds(), (t - t0).to_seconds());
        let (bias, slope) = linear(x0, first.bias, x1, second.bias, x);
        let (bias_sigma, _) = linear(x0, first.bias_sigma, x1, second.bias_sigma, x);
        let drift = match (first.drift, second.drift) {
            (Some(d0), Some(d1)) if self.has_drift() => Some(linear(x0, d0, x1, d1, x).0),
            _ => None,
        };
        let drift_sigma = match (first.drift_sigma, second.drift_sigma) {
            (Some(s0), Some(s1)) if drift.is_some() => Some(linear(x0, s0, x1, s1, x).0),
            _ => None,
        };
        let acceleration = match (first.acceleration, second.acceleration) {
            (Some(a0), Some(a1)) => Some(linear(x0, a0, x1, a1, x).0),
            _ => None,
        };
        Ok(ClockRecord {
            bias,
            bias_sigma,
            drift: Some(drift.unwrap_or(slope)),
            drift_sigma,
            acceleration,
            acceleration_sigma: None,
        })
    }

    fn lagrange_at(&self, sv: SV, t: Instant) -> Result<ClockRecord, Error> {
        let window = self.series.window(sv, t, self.order / 2)?;
        let t0 = window[0].0;
        let times: Vec<f64> = window.iter().map(|(ti, _)| (*ti - t0).to_seconds()).collect();
        let basis = LagrangeBasis::fit(&times, (t - t0).to_seconds());

        let column = |f: &dyn Fn(&ClockRecord) -> f64| -> Vec<f64> {
            window.iter().map(|(_, r)| f(*r)).collect()
        };
        let biases = column(&|r| r.bias);
        let bias = basis.value(&biases);
        let bias_sigma = basis.value(&column(&|r| r.bias_sigma));

        let stored_drift = self.has_drift() && window.iter().all(|(_, r)| r.drift.is_some());
        let drifts = column(&|r| r.drift.unwrap_or_default());
        let (drift, drift_sigma) = if stored_drift {
            let sigma = if window.iter().all(|(_, r)| r.drift_sigma.is_some()) {
                Some(basis.value(&column(&|r| r.drift_sigma.unwrap_or_default())))
            } else {
                None
            };
            (basis.value(&drifts), sigma)
        } else {
            (basis.derivative(&biases), None)
        };
        let acceleration = if window.iter().all(|(_, r)| r.acceleration.is_some()) {
            Some(basis.value(&column(&|r| r.acceleration.unwrap_or_default())))
        } else if stored_drift {
            Some(basis.derivative(&drifts))
        } else {
            Some(basis.second_derivative(&biases))
        };
        Ok(ClockRecord {
            bias,
            bias_sigma,
            drift: Some(drift),
            drift_sigma,
            acceleration,
            acceleration_sigma: None,
        })
    }
}
