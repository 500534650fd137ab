//! Generic per-satellite tabular time series.
use std::collections::BTreeMap;

use gnss::prelude::SV;
use hifitime::Duration;
use itertools::Itertools;

use crate::time::Instant;
use crate::Error;

/// Which table an error or diagnostic refers to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SeriesKind {
    Position,
    Clock,
}

impl std::fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Position => f.write_str("position"),
            Self::Clock => f.write_str("clock"),
        }
    }
}

/// Sample schema stored in a [TabularSeries].
pub trait SeriesRecord: Clone {
    /// True when the optional rate field (velocity for positions, drift
    /// for clocks) is populated in this sample.
    fn has_rate(&self) -> bool;
}

/// Samples of a single satellite, with the incrementally maintained
/// histogram of adjacent sample spacings.
#[derive(Debug, Clone)]
struct SatelliteTable<R> {
    samples: BTreeMap<Instant, R>,
    gaps: BTreeMap<Duration, u32>,
}

impl<R> SatelliteTable<R> {
    fn new() -> Self {
        Self {
            samples: BTreeMap::new(),
            gaps: BTreeMap::new(),
        }
    }
    fn count_gap(&mut self, dt: Duration) {
        *self.gaps.entry(dt).or_insert(0) += 1;
    }
    fn uncount_gap(&mut self, dt: Duration) {
        if let Some(count) = self.gaps.get_mut(&dt) {
            *count -= 1;
            if *count == 0 {
                self.gaps.remove(&dt);
            }
        }
    }
    /// Modal adjacent spacing; shortest duration wins ties.
    fn nominal_step(&self) -> Option<Duration> {
        let mut best: Option<(Duration, u32)> = None;
        for (dt, count) in self.gaps.iter() {
            if best.map_or(true, |(_, c)| *count > c) {
                best = Some((*dt, *count));
            }
        }
        best.map(|(dt, _)| dt)
    }
    fn rebuild_gaps(&mut self) {
        let gaps: Vec<Duration> = self
            .samples
            .keys()
            .tuple_windows()
            .map(|(t0, t1)| *t1 - *t0)
            .collect();
        self.gaps.clear();
        for dt in gaps {
            self.count_gap(dt);
        }
    }
}

/// Per-satellite ordered time series of fixed-step samples, one instance
/// for positions and one for clocks. Offers bracket and window selection
/// for the interpolators, with optional data-gap and maximum-interval
/// policing expressed as multiples of the per-satellite nominal step.
#[derive(Debug, Clone)]
pub struct TabularSeries<R: SeriesRecord> {
    kind: SeriesKind,
    tables: BTreeMap<SV, SatelliteTable<R>>,
    /// True while every ingested sample carried the optional rate field.
    /// Monotone: cleared by the first rate-less sample, restored by
    /// [TabularSeries::clear] only.
    has_rate: bool,
    gap_factor: Option<f64>,
    max_factor: Option<f64>,
}

impl<R: SeriesRecord> TabularSeries<R> {
    /// Builds an empty series for the given table kind.
    pub fn new(kind: SeriesKind) -> Self {
        Self {
            kind,
            tables: BTreeMap::new(),
            has_rate: true,
            gap_factor: None,
            max_factor: None,
        }
    }
    /// Which table this series backs.
    pub fn kind(&self) -> SeriesKind {
        self.kind
    }
    /// Inserts a sample; a sample already present at that exact instant
    /// is replaced. Maintains the nominal-step histogram and the
    /// monotone rate flag.
    pub fn insert(&mut self, sv: SV, t: Instant, record: R) {
        self.has_rate &= record.has_rate();
        let table = self.tables.entry(sv).or_insert_with(SatelliteTable::new);
        if table.samples.contains_key(&t) {
            table.samples.insert(t, record);
            return;
        }
        let previous = table.samples.range(..t).next_back().map(|(k, _)| *k);
        let next = table.samples.range(t..).next().map(|(k, _)| *k);
        table.samples.insert(t, record);
        if let (Some(p), Some(n)) = (previous, next) {
            table.uncount_gap(n - p);
        }
        if let Some(p) = previous {
            table.count_gap(t - p);
        }
        if let Some(n) = next {
            table.count_gap(n - t);
        }
    }
    /// Returns the sample stored at that exact instant, if any.
    pub fn get(&self, sv: SV, t: Instant) -> Option<&R> {
        self.tables.get(&sv)?.samples.get(&t)
    }
    /// True while every ingested sample carried the optional rate field
    /// (velocity / drift). See [SeriesRecord::has_rate].
    pub fn has_rate(&self) -> bool {
        self.has_rate
    }
    /// Nominal sampling interval for this satellite: the modal adjacent
    /// sample spacing, updated on every insertion.
    pub fn nominal_step(&self, sv: SV) -> Option<Duration> {
        self.tables.get(&sv)?.nominal_step()
    }
    /// Iterates satellites present in this series.
    pub fn satellites(&self) -> impl Iterator<Item = SV> + '_ {
        self.tables.keys().copied()
    }
    /// True if this satellite has at least one sample.
    pub fn is_present(&self, sv: SV) -> bool {
        self.tables.contains_key(&sv)
    }
    /// Total number of samples across all satellites.
    pub fn len(&self) -> usize {
        self.tables.values().map(|t| t.samples.len()).sum()
    }
    /// Number of samples for this satellite.
    pub fn len_sv(&self, sv: SV) -> usize {
        self.tables.get(&sv).map_or(0, |t| t.samples.len())
    }
    /// True when no satellite holds any sample.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
    /// Earliest instant across all satellites.
    pub fn initial_time(&self) -> Option<Instant> {
        self.tables
            .values()
            .filter_map(|t| t.samples.keys().next().copied())
            .min()
    }
    /// Latest instant across all satellites.
    pub fn final_time(&self) -> Option<Instant> {
        self.tables
            .values()
            .filter_map(|t| t.samples.keys().next_back().copied())
            .max()
    }
    /// Earliest instant for this satellite.
    pub fn initial_time_sv(&self, sv: SV) -> Option<Instant> {
        self.tables.get(&sv)?.samples.keys().next().copied()
    }
    /// Latest instant for this satellite.
    pub fn final_time_sv(&self, sv: SV) -> Option<Instant> {
        self.tables.get(&sv)?.samples.keys().next_back().copied()
    }
    /// Drops all samples outside [tmin, tmax], for all satellites.
    /// Satellites left without samples are removed entirely.
    pub fn edit(&mut self, tmin: Instant, tmax: Instant) {
        for table in self.tables.values_mut() {
            table.samples.retain(|t, _| *t >= tmin && *t <= tmax);
            table.rebuild_gaps();
        }
        self.tables.retain(|_, table| !table.samples.is_empty());
    }
    /// Drops all satellites and restores the rate flag.
    pub fn clear(&mut self) {
        self.tables.clear();
        self.has_rate = true;
    }

    /// Sets the data-gap limit, as a multiple of the per-satellite
    /// nominal step, and enables gap policing.
    pub fn set_gap_interval(&mut self, factor: f64) {
        self.gap_factor = Some(factor);
    }
    /// Disables gap policing.
    pub fn disable_gap_check(&mut self) {
        self.gap_factor = None;
    }
    /// Current gap limit, when gap policing is enabled.
    pub fn gap_interval(&self) -> Option<f64> {
        self.gap_factor
    }
    /// Sets the maximum interpolation window span, as a multiple of the
    /// per-satellite nominal step, and enables interval policing.
    pub fn set_max_interval(&mut self, factor: f64) {
        self.max_factor = Some(factor);
    }
    /// Disables interval policing.
    pub fn disable_interval_check(&mut self) {
        self.max_factor = None;
    }
    /// Current maximum window span, when interval policing is enabled.
    pub fn max_interval(&self) -> Option<f64> {
        self.max_factor
    }

    /// Returns the two samples surrounding `t`: the last at or before it
    /// and the first at or after it. Both ends coincide when `t` lands
    /// exactly on a stored instant.
    pub fn bracket(&self, sv: SV, t: Instant) -> Result<((Instant, &R), (Instant, &R)), Error> {
        let table = self.tables.get(&sv).ok_or(Error::UnknownSatellite(sv))?;
        let lower = table
            .samples
            .range(..=t)
            .next_back()
            .map(|(k, v)| (*k, v))
            .ok_or(Error::OutOfRange {
                series: self.kind,
                sv,
                t,
            })?;
        let upper = table
            .samples
            .range(t..)
            .next()
            .map(|(k, v)| (*k, v))
            .ok_or(Error::OutOfRange {
                series: self.kind,
                sv,
                t,
            })?;
        Ok((lower, upper))
    }

    /// Selects the `2 * half` samples surrounding `t` for interpolation:
    /// `half` at or after the target and `half` strictly before it, the
    /// window sliding toward the populated side when the target sits near
    /// a table edge. Exact hits on a stored instant do not short circuit,
    /// so derivatives stay continuous across sample boundaries.
    ///
    /// Applies the gap check to the bracketing pair and the interval
    /// check to the full window, both as multiples of this satellite's
    /// nominal step.
    pub fn window(&self, sv: SV, t: Instant, half: usize) -> Result<Vec<(Instant, &R)>, Error> {
        let table = self.tables.get(&sv).ok_or(Error::UnknownSatellite(sv))?;
        let samples = &table.samples;
        let out_of_range = match (samples.keys().next(), samples.keys().next_back()) {
            (Some(first), Some(last)) => t < *first || t > *last,
            _ => true,
        };
        if out_of_range {
            return Err(Error::OutOfRange {
                series: self.kind,
                sv,
                t,
            });
        }
        let needed = 2 * half;
        if samples.len() < needed {
            return Err(Error::InsufficientSamples {
                series: self.kind,
                sv,
                needed,
                have: samples.len(),
            });
        }
        // in range with at least 2 samples, so a step always exists
        let step_s = table.nominal_step().unwrap_or_default().to_seconds();
        if let Some(factor) = self.gap_factor {
            let (lower, upper) = self.bracket(sv, t)?;
            let gap_s = (upper.0 - lower.0).to_seconds();
            let limit_s = factor * step_s;
            if gap_s > limit_s {
                return Err(Error::DataGap {
                    series: self.kind,
                    sv,
                    t,
                    gap_s,
                    limit_s,
                });
            }
        }
        let mut below: Vec<(Instant, &R)> = samples
            .range(..t)
            .rev()
            .take(needed)
            .map(|(k, v)| (*k, v))
            .collect();
        below.reverse();
        let above: Vec<(Instant, &R)> = samples
            .range(t..)
            .take(needed)
            .map(|(k, v)| (*k, v))
            .collect();
        let n_below = below.len().min(half.max(needed - above.len().min(needed)));
        let n_above = needed - n_below;
        let mut window = Vec::with_capacity(needed);
        window.extend_from_slice(&below[below.len() - n_below..]);
        window.extend_from_slice(&above[..n_above]);
        if let Some(factor) = self.max_factor {
            let span_s = (window[window.len() - 1].0 - window[0].0).to_seconds();
            let limit_s = factor * step_s;
            if span_s > limit_s {
                return Err(Error::IntervalExceeded {
                    series: self.kind,
                    sv,
                    span_s,
                    limit_s,
                });
            }
        }
        Ok(window)
    }
}
