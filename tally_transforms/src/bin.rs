// Copyright 2025 the Tally Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Equal-width binning with "nice" bin widths.

extern crate alloc;

use alloc::vec::Vec;
use core::fmt;

use log::debug;
use thiserror::Error;

#[cfg(not(feature = "std"))]
use crate::float::FloatExt;

use crate::{BinConfig, BinSpec};

/// Mantissas of the candidate bin widths (`{1, 2, 2.5, 5} × 10^k`).
const NICE_MANTISSAS: [f64; 4] = [1.0, 2.0, 2.5, 5.0];

/// Largest distance from the origin, in steps, at which grid bounds stay at least half a
/// step apart in `f64`.
const MAX_GRID_INDEX: f64 = 1_125_899_906_842_624.0;

/// Errors returned by [`bin`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BinError {
    /// The spec cannot produce bins.
    #[error("invalid bin spec: {0}")]
    InvalidBinSpec(&'static str),
}

/// A half-open bin interval `[lower, upper)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinRange {
    /// Inclusive lower bound.
    pub lower: f64,
    /// Exclusive upper bound.
    pub upper: f64,
}

impl BinRange {
    /// Returns `true` if `v` lies in `[lower, upper)`.
    pub fn contains(&self, v: f64) -> bool {
        self.lower <= v && v < self.upper
    }

    /// Width of the bin.
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// Center of the bin.
    pub fn midpoint(&self) -> f64 {
        self.lower + self.width() / 2.0
    }
}

impl fmt::Display for BinRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.lower, self.upper)
    }
}

/// A resolved grid of `count` adjacent bins of width `step`, starting at `start`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinLayout {
    /// Lower bound of the first bin.
    pub start: f64,
    /// Bin width.
    pub step: f64,
    /// Number of bins needed to cover the domain.
    pub count: usize,
}

impl BinLayout {
    /// Upper bound of the last bin.
    pub fn stop(&self) -> f64 {
        self.bound(self.count as i64)
    }

    /// The `index`-th bin of the grid. Indices outside `0..count` extend the grid.
    pub fn range(&self, index: i64) -> BinRange {
        BinRange {
            lower: self.bound(index),
            upper: self.bound(index + 1),
        }
    }

    /// All bins covering the domain, in ascending order.
    pub fn ranges(&self) -> Vec<BinRange> {
        (0..self.count as i64).map(|i| self.range(i)).collect()
    }

    /// Grid index of the bin containing `v`.
    ///
    /// Returns `None` if `v` is not finite or lies more than `2^50` steps from the start of
    /// the grid, where adjacent bounds can no longer be told apart.
    pub fn index_of(&self, v: f64) -> Option<i64> {
        let index = ((v - self.start) / self.step).floor();
        if !index.is_finite() || index.abs() > MAX_GRID_INDEX {
            return None;
        }
        let mut i = to_i64(index);
        // Snapped bounds can disagree with the raw division by an ulp.
        while v < self.bound(i) {
            i -= 1;
        }
        while v >= self.bound(i + 1) {
            i += 1;
        }
        Some(i)
    }

    /// The bin containing `v`, or `None` if `v` is off the representable grid.
    pub fn bin_of(&self, v: f64) -> Option<BinRange> {
        self.index_of(v).map(|i| self.range(i))
    }

    fn bound(&self, index: i64) -> f64 {
        snap(self.start + self.step * index as f64, self.step)
    }
}

/// Result of binning a column.
#[derive(Debug, Clone, PartialEq)]
pub struct Binning {
    /// The resolved grid, or `None` if every input was null.
    pub layout: Option<BinLayout>,
    /// One entry per input; `None` is the "no bin" sentinel for null or NaN inputs.
    pub bins: Vec<Option<BinRange>>,
}

/// Bins `values` according to `spec`.
///
/// Null and NaN inputs are left out of the domain and map to the `None` sentinel. Values
/// outside an `extent` override still land on the same step grid, so every non-null value
/// is in exactly one bin. A value so far outside the grid that its bounds cannot be
/// represented is an error.
pub fn bin(
    values: &[Option<f64>],
    spec: &BinSpec,
    config: &BinConfig,
) -> Result<Binning, BinError> {
    let domain = match spec.extent {
        Some(extent) => Some(extent),
        None => data_extent(values),
    };
    let Some((min, max)) = domain else {
        return Ok(Binning {
            layout: None,
            bins: values.iter().map(|_| None).collect(),
        });
    };
    let layout = resolve_layout(min, max, spec, config)?;
    debug!(
        "bin layout start={} step={} count={} for domain [{min}, {max}]",
        layout.start, layout.step, layout.count
    );
    let bins = values
        .iter()
        .map(|v| match v.filter(|v| v.is_finite()) {
            Some(v) => layout
                .bin_of(v)
                .map(Some)
                .ok_or(BinError::InvalidBinSpec("value too far outside the bin grid")),
            None => Ok(None),
        })
        .collect::<Result<_, _>>()?;
    Ok(Binning {
        layout: Some(layout),
        bins,
    })
}

/// Resolves the bin grid for the domain `[min, max]`.
///
/// With an explicit `step`, bins are aligned to multiples of it. Otherwise the narrowest
/// width from `{1, 2, 2.5, 5} × 10^k` (at least `min_step`) whose aligned grid needs no more
/// than `max_bins` bins is chosen. A degenerate domain (`min == max`) yields one bin of
/// `degenerate_width` centered on the value.
pub fn resolve_layout(
    mut min: f64,
    mut max: f64,
    spec: &BinSpec,
    config: &BinConfig,
) -> Result<BinLayout, BinError> {
    if !min.is_finite() || !max.is_finite() {
        return Err(BinError::InvalidBinSpec("extent must be finite"));
    }
    if min > max {
        core::mem::swap(&mut min, &mut max);
    }

    if let Some(step) = spec.step {
        if !step.is_finite() || step <= 0.0 {
            return Err(BinError::InvalidBinSpec("step must be positive"));
        }
        return aligned(min, max, step, config.max_grid_bins)
            .ok_or(BinError::InvalidBinSpec("step yields too many bins for the domain"));
    }

    let min_step = spec.min_step.unwrap_or(0.0);
    if !min_step.is_finite() || min_step < 0.0 {
        return Err(BinError::InvalidBinSpec("min_step must be non-negative"));
    }

    if min == max {
        let width = config.degenerate_width.max(min_step);
        if !width.is_finite() || width <= 0.0 {
            return Err(BinError::InvalidBinSpec("degenerate width must be positive"));
        }
        if !on_grid(min, width) {
            return Err(BinError::InvalidBinSpec("degenerate width too small for the value"));
        }
        return Ok(BinLayout {
            start: min - width / 2.0,
            step: width,
            count: 1,
        });
    }

    let max_bins = spec.max_bins.unwrap_or(config.default_max_bins);
    if max_bins == 0 {
        return Err(BinError::InvalidBinSpec("max_bins must be at least 1"));
    }

    let span = max - min;
    // Start one decade below the width that would exactly split the span.
    let mut power = to_i64((span / max_bins as f64).log10().floor()) - 1;
    // 310 decades span every finite f64.
    for _ in 0..310 {
        for m in NICE_MANTISSAS {
            let step = nice_width(m, power);
            if step < min_step || step <= 0.0 {
                continue;
            }
            if let Some(layout) = aligned(min, max, step, max_bins.min(config.max_grid_bins)) {
                return Ok(layout);
            }
        }
        power += 1;
    }
    Err(BinError::InvalidBinSpec("no bin width fits the domain"))
}

/// Aligns a grid of width `step` so that `[min, max]` is covered by half-open bins.
///
/// Returns `None` if the grid would need more than `max_count` bins or if `step` is too
/// fine to separate bounds at the magnitude of the domain.
fn aligned(min: f64, max: f64, step: f64, max_count: usize) -> Option<BinLayout> {
    if !on_grid(min, step) || !on_grid(max, step) {
        return None;
    }
    let mut start = snap((min / step).floor() * step, step);
    if start > min {
        start = snap(start - step, step);
    }
    let count = ((max - start) / step).floor() + 1.0;
    if count > max_count as f64 {
        return None;
    }
    let mut layout = BinLayout {
        start,
        step,
        count: to_usize(count),
    };
    // Snapping can move the last bound across `max` by an ulp.
    if layout.count > 1 && layout.bound(layout.count as i64 - 1) > max {
        layout.count -= 1;
    }
    if layout.stop() <= max {
        layout.count += 1;
    }
    (layout.count <= max_count).then_some(layout)
}

/// Returns `true` if `v` is within [`MAX_GRID_INDEX`] steps of the origin.
fn on_grid(v: f64, step: f64) -> bool {
    (v / step).abs() <= MAX_GRID_INDEX
}

fn nice_width(mantissa: f64, power: i64) -> f64 {
    let power = i32::try_from(power.clamp(-320, 320)).unwrap_or(0);
    if power >= 0 {
        mantissa * 10_f64.powi(power)
    } else {
        // Dividing by an exact power of ten keeps widths like 0.25 exact.
        mantissa / 10_f64.powi(-power)
    }
}

/// Rounds a bin bound to a precision one decade finer than the step, removing the
/// accumulated float noise of `start + i * step`.
fn snap(v: f64, step: f64) -> f64 {
    let e = to_i64(step.log10().floor()) - 1;
    let e = i32::try_from(e.clamp(-300, 300)).unwrap_or(0);
    if e >= 0 {
        let unit = 10_f64.powi(e);
        (v / unit).round() * unit
    } else {
        let inv = 10_f64.powi(-e);
        let snapped = (v * inv).round() / inv;
        if snapped.is_finite() { snapped } else { v }
    }
}

fn data_extent(values: &[Option<f64>]) -> Option<(f64, f64)> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values.iter().flatten() {
        if !v.is_finite() {
            continue;
        }
        min = min.min(*v);
        max = max.max(*v);
    }
    if min.is_finite() && max.is_finite() {
        Some((min, max))
    } else {
        None
    }
}

fn to_i64(v: f64) -> i64 {
    if !v.is_finite() {
        return 0;
    }
    let v = v.clamp(i64::MIN as f64, i64::MAX as f64);
    #[allow(clippy::cast_possible_truncation, reason = "clamped to the i64 range")]
    {
        v as i64
    }
}

fn to_usize(v: f64) -> usize {
    if !v.is_finite() || v <= 0.0 {
        return 0;
    }
    #[allow(
        clippy::cast_possible_truncation,
        reason = "guarded by finite/positive checks; the cast saturates"
    )]
    {
        v as usize
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use alloc::vec;

    use super::*;

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    #[test]
    fn max_bins_picks_a_nice_width_instead_of_unit_bins() {
        let values = some(&[1.0, 2.0, 2.0, 3.0, 100.0]);
        let spec = BinSpec::new().with_max_bins(5);
        let out = bin(&values, &spec, &BinConfig::default()).unwrap();
        let layout = out.layout.unwrap();
        assert_eq!(layout.step, 25.0);
        assert_eq!(layout.start, 0.0);
        assert_eq!(layout.count, 5);
        assert!(layout.start <= 1.0 && layout.stop() > 100.0);

        let first = layout.range(0);
        let in_first = out.bins.iter().filter(|b| **b == Some(first)).count();
        assert_eq!(in_first, 4);
    }

    #[test]
    fn every_value_lands_in_its_own_bin() {
        let values = some(&[0.1, 0.2, 0.3, 0.7, 0.95, 1.0]);
        let out = bin(&values, &BinSpec::new(), &BinConfig::default()).unwrap();
        let layout = out.layout.unwrap();
        assert!(layout.count <= 10);
        for (v, b) in values.iter().zip(&out.bins) {
            let (v, b) = (v.unwrap(), b.unwrap());
            assert!(b.contains(v), "{v} not in {b}");
        }
        let ranges = layout.ranges();
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].upper, pair[1].lower);
        }
    }

    #[test]
    fn decimal_steps_have_clean_bounds() {
        let layout = resolve_layout(0.0, 1.0, &BinSpec::new(), &BinConfig::default()).unwrap();
        assert_eq!(layout.step, 0.2);
        assert_eq!(layout.range(1).upper, 0.4);
        assert_eq!(layout.range(3).lower, 0.6);
    }

    #[test]
    fn explicit_step_aligns_to_multiples() {
        let spec = BinSpec::new().with_step(5.0);
        let layout = resolve_layout(12.0, 31.0, &spec, &BinConfig::default()).unwrap();
        assert_eq!(layout.start, 10.0);
        assert_eq!(layout.count, 5);
        assert_eq!(layout.stop(), 35.0);
    }

    #[test]
    fn equal_values_get_one_centered_bin() {
        let values = some(&[7.0, 7.0, 7.0]);
        let out = bin(&values, &BinSpec::new(), &BinConfig::default()).unwrap();
        let layout = out.layout.unwrap();
        assert_eq!(layout.count, 1);
        assert_eq!(layout.range(0), BinRange { lower: 6.5, upper: 7.5 });
        assert!(out.bins.iter().all(|b| *b == Some(layout.range(0))));
    }

    #[test]
    fn nulls_and_nan_get_the_sentinel() {
        let values = vec![Some(1.0), None, Some(f64::NAN), Some(4.0)];
        let out = bin(&values, &BinSpec::new(), &BinConfig::default()).unwrap();
        assert!(out.bins[0].is_some());
        assert!(out.bins[1].is_none());
        assert!(out.bins[2].is_none());
        assert!(out.bins[3].is_some());

        let all_null = bin(&[None, None], &BinSpec::new(), &BinConfig::default()).unwrap();
        assert!(all_null.layout.is_none());
        assert_eq!(all_null.bins, vec![None, None]);
    }

    #[test]
    fn extent_override_keeps_outliers_on_the_grid() {
        let values = some(&[5.0, 50.0, 250.0]);
        let spec = BinSpec::new().with_extent(0.0, 100.0).with_step(10.0);
        let out = bin(&values, &spec, &BinConfig::default()).unwrap();
        assert_eq!(out.layout.unwrap().count, 11);
        assert_eq!(out.bins[2], Some(BinRange { lower: 250.0, upper: 260.0 }));
    }

    #[test]
    fn invalid_specs_are_rejected() {
        let config = BinConfig::default();
        assert!(resolve_layout(0.0, 1.0, &BinSpec::new().with_step(0.0), &config).is_err());
        assert!(resolve_layout(0.0, 1.0, &BinSpec::new().with_max_bins(0), &config).is_err());
        assert!(resolve_layout(0.0, f64::NAN, &BinSpec::new(), &config).is_err());
    }

    #[test]
    fn outliers_off_the_representable_grid_are_rejected() {
        let spec = BinSpec::new().with_extent(0.0, 1.0);
        let err = bin(&[Some(0.5), Some(1e300)], &spec, &BinConfig::default()).unwrap_err();
        assert_eq!(
            err,
            BinError::InvalidBinSpec("value too far outside the bin grid")
        );

        let out = bin(&[Some(0.5), Some(-1e6)], &spec, &BinConfig::default()).unwrap();
        let far = out.bins[1].unwrap();
        assert!(far.contains(-1e6), "{far}");
    }

    #[test]
    fn fine_explicit_steps_are_rejected_instead_of_enumerated() {
        let values = some(&[0.0, 1e7]);
        let spec = BinSpec::new().with_step(1e-6);
        let err = bin(&values, &spec, &BinConfig::default()).unwrap_err();
        assert_eq!(
            err,
            BinError::InvalidBinSpec("step yields too many bins for the domain")
        );

        let spec = BinSpec::new().with_step(1e-300);
        assert!(bin(&values, &spec, &BinConfig::default()).is_err());

        let config = BinConfig {
            max_grid_bins: 5,
            ..BinConfig::default()
        };
        let spec = BinSpec::new().with_step(1.0);
        assert!(resolve_layout(0.0, 4.5, &spec, &config).is_ok());
        assert!(resolve_layout(0.0, 5.0, &spec, &config).is_err());
    }

    #[test]
    fn large_max_bins_is_capped_by_the_grid_ceiling() {
        let spec = BinSpec::new().with_max_bins(usize::MAX);
        let layout = resolve_layout(0.0, 1e7, &spec, &BinConfig::default()).unwrap();
        assert!(layout.count <= BinConfig::default().max_grid_bins);
        assert!(layout.start <= 0.0 && layout.stop() > 1e7);
    }

    #[test]
    fn degenerate_values_beyond_the_width_resolution_are_rejected() {
        assert!(resolve_layout(1e300, 1e300, &BinSpec::new(), &BinConfig::default()).is_err());
        let layout =
            resolve_layout(1.7e12, 1.7e12, &BinSpec::new(), &BinConfig::default()).unwrap();
        assert!(layout.range(0).contains(1.7e12));
    }

    #[test]
    fn min_step_limits_the_width() {
        let spec = BinSpec::new().with_min_step(1.0);
        let layout = resolve_layout(0.0, 2.0, &spec, &BinConfig::default()).unwrap();
        assert_eq!(layout.step, 1.0);
        assert_eq!(layout.count, 3);
    }
}
