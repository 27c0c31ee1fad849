// Copyright 2025 the Tally Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Aggregator: reduces the rows of one group to a number.
//!
//! `ci0`/`ci1` use the normal approximation `mean ∓ z · s / √n` (with `s` the sample standard
//! deviation) rather than a bootstrap, so results are deterministic for identical input.

extern crate alloc;

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use hashbrown::HashSet;
use tally_core::{DataError, DataType, Dataset};
use thiserror::Error;

#[cfg(not(feature = "std"))]
use crate::float::FloatExt;

use crate::{AggregateConfig, AggregateOp};

/// Errors returned by [`aggregate`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggregateError {
    /// The input column is missing.
    #[error(transparent)]
    Data(#[from] DataError),
    /// The aggregate is undefined because there are no non-null values.
    #[error("{op}({column}) is undefined for an empty or all-null group")]
    EmptyAggregate {
        /// Input column.
        column: String,
        /// Requested op.
        op: AggregateOp,
    },
    /// The aggregate needs more values than the group has.
    #[error("{op}({column}) needs at least {needed} values, found {found}")]
    InsufficientValues {
        /// Input column.
        column: String,
        /// Requested op.
        op: AggregateOp,
        /// Minimum number of non-null values.
        needed: usize,
        /// Non-null values present.
        found: usize,
    },
    /// A numeric op was requested on a categorical column.
    #[error("{op} needs a numeric column, `{column}` is {data_type}")]
    NonNumeric {
        /// Input column.
        column: String,
        /// Requested op.
        op: AggregateOp,
        /// The column's type.
        data_type: DataType,
    },
    /// The op needs an input column and none was given.
    #[error("{0} needs an input column")]
    MissingColumn(AggregateOp),
    /// Unrecognized op name or shorthand.
    #[error("unknown aggregate `{0}`")]
    UnknownOp(String),
    /// The confidence level is outside `(0, 1)`.
    #[error("confidence level {0} is outside (0, 1)")]
    InvalidConfidenceLevel(f64),
}

/// Reduces `rows` of `column` with `op`.
///
/// - `count` is the number of rows, whatever the column holds (0 for no rows).
/// - `valid`, `missing` and `distinct` count values; `sum` of no values is 0.
/// - Every other op fails with [`AggregateError::EmptyAggregate`] when the rows hold no
///   non-null values; `variance`, `stdev` and `stderr` need at least two.
///
/// Numeric ops read temporal columns as epoch milliseconds and reject categorical columns.
/// The result does not depend on the order of `rows`.
pub fn aggregate(
    dataset: &Dataset,
    rows: &[usize],
    column: Option<&str>,
    op: AggregateOp,
    config: &AggregateConfig,
) -> Result<f64, AggregateError> {
    let column = match column {
        Some(name) => dataset.column(name)?,
        None if op == AggregateOp::Count => return Ok(rows.len() as f64),
        None => return Err(AggregateError::MissingColumn(op)),
    };

    let numeric = || -> Result<Vec<f64>, AggregateError> {
        if column.data_type().is_discrete() {
            return Err(AggregateError::NonNumeric {
                column: column.name().to_string(),
                op,
                data_type: column.data_type(),
            });
        }
        let mut values: Vec<f64> = rows.iter().filter_map(|&r| column.f64(r)).collect();
        // Sorting first makes every reduction independent of row order.
        values.sort_by(f64::total_cmp);
        Ok(values)
    };
    let at_least = |needed: usize| -> Result<Vec<f64>, AggregateError> {
        let values = numeric()?;
        match values.len() {
            0 => Err(AggregateError::EmptyAggregate {
                column: column.name().to_string(),
                op,
            }),
            found if found < needed => Err(AggregateError::InsufficientValues {
                column: column.name().to_string(),
                op,
                needed,
                found,
            }),
            _ => Ok(values),
        }
    };

    let result = match op {
        AggregateOp::Count => rows.len() as f64,
        AggregateOp::Valid => rows.iter().filter(|&&r| !column.is_null(r)).count() as f64,
        AggregateOp::Missing => rows.iter().filter(|&&r| column.is_null(r)).count() as f64,
        AggregateOp::Distinct => {
            let distinct = match column.codes() {
                Some(codes) => rows
                    .iter()
                    .filter_map(|&r| codes.get(r).copied().flatten())
                    .collect::<HashSet<u32>>()
                    .len(),
                None => rows
                    .iter()
                    .filter_map(|&r| column.f64(r))
                    .map(|v| if v == 0.0 { 0_u64 } else { v.to_bits() })
                    .collect::<HashSet<u64>>()
                    .len(),
            };
            distinct as f64
        }
        AggregateOp::Sum => sum(&numeric()?),
        AggregateOp::Mean => mean(&at_least(1)?),
        AggregateOp::Median => quantile(&at_least(1)?, 0.5),
        AggregateOp::Q1 => quantile(&at_least(1)?, 0.25),
        AggregateOp::Q3 => quantile(&at_least(1)?, 0.75),
        AggregateOp::Min => at_least(1)?[0],
        AggregateOp::Max => {
            let values = at_least(1)?;
            values[values.len() - 1]
        }
        AggregateOp::Variance => variance(&at_least(2)?),
        AggregateOp::Stdev => variance(&at_least(2)?).sqrt(),
        AggregateOp::Stderr => {
            let values = at_least(2)?;
            (variance(&values) / values.len() as f64).sqrt()
        }
        AggregateOp::Ci0 | AggregateOp::Ci1 => {
            let z = z_score(config.confidence_level)?;
            let values = at_least(1)?;
            let m = mean(&values);
            let half_width = if values.len() < 2 {
                0.0
            } else {
                z * (variance(&values) / values.len() as f64).sqrt()
            };
            if op == AggregateOp::Ci0 {
                m - half_width
            } else {
                m + half_width
            }
        }
    };
    Ok(result)
}

/// Compensated (Neumaier) sum.
fn sum(values: &[f64]) -> f64 {
    let mut total = 0.0;
    let mut compensation = 0.0;
    for &v in values {
        let t = total + v;
        if total.abs() >= v.abs() {
            compensation += (total - t) + v;
        } else {
            compensation += (v - t) + total;
        }
        total = t;
    }
    total + compensation
}

fn mean(values: &[f64]) -> f64 {
    sum(values) / values.len() as f64
}

/// Sample variance (denominator `n - 1`), two-pass.
fn variance(values: &[f64]) -> f64 {
    let m = mean(values);
    let squares: Vec<f64> = values.iter().map(|v| (v - m) * (v - m)).collect();
    sum(&squares) / (values.len() - 1) as f64
}

/// Quantile of sorted, non-empty `values` with linear interpolation between closest ranks.
fn quantile(values: &[f64], p: f64) -> f64 {
    let h = (values.len() - 1) as f64 * p;
    let lo = h.floor();
    #[allow(
        clippy::cast_possible_truncation,
        reason = "h is within 0..values.len() by construction"
    )]
    let i = lo as usize;
    match values.get(i + 1) {
        Some(&next) => values[i] + (next - values[i]) * (h - lo),
        None => values[i],
    }
}

/// Two-sided critical value for a confidence `level`, e.g. 1.959964 for 0.95.
pub fn z_score(level: f64) -> Result<f64, AggregateError> {
    if !(level > 0.0 && level < 1.0) {
        return Err(AggregateError::InvalidConfidenceLevel(level));
    }
    Ok(probit(1.0 - (1.0 - level) / 2.0))
}

/// Inverse of the standard normal CDF (Acklam's rational approximation, relative error
/// below 1.2e-9) for `p` in `(0, 1)`.
fn probit(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_671_348_283_43,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.024_25;

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use alloc::vec;

    use super::*;

    fn cars() -> Dataset {
        Dataset::builder()
            .nominal("Origin", [Some("USA"), Some("USA"), Some("Japan"), Some("USA")])
            .quantitative("MPG", [Some(10.0), Some(20.0), Some(30.0), None])
            .build()
            .unwrap()
    }

    fn agg(rows: &[usize], op: AggregateOp) -> Result<f64, AggregateError> {
        aggregate(&cars(), rows, Some("MPG"), op, &AggregateConfig::default())
    }

    #[test]
    fn empty_rows_count_zero_but_mean_fails() {
        assert_eq!(agg(&[], AggregateOp::Count), Ok(0.0));
        assert_eq!(agg(&[], AggregateOp::Sum), Ok(0.0));
        for op in [
            AggregateOp::Mean,
            AggregateOp::Median,
            AggregateOp::Ci0,
            AggregateOp::Ci1,
            AggregateOp::Min,
        ] {
            assert_eq!(
                agg(&[], op),
                Err(AggregateError::EmptyAggregate {
                    column: "MPG".into(),
                    op,
                })
            );
        }
    }

    #[test]
    fn all_null_group_behaves_as_empty() {
        assert_eq!(agg(&[3], AggregateOp::Count), Ok(1.0));
        assert_eq!(agg(&[3], AggregateOp::Valid), Ok(0.0));
        assert_eq!(agg(&[3], AggregateOp::Missing), Ok(1.0));
        assert!(matches!(
            agg(&[3], AggregateOp::Mean),
            Err(AggregateError::EmptyAggregate { .. })
        ));
    }

    #[test]
    fn count_ignores_column_content() {
        let ds = cars();
        let config = AggregateConfig::default();
        let rows = [0, 1, 2, 3];
        assert_eq!(
            aggregate(&ds, &rows, None, AggregateOp::Count, &config),
            Ok(4.0)
        );
        assert_eq!(
            aggregate(&ds, &rows, Some("Origin"), AggregateOp::Count, &config),
            Ok(4.0)
        );
    }

    #[test]
    fn basic_reductions() {
        let rows = [0, 1, 2, 3];
        assert_eq!(agg(&rows, AggregateOp::Mean), Ok(20.0));
        assert_eq!(agg(&rows, AggregateOp::Sum), Ok(60.0));
        assert_eq!(agg(&rows, AggregateOp::Median), Ok(20.0));
        assert_eq!(agg(&rows, AggregateOp::Q1), Ok(15.0));
        assert_eq!(agg(&rows, AggregateOp::Q3), Ok(25.0));
        assert_eq!(agg(&rows, AggregateOp::Min), Ok(10.0));
        assert_eq!(agg(&rows, AggregateOp::Max), Ok(30.0));
        assert_eq!(agg(&rows, AggregateOp::Variance), Ok(100.0));
        assert_eq!(agg(&rows, AggregateOp::Stdev), Ok(10.0));
        assert_eq!(agg(&rows, AggregateOp::Distinct), Ok(3.0));
    }

    #[test]
    fn confidence_interval_uses_normal_approximation() {
        let rows = [0, 1, 2];
        let lo = agg(&rows, AggregateOp::Ci0).unwrap();
        let hi = agg(&rows, AggregateOp::Ci1).unwrap();
        let half = 1.959_964 * 10.0 / 3.0_f64.sqrt();
        assert!((lo - (20.0 - half)).abs() < 1e-5, "ci0 = {lo}");
        assert!((hi - (20.0 + half)).abs() < 1e-5, "ci1 = {hi}");

        // A single value collapses the interval onto the mean.
        assert_eq!(agg(&[2], AggregateOp::Ci0), Ok(30.0));
        assert_eq!(agg(&[2], AggregateOp::Ci1), Ok(30.0));
    }

    #[test]
    fn z_scores() {
        assert!((z_score(0.95).unwrap() - 1.959_964).abs() < 1e-6);
        assert!((z_score(0.99).unwrap() - 2.575_829).abs() < 1e-6);
        assert!((z_score(0.5).unwrap() - 0.674_490).abs() < 1e-6);
        assert_eq!(
            z_score(1.0),
            Err(AggregateError::InvalidConfidenceLevel(1.0))
        );
    }

    #[test]
    fn spread_needs_two_values() {
        assert_eq!(
            agg(&[0], AggregateOp::Stdev),
            Err(AggregateError::InsufficientValues {
                column: "MPG".into(),
                op: AggregateOp::Stdev,
                needed: 2,
                found: 1,
            })
        );
    }

    #[test]
    fn categorical_columns_reject_numeric_ops() {
        let ds = cars();
        let config = AggregateConfig::default();
        let err = aggregate(&ds, &[0], Some("Origin"), AggregateOp::Mean, &config).unwrap_err();
        assert!(matches!(err, AggregateError::NonNumeric { .. }));
        assert_eq!(
            aggregate(&ds, &[0, 1, 2], Some("Origin"), AggregateOp::Distinct, &config),
            Ok(2.0)
        );
        assert_eq!(
            aggregate(&ds, &[0], None, AggregateOp::Mean, &config),
            Err(AggregateError::MissingColumn(AggregateOp::Mean))
        );
    }

    #[test]
    fn mean_is_order_independent() {
        let ds = Dataset::builder()
            .quantitative("x", vec![Some(0.1), Some(1e16), Some(0.2), Some(-1e16), Some(0.3)])
            .build()
            .unwrap();
        let config = AggregateConfig::default();
        let a = aggregate(&ds, &[0, 1, 2, 3, 4], Some("x"), AggregateOp::Mean, &config);
        let b = aggregate(&ds, &[4, 3, 2, 1, 0], Some("x"), AggregateOp::Mean, &config);
        assert_eq!(a, b);
    }
}
