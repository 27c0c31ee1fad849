// Copyright 2025 the Tally Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Request IR types.

extern crate alloc;

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use tally_core::DataType;

use crate::AggregateError;
use crate::time_unit::TimeUnitSpec;

/// How a continuous column is cut into bins.
///
/// With no explicit `step`, a "nice" width is chosen so that at most `max_bins` bins cover
/// the data.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BinSpec {
    /// Upper bound on the number of bins. Falls back to
    /// [`BinConfig::default_max_bins`](crate::BinConfig::default_max_bins).
    pub max_bins: Option<usize>,
    /// Exact bin width in data units.
    pub step: Option<f64>,
    /// Domain override used instead of the data's `[min, max]`.
    pub extent: Option<(f64, f64)>,
    /// Smallest width the nice-width search may pick.
    pub min_step: Option<f64>,
}

impl BinSpec {
    /// Creates a spec with default options (Vega-Lite's `bin=True`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum bin count (Vega-Lite's `maxbins`).
    pub fn with_max_bins(mut self, max_bins: usize) -> Self {
        self.max_bins = Some(max_bins);
        self
    }

    /// Sets an exact bin width.
    pub fn with_step(mut self, step: f64) -> Self {
        self.step = Some(step);
        self
    }

    /// Overrides the binned domain.
    pub fn with_extent(mut self, min: f64, max: f64) -> Self {
        self.extent = Some((min, max));
        self
    }

    /// Sets the smallest allowed width.
    pub fn with_min_step(mut self, min_step: f64) -> Self {
        self.min_step = Some(min_step);
        self
    }
}

/// Discretization applied to a grouping column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyTransform {
    /// Group on the raw value.
    None,
    /// Group on the bin containing the value.
    Bin(BinSpec),
    /// Group on calendar parts of a timestamp.
    TimeUnit(TimeUnitSpec),
}

/// One component of a group key.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyField {
    /// Source column.
    pub column: String,
    /// Discretization applied before grouping.
    pub transform: KeyTransform,
}

impl KeyField {
    /// Groups on the raw values of `column`.
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            transform: KeyTransform::None,
        }
    }

    /// Groups on bins of `column`.
    pub fn binned(column: impl Into<String>, spec: BinSpec) -> Self {
        Self {
            column: column.into(),
            transform: KeyTransform::Bin(spec),
        }
    }

    /// Groups on calendar parts of `column`.
    pub fn time_unit(column: impl Into<String>, unit: impl Into<TimeUnitSpec>) -> Self {
        Self {
            column: column.into(),
            transform: KeyTransform::TimeUnit(unit.into()),
        }
    }

    /// Output name of this key, e.g. `bin_maxbins_20_MPG` or `month_date`.
    pub fn output_name(&self) -> String {
        match &self.transform {
            KeyTransform::None => self.column.clone(),
            KeyTransform::Bin(spec) => match (spec.step, spec.max_bins) {
                (Some(step), _) => format!("bin_step_{step}_{}", self.column),
                (None, Some(n)) => format!("bin_maxbins_{n}_{}", self.column),
                (None, None) => format!("bin_{}", self.column),
            },
            KeyTransform::TimeUnit(unit) => format!("{unit}_{}", self.column),
        }
    }
}

/// Aggregation operation for a [`Measure`].
///
/// Names follow Vega-Lite's aggregate ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateOp {
    /// Count rows.
    Count,
    /// Count non-null values.
    Valid,
    /// Count null values.
    Missing,
    /// Count distinct non-null values.
    Distinct,
    /// Sum values (0 for no values).
    Sum,
    /// Arithmetic mean.
    Mean,
    /// Median (linear interpolation between closest ranks).
    Median,
    /// Lower quartile.
    Q1,
    /// Upper quartile.
    Q3,
    /// Minimum value.
    Min,
    /// Maximum value.
    Max,
    /// Sample variance.
    Variance,
    /// Sample standard deviation.
    Stdev,
    /// Standard error of the mean.
    Stderr,
    /// Lower bound of the confidence interval around the mean.
    Ci0,
    /// Upper bound of the confidence interval around the mean.
    Ci1,
}

impl AggregateOp {
    /// All supported operations.
    pub const ALL: [Self; 16] = [
        Self::Count,
        Self::Valid,
        Self::Missing,
        Self::Distinct,
        Self::Sum,
        Self::Mean,
        Self::Median,
        Self::Q1,
        Self::Q3,
        Self::Min,
        Self::Max,
        Self::Variance,
        Self::Stdev,
        Self::Stderr,
        Self::Ci0,
        Self::Ci1,
    ];

    /// Vega-Lite name of the operation.
    pub fn name(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Valid => "valid",
            Self::Missing => "missing",
            Self::Distinct => "distinct",
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Median => "median",
            Self::Q1 => "q1",
            Self::Q3 => "q3",
            Self::Min => "min",
            Self::Max => "max",
            Self::Variance => "variance",
            Self::Stdev => "stdev",
            Self::Stderr => "stderr",
            Self::Ci0 => "ci0",
            Self::Ci1 => "ci1",
        }
    }

    /// Parses a Vega-Lite op name. `average` is accepted as an alias of `mean`.
    pub fn parse(name: &str) -> Option<Self> {
        if name == "average" {
            return Some(Self::Mean);
        }
        Self::ALL.into_iter().find(|op| op.name() == name)
    }
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single aggregated output value.
#[derive(Debug, Clone, PartialEq)]
pub struct Measure {
    /// Operation to apply.
    pub op: AggregateOp,
    /// Input column. Only [`AggregateOp::Count`] may omit it.
    pub column: Option<String>,
    /// Output name.
    pub name: String,
}

impl Measure {
    /// Aggregates `column` with `op`; the output is named `op_column`.
    pub fn new(op: AggregateOp, column: impl Into<String>) -> Self {
        let column = column.into();
        Self {
            op,
            name: format!("{op}_{column}"),
            column: Some(column),
        }
    }

    /// Counts rows; the output is named `count`.
    pub fn count() -> Self {
        Self {
            op: AggregateOp::Count,
            column: None,
            name: "count".to_string(),
        }
    }

    /// Overrides the output name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Parses encoding shorthand such as `mean(Miles_per_Gallon)`, `count()` or
    /// `mean(temperature):Q`.
    ///
    /// A trailing type must be a known shorthand (`Q`, `O`, `N`, `T`) or type name; it is
    /// checked but not stored.
    pub fn parse(shorthand: &str) -> Result<Self, AggregateError> {
        let invalid = || AggregateError::UnknownOp(shorthand.to_string());
        let s = shorthand.trim();
        let s = match s.rfind("):") {
            Some(end) => {
                DataType::parse(s[end + 2..].trim()).ok_or_else(invalid)?;
                &s[..=end]
            }
            None => s,
        };
        let open = s.find('(').ok_or_else(invalid)?;
        let inner = s[open + 1..].strip_suffix(')').ok_or_else(invalid)?.trim();
        let op = AggregateOp::parse(s[..open].trim()).ok_or_else(invalid)?;
        match (op, inner.is_empty()) {
            (AggregateOp::Count, true) => Ok(Self::count()),
            (_, true) => Err(AggregateError::MissingColumn(op)),
            (_, false) => Ok(Self::new(op, inner)),
        }
    }
}

/// Order of the result rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowOrder {
    /// Groups in the order their keys first occur in the dataset.
    #[default]
    FirstOccurrence,
    /// Groups sorted by the natural order of their keys: bins by lower bound, calendar units
    /// by calendar position, ordinals by rank, nominal values by label, nulls last.
    Natural,
}

/// Stack baseline offset mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StackOffset {
    /// Stack positive and negative values around 0 (Vega default).
    #[default]
    Zero,
    /// Center stacks using Vega's `"center"` offset.
    ///
    /// This computes stack offsets using the sum of absolute values and shifts each group so the
    /// group is centered relative to the maximum group sum.
    Center,
    /// Normalize stacks to the range `[0, 1]` using Vega's `"normalize"` offset.
    ///
    /// This computes stack offsets using the sum of absolute values and scales each group so its
    /// total height is `1.0`.
    Normalize,
}

/// Stacks one measure of the aggregated rows.
///
/// Output values are `<measure>_start` and `<measure>_end`, appended after the measures.
#[derive(Debug, Clone, PartialEq)]
pub struct StackRequest {
    /// Name of the measure to stack.
    pub measure: String,
    /// Key positions defining independent stacks (e.g. the position of `Origin` when
    /// stacking bins of one origin on top of each other).
    pub group_by: Vec<usize>,
    /// Baseline offset mode.
    pub offset: StackOffset,
}

impl StackRequest {
    /// Stacks `measure` within groups sharing the key parts at `group_by`.
    pub fn new(measure: impl Into<String>, group_by: impl Into<Vec<usize>>) -> Self {
        Self {
            measure: measure.into(),
            group_by: group_by.into(),
            offset: StackOffset::Zero,
        }
    }

    /// Sets the offset mode.
    pub fn with_offset(mut self, offset: StackOffset) -> Self {
        self.offset = offset;
        self
    }
}

/// A full split-apply-combine request: discretize and group by `keys`, reduce `measures`,
/// then order (and optionally stack) the result rows.
///
/// Built once per chart and never mutated by execution.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregateRequest {
    /// Group-by key fields, in key order.
    pub keys: Vec<KeyField>,
    /// Aggregated outputs, in output order.
    pub measures: Vec<Measure>,
    /// Result row order.
    pub order: RowOrder,
    /// Optional stack post-pass.
    pub stack: Option<StackRequest>,
}

impl AggregateRequest {
    /// Creates an empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a group-by key.
    pub fn group_by(mut self, key: KeyField) -> Self {
        self.keys.push(key);
        self
    }

    /// Appends a measure.
    pub fn measure(mut self, measure: Measure) -> Self {
        self.measures.push(measure);
        self
    }

    /// Sets the result order.
    pub fn with_order(mut self, order: RowOrder) -> Self {
        self.order = order;
        self
    }

    /// Adds a stack post-pass.
    pub fn with_stack(mut self, stack: StackRequest) -> Self {
        self.stack = Some(stack);
        self
    }
}
