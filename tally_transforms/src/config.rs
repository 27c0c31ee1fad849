// Copyright 2025 the Tally Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pipeline configuration.
//!
//! Every knob the pipeline reads lives here and is passed into each invocation. There is no
//! global "current data transformer" state.

/// Row ceiling applied when no explicit limit is configured.
pub const DEFAULT_MAX_ROWS: usize = 5000;

/// Bin count used when a [`BinSpec`](crate::BinSpec) does not set `max_bins`.
pub const DEFAULT_MAX_BINS: usize = 10;

/// Ceiling on the number of bins any resolved grid may have.
pub const DEFAULT_MAX_GRID_BINS: usize = 1 << 20;

/// Confidence level used for `ci0`/`ci1`.
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;

/// What to do when an aggregate is undefined for a group (for example `mean` over a group
/// whose values are all null).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyGroupPolicy {
    /// Fail the request with the aggregate error.
    #[default]
    Fail,
    /// Keep the group and report the value as `None`.
    Null,
}

/// Binning defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinConfig {
    /// Maximum bin count when the spec leaves it open.
    pub default_max_bins: usize,
    /// Width of the single bin produced when every value is equal.
    pub degenerate_width: f64,
    /// Grids needing more bins than this are rejected, including those of an explicit step.
    pub max_grid_bins: usize,
}

impl Default for BinConfig {
    fn default() -> Self {
        Self {
            default_max_bins: DEFAULT_MAX_BINS,
            degenerate_width: 1.0,
            max_grid_bins: DEFAULT_MAX_GRID_BINS,
        }
    }
}

/// Aggregation defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateConfig {
    /// Two-sided confidence level for `ci0`/`ci1`, in `(0, 1)`.
    pub confidence_level: f64,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
        }
    }
}

/// Configuration for one pipeline invocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    /// Datasets with more rows than this are rejected. `None` disables the guard.
    pub max_rows: Option<usize>,
    /// Binning defaults.
    pub bin: BinConfig,
    /// Aggregation defaults.
    pub aggregate: AggregateConfig,
    /// Handling of undefined aggregates.
    pub empty_groups: EmptyGroupPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_rows: Some(DEFAULT_MAX_ROWS),
            bin: BinConfig::default(),
            aggregate: AggregateConfig::default(),
            empty_groups: EmptyGroupPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the row ceiling.
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    /// Disables the row ceiling.
    pub fn without_row_limit(mut self) -> Self {
        self.max_rows = None;
        self
    }

    /// Sets the default maximum bin count.
    pub fn with_default_max_bins(mut self, max_bins: usize) -> Self {
        self.bin.default_max_bins = max_bins;
        self
    }

    /// Sets the width used when all binned values are equal.
    pub fn with_degenerate_width(mut self, width: f64) -> Self {
        self.bin.degenerate_width = width;
        self
    }

    /// Sets the ceiling on the number of bins in a resolved grid.
    pub fn with_max_grid_bins(mut self, max_grid_bins: usize) -> Self {
        self.bin.max_grid_bins = max_grid_bins;
        self
    }

    /// Sets the confidence level for `ci0`/`ci1`.
    pub fn with_confidence_level(mut self, level: f64) -> Self {
        self.aggregate.confidence_level = level;
        self
    }

    /// Sets the handling of undefined aggregates.
    pub fn with_empty_groups(mut self, policy: EmptyGroupPolicy) -> Self {
        self.empty_groups = policy;
        self
    }
}
