// Copyright 2025 the Tally Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bin, time-unit, group-by and aggregate transforms over a [`tally_core::Dataset`].
//!
//! This crate turns "group by these (possibly binned or time-truncated) fields and reduce these
//! columns" into the effective dataset a chart renders:
//!
//! - [`bin`] maps numbers onto a "nice" step-aligned grid of half-open bins,
//! - [`extract_time_units`] truncates timestamps to calendar parts such as `yearmonth`,
//! - [`group_by`] partitions rows by the tuple of discretized key values,
//! - [`aggregate`] reduces one group's rows to a number,
//! - [`stack`] lays aggregated values end to end, and
//! - [`Pipeline`] chains all of the above for an [`AggregateRequest`].
//!
//! Everything is synchronous and deterministic. Configuration is passed explicitly through
//! [`PipelineConfig`].
//!
//! ```
//! use tally_core::Dataset;
//! use tally_transforms::{AggregateOp, AggregateRequest, KeyField, Measure, PipelineConfig};
//!
//! let cars = Dataset::builder()
//!     .nominal("Origin", [Some("USA"), Some("USA"), Some("Japan")])
//!     .quantitative("MPG", [Some(10.0), Some(20.0), Some(30.0)])
//!     .build()
//!     .unwrap();
//! let table = AggregateRequest::new()
//!     .group_by(KeyField::new("Origin"))
//!     .measure(Measure::new(AggregateOp::Mean, "MPG"))
//!     .execute(&cars, &PipelineConfig::default())
//!     .unwrap();
//! assert_eq!(table.column("mean_MPG"), Some(vec![Some(15.0), Some(30.0)]));
//! ```

#![no_std]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

mod aggregate;
mod bin;
mod config;
#[cfg(not(feature = "std"))]
mod float;
mod group;
mod key;
mod pipeline;
mod stack;
mod table;
mod time_unit;
mod transform;

pub use aggregate::{AggregateError, aggregate, z_score};
pub use bin::{BinError, BinLayout, BinRange, Binning, bin, resolve_layout};
pub use config::{
    AggregateConfig, BinConfig, DEFAULT_CONFIDENCE_LEVEL, DEFAULT_MAX_BINS, DEFAULT_MAX_GRID_BINS,
    DEFAULT_MAX_ROWS,
    EmptyGroupPolicy, PipelineConfig,
};
pub use group::{Group, GroupError, Groups, group_by};
pub use key::{GroupKey, KeyPart};
pub use pipeline::{Pipeline, PipelineError};
pub use stack::{StackError, stack};
pub use table::{AggregateRow, AggregateTable};
pub use time_unit::{TimeKey, TimeUnit, TimeUnitSpec, extract_time_units};
pub use transform::{
    AggregateOp, AggregateRequest, BinSpec, KeyField, KeyTransform, Measure, RowOrder,
    StackOffset, StackRequest,
};
