// Copyright 2025 the Tally Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Typed column store for Tally.
//!
//! This crate holds the tabular input of the transform pipeline:
//! - [`Column`]s with a declared [`DataType`] (quantitative, ordinal, nominal, temporal),
//! - a [`Dataset`] that keeps every column aligned to the same row count, and
//! - the [`DataSource`] seam used by loaders.
//!
//! Cell types are checked once when a column is built. Readers get a tagged [`Value`] per
//! cell and never need to re-validate.

#![no_std]

extern crate alloc;

mod column;
mod dataset;
mod error;
mod value;

pub use column::Column;
pub use dataset::{DataSource, Dataset, DatasetBuilder};
pub use error::DataError;
pub use value::{DataType, Datum, Value};
