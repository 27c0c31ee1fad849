// Copyright 2025 the Tally Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

extern crate alloc;

use alloc::string::String;

use thiserror::Error;

use crate::DataType;

/// Errors returned when building or reading a [`Dataset`](crate::Dataset).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    /// The requested column is not part of the schema.
    #[error("unknown column `{0}`")]
    UnknownColumn(String),
    /// Two columns share a name.
    #[error("duplicate column `{0}`")]
    DuplicateColumn(String),
    /// A column (or input row) does not match the dataset's length.
    #[error("`{column}` has {found} values, expected {expected}")]
    LengthMismatch {
        /// Offending column, or the row index for row-oriented input.
        column: String,
        /// Expected length.
        expected: usize,
        /// Actual length.
        found: usize,
    },
    /// A column mixes cells of different kinds.
    #[error("column `{column}` row {row}: expected {expected} value, found {found}")]
    TypeMismatch {
        /// Offending column.
        column: String,
        /// First row that disagrees with the inferred type.
        row: usize,
        /// Type inferred from earlier rows.
        expected: DataType,
        /// Type of the offending cell.
        found: DataType,
    },
    /// An ordinal value is not one of the declared levels.
    #[error("`{value}` is not a declared level of ordinal column `{column}`")]
    UnknownLevel {
        /// Offending column.
        column: String,
        /// The unknown value.
        value: String,
    },
}
