// Copyright 2025 the Tally Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Typed column storage.

extern crate alloc;

use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;

use chrono::{FixedOffset, NaiveDateTime, Offset, Utc};

use crate::{DataError, DataType, Value};

/// A named, typed column.
///
/// Categories are dictionary encoded: each cell stores a code into the column's levels.
/// Nominal levels are kept in first-occurrence order; ordinal levels in their declared rank
/// order.
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    data: ColumnData,
}

#[derive(Debug, Clone)]
enum ColumnData {
    Quantitative(Vec<Option<f64>>),
    Nominal {
        levels: Vec<Arc<str>>,
        codes: Vec<Option<u32>>,
    },
    Ordinal {
        levels: Vec<Arc<str>>,
        codes: Vec<Option<u32>>,
    },
    Temporal {
        offset: FixedOffset,
        values: Vec<Option<NaiveDateTime>>,
    },
}

impl Column {
    /// Builds a quantitative column. Non-finite values are stored as null.
    pub fn quantitative(
        name: impl Into<String>,
        values: impl IntoIterator<Item = Option<f64>>,
    ) -> Self {
        let values = values
            .into_iter()
            .map(|v| v.filter(|v| v.is_finite()))
            .collect();
        Self {
            name: name.into(),
            data: ColumnData::Quantitative(values),
        }
    }

    /// Builds a nominal column, collecting levels in first-occurrence order.
    pub fn nominal<S: AsRef<str>>(
        name: impl Into<String>,
        values: impl IntoIterator<Item = Option<S>>,
    ) -> Self {
        let mut levels: Vec<Arc<str>> = Vec::new();
        let codes = values
            .into_iter()
            .map(|v| {
                let v = v?;
                let v = v.as_ref();
                let code = match levels.iter().position(|l| &**l == v) {
                    Some(code) => code,
                    None => {
                        levels.push(Arc::from(v));
                        levels.len() - 1
                    }
                };
                Some(code_u32(code))
            })
            .collect();
        Self {
            name: name.into(),
            data: ColumnData::Nominal { levels, codes },
        }
    }

    /// Builds an ordinal column whose ranks follow `levels`.
    ///
    /// Fails with [`DataError::UnknownLevel`] if a value is not one of `levels`.
    pub fn ordinal<L: AsRef<str>, S: AsRef<str>>(
        name: impl Into<String>,
        levels: impl IntoIterator<Item = L>,
        values: impl IntoIterator<Item = Option<S>>,
    ) -> Result<Self, DataError> {
        let name = name.into();
        let levels: Vec<Arc<str>> = levels.into_iter().map(|l| Arc::from(l.as_ref())).collect();
        let mut codes = Vec::new();
        for v in values {
            let Some(v) = v else {
                codes.push(None);
                continue;
            };
            let v = v.as_ref();
            let Some(rank) = levels.iter().position(|l| &**l == v) else {
                return Err(DataError::UnknownLevel {
                    column: name,
                    value: v.to_string(),
                });
            };
            codes.push(Some(code_u32(rank)));
        }
        Ok(Self {
            name,
            data: ColumnData::Ordinal { levels, codes },
        })
    }

    /// Builds a temporal column of wall-clock timestamps in UTC.
    pub fn temporal(
        name: impl Into<String>,
        values: impl IntoIterator<Item = Option<NaiveDateTime>>,
    ) -> Self {
        Self::temporal_with_offset(name, values, Utc.fix())
    }

    /// Builds a temporal column whose wall-clock values are in `offset`.
    ///
    /// Time-unit extraction reads the wall-clock fields as stored; the offset is only used to
    /// place values on the absolute time line (for binning and numeric aggregates).
    pub fn temporal_with_offset(
        name: impl Into<String>,
        values: impl IntoIterator<Item = Option<NaiveDateTime>>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Temporal {
                offset,
                values: values.into_iter().collect(),
            },
        }
    }

    /// Column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared column type.
    pub fn data_type(&self) -> DataType {
        match self.data {
            ColumnData::Quantitative(_) => DataType::Quantitative,
            ColumnData::Nominal { .. } => DataType::Nominal,
            ColumnData::Ordinal { .. } => DataType::Ordinal,
            ColumnData::Temporal { .. } => DataType::Temporal,
        }
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        match &self.data {
            ColumnData::Quantitative(v) => v.len(),
            ColumnData::Nominal { codes, .. } | ColumnData::Ordinal { codes, .. } => codes.len(),
            ColumnData::Temporal { values, .. } => values.len(),
        }
    }

    /// Returns `true` if the column has no cells.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads one cell, or `None` if `row` is out of bounds.
    pub fn value(&self, row: usize) -> Option<Value<'_>> {
        let value = match &self.data {
            ColumnData::Quantitative(v) => v.get(row)?.map_or(Value::Null, Value::Number),
            ColumnData::Nominal { levels, codes } => match codes.get(row)? {
                Some(code) => Value::Nominal(&levels[*code as usize]),
                None => Value::Null,
            },
            ColumnData::Ordinal { levels, codes } => match codes.get(row)? {
                Some(rank) => Value::Ordinal {
                    rank: *rank,
                    label: &levels[*rank as usize],
                },
                None => Value::Null,
            },
            ColumnData::Temporal { values, .. } => values.get(row)?.map_or(Value::Null, Value::Time),
        };
        Some(value)
    }

    /// Iterates over all cells in row order.
    pub fn values(&self) -> impl Iterator<Item = Value<'_>> + '_ {
        (0..self.len()).map(|row| self.value(row).unwrap_or(Value::Null))
    }

    /// Returns `true` if the cell at `row` is null (or out of bounds).
    pub fn is_null(&self, row: usize) -> bool {
        self.value(row).is_none_or(|v| v.is_null())
    }

    /// Numeric view of a cell.
    ///
    /// Quantitative cells read as-is; temporal cells read as epoch milliseconds after applying
    /// the declared offset. Categories and nulls read as `None`.
    pub fn f64(&self, row: usize) -> Option<f64> {
        match &self.data {
            ColumnData::Quantitative(v) => v.get(row).copied().flatten(),
            ColumnData::Temporal { offset, values } => {
                values.get(row).copied().flatten().map(|t| epoch_millis(t, *offset))
            }
            ColumnData::Nominal { .. } | ColumnData::Ordinal { .. } => None,
        }
    }

    /// Numeric view of the whole column, or `None` for categorical columns.
    pub fn numeric_values(&self) -> Option<Vec<Option<f64>>> {
        match &self.data {
            ColumnData::Quantitative(v) => Some(v.clone()),
            ColumnData::Temporal { offset, values } => Some(
                values
                    .iter()
                    .map(|t| t.map(|t| epoch_millis(t, *offset)))
                    .collect(),
            ),
            ColumnData::Nominal { .. } | ColumnData::Ordinal { .. } => None,
        }
    }

    /// Timestamps of a temporal column.
    pub fn times(&self) -> Option<&[Option<NaiveDateTime>]> {
        match &self.data {
            ColumnData::Temporal { values, .. } => Some(values),
            _ => None,
        }
    }

    /// Declared offset of a temporal column.
    pub fn offset(&self) -> Option<FixedOffset> {
        match &self.data {
            ColumnData::Temporal { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    /// Level codes of a categorical column.
    ///
    /// For ordinal columns the code is the level's rank.
    pub fn codes(&self) -> Option<&[Option<u32>]> {
        match &self.data {
            ColumnData::Nominal { codes, .. } | ColumnData::Ordinal { codes, .. } => Some(codes),
            _ => None,
        }
    }

    /// Levels of a categorical column (empty for other types).
    pub fn levels(&self) -> &[Arc<str>] {
        match &self.data {
            ColumnData::Nominal { levels, .. } | ColumnData::Ordinal { levels, .. } => levels,
            _ => &[],
        }
    }
}

/// Milliseconds since the Unix epoch for a wall-clock time in `offset`.
fn epoch_millis(t: NaiveDateTime, offset: FixedOffset) -> f64 {
    let utc = t - offset;
    utc.and_utc().timestamp_millis() as f64
}

fn code_u32(code: usize) -> u32 {
    u32::try_from(code).unwrap_or(u32::MAX)
}
