// Copyright 2025 the Tally Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Datasets and loaders.

extern crate alloc;

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use chrono::NaiveDateTime;

use crate::{Column, DataError, DataType, Datum};

/// An ordered set of rows over a fixed schema, stored column-wise.
///
/// Every column has exactly [`Dataset::row_count`] cells.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    columns: Vec<Column>,
    rows: usize,
}

impl Dataset {
    /// Starts building a dataset column by column.
    pub fn builder() -> DatasetBuilder {
        DatasetBuilder::default()
    }

    /// Assembles a dataset from prebuilt columns.
    ///
    /// All columns must have the same length and distinct names.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self, DataError> {
        let rows = columns.first().map_or(0, Column::len);
        for (i, col) in columns.iter().enumerate() {
            if col.len() != rows {
                return Err(DataError::LengthMismatch {
                    column: col.name().to_string(),
                    expected: rows,
                    found: col.len(),
                });
            }
            if columns[..i].iter().any(|c| c.name() == col.name()) {
                return Err(DataError::DuplicateColumn(col.name().to_string()));
            }
        }
        Ok(Self { columns, rows })
    }

    /// Loads row-oriented, loosely typed data.
    ///
    /// Each column's type is inferred from its non-null cells: numbers become quantitative,
    /// text becomes nominal, timestamps become temporal (UTC). A column with no non-null
    /// cells is quantitative. Mixing kinds within a column fails with
    /// [`DataError::TypeMismatch`].
    pub fn from_rows<N, R>(names: &[N], rows: R) -> Result<Self, DataError>
    where
        N: AsRef<str>,
        R: IntoIterator<Item = Vec<Datum>>,
    {
        let mut cells: Vec<Vec<Datum>> = names.iter().map(|_| Vec::new()).collect();
        for (r, row) in rows.into_iter().enumerate() {
            if row.len() != names.len() {
                return Err(DataError::LengthMismatch {
                    column: format!("row {r}"),
                    expected: names.len(),
                    found: row.len(),
                });
            }
            for (c, datum) in row.into_iter().enumerate() {
                cells[c].push(datum);
            }
        }

        let columns = names
            .iter()
            .zip(cells)
            .map(|(name, cells)| infer_column(name.as_ref(), cells))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_columns(columns)
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows
    }

    /// Returns `true` if the dataset has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Columns in schema order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Result<&Column, DataError> {
        self.columns
            .iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| DataError::UnknownColumn(name.to_string()))
    }

    /// Returns the schema as `(name, type)` pairs.
    pub fn schema(&self) -> impl Iterator<Item = (&str, DataType)> + '_ {
        self.columns.iter().map(|c| (c.name(), c.data_type()))
    }
}

/// Incremental builder for a [`Dataset`].
///
/// Length and name checks happen in [`DatasetBuilder::build`].
#[derive(Debug, Default)]
pub struct DatasetBuilder {
    columns: Vec<Column>,
    error: Option<DataError>,
}

impl DatasetBuilder {
    /// Adds a prebuilt column.
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Adds a quantitative column.
    pub fn quantitative(
        self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = Option<f64>>,
    ) -> Self {
        self.column(Column::quantitative(name, values))
    }

    /// Adds a nominal column.
    pub fn nominal<S: AsRef<str>>(
        self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = Option<S>>,
    ) -> Self {
        self.column(Column::nominal(name, values))
    }

    /// Adds an ordinal column ranked by `levels`.
    pub fn ordinal<L: AsRef<str>, S: AsRef<str>>(
        mut self,
        name: impl Into<String>,
        levels: impl IntoIterator<Item = L>,
        values: impl IntoIterator<Item = Option<S>>,
    ) -> Self {
        match Column::ordinal(name, levels, values) {
            Ok(column) => self.column(column),
            Err(err) => {
                self.error.get_or_insert(err);
                self
            }
        }
    }

    /// Adds a temporal column in UTC.
    pub fn temporal(
        self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = Option<NaiveDateTime>>,
    ) -> Self {
        self.column(Column::temporal(name, values))
    }

    /// Validates and returns the dataset.
    pub fn build(self) -> Result<Dataset, DataError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Dataset::from_columns(self.columns)
    }
}

/// A supplier of datasets.
///
/// The pipeline only needs a loaded [`Dataset`]; where it came from (an in-memory table, a
/// file, a remote resource) is the loader's business.
pub trait DataSource {
    /// Loads the dataset.
    fn load(&self) -> Result<Dataset, DataError>;
}

impl DataSource for Dataset {
    fn load(&self) -> Result<Dataset, DataError> {
        Ok(self.clone())
    }
}

impl<T: DataSource + ?Sized> DataSource for &T {
    fn load(&self) -> Result<Dataset, DataError> {
        (**self).load()
    }
}

fn infer_column(name: &str, cells: Vec<Datum>) -> Result<Column, DataError> {
    let mut inferred: Option<DataType> = None;
    for (row, datum) in cells.iter().enumerate() {
        let Some(found) = datum.data_type() else {
            continue;
        };
        match inferred {
            None => inferred = Some(found),
            Some(expected) if expected != found => {
                return Err(DataError::TypeMismatch {
                    column: name.to_string(),
                    row,
                    expected,
                    found,
                });
            }
            Some(_) => {}
        }
    }

    let column = match inferred.unwrap_or(DataType::Quantitative) {
        DataType::Nominal | DataType::Ordinal => Column::nominal(
            name,
            cells.into_iter().map(|d| match d {
                Datum::Text(s) => Some(s),
                _ => None,
            }),
        ),
        DataType::Temporal => Column::temporal(
            name,
            cells.into_iter().map(|d| match d {
                Datum::Time(t) => Some(t),
                _ => None,
            }),
        ),
        DataType::Quantitative => Column::quantitative(
            name,
            cells.into_iter().map(|d| match d {
                Datum::Number(v) => Some(v),
                _ => None,
            }),
        ),
    };
    Ok(column)
}
