// Copyright 2025 the Tally Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The effective dataset produced by the pipeline.

extern crate alloc;

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::bin::BinLayout;
use crate::key::GroupKey;

/// One output row: a group key and its aggregated values.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    /// Discretized key values, aligned to [`AggregateTable::key_names`].
    pub key: GroupKey,
    /// Aggregated values, aligned to [`AggregateTable::value_names`].
    ///
    /// `None` marks an aggregate that is undefined for the group (see
    /// [`EmptyGroupPolicy::Null`](crate::EmptyGroupPolicy::Null)).
    pub values: Vec<Option<f64>>,
}

/// An owned aggregation result: one row per group.
///
/// Column names are stored once; rows hold positional values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateTable {
    key_names: Vec<String>,
    value_names: Vec<String>,
    layouts: Vec<Option<BinLayout>>,
    rows: Vec<AggregateRow>,
}

impl AggregateTable {
    /// Creates an empty table with the given column names.
    pub fn new(key_names: Vec<String>, value_names: Vec<String>) -> Self {
        let layouts = alloc::vec![None; key_names.len()];
        Self {
            key_names,
            value_names,
            layouts,
            rows: Vec::new(),
        }
    }

    pub(crate) fn with_layouts(mut self, layouts: Vec<Option<BinLayout>>) -> Self {
        self.layouts = layouts;
        self
    }

    /// Appends a row.
    ///
    /// The row must have one key part per key column and one value per value column.
    pub fn push(&mut self, row: AggregateRow) {
        debug_assert_eq!(row.key.len(), self.key_names.len(), "key arity");
        debug_assert_eq!(row.values.len(), self.value_names.len(), "value arity");
        self.rows.push(row);
    }

    /// Names of the key columns, e.g. `bin_maxbins_20_Miles_per_Gallon` or `month_date`.
    pub fn key_names(&self) -> &[String] {
        &self.key_names
    }

    /// Names of the value columns, e.g. `mean_Miles_per_Gallon` or `count`.
    pub fn value_names(&self) -> &[String] {
        &self.value_names
    }

    /// Rows in output order.
    pub fn rows(&self) -> &[AggregateRow] {
        &self.rows
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a key column.
    pub fn key_index(&self, name: &str) -> Option<usize> {
        self.key_names.iter().position(|n| n == name)
    }

    /// Position of a value column.
    pub fn value_index(&self, name: &str) -> Option<usize> {
        self.value_names.iter().position(|n| n == name)
    }

    /// Resolved bin grid of the `index`-th key column, if it was binned.
    pub fn bin_layout(&self, index: usize) -> Option<BinLayout> {
        self.layouts.get(index).copied().flatten()
    }

    /// Finds the row for a group key.
    pub fn find(&self, key: &GroupKey) -> Option<&AggregateRow> {
        self.rows.iter().find(|r| &r.key == key)
    }

    /// Value of column `name` in `row`, or `None` if either is missing or the value is null.
    pub fn value(&self, row: usize, name: &str) -> Option<f64> {
        let i = self.value_index(name)?;
        self.rows.get(row)?.values.get(i).copied().flatten()
    }

    /// All values of column `name`, in row order.
    pub fn column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let i = self.value_index(name)?;
        Some(self.rows.iter().map(|r| r.values[i]).collect())
    }

    /// Reorders rows by the natural order of their keys.
    pub fn sort_natural(&mut self) {
        self.rows.sort_by(|a, b| a.key.cmp(&b.key));
    }

    /// Appends a value column. `values` is aligned to the current rows.
    pub(crate) fn push_value_column(&mut self, name: String, values: Vec<Option<f64>>) {
        debug_assert_eq!(values.len(), self.rows.len(), "column length");
        self.value_names.push(name);
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.values.push(value);
        }
    }
}

impl fmt::Display for AggregateTable {
    /// Tab-separated rendering with a header line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for name in self.key_names.iter().chain(&self.value_names) {
            if !first {
                f.write_str("\t")?;
            }
            first = false;
            f.write_str(name)?;
        }
        for row in &self.rows {
            f.write_str("\n")?;
            let mut first = true;
            for part in row.key.iter() {
                if !first {
                    f.write_str("\t")?;
                }
                first = false;
                write!(f, "{part}")?;
            }
            for value in &row.values {
                if !first {
                    f.write_str("\t")?;
                }
                first = false;
                match value {
                    Some(v) => write!(f, "{v}")?,
                    None => f.write_str("null")?,
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use alloc::string::ToString;
    use alloc::sync::Arc;
    use alloc::vec;

    use super::*;
    use crate::key::KeyPart;

    fn table() -> AggregateTable {
        let mut t = AggregateTable::new(vec!["Origin".into()], vec!["count".into()]);
        for (origin, n) in [("USA", 2.0), ("Japan", 1.0)] {
            t.push(AggregateRow {
                key: GroupKey::new([KeyPart::Text(Arc::from(origin))]),
                values: vec![Some(n)],
            });
        }
        t
    }

    #[test]
    fn lookup_by_name_and_key() {
        let t = table();
        assert_eq!(t.value(1, "count"), Some(1.0));
        assert_eq!(t.value(1, "mean"), None);
        assert_eq!(t.column("count"), Some(vec![Some(2.0), Some(1.0)]));
        let japan = GroupKey::new([KeyPart::Text(Arc::from("Japan"))]);
        assert_eq!(t.find(&japan).unwrap().values, vec![Some(1.0)]);
        assert_eq!(t.key_index("Origin"), Some(0));
    }

    #[test]
    fn appended_columns_extend_every_row() {
        let mut t = table();
        t.push_value_column("count_end".into(), vec![Some(2.0), None]);
        assert_eq!(t.value_names(), ["count", "count_end"]);
        assert_eq!(t.rows()[1].values, vec![Some(1.0), None]);
    }

    #[test]
    fn display_is_tab_separated() {
        let mut t = table();
        t.sort_natural();
        assert_eq!(t.to_string(), "Origin\tcount\nJapan\t1\nUSA\t2");
    }
}
