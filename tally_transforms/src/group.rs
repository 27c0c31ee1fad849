// Copyright 2025 the Tally Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Grouping engine: partitions rows by a tuple of discretized key values.

extern crate alloc;

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use hashbrown::HashMap;
use hashbrown::hash_map::Entry;
use log::debug;
use smallvec::SmallVec;
use tally_core::{Column, DataError, DataType, Dataset, Value};
use thiserror::Error;

use crate::bin::{BinError, BinLayout, bin};
use crate::key::{GroupKey, KeyPart};
use crate::time_unit::extract_time_units;
use crate::{BinConfig, KeyField, KeyTransform};

/// Errors returned by [`group_by`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupError {
    /// A key column is missing.
    #[error(transparent)]
    Data(#[from] DataError),
    /// Binning was requested on a column that is neither quantitative nor temporal.
    #[error("cannot bin {data_type} column `{column}`")]
    InvalidBinSpec {
        /// Offending column.
        column: String,
        /// Its declared type.
        data_type: DataType,
    },
    /// A time unit was requested on a non-temporal column.
    #[error("cannot extract time units from {data_type} column `{column}`")]
    InvalidTimeUnit {
        /// Offending column.
        column: String,
        /// Its declared type.
        data_type: DataType,
    },
    /// The bin spec itself is invalid.
    #[error("column `{column}`: {source}")]
    Bin {
        /// Binned column.
        column: String,
        /// Underlying error.
        source: BinError,
    },
}

/// One partition of the dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    /// Discretized key values, one per key field.
    pub key: GroupKey,
    /// Indices of the rows in this group, ascending.
    pub rows: Vec<usize>,
}

/// The partition produced by [`group_by`].
#[derive(Debug, Clone, Default)]
pub struct Groups {
    groups: Vec<Group>,
    layouts: Vec<Option<BinLayout>>,
}

impl Groups {
    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Returns `true` if there are no groups.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Groups in their current order.
    pub fn as_slice(&self) -> &[Group] {
        &self.groups
    }

    /// Iterates over the groups.
    pub fn iter(&self) -> core::slice::Iter<'_, Group> {
        self.groups.iter()
    }

    /// Finds the group with the given key.
    pub fn get(&self, key: &GroupKey) -> Option<&Group> {
        self.groups.iter().find(|g| &g.key == key)
    }

    /// Resolved bin grid of the `index`-th key field, if it was binned.
    pub fn bin_layout(&self, index: usize) -> Option<BinLayout> {
        self.layouts.get(index).copied().flatten()
    }

    /// Reorders groups by the natural order of their keys.
    pub fn sort_natural(&mut self) {
        self.groups.sort_by(|a, b| a.key.cmp(&b.key));
    }

    /// Consumes the partition and returns its groups.
    pub fn into_vec(self) -> Vec<Group> {
        self.groups
    }
}

impl<'a> IntoIterator for &'a Groups {
    type Item = &'a Group;
    type IntoIter = core::slice::Iter<'a, Group>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.iter()
    }
}

/// Partitions the rows of `dataset` by the discretized values of `keys`.
///
/// Groups appear in the order their keys first occur. Rows with a null key part (including
/// values outside every bin) form their own groups. Every row belongs to exactly one group.
/// With no key fields, all rows form a single group.
pub fn group_by(
    dataset: &Dataset,
    keys: &[KeyField],
    config: &BinConfig,
) -> Result<Groups, GroupError> {
    let mut key_columns: Vec<Vec<KeyPart>> = Vec::with_capacity(keys.len());
    let mut layouts = Vec::with_capacity(keys.len());
    for field in keys {
        let column = dataset.column(&field.column)?;
        let (parts, layout) = discretize(column, field, config)?;
        key_columns.push(parts);
        layouts.push(layout);
    }

    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    let mut groups: Vec<Group> = Vec::new();
    for row in 0..dataset.row_count() {
        let key = GroupKey(
            key_columns
                .iter()
                .map(|parts| parts[row].clone())
                .collect::<SmallVec<_>>(),
        );
        match index.entry(key) {
            Entry::Occupied(e) => groups[*e.get()].rows.push(row),
            Entry::Vacant(e) => {
                groups.push(Group {
                    key: e.key().clone(),
                    rows: alloc::vec![row],
                });
                e.insert(groups.len() - 1);
            }
        }
    }

    debug!(
        "grouped {} rows by {} key(s) into {} group(s)",
        dataset.row_count(),
        keys.len(),
        groups.len()
    );
    Ok(Groups { groups, layouts })
}

/// Maps every cell of `column` to its key part under the field's transform.
fn discretize(
    column: &Column,
    field: &KeyField,
    config: &BinConfig,
) -> Result<(Vec<KeyPart>, Option<BinLayout>), GroupError> {
    match &field.transform {
        KeyTransform::None => {
            let parts = match column.codes() {
                Some(codes) => {
                    let levels = column.levels();
                    let ordinal = column.data_type() == DataType::Ordinal;
                    codes
                        .iter()
                        .map(|code| match code {
                            None => KeyPart::Null,
                            Some(code) => {
                                let label = levels[*code as usize].clone();
                                if ordinal {
                                    KeyPart::Ordinal { rank: *code, label }
                                } else {
                                    KeyPart::Text(label)
                                }
                            }
                        })
                        .collect()
                }
                None => column
                    .values()
                    .map(|v| match v {
                        Value::Number(n) => KeyPart::Number(n),
                        Value::Time(t) => KeyPart::Time(t),
                        _ => KeyPart::Null,
                    })
                    .collect(),
            };
            Ok((parts, None))
        }
        KeyTransform::Bin(spec) => {
            let not_binnable = || GroupError::InvalidBinSpec {
                column: column.name().to_string(),
                data_type: column.data_type(),
            };
            if !column.data_type().is_binnable() {
                return Err(not_binnable());
            }
            let values = column.numeric_values().ok_or_else(not_binnable)?;
            let binning = bin(&values, spec, config).map_err(|source| GroupError::Bin {
                column: column.name().to_string(),
                source,
            })?;
            let parts = binning
                .bins
                .into_iter()
                .map(|b| b.map_or(KeyPart::Null, KeyPart::Bin))
                .collect();
            Ok((parts, binning.layout))
        }
        KeyTransform::TimeUnit(unit) => {
            let times = column.times().ok_or_else(|| GroupError::InvalidTimeUnit {
                column: column.name().to_string(),
                data_type: column.data_type(),
            })?;
            let parts = extract_time_units(times, unit)
                .into_iter()
                .map(|k| k.map_or(KeyPart::Null, KeyPart::TimeUnit))
                .collect();
            Ok((parts, None))
        }
    }
}
