// Copyright 2025 the Tally Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stack post-pass over an aggregated table.

extern crate alloc;

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use hashbrown::HashMap;
use log::debug;
use smallvec::SmallVec;
use thiserror::Error;

use crate::key::KeyPart;
use crate::table::AggregateTable;
use crate::{StackOffset, StackRequest};

/// Errors returned by [`stack`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StackError {
    /// The stacked measure is not a value column of the table.
    #[error("cannot stack unknown measure `{0}`")]
    UnknownMeasure(String),
    /// A stack group index does not name a key column.
    #[error("stack group index {index} is out of range for {keys} key column(s)")]
    InvalidStackKey {
        /// Offending index.
        index: usize,
        /// Number of key columns.
        keys: usize,
    },
}

/// Lays the values of `request.measure` end to end within each stack group.
///
/// Rows whose key parts at `request.group_by` are equal form one stack and are accumulated in
/// table row order. Two value columns are appended: `<measure>_start` and `<measure>_end`.
///
/// - [`StackOffset::Zero`]: positive values stack upward from 0, negative values downward.
/// - [`StackOffset::Normalize`]: absolute values stack from 0 as fractions of the stack's
///   absolute total, so each stack ends at 1 (a stack whose total is 0 stays at 0).
/// - [`StackOffset::Center`]: absolute values stack from an offset that centers every stack
///   on the largest stack total.
///
/// Null values get null bounds and do not move the running sum.
pub fn stack(table: &mut AggregateTable, request: &StackRequest) -> Result<(), StackError> {
    let measure = table
        .value_index(&request.measure)
        .ok_or_else(|| StackError::UnknownMeasure(request.measure.clone()))?;
    let keys = table.key_names().len();
    if let Some(&index) = request.group_by.iter().find(|&&i| i >= keys) {
        return Err(StackError::InvalidStackKey { index, keys });
    }

    // Stack id per row, numbered in first-occurrence order.
    let mut ids: HashMap<SmallVec<[&KeyPart; 2]>, usize> = HashMap::new();
    let mut stack_of = Vec::with_capacity(table.len());
    for row in table.rows() {
        let parts: SmallVec<[&KeyPart; 2]> =
            request.group_by.iter().map(|&i| &row.key[i]).collect();
        let next = ids.len();
        stack_of.push(*ids.entry(parts).or_insert(next));
    }
    let stacks = ids.len();
    drop(ids);

    let values: Vec<Option<f64>> = table.rows().iter().map(|r| r.values[measure]).collect();
    let mut starts = Vec::with_capacity(values.len());
    let mut ends = Vec::with_capacity(values.len());

    match request.offset {
        StackOffset::Zero => {
            let mut up = alloc::vec![0.0; stacks];
            let mut down = alloc::vec![0.0; stacks];
            for (value, &s) in values.iter().zip(&stack_of) {
                let Some(v) = *value else {
                    starts.push(None);
                    ends.push(None);
                    continue;
                };
                let acc = if v < 0.0 { &mut down[s] } else { &mut up[s] };
                starts.push(Some(*acc));
                *acc += v;
                ends.push(Some(*acc));
            }
        }
        StackOffset::Normalize | StackOffset::Center => {
            let mut totals = alloc::vec![0.0; stacks];
            for (value, &s) in values.iter().zip(&stack_of) {
                totals[s] += value.map_or(0.0, f64::abs);
            }
            let max_total = totals.iter().copied().fold(0.0, f64::max);
            let mut acc: Vec<f64> = match request.offset {
                StackOffset::Center => totals.iter().map(|t| (max_total - t) / 2.0).collect(),
                _ => alloc::vec![0.0; stacks],
            };
            for (value, &s) in values.iter().zip(&stack_of) {
                let Some(v) = *value else {
                    starts.push(None);
                    ends.push(None);
                    continue;
                };
                let mut v = v.abs();
                if request.offset == StackOffset::Normalize {
                    v = if totals[s] > 0.0 { v / totals[s] } else { 0.0 };
                }
                starts.push(Some(acc[s]));
                acc[s] += v;
                ends.push(Some(acc[s]));
            }
        }
    }

    debug!(
        "stacked `{}` into {} stack(s) with {:?} offset",
        request.measure, stacks, request.offset
    );
    table.push_value_column(format!("{}_start", request.measure), starts);
    table.push_value_column(format!("{}_end", request.measure), ends);
    Ok(())
}

#[cfg(test)]
mod tests {
    extern crate std;

    use alloc::sync::Arc;
    use alloc::vec;

    use super::*;
    use crate::key::GroupKey;
    use crate::table::AggregateRow;

    /// Counts by (bin, origin), as a histogram colored by origin would produce.
    fn histogram() -> AggregateTable {
        let mut t = AggregateTable::new(
            vec!["bin".into(), "Origin".into()],
            vec!["count".into()],
        );
        let rows = [
            (10.0, "USA", 3.0),
            (10.0, "Japan", 1.0),
            (20.0, "USA", 2.0),
            (20.0, "Europe", 2.0),
            (10.0, "Europe", 0.0),
        ];
        for (bin, origin, n) in rows {
            t.push(AggregateRow {
                key: GroupKey::new([KeyPart::Number(bin), KeyPart::Text(Arc::from(origin))]),
                values: vec![Some(n)],
            });
        }
        t
    }

    fn bounds(t: &AggregateTable) -> Vec<(f64, f64)> {
        let starts = t.column("count_start").unwrap();
        let ends = t.column("count_end").unwrap();
        starts
            .into_iter()
            .zip(ends)
            .map(|(s, e)| (s.unwrap(), e.unwrap()))
            .collect()
    }

    #[test]
    fn zero_offset_accumulates_per_stack() {
        let mut t = histogram();
        stack(&mut t, &StackRequest::new("count", vec![0])).unwrap();
        assert_eq!(
            bounds(&t),
            vec![(0.0, 3.0), (3.0, 4.0), (0.0, 2.0), (2.0, 4.0), (4.0, 4.0)]
        );
    }

    #[test]
    fn normalize_ends_each_stack_at_one() {
        let mut t = histogram();
        stack(
            &mut t,
            &StackRequest::new("count", vec![0]).with_offset(StackOffset::Normalize),
        )
        .unwrap();
        assert_eq!(
            bounds(&t),
            vec![(0.0, 0.75), (0.75, 1.0), (0.0, 0.5), (0.5, 1.0), (1.0, 1.0)]
        );
    }

    #[test]
    fn center_aligns_stacks_on_the_tallest() {
        let mut t = AggregateTable::new(vec!["x".into()], vec!["v".into()]);
        for (x, v) in [(0.0, 4.0), (1.0, 1.0), (1.0, 1.0)] {
            t.push(AggregateRow {
                key: GroupKey::new([KeyPart::Number(x)]),
                values: vec![Some(v)],
            });
        }
        stack(
            &mut t,
            &StackRequest::new("v", vec![0]).with_offset(StackOffset::Center),
        )
        .unwrap();
        assert_eq!(t.column("v_start").unwrap(), vec![Some(0.0), Some(1.0), Some(2.0)]);
        assert_eq!(t.column("v_end").unwrap(), vec![Some(4.0), Some(2.0), Some(3.0)]);
    }

    #[test]
    fn negative_values_stack_downward() {
        let mut t = AggregateTable::new(vec!["x".into()], vec!["v".into()]);
        for v in [Some(2.0), Some(-1.0), None, Some(-2.0)] {
            t.push(AggregateRow {
                key: GroupKey::new([KeyPart::Number(0.0)]),
                values: vec![v],
            });
        }
        stack(&mut t, &StackRequest::new("v", vec![0])).unwrap();
        assert_eq!(
            t.column("v_start").unwrap(),
            vec![Some(0.0), Some(0.0), None, Some(-1.0)]
        );
        assert_eq!(
            t.column("v_end").unwrap(),
            vec![Some(2.0), Some(-1.0), None, Some(-3.0)]
        );
    }

    #[test]
    fn rejects_unknown_measure_and_key() {
        let mut t = histogram();
        assert_eq!(
            stack(&mut t, &StackRequest::new("mean", vec![0])),
            Err(StackError::UnknownMeasure("mean".into()))
        );
        assert_eq!(
            stack(&mut t, &StackRequest::new("count", vec![2])),
            Err(StackError::InvalidStackKey { index: 2, keys: 2 })
        );
        assert_eq!(t.value_names(), ["count"]);
    }
}
