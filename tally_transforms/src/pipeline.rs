// Copyright 2025 the Tally Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Split-apply-combine executor.

extern crate alloc;

use alloc::string::String;
use alloc::vec::Vec;

use log::{debug, trace, warn};
use tally_core::{DataError, DataSource, Dataset};
use thiserror::Error;

use crate::aggregate::{AggregateError, aggregate};
use crate::group::{GroupError, group_by};
use crate::stack::{StackError, stack};
use crate::table::{AggregateRow, AggregateTable};
use crate::{AggregateRequest, EmptyGroupPolicy, PipelineConfig, RowOrder};

/// Errors returned by [`Pipeline::execute`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// The dataset has more rows than the configured ceiling.
    #[error("dataset has {rows} rows, more than the limit of {limit}")]
    DatasetTooLarge {
        /// Rows in the dataset.
        rows: usize,
        /// Configured ceiling.
        limit: usize,
    },
    /// Loading the dataset or resolving a measure column failed.
    #[error(transparent)]
    Data(#[from] DataError),
    /// Discretizing or partitioning failed.
    #[error(transparent)]
    Group(#[from] GroupError),
    /// Reducing a group failed.
    #[error("measure `{measure}`: {source}")]
    Aggregate {
        /// Output name of the failing measure.
        measure: String,
        /// Underlying error.
        source: AggregateError,
    },
    /// The stack post-pass failed.
    #[error(transparent)]
    Stack(#[from] StackError),
}

/// Runs [`AggregateRequest`]s under one [`PipelineConfig`].
///
/// Each call is independent: nothing is cached between requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Creates a pipeline with the given configuration.
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// The configuration this pipeline runs with.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Loads a dataset from `source` and executes `request` on it.
    pub fn execute_source(
        &self,
        source: &dyn DataSource,
        request: &AggregateRequest,
    ) -> Result<AggregateTable, PipelineError> {
        let dataset = source.load()?;
        self.execute(&dataset, request)
    }

    /// Executes `request` on `dataset`.
    ///
    /// Steps: row guard, discretize and partition by the key fields, reduce every group with
    /// every measure, order the rows, then run the optional stack post-pass. Either the whole
    /// table is produced or an error is returned.
    pub fn execute(
        &self,
        dataset: &Dataset,
        request: &AggregateRequest,
    ) -> Result<AggregateTable, PipelineError> {
        let config = &self.config;
        let rows = dataset.row_count();
        if let Some(limit) = config.max_rows
            && rows > limit
        {
            warn!("rejecting dataset with {rows} rows (limit {limit})");
            return Err(PipelineError::DatasetTooLarge { rows, limit });
        }

        // Resolve measure columns up front so an empty dataset still reports them.
        for measure in &request.measures {
            if let Some(column) = &measure.column {
                dataset.column(column)?;
            }
        }

        let groups = group_by(dataset, &request.keys, &config.bin)?;

        let key_names = request.keys.iter().map(|k| k.output_name()).collect();
        let value_names = request.measures.iter().map(|m| m.name.clone()).collect();
        let layouts = (0..request.keys.len()).map(|i| groups.bin_layout(i)).collect();
        let mut table = AggregateTable::new(key_names, value_names).with_layouts(layouts);

        for group in &groups {
            let mut values = Vec::with_capacity(request.measures.len());
            for measure in &request.measures {
                let result = aggregate(
                    dataset,
                    &group.rows,
                    measure.column.as_deref(),
                    measure.op,
                    &config.aggregate,
                );
                let value = match result {
                    Ok(v) => Some(v),
                    Err(
                        AggregateError::EmptyAggregate { .. }
                        | AggregateError::InsufficientValues { .. },
                    ) if config.empty_groups == EmptyGroupPolicy::Null => None,
                    Err(source) => {
                        return Err(PipelineError::Aggregate {
                            measure: measure.name.clone(),
                            source,
                        });
                    }
                };
                values.push(value);
            }
            trace!("group [{}] ({} rows): {values:?}", group.key, group.rows.len());
            table.push(AggregateRow {
                key: group.key.clone(),
                values,
            });
        }

        if request.order == RowOrder::Natural {
            table.sort_natural();
        }
        if let Some(stack_request) = &request.stack {
            stack(&mut table, stack_request)?;
        }

        debug!(
            "aggregated {rows} rows into {} group(s) with {} measure(s)",
            table.len(),
            request.measures.len()
        );
        Ok(table)
    }
}

impl AggregateRequest {
    /// Executes this request on `dataset` with `config`.
    ///
    /// Shorthand for `Pipeline::new(config).execute(dataset, self)`.
    pub fn execute(
        &self,
        dataset: &Dataset,
        config: &PipelineConfig,
    ) -> Result<AggregateTable, PipelineError> {
        Pipeline::new(*config).execute(dataset, self)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use alloc::string::ToString;
    use alloc::sync::Arc;
    use alloc::vec;

    use super::*;
    use crate::key::{GroupKey, KeyPart};
    use crate::{AggregateOp, BinSpec, KeyField, Measure, StackOffset, StackRequest};

    fn cars() -> Dataset {
        Dataset::builder()
            .nominal("Origin", [Some("USA"), Some("USA"), Some("Japan")])
            .quantitative("MPG", [Some(10.0), Some(20.0), Some(30.0)])
            .build()
            .unwrap()
    }

    fn origin(name: &str) -> GroupKey {
        GroupKey::new([KeyPart::Text(Arc::from(name))])
    }

    #[test]
    fn mean_by_origin() {
        let request = AggregateRequest::new()
            .group_by(KeyField::new("Origin"))
            .measure(Measure::new(AggregateOp::Mean, "MPG"));
        let table = request.execute(&cars(), &PipelineConfig::default()).unwrap();
        assert_eq!(table.key_names(), ["Origin"]);
        assert_eq!(table.value_names(), ["mean_MPG"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.find(&origin("USA")).unwrap().values, vec![Some(15.0)]);
        assert_eq!(table.find(&origin("Japan")).unwrap().values, vec![Some(30.0)]);
    }

    #[test]
    fn row_guard_rejects_large_datasets() {
        let request = AggregateRequest::new().measure(Measure::count());
        let config = PipelineConfig::default().with_max_rows(2);
        assert_eq!(
            request.execute(&cars(), &config),
            Err(PipelineError::DatasetTooLarge { rows: 3, limit: 2 })
        );
        let table = request
            .execute(&cars(), &config.without_row_limit())
            .unwrap();
        assert_eq!(table.value(0, "count"), Some(3.0));
    }

    #[test]
    fn natural_order_and_stack_run_after_reduction() {
        let request = AggregateRequest::new()
            .group_by(KeyField::new("Origin"))
            .measure(Measure::count())
            .with_order(RowOrder::Natural)
            .with_stack(StackRequest::new("count", Vec::new()).with_offset(StackOffset::Normalize));
        let table = request.execute(&cars(), &PipelineConfig::default()).unwrap();
        assert_eq!(
            table.to_string(),
            "Origin\tcount\tcount_start\tcount_end\n\
             Japan\t1\t0\t0.3333333333333333\n\
             USA\t2\t0.3333333333333333\t1"
        );
    }

    #[test]
    fn empty_groups_fail_or_yield_null() {
        let ds = Dataset::builder()
            .nominal("g", [Some("a"), Some("b")])
            .quantitative("x", [Some(1.0), None])
            .build()
            .unwrap();
        let request = AggregateRequest::new()
            .group_by(KeyField::new("g"))
            .measure(Measure::new(AggregateOp::Mean, "x"));

        let err = request.execute(&ds, &PipelineConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Aggregate {
                source: AggregateError::EmptyAggregate { .. },
                ..
            }
        ));

        let config = PipelineConfig::default().with_empty_groups(EmptyGroupPolicy::Null);
        let table = request.execute(&ds, &config).unwrap();
        assert_eq!(table.column("mean_x"), Some(vec![Some(1.0), None]));
    }

    #[test]
    fn unknown_measure_column_fails_even_without_rows() {
        let request = AggregateRequest::new().measure(Measure::new(AggregateOp::Sum, "MPG"));
        assert_eq!(
            request.execute(&Dataset::default(), &PipelineConfig::default()),
            Err(PipelineError::Data(DataError::UnknownColumn("MPG".into())))
        );
    }

    #[test]
    fn binned_keys_carry_their_layout() {
        let request = AggregateRequest::new()
            .group_by(KeyField::binned("MPG", BinSpec::new().with_max_bins(20)))
            .measure(Measure::count());
        let table = request.execute(&cars(), &PipelineConfig::default()).unwrap();
        assert_eq!(table.key_names(), ["bin_maxbins_20_MPG"]);
        let layout = table.bin_layout(0).unwrap();
        assert!(layout.count <= 20);
        assert_eq!(table.column("count").unwrap().iter().flatten().sum::<f64>(), 3.0);
    }

    #[test]
    fn unrepresentable_bins_fail_the_request() {
        let ds = Dataset::builder()
            .quantitative("x", [Some(0.5), Some(1e300)])
            .build()
            .unwrap();
        let request = AggregateRequest::new()
            .group_by(KeyField::binned("x", BinSpec::new().with_extent(0.0, 1.0)))
            .measure(Measure::count());
        let err = request.execute(&ds, &PipelineConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Group(GroupError::Bin { .. })), "{err}");

        let request = AggregateRequest::new()
            .group_by(KeyField::binned("x", BinSpec::new().with_step(1e-6)))
            .measure(Measure::count());
        let ds = Dataset::builder()
            .quantitative("x", [Some(0.0), Some(1e7)])
            .build()
            .unwrap();
        assert!(request.execute(&ds, &PipelineConfig::default()).is_err());
        let coarse = PipelineConfig::default().with_max_grid_bins(usize::MAX);
        assert!(request.execute(&ds, &coarse).is_ok());
    }

    #[test]
    fn loads_through_a_data_source() {
        let ds = cars();
        let request = AggregateRequest::new().measure(Measure::new(AggregateOp::Max, "MPG"));
        let table = Pipeline::default().execute_source(&ds, &request).unwrap();
        assert_eq!(table.value(0, "max_MPG"), Some(30.0));
    }
}
