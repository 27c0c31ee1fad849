// Copyright 2025 the Tally Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Replays common chart aggregations against small inline datasets and prints the effective
//! dataset of each chart.
//!
//! Run with `RUST_LOG=debug` to see resolved bin layouts and pipeline summaries.

use std::error::Error;

use chrono::{NaiveDate, NaiveDateTime};
use tally_core::{DataError, DataSource, Dataset, Datum};
use tally_transforms::{
    AggregateOp, AggregateRequest, AggregateTable, BinSpec, KeyField, Measure, Pipeline,
    PipelineConfig, PipelineError, RowOrder, StackOffset, StackRequest, TimeUnit, TimeUnitSpec,
};

/// A handful of rows from the classic cars dataset.
struct Cars;

impl DataSource for Cars {
    fn load(&self) -> Result<Dataset, DataError> {
        const ROWS: &[(&str, Option<f64>, f64, i32)] = &[
            ("USA", Some(18.0), 130.0, 1970),
            ("USA", Some(15.0), 165.0, 1970),
            ("Europe", Some(26.0), 46.0, 1970),
            ("Japan", Some(24.0), 95.0, 1970),
            ("USA", None, 175.0, 1970),
            ("USA", Some(22.0), 95.0, 1971),
            ("Japan", Some(27.0), 88.0, 1971),
            ("Europe", Some(25.0), 87.0, 1971),
            ("USA", Some(13.0), 165.0, 1972),
            ("Japan", Some(35.0), 69.0, 1972),
            ("Europe", Some(29.0), 75.0, 1972),
            ("USA", Some(17.0), 140.0, 1973),
            ("Japan", Some(31.0), 65.0, 1973),
            ("Europe", Some(24.0), 90.0, 1973),
            ("USA", Some(20.0), 100.0, 1974),
            ("Japan", Some(32.0), 61.0, 1974),
            ("Europe", Some(26.0), 78.0, 1974),
        ];
        let rows = ROWS.iter().map(|&(origin, mpg, horsepower, year)| {
            vec![
                Datum::from(origin),
                Datum::from(mpg),
                Datum::from(horsepower),
                Datum::from(january_first(year)),
            ]
        });
        Dataset::from_rows(
            &["Origin", "Miles_per_Gallon", "Horsepower", "Year"],
            rows,
        )
    }
}

fn january_first(year: i32) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Synthetic Seattle temperatures: four readings a day on the 1st and 15th of every month.
fn seattle() -> Result<Dataset, DataError> {
    let mut dates = Vec::new();
    let mut temps = Vec::new();
    for month in 1..=12_u32 {
        for day in [1, 15] {
            for hour in [0, 6, 12, 18] {
                let seasonal = 1.0 - ((f64::from(month) - 7.0) / 6.0).powi(2);
                let daily = match hour {
                    0 => -3.0,
                    6 => -2.0,
                    12 => 4.0,
                    _ => 2.0,
                };
                dates.push(
                    NaiveDate::from_ymd_opt(2010, month, day).and_then(|d| d.and_hms_opt(hour, 0, 0)),
                );
                temps.push(Some(5.0 + 14.0 * seasonal + daily));
            }
        }
    }
    Dataset::builder()
        .temporal("date", dates)
        .quantitative("temp", temps)
        .build()
}

fn show(title: &str, table: &AggregateTable) {
    println!("== {title}");
    println!("{table}");
    println!();
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let pipeline = Pipeline::new(PipelineConfig::default());
    let cars = Cars.load()?;
    let seattle = seattle()?;

    let mpg = "Miles_per_Gallon";

    let by_origin = AggregateRequest::new()
        .group_by(KeyField::new("Origin"))
        .measure(Measure::parse("mean(Miles_per_Gallon)")?);
    show("bar: mean MPG by origin", &pipeline.execute(&cars, &by_origin)?);

    let histogram = AggregateRequest::new()
        .group_by(KeyField::binned(mpg, BinSpec::new()))
        .group_by(KeyField::new("Origin"))
        .measure(Measure::count())
        .with_order(RowOrder::Natural);
    let table = pipeline.execute(&cars, &histogram)?;
    if let Some(layout) = table.bin_layout(0) {
        println!(
            "MPG bins: start {} step {} count {}",
            layout.start, layout.step, layout.count
        );
    }
    show("histogram: MPG colored by origin", &table);

    let heatmap = AggregateRequest::new()
        .group_by(KeyField::binned(mpg, BinSpec::new().with_max_bins(20)))
        .group_by(KeyField::binned("Horsepower", BinSpec::new().with_max_bins(20)))
        .measure(Measure::count())
        .with_order(RowOrder::Natural);
    show("heatmap: binned MPG x binned horsepower", &pipeline.execute(&cars, &heatmap)?);

    let normalized = histogram.clone().with_stack(
        StackRequest::new("count", vec![0]).with_offset(StackOffset::Normalize),
    );
    show("stacked histogram, normalized", &pipeline.execute(&cars, &normalized)?);

    let yearly = AggregateRequest::new()
        .group_by(KeyField::time_unit("Year", TimeUnit::Year))
        .measure(Measure::new(AggregateOp::Mean, mpg))
        .measure(Measure::new(AggregateOp::Ci0, mpg))
        .measure(Measure::new(AggregateOp::Ci1, mpg))
        .with_order(RowOrder::Natural);
    show("line + band: yearly mean MPG with 95% CI", &pipeline.execute(&cars, &yearly)?);

    for unit in ["month", "date", "hours", "monthdate"] {
        let Some(spec) = TimeUnitSpec::parse(unit) else {
            continue;
        };
        let request = AggregateRequest::new()
            .group_by(KeyField::time_unit("date", spec))
            .measure(Measure::new(AggregateOp::Mean, "temp"))
            .with_order(RowOrder::Natural);
        show(
            &format!("Seattle: mean temperature by {unit}"),
            &pipeline.execute(&seattle, &request)?,
        );
    }

    let big = Dataset::builder()
        .quantitative("x", (0..6000).map(|i| Some(f64::from(i))))
        .build()?;
    let counts = AggregateRequest::new()
        .group_by(KeyField::binned("x", BinSpec::new()))
        .measure(Measure::count());
    match pipeline.execute(&big, &counts) {
        Err(err @ PipelineError::DatasetTooLarge { .. }) => println!("row guard: {err}"),
        other => println!("row guard did not trigger: {other:?}"),
    }
    let unguarded = Pipeline::new(PipelineConfig::default().without_row_limit());
    show("6000 rows without the row guard", &unguarded.execute(&big, &counts)?);

    Ok(())
}
