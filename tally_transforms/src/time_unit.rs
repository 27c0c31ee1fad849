// Copyright 2025 the Tally Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Calendar time units.
//!
//! A [`TimeUnitSpec`] is a set of [`TimeUnit`]s (`month`, `yearmonth`, `hours`, ...). Extracting
//! it from a timestamp yields a [`TimeKey`] whose parts are stored in calendar order, so
//! comparing keys compares calendar positions, never display labels.
//!
//! Timestamps are read as wall-clock values in whatever zone the column declares; nothing
//! here converts between zones.

extern crate alloc;

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use smallvec::SmallVec;

/// A single calendar unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimeUnit {
    /// Calendar year.
    Year,
    /// Quarter of the year, 1-4.
    Quarter,
    /// Month of the year, 1-12.
    Month,
    /// Day of the month, 1-31.
    Date,
    /// Day of the week, 0 (Sunday) to 6.
    Day,
    /// Hour of the day, 0-23.
    Hours,
    /// Minute of the hour, 0-59.
    Minutes,
    /// Second of the minute, 0-59.
    Seconds,
}

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

impl TimeUnit {
    /// All units in calendar order.
    pub const ALL: [Self; 8] = [
        Self::Year,
        Self::Quarter,
        Self::Month,
        Self::Date,
        Self::Day,
        Self::Hours,
        Self::Minutes,
        Self::Seconds,
    ];

    /// Vega-Lite name of the unit.
    pub fn name(self) -> &'static str {
        match self {
            Self::Year => "year",
            Self::Quarter => "quarter",
            Self::Month => "month",
            Self::Date => "date",
            Self::Day => "day",
            Self::Hours => "hours",
            Self::Minutes => "minutes",
            Self::Seconds => "seconds",
        }
    }

    /// Reads this unit from a wall-clock timestamp.
    pub fn extract(self, t: &NaiveDateTime) -> i32 {
        match self {
            Self::Year => t.year(),
            Self::Quarter => (t.month0() / 3 + 1) as i32,
            Self::Month => t.month() as i32,
            Self::Date => t.day() as i32,
            Self::Day => t.weekday().num_days_from_sunday() as i32,
            Self::Hours => t.hour() as i32,
            Self::Minutes => t.minute() as i32,
            Self::Seconds => t.second() as i32,
        }
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// A set of time units, e.g. `yearmonth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TimeUnitSpec {
    bits: u8,
}

impl TimeUnitSpec {
    /// Builds a compound unit from its parts. Order and duplicates do not matter.
    pub fn new(units: impl IntoIterator<Item = TimeUnit>) -> Self {
        Self {
            bits: units.into_iter().fold(0, |bits, u| bits | u.bit()),
        }
    }

    /// Parses Vega-Lite unit names such as `month`, `yearmonthdate` or `hoursminutes`.
    pub fn parse(name: &str) -> Option<Self> {
        let mut rest = name.trim();
        let mut bits = 0;
        while !rest.is_empty() {
            let unit = TimeUnit::ALL
                .into_iter()
                .find(|u| rest.starts_with(u.name()))?;
            if bits & unit.bit() != 0 {
                return None;
            }
            bits |= unit.bit();
            rest = &rest[unit.name().len()..];
        }
        (bits != 0).then_some(Self { bits })
    }

    /// Returns `true` if `unit` is part of this set.
    pub fn contains(&self, unit: TimeUnit) -> bool {
        self.bits & unit.bit() != 0
    }

    /// Returns `true` if the set has no units.
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Units of this set in calendar order.
    pub fn units(&self) -> impl Iterator<Item = TimeUnit> + '_ {
        TimeUnit::ALL.into_iter().filter(|u| self.contains(*u))
    }

    /// Extracts the calendar key of one timestamp.
    pub fn extract(&self, t: &NaiveDateTime) -> TimeKey {
        TimeKey {
            spec: *self,
            parts: self.units().map(|u| u.extract(t)).collect(),
        }
    }
}

impl From<TimeUnit> for TimeUnitSpec {
    fn from(unit: TimeUnit) -> Self {
        Self::new([unit])
    }
}

impl fmt::Display for TimeUnitSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for u in self.units() {
            f.write_str(u.name())?;
        }
        Ok(())
    }
}

/// The calendar parts of one timestamp under a [`TimeUnitSpec`].
///
/// Parts are stored in calendar order (year first, seconds last), so the derived ordering is
/// calendar ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeKey {
    spec: TimeUnitSpec,
    parts: SmallVec<[i32; 4]>,
}

impl TimeKey {
    /// The units this key was extracted with.
    pub fn spec(&self) -> TimeUnitSpec {
        self.spec
    }

    /// Value of `unit`, if it is part of the key.
    pub fn get(&self, unit: TimeUnit) -> Option<i32> {
        let idx = self.spec.units().position(|u| u == unit)?;
        self.parts.get(idx).copied()
    }

    /// A representative timestamp for the key.
    ///
    /// Units outside the key take Vega-Lite's defaults: year 2012, January, the 1st, midnight.
    /// A day of week without a date maps onto the first week of January 2012 (which starts on a
    /// Sunday).
    pub fn to_datetime(&self) -> Option<NaiveDateTime> {
        let year = self.get(TimeUnit::Year).unwrap_or(2012);
        let month = match (self.get(TimeUnit::Month), self.get(TimeUnit::Quarter)) {
            (Some(m), _) => m,
            (None, Some(q)) => (q - 1) * 3 + 1,
            (None, None) => 1,
        };
        let date = match (self.get(TimeUnit::Date), self.get(TimeUnit::Day)) {
            (Some(d), _) => d,
            (None, Some(day)) => day + 1,
            (None, None) => 1,
        };
        let field = |v: i32| u32::try_from(v).ok();
        NaiveDate::from_ymd_opt(year, field(month)?, field(date)?)?.and_hms_opt(
            field(self.get(TimeUnit::Hours).unwrap_or(0))?,
            field(self.get(TimeUnit::Minutes).unwrap_or(0))?,
            field(self.get(TimeUnit::Seconds).unwrap_or(0))?,
        )
    }

    /// Display label, e.g. `Jan`, `Jan 2012`, `Mar 14`, `07:00`.
    pub fn label(&self) -> String {
        let mut date_parts: Vec<String> = Vec::new();
        if let Some(day) = self.get(TimeUnit::Day) {
            date_parts.push(lookup(&WEEKDAYS, day, 0));
        }
        if let Some(month) = self.get(TimeUnit::Month) {
            date_parts.push(lookup(&MONTHS, month, 1));
        }
        if let Some(date) = self.get(TimeUnit::Date) {
            date_parts.push(alloc::format!("{date}"));
        }
        if let Some(q) = self.get(TimeUnit::Quarter) {
            date_parts.push(alloc::format!("Q{q}"));
        }
        if let Some(year) = self.get(TimeUnit::Year) {
            date_parts.push(alloc::format!("{year}"));
        }

        let mut out = date_parts.join(" ");
        let clock = [TimeUnit::Hours, TimeUnit::Minutes, TimeUnit::Seconds]
            .map(|u| self.get(u));
        if clock.iter().any(Option::is_some) {
            if !out.is_empty() {
                out.push(' ');
            }
            let mut first = true;
            for v in clock.into_iter().flatten() {
                if !first {
                    out.push(':');
                }
                out.push_str(&alloc::format!("{v:02}"));
                first = false;
            }
            if clock == [clock[0], None, None] {
                out.push_str(":00");
            }
        }
        out
    }
}

impl fmt::Display for TimeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

fn lookup(names: &[&str], value: i32, first: i32) -> String {
    usize::try_from(value - first)
        .ok()
        .and_then(|i| names.get(i))
        .map_or_else(|| alloc::format!("{value}"), |s| String::from(*s))
}

/// Extracts `spec` from every timestamp; nulls stay null.
pub fn extract_time_units(
    values: &[Option<NaiveDateTime>],
    spec: &TimeUnitSpec,
) -> Vec<Option<TimeKey>> {
    values
        .iter()
        .map(|t| t.as_ref().map(|t| spec.extract(t)))
        .collect()
}

#[cfg(test)]
mod tests {
    extern crate std;

    use alloc::vec;

    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|d| d.and_hms_opt(h, 30, 0))
            .unwrap()
    }

    #[test]
    fn parse_compound_units() {
        let ym = TimeUnitSpec::parse("yearmonth").unwrap();
        assert_eq!(ym, TimeUnitSpec::new([TimeUnit::Month, TimeUnit::Year]));
        assert_eq!(alloc::format!("{ym}"), "yearmonth");
        assert_eq!(
            TimeUnitSpec::parse("monthdate").unwrap().units().collect::<Vec<_>>(),
            vec![TimeUnit::Month, TimeUnit::Date]
        );
        assert!(TimeUnitSpec::parse("fortnight").is_none());
        assert!(TimeUnitSpec::parse("monthmonth").is_none());
        assert!(TimeUnitSpec::parse("").is_none());
    }

    #[test]
    fn month_orders_by_calendar_not_label() {
        let spec = TimeUnitSpec::from(TimeUnit::Month);
        let feb = spec.extract(&at(2010, 2, 1, 0));
        let oct = spec.extract(&at(2010, 10, 1, 0));
        let dec = spec.extract(&at(1999, 12, 31, 0));
        // Lexicographically "Dec" < "Feb" < "Oct"; calendar order differs.
        assert!(feb < oct);
        assert!(oct < dec);
        assert_eq!(dec.label(), "Dec");
        assert_eq!(feb.get(TimeUnit::Month), Some(2));
    }

    #[test]
    fn extraction_reads_wall_clock_fields() {
        let t = at(2012, 3, 14, 7);
        let spec = TimeUnitSpec::parse("yearquartermonthdatedayhoursminutes").unwrap();
        let key = spec.extract(&t);
        assert_eq!(key.get(TimeUnit::Year), Some(2012));
        assert_eq!(key.get(TimeUnit::Quarter), Some(1));
        assert_eq!(key.get(TimeUnit::Date), Some(14));
        // 2012-03-14 was a Wednesday.
        assert_eq!(key.get(TimeUnit::Day), Some(3));
        assert_eq!(key.get(TimeUnit::Hours), Some(7));
        assert_eq!(key.get(TimeUnit::Seconds), None);
    }

    #[test]
    fn labels() {
        let t = at(2012, 3, 14, 7);
        let label = |name: &str| TimeUnitSpec::parse(name).unwrap().extract(&t).label();
        assert_eq!(label("yearmonth"), "Mar 2012");
        assert_eq!(label("monthdate"), "Mar 14");
        assert_eq!(label("hours"), "07:00");
        assert_eq!(label("hoursminutes"), "07:30");
        assert_eq!(label("day"), "Wed");
    }

    #[test]
    fn representative_datetime() {
        let t = at(1999, 8, 20, 13);
        let month = TimeUnitSpec::from(TimeUnit::Month).extract(&t);
        assert_eq!(
            month.to_datetime(),
            NaiveDate::from_ymd_opt(2012, 8, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
        );
        let hours = TimeUnitSpec::from(TimeUnit::Hours).extract(&t);
        assert_eq!(
            hours.to_datetime(),
            NaiveDate::from_ymd_opt(2012, 1, 1).and_then(|d| d.and_hms_opt(13, 0, 0))
        );
    }

    #[test]
    fn extract_keeps_nulls() {
        let keys = extract_time_units(&[Some(at(2000, 1, 1, 0)), None], &TimeUnit::Year.into());
        assert_eq!(keys.len(), 2);
        assert!(keys[1].is_none());
    }
}
