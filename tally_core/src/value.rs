// Copyright 2025 the Tally Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Column types and cell values.

extern crate alloc;

use alloc::string::String;
use core::fmt;

use chrono::NaiveDateTime;

/// The declared type of a column.
///
/// This drives which transforms are valid: binning needs a quantitative or temporal column,
/// time units need a temporal column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Continuous numbers (`f64`).
    Quantitative,
    /// Categories with an explicit rank.
    Ordinal,
    /// Unordered categories.
    Nominal,
    /// Wall-clock timestamps in the column's declared offset.
    Temporal,
}

impl DataType {
    /// Every type, in shorthand order.
    pub const ALL: [Self; 4] = [
        Self::Quantitative,
        Self::Ordinal,
        Self::Nominal,
        Self::Temporal,
    ];

    /// Parses a type from its shorthand (`Q`) or its name (`quantitative`).
    pub fn parse(s: &str) -> Option<Self> {
        let mut chars = s.chars();
        let single = chars.next().filter(|_| chars.next().is_none());
        Self::ALL
            .into_iter()
            .find(|t| single == Some(t.shorthand()) || s.eq_ignore_ascii_case(t.name()))
    }

    /// Lowercase name of the type.
    pub fn name(self) -> &'static str {
        match self {
            Self::Quantitative => "quantitative",
            Self::Ordinal => "ordinal",
            Self::Nominal => "nominal",
            Self::Temporal => "temporal",
        }
    }

    /// Returns `true` if values of this type can be binned.
    pub fn is_binnable(self) -> bool {
        matches!(self, Self::Quantitative | Self::Temporal)
    }

    /// Returns `true` if values of this type are categories.
    pub fn is_discrete(self) -> bool {
        matches!(self, Self::Ordinal | Self::Nominal)
    }

    /// The Vega-Lite shorthand for this type (`Q`, `O`, `N`, `T`).
    pub fn shorthand(self) -> char {
        match self {
            Self::Quantitative => 'Q',
            Self::Ordinal => 'O',
            Self::Nominal => 'N',
            Self::Temporal => 'T',
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A borrowed, typed cell read from a [`Column`](crate::Column).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    /// Missing value.
    Null,
    /// A quantitative value (always finite).
    Number(f64),
    /// A nominal category.
    Nominal(&'a str),
    /// An ordinal category and its rank in the declared level order.
    Ordinal {
        /// Position of the level in the column's declared order.
        rank: u32,
        /// Level label.
        label: &'a str,
    },
    /// A temporal value.
    Time(NaiveDateTime),
}

impl Value<'_> {
    /// Returns `true` for the null marker.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the numeric payload of a quantitative value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the label of a categorical value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Nominal(s) => Some(s),
            Self::Ordinal { label, .. } => Some(label),
            _ => None,
        }
    }
}

/// A loosely typed input cell, used when loading row-oriented data.
///
/// Column types are inferred from these once, at load time.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    /// Missing value.
    Null,
    /// A number. Non-finite numbers load as null.
    Number(f64),
    /// Text, loaded as a nominal category.
    Text(String),
    /// A timestamp.
    Time(NaiveDateTime),
}

impl Datum {
    /// The column type this datum implies, or `None` for null.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Self::Null => None,
            Self::Number(_) => Some(DataType::Quantitative),
            Self::Text(_) => Some(DataType::Nominal),
            Self::Time(_) => Some(DataType::Temporal),
        }
    }
}

impl From<f64> for Datum {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for Datum {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for Datum {
    fn from(value: &str) -> Self {
        Self::Text(value.into())
    }
}

impl From<String> for Datum {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<NaiveDateTime> for Datum {
    fn from(value: NaiveDateTime) -> Self {
        Self::Time(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Datum {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
