// Copyright 2025 the Tally Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Group keys.

extern crate alloc;

use alloc::sync::Arc;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::ops::Deref;

use chrono::NaiveDateTime;
use smallvec::SmallVec;

use crate::bin::BinRange;
use crate::time_unit::TimeKey;

/// One discretized component of a [`GroupKey`].
///
/// Equality is exact (floats compare by value, with `-0.0 == 0.0`). The ordering is the
/// natural display order: numbers and bins ascending (bins by lower bound), calendar units by
/// calendar position, ordinals by rank, nominal values by label, and nulls last.
#[derive(Debug, Clone)]
pub enum KeyPart {
    /// Null, or the "no bin" sentinel.
    Null,
    /// A raw quantitative value.
    Number(f64),
    /// A nominal category.
    Text(Arc<str>),
    /// An ordinal category.
    Ordinal {
        /// Rank in the column's declared level order.
        rank: u32,
        /// Level label.
        label: Arc<str>,
    },
    /// A raw timestamp.
    Time(NaiveDateTime),
    /// A bin of a quantitative or temporal column.
    Bin(BinRange),
    /// Calendar parts of a timestamp.
    TimeUnit(TimeKey),
}

impl KeyPart {
    /// Returns `true` for the null / no-bin sentinel.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the bin, if this part is one.
    pub fn as_bin(&self) -> Option<BinRange> {
        match self {
            Self::Bin(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the category label, if this part is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Ordinal { label: s, .. } => Some(s.as_ref()),
            _ => None,
        }
    }

    fn variant_rank(&self) -> u8 {
        match self {
            Self::Number(_) => 0,
            Self::Bin(_) => 1,
            Self::Time(_) => 2,
            Self::TimeUnit(_) => 3,
            Self::Ordinal { .. } => 4,
            Self::Text(_) => 5,
            Self::Null => 6,
        }
    }
}

fn normalized_bits(v: f64) -> u64 {
    if v == 0.0 { 0 } else { v.to_bits() }
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    let a = if a == 0.0 { 0.0 } else { a };
    let b = if b == 0.0 { 0.0 } else { b };
    a.total_cmp(&b)
}

impl Ord for KeyPart {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Number(a), Self::Number(b)) => cmp_f64(*a, *b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (
                Self::Ordinal { rank: ra, label: la },
                Self::Ordinal { rank: rb, label: lb },
            ) => ra.cmp(rb).then_with(|| la.cmp(lb)),
            (Self::Time(a), Self::Time(b)) => a.cmp(b),
            (Self::Bin(a), Self::Bin(b)) => {
                cmp_f64(a.lower, b.lower).then_with(|| cmp_f64(a.upper, b.upper))
            }
            (Self::TimeUnit(a), Self::TimeUnit(b)) => a.cmp(b),
            _ => self.variant_rank().cmp(&other.variant_rank()),
        }
    }
}

impl PartialOrd for KeyPart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for KeyPart {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyPart {}

impl Hash for KeyPart {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.variant_rank().hash(state);
        match self {
            Self::Null => {}
            Self::Number(v) => normalized_bits(*v).hash(state),
            Self::Text(s) => s.hash(state),
            Self::Ordinal { rank, label } => {
                rank.hash(state);
                label.hash(state);
            }
            Self::Time(t) => t.hash(state),
            Self::Bin(b) => {
                normalized_bits(b.lower).hash(state);
                normalized_bits(b.upper).hash(state);
            }
            Self::TimeUnit(k) => k.hash(state),
        }
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Number(v) => write!(f, "{v}"),
            Self::Text(s) | Self::Ordinal { label: s, .. } => f.write_str(s),
            Self::Time(t) => write!(f, "{t}"),
            Self::Bin(b) => write!(f, "{b}"),
            Self::TimeUnit(k) => write!(f, "{k}"),
        }
    }
}

/// The tuple of discretized values identifying one group.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey(pub SmallVec<[KeyPart; 2]>);

impl GroupKey {
    /// Creates a key from its parts.
    pub fn new(parts: impl IntoIterator<Item = KeyPart>) -> Self {
        Self(parts.into_iter().collect())
    }
}

impl Deref for GroupKey {
    type Target = [KeyPart];

    fn deref(&self) -> &[KeyPart] {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use alloc::vec;
    use alloc::vec::Vec;

    use hashbrown::HashSet;

    use super::*;

    #[test]
    fn negative_zero_is_the_same_key() {
        let mut set = HashSet::new();
        set.insert(KeyPart::Number(0.0));
        assert!(set.contains(&KeyPart::Number(-0.0)));
        assert_eq!(KeyPart::Number(0.0), KeyPart::Number(-0.0));
    }

    #[test]
    fn bins_order_by_lower_bound_and_nulls_last() {
        let mut parts = vec![
            KeyPart::Null,
            KeyPart::Bin(BinRange { lower: 20.0, upper: 30.0 }),
            KeyPart::Bin(BinRange { lower: -10.0, upper: 0.0 }),
            KeyPart::Bin(BinRange { lower: 5.0, upper: 10.0 }),
        ];
        parts.sort();
        let lowers: Vec<_> = parts.iter().filter_map(KeyPart::as_bin).map(|b| b.lower).collect();
        assert_eq!(lowers, vec![-10.0, 5.0, 20.0]);
        assert!(parts[3].is_null());
    }

    #[test]
    fn ordinals_order_by_rank_not_label() {
        let low = KeyPart::Ordinal { rank: 0, label: Arc::from("low") };
        let high = KeyPart::Ordinal { rank: 1, label: Arc::from("high") };
        assert!(low < high);
    }

    #[test]
    fn display_joins_parts() {
        let key = GroupKey::new([KeyPart::Text(Arc::from("USA")), KeyPart::Number(1.5)]);
        assert_eq!(alloc::format!("{key}"), "USA, 1.5");
    }
}
