//! Quantity-keyed ledgers of material.
//!
//! An [`AmountMap`] records how much of each tracked [`Element`] a parcel of wood holds.
//! Absent elements behave as the additive identity so maps with different key sets can
//! be combined freely.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, AddAssign, Mul};

/// Floating point type used for all amounts
pub type FloatValue = f64;

/// Quantities tracked through the production lines
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Element {
    /// Solid wood volume
    /// unit: m^3
    Volume,
    /// Dry biomass
    /// unit: Mg
    Biomass,
    /// Carbon mass
    /// unit: Mg C
    Carbon,
}

impl Element {
    pub const ALL: [Element; 3] = [Element::Volume, Element::Biomass, Element::Carbon];

    pub fn unit(&self) -> &'static str {
        match self {
            Element::Volume => "m^3",
            Element::Biomass => "Mg",
            Element::Carbon => "Mg C",
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A mapping from tracked elements to amounts.
///
/// Amounts may temporarily become negative when differencing maps, but physical
/// quantities at rest should be non-negative; see [`AmountMap::clamped`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AmountMap {
    values: BTreeMap<Element, FloatValue>,
}

impl AmountMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from `(element, amount)` pairs
    pub fn from_pairs<I: IntoIterator<Item = (Element, FloatValue)>>(pairs: I) -> Self {
        Self {
            values: pairs.into_iter().collect(),
        }
    }

    /// Amount of an element, 0.0 if the element is not tracked by this map
    pub fn get(&self, element: Element) -> FloatValue {
        self.values.get(&element).copied().unwrap_or(0.0)
    }

    pub fn put(&mut self, element: Element, value: FloatValue) {
        self.values.insert(element, value);
    }

    /// Builder-style variant of [`AmountMap::put`]
    pub fn with(mut self, element: Element, value: FloatValue) -> Self {
        self.put(element, value);
        self
    }

    /// Sum of two maps over the union of their keys
    pub fn add(&self, other: &AmountMap) -> AmountMap {
        let mut merged = self.clone();
        merged.merge(other);
        merged
    }

    /// Accumulate another map into this one
    pub fn merge(&mut self, other: &AmountMap) {
        for (element, value) in other.values.iter() {
            *self.values.entry(*element).or_insert(0.0) += value;
        }
    }

    /// A new map with every amount multiplied by `factor`
    pub fn scalar_multiply(&self, factor: FloatValue) -> AmountMap {
        AmountMap {
            values: self
                .values
                .iter()
                .map(|(element, value)| (*element, value * factor))
                .collect(),
        }
    }

    /// A new map where negative amounts are replaced by zero
    pub fn clamped(&self) -> AmountMap {
        AmountMap {
            values: self
                .values
                .iter()
                .map(|(element, value)| (*element, value.max(0.0)))
                .collect(),
        }
    }

    /// True if every tracked amount is zero
    pub fn is_zero(&self) -> bool {
        self.values.values().all(|v| *v == 0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Element, FloatValue)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }

    pub fn elements(&self) -> impl Iterator<Item = Element> + '_ {
        self.values.keys().copied()
    }
}

impl Add for &AmountMap {
    type Output = AmountMap;

    fn add(self, rhs: Self) -> AmountMap {
        AmountMap::add(self, rhs)
    }
}

impl AddAssign<&AmountMap> for AmountMap {
    fn add_assign(&mut self, rhs: &AmountMap) {
        self.merge(rhs)
    }
}

impl Mul<FloatValue> for &AmountMap {
    type Output = AmountMap;

    fn mul(self, rhs: FloatValue) -> AmountMap {
        self.scalar_multiply(rhs)
    }
}

impl<'a> std::iter::Sum<&'a AmountMap> for AmountMap {
    fn sum<I: Iterator<Item = &'a AmountMap>>(iter: I) -> Self {
        iter.fold(AmountMap::new(), |mut acc, x| {
            acc.merge(x);
            acc
        })
    }
}
