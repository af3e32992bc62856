//! Service-life and decay curves.
//!
//! Wood products leave service following a [`ServiceLife`] survival curve, while material
//! stored in landfills or left in the forest decays following a [`DecayFunction`].
//! Both are evaluated on integer ages (years since the carbon unit was created).

use crate::amounts::FloatValue;
use serde::{Deserialize, Serialize};

/// Survival fractions below this threshold retire the whole remainder of a product
pub const SURVIVAL_THRESHOLD: FloatValue = 1e-4;

/// Distribution of the service life of an end-use wood product.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ServiceLife {
    /// The product stays in use indefinitely
    Permanent,
    /// Exponential survival with the given mean lifetime
    ///
    /// $$ S(a) = e^{-a / \bar{L}} $$
    Exponential { average_lifetime: FloatValue },
    /// The whole product is retired once it reaches the given age
    Fixed { lifetime: FloatValue },
}

impl ServiceLife {
    /// Raw survival fraction at `age`
    pub fn survival(&self, age: i32) -> FloatValue {
        if age <= 0 {
            return 1.0;
        }
        match self {
            ServiceLife::Permanent => 1.0,
            ServiceLife::Exponential { average_lifetime } => {
                (-(age as FloatValue) / average_lifetime).exp()
            }
            ServiceLife::Fixed { lifetime } => {
                if (age as FloatValue) < *lifetime {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Survival fraction after truncation at [`SURVIVAL_THRESHOLD`]
    ///
    /// This is the curve used both for in-use stocks and for retirements so that the two
    /// always sum to the amount of the original product.
    pub fn effective_survival(&self, age: i32) -> FloatValue {
        let s = self.survival(age);
        if s < SURVIVAL_THRESHOLD {
            0.0
        } else {
            s
        }
    }

    /// The next age strictly after `age` at which part of the product retires
    pub fn next_retirement_age(&self, age: i32) -> Option<i32> {
        if self.effective_survival(age) <= 0.0 {
            return None;
        }
        match self {
            ServiceLife::Permanent => None,
            ServiceLife::Exponential { .. } => Some(age + 1),
            ServiceLife::Fixed { lifetime } => {
                let retirement = lifetime.ceil().max(1.0) as i32;
                (retirement > age).then_some(retirement)
            }
        }
    }

    /// Fraction of the original product retired between `from_age` and `to_age`
    pub fn retired_fraction(&self, from_age: i32, to_age: i32) -> FloatValue {
        (self.effective_survival(from_age) - self.effective_survival(to_age)).max(0.0)
    }

    /// A copy of this curve with its lifetime multiplied by `factor`
    pub fn scaled(&self, factor: FloatValue) -> Self {
        match self {
            ServiceLife::Permanent => ServiceLife::Permanent,
            ServiceLife::Exponential { average_lifetime } => ServiceLife::Exponential {
                average_lifetime: average_lifetime * factor,
            },
            ServiceLife::Fixed { lifetime } => ServiceLife::Fixed {
                lifetime: lifetime * factor,
            },
        }
    }

    pub fn is_valid(&self) -> bool {
        match self {
            ServiceLife::Permanent => true,
            ServiceLife::Exponential { average_lifetime } => *average_lifetime > 0.0,
            ServiceLife::Fixed { lifetime } => *lifetime > 0.0,
        }
    }
}

impl Default for ServiceLife {
    fn default() -> Self {
        ServiceLife::Permanent
    }
}

/// First-order decay of degradable material
///
/// $$ R(a) = 2^{-a / t_{1/2}} $$
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayFunction {
    /// unit: yr
    pub half_life: FloatValue,
}

impl DecayFunction {
    pub fn new(half_life: FloatValue) -> Self {
        Self { half_life }
    }

    /// Fraction of the original material remaining at `age`
    pub fn remaining(&self, age: i32) -> FloatValue {
        if age <= 0 {
            return 1.0;
        }
        (-(2.0_f64.ln()) * age as FloatValue / self.half_life).exp()
    }
}
