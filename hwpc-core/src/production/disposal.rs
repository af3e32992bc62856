//! Deferred retirement of wood products.
//!
//! A product leaves service gradually following its
//! [`ServiceLife`](crate::lifetime::ServiceLife). Instead of following
//! end-of-life links at processing time, each product is scheduled here and a slice of it
//! is retired every time the simulation clock reaches one of its retirement ages.

use crate::carbon_unit::{CarbonUnit, CarbonUnitStatus, UnitFeature};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

/// The next retirement of a product
#[derive(Debug, Clone)]
pub struct PendingDisposal {
    /// Calendar year of the retirement
    pub year: i32,
    pub unit: Arc<CarbonUnit>,
    /// Age of the product at its previous retirement
    pub previous_age: i32,
    pub age: i32,
    sequence: u64,
}

impl PartialEq for PendingDisposal {
    fn eq(&self, other: &Self) -> bool {
        self.year == other.year && self.sequence == other.sequence
    }
}

impl Eq for PendingDisposal {}

impl Ord for PendingDisposal {
    // Reversed so that the earliest year is at the top of the heap, ties broken by
    // scheduling order
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .year
            .cmp(&self.year)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for PendingDisposal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A slice of a product retired from service
#[derive(Debug, Clone, PartialEq)]
pub struct Retirement {
    pub year: i32,
    /// Processor receiving the retired material, if any
    pub end_of_life: Option<String>,
    /// Retired material, with the `Disposed` status appended
    pub unit: CarbonUnit,
}

/// Priority queue of pending product retirements ordered by year
#[derive(Debug, Clone, Default)]
pub struct DisposalQueue {
    heap: BinaryHeap<PendingDisposal>,
    sequence: u64,
}

impl DisposalQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, unit: Arc<CarbonUnit>, previous_age: i32, age: i32) {
        self.sequence += 1;
        self.heap.push(PendingDisposal {
            year: unit.date_index() + age,
            unit,
            previous_age,
            age,
            sequence: self.sequence,
        });
    }

    /// Schedule the first retirement of a product
    ///
    /// Returns false if the unit is not a product or never retires.
    pub fn schedule(&mut self, unit: &CarbonUnit) -> bool {
        let service_life = match unit.feature() {
            UnitFeature::Product { service_life, .. } => *service_life,
            _ => return false,
        };
        match service_life.next_retirement_age(0) {
            Some(age) => {
                self.push(Arc::new(unit.clone()), 0, age);
                true
            }
            None => false,
        }
    }

    /// Year of the earliest pending retirement
    pub fn next_year(&self) -> Option<i32> {
        self.heap.peek().map(|p| p.year)
    }

    /// Retire every slice due on or before `year`
    ///
    /// Products that still have material in service are rescheduled for their next
    /// retirement age.
    pub fn pop_due(&mut self, year: i32) -> Vec<Retirement> {
        let mut retirements = vec![];
        while self.heap.peek().map_or(false, |p| p.year <= year) {
            let Some(pending) = self.heap.pop() else {
                break;
            };
            let (service_life, end_of_life, processor) = match pending.unit.feature() {
                UnitFeature::Product {
                    service_life,
                    end_of_life,
                    processor,
                    ..
                } => (*service_life, end_of_life.clone(), processor.clone()),
                _ => continue,
            };

            let fraction = service_life.retired_fraction(pending.previous_age, pending.age);
            if fraction > 0.0 {
                let unit = pending.unit.derive_at(
                    pending.year,
                    Arc::new(UnitFeature::Transit { processor }),
                    pending.unit.amounts().scalar_multiply(fraction),
                    Some(CarbonUnitStatus::Disposed),
                );
                retirements.push(Retirement {
                    year: pending.year,
                    end_of_life,
                    unit,
                });
            }

            if let Some(next) = service_life.next_retirement_age(pending.age) {
                self.push(pending.unit, pending.age, next);
            }
        }
        retirements
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
