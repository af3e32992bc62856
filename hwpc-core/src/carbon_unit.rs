//! Traceable parcels of harvested material.
//!
//! A [`CarbonUnit`] never changes its amounts once created. Processors transform material
//! by deriving new units from their inputs, which keeps a linear audit trail of every
//! amount flowing through the production lines. The only mutable part of a unit is its
//! status history, which is append-only.

use crate::amounts::{AmountMap, Element, FloatValue};
use crate::lifetime::{DecayFunction, ServiceLife};
use crate::reference::GlobalWarmingPotential;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Lifecycle flags a carbon unit may accumulate
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CarbonUnitStatus {
    /// Material travelling between processors
    InTransit,
    /// A product in service
    EndUseWoodProduct,
    /// Material lost during a transformation
    IndustrialLoss,
    /// Material that went through a recycling process
    Recycled,
    /// Material retired from service
    Disposed,
    /// Degradable fraction stored in a landfill
    LandfillDegradable,
    /// Fraction of landfilled material that never decays
    LandfillNonDegradable,
    /// Residues left to decay in the forest
    DeadWood,
}

/// Part of the tree the material comes from
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BiomassType {
    #[default]
    Wood,
    Bark,
}

/// Methane generation parameters of a landfill site
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MethaneParameters {
    /// Methane correction factor of the site
    /// unit: dimensionless
    pub methane_correction_factor: FloatValue,
    /// Fraction of CH4 in the generated landfill gas
    /// unit: dimensionless
    pub ch4_fraction: FloatValue,
}

impl MethaneParameters {
    /// Carbon-equivalent adjustment for the CH4 share of decomposed carbon
    ///
    /// Decomposed carbon is already accounted for as CO2, so only the additional warming
    /// of CH4 relative to CO2 is counted. The result is negative (an emission):
    ///
    /// $$ \Delta = -C \cdot MCF \cdot F \cdot (GWP_{CH4} - 1) $$
    pub fn adjustment(&self, carbon: FloatValue, gwp: &GlobalWarmingPotential) -> FloatValue {
        -carbon * self.methane_correction_factor * self.ch4_fraction * (gwp.ch4 - 1.0)
    }
}

/// Configuration of the processor that created a carbon unit
///
/// This determines how the unit evolves after its creation: whether it stays in use,
/// decays, or is eventually routed to another processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UnitFeature {
    /// Material forwarded from `processor` to a downstream processor
    Transit { processor: String },
    /// A wood product in service
    Product {
        processor: String,
        use_class: String,
        service_life: ServiceLife,
        /// Processor receiving the product once retired
        end_of_life: Option<String>,
    },
    IndustrialLoss { processor: String },
    LandfillDegradable {
        processor: String,
        decay: DecayFunction,
        methane: MethaneParameters,
    },
    LandfillNonDegradable { processor: String },
    DeadWood {
        processor: String,
        decay: DecayFunction,
    },
}

impl UnitFeature {
    /// Name of the processor that owns this configuration
    pub fn processor(&self) -> &str {
        match self {
            UnitFeature::Transit { processor }
            | UnitFeature::Product { processor, .. }
            | UnitFeature::IndustrialLoss { processor }
            | UnitFeature::LandfillDegradable { processor, .. }
            | UnitFeature::LandfillNonDegradable { processor }
            | UnitFeature::DeadWood { processor, .. } => processor,
        }
    }
}

/// A parcel of harvested material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarbonUnit {
    date_index: i32,
    sample_unit_id: String,
    feature: Arc<UnitFeature>,
    amounts: AmountMap,
    species: String,
    biomass_type: BiomassType,
    statuses: IndexSet<CarbonUnitStatus>,
    /// Most recently added status, which may already appear earlier in the history
    #[serde(default)]
    current: Option<CarbonUnitStatus>,
}

impl CarbonUnit {
    pub fn new(
        date_index: i32,
        sample_unit_id: &str,
        feature: Arc<UnitFeature>,
        amounts: AmountMap,
        species: &str,
        biomass_type: BiomassType,
        initial_status: Option<CarbonUnitStatus>,
    ) -> Self {
        Self {
            date_index,
            sample_unit_id: sample_unit_id.to_string(),
            feature,
            amounts,
            species: species.to_string(),
            biomass_type,
            statuses: initial_status.into_iter().collect(),
            current: initial_status,
        }
    }

    /// Create a new unit from this one, keeping its origin and status history
    ///
    /// `status` is appended to the inherited history if given.
    pub fn derive(
        &self,
        feature: Arc<UnitFeature>,
        amounts: AmountMap,
        status: Option<CarbonUnitStatus>,
    ) -> CarbonUnit {
        self.derive_at(self.date_index, feature, amounts, status)
    }

    /// Same as [`CarbonUnit::derive`] but dated at `date_index`
    pub fn derive_at(
        &self,
        date_index: i32,
        feature: Arc<UnitFeature>,
        amounts: AmountMap,
        status: Option<CarbonUnitStatus>,
    ) -> CarbonUnit {
        let mut unit = CarbonUnit {
            date_index,
            sample_unit_id: self.sample_unit_id.clone(),
            feature,
            amounts,
            species: self.species.clone(),
            biomass_type: self.biomass_type,
            statuses: self.statuses.clone(),
            current: self.current,
        };
        if let Some(status) = status {
            unit.add_status(status);
        }
        unit
    }

    /// Append a status to the history. Prior statuses are kept.
    ///
    /// A status already in the history keeps its first position but becomes the
    /// current one again.
    pub fn add_status(&mut self, status: CarbonUnitStatus) {
        self.statuses.insert(status);
        self.current = Some(status);
    }

    pub fn has_status(&self, status: CarbonUnitStatus) -> bool {
        self.statuses.contains(&status)
    }

    /// The most recently added status
    pub fn last_status(&self) -> Option<CarbonUnitStatus> {
        self.current
    }

    pub fn statuses(&self) -> impl Iterator<Item = CarbonUnitStatus> + '_ {
        self.statuses.iter().copied()
    }

    pub fn amounts(&self) -> &AmountMap {
        &self.amounts
    }

    pub fn amount(&self, element: Element) -> FloatValue {
        self.amounts.get(element)
    }

    pub fn date_index(&self) -> i32 {
        self.date_index
    }

    pub fn sample_unit_id(&self) -> &str {
        &self.sample_unit_id
    }

    pub fn feature(&self) -> &UnitFeature {
        &self.feature
    }

    pub fn species(&self) -> &str {
        &self.species
    }

    pub fn biomass_type(&self) -> BiomassType {
        self.biomass_type
    }
}

/// A list of carbon units sharing a status
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CarbonUnitList(Vec<CarbonUnit>);

impl CarbonUnitList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, unit: CarbonUnit) {
        self.0.push(unit)
    }

    /// Sum of the amounts of all units in the list
    pub fn total(&self) -> AmountMap {
        self.0.iter().map(|u| u.amounts()).sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CarbonUnit> {
        self.0.iter()
    }
}

impl IntoIterator for CarbonUnitList {
    type Item = CarbonUnit;
    type IntoIter = std::vec::IntoIter<CarbonUnit>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a CarbonUnitList {
    type Item = &'a CarbonUnit;
    type IntoIter = std::slice::Iter<'a, CarbonUnit>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Terminal carbon units grouped by their most recent status
pub type CarbonUnitMap = IndexMap<CarbonUnitStatus, CarbonUnitList>;
