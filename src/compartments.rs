//! Carbon stocks of harvested wood over time.
//!
//! The [`CarbonCompartmentManager`] drives a simulation year by year. Each year, the wood
//! harvested that year is sent down its production line, products reaching the end of their
//! service life are retired through the [`DisposalQueue`], and the stock of every
//! compartment is summarised into a [`CompartmentEvolution`].
//!
//! Stocks are evaluated from the creation date of each carbon unit, so a unit created in
//! year $d$ with amounts $A$ contributes $A \cdot S(t - d)$ to the in-use products of year
//! $t$ and $A \cdot R(t - d)$ to the landfill or the forest, where $S$ and $R$ are its
//! survival and decay curves.

use hwpc_core::amounts::{AmountMap, Element, FloatValue};
use hwpc_core::carbon_unit::{BiomassType, CarbonUnit, UnitFeature};
use hwpc_core::errors::{HwpcError, HwpcResult};
use hwpc_core::processor::{Emission, EmissionCategory, ProcessContext};
use hwpc_core::production::{DisposalQueue, ProductionLineManager, WoodOrigin};
use hwpc_core::reference::ReferenceData;
use hwpc_core::sensitivity::{
    DrawCache, MonteCarloSubject, SensitivityContext, SensitivitySettings, VariabilitySource,
};
use indexmap::IndexMap;
use log::{debug, warn};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;

/// Wood properties of a species
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeciesProperties {
    /// Dry mass per green volume
    /// unit: Mg / m^3
    pub basic_density: FloatValue,
    /// Share of carbon in dry biomass
    /// unit: dimensionless
    pub carbon_content: FloatValue,
}

/// A volume of wood sent to a production line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WoodPiece {
    pub line: String,
    pub species: String,
    #[serde(default)]
    pub biomass_type: BiomassType,
    /// unit: m^3
    pub volume: FloatValue,
}

/// The wood harvested in a stand in a given year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandHarvest {
    pub sample_unit_id: String,
    pub year: i32,
    pub pieces: Vec<WoodPiece>,
}

/// Compartments reported by the simulation
///
/// Emission compartments are cumulative since the start of the simulation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CompartmentKey {
    /// All end-use products in service
    InUse,
    /// End-use products in service for one use class
    UseClass(String),
    Landfill,
    LeftInForest,
    IndustrialLosses,
    /// Terminal material without a recognised fate
    Unrouted,
    CombustionEmissions,
    /// Decomposition in landfills and in the forest
    DecayEmissions,
    /// Retired products without an end-of-life processor
    DisposalEmissions,
    /// Additional warming of landfill methane, in carbon equivalent
    MethaneAdjustment,
    /// Additional warming of CH4 and CO from combustion, in carbon equivalent
    CombustionAdjustment,
}

impl CompartmentKey {
    /// Compartments that partition the harvested material
    ///
    /// Their sum equals everything harvested so far. Use classes are excluded as they
    /// break down [`CompartmentKey::InUse`], and adjustments are not material.
    pub const MASS: [CompartmentKey; 8] = [
        CompartmentKey::InUse,
        CompartmentKey::Landfill,
        CompartmentKey::LeftInForest,
        CompartmentKey::IndustrialLosses,
        CompartmentKey::Unrouted,
        CompartmentKey::CombustionEmissions,
        CompartmentKey::DecayEmissions,
        CompartmentKey::DisposalEmissions,
    ];
}

impl fmt::Display for CompartmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompartmentKey::UseClass(use_class) => write!(f, "InUse|{}", use_class),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Per-year, per-compartment amounts of a simulation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompartmentEvolution {
    stocks: BTreeMap<i32, BTreeMap<CompartmentKey, AmountMap>>,
    heat: BTreeMap<i32, FloatValue>,
    harvested: BTreeMap<i32, AmountMap>,
}

impl CompartmentEvolution {
    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.stocks.keys().copied()
    }

    /// Compartments of a year
    pub fn at(&self, year: i32) -> Option<&BTreeMap<CompartmentKey, AmountMap>> {
        self.stocks.get(&year)
    }

    /// Amounts of a compartment, empty if nothing was ever stored in it
    pub fn get(&self, year: i32, key: &CompartmentKey) -> AmountMap {
        self.stocks
            .get(&year)
            .and_then(|compartments| compartments.get(key))
            .cloned()
            .unwrap_or_default()
    }

    /// Time series of one element of a compartment over all years
    pub fn series(&self, key: &CompartmentKey, element: Element) -> Array1<FloatValue> {
        self.stocks
            .values()
            .map(|compartments| {
                compartments
                    .get(key)
                    .map(|amounts| amounts.get(element))
                    .unwrap_or(0.0)
            })
            .collect()
    }

    /// Heat produced by combustion during a year
    /// unit: MWh
    pub fn heat_production(&self, year: i32) -> FloatValue {
        self.heat.get(&year).copied().unwrap_or(0.0)
    }

    /// Material harvested up to and including `year`
    pub fn harvested(&self, year: i32) -> AmountMap {
        let mut total = AmountMap::new();
        for amounts in self.harvested.range(..=year).map(|(_, a)| a) {
            total += amounts;
        }
        total
    }

    /// Sum of the compartments that partition the harvested material
    pub fn accounted(&self, year: i32) -> AmountMap {
        let mut total = AmountMap::new();
        for key in CompartmentKey::MASS.iter() {
            total += &self.get(year, key);
        }
        total
    }
}

/// Aggregates the carbon stocks of a set of harvests over time
#[derive(Debug, Clone)]
pub struct CarbonCompartmentManager {
    production_lines: ProductionLineManager,
    reference: ReferenceData,
    species: IndexMap<String, SpeciesProperties>,
    sensitivity: SensitivitySettings,
}

impl CarbonCompartmentManager {
    pub fn new(
        production_lines: ProductionLineManager,
        reference: ReferenceData,
        species: IndexMap<String, SpeciesProperties>,
        sensitivity: SensitivitySettings,
    ) -> Self {
        Self {
            production_lines,
            reference,
            species,
            sensitivity,
        }
    }

    pub fn production_lines(&self) -> &ProductionLineManager {
        &self.production_lines
    }

    pub fn sensitivity(&self) -> &SensitivitySettings {
        &self.sensitivity
    }

    /// Volume, biomass and carbon of a piece of wood
    ///
    /// Basic density and carbon content are perturbed per species.
    pub fn wood_amounts(
        &self,
        piece: &WoodPiece,
        ctx: &mut ProcessContext,
    ) -> HwpcResult<AmountMap> {
        let properties = self
            .species
            .get(&piece.species)
            .ok_or_else(|| HwpcError::UnknownSpecies(piece.species.clone()))?;

        let density = properties.basic_density
            * ctx.modifier(VariabilitySource::BasicDensity, Some(&piece.species));
        let mut carbon_content = properties.carbon_content
            * ctx.modifier(VariabilitySource::CarbonContent, Some(&piece.species));
        if carbon_content > 1.0 {
            warn!(
                "Perturbed carbon content {} of '{}' exceeds 1, clamping",
                carbon_content, piece.species
            );
            carbon_content = 1.0;
        }

        let volume = piece.volume.max(0.0);
        let biomass = volume * density;
        Ok(AmountMap::new()
            .with(Element::Volume, volume)
            .with(Element::Biomass, biomass)
            .with(Element::Carbon, biomass * carbon_content))
    }

    /// Simulate the fate of `harvests` over `years` for one realization
    ///
    /// Harvests outside of `years` are ignored. Draws are seeded from `seed` and the
    /// realization of `subject`.
    pub fn simulate(
        &self,
        harvests: &[StandHarvest],
        years: RangeInclusive<i32>,
        subject: &dyn MonteCarloSubject,
        seed: u64,
    ) -> HwpcResult<CompartmentEvolution> {
        let mut production_lines = self.production_lines.clone();
        production_lines.reset_carbon_unit_map();
        let mut cache = DrawCache::new(seed);
        let mut ctx = ProcessContext::new(
            &self.reference,
            SensitivityContext::new(&self.sensitivity, &mut cache, subject),
        );

        let mut by_year: BTreeMap<i32, Vec<&StandHarvest>> = BTreeMap::new();
        for harvest in harvests {
            if years.contains(&harvest.year) {
                by_year.entry(harvest.year).or_default().push(harvest);
            } else {
                warn!(
                    "Ignoring harvest of '{}' in {} outside of the simulated years",
                    harvest.sample_unit_id, harvest.year
                );
            }
        }

        let mut queue = DisposalQueue::new();
        let mut units: Vec<CarbonUnit> = vec![];
        let mut emissions: Vec<Emission> = vec![];
        let mut evolution = CompartmentEvolution::default();

        for year in years {
            let mut harvested = AmountMap::new();
            for harvest in by_year.get(&year).into_iter().flatten() {
                for piece in &harvest.pieces {
                    let amounts = self.wood_amounts(piece, &mut ctx)?;
                    harvested += &amounts;
                    let origin = WoodOrigin::new(
                        &harvest.sample_unit_id,
                        &piece.species,
                        piece.biomass_type,
                    );
                    production_lines.process_wood_piece(
                        &piece.line,
                        year,
                        &amounts,
                        &origin,
                        &mut ctx,
                    )?;
                }
            }
            evolution.harvested.insert(year, harvested);

            let retirements = queue.pop_due(year);
            if !retirements.is_empty() {
                debug!("{} product slice(s) retired in {}", retirements.len(), year);
            }
            for retirement in retirements {
                match &retirement.end_of_life {
                    Some(processor) => {
                        production_lines.process_units(processor, vec![retirement.unit], &mut ctx)?
                    }
                    None => emissions.push(Emission::new(
                        retirement.year,
                        retirement.unit.feature().processor(),
                        EmissionCategory::ProductDisposal,
                        retirement.unit.amounts().clone(),
                    )),
                }
            }

            let results = production_lines.take_results();
            for (_, list) in results.carbon_units {
                for unit in list {
                    queue.schedule(&unit);
                    units.push(unit);
                }
            }
            emissions.extend(results.emissions);

            let (stocks, heat) = self.summarise(year, &units, &emissions);
            evolution.stocks.insert(year, stocks);
            evolution.heat.insert(year, heat);
        }
        Ok(evolution)
    }

    /// Compartments and heat production of `year`
    fn summarise(
        &self,
        year: i32,
        units: &[CarbonUnit],
        emissions: &[Emission],
    ) -> (BTreeMap<CompartmentKey, AmountMap>, FloatValue) {
        let mut stocks: BTreeMap<CompartmentKey, AmountMap> = BTreeMap::new();
        let mut add = |key: CompartmentKey, amounts: &AmountMap| {
            *stocks.entry(key).or_default() += amounts;
        };

        for unit in units {
            let age = year - unit.date_index();
            let amounts = unit.amounts();
            match unit.feature() {
                UnitFeature::Product {
                    use_class,
                    service_life,
                    ..
                } => {
                    let in_use = amounts.scalar_multiply(service_life.effective_survival(age));
                    add(CompartmentKey::UseClass(use_class.clone()), &in_use);
                    add(CompartmentKey::InUse, &in_use);
                }
                UnitFeature::LandfillDegradable { decay, methane, .. } => {
                    let remaining = decay.remaining(age);
                    let decayed = amounts.scalar_multiply(1.0 - remaining);
                    add(CompartmentKey::Landfill, &amounts.scalar_multiply(remaining));
                    add(
                        CompartmentKey::MethaneAdjustment,
                        &AmountMap::new().with(
                            Element::Carbon,
                            methane.adjustment(decayed.get(Element::Carbon), &self.reference.gwp),
                        ),
                    );
                    add(CompartmentKey::DecayEmissions, &decayed);
                }
                UnitFeature::LandfillNonDegradable { .. } => add(CompartmentKey::Landfill, amounts),
                UnitFeature::DeadWood { decay, .. } => {
                    let remaining = decay.remaining(age);
                    add(CompartmentKey::LeftInForest, &amounts.scalar_multiply(remaining));
                    add(
                        CompartmentKey::DecayEmissions,
                        &amounts.scalar_multiply(1.0 - remaining),
                    );
                }
                UnitFeature::IndustrialLoss { .. } => {
                    add(CompartmentKey::IndustrialLosses, amounts)
                }
                UnitFeature::Transit { .. } => add(CompartmentKey::Unrouted, amounts),
            }
        }

        let mut heat = 0.0;
        for emission in emissions.iter().filter(|e| e.date_index <= year) {
            match emission.category {
                EmissionCategory::Combustion(_) => {
                    add(CompartmentKey::CombustionEmissions, &emission.amounts);
                    add(
                        CompartmentKey::CombustionAdjustment,
                        &AmountMap::new().with(Element::Carbon, emission.co2_eq_adjustment),
                    );
                }
                EmissionCategory::ProductDisposal => {
                    add(CompartmentKey::DisposalEmissions, &emission.amounts)
                }
            }
            if emission.date_index == year {
                heat += emission.heat;
            }
        }
        (stocks, heat)
    }
}
