//! Combustion of wood for energy
//!
//! All the carbon of the burnt material is released. Combustion also produces CH4 and CO
//! which are reported as a carbon-equivalent adjustment, using the emission factors of
//! the combustion technology.

use hwpc_core::amounts::{Element, FloatValue};
use hwpc_core::carbon_unit::CarbonUnit;
use hwpc_core::errors::HwpcResult;
use hwpc_core::processor::{
    Emission, EmissionCategory, Flow, NonCo2Emissions, ProcessContext, Processor,
};
use hwpc_core::reference::{CombustionTechnology, EmissionFactors, GlobalWarmingPotential};
use serde::{Deserialize, Serialize};

/// Parameters for the combustion processor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombustionParameters {
    pub technology: CombustionTechnology,
}

/// Terminal processor burning its input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombustionProcessor {
    name: String,
    parameters: CombustionParameters,
}

impl CombustionProcessor {
    pub fn from_parameters(name: &str, parameters: CombustionParameters) -> Self {
        Self {
            name: name.to_string(),
            parameters,
        }
    }

    /// Emission from burning a unit
    ///
    /// Emission factors are expressed in kg per Mg of dry biomass.
    pub fn emission(
        &self,
        unit: &CarbonUnit,
        factors: &EmissionFactors,
        gwp: &GlobalWarmingPotential,
    ) -> Emission {
        let biomass: FloatValue = unit.amount(Element::Biomass);
        let mut emission = Emission::new(
            unit.date_index(),
            &self.name,
            EmissionCategory::Combustion(self.parameters.technology),
            unit.amounts().clone(),
        );
        emission.non_co2 = NonCo2Emissions {
            ch4: biomass * factors.ch4 / 1000.0,
            co: biomass * factors.co / 1000.0,
            voc: biomass * factors.voc / 1000.0,
        };
        emission.co2_eq_adjustment = factors.non_co2_adjustment(biomass, gwp);
        emission.heat = biomass * factors.heat;
        emission
    }
}

#[typetag::serde]
impl Processor for CombustionProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn do_process(
        &self,
        units: &[CarbonUnit],
        ctx: &mut ProcessContext,
    ) -> HwpcResult<Vec<Flow>> {
        if units.is_empty() {
            return Ok(vec![]);
        }
        let factors = ctx.reference.emission_factors(self.parameters.technology)?;
        let gwp = ctx.reference.gwp;
        Ok(units
            .iter()
            .map(|unit| Flow::Emission(self.emission(unit, factors, &gwp)))
            .collect())
    }
}
