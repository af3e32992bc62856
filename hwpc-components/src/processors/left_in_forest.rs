//! Residues left in the forest
//!
//! Harvest residues and non-merchantable wood stay on site as dead wood and decompose
//! with a half-life. Decomposed carbon is emitted as it decays.

use hwpc_core::amounts::FloatValue;
use hwpc_core::carbon_unit::{CarbonUnit, CarbonUnitStatus, UnitFeature};
use hwpc_core::errors::{HwpcError, HwpcResult};
use hwpc_core::lifetime::DecayFunction;
use hwpc_core::processor::{Flow, ProcessContext, Processor};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Parameters for the left-in-forest processor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeftInForestParameters {
    /// Half-life of dead wood
    /// unit: yr
    pub half_life: FloatValue,
}

/// Terminal processor leaving material to decay in the forest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeftInForestProcessor {
    name: String,
    parameters: LeftInForestParameters,
}

impl LeftInForestProcessor {
    pub fn from_parameters(name: &str, parameters: LeftInForestParameters) -> Self {
        Self {
            name: name.to_string(),
            parameters,
        }
    }
}

#[typetag::serde]
impl Processor for LeftInForestProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> HwpcResult<()> {
        if self.parameters.half_life <= 0.0 || self.parameters.half_life.is_nan() {
            return Err(HwpcError::InvalidProcessor {
                processor: self.name.clone(),
                reason: format!(
                    "half-life must be positive, got {}",
                    self.parameters.half_life
                ),
            });
        }
        Ok(())
    }

    fn do_process(
        &self,
        units: &[CarbonUnit],
        _ctx: &mut ProcessContext,
    ) -> HwpcResult<Vec<Flow>> {
        let feature = Arc::new(UnitFeature::DeadWood {
            processor: self.name.clone(),
            decay: DecayFunction::new(self.parameters.half_life),
        });
        Ok(units
            .iter()
            .map(|unit| {
                Flow::Terminal(unit.derive(
                    feature.clone(),
                    unit.amounts().clone(),
                    Some(CarbonUnitStatus::DeadWood),
                ))
            })
            .collect())
    }
}
