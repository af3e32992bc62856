//! Landfill site
//!
//! Landfilled material is split into a degradable fraction decaying with a half-life and
//! a non-degradable fraction that stays in the landfill indefinitely. The decay itself is
//! accounted for over time by the compartments; part of the decomposed carbon is released
//! as methane, which warms more than the CO2 it would otherwise have been.

use hwpc_core::amounts::FloatValue;
use hwpc_core::carbon_unit::{CarbonUnit, CarbonUnitStatus, MethaneParameters, UnitFeature};
use hwpc_core::errors::{HwpcError, HwpcResult};
use hwpc_core::lifetime::DecayFunction;
use hwpc_core::processor::{validate_factor, Flow, ProcessContext, Processor};
use hwpc_core::reference::GlobalWarmingPotential;
use hwpc_core::sensitivity::VariabilitySource;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Parameters for the landfill processor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandfillParameters {
    /// Share of the landfilled material that decomposes
    /// unit: dimensionless
    pub degradable_fraction: FloatValue,
    /// Half-life of the degradable fraction
    /// unit: yr
    pub half_life: FloatValue,
    /// Methane correction factor of the site, 1.0 for a managed anaerobic site
    /// unit: dimensionless
    pub methane_correction_factor: FloatValue,
    /// Fraction of CH4 in the landfill gas
    /// unit: dimensionless
    #[serde(default = "default_ch4_fraction")]
    pub ch4_fraction: FloatValue,
}

fn default_ch4_fraction() -> FloatValue {
    0.5
}

/// Terminal processor storing material in a landfill
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandfillProcessor {
    name: String,
    parameters: LandfillParameters,
}

impl LandfillProcessor {
    pub fn from_parameters(name: &str, parameters: LandfillParameters) -> Self {
        Self {
            name: name.to_string(),
            parameters,
        }
    }

    fn methane(&self) -> MethaneParameters {
        MethaneParameters {
            methane_correction_factor: self.parameters.methane_correction_factor,
            ch4_fraction: self.parameters.ch4_fraction,
        }
    }

    /// Carbon-equivalent adjustment for `carbon` Mg of decomposed carbon
    ///
    /// $$ \Delta = -C \cdot MCF \cdot F \cdot (GWP_{CH4} - 1) $$
    pub fn methane_adjustment(
        &self,
        carbon: FloatValue,
        gwp: &GlobalWarmingPotential,
    ) -> FloatValue {
        self.methane().adjustment(carbon, gwp)
    }
}

#[typetag::serde]
impl Processor for LandfillProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> HwpcResult<()> {
        validate_factor(
            &self.name,
            "degradable_fraction",
            self.parameters.degradable_fraction,
        )?;
        validate_factor(
            &self.name,
            "methane_correction_factor",
            self.parameters.methane_correction_factor,
        )?;
        validate_factor(&self.name, "ch4_fraction", self.parameters.ch4_fraction)?;
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
        ctx: &mut ProcessContext,
    ) -> HwpcResult<Vec<Flow>> {
        if units.is_empty() {
            return Ok(vec![]);
        }

        let half_life = self.parameters.half_life
            * ctx.modifier(VariabilitySource::LandfillHalfLife, Some(&self.name));
        let degradable = Arc::new(UnitFeature::LandfillDegradable {
            processor: self.name.clone(),
            decay: DecayFunction::new(half_life),
            methane: self.methane(),
        });
        let non_degradable = Arc::new(UnitFeature::LandfillNonDegradable {
            processor: self.name.clone(),
        });

        let fraction = self.parameters.degradable_fraction;
        Ok(units
            .iter()
            .flat_map(|unit| {
                [
                    Flow::Terminal(unit.derive(
                        degradable.clone(),
                        unit.amounts().scalar_multiply(fraction),
                        Some(CarbonUnitStatus::LandfillDegradable),
                    )),
                    Flow::Terminal(unit.derive(
                        non_degradable.clone(),
                        unit.amounts().scalar_multiply(1.0 - fraction),
                        Some(CarbonUnitStatus::LandfillNonDegradable),
                    )),
                ]
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_parameters() -> LandfillParameters {
        LandfillParameters {
            degradable_fraction: 0.23,
            half_life: 14.0,
            methane_correction_factor: 0.5,
            ch4_fraction: 0.5,
        }
    }

    #[test]
    fn methane_adjustment_closed_form() {
        let landfill = LandfillProcessor::from_parameters("landfill", default_parameters());
        let gwp = GlobalWarmingPotential { ch4: 25.0, co: 1.9 };
        let adjustment = landfill.methane_adjustment(10.0, &gwp);
        assert_eq!(adjustment, -10.0 * 0.5 * 0.5 * (25.0 - 1.0));
        assert_eq!(adjustment, -60.0);
    }

    #[test]
    fn ch4_fraction_defaults_to_half() {
        let parameters: LandfillParameters = toml::from_str(
            r#"
            degradable_fraction = 0.23
            half_life = 14.0
            methane_correction_factor = 1.0
            "#,
        )
        .unwrap();
        assert_eq!(parameters.ch4_fraction, 0.5);
    }

    #[test]
    fn invalid_half_life() {
        let mut parameters = default_parameters();
        parameters.half_life = 0.0;
        let landfill = LandfillProcessor::from_parameters("landfill", parameters);
        assert!(matches!(
            landfill.validate(),
            Err(HwpcError::InvalidProcessor { .. })
        ));
    }
}
