//! Reference tables consumed by the processors.
//!
//! These are loaded once before a simulation starts. A failure to load them is reported
//! to the caller so that a simulation never runs with stale or zeroed factors.

use crate::amounts::FloatValue;
use crate::errors::{HwpcError, HwpcResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

const DEFAULT_REFERENCE: &str = include_str!("../data/reference.toml");

/// Mass ratio of CO2 to carbon
pub const CO2_TO_CARBON: FloatValue = 12.0 / 44.0;

/// Global warming potentials used to express non-CO2 gases as CO2 equivalents
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlobalWarmingPotential {
    pub ch4: FloatValue,
    pub co: FloatValue,
}

impl Default for GlobalWarmingPotential {
    fn default() -> Self {
        Self { ch4: 25.0, co: 1.9 }
    }
}

/// Combustion technologies with tabulated emission factors
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombustionTechnology {
    ResidentialFireplace,
    WoodStove,
    PelletStove,
    IndustrialBoiler,
    CombinedHeatPower,
}

/// One row of the combustion emission factor table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmissionFactors {
    pub technology: CombustionTechnology,
    /// unit: kg / Mg dry biomass
    pub co2: FloatValue,
    /// unit: kg / Mg dry biomass
    pub ch4: FloatValue,
    /// unit: kg / Mg dry biomass
    pub co: FloatValue,
    /// unit: kg / Mg dry biomass
    pub voc: FloatValue,
    /// unit: MWh / Mg dry biomass
    pub heat: FloatValue,
}

impl EmissionFactors {
    /// Non-CO2 emissions from burning `biomass` Mg of dry matter, expressed as a (negative)
    /// carbon-equivalent contribution
    pub fn non_co2_adjustment(
        &self,
        biomass: FloatValue,
        gwp: &GlobalWarmingPotential,
    ) -> FloatValue {
        let co2_eq = biomass * (self.ch4 * gwp.ch4 + self.co * gwp.co) / 1000.0;
        -co2_eq * CO2_TO_CARBON
    }
}

#[derive(Debug, Deserialize)]
struct ReferenceFile {
    global_warming_potential: GlobalWarmingPotential,
    combustion: Vec<EmissionFactors>,
}

/// Reference values shared by every processor of a simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceData {
    pub gwp: GlobalWarmingPotential,
    combustion: HashMap<CombustionTechnology, EmissionFactors>,
}

impl ReferenceData {
    /// Built-in reference values
    pub fn builtin() -> HwpcResult<Self> {
        Self::from_toml_str(DEFAULT_REFERENCE)
    }

    pub fn from_toml_str(content: &str) -> HwpcResult<Self> {
        let file: ReferenceFile = toml::from_str(content)?;
        let mut combustion = HashMap::new();
        for row in file.combustion {
            if [row.co2, row.ch4, row.co, row.voc, row.heat]
                .iter()
                .any(|v| !v.is_finite() || *v < 0.0)
            {
                return Err(HwpcError::ReferenceTable(format!(
                    "emission factors for {:?} must be finite and non-negative",
                    row.technology
                )));
            }
            if combustion.insert(row.technology, row).is_some() {
                return Err(HwpcError::ReferenceTable(format!(
                    "technology {:?} is listed more than once",
                    row.technology
                )));
            }
        }
        Ok(Self {
            gwp: file.global_warming_potential,
            combustion,
        })
    }

    /// Load reference values from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> HwpcResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Emission factors of a combustion technology
    pub fn emission_factors(
        &self,
        technology: CombustionTechnology,
    ) -> HwpcResult<&EmissionFactors> {
        self.combustion.get(&technology).ok_or_else(|| {
            HwpcError::ReferenceTable(format!(
                "no emission factors for technology {:?}",
                technology
            ))
        })
    }
}
