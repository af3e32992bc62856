//! TOML description of a whole simulation.
//!
//! ```toml
//! [settings]
//! final_year = 2100
//! n_realizations = 100
//!
//! [species.spruce]
//! basic_density = 0.38
//! carbon_content = 0.5
//!
//! [[sensitivity]]
//! source = "ProductLifetime"
//! distribution = "Gaussian"
//! multiplier = 0.2
//!
//! [[harvests]]
//! sample_unit_id = "stand-1"
//! year = 2020
//! pieces = [{ line = "softwood", species = "spruce", volume = 120.0 }]
//!
//! [production]
//! # lines and processors, see `ProductionLineConfig`
//! ```

use crate::compartments::{CarbonCompartmentManager, SpeciesProperties, StandHarvest};
use crate::simulation::{Simulation, SimulationSettings};
use hwpc_core::errors::{HwpcError, HwpcResult};
use hwpc_core::production::ProductionLineConfig;
use hwpc_core::reference::ReferenceData;
use hwpc_core::sensitivity::{SensitivityEntry, SensitivitySettings};
use indexmap::IndexMap;
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct SimulationConfig {
    pub settings: SimulationSettings,
    pub species: IndexMap<String, SpeciesProperties>,
    pub sensitivity: SensitivitySettings,
    pub harvests: Vec<StandHarvest>,
    pub production: ProductionLineConfig,
    /// Reference tables replacing the built-in ones, relative to the configuration file
    pub reference: Option<PathBuf>,
}

/// Layout of the configuration file before the sensitivity entries are checked
#[derive(Deserialize)]
struct SimulationFile {
    settings: SimulationSettings,
    #[serde(default)]
    species: IndexMap<String, SpeciesProperties>,
    #[serde(default)]
    sensitivity: Vec<SensitivityEntry>,
    #[serde(default)]
    harvests: Vec<StandHarvest>,
    #[serde(default)]
    production: ProductionLineConfig,
    #[serde(default)]
    reference: Option<PathBuf>,
}

impl TryFrom<SimulationFile> for SimulationConfig {
    type Error = HwpcError;

    fn try_from(file: SimulationFile) -> Result<Self, Self::Error> {
        Ok(Self {
            settings: file.settings,
            species: file.species,
            sensitivity: SensitivitySettings::from_entries(file.sensitivity)?,
            harvests: file.harvests,
            production: file.production,
            reference: file.reference,
        })
    }
}

impl SimulationConfig {
    pub fn from_toml_str(content: &str) -> HwpcResult<Self> {
        let file: SimulationFile = toml::from_str(content)?;
        file.try_into()
    }

    /// Load a configuration file, resolving the reference tables next to it
    pub fn from_file<F: AsRef<Path>>(path: F) -> HwpcResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        if let (Some(reference), Some(parent)) = (config.reference.as_mut(), path.parent()) {
            if reference.is_relative() {
                *reference = parent.join(&*reference);
            }
        }
        Ok(config)
    }

    fn reference_data(&self) -> HwpcResult<ReferenceData> {
        match &self.reference {
            Some(path) => {
                debug!("Loading reference tables from {}", path.display());
                ReferenceData::from_file(path)
            }
            None => ReferenceData::builtin(),
        }
    }

    pub fn build(self) -> HwpcResult<Simulation> {
        let reference = self.reference_data()?;
        let production_lines = self.production.build()?;
        let compartments = CarbonCompartmentManager::new(
            production_lines,
            reference,
            self.species,
            self.sensitivity,
        );
        Simulation::new(compartments, self.harvests, self.settings)
    }
}
