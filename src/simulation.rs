//! Monte-Carlo simulation of harvested wood carbon.
//!
//! A [`Simulation`] runs the [`CarbonCompartmentManager`] once per Monte-Carlo realization.
//! Realizations are independent and are evaluated in parallel with rayon: every worker
//! owns its production-line manager and its draw cache, while draws are keyed by the
//! realization id so that the same realization always sees the same perturbations.

use crate::compartments::{
    CarbonCompartmentManager, CompartmentEvolution, CompartmentKey, StandHarvest,
};
use hwpc_core::amounts::{Element, FloatValue};
use hwpc_core::errors::{HwpcError, HwpcResult};
use hwpc_core::monte_carlo::{ConfidenceInterval, MonteCarloEstimate};
use hwpc_core::sensitivity::Realization;
use log::info;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

fn default_simulation_id() -> String {
    "simulation".to_string()
}

fn default_n_realizations() -> usize {
    1
}

fn default_confidence_level() -> FloatValue {
    0.95
}

/// Horizon and Monte-Carlo settings of a simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSettings {
    /// Identifier of the simulated subject, used to key the Monte-Carlo draws
    #[serde(default = "default_simulation_id")]
    pub simulation_id: String,
    /// First simulated year, the earliest harvest if not set
    #[serde(default)]
    pub first_year: Option<i32>,
    /// Last simulated year, inclusive
    pub final_year: i32,
    #[serde(default = "default_n_realizations")]
    pub n_realizations: usize,
    #[serde(default)]
    pub seed: u64,
    /// Probability of the reported confidence intervals
    #[serde(default = "default_confidence_level")]
    pub confidence_level: FloatValue,
}

impl SimulationSettings {
    pub fn new(final_year: i32) -> Self {
        Self {
            simulation_id: default_simulation_id(),
            first_year: None,
            final_year,
            n_realizations: default_n_realizations(),
            seed: 0,
            confidence_level: default_confidence_level(),
        }
    }
}

/// Harvests and the compartments they flow into
#[derive(Debug, Clone)]
pub struct Simulation {
    compartments: CarbonCompartmentManager,
    harvests: Vec<StandHarvest>,
    settings: SimulationSettings,
}

impl Simulation {
    pub fn new(
        compartments: CarbonCompartmentManager,
        harvests: Vec<StandHarvest>,
        settings: SimulationSettings,
    ) -> HwpcResult<Self> {
        if settings.n_realizations == 0 {
            return Err(HwpcError::Error(
                "A simulation needs at least one realization".to_string(),
            ));
        }
        if !(settings.confidence_level > 0.0 && settings.confidence_level < 1.0) {
            return Err(HwpcError::Error(format!(
                "Confidence level must be within (0, 1), got {}",
                settings.confidence_level
            )));
        }
        Ok(Self {
            compartments,
            harvests,
            settings,
        })
    }

    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    pub fn compartments(&self) -> &CarbonCompartmentManager {
        &self.compartments
    }

    pub fn harvests(&self) -> &[StandHarvest] {
        &self.harvests
    }

    /// Simulated years
    pub fn years(&self) -> RangeInclusive<i32> {
        let first_year = self
            .settings
            .first_year
            .or_else(|| self.harvests.iter().map(|h| h.year).min())
            .unwrap_or(self.settings.final_year);
        first_year..=self.settings.final_year
    }

    /// Run a single realization
    pub fn run(&self, realization_id: usize) -> HwpcResult<CompartmentEvolution> {
        let subject = Realization::new(&self.settings.simulation_id, realization_id);
        self.compartments
            .simulate(&self.harvests, self.years(), &subject, self.settings.seed)
    }

    /// Run every realization in parallel
    ///
    /// A deterministic simulation runs a single realization whatever the number requested.
    pub fn run_monte_carlo(&self) -> HwpcResult<MonteCarloRun> {
        let n_realizations = if self.compartments.sensitivity().is_stochastic() {
            self.settings.n_realizations
        } else {
            1
        };
        info!(
            "Running {} realization(s) of '{}' over {:?}",
            n_realizations,
            self.settings.simulation_id,
            self.years()
        );

        let evolutions = (0..n_realizations)
            .into_par_iter()
            .map(|realization_id| self.run(realization_id))
            .collect::<HwpcResult<Vec<_>>>()?;

        info!("Completed {} realization(s)", evolutions.len());
        Ok(MonteCarloRun {
            years: self.years().collect(),
            evolutions,
            confidence_level: self.settings.confidence_level,
        })
    }
}

/// The compartment evolutions of every realization of a simulation
#[derive(Debug, Clone)]
pub struct MonteCarloRun {
    years: Vec<i32>,
    evolutions: Vec<CompartmentEvolution>,
    confidence_level: FloatValue,
}

impl MonteCarloRun {
    pub fn years(&self) -> &[i32] {
        &self.years
    }

    pub fn evolutions(&self) -> &[CompartmentEvolution] {
        &self.evolutions
    }

    pub fn n_realizations(&self) -> usize {
        self.evolutions.len()
    }

    /// Realizations of one element of a compartment, one value per simulated year
    pub fn estimate(
        &self,
        key: &CompartmentKey,
        element: Element,
    ) -> HwpcResult<MonteCarloEstimate> {
        let mut estimate = MonteCarloEstimate::new();
        for evolution in &self.evolutions {
            estimate.add_realization(evolution.series(key, element))?;
        }
        Ok(estimate)
    }

    /// Mean and bounds of one element of a compartment at the configured confidence level
    pub fn confidence_interval(
        &self,
        key: &CompartmentKey,
        element: Element,
    ) -> HwpcResult<ConfidenceInterval> {
        self.estimate(key, element)?
            .confidence_interval(self.confidence_level)
    }
}
