//! Post-harvest carbon accounting for harvested wood products.
//!
//! Harvested wood is routed through production lines of processors (see
//! [`hwpc_core::production`] and [`hwpc_components::processors`]) and the resulting carbon
//! units are summarised per year into carbon compartments. Uncertain parameters may be
//! perturbed across Monte-Carlo realizations to estimate confidence intervals.

pub mod compartments;
pub mod config;
pub mod simulation;

pub use compartments::{
    CarbonCompartmentManager, CompartmentEvolution, CompartmentKey, SpeciesProperties,
    StandHarvest, WoodPiece,
};
pub use config::SimulationConfig;
pub use hwpc_components::processors;
pub use hwpc_core::errors::{HwpcError, HwpcResult};
pub use simulation::{MonteCarloRun, Simulation, SimulationSettings};
