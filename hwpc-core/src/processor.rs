//! Nodes of the production-line graph.
//!
//! A [`Processor`] consumes a list of carbon units and returns the resulting [`Flow`]s.
//! Processors only describe local transformations: where forwarded material goes next is
//! resolved by the [`ProductionLineManager`](crate::production::ProductionLineManager).
//!
//! Every flow returned by a processor must account for its inputs:
//!
//! $$ \sum \text{inputs} = \sum \text{forwarded} + \sum \text{terminal} + \sum \text{emitted} $$
//!
//! for every tracked element. Material can only leave the tracked system through an
//! [`Emission`] with a named [`EmissionCategory`].

use crate::amounts::{AmountMap, FloatValue};
use crate::carbon_unit::CarbonUnit;
use crate::errors::{HwpcError, HwpcResult};
use crate::reference::{CombustionTechnology, ReferenceData};
use crate::sensitivity::{SensitivityContext, VariabilitySource};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Kind of link between two processors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LinkKind {
    /// Further transformation of the main stream
    Continuation,
    /// Side-stream diverting a proportion of the surviving material
    Extraction { proportion: FloatValue },
    /// Deferred routing of a product once its service life is over
    EndOfLife,
}

impl LinkKind {
    /// True if material follows this link at processing time
    pub fn is_immediate(&self) -> bool {
        !matches!(self, LinkKind::EndOfLife)
    }
}

/// An outgoing link of a processor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorLink {
    pub target: String,
    pub kind: LinkKind,
}

impl ProcessorLink {
    pub fn new(target: &str, kind: LinkKind) -> Self {
        Self {
            target: target.to_string(),
            kind,
        }
    }
}

/// Categories through which material leaves the tracked system at once
///
/// Decomposition in landfills and in the forest is gradual and follows the decay curve
/// attached to the stored unit instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmissionCategory {
    /// Burning of biomass
    Combustion(CombustionTechnology),
    /// Retired products without an end-of-life processor
    ProductDisposal,
}

/// Non-CO2 gases released along with an emission
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NonCo2Emissions {
    /// unit: Mg
    pub ch4: FloatValue,
    /// unit: Mg
    pub co: FloatValue,
    /// unit: Mg
    pub voc: FloatValue,
}

/// A declared leak of material out of the tracked system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emission {
    pub date_index: i32,
    pub processor: String,
    pub category: EmissionCategory,
    /// Material leaving the system
    pub amounts: AmountMap,
    pub non_co2: NonCo2Emissions,
    /// Additional warming of non-CO2 gases, in carbon equivalent. Negative values add to
    /// the atmosphere.
    /// unit: Mg C eq.
    pub co2_eq_adjustment: FloatValue,
    /// Energy recovered
    /// unit: MWh
    pub heat: FloatValue,
}

impl Emission {
    pub fn new(
        date_index: i32,
        processor: &str,
        category: EmissionCategory,
        amounts: AmountMap,
    ) -> Self {
        Self {
            date_index,
            processor: processor.to_string(),
            category,
            amounts,
            non_co2: NonCo2Emissions::default(),
            co2_eq_adjustment: 0.0,
            heat: 0.0,
        }
    }
}

/// Output of a processor invocation
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Material sent to a downstream processor
    Forward { to: String, unit: CarbonUnit },
    /// Material that stays at this node
    Terminal(CarbonUnit),
    /// Material leaving the tracked system
    Emission(Emission),
}

impl Flow {
    /// Material carried by this flow
    pub fn amounts(&self) -> &AmountMap {
        match self {
            Flow::Forward { unit, .. } | Flow::Terminal(unit) => unit.amounts(),
            Flow::Emission(emission) => &emission.amounts,
        }
    }
}

/// Shared state available to processors during a run
pub struct ProcessContext<'a> {
    pub reference: &'a ReferenceData,
    pub sensitivity: SensitivityContext<'a>,
}

impl<'a> ProcessContext<'a> {
    pub fn new(reference: &'a ReferenceData, sensitivity: SensitivityContext<'a>) -> Self {
        Self {
            reference,
            sensitivity,
        }
    }

    /// Modifier of a perturbed parameter, 1.0 in deterministic runs
    pub fn modifier(&mut self, source: VariabilitySource, subject_id: Option<&str>) -> FloatValue {
        self.sensitivity.modifier(source, subject_id)
    }
}

/// A node of the production-line graph
///
/// Processors are serialized as tagged trait objects so that production lines can be
/// loaded from configuration files.
#[typetag::serde(tag = "type")]
pub trait Processor: Debug + Send + Sync {
    /// Unique name of the processor
    fn name(&self) -> &str;

    /// Outgoing links to other processors
    fn links(&self) -> Vec<ProcessorLink> {
        vec![]
    }

    /// Check the parameters of the processor
    ///
    /// Called once when the production lines are built.
    fn validate(&self) -> HwpcResult<()> {
        Ok(())
    }

    /// Transform a list of carbon units
    ///
    /// An empty input produces an empty output.
    fn do_process(&self, units: &[CarbonUnit], ctx: &mut ProcessContext)
        -> HwpcResult<Vec<Flow>>;
}

/// Check that a factor is within [0, 1]
pub fn validate_factor(processor: &str, parameter: &str, value: FloatValue) -> HwpcResult<()> {
    if !(0.0..=1.0).contains(&value) || value.is_nan() {
        return Err(HwpcError::InvalidFactor {
            processor: processor.to_string(),
            parameter: parameter.to_string(),
            value,
        });
    }
    Ok(())
}
