use crate::amounts::FloatValue;
use crate::carbon_unit::{CarbonUnit, CarbonUnitStatus, UnitFeature};
use crate::errors::HwpcResult;
use crate::lifetime::ServiceLife;
use crate::processor::{
    validate_factor, Emission, EmissionCategory, Flow, LinkKind, ProcessContext, Processor,
    ProcessorLink,
};
use crate::sensitivity::VariabilitySource;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Forwards everything it receives, optionally scaled by a perturbed yield, to `to`.
/// The remainder is stored as an industrial loss.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ForwardProcessor {
    pub name: String,
    pub to: String,
    #[serde(default = "unity")]
    pub yield_factor: FloatValue,
}

fn unity() -> FloatValue {
    1.0
}

impl ForwardProcessor {
    pub fn new(name: &str, to: &str) -> Self {
        Self {
            name: name.to_string(),
            to: to.to_string(),
            yield_factor: 1.0,
        }
    }
}

#[typetag::serde]
impl Processor for ForwardProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn links(&self) -> Vec<ProcessorLink> {
        vec![ProcessorLink::new(&self.to, LinkKind::Continuation)]
    }

    fn validate(&self) -> HwpcResult<()> {
        validate_factor(&self.name, "yield_factor", self.yield_factor)
    }

    fn do_process(
        &self,
        units: &[CarbonUnit],
        ctx: &mut ProcessContext,
    ) -> HwpcResult<Vec<Flow>> {
        let yield_factor = (self.yield_factor
            * ctx.modifier(VariabilitySource::ProcessorYield, None))
        .clamp(0.0, 1.0);
        let mut flows = vec![];
        for unit in units {
            let kept = unit.amounts().scalar_multiply(yield_factor);
            let lost = unit.amounts().scalar_multiply(1.0 - yield_factor);
            flows.push(Flow::Forward {
                to: self.to.clone(),
                unit: unit.derive(
                    Arc::new(UnitFeature::Transit {
                        processor: self.name.clone(),
                    }),
                    kept,
                    None,
                ),
            });
            flows.push(Flow::Terminal(unit.derive(
                Arc::new(UnitFeature::IndustrialLoss {
                    processor: self.name.clone(),
                }),
                lost,
                Some(CarbonUnitStatus::IndustrialLoss),
            )));
        }
        Ok(flows)
    }
}

/// Splits its input between several processors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SplitProcessor {
    pub name: String,
    pub shares: Vec<(String, FloatValue)>,
}

#[typetag::serde]
impl Processor for SplitProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn links(&self) -> Vec<ProcessorLink> {
        self.shares
            .iter()
            .map(|(to, share)| ProcessorLink::new(to, LinkKind::Extraction { proportion: *share }))
            .collect()
    }

    fn do_process(
        &self,
        units: &[CarbonUnit],
        _ctx: &mut ProcessContext,
    ) -> HwpcResult<Vec<Flow>> {
        let mut flows = vec![];
        for unit in units {
            for (to, share) in &self.shares {
                flows.push(Flow::Forward {
                    to: to.clone(),
                    unit: unit.derive(
                        Arc::new(UnitFeature::Transit {
                            processor: self.name.clone(),
                        }),
                        unit.amounts().scalar_multiply(*share),
                        None,
                    ),
                });
            }
        }
        Ok(flows)
    }
}

/// Turns everything it receives into a product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ProductProcessor {
    pub name: String,
    #[serde(default)]
    pub service_life: ServiceLife,
    #[serde(default)]
    pub end_of_life: Option<String>,
}

impl ProductProcessor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            service_life: ServiceLife::Permanent,
            end_of_life: None,
        }
    }
}

#[typetag::serde]
impl Processor for ProductProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn links(&self) -> Vec<ProcessorLink> {
        self.end_of_life
            .iter()
            .map(|to| ProcessorLink::new(to, LinkKind::EndOfLife))
            .collect()
    }

    fn do_process(
        &self,
        units: &[CarbonUnit],
        _ctx: &mut ProcessContext,
    ) -> HwpcResult<Vec<Flow>> {
        let feature = Arc::new(UnitFeature::Product {
            processor: self.name.clone(),
            use_class: "test".to_string(),
            service_life: self.service_life,
            end_of_life: self.end_of_life.clone(),
        });
        Ok(units
            .iter()
            .map(|unit| {
                Flow::Terminal(unit.derive(
                    feature.clone(),
                    unit.amounts().clone(),
                    Some(CarbonUnitStatus::EndUseWoodProduct),
                ))
            })
            .collect())
    }
}

/// Emits everything it receives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct EmitProcessor {
    pub name: String,
}

#[typetag::serde]
impl Processor for EmitProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn do_process(
        &self,
        units: &[CarbonUnit],
        _ctx: &mut ProcessContext,
    ) -> HwpcResult<Vec<Flow>> {
        Ok(units
            .iter()
            .map(|unit| {
                Flow::Emission(Emission::new(
                    unit.date_index(),
                    &self.name,
                    EmissionCategory::ProductDisposal,
                    unit.amounts().clone(),
                ))
            })
            .collect())
    }
}

/// Loses part of its input without accounting for it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct LeakyProcessor {
    pub name: String,
}

#[typetag::serde]
impl Processor for LeakyProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn do_process(
        &self,
        units: &[CarbonUnit],
        _ctx: &mut ProcessContext,
    ) -> HwpcResult<Vec<Flow>> {
        Ok(units
            .iter()
            .map(|unit| {
                Flow::Terminal(unit.derive(
                    Arc::new(UnitFeature::IndustrialLoss {
                        processor: self.name.clone(),
                    }),
                    unit.amounts().scalar_multiply(0.9),
                    Some(CarbonUnitStatus::IndustrialLoss),
                ))
            })
            .collect())
    }
}
