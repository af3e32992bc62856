//! Transformation of wood along a production line
//!
//! A transformation keeps a share of its input given by its yield factor and stores the
//! remainder as an industrial loss. Side-streams (extractions) are then diverted from the
//! surviving material before the main stream either continues to another processor or
//! becomes an end-use product.

use hwpc_core::amounts::FloatValue;
use hwpc_core::carbon_unit::{CarbonUnit, CarbonUnitStatus, UnitFeature};
use hwpc_core::errors::{HwpcError, HwpcResult};
use hwpc_core::lifetime::ServiceLife;
use hwpc_core::processor::{
    validate_factor, Flow, LinkKind, ProcessContext, Processor, ProcessorLink,
};
use hwpc_core::sensitivity::VariabilitySource;
use log::warn;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A side-stream diverting a proportion of the surviving material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub processor: String,
    /// unit: dimensionless
    pub proportion: FloatValue,
}

/// End-use product created by a transformation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductParameters {
    /// Class of use reported by the compartments, e.g. "Construction"
    pub use_class: String,
    #[serde(default)]
    pub service_life: ServiceLife,
    /// Processor receiving the product once retired
    #[serde(default)]
    pub end_of_life: Option<String>,
}

/// Parameters for the transformation processor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformationParameters {
    /// Share of the input surviving the transformation
    /// unit: dimensionless
    #[serde(default = "default_yield")]
    pub yield_factor: FloatValue,
    #[serde(default)]
    pub extractions: Vec<Extraction>,
    /// Processor receiving the main stream
    #[serde(default)]
    pub continuation: Option<String>,
    /// Product made from the main stream when there is no continuation
    #[serde(default)]
    pub product: Option<ProductParameters>,
    /// Status appended to the surviving material, e.g. `Recycled`
    #[serde(default)]
    pub status: Option<CarbonUnitStatus>,
}

fn default_yield() -> FloatValue {
    1.0
}

impl Default for TransformationParameters {
    fn default() -> Self {
        Self {
            yield_factor: 1.0,
            extractions: vec![],
            continuation: None,
            product: None,
            status: None,
        }
    }
}

enum MainStream {
    Continue(String),
    Product(Arc<UnitFeature>),
}

/// Generic production step: sawing, planing, pulping, recycling...
///
/// For each input unit with amounts $A$ and yield factor $y$:
///
/// $$ A = \underbrace{(1 - y) A}_{\text{loss}} + \sum_i \underbrace{p_i y A}_{\text{extraction } i}
///      + \underbrace{(1 - \sum_i p_i) y A}_{\text{main stream}} $$
///
/// If no continuation is configured, the main stream becomes a product of the configured
/// use class (a permanent product named after the processor by default).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformationProcessor {
    name: String,
    parameters: TransformationParameters,
}

impl TransformationProcessor {
    pub fn from_parameters(name: &str, parameters: TransformationParameters) -> Self {
        Self {
            name: name.to_string(),
            parameters,
        }
    }

    pub fn parameters(&self) -> &TransformationParameters {
        &self.parameters
    }

    /// Yield factor for the current realization
    fn effective_yield(&self, ctx: &mut ProcessContext) -> FloatValue {
        let value = self.parameters.yield_factor
            * ctx.modifier(VariabilitySource::ProcessorYield, Some(&self.name));
        if value > 1.0 {
            warn!(
                "Perturbed yield factor {} of '{}' exceeds 1, clamping",
                value, self.name
            );
            return 1.0;
        }
        value.max(0.0)
    }

    fn product_feature(&self, ctx: &mut ProcessContext) -> UnitFeature {
        let product = self.parameters.product.clone().unwrap_or(ProductParameters {
            use_class: self.name.clone(),
            service_life: ServiceLife::Permanent,
            end_of_life: None,
        });
        let modifier = ctx.modifier(VariabilitySource::ProductLifetime, Some(&product.use_class));
        UnitFeature::Product {
            processor: self.name.clone(),
            use_class: product.use_class,
            service_life: product.service_life.scaled(modifier),
            end_of_life: product.end_of_life,
        }
    }
}

#[typetag::serde]
impl Processor for TransformationProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn links(&self) -> Vec<ProcessorLink> {
        let mut links: Vec<ProcessorLink> = self
            .parameters
            .extractions
            .iter()
            .map(|e| {
                ProcessorLink::new(
                    &e.processor,
                    LinkKind::Extraction {
                        proportion: e.proportion,
                    },
                )
            })
            .collect();
        if let Some(continuation) = &self.parameters.continuation {
            links.push(ProcessorLink::new(continuation, LinkKind::Continuation));
        }
        if let Some(end_of_life) = self
            .parameters
            .product
            .as_ref()
            .and_then(|p| p.end_of_life.as_ref())
        {
            links.push(ProcessorLink::new(end_of_life, LinkKind::EndOfLife));
        }
        links
    }

    fn validate(&self) -> HwpcResult<()> {
        validate_factor(&self.name, "yield_factor", self.parameters.yield_factor)?;
        for extraction in &self.parameters.extractions {
            validate_factor(
                &self.name,
                &format!("proportion to '{}'", extraction.processor),
                extraction.proportion,
            )?;
        }
        if self.parameters.continuation.is_some() && self.parameters.product.is_some() {
            return Err(HwpcError::InvalidProcessor {
                processor: self.name.clone(),
                reason: "the main stream cannot both continue and become a product".to_string(),
            });
        }
        if let Some(product) = &self.parameters.product {
            if !product.service_life.is_valid() {
                return Err(HwpcError::InvalidProcessor {
                    processor: self.name.clone(),
                    reason: format!("invalid service life {:?}", product.service_life),
                });
            }
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

        let yield_factor = self.effective_yield(ctx);
        let extracted: FloatValue = self
            .parameters
            .extractions
            .iter()
            .map(|e| e.proportion)
            .sum();
        let transit = Arc::new(UnitFeature::Transit {
            processor: self.name.clone(),
        });
        let loss = Arc::new(UnitFeature::IndustrialLoss {
            processor: self.name.clone(),
        });
        let main_stream = match &self.parameters.continuation {
            Some(continuation) => MainStream::Continue(continuation.clone()),
            None => MainStream::Product(Arc::new(self.product_feature(ctx))),
        };

        let mut flows = vec![];
        for unit in units {
            let surviving = unit.amounts().scalar_multiply(yield_factor);
            flows.push(Flow::Terminal(unit.derive(
                loss.clone(),
                unit.amounts().scalar_multiply(1.0 - yield_factor),
                Some(CarbonUnitStatus::IndustrialLoss),
            )));

            for extraction in &self.parameters.extractions {
                flows.push(Flow::Forward {
                    to: extraction.processor.clone(),
                    unit: unit.derive(
                        transit.clone(),
                        surviving.scalar_multiply(extraction.proportion),
                        self.parameters.status,
                    ),
                });
            }

            let main = surviving.scalar_multiply(1.0 - extracted).clamped();
            match &main_stream {
                MainStream::Continue(continuation) => flows.push(Flow::Forward {
                    to: continuation.clone(),
                    unit: unit.derive(transit.clone(), main, self.parameters.status),
                }),
                MainStream::Product(feature) => {
                    let mut product = unit.derive(feature.clone(), main, self.parameters.status);
                    product.add_status(CarbonUnitStatus::EndUseWoodProduct);
                    flows.push(Flow::Terminal(product));
                }
            }
        }
        Ok(flows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_follow_parameters() {
        let processor = TransformationProcessor::from_parameters(
            "sawmill",
            TransformationParameters {
                extractions: vec![Extraction {
                    processor: "chips".to_string(),
                    proportion: 0.2,
                }],
                continuation: Some("planer".to_string()),
                ..Default::default()
            },
        );
        let links = processor.links();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].target, "chips");
        assert_eq!(links[0].kind, LinkKind::Extraction { proportion: 0.2 });
        assert_eq!(links[1].kind, LinkKind::Continuation);
    }

    #[test]
    fn product_end_of_life_is_a_deferred_link() {
        let processor = TransformationProcessor::from_parameters(
            "lumber",
            TransformationParameters {
                product: Some(ProductParameters {
                    use_class: "Construction".to_string(),
                    service_life: ServiceLife::Exponential {
                        average_lifetime: 35.0,
                    },
                    end_of_life: Some("landfill".to_string()),
                }),
                ..Default::default()
            },
        );
        let links = processor.links();
        assert_eq!(links, vec![ProcessorLink::new("landfill", LinkKind::EndOfLife)]);
    }

    #[test]
    fn invalid_parameters() {
        let yield_too_high = TransformationProcessor::from_parameters(
            "sawmill",
            TransformationParameters {
                yield_factor: 1.1,
                ..Default::default()
            },
        );
        assert!(matches!(
            yield_too_high.validate(),
            Err(HwpcError::InvalidFactor { .. })
        ));

        let both = TransformationProcessor::from_parameters(
            "sawmill",
            TransformationParameters {
                continuation: Some("planer".to_string()),
                product: Some(ProductParameters {
                    use_class: "Construction".to_string(),
                    service_life: ServiceLife::Permanent,
                    end_of_life: None,
                }),
                ..Default::default()
            },
        );
        assert!(matches!(
            both.validate(),
            Err(HwpcError::InvalidProcessor { .. })
        ));

        let no_lifetime = TransformationProcessor::from_parameters(
            "lumber",
            TransformationParameters {
                product: Some(ProductParameters {
                    use_class: "Construction".to_string(),
                    service_life: ServiceLife::Fixed { lifetime: 0.0 },
                    end_of_life: None,
                }),
                ..Default::default()
            },
        );
        assert!(no_lifetime.validate().is_err());
    }
}
