//! Traversal tests: routing, mass balance, results, serialisation.

use super::Harness;
use crate::amounts::{AmountMap, Element};
use crate::carbon_unit::{BiomassType, CarbonUnitStatus};
use crate::errors::HwpcError;
use crate::example_processors::{
    EmitProcessor, ForwardProcessor, LeakyProcessor, ProductProcessor, SplitProcessor,
};
use crate::production::{ProductionLineManager, ProductionLineManagerBuilder, WoodOrigin};
use crate::sensitivity::{
    DistributionType, SensitivityParameter, SensitivitySettings, VariabilitySource,
};
use approx::assert_relative_eq;
use std::sync::Arc;

fn origin() -> WoodOrigin {
    WoodOrigin::new("plot-7", "Picea mariana", BiomassType::Wood)
}

fn carbon(value: f64) -> AmountMap {
    AmountMap::new().with(Element::Carbon, value)
}

fn sawmill_line(yield_factor: f64) -> ProductionLineManager {
    let mut sawmill = ForwardProcessor::new("sawmill", "lumber");
    sawmill.yield_factor = yield_factor;
    ProductionLineManagerBuilder::new()
        .with_processor(Arc::new(sawmill))
        .with_processor(Arc::new(ProductProcessor::new("lumber")))
        .with_line("softwood", "sawmill")
        .build()
        .unwrap()
}

#[test]
fn wood_piece_reaches_products_and_losses() {
    let mut manager = sawmill_line(0.8);
    let mut harness = Harness::new();

    manager
        .process_wood_piece("softwood", 2020, &carbon(10.0), &origin(), &mut harness.ctx())
        .unwrap();

    let products = manager
        .carbon_units(CarbonUnitStatus::EndUseWoodProduct)
        .unwrap();
    assert_eq!(products.len(), 1);
    assert_relative_eq!(products.total().get(Element::Carbon), 8.0);

    let product = products.iter().next().unwrap();
    assert_eq!(product.date_index(), 2020);
    assert_eq!(product.sample_unit_id(), "plot-7");
    assert_eq!(product.species(), "Picea mariana");
    assert!(product.has_status(CarbonUnitStatus::InTransit));
    assert_eq!(product.feature().processor(), "lumber");

    let losses = manager
        .carbon_units(CarbonUnitStatus::IndustrialLoss)
        .unwrap();
    assert_relative_eq!(losses.total().get(Element::Carbon), 2.0);
    assert_relative_eq!(manager.total().get(Element::Carbon), 10.0);
}

#[test]
fn lossless_transformation_stores_no_empty_units() {
    let mut manager = sawmill_line(1.0);
    let mut harness = Harness::new();

    manager
        .process_wood_piece("softwood", 2020, &carbon(5.0), &origin(), &mut harness.ctx())
        .unwrap();

    assert_eq!(manager.carbon_unit_map().len(), 1);
    assert!(manager
        .carbon_units(CarbonUnitStatus::IndustrialLoss)
        .is_none());
}

#[test]
fn extractions_split_the_stream() {
    let mut manager = ProductionLineManagerBuilder::new()
        .with_processor(Arc::new(SplitProcessor {
            name: "split".to_string(),
            shares: vec![("panels".to_string(), 0.3), ("boiler".to_string(), 0.7)],
        }))
        .with_processor(Arc::new(ProductProcessor::new("panels")))
        .with_processor(Arc::new(EmitProcessor {
            name: "boiler".to_string(),
        }))
        .with_line("mixed", "split")
        .build()
        .unwrap();
    let mut harness = Harness::new();

    manager
        .process_wood_piece(
            "mixed",
            2000,
            &carbon(10.0).with(Element::Volume, 20.0),
            &origin(),
            &mut harness.ctx(),
        )
        .unwrap();

    let panels = manager
        .carbon_units(CarbonUnitStatus::EndUseWoodProduct)
        .unwrap()
        .total();
    assert_relative_eq!(panels.get(Element::Carbon), 3.0);
    assert_relative_eq!(panels.get(Element::Volume), 6.0);

    assert_eq!(manager.emissions().len(), 1);
    let emission = &manager.emissions()[0];
    assert_eq!(emission.processor, "boiler");
    assert_eq!(emission.date_index, 2000);
    assert_relative_eq!(emission.amounts.get(Element::Carbon), 7.0);
    assert_relative_eq!(emission.amounts.get(Element::Volume), 14.0);
}

#[test]
fn unknown_production_line() {
    let mut manager = sawmill_line(0.8);
    let mut harness = Harness::new();
    let result =
        manager.process_wood_piece("hardwood", 2020, &carbon(1.0), &origin(), &mut harness.ctx());
    assert!(matches!(result, Err(HwpcError::UnknownProductionLine(line)) if line == "hardwood"));
}

#[test]
fn unknown_processor() {
    let mut manager = sawmill_line(0.8);
    let mut harness = Harness::new();
    let result = manager.process_units("planer", vec![], &mut harness.ctx());
    assert!(matches!(result, Err(HwpcError::NoSuchProcessor(_))));
}

#[test]
fn empty_wood_piece_is_ignored() {
    let mut manager = sawmill_line(0.8);
    let mut harness = Harness::new();

    manager
        .process_wood_piece("softwood", 2020, &AmountMap::new(), &origin(), &mut harness.ctx())
        .unwrap();
    manager
        .process_wood_piece("softwood", 2020, &carbon(-3.0), &origin(), &mut harness.ctx())
        .unwrap();
    assert!(manager.carbon_unit_map().is_empty());
    assert!(manager.emissions().is_empty());
}

#[test]
fn unbalanced_processor_is_reported() {
    let mut manager = ProductionLineManagerBuilder::new()
        .with_processor(Arc::new(LeakyProcessor {
            name: "leaky".to_string(),
        }))
        .with_line("leaky", "leaky")
        .build()
        .unwrap();
    let mut harness = Harness::new();

    let result =
        manager.process_wood_piece("leaky", 2020, &carbon(10.0), &origin(), &mut harness.ctx());
    match result {
        Err(HwpcError::MassBalance {
            processor,
            element,
            input,
            output,
        }) => {
            assert_eq!(processor, "leaky");
            assert_eq!(element, Element::Carbon);
            assert_eq!(input, 10.0);
            assert_relative_eq!(output, 9.0);
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn reset_and_take_results() {
    let mut manager = sawmill_line(0.5);
    let mut harness = Harness::new();
    manager
        .process_wood_piece("softwood", 2020, &carbon(4.0), &origin(), &mut harness.ctx())
        .unwrap();

    let results = manager.take_results();
    assert_eq!(results.carbon_units.len(), 2);
    assert!(manager.carbon_unit_map().is_empty());

    manager
        .process_wood_piece("softwood", 2021, &carbon(4.0), &origin(), &mut harness.ctx())
        .unwrap();
    assert!(!manager.carbon_unit_map().is_empty());
    manager.reset_carbon_unit_map();
    assert!(manager.carbon_unit_map().is_empty());
    assert!(manager.total().is_zero());
}

#[test]
fn perturbed_yield_is_reproducible() {
    let settings = SensitivitySettings::deterministic().with_parameter(
        VariabilitySource::ProcessorYield,
        SensitivityParameter::new(DistributionType::Uniform, 0.1),
    );

    let run = || {
        let mut manager = sawmill_line(0.8);
        let mut harness = Harness::with_settings(settings.clone());
        manager
            .process_wood_piece("softwood", 2020, &carbon(10.0), &origin(), &mut harness.ctx())
            .unwrap();
        manager
            .carbon_units(CarbonUnitStatus::EndUseWoodProduct)
            .unwrap()
            .total()
            .get(Element::Carbon)
    };

    let first = run();
    assert_eq!(first.to_bits(), run().to_bits());
    assert_ne!(first, 8.0);
    assert!((7.2..=8.8).contains(&first));
}

#[test]
fn dot() {
    let manager = sawmill_line(0.8);

    let exp = r#"digraph {
    0 [ label = "sawmill"]
    1 [ label = "lumber"]
    0 -> 1 [ label = "Continuation"]
}
"#;

    let res = format!("{:?}", manager.as_dot());
    assert_eq!(res, exp);
}

#[test]
fn serialise_and_deserialise_manager() {
    let manager = sawmill_line(0.8);

    let serialised = serde_json::to_string_pretty(&manager).unwrap();
    let mut deserialised = serde_json::from_str::<ProductionLineManager>(&serialised).unwrap();

    let mut harness = Harness::new();
    deserialised
        .process_wood_piece("softwood", 2020, &carbon(10.0), &origin(), &mut harness.ctx())
        .unwrap();
    assert_relative_eq!(deserialised.total().get(Element::Carbon), 10.0);
}
