use crate::amounts::{AmountMap, Element, FloatValue};
use crate::carbon_unit::{
    BiomassType, CarbonUnit, CarbonUnitList, CarbonUnitMap, CarbonUnitStatus, UnitFeature,
};
use crate::errors::{HwpcError, HwpcResult};
use crate::processor::{Emission, Flow, LinkKind, ProcessContext, Processor};
use indexmap::IndexMap;
use is_close::is_close;
use log::{debug, trace};
use petgraph::dot::{Config, Dot};
use petgraph::graph::NodeIndex;
use petgraph::Graph;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

pub type P = Arc<dyn Processor>;
pub type PGraph = Graph<P, LinkKind>;

/// Discrepancies below this absolute amount are treated as rounding noise
const MASS_BALANCE_ABS_TOL: FloatValue = 1e-9;

/// A named entry point into the processor graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionLine {
    pub name: String,
    /// Name of the first processor of the line
    pub entry: String,
}

impl ProductionLine {
    pub fn new(name: &str, entry: &str) -> Self {
        Self {
            name: name.to_string(),
            entry: entry.to_string(),
        }
    }
}

/// Where a piece of wood comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WoodOrigin {
    pub sample_unit_id: String,
    pub species: String,
    #[serde(default)]
    pub biomass_type: BiomassType,
}

impl WoodOrigin {
    pub fn new(sample_unit_id: &str, species: &str, biomass_type: BiomassType) -> Self {
        Self {
            sample_unit_id: sample_unit_id.to_string(),
            species: species.to_string(),
            biomass_type,
        }
    }
}

/// Outcome of processing, drained from a [`ProductionLineManager`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessingResults {
    pub carbon_units: CarbonUnitMap,
    pub emissions: Vec<Emission>,
}

/// Routes wood through the production lines and collects the resulting carbon units
///
/// A manager is created by a [`ProductionLineManagerBuilder`](super::ProductionLineManagerBuilder)
/// which guarantees that every link resolves and that the immediate links are acyclic.
/// Terminal carbon units accumulate in a map keyed by their most recent status until the
/// map is reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionLineManager {
    graph: PGraph,
    nodes: HashMap<String, NodeIndex>,
    lines: IndexMap<String, ProductionLine>,
    carbon_units: CarbonUnitMap,
    emissions: Vec<Emission>,
}

impl ProductionLineManager {
    pub(crate) fn from_parts(
        graph: PGraph,
        nodes: HashMap<String, NodeIndex>,
        lines: IndexMap<String, ProductionLine>,
    ) -> Self {
        Self {
            graph,
            nodes,
            lines,
            carbon_units: CarbonUnitMap::new(),
            emissions: vec![],
        }
    }

    pub fn lines(&self) -> impl Iterator<Item = &ProductionLine> {
        self.lines.values()
    }

    pub fn line(&self, name: &str) -> Option<&ProductionLine> {
        self.lines.get(name)
    }

    pub fn processor(&self, name: &str) -> Option<&P> {
        self.nodes.get(name).map(|node| &self.graph[*node])
    }

    pub fn processors(&self) -> impl Iterator<Item = &P> {
        self.graph.node_weights()
    }

    /// Send a piece of wood down a production line
    ///
    /// The amounts are wrapped in an in-transit carbon unit dated `date_index` and processed
    /// until every resulting unit is either stored or emitted. Negative amounts are clamped
    /// to zero and an empty piece is ignored.
    pub fn process_wood_piece(
        &mut self,
        line: &str,
        date_index: i32,
        amounts: &AmountMap,
        origin: &WoodOrigin,
        ctx: &mut ProcessContext,
    ) -> HwpcResult<()> {
        let production_line = self
            .lines
            .get(line)
            .ok_or_else(|| HwpcError::UnknownProductionLine(line.to_string()))?;
        let entry = production_line.entry.clone();

        let amounts = amounts.clamped();
        if amounts.is_zero() {
            trace!("Skipping empty wood piece on line '{}'", line);
            return Ok(());
        }

        let unit = CarbonUnit::new(
            date_index,
            &origin.sample_unit_id,
            Arc::new(UnitFeature::Transit {
                processor: production_line.name.clone(),
            }),
            amounts,
            &origin.species,
            origin.biomass_type,
            Some(CarbonUnitStatus::InTransit),
        );
        self.process_units(&entry, vec![unit], ctx)
    }

    /// Process existing carbon units starting at the named processor
    ///
    /// Used to re-inject retired products into their end-of-life processor.
    pub fn process_units(
        &mut self,
        processor: &str,
        units: Vec<CarbonUnit>,
        ctx: &mut ProcessContext,
    ) -> HwpcResult<()> {
        let entry = *self
            .nodes
            .get(processor)
            .ok_or_else(|| HwpcError::NoSuchProcessor(processor.to_string()))?;

        let mut queue: VecDeque<(NodeIndex, Vec<CarbonUnit>)> = VecDeque::new();
        queue.push_back((entry, units));

        while let Some((node, units)) = queue.pop_front() {
            if units.is_empty() {
                continue;
            }
            let processor = self.graph[node].clone();
            trace!(
                "Processing {} unit(s) in '{}'",
                units.len(),
                processor.name()
            );

            let flows = processor.do_process(&units, ctx)?;
            verify_mass_balance(processor.name(), &units, &flows)?;

            // Units sent to the same processor are processed together
            let mut forwarded: IndexMap<NodeIndex, Vec<CarbonUnit>> = IndexMap::new();
            for flow in flows {
                match flow {
                    Flow::Forward { to, unit } => {
                        let target = self.resolve_forward(node, processor.name(), &to)?;
                        if !unit.amounts().is_zero() {
                            forwarded.entry(target).or_default().push(unit);
                        }
                    }
                    Flow::Terminal(unit) => self.store(unit),
                    Flow::Emission(emission) => {
                        if !emission.amounts.is_zero() || emission.co2_eq_adjustment != 0.0 {
                            self.emissions.push(emission);
                        }
                    }
                }
            }
            queue.extend(forwarded);
        }
        Ok(())
    }

    /// Resolve a forwarded flow against the declared immediate links of `from`
    fn resolve_forward(&self, from: NodeIndex, from_name: &str, to: &str) -> HwpcResult<NodeIndex> {
        let target = *self
            .nodes
            .get(to)
            .ok_or_else(|| HwpcError::UnknownProcessor {
                from: from_name.to_string(),
                to: to.to_string(),
            })?;

        if self
            .graph
            .edges_connecting(from, target)
            .any(|edge| edge.weight().is_immediate())
        {
            Ok(target)
        } else {
            Err(HwpcError::InvalidProcessor {
                processor: from_name.to_string(),
                reason: format!("forwarded material to '{}' without declaring a link", to),
            })
        }
    }

    fn store(&mut self, unit: CarbonUnit) {
        if unit.amounts().is_zero() {
            return;
        }
        let status = unit.last_status().unwrap_or(CarbonUnitStatus::InTransit);
        self.carbon_units.entry(status).or_default().push(unit);
    }

    /// Terminal carbon units whose most recent status is `status`
    pub fn carbon_units(&self, status: CarbonUnitStatus) -> Option<&CarbonUnitList> {
        self.carbon_units.get(&status)
    }

    pub fn carbon_unit_map(&self) -> &CarbonUnitMap {
        &self.carbon_units
    }

    pub fn emissions(&self) -> &[Emission] {
        &self.emissions
    }

    /// Sum of every stored carbon unit and emission
    pub fn total(&self) -> AmountMap {
        let mut total = AmountMap::new();
        for list in self.carbon_units.values() {
            total += &list.total();
        }
        for emission in &self.emissions {
            total += &emission.amounts;
        }
        total
    }

    /// Forget the accumulated carbon units and emissions
    pub fn reset_carbon_unit_map(&mut self) {
        debug!(
            "Resetting {} carbon unit group(s) and {} emission(s)",
            self.carbon_units.len(),
            self.emissions.len()
        );
        self.carbon_units.clear();
        self.emissions.clear();
    }

    /// Drain the accumulated carbon units and emissions
    pub fn take_results(&mut self) -> ProcessingResults {
        ProcessingResults {
            carbon_units: std::mem::take(&mut self.carbon_units),
            emissions: std::mem::take(&mut self.emissions),
        }
    }

    /// Create a diagram that represents the processor graph.
    ///
    /// Useful for debugging.
    pub fn as_dot(&self) -> Dot<'_, &PGraph> {
        Dot::with_attr_getters(
            &self.graph,
            &[Config::NodeNoLabel, Config::EdgeNoLabel],
            &|_, er| format!("label = \"{:?}\"", er.weight()),
            &|_, (_, processor)| format!("label = {:?}", processor.name()),
        )
    }
}

/// Check that the flows of a processor invocation account for all of its inputs
fn verify_mass_balance(processor: &str, inputs: &[CarbonUnit], flows: &[Flow]) -> HwpcResult<()> {
    let input: AmountMap = inputs.iter().map(|u| u.amounts()).sum();
    let output: AmountMap = flows.iter().map(|f| f.amounts()).sum();

    for element in Element::ALL {
        let (i, o) = (input.get(element), output.get(element));
        if (i - o).abs() > MASS_BALANCE_ABS_TOL && !is_close!(i, o) {
            return Err(HwpcError::MassBalance {
                processor: processor.to_string(),
                element,
                input: i,
                output: o,
            });
        }
    }
    Ok(())
}
