use crate::errors::{HwpcError, HwpcResult};
use crate::processor::{LinkKind, Processor};
use indexmap::IndexMap;
use log::debug;
use petgraph::graph::NodeIndex;
use petgraph::Graph;
use std::collections::HashMap;
use std::sync::Arc;

use super::manager::{PGraph, ProductionLine, ProductionLineManager, P};
use super::validation::{verify_acyclic, verify_extractions};

/// Build a [`ProductionLineManager`] from a set of processors and production lines
///
/// The builder generates the processor graph, resolving each declared link to a node.
/// Building fails if a processor is misconfigured, if a link or a line points to an
/// unknown processor, or if the transformation links form a cycle.
#[derive(Default)]
pub struct ProductionLineManagerBuilder {
    processors: Vec<P>,
    lines: Vec<ProductionLine>,
}

impl ProductionLineManagerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a processor with the builder
    pub fn with_processor(&mut self, processor: Arc<dyn Processor>) -> &mut Self {
        self.processors.push(processor);
        self
    }

    /// Declare a production line starting at the processor named `entry`
    pub fn with_line(&mut self, name: &str, entry: &str) -> &mut Self {
        self.lines.push(ProductionLine::new(name, entry));
        self
    }

    /// Builds the processor graph and creates a manager
    pub fn build(&self) -> HwpcResult<ProductionLineManager> {
        let mut graph: PGraph = Graph::new();
        let mut nodes: HashMap<String, NodeIndex> = HashMap::new();

        for processor in &self.processors {
            processor.validate()?;
            let name = processor.name().to_string();
            if nodes.contains_key(&name) {
                return Err(HwpcError::DuplicateProcessor(name));
            }
            let node = graph.add_node(processor.clone());
            nodes.insert(name, node);
        }

        for processor in &self.processors {
            let from = nodes[processor.name()];
            let links = processor.links();
            for link in &links {
                let to = nodes
                    .get(&link.target)
                    .ok_or_else(|| HwpcError::UnknownProcessor {
                        from: processor.name().to_string(),
                        to: link.target.clone(),
                    })?;
                graph.add_edge(from, *to, link.kind);
            }
            let kinds: Vec<LinkKind> = links.iter().map(|l| l.kind).collect();
            verify_extractions(processor.name(), &kinds)?;
        }

        verify_acyclic(&graph)?;

        let mut lines: IndexMap<String, ProductionLine> = IndexMap::new();
        for line in &self.lines {
            if lines.contains_key(&line.name) {
                return Err(HwpcError::DuplicateProductionLine(line.name.clone()));
            }
            if !nodes.contains_key(&line.entry) {
                return Err(HwpcError::UnknownProcessor {
                    from: line.name.clone(),
                    to: line.entry.clone(),
                });
            }
            lines.insert(line.name.clone(), line.clone());
        }

        debug!(
            "Built {} production line(s) over {} processor(s) and {} link(s)",
            lines.len(),
            graph.node_count(),
            graph.edge_count()
        );

        Ok(ProductionLineManager::from_parts(graph, nodes, lines))
    }
}
