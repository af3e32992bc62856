//! Validation of the processor graph.

use crate::errors::{HwpcError, HwpcResult};
use crate::processor::LinkKind;
use petgraph::graph::NodeIndex;
use petgraph::visit::{depth_first_search, DfsEvent};
use petgraph::Graph;

use super::manager::PGraph;

/// Check that the immediate (continuation and extraction) links form a DAG
///
/// End-of-life links are ignored because they are followed at a later date. Unlike a
/// component graph, a processor may not feed itself: that would never terminate.
pub(crate) fn verify_acyclic(graph: &PGraph) -> HwpcResult<()> {
    let mut immediate: Graph<(), ()> = Graph::with_capacity(graph.node_count(), 0);
    for _ in graph.node_indices() {
        immediate.add_node(());
    }
    for edge in graph.edge_indices() {
        if let (Some((a, b)), Some(kind)) = (graph.edge_endpoints(edge), graph.edge_weight(edge))
        {
            if kind.is_immediate() {
                immediate.add_edge(a, b, ());
            }
        }
    }

    let result = depth_first_search(&immediate, immediate.node_indices(), |event| match event {
        DfsEvent::BackEdge(_, b) => Err(b),
        _ => Ok(()),
    });

    match result {
        Err(node) => Err(HwpcError::CyclicProductionLine(
            graph[NodeIndex::new(node.index())].name().to_string(),
        )),
        Ok(()) => Ok(()),
    }
}

/// Check that the extraction proportions of a processor do not exceed the whole stream
pub(crate) fn verify_extractions(processor: &str, kinds: &[LinkKind]) -> HwpcResult<()> {
    let total: f64 = kinds
        .iter()
        .filter_map(|k| match k {
            LinkKind::Extraction { proportion } => Some(*proportion),
            _ => None,
        })
        .sum();
    if total > 1.0 + 1e-12 {
        return Err(HwpcError::InvalidFactor {
            processor: processor.to_string(),
            parameter: "total extraction proportion".to_string(),
            value: total,
        });
    }
    Ok(())
}
