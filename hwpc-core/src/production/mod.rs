//! Production lines route harvested wood through a graph of processors.
//!
//! The graph holds one node per [`Processor`](crate::processor::Processor) and one edge per
//! declared link. Continuation and extraction links form a directed acyclic graph that is
//! traversed synchronously whenever wood enters a production line. End-of-life links may
//! loop back to earlier processors because they are never followed at processing time:
//! retired products are scheduled on a [`DisposalQueue`] and re-injected when the
//! simulation clock reaches their retirement date.
//!
//! Misconfigured graphs (unknown processors, invalid factors, cycles) are rejected by
//! [`ProductionLineManagerBuilder::build`] before any wood is processed.

mod builder;
mod config;
mod disposal;
mod manager;
mod validation;

#[cfg(test)]
mod tests;

pub use builder::ProductionLineManagerBuilder;
pub use config::ProductionLineConfig;
pub use disposal::{DisposalQueue, PendingDisposal, Retirement};
pub use manager::{
    PGraph, ProcessingResults, ProductionLine, ProductionLineManager, WoodOrigin, P,
};
