use crate::errors::HwpcResult;
use crate::processor::Processor;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use super::builder::ProductionLineManagerBuilder;
use super::manager::{ProductionLine, ProductionLineManager};

/// Serialized description of a set of production lines
///
/// Processors are tagged with their concrete type:
///
/// ```toml
/// [[lines]]
/// name = "softwood"
/// entry = "sawmill"
///
/// [[processors]]
/// type = "LeftInForestProcessor"
/// name = "sawmill"
///
/// [processors.parameters]
/// half_life = 10.0
/// ```
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ProductionLineConfig {
    #[serde(default)]
    pub lines: Vec<ProductionLine>,
    #[serde(default)]
    pub processors: Vec<Box<dyn Processor>>,
}

impl ProductionLineConfig {
    pub fn from_toml_str(content: &str) -> HwpcResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file<F: AsRef<Path>>(path: F) -> HwpcResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// A builder populated with the configured lines and processors
    pub fn into_builder(self) -> ProductionLineManagerBuilder {
        let mut builder = ProductionLineManagerBuilder::new();
        for processor in self.processors {
            builder.with_processor(Arc::from(processor));
        }
        for line in &self.lines {
            builder.with_line(&line.name, &line.entry);
        }
        builder
    }

    pub fn build(self) -> HwpcResult<ProductionLineManager> {
        self.into_builder().build()
    }
}
