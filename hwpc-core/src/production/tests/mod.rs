//! Tests for building production lines and routing wood through them.

#[cfg(test)]
mod traversal;

use crate::processor::ProcessContext;
use crate::reference::ReferenceData;
use crate::sensitivity::{DrawCache, Realization, SensitivityContext, SensitivitySettings};

/// Owns everything a [`ProcessContext`] borrows
pub(crate) struct Harness {
    pub reference: ReferenceData,
    pub settings: SensitivitySettings,
    pub cache: DrawCache,
    pub subject: Realization,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(SensitivitySettings::deterministic())
    }

    pub fn with_settings(settings: SensitivitySettings) -> Self {
        Self {
            reference: ReferenceData::builtin().unwrap(),
            settings,
            cache: DrawCache::new(42),
            subject: Realization::new("stand", 0),
        }
    }

    pub fn ctx(&mut self) -> ProcessContext<'_> {
        ProcessContext::new(
            &self.reference,
            SensitivityContext::new(&self.settings, &mut self.cache, &self.subject),
        )
    }
}
