use std::sync::Arc;

use crate::error::RegistryError;

use super::analyzer::Analyzer;

/// The set of analyzers a pass executes, ordered by name.
pub struct PipelineRegistry {
    pipelines: Vec<Arc<dyn Analyzer>>,
}

impl PipelineRegistry {
    /// Registry of every built-in analyzer.
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::from_pipelines(crate::analyzers::builtin_analyzers())
    }

    /// Builds a registry from explicit analyzers. Names must be unique.
    pub fn from_pipelines(mut pipelines: Vec<Arc<dyn Analyzer>>) -> Result<Self, RegistryError> {
        pipelines.sort_by(|a, b| a.name().cmp(b.name()));
        if let Some(pair) = pipelines.windows(2).find(|w| w[0].name() == w[1].name()) {
            return Err(RegistryError::DuplicateName(pair[0].name().to_string()));
        }
        Ok(Self { pipelines })
    }

    /// Every registered analyzer, in execution order.
    pub fn all_pipelines(&self) -> &[Arc<dyn Analyzer>] {
        &self.pipelines
    }

    pub fn get(&self, name: &str) -> Result<&Arc<dyn Analyzer>, RegistryError> {
        self.pipelines
            .iter()
            .find(|p| p.name() == name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.pipelines.iter().map(|p| p.name()).collect()
    }

    /// A registry restricted to the named analyzers, preserving order.
    pub fn select(&self, names: &[String]) -> Result<Self, RegistryError> {
        let mut selected = Vec::with_capacity(names.len());
        for name in names {
            selected.push(Arc::clone(self.get(name)?));
        }
        Self::from_pipelines(selected)
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}
