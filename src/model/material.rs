//! Materials referenced by elements.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// External material specification a material can be bound to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialSpec {
    pub id: String,
    pub name: String,
    /// kg/m³, when the source database provides it.
    pub density: Option<f64>,
}

/// A distinct, case-sensitive material name known to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    name: String,
    spec: Option<Arc<MaterialSpec>>,
}

impl Material {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), spec: None }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> Option<&Arc<MaterialSpec>> {
        self.spec.as_ref()
    }

    pub(crate) fn set_spec(&mut self, spec: Option<Arc<MaterialSpec>>) {
        self.spec = spec;
    }
}
