//! Read-only snapshot of a store for reporting.
//!
//! ```text
//! ObjectStore → StoreSnapshot::from_store() → write_json()
//!   → report renderer, spreadsheet export, review tooling
//! ```
//!
//! The snapshot copies query results out of the store; nothing in it
//! refers back, so it can be written while the store keeps changing.

use std::collections::BTreeMap;
use std::io::Write;

use serde::Serialize;

use crate::model::BindingSource;
use crate::store::ObjectStore;
use crate::Result;

/// Aggregation and validation results of one store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreSnapshot {
    pub element_count: usize,
    pub material_count: usize,
    pub space_count: usize,
    pub total_floor_area: f64,
    pub product_types: Vec<String>,
    /// `None` where elements exist but none has a measured volume.
    pub volume_per_material: BTreeMap<String, Option<f64>>,
    pub volume_per_type: BTreeMap<String, Option<f64>>,
    pub bindings: Vec<BindingRow>,
    pub review: ReviewLists,
}

/// One bound element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BindingRow {
    pub guid: String,
    pub product_id: String,
    pub product_name: String,
    /// Ancestor the binding was inherited from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inherited_from: Option<String>,
    pub required_units: Option<f64>,
}

/// Everything that needs manual follow-up.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReviewLists {
    pub orphaned_materials: Vec<String>,
    pub without_material: Vec<String>,
    pub partial_material_definition: Vec<String>,
    pub undefined_layers: Vec<String>,
    pub without_product: Vec<String>,
}

impl ReviewLists {
    pub fn is_empty(&self) -> bool {
        self.orphaned_materials.is_empty()
            && self.without_material.is_empty()
            && self.partial_material_definition.is_empty()
            && self.undefined_layers.is_empty()
            && self.without_product.is_empty()
    }
}

impl StoreSnapshot {
    pub fn from_store(store: &ObjectStore) -> Self {
        let product_types = store.get_distinct_product_types();
        let materials = store.get_material_names();

        let volume_per_material = materials
            .iter()
            .map(|m| (m.clone(), store.get_total_volume_of_material(m)))
            .collect();
        let volume_per_type = product_types
            .iter()
            .map(|t| (t.clone(), store.get_total_volume_of_product_type(t)))
            .collect();

        let bindings = store
            .elements()
            .iter()
            .filter_map(|e| {
                let binding = e.binding()?;
                Some(BindingRow {
                    guid: e.global_id().to_string(),
                    product_id: binding.record.id.clone(),
                    product_name: binding.record.name.clone(),
                    inherited_from: match &binding.source {
                        BindingSource::Direct => None,
                        BindingSource::Inherited { from } => Some(from.clone()),
                    },
                    required_units: e.required_number_of_units(),
                })
            })
            .collect();

        Self {
            element_count: store.element_count(),
            material_count: materials.len(),
            space_count: store.get_spaces().len(),
            total_floor_area: store.get_total_floor_area(),
            product_types,
            volume_per_material,
            volume_per_type,
            bindings,
            review: ReviewLists {
                orphaned_materials: store.get_orphaned_materials(),
                without_material: store.get_object_guids_without_material(),
                partial_material_definition: store.get_object_guids_with_partial_material_definition(),
                undefined_layers: store.get_object_guids_with_undefined_layers(),
                without_product: store.get_object_guids_without_product(),
            },
        }
    }

    /// Pretty-printed JSON followed by a newline.
    pub fn write_json(&self, writer: &mut dyn Write) -> Result<()> {
        serde_json::to_writer_pretty(&mut *writer, self)?;
        writeln!(writer)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::{ElementDescriptor, Geometry};
    use crate::product::{ProductRecord, ProductUnit};

    fn populated() -> ObjectStore {
        let store = ObjectStore::new();
        store.add_element(
            ElementDescriptor::new(1, "slab")
                .typed("IfcSlab")
                .with_geometry(Geometry::new().with_volume(6.0).with_floor_area(20.0))
                .with_material("concrete"),
        );
        store.add_element(ElementDescriptor::new(2, "rebar").typed("IfcReinforcingBar").child_of("slab"));
        store.add_material("glass");
        store.add_space(ElementDescriptor::new(3, "room").with_geometry(Geometry::new().with_floor_area(18.0)));
        store
            .bind_product("slab", Arc::new(ProductRecord::new("p1", "hollow core slab", "23.1", ProductUnit::M3)))
            .unwrap();
        store
    }

    #[test]
    fn test_snapshot_collects_queries() {
        let snapshot = StoreSnapshot::from_store(&populated());
        assert_eq!(snapshot.element_count, 2);
        assert_eq!(snapshot.material_count, 2);
        assert_eq!(snapshot.space_count, 1);
        assert_eq!(snapshot.total_floor_area, 18.0);
        assert_eq!(snapshot.product_types, vec!["ReinforcingBar", "Slab"]);
        assert_eq!(snapshot.volume_per_material["concrete"], Some(6.0));
        assert_eq!(snapshot.volume_per_material["glass"], Some(0.0));
        assert_eq!(snapshot.volume_per_type["ReinforcingBar"], None);
        assert_eq!(snapshot.review.orphaned_materials, vec!["glass"]);
        assert_eq!(snapshot.review.without_material, vec!["rebar"]);
        assert!(snapshot.review.without_product.is_empty());
    }

    #[test]
    fn test_binding_rows() {
        let snapshot = StoreSnapshot::from_store(&populated());
        assert_eq!(snapshot.bindings.len(), 2);
        assert_eq!(snapshot.bindings[0].inherited_from, None);
        assert_eq!(snapshot.bindings[0].required_units, Some(6.0));
        assert_eq!(snapshot.bindings[1].inherited_from.as_deref(), Some("slab"));
    }

    #[test]
    fn test_write_json() {
        let mut out = Vec::new();
        StoreSnapshot::from_store(&populated()).write_json(&mut out).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json["element_count"], 2);
        assert_eq!(json["bindings"][0]["product_id"], "p1");
        assert!(json["bindings"][0].get("inherited_from").is_none());
        assert_eq!(json["bindings"][1]["inherited_from"], "slab");
        assert!(out.ends_with(b"\n"));
    }
}
