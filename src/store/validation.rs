//! Recursive validation predicates and review lists.
//!
//! Every predicate evaluates an element's own check and, with
//! `include_children`, ORs it with the own checks of its whole subtree.
//! A leaf is judged by its own check alone; an empty child scan never
//! hides a failing node.

use std::collections::BTreeSet;

use tracing::warn;

use super::{ElementTable, ObjectStore};
use crate::model::{Element, VolumeState};
use crate::Result;

impl ElementTable {
    fn subtree_any(&self, guid: &str, include_children: bool, check: impl Fn(&Element) -> bool) -> Result<bool> {
        let root = self.key(guid)?;
        if check(&self.elements[root.0]) {
            return Ok(true);
        }
        if !include_children {
            return Ok(false);
        }
        Ok(self
            .descendants(root, |_| true)
            .into_iter()
            .any(|k| check(&self.elements[k.0])))
    }
}

impl ObjectStore {
    /// No layers and no listed materials.
    pub fn has_undefined_materials(&self, guid: &str, include_children: bool) -> Result<bool> {
        self.read_table()
            .subtree_any(guid, include_children, Element::has_no_material_information)
    }

    /// Volume never measured. A measured zero is reported by
    /// [`has_zero_volume`](Self::has_zero_volume) instead.
    pub fn has_undefined_volume(&self, guid: &str, include_children: bool) -> Result<bool> {
        self.read_table().subtree_any(guid, include_children, |e| {
            e.geometry().volume_state() == VolumeState::Unmeasured
        })
    }

    /// Volume measured as exactly zero.
    pub fn has_zero_volume(&self, guid: &str, include_children: bool) -> Result<bool> {
        self.read_table().subtree_any(guid, include_children, |e| {
            e.geometry().volume_state() == VolumeState::Zero
        })
    }

    /// More than one listed material without layers, or duplicate listings.
    pub fn has_redundant_materials(&self, guid: &str, include_children: bool) -> Result<bool> {
        self.read_table()
            .subtree_any(guid, include_children, Element::has_redundant_material_information)
    }

    /// At least one layer without a material name.
    pub fn has_undefined_layers(&self, guid: &str, include_children: bool) -> Result<bool> {
        self.read_table()
            .subtree_any(guid, include_children, Element::has_unnamed_layer)
    }

    // ========================================================================
    // Review lists
    // ========================================================================

    /// Registered materials no element refers to, sorted.
    pub fn get_orphaned_materials(&self) -> Vec<String> {
        let names = self.get_material_names();
        let table = self.read_table();
        let used: BTreeSet<&str> = table
            .elements
            .iter()
            .flat_map(|e| e.all_material_names())
            .collect();
        names.into_iter().filter(|n| !used.contains(n.as_str())).collect()
    }

    /// Elements without any material information.
    pub fn get_object_guids_without_material(&self) -> Vec<String> {
        self.guids_where(Element::has_no_material_information)
    }

    /// Elements whose listed materials do not reconcile with their layers.
    pub fn get_object_guids_with_partial_material_definition(&self) -> Vec<String> {
        self.guids_where(Element::has_partial_material_definition)
    }

    pub fn get_object_guids_with_undefined_layers(&self) -> Vec<String> {
        self.guids_where(Element::has_unnamed_layer)
    }

    /// Elements without a product binding after resolution.
    pub fn get_object_guids_without_product(&self) -> Vec<String> {
        self.guids_where(|e| e.binding().is_none())
    }

    /// Log every finding that needs manual review. Returns true when
    /// there is at least one.
    pub fn check_for_warnings_and_errors(&self) -> bool {
        let checks = [
            ("orphaned materials", self.get_orphaned_materials()),
            ("elements without material", self.get_object_guids_without_material()),
            ("partial material definitions", self.get_object_guids_with_partial_material_definition()),
            ("layers without material", self.get_object_guids_with_undefined_layers()),
        ];

        let mut found = false;
        for (what, items) in &checks {
            if !items.is_empty() {
                found = true;
                warn!(count = items.len(), items = ?items, "{what}");
            }
        }
        found
    }

    fn guids_where(&self, predicate: impl Fn(&Element) -> bool) -> Vec<String> {
        self.read_table()
            .elements
            .iter()
            .filter(|e| predicate(e))
            .map(|e| e.global_id().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::model::ElementDescriptor;
    use crate::store::ObjectStore;
    use crate::Error;

    /// root → mid → leaf, failing condition only at the leaf.
    fn three_levels(leaf: ElementDescriptor) -> ObjectStore {
        let store = ObjectStore::new();
        store.add_element(ElementDescriptor::new(1, "root").with_material("concrete").with_volume(1.0));
        store.add_element(ElementDescriptor::new(2, "mid").child_of("root").with_material("concrete").with_volume(1.0));
        store.add_element(leaf.child_of("mid"));
        store
    }

    #[test]
    fn test_undefined_materials_found_at_depth() {
        let store = three_levels(ElementDescriptor::new(3, "leaf").with_volume(1.0));
        assert!(!store.has_undefined_materials("root", false).unwrap());
        assert!(store.has_undefined_materials("root", true).unwrap());
        assert!(store.has_undefined_materials("leaf", true).unwrap());
        assert!(store.has_undefined_materials("leaf", false).unwrap());
    }

    #[test]
    fn test_own_failure_not_masked_by_children() {
        let store = ObjectStore::new();
        store.add_element(ElementDescriptor::new(1, "root"));
        store.add_element(ElementDescriptor::new(2, "child").child_of("root").with_material("steel"));
        assert!(store.has_undefined_materials("root", true).unwrap());
        assert!(store.has_undefined_materials("root", false).unwrap());
    }

    #[test]
    fn test_volume_states_are_distinct() {
        let store = three_levels(ElementDescriptor::new(3, "leaf").with_material("steel"));
        assert!(store.has_undefined_volume("root", true).unwrap());
        assert!(!store.has_zero_volume("root", true).unwrap());

        let store = three_levels(ElementDescriptor::new(3, "leaf").with_material("steel").with_volume(0.0));
        assert!(!store.has_undefined_volume("root", true).unwrap());
        assert!(store.has_zero_volume("root", true).unwrap());
    }

    #[test]
    fn test_redundant_and_undefined_layers() {
        let store = three_levels(
            ElementDescriptor::new(3, "leaf").with_material("steel").with_material("zinc").with_layer("", 1.0),
        );
        assert!(!store.has_redundant_materials("root", true).unwrap());
        assert!(store.has_undefined_layers("root", true).unwrap());
        assert!(!store.has_undefined_layers("root", false).unwrap());

        let store = three_levels(ElementDescriptor::new(3, "leaf").with_material("steel").with_material("zinc"));
        assert!(store.has_redundant_materials("root", true).unwrap());
    }

    #[test]
    fn test_unknown_guid_is_not_found() {
        let store = ObjectStore::new();
        assert!(matches!(store.has_undefined_volume("x", true), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_review_lists() {
        let store = ObjectStore::new();
        store.add_material("glass");
        store.add_element(ElementDescriptor::new(1, "bare"));
        store.add_element(
            ElementDescriptor::new(2, "mixed").with_layer("brick", 1.0).with_layer("wool", 1.0).with_material("brick"),
        );

        assert_eq!(store.get_orphaned_materials(), vec!["glass"]);
        assert_eq!(store.get_object_guids_without_material(), vec!["bare"]);
        assert_eq!(store.get_object_guids_with_partial_material_definition(), vec!["mixed"]);
        assert_eq!(store.get_object_guids_without_product(), vec!["bare", "mixed"]);
        assert!(store.check_for_warnings_and_errors());
    }

    #[test]
    fn test_clean_store_has_no_warnings() {
        let store = ObjectStore::new();
        store.add_element(ElementDescriptor::new(1, "a").with_material("steel").with_volume(1.0));
        assert!(!store.check_for_warnings_and_errors());
    }
}
