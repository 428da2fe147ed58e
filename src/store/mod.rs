//! # Object store
//!
//! Single source of truth for the element tree and the material registry.
//!
//! Elements live in one flat table in insertion order. Children find their
//! parent by global id only; a secondary parent → children index is
//! updated on every insert, so forward references to parents that have
//! not been added yet resolve as soon as the parent arrives.
//!
//! ## Locking
//!
//! - The element table and both of its indexes sit behind one `RwLock`,
//!   so a product binding and the bindings it implies on descendants are
//!   written in a single critical section.
//! - The material registry has its own lock. It is never held while the
//!   element lock is taken.

pub mod validation;

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::model::*;
use crate::product::{ProductRecord, ProfileSet};
use crate::{Error, Result};

// ============================================================================
// ObjectStore
// ============================================================================

/// In-memory store for one processing run. Cloning yields another handle
/// to the same store.
#[derive(Clone, Default)]
pub struct ObjectStore {
    inner: Arc<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    elements: RwLock<ElementTable>,
    materials: RwLock<BTreeMap<String, Material>>,
    spaces: RwLock<Vec<Element>>,
}

#[derive(Default)]
pub(crate) struct ElementTable {
    elements: Vec<Element>,
    /// global id → first element inserted with it
    by_guid: HashMap<String, ElementKey>,
    /// parent global id → direct children
    children: HashMap<String, Vec<ElementKey>>,
}

impl ElementTable {
    fn get(&self, guid: &str) -> Option<&Element> {
        self.by_guid.get(guid).map(|k| &self.elements[k.0])
    }

    fn key(&self, guid: &str) -> Result<ElementKey> {
        self.by_guid
            .get(guid)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("Element {guid}")))
    }

    fn child_keys(&self, guid: &str) -> &[ElementKey] {
        self.children.get(guid).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Descendants of `root` in breadth-first order, root excluded.
    /// `descend` decides whether the subtree below a visited node is walked.
    /// Guards against cyclic parent references in malformed input.
    fn descendants(&self, root: ElementKey, mut descend: impl FnMut(&Element) -> bool) -> Vec<ElementKey> {
        let mut visited = HashSet::from([root]);
        let mut queue = std::collections::VecDeque::from([root]);
        let mut out = Vec::new();

        while let Some(key) = queue.pop_front() {
            let element = &self.elements[key.0];
            if key != root && !descend(element) {
                continue;
            }
            for &child in self.child_keys(element.global_id()) {
                if visited.insert(child) {
                    out.push(child);
                    queue.push_back(child);
                }
            }
        }
        out
    }

    fn bind(&mut self, root: ElementKey, record: Arc<ProductRecord>) -> usize {
        let guid = self.elements[root.0].global_id().to_string();
        let inherited: Vec<ElementKey> = self
            .descendants(root, |e| !is_direct(e))
            .into_iter()
            .filter(|k| !is_direct(&self.elements[k.0]))
            .collect();

        self.elements[root.0].set_binding(Some(ProductBinding {
            record: Arc::clone(&record),
            source: BindingSource::Direct,
        }));
        for key in &inherited {
            self.elements[key.0].set_binding(Some(ProductBinding {
                record: Arc::clone(&record),
                source: BindingSource::Inherited { from: guid.clone() },
            }));
        }

        debug!(guid = %guid, product = %record.id, inherited = inherited.len(), "bound product");
        1 + inherited.len()
    }
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard all elements, materials and spaces.
    pub fn reset(&self) {
        *self.inner.elements.write() = ElementTable::default();
        self.inner.materials.write().clear();
        self.inner.spaces.write().clear();
    }

    // ========================================================================
    // Ingestion
    // ========================================================================

    /// Add an element. Every call creates a new node; keeping global ids
    /// unique is the caller's job. Materials the element names are
    /// registered on the way in.
    pub fn add_element(&self, descriptor: ElementDescriptor) -> ElementKey {
        for layer in descriptor.layers.iter().filter(|l| l.has_material()) {
            self.add_material(&layer.material);
        }
        for source in descriptor.materials.iter().filter(|s| !s.name.trim().is_empty()) {
            self.add_material(&source.name);
        }

        let element = Element::from(descriptor);
        let mut table = self.inner.elements.write();
        let key = ElementKey(table.elements.len());

        let guid = element.global_id().to_string();
        if table.by_guid.contains_key(&guid) {
            warn!(guid = %guid, "duplicate global id, lookups keep the first element");
        } else {
            table.by_guid.insert(guid, key);
        }
        if let Some(parent) = element.parent_id() {
            table.children.entry(parent.to_string()).or_default().push(key);
        }
        table.elements.push(element);
        key
    }

    pub fn add_elements(&self, descriptors: impl IntoIterator<Item = ElementDescriptor>) -> Vec<ElementKey> {
        descriptors.into_iter().map(|d| self.add_element(d)).collect()
    }

    /// Register a material name. Returns true when the name was new;
    /// concurrent first use of one name creates exactly one instance.
    pub fn add_material(&self, name: &str) -> bool {
        match self.inner.materials.write().entry(name.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Material::new(name));
                true
            }
        }
    }

    /// Bind (or clear) the external specification of a material.
    pub fn set_material_spec(&self, name: &str, spec: Option<Arc<MaterialSpec>>) -> Result<()> {
        let mut materials = self.inner.materials.write();
        let material = materials
            .get_mut(name)
            .ok_or_else(|| Error::NotFound(format!("Material {name}")))?;
        material.set_spec(spec);
        Ok(())
    }

    /// Spaces carry floor area only and are kept outside the element tree.
    pub fn add_space(&self, descriptor: ElementDescriptor) {
        self.inner.spaces.write().push(Element::from(descriptor));
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    pub fn element_count(&self) -> usize {
        self.inner.elements.read().elements.len()
    }

    pub fn get_element(&self, guid: &str) -> Option<Element> {
        self.inner.elements.read().get(guid).cloned()
    }

    pub fn get_element_by_key(&self, key: ElementKey) -> Option<Element> {
        self.inner.elements.read().elements.get(key.0).cloned()
    }

    /// All elements in insertion order.
    pub fn elements(&self) -> Vec<Element> {
        self.inner.elements.read().elements.clone()
    }

    /// Direct children of `parent_guid` (not the full subtree).
    pub fn get_children(&self, parent_guid: &str) -> Vec<Element> {
        let table = self.inner.elements.read();
        table
            .child_keys(parent_guid)
            .iter()
            .map(|k| table.elements[k.0].clone())
            .collect()
    }

    pub fn get_material_by_name(&self, name: &str) -> Option<Material> {
        self.inner.materials.read().get(name).cloned()
    }

    /// Registered material names, sorted.
    pub fn get_material_names(&self) -> Vec<String> {
        self.inner.materials.read().keys().cloned().collect()
    }

    pub fn materials(&self) -> Vec<Material> {
        self.inner.materials.read().values().cloned().collect()
    }

    pub fn get_spaces(&self) -> Vec<Element> {
        self.inner.spaces.read().clone()
    }

    /// Sum of the measured floor areas of all spaces.
    pub fn get_total_floor_area(&self) -> f64 {
        self.inner
            .spaces
            .read()
            .iter()
            .filter_map(|s| s.geometry().floor_area())
            .sum()
    }

    // ========================================================================
    // Aggregation
    // ========================================================================

    /// Normalized element types present in the store, sorted.
    pub fn get_distinct_product_types(&self) -> Vec<String> {
        let table = self.inner.elements.read();
        let types: BTreeSet<&str> = table.elements.iter().map(|e| e.element_type()).collect();
        types.into_iter().map(str::to_string).collect()
    }

    pub fn get_elements_by_product_type(&self, element_type: &str) -> Vec<Element> {
        self.filter_elements(|e| e.element_type() == element_type)
    }

    pub fn get_elements_by_material_name(&self, material: &str) -> Vec<Element> {
        self.filter_elements(|e| e.references_material(material))
    }

    /// Distinct material names used by elements of one type, sorted.
    pub fn get_materials_by_product_type(&self, element_type: &str) -> Vec<String> {
        let table = self.inner.elements.read();
        let names: BTreeSet<&str> = table
            .elements
            .iter()
            .filter(|e| e.element_type() == element_type)
            .flat_map(|e| e.all_material_names())
            .filter(|n| !n.trim().is_empty())
            .collect();
        names.into_iter().map(str::to_string).collect()
    }

    /// Total volume of the elements referring to `material` in a layer or
    /// a listed material. `Some(0.0)` when nothing refers to it, `None`
    /// when referring elements exist but none has a measured volume.
    pub fn get_total_volume_of_material(&self, material: &str) -> Option<f64> {
        self.total_volume(|e| e.references_material(material))
    }

    /// Total volume of the elements of one normalized type, with the same
    /// absence rules as [`get_total_volume_of_material`](Self::get_total_volume_of_material).
    pub fn get_total_volume_of_product_type(&self, element_type: &str) -> Option<f64> {
        self.total_volume(|e| e.element_type() == element_type)
    }

    fn total_volume(&self, predicate: impl Fn(&Element) -> bool) -> Option<f64> {
        let table = self.inner.elements.read();
        let mut matched = false;
        let mut total: Option<f64> = None;
        for element in table.elements.iter().filter(|e| predicate(e)) {
            matched = true;
            if let Some(v) = element.volume() {
                total = Some(total.unwrap_or(0.0) + v);
            }
        }
        if matched { total } else { Some(0.0) }
    }

    fn filter_elements(&self, predicate: impl Fn(&Element) -> bool) -> Vec<Element> {
        self.inner
            .elements
            .read()
            .elements
            .iter()
            .filter(|e| predicate(e))
            .cloned()
            .collect()
    }

    // ========================================================================
    // Product binding
    // ========================================================================

    /// Bind `record` to an element and to every descendant that has no
    /// direct binding of its own. Descendants record which ancestor their
    /// binding came from. Returns the number of elements bound.
    pub fn bind_product(&self, guid: &str, record: Arc<ProductRecord>) -> Result<usize> {
        let mut table = self.inner.elements.write();
        let root = table.key(guid)?;
        Ok(table.bind(root, record))
    }

    /// [`bind_product`](Self::bind_product) addressed by table key, so an
    /// element sharing its global id with an earlier one is still reachable.
    pub(crate) fn bind_product_at(&self, key: ElementKey, record: Arc<ProductRecord>) -> Result<usize> {
        let mut table = self.inner.elements.write();
        if key.0 >= table.elements.len() {
            return Err(Error::NotFound(format!("Element {key}")));
        }
        Ok(table.bind(key, record))
    }

    /// Remove an element's binding together with every descendant binding
    /// that was implied by it. Returns the number of elements unbound.
    pub fn unbind_product(&self, guid: &str) -> Result<usize> {
        let mut table = self.inner.elements.write();
        let root = table.key(guid)?;
        if table.elements[root.0].binding().is_none() {
            return Ok(0);
        }

        let implied: Vec<ElementKey> = table
            .descendants(root, |e| !is_direct(e))
            .into_iter()
            .filter(|k| inherited_from(&table.elements[k.0], guid))
            .collect();

        table.elements[root.0].set_binding(None);
        for key in &implied {
            table.elements[key.0].set_binding(None);
        }

        debug!(guid, cleared = implied.len(), "unbound product");
        Ok(1 + implied.len())
    }

    pub(crate) fn set_resolution_state(&self, key: ElementKey, state: ResolutionState) {
        if let Some(element) = self.inner.elements.write().elements.get_mut(key.0) {
            element.set_resolution_state(state);
        }
    }

    /// Product quantity an element needs; see [`Element::required_number_of_units`].
    pub fn required_number_of_units(&self, guid: &str) -> Result<Option<f64>> {
        let table = self.inner.elements.read();
        let key = table.key(guid)?;
        Ok(table.elements[key.0].required_number_of_units())
    }

    /// Scale factor of `set` for an element; see [`Element::required_scale_factor`].
    pub fn required_scale_factor(&self, guid: &str, set: &ProfileSet, conversion: f64) -> Result<Option<f64>> {
        let table = self.inner.elements.read();
        let key = table.key(guid)?;
        Ok(table.elements[key.0].required_scale_factor(set, conversion))
    }

    pub(crate) fn read_table(&self) -> parking_lot::RwLockReadGuard<'_, ElementTable> {
        self.inner.elements.read()
    }
}

fn is_direct(e: &Element) -> bool {
    matches!(e.binding(), Some(ProductBinding { source: BindingSource::Direct, .. }))
}

fn inherited_from(e: &Element, guid: &str) -> bool {
    matches!(
        e.binding(),
        Some(ProductBinding { source: BindingSource::Inherited { from }, .. }) if from == guid
    )
}

impl std::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("elements", &self.element_count())
            .field("materials", &self.inner.materials.read().len())
            .field("spaces", &self.inner.spaces.read().len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
