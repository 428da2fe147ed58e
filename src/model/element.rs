//! Building elements: the nodes of the object tree.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{Geometry, PropertyMap, Value};
use crate::product::{ProductRecord, ProductUnit, ProfileSet};
use crate::scaling::Scaler;

/// Position of an element in the store's flat table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementKey(pub usize);

impl fmt::Display for ElementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A material with its relative thickness inside a layered element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Empty when the model did not name the layer material.
    pub material: String,
    pub thickness: f64,
}

impl Layer {
    pub fn new(material: impl Into<String>, thickness: f64) -> Self {
        Self { material: material.into(), thickness }
    }

    pub fn has_material(&self) -> bool {
        !self.material.trim().is_empty()
    }
}

/// A material listed on an element outside of any layer set, together
/// with where the listing came from (material list, single association, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MaterialSource {
    pub name: String,
    pub guid: Option<String>,
    pub source: String,
}

/// Progress of product resolution for one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolutionState {
    Unresolved,
    Resolving,
    Bound,
}

/// Why an element carries a product binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BindingSource {
    /// Bound to this element itself.
    Direct,
    /// Implied by the binding of an ancestor (global id).
    Inherited { from: String },
}

/// A resolved product attached to an element.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductBinding {
    pub record: Arc<ProductRecord>,
    pub source: BindingSource,
}

/// Raw element as handed over by the model parser.
///
/// Parents may be referenced before they are added.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ElementDescriptor {
    pub id: u64,
    pub global_id: String,
    pub name: Option<String>,
    pub element_type: Option<String>,
    pub parent_id: Option<String>,
    #[serde(default)]
    pub geometry: Geometry,
    #[serde(default)]
    pub layers: Vec<Layer>,
    #[serde(default)]
    pub materials: Vec<MaterialSource>,
    #[serde(default)]
    pub properties: PropertyMap,
}

impl ElementDescriptor {
    pub fn new(id: u64, global_id: impl Into<String>) -> Self {
        Self { id, global_id: global_id.into(), ..Default::default() }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn typed(mut self, element_type: impl Into<String>) -> Self {
        self.element_type = Some(element_type.into());
        self
    }

    pub fn child_of(mut self, parent: impl Into<String>) -> Self {
        self.parent_id = Some(parent.into());
        self
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.geometry.set_volume(volume);
        self
    }

    pub fn with_layer(mut self, material: impl Into<String>, thickness: f64) -> Self {
        self.layers.push(Layer::new(material, thickness));
        self
    }

    pub fn with_material(mut self, name: impl Into<String>) -> Self {
        self.materials.push(MaterialSource {
            name: name.into(),
            guid: None,
            source: "ifc".into(),
        });
        self
    }

    pub fn with_material_source(mut self, source: MaterialSource) -> Self {
        self.materials.push(source);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Canonical element type: implementation suffix `Impl` and schema prefix
/// `Ifc` stripped, `"undefined type"` when missing.
pub fn normalize_type(raw: Option<&str>) -> String {
    match raw {
        None => "undefined type".to_string(),
        Some(t) => {
            let t = t.strip_suffix("Impl").unwrap_or(t);
            t.strip_prefix("Ifc").unwrap_or(t).to_string()
        }
    }
}

/// One physical node of the building model.
#[derive(Debug, Clone)]
pub struct Element {
    id: u64,
    global_id: String,
    name: String,
    element_type: String,
    parent_id: Option<String>,
    geometry: Geometry,
    layers: Vec<Layer>,
    materials: Vec<MaterialSource>,
    properties: PropertyMap,
    binding: Option<ProductBinding>,
    state: ResolutionState,
}

impl From<ElementDescriptor> for Element {
    fn from(d: ElementDescriptor) -> Self {
        Self {
            id: d.id,
            element_type: normalize_type(d.element_type.as_deref()),
            name: d.name.unwrap_or_else(|| "undefined name".to_string()),
            global_id: d.global_id,
            parent_id: d.parent_id,
            geometry: d.geometry,
            layers: d.layers,
            materials: d.materials,
            properties: d.properties,
            binding: None,
            state: ResolutionState::Unresolved,
        }
    }
}

impl Element {
    pub fn id(&self) -> u64 { self.id }
    pub fn global_id(&self) -> &str { &self.global_id }
    pub fn name(&self) -> &str { &self.name }
    pub fn element_type(&self) -> &str { &self.element_type }
    pub fn parent_id(&self) -> Option<&str> { self.parent_id.as_deref() }
    pub fn geometry(&self) -> &Geometry { &self.geometry }
    pub fn layers(&self) -> &[Layer] { &self.layers }
    pub fn material_sources(&self) -> &[MaterialSource] { &self.materials }
    pub fn properties(&self) -> &PropertyMap { &self.properties }
    pub fn binding(&self) -> Option<&ProductBinding> { self.binding.as_ref() }
    pub fn resolution_state(&self) -> ResolutionState { self.state }

    pub fn volume(&self) -> Option<f64> {
        self.geometry.volume()
    }

    pub fn product(&self) -> Option<&Arc<ProductRecord>> {
        self.binding.as_ref().map(|b| &b.record)
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub(crate) fn set_binding(&mut self, binding: Option<ProductBinding>) {
        self.state = if binding.is_some() { ResolutionState::Bound } else { ResolutionState::Unresolved };
        self.binding = binding;
    }

    pub(crate) fn set_resolution_state(&mut self, state: ResolutionState) {
        self.state = state;
    }

    /// Listed material names filtered by source; all of them for `None`.
    pub fn material_names_by_source(&self, source: Option<&str>) -> Vec<&str> {
        self.materials
            .iter()
            .filter(|m| source.is_none_or(|s| m.source == s))
            .map(|m| m.name.as_str())
            .collect()
    }

    /// Every material name the element refers to, layers first.
    pub fn all_material_names(&self) -> impl Iterator<Item = &str> {
        self.layers
            .iter()
            .map(|l| l.material.as_str())
            .chain(self.materials.iter().map(|m| m.name.as_str()))
    }

    pub fn references_material(&self, name: &str) -> bool {
        self.all_material_names().any(|m| m == name)
    }

    pub fn has_duplicate_material_names(&self) -> bool {
        let mut seen = HashSet::new();
        self.materials.iter().any(|m| !seen.insert(m.name.as_str()))
    }

    // ------------------------------------------------------------------
    // Own checks; the store combines them over the subtree.
    // ------------------------------------------------------------------

    pub fn has_no_material_information(&self) -> bool {
        self.layers.is_empty() && self.materials.is_empty()
    }

    /// Several listed materials without a layer set to tell them apart,
    /// or the same material listed twice.
    pub fn has_redundant_material_information(&self) -> bool {
        (self.layers.is_empty() && self.materials.len() > 1) || self.has_duplicate_material_names()
    }

    pub fn has_unnamed_layer(&self) -> bool {
        self.layers.iter().any(|l| !l.has_material())
    }

    /// Layers and listed materials that do not describe the same set of
    /// materials.
    pub fn has_partial_material_definition(&self) -> bool {
        if self.layers.is_empty() || self.materials.is_empty() {
            return false;
        }
        let layered: HashSet<&str> = self
            .layers
            .iter()
            .filter(|l| l.has_material())
            .map(|l| l.material.as_str())
            .collect();
        let listed: HashSet<&str> = self
            .materials
            .iter()
            .map(|m| m.name.as_str())
            .filter(|name| !name.trim().is_empty())
            .collect();
        layered != listed
    }

    /// Volume attributed to each material entry, layers first.
    ///
    /// Layers share the layered part by relative thickness, listed
    /// materials share the rest evenly. An element with both splits its
    /// volume half and half between the two groups.
    pub fn material_volumes(&self) -> Vec<(&str, Option<f64>)> {
        let volume = self.volume();
        let (layer_share, listed_share) = match (self.layers.is_empty(), self.materials.is_empty()) {
            (false, false) => (0.5, 0.5),
            (false, true) => (1.0, 0.0),
            (true, false) => (0.0, 1.0),
            (true, true) => return Vec::new(),
        };

        let total_thickness: f64 = self.layers.iter().map(|l| l.thickness).sum();
        let layer_count = self.layers.len() as f64;
        let layers = self.layers.iter().map(|l| {
            let ratio = if total_thickness > 0.0 {
                l.thickness / total_thickness
            } else {
                1.0 / layer_count
            };
            (l.material.as_str(), volume.map(|v| v * layer_share * ratio))
        });

        let listed_count = self.materials.len() as f64;
        let listed = self
            .materials
            .iter()
            .map(|m| (m.name.as_str(), volume.map(|v| v * listed_share / listed_count)));

        layers.chain(listed).collect()
    }

    /// Amount of the bound product needed for this element, in the
    /// product's declared unit. `None` without a binding, without the
    /// measurements the unit needs, or for mass units (no density data).
    pub fn required_number_of_units(&self) -> Option<f64> {
        let record = self.product()?;
        let g = &self.geometry;
        let units = match record.unit {
            ProductUnit::M1 => g.volume()? / g.floor_area()?,
            ProductUnit::M2 => g.floor_area()?,
            ProductUnit::M3 => g.volume()?,
            ProductUnit::Kg => return None,
        };
        units.is_finite().then_some(units)
    }

    /// Factor to correct `set`'s profile quantities from its reference
    /// dimensions to this element's. A set without a scaler needs no
    /// correction.
    pub fn required_scale_factor(&self, set: &ProfileSet, conversion: f64) -> Option<f64> {
        let Some(scaler) = &set.scaler else {
            return Some(1.0);
        };
        let dims = self.geometry.scale_dims(set.dimensionality())?;
        scaler.scale_with_conversion(dims, conversion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scaling::{Bounds, ScalerKind, ScalingUnit};

    fn bound(element: &mut Element, unit: ProductUnit) {
        let record = ProductRecord::new("p", "product", "21.1", unit);
        element.set_binding(Some(ProductBinding { record: Arc::new(record), source: BindingSource::Direct }));
    }

    #[test]
    fn test_normalize_type() {
        assert_eq!(normalize_type(Some("IfcWallImpl")), "Wall");
        assert_eq!(normalize_type(Some("IfcWallStandardCase")), "WallStandardCase");
        assert_eq!(normalize_type(Some("Slab")), "Slab");
        assert_eq!(normalize_type(None), "undefined type");
    }

    #[test]
    fn test_missing_name_defaults() {
        let e = Element::from(ElementDescriptor::new(1, "g1"));
        assert_eq!(e.name(), "undefined name");
        assert_eq!(e.resolution_state(), ResolutionState::Unresolved);
    }

    #[test]
    fn test_material_information_checks() {
        let empty = Element::from(ElementDescriptor::new(1, "a"));
        assert!(empty.has_no_material_information());

        let listed = Element::from(ElementDescriptor::new(2, "b").with_material("steel").with_material("zinc"));
        assert!(!listed.has_no_material_information());
        assert!(listed.has_redundant_material_information());

        let dup = Element::from(
            ElementDescriptor::new(3, "c").with_layer("brick", 1.0).with_material("brick").with_material("brick"),
        );
        assert!(dup.has_duplicate_material_names());
        assert!(dup.has_redundant_material_information());
    }

    #[test]
    fn test_unnamed_layer() {
        let e = Element::from(ElementDescriptor::new(1, "a").with_layer("brick", 0.1).with_layer("", 0.1));
        assert!(e.has_unnamed_layer());
    }

    #[test]
    fn test_partial_material_definition() {
        let e = Element::from(
            ElementDescriptor::new(1, "a").with_layer("brick", 0.1).with_layer("rockwool", 0.1).with_material("brick"),
        );
        assert!(e.has_partial_material_definition());

        let ok = Element::from(
            ElementDescriptor::new(2, "b").with_layer("brick", 0.1).with_material("brick"),
        );
        assert!(!ok.has_partial_material_definition());
    }

    #[test]
    fn test_same_count_different_materials_is_partial() {
        let e = Element::from(
            ElementDescriptor::new(1, "a")
                .with_layer("brick", 0.1)
                .with_layer("rockwool", 0.1)
                .with_material("brick")
                .with_material("steel"),
        );
        assert!(e.has_partial_material_definition());

        let reordered = Element::from(
            ElementDescriptor::new(2, "b")
                .with_layer("rockwool", 0.1)
                .with_layer("brick", 0.1)
                .with_material("brick")
                .with_material("rockwool"),
        );
        assert!(!reordered.has_partial_material_definition());
    }

    #[test]
    fn test_descriptor_geometry_read_from_json() {
        let descriptor: ElementDescriptor = serde_json::from_str(
            r#"{"id": 7, "global_id": "w", "geometry": {"volume": 3.0, "floor_area": 12.0}}"#,
        )
        .unwrap();
        let e = Element::from(descriptor);
        assert_eq!(e.volume(), Some(3.0));
        assert_eq!(e.geometry().floor_area(), Some(12.0));

        let bare: ElementDescriptor = serde_json::from_str(r#"{"id": 8, "global_id": "x"}"#).unwrap();
        assert_eq!(bare.geometry, Geometry::default());
    }

    #[test]
    fn test_layer_volume_split() {
        let e = Element::from(
            ElementDescriptor::new(1, "a").with_volume(1.0).with_layer("brick", 1.0).with_layer("rockwool", 3.0),
        );
        assert_eq!(e.material_volumes(), vec![("brick", Some(0.25)), ("rockwool", Some(0.75))]);
    }

    #[test]
    fn test_layers_and_listed_split_separately() {
        let e = Element::from(
            ElementDescriptor::new(1, "a")
                .with_volume(1.0)
                .with_layer("brick", 1.0)
                .with_layer("rockwool", 3.0)
                .with_material("steel"),
        );
        assert_eq!(
            e.material_volumes(),
            vec![("brick", Some(0.125)), ("rockwool", Some(0.375)), ("steel", Some(0.5))]
        );
    }

    #[test]
    fn test_unmeasured_volume_splits_to_none() {
        let e = Element::from(ElementDescriptor::new(1, "a").with_layer("brick", 1.0));
        assert_eq!(e.material_volumes(), vec![("brick", None)]);
    }

    #[test]
    fn test_required_units_per_product_unit() {
        let geometry = Geometry::new().with_volume(6.0).with_floor_area(3.0);
        let mut e = Element::from(ElementDescriptor::new(1, "a").with_geometry(geometry));
        assert_eq!(e.required_number_of_units(), None);

        bound(&mut e, ProductUnit::M1);
        assert_eq!(e.required_number_of_units(), Some(2.0));
        bound(&mut e, ProductUnit::M2);
        assert_eq!(e.required_number_of_units(), Some(3.0));
        bound(&mut e, ProductUnit::M3);
        assert_eq!(e.required_number_of_units(), Some(6.0));
        bound(&mut e, ProductUnit::Kg);
        assert_eq!(e.required_number_of_units(), None);
    }

    #[test]
    fn test_required_units_without_area() {
        let mut e = Element::from(ElementDescriptor::new(1, "a").with_volume(6.0));
        bound(&mut e, ProductUnit::M1);
        assert_eq!(e.required_number_of_units(), None);
    }

    #[test]
    fn test_required_scale_factor() {
        let geometry = Geometry::new()
            .with_volume(1.0)
            .with_scaling_unit(ScalingUnit::measured("mm", &[150.0]));
        let e = Element::from(ElementDescriptor::new(1, "a").with_geometry(geometry));

        let set = ProfileSet::new("s", "insulation", ProductUnit::M2).with_scaler(ScalingUnit::new(
            ScalerKind::Linear,
            "m",
            &[1.0],
            Bounds::one(0.05, 0.3),
            &[0.1],
        ));
        let factor = e.required_scale_factor(&set, 0.001).unwrap();
        assert!((factor - 1.5).abs() < 1e-12);

        let plain = ProfileSet::new("t", "plain", ProductUnit::M2);
        assert_eq!(e.required_scale_factor(&plain, 1.0), Some(1.0));

        let slender = ProfileSet::new("u", "pipe", ProductUnit::M1).with_scaler(ScalingUnit::measured("m", &[0.1, 0.1]));
        assert_eq!(e.required_scale_factor(&slender, 1.0), None);
    }
}
