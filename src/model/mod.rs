//! # Building model
//!
//! Plain data for the object tree: elements, their geometry, layers and
//! listed materials, and the materials they refer to. No locking and no
//! I/O here; the [`store`](crate::store) owns all instances.

pub mod element;
pub mod geometry;
pub mod material;
pub mod value;

pub use element::{
    normalize_type, BindingSource, Element, ElementDescriptor, ElementKey, Layer, MaterialSource,
    ProductBinding, ResolutionState,
};
pub use geometry::{Geometry, VolumeState};
pub use material::{Material, MaterialSpec};
pub use value::{PropertyMap, Value};
