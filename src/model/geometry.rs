//! Measured geometry of one element.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::scaling::ScalingUnit;

/// Whether an element's volume can be used for quantities.
///
/// "Never measured" and "measured as exactly zero" are kept apart: the
/// first means the geometry pass did not run or failed, the second means
/// the model contains a degenerate element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VolumeState {
    Unmeasured,
    Zero,
    Positive,
}

/// Volume, areas and principal dimensions of an element, plus the
/// scaling units describing the dimensions it was measured at.
///
/// Scaling units are indexed by profile dimensionality parity: index 0
/// holds the planar unit (thickness, one axis), index 1 the slender unit
/// (cross section, two axes).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Geometry {
    volume: Option<f64>,
    floor_area: Option<f64>,
    face_area: Option<f64>,
    principal_dimensions: SmallVec<[f64; 3]>,
    is_complete: bool,
    scaling_units: SmallVec<[ScalingUnit; 2]>,
}

/// NaN inputs are stored as "not measured".
fn measured(v: f64) -> Option<f64> {
    (!v.is_nan()).then_some(v)
}

impl Geometry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.set_volume(volume);
        self
    }

    pub fn with_floor_area(mut self, area: f64) -> Self {
        self.set_floor_area(area);
        self
    }

    pub fn with_face_area(mut self, area: f64) -> Self {
        self.face_area = measured(area);
        self
    }

    pub fn with_principal_dimensions(mut self, dims: &[f64]) -> Self {
        self.set_principal_dimensions(dims);
        self
    }

    pub fn with_scaling_unit(mut self, unit: ScalingUnit) -> Self {
        self.add_scaling_unit(unit);
        self
    }

    pub fn complete(mut self) -> Self {
        self.is_complete = true;
        self
    }

    pub fn volume(&self) -> Option<f64> { self.volume }
    pub fn floor_area(&self) -> Option<f64> { self.floor_area }
    pub fn face_area(&self) -> Option<f64> { self.face_area }
    pub fn is_complete(&self) -> bool { self.is_complete }
    pub fn principal_dimensions(&self) -> &[f64] { &self.principal_dimensions }
    pub fn scaling_units(&self) -> &[ScalingUnit] { &self.scaling_units }

    pub fn set_volume(&mut self, volume: f64) {
        self.volume = measured(volume);
    }

    pub fn set_floor_area(&mut self, area: f64) {
        self.floor_area = measured(area);
    }

    pub fn set_is_complete(&mut self, complete: bool) {
        self.is_complete = complete;
    }

    /// Panics on more than three dimensions.
    pub fn set_principal_dimensions(&mut self, dims: &[f64]) {
        assert!(dims.len() <= 3, "an element has at most 3 principal dimensions, got {}", dims.len());
        self.principal_dimensions = SmallVec::from_slice(dims);
    }

    pub fn volume_state(&self) -> VolumeState {
        match self.volume {
            None => VolumeState::Unmeasured,
            Some(v) if v == 0.0 => VolumeState::Zero,
            Some(_) => VolumeState::Positive,
        }
    }

    /// Largest principal dimension. Diagonal elements are not corrected for.
    pub fn principal_dimension(&self) -> Option<f64> {
        self.principal_dimensions
            .iter()
            .copied()
            .filter(|d| !d.is_nan())
            .reduce(f64::max)
    }

    pub fn add_scaling_unit(&mut self, unit: ScalingUnit) {
        self.scaling_units.push(unit);
    }

    /// Copy the scaling units of `other`, each scaled by the volume ratio
    /// `self / other`. Missing or zero volumes give units that never scale
    /// instead of an error.
    pub fn add_scaling_units_from(&mut self, other: &Geometry) {
        let ratio = self.volume.unwrap_or(f64::NAN) / other.volume.unwrap_or(f64::NAN);
        for unit in &other.scaling_units {
            self.scaling_units.push(unit.scaled_by(ratio));
        }
    }

    /// Dimensions to scale a profile of the given dimensionality over.
    ///
    /// An area-type profile (even) scales by thickness alone, a slender
    /// profile (odd) by its cross section, hence `dimensionality % 2`.
    pub fn scale_dims(&self, dimensionality: u8) -> Option<&[f64]> {
        self.scaling_units
            .get(usize::from(dimensionality % 2))
            .map(ScalingUnit::scale_dims)
    }
}
