//! Concrete scaler: a shape-function kind plus its configuration.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::{AxisBounds, Bounds, ScaleDims, Scaler};

/// Shape function families. Coefficients are `[a, b, c]`; missing ones
/// read as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalerKind {
    /// `a*x + b`
    Linear,
    /// `a*x^2 + b*x + c`
    Quadratic,
    /// `a*x^b + c`
    Power,
    /// `a*e^(b*x) + c`
    Exponential,
    /// `a*ln(x) + b`
    Logarithmic,
}

impl ScalerKind {
    pub fn calculate(self, coefficients: &[f64], x: f64) -> f64 {
        let c = |i: usize| coefficients.get(i).copied().unwrap_or(0.0);
        match self {
            ScalerKind::Linear => c(0) * x + c(1),
            ScalerKind::Quadratic => c(0) * x * x + c(1) * x + c(2),
            ScalerKind::Power => c(0) * x.powf(c(1)) + c(2),
            ScalerKind::Exponential => c(0) * (c(1) * x).exp() + c(2),
            ScalerKind::Logarithmic => c(0) * x.ln() + c(1),
        }
    }
}

/// A bounded scaler measured at one or two reference dimensions.
///
/// Immutable once built; [`ScalingUnit::scaled_by`] returns a new unit.
/// Deserialization applies the same shape checks as [`ScalingUnit::new`]
/// and fails instead of panicking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawScalingUnit")]
pub struct ScalingUnit {
    kind: ScalerKind,
    unit: String,
    coefficients: SmallVec<[f64; 3]>,
    bounds: Bounds,
    reference: ScaleDims,
}

#[derive(Deserialize)]
struct RawScalingUnit {
    kind: ScalerKind,
    unit: String,
    coefficients: SmallVec<[f64; 3]>,
    bounds: Bounds,
    reference: ScaleDims,
}

impl TryFrom<RawScalingUnit> for ScalingUnit {
    type Error = String;

    fn try_from(raw: RawScalingUnit) -> Result<Self, Self::Error> {
        if let Some(msg) = shape_error(raw.coefficients.len(), raw.reference.len()) {
            return Err(msg);
        }
        Ok(Self {
            kind: raw.kind,
            unit: raw.unit,
            coefficients: raw.coefficients,
            bounds: raw.bounds,
            reference: raw.reference,
        })
    }
}

fn shape_error(coefficients: usize, reference: usize) -> Option<String> {
    if coefficients > 3 {
        return Some(format!("a scaler takes at most 3 coefficients, got {coefficients}"));
    }
    if !matches!(reference, 1 | 2) {
        return Some(format!("a scaler has 1 or 2 reference dimensions, got {reference}"));
    }
    None
}

impl ScalingUnit {
    /// Panics on more than three coefficients or a reference that is not
    /// one or two values long.
    pub fn new(
        kind: ScalerKind,
        unit: impl Into<String>,
        coefficients: &[f64],
        bounds: Bounds,
        reference: &[f64],
    ) -> Self {
        if let Some(msg) = shape_error(coefficients.len(), reference.len()) {
            panic!("{msg}");
        }
        Self {
            kind,
            unit: unit.into(),
            coefficients: SmallVec::from_slice(coefficients),
            bounds,
            reference: SmallVec::from_slice(reference),
        }
    }

    /// Proportional, unbounded unit describing the dimensions an element
    /// was measured at. Two dimensions make it a cross-section unit.
    pub fn measured(unit: impl Into<String>, dims: &[f64]) -> Self {
        let bounds = Bounds {
            x: AxisBounds::any(),
            y: (dims.len() == 2).then(AxisBounds::any),
        };
        Self::new(ScalerKind::Linear, unit, &[1.0], bounds, dims)
    }

    /// New unit whose reference dimensions are multiplied by `ratio`.
    /// A NaN or infinite ratio yields a unit that never scales.
    pub fn scaled_by(&self, ratio: f64) -> Self {
        Self {
            reference: self.reference.iter().map(|d| d * ratio).collect(),
            ..self.clone()
        }
    }

    pub fn kind(&self) -> ScalerKind { self.kind }

    pub fn coefficients(&self) -> &[f64] { &self.coefficients }

    /// The dimensions this unit was measured at.
    pub fn scale_dims(&self) -> &[f64] { &self.reference }
}

impl Scaler for ScalingUnit {
    fn calculate(&self, x: f64) -> f64 {
        self.kind.calculate(&self.coefficients, x)
    }

    fn bounds(&self) -> &Bounds { &self.bounds }

    fn reference_x(&self) -> f64 { self.reference.first().copied().unwrap_or(f64::NAN) }

    fn reference_y(&self) -> Option<f64> { self.reference.get(1).copied() }

    fn unit(&self) -> &str { &self.unit }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_0_10(reference: f64) -> ScalingUnit {
        ScalingUnit::new(ScalerKind::Linear, "mm", &[2.0, 0.0], Bounds::one(0.0, 10.0), &[reference])
    }

    #[test]
    fn test_linear_factor_within_bounds() {
        let s = linear_0_10(2.0);
        assert_eq!(s.scale(5.0), Some(2.5));
        assert_eq!(s.scale(15.0), None);
    }

    #[test]
    fn test_self_scale_is_identity() {
        let s = ScalingUnit::new(ScalerKind::Quadratic, "m", &[1.0, 0.5, 0.1], Bounds::one(0.0, 3.0), &[1.3]);
        assert_eq!(s.scale(1.3), Some(1.0));
    }

    #[test]
    fn test_two_dimensional_checks_both_axes() {
        let s = ScalingUnit::new(
            ScalerKind::Linear,
            "mm",
            &[1.0],
            Bounds::two((0.0, 100.0), (0.0, 50.0)),
            &[10.0, 10.0],
        );
        assert_eq!(s.number_of_dimensions(), 2);
        assert_eq!(s.scale_2d(20.0, 5.0), Some(1.0));
        assert_eq!(s.scale_2d(20.0, 60.0), None);
        assert_eq!(s.scale_2d(120.0, 5.0), None);
    }

    #[test]
    fn test_second_bound_without_reference_is_1d() {
        let s = ScalingUnit::new(ScalerKind::Linear, "mm", &[1.0], Bounds::two((0.0, 10.0), (0.0, 10.0)), &[2.0]);
        assert_eq!(s.number_of_dimensions(), 1);
        assert_eq!(s.scale_2d(4.0, 99.0), Some(2.0));
    }

    #[test]
    fn test_conversion_rejects_bad_dimensionality() {
        let s = linear_0_10(2.0);
        assert_eq!(s.scale_with_conversion(&[8.0], 0.5), Some(2.0));
        assert_eq!(s.scale_with_conversion(&[], 1.0), None);
        assert_eq!(s.scale_with_conversion(&[1.0, 2.0, 3.0], 1.0), None);
    }

    #[test]
    fn test_zero_reference_is_unavailable() {
        let s = ScalingUnit::new(ScalerKind::Linear, "mm", &[1.0], Bounds::one(0.0, 10.0), &[0.0]);
        assert_eq!(s.scale(1.0), None);
    }

    #[test]
    fn test_scaled_by_nan_never_scales() {
        let s = ScalingUnit::measured("m", &[0.2]).scaled_by(f64::NAN);
        assert!(s.scale_dims()[0].is_nan());
        assert_eq!(s.scale(0.2), None);
    }

    #[test]
    fn test_shape_functions() {
        assert_eq!(ScalerKind::Power.calculate(&[2.0, 3.0, 1.0], 2.0), 17.0);
        assert_eq!(ScalerKind::Logarithmic.calculate(&[1.0, 1.0], 1.0), 1.0);
        assert_eq!(ScalerKind::Exponential.calculate(&[1.0, 0.0, 0.0], 5.0), 1.0);
    }

    #[test]
    #[should_panic(expected = "at most 3 coefficients")]
    fn test_too_many_coefficients_panics() {
        ScalingUnit::new(ScalerKind::Linear, "m", &[1.0, 2.0, 3.0, 4.0], Bounds::one(0.0, 1.0), &[1.0]);
    }

    #[test]
    fn test_empty_reference_rejected_on_read() {
        let json = r#"{"kind":"linear","unit":"m","coefficients":[1.0],"bounds":{"x":{"min":0.0,"max":1.0},"y":null},"reference":[]}"#;
        let err = serde_json::from_str::<ScalingUnit>(json).unwrap_err();
        assert!(err.to_string().contains("1 or 2 reference dimensions"));
    }

    #[test]
    fn test_too_many_coefficients_rejected_on_read() {
        let json = r#"{"kind":"linear","unit":"m","coefficients":[1.0,2.0,3.0,4.0],"bounds":{"x":{"min":0.0,"max":1.0},"y":null},"reference":[0.5]}"#;
        assert!(serde_json::from_str::<ScalingUnit>(json).is_err());
    }

    #[test]
    fn test_measured_unit_survives_json() {
        let unit = ScalingUnit::measured("mm", &[300.0, 600.0]);
        let back: ScalingUnit = serde_json::from_str(&serde_json::to_string(&unit).unwrap()).unwrap();
        assert_eq!(back, unit);
        assert_eq!(back.scale_2d(150.0, 600.0), Some(0.5));
    }
}
