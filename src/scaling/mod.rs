//! # Unit scaling
//!
//! A product profile is measured at some reference dimension (a 100 mm
//! insulation layer, a DN50 pipe). A building element rarely matches
//! that reference exactly, so the profile quantities are corrected by a
//! dimensionless factor:
//!
//! ```text
//! factor(x)    = f(x) / f(x_ref)
//! factor(x, y) = f(x) / f(x_ref) * f(y) / f(y_ref)
//! ```
//!
//! `f` is the shape function of the concrete [`ScalerKind`]. Every axis is
//! bounds-checked on its own; any input outside its (min, max) range, or
//! any non-finite intermediate, yields `None` ("scaling unavailable").
//! Absence is an expected outcome here, never an error.

pub mod unit;

use smallvec::SmallVec;

pub use unit::{ScalerKind, ScalingUnit};

/// Dimension values handed to or returned from a scaler (one or two axes).
pub type ScaleDims = SmallVec<[f64; 2]>;

/// Inclusive (min, max) range of one scaling axis.
///
/// Infinite ends serialize as `null` and read back as unbounded.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "RawAxisBounds")]
pub struct AxisBounds {
    pub min: f64,
    pub max: f64,
}

#[derive(serde::Deserialize)]
struct RawAxisBounds {
    min: Option<f64>,
    max: Option<f64>,
}

impl TryFrom<RawAxisBounds> for AxisBounds {
    type Error = String;

    fn try_from(raw: RawAxisBounds) -> Result<Self, Self::Error> {
        let min = raw.min.unwrap_or(f64::NEG_INFINITY);
        let max = raw.max.unwrap_or(f64::INFINITY);
        match inverted(min, max) {
            Some(msg) => Err(msg),
            None => Ok(Self { min, max }),
        }
    }
}

fn inverted(min: f64, max: f64) -> Option<String> {
    (min.partial_cmp(&max) == Some(std::cmp::Ordering::Greater))
        .then(|| format!("scaling bounds must satisfy min <= max, got [{min}, {max}]"))
}

impl AxisBounds {
    pub fn new(min: f64, max: f64) -> Self {
        if let Some(msg) = inverted(min, max) {
            panic!("{msg}");
        }
        Self { min, max }
    }

    /// Unbounded axis.
    pub fn any() -> Self {
        Self { min: f64::NEG_INFINITY, max: f64::INFINITY }
    }

    /// NaN never lies within bounds.
    pub fn contains(&self, x: f64) -> bool {
        x >= self.min && x <= self.max
    }
}

/// Bounds for one or two axes. A second axis makes the scaler 2D.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Bounds {
    pub x: AxisBounds,
    pub y: Option<AxisBounds>,
}

impl Bounds {
    pub fn one(min: f64, max: f64) -> Self {
        Self { x: AxisBounds::new(min, max), y: None }
    }

    pub fn two(x: (f64, f64), y: (f64, f64)) -> Self {
        Self {
            x: AxisBounds::new(x.0, x.1),
            y: Some(AxisBounds::new(y.0, y.1)),
        }
    }
}

/// Capability of a bounded shape-function scaler.
///
/// Implementors supply the shape function and the configuration; the
/// bounds checks and the ratio arithmetic are shared.
pub trait Scaler {
    /// Shape function `f(x)`; monotonic over the configured bounds.
    fn calculate(&self, x: f64) -> f64;

    fn bounds(&self) -> &Bounds;

    /// Reference dimension on the first axis.
    fn reference_x(&self) -> f64;

    /// Reference dimension on the second axis, when the scaler has one.
    fn reference_y(&self) -> Option<f64>;

    /// Physical unit the input dimensions are expected in.
    fn unit(&self) -> &str;

    /// 2 when both a second bound and a defined second reference exist.
    fn number_of_dimensions(&self) -> usize {
        match (self.bounds().y, self.reference_y()) {
            (Some(_), Some(y_ref)) if !y_ref.is_nan() => 2,
            _ => 1,
        }
    }

    /// Factor for the first axis only.
    fn scale(&self, x: f64) -> Option<f64> {
        if !self.bounds().x.contains(x) {
            return None;
        }
        finite(self.calculate(x) / self.calculate(self.reference_x()))
    }

    /// Factor over both axes. A 1D scaler ignores `y`.
    fn scale_2d(&self, x: f64, y: f64) -> Option<f64> {
        if self.number_of_dimensions() == 1 {
            return self.scale(x);
        }
        let (y_bounds, y_ref) = (self.bounds().y?, self.reference_y()?);
        if !y_bounds.contains(y) {
            return None;
        }
        let first = self.scale(x)?;
        finite(first * (self.calculate(y) / self.calculate(y_ref)))
    }

    /// Scale after multiplying every dimension by `conversion` (e.g. mm to m).
    /// Only one or two dimensions are accepted.
    fn scale_with_conversion(&self, dims: &[f64], conversion: f64) -> Option<f64> {
        match dims {
            [x] => self.scale(x * conversion),
            [x, y] => self.scale_2d(x * conversion, y * conversion),
            _ => None,
        }
    }
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}
