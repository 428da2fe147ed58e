//! # External product records
//!
//! Records returned by a [`DataService`](crate::service::DataService).
//! The store only holds shared references (`Arc<ProductRecord>`) to the
//! records it resolved; it never builds or edits them.

pub mod profile;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::scaling::ScalingUnit;
use crate::Error;

pub use profile::{CategoryTable, CostFactor, ImpactCategory, PhaseProfile};

/// Unit a product is declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductUnit {
    #[serde(rename = "m1")]
    M1,
    #[serde(rename = "m2")]
    M2,
    #[serde(rename = "m3")]
    M3,
    #[serde(rename = "kg")]
    Kg,
}

impl ProductUnit {
    /// Geometric dimensionality; mass has none.
    pub fn dimensionality(self) -> u8 {
        match self {
            ProductUnit::M1 => 1,
            ProductUnit::M2 => 2,
            ProductUnit::M3 => 3,
            ProductUnit::Kg => 0,
        }
    }
}

impl fmt::Display for ProductUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProductUnit::M1 => "m1",
            ProductUnit::M2 => "m2",
            ProductUnit::M3 => "m3",
            ProductUnit::Kg => "kg",
        })
    }
}

impl FromStr for ProductUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "m1" | "m" | "m¹" => Ok(ProductUnit::M1),
            "m2" | "m²" => Ok(ProductUnit::M2),
            "m3" | "m³" => Ok(ProductUnit::M3),
            "kg" => Ok(ProductUnit::Kg),
            other => Err(Error::Config(format!("unknown product unit '{other}'"))),
        }
    }
}

/// One set of profiles for a product, measured at the reference dimensions
/// of its scaler (when it has one).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSet {
    pub id: String,
    pub name: String,
    pub unit: ProductUnit,
    /// Amount of this set per declared product unit.
    pub quantity: f64,
    pub scaler: Option<ScalingUnit>,
    /// Ids to fetch the phase profiles with.
    pub phase_profile_ids: Vec<String>,
    #[serde(default)]
    pub phase_profiles: Vec<PhaseProfile>,
}

impl ProfileSet {
    pub fn new(id: impl Into<String>, name: impl Into<String>, unit: ProductUnit) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            unit,
            quantity: 1.0,
            scaler: None,
            phase_profile_ids: Vec::new(),
            phase_profiles: Vec::new(),
        }
    }

    pub fn with_scaler(mut self, scaler: ScalingUnit) -> Self {
        self.scaler = Some(scaler);
        self
    }

    pub fn with_phase_profile_ids(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.phase_profile_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn dimensionality(&self) -> u8 {
        self.unit.dimensionality()
    }

    /// Weighted factors of every phase for `cost` units of this set.
    pub fn calculate_factors(&self, cost: f64, table: &CategoryTable) -> Vec<CostFactor> {
        self.phase_profiles
            .iter()
            .flat_map(|p| p.calculate_factors(cost * self.quantity, table))
            .collect()
    }
}

/// A manufactured product with its environmental profile sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: String,
    pub name: String,
    /// Classification code, e.g. `"21.12"` for a load-bearing wall.
    pub classification_code: String,
    pub unit: ProductUnit,
    #[serde(default)]
    pub profile_sets: Vec<ProfileSet>,
}

impl ProductRecord {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        classification_code: impl Into<String>,
        unit: ProductUnit,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            classification_code: classification_code.into(),
            unit,
            profile_sets: Vec::new(),
        }
    }

    pub fn with_profile_set(mut self, set: ProfileSet) -> Self {
        self.profile_sets.push(set);
        self
    }

    /// True when the classification code contains any of `prefixes`.
    pub fn matches_any<S: AsRef<str>>(&self, prefixes: &[S]) -> bool {
        prefixes
            .iter()
            .any(|p| self.classification_code.contains(p.as_ref()))
    }

    pub fn has_profile_sets(&self) -> bool {
        !self.profile_sets.is_empty()
    }
}
