//! Lifecycle phase profiles and the impact category reference table.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::Result;

/// One environmental impact category with its weighting factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactCategory {
    pub description: String,
    pub unit: String,
    pub weight: f64,
}

/// Reference table of impact categories, keyed by category id.
///
/// Always passed in by the caller so the weights can be reconfigured
/// without touching the calculation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryTable {
    categories: BTreeMap<u32, ImpactCategory>,
}

impl CategoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category(
        mut self,
        id: u32,
        description: impl Into<String>,
        unit: impl Into<String>,
        weight: f64,
    ) -> Self {
        self.categories.insert(
            id,
            ImpactCategory { description: description.into(), unit: unit.into(), weight },
        );
        self
    }

    /// Parse a table from `{"1": {"description": ..., "unit": ..., "weight": ...}, ...}`.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn get(&self, id: u32) -> Option<&ImpactCategory> {
        self.categories.get(&id)
    }

    /// Categories in id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &ImpactCategory)> {
        self.categories.iter().map(|(id, c)| (*id, c))
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Weighted contribution of one phase to one impact category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostFactor {
    pub phase: String,
    pub category: String,
    pub value: f64,
}

/// Coefficients per impact category for a single lifecycle phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseProfile {
    pub id: String,
    /// Lifecycle phase, e.g. `"A1-A3"` or `"C4"`.
    pub phase: String,
    pub description: String,
    pub category: Option<u32>,
    coefficients: HashMap<String, f64>,
}

impl PhaseProfile {
    pub fn new(id: impl Into<String>, phase: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            phase: phase.into(),
            description: String::new(),
            category: None,
            coefficients: HashMap::new(),
        }
    }

    pub fn with_coefficient(mut self, category: impl Into<String>, value: f64) -> Self {
        self.set_coefficient(category, value);
        self
    }

    /// Coefficient for a category description. `None` when never set.
    pub fn coefficient(&self, category: &str) -> Option<f64> {
        self.coefficients.get(category).copied()
    }

    pub fn set_coefficient(&mut self, category: impl Into<String>, value: f64) {
        self.coefficients.insert(category.into(), value);
    }

    /// Set every category of `table` to `value`.
    pub fn set_all(&mut self, table: &CategoryTable, value: f64) {
        for (_, category) in table.iter() {
            self.set_coefficient(category.description.clone(), value);
        }
    }

    /// One factor per table category with a defined coefficient:
    /// `cost * coefficient * weight`. Undefined (missing or NaN)
    /// coefficients are skipped, not zero-filled.
    pub fn calculate_factors(&self, cost: f64, table: &CategoryTable) -> Vec<CostFactor> {
        table
            .iter()
            .filter_map(|(_, category)| {
                let coefficient = self.coefficient(&category.description)?;
                (!coefficient.is_nan()).then(|| CostFactor {
                    phase: self.phase.clone(),
                    category: category.description.clone(),
                    value: cost * coefficient * category.weight,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> CategoryTable {
        CategoryTable::new()
            .with_category(1, "global warming", "kg CO2 eq", 0.05)
            .with_category(2, "acidification", "kg SO2 eq", 4.0)
            .with_category(3, "ozone depletion", "kg CFC-11 eq", 30.0)
    }

    #[test]
    fn test_factors_skip_undefined_categories() {
        let profile = PhaseProfile::new("p1", "A1-A3")
            .with_coefficient("global warming", 2.0)
            .with_coefficient("acidification", f64::NAN);

        let factors = profile.calculate_factors(10.0, &table());
        assert_eq!(factors.len(), 1);
        assert_eq!(factors[0].phase, "A1-A3");
        assert_eq!(factors[0].category, "global warming");
        assert_eq!(factors[0].value, 10.0 * 2.0 * 0.05);
    }

    #[test]
    fn test_set_all_defines_every_category() {
        let mut profile = PhaseProfile::new("p1", "C4");
        profile.set_all(&table(), 0.0);
        let factors = profile.calculate_factors(5.0, &table());
        assert_eq!(factors.len(), 3);
        assert!(factors.iter().all(|f| f.value == 0.0));
    }

    #[test]
    fn test_factors_follow_table_order() {
        let profile = PhaseProfile::new("p1", "D")
            .with_coefficient("ozone depletion", 1.0)
            .with_coefficient("global warming", 1.0);
        let names: Vec<_> = profile
            .calculate_factors(1.0, &table())
            .into_iter()
            .map(|f| f.category)
            .collect();
        assert_eq!(names, vec!["global warming", "ozone depletion"]);
    }

    #[test]
    fn test_table_from_json() {
        let t = CategoryTable::from_json(
            r#"{"1": {"description": "global warming", "unit": "kg CO2 eq", "weight": 0.05}}"#,
        )
        .unwrap();
        assert_eq!(t.len(), 1);
        assert_eq!(t.get(1).map(|c| c.weight), Some(0.05));
    }

    #[test]
    fn test_unknown_category_in_profile_is_ignored() {
        let profile = PhaseProfile::new("p1", "B").with_coefficient("land use", 3.0);
        assert!(profile.calculate_factors(1.0, &table()).is_empty());
    }
}
