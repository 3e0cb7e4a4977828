//! Named parameter values.
//!
//! Parameters are looked up by their display name, units included in the
//! label (e.g. `"Cell capacity [A.h]"`).

use std::collections::BTreeMap;

use crate::error::{CoreError, CoreResult};

/// Well-known parameter names.
pub mod names {
    pub const CELL_CAPACITY: &str = "Cell capacity [A.h]";
}

/// Ordered map from parameter name to value in the unit named by its label.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ParameterValues {
    values: BTreeMap<String, f64>,
}

impl ParameterValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value, returning the previous one.
    pub fn set(&mut self, name: impl Into<String>, value: f64) -> Option<f64> {
        self.values.insert(name.into(), value)
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Look up a value that must be present and finite.
    pub fn require(&self, name: &str) -> CoreResult<f64> {
        let value = self.get(name).ok_or_else(|| CoreError::UnknownParameter {
            name: name.to_string(),
        })?;
        if !value.is_finite() {
            return Err(CoreError::NonFinite {
                what: "parameter value",
                value,
            });
        }
        Ok(value)
    }

    /// Look up a value that must be present, finite and strictly positive.
    pub fn require_positive(&self, name: &str) -> CoreResult<f64> {
        let value = self.require(name)?;
        if value <= 0.0 {
            return Err(CoreError::NonPositiveParameter {
                name: name.to_string(),
                value,
            });
        }
        Ok(value)
    }

    /// Overwrite entries with those of `other`.
    pub fn update(&mut self, other: &ParameterValues) {
        for (name, value) in other.iter() {
            self.values.insert(name.to_string(), value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for ParameterValues {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_reports_missing_name() {
        let params = ParameterValues::new();
        let err = params.require(names::CELL_CAPACITY).unwrap_err();
        assert_eq!(
            err,
            CoreError::UnknownParameter {
                name: "Cell capacity [A.h]".to_string()
            }
        );
    }

    #[test]
    fn require_positive_rejects_zero() {
        let params = ParameterValues::new().with(names::CELL_CAPACITY, 0.0);
        assert!(matches!(
            params.require_positive(names::CELL_CAPACITY),
            Err(CoreError::NonPositiveParameter { .. })
        ));
    }

    #[test]
    fn update_overrides_existing_and_adds_new() {
        let mut base = ParameterValues::new().with("a", 1.0).with("b", 2.0);
        let overrides: ParameterValues = [("b", 3.0), ("c", 4.0)].into_iter().collect();
        base.update(&overrides);
        assert_eq!(base.get("a"), Some(1.0));
        assert_eq!(base.get("b"), Some(3.0));
        assert_eq!(base.get("c"), Some(4.0));
        assert_eq!(base.len(), 3);
    }
}
