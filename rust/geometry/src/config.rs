// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Numeric tolerances shared by the facet and block pipelines.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Tolerances used while fitting, triangulating and ray-casting.
///
/// Every operation that needs one of these values has a `*_with_config`
/// variant; the plain variant uses [`GeometryConfig::default`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Minimum absolute polygon area in the projected 2D frame
    pub min_polygon_area: f64,
    /// Below this |ray · cap normal| a ray is treated as parallel to the cap
    pub parallel_tolerance: f64,
    /// Ratio between the middle and largest covariance eigenvalues under
    /// which the input is considered collinear
    pub degenerate_eigen_ratio: f64,
    /// Upper bound on Lawson flip passes per triangulation
    pub max_delaunay_passes: usize,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            min_polygon_area: 1e-6,
            parallel_tolerance: 1e-9,
            degenerate_eigen_ratio: 1e-12,
            max_delaunay_passes: 64,
        }
    }
}

impl GeometryConfig {
    /// Parse a configuration from JSON; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = GeometryConfig::from_json(r#"{ "min_polygon_area": 0.5 }"#).unwrap();
        assert_eq!(config.min_polygon_area, 0.5);
        assert_eq!(config.max_delaunay_passes, 64);
        assert_eq!(config.parallel_tolerance, 1e-9);
    }

    #[test]
    fn malformed_json_is_reported() {
        let result = GeometryConfig::from_json("{ not json");
        assert!(matches!(result, Err(Error::Serialization(_))));
    }
}
