// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reference plane and profile of an extruded block

use nalgebra::{Isometry3, Point3, Vector3};

use crate::contour::signed_area;
use crate::error::{Error, Result};
use crate::planar::PlanarEntity;
use crate::plane::{centroid, PlaneBasis, PlaneEquation};

/// Plane plus the closed profile the block is extruded from.
///
/// The profile lies in the plane and runs counter-clockwise about its normal.
#[derive(Debug, Clone, PartialEq)]
pub struct MainPlane {
    equation: PlaneEquation,
    profile: Vec<Point3<f64>>,
    center: Point3<f64>,
}

impl MainPlane {
    /// Projects `profile` onto the plane and reverses it if it runs clockwise.
    pub fn new(equation: PlaneEquation, profile: Vec<Point3<f64>>) -> Result<Self> {
        Self::with_min_area(equation, profile, 0.0)
    }

    pub(crate) fn with_min_area(
        equation: PlaneEquation,
        mut profile: Vec<Point3<f64>>,
        min_area: f64,
    ) -> Result<Self> {
        if profile.len() < 3 {
            return Err(Error::DegenerateBlock(format!(
                "profile needs at least 3 points, got {}",
                profile.len()
            )));
        }

        for p in &mut profile {
            *p = equation.project_point(p);
        }

        let area = profile_area(&profile, &equation.normal());
        if area.abs() <= min_area {
            return Err(Error::DegenerateBlock(format!(
                "profile area {:.3e} is too small",
                area.abs()
            )));
        }
        if area < 0.0 {
            profile.reverse();
        }

        let center = centroid(&profile);
        Ok(Self {
            equation,
            profile,
            center,
        })
    }

    #[inline]
    pub fn equation(&self) -> &PlaneEquation {
        &self.equation
    }

    #[inline]
    pub fn normal(&self) -> Vector3<f64> {
        self.equation.normal()
    }

    /// Vertex centroid of the profile
    #[inline]
    pub fn center(&self) -> Point3<f64> {
        self.center
    }

    #[inline]
    pub fn profile(&self) -> &[Point3<f64>] {
        &self.profile
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.profile.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.profile.is_empty()
    }

    /// Signed area of the profile about the plane normal (always positive
    /// once constructed)
    pub fn area(&self) -> f64 {
        profile_area(&self.profile, &self.normal())
    }

    pub fn apply_transform(&mut self, transform: &Isometry3<f64>) {
        self.equation = self.equation.transformed(transform, &self.center);
        for p in &mut self.profile {
            *p = transform * *p;
        }
        self.center = transform * self.center;
    }
}

impl PlanarEntity for MainPlane {
    fn normal(&self) -> Vector3<f64> {
        self.equation.normal()
    }

    fn center(&self) -> Point3<f64> {
        self.center
    }

    fn equation(&self) -> PlaneEquation {
        self.equation
    }

    fn apply_planar_entity_change(&mut self, transform: &Isometry3<f64>) {
        self.apply_transform(transform);
    }
}

/// Signed area of a loop about `normal`, positive when counter-clockwise
fn profile_area(points: &[Point3<f64>], normal: &Vector3<f64>) -> f64 {
    let Some(first) = points.first() else {
        return 0.0;
    };
    let basis = PlaneBasis::from_normal(*first, normal);
    signed_area(&basis.project_all(points))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn clockwise_profile_is_reversed() {
        let eq = PlaneEquation::new(Vector3::z(), 0.0).unwrap();
        let cw = vec![
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
        ];
        let main = MainPlane::new(eq, cw).unwrap();
        assert_relative_eq!(main.area(), 1.0, epsilon = 1e-12);
        assert_eq!(main.profile()[0], Point3::new(0.0, 0.0, 0.0));
        assert_relative_eq!(main.center(), Point3::new(0.5, 0.5, 0.0));
    }

    #[test]
    fn profile_is_projected_onto_plane() {
        let eq = PlaneEquation::new(Vector3::z(), 2.0).unwrap();
        let profile = vec![
            Point3::new(0.0, 0.0, 5.0),
            Point3::new(1.0, 0.0, 3.0),
            Point3::new(0.0, 1.0, -1.0),
        ];
        let main = MainPlane::new(eq, profile).unwrap();
        assert!(main.profile().iter().all(|p| p.z == 2.0));
    }

    #[test]
    fn flat_profile_is_rejected() {
        let eq = PlaneEquation::new(Vector3::z(), 0.0).unwrap();
        let line = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        ];
        assert!(matches!(MainPlane::new(eq, line), Err(Error::DegenerateBlock(_))));
        assert!(matches!(
            MainPlane::new(eq, vec![Point3::origin()]),
            Err(Error::DegenerateBlock(_))
        ));
    }
}
