// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Capability shared by every entity that carries a reference plane.

use nalgebra::{Isometry3, Point3, Vector3};

use crate::plane::PlaneEquation;

/// Anything with a plane: raw main planes, facets and blocks.
pub trait PlanarEntity {
    /// Unit normal of the reference plane
    fn normal(&self) -> Vector3<f64>;

    /// Representative point of the entity on (or near) its plane
    fn center(&self) -> Point3<f64>;

    fn equation(&self) -> PlaneEquation;

    /// Move the entity rigidly, keeping its derived geometry consistent
    fn apply_planar_entity_change(&mut self, transform: &Isometry3<f64>);
}
