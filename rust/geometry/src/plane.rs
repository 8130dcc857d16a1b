// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Plane equations and least-squares plane fitting
//!
//! A fit produces the plane itself plus a local orthonormal 2D frame lying in
//! the plane, so that hull extraction and triangulation can run in 2D.

use nalgebra::{Isometry3, Matrix3, Point2, Point3, Unit, Vector3};

use crate::config::GeometryConfig;
use crate::error::{Error, Result};

/// Plane `N·P = d` with a unit normal.
///
/// The sign of the normal is meaningful: it is the "outward" side of a facet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneEquation {
    normal: Unit<Vector3<f64>>,
    d: f64,
}

impl PlaneEquation {
    /// Create a plane from any non-zero normal; `d` is rescaled with it.
    pub fn new(normal: Vector3<f64>, d: f64) -> Result<Self> {
        let len = normal.norm();
        if !len.is_finite() || len < 1e-12 {
            return Err(Error::degenerate("plane normal has zero length"));
        }
        Ok(Self {
            normal: Unit::new_unchecked(normal / len),
            d: d / len,
        })
    }

    /// Plane through `point` with the given normal direction
    pub fn from_point_normal(point: &Point3<f64>, normal: &Vector3<f64>) -> Result<Self> {
        let len = normal.norm();
        if !len.is_finite() || len < 1e-12 {
            return Err(Error::degenerate("plane normal has zero length"));
        }
        let n = normal / len;
        Ok(Self {
            normal: Unit::new_unchecked(n),
            d: n.dot(&point.coords),
        })
    }

    /// Create from `[nx, ny, nz, d]`
    pub fn from_array(eq: [f64; 4]) -> Result<Self> {
        Self::new(Vector3::new(eq[0], eq[1], eq[2]), eq[3])
    }

    #[inline]
    pub fn to_array(&self) -> [f64; 4] {
        [self.normal.x, self.normal.y, self.normal.z, self.d]
    }

    #[inline]
    pub fn normal(&self) -> Vector3<f64> {
        self.normal.into_inner()
    }

    #[inline]
    pub fn d(&self) -> f64 {
        self.d
    }

    /// Negate all four components in place
    #[inline]
    pub fn invert(&mut self) {
        self.normal = -self.normal;
        self.d = -self.d;
    }

    #[inline]
    pub fn inverted(&self) -> Self {
        let mut plane = *self;
        plane.invert();
        plane
    }

    /// Signed distance, positive on the normal side
    #[inline]
    pub fn signed_distance(&self, point: &Point3<f64>) -> f64 {
        self.normal.dot(&point.coords) - self.d
    }

    /// Orthogonal projection of a point onto the plane
    #[inline]
    pub fn project_point(&self, point: &Point3<f64>) -> Point3<f64> {
        point - self.normal.into_inner() * self.signed_distance(point)
    }

    /// Intersect the ray `origin + t * direction` (t unbounded in both
    /// directions) with the plane.
    ///
    /// Returns `None` when the direction is parallel to the plane within
    /// `tolerance`.
    pub fn intersect_ray(
        &self,
        origin: &Point3<f64>,
        direction: &Vector3<f64>,
        tolerance: f64,
    ) -> Option<Point3<f64>> {
        let denom = self.normal.dot(direction);
        if denom.abs() <= tolerance {
            return None;
        }
        let t = (self.d - self.normal.dot(&origin.coords)) / denom;
        Some(origin + direction * t)
    }

    /// Apply a rigid transform. The offset is recomputed from `anchor`
    /// (projected onto the plane first, then transformed).
    pub fn transformed(&self, transform: &Isometry3<f64>, anchor: &Point3<f64>) -> Self {
        let on_plane = self.project_point(anchor);
        let normal = transform.rotation * self.normal;
        let moved = transform * on_plane;
        Self {
            normal,
            d: normal.dot(&moved.coords),
        }
    }
}

/// Orthonormal 2D frame lying in a plane, `u × v = normal`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneBasis {
    pub origin: Point3<f64>,
    pub u: Vector3<f64>,
    pub v: Vector3<f64>,
}

impl PlaneBasis {
    /// Build a frame from a unit normal, picking the world axis least parallel
    /// to the normal as the reference direction.
    pub fn from_normal(origin: Point3<f64>, normal: &Vector3<f64>) -> Self {
        let abs_x = normal.x.abs();
        let abs_y = normal.y.abs();
        let abs_z = normal.z.abs();

        let reference = if abs_x <= abs_y && abs_x <= abs_z {
            Vector3::new(1.0, 0.0, 0.0)
        } else if abs_y <= abs_z {
            Vector3::new(0.0, 1.0, 0.0)
        } else {
            Vector3::new(0.0, 0.0, 1.0)
        };

        let u = normal.cross(&reference).normalize();
        let v = normal.cross(&u).normalize();
        Self { origin, u, v }
    }

    /// Frame whose first axis is `u` (projected into the plane)
    fn from_axis(origin: Point3<f64>, normal: &Vector3<f64>, u: &Vector3<f64>) -> Self {
        let u = (u - normal * normal.dot(u)).normalize();
        let v = normal.cross(&u).normalize();
        Self { origin, u, v }
    }

    #[inline]
    pub fn normal(&self) -> Vector3<f64> {
        self.u.cross(&self.v)
    }

    #[inline]
    pub fn project(&self, point: &Point3<f64>) -> Point2<f64> {
        let rel = point - self.origin;
        Point2::new(rel.dot(&self.u), rel.dot(&self.v))
    }

    #[inline]
    pub fn lift(&self, point: &Point2<f64>) -> Point3<f64> {
        self.origin + self.u * point.x + self.v * point.y
    }

    pub fn project_all(&self, points: &[Point3<f64>]) -> Vec<Point2<f64>> {
        points.iter().map(|p| self.project(p)).collect()
    }
}

/// Result of fitting (or adopting) a plane for a point set
#[derive(Debug, Clone)]
pub struct PlaneFit {
    pub equation: PlaneEquation,
    /// Centroid of the input points
    pub centroid: Point3<f64>,
    /// Local frame, origin at the centroid projected onto the plane
    pub basis: PlaneBasis,
    /// 2D coordinates of every input point in `basis`
    pub projected: Vec<Point2<f64>>,
    /// Root-mean-square point-to-plane distance
    pub rms: f64,
}

/// Fit a least-squares plane (or adopt `plane`) and project the points to 2D.
#[inline]
pub fn fit_plane(points: &[Point3<f64>], plane: Option<&PlaneEquation>) -> Result<PlaneFit> {
    fit_plane_with_config(points, plane, &GeometryConfig::default())
}

pub fn fit_plane_with_config(
    points: &[Point3<f64>],
    plane: Option<&PlaneEquation>,
    config: &GeometryConfig,
) -> Result<PlaneFit> {
    if points.len() < 3 {
        return Err(Error::insufficient(3, points.len()));
    }

    let centroid = centroid(points);

    let (equation, basis) = match plane {
        Some(eq) => {
            let origin = eq.project_point(&centroid);
            (*eq, PlaneBasis::from_normal(origin, &eq.normal()))
        }
        None => {
            let (normal, major_axis) = principal_axes(points, &centroid, config)?;
            let equation = PlaneEquation::from_point_normal(&centroid, &normal)?;
            (equation, PlaneBasis::from_axis(centroid, &normal, &major_axis))
        }
    };

    let mut projected = Vec::new();
    projected.try_reserve_exact(points.len())?;
    projected.extend(points.iter().map(|p| basis.project(p)));

    Ok(PlaneFit {
        rms: compute_rms(points, &equation),
        equation,
        centroid,
        basis,
        projected,
    })
}

/// Mean of a point set (origin for an empty set)
pub fn centroid(points: &[Point3<f64>]) -> Point3<f64> {
    if points.is_empty() {
        return Point3::origin();
    }
    let sum: Vector3<f64> = points.iter().map(|p| p.coords).sum();
    Point3::from(sum / points.len() as f64)
}

/// Root-mean-square distance of the points to the plane
pub fn compute_rms(points: &[Point3<f64>], plane: &PlaneEquation) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = points
        .iter()
        .map(|p| {
            let d = plane.signed_distance(p);
            d * d
        })
        .sum();
    (sum_sq / points.len() as f64).sqrt()
}

/// Smallest-eigenvalue eigenvector (normal) and largest-eigenvalue eigenvector
/// (in-plane major axis) of the point covariance.
fn principal_axes(
    points: &[Point3<f64>],
    centroid: &Point3<f64>,
    config: &GeometryConfig,
) -> Result<(Vector3<f64>, Vector3<f64>)> {
    let mut cov = Matrix3::zeros();
    for p in points {
        let d = p - centroid;
        cov += d * d.transpose();
    }
    cov /= points.len() as f64;

    let eig = cov.symmetric_eigen();
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eig.eigenvalues[a].total_cmp(&eig.eigenvalues[b]));
    let (min_idx, mid_idx, max_idx) = (order[0], order[1], order[2]);

    let largest = eig.eigenvalues[max_idx];
    if largest.is_nan() || largest <= 0.0 {
        return Err(Error::degenerate("all points are coincident"));
    }
    if eig.eigenvalues[mid_idx] <= config.degenerate_eigen_ratio * largest {
        return Err(Error::degenerate("points are collinear"));
    }

    let normal = eig.eigenvectors.column(min_idx).into_owned();
    let normal = match normal.try_normalize(1e-12) {
        Some(n) => canonical_normal(n),
        None => return Err(Error::degenerate("plane fit produced a null normal")),
    };
    let major = eig.eigenvectors.column(max_idx).into_owned();

    Ok((normal, major))
}

/// Eigenvectors have no intrinsic sign; prefer +Z, then +Y, then +X.
fn canonical_normal(n: Vector3<f64>) -> Vector3<f64> {
    const EPS: f64 = 1e-12;
    let flip = if n.z.abs() > EPS {
        n.z < 0.0
    } else if n.y.abs() > EPS {
        n.y < 0.0
    } else {
        n.x < 0.0
    };
    if flip {
        -n
    } else {
        n
    }
}
