// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Planar facets
//!
//! A facet is a fitted plane, an ordered boundary contour lying in that plane
//! and a triangulation of the contour interior. It is built either from a raw
//! point set (plane fit → hull → triangulation) or from a contour that is
//! already ordered.

use nalgebra::{Isometry3, Point2, Point3, Vector3};
use tracing::{debug, warn};

use crate::config::GeometryConfig;
use crate::contour::Polyline;
use crate::error::{Error, Result};
use crate::hull::extract_hull;
use crate::mesh::TriangleMesh;
use crate::planar::PlanarEntity;
use crate::plane::{fit_plane_with_config, PlaneEquation};
use crate::propagation::{ChangeOrigin, ChangeTracker, GeometryObserver};
use crate::triangulation::{triangulate_contour, Triangulation};

/// "Unset" sentinel for the fitting and confidence scores
pub const UNSET_SCORE: f64 = -999_999.0;
/// "Unset" sentinel for the coverage and distance scores
pub const UNSET_RATIO: f64 = -1.0;

/// Quality annotations computed by external evaluation code
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FacetQuality {
    pub fitting: f64,
    pub coverage: f64,
    pub confidence: f64,
    pub distance: f64,
}

impl Default for FacetQuality {
    fn default() -> Self {
        Self {
            fitting: UNSET_SCORE,
            coverage: UNSET_RATIO,
            confidence: UNSET_SCORE,
            distance: UNSET_RATIO,
        }
    }
}

/// Planar polygon: fitted plane, boundary contour and triangulated interior
#[derive(Debug, Clone)]
pub struct Facet {
    name: String,
    plane: PlaneEquation,
    center: Point3<f64>,
    contour: Vec<Point3<f64>>,
    polyline: Polyline,
    mesh: Option<TriangleMesh>,
    origin_points: Option<Vec<Point3<f64>>>,
    rms: f64,
    surface: f64,
    max_edge_length: f64,
    quality: FacetQuality,
    color: Option<[u8; 3]>,
    changes: ChangeTracker,
}

/// Everything a rebuild produces, assembled before any field is touched
struct FacetGeometry {
    plane: PlaneEquation,
    center: Point3<f64>,
    contour: Vec<Point3<f64>>,
    polyline: Polyline,
    mesh: TriangleMesh,
    rms: f64,
    surface: f64,
}

impl Facet {
    /// Build a facet from an unordered point set.
    ///
    /// Runs plane fit, hull extraction (`max_edge_length <= 0` for convex) and
    /// triangulation; the first failing stage aborts. The points are kept as
    /// origin points when `transfer_ownership` is set.
    pub fn create(
        points: Vec<Point3<f64>>,
        max_edge_length: f64,
        transfer_ownership: bool,
        plane: Option<&PlaneEquation>,
    ) -> Result<Self> {
        Self::create_with_config(
            points,
            max_edge_length,
            transfer_ownership,
            plane,
            &GeometryConfig::default(),
        )
    }

    pub fn create_with_config(
        points: Vec<Point3<f64>>,
        max_edge_length: f64,
        transfer_ownership: bool,
        plane: Option<&PlaneEquation>,
        config: &GeometryConfig,
    ) -> Result<Self> {
        let geometry = geometry_from_points(&points, max_edge_length, plane, config)?;

        let mut facet = Self::from_geometry(geometry);
        facet.max_edge_length = max_edge_length;
        if transfer_ownership {
            facet.origin_points = Some(points);
        }

        debug!(
            contour = facet.contour.len(),
            triangles = facet.triangle_count(),
            surface = facet.surface,
            rms = facet.rms,
            "facet created from point set"
        );
        Ok(facet)
    }

    /// Build a facet from an ordered contour.
    ///
    /// The plane is refit from the contour unless supplied, and the points are
    /// projected onto it. With
    /// `close_as_polygon` the plane sign is made to agree with the contour
    /// winding (right-hand rule).
    pub fn create_from_contour(
        points: &[Point3<f64>],
        close_as_polygon: bool,
        plane: Option<&PlaneEquation>,
    ) -> Result<Self> {
        Self::create_from_contour_with_config(
            points,
            close_as_polygon,
            plane,
            &GeometryConfig::default(),
        )
    }

    pub fn create_from_contour_with_config(
        points: &[Point3<f64>],
        close_as_polygon: bool,
        plane: Option<&PlaneEquation>,
        config: &GeometryConfig,
    ) -> Result<Self> {
        let geometry = geometry_from_contour(points, close_as_polygon, plane, config)?;
        Ok(Self::from_geometry(geometry))
    }

    fn from_geometry(geometry: FacetGeometry) -> Self {
        Self {
            name: String::from("Facet"),
            plane: geometry.plane,
            center: geometry.center,
            contour: geometry.contour,
            polyline: geometry.polyline,
            mesh: Some(geometry.mesh),
            origin_points: None,
            rms: geometry.rms,
            surface: geometry.surface,
            max_edge_length: 0.0,
            quality: FacetQuality::default(),
            color: None,
            changes: ChangeTracker::new(),
        }
    }

    /// Facet with a plane but no contour, as left by a failed re-form
    pub(crate) fn empty(plane: PlaneEquation, closed: bool) -> Self {
        Self {
            name: String::from("Facet"),
            plane,
            center: Point3::origin(),
            contour: Vec::new(),
            polyline: Polyline::sequential(0, closed),
            mesh: None,
            origin_points: None,
            rms: 0.0,
            surface: 0.0,
            max_edge_length: 0.0,
            quality: FacetQuality::default(),
            color: None,
            changes: ChangeTracker::new(),
        }
    }

    /// Replace the facet geometry with a new ordered contour, in place.
    ///
    /// Contour, polyline and mesh are cleared before the rebuild; on failure
    /// the facet stays empty (previous plane kept) and the error is returned.
    pub fn form_by_contour(
        &mut self,
        points: &[Point3<f64>],
        close_as_polygon: bool,
        plane: Option<&PlaneEquation>,
    ) -> Result<()> {
        self.form_by_contour_as(
            points,
            close_as_polygon,
            plane,
            ChangeOrigin::External,
            &GeometryConfig::default(),
        )
    }

    pub(crate) fn form_by_contour_as(
        &mut self,
        points: &[Point3<f64>],
        close_as_polygon: bool,
        plane: Option<&PlaneEquation>,
        origin: ChangeOrigin,
        config: &GeometryConfig,
    ) -> Result<()> {
        self.clear_geometry();

        let result = geometry_from_contour(points, close_as_polygon, plane, config);
        match result {
            Ok(geometry) => {
                self.assign(geometry);
                self.changes.touch(origin);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, name = %self.name, "facet re-form failed, facet left empty");
                self.changes.touch(origin);
                Err(e)
            }
        }
    }

    fn clear_geometry(&mut self) {
        self.mesh = None;
        self.polyline.clear();
        self.contour.clear();
        self.surface = 0.0;
    }

    fn assign(&mut self, geometry: FacetGeometry) {
        self.plane = geometry.plane;
        self.center = geometry.center;
        self.contour = geometry.contour;
        self.polyline = geometry.polyline;
        self.mesh = Some(geometry.mesh);
        self.rms = geometry.rms;
        self.surface = geometry.surface;
    }

    /// Change the hull threshold and, when origin points are retained,
    /// re-extract the contour from them. Nothing changes on failure.
    pub fn set_max_edge_length(&mut self, max_edge_length: f64) -> Result<()> {
        self.set_max_edge_length_with_config(max_edge_length, &GeometryConfig::default())
    }

    pub fn set_max_edge_length_with_config(
        &mut self,
        max_edge_length: f64,
        config: &GeometryConfig,
    ) -> Result<()> {
        if let Some(points) = self.origin_points.as_deref() {
            let geometry = geometry_from_points(points, max_edge_length, Some(&self.plane), config)?;
            self.assign(geometry);
            self.changes.touch(ChangeOrigin::External);
        }
        self.max_edge_length = max_edge_length;
        Ok(())
    }

    /// Negate the plane equation; the contour is left untouched.
    pub fn invert_normal(&mut self) {
        self.invert_normal_as(ChangeOrigin::External);
    }

    pub(crate) fn invert_normal_as(&mut self, origin: ChangeOrigin) {
        self.plane.invert();
        if let Some(mesh) = self.mesh.as_mut() {
            for n in &mut mesh.normals {
                *n = -*n;
            }
        }
        self.changes.touch(origin);
    }

    /// Apply a rigid transform to every owned part
    pub fn apply_transform(&mut self, transform: &Isometry3<f64>) {
        self.apply_transform_as(transform, ChangeOrigin::External);
    }

    pub(crate) fn apply_transform_as(&mut self, transform: &Isometry3<f64>, origin: ChangeOrigin) {
        self.plane = self.plane.transformed(transform, &self.center);
        self.center = transform * self.center;
        for p in &mut self.contour {
            *p = transform * *p;
        }
        if let Some(points) = self.origin_points.as_mut() {
            for p in points.iter_mut() {
                *p = transform * *p;
            }
        }
        if let Some(mesh) = self.mesh.as_mut() {
            for n in &mut mesh.normals {
                *n = transform.rotation * *n;
            }
        }
        self.changes.touch(origin);
    }

    /// Signed distance from `point` to the facet plane
    #[inline]
    pub fn distance_to(&self, point: &Point3<f64>) -> f64 {
        self.plane.signed_distance(point)
    }

    /// Area enclosed by the contour, measured in the facet plane
    pub fn contour_area(&self) -> f64 {
        if self.contour.len() < 3 {
            return 0.0;
        }
        let origin = self.contour[0];
        let mut total = Vector3::zeros();
        for i in 1..self.contour.len() - 1 {
            total += (self.contour[i] - origin).cross(&(self.contour[i + 1] - origin));
        }
        total.dot(&self.plane.normal()).abs() * 0.5
    }

    /// Axis-aligned bounds of the contour, `None` when empty
    pub fn bounding_box(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = self.contour.first()?;
        let mut min = *first;
        let mut max = *first;
        for p in &self.contour {
            min = min.inf(p);
            max = max.sup(p);
        }
        Some((min, max))
    }

    /// Whether the facet lost its geometry (failed re-form)
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.contour.is_empty()
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    #[inline]
    pub fn plane_equation(&self) -> &PlaneEquation {
        &self.plane
    }

    #[inline]
    pub fn normal(&self) -> Vector3<f64> {
        self.plane.normal()
    }

    #[inline]
    pub fn center(&self) -> Point3<f64> {
        self.center
    }

    #[inline]
    pub fn contour(&self) -> &[Point3<f64>] {
        &self.contour
    }

    #[inline]
    pub fn polyline(&self) -> &Polyline {
        &self.polyline
    }

    #[inline]
    pub fn mesh(&self) -> Option<&TriangleMesh> {
        self.mesh.as_ref()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.mesh.as_ref().map_or(0, TriangleMesh::triangle_count)
    }

    #[inline]
    pub fn origin_points(&self) -> Option<&[Point3<f64>]> {
        self.origin_points.as_deref()
    }

    pub fn take_origin_points(&mut self) -> Option<Vec<Point3<f64>>> {
        self.origin_points.take()
    }

    #[inline]
    pub fn rms(&self) -> f64 {
        self.rms
    }

    #[inline]
    pub fn surface(&self) -> f64 {
        self.surface
    }

    #[inline]
    pub fn max_edge_length(&self) -> f64 {
        self.max_edge_length
    }

    #[inline]
    pub fn quality(&self) -> FacetQuality {
        self.quality
    }

    pub fn set_quality(&mut self, quality: FacetQuality) {
        self.quality = quality;
    }

    #[inline]
    pub fn fitting(&self) -> f64 {
        self.quality.fitting
    }

    pub fn set_fitting(&mut self, value: f64) {
        self.quality.fitting = value;
    }

    #[inline]
    pub fn coverage(&self) -> f64 {
        self.quality.coverage
    }

    pub fn set_coverage(&mut self, value: f64) {
        self.quality.coverage = value;
    }

    #[inline]
    pub fn confidence(&self) -> f64 {
        self.quality.confidence
    }

    pub fn set_confidence(&mut self, value: f64) {
        self.quality.confidence = value;
    }

    #[inline]
    pub fn distance(&self) -> f64 {
        self.quality.distance
    }

    pub fn set_distance(&mut self, value: f64) {
        self.quality.distance = value;
    }

    #[inline]
    pub fn color(&self) -> Option<[u8; 3]> {
        self.color
    }

    pub fn set_color(&mut self, color: Option<[u8; 3]>) {
        self.color = color;
    }

    /// Incremented on every geometry change
    #[inline]
    pub fn revision(&self) -> u64 {
        self.changes.revision()
    }

    #[inline]
    pub fn last_change_origin(&self) -> Option<ChangeOrigin> {
        self.changes.last_origin()
    }

    /// Listen to externally originated geometry changes
    pub fn set_observer(&mut self, observer: Box<dyn GeometryObserver + Send>) {
        self.changes.set_observer(observer);
    }

    pub(crate) fn changes(&self) -> &ChangeTracker {
        &self.changes
    }

    /// Move the observer of `previous` onto this facet
    pub(crate) fn adopt_observer(&mut self, previous: &mut Facet) {
        if let Some(observer) = previous.changes.clear_observer() {
            self.changes.set_observer(observer);
        }
    }

    /// Overwrite the values that a persisted facet carries beyond its contour
    pub(crate) fn restore_state(
        &mut self,
        center: Point3<f64>,
        rms: f64,
        max_edge_length: f64,
        origin_points: Option<Vec<Point3<f64>>>,
    ) {
        self.center = center;
        self.rms = rms;
        self.max_edge_length = max_edge_length;
        self.origin_points = origin_points;
    }
}

impl PlanarEntity for Facet {
    fn normal(&self) -> Vector3<f64> {
        self.plane.normal()
    }

    fn center(&self) -> Point3<f64> {
        self.center
    }

    fn equation(&self) -> PlaneEquation {
        self.plane
    }

    fn apply_planar_entity_change(&mut self, transform: &Isometry3<f64>) {
        self.apply_transform(transform);
    }
}

/// Plane fit → hull → triangulation over a raw point set
fn geometry_from_points(
    points: &[Point3<f64>],
    max_edge_length: f64,
    plane: Option<&PlaneEquation>,
    config: &GeometryConfig,
) -> Result<FacetGeometry> {
    let fit = fit_plane_with_config(points, plane, config)?;

    let hull = extract_hull(&fit.projected, max_edge_length)?;
    if hull.is_empty() {
        return Err(Error::HullConstruction("hull is empty".to_string()));
    }

    let mut boundary: Vec<Point2<f64>> = Vec::new();
    boundary.try_reserve_exact(hull.len())?;
    boundary.extend(hull.iter().map(|&i| fit.projected[i]));

    let mut contour = Vec::new();
    contour.try_reserve_exact(hull.len())?;
    contour.extend(boundary.iter().map(|q| fit.basis.lift(q)));

    let triangulation = triangulate_contour(&boundary, max_edge_length > 0.0, config)?;

    assemble(
        fit.equation,
        fit.centroid,
        fit.rms,
        contour,
        true,
        triangulation,
        true,
    )
}

/// Plane fit (unless supplied) → triangulation over an ordered contour
fn geometry_from_contour(
    points: &[Point3<f64>],
    close_as_polygon: bool,
    plane: Option<&PlaneEquation>,
    config: &GeometryConfig,
) -> Result<FacetGeometry> {
    if points.len() < 3 {
        return Err(Error::insufficient(3, points.len()));
    }

    let fit = fit_plane_with_config(points, plane, config)?;
    let triangulation = triangulate_contour(&fit.projected, true, config)?;

    let mut contour = Vec::new();
    contour.try_reserve_exact(points.len())?;
    contour.extend(points.iter().map(|p| fit.equation.project_point(p)));

    assemble(
        fit.equation,
        fit.centroid,
        fit.rms,
        contour,
        close_as_polygon,
        triangulation,
        close_as_polygon,
    )
}

/// Orientation canonicalization happens here and only here: a negative
/// boundary area in the plane frame flips the plane, which makes the
/// boundary-wound triangles agree with the stored normal.
fn assemble(
    mut plane: PlaneEquation,
    center: Point3<f64>,
    rms: f64,
    contour: Vec<Point3<f64>>,
    closed: bool,
    triangulation: Triangulation,
    canonicalize: bool,
) -> Result<FacetGeometry> {
    if canonicalize && triangulation.signed_area < 0.0 {
        plane.invert();
    }

    let mut mesh = TriangleMesh::try_with_capacity(triangulation.triangles.len(), 1)?;
    let normal_index = mesh.add_normal(plane.normal());
    for t in &triangulation.triangles {
        mesh.add_triangle(t[0] as u32, t[1] as u32, t[2] as u32, normal_index);
    }

    let surface = mesh.area(&contour);
    let polyline = Polyline::sequential(contour.len(), closed);

    Ok(FacetGeometry {
        plane,
        center,
        contour,
        polyline,
        mesh,
        rms,
        surface,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use nalgebra::{Translation3, UnitQuaternion};
    use std::sync::{Arc, Mutex};

    fn square(z: f64) -> Vec<Point3<f64>> {
        vec![
            Point3::new(0.0, 0.0, z),
            Point3::new(1.0, 0.0, z),
            Point3::new(1.0, 1.0, z),
            Point3::new(0.0, 1.0, z),
        ]
    }

    fn winding_normal(facet: &Facet, tri: usize) -> Vector3<f64> {
        let t = facet.mesh().unwrap().triangles[tri];
        let c = facet.contour();
        (c[t[1] as usize] - c[t[0] as usize])
            .cross(&(c[t[2] as usize] - c[t[0] as usize]))
            .normalize()
    }

    #[test]
    fn create_from_noisy_points() {
        let mut points = Vec::new();
        for i in 0..10 {
            for j in 0..10 {
                let noise = if (i + j) % 2 == 0 { 0.001 } else { -0.001 };
                points.push(Point3::new(i as f64, j as f64, 2.0 + noise));
            }
        }
        let facet = Facet::create(points, 0.0, true, None).unwrap();

        assert_relative_eq!(facet.normal(), Vector3::z(), epsilon = 1e-3);
        assert_relative_eq!(facet.surface(), 81.0, epsilon = 1e-6);
        assert!(facet.rms() < 2e-3);
        assert_eq!(facet.origin_points().map(<[_]>::len), Some(100));
        assert_eq!(facet.contour().len(), 4);
        for p in facet.contour() {
            assert_abs_diff_eq!(facet.distance_to(p), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn create_without_transfer_drops_points() {
        let facet = Facet::create(square(0.0), 0.0, false, None).unwrap();
        assert!(facet.origin_points().is_none());
    }

    #[test]
    fn mesh_indices_stay_in_contour() {
        let facet = Facet::create_from_contour(&square(1.0), true, None).unwrap();
        let mesh = facet.mesh().unwrap();
        assert!((mesh.max_index().unwrap() as usize) < facet.contour().len());
        assert_relative_eq!(facet.surface(), mesh.area(facet.contour()));
        assert!(mesh.triangle_normals.iter().all(|&n| n == 0));
    }

    #[test]
    fn canonicalization_follows_right_hand_rule() {
        let ccw = Facet::create_from_contour(&square(0.0), true, None).unwrap();
        let mut cw_points = square(0.0);
        cw_points.reverse();
        let cw = Facet::create_from_contour(&cw_points, true, None).unwrap();

        assert_relative_eq!(ccw.normal(), Vector3::z(), epsilon = 1e-12);
        assert_relative_eq!(cw.normal(), -Vector3::z(), epsilon = 1e-12);
        for facet in [&ccw, &cw] {
            for i in 0..facet.triangle_count() {
                assert!(winding_normal(facet, i).dot(&facet.normal()) > 0.0);
            }
        }
    }

    #[test]
    fn canonicalization_ignores_supplied_sign() {
        let up = PlaneEquation::new(Vector3::z(), 0.0).unwrap();
        let down = up.inverted();
        let a = Facet::create_from_contour(&square(0.0), true, Some(&up)).unwrap();
        let b = Facet::create_from_contour(&square(0.0), true, Some(&down)).unwrap();
        assert_eq!(a.plane_equation(), b.plane_equation());
        assert_relative_eq!(a.normal(), Vector3::z(), epsilon = 1e-12);
    }

    #[test]
    fn open_contour_keeps_supplied_sign() {
        let down = PlaneEquation::new(-Vector3::z(), 0.0).unwrap();
        let facet = Facet::create_from_contour(&square(0.0), false, Some(&down)).unwrap();
        assert_relative_eq!(facet.normal(), -Vector3::z());
        assert!(!facet.polyline().is_closed());
    }

    #[test]
    fn degenerate_contours_are_rejected() {
        let two = vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)];
        assert!(matches!(
            Facet::create_from_contour(&two, true, None),
            Err(Error::InsufficientData { .. })
        ));

        let collinear = vec![
            Point3::origin(),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(2.0, 2.0, 0.0),
        ];
        assert!(matches!(
            Facet::create_from_contour(&collinear, true, None),
            Err(Error::DegenerateGeometry(_))
        ));

        let tiny: Vec<_> = square(0.0).iter().map(|p| Point3::from(p.coords * 1e-4)).collect();
        assert!(matches!(
            Facet::create_from_contour(&tiny, true, None),
            Err(Error::DegenerateGeometry(_))
        ));
    }

    #[test]
    fn failed_re_form_leaves_empty_facet() {
        let mut facet = Facet::create_from_contour(&square(0.0), true, None).unwrap();
        let plane = *facet.plane_equation();
        let two = vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)];

        assert!(facet.form_by_contour(&two, true, None).is_err());
        assert!(facet.is_empty());
        assert!(facet.mesh().is_none());
        assert!(facet.polyline().is_empty());
        assert_eq!(facet.surface(), 0.0);
        assert_eq!(facet.plane_equation(), &plane);
    }

    #[test]
    fn re_form_rebuilds_everything() {
        let mut facet = Facet::create_from_contour(&square(0.0), true, None).unwrap();
        let big: Vec<_> = square(5.0).iter().map(|p| Point3::new(p.x * 2.0, p.y * 3.0, p.z)).collect();
        facet.form_by_contour(&big, true, None).unwrap();

        assert_relative_eq!(facet.surface(), 6.0, epsilon = 1e-12);
        assert_relative_eq!(facet.plane_equation().d(), 5.0, epsilon = 1e-12);
        assert_relative_eq!(facet.center(), Point3::new(1.0, 1.5, 5.0), epsilon = 1e-12);
        assert_eq!(facet.polyline().len(), 4);
    }

    #[test]
    fn invert_normal_keeps_geometry() {
        let mut facet = Facet::create_from_contour(&square(2.0), true, None).unwrap();
        let contour = facet.contour().to_vec();
        facet.invert_normal();
        assert_relative_eq!(facet.normal(), -Vector3::z(), epsilon = 1e-12);
        assert_relative_eq!(facet.plane_equation().d(), -2.0, epsilon = 1e-12);
        assert_eq!(facet.contour(), contour.as_slice());
        assert_relative_eq!(facet.mesh().unwrap().normals[0], -Vector3::z());
    }

    #[test]
    fn rigid_transform_moves_plane_and_contour() {
        let mut facet = Facet::create_from_contour(&square(0.0), true, None).unwrap();
        let iso = Isometry3::from_parts(
            Translation3::new(0.0, 0.0, 4.0),
            UnitQuaternion::from_axis_angle(&Vector3::x_axis(), std::f64::consts::FRAC_PI_2),
        );
        facet.apply_transform(&iso);

        // +Z rotated a quarter turn about X points to -Y
        assert_relative_eq!(facet.normal(), -Vector3::y(), epsilon = 1e-12);
        for p in facet.contour() {
            assert_abs_diff_eq!(facet.distance_to(p), 0.0, epsilon = 1e-12);
        }
        assert_relative_eq!(facet.surface(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn quality_scores_default_to_unset() {
        let mut facet = Facet::create_from_contour(&square(0.0), true, None).unwrap();
        assert_eq!(facet.fitting(), -999_999.0);
        assert_eq!(facet.coverage(), -1.0);
        assert_eq!(facet.confidence(), -999_999.0);
        assert_eq!(facet.distance(), -1.0);

        facet.set_coverage(0.75);
        facet.set_confidence(0.5);
        assert_eq!(facet.quality().coverage, 0.75);
        assert_eq!(facet.confidence(), 0.5);
    }

    #[test]
    fn max_edge_length_re_extracts_from_origin_points() {
        let mut points = Vec::new();
        for i in 0..=4 {
            for j in 0..=4 {
                if i >= 3 && j >= 3 {
                    continue;
                }
                points.push(Point3::new(i as f64, j as f64, 0.0));
            }
        }
        let mut facet = Facet::create(points, 0.0, true, None).unwrap();
        assert_relative_eq!(facet.surface(), 14.0, epsilon = 1e-9);

        facet.set_max_edge_length(1.5).unwrap();
        assert_eq!(facet.max_edge_length(), 1.5);
        assert!(facet.surface() < 14.0 - 1e-6);
        assert_relative_eq!(facet.surface(), facet.contour_area(), epsilon = 1e-9);
    }

    #[test]
    fn observer_hears_external_re_form_only() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);

        let mut facet = Facet::create_from_contour(&square(0.0), true, None).unwrap();
        facet.set_observer(Box::new(move |e: &crate::propagation::GeometryChanged| {
            sink.lock().unwrap().push(e.origin);
        }));

        facet.form_by_contour(&square(1.0), true, None).unwrap();
        facet
            .form_by_contour_as(
                &square(2.0),
                true,
                None,
                ChangeOrigin::Owner,
                &GeometryConfig::default(),
            )
            .unwrap();

        assert_eq!(*events.lock().unwrap(), vec![ChangeOrigin::External]);
        assert_eq!(facet.revision(), 2);
        assert_eq!(facet.last_change_origin(), Some(ChangeOrigin::Owner));
    }

    #[test]
    fn clone_is_deep() {
        let original = Facet::create_from_contour(&square(0.0), true, None).unwrap();
        let mut copy = original.clone();
        copy.form_by_contour(&square(3.0), true, None).unwrap();
        assert_relative_eq!(original.plane_equation().d(), 0.0);
        assert_relative_eq!(copy.plane_equation().d(), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn quality_defaults_to_unset() {
        let mut facet = Facet::create(square(0.0), 0.0, true, None).unwrap();
        assert_eq!(facet.quality(), FacetQuality::default());

        facet.set_fitting(0.9);
        facet.set_distance(0.25);
        assert_eq!(facet.fitting(), 0.9);
        assert_eq!(facet.distance(), 0.25);
        assert_eq!(facet.confidence(), UNSET_SCORE);
        assert_eq!(facet.revision(), 0);

        assert_eq!(facet.take_origin_points().map(|p| p.len()), Some(4));
        assert!(facet.origin_points().is_none());
    }
}
