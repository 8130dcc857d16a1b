// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Extruded blocks
//!
//! A block is a profile on a main plane, extruded along the plane normal up
//! to two independently tilted cap planes. The caps are derived by casting
//! every profile point along the main normal onto each cap plane; the two
//! resulting facets are stitched into one closed mesh.
//!
//! Every edit re-derives the whole solid. Rebuilds run on copies of the cap
//! facets and are committed only when every step succeeds.

mod main_plane;
mod solid;


pub use main_plane::MainPlane;
pub use solid::WallPolygons;

use nalgebra::{Isometry3, Point3, Vector3};
use tracing::{debug, warn};

use crate::config::GeometryConfig;
use crate::error::{Error, Result};
use crate::facet::Facet;
use crate::mesh::Mesh;
use crate::planar::PlanarEntity;
use crate::plane::{fit_plane_with_config, PlaneEquation};
use crate::propagation::{ChangeOrigin, ChangeTracker, GeometryObserver};

/// Which cap of a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapKind {
    Top,
    Bottom,
}

impl CapKind {
    #[inline]
    pub fn other(self) -> Self {
        match self {
            CapKind::Top => CapKind::Bottom,
            CapKind::Bottom => CapKind::Top,
        }
    }
}

/// Height along the main normal plus the cap plane normal
#[derive(Debug, Clone, Copy, PartialEq)]
struct CapParams {
    height: f64,
    /// Unit, pointing to the same side as the main normal
    normal: Vector3<f64>,
}

impl CapParams {
    fn new(height: f64, normal: Vector3<f64>, main: &MainPlane) -> Result<Self> {
        let normal = normal
            .try_normalize(1e-12)
            .ok_or_else(|| Error::DegenerateBlock("cap normal has zero length".to_string()))?;
        Ok(Self {
            height,
            normal: along(normal, &main.normal()),
        })
    }

    fn plane(&self, main: &MainPlane) -> Result<PlaneEquation> {
        let cap_center = main.center() + main.normal() * self.height;
        PlaneEquation::from_point_normal(&cap_center, &self.normal)
    }
}

/// `v` or `-v`, whichever points to the side of `reference`
#[inline]
fn along(v: Vector3<f64>, reference: &Vector3<f64>) -> Vector3<f64> {
    if v.dot(reference) < 0.0 {
        -v
    } else {
        v
    }
}

/// Output of a successful derivation, not yet committed
struct Derived {
    main_plane: Option<MainPlane>,
    top: CapParams,
    bottom: CapParams,
    top_facet: Facet,
    bottom_facet: Facet,
    mesh: Mesh,
}

/// Solid extruded from a main-plane profile between two cap planes
#[derive(Debug)]
pub struct Block {
    name: String,
    main_plane: MainPlane,
    top: CapParams,
    bottom: CapParams,
    top_facet: Facet,
    bottom_facet: Facet,
    mesh: Mesh,
    config: GeometryConfig,
    changes: ChangeTracker,
}

impl Block {
    /// Full constructor.
    ///
    /// Heights are signed offsets along the main normal from the profile
    /// center. A `top_height` below `bottom_height` makes the block a hole.
    /// Cap normals only define the cap planes; their sign is dropped and they
    /// are stored pointing along the main normal.
    pub fn new(
        main_plane: MainPlane,
        top_height: f64,
        top_normal: Vector3<f64>,
        bottom_height: f64,
        bottom_normal: Vector3<f64>,
        name: impl Into<String>,
    ) -> Result<Self> {
        Self::new_with_config(
            main_plane,
            top_height,
            top_normal,
            bottom_height,
            bottom_normal,
            name,
            GeometryConfig::default(),
        )
    }

    pub fn new_with_config(
        main_plane: MainPlane,
        top_height: f64,
        top_normal: Vector3<f64>,
        bottom_height: f64,
        bottom_normal: Vector3<f64>,
        name: impl Into<String>,
        config: GeometryConfig,
    ) -> Result<Self> {
        let name = name.into();
        let top = CapParams::new(top_height, top_normal, &main_plane)?;
        let bottom = CapParams::new(bottom_height, bottom_normal, &main_plane)?;

        let derived = derive(&main_plane, top, bottom, None, &config)?;
        let block = Self::assemble(name, main_plane, derived, config);
        debug!(
            name = %block.name,
            top_height,
            bottom_height,
            triangles = block.mesh.triangle_count(),
            "block built"
        );
        Ok(block)
    }

    /// Block whose roof is `top_contour` and whose floor is the horizontal
    /// plane `z = bottom_height`.
    ///
    /// Fails with [`Error::DegenerateBlock`] when no contour point lies above
    /// `bottom_height`.
    pub fn create(
        top_contour: &[Point3<f64>],
        bottom_height: f64,
        name: impl Into<String>,
    ) -> Result<Self> {
        Self::create_with_config(top_contour, bottom_height, name, GeometryConfig::default())
    }

    pub fn create_with_config(
        top_contour: &[Point3<f64>],
        bottom_height: f64,
        name: impl Into<String>,
        config: GeometryConfig,
    ) -> Result<Self> {
        if top_contour.len() < 3 {
            return Err(Error::insufficient(3, top_contour.len()));
        }
        if top_contour.iter().all(|p| p.z <= bottom_height) {
            return Err(Error::DegenerateBlock(format!(
                "every contour point is at or below the bottom height {}",
                bottom_height
            )));
        }

        let floor = PlaneEquation::new(Vector3::z(), bottom_height)?;
        let mut derived = derive_authored(
            &floor,
            CapKind::Top,
            top_contour,
            None,
            floor,
            None,
            &config,
        )?;
        let main_plane = derived
            .main_plane
            .take()
            .ok_or_else(|| Error::DegenerateBlock("no profile was derived".to_string()))?;

        let block = Self::assemble(name.into(), main_plane, derived, config);
        debug!(
            name = %block.name,
            top_height = block.top.height,
            vertices = block.mesh.vertex_count(),
            "block created from roof contour"
        );
        Ok(block)
    }

    fn assemble(name: String, main_plane: MainPlane, derived: Derived, config: GeometryConfig) -> Self {
        let mut block = Self {
            name,
            main_plane,
            top: derived.top,
            bottom: derived.bottom,
            top_facet: derived.top_facet,
            bottom_facet: derived.bottom_facet,
            mesh: derived.mesh,
            config,
            changes: ChangeTracker::new(),
        };
        block.name_facets();
        block
    }

    fn name_facets(&mut self) {
        self.top_facet.set_name(format!("{} top", self.name));
        self.bottom_facet.set_name(format!("{} bottom", self.name));
    }

    /// Copy built from the parameters (main plane, heights, normals)
    pub fn try_clone(&self) -> Result<Self> {
        let mut copy = Self::new_with_config(
            self.main_plane.clone(),
            self.top.height,
            self.top.normal,
            self.bottom.height,
            self.bottom.normal,
            self.name.clone(),
            self.config,
        )?;
        copy.top_facet.set_quality(self.top_facet.quality());
        copy.bottom_facet.set_quality(self.bottom_facet.quality());
        copy.top_facet.set_color(self.top_facet.color());
        copy.bottom_facet.set_color(self.bottom_facet.color());
        Ok(copy)
    }

    /// Re-derive both caps and the solid from the current parameters.
    pub fn build_up(&mut self) -> Result<()> {
        self.rebuild(self.top, self.bottom)
    }

    /// Derive with the given parameters and commit them on success only
    fn rebuild(&mut self, top: CapParams, bottom: CapParams) -> Result<()> {
        let existing = (&self.top_facet, &self.bottom_facet);
        match derive(&self.main_plane, top, bottom, Some(existing), &self.config) {
            Ok(derived) => {
                self.commit(derived);
                debug!(
                    name = %self.name,
                    top_height = self.top.height,
                    bottom_height = self.bottom.height,
                    revision = self.changes.revision(),
                    "block rebuilt"
                );
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, name = %self.name, "block rebuild rejected, previous solid kept");
                Err(e)
            }
        }
    }

    fn commit(&mut self, derived: Derived) {
        let Derived {
            main_plane,
            top,
            bottom,
            mut top_facet,
            mut bottom_facet,
            mesh,
        } = derived;

        if let Some(main_plane) = main_plane {
            self.main_plane = main_plane;
        }
        self.top = top;
        self.bottom = bottom;

        top_facet.adopt_observer(&mut self.top_facet);
        bottom_facet.adopt_observer(&mut self.bottom_facet);
        self.top_facet = top_facet;
        self.bottom_facet = bottom_facet;
        self.name_facets();

        self.mesh = mesh;
        self.changes.touch(ChangeOrigin::External);
    }

    /// Rebuild the solid mesh from the current cap facets, without
    /// re-deriving them.
    pub fn build_from_facet(&mut self) -> Result<()> {
        let mesh = solid::stitch(&self.top_facet, &self.bottom_facet)?;
        self.mesh = mesh;
        self.changes.touch(ChangeOrigin::External);
        Ok(())
    }

    pub fn set_top_height(&mut self, height: f64) -> Result<()> {
        let top = CapParams { height, ..self.top };
        self.rebuild(top, self.bottom)
    }

    pub fn set_bottom_height(&mut self, height: f64) -> Result<()> {
        let bottom = CapParams { height, ..self.bottom };
        self.rebuild(self.top, bottom)
    }

    pub fn set_top_normal(&mut self, normal: Vector3<f64>) -> Result<()> {
        let top = CapParams::new(self.top.height, normal, &self.main_plane)?;
        self.rebuild(top, self.bottom)
    }

    pub fn set_bottom_normal(&mut self, normal: Vector3<f64>) -> Result<()> {
        let bottom = CapParams::new(self.bottom.height, normal, &self.main_plane)?;
        self.rebuild(self.top, bottom)
    }

    /// Author one cap directly.
    ///
    /// The profile becomes the projection of `points` onto the main plane and
    /// the other cap is cast from it. With `compute_plane` the cap plane is
    /// fitted to `points`, otherwise the current cap plane is kept and the
    /// points are only used for their footprint.
    pub fn set_facet_points(
        &mut self,
        cap: CapKind,
        points: &[Point3<f64>],
        compute_plane: bool,
    ) -> Result<()> {
        let authored_plane = if compute_plane {
            None
        } else {
            Some(self.cap(cap).plane(&self.main_plane)?)
        };
        let other_plane = self.cap(cap.other()).plane(&self.main_plane)?;

        let result = derive_authored(
            self.main_plane.equation(),
            cap,
            points,
            authored_plane,
            other_plane,
            Some((&self.top_facet, &self.bottom_facet)),
            &self.config,
        );
        match result {
            Ok(derived) => {
                self.commit(derived);
                debug!(name = %self.name, ?cap, points = points.len(), "cap authored");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, name = %self.name, ?cap, "cap authoring rejected");
                Err(e)
            }
        }
    }

    /// Recompute heights and normals from the current cap facets
    pub fn param_from_facet(&mut self) -> Result<()> {
        let top = cap_params(&self.main_plane, self.top_facet.plane_equation(), &self.config)?;
        let bottom = cap_params(&self.main_plane, self.bottom_facet.plane_equation(), &self.config)?;
        self.top = top;
        self.bottom = bottom;
        Ok(())
    }

    /// Edit an owned cap facet from outside the block.
    ///
    /// When the edit changes the facet geometry, the block resyncs its
    /// parameters from the edited facet and then rebuilds. If that fails the
    /// facet is restored and the block keeps its previous state.
    pub fn edit_facet<R>(&mut self, cap: CapKind, edit: impl FnOnce(&mut Facet) -> R) -> Result<R> {
        let backup = self.facet(cap).clone();
        let before = backup.revision();

        let out = edit(self.facet_mut(cap));

        if !self.facet(cap).changes().changed_externally_since(before) {
            return Ok(out);
        }

        let result = match cap_params(&self.main_plane, self.facet(cap).plane_equation(), &self.config) {
            Ok(params) => match cap {
                CapKind::Top => self.rebuild(params, self.bottom),
                CapKind::Bottom => self.rebuild(self.top, params),
            },
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => Ok(out),
            Err(e) => {
                let mut restored = backup;
                restored.adopt_observer(self.facet_mut(cap));
                *self.facet_mut(cap) = restored;
                Err(e)
            }
        }
    }

    /// Rigidly move one cap facet, then resync the block from it
    pub fn transform_facet(&mut self, cap: CapKind, transform: &Isometry3<f64>) -> Result<()> {
        self.edit_facet(cap, |facet| facet.apply_transform(transform))
    }

    /// Move the whole block. The main plane moves first; cap normals are then
    /// read back from the moved facets.
    pub fn apply_transform(&mut self, transform: &Isometry3<f64>) {
        self.main_plane.apply_transform(transform);
        self.top_facet.apply_transform_as(transform, ChangeOrigin::Owner);
        self.bottom_facet.apply_transform_as(transform, ChangeOrigin::Owner);
        self.mesh.apply_transform(transform);

        let n = self.main_plane.normal();
        self.top.normal = along(self.top_facet.normal(), &n);
        self.bottom.normal = along(self.bottom_facet.normal(), &n);
        self.changes.touch(ChangeOrigin::External);
    }

    /// Roof, reversed bottom and side quads, all facing outward
    pub fn wall_polygons(&self) -> WallPolygons {
        solid::wall_polygons(&self.top_facet, &self.bottom_facet, self.is_hole())
    }

    /// Top below bottom: the solid carves space instead of filling it
    #[inline]
    pub fn is_hole(&self) -> bool {
        self.top.height < self.bottom.height
    }

    /// Enclosed volume of the solid mesh
    #[inline]
    pub fn volume(&self) -> f64 {
        self.mesh.volume()
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.name_facets();
    }

    #[inline]
    pub fn main_plane(&self) -> &MainPlane {
        &self.main_plane
    }

    #[inline]
    pub fn top_height(&self) -> f64 {
        self.top.height
    }

    #[inline]
    pub fn bottom_height(&self) -> f64 {
        self.bottom.height
    }

    /// Top cap plane normal, always on the side of the main normal.
    /// The top facet's own normal may point the other way.
    #[inline]
    pub fn top_normal(&self) -> Vector3<f64> {
        self.top.normal
    }

    /// Bottom cap plane normal, always on the side of the main normal.
    /// The outward-facing normal is on [`Block::bottom_facet`].
    #[inline]
    pub fn bottom_normal(&self) -> Vector3<f64> {
        self.bottom.normal
    }

    #[inline]
    pub fn top_facet(&self) -> &Facet {
        &self.top_facet
    }

    #[inline]
    pub fn bottom_facet(&self) -> &Facet {
        &self.bottom_facet
    }

    pub fn facet(&self, cap: CapKind) -> &Facet {
        match cap {
            CapKind::Top => &self.top_facet,
            CapKind::Bottom => &self.bottom_facet,
        }
    }

    fn facet_mut(&mut self, cap: CapKind) -> &mut Facet {
        match cap {
            CapKind::Top => &mut self.top_facet,
            CapKind::Bottom => &mut self.bottom_facet,
        }
    }

    fn cap(&self, cap: CapKind) -> &CapParams {
        match cap {
            CapKind::Top => &self.top,
            CapKind::Bottom => &self.bottom,
        }
    }

    #[inline]
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    #[inline]
    pub fn config(&self) -> &GeometryConfig {
        &self.config
    }

    /// Incremented on every committed change
    #[inline]
    pub fn revision(&self) -> u64 {
        self.changes.revision()
    }

    /// Listen to committed rebuilds and transforms
    pub fn set_observer(&mut self, observer: Box<dyn GeometryObserver + Send>) {
        self.changes.set_observer(observer);
    }

    pub fn clear_observer(&mut self) -> Option<Box<dyn GeometryObserver + Send>> {
        self.changes.clear_observer()
    }
}

impl PlanarEntity for Block {
    fn normal(&self) -> Vector3<f64> {
        self.main_plane.normal()
    }

    fn center(&self) -> Point3<f64> {
        self.main_plane.center()
    }

    fn equation(&self) -> PlaneEquation {
        *self.main_plane.equation()
    }

    fn apply_planar_entity_change(&mut self, transform: &Isometry3<f64>) {
        self.apply_transform(transform);
    }
}

/// Height (along the main normal, from the profile center) and oriented
/// normal of a cap plane
fn cap_params(main: &MainPlane, plane: &PlaneEquation, config: &GeometryConfig) -> Result<CapParams> {
    let n = main.normal();
    let center = main.center();
    let hit = plane
        .intersect_ray(&center, &n, config.parallel_tolerance)
        .ok_or_else(|| Error::DegenerateBlock("cap plane is parallel to the main normal".to_string()))?;
    Ok(CapParams {
        height: (hit - center).dot(&n),
        normal: along(plane.normal(), &n),
    })
}

/// Cast every profile point along the main normal onto `plane`
fn deduce_contour(
    main: &MainPlane,
    plane: &PlaneEquation,
    config: &GeometryConfig,
) -> Result<Vec<Point3<f64>>> {
    let n = main.normal();
    let mut points = Vec::new();
    points.try_reserve_exact(main.len())?;
    for p in main.profile() {
        let hit = plane
            .intersect_ray(p, &n, config.parallel_tolerance)
            .ok_or_else(|| Error::DegenerateBlock("profile ray is parallel to the cap plane".to_string()))?;
        points.push(hit);
    }
    if points.len() < 3 {
        return Err(Error::DegenerateBlock(format!(
            "cap contour has {} points",
            points.len()
        )));
    }
    Ok(points)
}

/// Re-form a copy of `existing`, or create a fresh facet
fn form_cap(
    existing: Option<&Facet>,
    points: &[Point3<f64>],
    plane: Option<&PlaneEquation>,
    config: &GeometryConfig,
) -> Result<Facet> {
    match existing {
        Some(facet) => {
            let mut facet = facet.clone();
            facet.form_by_contour_as(points, true, plane, ChangeOrigin::Owner, config)?;
            Ok(facet)
        }
        None => Facet::create_from_contour_with_config(points, true, plane, config),
    }
}

/// The cap facing away from the solid gets its normal inverted: the bottom
/// for an upright block, the top for a hole.
fn orient_caps(top: &mut Facet, bottom: &mut Facet, top_height: f64, bottom_height: f64) {
    if bottom_height <= top_height {
        bottom.invert_normal_as(ChangeOrigin::Owner);
    } else {
        top.invert_normal_as(ChangeOrigin::Owner);
    }
}

/// Cast both caps from the profile, re-form them and stitch the solid
fn derive(
    main: &MainPlane,
    top: CapParams,
    bottom: CapParams,
    existing: Option<(&Facet, &Facet)>,
    config: &GeometryConfig,
) -> Result<Derived> {
    let top_plane = top.plane(main)?;
    let bottom_plane = bottom.plane(main)?;
    let top_points = deduce_contour(main, &top_plane, config)?;
    let bottom_points = deduce_contour(main, &bottom_plane, config)?;

    let mut top_facet = form_cap(existing.map(|e| e.0), &top_points, Some(&top_plane), config)?;
    let mut bottom_facet =
        form_cap(existing.map(|e| e.1), &bottom_points, Some(&bottom_plane), config)?;

    orient_caps(&mut top_facet, &mut bottom_facet, top.height, bottom.height);
    let mesh = solid::stitch(&top_facet, &bottom_facet)?;

    Ok(Derived {
        main_plane: None,
        top,
        bottom,
        top_facet,
        bottom_facet,
        mesh,
    })
}

/// Build around one authored cap: new profile from its footprint, the
/// authored facet cast from the profile onto `authored_plane` (or onto the
/// plane fitted to `points`), the other cap cast onto `other_plane`.
fn derive_authored(
    main_equation: &PlaneEquation,
    cap: CapKind,
    points: &[Point3<f64>],
    authored_plane: Option<PlaneEquation>,
    other_plane: PlaneEquation,
    existing: Option<(&Facet, &Facet)>,
    config: &GeometryConfig,
) -> Result<Derived> {
    if points.len() < 3 {
        return Err(Error::insufficient(3, points.len()));
    }

    let mut footprint: Vec<Point3<f64>> = Vec::new();
    footprint.try_reserve_exact(points.len())?;
    footprint.extend(points.iter().map(|p| main_equation.project_point(p)));
    let main = MainPlane::with_min_area(*main_equation, footprint, config.min_polygon_area)?;

    let (existing_authored, existing_other) = match (existing, cap) {
        (Some((t, b)), CapKind::Top) => (Some(t), Some(b)),
        (Some((t, b)), CapKind::Bottom) => (Some(b), Some(t)),
        (None, _) => (None, None),
    };

    let authored_facet = match authored_plane {
        Some(plane) => {
            let cast = deduce_contour(&main, &plane, config)?;
            form_cap(existing_authored, &cast, Some(&plane), config)?
        }
        None => {
            // Cast onto the fitted plane so the cap stays above the profile
            let fit = fit_plane_with_config(points, None, config)?;
            let cast = deduce_contour(&main, &fit.equation, config)?;
            form_cap(existing_authored, &cast, Some(&fit.equation), config)?
        }
    };
    let authored_params = cap_params(&main, authored_facet.plane_equation(), config)?;
    let other_params = cap_params(&main, &other_plane, config)?;

    let other_points = deduce_contour(&main, &other_params.plane(&main)?, config)?;
    let other_facet = form_cap(
        existing_other,
        &other_points,
        Some(&other_params.plane(&main)?),
        config,
    )?;

    let (top, bottom, mut top_facet, mut bottom_facet) = match cap {
        CapKind::Top => (authored_params, other_params, authored_facet, other_facet),
        CapKind::Bottom => (other_params, authored_params, other_facet, authored_facet),
    };

    orient_caps(&mut top_facet, &mut bottom_facet, top.height, bottom.height);
    let mesh = solid::stitch(&top_facet, &bottom_facet)?;

    Ok(Derived {
        main_plane: Some(main),
        top,
        bottom,
        top_facet,
        bottom_facet,
        mesh,
    })
}
