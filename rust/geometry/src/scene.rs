// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scene arena and JSON persistence.
//!
//! A [`Scene`] owns standalone facets and blocks under stable slotmap keys.
//! Snapshots give every facet and block a sequential `u32` ID; block records
//! reference their cap facets by ID. Loading is two-phase: every record is
//! read and indexed first, then block references are resolved.

use nalgebra::{Isometry3, Point3, Vector3};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};
use tracing::debug;

use crate::block::{Block, CapKind, MainPlane};
use crate::config::GeometryConfig;
use crate::error::{Error, Result};
use crate::facet::{Facet, FacetQuality};
use crate::planar::PlanarEntity;
use crate::plane::PlaneEquation;
use crate::propagation::ChangeOrigin;

/// Snapshot format written by [`Scene::to_json`]
pub const SNAPSHOT_VERSION: u32 = 1;

new_key_type! {
    /// Key of a standalone facet
    pub struct FacetKey;

    /// Key of a block
    pub struct BlockKey;
}

/// Owner of standalone facets and blocks
#[derive(Debug, Default)]
pub struct Scene {
    facets: SlotMap<FacetKey, Facet>,
    blocks: SlotMap<BlockKey, Block>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub version: u32,
    pub facets: Vec<FacetSnapshot>,
    pub blocks: Vec<BlockSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacetSnapshot {
    pub id: u32,
    pub name: String,
    pub plane: [f64; 4],
    pub center: [f64; 3],
    pub contour: Vec<[f64; 3]>,
    pub closed: bool,
    pub rms: f64,
    pub surface: f64,
    pub max_edge_length: f64,
    pub fitting: f64,
    pub coverage: f64,
    pub confidence: f64,
    pub distance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<[u8; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_points: Option<Vec<[f64; 3]>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockSnapshot {
    pub id: u32,
    pub name: String,
    pub main_plane: [f64; 4],
    pub profile: Vec<[f64; 3]>,
    pub top_height: f64,
    pub top_normal: [f64; 3],
    pub bottom_height: f64,
    pub bottom_normal: [f64; 3],
    /// ID of the top cap facet record
    pub top_facet: u32,
    /// ID of the bottom cap facet record
    pub bottom_facet: u32,
    #[serde(default)]
    pub config: GeometryConfig,
}

#[inline]
fn to_array(p: &Point3<f64>) -> [f64; 3] {
    [p.x, p.y, p.z]
}

#[inline]
fn to_point(a: &[f64; 3]) -> Point3<f64> {
    Point3::new(a[0], a[1], a[2])
}

fn facet_snapshot(id: u32, facet: &Facet) -> FacetSnapshot {
    let quality = facet.quality();
    FacetSnapshot {
        id,
        name: facet.name().to_string(),
        plane: facet.plane_equation().to_array(),
        center: to_array(&facet.center()),
        contour: facet.contour().iter().map(to_array).collect(),
        closed: facet.polyline().is_closed(),
        rms: facet.rms(),
        surface: facet.surface(),
        max_edge_length: facet.max_edge_length(),
        fitting: quality.fitting,
        coverage: quality.coverage,
        confidence: quality.confidence,
        distance: quality.distance,
        color: facet.color(),
        origin_points: facet
            .origin_points()
            .map(|points| points.iter().map(to_array).collect()),
    }
}

/// Annotations carried by a record beyond its geometry
fn restore_annotations(facet: &mut Facet, record: &FacetSnapshot) {
    facet.set_name(record.name.clone());
    facet.set_quality(FacetQuality {
        fitting: record.fitting,
        coverage: record.coverage,
        confidence: record.confidence,
        distance: record.distance,
    });
    facet.set_color(record.color);
}

fn restore_facet(record: &FacetSnapshot) -> Result<Facet> {
    let plane = PlaneEquation::from_array(record.plane)?;
    let contour: Vec<Point3<f64>> = record.contour.iter().map(to_point).collect();

    let mut facet = if contour.is_empty() {
        Facet::empty(plane, record.closed)
    } else {
        Facet::create_from_contour(&contour, record.closed, Some(&plane))?
    };
    // Canonicalization may have flipped a plane that was inverted on purpose
    if facet.normal().dot(&plane.normal()) < 0.0 {
        facet.invert_normal_as(ChangeOrigin::Owner);
    }
    facet.restore_state(
        to_point(&record.center),
        record.rms,
        record.max_edge_length,
        record
            .origin_points
            .as_ref()
            .map(|points| points.iter().map(to_point).collect()),
    );
    restore_annotations(&mut facet, record);
    Ok(facet)
}

fn restore_block(
    record: &BlockSnapshot,
    table: &FxHashMap<u32, &FacetSnapshot>,
) -> Result<Block> {
    let top_record = table
        .get(&record.top_facet)
        .ok_or(Error::UnresolvedReference(record.top_facet))?;
    let bottom_record = table
        .get(&record.bottom_facet)
        .ok_or(Error::UnresolvedReference(record.bottom_facet))?;

    let equation = PlaneEquation::from_array(record.main_plane)?;
    let profile = record.profile.iter().map(to_point).collect();
    let main_plane = MainPlane::new(equation, profile)?;

    let mut block = Block::new_with_config(
        main_plane,
        record.top_height,
        Vector3::from(record.top_normal),
        record.bottom_height,
        Vector3::from(record.bottom_normal),
        record.name.clone(),
        record.config,
    )?;

    // Geometry is re-derived from the parameters; only annotations come from
    // the cap records. Annotation edits never trigger a rebuild.
    block.edit_facet(CapKind::Top, |facet| {
        restore_annotations(facet, top_record)
    })?;
    block.edit_facet(CapKind::Bottom, |facet| {
        restore_annotations(facet, bottom_record)
    })?;
    Ok(block)
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_facet(&mut self, facet: Facet) -> FacetKey {
        self.facets.insert(facet)
    }

    pub fn insert_block(&mut self, block: Block) -> BlockKey {
        self.blocks.insert(block)
    }

    #[inline]
    pub fn facet(&self, key: FacetKey) -> Option<&Facet> {
        self.facets.get(key)
    }

    #[inline]
    pub fn facet_mut(&mut self, key: FacetKey) -> Option<&mut Facet> {
        self.facets.get_mut(key)
    }

    #[inline]
    pub fn block(&self, key: BlockKey) -> Option<&Block> {
        self.blocks.get(key)
    }

    #[inline]
    pub fn block_mut(&mut self, key: BlockKey) -> Option<&mut Block> {
        self.blocks.get_mut(key)
    }

    pub fn remove_facet(&mut self, key: FacetKey) -> Option<Facet> {
        self.facets.remove(key)
    }

    pub fn remove_block(&mut self, key: BlockKey) -> Option<Block> {
        self.blocks.remove(key)
    }

    pub fn facets(&self) -> impl Iterator<Item = (FacetKey, &Facet)> {
        self.facets.iter()
    }

    pub fn blocks(&self) -> impl Iterator<Item = (BlockKey, &Block)> {
        self.blocks.iter()
    }

    #[inline]
    pub fn facet_count(&self) -> usize {
        self.facets.len()
    }

    #[inline]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Move every entity rigidly
    pub fn apply_transform(&mut self, transform: &Isometry3<f64>) {
        let entities = self
            .facets
            .values_mut()
            .map(|f| f as &mut dyn PlanarEntity)
            .chain(self.blocks.values_mut().map(|b| b as &mut dyn PlanarEntity));
        for entity in entities {
            entity.apply_planar_entity_change(transform);
        }
    }

    /// Serializes the scene to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        let snapshot = self.to_snapshot();
        serde_json::to_string_pretty(&snapshot).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Creates a serializable snapshot.
    ///
    /// IDs are sequential over facets then blocks, starting at 1; the cap
    /// facets of a block are written as facet records of their own.
    pub fn to_snapshot(&self) -> SceneSnapshot {
        let mut next_id = 1u32;
        let mut take_id = || {
            let id = next_id;
            next_id += 1;
            id
        };

        let mut facets: Vec<FacetSnapshot> = self
            .facets
            .values()
            .map(|f| facet_snapshot(take_id(), f))
            .collect();

        let mut blocks = Vec::with_capacity(self.blocks.len());
        for block in self.blocks.values() {
            let id = take_id();
            let top_id = take_id();
            let bottom_id = take_id();
            facets.push(facet_snapshot(top_id, block.top_facet()));
            facets.push(facet_snapshot(bottom_id, block.bottom_facet()));

            let main = block.main_plane();
            blocks.push(BlockSnapshot {
                id,
                name: block.name().to_string(),
                main_plane: main.equation().to_array(),
                profile: main.profile().iter().map(to_array).collect(),
                top_height: block.top_height(),
                top_normal: block.top_normal().into(),
                bottom_height: block.bottom_height(),
                bottom_normal: block.bottom_normal().into(),
                top_facet: top_id,
                bottom_facet: bottom_id,
                config: *block.config(),
            });
        }

        SceneSnapshot {
            version: SNAPSHOT_VERSION,
            facets,
            blocks,
        }
    }

    /// Deserializes a scene from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: SceneSnapshot =
            serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))?;
        Self::from_snapshot(&snapshot)
    }

    /// Reconstructs a scene from a snapshot.
    pub fn from_snapshot(snap: &SceneSnapshot) -> Result<Self> {
        if snap.version != SNAPSHOT_VERSION {
            return Err(Error::UnsupportedVersion(snap.version));
        }

        // Phase 1: index every facet record by ID
        let mut table: FxHashMap<u32, &FacetSnapshot> = FxHashMap::default();
        table.try_reserve(snap.facets.len())?;
        for record in &snap.facets {
            if table.insert(record.id, record).is_some() {
                return Err(Error::Serialization(format!(
                    "duplicate facet id {}",
                    record.id
                )));
            }
        }

        // Phase 2: resolve block references, then load what is left standalone
        let mut scene = Scene::new();
        let mut owned: FxHashSet<u32> = FxHashSet::default();
        for record in &snap.blocks {
            let block = restore_block(record, &table)?;
            owned.insert(record.top_facet);
            owned.insert(record.bottom_facet);
            scene.insert_block(block);
        }

        for record in snap.facets.iter().filter(|r| !owned.contains(&r.id)) {
            scene.insert_facet(restore_facet(record)?);
        }

        debug!(
            facets = scene.facet_count(),
            blocks = scene.block_count(),
            "scene loaded"
        );
        Ok(scene)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(z: f64) -> Vec<Point3<f64>> {
        vec![
            Point3::new(0.0, 0.0, z),
            Point3::new(2.0, 0.0, z),
            Point3::new(2.0, 1.0, z),
            Point3::new(0.0, 1.0, z),
        ]
    }

    fn sample_scene() -> Scene {
        let mut scene = Scene::new();
        let mut facet = Facet::create_from_contour(&square(0.0), true, None).unwrap();
        facet.set_name("ground");
        facet.set_coverage(0.8);
        facet.set_color(Some([200, 10, 10]));
        scene.insert_facet(facet);

        let block = Block::create(&square(3.0), 0.0, "house").unwrap();
        scene.insert_block(block);
        scene
    }

    #[test]
    fn snapshot_ids_are_unique() {
        let snap = sample_scene().to_snapshot();
        let mut ids: Vec<u32> = snap.facets.iter().map(|f| f.id).collect();
        ids.extend(snap.blocks.iter().map(|b| b.id));
        let count = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), count);
        assert_eq!(snap.facets.len(), 3);
    }

    #[test]
    fn json_round_trip() {
        let scene = sample_scene();
        let json = scene.to_json().unwrap();
        let loaded = Scene::from_json(&json).unwrap();

        assert_eq!(loaded.facet_count(), 1);
        assert_eq!(loaded.block_count(), 1);

        let (_, facet) = loaded.facets().next().unwrap();
        assert_eq!(facet.name(), "ground");
        assert_eq!(facet.coverage(), 0.8);
        assert_eq!(facet.color(), Some([200, 10, 10]));
        assert_relative_eq!(facet.surface(), 2.0, epsilon = 1e-12);

        let (_, block) = loaded.blocks().next().unwrap();
        assert_eq!(block.name(), "house");
        assert_relative_eq!(block.top_height(), 3.0, epsilon = 1e-9);
        assert_relative_eq!(block.volume(), 6.0, epsilon = 1e-9);
    }

    #[test]
    fn unresolved_reference_is_reported() {
        let mut snap = sample_scene().to_snapshot();
        snap.blocks[0].bottom_facet = 999;
        assert!(matches!(
            Scene::from_snapshot(&snap),
            Err(Error::UnresolvedReference(999))
        ));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut snap = sample_scene().to_snapshot();
        snap.version = 7;
        assert!(matches!(
            Scene::from_snapshot(&snap),
            Err(Error::UnsupportedVersion(7))
        ));
    }

    #[test]
    fn malformed_json_is_a_serialization_error() {
        assert!(matches!(
            Scene::from_json("{ not json"),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn inverted_facet_keeps_its_sign() {
        let mut scene = Scene::new();
        let mut facet = Facet::create_from_contour(&square(1.0), true, None).unwrap();
        facet.invert_normal();
        scene.insert_facet(facet);

        let loaded = Scene::from_json(&scene.to_json().unwrap()).unwrap();
        let (_, facet) = loaded.facets().next().unwrap();
        assert_relative_eq!(facet.normal(), -Vector3::z(), epsilon = 1e-12);
    }

    #[test]
    fn scene_wide_transform() {
        let mut scene = sample_scene();
        let shift = Isometry3::translation(0.0, 0.0, 10.0);
        scene.apply_transform(&shift);

        let (_, facet) = scene.facets().next().unwrap();
        assert_relative_eq!(facet.center().z, 10.0, epsilon = 1e-12);
        let (_, block) = scene.blocks().next().unwrap();
        assert_relative_eq!(block.main_plane().center().z, 10.0, epsilon = 1e-12);
        assert_relative_eq!(block.volume(), 6.0, epsilon = 1e-9);
    }

    #[test]
    fn emptied_facet_survives_round_trip() {
        let mut scene = sample_scene();
        let (key, _) = scene.facets().next().unwrap();
        let facet = scene.facet_mut(key).unwrap();
        let degenerate = [Point3::origin(), Point3::new(1.0, 0.0, 0.0)];
        assert!(facet.form_by_contour(&degenerate, true, None).is_err());
        assert!(facet.is_empty());

        let loaded = Scene::from_json(&scene.to_json().unwrap()).unwrap();
        assert_eq!((loaded.facet_count(), loaded.block_count()), (1, 1));

        let (_, facet) = loaded.facets().next().unwrap();
        assert!(facet.is_empty());
        assert!(facet.mesh().is_none());
        assert_eq!(facet.surface(), 0.0);
        assert_eq!(facet.name(), "ground");
        assert_eq!(facet.coverage(), 0.8);
        assert_relative_eq!(facet.normal(), Vector3::z(), epsilon = 1e-12);
    }

    #[test]
    fn keys_stay_valid_across_removal() {
        let mut scene = sample_scene();
        let (facet_key, _) = scene.facets().next().unwrap();
        let (block_key, _) = scene.blocks().next().unwrap();

        scene.block_mut(block_key).unwrap().set_top_height(4.0).unwrap();
        assert_relative_eq!(scene.block(block_key).unwrap().volume(), 8.0, epsilon = 1e-9);

        let facet = scene.remove_facet(facet_key).unwrap();
        assert_eq!(facet.name(), "ground");
        assert!(scene.facet(facet_key).is_none());
        assert!(scene.remove_block(block_key).is_some());
        assert_eq!((scene.facet_count(), scene.block_count()), (0, 0));
    }
}
