// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Closed solid stitched from two index-aligned cap facets
//!
//! Vertex layout: `2i` is top[i], `2i + 1` is bottom[i]. Caps reuse their
//! facet triangulation; each profile edge contributes one quad (two
//! triangles) to the side walls.

use nalgebra::{Point3, Vector3};
use smallvec::SmallVec;

use crate::contour::newell_normal;
use crate::error::{Error, Result};
use crate::facet::Facet;
use crate::mesh::Mesh;

/// Boundary loops of a block, each wound outward
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WallPolygons {
    pub roof: Vec<Point3<f64>>,
    /// Bottom cap, vertex order reversed relative to the roof
    pub bottom: Vec<Point3<f64>>,
    /// One quad per profile edge
    pub facades: Vec<SmallVec<[Point3<f64>; 4]>>,
}

impl WallPolygons {
    /// Number of loops (roof + bottom + facades)
    #[inline]
    pub fn loop_count(&self) -> usize {
        2 + self.facades.len()
    }
}

#[inline]
fn top_index(i: usize) -> u32 {
    (2 * i) as u32
}

#[inline]
fn bottom_index(i: usize) -> u32 {
    (2 * i + 1) as u32
}

/// Side quad of edge `i -> i + 1` as `(b_i, b_j, t_j, t_i)`; outward for an
/// upright block over a counter-clockwise profile.
#[inline]
fn side_quad(i: usize, n: usize) -> [u32; 4] {
    let j = (i + 1) % n;
    [bottom_index(i), bottom_index(j), top_index(j), top_index(i)]
}

/// Build the closed mesh from the two caps.
///
/// The first top-cap triangle decides the winding of the top cap and of every
/// side quad; the first bottom-cap triangle decides the bottom cap.
pub fn stitch(top: &Facet, bottom: &Facet) -> Result<Mesh> {
    let n = top.contour().len();
    if n < 3 {
        return Err(Error::DegenerateBlock(format!(
            "cap contour has {} points",
            n
        )));
    }
    if bottom.contour().len() != n {
        return Err(Error::DegenerateBlock(format!(
            "cap contours are not index-aligned ({} vs {})",
            n,
            bottom.contour().len()
        )));
    }

    let top_faces = top
        .mesh()
        .ok_or_else(|| Error::DegenerateBlock("top facet has no mesh".to_string()))?;
    let bottom_faces = bottom
        .mesh()
        .ok_or_else(|| Error::DegenerateBlock("bottom facet has no mesh".to_string()))?;

    let mut mesh = Mesh::try_with_capacity(
        2 * n,
        top_faces.triangle_count() + bottom_faces.triangle_count() + 2 * n,
        2 + n,
    )?;

    for (t, b) in top.contour().iter().zip(bottom.contour()) {
        mesh.add_vertex(*t);
        mesh.add_vertex(*b);
    }

    let top_normal = mesh.faces.add_normal(top.normal());
    for tri in &top_faces.triangles {
        mesh.faces.add_triangle(
            top_index(tri[0] as usize),
            top_index(tri[1] as usize),
            top_index(tri[2] as usize),
            top_normal,
        );
    }
    let flip_sides = disagrees(&mesh, 0, &top.normal());
    if flip_sides {
        flip_range(&mut mesh, 0);
    }

    let bottom_start = mesh.triangle_count();
    let bottom_normal = mesh.faces.add_normal(bottom.normal());
    for tri in &bottom_faces.triangles {
        mesh.faces.add_triangle(
            bottom_index(tri[0] as usize),
            bottom_index(tri[1] as usize),
            bottom_index(tri[2] as usize),
            bottom_normal,
        );
    }
    if disagrees(&mesh, bottom_start, &bottom.normal()) {
        flip_range(&mut mesh, bottom_start);
    }

    for i in 0..n {
        let mut quad = side_quad(i, n);
        if flip_sides {
            quad.reverse();
        }
        let corners: SmallVec<[Point3<f64>; 4]> =
            quad.iter().map(|&v| mesh.vertices[v as usize]).collect();
        let normal = newell_normal(&corners).unwrap_or_else(Vector3::zeros);
        let normal_index = mesh.faces.add_normal(normal);
        mesh.faces.add_triangle(quad[0], quad[1], quad[2], normal_index);
        mesh.faces.add_triangle(quad[0], quad[2], quad[3], normal_index);
    }

    Ok(mesh)
}

/// Whether triangle `start` winds against `normal`
fn disagrees(mesh: &Mesh, start: usize, normal: &Vector3<f64>) -> bool {
    if start >= mesh.triangle_count() {
        return false;
    }
    mesh.winding_normal(start)
        .map_or(false, |w| w.dot(normal) < 0.0)
}

fn flip_range(mesh: &mut Mesh, start: usize) {
    for tri in &mut mesh.faces.triangles[start..] {
        tri.swap(1, 2);
    }
}

/// Roof, reversed bottom and facades; all loops are reversed for a hole so
/// they keep facing outward.
pub fn wall_polygons(top: &Facet, bottom: &Facet, hole: bool) -> WallPolygons {
    let n = top.contour().len().min(bottom.contour().len());

    let mut roof: Vec<Point3<f64>> = top.contour()[..n].to_vec();
    let mut floor: Vec<Point3<f64>> = bottom.contour()[..n].iter().rev().copied().collect();
    if hole {
        roof.reverse();
        floor.reverse();
    }

    let facades = (0..n)
        .map(|i| {
            let mut quad = side_quad(i, n);
            if hole {
                quad.reverse();
            }
            quad.iter()
                .map(|&v| {
                    let k = v as usize / 2;
                    if v % 2 == 0 {
                        top.contour()[k]
                    } else {
                        bottom.contour()[k]
                    }
                })
                .collect()
        })
        .collect();

    WallPolygons {
        roof,
        bottom: floor,
        facades,
    }
}
