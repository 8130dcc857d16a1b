// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polygon triangulation utilities
//!
//! earcutr produces the seed triangulation; Lawson edge flips that never
//! touch boundary edges then turn it into the constrained Delaunay
//! triangulation of the polygon.

use nalgebra::Point2;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::config::GeometryConfig;
use crate::contour::{orient2d, point_in_polygon, signed_area};
use crate::error::{Error, Result};

/// Triangulated polygon
#[derive(Debug, Clone, Default)]
pub struct Triangulation {
    /// Triangles as indices into the boundary, wound like the boundary
    pub triangles: Vec<[usize; 3]>,
    /// Signed boundary area, positive for counter-clockwise input
    pub signed_area: f64,
}

impl Triangulation {
    /// Sum of the (unsigned) triangle areas
    pub fn area(&self, points: &[Point2<f64>]) -> f64 {
        self.triangles
            .iter()
            .map(|t| orient2d(&points[t[0]], &points[t[1]], &points[t[2]]).abs() * 0.5)
            .sum()
    }

    /// Reverse every triangle in place
    pub fn flip_winding(&mut self) {
        for tri in &mut self.triangles {
            tri.swap(1, 2);
        }
    }
}

/// Check if a polygon is convex (all cross products have same sign)
#[inline]
fn is_convex(points: &[Point2<f64>]) -> bool {
    if points.len() < 3 {
        return false;
    }

    let n = points.len();
    let mut sign = 0i8;

    for i in 0..n {
        let cross = orient2d(&points[i], &points[(i + 1) % n], &points[(i + 2) % n]);

        if cross.abs() > 1e-10 {
            let current_sign = if cross > 0.0 { 1i8 } else { -1i8 };
            if sign == 0 {
                sign = current_sign;
            } else if sign != current_sign {
                return false;
            }
        }
    }

    true
}

/// Simple fan triangulation for convex polygons
#[inline]
fn fan_triangulate(n: usize) -> Vec<usize> {
    let mut indices = Vec::with_capacity((n - 2) * 3);
    for i in 1..n - 1 {
        indices.push(0);
        indices.push(i);
        indices.push(i + 1);
    }
    indices
}

/// Triangulate a simple polygon (no holes)
/// Returns flat triangle indices into the input points
pub fn triangulate_polygon(points: &[Point2<f64>]) -> Result<Vec<usize>> {
    let n = points.len();

    if n < 3 {
        return Err(Error::insufficient(3, n));
    }

    if n == 3 {
        return Ok(vec![0, 1, 2]);
    }

    if is_convex(points) {
        return Ok(fan_triangulate(n));
    }

    let mut vertices = Vec::new();
    vertices.try_reserve_exact(n * 2)?;
    for p in points {
        vertices.push(p.x);
        vertices.push(p.y);
    }

    earcutr::earcut(&vertices, &[], 2).map_err(|e| Error::Triangulation(format!("{:?}", e)))
}

/// Triangulate an ordered boundary.
///
/// When `concave` is set, triangles whose centroid falls outside the boundary
/// are discarded. Fails with [`Error::DegenerateGeometry`] when the absolute
/// area is below `config.min_polygon_area`.
pub fn triangulate_contour(
    points: &[Point2<f64>],
    concave: bool,
    config: &GeometryConfig,
) -> Result<Triangulation> {
    let n = points.len();
    if n < 3 {
        return Err(Error::insufficient(3, n));
    }

    let area = signed_area(points);
    if area.abs() < config.min_polygon_area {
        return Err(Error::degenerate(format!(
            "polygon area {:.3e} is below {:.3e}",
            area.abs(),
            config.min_polygon_area
        )));
    }

    let flat = triangulate_polygon(points)?;
    let mut triangles = Vec::new();
    triangles.try_reserve_exact(flat.len() / 3)?;
    for chunk in flat.chunks_exact(3) {
        let mut tri = [chunk[0], chunk[1], chunk[2]];
        let o = orient2d(&points[tri[0]], &points[tri[1]], &points[tri[2]]);
        if o == 0.0 {
            continue;
        }
        if o < 0.0 {
            tri.swap(1, 2);
        }
        triangles.push(tri);
    }

    legalize(points, &mut triangles, config.max_delaunay_passes);

    if concave {
        triangles.retain(|t| {
            let c = Point2::from(
                (points[t[0]].coords + points[t[1]].coords + points[t[2]].coords) / 3.0,
            );
            point_in_polygon(&c, points)
        });
    }

    if triangles.is_empty() {
        return Err(Error::Triangulation(
            "no triangle survived inside the boundary".to_string(),
        ));
    }

    let mut result = Triangulation {
        triangles,
        signed_area: area,
    };
    if area < 0.0 {
        result.flip_winding();
    }
    Ok(result)
}

/// Lawson flips on counter-clockwise triangles; edges between consecutive
/// boundary indices are constraints and never flip.
fn legalize(points: &[Point2<f64>], triangles: &mut [[usize; 3]], max_passes: usize) {
    let n = points.len();
    let is_boundary = |a: usize, b: usize| {
        let d = a.abs_diff(b);
        d == 1 || d == n - 1
    };

    for _ in 0..max_passes {
        let mut edges: FxHashMap<(usize, usize), SmallVec<[usize; 2]>> = FxHashMap::default();
        for (t, tri) in triangles.iter().enumerate() {
            for e in 0..3 {
                let (a, b) = (tri[e], tri[(e + 1) % 3]);
                edges.entry((a.min(b), a.max(b))).or_default().push(t);
            }
        }

        let mut keys: Vec<_> = edges.keys().copied().collect();
        keys.sort_unstable();

        let mut dirty = vec![false; triangles.len()];
        let mut flipped = false;

        for (a, b) in keys {
            let owners = &edges[&(a, b)];
            if owners.len() != 2 || is_boundary(a, b) {
                continue;
            }
            let (t1, t2) = (owners[0], owners[1]);
            if dirty[t1] || dirty[t2] {
                continue;
            }

            let (p, q, c) = oriented_edge(&triangles[t1], a, b);
            let d = opposite(&triangles[t2], a, b);

            if !in_circumcircle(&points[p], &points[q], &points[c], &points[d]) {
                continue;
            }
            // Quad p, d, q, c must be convex for the flip to be valid
            if orient2d(&points[p], &points[d], &points[c]) <= 0.0
                || orient2d(&points[d], &points[q], &points[c]) <= 0.0
            {
                continue;
            }

            triangles[t1] = [p, d, c];
            triangles[t2] = [d, q, c];
            dirty[t1] = true;
            dirty[t2] = true;
            flipped = true;
        }

        if !flipped {
            break;
        }
    }
}

/// Returns (p, q, c) with `p -> q` the shared edge in the triangle's own order
#[inline]
fn oriented_edge(tri: &[usize; 3], a: usize, b: usize) -> (usize, usize, usize) {
    let c = opposite(tri, a, b);
    let pos = tri.iter().position(|&v| v == a).unwrap_or(0);
    if tri[(pos + 1) % 3] == b {
        (a, b, c)
    } else {
        (b, a, c)
    }
}

#[inline]
fn opposite(tri: &[usize; 3], a: usize, b: usize) -> usize {
    tri.iter().copied().find(|&v| v != a && v != b).unwrap_or(tri[0])
}

/// Whether `d` lies strictly inside the circumcircle of counter-clockwise (a, b, c)
fn in_circumcircle(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>, d: &Point2<f64>) -> bool {
    let (adx, ady) = (a.x - d.x, a.y - d.y);
    let (bdx, bdy) = (b.x - d.x, b.y - d.y);
    let (cdx, cdy) = (c.x - d.x, c.y - d.y);

    let alift = adx * adx + ady * ady;
    let blift = bdx * bdx + bdy * bdy;
    let clift = cdx * cdx + cdy * cdy;

    let det = alift * (bdx * cdy - cdx * bdy) - blift * (adx * cdy - cdx * ady)
        + clift * (adx * bdy - bdx * ady);

    let scale = alift.max(blift).max(clift);
    det > 1e-12 * scale * scale
}
