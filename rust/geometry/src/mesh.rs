// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh data structures

use nalgebra::{Isometry3, Point3, Vector3};

use crate::error::Result;

/// Indexed triangles with per-triangle normal indices.
///
/// Vertex storage lives elsewhere: a facet's mesh indexes the facet contour,
/// a block's mesh indexes [`Mesh::vertices`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMesh {
    /// Triangle vertex indices (i0, i1, i2)
    pub triangles: Vec<[u32; 3]>,
    /// Normal table
    pub normals: Vec<Vector3<f64>>,
    /// One index into `normals` per triangle
    pub triangle_normals: Vec<u32>,
}

impl TriangleMesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mesh with capacity, reporting allocation failure
    pub fn try_with_capacity(triangle_count: usize, normal_count: usize) -> Result<Self> {
        let mut mesh = Self::new();
        mesh.triangles.try_reserve_exact(triangle_count)?;
        mesh.triangle_normals.try_reserve_exact(triangle_count)?;
        mesh.normals.try_reserve_exact(normal_count)?;
        Ok(mesh)
    }

    /// Add a normal to the table and return its index
    #[inline]
    pub fn add_normal(&mut self, normal: Vector3<f64>) -> u32 {
        self.normals.push(normal);
        (self.normals.len() - 1) as u32
    }

    /// Add a triangle
    #[inline]
    pub fn add_triangle(&mut self, i0: u32, i1: u32, i2: u32, normal_index: u32) {
        self.triangles.push([i0, i1, i2]);
        self.triangle_normals.push(normal_index);
    }

    /// Get triangle count
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Normal assigned to triangle `i`
    #[inline]
    pub fn triangle_normal(&self, i: usize) -> Vector3<f64> {
        self.normals[self.triangle_normals[i] as usize]
    }

    /// Reverse the winding of every triangle
    pub fn flip_winding(&mut self) {
        for tri in &mut self.triangles {
            tri.swap(1, 2);
        }
    }

    /// Total area over the given vertex storage
    pub fn area(&self, vertices: &[Point3<f64>]) -> f64 {
        self.triangles
            .iter()
            .map(|t| {
                let a = vertices[t[0] as usize];
                let b = vertices[t[1] as usize];
                let c = vertices[t[2] as usize];
                (b - a).cross(&(c - a)).norm() * 0.5
            })
            .sum()
    }

    /// Highest vertex index referenced, if any
    pub fn max_index(&self) -> Option<u32> {
        self.triangles.iter().flat_map(|t| t.iter().copied()).max()
    }

    /// Clear the mesh
    #[inline]
    pub fn clear(&mut self) {
        self.triangles.clear();
        self.normals.clear();
        self.triangle_normals.clear();
    }
}

/// Triangle mesh owning its vertices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    /// Vertex positions
    pub vertices: Vec<Point3<f64>>,
    /// Triangles over `vertices`
    pub faces: TriangleMesh,
}

/// Flattened, renderer-friendly buffers
#[derive(Debug, Clone, Default)]
pub struct RenderBuffers {
    /// Vertex positions (x, y, z)
    pub positions: Vec<f32>,
    /// Vertex normals (nx, ny, nz)
    pub normals: Vec<f32>,
    /// Triangle indices (i0, i1, i2)
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mesh with capacity
    pub fn try_with_capacity(
        vertex_count: usize,
        triangle_count: usize,
        normal_count: usize,
    ) -> Result<Self> {
        let mut vertices = Vec::new();
        vertices.try_reserve_exact(vertex_count)?;
        Ok(Self {
            vertices,
            faces: TriangleMesh::try_with_capacity(triangle_count, normal_count)?,
        })
    }

    /// Add a vertex and return its index
    #[inline]
    pub fn add_vertex(&mut self, position: Point3<f64>) -> u32 {
        self.vertices.push(position);
        (self.vertices.len() - 1) as u32
    }

    /// Get vertex count
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get triangle count
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.faces.triangle_count()
    }

    /// Check if mesh is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Geometric (winding) normal of triangle `i`, if not degenerate
    pub fn winding_normal(&self, i: usize) -> Option<Vector3<f64>> {
        let t = self.faces.triangles[i];
        let a = self.vertices[t[0] as usize];
        let b = self.vertices[t[1] as usize];
        let c = self.vertices[t[2] as usize];
        (b - a).cross(&(c - a)).try_normalize(1e-15)
    }

    /// Total surface area
    #[inline]
    pub fn surface_area(&self) -> f64 {
        self.faces.area(&self.vertices)
    }

    /// Signed volume by the tetrahedron method; positive for a closed,
    /// outward-wound surface.
    pub fn volume(&self) -> f64 {
        self.faces
            .triangles
            .iter()
            .map(|t| {
                let a = self.vertices[t[0] as usize].coords;
                let b = self.vertices[t[1] as usize].coords;
                let c = self.vertices[t[2] as usize].coords;
                a.dot(&b.cross(&c)) / 6.0
            })
            .sum()
    }

    /// Calculate bounds (min, max)
    pub fn bounds(&self) -> (Point3<f64>, Point3<f64>) {
        if self.is_empty() {
            return (Point3::origin(), Point3::origin());
        }

        let mut min = Point3::new(f64::MAX, f64::MAX, f64::MAX);
        let mut max = Point3::new(f64::MIN, f64::MIN, f64::MIN);

        for p in &self.vertices {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
        }

        (min, max)
    }

    /// Average of all vertex positions
    pub fn centroid(&self) -> Point3<f64> {
        crate::plane::centroid(&self.vertices)
    }

    /// Apply a rigid transform to positions and normals
    pub fn apply_transform(&mut self, transform: &Isometry3<f64>) {
        for p in &mut self.vertices {
            *p = transform * *p;
        }
        for n in &mut self.faces.normals {
            *n = transform.rotation * *n;
        }
    }

    /// Flatten into f32 buffers with one vertex per triangle corner so that
    /// per-triangle normals survive.
    pub fn to_render_buffers(&self) -> RenderBuffers {
        let corner_count = self.faces.triangles.len() * 3;
        let mut buffers = RenderBuffers {
            positions: Vec::with_capacity(corner_count * 3),
            normals: Vec::with_capacity(corner_count * 3),
            indices: Vec::with_capacity(corner_count),
        };

        for (i, tri) in self.faces.triangles.iter().enumerate() {
            let normal = self.faces.triangle_normal(i);
            for &v in tri {
                let p = self.vertices[v as usize];
                buffers.positions.push(p.x as f32);
                buffers.positions.push(p.y as f32);
                buffers.positions.push(p.z as f32);
                buffers.normals.push(normal.x as f32);
                buffers.normals.push(normal.y as f32);
                buffers.normals.push(normal.z as f32);
                buffers.indices.push(buffers.indices.len() as u32);
            }
        }

        buffers
    }

    /// Clear the mesh
    #[inline]
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.faces.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Translation3, UnitQuaternion};

    fn unit_tetra() -> Mesh {
        let mut mesh = Mesh::new();
        let o = mesh.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let x = mesh.add_vertex(Point3::new(1.0, 0.0, 0.0));
        let y = mesh.add_vertex(Point3::new(0.0, 1.0, 0.0));
        let z = mesh.add_vertex(Point3::new(0.0, 0.0, 1.0));
        let n = mesh.faces.add_normal(Vector3::z());
        mesh.faces.add_triangle(o, y, x, n);
        mesh.faces.add_triangle(o, x, z, n);
        mesh.faces.add_triangle(o, z, y, n);
        mesh.faces.add_triangle(x, y, z, n);
        mesh
    }

    #[test]
    fn test_mesh_creation() {
        let mesh = Mesh::new();
        assert!(mesh.is_empty());
        assert_eq!(mesh.vertex_count(), 0);
        assert_eq!(mesh.triangle_count(), 0);
    }

    #[test]
    fn tetra_volume_and_flip() {
        let mut mesh = unit_tetra();
        assert_relative_eq!(mesh.volume(), 1.0 / 6.0, epsilon = 1e-12);
        mesh.faces.flip_winding();
        assert_relative_eq!(mesh.volume(), -1.0 / 6.0, epsilon = 1e-12);
    }

    #[test]
    fn bounds_and_transform() {
        let mut mesh = unit_tetra();
        let iso = Isometry3::from_parts(
            Translation3::new(10.0, 0.0, 0.0),
            UnitQuaternion::identity(),
        );
        mesh.apply_transform(&iso);
        let (min, max) = mesh.bounds();
        assert_relative_eq!(min, Point3::new(10.0, 0.0, 0.0));
        assert_relative_eq!(max, Point3::new(11.0, 1.0, 1.0));
    }

    #[test]
    fn render_buffers_duplicate_corners() {
        let mesh = unit_tetra();
        let buffers = mesh.to_render_buffers();
        assert_eq!(buffers.indices.len(), 12);
        assert_eq!(buffers.positions.len(), 36);
        assert_eq!(buffers.normals.len(), 36);
        assert_eq!(buffers.indices[11], 11);
    }

    #[test]
    fn area_over_external_storage() {
        let verts = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(2.0, 2.0, 0.0),
        ];
        let mut faces = TriangleMesh::new();
        let n = faces.add_normal(Vector3::z());
        faces.add_triangle(0, 1, 2, n);
        assert_relative_eq!(faces.area(&verts), 2.0);
        assert_eq!(faces.max_index(), Some(2));
    }
}
