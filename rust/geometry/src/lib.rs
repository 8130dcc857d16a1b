//! Blocks Geometry
//!
//! Planar facets and extruded blocks for building reconstruction. Facets are
//! fitted to point clouds (plane fit, hull, constrained triangulation) using
//! nalgebra and earcutr; blocks extrude a profile between two cap facets and
//! stitch them into a closed solid.

pub mod block;
pub mod config;
pub mod contour;
pub mod error;
pub mod facet;
pub mod hull;
pub mod mesh;
pub mod planar;
pub mod plane;
pub mod propagation;
pub mod scene;
pub mod triangulation;

// Re-export nalgebra types for convenience
pub use nalgebra::{Isometry3, Point2, Point3, Vector2, Vector3};

pub use block::{Block, CapKind, MainPlane, WallPolygons};
pub use config::GeometryConfig;
pub use contour::Polyline;
pub use error::{Error, Result};
pub use facet::{Facet, FacetQuality};
pub use hull::extract_hull;
pub use mesh::{Mesh, RenderBuffers, TriangleMesh};
pub use planar::PlanarEntity;
pub use plane::{fit_plane, PlaneBasis, PlaneEquation, PlaneFit};
pub use propagation::{ChangeOrigin, GeometryChanged, GeometryObserver};
pub use scene::{BlockKey, FacetKey, Scene};
pub use triangulation::{triangulate_contour, Triangulation};
