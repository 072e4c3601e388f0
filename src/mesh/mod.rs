//! Mesh data model.
//!
//! Vertex attributes are stored as parallel arrays shared by every submesh;
//! each submesh is a triangle list indexing into them.

pub mod remap;

pub use remap::{combined_mesh_name, remap, RemapReport, COMBINED_MESH_PREFIX};

use glam::{Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        let (min, max) = points.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        Some(Self { min, max })
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }
}

/// A triangle mesh with one or more submeshes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mesh {
    pub name: String,
    /// Vertex positions.
    pub vertices: Vec<Vec3>,
    #[serde(default)]
    pub normals: Vec<Vec3>,
    /// Optional; empty when the mesh has none.
    #[serde(default)]
    pub tangents: Vec<Vec4>,
    /// One texture coordinate per vertex.
    #[serde(default)]
    pub uv: Vec<Vec2>,
    /// Triangle lists (three indices per triangle).
    pub submeshes: Vec<Vec<u32>>,
    #[serde(default)]
    pub bounds: Option<Bounds>,
}

impl Mesh {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Get the number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn submesh_count(&self) -> usize {
        self.submeshes.len()
    }

    /// Triangles across all submeshes.
    pub fn triangle_count(&self) -> usize {
        self.submeshes.iter().map(|s| s.len() / 3).sum()
    }

    pub fn submesh_triangle_count(&self, submesh: usize) -> usize {
        self.submeshes.get(submesh).map_or(0, |s| s.len() / 3)
    }

    /// Check if the mesh is empty.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn recalculate_bounds(&mut self) {
        self.bounds = Bounds::from_points(self.vertices.iter().copied());
    }
}
