//! Minimal host scene graph.
//!
//! Objects live in an arena owned by [`Scene`] and are addressed by
//! [`ObjectId`]. An object may carry a [`Renderer`] (its material slots) and a
//! [`MeshFilter`] (its mesh); both reference shared assets through `Arc` so a
//! swap replaces handles without touching the assets themselves.

pub mod description;

pub use description::{load_scene, ObjectDescription, SceneDescription};

use crate::error::{CombinerError, Result};
use crate::material::Material;
use crate::mesh::Mesh;
use std::fmt;
use std::sync::Arc;

/// Handle to an object in a [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(usize);

impl ObjectId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Material slots of a renderable object, one per submesh. Slots may be empty.
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    pub materials: Vec<Option<Arc<Material>>>,
}

impl Renderer {
    pub fn new(materials: Vec<Option<Arc<Material>>>) -> Self {
        Self { materials }
    }

    /// Number of slots, empty ones included.
    pub fn material_count(&self) -> usize {
        self.materials.len()
    }
}

/// Holder of an object's mesh reference.
#[derive(Debug, Clone, Default)]
pub struct MeshFilter {
    pub mesh: Option<Arc<Mesh>>,
}

impl MeshFilter {
    pub fn new(mesh: Arc<Mesh>) -> Self {
        Self { mesh: Some(mesh) }
    }
}

#[derive(Debug, Clone)]
pub struct SceneObject {
    pub name: String,
    pub renderer: Option<Renderer>,
    pub mesh_filter: Option<MeshFilter>,
    parent: Option<ObjectId>,
    children: Vec<ObjectId>,
}

impl SceneObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            renderer: None,
            mesh_filter: None,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn with_renderer(mut self, renderer: Renderer) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_mesh(mut self, mesh: Arc<Mesh>) -> Self {
        self.mesh_filter = Some(MeshFilter::new(mesh));
        self
    }

    pub fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    pub fn children(&self) -> &[ObjectId] {
        &self.children
    }

    pub fn material_count(&self) -> usize {
        self.renderer.as_ref().map_or(0, Renderer::material_count)
    }

    /// True when a renderer references more than one material.
    pub fn has_multiple_materials(&self) -> bool {
        self.material_count() > 1
    }

    pub fn mesh(&self) -> Option<&Arc<Mesh>> {
        self.mesh_filter.as_ref().and_then(|f| f.mesh.as_ref())
    }
}

/// Arena of scene objects.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    objects: Vec<SceneObject>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a root object.
    pub fn spawn(&mut self, object: SceneObject) -> ObjectId {
        let id = ObjectId(self.objects.len());
        self.objects.push(SceneObject {
            parent: None,
            children: Vec::new(),
            ..object
        });
        id
    }

    /// Add an object under `parent`.
    pub fn spawn_child(&mut self, parent: ObjectId, object: SceneObject) -> Result<ObjectId> {
        if parent.0 >= self.objects.len() {
            return Err(CombinerError::ObjectNotFound(parent.to_string()));
        }
        let id = self.spawn(object);
        self.objects[id.0].parent = Some(parent);
        self.objects[parent.0].children.push(id);
        Ok(id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.get(id.0)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.objects.get_mut(id.0)
    }

    /// Like [`Scene::get`], failing with [`CombinerError::ObjectNotFound`].
    pub fn object(&self, id: ObjectId) -> Result<&SceneObject> {
        self.get(id)
            .ok_or_else(|| CombinerError::ObjectNotFound(id.to_string()))
    }

    /// All descendants of `id` in depth-first pre-order, `id` itself excluded.
    pub fn descendants(&self, id: ObjectId) -> Vec<ObjectId> {
        let mut out = Vec::new();
        let Some(root) = self.get(id) else {
            return out;
        };

        let mut stack: Vec<ObjectId> = root.children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(object) = self.get(next) {
                stack.extend(object.children.iter().rev().copied());
            }
        }
        out
    }

    /// First object with the given name, in creation order.
    pub fn find_by_name(&self, name: &str) -> Option<ObjectId> {
        self.objects
            .iter()
            .position(|o| o.name == name)
            .map(ObjectId)
    }

    /// Objects without a parent, in creation order.
    pub fn roots(&self) -> Vec<ObjectId> {
        self.ids()
            .filter(|&id| self.objects[id.0].parent.is_none())
            .collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = ObjectId> {
        (0..self.objects.len()).map(ObjectId)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
