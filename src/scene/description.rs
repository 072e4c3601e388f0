//! JSON scene descriptions.
//!
//! A description lists extra shaders, materials and a tree of objects.
//! Textures and meshes are referenced by project path and loaded through an
//! [`AssetStore`].
//!
//! ```json
//! {
//!   "materials": [
//!     { "name": "Wood", "shader": "Standard",
//!       "properties": { "_MainTex": { "texture": "Textures/wood.png" } } }
//!   ],
//!   "gpuOnlyTextures": ["Textures/wood.png"],
//!   "objects": [
//!     { "name": "Crate", "mesh": "Meshes/crate.asset",
//!       "materials": ["Wood", null, "Metal"], "children": [] }
//!   ]
//! }
//! ```

use super::{Renderer, Scene, SceneObject};
use crate::assets::AssetStore;
use crate::color::ColorEncoding;
use crate::error::{CombinerError, Result};
use crate::material::{Material, MaterialAsset, PropertyAsset, PropertyValue, Shader, ShaderLibrary};
use crate::mesh::Mesh;
use crate::texture::Texture;
use glam::Vec4;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

/// Top-level scene file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDescription {
    /// Shaders registered in addition to the built-in ones.
    #[serde(default)]
    pub shaders: Vec<Shader>,
    #[serde(default)]
    pub materials: Vec<MaterialAsset>,
    /// Texture paths imported as GPU-only (not CPU readable).
    #[serde(default)]
    pub gpu_only_textures: Vec<String>,
    #[serde(default)]
    pub objects: Vec<ObjectDescription>,
}

/// One object and its children.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDescription {
    pub name: String,
    /// Mesh asset path. Without it the object has no mesh filter.
    #[serde(default)]
    pub mesh: Option<String>,
    /// Material names per slot; `null` is an empty slot. Without it the
    /// object has no renderer.
    #[serde(default)]
    pub materials: Option<Vec<Option<String>>>,
    #[serde(default)]
    pub children: Vec<ObjectDescription>,
}

impl SceneDescription {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}

struct SceneLoader<'a> {
    store: &'a dyn AssetStore,
    encoding: ColorEncoding,
    gpu_only: HashSet<&'a str>,
    textures: HashMap<String, Arc<Texture>>,
    materials: HashMap<String, Arc<Material>>,
    meshes: HashMap<String, Arc<Mesh>>,
}

impl<'a> SceneLoader<'a> {
    fn texture(&mut self, path: &str) -> Result<Arc<Texture>> {
        if let Some(texture) = self.textures.get(path) {
            return Ok(texture.clone());
        }

        let data = self.store.read_texture(path, self.encoding)?;
        let name = path.rsplit('/').next().unwrap_or(path);
        let name = name.strip_suffix(".png").unwrap_or(name);
        let texture = if self.gpu_only.contains(path) {
            Texture::gpu_only(name, data)
        } else {
            Texture::new(name, data)
        };

        let texture = Arc::new(texture.with_asset_path(path));
        self.textures.insert(path.to_string(), texture.clone());
        Ok(texture)
    }

    fn material(&mut self, asset: &MaterialAsset, library: &ShaderLibrary) -> Result<Material> {
        let shader = library.find(&asset.shader).ok_or_else(|| {
            CombinerError::Asset(format!(
                "Material {} uses unknown shader {}",
                asset.name, asset.shader
            ))
        })?;

        let mut material = Material::new(asset.name.clone(), shader);
        for (name, value) in &asset.properties {
            let value = match value {
                PropertyAsset::Color(c) => PropertyValue::Color(Vec4::from_array(*c)),
                PropertyAsset::Vector(v) => PropertyValue::Vector(Vec4::from_array(*v)),
                PropertyAsset::Float(f) => PropertyValue::Float(*f),
                PropertyAsset::Int(i) => PropertyValue::Int(*i),
                PropertyAsset::Texture(None) => PropertyValue::Texture(None),
                PropertyAsset::Texture(Some(path)) => PropertyValue::Texture(Some(self.texture(path)?)),
            };
            material.set(name.clone(), value);
        }
        for keyword in &asset.keywords {
            material.enable_keyword(keyword.clone());
        }
        if let Some(queue) = asset.render_queue {
            material.set_render_queue(queue);
        }
        Ok(material)
    }

    fn mesh(&mut self, path: &str) -> Result<Arc<Mesh>> {
        if let Some(mesh) = self.meshes.get(path) {
            return Ok(mesh.clone());
        }
        let mesh = Arc::new(self.store.read_mesh(path)?);
        self.meshes.insert(path.to_string(), mesh.clone());
        Ok(mesh)
    }

    fn object(&mut self, description: &ObjectDescription) -> Result<SceneObject> {
        let mut object = SceneObject::new(description.name.clone());

        if let Some(path) = &description.mesh {
            object = object.with_mesh(self.mesh(path)?);
        }

        if let Some(slots) = &description.materials {
            let materials = slots
                .iter()
                .map(|slot| match slot {
                    None => Ok(None),
                    Some(name) => self.materials.get(name).cloned().map(Some).ok_or_else(|| {
                        CombinerError::Asset(format!(
                            "Object {} references unknown material {}",
                            description.name, name
                        ))
                    }),
                })
                .collect::<Result<Vec<_>>>()?;
            object = object.with_renderer(Renderer::new(materials));
        }

        Ok(object)
    }
}

/// Build a [`Scene`] from `description`, registering its shaders in `library`.
pub fn load_scene(
    description: &SceneDescription,
    store: &dyn AssetStore,
    library: &mut ShaderLibrary,
    encoding: ColorEncoding,
) -> Result<Scene> {
    for shader in &description.shaders {
        library.register(shader.clone());
    }

    let mut loader = SceneLoader {
        store,
        encoding,
        gpu_only: description.gpu_only_textures.iter().map(String::as_str).collect(),
        textures: HashMap::new(),
        materials: HashMap::new(),
        meshes: HashMap::new(),
    };

    for asset in &description.materials {
        let material = loader.material(asset, library)?;
        loader.materials.insert(asset.name.clone(), Arc::new(material));
    }

    let mut scene = Scene::new();
    let mut pending: Vec<(Option<super::ObjectId>, &ObjectDescription)> =
        description.objects.iter().rev().map(|o| (None, o)).collect();

    while let Some((parent, object_description)) = pending.pop() {
        let object = loader.object(object_description)?;
        let id = match parent {
            Some(parent) => scene.spawn_child(parent, object)?,
            None => scene.spawn(object),
        };
        pending.extend(
            object_description
                .children
                .iter()
                .rev()
                .map(|child| (Some(id), child)),
        );
    }

    debug!(
        "Loaded scene: {} objects, {} materials, {} textures",
        scene.len(),
        loader.materials.len(),
        loader.textures.len()
    );
    Ok(scene)
}
